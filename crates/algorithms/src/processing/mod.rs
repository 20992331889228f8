//! Running checks: sinks, phases, progress and in-place fixing
//!
//! A run reads its inputs as feature pools, writes errors through the
//! standard record layout and reports its outputs by name.

mod driver;
mod run_file;
mod schema;

pub use driver::{run_check, FixSummary, RunConfig, RunOutcome, RunState, ERRORS, OUTPUT};
pub use run_file::{RunFile, RunInput, RunOutputs};
pub use schema::{error_attributes, error_fields, error_record, flagged_record, ERROR_FIELD_NAMES};
