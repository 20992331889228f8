//! # geocheck algorithms
//!
//! Geometry validation rules and the machinery to run them.
//!
//! ## Modules
//!
//! - **geometry**: envelopes, the spatial index, part access, tolerant predicates and edits
//! - **engine**: feature pools, check context, check errors and change records
//! - **checks**: contained, line-layer intersection, segment length, angle, area, dangle, multipart
//! - **processing**: the error/fix driver, the error record layout and JSON run files

pub mod checks;
pub mod engine;
pub mod error;
pub mod geometry;
pub mod processing;

pub use checks::{Check, CheckSpec, FixOutcome, GeometryCheck, ResolutionMethod};
pub use engine::{CheckContext, CheckError, ErrorValue, FeaturePool, FeaturePools, Tolerance, VertexLocator};
pub use error::{CheckEngineError, Result};
pub use processing::{run_check, RunConfig, RunFile, RunOutcome, RunState};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::checks::{
        AngleParams, AreaParams, Check, CheckSpec, GeometryCheck, LineLayerIntersectionParams,
        ResolutionMethod, SegmentLengthParams,
    };
    pub use crate::engine::{CheckContext, CheckError, FeaturePools, Tolerance, VertexLocator};
    pub use crate::processing::{run_check, RunConfig, RunOutcome, RunState, ERRORS, OUTPUT};
    pub use geocheck_core::prelude::*;
}
