//! # geocheck core
//!
//! Core types and I/O shared by the geocheck validation engine.
//!
//! This crate provides:
//! - `Layer`, `Feature`, `Fields`: in-memory vector data
//! - `CRS` and `TransformContext`: spatial reference bookkeeping
//! - `Project`: explicit registry used for cross-layer lookups
//! - `Feedback`: progress reporting and cooperative cancellation
//! - GeoJSON reading and feature sinks

pub mod crs;
pub mod error;
pub mod feedback;
pub mod io;
pub mod project;
pub mod vector;

pub use crs::{TransformContext, CRS};
pub use error::{Error, Result};
pub use feedback::{CancellationToken, Feedback, MultiStepFeedback, NoFeedback, ProgressFeedback};
pub use project::Project;
pub use vector::{
    AttributeValue, Feature, FeatureId, Field, FieldKind, Fields, GeometryType, Layer, LayerId,
};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::crs::{TransformContext, CRS};
    pub use crate::error::{Error, Result};
    pub use crate::feedback::{Feedback, NoFeedback, ProgressFeedback};
    pub use crate::project::Project;
    pub use crate::vector::{Feature, FeatureId, GeometryType, Layer, LayerId};
}
