//! Engine plumbing shared by all checks
//!
//! - `CheckContext` and `Tolerance`: run-wide settings
//! - `FeaturePool`: per-layer feature access with a spatial index
//! - `CheckError`: what a check reports
//! - `Changes`: edits recorded while fixing

mod changes;
mod check_error;
mod context;
mod layer_features;
mod pool;

pub use changes::{Change, ChangeKind, ChangeWhat, Changes};
pub use check_error::{CheckError, ErrorValue, VertexLocator};
pub use context::{CheckContext, Tolerance};
pub use layer_features::{layer_features, pool_features, LayerFeature};
pub use pool::{FeaturePool, FeaturePools, LayerFeaturePool};
