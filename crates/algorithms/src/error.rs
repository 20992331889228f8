//! Error types for the check engine
//!
//! Run-level failures only. Anomalies met while examining single features
//! (an empty or broken geometry) are reported as messages and never abort
//! a run; cancellation is a run state, not an error.

use geocheck_core::{FeatureId, LayerId};
use thiserror::Error;

use crate::checks::ResolutionMethod;

#[derive(Error, Debug)]
pub enum CheckEngineError {
    /// Inputs or options that make the run impossible
    #[error("Invalid configuration for {parameter}: {reason}")]
    Configuration { parameter: String, reason: String },

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Could not write feature into {output}: {reason}")]
    Write { output: String, reason: String },

    /// An error points at a layer or feature its pools do not hold
    #[error("Error refers to feature {feature} of layer {layer}, which is not available")]
    DanglingReference { layer: LayerId, feature: FeatureId },

    #[error("Resolution method '{method}' is not available for the {check} check")]
    UnsupportedResolution {
        check: &'static str,
        method: ResolutionMethod,
    },

    #[error("Fix failed: {0}")]
    Fix(String),

    #[error(transparent)]
    Core(#[from] geocheck_core::Error),
}

impl CheckEngineError {
    pub fn configuration(parameter: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Configuration {
            parameter: parameter.into(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for check engine operations
pub type Result<T> = std::result::Result<T, CheckEngineError>;
