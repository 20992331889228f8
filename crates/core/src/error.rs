//! Error types for geocheck core

use thiserror::Error;

/// Main error type for core geocheck operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported geometry: {0}")]
    UnsupportedGeometry(String),

    #[error("Invalid GeoJSON: {0}")]
    InvalidGeoJson(String),

    #[error("Duplicate feature id {id} in layer {layer}")]
    DuplicateFeatureId { layer: String, id: i64 },

    #[error("Feature {id} not found in layer {layer}")]
    FeatureNotFound { layer: String, id: i64 },

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Could not write feature to {destination}: {reason}")]
    Write { destination: String, reason: String },

    #[error("{0}")]
    Other(String),
}

/// Result type alias for core geocheck operations
pub type Result<T> = std::result::Result<T, Error>;
