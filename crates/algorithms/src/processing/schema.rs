//! Standard record layout of exported errors

use geo::{Geometry, Point};
use geocheck_core::{AttributeValue, Feature, Field, FieldKind, Fields};

use crate::engine::CheckError;

/// Names of the error fields, in output order
pub const ERROR_FIELD_NAMES: [&str; 9] = [
    "layer_id",
    "layer_name",
    "feature_id",
    "part_index",
    "ring_index",
    "vertex_index",
    "error_x",
    "error_y",
    "error_value",
];

/// Schema shared by the `ERRORS` sink and the flagged-feature `OUTPUT` sink
pub fn error_fields() -> Fields {
    let kinds = [
        FieldKind::String,
        FieldKind::String,
        FieldKind::Int,
        FieldKind::Int,
        FieldKind::Int,
        FieldKind::Int,
        FieldKind::Double,
        FieldKind::Double,
        FieldKind::String,
    ];
    ERROR_FIELD_NAMES
        .iter()
        .zip(kinds)
        .map(|(name, kind)| Field::new(*name, kind))
        .collect()
}

/// Attribute values of one error, aligned with [`error_fields`].
/// Locator slots that do not apply carry -1.
pub fn error_attributes(error: &CheckError, layer_name: &str) -> Vec<AttributeValue> {
    let vidx = error.vidx();
    let location = error.location();
    vec![
        AttributeValue::String(error.layer_id().to_string()),
        AttributeValue::String(layer_name.to_string()),
        AttributeValue::Int(error.feature_id()),
        AttributeValue::Int(i64::from(vidx.part)),
        AttributeValue::Int(i64::from(vidx.ring)),
        AttributeValue::Int(i64::from(vidx.vertex)),
        AttributeValue::Float(location.x),
        AttributeValue::Float(location.y),
        AttributeValue::String(error.value().to_string()),
    ]
}

/// Point record for the `ERRORS` sink
pub fn error_record(error: &CheckError, layer_name: &str) -> Feature {
    Feature::new(0, Geometry::Point(Point::from(error.location())))
        .with_attributes(error_attributes(error, layer_name))
}

/// Record for the flagged-feature `OUTPUT` sink, carrying `geometry`
pub fn flagged_record(error: &CheckError, layer_name: &str, geometry: Option<Geometry<f64>>) -> Feature {
    Feature {
        id: 0,
        geometry,
        attributes: error_attributes(error, layer_name),
    }
}
