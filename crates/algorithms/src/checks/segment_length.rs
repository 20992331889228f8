//! Minimum segment length check

use geocheck_core::{Feedback, GeometryType};
use serde::{Deserialize, Serialize};

use super::{report_progress, validate_range, CollectedErrors, GeometryCheck};
use crate::engine::{layer_features, CheckContext, CheckError, ErrorValue, FeaturePools, VertexLocator};
use crate::error::Result;
use crate::geometry::{distance, parts};

/// Parameters for the segment length check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentLengthParams {
    /// Segments shorter than this are reported (map units, >= 0)
    #[serde(alias = "minSegmentLength")]
    pub min_segment_length: f64,
}

impl Default for SegmentLengthParams {
    fn default() -> Self {
        Self {
            min_segment_length: 0.0,
        }
    }
}

/// Reports every segment shorter than a minimum length
#[derive(Debug, Clone)]
pub struct SegmentLengthCheck {
    params: SegmentLengthParams,
}

impl SegmentLengthCheck {
    pub fn new(params: SegmentLengthParams) -> Result<Self> {
        validate_range("min_segment_length", params.min_segment_length, 0.0, f64::MAX)?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &SegmentLengthParams {
        &self.params
    }
}

impl GeometryCheck for SegmentLengthCheck {
    fn id(&self) -> &'static str {
        "segment_length"
    }

    fn description(&self) -> &'static str {
        "Minimal segment length"
    }

    fn compatible_geometry_types(&self) -> &'static [GeometryType] {
        &[GeometryType::Line, GeometryType::Polygon]
    }

    fn collect_errors(
        &self,
        pools: &FeaturePools,
        _context: &CheckContext,
        feedback: &dyn Feedback,
    ) -> Result<CollectedErrors> {
        let mut collected = CollectedErrors::default();
        let features = layer_features(pools, self.compatible_geometry_types(), &mut collected.messages);
        let min_length = self.params.min_segment_length;

        for (done, lf) in features.iter().enumerate() {
            if feedback.is_canceled() {
                break;
            }
            for (ipart, part) in parts(lf.geometry).iter().enumerate() {
                for (iring, ring) in part.rings().into_iter().enumerate() {
                    for (ivert, segment) in ring.lines().enumerate() {
                        let length = distance(segment.start, segment.end);
                        if length < min_length {
                            collected.errors.push(
                                CheckError::new(self.id(), lf.layer_id().clone(), lf.id(), segment.start)
                                    .with_vidx(VertexLocator::vertex(ipart, iring, ivert))
                                    .with_value(ErrorValue::Number(length))
                                    .with_message(format!("Segment length {} below {}", length, min_length)),
                            );
                        }
                    }
                }
            }
            report_progress(feedback, done + 1, features.len());
        }
        Ok(collected)
    }

    fn supports_in_place(&self, geometry_type: GeometryType) -> bool {
        matches!(geometry_type, GeometryType::Line | GeometryType::Polygon)
    }
}
