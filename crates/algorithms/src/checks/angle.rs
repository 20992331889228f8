//! Minimum angle check

use geo::{Coord, LineString};
use geocheck_core::{Feedback, GeometryType};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{
    ensure_supported, report_progress, validate_range, CollectedErrors, FixOutcome, GeometryCheck,
    MergeAttributes, ResolutionMethod,
};
use crate::engine::{
    layer_features, Change, ChangeKind, ChangeWhat, Changes, CheckContext, CheckError, ErrorValue,
    FeaturePools, VertexLocator,
};
use crate::error::{CheckEngineError, Result};
use crate::geometry::{can_delete_vertex, delete_vertex, is_closed, parts, polyline_size};

/// Parameters for the angle check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AngleParams {
    /// Vertices with a smaller angle are reported (degrees, 0 to 180)
    #[serde(alias = "minAngle")]
    pub min_angle: f64,
}

impl Default for AngleParams {
    fn default() -> Self {
        Self { min_angle: 0.0 }
    }
}

/// Reports vertices whose two adjacent segments meet at too sharp an angle
#[derive(Debug, Clone)]
pub struct AngleCheck {
    params: AngleParams,
}

impl AngleCheck {
    pub fn new(params: AngleParams) -> Result<Self> {
        validate_range("min_angle", params.min_angle, 0.0, 180.0)?;
        Ok(Self { params })
    }
}

/// Angle in degrees at vertex `iv` of a ring, `None` when a neighbouring
/// segment is shorter than `eps` or the vertex has no two neighbours
fn vertex_angle(ring: &LineString<f64>, iv: usize, eps: f64) -> Option<f64> {
    let n = polyline_size(ring);
    if n < 3 {
        return None;
    }
    let closed = is_closed(ring);
    if !closed && (iv == 0 || iv + 1 >= n) {
        return None;
    }
    let coords = &ring.0;
    let prev = coords[(iv + n - 1) % n];
    let cur = coords[iv];
    let next = coords[(iv + 1) % n];

    let to_prev = Coord { x: prev.x - cur.x, y: prev.y - cur.y };
    let to_next = Coord { x: next.x - cur.x, y: next.y - cur.y };
    let (len_prev, len_next) = (to_prev.x.hypot(to_prev.y), to_next.x.hypot(to_next.y));
    if len_prev < eps || len_next < eps {
        return None;
    }
    let cos = (to_prev.x * to_next.x + to_prev.y * to_next.y) / (len_prev * len_next);
    Some(cos.clamp(-1.0, 1.0).acos().to_degrees())
}

impl GeometryCheck for AngleCheck {
    fn id(&self) -> &'static str {
        "angle"
    }

    fn description(&self) -> &'static str {
        "Minimal angle"
    }

    fn compatible_geometry_types(&self) -> &'static [GeometryType] {
        &[GeometryType::Line, GeometryType::Polygon]
    }

    fn collect_errors(
        &self,
        pools: &FeaturePools,
        context: &CheckContext,
        feedback: &dyn Feedback,
    ) -> Result<CollectedErrors> {
        let mut collected = CollectedErrors::default();
        let features = layer_features(pools, self.compatible_geometry_types(), &mut collected.messages);
        let eps = context.epsilon();

        for (done, lf) in features.iter().enumerate() {
            if feedback.is_canceled() {
                break;
            }
            for (ipart, part) in parts(lf.geometry).iter().enumerate() {
                for (iring, ring) in part.rings().into_iter().enumerate() {
                    for iv in 0..polyline_size(ring) {
                        let Some(angle) = vertex_angle(ring, iv, eps) else {
                            continue;
                        };
                        if angle < self.params.min_angle {
                            collected.errors.push(
                                CheckError::new(self.id(), lf.layer_id().clone(), lf.id(), ring.0[iv])
                                    .with_vidx(VertexLocator::vertex(ipart, iring, iv))
                                    .with_value(ErrorValue::Number(angle))
                                    .with_message(format!("Angle {:.4} below {}", angle, self.params.min_angle)),
                            );
                        }
                    }
                }
            }
            report_progress(feedback, done + 1, features.len());
        }
        Ok(collected)
    }

    fn resolution_methods(&self) -> &'static [ResolutionMethod] {
        &[ResolutionMethod::DeleteNode, ResolutionMethod::NoAction]
    }

    fn supports_in_place(&self, geometry_type: GeometryType) -> bool {
        matches!(geometry_type, GeometryType::Line | GeometryType::Polygon)
    }

    fn fix_error(
        &self,
        pools: &mut FeaturePools,
        context: &CheckContext,
        error: &CheckError,
        method: ResolutionMethod,
        _merge_attributes: &MergeAttributes,
        changes: &mut Changes,
    ) -> Result<FixOutcome> {
        ensure_supported(self, method)?;
        if method == ResolutionMethod::NoAction {
            return Ok(FixOutcome::NoChange);
        }

        let vidx = error.vidx();
        let (Some(ipart), Some(iring), Some(iv)) = (vidx.part_index(), vidx.ring_index(), vidx.vertex_index())
        else {
            return Ok(FixOutcome::Obsolete);
        };
        let pool = pools
            .get_mut(error.layer_id())
            .ok_or_else(|| CheckEngineError::DanglingReference {
                layer: error.layer_id().clone(),
                feature: error.feature_id(),
            })?;
        let Some(mut feature) = pool.feature(error.feature_id()).cloned() else {
            return Ok(FixOutcome::Obsolete);
        };
        let Some(geometry) = feature.geometry.as_mut() else {
            return Ok(FixOutcome::Obsolete);
        };

        // The vertex may have moved or vanished since collection.
        let still_sharp = parts(geometry)
            .get(ipart)
            .and_then(|part| part.rings().get(iring).and_then(|ring| vertex_angle(ring, iv, context.epsilon())))
            .is_some_and(|angle| angle < self.params.min_angle);
        if !still_sharp {
            return Ok(FixOutcome::Obsolete);
        }
        if !can_delete_vertex(geometry, ipart, iring) || !delete_vertex(geometry, ipart, iring, iv) {
            return Ok(FixOutcome::Failed("Resulting geometry is degenerate".to_string()));
        }

        debug!("Deleted vertex {} of feature {} in {}", vidx, error.feature_id(), error.layer_id());
        pool.update_feature(feature)?;
        changes.push(
            error.layer_id().clone(),
            error.feature_id(),
            Change::new(ChangeWhat::Node, ChangeKind::Removed, vidx),
        );
        Ok(FixOutcome::Fixed)
    }
}
