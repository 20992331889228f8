//! Line-layer intersection check
//!
//! Reports every place where a line of the checked layers meets a feature
//! of the intersection layer. The intersection geometry travels with the
//! error so the output layer shows what was found.

use geocheck_core::{FeatureId, Feedback, GeometryType, LayerId};
use serde::{Deserialize, Serialize};

use super::{report_progress, CollectedErrors, GeometryCheck};
use crate::engine::{
    pool_features, CheckContext, CheckError, ErrorValue, FeaturePool, FeaturePools, VertexLocator,
};
use crate::error::{CheckEngineError, Result};
use crate::geometry::{
    coords_equal, distance_along, line_intersections, parts, point_segment_distance, Envelope, Intersection,
};

/// Parameters for the line-layer intersection check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineLayerIntersectionParams {
    /// Layer the checked lines must not meet (line or polygon)
    #[serde(alias = "checkLayer")]
    pub check_layer: LayerId,
}

#[derive(Debug, Clone)]
pub struct LineLayerIntersectionCheck {
    params: LineLayerIntersectionParams,
}

impl LineLayerIntersectionCheck {
    pub fn new(params: LineLayerIntersectionParams) -> Result<Self> {
        if params.check_layer.as_str().trim().is_empty() {
            return Err(CheckEngineError::InvalidParameter {
                name: "check_layer",
                value: String::new(),
                reason: "a layer id is required".to_string(),
            });
        }
        Ok(Self { params })
    }

    pub fn check_layer(&self) -> &LayerId {
        &self.params.check_layer
    }

    /// Line pools other than the intersection layer
    fn checked_pools<'a>(
        &'a self,
        pools: &'a FeaturePools,
    ) -> impl Iterator<Item = &'a (dyn FeaturePool + 'static)> + 'a {
        pools
            .iter()
            .filter(move |p| p.layer_id() != self.check_layer() && p.geometry_type() == GeometryType::Line)
    }
}

/// Whether `candidate` was already reported for the same checked part,
/// whichever feature of the intersection layer produced it
fn already_found(found: &[(Intersection, FeatureId)], candidate: &Intersection, eps: f64) -> bool {
    found.iter().any(|(f, _)| match (f, candidate) {
        (Intersection::Point(a), Intersection::Point(b)) => coords_equal(*a, *b, eps),
        (Intersection::Overlap(s, e), Intersection::Point(p)) => point_segment_distance(*p, *s, *e) <= eps,
        (Intersection::Overlap(a1, a2), Intersection::Overlap(b1, b2)) => {
            (coords_equal(*a1, *b1, eps) && coords_equal(*a2, *b2, eps))
                || (coords_equal(*a1, *b2, eps) && coords_equal(*a2, *b1, eps))
        }
        _ => false,
    })
}

impl GeometryCheck for LineLayerIntersectionCheck {
    fn id(&self) -> &'static str {
        "line_layer_intersection"
    }

    fn description(&self) -> &'static str {
        "Intersection with other layer"
    }

    fn compatible_geometry_types(&self) -> &'static [GeometryType] {
        &[GeometryType::Line]
    }

    fn validate_inputs(&self, pools: &FeaturePools) -> Result<()> {
        let check_pool = pools.get(self.check_layer()).ok_or_else(|| {
            CheckEngineError::configuration(
                "CHECK_LAYER",
                format!("layer {} is not among the inputs", self.check_layer()),
            )
        })?;
        if !matches!(check_pool.geometry_type(), GeometryType::Line | GeometryType::Polygon) {
            return Err(CheckEngineError::configuration(
                "CHECK_LAYER",
                format!("{} layers cannot be intersected", check_pool.geometry_type()),
            ));
        }
        let checked = pools.iter().filter(|p| p.layer_id() != self.check_layer()).count();
        if checked == 0 {
            return Err(CheckEngineError::configuration("INPUT", "no layer to check"));
        }
        if self.checked_pools(pools).count() != checked {
            return Err(CheckEngineError::configuration("INPUT", "only line layers can be checked"));
        }
        Ok(())
    }

    fn collect_errors(
        &self,
        pools: &FeaturePools,
        context: &CheckContext,
        feedback: &dyn Feedback,
    ) -> Result<CollectedErrors> {
        let mut collected = CollectedErrors::default();
        let check_pool = pools.get(self.check_layer()).ok_or_else(|| {
            CheckEngineError::configuration(
                "CHECK_LAYER",
                format!("layer {} is not among the inputs", self.check_layer()),
            )
        })?;
        let eps = context.epsilon();
        let check_name = context
            .layer_name(check_pool.layer_id())
            .unwrap_or_else(|| check_pool.layer_name());

        let features: Vec<_> = self
            .checked_pools(pools)
            .flat_map(|pool| pool_features(pool, &mut collected.messages))
            .collect();

        for (done, lf) in features.iter().enumerate() {
            if feedback.is_canceled() {
                break;
            }
            for (ipart, part) in parts(lf.geometry).iter().enumerate() {
                let Some(line) = part.as_line() else {
                    continue;
                };
                let Some(envelope) = Envelope::of(line) else {
                    continue;
                };
                let mut found: Vec<(Intersection, FeatureId)> = Vec::new();

                for other_id in check_pool.ids_in_rect(&envelope.expanded(eps)) {
                    let Some(other) = check_pool.geometry(other_id) else {
                        continue;
                    };
                    for other_part in parts(other) {
                        for ring in other_part.rings() {
                            for hit in line_intersections(line, ring, eps) {
                                if !already_found(&found, &hit, eps) {
                                    found.push((hit, other_id));
                                }
                            }
                        }
                    }
                }

                // Report in the order the checked line runs through them
                let start_of = |hit: &Intersection| match hit {
                    Intersection::Point(c) => distance_along(line, *c),
                    Intersection::Overlap(a, b) => distance_along(line, *a).min(distance_along(line, *b)),
                };
                found.sort_by(|(a, _), (b, _)| start_of(a).total_cmp(&start_of(b)));

                for (hit, other_id) in found {
                    collected.errors.push(
                        CheckError::new(self.id(), lf.layer_id().clone(), lf.id(), hit.location())
                            .with_vidx(VertexLocator::part(ipart as i32))
                            .with_geometry(hit.to_geometry())
                            .with_value(ErrorValue::Text(format!("{}:{}", check_name, other_id)))
                            .with_message(format!("Intersects feature {} of layer {}", other_id, check_name)),
                    );
                }
            }
            report_progress(feedback, done + 1, features.len());
        }
        Ok(collected)
    }
}
