//! Dangling line end check

use geo::Coord;
use geocheck_core::{Feedback, GeometryType};

use super::{report_progress, CollectedErrors, GeometryCheck};
use crate::engine::{layer_features, CheckContext, CheckError, FeaturePools, LayerFeature, VertexLocator};
use crate::error::Result;
use crate::geometry::{coords_equal, parts, point_on_line, Envelope};

/// Reports line ends that touch neither another part of the same feature
/// nor any other line feature
#[derive(Debug, Clone, Default)]
pub struct DangleCheck;

/// Whether `p` lies on a line part of another feature in any line pool
fn touches_other_feature(pools: &FeaturePools, this: &LayerFeature<'_>, p: Coord<f64>, eps: f64) -> bool {
    let query = Envelope::around(p, eps);
    pools
        .iter()
        .filter(|pool| pool.geometry_type() == GeometryType::Line)
        .any(|pool| {
            pool.ids_in_rect(&query).into_iter().any(|id| {
                if id == this.id() && pool.layer_id() == this.layer_id() {
                    return false;
                }
                pool.geometry(id).is_some_and(|geometry| {
                    parts(geometry)
                        .iter()
                        .filter_map(|part| part.as_line())
                        .any(|line| point_on_line(p, line, eps))
                })
            })
        })
}

impl GeometryCheck for DangleCheck {
    fn id(&self) -> &'static str {
        "dangle"
    }

    fn description(&self) -> &'static str {
        "Dangle"
    }

    fn compatible_geometry_types(&self) -> &'static [GeometryType] {
        &[GeometryType::Line]
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
            let feature_parts = parts(lf.geometry);
            for (ipart, part) in feature_parts.iter().enumerate() {
                let Some(line) = part.as_line() else {
                    continue;
                };
                let (Some(&first), Some(&last)) = (line.0.first(), line.0.last()) else {
                    continue;
                };
                if line.0.len() < 2 || coords_equal(first, last, eps) {
                    continue;
                }

                let touches_own_part = |p: Coord<f64>| {
                    feature_parts
                        .iter()
                        .enumerate()
                        .filter(|(jpart, _)| *jpart != ipart)
                        .filter_map(|(_, other)| other.as_line())
                        .any(|other| point_on_line(p, other, eps))
                };

                for (vertex, end) in [(0, first), (line.0.len() - 1, last)] {
                    if touches_own_part(end) || touches_other_feature(pools, lf, end, eps) {
                        continue;
                    }
                    collected.errors.push(
                        CheckError::new(self.id(), lf.layer_id().clone(), lf.id(), end)
                            .with_vidx(VertexLocator::vertex(ipart, 0, vertex))
                            .with_message("Dangling end point"),
                    );
                }
            }
            report_progress(feedback, done + 1, features.len());
        }
        Ok(collected)
    }

    fn supports_in_place(&self, geometry_type: GeometryType) -> bool {
        geometry_type == GeometryType::Line
    }
}
