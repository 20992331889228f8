//! Minimum area check
//!
//! Every polygon part smaller than the threshold is an error. Small parts
//! can be deleted or merged into the neighbour they share a boundary with.

use geo::{Area, BooleanOps, Centroid, Geometry, Polygon};
use geocheck_core::{Feature, FeatureId, Feedback, GeometryType, LayerId};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{
    ensure_supported, report_progress, validate_range, CollectedErrors, FixOutcome, GeometryCheck,
    MergeAttributes, ResolutionMethod,
};
use crate::engine::{
    layer_features, Change, ChangeKind, ChangeWhat, Changes, CheckContext, CheckError, ErrorValue,
    FeaturePool, FeaturePools, VertexLocator,
};
use crate::error::{CheckEngineError, Result};
use crate::geometry::{parts, remove_part, replace_polygon_part, shared_boundary_length, Envelope};

/// Parameters for the area check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AreaParams {
    /// Parts with a smaller area are reported (map units squared, >= 0)
    #[serde(alias = "areaThreshold", alias = "threshold")]
    pub area_threshold: f64,
}

impl Default for AreaParams {
    fn default() -> Self {
        Self { area_threshold: 0.0 }
    }
}

#[derive(Debug, Clone)]
pub struct AreaCheck {
    params: AreaParams,
}

impl AreaCheck {
    pub fn new(params: AreaParams) -> Result<Self> {
        validate_range("area_threshold", params.area_threshold, 0.0, f64::MAX)?;
        Ok(Self { params })
    }
}

/// Neighbour picked for a merge
struct MergeTarget {
    feature: FeatureId,
    part: usize,
    score: f64,
}

impl AreaCheck {
    #[allow(clippy::too_many_arguments)]
    fn find_merge_target(
        &self,
        pool: &dyn FeaturePool,
        feature: &Feature,
        part: usize,
        polygon: &Polygon<f64>,
        method: ResolutionMethod,
        merge_attributes: &MergeAttributes,
        eps: f64,
    ) -> std::result::Result<Option<MergeTarget>, String> {
        let Some(envelope) = Envelope::of(polygon) else {
            return Ok(None);
        };

        let attribute = if method == ResolutionMethod::MergeIdenticalAttribute {
            let name = merge_attributes
                .get(pool.layer_id())
                .ok_or_else(|| format!("No merge attribute configured for layer {}", pool.layer_id()))?;
            let index = pool
                .fields()
                .index_of(name)
                .ok_or_else(|| format!("Layer {} has no field {}", pool.layer_id(), name))?;
            Some((index, feature.attribute(index).cloned()))
        } else {
            None
        };

        let mut best: Option<MergeTarget> = None;
        for candidate_id in pool.ids_in_rect(&envelope.expanded(eps)) {
            let Some(candidate) = pool.feature(candidate_id) else {
                continue;
            };
            let Some(candidate_geometry) = candidate.geometry.as_ref() else {
                continue;
            };
            if let Some((index, value)) = &attribute {
                if candidate.attribute(*index).cloned() != *value {
                    continue;
                }
            }
            for (jpart, candidate_part) in parts(candidate_geometry).iter().enumerate() {
                if candidate_id == feature.id && jpart == part {
                    continue;
                }
                let Some(candidate_polygon) = candidate_part.as_polygon() else {
                    continue;
                };
                let shared = shared_boundary_length(polygon, candidate_polygon);
                if shared <= eps {
                    continue;
                }
                let score = match method {
                    ResolutionMethod::MergeLargestArea => candidate_polygon.unsigned_area(),
                    _ => shared,
                };
                if best.as_ref().map_or(true, |b| score > b.score) {
                    best = Some(MergeTarget {
                        feature: candidate_id,
                        part: jpart,
                        score,
                    });
                }
            }
        }
        Ok(best)
    }

    #[allow(clippy::too_many_arguments)]
    fn merge(
        &self,
        pools: &mut FeaturePools,
        layer_id: &LayerId,
        feature: Feature,
        part: usize,
        polygon: &Polygon<f64>,
        method: ResolutionMethod,
        merge_attributes: &MergeAttributes,
        eps: f64,
        changes: &mut Changes,
    ) -> Result<FixOutcome> {
        let pool = pools.get_mut(layer_id).ok_or_else(|| CheckEngineError::DanglingReference {
            layer: layer_id.clone(),
            feature: feature.id,
        })?;

        let target = match self.find_merge_target(&*pool, &feature, part, polygon, method, merge_attributes, eps) {
            Ok(Some(target)) => target,
            Ok(None) => return Ok(FixOutcome::Failed("No adjacent polygon found".to_string())),
            Err(reason) => return Ok(FixOutcome::Failed(reason)),
        };

        let mut target_feature = if target.feature == feature.id {
            feature.clone()
        } else {
            match pool.feature(target.feature).cloned() {
                Some(f) => f,
                None => return Ok(FixOutcome::Failed("Merge target disappeared".to_string())),
            }
        };
        let Some(target_geometry) = target_feature.geometry.as_mut() else {
            return Ok(FixOutcome::Failed("Merge target has no geometry".to_string()));
        };
        let Some(target_polygon) = parts(target_geometry)
            .get(target.part)
            .and_then(|p| p.as_polygon().cloned())
        else {
            return Ok(FixOutcome::Failed("Merge target part disappeared".to_string()));
        };

        let merged = target_polygon.union(polygon);
        if merged.0.len() != 1 {
            return Ok(FixOutcome::Failed("Merged polygon is not a single part".to_string()));
        }
        let Some(merged_polygon) = merged.0.into_iter().next() else {
            return Ok(FixOutcome::Failed("Merged polygon is empty".to_string()));
        };
        if !replace_polygon_part(target_geometry, target.part, merged_polygon) {
            return Ok(FixOutcome::Failed("Could not replace merge target part".to_string()));
        }

        if target.feature == feature.id {
            // Both parts belong to this feature: merge, then drop the small part.
            if !remove_part(target_geometry, part) {
                return Ok(FixOutcome::Failed("Could not remove merged part".to_string()));
            }
            pool.update_feature(target_feature)?;
            changes.push(
                layer_id.clone(),
                feature.id,
                Change::new(ChangeWhat::Part, ChangeKind::Changed, VertexLocator::part(target.part as i32)),
            );
            changes.push(
                layer_id.clone(),
                feature.id,
                Change::new(ChangeWhat::Part, ChangeKind::Removed, VertexLocator::part(part as i32)),
            );
        } else {
            let target_id = target_feature.id;
            pool.update_feature(target_feature)?;
            changes.push(
                layer_id.clone(),
                target_id,
                Change::new(ChangeWhat::Part, ChangeKind::Changed, VertexLocator::part(target.part as i32)),
            );
            delete_part(pool, layer_id, feature, part, changes)?;
        }
        debug!("Merged part {} of feature {} in {}", part, target.feature, layer_id);
        Ok(FixOutcome::Fixed)
    }
}

/// Remove one part, or the whole feature when it is the last one
fn delete_part(
    pool: &mut dyn FeaturePool,
    layer_id: &LayerId,
    mut feature: Feature,
    part: usize,
    changes: &mut Changes,
) -> Result<()> {
    let fid = feature.id;
    let removed_part = match feature.geometry.as_mut() {
        Some(geometry) => remove_part(geometry, part),
        None => false,
    };
    if removed_part {
        pool.update_feature(feature)?;
        changes.push(
            layer_id.clone(),
            fid,
            Change::new(ChangeWhat::Part, ChangeKind::Removed, VertexLocator::part(part as i32)),
        );
    } else {
        pool.delete_feature(fid)?;
        changes.push(layer_id.clone(), fid, Change::feature(ChangeKind::Removed));
    }
    Ok(())
}

impl GeometryCheck for AreaCheck {
    fn id(&self) -> &'static str {
        "area"
    }

    fn description(&self) -> &'static str {
        "Minimal area"
    }

    fn compatible_geometry_types(&self) -> &'static [GeometryType] {
        &[GeometryType::Polygon]
    }

    fn collect_errors(
        &self,
        pools: &FeaturePools,
        _context: &CheckContext,
        feedback: &dyn Feedback,
    ) -> Result<CollectedErrors> {
        let mut collected = CollectedErrors::default();
        let features = layer_features(pools, self.compatible_geometry_types(), &mut collected.messages);
        let threshold = self.params.area_threshold;

        for (done, lf) in features.iter().enumerate() {
            if feedback.is_canceled() {
                break;
            }
            for (ipart, part) in parts(lf.geometry).iter().enumerate() {
                let Some(polygon) = part.as_polygon() else {
                    continue;
                };
                let area = polygon.unsigned_area();
                if area < threshold {
                    let location = polygon
                        .centroid()
                        .map(|p| p.0)
                        .unwrap_or_else(|| polygon.exterior().0[0]);
                    collected.errors.push(
                        CheckError::new(self.id(), lf.layer_id().clone(), lf.id(), location)
                            .with_vidx(VertexLocator::part(ipart as i32))
                            .with_geometry(Geometry::Polygon(polygon.clone()))
                            .with_value(ErrorValue::Number(area))
                            .with_message(format!("Area {} below {}", area, threshold)),
                    );
                }
            }
            report_progress(feedback, done + 1, features.len());
        }
        Ok(collected)
    }

    fn resolution_methods(&self) -> &'static [ResolutionMethod] {
        &[
            ResolutionMethod::MergeLongestEdge,
            ResolutionMethod::MergeLargestArea,
            ResolutionMethod::MergeIdenticalAttribute,
            ResolutionMethod::DeleteFeature,
            ResolutionMethod::NoAction,
        ]
    }

    fn supports_in_place(&self, geometry_type: GeometryType) -> bool {
        geometry_type == GeometryType::Polygon
    }

    fn fix_error(
        &self,
        pools: &mut FeaturePools,
        context: &CheckContext,
        error: &CheckError,
        method: ResolutionMethod,
        merge_attributes: &MergeAttributes,
        changes: &mut Changes,
    ) -> Result<FixOutcome> {
        ensure_supported(self, method)?;
        if method == ResolutionMethod::NoAction {
            return Ok(FixOutcome::NoChange);
        }
        let Some(ipart) = error.vidx().part_index() else {
            return Ok(FixOutcome::Obsolete);
        };
        let layer_id = error.layer_id();
        let pool = pools.get(layer_id).ok_or_else(|| CheckEngineError::DanglingReference {
            layer: layer_id.clone(),
            feature: error.feature_id(),
        })?;
        let Some(feature) = pool.feature(error.feature_id()).cloned() else {
            return Ok(FixOutcome::Obsolete);
        };
        let Some(polygon) = feature
            .geometry
            .as_ref()
            .and_then(|g| parts(g).get(ipart).and_then(|p| p.as_polygon().cloned()))
        else {
            return Ok(FixOutcome::Obsolete);
        };
        if polygon.unsigned_area() >= self.params.area_threshold {
            return Ok(FixOutcome::Obsolete);
        }

        match method {
            ResolutionMethod::DeleteFeature => {
                let pool = pools.get_mut(layer_id).ok_or_else(|| CheckEngineError::DanglingReference {
                    layer: layer_id.clone(),
                    feature: error.feature_id(),
                })?;
                delete_part(pool, layer_id, feature, ipart, changes)?;
                Ok(FixOutcome::Fixed)
            }
            _ => self.merge(
                pools,
                layer_id,
                feature,
                ipart,
                &polygon,
                method,
                merge_attributes,
                context.epsilon(),
                changes,
            ),
        }
    }
}
