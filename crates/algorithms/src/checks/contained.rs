//! Containment check: features lying within a polygon of any input layer

use geocheck_core::{Feedback, GeometryType};
use tracing::debug;

use super::{
    ensure_supported, report_progress, CollectedErrors, FixOutcome, GeometryCheck, MergeAttributes,
    ResolutionMethod,
};
use crate::engine::{
    layer_features, Change, ChangeKind, Changes, CheckContext, CheckError, ErrorValue, FeaturePools,
    VertexLocator,
};
use crate::error::{CheckEngineError, Result};
use crate::geometry::{first_vertex, geometries_equal, geometry_covered_by, Envelope};

/// Flags every feature that lies within a polygon feature, touching
/// boundaries included. Identical geometries are not reported against
/// each other.
#[derive(Debug, Clone, Default)]
pub struct ContainedCheck;

impl GeometryCheck for ContainedCheck {
    fn id(&self) -> &'static str {
        "contained"
    }

    fn description(&self) -> &'static str {
        "Within"
    }

    fn compatible_geometry_types(&self) -> &'static [GeometryType] {
        &[GeometryType::Point, GeometryType::Line, GeometryType::Polygon]
    }

    fn validate_inputs(&self, pools: &FeaturePools) -> Result<()> {
        if pools.is_empty() {
            return Err(CheckEngineError::configuration("INPUTS", "no input layer supplied"));
        }
        if !pools.iter().any(|p| p.geometry_type() == GeometryType::Polygon) {
            return Err(CheckEngineError::configuration(
                "INPUTS",
                "no polygon layer in the input layers",
            ));
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
        let eps = context.epsilon();
        let containers = layer_features(pools, &[GeometryType::Polygon], &mut collected.messages);

        for (done, container) in containers.iter().enumerate() {
            if feedback.is_canceled() {
                break;
            }
            let Some(container_env) = Envelope::of(container.geometry) else {
                continue;
            };
            let search = container_env.expanded(eps);

            for pool in pools.iter() {
                for id in pool.ids_in_rect(&search) {
                    if id == container.id() && pool.layer_id() == container.layer_id() {
                        continue;
                    }
                    let Some(geometry) = pool.geometry(id) else {
                        continue;
                    };
                    let covered_env = Envelope::of(geometry).is_some_and(|env| search.covers(&env));
                    if !covered_env
                        || geometries_equal(geometry, container.geometry, eps)
                        || !geometry_covered_by(geometry, container.geometry, eps)
                    {
                        continue;
                    }
                    let Some(location) = first_vertex(geometry) else {
                        continue;
                    };
                    let container_name = context
                        .layer_name(container.layer_id())
                        .unwrap_or_else(|| container.pool.layer_name());
                    collected.errors.push(
                        CheckError::new(self.id(), pool.layer_id().clone(), id, location)
                            .with_vidx(VertexLocator::new(0, 0, 0))
                            .with_value(ErrorValue::Feature {
                                layer: container.layer_id().clone(),
                                feature: container.id(),
                            })
                            .with_message(format!(
                                "Contained in feature {} of layer {}",
                                container.id(),
                                container_name
                            )),
                    );
                }
            }
            report_progress(feedback, done + 1, containers.len());
        }
        Ok(collected)
    }

    fn resolution_methods(&self) -> &'static [ResolutionMethod] {
        &[ResolutionMethod::DeleteFeature, ResolutionMethod::NoAction]
    }

    fn produces_output_layer(&self) -> bool {
        false
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
        let ErrorValue::Feature { layer, feature } = error.value() else {
            return Ok(FixOutcome::Obsolete);
        };

        // Only delete while the containment still holds.
        let still_contained = match (
            pools.get(layer).and_then(|p| p.geometry(*feature)),
            pools.get(error.layer_id()).and_then(|p| p.geometry(error.feature_id())),
        ) {
            (Some(container), Some(contained)) => geometry_covered_by(contained, container, context.epsilon()),
            _ => false,
        };
        if !still_contained {
            return Ok(FixOutcome::Obsolete);
        }

        let pool = pools
            .get_mut(error.layer_id())
            .ok_or_else(|| CheckEngineError::DanglingReference {
                layer: error.layer_id().clone(),
                feature: error.feature_id(),
            })?;
        pool.delete_feature(error.feature_id())?;
        changes.push(error.layer_id().clone(), error.feature_id(), Change::feature(ChangeKind::Removed));
        debug!("Deleted contained feature {} of {}", error.feature_id(), error.layer_id());
        Ok(FixOutcome::Fixed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{line_string, point, polygon, Geometry, Polygon};
    use geocheck_core::{Layer, LayerId, NoFeedback, CRS};

    use crate::engine::Tolerance;

    fn square(x: f64, y: f64, size: f64) -> Polygon<f64> {
        polygon![
            (x: x, y: y), (x: x + size, y: y), (x: x + size, y: y + size), (x: x, y: y + size)
        ]
    }

    fn context() -> CheckContext {
        CheckContext::new(Tolerance::default(), CRS::wgs84())
    }

    #[test]
    fn test_contained_across_layers() {
        let mut parcels = Layer::new("parcels", "parcels", GeometryType::Polygon);
        parcels.push_geometry(Geometry::Polygon(square(0.0, 0.0, 10.0)));
        parcels.push_geometry(Geometry::Polygon(square(2.0, 2.0, 2.0)));
        parcels.push_geometry(Geometry::Polygon(square(20.0, 0.0, 1.0)));

        let mut wells = Layer::new("wells", "wells", GeometryType::Point);
        wells.push_geometry(Geometry::Point(point!(x: 5.0, y: 5.0)));
        wells.push_geometry(Geometry::Point(point!(x: 15.0, y: 5.0)));
        wells.push_geometry(Geometry::Point(point!(x: 10.0, y: 5.0)));

        let mut roads = Layer::new("roads", "roads", GeometryType::Line);
        roads.push_geometry(Geometry::LineString(line_string![(x: 1.0, y: 1.0), (x: 9.0, y: 1.0)]));
        roads.push_geometry(Geometry::LineString(line_string![(x: 1.0, y: 1.0), (x: 12.0, y: 1.0)]));

        let pools = FeaturePools::from_layers(vec![parcels, wells, roads], false).unwrap();
        let collected = ContainedCheck.collect_errors(&pools, &context(), &NoFeedback).unwrap();
        let found: Vec<(String, i64)> = collected
            .errors
            .iter()
            .map(|e| (e.layer_id().to_string(), e.feature_id()))
            .collect();

        assert_eq!(
            found,
            vec![
                ("parcels".to_string(), 2),
                ("wells".to_string(), 1),
                ("wells".to_string(), 3),
                ("roads".to_string(), 1),
            ]
        );
        assert_eq!(
            collected.errors[0].value(),
            &ErrorValue::Feature {
                layer: LayerId::new("parcels"),
                feature: 1
            }
        );
        assert_eq!(collected.errors[0].vidx(), VertexLocator::new(0, 0, 0));
        assert_eq!(collected.errors[0].location(), geo::Coord { x: 2.0, y: 2.0 });
    }

    #[test]
    fn test_identical_geometries_are_not_reported() {
        let mut a = Layer::new("a", "a", GeometryType::Polygon);
        a.push_geometry(Geometry::Polygon(square(0.0, 0.0, 1.0)));
        let mut b = Layer::new("b", "b", GeometryType::Polygon);
        b.push_geometry(Geometry::Polygon(square(0.0, 0.0, 1.0)));

        let pools = FeaturePools::from_layers(vec![a, b], false).unwrap();
        let collected = ContainedCheck.collect_errors(&pools, &context(), &NoFeedback).unwrap();
        assert!(collected.errors.is_empty());
    }

    #[test]
    fn test_reordered_duplicates_are_not_reported() {
        let mut a = Layer::new("a", "a", GeometryType::Polygon);
        a.push_geometry(Geometry::Polygon(square(0.0, 0.0, 1.0)));
        let mut b = Layer::new("b", "b", GeometryType::Polygon);
        // Same square starting at another corner
        b.push_geometry(Geometry::Polygon(polygon![
            (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 1.0), (x: 0.0, y: 0.0)
        ]));
        // Same square, clockwise
        b.push_geometry(Geometry::Polygon(polygon![
            (x: 0.0, y: 0.0), (x: 0.0, y: 1.0), (x: 1.0, y: 1.0), (x: 1.0, y: 0.0)
        ]));
        b.push_geometry(Geometry::Polygon(square(0.25, 0.25, 0.5)));

        let pools = FeaturePools::from_layers(vec![a, b], false).unwrap();
        let collected = ContainedCheck.collect_errors(&pools, &context(), &NoFeedback).unwrap();
        let found: Vec<(String, i64)> = collected
            .errors
            .iter()
            .map(|e| (e.layer_id().to_string(), e.feature_id()))
            .collect();
        // Only the small square, once per enclosing copy
        assert_eq!(found, vec![("b".to_string(), 3); 3]);
    }

    #[test]
    fn test_requires_polygon_layer() {
        let pools =
            FeaturePools::from_layers(vec![Layer::new("roads", "roads", GeometryType::Line)], false).unwrap();
        let err = ContainedCheck.validate_inputs(&pools).unwrap_err();
        assert!(err.to_string().contains("INPUTS"));
        assert!(ContainedCheck.validate_inputs(&FeaturePools::new()).is_err());
    }

    #[test]
    fn test_delete_contained_feature() {
        let mut parcels = Layer::new("parcels", "parcels", GeometryType::Polygon);
        parcels.push_geometry(Geometry::Polygon(square(0.0, 0.0, 10.0)));
        parcels.push_geometry(Geometry::Polygon(square(2.0, 2.0, 2.0)));
        let mut pools = FeaturePools::from_layers(vec![parcels], false).unwrap();
        let ctx = context();

        let errors = ContainedCheck.collect_errors(&pools, &ctx, &NoFeedback).unwrap().errors;
        let mut changes = Changes::default();
        let outcome = ContainedCheck
            .fix_error(&mut pools, &ctx, &errors[0], ResolutionMethod::DeleteFeature, &MergeAttributes::new(), &mut changes)
            .unwrap();
        assert_eq!(outcome, FixOutcome::Fixed);
        assert_eq!(pools.get(&LayerId::new("parcels")).unwrap().all_ids(), vec![1]);
    }
}
