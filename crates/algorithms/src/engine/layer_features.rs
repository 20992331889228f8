//! Visiting the features of several pools in a fixed order

use geo::Geometry;
use geocheck_core::{Feature, FeatureId, GeometryType, LayerId};

use super::pool::{FeaturePool, FeaturePools};
use crate::geometry::invalid_reason;

/// A feature together with the pool it came from
#[derive(Clone, Copy)]
pub struct LayerFeature<'a> {
    pub pool: &'a dyn FeaturePool,
    pub feature: &'a Feature,
    pub geometry: &'a Geometry<f64>,
}

impl LayerFeature<'_> {
    pub fn layer_id(&self) -> &LayerId {
        self.pool.layer_id()
    }

    pub fn id(&self) -> FeatureId {
        self.feature.id
    }

    /// Same layer and same feature id
    pub fn is_same(&self, other: &LayerFeature<'_>) -> bool {
        self.id() == other.id() && self.layer_id() == other.layer_id()
    }
}

/// Features of every pool whose layer type is in `types`, pools in caller
/// order and features by ascending id
///
/// Features without a usable geometry are skipped and described in
/// `messages`.
pub fn layer_features<'a>(
    pools: &'a FeaturePools,
    types: &[GeometryType],
    messages: &mut Vec<String>,
) -> Vec<LayerFeature<'a>> {
    pools
        .iter()
        .filter(|pool| types.contains(&pool.geometry_type()))
        .flat_map(|pool| pool_features(pool, messages))
        .collect()
}

/// Features of a single pool, ascending by id
pub fn pool_features<'a>(pool: &'a dyn FeaturePool, messages: &mut Vec<String>) -> Vec<LayerFeature<'a>> {
    let mut out = Vec::new();
    for id in pool.all_ids() {
        let Some(feature) = pool.feature(id) else {
            continue;
        };
        match feature.geometry.as_ref() {
            None => messages.push(format!(
                "Feature {} of layer {} has no geometry and was skipped",
                id,
                pool.layer_name()
            )),
            Some(geometry) => match invalid_reason(geometry) {
                Some(reason) => messages.push(format!(
                    "Feature {} of layer {} was skipped: {}",
                    id,
                    pool.layer_name(),
                    reason
                )),
                None => out.push(LayerFeature {
                    pool,
                    feature,
                    geometry,
                }),
            },
        }
    }
    out
}
