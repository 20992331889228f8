//! Feature pools: per-layer access to features for checks and fixes
//!
//! A pool owns one layer's features for the length of a run, keeps a
//! spatial index over them and honours the selected-only restriction.
//! Reads go through `&self`; only the fix engine takes `&mut`.

use geo::Geometry;
use geocheck_core::{Feature, FeatureId, Fields, GeometryType, Layer, LayerId, CRS};
use tracing::debug;

use crate::error::{CheckEngineError, Result};
use crate::geometry::{Envelope, EnvelopeIndex};

pub trait FeaturePool {
    fn layer_id(&self) -> &LayerId;

    fn layer_name(&self) -> &str;

    /// Declared geometry family of the layer
    fn geometry_type(&self) -> GeometryType;

    fn crs(&self) -> &CRS;

    fn fields(&self) -> &Fields;

    /// Whether only the layer's selection is visible
    fn selected_only(&self) -> bool;

    fn feature(&self, id: FeatureId) -> Option<&Feature>;

    fn geometry(&self, id: FeatureId) -> Option<&Geometry<f64>> {
        self.feature(id).and_then(|f| f.geometry.as_ref())
    }

    /// Every visible feature id, ascending
    fn all_ids(&self) -> Vec<FeatureId>;

    /// Visible ids whose envelope intersects `rect`, ascending
    fn ids_in_rect(&self, rect: &Envelope) -> Vec<FeatureId>;

    fn update_feature(&mut self, feature: Feature) -> Result<()>;

    fn delete_feature(&mut self, id: FeatureId) -> Result<()>;
}

/// Pool over an in-memory layer
#[derive(Debug)]
pub struct LayerFeaturePool {
    layer: Layer,
    selected_only: bool,
    index: EnvelopeIndex,
}

impl LayerFeaturePool {
    pub fn new(layer: Layer, selected_only: bool) -> Self {
        let index = build_index(&layer);
        debug!(
            "Feature pool for {} ({} features, {} indexed)",
            layer.id(),
            layer.feature_count(),
            index.len()
        );
        Self {
            layer,
            selected_only,
            index,
        }
    }

    pub fn layer(&self) -> &Layer {
        &self.layer
    }

    pub fn into_layer(self) -> Layer {
        self.layer
    }

    fn visible(&self, id: FeatureId) -> bool {
        !self.selected_only || self.layer.selected_ids().contains(&id)
    }

    fn reindex(&mut self) {
        self.index = build_index(&self.layer);
    }
}

fn build_index(layer: &Layer) -> EnvelopeIndex {
    let entries = layer
        .features()
        .filter_map(|f| {
            f.geometry
                .as_ref()
                .and_then(Envelope::of)
                .map(|env| (f.id, env))
        })
        .collect();
    EnvelopeIndex::build(entries)
}

impl FeaturePool for LayerFeaturePool {
    fn layer_id(&self) -> &LayerId {
        self.layer.id()
    }

    fn layer_name(&self) -> &str {
        self.layer.name()
    }

    fn geometry_type(&self) -> GeometryType {
        self.layer.geometry_type()
    }

    fn crs(&self) -> &CRS {
        self.layer.crs()
    }

    fn fields(&self) -> &Fields {
        self.layer.fields()
    }

    fn selected_only(&self) -> bool {
        self.selected_only
    }

    fn feature(&self, id: FeatureId) -> Option<&Feature> {
        if self.visible(id) {
            self.layer.feature(id)
        } else {
            None
        }
    }

    fn all_ids(&self) -> Vec<FeatureId> {
        if self.selected_only {
            self.layer
                .selected_ids()
                .iter()
                .copied()
                .filter(|id| self.layer.feature(*id).is_some())
                .collect()
        } else {
            self.layer.feature_ids().collect()
        }
    }

    fn ids_in_rect(&self, rect: &Envelope) -> Vec<FeatureId> {
        self.index
            .query(rect)
            .into_iter()
            .filter(|id| self.visible(*id))
            .collect()
    }

    fn update_feature(&mut self, feature: Feature) -> Result<()> {
        self.layer.update_feature(feature)?;
        self.reindex();
        Ok(())
    }

    fn delete_feature(&mut self, id: FeatureId) -> Result<()> {
        self.layer
            .remove_feature(id)
            .ok_or_else(|| geocheck_core::Error::FeatureNotFound {
                layer: self.layer.id().to_string(),
                id,
            })?;
        self.reindex();
        Ok(())
    }
}

/// Pools of a run, in the order the caller supplied the layers
#[derive(Default)]
pub struct FeaturePools {
    pools: Vec<Box<dyn FeaturePool>>,
}

impl FeaturePools {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pool; layer ids must be unique
    pub fn insert(&mut self, pool: Box<dyn FeaturePool>) -> Result<()> {
        if self.contains(pool.layer_id()) {
            return Err(CheckEngineError::configuration(
                "INPUTS",
                format!("layer {} supplied twice", pool.layer_id()),
            ));
        }
        self.pools.push(pool);
        Ok(())
    }

    pub fn from_layers(layers: impl IntoIterator<Item = Layer>, selected_only: bool) -> Result<Self> {
        let mut pools = Self::new();
        for layer in layers {
            pools.insert(Box::new(LayerFeaturePool::new(layer, selected_only)))?;
        }
        Ok(pools)
    }

    pub fn get(&self, id: &LayerId) -> Option<&(dyn FeaturePool + 'static)> {
        self.pools
            .iter()
            .find(|p| p.layer_id() == id)
            .map(|p| p.as_ref())
    }

    pub fn get_mut(&mut self, id: &LayerId) -> Option<&mut (dyn FeaturePool + 'static)> {
        self.pools
            .iter_mut()
            .find(|p| p.layer_id() == id)
            .map(|p| p.as_mut())
    }

    pub fn contains(&self, id: &LayerId) -> bool {
        self.pools.iter().any(|p| p.layer_id() == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(dyn FeaturePool + 'static)> {
        self.pools.iter().map(|p| p.as_ref())
    }

    pub fn layer_ids(&self) -> Vec<LayerId> {
        self.pools.iter().map(|p| p.layer_id().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }

    /// First pool, the primary input of single-layer checks
    pub fn first(&self) -> Option<&(dyn FeaturePool + 'static)> {
        self.pools.first().map(|p| p.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{line_string, point};

    fn layer() -> Layer {
        let mut layer = Layer::new("roads", "roads", GeometryType::Line);
        layer.push_geometry(Geometry::LineString(line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0)]));
        layer.push_geometry(Geometry::LineString(line_string![(x: 5.0, y: 5.0), (x: 6.0, y: 5.0)]));
        layer.push_geometry(Geometry::LineString(line_string![(x: 0.5, y: -1.0), (x: 0.5, y: 1.0)]));
        layer
    }

    #[test]
    fn test_rect_lookup() {
        let pool = LayerFeaturePool::new(layer(), false);
        assert_eq!(pool.all_ids(), vec![1, 2, 3]);
        assert_eq!(pool.ids_in_rect(&Envelope::new(0.4, -0.1, 0.6, 0.1)), vec![1, 3]);
        assert!(pool.ids_in_rect(&Envelope::new(10.0, 10.0, 11.0, 11.0)).is_empty());
    }

    #[test]
    fn test_selected_only() {
        let mut layer = layer();
        layer.select([3]);
        let pool = LayerFeaturePool::new(layer, true);
        assert_eq!(pool.all_ids(), vec![3]);
        assert!(pool.feature(1).is_none());
        assert_eq!(pool.ids_in_rect(&Envelope::new(0.4, -0.1, 0.6, 0.1)), vec![3]);
    }

    #[test]
    fn test_edits_update_index() {
        let mut pool = LayerFeaturePool::new(layer(), false);
        pool.update_feature(Feature::new(2, Geometry::Point(point!(x: 20.0, y: 20.0)))).unwrap();
        assert_eq!(pool.ids_in_rect(&Envelope::new(19.0, 19.0, 21.0, 21.0)), vec![2]);

        pool.delete_feature(1).unwrap();
        assert_eq!(pool.all_ids(), vec![2, 3]);
        assert!(pool.delete_feature(1).is_err());
    }

    #[test]
    fn test_pools_keep_caller_order() {
        let a = Layer::new("b_layer", "b", GeometryType::Line);
        let b = Layer::new("a_layer", "a", GeometryType::Polygon);
        let pools = FeaturePools::from_layers(vec![a, b], false).unwrap();
        assert_eq!(pools.layer_ids(), vec![LayerId::new("b_layer"), LayerId::new("a_layer")]);
        assert_eq!(pools.get(&LayerId::new("a_layer")).unwrap().geometry_type(), GeometryType::Polygon);

        let dup = FeaturePools::from_layers(
            vec![
                Layer::new("x", "x", GeometryType::Line),
                Layer::new("x", "x", GeometryType::Line),
            ],
            false,
        );
        assert!(dup.is_err());
    }
}
