//! Project: the explicit handle a run uses for cross-layer lookups
//!
//! A project knows which layers exist (id → display name), which CRS the
//! results are expressed in and which coordinate operations were chosen.
//! It is passed around by handle; there is no process-wide current project.

use std::collections::BTreeMap;

use crate::crs::{TransformContext, CRS};
use crate::vector::{Layer, LayerId};

#[derive(Debug, Clone, Default)]
pub struct Project {
    crs: CRS,
    transform_context: TransformContext,
    layers: BTreeMap<LayerId, String>,
}

impl Project {
    pub fn new(crs: CRS) -> Self {
        Self {
            crs,
            transform_context: TransformContext::default(),
            layers: BTreeMap::new(),
        }
    }

    pub fn with_transform_context(mut self, transform_context: TransformContext) -> Self {
        self.transform_context = transform_context;
        self
    }

    pub fn crs(&self) -> &CRS {
        &self.crs
    }

    pub fn transform_context(&self) -> &TransformContext {
        &self.transform_context
    }

    /// Register a layer so its name can be looked up by id
    pub fn add_layer(&mut self, layer: &Layer) {
        self.layers.insert(layer.id().clone(), layer.name().to_string());
    }

    pub fn layer_name(&self, id: &LayerId) -> Option<&str> {
        self.layers.get(id).map(String::as_str)
    }

    pub fn layer_ids(&self) -> impl Iterator<Item = &LayerId> {
        self.layers.keys()
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::GeometryType;

    #[test]
    fn test_layer_lookup() {
        let mut project = Project::new(CRS::from_epsg(2056));
        project.add_layer(&Layer::new("lines_3f2a", "lines", GeometryType::Line));

        assert_eq!(project.layer_name(&LayerId::new("lines_3f2a")), Some("lines"));
        assert_eq!(project.layer_name(&LayerId::new("missing")), None);
        assert_eq!(project.layer_count(), 1);
        assert_eq!(project.crs().epsg(), Some(2056));
    }
}
