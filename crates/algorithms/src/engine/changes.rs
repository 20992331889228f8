//! Bookkeeping of edits applied while fixing errors

use std::collections::BTreeMap;

use geocheck_core::{FeatureId, LayerId};
use serde::Serialize;

use super::check_error::VertexLocator;

/// Level of a geometry an edit touched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ChangeWhat {
    Feature,
    Part,
    Ring,
    Node,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ChangeKind {
    Added,
    Removed,
    Changed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Change {
    pub what: ChangeWhat,
    pub kind: ChangeKind,
    pub vidx: VertexLocator,
}

impl Change {
    pub fn new(what: ChangeWhat, kind: ChangeKind, vidx: VertexLocator) -> Self {
        Self { what, kind, vidx }
    }

    /// Whole-feature change
    pub fn feature(kind: ChangeKind) -> Self {
        Self::new(ChangeWhat::Feature, kind, VertexLocator::NONE)
    }
}

/// Changes per layer and feature, in the order they were applied
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Changes(BTreeMap<LayerId, BTreeMap<FeatureId, Vec<Change>>>);

impl Changes {
    pub fn push(&mut self, layer: LayerId, feature: FeatureId, change: Change) {
        self.0
            .entry(layer)
            .or_default()
            .entry(feature)
            .or_default()
            .push(change);
    }

    pub fn for_feature(&self, layer: &LayerId, feature: FeatureId) -> &[Change] {
        self.0
            .get(layer)
            .and_then(|features| features.get(&feature))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Append everything recorded in `other`
    pub fn merge(&mut self, other: Changes) {
        for (layer, features) in other.0 {
            let target = self.0.entry(layer).or_default();
            for (feature, changes) in features {
                target.entry(feature).or_default().extend(changes);
            }
        }
    }

    /// Total number of changes
    pub fn len(&self) -> usize {
        self.0.values().flat_map(|f| f.values()).map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of distinct features touched
    pub fn feature_count(&self) -> usize {
        self.0.values().map(BTreeMap::len).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&LayerId, FeatureId, &Change)> {
        self.0.iter().flat_map(|(layer, features)| {
            features
                .iter()
                .flat_map(move |(fid, changes)| changes.iter().map(move |c| (layer, *fid, c)))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_keeps_order() {
        let layer = LayerId::new("parcels");
        let mut all = Changes::default();
        all.push(layer.clone(), 1, Change::feature(ChangeKind::Changed));

        let mut delta = Changes::default();
        delta.push(layer.clone(), 1, Change::feature(ChangeKind::Removed));
        delta.push(layer.clone(), 2, Change::feature(ChangeKind::Changed));
        all.merge(delta);

        assert_eq!(all.len(), 3);
        assert_eq!(all.feature_count(), 2);
        assert_eq!(
            all.for_feature(&layer, 1)
                .iter()
                .map(|c| c.kind)
                .collect::<Vec<_>>(),
            vec![ChangeKind::Changed, ChangeKind::Removed]
        );
        assert!(all.for_feature(&LayerId::new("other"), 1).is_empty());
        assert_eq!(all.iter().count(), 3);
    }
}
