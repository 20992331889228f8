//! Records produced by checks

use std::fmt;

use geo::{Coord, Geometry};
use geocheck_core::{FeatureId, LayerId};
use serde::Serialize;

use super::changes::{Change, ChangeKind, ChangeWhat, Changes};

/// `(part, ring, vertex)` address inside a feature geometry; `-1` marks a
/// level the error does not refer to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct VertexLocator {
    pub part: i32,
    pub ring: i32,
    pub vertex: i32,
}

impl VertexLocator {
    pub const NONE: Self = Self {
        part: -1,
        ring: -1,
        vertex: -1,
    };

    pub fn new(part: i32, ring: i32, vertex: i32) -> Self {
        Self { part, ring, vertex }
    }

    /// Whole-part address
    pub fn part(part: i32) -> Self {
        Self::new(part, -1, -1)
    }

    /// Vertex address from unsigned indices
    pub fn vertex(part: usize, ring: usize, vertex: usize) -> Self {
        Self::new(part as i32, ring as i32, vertex as i32)
    }

    pub fn part_index(&self) -> Option<usize> {
        usize::try_from(self.part).ok()
    }

    pub fn ring_index(&self) -> Option<usize> {
        usize::try_from(self.ring).ok()
    }

    pub fn vertex_index(&self) -> Option<usize> {
        usize::try_from(self.vertex).ok()
    }
}

impl Default for VertexLocator {
    fn default() -> Self {
        Self::NONE
    }
}

impl fmt::Display for VertexLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.part, self.ring, self.vertex)
    }
}

/// Value attached to an error
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ErrorValue {
    None,
    Number(f64),
    Text(String),
    /// Another feature involved in the error
    Feature { layer: LayerId, feature: FeatureId },
}

impl fmt::Display for ErrorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorValue::None => Ok(()),
            ErrorValue::Number(v) => write!(f, "{}", v),
            ErrorValue::Text(s) => f.write_str(s),
            ErrorValue::Feature { layer, feature } => write!(f, "{}:{}", layer, feature),
        }
    }
}

/// One detected problem. Never modified once produced; the fix engine
/// derives re-addressed copies with [`CheckError::rebased`].
#[derive(Debug, Clone, PartialEq)]
pub struct CheckError {
    check: &'static str,
    layer_id: LayerId,
    feature_id: FeatureId,
    vidx: VertexLocator,
    location: Coord<f64>,
    geometry: Option<Geometry<f64>>,
    value: ErrorValue,
    message: String,
}

impl CheckError {
    pub fn new(check: &'static str, layer_id: LayerId, feature_id: FeatureId, location: Coord<f64>) -> Self {
        Self {
            check,
            layer_id,
            feature_id,
            vidx: VertexLocator::NONE,
            location,
            geometry: None,
            value: ErrorValue::None,
            message: String::new(),
        }
    }

    pub fn with_vidx(mut self, vidx: VertexLocator) -> Self {
        self.vidx = vidx;
        self
    }

    pub fn with_geometry(mut self, geometry: Geometry<f64>) -> Self {
        self.geometry = Some(geometry);
        self
    }

    pub fn with_value(mut self, value: ErrorValue) -> Self {
        self.value = value;
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Id of the check that produced the error
    pub fn check(&self) -> &'static str {
        self.check
    }

    pub fn layer_id(&self) -> &LayerId {
        &self.layer_id
    }

    pub fn feature_id(&self) -> FeatureId {
        self.feature_id
    }

    pub fn vidx(&self) -> VertexLocator {
        self.vidx
    }

    pub fn location(&self) -> Coord<f64> {
        self.location
    }

    /// Offending geometry, when the error is about more than a point
    pub fn geometry(&self) -> Option<&Geometry<f64>> {
        self.geometry.as_ref()
    }

    pub fn value(&self) -> &ErrorValue {
        &self.value
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Same error re-addressed after `changes`, or `None` once its target
    /// is gone
    pub fn rebased(&self, changes: &Changes) -> Option<CheckError> {
        let mut vidx = self.vidx;
        for change in changes.for_feature(&self.layer_id, self.feature_id) {
            vidx = rebase_locator(vidx, change)?;
        }
        Some(Self { vidx, ..self.clone() })
    }
}

fn rebase_locator(mut vidx: VertexLocator, change: &Change) -> Option<VertexLocator> {
    let at = change.vidx;
    match (change.what, change.kind) {
        (ChangeWhat::Feature, ChangeKind::Removed) => return None,
        (ChangeWhat::Feature, _) => {}
        (ChangeWhat::Part, kind) => {
            if vidx.part < 0 {
                return Some(vidx);
            }
            match kind {
                ChangeKind::Removed if vidx.part == at.part => return None,
                ChangeKind::Removed if vidx.part > at.part => vidx.part -= 1,
                ChangeKind::Added if vidx.part >= at.part => vidx.part += 1,
                _ => {}
            }
        }
        (ChangeWhat::Ring, kind) => {
            if vidx.part != at.part || vidx.ring < 0 {
                return Some(vidx);
            }
            match kind {
                ChangeKind::Removed if vidx.ring == at.ring => return None,
                ChangeKind::Removed if vidx.ring > at.ring => vidx.ring -= 1,
                ChangeKind::Added if vidx.ring >= at.ring => vidx.ring += 1,
                _ => {}
            }
        }
        (ChangeWhat::Node, kind) => {
            if vidx.part != at.part || vidx.ring != at.ring || vidx.vertex < 0 {
                return Some(vidx);
            }
            match kind {
                ChangeKind::Removed if vidx.vertex == at.vertex => return None,
                ChangeKind::Removed if vidx.vertex > at.vertex => vidx.vertex -= 1,
                ChangeKind::Added if vidx.vertex >= at.vertex => vidx.vertex += 1,
                _ => {}
            }
        }
    }
    Some(vidx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::coord;

    fn node_error(vertex: i32) -> CheckError {
        CheckError::new("angle", LayerId::new("lines"), 4, coord! { x: 0.0, y: 0.0 })
            .with_vidx(VertexLocator::new(0, 0, vertex))
    }

    #[test]
    fn test_value_display() {
        assert_eq!(ErrorValue::None.to_string(), "");
        assert_eq!(ErrorValue::Number(0.5).to_string(), "0.5");
        let feature = ErrorValue::Feature {
            layer: LayerId::new("parcels"),
            feature: 12,
        };
        assert_eq!(feature.to_string(), "parcels:12");
    }

    #[test]
    fn test_node_removal_shifts_later_vertices() {
        let mut changes = Changes::default();
        changes.push(
            LayerId::new("lines"),
            4,
            Change::new(ChangeWhat::Node, ChangeKind::Removed, VertexLocator::new(0, 0, 2)),
        );

        assert_eq!(node_error(1).rebased(&changes).unwrap().vidx().vertex, 1);
        assert!(node_error(2).rebased(&changes).is_none());
        assert_eq!(node_error(5).rebased(&changes).unwrap().vidx().vertex, 4);
    }

    #[test]
    fn test_changes_on_other_features_are_ignored() {
        let mut changes = Changes::default();
        changes.push(LayerId::new("lines"), 5, Change::feature(ChangeKind::Removed));
        changes.push(LayerId::new("other"), 4, Change::feature(ChangeKind::Removed));
        assert_eq!(node_error(3).rebased(&changes), Some(node_error(3)));
    }

    #[test]
    fn test_feature_removal_makes_error_obsolete() {
        let mut changes = Changes::default();
        changes.push(LayerId::new("lines"), 4, Change::feature(ChangeKind::Removed));
        assert!(node_error(0).rebased(&changes).is_none());
    }

    #[test]
    fn test_part_removal() {
        let error = CheckError::new("area", LayerId::new("parcels"), 1, coord! { x: 0.0, y: 0.0 })
            .with_vidx(VertexLocator::part(3));
        let mut changes = Changes::default();
        changes.push(
            LayerId::new("parcels"),
            1,
            Change::new(ChangeWhat::Part, ChangeKind::Removed, VertexLocator::part(1)),
        );
        assert_eq!(error.rebased(&changes).unwrap().vidx(), VertexLocator::part(2));
    }
}
