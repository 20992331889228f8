//! Vector data structures: features, fields and in-memory layers

use geo_types::Geometry;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::crs::CRS;
use crate::error::{Error, Result};

/// Feature identifier, unique within a layer
pub type FeatureId = i64;

/// Strongly typed layer identifier
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayerId(String);

impl LayerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LayerId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Broad geometry family of a layer or a geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GeometryType {
    Point,
    Line,
    Polygon,
    Unknown,
}

impl GeometryType {
    /// Geometry family of a concrete geometry
    pub fn of(geometry: &Geometry<f64>) -> Self {
        match geometry {
            Geometry::Point(_) | Geometry::MultiPoint(_) => Self::Point,
            Geometry::Line(_) | Geometry::LineString(_) | Geometry::MultiLineString(_) => {
                Self::Line
            }
            Geometry::Polygon(_)
            | Geometry::MultiPolygon(_)
            | Geometry::Rect(_)
            | Geometry::Triangle(_) => Self::Polygon,
            Geometry::GeometryCollection(_) => Self::Unknown,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Point => "Point",
            Self::Line => "Line",
            Self::Polygon => "Polygon",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for GeometryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Whether the geometry is stored as a multi-type, regardless of its part count
pub fn is_multi_type(geometry: &Geometry<f64>) -> bool {
    matches!(
        geometry,
        Geometry::MultiPoint(_)
            | Geometry::MultiLineString(_)
            | Geometry::MultiPolygon(_)
            | Geometry::GeometryCollection(_)
    )
}

/// Attribute value types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl AttributeValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(i) => write!(f, "{}", i),
            Self::Float(v) => write!(f, "{}", v),
            Self::String(s) => f.write_str(s),
        }
    }
}

impl From<i64> for AttributeValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for AttributeValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for AttributeValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

/// Storage type of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldKind {
    String,
    Int,
    Double,
    Bool,
}

/// A named, typed attribute column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub kind: FieldKind,
}

impl Field {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Ordered attribute schema
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Fields(Vec<Field>);

impl Fields {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn append(&mut self, field: Field) {
        self.0.push(field);
    }

    /// Position of a field by name
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.0.iter().position(|f| f.name == name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Field> {
        self.0.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.0.iter().map(|f| f.name.as_str()).collect()
    }
}

impl FromIterator<Field> for Fields {
    fn from_iter<I: IntoIterator<Item = Field>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A geographic feature with geometry and attributes
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    /// Feature ID, unique within its layer
    pub id: FeatureId,
    /// Feature geometry
    pub geometry: Option<Geometry<f64>>,
    /// Attribute values, aligned with the owning layer's fields
    pub attributes: Vec<AttributeValue>,
}

impl Feature {
    /// Create a new feature with geometry
    pub fn new(id: FeatureId, geometry: Geometry<f64>) -> Self {
        Self {
            id,
            geometry: Some(geometry),
            attributes: Vec::new(),
        }
    }

    /// Create a feature with no geometry
    pub fn empty(id: FeatureId) -> Self {
        Self {
            id,
            geometry: None,
            attributes: Vec::new(),
        }
    }

    pub fn with_attributes(mut self, attributes: Vec<AttributeValue>) -> Self {
        self.attributes = attributes;
        self
    }

    /// Get an attribute by position
    pub fn attribute(&self, index: usize) -> Option<&AttributeValue> {
        self.attributes.get(index)
    }
}

/// An in-memory vector layer.
///
/// Features are kept ordered by id, which gives every consumer the same,
/// stable visiting order.
#[derive(Debug, Clone)]
pub struct Layer {
    id: LayerId,
    name: String,
    crs: CRS,
    geometry_type: GeometryType,
    fields: Fields,
    features: BTreeMap<FeatureId, Feature>,
    selection: BTreeSet<FeatureId>,
}

impl Layer {
    pub fn new(id: impl Into<LayerId>, name: impl Into<String>, geometry_type: GeometryType) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            crs: CRS::default(),
            geometry_type,
            fields: Fields::new(),
            features: BTreeMap::new(),
            selection: BTreeSet::new(),
        }
    }

    pub fn with_crs(mut self, crs: CRS) -> Self {
        self.crs = crs;
        self
    }

    pub fn with_fields(mut self, fields: Fields) -> Self {
        self.fields = fields;
        self
    }

    pub fn id(&self) -> &LayerId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn crs(&self) -> &CRS {
        &self.crs
    }

    pub fn geometry_type(&self) -> GeometryType {
        self.geometry_type
    }

    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    /// Add a feature, rejecting ids already present
    pub fn add_feature(&mut self, feature: Feature) -> Result<()> {
        if self.features.contains_key(&feature.id) {
            return Err(Error::DuplicateFeatureId {
                layer: self.id.to_string(),
                id: feature.id,
            });
        }
        self.features.insert(feature.id, feature);
        Ok(())
    }

    /// Add a geometry under the next free id and return that id
    pub fn push_geometry(&mut self, geometry: Geometry<f64>) -> FeatureId {
        let id = self.next_id();
        self.features.insert(id, Feature::new(id, geometry));
        id
    }

    pub fn next_id(&self) -> FeatureId {
        self.features.keys().next_back().map_or(1, |last| last + 1)
    }

    pub fn feature(&self, id: FeatureId) -> Option<&Feature> {
        self.features.get(&id)
    }

    /// Replace an existing feature
    pub fn update_feature(&mut self, feature: Feature) -> Result<()> {
        match self.features.get_mut(&feature.id) {
            Some(slot) => {
                *slot = feature;
                Ok(())
            }
            None => Err(Error::FeatureNotFound {
                layer: self.id.to_string(),
                id: feature.id,
            }),
        }
    }

    pub fn remove_feature(&mut self, id: FeatureId) -> Option<Feature> {
        self.selection.remove(&id);
        self.features.remove(&id)
    }

    pub fn features(&self) -> impl Iterator<Item = &Feature> {
        self.features.values()
    }

    pub fn feature_ids(&self) -> impl Iterator<Item = FeatureId> + '_ {
        self.features.keys().copied()
    }

    pub fn feature_count(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Replace the selection; unknown ids are ignored
    pub fn select(&mut self, ids: impl IntoIterator<Item = FeatureId>) {
        self.selection = ids
            .into_iter()
            .filter(|id| self.features.contains_key(id))
            .collect();
    }

    pub fn selected_ids(&self) -> &BTreeSet<FeatureId> {
        &self.selection
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::{line_string, point, polygon, MultiLineString};

    #[test]
    fn test_geometry_type_of() {
        assert_eq!(GeometryType::of(&Geometry::Point(point!(x: 1.0, y: 2.0))), GeometryType::Point);
        let mls = MultiLineString::new(vec![line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0)]]);
        assert_eq!(GeometryType::of(&Geometry::MultiLineString(mls.clone())), GeometryType::Line);
        assert!(is_multi_type(&Geometry::MultiLineString(mls)));
        let poly = polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0)];
        assert_eq!(GeometryType::of(&Geometry::Polygon(poly.clone())), GeometryType::Polygon);
        assert!(!is_multi_type(&Geometry::Polygon(poly)));
    }

    #[test]
    fn test_layer_ids_and_order() {
        let mut layer = Layer::new("roads", "Roads", GeometryType::Line);
        let a = layer.push_geometry(Geometry::Point(point!(x: 0.0, y: 0.0)));
        layer.add_feature(Feature::empty(10)).unwrap();
        let b = layer.push_geometry(Geometry::Point(point!(x: 1.0, y: 1.0)));

        assert_eq!(a, 1);
        assert_eq!(b, 11);
        assert_eq!(layer.feature_ids().collect::<Vec<_>>(), vec![1, 10, 11]);
        assert!(layer.add_feature(Feature::empty(10)).is_err());
    }

    #[test]
    fn test_layer_selection_and_removal() {
        let mut layer = Layer::new("l", "l", GeometryType::Point);
        for _ in 0..3 {
            layer.push_geometry(Geometry::Point(point!(x: 0.0, y: 0.0)));
        }
        layer.select([2, 3, 42]);
        assert_eq!(layer.selected_ids().len(), 2);

        assert!(layer.remove_feature(3).is_some());
        assert_eq!(layer.selected_ids().iter().copied().collect::<Vec<_>>(), vec![2]);
        assert!(layer.update_feature(Feature::empty(3)).is_err());
    }

    #[test]
    fn test_fields() {
        let fields: Fields = vec![
            Field::new("name", FieldKind::String),
            Field::new("lanes", FieldKind::Int),
        ]
        .into_iter()
        .collect();
        assert_eq!(fields.index_of("lanes"), Some(1));
        assert_eq!(fields.names(), vec!["name", "lanes"]);
    }

    #[test]
    fn test_attribute_display() {
        assert_eq!(AttributeValue::from(0.5).to_string(), "0.5");
        assert_eq!(AttributeValue::from("x").to_string(), "x");
        assert_eq!(AttributeValue::Null.to_string(), "");
    }
}
