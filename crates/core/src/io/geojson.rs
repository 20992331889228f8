//! GeoJSON reading and writing
//!
//! Lightweight serde models covering what the checker needs: feature
//! collections with numeric or absent ids, flat properties and the legacy
//! named `crs` member. Coordinates beyond x/y are dropped on read.

use geo_types::{
    Coord, Geometry, GeometryCollection, LineString, MultiLineString, MultiPoint, MultiPolygon,
    Point, Polygon,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::path::Path;

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::vector::{
    AttributeValue, Feature, FeatureId, Field, FieldKind, Fields, GeometryType, Layer, LayerId,
};

type Position = Vec<f64>;

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub(crate) enum GeometryDoc {
    Point { coordinates: Position },
    MultiPoint { coordinates: Vec<Position> },
    LineString { coordinates: Vec<Position> },
    MultiLineString { coordinates: Vec<Vec<Position>> },
    Polygon { coordinates: Vec<Vec<Position>> },
    MultiPolygon { coordinates: Vec<Vec<Vec<Position>>> },
    GeometryCollection { geometries: Vec<GeometryDoc> },
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct CrsDoc {
    #[serde(rename = "type")]
    kind: String,
    properties: CrsProperties,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct CrsProperties {
    name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct FeatureDoc {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<Value>,
    geometry: Option<GeometryDoc>,
    #[serde(default)]
    properties: Option<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
struct FeatureCollectionDoc {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    crs: Option<CrsDoc>,
    features: Vec<FeatureDoc>,
}

// ---------------------------------------------------------------------------
// geometry conversion
// ---------------------------------------------------------------------------

fn to_coord(pos: &[f64]) -> Result<Coord<f64>> {
    match pos {
        [x, y, ..] => Ok(Coord { x: *x, y: *y }),
        _ => Err(Error::InvalidGeoJson(format!(
            "position needs at least two numbers, got {}",
            pos.len()
        ))),
    }
}

fn to_line_string(positions: &[Position]) -> Result<LineString<f64>> {
    positions
        .iter()
        .map(|p| to_coord(p))
        .collect::<Result<Vec<_>>>()
        .map(LineString::new)
}

fn to_polygon(rings: &[Vec<Position>]) -> Result<Polygon<f64>> {
    let mut rings = rings.iter().map(|r| to_line_string(r));
    let exterior = match rings.next() {
        Some(ring) => ring?,
        None => LineString::new(Vec::new()),
    };
    let interiors = rings.collect::<Result<Vec<_>>>()?;
    Ok(Polygon::new(exterior, interiors))
}

impl GeometryDoc {
    pub(crate) fn to_geometry(&self) -> Result<Geometry<f64>> {
        Ok(match self {
            Self::Point { coordinates } => Geometry::Point(Point(to_coord(coordinates)?)),
            Self::MultiPoint { coordinates } => Geometry::MultiPoint(MultiPoint::new(
                coordinates
                    .iter()
                    .map(|p| to_coord(p).map(Point))
                    .collect::<Result<Vec<_>>>()?,
            )),
            Self::LineString { coordinates } => Geometry::LineString(to_line_string(coordinates)?),
            Self::MultiLineString { coordinates } => Geometry::MultiLineString(MultiLineString::new(
                coordinates
                    .iter()
                    .map(|l| to_line_string(l))
                    .collect::<Result<Vec<_>>>()?,
            )),
            Self::Polygon { coordinates } => Geometry::Polygon(to_polygon(coordinates)?),
            Self::MultiPolygon { coordinates } => Geometry::MultiPolygon(MultiPolygon::new(
                coordinates
                    .iter()
                    .map(|p| to_polygon(p))
                    .collect::<Result<Vec<_>>>()?,
            )),
            Self::GeometryCollection { geometries } => {
                Geometry::GeometryCollection(GeometryCollection::new_from(
                    geometries
                        .iter()
                        .map(GeometryDoc::to_geometry)
                        .collect::<Result<Vec<_>>>()?,
                ))
            }
        })
    }

    pub(crate) fn from_geometry(geometry: &Geometry<f64>) -> Self {
        fn pos(c: &Coord<f64>) -> Position {
            vec![c.x, c.y]
        }
        fn line(ls: &LineString<f64>) -> Vec<Position> {
            ls.0.iter().map(pos).collect()
        }
        fn poly(p: &Polygon<f64>) -> Vec<Vec<Position>> {
            std::iter::once(p.exterior())
                .chain(p.interiors())
                .map(line)
                .collect()
        }

        match geometry {
            Geometry::Point(p) => Self::Point { coordinates: pos(&p.0) },
            Geometry::MultiPoint(mp) => Self::MultiPoint {
                coordinates: mp.0.iter().map(|p| pos(&p.0)).collect(),
            },
            Geometry::Line(l) => Self::LineString {
                coordinates: vec![pos(&l.start), pos(&l.end)],
            },
            Geometry::LineString(ls) => Self::LineString { coordinates: line(ls) },
            Geometry::MultiLineString(mls) => Self::MultiLineString {
                coordinates: mls.0.iter().map(line).collect(),
            },
            Geometry::Polygon(p) => Self::Polygon { coordinates: poly(p) },
            Geometry::MultiPolygon(mp) => Self::MultiPolygon {
                coordinates: mp.0.iter().map(poly).collect(),
            },
            Geometry::Rect(r) => Self::Polygon {
                coordinates: poly(&r.to_polygon()),
            },
            Geometry::Triangle(t) => Self::Polygon {
                coordinates: poly(&t.to_polygon()),
            },
            Geometry::GeometryCollection(gc) => Self::GeometryCollection {
                geometries: gc.0.iter().map(Self::from_geometry).collect(),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// attributes
// ---------------------------------------------------------------------------

fn json_to_attribute(value: &Value) -> AttributeValue {
    match value {
        Value::Null => AttributeValue::Null,
        Value::Bool(b) => AttributeValue::Bool(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => AttributeValue::Int(i),
            None => AttributeValue::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        Value::String(s) => AttributeValue::String(s.clone()),
        other => AttributeValue::String(other.to_string()),
    }
}

fn attribute_to_json(value: &AttributeValue) -> Value {
    match value {
        AttributeValue::Null => Value::Null,
        AttributeValue::Bool(b) => Value::Bool(*b),
        AttributeValue::Int(i) => Value::from(*i),
        AttributeValue::Float(f) => serde_json::Number::from_f64(*f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        AttributeValue::String(s) => Value::String(s.clone()),
    }
}

fn field_kind(value: &AttributeValue) -> Option<FieldKind> {
    match value {
        AttributeValue::Null => None,
        AttributeValue::Bool(_) => Some(FieldKind::Bool),
        AttributeValue::Int(_) => Some(FieldKind::Int),
        AttributeValue::Float(_) => Some(FieldKind::Double),
        AttributeValue::String(_) => Some(FieldKind::String),
    }
}

/// Serialise one feature against a schema
pub(crate) fn feature_doc(feature: &Feature, fields: &Fields, id: FeatureId) -> FeatureDoc {
    let properties = fields
        .iter()
        .enumerate()
        .map(|(i, field)| {
            let value = feature
                .attribute(i)
                .map(attribute_to_json)
                .unwrap_or(Value::Null);
            (field.name.clone(), value)
        })
        .collect();
    FeatureDoc {
        kind: "Feature".to_string(),
        id: Some(Value::from(id)),
        geometry: feature.geometry.as_ref().map(GeometryDoc::from_geometry),
        properties: Some(properties),
    }
}

pub(crate) fn crs_doc(crs: &CRS) -> Option<CrsDoc> {
    crs.epsg().filter(|code| *code != 4326).map(|code| CrsDoc {
        kind: "name".to_string(),
        properties: CrsProperties {
            name: format!("urn:ogc:def:crs:EPSG::{}", code),
        },
    })
}

// ---------------------------------------------------------------------------
// public API
// ---------------------------------------------------------------------------

/// Parse a GeoJSON FeatureCollection into a layer.
///
/// Numeric feature ids are kept; features without one get the next free id.
/// Fields are the union of all property keys, their kind comes from the
/// first non-null value. The layer geometry type is the family of the first
/// feature with a geometry. An explicit `name` wins over the document's
/// `name` member; without either the layer is named after its id.
pub fn read_geojson_str(text: &str, id: impl Into<LayerId>, name: Option<&str>) -> Result<Layer> {
    let id = id.into();
    let doc: FeatureCollectionDoc = serde_json::from_str(text)?;
    if doc.kind != "FeatureCollection" {
        return Err(Error::InvalidGeoJson(format!(
            "expected a FeatureCollection, got {}",
            doc.kind
        )));
    }

    let mut columns: Vec<(String, Option<FieldKind>)> = Vec::new();
    for feature in &doc.features {
        for (key, value) in feature.properties.iter().flatten() {
            let kind = field_kind(&json_to_attribute(value));
            match columns.iter_mut().find(|(name, _)| name == key) {
                Some((_, slot)) => {
                    if slot.is_none() {
                        *slot = kind;
                    }
                }
                None => columns.push((key.clone(), kind)),
            }
        }
    }
    let fields: Fields = columns
        .into_iter()
        .map(|(name, kind)| Field::new(name, kind.unwrap_or(FieldKind::String)))
        .collect();

    let mut geometries = Vec::with_capacity(doc.features.len());
    let mut taken: BTreeSet<FeatureId> = BTreeSet::new();
    for feature in &doc.features {
        if feature.kind != "Feature" {
            return Err(Error::InvalidGeoJson(format!("expected a Feature, got {}", feature.kind)));
        }
        let geometry = feature.geometry.as_ref().map(GeometryDoc::to_geometry).transpose()?;
        let id = feature.id.as_ref().and_then(Value::as_i64);
        if let Some(id) = id {
            taken.insert(id);
        }
        let attributes = fields
            .iter()
            .map(|field| {
                feature
                    .properties
                    .as_ref()
                    .and_then(|props| props.get(&field.name))
                    .map(json_to_attribute)
                    .unwrap_or(AttributeValue::Null)
            })
            .collect::<Vec<_>>();
        geometries.push((id, geometry, attributes));
    }

    let geometry_type = geometries
        .iter()
        .find_map(|(_, g, _)| g.as_ref().map(GeometryType::of))
        .unwrap_or(GeometryType::Unknown);
    let crs = doc
        .crs
        .as_ref()
        .map(|c| CRS::from_authid(&c.properties.name))
        .unwrap_or_default();
    let name = name
        .or(doc.name.as_deref())
        .map(str::to_string)
        .unwrap_or_else(|| id.to_string());

    let mut layer = Layer::new(id, name, geometry_type)
        .with_crs(crs)
        .with_fields(fields);
    let mut next = taken.iter().next_back().map_or(1, |last| last + 1);
    for (id, geometry, attributes) in geometries {
        let id = id.unwrap_or_else(|| {
            let id = next;
            next += 1;
            id
        });
        layer.add_feature(Feature {
            id,
            geometry,
            attributes,
        })?;
    }

    tracing::debug!(
        layer = %layer.id(),
        features = layer.feature_count(),
        geometry_type = %layer.geometry_type(),
        "read GeoJSON layer"
    );
    Ok(layer)
}

/// Read a GeoJSON file. The layer id is the file stem, the name comes from
/// the document or else the stem.
pub fn read_geojson<P: AsRef<Path>>(path: P) -> Result<Layer> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)?;
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "layer".to_string());
    read_geojson_str(&text, stem.as_str(), None)
}

/// Serialise a whole layer as a GeoJSON FeatureCollection string
pub fn layer_to_geojson_string(layer: &Layer) -> Result<String> {
    let mut root = Map::new();
    root.insert("type".into(), Value::from("FeatureCollection"));
    root.insert("name".into(), Value::from(layer.name()));
    if let Some(crs) = crs_doc(layer.crs()) {
        root.insert("crs".into(), serde_json::to_value(crs)?);
    }
    let features = layer
        .features()
        .map(|f| serde_json::to_value(feature_doc(f, layer.fields(), f.id)))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    root.insert("features".into(), Value::Array(features));
    Ok(serde_json::to_string(&Value::Object(root))?)
}

/// Write a whole layer to a GeoJSON file
pub fn write_geojson<P: AsRef<Path>>(layer: &Layer, path: P) -> Result<()> {
    let text = layer_to_geojson_string(layer)?;
    let mut file = fs::File::create(path)?;
    file.write_all(text.as_bytes())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "type": "FeatureCollection",
        "name": "roads",
        "crs": { "type": "name", "properties": { "name": "urn:ogc:def:crs:EPSG::2056" } },
        "features": [
            { "type": "Feature", "id": 7, "properties": { "kind": "main", "lanes": 2 },
              "geometry": { "type": "LineString", "coordinates": [[0, 0, 12.5], [1, 0]] } },
            { "type": "Feature", "properties": { "lanes": null, "width": 3.5 },
              "geometry": { "type": "MultiLineString", "coordinates": [[[2, 0], [3, 0]]] } },
            { "type": "Feature", "properties": {}, "geometry": null }
        ]
    }"#;

    #[test]
    fn test_read_collection() {
        let layer = read_geojson_str(SAMPLE, "roads_1", None).unwrap();
        assert_eq!(layer.name(), "roads");
        assert_eq!(layer.crs().epsg(), Some(2056));
        assert_eq!(layer.geometry_type(), GeometryType::Line);
        assert_eq!(layer.fields().names(), vec!["kind", "lanes", "width"]);
        assert_eq!(layer.feature_ids().collect::<Vec<_>>(), vec![7, 8, 9]);

        let second = layer.feature(8).unwrap();
        assert_eq!(second.attributes[1], AttributeValue::Null);
        assert_eq!(second.attributes[2], AttributeValue::Float(3.5));
        assert!(layer.feature(9).unwrap().geometry.is_none());
    }

    #[test]
    fn test_explicit_name_wins() {
        let layer = read_geojson_str(SAMPLE, "roads_1", Some("Main roads")).unwrap();
        assert_eq!(layer.name(), "Main roads");

        let unnamed = r#"{"type":"FeatureCollection","features":[]}"#;
        assert_eq!(read_geojson_str(unnamed, "roads_1", None).unwrap().name(), "roads_1");
    }

    #[test]
    fn test_rejects_bad_positions() {
        let text = r#"{"type":"FeatureCollection","features":[
            {"type":"Feature","properties":{},"geometry":{"type":"Point","coordinates":[1]}}]}"#;
        assert!(matches!(
            read_geojson_str(text, "p", None),
            Err(Error::InvalidGeoJson(_))
        ));
    }

    #[test]
    fn test_rejects_non_collection() {
        let text = r#"{"type":"Topology","features":[]}"#;
        assert!(read_geojson_str(text, "t", None).is_err());
    }

    #[test]
    fn test_file_roundtrip() {
        let layer = read_geojson_str(SAMPLE, "roads_1", None).unwrap();
        let tmp = tempfile::NamedTempFile::with_suffix(".geojson").unwrap();
        write_geojson(&layer, tmp.path()).unwrap();

        let reloaded = read_geojson(tmp.path()).unwrap();
        assert_eq!(reloaded.feature_count(), 3);
        assert_eq!(reloaded.crs().epsg(), Some(2056));
        assert_eq!(reloaded.feature(7).unwrap().geometry, layer.feature(7).unwrap().geometry);
        assert_eq!(reloaded.fields().names(), layer.fields().names());
    }
}
