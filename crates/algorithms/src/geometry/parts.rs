//! Part / ring / vertex addressing
//!
//! Parts are numbered in storage order. Within a polygon part ring 0 is the
//! exterior ring and interiors follow; a line part has the single ring 0.
//! A closed ring's repeated closing coordinate is never addressed on its own.

use std::borrow::Cow;

use geo::{Centroid, Coord, Geometry, LineString, Polygon};

/// One part of a (possibly multi-part) geometry
#[derive(Debug, Clone, PartialEq)]
pub enum Part<'a> {
    Point(Coord<f64>),
    Line(Cow<'a, LineString<f64>>),
    Polygon(Cow<'a, Polygon<f64>>),
}

impl Part<'_> {
    /// Rings of the part: the line itself, or exterior then interiors
    pub fn rings(&self) -> Vec<&LineString<f64>> {
        match self {
            Part::Point(_) => Vec::new(),
            Part::Line(line) => vec![line.as_ref()],
            Part::Polygon(poly) => std::iter::once(poly.exterior())
                .chain(poly.interiors().iter())
                .collect(),
        }
    }

    pub fn as_polygon(&self) -> Option<&Polygon<f64>> {
        match self {
            Part::Polygon(poly) => Some(poly.as_ref()),
            _ => None,
        }
    }

    pub fn as_line(&self) -> Option<&LineString<f64>> {
        match self {
            Part::Line(line) => Some(line.as_ref()),
            _ => None,
        }
    }

    /// The part as a standalone geometry
    pub fn to_geometry(&self) -> Geometry<f64> {
        match self {
            Part::Point(c) => Geometry::Point((*c).into()),
            Part::Line(line) => Geometry::LineString(line.as_ref().clone()),
            Part::Polygon(poly) => Geometry::Polygon(poly.as_ref().clone()),
        }
    }
}

/// Split a geometry into its parts, flattening collections
pub fn parts(geom: &Geometry<f64>) -> Vec<Part<'_>> {
    let mut out = Vec::new();
    collect_parts(geom, &mut out);
    out
}

fn collect_parts<'a>(geom: &'a Geometry<f64>, out: &mut Vec<Part<'a>>) {
    match geom {
        Geometry::Point(p) => out.push(Part::Point(p.0)),
        Geometry::MultiPoint(mp) => out.extend(mp.0.iter().map(|p| Part::Point(p.0))),
        Geometry::Line(l) => out.push(Part::Line(Cow::Owned(LineString::new(vec![l.start, l.end])))),
        Geometry::LineString(ls) => out.push(Part::Line(Cow::Borrowed(ls))),
        Geometry::MultiLineString(mls) => out.extend(mls.0.iter().map(|ls| Part::Line(Cow::Borrowed(ls)))),
        Geometry::Polygon(p) => out.push(Part::Polygon(Cow::Borrowed(p))),
        Geometry::MultiPolygon(mp) => out.extend(mp.0.iter().map(|p| Part::Polygon(Cow::Borrowed(p)))),
        Geometry::Rect(r) => out.push(Part::Polygon(Cow::Owned(r.to_polygon()))),
        Geometry::Triangle(t) => out.push(Part::Polygon(Cow::Owned(t.to_polygon()))),
        Geometry::GeometryCollection(gc) => {
            for g in &gc.0 {
                collect_parts(g, out);
            }
        }
    }
}

pub fn part_count(geom: &Geometry<f64>) -> usize {
    parts(geom).len()
}

/// Whether a ring's last coordinate repeats its first
pub fn is_closed(ring: &LineString<f64>) -> bool {
    ring.0.len() > 1 && ring.0.first() == ring.0.last()
}

/// Number of addressable vertices: the closing coordinate is not counted
pub fn polyline_size(ring: &LineString<f64>) -> usize {
    let n = ring.0.len();
    if is_closed(ring) {
        n - 1
    } else {
        n
    }
}

/// Coordinate at `(part, ring, vertex)`
pub fn vertex_at(geom: &Geometry<f64>, part: usize, ring: usize, vertex: usize) -> Option<Coord<f64>> {
    let parts = parts(geom);
    match parts.get(part)? {
        Part::Point(c) if ring == 0 && vertex == 0 => Some(*c),
        Part::Point(_) => None,
        other => {
            let rings = other.rings();
            let ring = rings.get(ring)?;
            if vertex < polyline_size(ring) {
                ring.0.get(vertex).copied()
            } else {
                None
            }
        }
    }
}

pub fn first_vertex(geom: &Geometry<f64>) -> Option<Coord<f64>> {
    parts(geom).into_iter().find_map(|part| match part {
        Part::Point(c) => Some(c),
        other => other.rings().first().and_then(|ring| ring.0.first().copied()),
    })
}

/// Centroid of a geometry, falling back to its first vertex
pub fn representative_point(geom: &Geometry<f64>) -> Option<Coord<f64>> {
    geom.centroid()
        .map(|p| p.0)
        .filter(|c| c.x.is_finite() && c.y.is_finite())
        .or_else(|| first_vertex(geom))
}

/// Why a geometry cannot be examined, if it cannot
pub fn invalid_reason(geom: &Geometry<f64>) -> Option<String> {
    let parts = parts(geom);
    if parts.is_empty() {
        return Some("empty geometry".to_string());
    }
    for (ipart, part) in parts.iter().enumerate() {
        if let Part::Point(c) = part {
            if !(c.x.is_finite() && c.y.is_finite()) {
                return Some(format!("non-finite coordinate in part {}", ipart));
            }
            continue;
        }
        let min_coords = if matches!(part, Part::Polygon(_)) { 4 } else { 2 };
        for (iring, ring) in part.rings().into_iter().enumerate() {
            if ring.0.len() < min_coords {
                return Some(format!(
                    "ring {} of part {} has {} coordinates",
                    iring,
                    ipart,
                    ring.0.len()
                ));
            }
            if ring.0.iter().any(|c| !(c.x.is_finite() && c.y.is_finite())) {
                return Some(format!("non-finite coordinate in part {}", ipart));
            }
        }
    }
    None
}
