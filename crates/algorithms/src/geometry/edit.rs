//! In-place geometry edits used by the fix engine
//!
//! Each edit either leaves a valid geometry behind or refuses and leaves the
//! input untouched.

use geo::{Geometry, LineString, MultiLineString, MultiPoint, MultiPolygon, Polygon};

use super::parts::{is_closed, part_count, parts, polyline_size, Part};

/// Whether a vertex can go without degenerating its ring
pub fn can_delete_vertex(geom: &Geometry<f64>, part: usize, ring: usize) -> bool {
    let parts = parts(geom);
    let Some(found) = parts.get(part) else {
        return false;
    };
    let min_size = match found {
        Part::Point(_) => return false,
        Part::Line(_) => 2,
        Part::Polygon(_) => 3,
    };
    found
        .rings()
        .get(ring)
        .is_some_and(|r| polyline_size(r) > min_size)
}

/// Run `f` on the ring at `(part, ring)`; polygon rings are re-closed after
fn with_ring_mut<R>(
    geom: &mut Geometry<f64>,
    part: usize,
    ring: usize,
    f: impl FnOnce(&mut LineString<f64>) -> R,
) -> Option<R> {
    match geom {
        Geometry::LineString(ls) if part == 0 && ring == 0 => Some(f(ls)),
        Geometry::MultiLineString(mls) if ring == 0 => mls.0.get_mut(part).map(f),
        Geometry::Polygon(p) if part == 0 => with_polygon_ring_mut(p, ring, f),
        Geometry::MultiPolygon(mp) => mp
            .0
            .get_mut(part)
            .and_then(|p| with_polygon_ring_mut(p, ring, f)),
        _ => None,
    }
}

fn with_polygon_ring_mut<R>(
    poly: &mut Polygon<f64>,
    ring: usize,
    f: impl FnOnce(&mut LineString<f64>) -> R,
) -> Option<R> {
    let mut result = None;
    if ring == 0 {
        poly.exterior_mut(|exterior| result = Some(f(exterior)));
    } else if ring <= poly.interiors().len() {
        poly.interiors_mut(|interiors| result = Some(f(&mut interiors[ring - 1])));
    }
    result
}

/// Remove the vertex at `(part, ring, vertex)`; a closed ring stays closed
pub fn delete_vertex(geom: &mut Geometry<f64>, part: usize, ring: usize, vertex: usize) -> bool {
    if !can_delete_vertex(geom, part, ring) {
        return false;
    }
    with_ring_mut(geom, part, ring, |line| {
        let closed = is_closed(line);
        if vertex >= polyline_size(line) {
            return false;
        }
        if closed {
            line.0.pop();
            line.0.remove(vertex);
            if let Some(first) = line.0.first().copied() {
                line.0.push(first);
            }
        } else {
            line.0.remove(vertex);
        }
        true
    })
    .unwrap_or(false)
}

/// Remove one part of a multi-part geometry, keeping at least one part.
/// Parts of collections are numbered as [`parts`] flattens them.
pub fn remove_part(geom: &mut Geometry<f64>, part: usize) -> bool {
    fn remove<T>(items: &mut Vec<T>, part: usize) -> bool {
        if items.len() > 1 && part < items.len() {
            items.remove(part);
            true
        } else {
            false
        }
    }
    match geom {
        Geometry::MultiPoint(mp) => remove(&mut mp.0, part),
        Geometry::MultiLineString(mls) => remove(&mut mls.0, part),
        Geometry::MultiPolygon(mp) => remove(&mut mp.0, part),
        Geometry::GeometryCollection(gc) => {
            if gc.0.iter().map(part_count).sum::<usize>() <= 1 {
                return false;
            }
            let mut offset = part;
            for i in 0..gc.0.len() {
                let count = part_count(&gc.0[i]);
                if offset < count {
                    if count == 1 {
                        gc.0.remove(i);
                        return true;
                    }
                    return remove_part(&mut gc.0[i], offset);
                }
                offset -= count;
            }
            false
        }
        _ => false,
    }
}

/// Replace a polygon part, addressing a single polygon as part 0
pub fn replace_polygon_part(geom: &mut Geometry<f64>, part: usize, polygon: Polygon<f64>) -> bool {
    match geom {
        Geometry::Polygon(p) if part == 0 => {
            *p = polygon;
            true
        }
        Geometry::MultiPolygon(mp) => match mp.0.get_mut(part) {
            Some(p) => {
                *p = polygon;
                true
            }
            None => false,
        },
        _ => false,
    }
}

/// The single-part equivalent of a multi-type geometry holding one part
pub fn to_single_part(geom: &Geometry<f64>) -> Option<Geometry<f64>> {
    match geom {
        Geometry::MultiPoint(MultiPoint(points)) if points.len() == 1 => {
            Some(Geometry::Point(points[0]))
        }
        Geometry::MultiLineString(MultiLineString(lines)) if lines.len() == 1 => {
            Some(Geometry::LineString(lines[0].clone()))
        }
        Geometry::MultiPolygon(MultiPolygon(polygons)) if polygons.len() == 1 => {
            Some(Geometry::Polygon(polygons[0].clone()))
        }
        Geometry::GeometryCollection(gc) if gc.0.len() == 1 => Some(gc.0[0].clone()),
        _ => None,
    }
}
