//! Tolerance-aware spatial predicates
//!
//! Every comparison takes the run's epsilon: two coordinates closer than
//! that are the same coordinate, a point within it of a boundary lies on it.

use geo::algorithm::line_intersection::{line_intersection, LineIntersection};
use geo::{Contains, Coord, Geometry, Line, LineString, Polygon};

use super::envelope::Envelope;
use super::parts::{parts, Part};

/// Where two linear elements meet
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Intersection {
    Point(Coord<f64>),
    /// Collinear overlap between two coordinates
    Overlap(Coord<f64>, Coord<f64>),
}

impl Intersection {
    /// Point used to locate the intersection
    pub fn location(&self) -> Coord<f64> {
        match self {
            Intersection::Point(c) => *c,
            Intersection::Overlap(a, b) => Coord {
                x: (a.x + b.x) / 2.0,
                y: (a.y + b.y) / 2.0,
            },
        }
    }

    pub fn to_geometry(&self) -> Geometry<f64> {
        match self {
            Intersection::Point(c) => Geometry::Point((*c).into()),
            Intersection::Overlap(a, b) => Geometry::LineString(LineString::new(vec![*a, *b])),
        }
    }
}

pub fn distance(a: Coord<f64>, b: Coord<f64>) -> f64 {
    (a.x - b.x).hypot(a.y - b.y)
}

pub fn coords_equal(a: Coord<f64>, b: Coord<f64>, eps: f64) -> bool {
    distance(a, b) <= eps
}

/// Position of `p` projected on the segment, as a fraction of its length
fn segment_param(p: Coord<f64>, a: Coord<f64>, b: Coord<f64>) -> f64 {
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let len2 = dx * dx + dy * dy;
    if len2 == 0.0 {
        return 0.0;
    }
    (((p.x - a.x) * dx + (p.y - a.y) * dy) / len2).clamp(0.0, 1.0)
}

fn lerp(a: Coord<f64>, b: Coord<f64>, t: f64) -> Coord<f64> {
    Coord {
        x: a.x + (b.x - a.x) * t,
        y: a.y + (b.y - a.y) * t,
    }
}

pub fn point_segment_distance(p: Coord<f64>, a: Coord<f64>, b: Coord<f64>) -> f64 {
    distance(p, lerp(a, b, segment_param(p, a, b)))
}

/// `p` lies on the line within `eps`
pub fn point_on_line(p: Coord<f64>, line: &LineString<f64>, eps: f64) -> bool {
    match line.0.as_slice() {
        [] => false,
        [only] => coords_equal(p, *only, eps),
        _ => line
            .lines()
            .any(|seg| point_segment_distance(p, seg.start, seg.end) <= eps),
    }
}

pub fn point_on_boundary(p: Coord<f64>, poly: &Polygon<f64>, eps: f64) -> bool {
    point_on_line(p, poly.exterior(), eps)
        || poly.interiors().iter().any(|ring| point_on_line(p, ring, eps))
}

/// Interior or boundary, the boundary widened by `eps`
pub fn point_in_or_on_polygon(p: Coord<f64>, poly: &Polygon<f64>, eps: f64) -> bool {
    point_on_boundary(p, poly, eps) || poly.contains(&p)
}

/// Strictly inside: in the interior and farther than `eps` from the boundary
pub fn point_strictly_inside(p: Coord<f64>, poly: &Polygon<f64>, eps: f64) -> bool {
    poly.contains(&p) && !point_on_boundary(p, poly, eps)
}

/// Intersection of two segments, tolerant to near misses at endpoints
pub fn segment_intersection(a: Line<f64>, b: Line<f64>, eps: f64) -> Option<Intersection> {
    match line_intersection(a, b) {
        Some(LineIntersection::SinglePoint { intersection, .. }) => {
            Some(Intersection::Point(intersection))
        }
        Some(LineIntersection::Collinear { intersection }) => {
            if coords_equal(intersection.start, intersection.end, eps) {
                Some(Intersection::Point(intersection.start))
            } else {
                Some(Intersection::Overlap(intersection.start, intersection.end))
            }
        }
        None => [
            (a.start, b),
            (a.end, b),
            (b.start, a),
            (b.end, a),
        ]
        .into_iter()
        .find(|(p, seg)| point_segment_distance(*p, seg.start, seg.end) <= eps)
        .map(|(p, _)| Intersection::Point(p)),
    }
}

fn segment_envelope(seg: &Line<f64>) -> Envelope {
    Envelope::from_coord(seg.start).union(&Envelope::from_coord(seg.end))
}

/// All places where two lines meet, without duplicates
///
/// Points lying on a reported overlap are not reported again.
pub fn line_intersections(a: &LineString<f64>, b: &LineString<f64>, eps: f64) -> Vec<Intersection> {
    let mut overlaps: Vec<Intersection> = Vec::new();
    let mut points: Vec<Coord<f64>> = Vec::new();

    for seg_a in a.lines() {
        let env_a = segment_envelope(&seg_a).expanded(eps);
        for seg_b in b.lines() {
            if !env_a.intersects(&segment_envelope(&seg_b)) {
                continue;
            }
            match segment_intersection(seg_a, seg_b, eps) {
                Some(Intersection::Point(p)) => points.push(p),
                Some(overlap @ Intersection::Overlap(..)) => {
                    if !overlaps.contains(&overlap) {
                        overlaps.push(overlap);
                    }
                }
                None => {}
            }
        }
    }

    let mut found = overlaps.clone();
    for p in points {
        let on_overlap = overlaps.iter().any(|o| match o {
            Intersection::Overlap(s, e) => point_segment_distance(p, *s, *e) <= eps,
            Intersection::Point(_) => false,
        });
        let duplicate = found
            .iter()
            .any(|f| matches!(f, Intersection::Point(q) if coords_equal(p, *q, eps)));
        if !on_overlap && !duplicate {
            found.push(Intersection::Point(p));
        }
    }
    found
}

/// Length walked along `line` up to the point of it nearest to `p`
pub fn distance_along(line: &LineString<f64>, p: Coord<f64>) -> f64 {
    let mut walked = 0.0;
    let mut nearest = f64::INFINITY;
    let mut along = 0.0;
    for seg in line.lines() {
        let length = distance(seg.start, seg.end);
        let d = point_segment_distance(p, seg.start, seg.end);
        if d < nearest {
            nearest = d;
            along = walked + length * segment_param(p, seg.start, seg.end);
        }
        walked += length;
    }
    along
}

/// Every point of the segment lies inside or on the polygon
pub fn segment_covered_by(a: Coord<f64>, b: Coord<f64>, poly: &Polygon<f64>, eps: f64) -> bool {
    if !point_in_or_on_polygon(a, poly, eps) || !point_in_or_on_polygon(b, poly, eps) {
        return false;
    }
    if coords_equal(a, b, eps) {
        return true;
    }

    // Split the segment wherever it meets the boundary; each piece is then
    // entirely inside or entirely outside, decided by its midpoint.
    let segment = Line::new(a, b);
    let mut params = vec![0.0, 1.0];
    let rings = std::iter::once(poly.exterior()).chain(poly.interiors().iter());
    for ring in rings {
        for edge in ring.lines() {
            match line_intersection(segment, edge) {
                Some(LineIntersection::SinglePoint { intersection, .. }) => {
                    params.push(segment_param(intersection, a, b));
                }
                Some(LineIntersection::Collinear { intersection }) => {
                    params.push(segment_param(intersection.start, a, b));
                    params.push(segment_param(intersection.end, a, b));
                }
                None => {}
            }
        }
    }
    params.sort_by(f64::total_cmp);
    params.dedup();

    params
        .windows(2)
        .all(|w| point_in_or_on_polygon(lerp(a, b, (w[0] + w[1]) / 2.0), poly, eps))
}

pub fn line_covered_by(line: &LineString<f64>, poly: &Polygon<f64>, eps: f64) -> bool {
    match line.0.as_slice() {
        [] => false,
        [only] => point_in_or_on_polygon(*only, poly, eps),
        _ => line
            .lines()
            .all(|seg| segment_covered_by(seg.start, seg.end, poly, eps)),
    }
}

/// `inner` lies within `outer`; shared boundaries count as within
pub fn polygon_covered_by(inner: &Polygon<f64>, outer: &Polygon<f64>, eps: f64) -> bool {
    if !line_covered_by(inner.exterior(), outer, eps) {
        return false;
    }
    // A hole of `outer` reaching into `inner` leaves part of `inner` uncovered.
    !outer
        .interiors()
        .iter()
        .flat_map(|hole| hole.0.iter())
        .any(|c| point_strictly_inside(*c, inner, eps))
}

fn part_covered_by(part: &Part<'_>, poly: &Polygon<f64>, eps: f64) -> bool {
    match part {
        Part::Point(c) => point_in_or_on_polygon(*c, poly, eps),
        Part::Line(line) => line_covered_by(line, poly, eps),
        Part::Polygon(inner) => polygon_covered_by(inner, poly, eps),
    }
}

/// Every part of `inner` lies within some polygon part of `outer`
pub fn geometry_covered_by(inner: &Geometry<f64>, outer: &Geometry<f64>, eps: f64) -> bool {
    let inner_parts = parts(inner);
    let outer_parts = parts(outer);
    let polygons: Vec<&Polygon<f64>> = outer_parts.iter().filter_map(|p| p.as_polygon()).collect();
    if inner_parts.is_empty() || polygons.is_empty() {
        return false;
    }
    inner_parts
        .iter()
        .all(|part| polygons.iter().any(|poly| part_covered_by(part, poly, eps)))
}

/// Same point set within `eps`. Vertex order, ring start and orientation
/// do not matter.
pub fn geometries_equal(a: &Geometry<f64>, b: &Geometry<f64>, eps: f64) -> bool {
    let (pa, pb) = (parts(a), parts(b));
    if pa.is_empty() || pb.is_empty() {
        return pa.is_empty() && pb.is_empty();
    }
    match (dimension(&pa), dimension(&pb)) {
        (Some(2), Some(2)) => geometry_covered_by(a, b, eps) && geometry_covered_by(b, a, eps),
        (Some(1), Some(1)) => lines_cover(&pa, &pb, eps) && lines_cover(&pb, &pa, eps),
        (Some(0), Some(0)) => points_cover(&pa, &pb, eps) && points_cover(&pb, &pa, eps),
        _ => false,
    }
}

/// Dimension shared by all parts; `None` for mixed collections
fn dimension(parts: &[Part<'_>]) -> Option<u8> {
    let dim = |part: &Part<'_>| match part {
        Part::Point(_) => 0,
        Part::Line(_) => 1,
        Part::Polygon(_) => 2,
    };
    let first = dim(parts.first()?);
    parts.iter().all(|p| dim(p) == first).then_some(first)
}

/// Every vertex and segment midpoint of `a` lies on a line of `b`
fn lines_cover(a: &[Part<'_>], b: &[Part<'_>], eps: f64) -> bool {
    let lines: Vec<&LineString<f64>> = b.iter().filter_map(|p| p.as_line()).collect();
    let on_b = |c: Coord<f64>| lines.iter().any(|line| point_on_line(c, line, eps));
    a.iter().filter_map(|p| p.as_line()).all(|line| {
        line.0.iter().all(|c| on_b(*c)) && line.lines().all(|seg| on_b(lerp(seg.start, seg.end, 0.5)))
    })
}

fn points_cover(a: &[Part<'_>], b: &[Part<'_>], eps: f64) -> bool {
    a.iter().all(|p| match p {
        Part::Point(c) => b
            .iter()
            .any(|q| matches!(q, Part::Point(d) if coords_equal(*c, *d, eps))),
        _ => false,
    })
}

/// Total length of boundary the two polygons have in common
pub fn shared_boundary_length(a: &Polygon<f64>, b: &Polygon<f64>) -> f64 {
    let rings_a = std::iter::once(a.exterior()).chain(a.interiors().iter());
    let mut total = 0.0;
    for ring_a in rings_a {
        for edge_a in ring_a.lines() {
            let rings_b = std::iter::once(b.exterior()).chain(b.interiors().iter());
            for ring_b in rings_b {
                for edge_b in ring_b.lines() {
                    if let Some(LineIntersection::Collinear { intersection }) =
                        line_intersection(edge_a, edge_b)
                    {
                        total += distance(intersection.start, intersection.end);
                    }
                }
            }
        }
    }
    total
}
