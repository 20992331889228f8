//! Geometry helpers shared by the checks
//!
//! - Envelopes and a packed R-tree for coarse filtering
//! - Part / ring / vertex addressing
//! - Tolerance-aware predicates
//! - Small edits used when fixing errors

mod edit;
mod envelope;
mod index;
mod parts;
mod predicates;

pub use edit::{can_delete_vertex, delete_vertex, remove_part, replace_polygon_part, to_single_part};
pub use envelope::Envelope;
pub use index::EnvelopeIndex;
pub use parts::{
    first_vertex, invalid_reason, is_closed, part_count, parts, polyline_size,
    representative_point, vertex_at, Part,
};
pub use predicates::{
    coords_equal, distance, distance_along, geometries_equal, geometry_covered_by, line_intersections,
    point_on_line, point_segment_distance, shared_boundary_length, Intersection,
};
