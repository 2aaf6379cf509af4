//! Placement primitives: directed edges, placed triangles, predicates.
//!
//! Everything here is exact on ring coordinates; the float embedding is only
//! consulted through the sign predicates on `Symmetry`.

mod edge;
mod triangle;

pub use edge::{point_in_triangle, point_on_open_segment, segments_cross, BoundaryEdge};
pub use triangle::Triangle;

#[cfg(test)]
mod tests;
