//! Directed edges and segment predicates.

use crate::geom::{Coeffs, Symmetry};
use serde::{Deserialize, Serialize};

/// A directed unit-scale edge of the advancing front.
///
/// Open edges keep the unfilled region on their left. `head` always equals
/// `tail` plus the class-`len` displacement along `step`, and `orient` is the
/// orientation id of this traversal direction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundaryEdge {
    pub tail: Coeffs,
    pub head: Coeffs,
    pub len: u8,
    pub step: u16,
    pub orient: i32,
}

impl BoundaryEdge {
    /// The same segment traversed the other way.
    pub fn reversed(&self, sym: &Symmetry) -> BoundaryEdge {
        BoundaryEdge {
            tail: self.head.clone(),
            head: self.tail.clone(),
            len: self.len,
            step: sym.step_add(self.step, sym.n as i32),
            orient: -self.orient,
        }
    }

    /// Same segment, same direction.
    #[inline]
    pub fn same_span(&self, other: &BoundaryEdge) -> bool {
        self.tail == other.tail && self.head == other.head
    }
}

/// `p` strictly inside the segment (a, b); collinearity is assumed checked.
pub fn point_on_open_segment(sym: &Symmetry, p: &Coeffs, a: &Coeffs, b: &Coeffs) -> bool {
    if p == a || p == b {
        return false;
    }
    sym.orient_sign(a, b, p) == 0 && sym.dot_sign(p, a, b) < 0
}

/// True when the segments intersect anywhere beyond a shared exact endpoint.
///
/// Identical spans count as crossing; callers that deliberately close an
/// open edge exclude it by `same_span` before asking.
pub fn segments_cross(
    sym: &Symmetry,
    a1: &Coeffs,
    a2: &Coeffs,
    b1: &Coeffs,
    b2: &Coeffs,
) -> bool {
    if (a1 == b1 && a2 == b2) || (a1 == b2 && a2 == b1) {
        return true;
    }
    let d1 = sym.orient_sign(b1, b2, a1);
    let d2 = sym.orient_sign(b1, b2, a2);
    let d3 = sym.orient_sign(a1, a2, b1);
    let d4 = sym.orient_sign(a1, a2, b2);
    if d1 != 0 && d2 != 0 && d3 != 0 && d4 != 0 {
        return d1 != d2 && d3 != d4;
    }
    // Degenerate contact: an endpoint strictly inside the other segment is a
    // real intersection; a shared endpoint alone is legal tiling contact.
    (d1 == 0 && point_on_open_segment(sym, a1, b1, b2))
        || (d2 == 0 && point_on_open_segment(sym, a2, b1, b2))
        || (d3 == 0 && point_on_open_segment(sym, b1, a1, a2))
        || (d4 == 0 && point_on_open_segment(sym, b2, a1, a2))
}

/// `p` inside or on the counter-clockwise triangle (v0, v1, v2).
pub fn point_in_triangle(
    sym: &Symmetry,
    p: &Coeffs,
    v0: &Coeffs,
    v1: &Coeffs,
    v2: &Coeffs,
) -> bool {
    sym.orient_sign(v0, v1, p) >= 0
        && sym.orient_sign(v1, v2, p) >= 0
        && sym.orient_sign(v2, v0, p) >= 0
}
