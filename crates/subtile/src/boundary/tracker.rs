//! Per-side boundary coverage trackers.
//!
//! Each region side owns the array of admissible boundary points: every
//! nonnegative integer combination of unit-scale edge vectors that fits under
//! the side's capacity, sorted by distance from the side's starting corner.
//! Coverage advances strictly left-to-right: a piece must start at the
//! current frontier point, so the decomposition of a side is discovered in
//! order with no retroactive gaps.
//!
//! Points strictly inside an applied piece are blocked; nothing may touch
//! them again. Piece endpoints stay usable as tile vertices.

use super::tree::BreakdownTree;
use crate::geom::{Coeffs, Symmetry};
use serde::{Deserialize, Serialize};

/// How a point relates to the tracked boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Incidence {
    /// Not an admissible point of any side.
    Off,
    /// Admissible and untouched.
    Free,
    /// Endpoint of an applied piece (or a corner).
    End,
    /// Strictly inside an applied piece.
    Blocked,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
enum PointState {
    Free,
    End,
    Blocked,
}

/// Why the tracker refused a piece.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CoverReject {
    /// Piece tail is not the side's frontier point.
    NotAtFrontier,
    /// Piece head is not an admissible point ahead of the tail.
    BadHead,
    /// Head does not equal tail plus the piece vector.
    BadSpan,
    /// No catalogue child for this class here (capacity exhausted), or the
    /// path is not witnessed in restricted mode.
    NotInCatalogue,
}

/// Accepted piece: where it lands in the catalogue.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CoverSlot {
    pub side: usize,
    /// Trie node for the piece.
    pub node: u32,
    /// Orientation id of the decomposition slot.
    pub orient: i32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SideTracker {
    pub side: u8,
    /// Starting corner.
    pub start: Coeffs,
    /// Direction step of the side.
    pub step: u16,
    /// Length class of the side before inflation.
    pub class: u8,
    /// Admissible points sorted by distance from `start`; first is the
    /// starting corner, last the far corner.
    points: Vec<Coeffs>,
    state: Vec<PointState>,
    /// Index of the end of the contiguous covered run.
    frontier: usize,
    /// Current catalogue node (path of applied pieces).
    node: u32,
    /// Applied pieces as (tail index, head index), innermost last.
    pieces: Vec<(u32, u32)>,
}

impl SideTracker {
    fn build(
        sym: &Symmetry,
        tree: &BreakdownTree,
        side: usize,
        start: Coeffs,
        step: u16,
        class: u8,
    ) -> SideTracker {
        let capacity = tree.capacity(class);
        let m = sym.m;
        // Every combination v with 0 <= v <= capacity is a prefix of some
        // ordered decomposition, hence an admissible point.
        let mut combos: Vec<Vec<i64>> = vec![vec![0; m]];
        for (j, &c) in capacity.iter().enumerate() {
            let mut next = Vec::with_capacity(combos.len() * (c as usize + 1));
            for base in &combos {
                for k in 0..=c {
                    let mut v = base.clone();
                    v[j] = k;
                    next.push(v);
                }
            }
            combos = next;
        }
        let mut pts: Vec<(f64, Coeffs)> = combos
            .into_iter()
            .map(|v| {
                let mut p = start.clone();
                for (j, &c) in v.iter().enumerate() {
                    if c != 0 {
                        p += &(sym.direction(j as u8 + 1, step) * c);
                    }
                }
                (sym.dist2(&start, &p), p)
            })
            .collect();
        pts.sort_by(|a, b| {
            a.0.partial_cmp(&b.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.1.as_slice().cmp(b.1.as_slice()))
        });
        // Composite orders can express one point by several combinations.
        pts.dedup_by(|a, b| a.1 == b.1);
        let points: Vec<Coeffs> = pts.into_iter().map(|(_, p)| p).collect();
        let mut state = vec![PointState::Free; points.len()];
        state[0] = PointState::End;
        SideTracker {
            side: side as u8,
            start,
            step,
            class,
            points,
            state,
            frontier: 0,
            node: tree.root(class),
            pieces: Vec::new(),
        }
    }

    pub fn index_of(&self, p: &Coeffs) -> Option<usize> {
        self.points.iter().position(|q| q == p)
    }

    #[inline]
    pub fn frontier_point(&self) -> &Coeffs {
        &self.points[self.frontier]
    }

    #[inline]
    pub fn node(&self) -> u32 {
        self.node
    }

    /// The side is fully decomposed.
    pub fn complete(&self, tree: &BreakdownTree) -> bool {
        tree.node(self.node).terminal
    }

    fn check(
        &self,
        sym: &Symmetry,
        tree: &BreakdownTree,
        restrict: bool,
        tail: &Coeffs,
        head: &Coeffs,
        len: u8,
    ) -> Result<u32, CoverReject> {
        let i = self.index_of(tail).ok_or(CoverReject::NotAtFrontier)?;
        if i != self.frontier {
            return Err(CoverReject::NotAtFrontier);
        }
        let j = self.index_of(head).ok_or(CoverReject::BadHead)?;
        if j <= i {
            return Err(CoverReject::BadHead);
        }
        let expected = tail + sym.direction(len, self.step);
        if expected != *head {
            return Err(CoverReject::BadSpan);
        }
        let Some(child) = tree.child(self.node, len) else {
            return Err(CoverReject::NotInCatalogue);
        };
        if restrict && !tree.node(child).witnessed {
            return Err(CoverReject::NotInCatalogue);
        }
        Ok(child)
    }

    fn apply(&mut self, child: u32, i: usize, j: usize) {
        for k in i + 1..j {
            self.state[k] = PointState::Blocked;
        }
        self.state[j] = PointState::End;
        self.frontier = j;
        self.node = child;
        self.pieces.push((i as u32, j as u32));
    }

    fn unapply(&mut self, tree: &BreakdownTree) {
        let Some((i, j)) = self.pieces.pop() else {
            debug_assert!(false, "unapply on empty side");
            return;
        };
        let (i, j) = (i as usize, j as usize);
        for k in i + 1..j {
            self.state[k] = PointState::Free;
        }
        self.state[j] = PointState::Free;
        self.frontier = i;
        self.node = tree.node(self.node).parent;
    }
}

/// Coverage state of all three region sides.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundaryTracker {
    pub sides: [SideTracker; 3],
}

impl BoundaryTracker {
    pub fn build(
        sym: &Symmetry,
        tree: &BreakdownTree,
        corners: &[Coeffs; 3],
        steps: &[u16; 3],
        classes: &[u8; 3],
    ) -> BoundaryTracker {
        let mk = |s: usize| {
            SideTracker::build(sym, tree, s, corners[s].clone(), steps[s], classes[s])
        };
        BoundaryTracker {
            sides: [mk(0), mk(1), mk(2)],
        }
    }

    /// Strongest incidence of a point across all sides.
    /// Blocked dominates (the point is interior to a piece somewhere), then
    /// End (an established boundary vertex), then Free.
    pub fn incident(&self, p: &Coeffs) -> Incidence {
        let mut best = Incidence::Off;
        for side in &self.sides {
            if let Some(i) = side.index_of(p) {
                let s = match side.state[i] {
                    PointState::Blocked => Incidence::Blocked,
                    PointState::End => Incidence::End,
                    PointState::Free => Incidence::Free,
                };
                best = match (best, s) {
                    (_, Incidence::Blocked) | (Incidence::Blocked, _) => Incidence::Blocked,
                    (_, Incidence::End) | (Incidence::End, _) => Incidence::End,
                    _ => Incidence::Free,
                };
            }
        }
        best
    }

    /// Side whose admissible points contain both endpoints, if any.
    /// Such a segment lies along that side's line.
    pub fn classify(&self, tail: &Coeffs, head: &Coeffs) -> Option<usize> {
        (0..3).find(|&s| {
            self.sides[s].index_of(tail).is_some() && self.sides[s].index_of(head).is_some()
        })
    }

    /// Validate a boundary piece without mutating anything.
    pub fn check(
        &self,
        sym: &Symmetry,
        tree: &BreakdownTree,
        restrict: bool,
        side: usize,
        tail: &Coeffs,
        head: &Coeffs,
        len: u8,
    ) -> Result<CoverSlot, CoverReject> {
        let child = self.sides[side].check(sym, tree, restrict, tail, head, len)?;
        Ok(CoverSlot {
            side,
            node: child,
            orient: tree.node(child).orient,
        })
    }

    /// Apply a previously checked piece.
    pub fn add(&mut self, slot: CoverSlot, tail_idx: usize, head_idx: usize) {
        self.sides[slot.side].apply(slot.node, tail_idx, head_idx);
    }

    /// Convenience: check then apply, returning the slot.
    pub fn cover(
        &mut self,
        sym: &Symmetry,
        tree: &BreakdownTree,
        restrict: bool,
        side: usize,
        tail: &Coeffs,
        head: &Coeffs,
        len: u8,
    ) -> Result<CoverSlot, CoverReject> {
        let slot = self.check(sym, tree, restrict, side, tail, head, len)?;
        let i = self.sides[side].index_of(tail).ok_or(CoverReject::NotAtFrontier)?;
        let j = self.sides[side].index_of(head).ok_or(CoverReject::BadHead)?;
        self.add(slot, i, j);
        Ok(slot)
    }

    /// Retract the innermost piece of a side.
    pub fn uncover(&mut self, tree: &BreakdownTree, side: usize) {
        self.sides[side].unapply(tree);
    }

    /// All three sides fully decomposed.
    pub fn all_complete(&self, tree: &BreakdownTree) -> bool {
        self.sides.iter().all(|s| s.complete(tree))
    }

    /// Current decomposition paths, per side.
    pub fn side_paths(&self, tree: &BreakdownTree) -> [Vec<(u8, i32)>; 3] {
        [
            tree.path(self.sides[0].node),
            tree.path(self.sides[1].node),
            tree.path(self.sides[2].node),
        ]
    }
}
