use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

use crate::boundary::{BoundaryTracker, CoverSlot, Incidence};
use crate::geom::{Coeffs, Problem};
use crate::orient::OrientationPartition;
use crate::place::{
    point_in_triangle, point_on_open_segment, segments_cross, BoundaryEdge, Triangle,
};
use crate::stats::SearchStats;

use super::cursor::Cursor;
use super::patch::CompletedPatch;

/// Everything a unit run produces.
#[derive(Debug, Default)]
pub struct RunOutput {
    pub patches: Vec<CompletedPatch>,
    pub spawned: Vec<SearchState>,
    pub stats: SearchStats,
}

/// What happened to one free side of a placement, for exact rollback.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
enum SideAct {
    /// Reversed side pushed onto the open stack.
    Opened,
    /// Open edge removed from `at` and moved to the closed list.
    Closed { at: u32 },
    /// Boundary piece applied on this region side.
    Covered { side: u8 },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct PlacementUndo {
    mark: usize,
    /// The frontier edge this placement consumed.
    glued: BoundaryEdge,
    /// Free-side effects in application order.
    acts: [SideAct; 2],
}

/// Pure phase-one verdict for one free side.
enum Fate {
    Open,
    Close { at: usize },
    Cover {
        slot: CoverSlot,
        tail: usize,
        head: usize,
    },
}

/// One backtracking search in progress.
///
/// The open stack holds the frontier: directed edges with the unfilled
/// region on their left, gluing always at the top. Placement and removal
/// are strict inverses; `remove` restores every field bit for bit, which
/// is what makes deep sharing-free clones safe to run independently.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchState {
    placed: Vec<Triangle>,
    open: Vec<BoundaryEdge>,
    closed: Vec<BoundaryEdge>,
    /// Unused copies per prototile.
    remaining: Vec<u32>,
    tracker: BoundaryTracker,
    partition: OrientationPartition,
    /// Tiles inherited from the parent unit; never unwound here.
    base_depth: usize,
    undo: Vec<PlacementUndo>,
}

impl SearchState {
    /// Seed a search whose first boundary piece on `side` has class `len`.
    ///
    /// The piece is covered up front and the matching frontier edge carries
    /// the decomposition slot's orientation, so the first glue identifies
    /// the covering tile side with the slot. None when the catalogue has no
    /// such first piece.
    pub fn seed(pb: &Problem, side: usize, len: u8) -> Option<SearchState> {
        let mut tracker = BoundaryTracker::build(
            &pb.sym,
            &pb.tree,
            &pb.corners,
            &pb.side_steps,
            &pb.side_classes,
        );
        let tail = pb.corners[side].clone();
        let head = &tail + pb.sym.direction(len, pb.side_steps[side]);
        let slot = tracker
            .cover(&pb.sym, &pb.tree, pb.restrict, side, &tail, &head, len)
            .ok()?;
        Some(SearchState {
            placed: Vec::new(),
            open: vec![BoundaryEdge {
                tail,
                head,
                len,
                step: pb.side_steps[side],
                orient: slot.orient,
            }],
            closed: Vec::new(),
            remaining: pb.counts.clone(),
            tracker,
            partition: OrientationPartition::fresh(pb.universe()),
            base_depth: 0,
            undo: Vec::new(),
        })
    }

    /// Number of placed tiles.
    #[inline]
    pub fn depth(&self) -> usize {
        self.placed.len()
    }

    #[inline]
    pub fn base_depth(&self) -> usize {
        self.base_depth
    }

    /// Run to exhaustion of every choice reachable without crossing the
    /// deadline. Patches, spawned clones, and counters accumulate in `out`.
    ///
    /// The deadline is consulted at exactly one point: after a successful
    /// placement, before descending. A set flag clones the state (the clone
    /// owns the subtree below the new tile) and continues with the siblings
    /// at the current depth, so no part of the tree is lost or visited twice.
    pub fn run(&mut self, pb: &Problem, deadline: &AtomicBool, out: &mut RunOutput) {
        let mut cur = Cursor::start();
        // Whether the current depth ever produced a child (locally or via a
        // spawned clone); a wrap without one is a dead end.
        let mut descended = false;
        loop {
            if self.remaining.iter().all(|&c| c == 0) {
                out.stats.patches += 1;
                out.patches.push(self.snapshot(pb));
                if !self.ascend(pb, &mut cur) {
                    return;
                }
                descended = true;
                continue;
            }
            if self.open.is_empty() {
                out.stats.dead_ends += 1;
                if !self.ascend(pb, &mut cur) {
                    return;
                }
                descended = true;
                continue;
            }
            out.stats.attempts += 1;
            if self.try_place(pb, cur, &mut out.stats) {
                out.stats.placed += 1;
                out.stats.max_depth = out.stats.max_depth.max(self.placed.len() as u64);
                if deadline.load(Ordering::Relaxed) {
                    let mut child = self.clone();
                    child.base_depth = child.placed.len();
                    out.spawned.push(child);
                    out.stats.spawns += 1;
                    if self.remove(pb).is_none() {
                        return;
                    }
                    descended = true;
                    if cur.advance(pb.protos.len()) && !self.ascend(pb, &mut cur) {
                        return;
                    }
                    continue;
                }
                cur = Cursor::start();
                descended = false;
                continue;
            }
            if cur.advance(pb.protos.len()) {
                if !descended {
                    out.stats.dead_ends += 1;
                }
                if !self.ascend(pb, &mut cur) {
                    return;
                }
                descended = true;
            }
        }
    }

    /// Pop placements until a depth with untried choices remains. False when
    /// everything owned by this state is exhausted.
    fn ascend(&mut self, pb: &Problem, cur: &mut Cursor) -> bool {
        loop {
            if self.placed.len() <= self.base_depth {
                return false;
            }
            let Some(t) = self.remove(pb) else {
                return false;
            };
            *cur = Cursor::from(&t);
            if !cur.advance(pb.protos.len()) {
                return true;
            }
        }
    }

    fn snapshot(&self, pb: &Problem) -> CompletedPatch {
        debug_assert!(self.open.is_empty(), "tiles exhausted with open frontier");
        debug_assert!(self.tracker.all_complete(&pb.tree));
        CompletedPatch {
            tiles: self.placed.clone(),
            open: self.open.clone(),
            closed: self.closed.clone(),
            side_paths: self.tracker.side_paths(&pb.tree),
            classes: self.partition.classes(),
        }
    }

    /// Try the cursor's choice against the top frontier edge.
    pub(crate) fn try_place(&mut self, pb: &Problem, cur: Cursor, stats: &mut SearchStats) -> bool {
        if self.remaining[cur.proto] == 0 {
            stats.no_tiles += 1;
            return false;
        }
        let Some(edge) = self.open.last() else {
            return false;
        };
        let proto = &pb.protos.tiles[cur.proto];
        let Some(&glue) = proto
            .matching_sides(cur.flip, edge.len)
            .get(cur.second as usize)
        else {
            stats.no_match += 1;
            return false;
        };
        // Identifying the glued side with the edge fails exactly when they
        // already sit in opposite classes.
        if self
            .partition
            .same(proto.side_orient(cur.flip, glue), -edge.orient)
        {
            stats.orient += 1;
            return false;
        }
        let edge = edge.clone();
        let t = Triangle::place(
            &pb.sym,
            proto,
            cur.flip,
            cur.second,
            glue,
            &edge.tail,
            edge.step,
        );

        let apex = (glue + 2) % 3;
        let v = &t.verts[apex];
        let inc = self.tracker.incident(v);
        if inc == Incidence::Blocked {
            stats.boundary += 1;
            return false;
        }
        let established =
            inc == Incidence::End || self.open.iter().any(|f| f.tail == *v || f.head == *v);
        if !established && !self.vertex_admissible(pb, inc == Incidence::Free, v) {
            stats.vertex += 1;
            return false;
        }

        // Free sides in push order: toward the apex first, then away from it.
        let free = [(glue + 2) % 3, (glue + 1) % 3];
        let mut fates = [Fate::Open, Fate::Open];
        for (x, &i) in free.iter().enumerate() {
            let s = t.side(i);
            if let Some(side) = self.tracker.classify(&s.tail, &s.head) {
                let slot = match self.tracker.check(
                    &pb.sym,
                    &pb.tree,
                    pb.restrict,
                    side,
                    &s.tail,
                    &s.head,
                    s.len,
                ) {
                    Ok(slot) => slot,
                    Err(_) => {
                        stats.boundary += 1;
                        return false;
                    }
                };
                let (Some(ti), Some(hi)) = (
                    self.tracker.sides[side].index_of(&s.tail),
                    self.tracker.sides[side].index_of(&s.head),
                ) else {
                    stats.boundary += 1;
                    return false;
                };
                fates[x] = Fate::Cover {
                    slot,
                    tail: ti,
                    head: hi,
                };
            } else if let Some(at) = self
                .open
                .iter()
                .position(|f| f.tail == s.tail && f.head == s.head)
            {
                debug_assert_eq!(self.open[at].len, s.len);
                fates[x] = Fate::Close { at };
            } else {
                for f in self.open.iter().chain(self.closed.iter()) {
                    if segments_cross(&pb.sym, &s.tail, &s.head, &f.tail, &f.head) {
                        stats.crossing += 1;
                        return false;
                    }
                }
                fates[x] = Fate::Open;
            }
        }

        // A pinched unit wedge at the glued tail is only fillable when some
        // prototile has a unit angle between those two length classes.
        if !established && self.open.len() >= 2 {
            let pred = &self.open[self.open.len() - 2];
            if pred.head == edge.tail {
                let out_step = pb.sym.step_add(t.steps[apex], pb.sym.n as i32);
                if pb.sym.interior_units(pred.step, out_step) == 1
                    && !pb.protos.unit_wedge_realizable(pred.len, t.lens[apex])
                {
                    stats.wedge += 1;
                    return false;
                }
            }
        }

        let mark = self.partition.mark();
        self.partition.identify(t.orients[glue], edge.orient);
        if !self.partition.valid() {
            self.partition.undo_to(mark);
            stats.orient += 1;
            return false;
        }
        for (x, &i) in free.iter().enumerate() {
            let o = match fates[x] {
                Fate::Open => continue,
                Fate::Close { at } => self.open[at].orient,
                Fate::Cover { slot, .. } => slot.orient,
            };
            self.partition.identify(t.orients[i], o);
            if !self.partition.valid() {
                self.partition.undo_to(mark);
                stats.orient += 1;
                return false;
            }
        }

        let Some(glued) = self.open.pop() else {
            self.partition.undo_to(mark);
            return false;
        };
        debug_assert!(glued.same_span(&edge));
        let mut acts = [SideAct::Opened, SideAct::Opened];
        let mut removed: Option<usize> = None;
        for (x, &i) in free.iter().enumerate() {
            match fates[x] {
                Fate::Open => {
                    self.open.push(t.side(i).reversed(&pb.sym));
                    acts[x] = SideAct::Opened;
                }
                Fate::Close { at } => {
                    let at = match removed {
                        Some(r) if at > r => at - 1,
                        _ => at,
                    };
                    let f = self.open.remove(at);
                    self.closed.push(f);
                    removed = Some(at);
                    acts[x] = SideAct::Closed { at: at as u32 };
                }
                Fate::Cover { slot, tail, head } => {
                    self.tracker.add(slot, tail, head);
                    acts[x] = SideAct::Covered {
                        side: slot.side as u8,
                    };
                }
            }
        }
        self.remaining[cur.proto] -= 1;
        self.undo.push(PlacementUndo { mark, glued, acts });
        self.placed.push(t);
        true
    }

    /// Checks for a vertex not yet part of the tiling: inside the region
    /// (or on an uncovered admissible boundary point), clear of existing
    /// vertices, outside every placed tile, off every closed edge.
    fn vertex_admissible(&self, pb: &Problem, on_boundary: bool, v: &Coeffs) -> bool {
        // A free boundary point is a legal landing spot; the covering sides
        // of later tiles turn it into a piece endpoint.
        if !on_boundary {
            for s in 0..3 {
                if pb.sym.signed_side(&pb.corners[s], pb.side_steps[s], v) <= pb.sym.cfg.margin {
                    return false;
                }
            }
        }
        for f in &self.open {
            if pb.sym.too_close(v, &f.tail) || pb.sym.too_close(v, &f.head) {
                return false;
            }
        }
        for t in &self.placed {
            if point_in_triangle(&pb.sym, v, &t.verts[0], &t.verts[1], &t.verts[2]) {
                return false;
            }
        }
        for f in &self.closed {
            if *v == f.tail || *v == f.head || point_on_open_segment(&pb.sym, v, &f.tail, &f.head)
            {
                return false;
            }
        }
        true
    }

    /// Exact inverse of the innermost placement.
    pub(crate) fn remove(&mut self, pb: &Problem) -> Option<Triangle> {
        let t = self.placed.pop()?;
        let Some(u) = self.undo.pop() else {
            debug_assert!(false, "undo stack out of step");
            self.placed.push(t);
            return None;
        };
        for act in u.acts.iter().rev() {
            match *act {
                SideAct::Opened => {
                    let popped = self.open.pop();
                    debug_assert!(popped.is_some());
                }
                SideAct::Covered { side } => {
                    self.tracker.uncover(&pb.tree, side as usize);
                }
                SideAct::Closed { at } => {
                    let Some(f) = self.closed.pop() else {
                        debug_assert!(false, "closed stack out of step");
                        continue;
                    };
                    self.open.insert(at as usize, f);
                }
            }
        }
        self.open.push(u.glued);
        self.partition.undo_to(u.mark);
        self.remaining[t.proto as usize] += 1;
        Some(t)
    }
}
