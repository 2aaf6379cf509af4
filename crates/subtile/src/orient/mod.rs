//! Edge orientations and their identification partition.
//!
//! Purpose
//! - Every edge produced anywhere in the system (a prototile side, a slot in
//!   an edge decomposition) carries a nonzero orientation id. The negation of
//!   an id is the same edge traversed the other way, so `-o` always exists
//!   implicitly and is never allocated separately.
//! - During the search, gluing decisions identify orientations; the partition
//!   over ids is the running record of those identifications. A class that
//!   contains both `o` and `-o` would force an edge to match itself reversed,
//!   which kills the branch.
//!
//! Ids are dense: the pool hands out 1, 2, 3, … per length class at startup,
//! and the allocation order is deterministic, so every process that builds the
//! same problem assigns the same ids.

mod partition;

pub use partition::OrientationPartition;


/// Allocator of orientation ids, grouped by edge-length class.
///
/// Frozen after problem construction; the partition universe is sized to
/// `total()` and never grows during a run.
#[derive(Clone, Debug, Default)]
pub struct OrientPool {
    /// classes[k] lists the positive ids allocated for length class k+1.
    classes: Vec<Vec<i32>>,
    next: i32,
}

impl OrientPool {
    pub fn new(num_classes: usize) -> OrientPool {
        OrientPool {
            classes: vec![Vec::new(); num_classes],
            next: 1,
        }
    }

    /// Allocate a fresh positive id in the given length class (1-based).
    pub fn alloc(&mut self, class: u8) -> i32 {
        let id = self.next;
        self.next += 1;
        self.classes[class as usize - 1].push(id);
        id
    }

    /// Positive ids allocated so far for a class.
    pub fn class_ids(&self, class: u8) -> &[i32] {
        &self.classes[class as usize - 1]
    }

    /// Total number of positive ids allocated.
    pub fn total(&self) -> u32 {
        (self.next - 1) as u32
    }
}
