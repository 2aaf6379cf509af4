//! Work units and their identifiers.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::geom::Problem;
use crate::search::{CompletedPatch, SearchState};
use crate::stats::SearchStats;

/// Id-space tag for units minted by a client process. Server-assigned ids
/// never carry it, so a dispatched unit and a locally spawned one cannot
/// collide on the same machine.
pub const LOCAL_UNIT_BIT: u64 = 1 << 63;

/// One schedulable search: a state plus the ancestry group it reports into.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkUnit {
    pub id: u64,
    /// Id of the initial unit this one descends from. Every descendant of
    /// one initial unit shares this value, and the group's results are
    /// reported together under it.
    pub root: u64,
    pub state: SearchState,
}

/// Aggregated outcome of one ancestry group.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UnitResult {
    /// The group's initial unit.
    pub unit: u64,
    pub patches: Vec<CompletedPatch>,
    pub stats: SearchStats,
}

/// Monotone id source; never hands out the same id twice.
#[derive(Debug)]
pub struct IdAlloc {
    next: AtomicU64,
}

impl IdAlloc {
    /// Server-side and local id space, counting from 1.
    pub fn new() -> IdAlloc {
        IdAlloc {
            next: AtomicU64::new(1),
        }
    }

    /// Client-side id space, disjoint from every server-assigned id.
    pub fn tagged() -> IdAlloc {
        IdAlloc {
            next: AtomicU64::new(LOCAL_UNIT_BIT | 1),
        }
    }

    pub fn next(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for IdAlloc {
    fn default() -> Self {
        Self::new()
    }
}

/// Initial states, one per length class the configured start side admits as
/// a first boundary piece.
pub fn seed_states(pb: &Problem) -> Vec<SearchState> {
    (1..=pb.sym.m as u8)
        .filter_map(|len| SearchState::seed(pb, pb.start_side, len))
        .collect()
}
