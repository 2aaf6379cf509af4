//! Search throughput and rejection counters.

use serde::{Deserialize, Serialize};

/// Counters for one work unit run; the result sink merges them across units.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchStats {
    /// Cursor values actually tried.
    pub attempts: u64,
    /// Successful placements.
    pub placed: u64,
    /// Rejected: no copies of the prototile left.
    pub no_tiles: u64,
    /// Rejected: prototile has no matching side for the frontier class.
    pub no_match: u64,
    /// Rejected: orientation classes would self-oppose.
    pub orient: u64,
    /// Rejected: new vertex outside the region, too close to an existing
    /// vertex, inside a placed tile, or on a closed edge.
    pub vertex: u64,
    /// Rejected: a free side crosses an open or closed edge.
    pub crossing: u64,
    /// Rejected: boundary cover refused by the tracker or the catalogue.
    pub boundary: u64,
    /// Rejected: unit wedge no prototile can fill.
    pub wedge: u64,
    /// Completed patches recorded.
    pub patches: u64,
    /// Partial fills no placement choice could extend.
    pub dead_ends: u64,
    /// States cloned off at the deadline.
    pub spawns: u64,
    /// Deepest tile stack seen.
    pub max_depth: u64,
}

impl SearchStats {
    /// Fold another run's counters into this one.
    pub fn merge(&mut self, other: &SearchStats) {
        self.attempts += other.attempts;
        self.placed += other.placed;
        self.no_tiles += other.no_tiles;
        self.no_match += other.no_match;
        self.orient += other.orient;
        self.vertex += other.vertex;
        self.crossing += other.crossing;
        self.boundary += other.boundary;
        self.wedge += other.wedge;
        self.patches += other.patches;
        self.dead_ends += other.dead_ends;
        self.spawns += other.spawns;
        self.max_depth = self.max_depth.max(other.max_depth);
    }

    /// All rejection counters summed.
    pub fn rejects(&self) -> u64 {
        self.no_tiles
            + self.no_match
            + self.orient
            + self.vertex
            + self.crossing
            + self.boundary
            + self.wedge
    }
}
