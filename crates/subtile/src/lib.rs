//! Substitution-rule search for n-fold triangle tilings.
//!
//! Purpose
//! - Enumerate all ways to tile an inflated triangular region with copies of a
//!   fixed prototile set, subject to edge-orientation matching constraints.
//! - Each complete tiling of the region is a candidate substitution rule for an
//!   aperiodic tiling with 2n-fold local symmetry.
//!
//! Layout
//! - `geom`: exact cyclotomic-integer arithmetic, edge lengths, prototiles.
//! - `orient`: orientation ids, pools, and the reversible union-find partition.
//! - `place`: placed triangles, directed edges, and geometric predicates.
//! - `boundary`: per-side coverage trackers and the edge-breakdown catalogue.
//! - `search`: the backtracking engine and its completed-patch records.
//! - `work`: work units, the unit factory, and the worker-pool scheduler.
//! - `net`: the line-delimited JSON distribution protocol (server and client).
//! - `persist`: checkpoint, catalogue, and postmortem files.
//! - `config`: serializable task, pool, and wire configuration.
//! - `stats`: search throughput and rejection counters.
//!
//! API Policy
//! - This crate is project-internal. There is no stable public API.
//! - Breaking changes are encouraged when they improve quality.

pub mod boundary;
pub mod config;
pub mod geom;
pub mod net;
pub mod orient;
pub mod persist;
pub mod place;
pub mod search;
pub mod stats;
pub mod work;

/// Library version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use config::{NetCfg, ProblemParams, SchedulerCfg};
pub use geom::{GeomCfg, Problem, Symmetry};
pub use search::{CompletedPatch, SearchState};
pub use work::{solve_local, SolveReport, WorkUnit};

/// Common exports for quick imports in callers.
pub mod prelude {
    pub use crate::boundary::{BoundaryTracker, BreakdownTree};
    pub use crate::config::{ProblemParams, SchedulerCfg};
    pub use crate::geom::{GeomCfg, Problem, ProtoSet, Prototile, Symmetry};
    pub use crate::orient::OrientationPartition;
    pub use crate::place::{BoundaryEdge, Triangle};
    pub use crate::search::{CompletedPatch, SearchState};
    pub use crate::work::{solve_local, Scheduler, WorkUnit};
}
