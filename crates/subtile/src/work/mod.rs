//! Work units and the machinery that runs them to exhaustion.
//!
//! Purpose
//! - A [`WorkUnit`] is a self-contained slice of the search: a serialized
//!   [`SearchState`](crate::search::SearchState) plus the ids linking it to
//!   the seed it descends from. Units created by deadline splits inherit the
//!   ancestor's `root`, so results aggregate per seed no matter how many
//!   times the subtree was carved up or on which machine the pieces ran.
//! - [`Scheduler`] is the local worker pool. [`solve_local`] drives it from
//!   seeding to the merged [`SolveReport`] for single-process runs; the
//!   [`net`](crate::net) layer reuses the same pool on both ends of the wire.
//!
//! Side paths of completed patches are marked in the breakdown catalogue
//! here, at aggregation, never inside the search itself.

mod scheduler;
mod unit;

pub use scheduler::Scheduler;
pub use unit::{seed_states, IdAlloc, UnitResult, WorkUnit, LOCAL_UNIT_BIT};

use std::sync::Arc;

use crate::boundary::BreakdownTree;
use crate::config::SchedulerCfg;
use crate::geom::Problem;
use crate::search::CompletedPatch;
use crate::stats::SearchStats;

/// Outcome of an exhaustive run.
#[derive(Debug)]
pub struct SolveReport {
    pub patches: Vec<CompletedPatch>,
    pub stats: SearchStats,
    /// Breakdown catalogue with every side path of every patch witnessed.
    pub tree: BreakdownTree,
    /// Units executed locally, deadline splits included.
    pub units: u64,
    pub invariant_failures: u64,
    /// False when the run was interrupted before exhausting the tree.
    pub complete: bool,
}

/// Merge one group result into a report, witnessing its side paths.
pub(crate) fn merge_result(report: &mut SolveReport, pb: &Problem, r: UnitResult) {
    report.stats.merge(&r.stats);
    for p in r.patches {
        for (side, path) in p.side_paths.iter().enumerate() {
            let lens: Vec<u8> = path.iter().map(|&(c, _)| c).collect();
            let hit = report.tree.witness(pb.side_classes[side], &lens);
            debug_assert!(hit, "completed side path missing from the catalogue");
        }
        report.patches.push(p);
    }
}

/// Run the search to exhaustion on the local pool and merge everything.
pub fn solve_local(pb: &Arc<Problem>, cfg: &SchedulerCfg) -> SolveReport {
    let pool = Scheduler::new(pb.clone(), cfg.clone());
    let seeds = seed_states(pb);
    tracing::info!(side = pb.start_side, seeds = seeds.len(), "seeding search");
    for s in seeds {
        pool.submit(s);
    }
    pool.wait_idle();
    let results = pool.take_finished();
    let mut report = SolveReport {
        patches: Vec::new(),
        stats: SearchStats::default(),
        tree: pb.tree.clone(),
        units: pool.executed(),
        invariant_failures: pool.invariant_failures(),
        complete: true,
    };
    pool.shutdown();
    for r in results {
        merge_result(&mut report, pb, r);
    }
    tracing::info!(
        patches = report.patches.len(),
        units = report.units,
        attempts = report.stats.attempts,
        "search exhausted"
    );
    report
}

#[cfg(test)]
mod tests;
