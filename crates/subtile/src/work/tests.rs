use std::collections::HashSet;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::thread;

use super::*;
use crate::boundary::WitnessedPath;
use crate::config::ProblemParams;
use crate::geom::GeomCfg;
use crate::search::{RunOutput, SearchState};

fn bisection() -> Arc<Problem> {
    Arc::new(
        Problem::build(&ProblemParams {
            n: 4,
            prototiles: vec![[1, 1, 2]],
            lambda: vec![0, 1],
            target: 0,
            counts: None,
            start_side: Some(2),
            restrict: false,
            geom: GeomCfg::default(),
        })
        .unwrap(),
    )
}

/// The four fills of the inflated right isoceles tile, straight from the
/// search engine.
fn reference_patches(pb: &Problem) -> Vec<CompletedPatch> {
    let mut out = RunOutput::default();
    let deadline = AtomicBool::new(false);
    let mut st = SearchState::seed(pb, 2, 2).unwrap();
    st.run(pb, &deadline, &mut out);
    assert_eq!(out.patches.len(), 4);
    out.patches
}

fn count_of(patches: &[CompletedPatch], p: &CompletedPatch) -> usize {
    patches.iter().filter(|q| *q == p).count()
}

fn pool_cfg() -> SchedulerCfg {
    SchedulerCfg {
        workers: 2,
        ..SchedulerCfg::default()
    }
}

#[test]
fn ids_stay_distinct_across_threads() {
    let ids = Arc::new(IdAlloc::new());
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let ids = ids.clone();
            thread::spawn(move || (0..100).map(|_| ids.next()).collect::<Vec<u64>>())
        })
        .collect();
    let mut seen = HashSet::new();
    for h in handles {
        for id in h.join().unwrap() {
            assert!(seen.insert(id));
            assert_eq!(id & LOCAL_UNIT_BIT, 0);
        }
    }
    let tagged = IdAlloc::tagged();
    assert_ne!(tagged.next() & LOCAL_UNIT_BIT, 0);
    assert_ne!(tagged.next() & LOCAL_UNIT_BIT, 0);
}

#[test]
fn seed_states_follow_the_start_side() {
    let pb = bisection();
    assert_eq!(seed_states(&pb).len(), 1);
    let seven = Problem::build(&ProblemParams::sevenfold()).unwrap();
    assert_eq!(seed_states(&seven).len(), 2);
}

#[test]
fn local_solve_recovers_every_fill() {
    let pb = bisection();
    let reference = reference_patches(&pb);
    let report = solve_local(&pb, &pool_cfg());

    assert_eq!(report.patches.len(), 4);
    assert_eq!(report.stats.patches, 4);
    assert_eq!(report.invariant_failures, 0);
    assert!(report.units >= 1);
    assert!(report.complete);
    for p in &reference {
        assert_eq!(count_of(&report.patches, p), 1);
    }
    // Every side path of every fill lands in the catalogue: the hypotenuse
    // image splits as d_1 + d_1, the leg images stay whole.
    assert_eq!(
        report.tree.export_witnessed(),
        vec![
            WitnessedPath {
                class: 1,
                lens: vec![2],
                uses: 8,
            },
            WitnessedPath {
                class: 2,
                lens: vec![1, 1],
                uses: 4,
            },
        ]
    );
}

#[test]
fn forced_splits_reassemble_under_one_root() {
    let pb = bisection();
    let reference = reference_patches(&pb);
    // Deadlines arm as soon as the monitor looks, so running units keep
    // shedding subtrees; the patch set must not change.
    let cfg = SchedulerCfg {
        workers: 2,
        grace_ms: 0,
        poll_ms: 1,
        low_water: usize::MAX,
        ..SchedulerCfg::default()
    };
    let pool = Scheduler::new(pb.clone(), cfg);
    let root = pool.submit(SearchState::seed(&pb, 2, 2).unwrap());
    pool.wait_idle();
    let results = pool.take_finished();
    assert_eq!(pool.invariant_failures(), 0);
    pool.shutdown();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].unit, root);
    assert_eq!(results[0].patches.len(), 4);
    for p in &reference {
        assert_eq!(count_of(&results[0].patches, p), 1);
    }
}

#[test]
fn handed_back_units_run_inline_and_group_by_root() {
    let pb = bisection();
    let reference = reference_patches(&pb);

    // Interrupt the seed immediately; it sheds its depth-1 subtrees.
    let mut out = RunOutput::default();
    let armed = AtomicBool::new(true);
    let mut st = SearchState::seed(&pb, 2, 2).unwrap();
    st.run(&pb, &armed, &mut out);
    assert!(out.patches.is_empty());
    assert_eq!(out.spawned.len(), 2);

    // Zero queue capacity: every submission runs on this thread.
    let cfg = SchedulerCfg {
        workers: 1,
        queue_cap: 0,
        ..SchedulerCfg::default()
    };
    let pool = Scheduler::new(pb.clone(), cfg);
    for (k, s) in out.spawned.into_iter().enumerate() {
        pool.submit_unit(WorkUnit {
            id: 100 + k as u64,
            root: 99,
            state: s,
        });
    }
    assert_eq!(pool.executed(), 2);
    assert!(pool.is_idle());
    let results = pool.take_finished();
    pool.shutdown();

    assert_eq!(results.len(), 2);
    let mut all = Vec::new();
    for r in &results {
        assert_eq!(r.unit, 99);
        all.extend(r.patches.iter().cloned());
    }
    assert_eq!(all.len(), 4);
    for p in &reference {
        assert_eq!(count_of(&all, p), 1);
    }
}

#[test]
fn surrender_hands_back_everything_and_leaves_the_pool_clean() {
    let pb = bisection();
    let reference = reference_patches(&pb);
    let pool = Scheduler::new(pb.clone(), pool_cfg());
    let seed = SearchState::seed(&pb, 2, 2).unwrap();
    for _ in 0..8 {
        pool.submit(seed.clone());
    }
    let (results, units) = pool.surrender();
    assert_eq!(pool.pending(), 0);
    assert_eq!(pool.running(), 0);
    assert_eq!(pool.open_groups(), 0);
    assert!(pool.take_finished().is_empty());

    // Finishing the handed-back units recovers exactly what the interrupted
    // runs left unexplored.
    let mut all: Vec<CompletedPatch> = Vec::new();
    for r in &results {
        all.extend(r.patches.iter().cloned());
    }
    for u in units {
        let mut out = RunOutput::default();
        let open = AtomicBool::new(false);
        let mut st = u.state;
        st.run(&pb, &open, &mut out);
        assert!(out.spawned.is_empty());
        all.extend(out.patches);
    }
    pool.shutdown();

    assert_eq!(all.len(), 32);
    for p in &reference {
        assert_eq!(count_of(&all, p), 8);
    }
}
