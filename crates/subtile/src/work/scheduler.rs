//! Fixed-size worker pool with deadline-armed work splitting.
//!
//! Purpose
//! - Run work units from a bounded queue. A monitor thread arms the deadline
//!   flag of long-running units whenever the queue drops below the low-water
//!   mark; armed units split off clones, which come back here as new units,
//!   keeping every worker fed.
//! - Aggregate results per ancestry group: patches and counters of a group
//!   are reported once, when its last member finishes.
//! - Bulkhead: a unit whose search trips an internal invariant is isolated.
//!   Its pre-run snapshot goes to the postmortem directory and the pool keeps
//!   running the rest.
//!
//! Submission applies backpressure: when the queue is full the submitting
//! thread executes the unit itself instead of dropping or blocking.

use std::collections::{HashMap, VecDeque};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Instant;

use crate::config::SchedulerCfg;
use crate::geom::Problem;
use crate::persist;
use crate::search::{CompletedPatch, RunOutput, SearchState};
use crate::stats::SearchStats;

use super::unit::{IdAlloc, UnitResult, WorkUnit};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
struct Group {
    pending: u32,
    patches: Vec<CompletedPatch>,
    stats: SearchStats,
}

struct PoolState {
    queue: VecDeque<WorkUnit>,
    running: usize,
    live: bool,
    /// Workers stop popping while set; running units keep going.
    paused: bool,
}

struct ActiveUnit {
    id: u64,
    deadline: Arc<AtomicBool>,
    since: Instant,
}

struct Shared {
    cfg: SchedulerCfg,
    pb: Arc<Problem>,
    ids: IdAlloc,
    state: Mutex<PoolState>,
    work_cv: Condvar,
    idle_cv: Condvar,
    active: Mutex<Vec<ActiveUnit>>,
    groups: Mutex<HashMap<u64, Group>>,
    finished: Mutex<Vec<UnitResult>>,
    executed: AtomicU64,
    invariant_failures: AtomicU64,
}

impl Shared {
    /// Register one more expected member of `root`'s group.
    fn note_pending(&self, root: u64) {
        lock(&self.groups).entry(root).or_default().pending += 1;
    }

    /// Queue the unit, or hand it back when the queue is full or closed.
    fn try_enqueue(&self, unit: WorkUnit) -> Option<WorkUnit> {
        let mut st = lock(&self.state);
        if !st.live || st.queue.len() >= self.cfg.queue_cap {
            return Some(unit);
        }
        st.queue.push_back(unit);
        drop(st);
        self.work_cv.notify_one();
        None
    }

    /// Record one group member done; emits the group result on the last one.
    fn finish(&self, root: u64, patches: Vec<CompletedPatch>, stats: SearchStats) {
        let mut gs = lock(&self.groups);
        let Some(g) = gs.get_mut(&root) else {
            // A requeued copy of an already-completed unit; its patches are
            // duplicates of work the first completion reported.
            tracing::warn!(root, "dropping result for a closed group");
            return;
        };
        g.patches.extend(patches);
        g.stats.merge(&stats);
        g.pending -= 1;
        if g.pending == 0 {
            let Some(g) = gs.remove(&root) else {
                return;
            };
            drop(gs);
            lock(&self.finished).push(UnitResult {
                unit: root,
                patches: g.patches,
                stats: g.stats,
            });
        }
    }

    /// Run `first` and, when the queue overflows, every unit it cascades.
    fn execute(&self, first: WorkUnit) {
        let mut chain = vec![first];
        while let Some(unit) = chain.pop() {
            self.executed.fetch_add(1, Ordering::Relaxed);
            let deadline = Arc::new(AtomicBool::new(false));
            if lock(&self.state).paused {
                deadline.store(true, Ordering::Relaxed);
            }
            lock(&self.active).push(ActiveUnit {
                id: unit.id,
                deadline: deadline.clone(),
                since: Instant::now(),
            });
            let pre = self
                .cfg
                .postmortem_dir
                .as_ref()
                .map(|_| unit.state.clone());

            let mut state = unit.state;
            let mut out = RunOutput::default();
            let res = catch_unwind(AssertUnwindSafe(|| {
                state.run(&self.pb, &deadline, &mut out);
            }));
            lock(&self.active).retain(|a| a.id != unit.id);

            match res {
                Ok(()) => {
                    for s in std::mem::take(&mut out.spawned) {
                        let child = WorkUnit {
                            id: self.ids.next(),
                            root: unit.root,
                            state: s,
                        };
                        self.note_pending(unit.root);
                        if let Some(back) = self.try_enqueue(child) {
                            chain.push(back);
                        }
                    }
                }
                Err(_) => {
                    // The partition, tracker, and tile stack no longer agree;
                    // descendants of this state are not trustworthy.
                    self.invariant_failures.fetch_add(1, Ordering::Relaxed);
                    out.spawned.clear();
                    tracing::error!(unit = unit.id, root = unit.root, "search invariant violated");
                    if let (Some(dir), Some(pre)) = (self.cfg.postmortem_dir.as_deref(), &pre) {
                        match persist::write_postmortem(dir, unit.id, unit.root, pre) {
                            Ok(path) => tracing::info!(path = %path.display(), "postmortem written"),
                            Err(e) => tracing::error!(error = %e, "postmortem write failed"),
                        }
                    }
                }
            }
            // Patches snapshotted before any failure point are sound.
            self.finish(unit.root, out.patches, out.stats);
        }
    }

    fn worker_loop(&self) {
        loop {
            let unit = {
                let mut st = lock(&self.state);
                loop {
                    if !st.paused {
                        if let Some(u) = st.queue.pop_front() {
                            st.running += 1;
                            break Some(u);
                        }
                        if !st.live {
                            break None;
                        }
                    }
                    st = self.work_cv.wait(st).unwrap_or_else(PoisonError::into_inner);
                }
            };
            let Some(unit) = unit else {
                self.idle_cv.notify_all();
                return;
            };
            self.execute(unit);
            let mut st = lock(&self.state);
            st.running -= 1;
            if st.running == 0 {
                drop(st);
                self.idle_cv.notify_all();
            }
        }
    }

    fn monitor_loop(&self) {
        loop {
            thread::sleep(self.cfg.poll());
            let (depth, live, running) = {
                let st = lock(&self.state);
                (st.queue.len(), st.live, st.running)
            };
            if !live && depth == 0 && running == 0 {
                return;
            }
            if depth >= self.cfg.low_water {
                continue;
            }
            for a in lock(&self.active).iter() {
                if a.since.elapsed() >= self.cfg.grace() && !a.deadline.load(Ordering::Relaxed) {
                    a.deadline.store(true, Ordering::Relaxed);
                    tracing::debug!(unit = a.id, "deadline armed");
                }
            }
        }
    }
}

/// Handle to the worker pool. Dropping it stops the workers after the queue
/// drains; `shutdown` additionally joins them.
pub struct Scheduler {
    shared: Arc<Shared>,
    workers: Vec<thread::JoinHandle<()>>,
    monitor: Option<thread::JoinHandle<()>>,
}

impl Scheduler {
    pub fn new(pb: Arc<Problem>, cfg: SchedulerCfg) -> Scheduler {
        Self::with_ids(pb, cfg, IdAlloc::new())
    }

    /// Pool with a caller-chosen id space; clients pass `IdAlloc::tagged()`.
    pub fn with_ids(pb: Arc<Problem>, cfg: SchedulerCfg, ids: IdAlloc) -> Scheduler {
        let shared = Arc::new(Shared {
            pb,
            ids,
            state: Mutex::new(PoolState {
                queue: VecDeque::new(),
                running: 0,
                live: true,
                paused: false,
            }),
            work_cv: Condvar::new(),
            idle_cv: Condvar::new(),
            active: Mutex::new(Vec::new()),
            groups: Mutex::new(HashMap::new()),
            finished: Mutex::new(Vec::new()),
            executed: AtomicU64::new(0),
            invariant_failures: AtomicU64::new(0),
            cfg,
        });
        let workers = (0..shared.cfg.workers.max(1))
            .map(|_| {
                let sh = shared.clone();
                thread::spawn(move || sh.worker_loop())
            })
            .collect();
        let monitor = {
            let sh = shared.clone();
            Some(thread::spawn(move || sh.monitor_loop()))
        };
        Scheduler {
            shared,
            workers,
            monitor,
        }
    }

    /// Submit a fresh initial unit; returns its id (also its group id).
    pub fn submit(&self, state: SearchState) -> u64 {
        let id = self.shared.ids.next();
        self.submit_unit(WorkUnit {
            id,
            root: id,
            state,
        });
        id
    }

    /// Submit a unit keeping its id and group; used for units arriving over
    /// the wire. Runs the unit on the calling thread when the queue is full.
    pub fn submit_unit(&self, unit: WorkUnit) {
        self.shared.note_pending(unit.root);
        if let Some(back) = self.shared.try_enqueue(unit) {
            self.shared.execute(back);
        }
    }

    /// Put a dispatched unit back on the queue without re-registering its
    /// group; the registration from the original submission still stands.
    pub fn requeue(&self, unit: WorkUnit) {
        if let Some(back) = self.shared.try_enqueue(unit) {
            self.shared.execute(back);
        }
    }

    /// Pop up to `k` pending units for dispatch elsewhere. Their group
    /// registrations stay open until a result comes back.
    pub fn take_pending(&self, k: usize) -> Vec<WorkUnit> {
        let mut st = lock(&self.shared.state);
        let n = k.min(st.queue.len());
        st.queue.drain(..n).collect()
    }

    /// Close a group whose unit ran remotely.
    pub fn finish_external(&self, result: UnitResult) {
        self.shared.finish(result.unit, result.patches, result.stats);
    }

    /// Drain completed group results.
    pub fn take_finished(&self) -> Vec<UnitResult> {
        std::mem::take(&mut *lock(&self.shared.finished))
    }

    pub fn pending(&self) -> usize {
        lock(&self.shared.state).queue.len()
    }

    pub fn running(&self) -> usize {
        lock(&self.shared.state).running
    }

    /// Queue empty and nothing executing, in one consistent snapshot.
    pub fn is_idle(&self) -> bool {
        let st = lock(&self.shared.state);
        st.queue.is_empty() && st.running == 0
    }

    /// Open groups, i.e. units submitted here whose results have not come
    /// back yet (including ones dispatched elsewhere).
    pub fn open_groups(&self) -> usize {
        lock(&self.shared.groups).len()
    }

    /// Block until the queue is empty and no unit is executing.
    pub fn wait_idle(&self) {
        let mut st = lock(&self.shared.state);
        while !(st.queue.is_empty() && st.running == 0) {
            st = self
                .shared
                .idle_cv
                .wait(st)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Stop all local work for hand-off: arm every active deadline, wait for
    /// running units to finish or split, then drain the queue and every open
    /// group. Returns the (possibly partial) group results and the unclaimed
    /// units; afterwards the pool is empty and accepts work again.
    pub fn surrender(&self) -> (Vec<UnitResult>, Vec<WorkUnit>) {
        {
            let mut st = lock(&self.shared.state);
            st.paused = true;
        }
        for a in lock(&self.shared.active).iter() {
            a.deadline.store(true, Ordering::Relaxed);
        }
        {
            let mut st = lock(&self.shared.state);
            while st.running > 0 {
                st = self
                    .shared
                    .idle_cv
                    .wait(st)
                    .unwrap_or_else(PoisonError::into_inner);
            }
        }
        let units: Vec<WorkUnit> = {
            let mut st = lock(&self.shared.state);
            let units = st.queue.drain(..).collect();
            st.paused = false;
            units
        };
        self.shared.work_cv.notify_all();

        let mut results = take_all(&self.shared.finished);
        let mut gs = lock(&self.shared.groups);
        for (root, g) in gs.drain() {
            results.push(UnitResult {
                unit: root,
                patches: g.patches,
                stats: g.stats,
            });
        }
        (results, units)
    }

    pub fn fresh_id(&self) -> u64 {
        self.shared.ids.next()
    }

    /// Units executed on this pool so far.
    pub fn executed(&self) -> u64 {
        self.shared.executed.load(Ordering::Relaxed)
    }

    pub fn invariant_failures(&self) -> u64 {
        self.shared.invariant_failures.load(Ordering::Relaxed)
    }

    /// Stop accepting work, drain the queue, and join every thread.
    pub fn shutdown(mut self) {
        {
            let mut st = lock(&self.shared.state);
            st.live = false;
        }
        self.shared.work_cv.notify_all();
        for w in std::mem::take(&mut self.workers) {
            let _ = w.join();
        }
        if let Some(m) = self.monitor.take() {
            let _ = m.join();
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        let mut st = lock(&self.shared.state);
        st.live = false;
        drop(st);
        self.shared.work_cv.notify_all();
    }
}

fn take_all(m: &Mutex<Vec<UnitResult>>) -> Vec<UnitResult> {
    std::mem::take(&mut *lock(m))
}
