//! Serializable run configuration.
//!
//! `ProblemParams` is the full description of a search task. It travels in
//! checkpoint files and alongside dispatched work units, and its contents
//! determine the entire deterministic setup (orientation ids, catalogue
//! structure, region corners), so two processes given equal params agree on
//! every identifier.

use crate::geom::GeomCfg;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Description of one search task.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProblemParams {
    /// Symmetry order n; all angles are multiples of π/n.
    pub n: usize,
    /// Prototile angle triples in units of π/n, each summing to n.
    pub prototiles: Vec<[u8; 3]>,
    /// Inflation factor over the length-class basis (d_1..d_⌊n/2⌋).
    pub lambda: Vec<i64>,
    /// Index of the prototile whose inflation is being decomposed.
    pub target: usize,
    /// Tile counts per patch; required when the area system is dependent.
    #[serde(default)]
    pub counts: Option<Vec<u32>>,
    /// Region side the factory seeds from; defaults to the shortest side.
    #[serde(default)]
    pub start_side: Option<usize>,
    /// Restrict edge decompositions to catalogued (witnessed) ones.
    #[serde(default)]
    pub restrict: bool,
    #[serde(default)]
    pub geom: GeomCfg,
}

impl ProblemParams {
    /// The classic 7-fold task: three prototiles, inflation by d_3.
    pub fn sevenfold() -> ProblemParams {
        ProblemParams {
            n: 7,
            prototiles: vec![[1, 2, 4], [1, 3, 3], [2, 2, 3]],
            lambda: vec![0, 0, 1],
            target: 2,
            counts: None,
            start_side: None,
            restrict: false,
            geom: GeomCfg::default(),
        }
    }
}

/// Worker-pool configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerCfg {
    /// Worker thread count.
    pub workers: usize,
    /// Pending-queue capacity; submissions beyond it run on the submitter.
    pub queue_cap: usize,
    /// Deadlines arm only while fewer than this many units are pending.
    pub low_water: usize,
    /// Grace period before a running unit's deadline may arm, in ms.
    pub grace_ms: u64,
    /// Monitor poll interval, in ms.
    pub poll_ms: u64,
    /// Directory for panic postmortem unit snapshots.
    pub postmortem_dir: Option<std::path::PathBuf>,
}

impl Default for SchedulerCfg {
    fn default() -> Self {
        let workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        Self {
            workers,
            queue_cap: 1024,
            low_water: 2 * workers,
            grace_ms: 2_000,
            poll_ms: 50,
            postmortem_dir: None,
        }
    }
}

impl SchedulerCfg {
    #[inline]
    pub fn grace(&self) -> Duration {
        Duration::from_millis(self.grace_ms)
    }

    #[inline]
    pub fn poll(&self) -> Duration {
        Duration::from_millis(self.poll_ms)
    }
}

/// Wire configuration shared by the coordinator and its clients.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetCfg {
    /// Shared secret echoed in the handshake.
    pub token: String,
    /// Connection attempts before a client gives up.
    pub retry_attempts: u32,
    /// Pause between connection attempts, in ms.
    pub retry_backoff_ms: u64,
    /// Socket read timeout; also the idle-duty tick, in ms.
    pub io_timeout_ms: u64,
    /// How often a hungry client asks for more units, in ms.
    pub request_every_ms: u64,
    /// How often the coordinator reclaims work from clients while its own
    /// pool is idle, in ms.
    pub rebalance_every_ms: u64,
    /// Dead-connection sweep interval, in ms.
    pub sweep_every_ms: u64,
    /// Interim results checkpoint interval, in ms; `None` disables it.
    pub checkpoint_every_ms: Option<u64>,
}

impl Default for NetCfg {
    fn default() -> Self {
        Self {
            token: "subtile".to_owned(),
            retry_attempts: 10,
            retry_backoff_ms: 500,
            io_timeout_ms: 200,
            request_every_ms: 250,
            rebalance_every_ms: 5_000,
            sweep_every_ms: 1_000,
            checkpoint_every_ms: Some(30_000),
        }
    }
}

impl NetCfg {
    #[inline]
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    #[inline]
    pub fn io_timeout(&self) -> Duration {
        Duration::from_millis(self.io_timeout_ms)
    }

    #[inline]
    pub fn request_every(&self) -> Duration {
        Duration::from_millis(self.request_every_ms)
    }

    #[inline]
    pub fn rebalance_every(&self) -> Duration {
        Duration::from_millis(self.rebalance_every_ms)
    }

    #[inline]
    pub fn sweep_every(&self) -> Duration {
        Duration::from_millis(self.sweep_every_ms)
    }

    #[inline]
    pub fn checkpoint_every(&self) -> Option<Duration> {
        self.checkpoint_every_ms.map(Duration::from_millis)
    }
}
