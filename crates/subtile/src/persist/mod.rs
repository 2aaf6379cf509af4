//! Checkpoint, catalogue, and postmortem files.
//!
//! Purpose
//! - Results and checkpoints: one JSON file holding the problem params, the
//!   merged stats, and every completed patch found so far. Written atomically
//!   (temp file + rename) so a kill mid-write never corrupts earlier work.
//! - Catalogue: the witnessed edge decompositions. The tree itself is always
//!   re-enumerated from the inflation factor; the file only restores which
//!   paths have been seen in completed patches, and how often.
//! - Postmortems: the pre-run snapshot of a work unit whose search violated
//!   an internal invariant, for offline replay.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::boundary::{BreakdownTree, WitnessedPath};
use crate::config::ProblemParams;
use crate::search::{CompletedPatch, SearchState};
use crate::stats::SearchStats;

#[derive(Debug)]
pub enum PersistError {
    Io(std::io::Error),
    Json(serde_json::Error),
}

impl fmt::Display for PersistError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "persistence io error: {e}"),
            Self::Json(e) => write!(f, "persistence encoding error: {e}"),
        }
    }
}

impl std::error::Error for PersistError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Json(e) => Some(e),
        }
    }
}

impl From<std::io::Error> for PersistError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for PersistError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}

/// Accumulated results of one search task.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResultsFile {
    pub version: String,
    pub params: ProblemParams,
    pub stats: SearchStats,
    pub patches: Vec<CompletedPatch>,
    /// False for interim checkpoints and interrupted runs.
    #[serde(default)]
    pub complete: bool,
}

/// Witnessed edge decompositions for one inflation factor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CatalogueFile {
    pub n: usize,
    pub lambda: Vec<i64>,
    pub witnessed: Vec<WitnessedPath>,
}

/// Snapshot of a unit whose run tripped an internal invariant.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PostmortemFile {
    pub unit: u64,
    pub root: u64,
    pub state: SearchState,
}

/// Serialize `value` to `path` via a temp file in the same directory.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), PersistError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, serde_json::to_vec_pretty(value)?)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, PersistError> {
    let bytes = fs::read(path)?;
    Ok(serde_json::from_slice(&bytes)?)
}

pub fn write_results(
    path: &Path,
    params: &ProblemParams,
    stats: &SearchStats,
    patches: &[CompletedPatch],
    complete: bool,
) -> Result<(), PersistError> {
    let file = ResultsFile {
        version: crate::VERSION.to_string(),
        params: params.clone(),
        stats: *stats,
        patches: patches.to_vec(),
        complete,
    };
    write_json_atomic(path, &file)
}

pub fn load_results(path: &Path) -> Result<ResultsFile, PersistError> {
    read_json(path)
}

pub fn write_catalogue(
    path: &Path,
    n: usize,
    lambda: &[i64],
    tree: &BreakdownTree,
) -> Result<(), PersistError> {
    let file = CatalogueFile {
        n,
        lambda: lambda.to_vec(),
        witnessed: tree.export_witnessed(),
    };
    write_json_atomic(path, &file)
}

/// Restore witness marks from `path` into a freshly enumerated tree.
///
/// Returns false (leaving the tree untouched) when the file is absent or was
/// written for a different symmetry order or inflation factor; the fresh
/// enumeration then stands on its own. Each path is replayed once per
/// recorded use so the use counters come back exact.
pub fn load_catalogue_into(
    path: &Path,
    n: usize,
    lambda: &[i64],
    tree: &mut BreakdownTree,
) -> Result<bool, PersistError> {
    if !path.exists() {
        return Ok(false);
    }
    let file: CatalogueFile = read_json(path)?;
    if file.n != n || file.lambda != lambda {
        tracing::warn!(
            have_n = file.n,
            want_n = n,
            "catalogue file is for a different task, ignoring"
        );
        return Ok(false);
    }
    for p in &file.witnessed {
        for _ in 0..p.uses {
            if !tree.witness(p.class, &p.lens) {
                tracing::warn!(class = p.class, lens = ?p.lens, "catalogued path no longer exists");
                break;
            }
        }
    }
    Ok(true)
}

/// Write `unit-<id>.json` under `dir` with the failing unit's snapshot.
pub fn write_postmortem(
    dir: &Path,
    unit: u64,
    root: u64,
    state: &SearchState,
) -> Result<PathBuf, PersistError> {
    let path = dir.join(format!("unit-{unit}.json"));
    let file = PostmortemFile {
        unit,
        root,
        state: state.clone(),
    };
    write_json_atomic(&path, &file)?;
    Ok(path)
}
