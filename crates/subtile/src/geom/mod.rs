//! Exact geometry: cyclotomic coordinates, symmetry context, prototiles.
//!
//! Purpose
//! - Keep every placement decision exact. Points are integer vectors over the
//!   canonical basis of Z[x]/Φ_2n(x); rotation, reflection, translation and
//!   inflation are integer-linear maps; point identity is coordinate equality.
//! - A small number of orientation-disambiguating comparisons (left/right of
//!   a line, segment range tests, collision distance) go through the float
//!   embedding with the tolerances in `GeomCfg`.
//!
//! `Problem` assembles one search task: symmetry order, prototile set with
//! orientation ids, inflation factor, required tile counts, the inflated
//! region, and the breakdown catalogue.

mod cyclo;
mod proto;
mod symmetry;

pub use cyclo::{cyclotomic, Coeffs, CycloRing};
pub use proto::{required_counts, CountOutcome, ProtoSet, Prototile};
pub use symmetry::{GeomCfg, Symmetry};

pub(crate) use proto::class_scale;

use crate::boundary::BreakdownTree;
use crate::config::ProblemParams;
use crate::orient::OrientPool;
use std::fmt;

/// Error type for problem construction.
#[derive(Debug)]
pub enum GeomError {
    InvalidParams { reason: String },
    CountsRequired { reason: String },
}

impl GeomError {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidParams {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for GeomError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidParams { reason } => write!(f, "invalid problem params: {reason}"),
            Self::CountsRequired { reason } => {
                write!(f, "tile counts must be supplied: {reason}")
            }
        }
    }
}

impl std::error::Error for GeomError {}

/// One fully-assembled search task, shared read-only by all work units.
#[derive(Clone, Debug)]
pub struct Problem {
    pub sym: Symmetry,
    pub protos: ProtoSet,
    pub tree: BreakdownTree,
    pub pool: OrientPool,
    /// Inflation factor over the length-class basis.
    pub lambda: Vec<i64>,
    /// Index of the prototile being inflated.
    pub target: usize,
    /// Required number of copies of each prototile per completed patch.
    pub counts: Vec<u32>,
    /// Corners of the inflated region, counter-clockwise.
    pub corners: [Coeffs; 3],
    /// Direction step of side s (from corner s to corner s+1).
    pub side_steps: [u16; 3],
    /// Length class of side s before inflation.
    pub side_classes: [u8; 3],
    /// Side the unit factory seeds from.
    pub start_side: usize,
    /// Only decompositions already witnessed in the catalogue are allowed.
    pub restrict: bool,
}

impl Problem {
    /// Build a problem from its serializable description.
    ///
    /// Construction is deterministic: two processes given equal params build
    /// identical orientation pools, catalogues, and regions.
    pub fn build(params: &ProblemParams) -> Result<Problem, GeomError> {
        if params.n < 3 {
            return Err(GeomError::invalid("symmetry order must be at least 3"));
        }
        let sym = Symmetry::new(params.n, params.geom);
        if params.lambda.len() != sym.m || params.lambda.iter().all(|&c| c == 0) {
            return Err(GeomError::invalid(format!(
                "inflation factor needs {} class coefficients, not all zero",
                sym.m
            )));
        }
        if params.lambda.iter().any(|&c| c < 0) {
            return Err(GeomError::invalid("inflation coefficients must be >= 0"));
        }
        let mut pool = OrientPool::new(sym.m);
        let protos = ProtoSet::build(&sym, &params.prototiles, &mut pool)?;
        if params.target >= protos.len() {
            return Err(GeomError::invalid(format!(
                "target index {} out of range",
                params.target
            )));
        }
        let tree = BreakdownTree::build(&sym, &params.lambda, &mut pool);

        let counts = match &params.counts {
            Some(c) => {
                if c.len() != protos.len() {
                    return Err(GeomError::invalid(format!(
                        "expected {} counts, got {}",
                        protos.len(),
                        c.len()
                    )));
                }
                // Zero remaining tiles must imply a full cover, so supplied
                // counts still have to balance the area equation.
                let rhs = class_scale(
                    &sym,
                    &class_scale(&sym, &protos.tiles[params.target].area, &params.lambda),
                    &params.lambda,
                );
                let mut lhs = vec![0i64; sym.m];
                for (t, &k) in protos.tiles.iter().zip(c.iter()) {
                    for (i, &a) in t.area.iter().enumerate() {
                        lhs[i] += k as i64 * a;
                    }
                }
                if lhs != rhs {
                    return Err(GeomError::invalid(
                        "supplied counts do not balance the inflated area",
                    ));
                }
                c.clone()
            }
            None => match required_counts(&sym, &protos.tiles, &params.lambda, params.target) {
                CountOutcome::Unique(c) => c,
                CountOutcome::Dependent => {
                    return Err(GeomError::CountsRequired {
                        reason: "tile areas are dependent for this symmetry order".into(),
                    })
                }
                CountOutcome::Infeasible(reason) => {
                    return Err(GeomError::invalid(format!(
                        "area equation has no tiling solution: {reason}"
                    )))
                }
            },
        };
        if counts.iter().all(|&c| c == 0) {
            return Err(GeomError::invalid("tile counts are all zero"));
        }

        // Unit target at the origin, first side along step 0, then inflated.
        let t = &protos.tiles[params.target];
        let n = sym.n as i32;
        let step0 = 0u16;
        let step1 = sym.step_add(step0, n - t.angles[1] as i32);
        let step2 = sym.step_add(step1, n - t.angles[2] as i32);
        let v0 = sym.origin();
        let v1 = &v0 + sym.direction(t.lens[0], step0);
        let v2 = &v1 + sym.direction(t.lens[1], step1);
        let ring = sym.ring();
        let lam = sym.class_elem(&params.lambda);
        let corners = [
            ring.mul(&v0, &lam),
            ring.mul(&v1, &lam),
            ring.mul(&v2, &lam),
        ];
        let side_steps = [step0, step1, step2];
        let side_classes = t.lens;

        let start_side = match params.start_side {
            Some(s) if s < 3 => s,
            Some(s) => {
                return Err(GeomError::invalid(format!("start side {s} out of range")));
            }
            None => {
                // Shortest inflated side; ties break to the lower index.
                let mut best = 0;
                for s in 1..3 {
                    let a = sym.class_real(tree.capacity(side_classes[s]));
                    let b = sym.class_real(tree.capacity(side_classes[best]));
                    if a < b {
                        best = s;
                    }
                }
                best
            }
        };

        Ok(Problem {
            sym,
            protos,
            tree,
            pool,
            lambda: params.lambda.clone(),
            target: params.target,
            counts,
            corners,
            side_steps,
            side_classes,
            start_side,
            restrict: params.restrict,
        })
    }

    /// Total number of tiles in a completed patch.
    pub fn total_tiles(&self) -> u32 {
        self.counts.iter().sum()
    }

    /// Orientation universe size for fresh partitions.
    pub fn universe(&self) -> u32 {
        self.pool.total()
    }
}

#[cfg(test)]
mod tests;
