//! Prototiles and the tile-count equation.
//!
//! A prototile is an angle triple (a, b, c) in units of π/n with a+b+c = n.
//! Side i runs from vertex i to vertex i+1 counter-clockwise and has the
//! length class of the angle opposite it. Every side owns an orientation id;
//! the mirror image of a tile traverses the reversed sides, so a flipped
//! placement reads sides backwards and negates their orientations.
//!
//! All prototiles share one circumcircle (law of sines with d_k =
//! sin(kπ/n)/sin(π/n)), so tile areas are proportional to the product of the
//! three side lengths and the count equation can be posed exactly in the
//! folded length-class basis.

use super::symmetry::Symmetry;
use super::GeomError;
use crate::orient::OrientPool;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Prototile {
    pub id: usize,
    /// Interior angles in units of π/n, counter-clockwise.
    pub angles: [u8; 3],
    /// Length class of side i (between vertices i and i+1).
    pub lens: [u8; 3],
    /// Orientation id of side i for the unflipped tile.
    pub orients: [i32; 3],
    /// d_{l0}·d_{l1}·d_{l2} over the class basis; proportional to the area.
    pub area: Vec<i64>,
}

impl Prototile {
    /// Length class of side i under the given chirality.
    #[inline]
    pub fn side_len(&self, flip: bool, i: usize) -> u8 {
        if flip {
            self.lens[2 - i]
        } else {
            self.lens[i]
        }
    }

    /// Orientation id of side i under the given chirality.
    #[inline]
    pub fn side_orient(&self, flip: bool, i: usize) -> i32 {
        if flip {
            -self.orients[2 - i]
        } else {
            self.orients[i]
        }
    }

    /// Interior angle at vertex v under the given chirality.
    #[inline]
    pub fn angle_at(&self, flip: bool, v: usize) -> u8 {
        if flip {
            self.angles[(3 - v) % 3]
        } else {
            self.angles[v]
        }
    }

    /// Side indices with the given length class, in side order.
    pub fn matching_sides(&self, flip: bool, class: u8) -> Vec<usize> {
        (0..3)
            .filter(|&i| self.side_len(flip, i) == class)
            .collect()
    }
}

/// Outcome of the tile-count equation for one inflation target.
#[derive(Clone, Debug, PartialEq)]
pub enum CountOutcome {
    /// The equation has exactly one solution, and it is nonnegative integer.
    Unique(Vec<u32>),
    /// The tile areas are linearly dependent over the class basis; the counts
    /// must be supplied by configuration.
    Dependent,
    /// No nonnegative integer solution exists.
    Infeasible(String),
}

/// The prototile family of a problem, with derived pruning tables.
#[derive(Clone, Debug)]
pub struct ProtoSet {
    pub tiles: Vec<Prototile>,
    /// wedge[(a−1)·m + (b−1)]: some prototile has a unit angle between sides
    /// of classes a and b. Placements that pinch off a unit wedge with any
    /// other length pair can never be completed.
    wedge: Vec<bool>,
    m: usize,
}

impl ProtoSet {
    /// Validate angle triples, assign side orientations, and precompute areas.
    pub fn build(
        sym: &Symmetry,
        triples: &[[u8; 3]],
        pool: &mut OrientPool,
    ) -> Result<ProtoSet, GeomError> {
        if triples.is_empty() {
            return Err(GeomError::invalid("need at least one prototile"));
        }
        let n = sym.n as u32;
        let mut tiles = Vec::with_capacity(triples.len());
        for (id, &angles) in triples.iter().enumerate() {
            let sum: u32 = angles.iter().map(|&a| a as u32).sum();
            if sum != n || angles.iter().any(|&a| a == 0) {
                return Err(GeomError::invalid(format!(
                    "prototile {angles:?}: angles must be positive units summing to {n}"
                )));
            }
            let lens = [
                sym.angle_class(angles[2]),
                sym.angle_class(angles[0]),
                sym.angle_class(angles[1]),
            ];
            let orients = [pool.alloc(lens[0]), pool.alloc(lens[1]), pool.alloc(lens[2])];
            let mut area = sym.class_product(lens[0], lens[1]);
            area = sym.class_mul(&area, lens[2]);
            tiles.push(Prototile {
                id,
                angles,
                lens,
                orients,
                area,
            });
        }
        let m = sym.m;
        let mut wedge = vec![false; m * m];
        for t in &tiles {
            for v in 0..3 {
                if t.angles[v] == 1 {
                    let a = t.lens[(v + 2) % 3] as usize;
                    let b = t.lens[v] as usize;
                    wedge[(a - 1) * m + (b - 1)] = true;
                    wedge[(b - 1) * m + (a - 1)] = true;
                }
            }
        }
        Ok(ProtoSet { tiles, wedge, m })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// True iff a unit angle between edges of classes `a` and `b` occurs in
    /// some prototile (order-insensitive).
    #[inline]
    pub fn unit_wedge_realizable(&self, a: u8, b: u8) -> bool {
        self.wedge[(a as usize - 1) * self.m + (b as usize - 1)]
    }
}

fn gcd(a: i128, b: i128) -> i128 {
    let (mut a, mut b) = (a.abs(), b.abs());
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

/// Determinant by fraction-free (Bareiss) elimination; exact over i128.
fn bareiss_det(mut m: Vec<Vec<i128>>) -> i128 {
    let n = m.len();
    if n == 0 {
        return 1;
    }
    let mut sign = 1i128;
    let mut prev = 1i128;
    for k in 0..n - 1 {
        if m[k][k] == 0 {
            let Some(swap) = (k + 1..n).find(|&r| m[r][k] != 0) else {
                return 0;
            };
            m.swap(k, swap);
            sign = -sign;
        }
        for i in k + 1..n {
            for j in k + 1..n {
                m[i][j] = (m[i][j] * m[k][k] - m[i][k] * m[k][j]) / prev;
            }
            m[i][k] = 0;
        }
        prev = m[k][k];
    }
    sign * m[n - 1][n - 1]
}

/// Multiply a class-basis vector by a class-basis combination.
pub(crate) fn class_scale(sym: &Symmetry, v: &[i64], by: &[i64]) -> Vec<i64> {
    let mut out = vec![0i64; sym.m];
    for (k, &c) in by.iter().enumerate() {
        if c != 0 {
            for (i, &p) in sym.class_mul(v, k as u8 + 1).iter().enumerate() {
                out[i] += c * p;
            }
        }
    }
    out
}

/// Solve Σ counts_i · area_i = λ²·area_target exactly over the class basis.
///
/// `lambda` is the inflation factor over the class basis. Uniqueness is
/// decided over the rationals: when the area vectors do not span a full-rank
/// system (which happens for composite n where the d_k are dependent), the
/// caller must supply counts instead.
pub fn required_counts(
    sym: &Symmetry,
    tiles: &[Prototile],
    lambda: &[i64],
    target: usize,
) -> CountOutcome {
    let m = sym.m;
    let p = tiles.len();
    let rhs_vec = class_scale(sym, &class_scale(sym, &tiles[target].area, lambda), lambda);
    // Columns are tile areas; rows are length classes.
    let a: Vec<Vec<i128>> = (0..m)
        .map(|r| (0..p).map(|c| tiles[c].area[r] as i128).collect())
        .collect();
    let rhs: Vec<i128> = rhs_vec.iter().map(|&x| x as i128).collect();

    // Row-echelon pass on a copy to find p independent rows.
    let mut work: Vec<(Vec<i128>, usize)> = a.iter().cloned().zip(0..m).collect();
    let mut pivot_rows: Vec<usize> = Vec::new();
    let mut col = 0;
    let mut row = 0;
    while col < p && row < work.len() {
        let Some(pr) = (row..work.len()).find(|&r| work[r].0[col] != 0) else {
            col += 1;
            continue;
        };
        work.swap(row, pr);
        pivot_rows.push(work[row].1);
        let (head, tail) = work.split_at_mut(row + 1);
        let prow = &head[row].0;
        let pv = prow[col];
        for (r, _) in tail.iter_mut() {
            let f = r[col];
            if f != 0 {
                for j in 0..p {
                    r[j] = r[j] * pv - prow[j] * f;
                }
                let g = r.iter().fold(0i128, |acc, &x| gcd(acc, x));
                if g > 1 {
                    for x in r.iter_mut() {
                        *x /= g;
                    }
                }
            }
        }
        col += 1;
        row += 1;
    }
    if pivot_rows.len() < p {
        return CountOutcome::Dependent;
    }

    // Cramer on the pivot subsystem, then exact verification on all rows.
    let base: Vec<Vec<i128>> = pivot_rows.iter().map(|&r| a[r].clone()).collect();
    let det = bareiss_det(base.clone());
    debug_assert_ne!(det, 0);
    let mut counts = Vec::with_capacity(p);
    for j in 0..p {
        let mut mj = base.clone();
        for (i, &r) in pivot_rows.iter().enumerate() {
            mj[i][j] = rhs[r];
        }
        let num = bareiss_det(mj);
        if num % det != 0 {
            return CountOutcome::Infeasible(format!(
                "count of tile {j} is not an integer ({num}/{det})"
            ));
        }
        let c = num / det;
        if c < 0 {
            return CountOutcome::Infeasible(format!("count of tile {j} is negative ({c})"));
        }
        counts.push(c as u32);
    }
    for r in 0..m {
        let lhs: i128 = (0..p).map(|c| a[r][c] * counts[c] as i128).sum();
        if lhs != rhs[r] {
            return CountOutcome::Infeasible(format!("area equation fails on class {}", r + 1));
        }
    }
    CountOutcome::Unique(counts)
}
