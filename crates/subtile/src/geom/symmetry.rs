//! Symmetry context: directions, edge lengths, and delegated comparisons.
//!
//! Purpose
//! - Wrap the cyclotomic ring with everything the tiling search asks of the
//!   plane: step directions in units of π/n, the edge-length family
//!   d_k = sin(kπ/n)/sin(π/n), products of lengths in the folded class basis,
//!   and the float embedding used for sign predicates.
//!
//! All placement decisions are exact-integer on ring coordinates. The float
//! embedding only ever answers sign questions (left/right, between, near) that
//! are far from ties for the coordinate ranges a patch can reach; the
//! tolerances for those live in `GeomCfg`.

use super::cyclo::{Coeffs, CycloRing};
use serde::{Deserialize, Serialize};

/// Geometry configuration (tolerances for delegated comparisons).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeomCfg {
    /// Below this magnitude a cross product counts as collinear.
    pub eps_col: f64,
    /// Distinct vertices closer than this are treated as colliding.
    pub close_eps: f64,
    /// New interior vertices must clear the region sides by this margin.
    pub margin: f64,
}

impl Default for GeomCfg {
    fn default() -> Self {
        Self {
            eps_col: 1e-7,
            close_eps: 1e-5,
            margin: 1e-7,
        }
    }
}

/// Shared geometric context for one symmetry order n.
#[derive(Clone, Debug)]
pub struct Symmetry {
    ring: CycloRing,
    /// Symmetry order: rotation steps are multiples of π/n.
    pub n: usize,
    /// Number of canonical edge-length classes, ⌊n/2⌋.
    pub m: usize,
    pub cfg: GeomCfg,
    /// d_k as ring elements, index k−1.
    lengths: Vec<Coeffs>,
    /// dirs[k−1][a] = d_k · ζ^a for a in 0..2n.
    dirs: Vec<Vec<Coeffs>>,
    /// d_k as reals, index k−1.
    len_real: Vec<f64>,
    /// Embedding of the basis powers ζ^k, k in 0..dim.
    embed: Vec<(f64, f64)>,
}

impl Symmetry {
    pub fn new(n: usize, cfg: GeomCfg) -> Symmetry {
        let ring = CycloRing::new(n);
        let m = n / 2;
        // d_k = ζ^{k−1} + ζ^{k−3} + … + ζ^{−(k−1)}, a real element of the ring.
        let mut lengths = Vec::with_capacity(m);
        for k in 1..=m {
            let mut v = ring.zero();
            for i in 0..k {
                v += &ring.zeta_pow(k as i64 - 1 - 2 * i as i64);
            }
            debug_assert_eq!(ring.conj(&v), v, "edge length must be real");
            lengths.push(v);
        }
        let two_n = 2 * n;
        let mut dirs = Vec::with_capacity(m);
        for k in 0..m {
            let mut per_step = Vec::with_capacity(two_n);
            for a in 0..two_n {
                per_step.push(ring.mul(&lengths[k], &ring.zeta_pow(a as i64)));
            }
            dirs.push(per_step);
        }
        let unit = std::f64::consts::PI / n as f64;
        let len_real = (1..=m)
            .map(|k| (k as f64 * unit).sin() / unit.sin())
            .collect();
        let embed = (0..ring.dim)
            .map(|k| {
                let t = k as f64 * unit;
                (t.cos(), t.sin())
            })
            .collect();
        Symmetry {
            ring,
            n,
            m,
            cfg,
            lengths,
            dirs,
            len_real,
            embed,
        }
    }

    #[inline]
    pub fn ring(&self) -> &CycloRing {
        &self.ring
    }

    #[inline]
    pub fn origin(&self) -> Coeffs {
        self.ring.zero()
    }

    /// Number of direction steps around a full turn.
    #[inline]
    pub fn steps(&self) -> u16 {
        2 * self.n as u16
    }

    /// Canonical length class of the side opposite an angle of `a` units.
    #[inline]
    pub fn angle_class(&self, a: u8) -> u8 {
        debug_assert!(a as usize >= 1 && (a as usize) < self.n);
        u8::min(a, self.n as u8 - a)
    }

    /// d_k as a ring element (k in 1..=m).
    #[inline]
    pub fn length(&self, class: u8) -> &Coeffs {
        &self.lengths[class as usize - 1]
    }

    /// Displacement of an edge of length class `class` pointing along `step`.
    #[inline]
    pub fn direction(&self, class: u8, step: u16) -> &Coeffs {
        &self.dirs[class as usize - 1][step as usize]
    }

    #[inline]
    pub fn step_add(&self, step: u16, delta: i32) -> u16 {
        (step as i32 + delta).rem_euclid(2 * self.n as i32) as u16
    }

    /// Rotate by `steps` multiples of π/n about the origin.
    pub fn rotate(&self, v: &Coeffs, steps: i32) -> Coeffs {
        self.ring.mul(v, &self.ring.zeta_pow(steps as i64))
    }

    /// Reflect across the real axis.
    pub fn reflect(&self, v: &Coeffs) -> Coeffs {
        self.ring.conj(v)
    }

    /// Ring element of a class-basis combination Σ v_k · d_{k+1}.
    pub fn class_elem(&self, v: &[i64]) -> Coeffs {
        debug_assert_eq!(v.len(), self.m);
        let mut out = self.ring.zero();
        for (k, &c) in v.iter().enumerate() {
            if c != 0 {
                out += &(&self.lengths[k] * c);
            }
        }
        out
    }

    /// Product d_j · d_k expanded over the canonical class basis.
    ///
    /// Chebyshev identity: d_j d_k = Σ d_i for i = |j−k|+1, |j−k|+3, …, j+k−1,
    /// with every index folded to min(i, n−i). For canonical j, k the indices
    /// never reach n, so no term vanishes or changes sign.
    pub fn class_product(&self, j: u8, k: u8) -> Vec<i64> {
        debug_assert!(j >= 1 && j as usize <= self.m);
        debug_assert!(k >= 1 && k as usize <= self.m);
        let mut out = vec![0i64; self.m];
        let lo = (j as i32 - k as i32).unsigned_abs() as usize + 1;
        let hi = (j + k - 1) as usize;
        let mut i = lo;
        while i <= hi {
            let folded = usize::min(i, self.n - i);
            out[folded - 1] += 1;
            i += 2;
        }
        out
    }

    /// Multiply a class-basis vector by d_k.
    pub fn class_mul(&self, v: &[i64], k: u8) -> Vec<i64> {
        let mut out = vec![0i64; self.m];
        for (j, &c) in v.iter().enumerate() {
            if c != 0 {
                for (i, &p) in self.class_product(j as u8 + 1, k).iter().enumerate() {
                    out[i] += c * p;
                }
            }
        }
        out
    }

    /// Real value of a class-basis vector (for ordering, never for identity).
    pub fn class_real(&self, v: &[i64]) -> f64 {
        v.iter()
            .zip(&self.len_real)
            .map(|(&c, &d)| c as f64 * d)
            .sum()
    }

    /// Float embedding of a ring point.
    pub fn to_xy(&self, v: &Coeffs) -> (f64, f64) {
        let mut x = 0.0;
        let mut y = 0.0;
        for (k, &(ex, ey)) in self.embed.iter().enumerate() {
            let c = v[k];
            if c != 0 {
                x += c as f64 * ex;
                y += c as f64 * ey;
            }
        }
        (x, y)
    }

    /// Sign of the cross product (b−a) × (c−a): +1 left turn, −1 right, 0 collinear.
    pub fn orient_sign(&self, a: &Coeffs, b: &Coeffs, c: &Coeffs) -> i8 {
        let (ax, ay) = self.to_xy(a);
        let (bx, by) = self.to_xy(b);
        let (cx, cy) = self.to_xy(c);
        let cr = (bx - ax) * (cy - ay) - (by - ay) * (cx - ax);
        if cr > self.cfg.eps_col {
            1
        } else if cr < -self.cfg.eps_col {
            -1
        } else {
            0
        }
    }

    /// Sign of (b−a) · (c−a); used for on-segment range tests.
    pub fn dot_sign(&self, a: &Coeffs, b: &Coeffs, c: &Coeffs) -> i8 {
        let (ax, ay) = self.to_xy(a);
        let (bx, by) = self.to_xy(b);
        let (cx, cy) = self.to_xy(c);
        let d = (bx - ax) * (cx - ax) + (by - ay) * (cy - ay);
        if d > self.cfg.eps_col {
            1
        } else if d < -self.cfg.eps_col {
            -1
        } else {
            0
        }
    }

    pub fn dist2(&self, a: &Coeffs, b: &Coeffs) -> f64 {
        let (ax, ay) = self.to_xy(a);
        let (bx, by) = self.to_xy(b);
        (ax - bx) * (ax - bx) + (ay - by) * (ay - by)
    }

    /// True when two points sit closer than the collision threshold.
    /// Callers exclude exact coincidence first via coordinate equality.
    #[inline]
    pub fn too_close(&self, a: &Coeffs, b: &Coeffs) -> bool {
        self.dist2(a, b) < self.cfg.close_eps * self.cfg.close_eps
    }

    /// Signed perpendicular distance of `p` from the line through `tail`
    /// pointing along `step`; positive on the left of the direction.
    pub fn signed_side(&self, tail: &Coeffs, step: u16, p: &Coeffs) -> f64 {
        let unit = std::f64::consts::PI / self.n as f64;
        let t = step as f64 * unit;
        let (ux, uy) = (t.cos(), t.sin());
        let (tx, ty) = self.to_xy(tail);
        let (px, py) = self.to_xy(p);
        ux * (py - ty) - uy * (px - tx)
    }

    /// Interior angle in units of π/n at a boundary vertex where the region
    /// (kept on the left) arrives along `step_in` and leaves along `step_out`.
    pub fn interior_units(&self, step_in: u16, step_out: u16) -> i32 {
        let n = self.n as i32;
        let t = (step_out as i32 - step_in as i32 + n).rem_euclid(2 * n) - n;
        n - t
    }
}
