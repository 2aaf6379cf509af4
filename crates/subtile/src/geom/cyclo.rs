//! Exact arithmetic in the cyclotomic ring Z[ζ], ζ = exp(iπ/n).
//!
//! Elements are integer coordinate vectors over the power basis
//! `1, ζ, …, ζ^{d−1}` of Z[x]/Φ_2n(x), where Φ_2n is the 2n-th cyclotomic
//! polynomial and `d = φ(2n)`. The representation is faithful: two elements
//! are equal as complex numbers iff their coordinate vectors are equal, which
//! is what makes exact point identity tests possible downstream.
//!
//! Multiplication by ζ is the rotation by π/n, conjugation is the reflection
//! across the real axis, and ζ^n = −1 holds because Φ_2n divides x^n + 1.

use nalgebra::DVector;

/// Integer coordinates of a ring element over the canonical power basis.
pub type Coeffs = DVector<i64>;

/// Narrow an i128 accumulator back to i64 ring coordinates.
///
/// Coordinates stay tiny for every feasible patch (tile counts and inflation
/// factors are small), so an overflow here is a logic error, not bad input.
#[inline]
fn narrow(x: i128) -> i64 {
    debug_assert!(
        x >= i64::MIN as i128 && x <= i64::MAX as i128,
        "ring coordinate overflow"
    );
    x as i64
}

fn poly_mul(a: &[i64], b: &[i64]) -> Vec<i64> {
    let mut out = vec![0i128; a.len() + b.len() - 1];
    for (i, &ai) in a.iter().enumerate() {
        if ai == 0 {
            continue;
        }
        for (j, &bj) in b.iter().enumerate() {
            out[i + j] += ai as i128 * bj as i128;
        }
    }
    out.into_iter().map(narrow).collect()
}

/// Exact division of `num` by monic `den`; the remainder must vanish.
fn poly_div_exact(num: &[i64], den: &[i64]) -> Vec<i64> {
    debug_assert_eq!(*den.last().unwrap_or(&0), 1, "divisor must be monic");
    let mut rem: Vec<i128> = num.iter().map(|&c| c as i128).collect();
    let dd = den.len() - 1;
    let qd = num.len() - den.len();
    let mut quot = vec![0i128; qd + 1];
    for k in (0..=qd).rev() {
        let c = rem[k + dd];
        quot[k] = c;
        if c != 0 {
            for (j, &dj) in den.iter().enumerate() {
                rem[k + j] -= c * dj as i128;
            }
        }
    }
    debug_assert!(rem.iter().all(|&c| c == 0), "non-exact polynomial division");
    quot.into_iter().map(narrow).collect()
}

/// Coefficients of the n-th cyclotomic polynomial, constant term first, monic.
///
/// Computed by dividing x^n − 1 by the product of Φ_d over proper divisors d.
pub fn cyclotomic(n: usize) -> Vec<i64> {
    debug_assert!(n >= 1);
    if n == 1 {
        return vec![-1, 1];
    }
    let mut num = vec![0i64; n + 1];
    num[0] = -1;
    num[n] = 1;
    let mut den = vec![1i64];
    for d in 1..n {
        if n % d == 0 {
            den = poly_mul(&den, &cyclotomic(d));
        }
    }
    poly_div_exact(&num, &den)
}

/// The ring Z[x]/Φ_2n(x) with precomputed canonical forms of small powers.
#[derive(Clone, Debug)]
pub struct CycloRing {
    /// Symmetry order n; ζ = exp(iπ/n) is a primitive 2n-th root of unity.
    pub n: usize,
    /// Basis size d = φ(2n).
    pub dim: usize,
    /// Canonical coordinates of x^k for k in 0..max(2d−1, 2n).
    pows: Vec<Coeffs>,
}

impl CycloRing {
    pub fn new(n: usize) -> CycloRing {
        debug_assert!(n >= 2, "symmetry order must be at least 2");
        let phi = cyclotomic(2 * n);
        let dim = phi.len() - 1;
        // x^m for m >= dim reduces through x^dim = −(phi_0 + … + phi_{dim−1} x^{dim−1}).
        let max_pow = usize::max(2 * dim, 2 * n);
        let mut pows: Vec<Coeffs> = Vec::with_capacity(max_pow);
        for m in 0..max_pow {
            if m < dim {
                let mut v = DVector::zeros(dim);
                v[m] = 1;
                pows.push(v);
            } else {
                let mut v: DVector<i128> = DVector::zeros(dim);
                for k in 0..dim {
                    if phi[k] != 0 {
                        let base = &pows[m - dim + k];
                        for i in 0..dim {
                            v[i] -= phi[k] as i128 * base[i] as i128;
                        }
                    }
                }
                pows.push(DVector::from_iterator(dim, v.iter().map(|&c| narrow(c))));
            }
        }
        CycloRing { n, dim, pows }
    }

    #[inline]
    pub fn zero(&self) -> Coeffs {
        DVector::zeros(self.dim)
    }

    #[inline]
    pub fn one(&self) -> Coeffs {
        self.pows[0].clone()
    }

    /// Canonical coordinates of ζ^k for any integer k (ζ^2n = 1).
    #[inline]
    pub fn zeta_pow(&self, k: i64) -> Coeffs {
        let m = k.rem_euclid(2 * self.n as i64) as usize;
        self.pows[m].clone()
    }

    /// Exact ring product.
    pub fn mul(&self, a: &Coeffs, b: &Coeffs) -> Coeffs {
        let d = self.dim;
        let mut raw = vec![0i128; 2 * d - 1];
        for i in 0..d {
            let ai = a[i];
            if ai == 0 {
                continue;
            }
            for j in 0..d {
                raw[i + j] += ai as i128 * b[j] as i128;
            }
        }
        let mut out: DVector<i128> = DVector::zeros(d);
        for (m, &c) in raw.iter().enumerate() {
            if c != 0 {
                let p = &self.pows[m];
                for i in 0..d {
                    out[i] += c * p[i] as i128;
                }
            }
        }
        DVector::from_iterator(d, out.iter().map(|&c| narrow(c)))
    }

    /// Complex conjugate (reflection across the real axis).
    pub fn conj(&self, a: &Coeffs) -> Coeffs {
        let d = self.dim;
        let two_n = 2 * self.n;
        let mut out: DVector<i128> = DVector::zeros(d);
        for j in 0..d {
            let aj = a[j];
            if aj == 0 {
                continue;
            }
            let p = &self.pows[(two_n - j) % two_n];
            for i in 0..d {
                out[i] += aj as i128 * p[i] as i128;
            }
        }
        DVector::from_iterator(d, out.iter().map(|&c| narrow(c)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cyclotomic_small_orders() {
        assert_eq!(cyclotomic(1), vec![-1, 1]);
        assert_eq!(cyclotomic(2), vec![1, 1]);
        assert_eq!(cyclotomic(4), vec![1, 0, 1]);
        assert_eq!(cyclotomic(8), vec![1, 0, 0, 0, 1]);
        // Φ_14 = x^6 − x^5 + x^4 − x^3 + x^2 − x + 1.
        assert_eq!(cyclotomic(14), vec![1, -1, 1, -1, 1, -1, 1]);
        // Φ_12 = x^4 − x^2 + 1.
        assert_eq!(cyclotomic(12), vec![1, 0, -1, 0, 1]);
    }

    #[test]
    fn zeta_n_is_minus_one() {
        for n in [2usize, 4, 5, 6, 7, 9, 12] {
            let ring = CycloRing::new(n);
            let minus_one = -ring.one();
            assert_eq!(ring.zeta_pow(n as i64), minus_one, "n = {n}");
            assert_eq!(ring.zeta_pow(2 * n as i64), ring.one(), "n = {n}");
            assert_eq!(ring.zeta_pow(-(n as i64)), minus_one, "n = {n}");
        }
    }

    #[test]
    fn mul_matches_power_shift() {
        let ring = CycloRing::new(7);
        for k in 0..14i64 {
            let prod = ring.mul(&ring.zeta_pow(k), &ring.zeta_pow(1));
            assert_eq!(prod, ring.zeta_pow(k + 1), "k = {k}");
        }
    }

    #[test]
    fn conj_is_involutive_and_multiplicative() {
        let ring = CycloRing::new(9);
        let a = ring.zeta_pow(5);
        let b = ring.zeta_pow(11);
        assert_eq!(ring.conj(&ring.conj(&a)), a);
        let lhs = ring.conj(&ring.mul(&a, &b));
        let rhs = ring.mul(&ring.conj(&a), &ring.conj(&b));
        assert_eq!(lhs, rhs);
    }

    #[test]
    fn composite_order_identities_collapse() {
        // For n = 6, d_3 = ζ^2 + 1 + ζ^{−2} equals 2 as a complex number;
        // the canonical form must expose that equality exactly.
        let ring = CycloRing::new(6);
        let mut d3 = ring.zero();
        d3 += &ring.zeta_pow(2);
        d3 += &ring.zeta_pow(0);
        d3 += &ring.zeta_pow(-2);
        let mut two = ring.zero();
        two[0] = 2;
        assert_eq!(d3, two);
    }
}
