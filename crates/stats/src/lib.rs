//! Numeric helpers shared by the verification crates.
//!
//! Missing data is represented as `f64::NAN` everywhere; use [`is_bad`] to
//! test for it. Helpers return NaN rather than an error when their inputs
//! cannot produce a value.

pub mod dist;
pub mod wind;

use std::cmp::Ordering;

pub use dist::{chi2_inv, normal_cdf, normal_cdf_inv, students_t_inv};
pub use wind::{angle_difference, convert_u_v_to_wdir, convert_u_v_to_wind};

/// Bad data value.
pub const BAD: f64 = f64::NAN;

/// Tolerance used when a derived quantity is tested against zero.
const EPS: f64 = 1e-10;

/// Returns `true` for missing (NaN) or infinite values.
#[inline]
pub fn is_bad(v: f64) -> bool {
    !v.is_finite()
}

/// Returns `true` if `v` is within the zero tolerance.
#[inline]
pub fn is_zero(v: f64) -> bool {
    v.abs() < EPS
}

/// Nearest integer, rounding half away from zero.
#[inline]
pub fn nint(v: f64) -> i64 {
    v.round() as i64
}

/// Arithmetic mean of a slice. Returns NaN if empty.
pub fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        return BAD;
    }
    let sum: f64 = data.iter().sum();
    sum / data.len() as f64
}

/// Returns an ascending copy of `data`. NaNs compare equal to everything.
pub fn sorted(data: &[f64]) -> Vec<f64> {
    let mut v = data.to_vec();
    v.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    v
}

/// R's default quantile algorithm (type=7).
///
/// **Expects pre-sorted input** (caller's responsibility).
///
/// # Panics
///
/// Panics if `sorted` is empty.
pub fn quantile_type7(sorted: &[f64], p: f64) -> f64 {
    assert!(
        !sorted.is_empty(),
        "quantile_type7: input must not be empty"
    );
    let n = sorted.len();
    let h = (n - 1) as f64 * p;
    let lo = h.floor() as usize;
    let hi = (lo + 1).min(n - 1);
    sorted[lo] + (h - h.floor()) * (sorted[hi] - sorted[lo])
}

/// Median of pre-sorted data. For even length, averages the middle two values.
///
/// # Panics
///
/// Panics if `sorted` is empty.
pub fn median(sorted: &[f64]) -> f64 {
    assert!(!sorted.is_empty(), "median: input must not be empty");
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}

/// Sample standard deviation from a running sum and sum of squares.
///
/// Uses the N-1 denominator. Returns NaN for `n <= 1` or a negative
/// variance (round-off on degenerate input), and exactly 0.0 when the
/// variance is within tolerance of zero.
pub fn compute_stdev(sum: f64, sum_sq: f64, n: usize) -> f64 {
    if n <= 1 {
        return BAD;
    }
    let nf = n as f64;
    let v = (sum_sq - sum * sum / nf) / (nf - 1.0);
    if is_zero(v) {
        0.0
    } else if v < 0.0 {
        BAD
    } else {
        v.sqrt()
    }
}

/// Pearson correlation from raw sums `Σf, Σo, Σf², Σo², Σfo` over `n` values.
///
/// Returns NaN when either variance term is not positive. The result is
/// clamped to `[-1, 1]`.
pub fn compute_corr(f: f64, o: f64, ff: f64, oo: f64, fo: f64, n: usize) -> f64 {
    let nf = n as f64;
    let v = (nf * ff - f * f) * (nf * oo - o * o);
    if v < 0.0 || is_zero(v) {
        return BAD;
    }
    let c = (nf * fo - f * o) / v.sqrt();
    c.clamp(-1.0, 1.0)
}

/// Uncentered anomaly correlation from mean anomaly products.
pub fn compute_anom_corr_uncntr(ffa: f64, ooa: f64, foa: f64) -> f64 {
    let v = ffa * ooa;
    if is_bad(v) || v < 0.0 || is_zero(v) {
        return BAD;
    }
    (foa / v.sqrt()).clamp(-1.0, 1.0)
}

/// Ranks `values` from 1..=n, assigning tied values their average rank.
///
/// Returns the ranks (in input order) and the number of tied groups.
pub fn rank_array(values: &[f64]) -> (Vec<f64>, usize) {
    let n = values.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| {
        values[a]
            .partial_cmp(&values[b])
            .unwrap_or(Ordering::Equal)
    });

    let mut ranks = vec![0.0; n];
    let mut n_ties = 0;
    let mut i = 0;
    while i < n {
        let mut j = i + 1;
        while j < n && values[order[j]] == values[order[i]] {
            j += 1;
        }
        // Positions i..j share the average of ranks i+1..=j.
        let avg = (i + 1 + j) as f64 / 2.0;
        for &idx in &order[i..j] {
            ranks[idx] = avg;
        }
        if j - i > 1 {
            n_ties += 1;
        }
        i = j;
    }
    (ranks, n_ties)
}

/// Principal branch of the Lambert W function, `W0(x)` for `x >= -1/e`.
///
/// Solved with Halley's iteration. Returns NaN outside the domain.
pub fn lambert_w0(x: f64) -> f64 {
    let branch = -(-1.0_f64).exp();
    if is_bad(x) || x < branch {
        return BAD;
    }
    if x == branch {
        return -1.0;
    }
    if x == 0.0 {
        return 0.0;
    }

    let mut w = if x < -0.25 {
        // Series about the branch point.
        let p = (2.0 * (std::f64::consts::E * x + 1.0)).sqrt();
        -1.0 + p - p * p / 3.0 + 11.0 / 72.0 * p * p * p
    } else if x < 3.0 {
        0.5 * x.ln_1p()
    } else {
        let l = x.ln();
        l - l.ln()
    };

    for _ in 0..64 {
        let ew = w.exp();
        let f = w * ew - x;
        let step = f / (ew * (w + 1.0) - (w + 2.0) * f / (2.0 * w + 2.0));
        w -= step;
        if step.abs() <= 1e-15 * (1.0 + w.abs()) {
            break;
        }
    }
    w
}
