//! Statistic values with confidence intervals, and the interval methods.
//!
//! Every statistic is a [`CiInfo`] holding its value plus one normal and
//! one bootstrap interval per alpha. Interval bounds that cannot be
//! computed are NaN.

use serde::Serialize;
use verif_stats::{BAD, chi2_inv, is_bad, normal_cdf_inv, quantile_type7, students_t_inv};

/// A statistic with normal (`ncl`/`ncu`) and bootstrap (`bcl`/`bcu`)
/// interval bounds, indexed by alpha.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CiInfo {
    /// Value of the statistic.
    pub v: f64,
    /// Variance inflation factor applied to normal intervals.
    pub vif: f64,
    pub ncl: Vec<f64>,
    pub ncu: Vec<f64>,
    pub bcl: Vec<f64>,
    pub bcu: Vec<f64>,
}

impl Default for CiInfo {
    fn default() -> Self {
        Self::new(0)
    }
}

impl CiInfo {
    /// A bad-valued statistic with room for `n_alpha` intervals.
    pub fn new(n_alpha: usize) -> Self {
        Self {
            v: BAD,
            vif: 1.0,
            ncl: vec![BAD; n_alpha],
            ncu: vec![BAD; n_alpha],
            bcl: vec![BAD; n_alpha],
            bcu: vec![BAD; n_alpha],
        }
    }

    pub fn n_alpha(&self) -> usize {
        self.ncl.len()
    }

    /// Sets the normal interval for alpha `i`.
    pub(crate) fn set_normal(&mut self, i: usize, (cl, cu): (f64, f64)) {
        self.ncl[i] = cl;
        self.ncu[i] = cu;
    }

    /// Sets the bootstrap interval for alpha `i`.
    pub(crate) fn set_bootstrap(&mut self, i: usize, (cl, cu): (f64, f64)) {
        self.bcl[i] = cl;
        self.bcu[i] = cu;
    }

    /// Resets the value and every interval to bad data.
    pub fn set_bad_data(&mut self) {
        *self = Self {
            vif: self.vif,
            ..Self::new(self.n_alpha())
        };
    }
}

/// Named access to every [`CiInfo`] of a statistics object, in a fixed
/// order. Used for bootstrapping and for averaging results.
pub trait CiFields {
    fn ci_fields(&self) -> Vec<(&'static str, &CiInfo)>;
    fn ci_fields_mut(&mut self) -> Vec<(&'static str, &mut CiInfo)>;
}

macro_rules! impl_ci_fields {
    ($ty:ty { $($field:ident),+ $(,)? }) => {
        impl $crate::ci::CiFields for $ty {
            fn ci_fields(&self) -> Vec<(&'static str, &$crate::ci::CiInfo)> {
                vec![$((stringify!($field), &self.$field)),+]
            }

            fn ci_fields_mut(&mut self) -> Vec<(&'static str, &mut $crate::ci::CiInfo)> {
                vec![$((stringify!($field), &mut self.$field)),+]
            }
        }
    };
}
pub(crate) use impl_ci_fields;

/// Statistic values of each item, in [`CiFields`] order.
pub(crate) fn field_values<T: CiFields>(items: &[T]) -> Vec<Vec<f64>> {
    items
        .iter()
        .map(|it| it.ci_fields().iter().map(|(_, ci)| ci.v).collect())
        .collect()
}

/// Lower and upper standard normal critical values for `alpha`.
pub fn normal_critical_values(alpha: f64) -> (f64, f64) {
    (
        normal_cdf_inv(alpha / 2.0, 0.0, 1.0),
        normal_cdf_inv(1.0 - alpha / 2.0, 0.0, 1.0),
    )
}

/// Critical values for a mean: normal when `n >= large_sample_threshold`,
/// Student-t with `n - 1` degrees of freedom otherwise.
pub fn mean_critical_values(alpha: f64, n: usize, large_sample_threshold: usize) -> (f64, f64) {
    if n >= large_sample_threshold {
        normal_critical_values(alpha)
    } else {
        let df = n.saturating_sub(1) as f64;
        (
            students_t_inv(alpha / 2.0, df),
            students_t_inv(1.0 - alpha / 2.0, df),
        )
    }
}

/// `v ± z * se`.
pub fn compute_normal_ci(v: f64, alpha: f64, se: f64) -> (f64, f64) {
    if is_bad(v) || is_bad(se) {
        return (BAD, BAD);
    }
    let (cl, cu) = normal_critical_values(alpha);
    (v + cl * se, v + cu * se)
}

/// Interval for a mean with sample standard deviation `stdev`.
pub fn compute_mean_ci(
    v: f64,
    stdev: f64,
    vif: f64,
    n: usize,
    alpha: f64,
    large_sample_threshold: usize,
) -> (f64, f64) {
    if n <= 1 || is_bad(v) || is_bad(stdev) {
        return (BAD, BAD);
    }
    let (cl, cu) = mean_critical_values(alpha, n, large_sample_threshold);
    let se = (vif * stdev * stdev).sqrt() / (n as f64).sqrt();
    (v + cl * se, v + cu * se)
}

/// Chi-square interval for a standard deviation, assuming normal data.
pub fn compute_stdev_ci(stdev: f64, n: usize, alpha: f64) -> (f64, f64) {
    if n <= 1 || is_bad(stdev) {
        return (BAD, BAD);
    }
    let df = (n - 1) as f64;
    let bound = |cv: f64| {
        let v = df * stdev * stdev / cv;
        if is_bad(v) || v < 0.0 { BAD } else { v.sqrt() }
    };
    (
        bound(chi2_inv(1.0 - alpha / 2.0, df)),
        bound(chi2_inv(alpha / 2.0, df)),
    )
}

/// Fisher-z interval for a correlation coefficient.
pub fn compute_corr_ci(r: f64, n: usize, alpha: f64, large_sample_threshold: usize) -> (f64, f64) {
    if is_bad(r) || n <= 3 || (r.abs() - 1.0).abs() < 1e-10 {
        return (BAD, BAD);
    }
    let (cv_l, cv_u) = mean_critical_values(alpha, n, large_sample_threshold);
    let z = 0.5 * ((1.0 + r) / (1.0 - r)).ln();
    let se = 1.0 / ((n - 3) as f64).sqrt();
    ((z + cv_l * se).tanh(), (z + cv_u * se).tanh())
}

/// Wilson score interval for a proportion `p` over `n` trials, with a
/// variance inflation factor.
pub fn compute_wilson_ci(p: f64, n: f64, alpha: f64, vif: f64) -> (f64, f64) {
    if is_bad(p) || n <= 0.0 {
        return (BAD, BAD);
    }
    let (cl, cu) = normal_critical_values(alpha);
    let bound = |cv: f64| {
        let v = vif * p * (1.0 - p) / n + cv * cv / (4.0 * n * n);
        if v < 0.0 {
            BAD
        } else {
            (p + cv * cv / (2.0 * n) + cv * v.sqrt()) / (1.0 + cv * cv / n)
        }
    };
    (bound(cl), bound(cu))
}

/// Interval for a proportion. Uses the Wilson method for every `n`.
pub fn compute_proportion_ci(p: f64, n: f64, alpha: f64, vif: f64) -> (f64, f64) {
    compute_wilson_ci(p, n, alpha, vif)
}

/// Woolf interval for the odds ratio of a 2x2 table.
pub fn compute_woolf_ci(odds: f64, alpha: f64, a: f64, b: f64, c: f64, d: f64) -> (f64, f64) {
    if is_bad(odds) || [a, b, c, d].iter().any(|x| *x == 0.0) {
        return (BAD, BAD);
    }
    let (cl, cu) = normal_critical_values(alpha);
    let s = (1.0 / a + 1.0 / b + 1.0 / c + 1.0 / d).sqrt();
    (odds * (cl * s).exp(), odds * (cu * s).exp())
}

/// Interval for the Hanssen-Kuipers discriminant from the Wilson
/// variances of the hit rate and the false alarm rate.
pub fn compute_hk_ci(hk: f64, alpha: f64, vif: f64, a: f64, b: f64, c: f64, d: f64) -> (f64, f64) {
    let h_n = a + c;
    let f_n = b + d;
    if is_bad(hk) || h_n == 0.0 || f_n == 0.0 {
        return (BAD, BAD);
    }
    let (cv, _) = normal_critical_values(alpha);
    let wilson_sd = |p: f64, n: f64| {
        (p * (1.0 - p) / n + cv * cv / (4.0 * n * n)).sqrt() / (1.0 + cv * cv / n)
    };
    let h_sd = wilson_sd(a / h_n, h_n);
    let f_sd = wilson_sd(b / f_n, f_n);
    let sd = (vif * (h_sd * h_sd + f_sd * f_sd)).sqrt();
    (hk + cv * sd, hk - cv * sd)
}

/// Percentile bootstrap interval from replicate values. Bad replicates
/// are ignored; no valid replicates gives a bad interval.
pub fn compute_perc_interval(replicates: &[f64], alpha: f64) -> (f64, f64) {
    let sorted = verif_stats::sorted(
        &replicates
            .iter()
            .copied()
            .filter(|v| !is_bad(*v))
            .collect::<Vec<_>>(),
    );
    if sorted.is_empty() {
        return (BAD, BAD);
    }
    (
        quantile_type7(&sorted, alpha / 2.0),
        quantile_type7(&sorted, 1.0 - alpha / 2.0),
    )
}
