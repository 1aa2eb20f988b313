//! Neighborhood continuous statistics (NBRCNT): the fractions skill score
//! family.
//!
//! `pd` holds neighborhood fractional coverage for forecast and
//! observation; `pd_thr` holds the matching 0/1 threshold indicators used
//! for the forecast and observed rates.

use std::ops::AddAssign;

use serde::Serialize;
use verif_pairs::PairStore;
use verif_stats::{BAD, is_bad, is_zero};

use crate::ci::{CiInfo, impl_ci_fields};
use crate::config::CiConfig;
use crate::error::EvaluateError;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NbrCntInfo {
    pub n: usize,
    pub ffbar: f64,
    pub oobar: f64,
    pub fobar: f64,
    /// Fractions Brier score.
    pub fbs: CiInfo,
    /// Fractions skill score.
    pub fss: CiInfo,
    /// Asymptotic fractions skill score.
    pub afss: CiInfo,
    /// Uniform fractions skill score.
    pub ufss: CiInfo,
    pub f_rate: CiInfo,
    pub o_rate: CiInfo,
}

impl_ci_fields!(NbrCntInfo { fbs, fss, afss, ufss, f_rate, o_rate });

impl NbrCntInfo {
    pub fn new(n_alpha: usize) -> Self {
        let ci = CiInfo::new(n_alpha);
        Self {
            n: 0,
            ffbar: BAD,
            oobar: BAD,
            fobar: BAD,
            fbs: ci.clone(),
            fss: ci.clone(),
            afss: ci.clone(),
            ufss: ci.clone(),
            f_rate: ci.clone(),
            o_rate: ci,
        }
    }

    /// Derives FBS, FSS, AFSS and UFSS from the sums and rates.
    pub fn compute_stats(&mut self) {
        self.fbs.v = self.ffbar + self.oobar - 2.0 * self.fobar;
        let den = self.ffbar + self.oobar;
        self.fss.v = if is_bad(den) || is_zero(den) {
            BAD
        } else {
            1.0 - self.fbs.v / den
        };
        self.afss.v = compute_afss(self.f_rate.v, self.o_rate.v);
        self.ufss.v = compute_ufss(self.o_rate.v);
    }
}

/// Asymptotic FSS from the forecast and observed rates.
pub fn compute_afss(f_rate: f64, o_rate: f64) -> f64 {
    let den = f_rate * f_rate + o_rate * o_rate;
    if is_bad(den) || is_zero(den) {
        BAD
    } else {
        2.0 * f_rate * o_rate / den
    }
}

/// Uniform FSS, the skill of a forecast no better than random.
pub fn compute_ufss(o_rate: f64) -> f64 {
    if is_bad(o_rate) { BAD } else { 0.5 + o_rate / 2.0 }
}

impl AddAssign<&NbrCntInfo> for NbrCntInfo {
    /// Count-weighted FBS and rates. FSS is rebuilt from the aggregated
    /// FBS and the aggregated FSS denominator; when that is not possible
    /// the existing FSS is kept.
    fn add_assign(&mut self, rhs: &NbrCntInfo) {
        let n = self.n + rhs.n;
        if n == 0 {
            return;
        }
        let (c1, c2) = (self.n, rhs.n);
        let (n1, n2, nf) = (c1 as f64, c2 as f64, n as f64);
        let wavg = |a: f64, b: f64| match (c1, c2) {
            (_, 0) => a,
            (0, _) => b,
            _ => (n1 * a + n2 * b) / nf,
        };

        let fbs = wavg(self.fbs.v, rhs.fbs.v);
        let den_of = |c: &NbrCntInfo| {
            if is_bad(c.fbs.v) || is_bad(c.fss.v) || (c.fss.v - 1.0).abs() < 1e-10 {
                BAD
            } else {
                c.fbs.v / (1.0 - c.fss.v)
            }
        };
        let den = wavg(den_of(self), den_of(rhs));
        let fss = if is_bad(den) || is_zero(den) {
            if is_bad(self.fss.v) { rhs.fss.v } else { self.fss.v }
        } else {
            1.0 - fbs / den
        };

        self.f_rate.v = wavg(self.f_rate.v, rhs.f_rate.v);
        self.o_rate.v = wavg(self.o_rate.v, rhs.o_rate.v);
        self.ffbar = wavg(self.ffbar, rhs.ffbar);
        self.oobar = wavg(self.oobar, rhs.oobar);
        self.fobar = wavg(self.fobar, rhs.fobar);
        self.fbs.v = fbs;
        self.fss.v = fss;
        self.afss.v = compute_afss(self.f_rate.v, self.o_rate.v);
        self.ufss.v = compute_ufss(self.o_rate.v);
        self.n = n;
    }
}

fn check_lengths(pd: &PairStore, pd_thr: &PairStore, context: &'static str) -> Result<(), EvaluateError> {
    if pd.n_obs() != pd_thr.n_obs() {
        return Err(EvaluateError::LengthMismatch {
            context,
            expected: pd.n_obs(),
            got: pd_thr.n_obs(),
        });
    }
    if pd.is_empty() {
        return Err(EvaluateError::NoPairs { context });
    }
    Ok(())
}

fn nbrcnt_from_indices(
    pd: &PairStore,
    pd_thr: &PairStore,
    indices: &[usize],
    n_alpha: usize,
) -> NbrCntInfo {
    let mut info = NbrCntInfo::new(n_alpha);
    let (f, o, w) = (pd.f(), pd.o(), pd.wgt());
    let (ft, ot) = (pd_thr.f(), pd_thr.o());
    let w_sum: f64 = indices.iter().map(|&i| w[i]).sum();
    if indices.is_empty() || is_bad(w_sum) || w_sum <= 0.0 {
        return info;
    }
    let (mut ff, mut oo, mut fo, mut fr, mut or) = (0.0, 0.0, 0.0, 0.0, 0.0);
    for &i in indices {
        let wi = w[i] / w_sum;
        ff += wi * f[i] * f[i];
        oo += wi * o[i] * o[i];
        fo += wi * f[i] * o[i];
        fr += wi * ft[i];
        or += wi * ot[i];
    }
    info.n = indices.len();
    (info.ffbar, info.oobar, info.fobar) = (ff, oo, fo);
    (info.f_rate.v, info.o_rate.v) = (fr, or);
    info.compute_stats();
    info
}

/// Computes the FSS family over every neighborhood pair.
pub fn compute_nbrcntinfo(
    pd: &PairStore,
    pd_thr: &PairStore,
    cfg: &CiConfig,
) -> Result<NbrCntInfo, EvaluateError> {
    check_lengths(pd, pd_thr, "compute_nbrcntinfo")?;
    let indices: Vec<usize> = (0..pd.n_obs()).collect();
    Ok(nbrcnt_from_indices(pd, pd_thr, &indices, cfg.alphas().len()))
}

/// Computes the FSS family over every pair except `skip`.
pub fn compute_i_nbrcntinfo(
    pd: &PairStore,
    pd_thr: &PairStore,
    skip: usize,
    cfg: &CiConfig,
) -> Result<NbrCntInfo, EvaluateError> {
    check_lengths(pd, pd_thr, "compute_i_nbrcntinfo")?;
    let n = pd.n_obs();
    if skip >= n {
        return Err(EvaluateError::IndexOutOfRange {
            context: "compute_i_nbrcntinfo",
            index: skip,
            n,
        });
    }
    let indices: Vec<usize> = (0..n).filter(|&i| i != skip).collect();
    Ok(nbrcnt_from_indices(pd, pd_thr, &indices, cfg.alphas().len()))
}
