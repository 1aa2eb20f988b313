//! Probabilistic verification: Nx2 tables and PCT statistics.
//!
//! Forecast probabilities are binned into rows by probability thresholds
//! `T[0] < T[1] < ... < T[n]`; row `j` covers `[T[j], T[j+1])` and the
//! last row also takes `T[n]`. Each row counts observed events and
//! non-events. Row probabilities are the bin centers.

use serde::Serialize;
use tracing::debug;
use verif_pairs::{ClimoCdfInfo, PairStore, SingleThresh, derive_climo_prob};
use verif_stats::{BAD, is_bad, students_t_inv};

use crate::ci::{CiInfo, compute_proportion_ci, impl_ci_fields};
use crate::config::CiConfig;
use crate::cts::{CtsTable, compute_proportion};
use crate::error::EvaluateError;

/// Nx2 probability contingency table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Nx2Table {
    thresholds: Vec<f64>,
    event: Vec<f64>,
    nonevent: Vec<f64>,
}

impl Nx2Table {
    /// An empty table over `thresholds`, which must be finite, strictly
    /// increasing and at least two long.
    pub fn new(thresholds: Vec<f64>) -> Result<Self, EvaluateError> {
        if thresholds.len() < 2 {
            return Err(EvaluateError::InvalidProbThresholds {
                reason: format!("need at least 2 thresholds, got {}", thresholds.len()),
            });
        }
        if thresholds.iter().any(|t| is_bad(*t)) {
            return Err(EvaluateError::InvalidProbThresholds {
                reason: "thresholds must be finite".to_string(),
            });
        }
        if thresholds.windows(2).any(|w| w[1] <= w[0]) {
            return Err(EvaluateError::InvalidProbThresholds {
                reason: "thresholds must be strictly increasing".to_string(),
            });
        }
        let n_rows = thresholds.len() - 1;
        Ok(Self {
            thresholds,
            event: vec![0.0; n_rows],
            nonevent: vec![0.0; n_rows],
        })
    }

    /// Evenly spaced probability thresholds `0, 1/n, ..., 1`.
    pub fn with_n_bins(n_bins: usize) -> Result<Self, EvaluateError> {
        let thresholds = (0..=n_bins).map(|i| i as f64 / n_bins as f64).collect();
        Self::new(thresholds)
    }

    pub fn thresholds(&self) -> &[f64] {
        &self.thresholds
    }

    pub fn n_rows(&self) -> usize {
        self.event.len()
    }

    /// Row index of probability `t`.
    pub fn value_to_row(&self, t: f64) -> Result<usize, EvaluateError> {
        let th = &self.thresholds;
        let last = th.len() - 1;
        if is_bad(t) || t < th[0] || t > th[last] {
            return Err(EvaluateError::ProbabilityOutOfRange { value: t });
        }
        if t == th[last] {
            return Ok(last - 1);
        }
        // First threshold strictly above t closes the row.
        Ok(th.partition_point(|x| *x <= t) - 1)
    }

    /// Counts one forecast probability as an event or non-event.
    pub fn add(&mut self, prob: f64, is_event: bool) -> Result<(), EvaluateError> {
        let row = self.value_to_row(prob)?;
        if is_event {
            self.event[row] += 1.0;
        } else {
            self.nonevent[row] += 1.0;
        }
        Ok(())
    }

    /// Adds the counts of `other`, which must share the thresholds.
    pub(crate) fn merge_counts(&mut self, other: &Nx2Table) -> Result<(), EvaluateError> {
        if self.thresholds != other.thresholds {
            return Err(EvaluateError::InvalidProbThresholds {
                reason: "tables being merged have different thresholds".to_string(),
            });
        }
        for (a, b) in self.event.iter_mut().zip(&other.event) {
            *a += b;
        }
        for (a, b) in self.nonevent.iter_mut().zip(&other.nonevent) {
            *a += b;
        }
        Ok(())
    }

    pub(crate) fn scale_counts(&mut self, factor: f64) {
        self.event.iter_mut().chain(self.nonevent.iter_mut()).for_each(|c| *c *= factor);
    }

    pub fn event_count(&self, row: usize) -> f64 {
        self.event[row]
    }

    pub fn nonevent_count(&self, row: usize) -> f64 {
        self.nonevent[row]
    }

    pub fn row_total(&self, row: usize) -> f64 {
        self.event[row] + self.nonevent[row]
    }

    pub fn event_total(&self) -> f64 {
        self.event.iter().sum()
    }

    pub fn nonevent_total(&self) -> f64 {
        self.nonevent.iter().sum()
    }

    pub fn n(&self) -> f64 {
        self.event_total() + self.nonevent_total()
    }

    /// Bin-center probability of a row.
    pub fn row_proby(&self, row: usize) -> f64 {
        0.5 * (self.thresholds[row] + self.thresholds[row + 1])
    }

    /// Observed event frequency within a row.
    pub fn row_obar(&self, row: usize) -> f64 {
        compute_proportion(self.event[row], self.row_total(row))
    }

    pub fn baser(&self) -> f64 {
        compute_proportion(self.event_total(), self.n())
    }

    pub fn reliability(&self) -> f64 {
        let sum: f64 = (0..self.n_rows())
            .filter(|&j| !is_bad(self.row_obar(j)))
            .map(|j| self.row_total(j) * (self.row_proby(j) - self.row_obar(j)).powi(2))
            .sum();
        compute_proportion(sum, self.n())
    }

    pub fn resolution(&self) -> f64 {
        let obar = self.baser();
        let sum: f64 = (0..self.n_rows())
            .filter(|&j| !is_bad(self.row_obar(j)))
            .map(|j| self.row_total(j) * (self.row_obar(j) - obar).powi(2))
            .sum();
        compute_proportion(sum, self.n())
    }

    pub fn uncertainty(&self) -> f64 {
        let obar = self.baser();
        obar * (1.0 - obar)
    }

    /// Sample Brier skill score, `(resolution - reliability) / uncertainty`.
    pub fn bss_smpl(&self) -> f64 {
        let unc = self.uncertainty();
        if is_bad(unc) || unc == 0.0 {
            return BAD;
        }
        (self.resolution() - self.reliability()) / unc
    }

    /// Brier score using the row probabilities.
    pub fn brier_score(&self) -> f64 {
        let sum: f64 = (0..self.n_rows())
            .map(|j| {
                let y = self.row_proby(j);
                self.event[j] * (y - 1.0).powi(2) + self.nonevent[j] * y * y
            })
            .sum();
        compute_proportion(sum, self.n())
    }

    /// Half-width of the Brier score confidence interval (Bradley et al.
    /// 2008), from the variance of the squared error.
    pub fn brier_ci_halfwidth(&self, alpha: f64) -> f64 {
        let bs = self.brier_score();
        let n = self.n();
        let n_event = self.event_total();
        if is_bad(bs) || n <= 1.0 {
            return BAD;
        }
        let t = students_t_inv(1.0 - 0.5 * alpha, n - 1.0);
        let obar = n_event / n;

        let mut f4 = 0.0;
        let (mut e1, mut e2, mut e3) = (0.0, 0.0, 0.0);
        for j in 0..self.n_rows() {
            let y = self.row_proby(j);
            f4 += self.row_total(j) * y.powi(4) / n;
            if n_event > 0.0 {
                let w = self.event[j] / n_event;
                e1 += w * y;
                e2 += w * y * y;
                e3 += w * y.powi(3);
            }
        }
        let var = (f4 + obar * (1.0 - 4.0 * e3 + 6.0 * e2 - 4.0 * e1) - bs * bs) / n;
        if var < 0.0 { BAD } else { t * var.sqrt() }
    }

    /// 2x2 table treating rows above `row` as forecast yes.
    pub fn ctc_by_row(&self, row: usize) -> CtsTable {
        let mut t = CtsTable::default();
        for j in 0..self.n_rows() {
            if j > row {
                t.fy_oy += self.event[j];
                t.fy_on += self.nonevent[j];
            } else {
                t.fn_oy += self.event[j];
                t.fn_on += self.nonevent[j];
            }
        }
        t
    }

    /// Area under the ROC curve by the trapezoid rule, starting at (1, 1).
    pub fn roc_auc(&self) -> f64 {
        let (mut x_prev, mut y_prev) = (1.0, 1.0);
        let mut area = 0.0;
        let mut any = false;
        for j in 0..self.n_rows() {
            let ct = self.ctc_by_row(j);
            let (x, y) = (ct.pofd(), ct.pody());
            if is_bad(x) || is_bad(y) {
                continue;
            }
            area += (x_prev - x) * (y_prev + y) * 0.5;
            (x_prev, y_prev) = (x, y);
            any = true;
        }
        if any { area } else { BAD }
    }
}

/// Reliability, resolution and discrimination detail for one row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PctRow {
    pub thresh_lo: f64,
    pub thresh_hi: f64,
    pub proby: f64,
    pub n_event: f64,
    pub n_nonevent: f64,
    /// Observed event frequency given this forecast row.
    pub calibration: f64,
    /// Fraction of all forecasts in this row.
    pub refinement: f64,
    /// Fraction of all events forecast in this row.
    pub likelihood: f64,
    pub nonevent_likelihood: f64,
    /// Events in this row over all pairs.
    pub base_rate: f64,
    /// ROC point for this row as a decision threshold.
    pub pody: f64,
    pub pofd: f64,
}

/// Probabilistic statistics for one observation threshold.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PctInfo {
    pub pct: Nx2Table,
    /// Climatological probabilities binned on the same thresholds.
    pub climo_pct: Nx2Table,
    pub total: f64,
    pub baser: CiInfo,
    pub brier: CiInfo,
    pub briercl: CiInfo,
    pub bss: CiInfo,
    pub reliability: f64,
    pub resolution: f64,
    pub uncertainty: f64,
    pub bss_smpl: f64,
    pub roc_auc: f64,
    pub rows: Vec<PctRow>,
}

impl_ci_fields!(PctInfo { baser, brier, briercl, bss });

impl PctInfo {
    /// Statistics for filled forecast and climatology tables.
    pub fn from_tables(pct: Nx2Table, climo_pct: Nx2Table, n_alpha: usize) -> Self {
        let ci = CiInfo::new(n_alpha);
        let mut info = Self {
            total: pct.n(),
            reliability: pct.reliability(),
            resolution: pct.resolution(),
            uncertainty: pct.uncertainty(),
            bss_smpl: pct.bss_smpl(),
            roc_auc: pct.roc_auc(),
            rows: Vec::new(),
            baser: ci.clone(),
            brier: ci.clone(),
            briercl: ci.clone(),
            bss: ci,
            pct,
            climo_pct,
        };
        info.baser.v = info.pct.baser();
        info.brier.v = info.pct.brier_score();
        info.briercl.v = info.climo_pct.brier_score();
        info.bss.v = if is_bad(info.brier.v) || is_bad(info.briercl.v) || info.briercl.v == 0.0 {
            BAD
        } else {
            1.0 - info.brier.v / info.briercl.v
        };
        info.rows = info.row_detail();
        info
    }

    pub(crate) fn row_detail(&self) -> Vec<PctRow> {
        let t = &self.pct;
        let n = t.n();
        (0..t.n_rows())
            .map(|j| {
                let ct = t.ctc_by_row(j);
                PctRow {
                    thresh_lo: t.thresholds[j],
                    thresh_hi: t.thresholds[j + 1],
                    proby: t.row_proby(j),
                    n_event: t.event_count(j),
                    n_nonevent: t.nonevent_count(j),
                    calibration: t.row_obar(j),
                    refinement: compute_proportion(t.row_total(j), n),
                    likelihood: compute_proportion(t.event_count(j), t.event_total()),
                    nonevent_likelihood: compute_proportion(
                        t.nonevent_count(j),
                        t.nonevent_total(),
                    ),
                    base_rate: compute_proportion(t.event_count(j), n),
                    pody: ct.pody(),
                    pofd: ct.pofd(),
                }
            })
            .collect()
    }

    /// Wilson interval on the base rate and Brier score intervals for
    /// every alpha in `cfg`.
    pub fn compute_ci(&mut self, cfg: &CiConfig) {
        for (i, &alpha) in cfg.alphas().iter().enumerate() {
            let ci = compute_proportion_ci(self.baser.v, self.total, alpha, self.baser.vif);
            self.baser.set_normal(i, ci);

            for (stat, table) in [
                (&mut self.brier, &self.pct),
                (&mut self.briercl, &self.climo_pct),
            ] {
                if is_bad(stat.v) {
                    continue;
                }
                let hw = table.brier_ci_halfwidth(alpha);
                if !is_bad(hw) {
                    let hw = hw * stat.vif.sqrt();
                    stat.set_normal(i, (stat.v - hw, stat.v + hw));
                }
            }
        }
    }
}

/// Bins the forecast probabilities of `pd` against events defined by
/// `othresh` and computes the PCT statistics.
///
/// Climatological probabilities come from `cprob` when given, otherwise
/// they are derived from the observation climatology with `cdf_info`.
/// Pairs with a bad forecast or observation are skipped; a forecast
/// probability outside the thresholds is an error.
#[tracing::instrument(skip(pd, cdf_info, cprob, cfg), fields(n_pairs = pd.n_obs(), obs_thresh = %othresh))]
pub fn compute_pctinfo(
    pd: &PairStore,
    prob_thresholds: &[f64],
    othresh: &SingleThresh,
    cdf_info: &ClimoCdfInfo,
    cprob: Option<&[f64]>,
    normal_ci: bool,
    cfg: &CiConfig,
) -> Result<PctInfo, EvaluateError> {
    cfg.validate()?;
    let n = pd.n_obs();
    let climo_prob = match cprob {
        Some(p) if p.len() != n => {
            return Err(EvaluateError::LengthMismatch {
                context: "compute_pctinfo",
                expected: n,
                got: p.len(),
            });
        }
        Some(p) => p.to_vec(),
        None => derive_climo_prob(cdf_info, pd.ocmn(), pd.ocsd(), othresh),
    };
    let climo_flag = climo_prob.len() == n;

    let mut pct = Nx2Table::new(prob_thresholds.to_vec())?;
    let mut climo_pct = pct.clone();
    let (f, o) = (pd.f(), pd.o());
    for i in 0..n {
        if is_bad(f[i]) || is_bad(o[i]) {
            continue;
        }
        let event = othresh.check_climo(o[i], &pd.climo(i));
        pct.add(f[i], event)?;
        if climo_flag && !is_bad(climo_prob[i]) {
            climo_pct.add(climo_prob[i], event)?;
        }
    }
    debug!(total = pct.n(), climo_total = climo_pct.n(), "filled PCT tables");

    let mut info = PctInfo::from_tables(pct, climo_pct, cfg.alphas().len());
    if normal_ci {
        info.compute_ci(cfg);
    }
    Ok(info)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use verif_pairs::ClimoPntInfo;

    fn filled(events: &[(f64, bool)]) -> Nx2Table {
        let mut t = Nx2Table::with_n_bins(4).unwrap();
        for &(p, e) in events {
            t.add(p, e).unwrap();
        }
        t
    }

    #[test]
    fn test_threshold_validation() {
        assert!(Nx2Table::new(vec![0.0]).is_err());
        assert!(matches!(
            Nx2Table::new(vec![0.0, 0.5, 0.5, 1.0]),
            Err(EvaluateError::InvalidProbThresholds { .. })
        ));
        assert!(Nx2Table::new(vec![0.0, f64::NAN, 1.0]).is_err());
    }

    #[test]
    fn test_value_to_row() {
        let t = Nx2Table::with_n_bins(4).unwrap();
        assert_eq!(t.value_to_row(0.0).unwrap(), 0);
        assert_eq!(t.value_to_row(0.25).unwrap(), 1);
        assert_eq!(t.value_to_row(0.6).unwrap(), 2);
        assert_eq!(t.value_to_row(1.0).unwrap(), 3);
        assert!(matches!(
            t.value_to_row(1.2),
            Err(EvaluateError::ProbabilityOutOfRange { .. })
        ));
        assert!(t.value_to_row(-0.1).is_err());
    }

    #[test]
    fn test_brier_and_decomposition() {
        let t = filled(&[(0.1, false), (0.1, false), (0.9, true), (0.9, false), (0.6, true)]);
        // Row centers 0.125, 0.875, 0.625.
        let expected = (2.0 * 0.125_f64.powi(2)
            + (0.875_f64 - 1.0).powi(2)
            + 0.875_f64.powi(2)
            + (0.625_f64 - 1.0).powi(2))
            / 5.0;
        assert_relative_eq!(t.brier_score(), expected, epsilon = 1e-12);
        assert_relative_eq!(t.baser(), 0.4);
        assert_relative_eq!(t.uncertainty(), 0.24, epsilon = 1e-12);
        // Brier = reliability - resolution + uncertainty when rows are
        // homogeneous in probability.
        assert_relative_eq!(
            t.brier_score(),
            t.reliability() - t.resolution() + t.uncertainty(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_perfect_discrimination_auc() {
        let t = filled(&[(0.05, false), (0.1, false), (0.95, true), (0.99, true)]);
        assert_relative_eq!(t.roc_auc(), 1.0, epsilon = 1e-12);
        let ct = t.ctc_by_row(1);
        assert_eq!(ct, CtsTable::new(2.0, 0.0, 0.0, 2.0));
    }

    #[test]
    fn test_no_skill_auc() {
        let t = filled(&[(0.5, true), (0.5, false)]);
        assert_relative_eq!(t.roc_auc(), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_pctinfo_with_climo_probabilities() {
        let mut pd = PairStore::new();
        let f = [0.1, 0.3, 0.8, 0.9, 0.2, 0.7];
        let o = [0.0, 1.0, 1.0, 1.0, 0.0, 0.0];
        pd.add_grid_pairs(&f, &o, &[ClimoPntInfo::default(); 6], &[1.0; 6])
            .unwrap();
        let ot: SingleThresh = ">0.5".parse().unwrap();
        let cdf = ClimoCdfInfo::from_n_bins(1).unwrap();
        let cprob = [0.5; 6];
        let cfg = CiConfig::default();
        let thresholds = [0.0, 0.25, 0.5, 0.75, 1.0];
        let info = compute_pctinfo(&pd, &thresholds, &ot, &cdf, Some(&cprob), true, &cfg).unwrap();
        assert_eq!(info.total, 6.0);
        assert_relative_eq!(info.baser.v, 0.5);
        // Climatology sits in the [0.5, 0.75) row with center 0.625.
        let briercl = 0.5 * (0.625_f64 - 1.0).powi(2) + 0.5 * 0.625_f64.powi(2);
        assert_relative_eq!(info.briercl.v, briercl, epsilon = 1e-12);
        assert_relative_eq!(info.bss.v, 1.0 - info.brier.v / briercl, epsilon = 1e-12);
        assert_eq!(info.rows.len(), 4);
        let refinement: f64 = info.rows.iter().map(|r| r.refinement).sum();
        assert_relative_eq!(refinement, 1.0, epsilon = 1e-12);
        let likelihood: f64 = info.rows.iter().map(|r| r.likelihood).sum();
        assert_relative_eq!(likelihood, 1.0, epsilon = 1e-12);
        assert!(info.brier.ncl[0] < info.brier.v && info.brier.v < info.brier.ncu[0]);
    }

    #[test]
    fn test_pctinfo_rejects_out_of_range_probability() {
        let mut pd = PairStore::new();
        pd.add_grid_pairs(&[1.5], &[1.0], &[ClimoPntInfo::default()], &[1.0])
            .unwrap();
        let ot: SingleThresh = ">0.5".parse().unwrap();
        let cdf = ClimoCdfInfo::from_n_bins(1).unwrap();
        let res = compute_pctinfo(&pd, &[0.0, 1.0], &ot, &cdf, None, false, &CiConfig::default());
        assert!(matches!(res, Err(EvaluateError::ProbabilityOutOfRange { .. })));
    }

    #[test]
    fn test_cprob_length_mismatch() {
        let pd = PairStore::new();
        let ot: SingleThresh = ">0.5".parse().unwrap();
        let cdf = ClimoCdfInfo::from_n_bins(1).unwrap();
        let res = compute_pctinfo(
            &pd,
            &[0.0, 1.0],
            &ot,
            &cdf,
            Some(&[0.5]),
            false,
            &CiConfig::default(),
        );
        assert!(matches!(res, Err(EvaluateError::LengthMismatch { .. })));
    }
}
