//! Multi-category contingency tables (MCTC/MCTS).

use serde::Serialize;
use verif_pairs::{PairStore, ThreshArray};
use verif_stats::{BAD, is_bad};

use crate::ci::{CiInfo, compute_proportion_ci, impl_ci_fields};
use crate::config::CiConfig;
use crate::cts::compute_proportion;
use crate::error::EvaluateError;

/// Square table of counts; rows are forecast categories and columns
/// observation categories.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct McTable {
    counts: Vec<Vec<f64>>,
}

impl McTable {
    /// An empty table with `n_cat` categories.
    pub fn new(n_cat: usize) -> Self {
        Self {
            counts: vec![vec![0.0; n_cat]; n_cat],
        }
    }

    /// Builds a table from row-major counts.
    pub fn from_counts(counts: Vec<Vec<f64>>) -> Result<Self, EvaluateError> {
        let n = counts.len();
        if let Some(row) = counts.iter().find(|r| r.len() != n) {
            return Err(EvaluateError::DimensionMismatch {
                context: "McTable::from_counts",
                left: n,
                right: row.len(),
            });
        }
        Ok(Self { counts })
    }

    pub fn n_cat(&self) -> usize {
        self.counts.len()
    }

    pub fn get(&self, f_cat: usize, o_cat: usize) -> f64 {
        self.counts[f_cat][o_cat]
    }

    pub fn inc(&mut self, f_cat: usize, o_cat: usize) {
        self.counts[f_cat][o_cat] += 1.0;
    }

    pub fn total(&self) -> f64 {
        self.counts.iter().flatten().sum()
    }

    pub fn row_total(&self, f_cat: usize) -> f64 {
        self.counts[f_cat].iter().sum()
    }

    pub fn col_total(&self, o_cat: usize) -> f64 {
        self.counts.iter().map(|r| r[o_cat]).sum()
    }

    pub fn diag_total(&self) -> f64 {
        (0..self.n_cat()).map(|i| self.counts[i][i]).sum()
    }

    pub fn gaccuracy(&self) -> f64 {
        compute_proportion(self.diag_total(), self.total())
    }

    /// Σ row_i · col_i / N², the fraction correct expected by chance.
    fn chance_correct(&self) -> f64 {
        let n = self.total();
        (0..self.n_cat())
            .map(|i| self.row_total(i) * self.col_total(i))
            .sum::<f64>()
            / (n * n)
    }

    /// Generalized Heidke skill score.
    pub fn gheidke(&self) -> f64 {
        let ec = self.chance_correct();
        finite((self.gaccuracy() - ec) / (1.0 - ec))
    }

    /// Heidke skill score against a fixed expected-correct fraction.
    pub fn gheidke_ec(&self, ec: f64) -> f64 {
        finite((self.gaccuracy() - ec) / (1.0 - ec))
    }

    /// Gandin-Murphy (Hanssen-Kuipers) skill score.
    pub fn gkuiper(&self) -> f64 {
        let n = self.total();
        let obs_sq: f64 = (0..self.n_cat())
            .map(|j| (self.col_total(j) / n).powi(2))
            .sum();
        finite((self.gaccuracy() - self.chance_correct()) / (1.0 - obs_sq))
    }

    /// Gerrity score from the equitable scoring matrix built on the
    /// observed category frequencies.
    pub fn gerrity(&self) -> f64 {
        let n_cat = self.n_cat();
        let n = self.total();
        if n_cat < 2 || n == 0.0 || self.col_total(0) == 0.0 {
            return BAD;
        }

        let mut cum = 0.0;
        let a: Vec<f64> = (0..n_cat - 1)
            .map(|j| {
                cum += self.col_total(j) / n;
                (1.0 - cum) / cum
            })
            .collect();
        let b = 1.0 / (n_cat - 1) as f64;
        let recip_sum = |k: usize| a[..k].iter().map(|v| 1.0 / v).sum::<f64>();
        let direct_sum = |k: usize| a[k.min(n_cat - 1)..].iter().sum::<f64>();

        let mut score = 0.0;
        for j in 0..n_cat {
            for k in 0..n_cat {
                let (lo, hi) = if j <= k { (j, k) } else { (k, j) };
                let s = b * (recip_sum(lo) - (hi - lo) as f64 + direct_sum(hi));
                score += s * self.counts[j][k] / n;
            }
        }
        finite(score)
    }
}

fn finite(v: f64) -> f64 {
    if is_bad(v) { BAD } else { v }
}

/// Multi-category statistics derived from an [`McTable`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MctsInfo {
    pub mcts: McTable,
    /// Expected-correct fraction for HSS_EC.
    pub ec_value: f64,
    pub acc: CiInfo,
    pub hk: CiInfo,
    pub hss: CiInfo,
    pub hss_ec: CiInfo,
    pub ger: CiInfo,
}

impl_ci_fields!(MctsInfo { acc, hk, hss, hss_ec, ger });

impl MctsInfo {
    /// Statistics for an existing table. The expected-correct fraction
    /// defaults to one over the number of categories.
    pub fn from_table(mcts: McTable, n_alpha: usize) -> Self {
        let ci = CiInfo::new(n_alpha);
        let ec_value = 1.0 / mcts.n_cat().max(1) as f64;
        let mut info = Self {
            mcts,
            ec_value,
            acc: ci.clone(),
            hk: ci.clone(),
            hss: ci.clone(),
            hss_ec: ci.clone(),
            ger: ci,
        };
        info.compute_stats();
        info
    }

    pub fn compute_stats(&mut self) {
        self.acc.v = self.mcts.gaccuracy();
        self.hk.v = self.mcts.gkuiper();
        self.hss.v = self.mcts.gheidke();
        self.hss_ec.v = self.mcts.gheidke_ec(self.ec_value);
        self.ger.v = self.mcts.gerrity();
    }

    /// Wilson interval on the accuracy for every alpha in `cfg`.
    pub fn compute_ci(&mut self, cfg: &CiConfig) {
        let n = self.mcts.total();
        for (i, &alpha) in cfg.alphas().iter().enumerate() {
            let ci = compute_proportion_ci(self.acc.v, n, alpha, self.acc.vif);
            self.acc.set_normal(i, ci);
        }
    }
}

fn check_dims(fta: &ThreshArray, ota: &ThreshArray, context: &'static str) -> Result<(), EvaluateError> {
    if fta.is_empty() || ota.is_empty() {
        return Err(EvaluateError::EmptyThresholds { context });
    }
    if fta.n() != ota.n() {
        return Err(EvaluateError::DimensionMismatch {
            context,
            left: fta.n(),
            right: ota.n(),
        });
    }
    Ok(())
}

fn mcts_table_from_indices(
    pd: &PairStore,
    indices: &[usize],
    fta: &ThreshArray,
    ota: &ThreshArray,
) -> McTable {
    let mut table = McTable::new(fta.n() + 1);
    let (f, o) = (pd.f(), pd.o());
    for &i in indices {
        let climo = pd.climo(i);
        if let (Some(fc), Some(oc)) = (fta.check_bins(f[i], &climo), ota.check_bins(o[i], &climo)) {
            table.inc(fc, oc);
        }
    }
    table
}

/// Bins every pair into `n + 1` categories by the `n` forecast and
/// observation thresholds and computes the multi-category statistics.
#[tracing::instrument(skip(pd, fta, ota, cfg), fields(n_pairs = pd.n_obs(), n_cat = fta.n() + 1))]
pub fn compute_mctsinfo(
    pd: &PairStore,
    fta: &ThreshArray,
    ota: &ThreshArray,
    normal_ci: bool,
    cfg: &CiConfig,
) -> Result<MctsInfo, EvaluateError> {
    check_dims(fta, ota, "compute_mctsinfo")?;
    cfg.validate()?;
    let indices: Vec<usize> = (0..pd.n_obs()).collect();
    let mut info = MctsInfo::from_table(
        mcts_table_from_indices(pd, &indices, fta, ota),
        cfg.alphas().len(),
    );
    if normal_ci {
        info.compute_ci(cfg);
    }
    Ok(info)
}

/// Multi-category statistics over every pair except `skip`.
pub fn compute_i_mctsinfo(
    pd: &PairStore,
    skip: usize,
    fta: &ThreshArray,
    ota: &ThreshArray,
    cfg: &CiConfig,
) -> Result<MctsInfo, EvaluateError> {
    check_dims(fta, ota, "compute_i_mctsinfo")?;
    let n = pd.n_obs();
    if skip >= n {
        return Err(EvaluateError::IndexOutOfRange {
            context: "compute_i_mctsinfo",
            index: skip,
            n,
        });
    }
    let indices: Vec<usize> = (0..n).filter(|&i| i != skip).collect();
    Ok(MctsInfo::from_table(
        mcts_table_from_indices(pd, &indices, fta, ota),
        cfg.alphas().len(),
    ))
}
