//! Continuous statistics (CNT) over matched pairs.

use serde::Serialize;
use tracing::debug;
use verif_pairs::{PairStore, set_climo_flag};
use verif_stats::{
    BAD, compute_anom_corr_uncntr, compute_corr, compute_stdev, is_bad, is_zero, median,
    quantile_type7, rank_array, sorted,
};

use crate::ci::{
    CiInfo, compute_corr_ci, compute_mean_ci, compute_stdev_ci, impl_ci_fields,
};
use crate::config::CiConfig;
use crate::error::EvaluateError;

/// Continuous statistics with confidence intervals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CntInfo {
    /// Number of pairs used.
    pub n: usize,
    /// Number of pairs ranked for the rank correlations.
    pub n_ranks: usize,
    pub frank_ties: usize,
    pub orank_ties: usize,

    pub fbar: CiInfo,
    pub fstdev: CiInfo,
    pub obar: CiInfo,
    pub ostdev: CiInfo,
    pub pr_corr: CiInfo,
    pub sp_corr: CiInfo,
    pub kt_corr: CiInfo,
    pub anom_corr: CiInfo,
    pub anom_corr_uncntr: CiInfo,
    pub rmsfa: CiInfo,
    pub rmsoa: CiInfo,
    pub me: CiInfo,
    pub me2: CiInfo,
    pub estdev: CiInfo,
    pub mbias: CiInfo,
    pub mae: CiInfo,
    pub mse: CiInfo,
    pub msess: CiInfo,
    pub bcmse: CiInfo,
    pub rmse: CiInfo,
    pub si: CiInfo,
    pub e10: CiInfo,
    pub e25: CiInfo,
    pub e50: CiInfo,
    pub e75: CiInfo,
    pub e90: CiInfo,
    pub eiqr: CiInfo,
    pub mad: CiInfo,
}

impl_ci_fields!(CntInfo {
    fbar, fstdev, obar, ostdev, pr_corr, sp_corr, kt_corr, anom_corr, anom_corr_uncntr,
    rmsfa, rmsoa, me, me2, estdev, mbias, mae, mse, msess, bcmse, rmse, si, e10, e25, e50,
    e75, e90, eiqr, mad,
});

impl CntInfo {
    /// All statistics bad, with room for `n_alpha` intervals.
    pub fn new(n_alpha: usize) -> Self {
        let ci = CiInfo::new(n_alpha);
        Self {
            n: 0,
            n_ranks: 0,
            frank_ties: 0,
            orank_ties: 0,
            fbar: ci.clone(),
            fstdev: ci.clone(),
            obar: ci.clone(),
            ostdev: ci.clone(),
            pr_corr: ci.clone(),
            sp_corr: ci.clone(),
            kt_corr: ci.clone(),
            anom_corr: ci.clone(),
            anom_corr_uncntr: ci.clone(),
            rmsfa: ci.clone(),
            rmsoa: ci.clone(),
            me: ci.clone(),
            me2: ci.clone(),
            estdev: ci.clone(),
            mbias: ci.clone(),
            mae: ci.clone(),
            mse: ci.clone(),
            msess: ci.clone(),
            bcmse: ci.clone(),
            rmse: ci.clone(),
            si: ci.clone(),
            e10: ci.clone(),
            e25: ci.clone(),
            e50: ci.clone(),
            e75: ci.clone(),
            e90: ci.clone(),
            eiqr: ci.clone(),
            mad: ci,
        }
    }

    /// Fills the statistics that follow from MSE, the means and the
    /// observation spread.
    pub(crate) fn set_error_stats(&mut self, mse: f64) {
        let (fbar, obar) = (self.fbar.v, self.obar.v);
        let ovar = self.ostdev.v * self.ostdev.v;
        self.mse.v = mse;
        self.rmse.v = if mse < 0.0 { BAD } else { mse.sqrt() };
        self.bcmse.v = mse - (fbar - obar) * (fbar - obar);
        self.msess.v = if is_bad(ovar) || is_zero(ovar) {
            BAD
        } else {
            1.0 - mse / ovar
        };
        self.mbias.v = if is_zero(obar) { BAD } else { fbar / obar };
        self.si.v = if is_zero(obar) { BAD } else { self.rmse.v / obar };
    }

    /// Computes the normal confidence intervals for every alpha in `cfg`.
    ///
    /// Means use Student-t critical values below the configured large
    /// sample threshold. Standard deviations use chi-square intervals and
    /// correlations the Fisher z transform.
    pub fn compute_ci(&mut self, cfg: &CiConfig) {
        if self.n <= 1 {
            return;
        }
        let n = self.n;
        let large = cfg.large_sample_threshold();
        for (i, &alpha) in cfg.alphas().iter().enumerate() {
            let (fbar, fstdev) = (self.fbar.v, self.fstdev.v);
            self.fbar
                .set_normal(i, compute_mean_ci(fbar, fstdev, self.fbar.vif, n, alpha, large));
            let (obar, ostdev) = (self.obar.v, self.ostdev.v);
            self.obar
                .set_normal(i, compute_mean_ci(obar, ostdev, self.obar.vif, n, alpha, large));
            let (me, estdev) = (self.me.v, self.estdev.v);
            self.me
                .set_normal(i, compute_mean_ci(me, estdev, self.me.vif, n, alpha, large));

            self.fstdev.set_normal(i, compute_stdev_ci(fstdev, n, alpha));
            self.ostdev.set_normal(i, compute_stdev_ci(ostdev, n, alpha));
            self.estdev.set_normal(i, compute_stdev_ci(estdev, n, alpha));

            let r = self.pr_corr.v;
            self.pr_corr.set_normal(i, compute_corr_ci(r, n, alpha, large));
            let r = self.anom_corr.v;
            self.anom_corr.set_normal(i, compute_corr_ci(r, n, alpha, large));
        }
    }
}

/// Options controlling which optional CNT pieces are computed.
#[derive(Debug, Clone, Copy, Default)]
pub struct CntOptions {
    /// Exclude pairs where both values are zero from the rank statistics.
    pub precip: bool,
    /// Compute the Spearman and Kendall rank correlations.
    pub rank: bool,
    /// Compute normal confidence intervals.
    pub normal_ci: bool,
}

/// Computes CNT statistics over every pair in `pd`.
#[tracing::instrument(skip(pd, cfg), fields(n_pairs = pd.n_obs()))]
pub fn compute_cntinfo(
    pd: &PairStore,
    opts: CntOptions,
    cfg: &CiConfig,
) -> Result<CntInfo, EvaluateError> {
    cfg.validate()?;
    let indices: Vec<usize> = (0..pd.n_obs()).collect();
    Ok(cnt_from_indices(pd, &indices, opts, cfg))
}

/// Computes CNT statistics over every pair except `skip`, without
/// confidence intervals.
pub fn compute_i_cntinfo(
    pd: &PairStore,
    skip: usize,
    opts: CntOptions,
    cfg: &CiConfig,
) -> Result<CntInfo, EvaluateError> {
    let n = pd.n_obs();
    if skip >= n {
        return Err(EvaluateError::IndexOutOfRange {
            context: "compute_i_cntinfo",
            index: skip,
            n,
        });
    }
    let indices: Vec<usize> = (0..n).filter(|&i| i != skip).collect();
    let opts = CntOptions {
        normal_ci: false,
        ..opts
    };
    Ok(cnt_from_indices(pd, &indices, opts, cfg))
}

/// CNT statistics over the pairs at `indices`. Indices may repeat.
pub(crate) fn cnt_from_indices(
    pd: &PairStore,
    indices: &[usize],
    opts: CntOptions,
    cfg: &CiConfig,
) -> CntInfo {
    let mut cnt = CntInfo::new(cfg.alphas().len());
    let (f, o, w) = (pd.f(), pd.o(), pd.wgt());
    let ocmn = pd.ocmn();
    let fcmn = pd.fcmn();

    // Forecast anomalies use the forecast climatology when present.
    let oc_flag = set_climo_flag(f, ocmn);
    let fclimo = if set_climo_flag(f, fcmn) { fcmn } else { ocmn };
    let climo_flag = oc_flag && fclimo.len() == f.len();

    let used: Vec<usize> = indices
        .iter()
        .copied()
        .filter(|&i| {
            !is_bad(f[i])
                && !is_bad(o[i])
                && (!climo_flag || (!is_bad(ocmn[i]) && !is_bad(fclimo[i])))
        })
        .collect();
    let n = used.len();
    if n == 0 {
        debug!("no valid pairs for CNT");
        return cnt;
    }
    cnt.n = n;
    let nf = n as f64;

    let w_sum: f64 = used.iter().map(|&i| w[i]).sum();
    let weight = |i: usize| {
        if is_bad(w_sum) || w_sum <= 0.0 {
            1.0 / nf
        } else {
            w[i] / w_sum
        }
    };

    let mut s = Moments::default();
    let mut sa = Moments::default();
    let (mut err_bar, mut abs_err_bar, mut err_sq_bar) = (0.0, 0.0, 0.0);
    let mut errs = Vec::with_capacity(n);
    for &i in &used {
        let wi = weight(i);
        s.add(f[i], o[i], wi);
        if climo_flag {
            sa.add(f[i] - fclimo[i], o[i] - ocmn[i], wi);
        }
        let err = f[i] - o[i];
        errs.push(err);
        err_bar += wi * err;
        abs_err_bar += wi * err.abs();
        err_sq_bar += wi * err * err;
    }

    cnt.fbar.v = s.f;
    cnt.obar.v = s.o;
    cnt.fstdev.v = compute_stdev(s.f * nf, s.ff * nf, n);
    cnt.ostdev.v = compute_stdev(s.o * nf, s.oo * nf, n);
    cnt.pr_corr.v = s.corr(n);

    if climo_flag {
        cnt.anom_corr.v = sa.corr(n);
        cnt.rmsfa.v = sa.ff.sqrt();
        cnt.rmsoa.v = sa.oo.sqrt();
        cnt.anom_corr_uncntr.v = compute_anom_corr_uncntr(sa.ff, sa.oo, sa.fo);
    }

    cnt.me.v = err_bar;
    cnt.me2.v = err_bar * err_bar;
    cnt.estdev.v = compute_stdev(err_bar * nf, err_sq_bar * nf, n);
    cnt.mae.v = abs_err_bar;
    cnt.set_error_stats(err_sq_bar);

    let errs = sorted(&errs);
    cnt.e10.v = quantile_type7(&errs, 0.10);
    cnt.e25.v = quantile_type7(&errs, 0.25);
    cnt.e50.v = quantile_type7(&errs, 0.50);
    cnt.e75.v = quantile_type7(&errs, 0.75);
    cnt.e90.v = quantile_type7(&errs, 0.90);
    cnt.eiqr.v = cnt.e75.v - cnt.e25.v;
    let dev: Vec<f64> = errs.iter().map(|e| (e - cnt.e50.v).abs()).collect();
    cnt.mad.v = median(&sorted(&dev));

    if opts.rank {
        let ranked: Vec<usize> = used
            .iter()
            .copied()
            .filter(|&i| !(opts.precip && f[i] == 0.0 && o[i] == 0.0))
            .collect();
        compute_rank_corr(&mut cnt, &ranked, f, o);
    }

    if opts.normal_ci {
        cnt.compute_ci(cfg);
    }
    cnt
}

/// Weighted means of `f`, `o`, `f²`, `o²` and `fo`.
#[derive(Debug, Default)]
struct Moments {
    f: f64,
    o: f64,
    ff: f64,
    oo: f64,
    fo: f64,
}

impl Moments {
    fn add(&mut self, f: f64, o: f64, w: f64) {
        self.f += w * f;
        self.o += w * o;
        self.ff += w * f * f;
        self.oo += w * o * o;
        self.fo += w * f * o;
    }

    fn corr(&self, n: usize) -> f64 {
        let nf = n as f64;
        compute_corr(
            self.f * nf,
            self.o * nf,
            self.ff * nf,
            self.oo * nf,
            self.fo * nf,
            n,
        )
    }
}

fn compute_rank_corr(cnt: &mut CntInfo, used: &[usize], f: &[f64], o: &[f64]) {
    let n = used.len();
    cnt.n_ranks = n;
    if n == 0 {
        return;
    }
    let fv: Vec<f64> = used.iter().map(|&i| f[i]).collect();
    let ov: Vec<f64> = used.iter().map(|&i| o[i]).collect();
    let (fr, frank_ties) = rank_array(&fv);
    let (or, orank_ties) = rank_array(&ov);
    cnt.frank_ties = frank_ties;
    cnt.orank_ties = orank_ties;

    let mut m = Moments::default();
    for (a, b) in fr.iter().zip(&or) {
        m.add(*a, *b, 1.0);
    }
    cnt.sp_corr.v = compute_corr(m.f, m.o, m.ff, m.oo, m.fo, n);

    // Kendall tau-b from pair concordance.
    let (mut concordant, mut discordant) = (0.0_f64, 0.0_f64);
    let (mut f_tie_only, mut o_tie_only) = (0.0_f64, 0.0_f64);
    for i in 0..n {
        for j in (i + 1)..n {
            let df = fr[i] - fr[j];
            let d_o = or[i] - or[j];
            let p = df * d_o;
            if p > 0.0 {
                concordant += 1.0;
            } else if p < 0.0 {
                discordant += 1.0;
            } else if df == 0.0 && d_o != 0.0 {
                f_tie_only += 1.0;
            } else if d_o == 0.0 && df != 0.0 {
                o_tie_only += 1.0;
            }
        }
    }
    let den = (concordant + discordant + o_tie_only).sqrt()
        * (concordant + discordant + f_tie_only).sqrt();
    cnt.kt_corr.v = if is_zero(den) {
        BAD
    } else {
        (concordant - discordant) / den
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use verif_pairs::ClimoPntInfo;

    fn store(f: &[f64], o: &[f64]) -> PairStore {
        let mut pd = PairStore::new();
        let climo = vec![ClimoPntInfo::default(); f.len()];
        let wgt = vec![1.0; f.len()];
        pd.add_grid_pairs(f, o, &climo, &wgt).unwrap();
        pd
    }

    #[test]
    fn test_three_pair_example() {
        let pd = store(&[1.0, 2.0, 3.0], &[1.0, 2.0, 4.0]);
        let cnt = compute_cntinfo(&pd, CntOptions::default(), &CiConfig::default()).unwrap();
        assert_eq!(cnt.n, 3);
        assert_relative_eq!(cnt.mae.v, 1.0 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(cnt.mse.v, 1.0 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(cnt.fbar.v, 2.0, epsilon = 1e-12);
        assert_relative_eq!(cnt.obar.v, 7.0 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(cnt.me.v, -1.0 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(cnt.rmse.v, cnt.mse.v.sqrt(), epsilon = 1e-12);
        let d = cnt.fbar.v - cnt.obar.v;
        assert_relative_eq!(cnt.bcmse.v, cnt.mse.v - d * d, epsilon = 1e-12);
        assert_relative_eq!(cnt.mbias.v, 6.0 / 7.0, epsilon = 1e-12);
        assert!(is_bad(cnt.anom_corr.v));
    }

    #[test]
    fn test_error_percentiles() {
        let pd = store(&[1.0, 2.0, 3.0, 4.0, 5.0], &[0.0; 5]);
        let cnt = compute_cntinfo(&pd, CntOptions::default(), &CiConfig::default()).unwrap();
        assert_relative_eq!(cnt.e50.v, 3.0);
        assert_relative_eq!(cnt.e25.v, 2.0);
        assert_relative_eq!(cnt.e75.v, 4.0);
        assert_relative_eq!(cnt.eiqr.v, 2.0);
        assert_relative_eq!(cnt.e10.v, 1.4, epsilon = 1e-12);
        // |err - 3| = {2, 1, 0, 1, 2}
        assert_relative_eq!(cnt.mad.v, 1.0);
    }

    #[test]
    fn test_perfect_forecast_correlations() {
        let v = [3.0, 1.0, 4.0, 1.5, 5.0, 9.0];
        let pd = store(&v, &v);
        let opts = CntOptions {
            rank: true,
            ..Default::default()
        };
        let cnt = compute_cntinfo(&pd, opts, &CiConfig::default()).unwrap();
        assert_relative_eq!(cnt.pr_corr.v, 1.0, epsilon = 1e-12);
        assert_relative_eq!(cnt.sp_corr.v, 1.0, epsilon = 1e-12);
        assert_relative_eq!(cnt.kt_corr.v, 1.0, epsilon = 1e-12);
        assert_eq!(cnt.n_ranks, 6);
        assert_eq!(cnt.mse.v, 0.0);
    }

    #[test]
    fn test_kendall_reversed_order() {
        let pd = store(&[1.0, 2.0, 3.0, 4.0], &[4.0, 3.0, 2.0, 1.0]);
        let opts = CntOptions {
            rank: true,
            ..Default::default()
        };
        let cnt = compute_cntinfo(&pd, opts, &CiConfig::default()).unwrap();
        assert_relative_eq!(cnt.kt_corr.v, -1.0, epsilon = 1e-12);
        assert_relative_eq!(cnt.sp_corr.v, -1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_precip_excludes_zero_pairs_from_ranks() {
        let pd = store(&[0.0, 0.0, 1.0, 2.0, 3.0], &[0.0, 0.0, 1.5, 2.5, 2.0]);
        let opts = CntOptions {
            precip: true,
            rank: true,
            normal_ci: false,
        };
        let cnt = compute_cntinfo(&pd, opts, &CiConfig::default()).unwrap();
        assert_eq!(cnt.n, 5);
        assert_eq!(cnt.n_ranks, 3);
    }

    #[test]
    fn test_bad_values_are_skipped() {
        let pd = store(&[1.0, f64::NAN, 3.0], &[1.0, 2.0, 4.0]);
        let cnt = compute_cntinfo(&pd, CntOptions::default(), &CiConfig::default()).unwrap();
        assert_eq!(cnt.n, 2);
        assert_relative_eq!(cnt.fbar.v, 2.0);
    }

    #[test]
    fn test_anomaly_stats_with_climatology() {
        let mut pd = PairStore::new();
        let f = [2.0, 3.0, 5.0, 4.0];
        let o = [1.0, 3.0, 4.0, 5.0];
        let climo = vec![ClimoPntInfo::new(f64::NAN, f64::NAN, 3.0, 1.0); 4];
        pd.add_grid_pairs(&f, &o, &climo, &[1.0; 4]).unwrap();
        let cnt = compute_cntinfo(&pd, CntOptions::default(), &CiConfig::default()).unwrap();
        // Anomalies about 3: f {-1, 0, 2, 1}, o {-2, 0, 1, 2}
        assert_relative_eq!(cnt.rmsfa.v, (6.0_f64 / 4.0).sqrt(), epsilon = 1e-12);
        assert_relative_eq!(cnt.rmsoa.v, (9.0_f64 / 4.0).sqrt(), epsilon = 1e-12);
        assert_relative_eq!(
            cnt.anom_corr_uncntr.v,
            (6.0 / 4.0) / ((6.0_f64 / 4.0) * (9.0 / 4.0)).sqrt(),
            epsilon = 1e-12
        );
        assert!(!is_bad(cnt.anom_corr.v));
    }

    #[test]
    fn test_weights_are_normalized() {
        let mut pd = PairStore::new();
        let climo = vec![ClimoPntInfo::default(); 2];
        pd.add_grid_pairs(&[1.0, 3.0], &[0.0, 0.0], &climo, &[3.0, 1.0])
            .unwrap();
        let cnt = compute_cntinfo(&pd, CntOptions::default(), &CiConfig::default()).unwrap();
        assert_relative_eq!(cnt.fbar.v, 1.5, epsilon = 1e-12);
    }

    #[test]
    fn test_normal_ci_brackets_means() {
        let f: Vec<f64> = (0..50).map(|i| (i as f64 * 0.37).sin() * 3.0 + 10.0).collect();
        let o: Vec<f64> = (0..50).map(|i| (i as f64 * 0.41).cos() * 2.0 + 9.0).collect();
        let pd = store(&f, &o);
        let opts = CntOptions {
            normal_ci: true,
            ..Default::default()
        };
        let cfg = CiConfig::new().with_alphas(vec![0.05, 0.1]);
        let cnt = compute_cntinfo(&pd, opts, &cfg).unwrap();
        for i in 0..2 {
            assert!(cnt.fbar.ncl[i] < cnt.fbar.v && cnt.fbar.v < cnt.fbar.ncu[i]);
            assert!(cnt.ostdev.ncl[i] < cnt.ostdev.v && cnt.ostdev.v < cnt.ostdev.ncu[i]);
            assert!(is_bad(cnt.fbar.bcl[i]));
        }
        // Narrower interval at the larger alpha.
        assert!(cnt.fbar.ncu[1] - cnt.fbar.ncl[1] < cnt.fbar.ncu[0] - cnt.fbar.ncl[0]);
    }

    #[test]
    fn test_jackknife_skip() {
        let pd = store(&[1.0, 2.0, 3.0], &[1.0, 2.0, 4.0]);
        let cfg = CiConfig::default();
        let cnt = compute_i_cntinfo(&pd, 2, CntOptions::default(), &cfg).unwrap();
        assert_eq!(cnt.n, 2);
        assert_eq!(cnt.mse.v, 0.0);
        assert!(matches!(
            compute_i_cntinfo(&pd, 3, CntOptions::default(), &cfg),
            Err(EvaluateError::IndexOutOfRange { index: 3, n: 3, .. })
        ));
    }

    #[test]
    fn test_empty_store_is_all_bad() {
        let pd = PairStore::new();
        let cnt = compute_cntinfo(&pd, CntOptions::default(), &CiConfig::default()).unwrap();
        assert_eq!(cnt.n, 0);
        assert!(is_bad(cnt.rmse.v));
    }
}
