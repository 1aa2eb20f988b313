//! Percentile bootstrap confidence intervals for CNT and CTS.
//!
//! Each replicate resamples `nint(proportion * n)` pair indices with
//! replacement and recomputes the statistics without ranks or normal
//! intervals. The `bcl`/`bcu` bounds of every statistic are percentiles of
//! its replicate values.

use rand::Rng;
use tracing::debug;
use verif_pairs::{PairStore, SingleThresh};
use verif_stats::nint;

use crate::ci::{CiFields, compute_perc_interval, field_values};
use crate::cnt::{CntInfo, CntOptions, cnt_from_indices};
use crate::config::CiConfig;
use crate::cts::{CtsInfo, cts_table_from_indices};
use crate::error::EvaluateError;

/// Fills the bootstrap intervals of `cnt` from replicates of `pd`.
pub fn compute_cnt_stats_ci_perc(
    pd: &PairStore,
    opts: CntOptions,
    cnt: &mut CntInfo,
    cfg: &CiConfig,
    rng: &mut impl Rng,
) -> Result<(), EvaluateError> {
    cfg.validate()?;
    let opts = CntOptions {
        rank: false,
        normal_ci: false,
        ..opts
    };
    let replicates = draw_replicates(pd.n_obs(), cfg, rng, |idx| {
        cnt_from_indices(pd, idx, opts, cfg)
    });
    fill_perc_intervals(cnt, &replicates, cfg.alphas());
    Ok(())
}

/// Fills the bootstrap intervals of `cts` from replicates of `pd`.
pub fn compute_cts_stats_ci_perc(
    pd: &PairStore,
    ft: &SingleThresh,
    ot: &SingleThresh,
    cts: &mut CtsInfo,
    cfg: &CiConfig,
    rng: &mut impl Rng,
) -> Result<(), EvaluateError> {
    cfg.validate()?;
    let n_alpha = cfg.alphas().len();
    let replicates = draw_replicates(pd.n_obs(), cfg, rng, |idx| {
        CtsInfo::from_table(cts_table_from_indices(pd, idx, ft, ot), n_alpha)
    });
    fill_perc_intervals(cts, &replicates, cfg.alphas());
    Ok(())
}

/// Builds the configured number of replicates. Nothing is drawn for one
/// pair or fewer, or when replicates are disabled.
fn draw_replicates<T>(
    n: usize,
    cfg: &CiConfig,
    rng: &mut impl Rng,
    compute: impl Fn(&[usize]) -> T,
) -> Vec<T> {
    let m = nint(cfg.replicate_proportion() * n as f64).max(0) as usize;
    if n <= 1 || m == 0 || cfg.n_replicates() == 0 {
        return Vec::new();
    }
    debug!(n, m, n_replicates = cfg.n_replicates(), "drawing bootstrap replicates");
    let mut idx = vec![0; m];
    (0..cfg.n_replicates())
        .map(|_| {
            for slot in idx.iter_mut() {
                *slot = rng.random_range(0..n);
            }
            compute(&idx)
        })
        .collect()
}

fn fill_perc_intervals<T: CiFields>(target: &mut T, replicates: &[T], alphas: &[f64]) {
    if replicates.is_empty() {
        return;
    }
    let per_rep = field_values(replicates);
    for (k, (_, ci)) in target.ci_fields_mut().into_iter().enumerate() {
        let values: Vec<f64> = per_rep.iter().map(|r| r[k]).collect();
        for (i, &alpha) in alphas.iter().enumerate() {
            ci.set_bootstrap(i, compute_perc_interval(&values, alpha));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cnt::compute_cntinfo;
    use crate::cts::compute_ctsinfo;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use verif_pairs::ClimoPntInfo;
    use verif_stats::is_bad;

    fn random_store(n: usize, seed: u64) -> PairStore {
        let mut rng = StdRng::seed_from_u64(seed);
        let o: Vec<f64> = (0..n).map(|_| rng.random_range(0.0..10.0)).collect();
        let f: Vec<f64> = o.iter().map(|v| v + rng.random_range(-1.0..1.5)).collect();
        let mut pd = PairStore::new();
        pd.add_grid_pairs(&f, &o, &vec![ClimoPntInfo::default(); n], &vec![1.0; n])
            .unwrap();
        pd
    }

    #[test]
    fn test_cnt_bootstrap_brackets_mean() {
        let pd = random_store(80, 1);
        let cfg = CiConfig::new().with_n_replicates(200);
        let opts = CntOptions::default();
        let mut cnt = compute_cntinfo(&pd, opts, &cfg).unwrap();
        let mut rng = StdRng::seed_from_u64(42);
        compute_cnt_stats_ci_perc(&pd, opts, &mut cnt, &cfg, &mut rng).unwrap();
        assert!(cnt.fbar.bcl[0] < cnt.fbar.v && cnt.fbar.v < cnt.fbar.bcu[0]);
        assert!(cnt.me.bcl[0] < cnt.me.v && cnt.me.v < cnt.me.bcu[0]);
        // Rank statistics are not bootstrapped.
        assert!(is_bad(cnt.sp_corr.bcl[0]));
    }

    #[test]
    fn test_bootstrap_is_reproducible_with_seed() {
        let pd = random_store(30, 2);
        let cfg = CiConfig::new().with_n_replicates(50).with_replicate_proportion(0.8);
        let opts = CntOptions::default();
        let mut a = compute_cntinfo(&pd, opts, &cfg).unwrap();
        let mut b = a.clone();
        compute_cnt_stats_ci_perc(&pd, opts, &mut a, &cfg, &mut StdRng::seed_from_u64(9)).unwrap();
        compute_cnt_stats_ci_perc(&pd, opts, &mut b, &cfg, &mut StdRng::seed_from_u64(9)).unwrap();
        assert_eq!(a.rmse.bcl, b.rmse.bcl);
        assert_eq!(a.rmse.bcu, b.rmse.bcu);
    }

    #[test]
    fn test_no_replicates_leaves_intervals_bad() {
        let pd = random_store(10, 3);
        let cfg = CiConfig::new().with_n_replicates(0);
        let mut cnt = compute_cntinfo(&pd, CntOptions::default(), &cfg).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        compute_cnt_stats_ci_perc(&pd, CntOptions::default(), &mut cnt, &cfg, &mut rng).unwrap();
        assert!(is_bad(cnt.fbar.bcl[0]));
    }

    #[test]
    fn test_cts_bootstrap() {
        let pd = random_store(100, 4);
        let t: SingleThresh = ">=5".parse().unwrap();
        let cfg = CiConfig::new().with_n_replicates(100).with_alphas(vec![0.05, 0.2]);
        let mut cts = compute_ctsinfo(&pd, &t, &t, false, &cfg).unwrap();
        let mut rng = StdRng::seed_from_u64(5);
        compute_cts_stats_ci_perc(&pd, &t, &t, &mut cts, &cfg, &mut rng).unwrap();
        for i in 0..2 {
            assert!(cts.baser.bcl[i] <= cts.baser.v && cts.baser.v <= cts.baser.bcu[i]);
        }
        assert!(cts.acc.bcu[1] - cts.acc.bcl[1] <= cts.acc.bcu[0] - cts.acc.bcl[0]);
    }
}
