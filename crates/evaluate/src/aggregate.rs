//! Means over already computed results, plus the mean and standard
//! deviation of a plain value series.
//!
//! The `compute_*_mean` functions take the unweighted mean of each
//! statistic over the inputs, skipping bad values. Counts are summed.

use serde::Serialize;
use verif_stats::{BAD, compute_stdev, is_bad, mean};

use crate::ci::{CiFields, CiInfo, compute_mean_ci, compute_stdev_ci, field_values};
use crate::cnt::CntInfo;
use crate::config::CiConfig;
use crate::cts::{CtsInfo, CtsTable};
use crate::error::EvaluateError;
use crate::pct::PctInfo;
use crate::sl1l2::Sl1l2Info;

/// Mean and sample standard deviation of a series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeanStdev {
    /// Number of good values used.
    pub n: usize,
    pub mean: CiInfo,
    pub stdev: CiInfo,
}

/// Mean and standard deviation of the good values in `values`.
pub fn compute_mean_stdev(values: &[f64], normal_ci: bool, cfg: &CiConfig) -> MeanStdev {
    mean_stdev_of(values.iter().copied(), normal_ci, cfg)
}

/// [`compute_mean_stdev`] with the value at `skip` left out.
pub fn compute_i_mean_stdev(
    values: &[f64],
    skip: usize,
    normal_ci: bool,
    cfg: &CiConfig,
) -> Result<MeanStdev, EvaluateError> {
    if skip >= values.len() {
        return Err(EvaluateError::IndexOutOfRange {
            context: "compute_i_mean_stdev",
            index: skip,
            n: values.len(),
        });
    }
    let kept = values
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != skip)
        .map(|(_, v)| *v);
    Ok(mean_stdev_of(kept, normal_ci, cfg))
}

fn mean_stdev_of(values: impl Iterator<Item = f64>, normal_ci: bool, cfg: &CiConfig) -> MeanStdev {
    let n_alpha = cfg.alphas().len();
    let (mut n, mut sum, mut sum_sq) = (0usize, 0.0, 0.0);
    for v in values.filter(|v| !is_bad(*v)) {
        n += 1;
        sum += v;
        sum_sq += v * v;
    }
    let mut out = MeanStdev {
        n,
        mean: CiInfo::new(n_alpha),
        stdev: CiInfo::new(n_alpha),
    };
    if n == 0 {
        return out;
    }
    out.mean.v = sum / n as f64;
    out.stdev.v = compute_stdev(sum, sum_sq, n);
    if normal_ci {
        for (i, &alpha) in cfg.alphas().iter().enumerate() {
            let ci = compute_mean_ci(
                out.mean.v,
                out.stdev.v,
                out.mean.vif,
                n,
                alpha,
                cfg.large_sample_threshold(),
            );
            out.mean.set_normal(i, ci);
            out.stdev.set_normal(i, compute_stdev_ci(out.stdev.v, n, alpha));
        }
    }
    out
}

/// Mean of the good values, or bad data when there are none.
fn mean_good(values: impl Iterator<Item = f64>) -> f64 {
    let good: Vec<f64> = values.filter(|v| !is_bad(*v)).collect();
    mean(&good)
}

/// Sets each statistic value of `target` to the mean over `items`.
fn mean_ci_fields<T: CiFields>(target: &mut T, items: &[T]) {
    let per_item = field_values(items);
    for (k, (_, ci)) in target.ci_fields_mut().into_iter().enumerate() {
        ci.v = mean_good(per_item.iter().map(|r| r[k]));
    }
}

fn n_alpha_of<T: CiFields>(items: &[T], context: &'static str) -> Result<usize, EvaluateError> {
    let first = items.first().ok_or(EvaluateError::NoPairs { context })?;
    let n_alpha = first.ci_fields().first().map_or(0, |(_, ci)| ci.n_alpha());
    Ok(n_alpha)
}

/// Mean of SL1L2 partial sums. Scalar sums average over the inputs with
/// pairs and anomaly sums over the inputs with climatology.
pub fn compute_sl1l2_mean(infos: &[Sl1l2Info]) -> Sl1l2Info {
    let with_pairs: Vec<&Sl1l2Info> = infos.iter().filter(|s| s.scount > 0).collect();
    let with_climo: Vec<&Sl1l2Info> = infos.iter().filter(|s| s.sacount > 0).collect();
    let avg = |set: &[&Sl1l2Info], get: fn(&Sl1l2Info) -> f64| {
        if set.is_empty() {
            BAD
        } else {
            mean_good(set.iter().map(|s| get(s)))
        }
    };
    Sl1l2Info {
        scount: with_pairs.iter().map(|s| s.scount).sum(),
        fbar: avg(&with_pairs, |s| s.fbar),
        obar: avg(&with_pairs, |s| s.obar),
        fobar: avg(&with_pairs, |s| s.fobar),
        ffbar: avg(&with_pairs, |s| s.ffbar),
        oobar: avg(&with_pairs, |s| s.oobar),
        mae: avg(&with_pairs, |s| s.mae),
        sacount: with_climo.iter().map(|s| s.sacount).sum(),
        fabar: avg(&with_climo, |s| s.fabar),
        oabar: avg(&with_climo, |s| s.oabar),
        foabar: avg(&with_climo, |s| s.foabar),
        ffabar: avg(&with_climo, |s| s.ffabar),
        ooabar: avg(&with_climo, |s| s.ooabar),
    }
}

/// Mean of CNT results. Pair counts are summed.
pub fn compute_cnt_mean(infos: &[CntInfo]) -> Result<CntInfo, EvaluateError> {
    let n_alpha = n_alpha_of(infos, "compute_cnt_mean")?;
    let mut out = CntInfo::new(n_alpha);
    out.n = infos.iter().map(|c| c.n).sum();
    out.n_ranks = infos.iter().map(|c| c.n_ranks).sum();
    out.frank_ties = infos.iter().map(|c| c.frank_ties).sum();
    out.orank_ties = infos.iter().map(|c| c.orank_ties).sum();
    mean_ci_fields(&mut out, infos);
    Ok(out)
}

/// Mean of CTS results. Contingency table counts are summed.
pub fn compute_cts_mean(infos: &[CtsInfo]) -> Result<CtsInfo, EvaluateError> {
    let n_alpha = n_alpha_of(infos, "compute_cts_mean")?;
    let mut cts = CtsTable::default();
    for info in infos {
        cts.fy_oy += info.cts.fy_oy;
        cts.fy_on += info.cts.fy_on;
        cts.fn_oy += info.cts.fn_oy;
        cts.fn_on += info.cts.fn_on;
    }
    let mut out = CtsInfo::new(n_alpha);
    out.cts = cts;
    out.ec_value = infos[0].ec_value;
    mean_ci_fields(&mut out, infos);
    Ok(out)
}

/// Mean of PCT results, which must share probability thresholds.
///
/// Table counts and totals are summed when `sum_total` is set and
/// averaged otherwise. Row detail is rebuilt from the combined table.
pub fn compute_pct_mean(infos: &[PctInfo], sum_total: bool) -> Result<PctInfo, EvaluateError> {
    let n_alpha = n_alpha_of(infos, "compute_pct_mean")?;
    let mut pct = infos[0].pct.clone();
    let mut climo_pct = infos[0].climo_pct.clone();
    for info in &infos[1..] {
        pct.merge_counts(&info.pct)?;
        climo_pct.merge_counts(&info.climo_pct)?;
    }
    let mut total: f64 = infos.iter().map(|p| p.total).sum();
    if !sum_total {
        let scale = 1.0 / infos.len() as f64;
        pct.scale_counts(scale);
        climo_pct.scale_counts(scale);
        total *= scale;
    }

    let mut out = PctInfo::from_tables(pct, climo_pct, n_alpha);
    out.total = total;
    mean_ci_fields(&mut out, infos);
    out.reliability = mean_good(infos.iter().map(|p| p.reliability));
    out.resolution = mean_good(infos.iter().map(|p| p.resolution));
    out.uncertainty = mean_good(infos.iter().map(|p| p.uncertainty));
    out.bss_smpl = mean_good(infos.iter().map(|p| p.bss_smpl));
    out.roc_auc = mean_good(infos.iter().map(|p| p.roc_auc));
    Ok(out)
}
