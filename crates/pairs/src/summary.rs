//! Reduction of repeated observations at one location to a single value.

use std::cmp::Ordering;
use std::fmt;

/// How repeated observations at one location are summarized.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum ObsSummary {
    /// Keep every observation.
    #[default]
    None,
    /// Closest valid time to the forecast time.
    Nearest,
    Min,
    Max,
    /// Unweighted mean.
    UwMean,
    /// Mean weighted by inverse squared time distance.
    DwMean,
    Median,
    /// Arbitrary percentile in `[0, 100]`.
    Perc(f64),
}

impl fmt::Display for ObsSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObsSummary::None => f.write_str("NONE"),
            ObsSummary::Nearest => f.write_str("NEAREST"),
            ObsSummary::Min => f.write_str("MIN"),
            ObsSummary::Max => f.write_str("MAX"),
            ObsSummary::UwMean => f.write_str("UW_MEAN"),
            ObsSummary::DwMean => f.write_str("DW_MEAN"),
            ObsSummary::Median => f.write_str("MEDIAN"),
            ObsSummary::Perc(p) => write!(f, "PERC{p}"),
        }
    }
}

/// One raw observation recorded under a location key.
#[derive(Debug, Clone, PartialEq)]
pub struct ObVal {
    /// Valid time (unix seconds).
    pub ut: i64,
    pub val: f64,
    pub qc: String,
}

/// Reduces `obs` with `method`. Returns `None` for [`ObsSummary::None`] or
/// empty input.
pub(crate) fn summarize(method: ObsSummary, obs: &[ObVal], fcst_ut: i64) -> Option<ObVal> {
    if obs.is_empty() {
        return None;
    }
    match method {
        ObsSummary::None => None,
        ObsSummary::Nearest => Some(first_min_by_key(obs, |o| (o.ut - fcst_ut).abs() as f64)),
        ObsSummary::Min => Some(first_min_by_key(obs, |o| o.val)),
        ObsSummary::Max => Some(first_min_by_key(obs, |o| -o.val)),
        ObsSummary::UwMean => {
            let total: f64 = obs.iter().map(|o| o.val).sum();
            Some(ObVal {
                ut: fcst_ut,
                val: total / obs.len() as f64,
                qc: uniform_qc(obs),
            })
        }
        ObsSummary::DwMean => {
            let mut total = 0.0;
            let mut total_weight = 0.0;
            for o in obs {
                if o.ut == fcst_ut {
                    return Some(o.clone());
                }
                let dt = (o.ut - fcst_ut) as f64;
                let weight = 1.0 / (dt * dt);
                total += o.val * weight;
                total_weight += weight;
            }
            Some(ObVal {
                ut: fcst_ut,
                val: total / total_weight,
                qc: uniform_qc(obs),
            })
        }
        ObsSummary::Median => Some(percentile(obs, 50.0)),
        ObsSummary::Perc(p) => Some(percentile(obs, p)),
    }
}

/// First element with the strictly smallest key.
fn first_min_by_key(obs: &[ObVal], key: impl Fn(&ObVal) -> f64) -> ObVal {
    let mut best = &obs[0];
    let mut best_key = key(best);
    for o in &obs[1..] {
        let k = key(o);
        if k < best_key {
            best = o;
            best_key = k;
        }
    }
    best.clone()
}

/// Order statistic at index `ceil(p/100 * (n-1))`, without interpolation.
fn percentile(obs: &[ObVal], p: f64) -> ObVal {
    let mut sorted = obs.to_vec();
    sorted.sort_by(|a, b| a.val.partial_cmp(&b.val).unwrap_or(Ordering::Equal));
    let idx = ((p / 100.0) * (sorted.len() - 1) as f64).ceil() as usize;
    sorted.swap_remove(idx.min(sorted.len() - 1))
}

fn uniform_qc(obs: &[ObVal]) -> String {
    let first = &obs[0].qc;
    if obs.iter().all(|o| &o.qc == first) {
        first.clone()
    } else {
        "NA".to_string()
    }
}
