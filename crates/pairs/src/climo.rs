//! Climatology at a point, climatological CDF bins and derived probabilities.

use verif_stats::{BAD, is_bad, normal_cdf, normal_cdf_inv};

use crate::error::PairsError;
use crate::thresh::{SingleThresh, ThreshArray, ThreshOp};

/// Forecast and observation climatology at one pair. Missing values are NaN.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClimoPntInfo {
    /// Forecast climatology mean.
    pub fcmn: f64,
    /// Forecast climatology standard deviation.
    pub fcsd: f64,
    /// Observation climatology mean.
    pub ocmn: f64,
    /// Observation climatology standard deviation.
    pub ocsd: f64,
}

impl Default for ClimoPntInfo {
    fn default() -> Self {
        Self::new(BAD, BAD, BAD, BAD)
    }
}

impl ClimoPntInfo {
    pub fn new(fcmn: f64, fcsd: f64, ocmn: f64, ocsd: f64) -> Self {
        Self {
            fcmn,
            fcsd,
            ocmn,
            ocsd,
        }
    }
}

/// Climatological CDF bin boundaries.
///
/// Thresholds are probabilities in `[0, 1]`, strictly increasing, starting
/// at 0.0 and ending at 1.0. They define `n_thresholds - 1` bins.
///
/// # Example
///
/// ```
/// use verif_pairs::ClimoCdfInfo;
///
/// let cdf = ClimoCdfInfo::from_n_bins(4).unwrap();
/// assert_eq!(cdf.thresholds(), &[0.0, 0.25, 0.5, 0.75, 1.0]);
/// assert_eq!(cdf.n_bin(), 4);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ClimoCdfInfo {
    thresholds: Vec<f64>,
    direct_prob: bool,
}

impl ClimoCdfInfo {
    /// Builds CDF bins from explicit thresholds.
    pub fn new(thresholds: Vec<f64>) -> Result<Self, PairsError> {
        let invalid = |reason: String| Err(PairsError::InvalidCdfThresholds { reason });
        if thresholds.len() < 2 {
            return invalid(format!(
                "need at least 2 thresholds, got {}",
                thresholds.len()
            ));
        }
        if thresholds[0] != 0.0 {
            return invalid(format!("first threshold must be 0.0, got {}", thresholds[0]));
        }
        let last = thresholds[thresholds.len() - 1];
        if last != 1.0 {
            return invalid(format!("last threshold must be 1.0, got {last}"));
        }
        if thresholds.windows(2).any(|w| !(w[0] < w[1])) {
            return invalid("thresholds must be strictly increasing".to_string());
        }
        Ok(Self {
            thresholds,
            direct_prob: false,
        })
    }

    /// Builds `n_bin` equally sized bins.
    pub fn from_n_bins(n_bin: usize) -> Result<Self, PairsError> {
        if n_bin < 1 {
            return Err(PairsError::InvalidCdfThresholds {
                reason: "number of bins must be >= 1".to_string(),
            });
        }
        let thresholds = (0..=n_bin).map(|i| i as f64 / n_bin as f64).collect();
        Self::new(thresholds)
    }

    /// Evaluate climatological probabilities directly from the normal CDF
    /// instead of sampling derived climatology values.
    pub fn with_direct_prob(mut self, direct_prob: bool) -> Self {
        self.direct_prob = direct_prob;
        self
    }

    pub fn thresholds(&self) -> &[f64] {
        &self.thresholds
    }

    pub fn direct_prob(&self) -> bool {
        self.direct_prob
    }

    /// Number of bins.
    pub fn n_bin(&self) -> usize {
        self.thresholds.len() - 1
    }

    /// The thresholds as `>=` comparisons, for [`ThreshArray::check_bins`].
    pub fn cdf_ta(&self) -> ThreshArray {
        ThreshArray::new(
            self.thresholds
                .iter()
                .map(|&t| SingleThresh::new(ThreshOp::Ge, t))
                .collect(),
        )
    }
}

/// Returns `true` when `climo` lines up with `f` and holds any valid value.
pub fn set_climo_flag(f: &[f64], climo: &[f64]) -> bool {
    !f.is_empty() && climo.len() == f.len() && climo.iter().any(|v| !is_bad(*v))
}

/// Climatological CDF value of `o`.
pub fn compute_climo_cdf(o: f64, climo: &ClimoPntInfo) -> f64 {
    normal_cdf(o, climo.ocmn, climo.ocsd)
}

/// Samples the climatological distribution at the interior CDF thresholds.
///
/// A bad mean yields nothing. A bad spread or no interior thresholds yields
/// just the mean. The first and last thresholds (0 and 1) are never sampled.
pub fn derive_climo_vals(cdf_info: &ClimoCdfInfo, m: f64, s: f64) -> Vec<f64> {
    if is_bad(m) {
        return Vec::new();
    }
    let t = cdf_info.thresholds();
    if t.len() <= 2 || is_bad(s) {
        return vec![m];
    }
    t[1..t.len() - 1]
        .iter()
        .map(|&p| normal_cdf_inv(p, m, s))
        .collect()
}

/// Fraction of `values` passing `thresh`. Bad for empty input.
pub fn derive_prob(values: &[f64], thresh: &SingleThresh) -> f64 {
    if values.is_empty() {
        return BAD;
    }
    let n_pass = values.iter().filter(|v| thresh.check(**v)).count();
    n_pass as f64 / values.len() as f64
}

/// Climatological probability of the event `othresh` for each pair.
///
/// - Percentile thresholds give the constant event probability implied by
///   the percentile.
/// - With means and spreads, either the direct normal CDF or the fraction
///   of [`derive_climo_vals`] passing the threshold.
/// - With means only, 1.0 or 0.0 by testing the mean itself.
///
/// Returns an empty vector when no climatology is available.
pub fn derive_climo_prob(
    cdf_info: &ClimoCdfInfo,
    mn: &[f64],
    sd: &[f64],
    othresh: &SingleThresh,
) -> Vec<f64> {
    let n_mn = mn.iter().filter(|v| !is_bad(**v)).count();
    let n_sd = sd.iter().filter(|v| !is_bad(**v)).count();

    if let Some(p) = othresh.percentile() {
        let prob = p / 100.0;
        let prob = match othresh.op() {
            ThreshOp::Gt | ThreshOp::Ge => 1.0 - prob,
            _ => prob,
        };
        return vec![prob; mn.len()];
    }

    if n_mn > 0 && n_sd > 0 && sd.len() == mn.len() {
        return mn
            .iter()
            .zip(sd)
            .map(|(&m, &s)| {
                if cdf_info.direct_prob() {
                    direct_climo_prob(m, s, othresh)
                } else {
                    derive_prob(&derive_climo_vals(cdf_info, m, s), othresh)
                }
            })
            .collect();
    }

    if n_mn > 0 {
        return mn
            .iter()
            .map(|&m| {
                if is_bad(m) {
                    BAD
                } else if othresh.check(m) {
                    1.0
                } else {
                    0.0
                }
            })
            .collect();
    }

    Vec::new()
}

fn direct_climo_prob(m: f64, s: f64, othresh: &SingleThresh) -> f64 {
    let t = othresh.resolve(&ClimoPntInfo::default());
    let cdf = normal_cdf(t, m, s);
    match othresh.op() {
        ThreshOp::Lt | ThreshOp::Le => cdf,
        ThreshOp::Gt | ThreshOp::Ge => 1.0 - cdf,
        _ => BAD,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn cdf_info_validation() {
        assert!(ClimoCdfInfo::new(vec![0.0, 0.5, 1.0]).is_ok());
        assert!(matches!(
            ClimoCdfInfo::new(vec![0.0]),
            Err(PairsError::InvalidCdfThresholds { .. })
        ));
        assert!(matches!(
            ClimoCdfInfo::new(vec![0.1, 1.0]),
            Err(PairsError::InvalidCdfThresholds { .. })
        ));
        assert!(matches!(
            ClimoCdfInfo::new(vec![0.0, 0.9]),
            Err(PairsError::InvalidCdfThresholds { .. })
        ));
        assert!(matches!(
            ClimoCdfInfo::new(vec![0.0, 0.5, 0.5, 1.0]),
            Err(PairsError::InvalidCdfThresholds { .. })
        ));
        assert!(ClimoCdfInfo::from_n_bins(0).is_err());
    }

    #[test]
    fn cdf_ta_bins() {
        let cdf = ClimoCdfInfo::new(vec![0.0, 0.5, 1.0]).unwrap();
        let ta = cdf.cdf_ta();
        let c = ClimoPntInfo::default();
        assert_eq!(cdf.n_bin(), 2);
        assert_eq!(ta.check_bins(0.2, &c), Some(1));
        assert_eq!(ta.check_bins(0.7, &c), Some(2));
    }

    #[test]
    fn climo_flag() {
        let f = [1.0, 2.0];
        assert!(set_climo_flag(&f, &[f64::NAN, 3.0]));
        assert!(!set_climo_flag(&f, &[f64::NAN, f64::NAN]));
        assert!(!set_climo_flag(&f, &[3.0]));
        assert!(!set_climo_flag(&[], &[]));
    }

    #[test]
    fn climo_vals_skip_end_thresholds() {
        let cdf = ClimoCdfInfo::from_n_bins(2).unwrap();
        let vals = derive_climo_vals(&cdf, 10.0, 2.0);
        assert_eq!(vals.len(), 1);
        assert_relative_eq!(vals[0], 10.0, epsilon = 1e-9);

        assert!(derive_climo_vals(&cdf, f64::NAN, 2.0).is_empty());
        assert_eq!(derive_climo_vals(&cdf, 10.0, f64::NAN), vec![10.0]);

        let one_bin = ClimoCdfInfo::from_n_bins(1).unwrap();
        assert_eq!(derive_climo_vals(&one_bin, 4.0, 1.0), vec![4.0]);
    }

    #[test]
    fn climo_prob_percentile_is_constant() {
        let cdf = ClimoCdfInfo::from_n_bins(4).unwrap();
        let t: SingleThresh = ">OCDP90".parse().unwrap();
        let p = derive_climo_prob(&cdf, &[1.0, 2.0], &[], &t);
        assert_eq!(p.len(), 2);
        assert_relative_eq!(p[0], 0.1, epsilon = 1e-12);
    }

    #[test]
    fn climo_prob_direct_normal() {
        let cdf = ClimoCdfInfo::from_n_bins(4)
            .unwrap()
            .with_direct_prob(true);
        let t: SingleThresh = ">10".parse().unwrap();
        let p = derive_climo_prob(&cdf, &[10.0], &[2.0], &t);
        assert_relative_eq!(p[0], 0.5, epsilon = 1e-9);
    }

    #[test]
    fn climo_prob_sampled() {
        // Interior thresholds 0.25, 0.5, 0.75 of N(10, 2); two lie above 9.9.
        let cdf = ClimoCdfInfo::from_n_bins(4).unwrap();
        let t: SingleThresh = ">9.9".parse().unwrap();
        let p = derive_climo_prob(&cdf, &[10.0], &[2.0], &t);
        assert_relative_eq!(p[0], 2.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn climo_prob_mean_only() {
        let cdf = ClimoCdfInfo::from_n_bins(4).unwrap();
        let t: SingleThresh = ">5".parse().unwrap();
        let p = derive_climo_prob(&cdf, &[6.0, 4.0], &[], &t);
        assert_eq!(p, vec![1.0, 0.0]);
        assert!(derive_climo_prob(&cdf, &[], &[], &t).is_empty());
    }

    #[test]
    fn derive_prob_fraction() {
        let t: SingleThresh = ">=2".parse().unwrap();
        assert_relative_eq!(derive_prob(&[1.0, 2.0, 3.0, 4.0], &t), 0.75);
        assert!(is_bad(derive_prob(&[], &t)));
    }
}
