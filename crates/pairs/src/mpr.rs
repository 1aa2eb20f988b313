//! Matched-pair column filters.
//!
//! A filter pairs a column expression with a threshold. Expressions name a
//! single column (`OBS`), a difference of columns (`FCST-OBS`), or the
//! absolute value of either (`ABS(FCST-OBS)`).

use std::fmt;
use std::str::FromStr;

use tracing::debug;
use verif_stats::{BAD, is_bad};

use crate::climo::{ClimoPntInfo, compute_climo_cdf};
use crate::error::PairsError;
use crate::grid::DataPlane;
use crate::thresh::SingleThresh;

/// A matched-pair column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MprColumn {
    Fcst,
    Obs,
    FcstClimoMean,
    FcstClimoStdev,
    /// Also accepted as `CLIMO_MEAN`.
    ObsClimoMean,
    /// Also accepted as `CLIMO_STDEV`.
    ObsClimoStdev,
    /// Climatological CDF of the observation; also accepted as `CLIMO_CDF`.
    ObsClimoCdf,
}

impl MprColumn {
    fn value(self, f: f64, o: f64, climo: &ClimoPntInfo) -> f64 {
        match self {
            MprColumn::Fcst => f,
            MprColumn::Obs => o,
            MprColumn::FcstClimoMean => climo.fcmn,
            MprColumn::FcstClimoStdev => climo.fcsd,
            MprColumn::ObsClimoMean => climo.ocmn,
            MprColumn::ObsClimoStdev => climo.ocsd,
            MprColumn::ObsClimoCdf => compute_climo_cdf(o, climo),
        }
    }
}

impl FromStr for MprColumn {
    type Err = PairsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "FCST" => Ok(MprColumn::Fcst),
            "OBS" => Ok(MprColumn::Obs),
            "FCST_CLIMO_MEAN" => Ok(MprColumn::FcstClimoMean),
            "FCST_CLIMO_STDEV" => Ok(MprColumn::FcstClimoStdev),
            "CLIMO_MEAN" | "OBS_CLIMO_MEAN" => Ok(MprColumn::ObsClimoMean),
            "CLIMO_STDEV" | "OBS_CLIMO_STDEV" => Ok(MprColumn::ObsClimoStdev),
            "CLIMO_CDF" | "OBS_CLIMO_CDF" => Ok(MprColumn::ObsClimoCdf),
            _ => Err(PairsError::UnknownMprColumn {
                column: s.to_string(),
            }),
        }
    }
}

/// Column expression: one column, or the first minus the rest, optionally
/// wrapped in `ABS()`.
#[derive(Debug, Clone, PartialEq)]
pub struct MprExpr {
    text: String,
    abs: bool,
    columns: Vec<MprColumn>,
}

impl MprExpr {
    /// Evaluates the expression for one pair. Any bad operand gives NaN.
    pub fn evaluate(&self, f: f64, o: f64, climo: &ClimoPntInfo) -> f64 {
        let mut cols = self.columns.iter();
        let Some(first) = cols.next() else {
            return BAD;
        };
        let mut v = first.value(f, o, climo);
        for col in cols {
            let cur = col.value(f, o, climo);
            v = if is_bad(v) || is_bad(cur) { BAD } else { v - cur };
        }
        if self.abs && !is_bad(v) { v.abs() } else { v }
    }
}

impl fmt::Display for MprExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl FromStr for MprExpr {
    type Err = PairsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        let upper = text.to_ascii_uppercase();
        let (abs, inner) = match upper.strip_prefix("ABS(") {
            Some(rest) => match rest.strip_suffix(')') {
                Some(inner) => (true, inner.to_string()),
                None => {
                    return Err(PairsError::UnknownMprColumn {
                        column: text.to_string(),
                    });
                }
            },
            None => (false, upper),
        };
        let columns = inner
            .split('-')
            .map(str::parse)
            .collect::<Result<Vec<MprColumn>, _>>()
            .map_err(|_| PairsError::UnknownMprColumn {
                column: text.to_string(),
            })?;
        Ok(Self {
            text: text.to_string(),
            abs,
            columns,
        })
    }
}

/// A column expression with the threshold its value must pass.
///
/// # Example
///
/// ```
/// use verif_pairs::{ClimoPntInfo, MprFilter};
///
/// let filter = MprFilter::parse("ABS(FCST-OBS)", "<5").unwrap();
/// let climo = ClimoPntInfo::default();
/// assert!(filter.check(10.0, 12.0, &climo));
/// assert!(!filter.check(10.0, 20.0, &climo));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct MprFilter {
    expr: MprExpr,
    thresh: SingleThresh,
}

impl MprFilter {
    pub fn new(expr: MprExpr, thresh: SingleThresh) -> Self {
        Self { expr, thresh }
    }

    /// Parses a column expression and a threshold.
    pub fn parse(column: &str, thresh: &str) -> Result<Self, PairsError> {
        Ok(Self::new(column.parse()?, thresh.parse()?))
    }

    pub fn expr(&self) -> &MprExpr {
        &self.expr
    }

    pub fn thresh(&self) -> &SingleThresh {
        &self.thresh
    }

    pub fn check(&self, f: f64, o: f64, climo: &ClimoPntInfo) -> bool {
        self.thresh
            .check_climo(self.expr.evaluate(f, o, climo), climo)
    }
}

/// First filter the pair fails, if any.
pub fn failing_mpr_filter<'f>(
    f: f64,
    o: f64,
    climo: &ClimoPntInfo,
    filters: &'f [MprFilter],
) -> Option<&'f MprFilter> {
    filters.iter().find(|flt| !flt.check(f, o, climo))
}

/// Returns `true` if the pair passes every filter. No filters keeps all.
pub fn check_mpr_thresh(f: f64, o: f64, climo: &ClimoPntInfo, filters: &[MprFilter]) -> bool {
    failing_mpr_filter(f, o, climo, filters).is_none()
}

/// Forecast, observation and optional climatology planes of a gridded
/// comparison.
#[derive(Debug, Clone)]
pub struct GridPairPlanes {
    pub fcst: DataPlane,
    pub obs: DataPlane,
    pub fcmn: Option<DataPlane>,
    pub fcsd: Option<DataPlane>,
    pub ocmn: Option<DataPlane>,
    pub ocsd: Option<DataPlane>,
}

impl GridPairPlanes {
    pub fn new(fcst: DataPlane, obs: DataPlane) -> Self {
        Self {
            fcst,
            obs,
            fcmn: None,
            fcsd: None,
            ocmn: None,
            ocsd: None,
        }
    }

    /// Number of grid points.
    pub fn len(&self) -> usize {
        self.fcst.data().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Climatology at grid point `i`; absent planes give NaN.
    pub fn climo(&self, i: usize) -> ClimoPntInfo {
        let at = |dp: &Option<DataPlane>| dp.as_ref().map_or(BAD, |p| p.data()[i]);
        ClimoPntInfo::new(at(&self.fcmn), at(&self.fcsd), at(&self.ocmn), at(&self.ocsd))
    }

    /// Returns `true` if point `i` has valid forecast, observation and
    /// climatology on every present plane.
    pub fn is_valid(&self, i: usize) -> bool {
        let present_ok = |dp: &Option<DataPlane>| dp.as_ref().is_none_or(|p| !is_bad(p.data()[i]));
        !is_bad(self.fcst.data()[i])
            && !is_bad(self.obs.data()[i])
            && present_ok(&self.fcmn)
            && present_ok(&self.fcsd)
            && present_ok(&self.ocmn)
            && present_ok(&self.ocsd)
    }

    fn check_shapes(&self) -> Result<(), PairsError> {
        let planes = [
            Some(&self.obs),
            self.fcmn.as_ref(),
            self.fcsd.as_ref(),
            self.ocmn.as_ref(),
            self.ocsd.as_ref(),
        ];
        for p in planes.into_iter().flatten() {
            if !p.same_shape(&self.fcst) {
                return Err(PairsError::LengthMismatch {
                    context: "GridPairPlanes",
                    expected: self.len(),
                    got: p.data().len(),
                });
            }
        }
        Ok(())
    }

    fn set_bad(&mut self, i: usize) {
        self.fcst.data_mut()[i] = BAD;
        self.obs.data_mut()[i] = BAD;
        for p in [&mut self.fcmn, &mut self.fcsd, &mut self.ocmn, &mut self.ocsd]
            .into_iter()
            .flatten()
        {
            p.data_mut()[i] = BAD;
        }
    }
}

/// Sets every valid grid point that fails a filter to bad data on all
/// planes. Returns the number of points discarded.
pub fn apply_mpr_thresh_mask(
    planes: &mut GridPairPlanes,
    filters: &[MprFilter],
) -> Result<usize, PairsError> {
    planes.check_shapes()?;
    if filters.is_empty() {
        return Ok(0);
    }

    let mut n_skip = 0;
    for i in 0..planes.len() {
        if !planes.is_valid(i) {
            continue;
        }
        let climo = planes.climo(i);
        if !check_mpr_thresh(planes.fcst.data()[i], planes.obs.data()[i], &climo, filters) {
            planes.set_bad(i);
            n_skip += 1;
        }
    }
    debug!(
        n_skip,
        n_points = planes.len(),
        n_filters = filters.len(),
        "applied matched-pair filters to grid"
    );
    Ok(n_skip)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn climo() -> ClimoPntInfo {
        ClimoPntInfo::new(1.0, 2.0, 10.0, 4.0)
    }

    #[test]
    fn column_aliases() {
        assert_eq!("climo_mean".parse::<MprColumn>().unwrap(), MprColumn::ObsClimoMean);
        assert_eq!("OBS_CLIMO_CDF".parse::<MprColumn>().unwrap(), MprColumn::ObsClimoCdf);
        assert!(matches!(
            "WIND".parse::<MprColumn>(),
            Err(PairsError::UnknownMprColumn { .. })
        ));
    }

    #[test]
    fn expressions_evaluate() {
        let c = climo();
        let e: MprExpr = "FCST-OBS".parse().unwrap();
        assert_eq!(e.evaluate(3.0, 5.0, &c), -2.0);
        let e: MprExpr = "abs(FCST-OBS)".parse().unwrap();
        assert_eq!(e.evaluate(3.0, 5.0, &c), 2.0);
        assert_eq!(e.to_string(), "abs(FCST-OBS)");
        let e: MprExpr = "OBS-CLIMO_MEAN".parse().unwrap();
        assert_eq!(e.evaluate(0.0, 12.0, &c), 2.0);
        let e: MprExpr = "CLIMO_CDF".parse().unwrap();
        assert!((e.evaluate(0.0, 10.0, &c) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn bad_operand_fails_threshold() {
        let f = MprFilter::parse("FCST-CLIMO_MEAN", ">0").unwrap();
        assert!(!f.check(1.0, 1.0, &ClimoPntInfo::default()));
    }

    #[test]
    fn malformed_abs_rejected() {
        assert!(matches!(
            "ABS(FCST".parse::<MprExpr>(),
            Err(PairsError::UnknownMprColumn { .. })
        ));
    }

    #[test]
    fn all_filters_must_pass() {
        let filters = vec![
            MprFilter::parse("OBS", ">=0").unwrap(),
            MprFilter::parse("ABS(FCST-OBS)", "<=3").unwrap(),
        ];
        let c = climo();
        assert!(check_mpr_thresh(2.0, 1.0, &c, &filters));
        assert!(!check_mpr_thresh(2.0, -1.0, &c, &filters));
        let failed = failing_mpr_filter(9.0, 1.0, &c, &filters).unwrap();
        assert_eq!(failed.expr().to_string(), "ABS(FCST-OBS)");
        assert!(check_mpr_thresh(f64::NAN, f64::NAN, &c, &[]));
    }

    #[test]
    fn grid_mask_discards_failures() {
        let fcst = DataPlane::new(2, 2, vec![1.0, 5.0, f64::NAN, 2.0]).unwrap();
        let obs = DataPlane::new(2, 2, vec![1.5, 1.0, 1.0, 2.0]).unwrap();
        let mut planes = GridPairPlanes::new(fcst, obs);
        planes.ocmn = Some(DataPlane::constant(2, 2, 0.0));
        let filters = vec![MprFilter::parse("ABS(FCST-OBS)", "<1").unwrap()];

        let n = apply_mpr_thresh_mask(&mut planes, &filters).unwrap();
        assert_eq!(n, 1);
        assert!(planes.fcst.data()[1].is_nan());
        assert!(planes.obs.data()[1].is_nan());
        assert!(planes.climo(1).ocmn.is_nan());
        assert_eq!(planes.fcst.data()[0], 1.0);
        assert!(planes.is_valid(3));
        assert!(!planes.is_valid(2));
    }

    #[test]
    fn grid_mask_checks_shapes() {
        let mut planes = GridPairPlanes::new(
            DataPlane::constant(2, 2, 1.0),
            DataPlane::constant(3, 1, 1.0),
        );
        assert!(matches!(
            apply_mpr_thresh_mask(&mut planes, &[]),
            Err(PairsError::LengthMismatch { .. })
        ));
    }
}
