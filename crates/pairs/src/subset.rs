//! Conditional subsets of a pair store.
//!
//! Each operator builds a fresh store by re-inserting the pairs that pass
//! its predicate. Pairs with a bad forecast or observation, or a bad value
//! in a climatology or weight column that is otherwise populated, are
//! skipped first.

use tracing::debug;
use verif_stats::{convert_u_v_to_wind, is_bad};

use crate::climo::{ClimoPntInfo, set_climo_flag};
use crate::error::PairsError;
use crate::store::PairStore;
use crate::thresh::{SetLogic, SingleThresh, ThreshArray, check_fo_thresh};

/// Which optional columns are populated in a store.
#[derive(Debug, Clone, Copy)]
struct ColumnFlags {
    fcmn: bool,
    fcsd: bool,
    ocmn: bool,
    ocsd: bool,
    wgt: bool,
}

impl ColumnFlags {
    fn of(pd: &PairStore) -> Self {
        Self {
            fcmn: set_climo_flag(pd.f(), pd.fcmn()),
            fcsd: set_climo_flag(pd.f(), pd.fcsd()),
            ocmn: set_climo_flag(pd.f(), pd.ocmn()),
            ocsd: set_climo_flag(pd.f(), pd.ocsd()),
            wgt: set_climo_flag(pd.f(), pd.wgt()),
        }
    }

    fn both(self, other: Self) -> Self {
        Self {
            fcmn: self.fcmn && other.fcmn,
            fcsd: self.fcsd && other.fcsd,
            ocmn: self.ocmn && other.ocmn,
            ocsd: self.ocsd && other.ocsd,
            wgt: self.wgt,
        }
    }

    fn climo_ok(self, c: &ClimoPntInfo) -> bool {
        !(self.fcmn && is_bad(c.fcmn)
            || self.fcsd && is_bad(c.fcsd)
            || self.ocmn && is_bad(c.ocmn)
            || self.ocsd && is_bad(c.ocsd))
    }

    fn is_valid(self, f: f64, o: f64, c: &ClimoPntInfo, wgt: f64) -> bool {
        !is_bad(f) && !is_bad(o) && self.climo_ok(c) && !(self.wgt && is_bad(wgt))
    }
}

/// Pairs whose forecast and observation pass `ft`/`ot` combined by `logic`.
///
/// Two NA thresholds return an exact copy.
pub fn subset_pairs_cnt_thresh(
    pd: &PairStore,
    ft: &SingleThresh,
    ot: &SingleThresh,
    logic: SetLogic,
) -> Result<PairStore, PairsError> {
    if ft.is_na() && ot.is_na() {
        return Ok(pd.clone());
    }

    let flags = ColumnFlags::of(pd);
    let mut out = pd.empty_like();
    for i in 0..pd.n_obs() {
        let climo = pd.climo(i);
        let (f, o) = (pd.f()[i], pd.o()[i]);
        if !flags.is_valid(f, o, &climo, pd.wgt()[i]) {
            continue;
        }
        if check_fo_thresh(f, o, &climo, ft, ot, logic) {
            out.add_from(pd, i)?;
        }
    }

    debug!(
        n_used = out.n_obs(),
        n_obs = pd.n_obs(),
        fcst_thresh = %ft,
        obs_thresh = %ot,
        %logic,
        "subset pairs by threshold"
    );
    Ok(out)
}

/// Vector pairs whose wind speeds pass `ft`/`ot` combined by `logic`.
///
/// `pd_u` and `pd_v` hold the u and v components of the same pairs. Speed
/// thresholds are tested against the speed of the u/v climatology as well.
pub fn subset_wind_pairs(
    pd_u: &PairStore,
    pd_v: &PairStore,
    ft: &SingleThresh,
    ot: &SingleThresh,
    logic: SetLogic,
) -> Result<(PairStore, PairStore), PairsError> {
    if pd_u.n_obs() != pd_v.n_obs() {
        return Err(PairsError::LengthMismatch {
            context: "subset_wind_pairs",
            expected: pd_u.n_obs(),
            got: pd_v.n_obs(),
        });
    }
    if ft.is_na() && ot.is_na() {
        return Ok((pd_u.clone(), pd_v.clone()));
    }

    let flags = ColumnFlags::of(pd_u).both(ColumnFlags::of(pd_v));
    let mut out_u = pd_u.empty_like();
    let mut out_v = pd_v.empty_like();

    for i in 0..pd_u.n_obs() {
        let (cu, cv) = (pd_u.climo(i), pd_v.climo(i));
        let speed = |u: f64, v: f64, on: bool| if on { convert_u_v_to_wind(u, v) } else { f64::NAN };
        let wind_climo = ClimoPntInfo::new(
            speed(cu.fcmn, cv.fcmn, flags.fcmn),
            speed(cu.fcsd, cv.fcsd, flags.fcsd),
            speed(cu.ocmn, cv.ocmn, flags.ocmn),
            speed(cu.ocsd, cv.ocsd, flags.ocsd),
        );
        let fcst_wind = convert_u_v_to_wind(pd_u.f()[i], pd_v.f()[i]);
        let obs_wind = convert_u_v_to_wind(pd_u.o()[i], pd_v.o()[i]);
        if !flags.is_valid(fcst_wind, obs_wind, &wind_climo, pd_u.wgt()[i]) {
            continue;
        }
        if check_fo_thresh(fcst_wind, obs_wind, &wind_climo, ft, ot, logic) {
            out_u.add_from(pd_u, i)?;
            out_v.add_from(pd_v, i)?;
        }
    }

    debug!(
        n_used = out_u.n_obs(),
        n_obs = pd_u.n_obs(),
        fcst_thresh = %ft,
        obs_thresh = %ot,
        %logic,
        "subset vector pairs by wind speed"
    );
    Ok((out_u, out_v))
}

/// Pairs whose observation CDF value falls in the 0-based bin `i_bin` of
/// the CDF thresholds `cdf_ta`.
///
/// An empty threshold array returns an exact copy.
pub fn subset_climo_cdf_bin(pd: &PairStore, cdf_ta: &ThreshArray, i_bin: usize) -> Result<PairStore, PairsError> {
    if cdf_ta.is_empty() {
        return Ok(pd.clone());
    }

    let flags = ColumnFlags::of(pd);
    let mut out = pd.empty_like();
    for i in 0..pd.n_obs() {
        let climo = pd.climo(i);
        if !flags.is_valid(pd.f()[i], pd.o()[i], &climo, pd.wgt()[i]) {
            continue;
        }
        if cdf_ta.check_bins(pd.ocdf()[i], &climo) == Some(i_bin + 1) {
            out.add_from(pd, i)?;
        }
    }

    debug!(
        n_used = out.n_obs(),
        n_obs = pd.n_obs(),
        bin = i_bin + 1,
        "subset pairs by climatology CDF bin"
    );
    Ok(out)
}
