//! The per-observation rejection cascade.
//!
//! Observation-level stages run once per observation and reject it for
//! every partition. Partition-level stages run inside the message type ×
//! mask × interpolation loops and only skip the partitions they rule out.

use std::fmt;

use serde::Serialize;
use tracing::{debug, warn};
use verif_stats::{BAD, is_bad, nint};

use crate::climo::ClimoPntInfo;
use crate::error::PairsError;
use crate::field::LevelType;
use crate::grid::DataPlaneArray;
use crate::interp::{
    InterpInfo, InterpMethod, VertInterp, compute_horz_interp, compute_interp, compute_sfc_interp,
    find_vert_lvl,
};
use crate::mpr::failing_mpr_filter;
use crate::partition::VxPairs;
use crate::store::PointPair;

/// One raw point observation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Observation {
    pub sid: String,
    pub msg_typ: String,
    /// Variable name; when empty, `grib_code` identifies the variable.
    pub var_name: String,
    pub grib_code: Option<u32>,
    pub lat: f64,
    pub lon: f64,
    /// Station elevation (m).
    pub elv: f64,
    /// Valid time (unix seconds).
    pub vld: i64,
    /// Pressure level (hPa) or accumulation interval.
    pub lvl: f64,
    /// Height (m).
    pub hgt: f64,
    pub value: f64,
    pub qc: String,
}

/// Cascade stage at which an observation was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Sid,
    Var,
    Qty,
    Vld,
    Obs,
    Grd,
    Topo,
    Lvl,
    Typ,
    Mask,
    Cmn,
    Csd,
    Fcst,
    Mpr,
    Dup,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Sid => "sid",
            Stage::Var => "var",
            Stage::Qty => "qty",
            Stage::Vld => "vld",
            Stage::Obs => "obs",
            Stage::Grd => "grd",
            Stage::Topo => "topo",
            Stage::Lvl => "lvl",
            Stage::Typ => "typ",
            Stage::Mask => "mask",
            Stage::Cmn => "cmn",
            Stage::Csd => "csd",
            Stage::Fcst => "fcst",
            Stage::Mpr => "mpr",
            Stage::Dup => "dup",
        };
        f.write_str(s)
    }
}

/// Outcome of [`VxPairs::add_point_obs`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CascadeResult {
    /// Paired in at least one partition.
    Keep,
    /// Paired nowhere. For partition-level stages this is the furthest
    /// stage reached by any partition.
    Rejected(Stage),
}

impl CascadeResult {
    pub fn is_keep(&self) -> bool {
        matches!(self, CascadeResult::Keep)
    }
}

/// Observation state after the observation-level stages.
struct Located {
    obs_v: f64,
    x: f64,
    y: f64,
    ix: i64,
    iy: i64,
    lvl: f64,
    is_sfc: bool,
    vert: Brackets,
}

/// Vertical brackets for the forecast and each climatology field.
struct Brackets {
    fcst: VertInterp,
    fcmn: VertInterp,
    fcsd: VertInterp,
    ocmn: VertInterp,
    ocsd: VertInterp,
}

fn log_reject(obs: &Observation, stage: Stage, detail: &str) {
    debug!(
        sid = %obs.sid,
        msg_typ = %obs.msg_typ,
        lat = obs.lat,
        lon = obs.lon,
        vld = obs.vld,
        value = obs.value,
        %stage,
        detail,
        "skipping observation"
    );
}

impl VxPairs<'_> {
    /// Runs one observation through the cascade and inserts it into every
    /// partition that keeps it.
    ///
    /// Data-quality rejections are reported in the result and the
    /// counters; errors are reserved for contract violations.
    pub fn add_point_obs(&mut self, obs: &Observation) -> Result<CascadeResult, PairsError> {
        if self.stores.is_empty() {
            return Err(PairsError::Unsized);
        }
        if self.task.fcst.is_empty() {
            return Err(PairsError::EmptyDimension {
                axis: "forecast levels",
            });
        }
        self.counts.n_try += 1;

        let loc = match self.observation_stages(obs) {
            Ok(loc) => loc,
            Err(stage) => return Ok(CascadeResult::Rejected(stage)),
        };

        let wgt = self.task.wgt.map_or(1.0, |dp| dp.get(loc.ix, loc.iy));
        let mut deepest = Stage::Typ;
        let mut n_kept = 0;

        for i_msg_typ in 0..self.n_msg_typ {
            if !self.is_keeper_typ(obs, i_msg_typ) {
                continue;
            }
            for i_mask in 0..self.n_mask {
                if !self.is_keeper_mask(obs, &loc, i_msg_typ, i_mask) {
                    deepest = deepest.max(Stage::Mask);
                    continue;
                }
                for i_interp in 0..self.n_interp {
                    let n = self.index(i_msg_typ, i_mask, i_interp);
                    match self.partition_stages(obs, &loc, n, i_interp, wgt)? {
                        Ok(()) => n_kept += 1,
                        Err(stage) => deepest = deepest.max(stage),
                    }
                }
            }
        }

        if n_kept > 0 {
            Ok(CascadeResult::Keep)
        } else {
            Ok(CascadeResult::Rejected(deepest))
        }
    }

    fn observation_stages(&mut self, obs: &Observation) -> Result<Located, Stage> {
        self.is_keeper_sid(obs)?;
        self.is_keeper_var(obs)?;
        self.is_keeper_qty(obs)?;
        self.is_keeper_vld(obs)?;
        let obs_v = self.is_keeper_obs(obs)?;
        let (x, y, ix, iy) = self.is_keeper_grd(obs)?;
        self.is_keeper_topo(obs, x, y)?;
        self.is_keeper_lvl(obs)?;

        let is_sfc = self.config.is_sfc_msg_typ(&obs.msg_typ);

        // A height-level observation from a surface message carries no
        // usable level, so drop it from the uniqueness key.
        let lvl = if self.task.obs_info.level().kind() == LevelType::Vert && is_sfc {
            BAD
        } else {
            obs.lvl
        };

        let vert = self.vertical_brackets(obs, lvl)?;
        Ok(Located {
            obs_v,
            x,
            y,
            ix,
            iy,
            lvl,
            is_sfc,
            vert,
        })
    }

    /// Returns `Ok(Err(stage))` for a rejection and `Err` for a contract
    /// violation.
    fn partition_stages(
        &mut self,
        obs: &Observation,
        loc: &Located,
        n: usize,
        i_interp: usize,
        wgt: f64,
    ) -> Result<Result<(), Stage>, PairsError> {
        let climo = match self.is_keeper_climo(obs, loc, n, i_interp) {
            Ok(c) => c,
            Err(stage) => return Ok(Err(stage)),
        };
        let fcst_v = match self.is_keeper_fcst(obs, loc, n, i_interp) {
            Ok(v) => v,
            Err(stage) => return Ok(Err(stage)),
        };

        if let Some(filter) = failing_mpr_filter(fcst_v, loc.obs_v, &climo, self.config.mpr_filters()) {
            self.rej.mpr[n] += 1;
            log_reject(obs, Stage::Mpr, &format!("{} is not {}", filter.expr(), filter.thresh()));
            return Ok(Err(Stage::Mpr));
        }

        let pair = PointPair {
            sid: obs.sid.clone(),
            lat: obs.lat,
            lon: obs.lon,
            x: loc.x,
            y: loc.y,
            vld: obs.vld,
            lvl: loc.lvl,
            elv: obs.hgt,
            f: fcst_v,
            o: loc.obs_v,
            qc: obs.qc.clone(),
            climo,
            wgt,
        };
        if !self.stores[n].add_point_pair(pair)? {
            self.rej.dup[n] += 1;
            log_reject(obs, Stage::Dup, "duplicate observation");
            return Ok(Err(Stage::Dup));
        }
        Ok(Ok(()))
    }

    fn is_keeper_sid(&mut self, obs: &Observation) -> Result<(), Stage> {
        if self.config.keeps_sid(&obs.sid) {
            return Ok(());
        }
        self.counts.rej_sid += 1;
        log_reject(obs, Stage::Sid, "station id filtered");
        Err(Stage::Sid)
    }

    fn is_keeper_var(&mut self, obs: &Observation) -> Result<(), Stage> {
        let info = self.task.obs_info;
        let keep = if obs.var_name.is_empty() {
            obs.grib_code.is_some() && obs.grib_code == info.grib_code()
        } else {
            obs.var_name == info.name()
        };
        if keep {
            return Ok(());
        }
        self.counts.rej_var += 1;
        log_reject(obs, Stage::Var, "variable does not match");
        Err(Stage::Var)
    }

    fn is_keeper_qty(&mut self, obs: &Observation) -> Result<(), Stage> {
        if self.config.keeps_qty(&obs.qc) {
            return Ok(());
        }
        self.counts.rej_qty += 1;
        log_reject(obs, Stage::Qty, "quality marker filtered");
        Err(Stage::Qty)
    }

    fn is_keeper_vld(&mut self, obs: &Observation) -> Result<(), Stage> {
        if self.config.keeps_vld(obs.vld) {
            return Ok(());
        }
        self.counts.rej_vld += 1;
        log_reject(obs, Stage::Vld, "outside time window");
        Err(Stage::Vld)
    }

    fn is_keeper_obs(&mut self, obs: &Observation) -> Result<f64, Stage> {
        let v = self.task.obs_info.process_obs(obs.value);
        if !is_bad(v) {
            return Ok(v);
        }
        self.counts.rej_obs += 1;
        log_reject(obs, Stage::Obs, "bad observation value");
        Err(Stage::Obs)
    }

    fn is_keeper_grd(&mut self, obs: &Observation) -> Result<(f64, f64, i64, i64), Stage> {
        let grid = self.task.grid;
        let (nx, ny) = (grid.nx() as i64, grid.ny() as i64);
        let (mut x, y) = grid.latlon_to_xy(obs.lat, obs.lon);
        if !is_bad(x) && !is_bad(y) {
            let wrap = grid.wrap_lon();
            if wrap {
                x = x.rem_euclid(nx as f64);
            }
            let ix = if wrap { nint(x).rem_euclid(nx) } else { nint(x) };
            let iy = nint(y);
            if (0..nx).contains(&ix) && (0..ny).contains(&iy) {
                return Ok((x, y, ix, iy));
            }
        }
        self.counts.rej_grd += 1;
        log_reject(obs, Stage::Grd, "off the grid");
        Err(Stage::Grd)
    }

    fn is_keeper_topo(&mut self, obs: &Observation, x: f64, y: f64) -> Result<(), Stage> {
        let Some(sfc) = self.task.sfc_info else {
            return Ok(());
        };
        let Some(topo) = sfc.topo.as_ref() else {
            return Ok(());
        };
        if !self.config.is_sfc_msg_typ(&obs.msg_typ) {
            return Ok(());
        }
        let bilin = InterpInfo::new(InterpMethod::Bilin, 2);
        let topo_v = compute_horz_interp(topo, x, y, obs.elv, &bilin, self.task.grid.wrap_lon());
        if !is_bad(topo_v) && sfc.topo_use_obs_thresh.check(topo_v - obs.elv) {
            return Ok(());
        }
        self.counts.rej_topo += 1;
        log_reject(obs, Stage::Topo, "model topography mismatch");
        Err(Stage::Topo)
    }

    fn is_keeper_lvl(&mut self, obs: &Observation) -> Result<(), Stage> {
        let fcst_level = self.task.fcst_info.level();
        let keep = match fcst_level.kind() {
            LevelType::Pres | LevelType::Accum => fcst_level.contains(obs.lvl),
            _ => self.config.is_sfc_msg_typ(&obs.msg_typ) || self.task.obs_info.level().contains(obs.hgt),
        };
        if keep {
            return Ok(());
        }
        self.counts.rej_lvl += 1;
        log_reject(obs, Stage::Lvl, "level out of range");
        Err(Stage::Lvl)
    }

    fn vertical_brackets(&mut self, obs: &Observation, lvl: f64) -> Result<Brackets, Stage> {
        let lvl_type = self.task.fcst_info.level().kind();
        let spfh = self.task.fcst_info.is_specific_humidity() && self.task.obs_info.is_specific_humidity();
        let to_lvl = if lvl_type == LevelType::Pres { lvl } else { obs.hgt };

        let task = self.task;
        let mut bracket = |dpa: Option<&DataPlaneArray>| -> Result<VertInterp, Stage> {
            let (i_blw, i_abv) = match dpa {
                Some(d) if d.n_planes() > 1 => match find_vert_lvl(d, to_lvl) {
                    Ok(found) => found.unwrap_or((0, 0)),
                    Err(e) => {
                        self.counts.rej_lvl += 1;
                        log_reject(obs, Stage::Lvl, &e.to_string());
                        return Err(Stage::Lvl);
                    }
                },
                _ => (0, 0),
            };
            Ok(VertInterp {
                lvl_type,
                spfh,
                to_lvl,
                i_blw,
                i_abv,
            })
        };

        Ok(Brackets {
            fcst: bracket(Some(task.fcst))?,
            fcmn: bracket(task.fcmn)?,
            fcsd: bracket(task.fcsd)?,
            ocmn: bracket(task.ocmn)?,
            ocsd: bracket(task.ocsd)?,
        })
    }

    fn is_keeper_typ(&mut self, obs: &Observation, i_msg_typ: usize) -> bool {
        if self.msg_typ[i_msg_typ].contains(&obs.msg_typ) {
            return true;
        }
        for i_mask in 0..self.n_mask {
            for i_interp in 0..self.n_interp {
                let n = self.index(i_msg_typ, i_mask, i_interp);
                self.rej.typ[n] += 1;
            }
        }
        false
    }

    fn is_keeper_mask(&mut self, obs: &Observation, loc: &Located, i_msg_typ: usize, i_mask: usize) -> bool {
        if self.mask[i_mask].check(loc.ix, loc.iy, &obs.sid, obs.lat, obs.lon) {
            return true;
        }
        for i_interp in 0..self.n_interp {
            let n = self.index(i_msg_typ, i_mask, i_interp);
            self.rej.mask[n] += 1;
        }
        false
    }

    fn is_keeper_climo(
        &mut self,
        obs: &Observation,
        loc: &Located,
        n: usize,
        i_interp: usize,
    ) -> Result<ClimoPntInfo, Stage> {
        let info = self.interp[i_interp].clone();
        let wrap = self.task.grid.wrap_lon();

        if self.task.has_climo_stdev()
            && matches!(
                info.method(),
                InterpMethod::Min | InterpMethod::Max | InterpMethod::Median | InterpMethod::Best
            )
            && !self.spread_warned[i_interp]
        {
            warn!(
                interp = %info.name(),
                "climatology spread is interpolated with a method that does not preserve it"
            );
            self.spread_warned[i_interp] = true;
        }

        // Absent fields give NaN but never reject.
        let value = |dpa: Option<&DataPlaneArray>, vert: &VertInterp| -> (bool, f64) {
            match dpa {
                Some(d) if !d.is_empty() => (true, compute_interp(d, loc.x, loc.y, loc.obs_v, &info, wrap, vert)),
                _ => (false, BAD),
            }
        };
        let (fcmn_on, fcmn) = value(self.task.fcmn, &loc.vert.fcmn);
        let (ocmn_on, ocmn) = value(self.task.ocmn, &loc.vert.ocmn);
        if (fcmn_on && is_bad(fcmn)) || (ocmn_on && is_bad(ocmn)) {
            self.rej.cmn[n] += 1;
            log_reject(obs, Stage::Cmn, "bad climatology mean");
            return Err(Stage::Cmn);
        }
        let (fcsd_on, fcsd) = value(self.task.fcsd, &loc.vert.fcsd);
        let (ocsd_on, ocsd) = value(self.task.ocsd, &loc.vert.ocsd);
        if (fcsd_on && is_bad(fcsd)) || (ocsd_on && is_bad(ocsd)) {
            self.rej.csd[n] += 1;
            log_reject(obs, Stage::Csd, "bad climatology standard deviation");
            return Err(Stage::Csd);
        }
        Ok(ClimoPntInfo::new(fcmn, fcsd, ocmn, ocsd))
    }

    fn is_keeper_fcst(&mut self, obs: &Observation, loc: &Located, n: usize, i_interp: usize) -> Result<f64, Stage> {
        let info = &self.interp[i_interp];
        let wrap = self.task.grid.wrap_lon();
        let fcst_v = match self.task.sfc_info {
            Some(sfc) if loc.is_sfc => {
                let is_land_obs = sfc.land.as_ref().is_some_and(|m| m.s_is_on(loc.ix, loc.iy));
                compute_sfc_interp(
                    self.task.fcst.plane(0),
                    loc.x,
                    loc.y,
                    obs.elv,
                    loc.obs_v,
                    info,
                    wrap,
                    sfc,
                    is_land_obs,
                )
            }
            _ => compute_interp(self.task.fcst, loc.x, loc.y, loc.obs_v, info, wrap, &loc.vert.fcst),
        };
        if !is_bad(fcst_v) {
            return Ok(fcst_v);
        }
        self.rej.fcst[n] += 1;
        log_reject(obs, Stage::Fcst, "bad forecast value");
        Err(Stage::Fcst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_are_ordered() {
        assert!(Stage::Sid < Stage::Lvl);
        assert!(Stage::Mask < Stage::Cmn);
        assert!(Stage::Mpr < Stage::Dup);
        assert_eq!(Stage::Topo.to_string(), "topo");
    }

    #[test]
    fn cascade_result_keep() {
        assert!(CascadeResult::Keep.is_keep());
        assert!(!CascadeResult::Rejected(Stage::Grd).is_keep());
    }
}
