//! Matched-pair store for one (message type, mask, interpolation) partition.

use std::collections::HashMap;
use std::fmt;

use tracing::debug;
use verif_stats::BAD;

use crate::climo::{ClimoPntInfo, compute_climo_cdf};
use crate::error::PairsError;
use crate::summary::{ObVal, ObsSummary, summarize};

/// Whether a store holds point or gridded pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairMode {
    Point,
    Grid,
}

impl fmt::Display for PairMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PairMode::Point => f.write_str("point"),
            PairMode::Grid => f.write_str("grid"),
        }
    }
}

/// One point pair, as inserted into or read back from a [`PairStore`].
#[derive(Debug, Clone, PartialEq)]
pub struct PointPair {
    pub sid: String,
    pub lat: f64,
    pub lon: f64,
    pub x: f64,
    pub y: f64,
    /// Valid time (unix seconds).
    pub vld: i64,
    pub lvl: f64,
    pub elv: f64,
    pub f: f64,
    pub o: f64,
    pub qc: String,
    pub climo: ClimoPntInfo,
    pub wgt: f64,
}

/// Uniqueness key: lat/lon to 3 decimals, level/elevation to 2.
pub fn station_key(lat: f64, lon: f64, lvl: f64, elv: f64) -> String {
    format!("{lat:.3}:{lon:.3}:{lvl:.2}:{elv:.2}")
}

/// Everything recorded under one uniqueness key.
#[derive(Debug, Clone)]
struct StationValues {
    key: String,
    first: PointPair,
    obs: Vec<ObVal>,
}

/// Column store of matched pairs.
///
/// Every column has length [`n_obs`](Self::n_obs) after every public
/// mutator. The first insertion fixes the store to point or grid mode.
#[derive(Debug, Clone, Default)]
pub struct PairStore {
    msg_typ: String,
    mask_name: String,
    interp_name: String,
    fcst_ut: i64,
    check_unique: bool,
    obs_summary: ObsSummary,
    mode: Option<PairMode>,

    sid: Vec<String>,
    lat: Vec<f64>,
    lon: Vec<f64>,
    x: Vec<f64>,
    y: Vec<f64>,
    vld: Vec<i64>,
    lvl: Vec<f64>,
    elv: Vec<f64>,
    qc: Vec<String>,
    f: Vec<f64>,
    o: Vec<f64>,
    fcmn: Vec<f64>,
    fcsd: Vec<f64>,
    ocmn: Vec<f64>,
    ocsd: Vec<f64>,
    ocdf: Vec<f64>,
    wgt: Vec<f64>,

    station_index: HashMap<String, usize>,
    stations: Vec<StationValues>,
}

impl PairStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty store carrying over labels and forecast time, for subsets.
    pub fn empty_like(&self) -> Self {
        Self {
            msg_typ: self.msg_typ.clone(),
            mask_name: self.mask_name.clone(),
            interp_name: self.interp_name.clone(),
            fcst_ut: self.fcst_ut,
            ..Self::default()
        }
    }

    pub fn set_msg_typ(&mut self, msg_typ: impl Into<String>) {
        self.msg_typ = msg_typ.into();
    }

    pub fn set_mask_name(&mut self, mask_name: impl Into<String>) {
        self.mask_name = mask_name.into();
    }

    pub fn set_interp_name(&mut self, interp_name: impl Into<String>) {
        self.interp_name = interp_name.into();
    }

    pub fn set_fcst_ut(&mut self, ut: i64) {
        self.fcst_ut = ut;
    }

    pub fn set_check_unique(&mut self, check_unique: bool) {
        self.check_unique = check_unique;
    }

    pub fn set_obs_summary(&mut self, obs_summary: ObsSummary) {
        self.obs_summary = obs_summary;
    }

    pub fn msg_typ(&self) -> &str {
        &self.msg_typ
    }

    pub fn mask_name(&self) -> &str {
        &self.mask_name
    }

    pub fn interp_name(&self) -> &str {
        &self.interp_name
    }

    pub fn fcst_ut(&self) -> i64 {
        self.fcst_ut
    }

    pub fn mode(&self) -> Option<PairMode> {
        self.mode
    }

    pub fn n_obs(&self) -> usize {
        self.o.len()
    }

    pub fn is_empty(&self) -> bool {
        self.o.is_empty()
    }

    /// Removes all pairs and station records. Labels and settings remain.
    pub fn clear(&mut self) {
        self.clear_columns();
        self.station_index.clear();
        self.stations.clear();
        self.mode = None;
    }

    fn clear_columns(&mut self) {
        self.sid.clear();
        self.lat.clear();
        self.lon.clear();
        self.x.clear();
        self.y.clear();
        self.vld.clear();
        self.lvl.clear();
        self.elv.clear();
        self.qc.clear();
        self.f.clear();
        self.o.clear();
        self.fcmn.clear();
        self.fcsd.clear();
        self.ocmn.clear();
        self.ocsd.clear();
        self.ocdf.clear();
        self.wgt.clear();
    }

    fn claim_mode(&mut self, requested: PairMode) -> Result<(), PairsError> {
        match self.mode {
            None => {
                self.mode = Some(requested);
                Ok(())
            }
            Some(store) if store == requested => Ok(()),
            Some(store) => Err(PairsError::ModeMismatch { store, requested }),
        }
    }

    fn push_row(&mut self, p: PointPair) {
        self.ocdf.push(compute_climo_cdf(p.o, &p.climo));
        self.sid.push(p.sid);
        self.lat.push(p.lat);
        self.lon.push(p.lon);
        self.x.push(p.x);
        self.y.push(p.y);
        self.vld.push(p.vld);
        self.lvl.push(p.lvl);
        self.elv.push(p.elv);
        self.qc.push(p.qc);
        self.f.push(p.f);
        self.o.push(p.o);
        self.fcmn.push(p.climo.fcmn);
        self.fcsd.push(p.climo.fcsd);
        self.ocmn.push(p.climo.ocmn);
        self.ocsd.push(p.climo.ocsd);
        self.wgt.push(p.wgt);
    }

    /// Adds a point pair.
    ///
    /// Returns `Ok(false)` without touching the store when uniqueness
    /// checking is on and the location key already holds an observation
    /// with the same valid time. With an observation summary configured
    /// the pair is only recorded; it reaches the columns through
    /// [`calc_obs_summary`](Self::calc_obs_summary).
    pub fn add_point_pair(&mut self, pair: PointPair) -> Result<bool, PairsError> {
        if self.mode == Some(PairMode::Grid) {
            return Err(PairsError::ModeMismatch {
                store: PairMode::Grid,
                requested: PairMode::Point,
            });
        }

        let key = station_key(pair.lat, pair.lon, pair.lvl, pair.elv);
        let ob = ObVal {
            ut: pair.vld,
            val: pair.o,
            qc: pair.qc.clone(),
        };

        match self.station_index.get(&key) {
            Some(&i) => {
                let station = &mut self.stations[i];
                if self.check_unique && station.obs.iter().any(|o| o.ut == pair.vld) {
                    return Ok(false);
                }
                station.obs.push(ob);
            }
            None => {
                self.station_index.insert(key.clone(), self.stations.len());
                self.stations.push(StationValues {
                    key,
                    first: pair.clone(),
                    obs: vec![ob],
                });
            }
        }

        self.claim_mode(PairMode::Point)?;
        if self.obs_summary == ObsSummary::None {
            self.push_row(pair);
        }
        Ok(true)
    }

    /// Adds one gridded pair. Point metadata columns are filled with
    /// placeholders.
    pub fn add_grid_pair(
        &mut self,
        f: f64,
        o: f64,
        climo: ClimoPntInfo,
        wgt: f64,
    ) -> Result<(), PairsError> {
        self.claim_mode(PairMode::Grid)?;
        self.push_row(PointPair {
            sid: "NA".to_string(),
            lat: BAD,
            lon: BAD,
            x: BAD,
            y: BAD,
            vld: self.fcst_ut,
            lvl: BAD,
            elv: BAD,
            f,
            o,
            qc: "NA".to_string(),
            climo,
            wgt,
        });
        Ok(())
    }

    /// Adds gridded pairs in bulk. All slices must have the same length.
    pub fn add_grid_pairs(
        &mut self,
        f: &[f64],
        o: &[f64],
        climo: &[ClimoPntInfo],
        wgt: &[f64],
    ) -> Result<(), PairsError> {
        for (got, context) in [
            (o.len(), "add_grid_pairs: o"),
            (climo.len(), "add_grid_pairs: climo"),
            (wgt.len(), "add_grid_pairs: wgt"),
        ] {
            if got != f.len() {
                return Err(PairsError::LengthMismatch {
                    context,
                    expected: f.len(),
                    got,
                });
            }
        }
        for i in 0..f.len() {
            self.add_grid_pair(f[i], o[i], climo[i], wgt[i])?;
        }
        Ok(())
    }

    /// Reduces each location to one pair using the configured summary.
    ///
    /// Keys are visited in first-insertion order. Repeated calls rebuild
    /// the columns from the station records. Does nothing when no
    /// summary is configured.
    pub fn calc_obs_summary(&mut self) {
        if self.obs_summary == ObsSummary::None {
            return;
        }
        self.clear_columns();
        let rows: Vec<PointPair> = self
            .stations
            .iter()
            .filter_map(|st| {
                summarize(self.obs_summary, &st.obs, self.fcst_ut).map(|ob| PointPair {
                    vld: ob.ut,
                    o: ob.val,
                    qc: ob.qc,
                    ..st.first.clone()
                })
            })
            .collect();
        for row in rows {
            self.push_row(row);
        }
    }

    /// Logs every location that collected more than one observation.
    pub fn log_duplicate_report(&self) {
        if self.obs_summary == ObsSummary::None {
            return;
        }
        for st in self.stations.iter().filter(|st| st.obs.len() > 1) {
            let used = summarize(self.obs_summary, &st.obs, self.fcst_ut);
            let offset = used.map(|ob| (ob.ut - self.fcst_ut).abs());
            debug!(
                key = %st.key,
                sid = %st.first.sid,
                n_obs = st.obs.len(),
                summary = %self.obs_summary,
                offset_secs = ?offset,
                "duplicate point observations"
            );
        }
    }

    /// Number of distinct location keys seen.
    pub fn n_stations(&self) -> usize {
        self.stations.len()
    }

    /// Climatology of pair `i`.
    pub fn climo(&self, i: usize) -> ClimoPntInfo {
        ClimoPntInfo::new(self.fcmn[i], self.fcsd[i], self.ocmn[i], self.ocsd[i])
    }

    /// Pair `i` with all of its columns.
    pub fn point_pair(&self, i: usize) -> PointPair {
        PointPair {
            sid: self.sid[i].clone(),
            lat: self.lat[i],
            lon: self.lon[i],
            x: self.x[i],
            y: self.y[i],
            vld: self.vld[i],
            lvl: self.lvl[i],
            elv: self.elv[i],
            f: self.f[i],
            o: self.o[i],
            qc: self.qc[i].clone(),
            climo: self.climo(i),
            wgt: self.wgt[i],
        }
    }

    /// Re-inserts pair `i` of `src` into this store using `src`'s mode.
    pub(crate) fn add_from(&mut self, src: &PairStore, i: usize) -> Result<(), PairsError> {
        match src.mode {
            Some(PairMode::Grid) => self.add_grid_pair(src.f[i], src.o[i], src.climo(i), src.wgt[i]),
            _ => self.add_point_pair(src.point_pair(i)).map(|_| ()),
        }
    }

    pub fn sid(&self) -> &[String] {
        &self.sid
    }

    pub fn lat(&self) -> &[f64] {
        &self.lat
    }

    pub fn lon(&self) -> &[f64] {
        &self.lon
    }

    pub fn x(&self) -> &[f64] {
        &self.x
    }

    pub fn y(&self) -> &[f64] {
        &self.y
    }

    pub fn vld(&self) -> &[i64] {
        &self.vld
    }

    pub fn lvl(&self) -> &[f64] {
        &self.lvl
    }

    pub fn elv(&self) -> &[f64] {
        &self.elv
    }

    pub fn qc(&self) -> &[String] {
        &self.qc
    }

    pub fn f(&self) -> &[f64] {
        &self.f
    }

    pub fn o(&self) -> &[f64] {
        &self.o
    }

    pub fn fcmn(&self) -> &[f64] {
        &self.fcmn
    }

    pub fn fcsd(&self) -> &[f64] {
        &self.fcsd
    }

    pub fn ocmn(&self) -> &[f64] {
        &self.ocmn
    }

    pub fn ocsd(&self) -> &[f64] {
        &self.ocsd
    }

    /// Climatological CDF value of each observation.
    pub fn ocdf(&self) -> &[f64] {
        &self.ocdf
    }

    pub fn wgt(&self) -> &[f64] {
        &self.wgt
    }

    /// Lengths of every column, for invariant checks.
    pub fn column_lengths(&self) -> [usize; 17] {
        [
            self.sid.len(),
            self.lat.len(),
            self.lon.len(),
            self.x.len(),
            self.y.len(),
            self.vld.len(),
            self.lvl.len(),
            self.elv.len(),
            self.qc.len(),
            self.f.len(),
            self.o.len(),
            self.fcmn.len(),
            self.fcsd.len(),
            self.ocmn.len(),
            self.ocsd.len(),
            self.ocdf.len(),
            self.wgt.len(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T: i64 = 1_700_000_000;

    pub(crate) fn pair(sid: &str, lat: f64, vld: i64, f: f64, o: f64) -> PointPair {
        PointPair {
            sid: sid.to_string(),
            lat,
            lon: -105.0,
            x: 1.0,
            y: 2.0,
            vld,
            lvl: 850.0,
            elv: 1600.0,
            f,
            o,
            qc: "0".to_string(),
            climo: ClimoPntInfo::default(),
            wgt: 1.0,
        }
    }

    fn assert_columns_equal(store: &PairStore) {
        let n = store.n_obs();
        assert!(store.column_lengths().iter().all(|&len| len == n));
    }

    #[test]
    fn key_format_rounds() {
        assert_eq!(
            station_key(40.01234, -105.98765, 850.0, 1609.344),
            "40.012:-105.988:850.00:1609.34"
        );
    }

    #[test]
    fn point_insertion_appends_all_columns() {
        let mut s = PairStore::new();
        assert!(s.add_point_pair(pair("A", 40.0, T, 1.0, 2.0)).unwrap());
        assert!(s.add_point_pair(pair("B", 41.0, T, 3.0, 4.0)).unwrap());
        assert_eq!(s.n_obs(), 2);
        assert_eq!(s.mode(), Some(PairMode::Point));
        assert_eq!(s.f(), &[1.0, 3.0]);
        assert_columns_equal(&s);
    }

    #[test]
    fn grid_after_point_is_rejected() {
        let mut s = PairStore::new();
        s.add_point_pair(pair("A", 40.0, T, 1.0, 2.0)).unwrap();
        let err = s.add_grid_pair(1.0, 1.0, ClimoPntInfo::default(), 1.0);
        assert!(matches!(
            err,
            Err(PairsError::ModeMismatch {
                store: PairMode::Point,
                requested: PairMode::Grid
            })
        ));
        assert_eq!(s.n_obs(), 1);
        assert_columns_equal(&s);
    }

    #[test]
    fn point_after_grid_is_rejected() {
        let mut s = PairStore::new();
        s.add_grid_pair(1.0, 1.0, ClimoPntInfo::default(), 1.0).unwrap();
        assert!(matches!(
            s.add_point_pair(pair("A", 40.0, T, 1.0, 2.0)),
            Err(PairsError::ModeMismatch { .. })
        ));
        assert_eq!(s.n_stations(), 0);
        assert_columns_equal(&s);
    }

    #[test]
    fn duplicate_key_and_time_rejected_only_when_checking() {
        let mut s = PairStore::new();
        s.set_check_unique(true);
        assert!(s.add_point_pair(pair("A", 40.0, T, 1.0, 2.0)).unwrap());
        assert!(!s.add_point_pair(pair("A", 40.0, T, 1.0, 9.0)).unwrap());
        // Same location, other time: accepted.
        assert!(s.add_point_pair(pair("A", 40.0, T + 60, 1.0, 3.0)).unwrap());
        // Key differs beyond the 3rd decimal: accepted.
        assert!(s.add_point_pair(pair("A", 40.001, T, 1.0, 4.0)).unwrap());
        assert_eq!(s.o(), &[2.0, 3.0, 4.0]);

        let mut loose = PairStore::new();
        loose.add_point_pair(pair("A", 40.0, T, 1.0, 2.0)).unwrap();
        assert!(loose.add_point_pair(pair("A", 40.0, T, 1.0, 9.0)).unwrap());
        assert_eq!(loose.n_obs(), 2);
    }

    #[test]
    fn summary_defers_and_reduces_per_key() {
        let mut s = PairStore::new();
        s.set_fcst_ut(T);
        s.set_obs_summary(ObsSummary::Nearest);
        s.add_point_pair(pair("A", 40.0, T - 10, 1.0, 10.0)).unwrap();
        s.add_point_pair(pair("A", 40.0, T + 5, 1.0, 20.0)).unwrap();
        s.add_point_pair(pair("A", 40.0, T + 30, 1.0, 30.0)).unwrap();
        s.add_point_pair(pair("B", 42.0, T, 5.0, 50.0)).unwrap();
        assert_eq!(s.n_obs(), 0);
        assert_columns_equal(&s);

        s.calc_obs_summary();
        assert_eq!(s.n_obs(), 2);
        assert_eq!(s.o(), &[20.0, 50.0]);
        assert_eq!(s.vld(), &[T + 5, T]);
        assert_eq!(s.sid(), &["A".to_string(), "B".to_string()]);
        assert_columns_equal(&s);

        // Idempotent.
        s.calc_obs_summary();
        assert_eq!(s.n_obs(), 2);
        s.log_duplicate_report();
    }

    #[test]
    fn bulk_grid_pairs_check_lengths() {
        let mut s = PairStore::new();
        let climo = [ClimoPntInfo::default(); 2];
        assert!(matches!(
            s.add_grid_pairs(&[1.0, 2.0], &[1.0], &climo, &[1.0, 1.0]),
            Err(PairsError::LengthMismatch { expected: 2, got: 1, .. })
        ));
        assert!(s.is_empty());
        s.add_grid_pairs(&[1.0, 2.0], &[1.5, 2.5], &climo, &[1.0, 1.0])
            .unwrap();
        assert_eq!(s.n_obs(), 2);
        assert_eq!(s.mode(), Some(PairMode::Grid));
        assert_columns_equal(&s);
    }

    #[test]
    fn ocdf_follows_climatology() {
        let mut s = PairStore::new();
        let mut p = pair("A", 40.0, T, 1.0, 10.0);
        p.climo = ClimoPntInfo::new(f64::NAN, f64::NAN, 10.0, 2.0);
        s.add_point_pair(p).unwrap();
        assert!((s.ocdf()[0] - 0.5).abs() < 1e-9);
        assert!(s.add_point_pair(pair("B", 41.0, T, 1.0, 1.0)).is_ok());
        assert!(s.ocdf()[1].is_nan());
    }

    #[test]
    fn clear_resets_mode() {
        let mut s = PairStore::new();
        s.add_point_pair(pair("A", 40.0, T, 1.0, 2.0)).unwrap();
        s.clear();
        assert_eq!(s.mode(), None);
        assert!(s.add_grid_pair(1.0, 1.0, ClimoPntInfo::default(), 1.0).is_ok());
    }
}
