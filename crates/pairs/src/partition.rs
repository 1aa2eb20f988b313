//! The message type × mask × interpolation partition matrix.

use serde::Serialize;
use tracing::{info, instrument};

use crate::config::PairsConfig;
use crate::error::PairsError;
use crate::field::FieldDescriptor;
use crate::grid::{DataPlane, DataPlaneArray, Grid, MaskLatLon, MaskPlane, MaskSid, SurfaceInfo};
use crate::interp::{InterpInfo, InterpMethod};
use crate::store::PairStore;

/// A message-type partition: a name plus the raw message types it accepts.
#[derive(Debug, Clone, PartialEq)]
pub struct MsgTypGroup {
    name: String,
    members: Vec<String>,
}

impl MsgTypGroup {
    /// Group accepting only the message type `name`.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            members: vec![name.clone()],
            name,
        }
    }

    /// Group named `name` accepting any of `members`, e.g. `ANYSFC`.
    pub fn with_members(name: impl Into<String>, members: Vec<String>) -> Self {
        Self {
            name: name.into(),
            members,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn members(&self) -> &[String] {
        &self.members
    }

    pub fn contains(&self, msg_typ: &str) -> bool {
        self.members.iter().any(|m| m == msg_typ)
    }
}

/// A spatial mask partition.
///
/// Tests run in priority order: area plane, then station list, then
/// lat/lon thresholds. Only the first one configured is used. A mask with
/// nothing configured accepts everything.
#[derive(Debug, Clone, Default)]
pub struct MaskSpec<'a> {
    name: String,
    area: Option<&'a MaskPlane>,
    sid: Option<&'a MaskSid>,
    llpnt: Option<&'a MaskLatLon>,
}

impl<'a> MaskSpec<'a> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_area(mut self, area: &'a MaskPlane) -> Self {
        self.area = Some(area);
        self
    }

    pub fn with_sid(mut self, sid: &'a MaskSid) -> Self {
        self.sid = Some(sid);
        self
    }

    pub fn with_llpnt(mut self, llpnt: &'a MaskLatLon) -> Self {
        self.llpnt = Some(llpnt);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Tests a location. `x`/`y` are the nearest grid indices.
    pub fn check(&self, x: i64, y: i64, sid: &str, lat: f64, lon: f64) -> bool {
        if let Some(area) = self.area {
            area.s_is_on(x, y)
        } else if let Some(mask_sid) = self.sid {
            mask_sid.has(sid).is_some()
        } else if let Some(llpnt) = self.llpnt {
            llpnt.check(lat, lon)
        } else {
            true
        }
    }
}

/// Fields, grid and auxiliary planes shared by all partitions of one task.
///
/// Everything is borrowed for the lifetime of the task.
#[derive(Clone, Copy)]
pub struct VxTask<'a> {
    pub(crate) fcst_info: &'a dyn FieldDescriptor,
    pub(crate) obs_info: &'a dyn FieldDescriptor,
    pub(crate) grid: &'a dyn Grid,
    pub(crate) fcst: &'a DataPlaneArray,
    pub(crate) fcmn: Option<&'a DataPlaneArray>,
    pub(crate) fcsd: Option<&'a DataPlaneArray>,
    pub(crate) ocmn: Option<&'a DataPlaneArray>,
    pub(crate) ocsd: Option<&'a DataPlaneArray>,
    pub(crate) sfc_info: Option<&'a SurfaceInfo>,
    pub(crate) wgt: Option<&'a DataPlane>,
}

impl<'a> VxTask<'a> {
    pub fn new(
        fcst_info: &'a dyn FieldDescriptor,
        obs_info: &'a dyn FieldDescriptor,
        grid: &'a dyn Grid,
        fcst: &'a DataPlaneArray,
    ) -> Self {
        Self {
            fcst_info,
            obs_info,
            grid,
            fcst,
            fcmn: None,
            fcsd: None,
            ocmn: None,
            ocsd: None,
            sfc_info: None,
            wgt: None,
        }
    }

    /// Sets forecast climatology mean and optional standard deviation.
    pub fn with_fcst_climo(mut self, mean: &'a DataPlaneArray, stdev: Option<&'a DataPlaneArray>) -> Self {
        self.fcmn = Some(mean);
        self.fcsd = stdev;
        self
    }

    /// Sets observation climatology mean and optional standard deviation.
    pub fn with_obs_climo(mut self, mean: &'a DataPlaneArray, stdev: Option<&'a DataPlaneArray>) -> Self {
        self.ocmn = Some(mean);
        self.ocsd = stdev;
        self
    }

    pub fn with_surface(mut self, sfc_info: &'a SurfaceInfo) -> Self {
        self.sfc_info = Some(sfc_info);
        self
    }

    /// Sets per-grid-point pair weights. Without it every pair has weight 1.
    pub fn with_weights(mut self, wgt: &'a DataPlane) -> Self {
        self.wgt = Some(wgt);
        self
    }

    pub fn fcst_info(&self) -> &'a dyn FieldDescriptor {
        self.fcst_info
    }

    pub fn obs_info(&self) -> &'a dyn FieldDescriptor {
        self.obs_info
    }

    /// Returns `true` if any climatology standard deviation is supplied.
    pub(crate) fn has_climo_stdev(&self) -> bool {
        self.fcsd.is_some_and(|d| !d.is_empty()) || self.ocsd.is_some_and(|d| !d.is_empty())
    }
}

/// Observation-level rejection counters and the number of observations
/// tried.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RejectCounts {
    pub n_try: usize,
    pub rej_sid: usize,
    pub rej_var: usize,
    pub rej_qty: usize,
    pub rej_vld: usize,
    pub rej_obs: usize,
    pub rej_grd: usize,
    pub rej_topo: usize,
    pub rej_lvl: usize,
}

/// Rejection counters for one partition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PartitionRejects {
    pub rej_typ: usize,
    pub rej_mask: usize,
    pub rej_cmn: usize,
    pub rej_csd: usize,
    pub rej_fcst: usize,
    pub rej_mpr: usize,
    pub rej_dup: usize,
}

/// Indices of one partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct PartitionKey {
    pub i_msg_typ: usize,
    pub i_mask: usize,
    pub i_interp: usize,
}

/// Partition-scoped counters, each a flat vector indexed by
/// [`VxPairs::three_to_one`].
#[derive(Debug, Clone, Default)]
pub(crate) struct RejectMatrix {
    pub(crate) typ: Vec<usize>,
    pub(crate) mask: Vec<usize>,
    pub(crate) cmn: Vec<usize>,
    pub(crate) csd: Vec<usize>,
    pub(crate) fcst: Vec<usize>,
    pub(crate) mpr: Vec<usize>,
    pub(crate) dup: Vec<usize>,
}

impl RejectMatrix {
    fn sized(n_vx: usize) -> Self {
        Self {
            typ: vec![0; n_vx],
            mask: vec![0; n_vx],
            cmn: vec![0; n_vx],
            csd: vec![0; n_vx],
            fcst: vec![0; n_vx],
            mpr: vec![0; n_vx],
            dup: vec![0; n_vx],
        }
    }

    fn get(&self, n: usize) -> PartitionRejects {
        PartitionRejects {
            rej_typ: self.typ[n],
            rej_mask: self.mask[n],
            rej_cmn: self.cmn[n],
            rej_csd: self.csd[n],
            rej_fcst: self.fcst[n],
            rej_mpr: self.mpr[n],
            rej_dup: self.dup[n],
        }
    }
}

/// Matched pairs for every (message type, mask, interpolation)
/// partition of one verification task.
///
/// Stores and partition counters live in flat vectors indexed by
/// [`three_to_one`](Self::three_to_one). The matrix must be sized before
/// use and each partition axis labelled.
pub struct VxPairs<'a> {
    pub(crate) task: VxTask<'a>,
    pub(crate) config: PairsConfig,
    pub(crate) n_msg_typ: usize,
    pub(crate) n_mask: usize,
    pub(crate) n_interp: usize,
    pub(crate) msg_typ: Vec<MsgTypGroup>,
    pub(crate) mask: Vec<MaskSpec<'a>>,
    pub(crate) interp: Vec<InterpInfo>,
    pub(crate) stores: Vec<PairStore>,
    pub(crate) counts: RejectCounts,
    pub(crate) rej: RejectMatrix,
    /// Whether the climatology spread warning was issued, per interp.
    pub(crate) spread_warned: Vec<bool>,
}

impl<'a> VxPairs<'a> {
    /// Creates an unsized matrix. Call [`set_size`](Self::set_size) next.
    pub fn new(task: VxTask<'a>, config: PairsConfig) -> Self {
        Self {
            task,
            config,
            n_msg_typ: 0,
            n_mask: 0,
            n_interp: 0,
            msg_typ: Vec::new(),
            mask: Vec::new(),
            interp: Vec::new(),
            stores: Vec::new(),
            counts: RejectCounts::default(),
            rej: RejectMatrix::default(),
            spread_warned: Vec::new(),
        }
    }

    /// Sizes the matrix and labels every axis in one step.
    #[instrument(skip_all, fields(n_msg_typ = msg_typs.len(), n_mask = masks.len(), n_interp = interps.len()))]
    pub fn with_partitions(
        task: VxTask<'a>,
        config: PairsConfig,
        msg_typs: Vec<MsgTypGroup>,
        masks: Vec<MaskSpec<'a>>,
        interps: Vec<InterpInfo>,
    ) -> Result<Self, PairsError> {
        config.validate()?;
        let mut vx = Self::new(task, config);
        vx.set_size(msg_typs.len(), masks.len(), interps.len())?;
        for (i, m) in msg_typs.into_iter().enumerate() {
            vx.set_msg_typ(i, m)?;
        }
        for (i, m) in masks.into_iter().enumerate() {
            vx.set_mask(i, m)?;
        }
        for (i, info) in interps.into_iter().enumerate() {
            vx.set_interp(i, info)?;
        }
        info!(n_vx = vx.n_vx(), "partition matrix ready");
        Ok(vx)
    }

    /// Sizes the matrix, clearing every store and counter.
    pub fn set_size(&mut self, n_msg_typ: usize, n_mask: usize, n_interp: usize) -> Result<(), PairsError> {
        for (n, axis) in [(n_msg_typ, "msg_typ"), (n_mask, "mask"), (n_interp, "interp")] {
            if n == 0 {
                return Err(PairsError::EmptyDimension { axis });
            }
        }
        self.n_msg_typ = n_msg_typ;
        self.n_mask = n_mask;
        self.n_interp = n_interp;
        let n_vx = n_msg_typ * n_mask * n_interp;

        self.msg_typ = vec![MsgTypGroup::with_members("", Vec::new()); n_msg_typ];
        self.mask = vec![MaskSpec::default(); n_mask];
        self.interp = vec![InterpInfo::new(InterpMethod::Nearest, 1); n_interp];
        self.spread_warned = vec![false; n_interp];

        let mut template = PairStore::new();
        template.set_fcst_ut(self.config.fcst_ut());
        template.set_check_unique(self.config.check_unique());
        template.set_obs_summary(self.config.obs_summary());
        template.set_interp_name(self.interp[0].name());
        self.stores = vec![template; n_vx];

        self.counts = RejectCounts::default();
        self.rej = RejectMatrix::sized(n_vx);
        Ok(())
    }

    fn check_axis(&self, axis: &'static str, index: usize, len: usize) -> Result<(), PairsError> {
        if self.stores.is_empty() {
            return Err(PairsError::Unsized);
        }
        if index >= len {
            return Err(PairsError::IndexOutOfRange { axis, index, len });
        }
        Ok(())
    }

    pub fn set_msg_typ(&mut self, i_msg_typ: usize, group: MsgTypGroup) -> Result<(), PairsError> {
        self.check_axis("msg_typ", i_msg_typ, self.n_msg_typ)?;
        for i_mask in 0..self.n_mask {
            for i_interp in 0..self.n_interp {
                let n = self.index(i_msg_typ, i_mask, i_interp);
                self.stores[n].set_msg_typ(group.name());
            }
        }
        self.msg_typ[i_msg_typ] = group;
        Ok(())
    }

    pub fn set_mask(&mut self, i_mask: usize, mask: MaskSpec<'a>) -> Result<(), PairsError> {
        self.check_axis("mask", i_mask, self.n_mask)?;
        for i_msg_typ in 0..self.n_msg_typ {
            for i_interp in 0..self.n_interp {
                let n = self.index(i_msg_typ, i_mask, i_interp);
                self.stores[n].set_mask_name(mask.name());
            }
        }
        self.mask[i_mask] = mask;
        Ok(())
    }

    pub fn set_interp(&mut self, i_interp: usize, info: InterpInfo) -> Result<(), PairsError> {
        self.check_axis("interp", i_interp, self.n_interp)?;
        info.validate()?;
        let name = info.name();
        for i_msg_typ in 0..self.n_msg_typ {
            for i_mask in 0..self.n_mask {
                let n = self.index(i_msg_typ, i_mask, i_interp);
                self.stores[n].set_interp_name(name.clone());
            }
        }
        self.interp[i_interp] = info;
        Ok(())
    }

    pub(crate) fn index(&self, i_msg_typ: usize, i_mask: usize, i_interp: usize) -> usize {
        (i_interp * self.n_mask + i_mask) * self.n_msg_typ + i_msg_typ
    }

    /// Linear index of a partition.
    pub fn three_to_one(&self, i_msg_typ: usize, i_mask: usize, i_interp: usize) -> Result<usize, PairsError> {
        self.check_axis("msg_typ", i_msg_typ, self.n_msg_typ)?;
        self.check_axis("mask", i_mask, self.n_mask)?;
        self.check_axis("interp", i_interp, self.n_interp)?;
        Ok(self.index(i_msg_typ, i_mask, i_interp))
    }

    /// Partition indices of a linear index.
    pub fn one_to_three(&self, n: usize) -> Result<PartitionKey, PairsError> {
        self.check_axis("partition", n, self.n_vx())?;
        Ok(PartitionKey {
            i_msg_typ: n % self.n_msg_typ,
            i_mask: (n / self.n_msg_typ) % self.n_mask,
            i_interp: n / (self.n_msg_typ * self.n_mask),
        })
    }

    pub fn n_vx(&self) -> usize {
        self.stores.len()
    }

    pub fn n_msg_typ(&self) -> usize {
        self.n_msg_typ
    }

    pub fn n_mask(&self) -> usize {
        self.n_mask
    }

    pub fn n_interp(&self) -> usize {
        self.n_interp
    }

    pub fn config(&self) -> &PairsConfig {
        &self.config
    }

    pub fn msg_typ(&self, i_msg_typ: usize) -> Option<&MsgTypGroup> {
        self.msg_typ.get(i_msg_typ)
    }

    pub fn mask(&self, i_mask: usize) -> Option<&MaskSpec<'a>> {
        self.mask.get(i_mask)
    }

    pub fn interp(&self, i_interp: usize) -> Option<&InterpInfo> {
        self.interp.get(i_interp)
    }

    pub fn store(&self, i_msg_typ: usize, i_mask: usize, i_interp: usize) -> Result<&PairStore, PairsError> {
        let n = self.three_to_one(i_msg_typ, i_mask, i_interp)?;
        Ok(&self.stores[n])
    }

    /// Number of pairs in one partition.
    pub fn get_n_pair(&self, i_msg_typ: usize, i_mask: usize, i_interp: usize) -> Result<usize, PairsError> {
        Ok(self.store(i_msg_typ, i_mask, i_interp)?.n_obs())
    }

    /// Every partition with its store, in linear index order.
    pub fn iter(&self) -> impl Iterator<Item = (PartitionKey, &PairStore)> {
        let (n_msg_typ, n_mask) = (self.n_msg_typ, self.n_mask);
        self.stores.iter().enumerate().map(move |(n, store)| {
            let key = PartitionKey {
                i_msg_typ: n % n_msg_typ,
                i_mask: (n / n_msg_typ) % n_mask,
                i_interp: n / (n_msg_typ * n_mask),
            };
            (key, store)
        })
    }

    /// Consumes the matrix, returning its stores in linear index order.
    pub fn into_stores(self) -> Vec<PairStore> {
        self.stores
    }

    /// Observation-level counters.
    pub fn counts(&self) -> &RejectCounts {
        &self.counts
    }

    /// Partition-level counters.
    pub fn rejects(&self, i_msg_typ: usize, i_mask: usize, i_interp: usize) -> Result<PartitionRejects, PairsError> {
        let n = self.three_to_one(i_msg_typ, i_mask, i_interp)?;
        Ok(self.rej.get(n))
    }

    /// Applies the observation summary in every partition.
    #[instrument(skip(self))]
    pub fn calc_obs_summary(&mut self) {
        for store in &mut self.stores {
            store.calc_obs_summary();
        }
    }

    /// Logs repeated observations in every partition.
    pub fn log_duplicate_report(&self) {
        for store in &self.stores {
            store.log_duplicate_report();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{FieldInfo, FieldSource};
    use crate::grid::LatLonGrid;
    use std::collections::HashSet;

    fn fixtures() -> (FieldInfo, LatLonGrid, DataPlaneArray) {
        let info = FieldInfo::new("TMP", FieldSource::NetCdf);
        let grid = LatLonGrid::new(0.0, 0.0, 1.0, 1.0, 4, 4).unwrap();
        let dpa = DataPlaneArray::single(DataPlane::constant(4, 4, 1.0));
        (info, grid, dpa)
    }

    #[test]
    fn unsized_matrix_is_an_error() {
        let (info, grid, dpa) = fixtures();
        let task = VxTask::new(&info, &info, &grid, &dpa);
        let vx = VxPairs::new(task, PairsConfig::default());
        assert!(matches!(vx.three_to_one(0, 0, 0), Err(PairsError::Unsized)));
        assert!(matches!(vx.get_n_pair(0, 0, 0), Err(PairsError::Unsized)));
    }

    #[test]
    fn zero_dimension_rejected() {
        let (info, grid, dpa) = fixtures();
        let task = VxTask::new(&info, &info, &grid, &dpa);
        let mut vx = VxPairs::new(task, PairsConfig::default());
        assert!(matches!(
            vx.set_size(2, 0, 1),
            Err(PairsError::EmptyDimension { axis: "mask" })
        ));
    }

    #[test]
    fn three_to_one_is_a_bijection() {
        let (info, grid, dpa) = fixtures();
        let task = VxTask::new(&info, &info, &grid, &dpa);
        let mut vx = VxPairs::new(task, PairsConfig::default());
        vx.set_size(3, 4, 2).unwrap();

        let mut seen = HashSet::new();
        for i in 0..3 {
            for j in 0..4 {
                for k in 0..2 {
                    let n = vx.three_to_one(i, j, k).unwrap();
                    assert!(n < vx.n_vx());
                    assert!(seen.insert(n));
                    let key = vx.one_to_three(n).unwrap();
                    assert_eq!((key.i_msg_typ, key.i_mask, key.i_interp), (i, j, k));
                }
            }
        }
        assert_eq!(seen.len(), 24);
        assert_eq!(vx.three_to_one(1, 2, 1).unwrap(), (4 + 2) * 3 + 1);
        assert!(matches!(
            vx.three_to_one(3, 0, 0),
            Err(PairsError::IndexOutOfRange { axis: "msg_typ", index: 3, len: 3 })
        ));
    }

    #[test]
    fn labels_propagate_to_stores() {
        let (info, grid, dpa) = fixtures();
        let task = VxTask::new(&info, &info, &grid, &dpa);
        let vx = VxPairs::with_partitions(
            task,
            PairsConfig::default(),
            vec![MsgTypGroup::new("ADPSFC"), MsgTypGroup::new("ADPUPA")],
            vec![MaskSpec::new("FULL")],
            vec![
                InterpInfo::new(InterpMethod::Nearest, 1),
                InterpInfo::new(InterpMethod::UwMean, 3),
            ],
        )
        .unwrap();
        let s = vx.store(1, 0, 1).unwrap();
        assert_eq!(s.msg_typ(), "ADPUPA");
        assert_eq!(s.mask_name(), "FULL");
        assert_eq!(s.interp_name(), "UW_MEAN_9");
        assert_eq!(vx.iter().count(), 4);
    }

    #[test]
    fn invalid_interp_rejected() {
        let (info, grid, dpa) = fixtures();
        let task = VxTask::new(&info, &info, &grid, &dpa);
        let res = VxPairs::with_partitions(
            task,
            PairsConfig::default(),
            vec![MsgTypGroup::new("ADPSFC")],
            vec![MaskSpec::new("FULL")],
            vec![InterpInfo::new(InterpMethod::Bilin, 3)],
        );
        assert!(matches!(res, Err(PairsError::InvalidInterp { .. })));
    }

    #[test]
    fn mask_priority() {
        let area = MaskPlane::new(2, 1, vec![true, false]).unwrap();
        let sid = MaskSid::new("list", vec![("KDEN".to_string(), 1.0)]);
        let spec = MaskSpec::new("m").with_sid(&sid).with_area(&area);
        // The area plane wins even though the station is listed.
        assert!(!spec.check(1, 0, "KDEN", 0.0, 0.0));
        assert!(spec.check(0, 0, "KBOS", 0.0, 0.0));
        let only_sid = MaskSpec::new("m").with_sid(&sid);
        assert!(only_sid.check(1, 0, "KDEN", 0.0, 0.0));
        assert!(MaskSpec::new("all").check(-5, -5, "X", 0.0, 0.0));
    }

    #[test]
    fn msg_typ_groups() {
        let g = MsgTypGroup::with_members("ANYSFC", vec!["ADPSFC".into(), "SFCSHP".into()]);
        assert!(g.contains("SFCSHP"));
        assert!(!g.contains("ANYSFC"));
        assert!(MsgTypGroup::new("ADPUPA").contains("ADPUPA"));
    }
}
