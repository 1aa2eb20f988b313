//! Matched-pair construction for point forecast verification.
//!
//! Raw point observations are matched to forecast fields interpolated to
//! the observation location and level. Each observation runs through an
//! ordered rejection cascade, and the pairs that survive are stored per
//! partition:
//!
//! | Axis | Partition | Rejection counter |
//! |------|-----------|-------------------|
//! | message type | [`MsgTypGroup`] | `rej_typ` |
//! | spatial mask | [`MaskSpec`] | `rej_mask` |
//! | interpolation | [`InterpInfo`] | `rej_cmn`, `rej_csd`, `rej_fcst`, `rej_mpr`, `rej_dup` |
//!
//! # Quick start
//!
//! ```
//! use verif_pairs::{
//!     DataPlane, DataPlaneArray, FieldInfo, FieldSource, InterpInfo, InterpMethod,
//!     LatLonGrid, MaskSpec, MsgTypGroup, Observation, PairsConfig, VxPairs, VxTask,
//! };
//!
//! let grid = LatLonGrid::new(30.0, -110.0, 1.0, 1.0, 10, 10).unwrap();
//! let fcst = DataPlaneArray::single(DataPlane::constant(10, 10, 285.0));
//! let info = FieldInfo::new("TMP", FieldSource::NetCdf);
//! let task = VxTask::new(&info, &info, &grid, &fcst);
//!
//! let mut vx = VxPairs::with_partitions(
//!     task,
//!     PairsConfig::new(1_700_000_000),
//!     vec![MsgTypGroup::new("ADPSFC")],
//!     vec![MaskSpec::new("FULL")],
//!     vec![InterpInfo::new(InterpMethod::Nearest, 1)],
//! )
//! .unwrap();
//!
//! let obs = Observation {
//!     sid: "KDEN".into(),
//!     msg_typ: "ADPSFC".into(),
//!     var_name: "TMP".into(),
//!     lat: 35.2,
//!     lon: -104.8,
//!     vld: 1_700_000_000,
//!     value: 283.5,
//!     ..Default::default()
//! };
//! assert!(vx.add_point_obs(&obs).unwrap().is_keep());
//! assert_eq!(vx.get_n_pair(0, 0, 0).unwrap(), 1);
//! ```
//!
//! # Architecture
//!
//! ```text
//! VxPairs::add_point_obs()                (cascade.rs)
//!   ├─ sid, var, qty, vld, obs            (config.rs, field.rs)
//!   ├─ grd, topo, lvl                     (grid.rs, interp.rs)
//!   ├─ find_vert_lvl()                    (interp.rs)
//!   └─ for msg_typ × mask × interp        (partition.rs)
//!        ├─ climo, fcst interpolation     (interp.rs)
//!        ├─ matched-pair filters          (mpr.rs)
//!        └─ PairStore::add_point_pair()   (store.rs, summary.rs)
//!
//! subset_pairs_cnt_thresh() / subset_wind_pairs() / subset_climo_cdf_bin()
//!   └─ re-insert passing pairs            (subset.rs)
//! ```

pub mod cascade;
pub mod climo;
pub mod config;
pub mod error;
pub mod field;
pub mod grid;
pub mod interp;
pub mod mpr;
pub mod partition;
pub mod store;
pub mod subset;
pub mod summary;
pub mod thresh;

pub use cascade::{CascadeResult, Observation, Stage};
pub use climo::{
    ClimoCdfInfo, ClimoPntInfo, compute_climo_cdf, derive_climo_prob, derive_climo_vals,
    derive_prob, set_climo_flag,
};
pub use config::{DEFAULT_SFC_MSG_TYPES, PairsConfig};
pub use error::PairsError;
pub use field::{Conversion, FieldDescriptor, FieldInfo, FieldSource, Level, LevelType};
pub use grid::{
    DataPlane, DataPlaneArray, Grid, LatLonGrid, MaskLatLon, MaskPlane, MaskSid, SurfaceInfo,
};
pub use interp::{
    InterpInfo, InterpMethod, InterpShape, VertInterp, compute_horz_interp, compute_interp,
    compute_sfc_interp, compute_vert_pinterp, compute_vert_zinterp, find_vert_lvl,
};
pub use mpr::{
    GridPairPlanes, MprColumn, MprExpr, MprFilter, apply_mpr_thresh_mask, check_mpr_thresh,
    failing_mpr_filter,
};
pub use partition::{
    MaskSpec, MsgTypGroup, PartitionKey, PartitionRejects, RejectCounts, VxPairs, VxTask,
};
pub use store::{PairMode, PairStore, PointPair, station_key};
pub use subset::{subset_climo_cdf_bin, subset_pairs_cnt_thresh, subset_wind_pairs};
pub use summary::{ObVal, ObsSummary};
pub use thresh::{SetLogic, SingleThresh, ThreshArray, ThreshOp, ThreshValue, check_fo_thresh};
