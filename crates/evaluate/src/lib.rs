//! Verification statistics over matched forecast/observation pairs.
//!
//! Every statistic is a [`CiInfo`]: a value plus normal and bootstrap
//! confidence bounds for each configured alpha. Values that cannot be
//! computed are NaN and serialize as `null`.
//!
//! | Line type | Entry point | Input |
//! |-----------|-------------|-------|
//! | CNT | [`compute_cntinfo`] | raw pairs |
//! | SL1L2 | [`compute_sl1l2info`] | raw pairs, mergeable with `+=` |
//! | VL1L2 | [`compute_vl1l2info`] | U and V pairs, mergeable with `+=` |
//! | CTS | [`compute_ctsinfo`] | pairs and one threshold pair |
//! | MCTS | [`compute_mctsinfo`] | pairs and threshold arrays |
//! | PCT | [`compute_pctinfo`] | probability forecasts |
//! | NBRCNT | [`compute_nbrcntinfo`] | neighborhood fractions, mergeable with `+=` |
//!
//! # Quick start
//!
//! ```
//! use verif_evaluate::{CiConfig, CntOptions, compute_cntinfo, compute_cnt_from_sl1l2,
//!     compute_sl1l2info};
//! use verif_pairs::{ClimoPntInfo, PairStore, SetLogic, SingleThresh};
//!
//! let mut pd = PairStore::new();
//! let f = [1.0, 2.0, 3.0, 4.0];
//! let o = [1.5, 1.5, 3.5, 4.5];
//! pd.add_grid_pairs(&f, &o, &[ClimoPntInfo::default(); 4], &[1.0; 4]).unwrap();
//!
//! let cfg = CiConfig::new().with_alphas(vec![0.05, 0.1]);
//! let cnt = compute_cntinfo(&pd, CntOptions::default(), &cfg).unwrap();
//! assert!((cnt.me.v + 0.25).abs() < 1e-12);
//!
//! let na = SingleThresh::na();
//! let sl1l2 = compute_sl1l2info(&pd, &na, &na, SetLogic::Union).unwrap();
//! let from_sums = compute_cnt_from_sl1l2(&sl1l2, false, &cfg);
//! assert!((from_sums.rmse.v - cnt.rmse.v).abs() < 1e-12);
//! ```
//!
//! # Architecture
//!
//! ```text
//! ci.rs         CiInfo and the interval methods (normal, Student-t,
//!               chi-square, Fisher z, Wilson, Woolf, Hanssen-Kuipers)
//! cnt.rs        continuous statistics
//! sl1l2.rs      scalar and vector partial sums
//! cts.rs        2x2 contingency tables
//! mcts.rs       multi-category tables
//! pct.rs        Nx2 probability tables
//! nbrcnt.rs     fractions skill score family
//! bootstrap.rs  percentile bootstrap intervals
//! aggregate.rs  means over computed results
//! output.rs     JSON output
//! ```

mod aggregate;
mod bootstrap;
mod ci;
mod cnt;
mod config;
mod cts;
mod error;
mod mcts;
mod nbrcnt;
mod output;
mod pct;
mod sl1l2;

pub use aggregate::{
    MeanStdev, compute_cnt_mean, compute_cts_mean, compute_i_mean_stdev, compute_mean_stdev,
    compute_pct_mean, compute_sl1l2_mean,
};
pub use bootstrap::{compute_cnt_stats_ci_perc, compute_cts_stats_ci_perc};
pub use ci::{
    CiFields, CiInfo, compute_corr_ci, compute_hk_ci, compute_mean_ci, compute_normal_ci,
    compute_perc_interval, compute_proportion_ci, compute_stdev_ci, compute_wilson_ci,
    compute_woolf_ci, mean_critical_values, normal_critical_values,
};
pub use cnt::{CntInfo, CntOptions, compute_cntinfo, compute_i_cntinfo};
pub use config::CiConfig;
pub use cts::{CtsInfo, CtsTable, compute_ctsinfo, compute_i_ctsinfo, compute_proportion};
pub use error::EvaluateError;
pub use mcts::{McTable, MctsInfo, compute_i_mctsinfo, compute_mctsinfo};
pub use nbrcnt::{NbrCntInfo, compute_afss, compute_i_nbrcntinfo, compute_nbrcntinfo, compute_ufss};
pub use output::{bad_data, to_json};
pub use pct::{Nx2Table, PctInfo, PctRow, compute_pctinfo};
pub use sl1l2::{
    Sl1l2Info, Vl1l2Info, Vl1l2Stats, compute_cnt_from_sl1l2, compute_sl1l2info,
    compute_vl1l2info,
};
