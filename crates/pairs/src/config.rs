//! Configuration for building matched pairs.

use crate::error::PairsError;
use crate::mpr::MprFilter;
use crate::summary::ObsSummary;

/// Message types treated as surface observations by default.
pub const DEFAULT_SFC_MSG_TYPES: &[&str] = &["ADPSFC", "SFCSHP", "MSONET", "SURFACE"];

/// Settings shared by every partition of a verification task.
///
/// Use the builder methods to customise parameters.
///
/// # Example
///
/// ```
/// use verif_pairs::{ObsSummary, PairsConfig};
///
/// let config = PairsConfig::new(1_700_000_000)
///     .with_time_window(Some(1_699_999_400), Some(1_700_000_600))
///     .with_obs_summary(ObsSummary::Nearest)
///     .with_check_unique(true);
///
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct PairsConfig {
    /// Forecast valid time (unix seconds).
    fcst_ut: i64,
    /// Start of the observation time window, inclusive.
    beg_ut: Option<i64>,
    /// End of the observation time window, inclusive.
    end_ut: Option<i64>,
    /// Reject repeated observations at the same location and time.
    check_unique: bool,
    /// Reduction applied to repeated observations at one location.
    obs_summary: ObsSummary,
    sid_inc: Vec<String>,
    sid_exc: Vec<String>,
    obs_qty_inc: Vec<String>,
    obs_qty_exc: Vec<String>,
    /// Message types exempt from the height check and eligible for
    /// surface interpolation.
    sfc_msg_types: Vec<String>,
    mpr_filters: Vec<MprFilter>,
}

impl PairsConfig {
    /// Creates a configuration for forecasts valid at `fcst_ut`.
    ///
    /// Defaults: no time window, no uniqueness check, no summary, no
    /// station or quality filters, and [`DEFAULT_SFC_MSG_TYPES`].
    pub fn new(fcst_ut: i64) -> Self {
        Self {
            fcst_ut,
            beg_ut: None,
            end_ut: None,
            check_unique: false,
            obs_summary: ObsSummary::None,
            sid_inc: Vec::new(),
            sid_exc: Vec::new(),
            obs_qty_inc: Vec::new(),
            obs_qty_exc: Vec::new(),
            sfc_msg_types: DEFAULT_SFC_MSG_TYPES.iter().map(|s| s.to_string()).collect(),
            mpr_filters: Vec::new(),
        }
    }

    /// Sets the inclusive observation time window.
    pub fn with_time_window(mut self, beg_ut: Option<i64>, end_ut: Option<i64>) -> Self {
        self.beg_ut = beg_ut;
        self.end_ut = end_ut;
        self
    }

    pub fn with_check_unique(mut self, check_unique: bool) -> Self {
        self.check_unique = check_unique;
        self
    }

    pub fn with_obs_summary(mut self, obs_summary: ObsSummary) -> Self {
        self.obs_summary = obs_summary;
        self
    }

    /// Sets station IDs to include (empty keeps all) and exclude.
    pub fn with_sids(mut self, include: Vec<String>, exclude: Vec<String>) -> Self {
        self.sid_inc = include;
        self.sid_exc = exclude;
        self
    }

    /// Sets QC markers to include (empty or `ANY` keeps all) and exclude.
    pub fn with_obs_qty(mut self, include: Vec<String>, exclude: Vec<String>) -> Self {
        self.obs_qty_inc = include;
        self.obs_qty_exc = exclude;
        self
    }

    pub fn with_sfc_msg_types(mut self, sfc_msg_types: Vec<String>) -> Self {
        self.sfc_msg_types = sfc_msg_types;
        self
    }

    pub fn with_mpr_filters(mut self, mpr_filters: Vec<MprFilter>) -> Self {
        self.mpr_filters = mpr_filters;
        self
    }

    pub fn fcst_ut(&self) -> i64 {
        self.fcst_ut
    }

    pub fn beg_ut(&self) -> Option<i64> {
        self.beg_ut
    }

    pub fn end_ut(&self) -> Option<i64> {
        self.end_ut
    }

    pub fn check_unique(&self) -> bool {
        self.check_unique
    }

    pub fn obs_summary(&self) -> ObsSummary {
        self.obs_summary
    }

    pub fn mpr_filters(&self) -> &[MprFilter] {
        &self.mpr_filters
    }

    pub fn sfc_msg_types(&self) -> &[String] {
        &self.sfc_msg_types
    }

    /// Returns `true` if `msg_typ` is a surface message type.
    pub fn is_sfc_msg_typ(&self, msg_typ: &str) -> bool {
        self.sfc_msg_types.iter().any(|t| t == msg_typ)
    }

    /// Returns `true` if the station passes the include/exclude lists.
    pub fn keeps_sid(&self, sid: &str) -> bool {
        (self.sid_inc.is_empty() || self.sid_inc.iter().any(|s| s == sid))
            && !self.sid_exc.iter().any(|s| s == sid)
    }

    /// Returns `true` if the QC marker passes the include/exclude lists.
    pub fn keeps_qty(&self, qty: &str) -> bool {
        let included = self.obs_qty_inc.is_empty()
            || self.obs_qty_inc.iter().any(|q| q == "ANY" || q == qty);
        included && !self.obs_qty_exc.iter().any(|q| q == qty)
    }

    /// Returns `true` if `ut` lies in the time window.
    pub fn keeps_vld(&self, ut: i64) -> bool {
        self.beg_ut.is_none_or(|b| ut >= b) && self.end_ut.is_none_or(|e| ut <= e)
    }

    /// Validates this configuration.
    ///
    /// Returns an error if the time window is inverted or the summary
    /// percentile is outside `[0, 100]`.
    pub fn validate(&self) -> Result<(), PairsError> {
        if let (Some(beg), Some(end)) = (self.beg_ut, self.end_ut) {
            if beg > end {
                return Err(PairsError::InvalidTimeWindow { beg, end });
            }
        }
        if let ObsSummary::Perc(p) = self.obs_summary {
            if !(0.0..=100.0).contains(&p) {
                return Err(PairsError::InvalidPercentile { p });
            }
        }
        Ok(())
    }
}

impl Default for PairsConfig {
    fn default() -> Self {
        Self::new(0)
    }
}
