use std::path::PathBuf;

use serde::Deserialize;

/// Top-level verification task file.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskConfig {
    /// Observation filtering and pairing settings.
    #[serde(default)]
    pub pairs: PairsToml,

    /// Forecast field.
    pub fcst: FieldToml,

    /// Observation field.
    pub obs: FieldToml,

    /// Interpolation partitions.
    #[serde(default = "default_interps")]
    pub interp: Vec<InterpToml>,

    /// Mask partitions.
    #[serde(default = "default_masks")]
    pub mask: Vec<MaskToml>,

    /// Categorical thresholds.
    #[serde(default)]
    pub cat: CatToml,

    /// Confidence interval settings.
    #[serde(default)]
    pub ci: CiToml,

    /// Output settings.
    #[serde(default)]
    pub output: OutputToml,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PairsToml {
    /// Message types; each one is its own partition.
    #[serde(default = "default_message_types")]
    pub message_types: Vec<String>,
    /// Surface message types. The library default is used when unset.
    #[serde(default)]
    pub sfc_message_types: Option<Vec<String>>,
    /// Observation window as offsets in seconds from the forecast time.
    #[serde(default)]
    pub obs_window: Option<[i64; 2]>,
    #[serde(default)]
    pub check_unique: bool,
    #[serde(default = "default_obs_summary")]
    pub obs_summary: String,
    /// Percentile for `obs_summary = "perc"`.
    #[serde(default = "default_obs_perc")]
    pub obs_perc: f64,
    #[serde(default)]
    pub sid_include: Vec<String>,
    #[serde(default)]
    pub sid_exclude: Vec<String>,
    #[serde(default)]
    pub qty_include: Vec<String>,
    #[serde(default)]
    pub qty_exclude: Vec<String>,
    /// Matched-pair filters.
    #[serde(default)]
    pub mpr: Vec<MprToml>,
}

impl Default for PairsToml {
    fn default() -> Self {
        Self {
            message_types: default_message_types(),
            sfc_message_types: None,
            obs_window: None,
            check_unique: false,
            obs_summary: default_obs_summary(),
            obs_perc: default_obs_perc(),
            sid_include: Vec::new(),
            sid_exclude: Vec::new(),
            qty_include: Vec::new(),
            qty_exclude: Vec::new(),
            mpr: Vec::new(),
        }
    }
}

fn default_message_types() -> Vec<String> {
    vec!["ADPSFC".to_string()]
}
fn default_obs_summary() -> String {
    "none".to_string()
}
fn default_obs_perc() -> f64 {
    50.0
}

/// One matched-pair filter, e.g. `column = "FCST-OBS"`, `thresh = "<5"`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MprToml {
    pub column: String,
    pub thresh: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldToml {
    pub name: String,
    /// GRIB1 parameter code, for observations identified by code.
    #[serde(default)]
    pub grib_code: Option<u32>,
    #[serde(default = "default_level_type")]
    pub level_type: String,
    #[serde(default)]
    pub level: [f64; 2],
    /// Linear conversion `v * scale + offset`, applied when either is set.
    #[serde(default)]
    pub scale: Option<f64>,
    #[serde(default)]
    pub offset: Option<f64>,
    /// Censor thresholds, paired with `censor_val`.
    #[serde(default)]
    pub censor_thresh: Vec<String>,
    #[serde(default)]
    pub censor_val: Vec<f64>,
}

fn default_level_type() -> String {
    "none".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InterpToml {
    #[serde(default = "default_interp_method")]
    pub method: String,
    #[serde(default = "default_interp_width")]
    pub width: usize,
    #[serde(default = "default_interp_shape")]
    pub shape: String,
    /// Fraction of valid neighborhood points required.
    #[serde(default = "default_vld_thresh")]
    pub vld_thresh: f64,
}

fn default_interps() -> Vec<InterpToml> {
    vec![InterpToml {
        method: default_interp_method(),
        width: default_interp_width(),
        shape: default_interp_shape(),
        vld_thresh: default_vld_thresh(),
    }]
}
fn default_interp_method() -> String {
    "nearest".to_string()
}
fn default_interp_width() -> usize {
    1
}
fn default_interp_shape() -> String {
    "square".to_string()
}
fn default_vld_thresh() -> f64 {
    1.0
}

/// A mask partition. With neither `sids` nor lat/lon thresholds it
/// accepts every location.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MaskToml {
    pub name: String,
    #[serde(default)]
    pub sids: Option<Vec<String>>,
    #[serde(default)]
    pub lat_thresh: Option<String>,
    #[serde(default)]
    pub lon_thresh: Option<String>,
}

fn default_masks() -> Vec<MaskToml> {
    vec![MaskToml {
        name: "FULL".to_string(),
        sids: None,
        lat_thresh: None,
        lon_thresh: None,
    }]
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CatToml {
    /// Forecast thresholds for CTS, paired by position with `obs_thresh`.
    #[serde(default)]
    pub fcst_thresh: Vec<String>,
    #[serde(default)]
    pub obs_thresh: Vec<String>,
    /// Pair filter for CNT and SL1L2.
    #[serde(default = "default_na")]
    pub cnt_fcst_thresh: String,
    #[serde(default = "default_na")]
    pub cnt_obs_thresh: String,
    #[serde(default = "default_logic")]
    pub logic: String,
}

impl Default for CatToml {
    fn default() -> Self {
        Self {
            fcst_thresh: Vec::new(),
            obs_thresh: Vec::new(),
            cnt_fcst_thresh: default_na(),
            cnt_obs_thresh: default_na(),
            logic: default_logic(),
        }
    }
}

fn default_na() -> String {
    "NA".to_string()
}
fn default_logic() -> String {
    "union".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CiToml {
    #[serde(default = "default_alphas")]
    pub alphas: Vec<f64>,
    #[serde(default = "default_true")]
    pub normal_ci: bool,
    #[serde(default)]
    pub bootstrap: bool,
    #[serde(default = "default_n_replicates")]
    pub n_replicates: usize,
    #[serde(default = "default_replicate_proportion")]
    pub replicate_proportion: f64,
    #[serde(default)]
    pub seed: u64,
    #[serde(default = "default_large_sample_threshold")]
    pub large_sample_threshold: usize,
    /// Compute Spearman and Kendall correlations.
    #[serde(default)]
    pub rank_corr: bool,
    /// Exclude pairs where both values are zero from the rank statistics.
    #[serde(default)]
    pub precip: bool,
}

impl Default for CiToml {
    fn default() -> Self {
        Self {
            alphas: default_alphas(),
            normal_ci: true,
            bootstrap: false,
            n_replicates: default_n_replicates(),
            replicate_proportion: default_replicate_proportion(),
            seed: 0,
            large_sample_threshold: default_large_sample_threshold(),
            rank_corr: false,
            precip: false,
        }
    }
}

fn default_alphas() -> Vec<f64> {
    vec![0.05]
}
fn default_true() -> bool {
    true
}
fn default_n_replicates() -> usize {
    1000
}
fn default_replicate_proportion() -> f64 {
    1.0
}
fn default_large_sample_threshold() -> usize {
    100
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct OutputToml {
    pub path: Option<PathBuf>,
}
