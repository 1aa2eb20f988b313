//! Pure conversion functions: TOML task structs -> library config types.

use anyhow::{Context, Result, bail};

use verif_evaluate::{CiConfig, CntOptions};
use verif_pairs::{
    Conversion, FieldInfo, FieldSource, InterpInfo, InterpMethod, InterpShape, Level, LevelType,
    MaskLatLon, MaskSid, MaskSpec, MprFilter, MsgTypGroup, ObsSummary, PairsConfig, SetLogic,
    SingleThresh,
};

use crate::config::*;

/// Parses an interpolation method name into the corresponding enum variant.
pub fn parse_interp_method(s: &str) -> Result<InterpMethod> {
    match s.to_lowercase().as_str() {
        "nearest" => Ok(InterpMethod::Nearest),
        "min" => Ok(InterpMethod::Min),
        "max" => Ok(InterpMethod::Max),
        "median" => Ok(InterpMethod::Median),
        "uw_mean" => Ok(InterpMethod::UwMean),
        "dw_mean" => Ok(InterpMethod::DwMean),
        "bilin" => Ok(InterpMethod::Bilin),
        "best" => Ok(InterpMethod::Best),
        other => bail!("unknown interpolation method: {other:?}"),
    }
}

/// Parses a neighborhood shape name.
pub fn parse_interp_shape(s: &str) -> Result<InterpShape> {
    match s.to_lowercase().as_str() {
        "square" => Ok(InterpShape::Square),
        "circle" => Ok(InterpShape::Circle),
        other => bail!("unknown interpolation shape: {other:?}"),
    }
}

/// Parses an observation summary name. `perc` takes its percentile from
/// `perc`, which must lie in `[0, 100]`.
pub fn parse_obs_summary(s: &str, perc: f64) -> Result<ObsSummary> {
    match s.to_lowercase().as_str() {
        "none" => Ok(ObsSummary::None),
        "nearest" => Ok(ObsSummary::Nearest),
        "min" => Ok(ObsSummary::Min),
        "max" => Ok(ObsSummary::Max),
        "uw_mean" => Ok(ObsSummary::UwMean),
        "dw_mean" => Ok(ObsSummary::DwMean),
        "median" => Ok(ObsSummary::Median),
        "perc" => {
            if !(0.0..=100.0).contains(&perc) {
                bail!("obs_perc must be in [0, 100], got {perc}");
            }
            Ok(ObsSummary::Perc(perc))
        }
        other => bail!("unknown observation summary: {other:?}"),
    }
}

/// Parses a set logic name for joint forecast/observation thresholds.
pub fn parse_set_logic(s: &str) -> Result<SetLogic> {
    match s.to_lowercase().as_str() {
        "union" => Ok(SetLogic::Union),
        "intersection" => Ok(SetLogic::Intersection),
        "symdiff" | "symmetric_difference" => Ok(SetLogic::SymDiff),
        other => bail!("unknown set logic: {other:?}"),
    }
}

/// Parses a level type name.
pub fn parse_level_type(s: &str) -> Result<LevelType> {
    match s.to_lowercase().as_str() {
        "none" => Ok(LevelType::None),
        "pres" => Ok(LevelType::Pres),
        "accum" => Ok(LevelType::Accum),
        "vert" => Ok(LevelType::Vert),
        "other" => Ok(LevelType::Other),
        other => bail!("unknown level type: {other:?}"),
    }
}

/// Parses one threshold string such as `>=5` or `NA`.
pub fn parse_thresh(s: &str) -> Result<SingleThresh> {
    s.parse()
        .with_context(|| format!("invalid threshold: {s:?}"))
}

/// Builds a [`FieldInfo`] from a `[fcst]` or `[obs]` section.
pub fn build_field_info(field: &FieldToml) -> Result<FieldInfo> {
    let source = match field.grib_code {
        Some(code) => FieldSource::Grib1 { code },
        None => FieldSource::NetCdf,
    };
    let kind = parse_level_type(&field.level_type)?;
    let mut info = FieldInfo::new(&field.name, source)
        .with_level(Level::new(kind, field.level[0], field.level[1]));

    if field.scale.is_some() || field.offset.is_some() {
        info = info.with_conversion(Conversion::Linear {
            scale: field.scale.unwrap_or(1.0),
            offset: field.offset.unwrap_or(0.0),
        });
    }

    if field.censor_thresh.len() != field.censor_val.len() {
        bail!(
            "censor_thresh and censor_val must have the same length, got {} and {}",
            field.censor_thresh.len(),
            field.censor_val.len()
        );
    }
    if !field.censor_thresh.is_empty() {
        let censor = field
            .censor_thresh
            .iter()
            .zip(&field.censor_val)
            .map(|(t, v)| Ok((parse_thresh(t)?, *v)))
            .collect::<Result<Vec<_>>>()?;
        info = info.with_censor(censor);
    }
    Ok(info)
}

/// Builds a [`PairsConfig`] for forecasts valid at `fcst_ut`.
pub fn build_pairs_config(pairs: &PairsToml, fcst_ut: i64) -> Result<PairsConfig> {
    let summary = parse_obs_summary(&pairs.obs_summary, pairs.obs_perc)?;
    let mut cfg = PairsConfig::new(fcst_ut)
        .with_check_unique(pairs.check_unique)
        .with_obs_summary(summary)
        .with_sids(pairs.sid_include.clone(), pairs.sid_exclude.clone())
        .with_obs_qty(pairs.qty_include.clone(), pairs.qty_exclude.clone());
    if let Some([beg, end]) = pairs.obs_window {
        if beg > end {
            bail!("obs_window start {beg} is after its end {end}");
        }
        cfg = cfg.with_time_window(Some(fcst_ut + beg), Some(fcst_ut + end));
    }
    if let Some(ref sfc) = pairs.sfc_message_types {
        cfg = cfg.with_sfc_msg_types(sfc.clone());
    }
    if !pairs.mpr.is_empty() {
        let filters = pairs
            .mpr
            .iter()
            .map(|m| {
                MprFilter::parse(&m.column, &m.thresh)
                    .with_context(|| format!("invalid mpr filter {:?} {:?}", m.column, m.thresh))
            })
            .collect::<Result<Vec<_>>>()?;
        cfg = cfg.with_mpr_filters(filters);
    }
    Ok(cfg)
}

/// One message-type partition per configured name.
pub fn build_msg_typs(pairs: &PairsToml) -> Result<Vec<MsgTypGroup>> {
    if pairs.message_types.is_empty() {
        bail!("[pairs].message_types must name at least one message type");
    }
    Ok(pairs.message_types.iter().map(MsgTypGroup::new).collect())
}

/// Builds the interpolation partitions.
pub fn build_interps(interps: &[InterpToml]) -> Result<Vec<InterpInfo>> {
    interps
        .iter()
        .map(|t| {
            let method = parse_interp_method(&t.method)?;
            let shape = parse_interp_shape(&t.shape)?;
            if !(0.0..=1.0).contains(&t.vld_thresh) {
                bail!("interp vld_thresh must be in [0, 1], got {}", t.vld_thresh);
            }
            Ok(InterpInfo::new(method, t.width)
                .with_shape(shape)
                .with_vld_thresh(t.vld_thresh))
        })
        .collect()
}

/// Owned mask definition that [`MaskSpec`] partitions borrow from.
#[derive(Debug)]
pub struct MaskDef {
    pub name: String,
    pub sid: Option<MaskSid>,
    pub llpnt: Option<MaskLatLon>,
}

impl MaskDef {
    pub fn spec(&self) -> MaskSpec<'_> {
        let mut spec = MaskSpec::new(&self.name);
        if let Some(ref sid) = self.sid {
            spec = spec.with_sid(sid);
        }
        if let Some(ref llpnt) = self.llpnt {
            spec = spec.with_llpnt(llpnt);
        }
        spec
    }
}

/// Builds the owned mask definitions.
pub fn build_masks(masks: &[MaskToml]) -> Result<Vec<MaskDef>> {
    masks
        .iter()
        .map(|m| {
            let sid = m.sids.as_ref().map(|sids| {
                MaskSid::new(&m.name, sids.iter().map(|s| (s.clone(), 1.0)).collect())
            });
            let llpnt = if m.lat_thresh.is_some() || m.lon_thresh.is_some() {
                let lat = parse_thresh(m.lat_thresh.as_deref().unwrap_or("NA"))?;
                let lon = parse_thresh(m.lon_thresh.as_deref().unwrap_or("NA"))?;
                Some(MaskLatLon::new(&m.name, lat, lon))
            } else {
                None
            };
            Ok(MaskDef {
                name: m.name.clone(),
                sid,
                llpnt,
            })
        })
        .collect()
}

/// Parsed `[cat]` section.
#[derive(Debug)]
pub struct CatThresholds {
    /// Forecast/observation threshold pairs for CTS.
    pub cts: Vec<(SingleThresh, SingleThresh)>,
    pub cnt_fcst: SingleThresh,
    pub cnt_obs: SingleThresh,
    pub logic: SetLogic,
}

/// Parses the `[cat]` thresholds.
pub fn build_cat_thresholds(cat: &CatToml) -> Result<CatThresholds> {
    if cat.fcst_thresh.len() != cat.obs_thresh.len() {
        bail!(
            "fcst_thresh and obs_thresh must have the same length, got {} and {}",
            cat.fcst_thresh.len(),
            cat.obs_thresh.len()
        );
    }
    let cts = cat
        .fcst_thresh
        .iter()
        .zip(&cat.obs_thresh)
        .map(|(f, o)| Ok((parse_thresh(f)?, parse_thresh(o)?)))
        .collect::<Result<Vec<_>>>()?;
    Ok(CatThresholds {
        cts,
        cnt_fcst: parse_thresh(&cat.cnt_fcst_thresh)?,
        cnt_obs: parse_thresh(&cat.cnt_obs_thresh)?,
        logic: parse_set_logic(&cat.logic)?,
    })
}

/// Builds a [`CiConfig`] from the `[ci]` section and validates it.
pub fn build_ci_config(ci: &CiToml) -> Result<CiConfig> {
    let cfg = CiConfig::new()
        .with_alphas(ci.alphas.clone())
        .with_large_sample_threshold(ci.large_sample_threshold)
        .with_n_replicates(if ci.bootstrap { ci.n_replicates } else { 0 })
        .with_replicate_proportion(ci.replicate_proportion)
        .with_seed(ci.seed);
    cfg.validate().context("invalid [ci] section")?;
    Ok(cfg)
}

/// CNT options from the `[ci]` section.
pub fn build_cnt_options(ci: &CiToml) -> CntOptions {
    CntOptions {
        precip: ci.precip,
        rank: ci.rank_corr,
        normal_ci: ci.normal_ci,
    }
}
