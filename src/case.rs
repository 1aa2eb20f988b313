//! JSON case files: the grid, forecast and climatology planes, and the
//! point observations of one verification run.
//!
//! Missing values may be written as `null` or as `-9999`; both become NaN.

use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use tracing::debug;

use verif_pairs::{DataPlane, DataPlaneArray, LatLonGrid, Observation};
use verif_stats::BAD;

/// Missing-value marker accepted in case files.
pub const MISSING: f64 = -9999.0;

fn missing_to_bad(v: Option<f64>) -> f64 {
    match v {
        Some(v) if (v - MISSING).abs() > 1e-6 => v,
        _ => BAD,
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CaseFile {
    /// Forecast valid time (unix seconds).
    pub fcst_time: i64,
    pub grid: GridJson,
    /// Forecast planes, one per level.
    pub fcst: Vec<PlaneJson>,
    #[serde(default)]
    pub fcst_climo_mean: Vec<PlaneJson>,
    #[serde(default)]
    pub fcst_climo_stdev: Vec<PlaneJson>,
    #[serde(default)]
    pub obs_climo_mean: Vec<PlaneJson>,
    #[serde(default)]
    pub obs_climo_stdev: Vec<PlaneJson>,
    pub observations: Vec<ObsJson>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GridJson {
    pub lat_ll: f64,
    pub lon_ll: f64,
    pub delta_lat: f64,
    pub delta_lon: f64,
    pub nx: usize,
    pub ny: usize,
}

/// One data plane in row-major order (`x` fastest) with its level range.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlaneJson {
    #[serde(default)]
    pub lower: f64,
    #[serde(default)]
    pub upper: f64,
    pub data: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ObsJson {
    pub sid: String,
    pub msg_typ: String,
    #[serde(default)]
    pub var_name: String,
    #[serde(default)]
    pub grib_code: Option<u32>,
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub elv: Option<f64>,
    pub vld: i64,
    #[serde(default)]
    pub lvl: Option<f64>,
    #[serde(default)]
    pub hgt: Option<f64>,
    pub value: Option<f64>,
    #[serde(default)]
    pub qc: String,
}

impl From<&ObsJson> for Observation {
    fn from(o: &ObsJson) -> Self {
        Observation {
            sid: o.sid.clone(),
            msg_typ: o.msg_typ.clone(),
            var_name: o.var_name.clone(),
            grib_code: o.grib_code,
            lat: o.lat,
            lon: o.lon,
            elv: missing_to_bad(o.elv),
            vld: o.vld,
            lvl: missing_to_bad(o.lvl),
            hgt: missing_to_bad(o.hgt),
            value: missing_to_bad(o.value),
            qc: o.qc.clone(),
        }
    }
}

/// Reads and parses a case file.
pub fn read_case(path: &Path) -> Result<CaseFile> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read case file: {}", path.display()))?;
    let case: CaseFile = serde_json::from_str(&text)
        .with_context(|| format!("failed to parse case file: {}", path.display()))?;
    debug!(
        n_obs = case.observations.len(),
        n_fcst_planes = case.fcst.len(),
        "case file loaded"
    );
    Ok(case)
}

impl CaseFile {
    pub fn grid(&self) -> Result<LatLonGrid> {
        let g = &self.grid;
        LatLonGrid::new(g.lat_ll, g.lon_ll, g.delta_lat, g.delta_lon, g.nx, g.ny)
            .context("invalid case grid")
    }

    /// Forecast planes. At least one is required.
    pub fn fcst_planes(&self) -> Result<DataPlaneArray> {
        if self.fcst.is_empty() {
            bail!("case file has no forecast planes");
        }
        self.planes(&self.fcst, "fcst")
    }

    /// Optional planes such as climatology; `None` when the case has none.
    pub fn optional_planes(&self, planes: &[PlaneJson], what: &str) -> Result<Option<DataPlaneArray>> {
        if planes.is_empty() {
            return Ok(None);
        }
        self.planes(planes, what).map(Some)
    }

    fn planes(&self, planes: &[PlaneJson], what: &str) -> Result<DataPlaneArray> {
        let (nx, ny) = (self.grid.nx, self.grid.ny);
        let mut dpa = DataPlaneArray::new();
        for (i, p) in planes.iter().enumerate() {
            let data = p.data.iter().map(|v| missing_to_bad(*v)).collect();
            let plane = DataPlane::new(nx, ny, data)
                .with_context(|| format!("{what} plane {i} does not match the {nx}x{ny} grid"))?;
            dpa.add(plane, p.lower, p.upper);
        }
        Ok(dpa)
    }

    pub fn observations(&self) -> Vec<Observation> {
        self.observations.iter().map(Observation::from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use verif_pairs::Grid;
    use verif_stats::is_bad;

    const CASE: &str = r#"{
        "fcst_time": 1700000000,
        "grid": {"lat_ll": 30.0, "lon_ll": -110.0, "delta_lat": 1.0, "delta_lon": 1.0, "nx": 2, "ny": 2},
        "fcst": [{"data": [280.0, 281.0, null, -9999]}],
        "observations": [
            {"sid": "KDEN", "msg_typ": "ADPSFC", "var_name": "TMP", "lat": 30.2, "lon": -109.8,
             "vld": 1700000000, "value": 281.5},
            {"sid": "KBOU", "msg_typ": "ADPSFC", "var_name": "TMP", "lat": 30.5, "lon": -109.5,
             "vld": 1700000000, "value": -9999, "elv": 1650.0}
        ]
    }"#;

    #[test]
    fn test_missing_values_become_bad() {
        let case: CaseFile = serde_json::from_str(CASE).unwrap();
        let fcst = case.fcst_planes().unwrap();
        let data = fcst.plane(0).data();
        assert_eq!(data[1], 281.0);
        assert!(is_bad(data[2]));
        assert!(is_bad(data[3]));

        let obs = case.observations();
        assert_eq!(obs[0].value, 281.5);
        assert!(is_bad(obs[0].elv));
        assert!(is_bad(obs[1].value));
        assert_eq!(obs[1].elv, 1650.0);
    }

    #[test]
    fn test_plane_size_mismatch() {
        let mut case: CaseFile = serde_json::from_str(CASE).unwrap();
        case.fcst[0].data.pop();
        let err = case.fcst_planes().unwrap_err();
        assert!(format!("{err:#}").contains("fcst plane 0"));
        assert!(case.optional_planes(&[], "ocmn").unwrap().is_none());
    }

    #[test]
    fn test_read_case_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("case.json");
        std::fs::write(&path, CASE).unwrap();
        let case = read_case(&path).unwrap();
        assert_eq!(case.fcst_time, 1_700_000_000);
        assert_eq!(case.grid().unwrap().nx(), 2);

        std::fs::write(&path, "{").unwrap();
        assert!(read_case(&path).is_err());
    }
}
