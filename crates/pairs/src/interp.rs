//! Horizontal neighborhood interpolation and vertical level blending.

use std::fmt;

use verif_stats::{BAD, is_bad, median, nint, sorted};

use crate::error::PairsError;
use crate::field::LevelType;
use crate::grid::{DataPlane, DataPlaneArray, SurfaceInfo};

/// Horizontal interpolation method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterpMethod {
    Nearest,
    Min,
    Max,
    Median,
    UwMean,
    DwMean,
    Bilin,
    /// Neighborhood value closest to the observation.
    Best,
}

impl fmt::Display for InterpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InterpMethod::Nearest => "NEAREST",
            InterpMethod::Min => "MIN",
            InterpMethod::Max => "MAX",
            InterpMethod::Median => "MEDIAN",
            InterpMethod::UwMean => "UW_MEAN",
            InterpMethod::DwMean => "DW_MEAN",
            InterpMethod::Bilin => "BILIN",
            InterpMethod::Best => "BEST",
        };
        f.write_str(s)
    }
}

/// Neighborhood shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InterpShape {
    #[default]
    Square,
    Circle,
}

/// One interpolation partition: method, neighborhood and valid-data fraction.
#[derive(Debug, Clone, PartialEq)]
pub struct InterpInfo {
    method: InterpMethod,
    width: usize,
    shape: InterpShape,
    vld_thresh: f64,
}

impl InterpInfo {
    /// Defaults: square shape, valid-data fraction 1.0.
    pub fn new(method: InterpMethod, width: usize) -> Self {
        Self {
            method,
            width,
            shape: InterpShape::Square,
            vld_thresh: 1.0,
        }
    }

    pub fn with_shape(mut self, shape: InterpShape) -> Self {
        self.shape = shape;
        self
    }

    /// Minimum fraction of valid neighborhood points.
    pub fn with_vld_thresh(mut self, vld_thresh: f64) -> Self {
        self.vld_thresh = vld_thresh;
        self
    }

    pub fn method(&self) -> InterpMethod {
        self.method
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn shape(&self) -> InterpShape {
        self.shape
    }

    pub fn vld_thresh(&self) -> f64 {
        self.vld_thresh
    }

    /// Number of neighborhood points.
    pub fn n_points(&self) -> usize {
        offsets(self.shape, self.width).len()
    }

    /// Partition label, e.g. `UW_MEAN_9`.
    pub fn name(&self) -> String {
        match self.method {
            InterpMethod::Nearest | InterpMethod::Bilin => self.method.to_string(),
            _ => format!("{}_{}", self.method, self.n_points()),
        }
    }

    /// Validates the method/width combination and the valid-data fraction.
    pub fn validate(&self) -> Result<(), PairsError> {
        let invalid = |reason: &str| {
            Err(PairsError::InvalidInterp {
                method: self.method.to_string(),
                reason: reason.to_string(),
            })
        };
        if self.width < 1 {
            return invalid("width must be >= 1");
        }
        if self.method == InterpMethod::Nearest && self.width != 1 {
            return invalid("nearest neighbor requires width 1");
        }
        if self.method == InterpMethod::Bilin && self.width != 2 {
            return invalid("bilinear requires width 2");
        }
        if self.shape == InterpShape::Circle && self.width % 2 == 0 {
            return invalid("circular neighborhoods require an odd width");
        }
        if !(0.0..=1.0).contains(&self.vld_thresh) {
            return invalid("valid-data fraction must be in [0, 1]");
        }
        Ok(())
    }
}

/// Offsets of the neighborhood relative to its anchor point.
///
/// Odd squares and circles are centered on the nearest grid point. Even
/// squares are anchored at the lower-left point of the cell containing
/// the location, extending `width/2 - 1` left/down and `width/2` right/up.
fn offsets(shape: InterpShape, width: usize) -> Vec<(i64, i64)> {
    let w = width as i64;
    let (lo, hi) = if w % 2 == 1 {
        (-(w / 2), w / 2)
    } else {
        (-(w / 2 - 1), w / 2)
    };
    let r2 = (width as f64 / 2.0).powi(2);
    let mut out = Vec::with_capacity(width * width);
    for dy in lo..=hi {
        for dx in lo..=hi {
            if shape == InterpShape::Circle && (dx * dx + dy * dy) as f64 > r2 {
                continue;
            }
            out.push((dx, dy));
        }
    }
    out
}

fn anchor(x: f64, y: f64, width: usize) -> (i64, i64) {
    if width % 2 == 1 {
        (nint(x), nint(y))
    } else {
        (x.floor() as i64, y.floor() as i64)
    }
}

/// Valid neighborhood values with their grid coordinates.
struct Neighborhood {
    points: Vec<(i64, i64, f64)>,
    n_total: usize,
}

impl Neighborhood {
    fn collect(
        dp: &DataPlane,
        x: f64,
        y: f64,
        info: &InterpInfo,
        wrap: bool,
        keep: impl Fn(i64, i64) -> bool,
    ) -> Self {
        let (ax, ay) = anchor(x, y, info.width());
        let offs = offsets(info.shape(), info.width());
        let n_total = offs.len();
        let points = offs
            .into_iter()
            .map(|(dx, dy)| (ax + dx, ay + dy))
            .filter(|&(px, py)| keep(px, py))
            .map(|(px, py)| (px, py, dp.get_wrapped(px, py, wrap)))
            .filter(|&(_, _, v)| !is_bad(v))
            .collect();
        Self { points, n_total }
    }

    fn enough_valid(&self, vld_thresh: f64) -> bool {
        !self.points.is_empty()
            && self.points.len() as f64 / self.n_total as f64 >= vld_thresh
    }

    fn reduce(&self, method: InterpMethod, x: f64, y: f64, obs_v: f64) -> f64 {
        let values = || self.points.iter().map(|p| p.2);
        match method {
            InterpMethod::Nearest => self
                .points
                .iter()
                .min_by(|a, b| dist2(a, x, y).total_cmp(&dist2(b, x, y)))
                .map_or(BAD, |p| p.2),
            InterpMethod::Min => values().fold(f64::INFINITY, f64::min),
            InterpMethod::Max => values().fold(f64::NEG_INFINITY, f64::max),
            InterpMethod::Median => median(&sorted(&values().collect::<Vec<_>>())),
            InterpMethod::UwMean => values().sum::<f64>() / self.points.len() as f64,
            InterpMethod::DwMean => {
                let mut sum_w = 0.0;
                let mut sum_wv = 0.0;
                for p in &self.points {
                    let d2 = dist2(p, x, y);
                    if d2 == 0.0 {
                        return p.2;
                    }
                    sum_w += 1.0 / d2;
                    sum_wv += p.2 / d2;
                }
                sum_wv / sum_w
            }
            InterpMethod::Bilin => bilinear(&self.points, x, y),
            InterpMethod::Best => {
                if is_bad(obs_v) {
                    return BAD;
                }
                self.points
                    .iter()
                    .min_by(|a, b| (a.2 - obs_v).abs().total_cmp(&(b.2 - obs_v).abs()))
                    .map_or(BAD, |p| p.2)
            }
        }
    }
}

fn dist2(p: &(i64, i64, f64), x: f64, y: f64) -> f64 {
    (p.0 as f64 - x).powi(2) + (p.1 as f64 - y).powi(2)
}

/// Bilinear interpolation; all four corners must be present.
fn bilinear(points: &[(i64, i64, f64)], x: f64, y: f64) -> f64 {
    let x0 = x.floor() as i64;
    let y0 = y.floor() as i64;
    let at = |px: i64, py: i64| {
        points
            .iter()
            .find(|p| p.0 == px && p.1 == py)
            .map(|p| p.2)
    };
    let (Some(v00), Some(v10), Some(v01), Some(v11)) = (
        at(x0, y0),
        at(x0 + 1, y0),
        at(x0, y0 + 1),
        at(x0 + 1, y0 + 1),
    ) else {
        return BAD;
    };
    let dx = x - x0 as f64;
    let dy = y - y0 as f64;
    v00 * (1.0 - dx) * (1.0 - dy) + v10 * dx * (1.0 - dy) + v01 * (1.0 - dx) * dy + v11 * dx * dy
}

/// Interpolates `dp` at fractional grid location `(x, y)`.
///
/// `obs_v` is only used by [`InterpMethod::Best`]. Returns NaN when too
/// few neighborhood points hold valid data.
pub fn compute_horz_interp(
    dp: &DataPlane,
    x: f64,
    y: f64,
    obs_v: f64,
    info: &InterpInfo,
    wrap: bool,
) -> f64 {
    let nbr = Neighborhood::collect(dp, x, y, info, wrap, |_, _| true);
    if !nbr.enough_valid(info.vld_thresh()) {
        return BAD;
    }
    nbr.reduce(info.method(), x, y, obs_v)
}

/// Surface-aware interpolation.
///
/// Neighborhood points are restricted to the observation's land/water
/// class when a land mask is present, and to points whose
/// `topo - obs_elv` passes the interpolation threshold when topography is
/// present.
#[allow(clippy::too_many_arguments)]
pub fn compute_sfc_interp(
    dp: &DataPlane,
    x: f64,
    y: f64,
    obs_elv: f64,
    obs_v: f64,
    info: &InterpInfo,
    wrap: bool,
    sfc: &SurfaceInfo,
    is_land_obs: bool,
) -> f64 {
    let keep = |px: i64, py: i64| {
        let land_ok = sfc
            .land
            .as_ref()
            .is_none_or(|m| m.s_is_on(px, py) == is_land_obs);
        let topo_ok = sfc.topo.as_ref().is_none_or(|t| {
            sfc.topo_interp_thresh
                .check(t.get_wrapped(px, py, wrap) - obs_elv)
        });
        land_ok && topo_ok
    };
    let nbr = Neighborhood::collect(dp, x, y, info, wrap, keep);
    if !nbr.enough_valid(info.vld_thresh()) {
        return BAD;
    }
    nbr.reduce(info.method(), x, y, obs_v)
}

/// Finds the levels bracketing `obs_lvl` in `dpa`.
///
/// The level "below" is the closest with `lower(i) >= obs_lvl`, the level
/// "above" the closest with `lower(i) <= obs_lvl`. When only one side
/// exists (the observation is outside the range) both indices point at it.
/// Returns `Ok(None)` for an empty array.
pub fn find_vert_lvl(
    dpa: &DataPlaneArray,
    obs_lvl: f64,
) -> Result<Option<(usize, usize)>, PairsError> {
    if dpa.is_empty() {
        return Ok(None);
    }

    let mut blw: Option<(usize, f64)> = None;
    let mut abv: Option<(usize, f64)> = None;
    for i in 0..dpa.n_planes() {
        let dist = obs_lvl - dpa.lower(i);
        if dist <= 0.0 && blw.is_none_or(|(_, d)| dist.abs() < d) {
            blw = Some((i, dist.abs()));
        }
        if dist >= 0.0 && abv.is_none_or(|(_, d)| dist.abs() < d) {
            abv = Some((i, dist.abs()));
        }
    }

    match (blw, abv) {
        (Some((b, _)), Some((a, _))) => Ok(Some((b, a))),
        (Some((b, _)), None) => Ok(Some((b, b))),
        (None, Some((a, _))) => Ok(Some((a, a))),
        (None, None) => Err(PairsError::NoVerticalLevel {
            obs_lvl,
            n_levels: dpa.n_planes(),
        }),
    }
}

/// Linear interpolation in log pressure between `(v1, p1)` and `(v2, p2)`.
pub fn compute_vert_pinterp(v1: f64, p1: f64, v2: f64, p2: f64, to_p: f64) -> f64 {
    if p1 <= 0.0 || p2 <= 0.0 || to_p <= 0.0 || p1 == p2 {
        return BAD;
    }
    let w1 = (p2 / to_p).ln() / (p2 / p1).ln();
    w1 * v1 + (1.0 - w1) * v2
}

/// Linear interpolation in height between `(v1, z1)` and `(v2, z2)`.
pub fn compute_vert_zinterp(v1: f64, z1: f64, v2: f64, z2: f64, to_z: f64) -> f64 {
    if z1 == z2 {
        return BAD;
    }
    let w1 = (z2 - to_z) / (z2 - z1);
    w1 * v1 + (1.0 - w1) * v2
}

/// Vertical blending inputs for [`compute_interp`].
#[derive(Debug, Clone, Copy)]
pub struct VertInterp {
    /// Level type of the field being interpolated.
    pub lvl_type: LevelType,
    /// Interpolate `ln(v)` (specific humidity).
    pub spfh: bool,
    /// Observation pressure or height.
    pub to_lvl: f64,
    pub i_blw: usize,
    pub i_abv: usize,
}

/// Horizontal interpolation at the bracketing levels, blended vertically.
///
/// Pressure levels blend linearly in log pressure, specific humidity
/// blends `ln(q)` in log pressure, and all other level types blend
/// linearly in height. A bad value at either level gives NaN.
pub fn compute_interp(
    dpa: &DataPlaneArray,
    x: f64,
    y: f64,
    obs_v: f64,
    info: &InterpInfo,
    wrap: bool,
    vert: &VertInterp,
) -> f64 {
    if dpa.is_empty() {
        return BAD;
    }
    let v_blw = compute_horz_interp(dpa.plane(vert.i_blw), x, y, obs_v, info, wrap);
    if vert.i_blw == vert.i_abv {
        return v_blw;
    }
    let v_abv = compute_horz_interp(dpa.plane(vert.i_abv), x, y, obs_v, info, wrap);
    if is_bad(v_blw) || is_bad(v_abv) {
        return BAD;
    }

    let l_blw = dpa.lower(vert.i_blw);
    let l_abv = dpa.lower(vert.i_abv);
    if vert.spfh {
        if v_blw <= 0.0 || v_abv <= 0.0 {
            return BAD;
        }
        compute_vert_pinterp(v_blw.ln(), l_blw, v_abv.ln(), l_abv, vert.to_lvl).exp()
    } else if vert.lvl_type == LevelType::Pres {
        compute_vert_pinterp(v_blw, l_blw, v_abv, l_abv, vert.to_lvl)
    } else {
        compute_vert_zinterp(v_blw, l_blw, v_abv, l_abv, vert.to_lvl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn ramp(nx: usize, ny: usize) -> DataPlane {
        // v = x + 10 y
        let data = (0..ny)
            .flat_map(|y| (0..nx).map(move |x| x as f64 + 10.0 * y as f64))
            .collect();
        DataPlane::new(nx, ny, data).unwrap()
    }

    #[test]
    fn offsets_square_and_circle() {
        assert_eq!(offsets(InterpShape::Square, 1), vec![(0, 0)]);
        assert_eq!(offsets(InterpShape::Square, 3).len(), 9);
        assert_eq!(offsets(InterpShape::Square, 2), vec![(0, 0), (1, 0), (0, 1), (1, 1)]);
        // A radius 1.5 circle still covers the 3x3 square; radius 2.5 drops corners.
        assert_eq!(offsets(InterpShape::Circle, 3).len(), 9);
        assert_eq!(offsets(InterpShape::Circle, 5).len(), 21);
    }

    #[test]
    fn nearest_and_bilinear() {
        let dp = ramp(5, 5);
        let nearest = InterpInfo::new(InterpMethod::Nearest, 1);
        assert_eq!(compute_horz_interp(&dp, 1.6, 2.4, f64::NAN, &nearest, false), 22.0);
        let bilin = InterpInfo::new(InterpMethod::Bilin, 2);
        assert_relative_eq!(
            compute_horz_interp(&dp, 1.5, 2.25, f64::NAN, &bilin, false),
            24.0,
            epsilon = 1e-12
        );
    }

    #[test]
    fn neighborhood_reductions() {
        let dp = ramp(5, 5);
        let at = |m: InterpMethod| {
            compute_horz_interp(&dp, 2.0, 2.0, 13.2, &InterpInfo::new(m, 3), false)
        };
        assert_eq!(at(InterpMethod::Min), 11.0);
        assert_eq!(at(InterpMethod::Max), 33.0);
        assert_eq!(at(InterpMethod::Median), 22.0);
        assert_relative_eq!(at(InterpMethod::UwMean), 22.0);
        // Exactly on a grid point, the distance-weighted mean returns it.
        assert_eq!(at(InterpMethod::DwMean), 22.0);
        assert_eq!(at(InterpMethod::Best), 13.0);
    }

    #[test]
    fn valid_fraction_threshold() {
        let mut data = vec![1.0; 9];
        data[0] = f64::NAN;
        let dp = DataPlane::new(3, 3, data).unwrap();
        let strict = InterpInfo::new(InterpMethod::UwMean, 3);
        assert!(compute_horz_interp(&dp, 1.0, 1.0, f64::NAN, &strict, false).is_nan());
        let loose = strict.with_vld_thresh(0.5);
        assert_eq!(compute_horz_interp(&dp, 1.0, 1.0, f64::NAN, &loose, false), 1.0);
    }

    #[test]
    fn interp_info_validation_and_name() {
        assert!(InterpInfo::new(InterpMethod::Bilin, 3).validate().is_err());
        assert!(InterpInfo::new(InterpMethod::Nearest, 3).validate().is_err());
        assert!(
            InterpInfo::new(InterpMethod::UwMean, 3)
                .with_vld_thresh(1.5)
                .validate()
                .is_err()
        );
        let info = InterpInfo::new(InterpMethod::UwMean, 3);
        assert!(info.validate().is_ok());
        assert_eq!(info.name(), "UW_MEAN_9");
        assert_eq!(InterpInfo::new(InterpMethod::Nearest, 1).name(), "NEAREST");
    }

    fn levels(lvls: &[f64]) -> DataPlaneArray {
        let mut dpa = DataPlaneArray::new();
        for &l in lvls {
            dpa.add(DataPlane::constant(2, 2, l), l, l);
        }
        dpa
    }

    #[test]
    fn find_vert_lvl_brackets() {
        let dpa = levels(&[1000.0, 850.0, 700.0, 500.0]);
        assert_eq!(find_vert_lvl(&dpa, 800.0).unwrap(), Some((1, 2)));
        assert_eq!(find_vert_lvl(&dpa, 850.0).unwrap(), Some((1, 1)));
    }

    #[test]
    fn find_vert_lvl_outside_range_uses_nearest() {
        let dpa = levels(&[1000.0, 850.0, 700.0]);
        // Observation level above all forecast levels.
        assert_eq!(find_vert_lvl(&dpa, 1050.0).unwrap(), Some((0, 0)));
        // And below all of them.
        assert_eq!(find_vert_lvl(&dpa, 600.0).unwrap(), Some((2, 2)));
    }

    #[test]
    fn find_vert_lvl_empty_and_bad() {
        assert_eq!(find_vert_lvl(&DataPlaneArray::new(), 500.0).unwrap(), None);
        assert!(matches!(
            find_vert_lvl(&levels(&[1000.0]), f64::NAN),
            Err(PairsError::NoVerticalLevel { n_levels: 1, .. })
        ));
    }

    #[test]
    fn vertical_blending() {
        let dpa = levels(&[1000.0, 500.0]);
        let info = InterpInfo::new(InterpMethod::Nearest, 1);
        let vert = VertInterp {
            lvl_type: LevelType::Pres,
            spfh: false,
            to_lvl: (1000.0_f64 * 500.0).sqrt(),
            i_blw: 0,
            i_abv: 1,
        };
        // Geometric mean pressure is halfway in log pressure.
        assert_relative_eq!(
            compute_interp(&dpa, 0.0, 0.0, f64::NAN, &info, false, &vert),
            750.0,
            epsilon = 1e-9
        );

        let zvert = VertInterp {
            lvl_type: LevelType::Vert,
            to_lvl: 625.0,
            ..vert
        };
        assert_relative_eq!(
            compute_interp(&dpa, 0.0, 0.0, f64::NAN, &info, false, &zvert),
            625.0,
            epsilon = 1e-9
        );
    }

    #[test]
    fn specific_humidity_blends_logs() {
        let mut dpa = DataPlaneArray::new();
        dpa.add(DataPlane::constant(1, 1, 0.01), 1000.0, 1000.0);
        dpa.add(DataPlane::constant(1, 1, 0.0025), 500.0, 500.0);
        let vert = VertInterp {
            lvl_type: LevelType::Pres,
            spfh: true,
            to_lvl: (1000.0_f64 * 500.0).sqrt(),
            i_blw: 0,
            i_abv: 1,
        };
        let info = InterpInfo::new(InterpMethod::Nearest, 1);
        // Halfway in log space: sqrt(0.01 * 0.0025) = 0.005.
        assert_relative_eq!(
            compute_interp(&dpa, 0.0, 0.0, f64::NAN, &info, false, &vert),
            0.005,
            epsilon = 1e-12
        );
    }

    #[test]
    fn surface_interp_filters_by_land() {
        let dp = ramp(3, 3);
        let land = crate::grid::MaskPlane::new(
            3,
            3,
            vec![true, true, true, false, false, false, false, false, false],
        )
        .unwrap();
        let sfc = SurfaceInfo {
            land: Some(land),
            ..SurfaceInfo::default()
        };
        let info = InterpInfo::new(InterpMethod::UwMean, 3).with_vld_thresh(0.0);
        // Only the bottom row (land) is averaged for a land observation.
        let v = compute_sfc_interp(&dp, 1.0, 1.0, 0.0, f64::NAN, &info, false, &sfc, true);
        assert_relative_eq!(v, 1.0);
        let w = compute_sfc_interp(&dp, 1.0, 1.0, 0.0, f64::NAN, &info, false, &sfc, false);
        assert_relative_eq!(w, 16.0);
    }
}
