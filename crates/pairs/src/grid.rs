//! Grids, data planes, vertical plane arrays and masks.

use verif_stats::BAD;

use crate::error::PairsError;
use crate::thresh::SingleThresh;

/// Coordinate transform and dimensions of a 2-D grid.
pub trait Grid {
    fn nx(&self) -> usize;
    fn ny(&self) -> usize;

    /// Fractional grid coordinates of a lat/lon point.
    fn latlon_to_xy(&self, lat: f64, lon: f64) -> (f64, f64);

    /// Returns `true` if the grid wraps around in longitude.
    fn wrap_lon(&self) -> bool;
}

/// Regular latitude/longitude grid, with longitude increasing eastward.
#[derive(Debug, Clone, PartialEq)]
pub struct LatLonGrid {
    lat_ll: f64,
    lon_ll: f64,
    delta_lat: f64,
    delta_lon: f64,
    nx: usize,
    ny: usize,
}

impl LatLonGrid {
    /// Grid with lower-left corner `(lat_ll, lon_ll)` and the given spacing.
    pub fn new(
        lat_ll: f64,
        lon_ll: f64,
        delta_lat: f64,
        delta_lon: f64,
        nx: usize,
        ny: usize,
    ) -> Result<Self, PairsError> {
        if nx == 0 {
            return Err(PairsError::EmptyDimension { axis: "nx" });
        }
        if ny == 0 {
            return Err(PairsError::EmptyDimension { axis: "ny" });
        }
        Ok(Self {
            lat_ll,
            lon_ll,
            delta_lat,
            delta_lon,
            nx,
            ny,
        })
    }
}

impl Grid for LatLonGrid {
    fn nx(&self) -> usize {
        self.nx
    }

    fn ny(&self) -> usize {
        self.ny
    }

    fn latlon_to_xy(&self, lat: f64, lon: f64) -> (f64, f64) {
        let dlon = (lon - self.lon_ll).rem_euclid(360.0);
        (dlon / self.delta_lon, (lat - self.lat_ll) / self.delta_lat)
    }

    fn wrap_lon(&self) -> bool {
        self.nx as f64 * self.delta_lon.abs() >= 360.0 - 1e-6
    }
}

/// 2-D field of values on a grid, stored row-major (`y * nx + x`).
#[derive(Debug, Clone, PartialEq)]
pub struct DataPlane {
    nx: usize,
    ny: usize,
    data: Vec<f64>,
}

impl DataPlane {
    pub fn new(nx: usize, ny: usize, data: Vec<f64>) -> Result<Self, PairsError> {
        if data.len() != nx * ny {
            return Err(PairsError::LengthMismatch {
                context: "DataPlane::new",
                expected: nx * ny,
                got: data.len(),
            });
        }
        Ok(Self { nx, ny, data })
    }

    /// Plane filled with a constant.
    pub fn constant(nx: usize, ny: usize, v: f64) -> Self {
        Self {
            nx,
            ny,
            data: vec![v; nx * ny],
        }
    }

    pub fn nx(&self) -> usize {
        self.nx
    }

    pub fn ny(&self) -> usize {
        self.ny
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f64] {
        &mut self.data
    }

    /// Returns `true` if `other` has the same dimensions.
    pub fn same_shape(&self, other: &DataPlane) -> bool {
        self.nx == other.nx && self.ny == other.ny
    }

    /// Value at integer coordinates, or NaN off the grid.
    pub fn get(&self, x: i64, y: i64) -> f64 {
        if x < 0 || y < 0 || x as usize >= self.nx || y as usize >= self.ny {
            return BAD;
        }
        self.data[y as usize * self.nx + x as usize]
    }

    /// Like [`get`](Self::get), wrapping `x` around when `wrap` is set.
    pub fn get_wrapped(&self, x: i64, y: i64, wrap: bool) -> f64 {
        let x = if wrap {
            x.rem_euclid(self.nx as i64)
        } else {
            x
        };
        self.get(x, y)
    }
}

/// Planes at successive vertical levels.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataPlaneArray {
    planes: Vec<DataPlane>,
    lower: Vec<f64>,
    upper: Vec<f64>,
}

impl DataPlaneArray {
    pub fn new() -> Self {
        Self::default()
    }

    /// Single plane with no level information.
    pub fn single(plane: DataPlane) -> Self {
        let mut dpa = Self::new();
        dpa.add(plane, BAD, BAD);
        dpa
    }

    pub fn add(&mut self, plane: DataPlane, lower: f64, upper: f64) {
        self.planes.push(plane);
        self.lower.push(lower);
        self.upper.push(upper);
    }

    pub fn n_planes(&self) -> usize {
        self.planes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.planes.is_empty()
    }

    pub fn plane(&self, i: usize) -> &DataPlane {
        &self.planes[i]
    }

    pub fn lower(&self, i: usize) -> f64 {
        self.lower[i]
    }

    pub fn upper(&self, i: usize) -> f64 {
        self.upper[i]
    }
}

/// Boolean area mask on the grid.
#[derive(Debug, Clone, PartialEq)]
pub struct MaskPlane {
    nx: usize,
    ny: usize,
    data: Vec<bool>,
}

impl MaskPlane {
    pub fn new(nx: usize, ny: usize, data: Vec<bool>) -> Result<Self, PairsError> {
        if data.len() != nx * ny {
            return Err(PairsError::LengthMismatch {
                context: "MaskPlane::new",
                expected: nx * ny,
                got: data.len(),
            });
        }
        Ok(Self { nx, ny, data })
    }

    /// Mask with every cell on.
    pub fn full(nx: usize, ny: usize) -> Self {
        Self {
            nx,
            ny,
            data: vec![true; nx * ny],
        }
    }

    /// Returns `true` if the cell is inside the mask. Off-grid cells are not.
    pub fn s_is_on(&self, x: i64, y: i64) -> bool {
        if x < 0 || y < 0 || x as usize >= self.nx || y as usize >= self.ny {
            return false;
        }
        self.data[y as usize * self.nx + x as usize]
    }

    pub fn data(&self) -> &[bool] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [bool] {
        &mut self.data
    }
}

/// Station-ID list mask with per-station weights.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MaskSid {
    name: String,
    entries: Vec<(String, f64)>,
}

impl MaskSid {
    pub fn new(name: impl Into<String>, entries: Vec<(String, f64)>) -> Self {
        Self {
            name: name.into(),
            entries,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Weight of `sid` if it is in the list.
    pub fn has(&self, sid: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|(s, _)| s == sid)
            .map(|(_, w)| *w)
    }
}

/// Lat/lon threshold mask, e.g. `lat >= 30 && lon < -90`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MaskLatLon {
    name: String,
    lat_thresh: SingleThresh,
    lon_thresh: SingleThresh,
}

impl MaskLatLon {
    pub fn new(name: impl Into<String>, lat_thresh: SingleThresh, lon_thresh: SingleThresh) -> Self {
        Self {
            name: name.into(),
            lat_thresh,
            lon_thresh,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn check(&self, lat: f64, lon: f64) -> bool {
        self.lat_thresh.check(lat) && self.lon_thresh.check(lon)
    }
}

/// Land/sea and topography information for surface verification.
#[derive(Debug, Clone, Default)]
pub struct SurfaceInfo {
    /// Land mask: `true` over land.
    pub land: Option<MaskPlane>,
    /// Model terrain height.
    pub topo: Option<DataPlane>,
    /// Test on `model topo - station elevation` for accepting an observation.
    pub topo_use_obs_thresh: SingleThresh,
    /// Test on `model topo - station elevation` for each neighborhood point.
    pub topo_interp_thresh: SingleThresh,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latlon_grid_transform() {
        let g = LatLonGrid::new(10.0, 20.0, 0.5, 0.5, 10, 10).unwrap();
        let (x, y) = g.latlon_to_xy(11.0, 21.5);
        assert!((x - 3.0).abs() < 1e-12);
        assert!((y - 2.0).abs() < 1e-12);
        assert!(!g.wrap_lon());
    }

    #[test]
    fn global_grid_wraps() {
        let g = LatLonGrid::new(-90.0, 0.0, 1.0, 1.0, 360, 181).unwrap();
        assert!(g.wrap_lon());
        let (x, _) = g.latlon_to_xy(0.0, -1.0);
        assert!((x - 359.0).abs() < 1e-9);
    }

    #[test]
    fn empty_grid_rejected() {
        assert!(matches!(
            LatLonGrid::new(0.0, 0.0, 1.0, 1.0, 0, 5),
            Err(PairsError::EmptyDimension { axis: "nx" })
        ));
    }

    #[test]
    fn data_plane_get_and_wrap() {
        let dp = DataPlane::new(3, 2, vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        assert_eq!(dp.get(2, 1), 5.0);
        assert!(dp.get(3, 0).is_nan());
        assert!(dp.get(-1, 0).is_nan());
        assert_eq!(dp.get_wrapped(3, 0, true), 0.0);
        assert_eq!(dp.get_wrapped(-1, 1, true), 5.0);
    }

    #[test]
    fn data_plane_length_checked() {
        assert!(matches!(
            DataPlane::new(2, 2, vec![0.0; 3]),
            Err(PairsError::LengthMismatch { expected: 4, got: 3, .. })
        ));
    }

    #[test]
    fn masks() {
        let m = MaskPlane::new(2, 1, vec![true, false]).unwrap();
        assert!(m.s_is_on(0, 0));
        assert!(!m.s_is_on(1, 0));
        assert!(!m.s_is_on(5, 0));

        let sid = MaskSid::new("stations", vec![("KDEN".to_string(), 2.0)]);
        assert_eq!(sid.has("KDEN"), Some(2.0));
        assert_eq!(sid.has("KBOS"), None);

        let ll = MaskLatLon::new("north", ">=30".parse().unwrap(), SingleThresh::na());
        assert!(ll.check(35.0, -100.0));
        assert!(!ll.check(25.0, -100.0));
    }
}
