//! Field descriptors: variable identity, level, unit conversion and censoring.

use verif_stats::is_bad;

use crate::thresh::SingleThresh;

/// Vertical level type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LevelType {
    /// No level information.
    #[default]
    None,
    /// Pressure level (hPa).
    Pres,
    /// Accumulation interval (seconds).
    Accum,
    /// Height above ground (m).
    Vert,
    /// Any other coordinate.
    Other,
}

/// Level type plus the requested range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Level {
    kind: LevelType,
    lower: f64,
    upper: f64,
}

impl Default for Level {
    fn default() -> Self {
        Self::new(LevelType::None, 0.0, 0.0)
    }
}

impl Level {
    /// Creates a level range. The bounds are stored in ascending order.
    pub fn new(kind: LevelType, lower: f64, upper: f64) -> Self {
        Self {
            kind,
            lower: lower.min(upper),
            upper: lower.max(upper),
        }
    }

    pub fn kind(&self) -> LevelType {
        self.kind
    }

    pub fn lower(&self) -> f64 {
        self.lower
    }

    pub fn upper(&self) -> f64 {
        self.upper
    }

    /// Returns `true` if `v` lies within `[lower, upper]`. Bad values never do.
    pub fn contains(&self, v: f64) -> bool {
        v >= self.lower && v <= self.upper
    }
}

/// Unit conversion applied to raw values.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Conversion {
    #[default]
    None,
    /// `v * scale + offset`.
    Linear { scale: f64, offset: f64 },
}

impl Conversion {
    pub fn apply(&self, v: f64) -> f64 {
        match self {
            Conversion::None => v,
            Conversion::Linear { scale, offset } => v * scale + offset,
        }
    }
}

/// Where a field comes from, which decides how it is identified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldSource {
    /// GRIB1 parameter table entry.
    Grib1 { code: u32 },
    /// GRIB2 product identified by discipline, category and parameter number.
    Grib2 {
        discipline: u8,
        category: u8,
        number: u8,
    },
    /// NetCDF variable, identified by name only.
    NetCdf,
}

/// Operations the pairing engine needs from a field description.
pub trait FieldDescriptor {
    /// Variable name (may be empty).
    fn name(&self) -> &str;

    /// Numeric GRIB code, if the field has one.
    fn grib_code(&self) -> Option<u32>;

    /// Level type and range.
    fn level(&self) -> &Level;

    /// Applies the unit conversion.
    fn convert(&self, v: f64) -> f64;

    /// `(threshold, replacement)` rules; the first match wins.
    fn censor_rules(&self) -> &[(SingleThresh, f64)];

    fn is_prob(&self) -> bool;
    fn is_u_wind(&self) -> bool;
    fn is_v_wind(&self) -> bool;
    fn is_specific_humidity(&self) -> bool;
    fn is_precipitation(&self) -> bool;

    /// Converts `v`, then replaces it by the first matching censor rule.
    fn process_obs(&self, v: f64) -> f64 {
        if is_bad(v) {
            return v;
        }
        let v = self.convert(v);
        self.censor_rules()
            .iter()
            .find(|(t, _)| t.check(v))
            .map_or(v, |&(_, replacement)| replacement)
    }
}

/// Concrete field description.
///
/// # Example
///
/// ```
/// use verif_pairs::{FieldDescriptor, FieldInfo, FieldSource, SingleThresh};
///
/// let info = FieldInfo::new("TMP", FieldSource::Grib1 { code: 11 })
///     .with_censor(vec![("<0".parse::<SingleThresh>().unwrap(), 0.0)]);
/// assert_eq!(info.process_obs(-3.0), 0.0);
/// assert_eq!(info.process_obs(3.0), 3.0);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct FieldInfo {
    name: String,
    source: FieldSource,
    level: Level,
    conversion: Conversion,
    censor: Vec<(SingleThresh, f64)>,
    prob: bool,
}

impl FieldInfo {
    pub fn new(name: impl Into<String>, source: FieldSource) -> Self {
        Self {
            name: name.into(),
            source,
            level: Level::default(),
            conversion: Conversion::None,
            censor: Vec::new(),
            prob: false,
        }
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn with_conversion(mut self, conversion: Conversion) -> Self {
        self.conversion = conversion;
        self
    }

    pub fn with_censor(mut self, censor: Vec<(SingleThresh, f64)>) -> Self {
        self.censor = censor;
        self
    }

    /// Marks the field as a probability forecast.
    pub fn with_prob(mut self, prob: bool) -> Self {
        self.prob = prob;
        self
    }

    pub fn source(&self) -> &FieldSource {
        &self.source
    }

    fn name_is(&self, names: &[&str]) -> bool {
        names.iter().any(|n| self.name.eq_ignore_ascii_case(n))
    }

    fn code_is(&self, codes: &[u32]) -> bool {
        self.grib_code().is_some_and(|c| codes.contains(&c))
    }

    fn grib2_is(&self, products: &[(u8, u8, u8)]) -> bool {
        match self.source {
            FieldSource::Grib2 {
                discipline,
                category,
                number,
            } => products.contains(&(discipline, category, number)),
            _ => false,
        }
    }
}

impl FieldDescriptor for FieldInfo {
    fn name(&self) -> &str {
        &self.name
    }

    fn grib_code(&self) -> Option<u32> {
        match self.source {
            FieldSource::Grib1 { code } => Some(code),
            FieldSource::Grib2 { .. } | FieldSource::NetCdf => None,
        }
    }

    fn level(&self) -> &Level {
        &self.level
    }

    fn convert(&self, v: f64) -> f64 {
        self.conversion.apply(v)
    }

    fn censor_rules(&self) -> &[(SingleThresh, f64)] {
        &self.censor
    }

    fn is_prob(&self) -> bool {
        self.prob
    }

    fn is_u_wind(&self) -> bool {
        self.name_is(&["UGRD", "U", "U10"]) || self.code_is(&[33]) || self.grib2_is(&[(0, 2, 2)])
    }

    fn is_v_wind(&self) -> bool {
        self.name_is(&["VGRD", "V", "V10"]) || self.code_is(&[34]) || self.grib2_is(&[(0, 2, 3)])
    }

    fn is_specific_humidity(&self) -> bool {
        self.name_is(&["SPFH", "Q"]) || self.code_is(&[51]) || self.grib2_is(&[(0, 1, 0)])
    }

    fn is_precipitation(&self) -> bool {
        self.name_is(&["APCP", "PRATE", "NCPCP", "ACPCP", "TP"])
            || self.code_is(&[59, 61, 62, 63])
            || self.grib2_is(&[(0, 1, 7), (0, 1, 8), (0, 1, 9), (0, 1, 10)])
    }
}
