//! Thresholds, threshold arrays and joint forecast/observation logic.

use std::fmt;
use std::str::FromStr;

use verif_stats::{is_bad, normal_cdf_inv};

use crate::climo::ClimoPntInfo;
use crate::error::PairsError;

/// Comparison operator of a [`SingleThresh`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThreshOp {
    /// No threshold; every value passes.
    #[default]
    Na,
    Lt,
    Le,
    Eq,
    Ne,
    Ge,
    Gt,
}

impl ThreshOp {
    /// Symbolic form used when formatting thresholds.
    pub fn symbol(&self) -> &'static str {
        match self {
            ThreshOp::Na => "NA",
            ThreshOp::Lt => "<",
            ThreshOp::Le => "<=",
            ThreshOp::Eq => "==",
            ThreshOp::Ne => "!=",
            ThreshOp::Ge => ">=",
            ThreshOp::Gt => ">",
        }
    }

    fn apply(self, v: f64, t: f64) -> bool {
        match self {
            ThreshOp::Na => true,
            ThreshOp::Lt => v < t,
            ThreshOp::Le => v <= t,
            ThreshOp::Eq => v == t,
            ThreshOp::Ne => v != t,
            ThreshOp::Ge => v >= t,
            ThreshOp::Gt => v > t,
        }
    }
}

/// Threshold value: absolute, or a percentile of a climatological distribution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ThreshValue {
    /// Fixed value.
    Absolute(f64),
    /// Percentile of the forecast climatology distribution (`FCDP`).
    FcstClimoDist(f64),
    /// Percentile of the observation climatology distribution (`OCDP` or `CDP`).
    ObsClimoDist(f64),
}

/// A single threshold, e.g. `>=5.0` or `<OCDP25`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SingleThresh {
    op: ThreshOp,
    value: ThreshValue,
}

impl Default for SingleThresh {
    fn default() -> Self {
        Self::na()
    }
}

impl SingleThresh {
    /// Absolute threshold.
    pub fn new(op: ThreshOp, value: f64) -> Self {
        Self {
            op,
            value: ThreshValue::Absolute(value),
        }
    }

    /// Threshold on an arbitrary [`ThreshValue`].
    pub fn with_value(op: ThreshOp, value: ThreshValue) -> Self {
        Self { op, value }
    }

    /// The always-true threshold.
    pub fn na() -> Self {
        Self {
            op: ThreshOp::Na,
            value: ThreshValue::Absolute(f64::NAN),
        }
    }

    pub fn op(&self) -> ThreshOp {
        self.op
    }

    pub fn value(&self) -> ThreshValue {
        self.value
    }

    pub fn is_na(&self) -> bool {
        self.op == ThreshOp::Na
    }

    /// Returns `true` for climatological-distribution percentile thresholds.
    pub fn is_climo_dist(&self) -> bool {
        matches!(
            self.value,
            ThreshValue::FcstClimoDist(_) | ThreshValue::ObsClimoDist(_)
        )
    }

    /// Percentile of a climatological-distribution threshold.
    pub fn percentile(&self) -> Option<f64> {
        match self.value {
            ThreshValue::FcstClimoDist(p) | ThreshValue::ObsClimoDist(p) => Some(p),
            ThreshValue::Absolute(_) => None,
        }
    }

    /// Resolves the threshold value, using `climo` for percentile thresholds.
    pub fn resolve(&self, climo: &ClimoPntInfo) -> f64 {
        match self.value {
            ThreshValue::Absolute(v) => v,
            ThreshValue::FcstClimoDist(p) => normal_cdf_inv(p / 100.0, climo.fcmn, climo.fcsd),
            ThreshValue::ObsClimoDist(p) => normal_cdf_inv(p / 100.0, climo.ocmn, climo.ocsd),
        }
    }

    /// Tests `v` against an absolute threshold.
    ///
    /// Percentile thresholds fail here since no climatology is available.
    pub fn check(&self, v: f64) -> bool {
        self.check_climo(v, &ClimoPntInfo::default())
    }

    /// Tests `v`, resolving percentile thresholds against `climo`.
    ///
    /// NA always passes. Otherwise a bad value or an unresolvable
    /// threshold fails.
    pub fn check_climo(&self, v: f64, climo: &ClimoPntInfo) -> bool {
        if self.is_na() {
            return true;
        }
        let t = self.resolve(climo);
        if is_bad(v) || is_bad(t) {
            return false;
        }
        self.op.apply(v, t)
    }
}

impl fmt::Display for SingleThresh {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_na() {
            return write!(f, "NA");
        }
        match self.value {
            ThreshValue::Absolute(v) => write!(f, "{}{}", self.op.symbol(), v),
            ThreshValue::FcstClimoDist(p) => write!(f, "{}FCDP{}", self.op.symbol(), p),
            ThreshValue::ObsClimoDist(p) => write!(f, "{}OCDP{}", self.op.symbol(), p),
        }
    }
}

impl FromStr for SingleThresh {
    type Err = PairsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        let invalid = |reason: &str| PairsError::InvalidThreshold {
            text: s.to_string(),
            reason: reason.to_string(),
        };

        if text.eq_ignore_ascii_case("na") {
            return Ok(Self::na());
        }

        const OPS: [(&str, ThreshOp); 12] = [
            (">=", ThreshOp::Ge),
            ("<=", ThreshOp::Le),
            ("==", ThreshOp::Eq),
            ("!=", ThreshOp::Ne),
            (">", ThreshOp::Gt),
            ("<", ThreshOp::Lt),
            ("ge", ThreshOp::Ge),
            ("le", ThreshOp::Le),
            ("eq", ThreshOp::Eq),
            ("ne", ThreshOp::Ne),
            ("gt", ThreshOp::Gt),
            ("lt", ThreshOp::Lt),
        ];
        let lower = text.to_ascii_lowercase();
        let (op, rest) = OPS
            .iter()
            .find(|(prefix, _)| lower.starts_with(prefix))
            .map(|(prefix, op)| (*op, text[prefix.len()..].trim()))
            .ok_or_else(|| invalid("missing comparison operator"))?;

        let upper = rest.to_ascii_uppercase();
        let (ctor, number): (fn(f64) -> ThreshValue, &str) = if upper.starts_with("FCDP") {
            (ThreshValue::FcstClimoDist, &rest[4..])
        } else if upper.starts_with("OCDP") {
            (ThreshValue::ObsClimoDist, &rest[4..])
        } else if upper.starts_with("CDP") {
            (ThreshValue::ObsClimoDist, &rest[3..])
        } else {
            (ThreshValue::Absolute, rest)
        };

        let v: f64 = number
            .trim()
            .parse()
            .map_err(|_| invalid("value is not a number"))?;
        let value = ctor(v);
        if matches!(value, ThreshValue::FcstClimoDist(_) | ThreshValue::ObsClimoDist(_))
            && !(0.0..=100.0).contains(&v)
        {
            return Err(invalid("percentile must be in [0, 100]"));
        }
        Ok(Self { op, value })
    }
}

/// Ordered list of thresholds defining categories.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ThreshArray(Vec<SingleThresh>);

impl ThreshArray {
    pub fn new(thresholds: Vec<SingleThresh>) -> Self {
        Self(thresholds)
    }

    /// Parses a comma-separated list such as `">=0.0, >=0.5, >=1.0"`.
    pub fn parse_list(s: &str) -> Result<Self, PairsError> {
        s.split(',')
            .filter(|t| !t.trim().is_empty())
            .map(str::parse)
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }

    pub fn n(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, i: usize) -> Option<&SingleThresh> {
        self.0.get(i)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SingleThresh> {
        self.0.iter()
    }

    /// Category index of `v`, in `0..=n`.
    ///
    /// For `<`/`<=` thresholds the first passing threshold `i` gives bin `i`
    /// (none passing gives `n`). For all other operators the thresholds are
    /// scanned from the right and the first passing `i` gives bin `i + 1`
    /// (none passing gives 0). Returns `None` for bad values or an empty
    /// array.
    pub fn check_bins(&self, v: f64, climo: &ClimoPntInfo) -> Option<usize> {
        if is_bad(v) || self.0.is_empty() {
            return None;
        }
        let n = self.0.len();
        if matches!(self.0[0].op(), ThreshOp::Lt | ThreshOp::Le) {
            Some(
                self.0
                    .iter()
                    .position(|t| t.check_climo(v, climo))
                    .unwrap_or(n),
            )
        } else {
            Some(
                self.0
                    .iter()
                    .rposition(|t| t.check_climo(v, climo))
                    .map_or(0, |i| i + 1),
            )
        }
    }
}

/// How forecast and observation threshold results are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SetLogic {
    /// Either passes.
    #[default]
    Union,
    /// Both pass.
    Intersection,
    /// Exactly one passes.
    SymDiff,
}

impl fmt::Display for SetLogic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SetLogic::Union => "UNION",
            SetLogic::Intersection => "INTERSECTION",
            SetLogic::SymDiff => "SYMDIFF",
        };
        f.write_str(s)
    }
}

/// Applies `ft` to `f` and `ot` to `o`, combining the results with `logic`.
///
/// When either threshold is NA the logic is forced to intersection, so
/// the other threshold alone decides.
pub fn check_fo_thresh(
    f: f64,
    o: f64,
    climo: &ClimoPntInfo,
    ft: &SingleThresh,
    ot: &SingleThresh,
    logic: SetLogic,
) -> bool {
    let logic = if ft.is_na() || ot.is_na() {
        SetLogic::Intersection
    } else {
        logic
    };
    let fp = ft.check_climo(f, climo);
    let op = ot.check_climo(o, climo);
    match logic {
        SetLogic::Union => fp || op,
        SetLogic::Intersection => fp && op,
        SetLogic::SymDiff => fp != op,
    }
}
