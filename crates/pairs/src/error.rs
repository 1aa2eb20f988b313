//! Error types for the verif-pairs crate.

use crate::store::PairMode;

/// Error type for contract violations in the pairing engine.
///
/// Data-quality rejections are not errors; they are reported through
/// [`CascadeResult`](crate::CascadeResult) and the rejection counters.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PairsError {
    /// Returned when parallel inputs or columns disagree in length.
    #[error("{context}: length {got} does not match expected {expected}")]
    LengthMismatch {
        /// Operation that detected the mismatch.
        context: &'static str,
        /// Expected length.
        expected: usize,
        /// Length actually supplied.
        got: usize,
    },

    /// Returned when a point pair is added to a grid store or vice versa.
    #[error("cannot add a {requested} pair to a {store} pair store")]
    ModeMismatch {
        /// Mode fixed by the first insertion.
        store: PairMode,
        /// Mode of the rejected insertion.
        requested: PairMode,
    },

    /// Returned when the partition matrix is used before `set_size`.
    #[error("partition matrix size has not been set")]
    Unsized,

    /// Returned when a partition axis is sized to zero.
    #[error("{axis} dimension must be >= 1")]
    EmptyDimension {
        /// Name of the axis.
        axis: &'static str,
    },

    /// Returned when a partition or column index is out of range.
    #[error("{axis} index {index} out of range for length {len}")]
    IndexOutOfRange {
        /// Name of the axis or column.
        axis: &'static str,
        /// Offending index.
        index: usize,
        /// Length of the axis.
        len: usize,
    },

    /// Returned when no vertical level can be matched to an observation.
    #[error("no vertical level brackets observation level {obs_lvl} among {n_levels} levels")]
    NoVerticalLevel {
        /// Observation level or height.
        obs_lvl: f64,
        /// Number of candidate levels.
        n_levels: usize,
    },

    /// Returned when a matched-pair column expression names an unknown column.
    #[error("unknown matched-pair column {column:?}")]
    UnknownMprColumn {
        /// Column expression as supplied.
        column: String,
    },

    /// Returned when threshold text cannot be parsed.
    #[error("invalid threshold {text:?}: {reason}")]
    InvalidThreshold {
        /// Threshold text as supplied.
        text: String,
        /// What was wrong with it.
        reason: String,
    },

    /// Returned when climatology CDF thresholds are malformed.
    #[error("invalid climatology CDF thresholds: {reason}")]
    InvalidCdfThresholds {
        /// What was wrong with them.
        reason: String,
    },

    /// Returned when the observation summary percentile is outside `[0, 100]`.
    #[error("observation summary percentile must be in [0, 100], got {p}")]
    InvalidPercentile {
        /// The invalid percentile.
        p: f64,
    },

    /// Returned when the valid-time window is inverted.
    #[error("valid time window begins at {beg} after it ends at {end}")]
    InvalidTimeWindow {
        /// Window start (unix seconds).
        beg: i64,
        /// Window end (unix seconds).
        end: i64,
    },

    /// Returned when an interpolation setting is invalid.
    #[error("invalid interpolation {method}: {reason}")]
    InvalidInterp {
        /// Interpolation method name.
        method: String,
        /// What was wrong with it.
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_length_mismatch() {
        let e = PairsError::LengthMismatch {
            context: "add_grid_pairs",
            expected: 3,
            got: 2,
        };
        assert_eq!(
            e.to_string(),
            "add_grid_pairs: length 2 does not match expected 3"
        );
    }

    #[test]
    fn error_mode_mismatch() {
        let e = PairsError::ModeMismatch {
            store: PairMode::Point,
            requested: PairMode::Grid,
        };
        assert_eq!(e.to_string(), "cannot add a grid pair to a point pair store");
    }

    #[test]
    fn error_unsized() {
        assert_eq!(
            PairsError::Unsized.to_string(),
            "partition matrix size has not been set"
        );
    }

    #[test]
    fn error_index_out_of_range() {
        let e = PairsError::IndexOutOfRange {
            axis: "mask",
            index: 4,
            len: 2,
        };
        assert_eq!(e.to_string(), "mask index 4 out of range for length 2");
    }

    #[test]
    fn error_unknown_mpr_column() {
        let e = PairsError::UnknownMprColumn {
            column: "FOO".to_string(),
        };
        assert_eq!(e.to_string(), "unknown matched-pair column \"FOO\"");
    }

    #[test]
    fn error_invalid_percentile() {
        let e = PairsError::InvalidPercentile { p: 120.0 };
        assert_eq!(
            e.to_string(),
            "observation summary percentile must be in [0, 100], got 120"
        );
    }
}
