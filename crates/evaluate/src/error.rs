//! Statistics error types.

/// Errors that can occur while computing verification statistics.
#[derive(Debug, thiserror::Error)]
pub enum EvaluateError {
    /// Two inputs that must line up have different lengths.
    #[error("{context}: length mismatch (expected {expected}, got {got})")]
    LengthMismatch {
        /// Where the mismatch was detected.
        context: &'static str,
        /// Required length.
        expected: usize,
        /// Length actually provided.
        got: usize,
    },

    /// A computation that needs at least one pair received none.
    #[error("{context}: no matched pairs")]
    NoPairs {
        /// Operation that was attempted.
        context: &'static str,
    },

    /// A jackknife skip index or sample index lies outside the data.
    #[error("{context}: index {index} out of range for {n} values")]
    IndexOutOfRange {
        /// Operation that was attempted.
        context: &'static str,
        /// Offending index.
        index: usize,
        /// Number of values available.
        n: usize,
    },

    /// A confidence interval alpha outside `(0, 1)`.
    #[error("alpha must be in (0, 1), got {alpha}")]
    InvalidAlpha {
        /// The rejected alpha.
        alpha: f64,
    },

    /// A bootstrap replicate proportion outside `(0, 1]`.
    #[error("replicate proportion must be in (0, 1], got {value}")]
    InvalidReplicateProportion {
        /// The rejected proportion.
        value: f64,
    },

    /// Probability thresholds that cannot define a PCT table.
    #[error("invalid probability thresholds: {reason}")]
    InvalidProbThresholds {
        /// Why the thresholds were rejected.
        reason: String,
    },

    /// A categorical computation given no thresholds.
    #[error("{context}: at least one threshold is required")]
    EmptyThresholds {
        /// Operation that was attempted.
        context: &'static str,
    },

    /// A forecast probability that falls outside every PCT row.
    #[error("forecast probability {value} is outside the threshold range")]
    ProbabilityOutOfRange {
        /// The unbinnable probability.
        value: f64,
    },

    /// Two tables or threshold sets of different shape.
    #[error("{context}: dimension mismatch ({left} vs {right})")]
    DimensionMismatch {
        /// Operation that was attempted.
        context: &'static str,
        /// Size on the left-hand side.
        left: usize,
        /// Size on the right-hand side.
        right: usize,
    },

    /// A pair store operation failed.
    #[error(transparent)]
    Pairs(#[from] verif_pairs::PairsError),

    /// JSON serialization failed.
    #[error("serialization error: {reason}")]
    Serialization {
        /// Underlying serializer message.
        reason: String,
    },
}
