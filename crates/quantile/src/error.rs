//! Error types for the boreas-quantile crate.

/// Error type for all fallible operations in the boreas-quantile crate.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum QuantileError {
    /// Returned when quantile levels are not strictly increasing in `[0, 1]`.
    #[error("invalid quantile levels: {reason}")]
    InvalidLevels {
        /// Description of the problem.
        reason: String,
    },

    /// Returned when a table's axes have different lengths.
    #[error("length mismatch: expected {expected}, got {got}")]
    LengthMismatch {
        /// Expected length.
        expected: usize,
        /// Actual length.
        got: usize,
    },

    /// Returned by the `error` extrapolation policy for a value outside the
    /// table range.
    #[error("value {value} is outside the quantile table range [{min}, {max}]")]
    OutOfRange {
        /// The value that fell outside.
        value: f64,
        /// Lower edge of the table.
        min: f64,
        /// Upper edge of the table.
        max: f64,
    },
}
