//! Error types for the boreas-adjust crate.

use boreas_group::GroupError;
use boreas_quantile::QuantileError;

/// Error type for all fallible operations in the boreas-adjust crate.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AdjustError {
    /// Returned for bad parameter combinations, caught at call time.
    #[error("invalid configuration: {reason}")]
    InvalidConfiguration {
        /// Description of the problem.
        reason: String,
    },

    /// Returned when group structures or axis sets are incompatible.
    #[error("shape mismatch: {reason}")]
    ShapeMismatch {
        /// Description of the problem.
        reason: String,
    },

    /// Returned by `adjust` before `train`.
    #[error("adjustment has not been trained")]
    Untrained,

    /// Returned when every group has no valid samples after removing
    /// missing values.
    #[error("every group is degenerate: {reason}")]
    DegenerateGroup {
        /// Description of the problem.
        reason: String,
    },

    /// Returned when a random draw is needed and no seed was supplied.
    #[error("a seed is required for {context}")]
    MissingSeed {
        /// The operation that needed randomness.
        context: String,
    },

    /// Returned by the `error` extrapolation policy.
    #[error("value {value} is outside the trained range [{min}, {max}]")]
    Extrapolation {
        /// The value that fell outside.
        value: f64,
        /// Lower edge of the trained table.
        min: f64,
        /// Upper edge of the trained table.
        max: f64,
    },

    /// Returned when trained parameters cannot be (de)serialized.
    #[error("serialization error: {reason}")]
    Serialization {
        /// Description of the failure.
        reason: String,
    },
}

impl From<GroupError> for AdjustError {
    fn from(e: GroupError) -> Self {
        match e {
            GroupError::InvalidWindow { .. } | GroupError::InvalidBinWidth { .. } => {
                AdjustError::InvalidConfiguration {
                    reason: e.to_string(),
                }
            }
            GroupError::NonMonotonicTime { .. }
            | GroupError::ShapeMismatch { .. }
            | GroupError::UnknownAxis { .. }
            | GroupError::InvalidAxis { .. } => AdjustError::ShapeMismatch {
                reason: e.to_string(),
            },
        }
    }
}

impl From<QuantileError> for AdjustError {
    fn from(e: QuantileError) -> Self {
        match e {
            QuantileError::InvalidLevels { .. } => AdjustError::InvalidConfiguration {
                reason: e.to_string(),
            },
            QuantileError::LengthMismatch { .. } => AdjustError::ShapeMismatch {
                reason: e.to_string(),
            },
            QuantileError::OutOfRange { value, min, max } => {
                AdjustError::Extrapolation { value, min, max }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_untrained() {
        assert_eq!(
            AdjustError::Untrained.to_string(),
            "adjustment has not been trained"
        );
    }

    #[test]
    fn error_missing_seed() {
        let e = AdjustError::MissingSeed {
            context: "frequency adaptation".to_string(),
        };
        assert_eq!(e.to_string(), "a seed is required for frequency adaptation");
    }

    #[test]
    fn group_errors_map_onto_taxonomy() {
        let e: AdjustError = GroupError::InvalidWindow {
            window: 3,
            reason: "a window is only valid for periodic group keys".to_string(),
        }
        .into();
        assert!(matches!(e, AdjustError::InvalidConfiguration { .. }));

        let e: AdjustError = GroupError::UnknownAxis {
            name: "site".to_string(),
        }
        .into();
        assert!(matches!(e, AdjustError::ShapeMismatch { .. }));
    }

    #[test]
    fn out_of_range_becomes_extrapolation() {
        let e: AdjustError = QuantileError::OutOfRange {
            value: 9.0,
            min: 0.0,
            max: 1.0,
        }
        .into();
        assert_eq!(
            e,
            AdjustError::Extrapolation {
                value: 9.0,
                min: 0.0,
                max: 1.0
            }
        );
    }

    #[test]
    fn error_is_std_error() {
        fn assert_impl<T: std::error::Error>() {}
        assert_impl::<AdjustError>();
    }

    #[test]
    fn error_is_send_and_sync() {
        fn assert_impl<T: Send + Sync>() {}
        assert_impl::<AdjustError>();
    }
}
