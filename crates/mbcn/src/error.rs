//! Error types for the boreas-mbcn crate.

use boreas_adjust::AdjustError;
use boreas_group::GroupError;
use boreas_quantile::QuantileError;

/// Error type for all fallible operations in the boreas-mbcn crate.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MbcnError {
    /// Propagated from the univariate machinery.
    #[error(transparent)]
    Adjust(#[from] AdjustError),

    /// Returned when a supplied rotation is not an orthonormal square
    /// matrix over the variables.
    #[error("rotation {index} is invalid: {reason}")]
    InvalidRotation {
        /// Iteration of the offending matrix.
        index: usize,
        /// Description of the problem.
        reason: String,
    },

    /// Returned when the series lacks the variable axis as its leading
    /// auxiliary axis, or its variables differ from the trained ones.
    #[error("variable axis {name:?}: {reason}")]
    VariableAxis {
        /// Configured variable axis name.
        name: String,
        /// Description of the problem.
        reason: String,
    },
}

impl From<GroupError> for MbcnError {
    fn from(e: GroupError) -> Self {
        Self::Adjust(e.into())
    }
}

impl From<QuantileError> for MbcnError {
    fn from(e: QuantileError) -> Self {
        Self::Adjust(e.into())
    }
}

impl MbcnError {
    pub(crate) fn config(reason: impl Into<String>) -> Self {
        Self::Adjust(AdjustError::InvalidConfiguration { reason: reason.into() })
    }

    pub(crate) fn shape(reason: impl Into<String>) -> Self {
        Self::Adjust(AdjustError::ShapeMismatch { reason: reason.into() })
    }
}
