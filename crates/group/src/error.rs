//! Error types for the boreas-group crate.

/// Error type for all fallible operations in the boreas-group crate.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GroupError {
    /// Returned when a smoothing window is even, zero, or used with a
    /// non-periodic key.
    #[error("invalid window {window}: {reason}")]
    InvalidWindow {
        /// The rejected window.
        window: usize,
        /// Description of the problem.
        reason: String,
    },

    /// Returned when an N-day bin width is outside 1..=365.
    #[error("invalid bin width: {days} (must be 1..=365)")]
    InvalidBinWidth {
        /// The rejected bin width in days.
        days: u16,
    },

    /// Returned when timestamps are not strictly increasing.
    #[error("time axis is not strictly increasing at index {index}")]
    NonMonotonicTime {
        /// First index that is not after its predecessor.
        index: usize,
    },

    /// Returned when the value array does not match the declared coordinates.
    #[error("shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        /// Shape implied by the coordinates.
        expected: (usize, usize),
        /// Shape of the provided values.
        got: (usize, usize),
    },

    /// Returned when a named axis does not exist.
    #[error("unknown axis: {name:?}")]
    UnknownAxis {
        /// The requested axis name.
        name: String,
    },

    /// Returned when two axes share a name or an axis name is reserved.
    #[error("invalid axis {name:?}: {reason}")]
    InvalidAxis {
        /// The offending axis name.
        name: String,
        /// Description of the problem.
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_invalid_window() {
        let e = GroupError::InvalidWindow {
            window: 4,
            reason: "window must be odd".to_string(),
        };
        assert_eq!(e.to_string(), "invalid window 4: window must be odd");
    }

    #[test]
    fn error_shape_mismatch() {
        let e = GroupError::ShapeMismatch {
            expected: (10, 2),
            got: (10, 3),
        };
        assert_eq!(e.to_string(), "shape mismatch: expected (10, 2), got (10, 3)");
    }

    #[test]
    fn error_unknown_axis() {
        let e = GroupError::UnknownAxis {
            name: "site".to_string(),
        };
        assert_eq!(e.to_string(), "unknown axis: \"site\"");
    }

    #[test]
    fn error_is_std_error() {
        fn assert_impl<T: std::error::Error>() {}
        assert_impl::<GroupError>();
    }

    #[test]
    fn error_is_send_and_sync() {
        fn assert_impl<T: Send + Sync>() {}
        assert_impl::<GroupError>();
    }
}
