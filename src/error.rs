//! Error types for the aggregation core.
//!
//! Everything here is fatal for a run: a bad bin definition or mismatched
//! input shapes stop the run before any table is produced. Recoverable
//! conditions (empty groups, out-of-domain users, stride fallback) are
//! reported as diagnostics instead.

use thiserror::Error;

/// Aggregation error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AggregationError {
    /// Age breakpoints are unusable
    #[error("Invalid age breakpoints: {reason}")]
    InvalidBreakpoints {
        /// Why the breakpoints were rejected
        reason: String,
    },

    /// Zero value bins requested
    #[error("Invalid bin count: at least one value bin is required")]
    InvalidBinCount,

    /// Value range is empty or not finite
    #[error("Invalid value range: low ({low}) must be finite and below high ({high})")]
    InvalidValueRange {
        /// Lower bound of the requested range
        low: f64,
        /// Upper bound of the requested range
        high: f64,
    },

    /// Animation stride of zero
    #[error("Invalid stride: frame stride must be at least 1")]
    InvalidStride,

    /// Negative frame index other than the "last frame" sentinel
    #[error("Invalid frame index {requested}: use -1 for the last frame")]
    InvalidFrameIndex {
        /// The index that was requested
        requested: i64,
    },

    /// Life-cycle divisor must be positive
    #[error("Invalid life cycle {value}: must be a positive number")]
    InvalidLifeCycle {
        /// The rejected divisor
        value: f64,
    },

    /// Two inputs disagree on a dimension
    #[error("Shape mismatch in {what}: expected {expected}, found {found}")]
    ShapeMismatch {
        /// Which dimension disagrees
        what: String,
        /// Size implied by the reference input
        expected: usize,
        /// Size actually found
        found: usize,
    },

    /// A matrix row has a different user count than the first row
    #[error("Ragged matrix: row {row} has {found} users, expected {expected}")]
    RaggedMatrix {
        /// Offending row
        row: usize,
        /// Users in the first row
        expected: usize,
        /// Users in the offending row
        found: usize,
    },

    /// Single-frame request beyond the end of the series
    #[error("Time index {index} is out of range for a series of {len} timesteps")]
    IndexOutOfRange {
        /// Requested index
        index: usize,
        /// Number of available timesteps
        len: usize,
    },
}

/// Result alias for the aggregation core.
pub type Result<T> = std::result::Result<T, AggregationError>;
