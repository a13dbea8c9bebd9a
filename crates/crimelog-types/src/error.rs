//! Validation errors for crime-log records.

use thiserror::Error;

/// Errors raised when a record's fields do not satisfy the data model.
///
/// Validation never touches storage; a rejected record leaves the store
/// unchanged.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new checks
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ValidationError {
    /// A required field was absent or empty.
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// A count field was negative.
    #[error("Field {field} must not be negative (got {value})")]
    NegativeCount {
        /// Field name.
        field: &'static str,
        /// Offending value.
        value: i64,
    },

    /// Month outside 1..=12.
    #[error("Month must be between 1 and 12 (got {0})")]
    MonthOutOfRange(i32),
}

/// Result type alias using crimelog-types' ValidationError type.
pub type ValidationResult<T> = std::result::Result<T, ValidationError>;
