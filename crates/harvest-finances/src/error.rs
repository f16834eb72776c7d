//! Validation errors for records arriving from the wire
//!
//! The backend accepts whatever the browser sent, so numeric fields may be
//! numbers, numeric strings, or garbage. Everything is validated here at the
//! boundary; aggregation only ever sees well-formed records.

use thiserror::Error;

/// Why a wire record was rejected (or repaired) during validation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RecordError {
    #[error("field `{field}` is not a valid number: `{value}`")]
    MalformedNumber { field: &'static str, value: String },

    #[error("field `{field}` must not be negative: {value}")]
    NegativeNumber { field: &'static str, value: f64 },

    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("unknown expense category `{0}`")]
    UnknownCategory(String),

    #[error("invalid date `{0}` (expected YYYY-MM-DD)")]
    InvalidDate(String),
}
