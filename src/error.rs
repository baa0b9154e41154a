//! Error types returned by fallible world operations.

use thiserror::Error;

/// Failure modes of the public world API.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum WorldError {
    /// Topology or configuration changes are not allowed while a step runs.
    #[error("world is locked: a step is in progress")]
    Locked,

    /// The handle does not refer to a live entity.
    #[error("stale or unknown {0} handle")]
    InvalidHandle(&'static str),

    /// A numeric parameter is non-finite or out of its valid domain.
    #[error("invalid value for `{field}`: {value}")]
    InvalidValue { field: &'static str, value: f32 },

    /// A joint was asked to connect a body to itself.
    #[error("a joint requires two distinct bodies")]
    SameBody,
}

/// Convenience alias for `Result<T, WorldError>`.
pub type WorldResult<T> = Result<T, WorldError>;

/// Rejects non-finite values.
pub(crate) fn ensure_finite(field: &'static str, value: f32) -> WorldResult<f32> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(WorldError::InvalidValue { field, value })
    }
}

/// Rejects non-finite or negative values.
pub(crate) fn ensure_non_negative(field: &'static str, value: f32) -> WorldResult<f32> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(WorldError::InvalidValue { field, value })
    }
}
