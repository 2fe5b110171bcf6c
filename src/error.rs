use thiserror::Error;

use crate::point::ValueType;

/// Synchronous argument validation failure.
///
/// Never surfaced through a pending flush: a report that fails validation
/// issues no network call and enters no batching state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("value type mismatch: metric declares {expected:?}, got {actual:?}")]
    ValueTypeMismatch {
        expected: ValueType,
        actual: ValueType,
    },

    #[error("cumulative metrics require a summable value type, got {0:?}")]
    NonSummableValueType(ValueType),
}

/// Failure reported by the wire client for descriptor registration, deletion,
/// or a batch send. Passed through to callers unmodified, without retries.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("transport error: {message}")]
pub struct TransportError {
    message: String,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Failure to obtain a credential. Blocks the same call chain as a transport
/// failure and surfaces identically.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("credential acquisition failed: {message}")]
pub struct AuthError {
    message: String,
}

impl AuthError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Operation-level error for `create`, `delete` and `report`.
///
/// Clone is required because one failed batch send rejects every report that
/// contributed to that flush cycle with the same error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MetricError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Auth(#[from] AuthError),
}
