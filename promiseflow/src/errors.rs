//! Error types for the promiseflow runtime.
//!
//! Three kinds of failure exist:
//! - [`SetupError`]: a contract violation detected synchronously while
//!   wiring things up (for example wrapping something that is not callable).
//! - [`PromiseError`]: a rejection reason produced by the runtime itself.
//!   These never escape synchronously; they settle a future.
//! - [`UnhandledHookError`]: a cleanup hook that failed while a cancellation
//!   was being processed. Reported through the scheduler's asynchronous error
//!   channel, never to the caller of `cancel`.

use crate::core::{FutureId, Value};
use thiserror::Error;

/// The umbrella error type for promiseflow operations.
#[derive(Debug, Error)]
pub enum PromiseflowError {
    /// A synchronous setup error.
    #[error("{0}")]
    Setup(#[from] SetupError),

    /// The awaited future was rejected.
    #[error("future rejected: {0}")]
    Rejected(Value),

    /// The awaited future was cancelled.
    #[error("future was cancelled")]
    Cancelled,

    /// The runtime ran out of work before the awaited future settled.
    #[error("runtime went idle before the future settled")]
    Stalled,
}

/// A rejection reason produced by the runtime.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PromiseError {
    /// A value had the wrong type for the operation.
    #[error("TypeError: {message}")]
    Type {
        /// Description of the mismatch, naming the actual type.
        message: String,
    },

    /// A general error.
    #[error("Error: {message}")]
    Error {
        /// The error message.
        message: String,
    },
}

impl PromiseError {
    /// Creates a type error.
    #[must_use]
    pub fn type_error(message: impl Into<String>) -> Self {
        Self::Type {
            message: message.into(),
        }
    }

    /// Creates a general error.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Returns the error class name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Type { .. } => "TypeError",
            Self::Error { .. } => "Error",
        }
    }

    /// Returns the error message.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Type { message } | Self::Error { message } => message,
        }
    }

    /// Returns true for type errors.
    #[must_use]
    pub fn is_type_error(&self) -> bool {
        matches!(self, Self::Type { .. })
    }
}

/// Error raised when a non-callable value is used where a function is required
/// at setup time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("expecting a function but got {type_name}")]
pub struct SetupError {
    /// Type name of the offending value.
    pub type_name: String,
}

impl SetupError {
    /// Creates a new setup error for the given type name.
    #[must_use]
    pub fn not_callable(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
        }
    }
}

/// A failure raised by a cancellation cleanup callback.
#[derive(Debug, Clone, Error)]
#[error("unhandled error in cancellation hook of {future}: {reason}")]
pub struct UnhandledHookError {
    /// The future whose hook failed.
    pub future: FutureId,
    /// The thrown value.
    pub reason: Value,
    /// Trace frames recorded for the future, innermost last.
    pub trace: Vec<String>,
}
