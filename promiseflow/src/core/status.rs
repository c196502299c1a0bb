//! Future identifiers, dispositions and settled outcomes.

use super::Value;
use crate::errors::PromiseflowError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Handle to a future record inside a [`Runtime`](crate::runtime::Runtime) arena.
///
/// Handles are plain indices: holding one never keeps a record alive and
/// never creates an ownership cycle between futures.
///
/// A handle is only meaningful to the runtime that created it. Passing it to
/// another runtime addresses an unrelated record, or panics if that runtime
/// has fewer records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FutureId(pub(crate) usize);

impl FutureId {
    /// Returns the arena slot of this handle.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for FutureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Future#{}", self.0)
    }
}

/// The terminal outcome kind of a future, or `Pending` while it has none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    /// Not settled and not cancelled.
    Pending,
    /// Settled with a value.
    Fulfilled,
    /// Settled with a rejection reason.
    Rejected,
    /// Cancelled while pending. Carries no value.
    Cancelled,
}

impl Default for Disposition {
    fn default() -> Self {
        Self::Pending
    }
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Fulfilled => write!(f, "fulfilled"),
            Self::Rejected => write!(f, "rejected"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl Disposition {
    /// Returns true if the disposition is final.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// A snapshot of a future's state together with its value or reason.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Still waiting.
    Pending,
    /// Fulfilled with the contained value.
    Fulfilled(Value),
    /// Rejected with the contained reason.
    Rejected(Value),
    /// Cancelled before settling.
    Cancelled,
}

impl Outcome {
    /// Returns the disposition of this outcome.
    #[must_use]
    pub fn disposition(&self) -> Disposition {
        match self {
            Self::Pending => Disposition::Pending,
            Self::Fulfilled(_) => Disposition::Fulfilled,
            Self::Rejected(_) => Disposition::Rejected,
            Self::Cancelled => Disposition::Cancelled,
        }
    }

    /// Converts the outcome into a `Result`, treating anything other than a
    /// fulfillment as an error.
    pub fn into_result(self) -> Result<Value, PromiseflowError> {
        match self {
            Self::Fulfilled(value) => Ok(value),
            Self::Rejected(reason) => Err(PromiseflowError::Rejected(reason)),
            Self::Cancelled => Err(PromiseflowError::Cancelled),
            Self::Pending => Err(PromiseflowError::Stalled),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disposition_display() {
        assert_eq!(Disposition::Pending.to_string(), "pending");
        assert_eq!(Disposition::Fulfilled.to_string(), "fulfilled");
        assert_eq!(Disposition::Rejected.to_string(), "rejected");
        assert_eq!(Disposition::Cancelled.to_string(), "cancelled");
    }

    #[test]
    fn test_disposition_terminal() {
        assert!(!Disposition::Pending.is_terminal());
        assert!(Disposition::Fulfilled.is_terminal());
        assert!(Disposition::Rejected.is_terminal());
        assert!(Disposition::Cancelled.is_terminal());
    }

    #[test]
    fn test_disposition_serde() {
        let json = serde_json::to_string(&Disposition::Cancelled).unwrap();
        assert_eq!(json, "\"cancelled\"");
    }

    #[test]
    fn test_outcome_into_result() {
        assert_eq!(Outcome::Fulfilled(Value::from(3)).into_result().unwrap(), Value::from(3));
        assert!(matches!(
            Outcome::Cancelled.into_result(),
            Err(PromiseflowError::Cancelled)
        ));
        assert!(matches!(
            Outcome::Pending.into_result(),
            Err(PromiseflowError::Stalled)
        ));
    }

    #[test]
    fn test_future_id_display() {
        assert_eq!(FutureId(7).to_string(), "Future#7");
        assert_eq!(FutureId(7).index(), 7);
    }
}
