//! Test assertions for future outcomes.

use crate::core::{Disposition, FutureId, Outcome, Value};
use crate::runtime::Runtime;

/// Asserts that the future has the expected disposition.
pub fn assert_disposition(rt: &Runtime, id: FutureId, expected: Disposition) {
    let actual = rt.disposition(id);
    assert_eq!(
        actual, expected,
        "Expected {id} to be {expected}, got {actual} ({:?})",
        rt.outcome(id)
    );
}

/// Asserts that the future is still pending and not cancelled.
pub fn assert_pending(rt: &Runtime, id: FutureId) {
    assert_disposition(rt, id, Disposition::Pending);
}

/// Asserts that the future was cancelled.
pub fn assert_cancelled(rt: &Runtime, id: FutureId) {
    assert_disposition(rt, id, Disposition::Cancelled);
}

/// Asserts that the future was fulfilled with `expected`.
pub fn assert_fulfilled_with(rt: &Runtime, id: FutureId, expected: &Value) {
    match rt.outcome(id) {
        Outcome::Fulfilled(actual) => assert_eq!(
            &actual, expected,
            "Expected {id} to be fulfilled with {expected}, got {actual}"
        ),
        other => panic!("Expected {id} to be fulfilled with {expected}, got {other:?}"),
    }
}

/// Asserts that the future was rejected and returns the reason.
pub fn assert_rejected(rt: &Runtime, id: FutureId) -> Value {
    match rt.outcome(id) {
        Outcome::Rejected(reason) => reason,
        other => panic!("Expected {id} to be rejected, got {other:?}"),
    }
}

/// Asserts that the future was rejected with `expected`.
pub fn assert_rejected_with(rt: &Runtime, id: FutureId, expected: &Value) {
    let reason = assert_rejected(rt, id);
    assert_eq!(
        &reason, expected,
        "Expected {id} to be rejected with {expected}, got {reason}"
    );
}

/// Asserts that the future was rejected with a type error whose message
/// contains `fragment`.
pub fn assert_type_error(rt: &Runtime, id: FutureId, fragment: &str) {
    let reason = assert_rejected(rt, id);
    let err = reason
        .as_error()
        .unwrap_or_else(|| panic!("Expected an error reason, got {reason}"));
    assert!(err.is_type_error(), "Expected a type error, got {err}");
    assert!(
        err.message().contains(fragment),
        "Expected '{}' to contain '{fragment}'",
        err.message()
    );
}
