//! Testing utilities for code built on promiseflow.
//!
//! This module provides:
//! - Assertions on future dispositions and outcomes
//! - Recording hooks and notifiables for observing cancellation order
//! - Log initialisation for tests

mod assertions;
mod fixtures;

pub use assertions::{
    assert_cancelled, assert_disposition, assert_fulfilled_with, assert_pending,
    assert_rejected, assert_rejected_with, assert_type_error,
};
pub use fixtures::{init_test_logging, HookRecorder, RecordingNotifiable};
