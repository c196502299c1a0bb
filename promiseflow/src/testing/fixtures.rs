//! Test fixtures for observing cancellation.

use crate::cancellation::CancelNotifiable;
use crate::core::{Function, FutureId, Value};
use crate::errors::PromiseError;
use crate::runtime::Runtime;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Once;

/// Installs a `tracing` subscriber honouring `RUST_LOG`. Safe to call from
/// every test.
pub fn init_test_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Records labels in the order hooks run.
#[derive(Debug, Clone, Default)]
pub struct HookRecorder {
    log: Rc<RefCell<Vec<String>>>,
}

impl HookRecorder {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a label.
    pub fn record(&self, label: impl Into<String>) {
        self.log.borrow_mut().push(label.into());
    }

    /// Returns a function value that records `label` when called.
    #[must_use]
    pub fn hook(&self, label: &str) -> Value {
        let log = self.log.clone();
        let label = label.to_string();
        Value::Function(Function::named(label.clone(), move |_, _, _| {
            log.borrow_mut().push(label.clone());
            Ok(Value::Undefined)
        }))
    }

    /// Returns a function value that records `label` and then throws
    /// `message`.
    #[must_use]
    pub fn failing_hook(&self, label: &str, message: &str) -> Value {
        let log = self.log.clone();
        let label = label.to_string();
        let message = message.to_string();
        Value::Function(Function::named(label.clone(), move |_, _, _| {
            log.borrow_mut().push(label.clone());
            Err(PromiseError::error(message.clone()).into())
        }))
    }

    /// Returns a function value that records the receiver it was called with.
    #[must_use]
    pub fn receiver_hook(&self) -> Value {
        let log = self.log.clone();
        Value::function(move |_, receiver, _| {
            log.borrow_mut().push(receiver.to_string());
            Ok(Value::Undefined)
        })
    }

    /// Returns the recorded labels.
    #[must_use]
    pub fn entries(&self) -> Vec<String> {
        self.log.borrow().clone()
    }

    /// Returns true if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.log.borrow().is_empty()
    }
}

/// A [`CancelNotifiable`] that records every origin it is notified about.
#[derive(Debug, Default)]
pub struct RecordingNotifiable {
    origins: RefCell<Vec<FutureId>>,
}

impl RecordingNotifiable {
    /// Creates a new recording notifiable.
    #[must_use]
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Returns the recorded origins.
    #[must_use]
    pub fn origins(&self) -> Vec<FutureId> {
        self.origins.borrow().clone()
    }
}

impl CancelNotifiable for RecordingNotifiable {
    fn result_cancelled(&self, _rt: &Runtime, origin: FutureId) {
        self.origins.borrow_mut().push(origin);
    }
}
