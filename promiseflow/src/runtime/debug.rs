//! Feature flags, warnings and trace frames.

use super::RuntimeConfig;
use std::cell::RefCell;
use std::panic::Location;
use tracing::warn;

/// Debug collaborator owned by the runtime.
#[derive(Debug)]
pub(crate) struct Diagnostics {
    config: RuntimeConfig,
    warnings: RefCell<Vec<String>>,
}

impl Diagnostics {
    pub fn new(config: RuntimeConfig) -> Self {
        Self {
            config,
            warnings: RefCell::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn cancellation_enabled(&self) -> bool {
        self.config.cancellation
    }

    /// Emits a warning unless warnings are turned off.
    pub fn warn(&self, message: impl Into<String>) {
        if !self.config.warnings {
            return;
        }
        let message = message.into();
        warn!(warning = %message, "Runtime warning");
        self.warnings.borrow_mut().push(message);
    }

    /// Emits a deprecation notice for `what`.
    pub fn deprecated(&self, what: &str, replacement: &str) {
        self.warn(format!(
            "{what} is deprecated and will be removed in a future version. Use {replacement} instead."
        ));
    }

    pub fn take_warnings(&self) -> Vec<String> {
        std::mem::take(&mut *self.warnings.borrow_mut())
    }

    /// Formats a trace frame, or `None` when trace capture is off.
    pub fn trace_frame(&self, label: &str, location: &Location<'_>) -> Option<String> {
        self.config.long_stack_traces.then(|| {
            format!(
                "{label} at {}:{}:{}",
                location.file(),
                location.line(),
                location.column()
            )
        })
    }

    /// Appends `frame` to `trace`, dropping the oldest frames past the limit.
    pub fn push_frame(&self, trace: &mut Vec<String>, frame: String) {
        trace.push(frame);
        let max = self.config.max_trace_frames.max(1);
        if trace.len() > max {
            let excess = trace.len() - max;
            trace.drain(..excess);
        }
    }
}
