//! Cleanup hooks attached to cancellable futures.

use crate::core::{Function, FutureId};
use crate::runtime::Runtime;
use std::fmt;
use std::rc::Rc;

/// Something that wants to know when the future it produced was cancelled.
///
/// Aggregates implement this to fan cancellation out to their constituents.
pub trait CancelNotifiable {
    /// Called from a scheduler job after `origin` was asked to cancel.
    fn result_cancelled(&self, rt: &Runtime, origin: FutureId);
}

/// The single cleanup slot of a future.
#[derive(Clone)]
pub enum CleanupHook {
    /// Invoke a function with the future's bound context as receiver.
    Callback(Function),
    /// Cancel another future.
    Cancellable(FutureId),
    /// Notify the owner of the future.
    Notifiable(Rc<dyn CancelNotifiable>),
}

impl CleanupHook {
    /// Returns a short label for logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Callback(_) => "callback",
            Self::Cancellable(_) => "cancellable",
            Self::Notifiable(_) => "notifiable",
        }
    }
}

impl fmt::Debug for CleanupHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Callback(func) => f.debug_tuple("Callback").field(func).finish(),
            Self::Cancellable(id) => f.debug_tuple("Cancellable").field(id).finish(),
            Self::Notifiable(_) => f.write_str("Notifiable"),
        }
    }
}

impl From<Function> for CleanupHook {
    fn from(f: Function) -> Self {
        Self::Callback(f)
    }
}

impl From<FutureId> for CleanupHook {
    fn from(id: FutureId) -> Self {
        Self::Cancellable(id)
    }
}
