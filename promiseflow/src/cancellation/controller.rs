//! Cascading cancellation and cleanup-hook management.

use super::CleanupHook;
use crate::core::{Function, FutureId, Value};
use crate::errors::{PromiseError, UnhandledHookError};
use crate::runtime::Runtime;
use std::collections::HashSet;
use std::time::Duration;
use tracing::debug;

impl Runtime {
    /// Returns true if the future is pending and has not been cancelled.
    #[must_use]
    pub fn is_cancellable(&self, id: FutureId) -> bool {
        self.with_record(id, |r| r.is_cancellable())
    }

    /// Requests cancellation of `id`.
    ///
    /// Cleanup hooks fire from `id` up through its cancellation parents, in
    /// that order, and the highest ancestor that is still cancellable is
    /// moved into the cancelled disposition. Hooks run as scheduler jobs,
    /// never inside this call. Calling this again on a cancelled chain does
    /// nothing.
    ///
    /// With cancellation disabled this only emits a warning.
    pub fn cancel(&self, id: FutureId) {
        if !self.cancellation_enabled() {
            self.warn("cancellation is disabled");
            return;
        }
        self.cancel_cascade(id, &mut HashSet::new());
    }

    /// Walks one cascade. `visited` spans the followee recursion, so a future
    /// that adopted one of its own descendants is only stepped through once.
    fn cancel_cascade(&self, id: FutureId, visited: &mut HashSet<FutureId>) {
        let mut cursor = id;
        while self.is_cancellable(cursor) && visited.insert(cursor) {
            let hook = self.take_cleanup_hook(cursor);
            self.invoke_on_cancel(cursor, hook);
            if let Some(followee) = self.followee(cursor) {
                self.cancel_cascade(followee, visited);
            }
            let parent = self
                .cancellation_parent(cursor)
                .filter(|parent| self.is_cancellable(*parent) && !visited.contains(parent));
            match parent {
                Some(parent) => {
                    debug!(future = %cursor, parent = %parent, "Cancellation cascading to parent");
                    cursor = parent;
                }
                None => {
                    debug!(future = %cursor, requested = %id, "Future cancelled");
                    self.finalize_cancelled(cursor);
                    break;
                }
            }
        }
    }

    /// Alias of [`Runtime::cancel`].
    pub fn r#break(&self, id: FutureId) {
        self.cancel(id);
    }

    /// Arms a timer that cancels `id` after `delay`.
    ///
    /// The timer stays armed even if `id` settles first; firing then is
    /// harmless because a settled future is not cancellable.
    pub fn cancel_after(&self, id: FutureId, delay: Duration) {
        debug!(future = %id, ?delay, "Cancellation timer armed");
        self.set_timeout(delay, move |rt| rt.cancel(id));
    }

    /// Registers a cleanup callback run when `id` is cancelled.
    ///
    /// Returns `id` for chaining, or a type error if `hook` is not a function.
    /// Hooks registered on the same future run in registration order, each
    /// completing before the next starts. On an already cancelled future the
    /// hook is scheduled right away; on a settled future it is dropped.
    pub fn on_cancel(&self, id: FutureId, hook: Value) -> Result<FutureId, PromiseError> {
        let hook = match hook {
            Value::Function(hook) => hook,
            other => {
                return Err(PromiseError::type_error(format!(
                    "onCancel must be a function, got: {}",
                    other.type_name()
                )))
            }
        };
        self.attach_cleanup_hook(id, CleanupHook::Callback(hook));
        Ok(id)
    }

    /// Adds a cleanup hook to `id`, composing with any hook already present.
    pub fn attach_cleanup_hook(&self, id: FutureId, hook: CleanupHook) {
        if !self.is_cancellable(id) {
            if self.is_cancelled(id) {
                self.invoke_on_cancel(id, Some(hook));
            }
            return;
        }
        let target = self.target(id);
        let installed = match self.take_cleanup_hook(target) {
            Some(previous) => compose(id, target, previous, hook),
            None => hook,
        };
        self.set_cleanup_hook(target, installed);
    }

    /// Replaces the cleanup slot of `id`.
    pub fn set_cleanup_hook(&self, id: FutureId, hook: CleanupHook) {
        self.with_record_mut(id, |r| r.cleanup_hook = Some(hook));
    }

    /// Returns true if a cleanup hook is installed on `id`.
    #[must_use]
    pub fn has_cleanup_hook(&self, id: FutureId) -> bool {
        self.with_record(id, |r| r.cleanup_hook.is_some())
    }

    fn take_cleanup_hook(&self, id: FutureId) -> Option<CleanupHook> {
        self.with_record_mut(id, |r| r.cleanup_hook.take())
    }

    fn clear_cleanup_hook(&self, id: FutureId) {
        self.with_record_mut(id, |r| r.cleanup_hook = None);
    }

    fn invoke_on_cancel(&self, id: FutureId, hook: Option<CleanupHook>) {
        if let Some(hook) = hook {
            self.invoke(move |rt| rt.do_invoke_on_cancel(id, hook));
        }
    }

    fn do_invoke_on_cancel(&self, id: FutureId, hook: CleanupHook) {
        debug!(future = %id, hook = hook.kind(), "Invoking cleanup hook");
        match hook {
            CleanupHook::Callback(callback) => {
                let receiver = self.bound_context(id);
                if let Err(reason) = callback.call(self, &receiver, &[]) {
                    let trace = self.attach_extra_trace(id, "cancellation hook");
                    self.throw_later(UnhandledHookError {
                        future: id,
                        reason,
                        trace,
                    });
                }
            }
            CleanupHook::Cancellable(other) => self.cancel(other),
            CleanupHook::Notifiable(owner) => owner.result_cancelled(self, id),
        }
    }

    /// Cancels a future because the future it depends on was cancelled.
    pub(crate) fn cancel_dependent(&self, id: FutureId) {
        if !self.is_cancellable(id) {
            return;
        }
        let hook = self.take_cleanup_hook(id);
        self.invoke_on_cancel(id, hook);
        self.finalize_cancelled(id);
    }
}

/// Builds a hook that runs `previous` then `next` on behalf of `context`,
/// then empties the slot of `target`.
fn compose(
    context: FutureId,
    target: FutureId,
    previous: CleanupHook,
    next: CleanupHook,
) -> CleanupHook {
    CleanupHook::Callback(Function::named("composed cleanup", move |rt, _, _| {
        rt.do_invoke_on_cancel(context, previous.clone());
        rt.do_invoke_on_cancel(context, next.clone());
        rt.clear_cleanup_hook(target);
        Ok(Value::Undefined)
    }))
}
