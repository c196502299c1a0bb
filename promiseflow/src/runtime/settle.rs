//! Settlement primitives, outcome adoption and dependent notification.

use super::{FutureState, ProxyListener, Reaction, Runtime, SettlementListener};
use crate::core::{Function, FutureId, Outcome, Value};
use crate::errors::PromiseError;
use std::ops::BitOr;
use std::rc::Rc;
use tracing::{debug, trace};

/// What a derived future inherits from the future it was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PropagateFlags {
    /// Link the cancellation parent so cancelling the child cascades upward.
    pub cancel: bool,
    /// Copy the bound context used as receiver for callback hooks.
    pub bind: bool,
}

impl PropagateFlags {
    /// Inherit nothing.
    pub const NONE: Self = Self {
        cancel: false,
        bind: false,
    };
    /// Inherit the cancellation parent.
    pub const CANCEL: Self = Self {
        cancel: true,
        bind: false,
    };
    /// Inherit the bound context.
    pub const BIND: Self = Self {
        cancel: false,
        bind: true,
    };
    /// Inherit both.
    pub const ALL: Self = Self {
        cancel: true,
        bind: true,
    };
}

impl BitOr for PropagateFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self {
            cancel: self.cancel || rhs.cancel,
            bind: self.bind || rhs.bind,
        }
    }
}

impl Runtime {
    /// Follows the adoption chain from `id` to the future that will actually
    /// settle.
    #[must_use]
    pub fn target(&self, id: FutureId) -> FutureId {
        let arena = self.arena.borrow();
        let mut current = id;
        while let Some(next) = arena.get(current).followee {
            current = next;
        }
        current
    }

    /// Coerces a value for consumption by an aggregate: futures are replaced
    /// by their target, other values pass through unchanged.
    #[must_use]
    pub fn to_future(&self, value: Value) -> Value {
        match value {
            Value::Future(id) => Value::Future(self.target(id)),
            other => other,
        }
    }

    /// Creates a future resolved with `value`. A future value is adopted.
    pub fn resolved(&self, value: Value) -> FutureId {
        let id = self.new_future();
        self.resolve(id, value);
        id
    }

    /// Creates a future rejected with `reason`.
    pub fn rejected(&self, reason: Value) -> FutureId {
        let id = self.new_future();
        self.reject(id, reason, false);
        id
    }

    /// Links `child` to `parent` at construction.
    pub fn propagate_from(&self, child: FutureId, parent: FutureId, flags: PropagateFlags) {
        let (parent_cancellable, context) =
            self.with_record(parent, |r| (r.is_cancellable(), r.bound_context.clone()));
        self.with_record_mut(child, |r| {
            if flags.cancel && parent_cancellable {
                r.cancellation_parent = Some(parent);
            }
            if flags.bind {
                r.bound_context = context;
            }
        });
    }

    /// Fulfills a pending future. Ignored if the future already settled or
    /// was cancelled.
    pub fn fulfill(&self, id: FutureId, value: Value) {
        debug_assert!(
            !matches!(value, Value::Future(_)),
            "futures must be adopted with resolve, not fulfill"
        );
        let notify = self.with_record_mut(id, |r| {
            if !r.is_cancellable() {
                return None;
            }
            r.state = FutureState::Fulfilled(value);
            r.cleanup_hook = None;
            Some(!r.reactions.is_empty())
        });
        self.after_settle(id, notify, "fulfilled");
    }

    /// Rejects a pending future. `handled` marks the rejection as observed
    /// up front. Ignored if the future already settled or was cancelled.
    pub fn reject(&self, id: FutureId, reason: Value, handled: bool) {
        let notify = self.with_record_mut(id, |r| {
            if !r.is_cancellable() {
                return None;
            }
            r.state = FutureState::Rejected(reason);
            r.cleanup_hook = None;
            r.rejection_handled |= handled;
            Some(!r.reactions.is_empty())
        });
        self.after_settle(id, notify, "rejected");
    }

    /// Resolves a future with a value, adopting the outcome of a future value.
    pub fn resolve(&self, id: FutureId, value: Value) {
        match value {
            Value::Future(other) => self.follow(id, other),
            value => self.fulfill(id, value),
        }
    }

    fn follow(&self, id: FutureId, other: FutureId) {
        if !self.is_pending_and_waiting(id) {
            return;
        }
        let target = self.target(other);
        if target == id {
            let err = PromiseError::type_error("circular promise resolution chain");
            self.reject(id, err.into(), false);
            return;
        }
        match self.outcome(target) {
            Outcome::Pending => {
                self.with_record_mut(id, |r| r.followee = Some(target));
                debug!(future = %id, followee = %target, "Future following");
                self.add_reaction(target, Reaction::Follower { child: id });
            }
            Outcome::Fulfilled(value) => self.fulfill(id, value),
            Outcome::Rejected(reason) => {
                self.mark_rejection_handled(target);
                self.reject(id, reason, false);
            }
            Outcome::Cancelled => self.cancel_dependent(id),
        }
    }

    /// Moves a cancellable future into the cancelled disposition and
    /// schedules notification of its dependents.
    pub(crate) fn finalize_cancelled(&self, id: FutureId) {
        let notify = self.with_record_mut(id, |r| {
            if !r.is_cancellable() {
                return None;
            }
            r.cancelled = true;
            r.cancellation_parent = None;
            r.cleanup_hook = None;
            Some(!r.reactions.is_empty())
        });
        self.after_settle(id, notify, "cancelled");
    }

    fn after_settle(&self, id: FutureId, notify: Option<bool>, disposition: &str) {
        match notify {
            None => trace!(future = %id, disposition, "Ignoring settlement of a settled future"),
            Some(has_dependents) => {
                debug!(future = %id, disposition, has_dependents, "Future settled");
                if has_dependents {
                    self.invoke(move |rt| rt.settle_reactions(id));
                }
            }
        }
    }

    /// Derives a future from `id` that runs the matching handler once `id`
    /// settles. A missing handler passes the outcome through. If `id` is
    /// cancelled the derived future is cancelled too.
    pub fn then(
        &self,
        id: FutureId,
        on_fulfilled: Option<Function>,
        on_rejected: Option<Function>,
    ) -> FutureId {
        let child = self.new_future();
        self.propagate_from(child, id, PropagateFlags::ALL);
        self.add_reaction(
            id,
            Reaction::Then {
                child,
                on_fulfilled,
                on_rejected,
            },
        );
        child
    }

    /// Derives a future mirroring `id` whose callback hooks receive
    /// `receiver`.
    pub fn bind(&self, id: FutureId, receiver: Value) -> FutureId {
        let child = self.then(id, None, None);
        self.with_record_mut(child, |r| r.bound_context = receiver);
        child
    }

    /// Registers a listener for the settlement of `id`.
    pub fn listen(&self, id: FutureId, listener: Rc<dyn SettlementListener>) {
        self.add_reaction(id, Reaction::Listener(listener));
    }

    /// Registers `listener` as a pass-through receiver of `id`'s settlement
    /// under `index`.
    pub fn proxy(&self, id: FutureId, listener: Rc<dyn ProxyListener>, index: usize) {
        self.add_reaction(id, Reaction::Proxy { listener, index });
    }

    /// Marks a rejection as observed so it is not reported as unhandled.
    pub fn mark_rejection_handled(&self, id: FutureId) {
        self.with_record_mut(id, |r| r.rejection_handled = true);
    }

    /// Returns rejected futures that nothing has observed.
    #[must_use]
    pub fn unhandled_rejections(&self) -> Vec<(FutureId, Value)> {
        self.arena
            .borrow()
            .iter()
            .filter(|(_, r)| !r.rejection_handled)
            .filter_map(|(id, r)| match &r.state {
                FutureState::Rejected(reason) => Some((id, reason.clone())),
                _ => None,
            })
            .collect()
    }

    fn add_reaction(&self, id: FutureId, reaction: Reaction) {
        let settled = self.with_record_mut(id, |r| {
            r.reactions.push(reaction);
            r.rejection_handled = true;
            !r.is_cancellable()
        });
        if settled {
            self.invoke(move |rt| rt.settle_reactions(id));
        }
    }

    fn settle_reactions(&self, id: FutureId) {
        let (reactions, outcome) =
            self.with_record_mut(id, |r| (std::mem::take(&mut r.reactions), r.outcome()));
        if reactions.is_empty() {
            return;
        }
        trace!(future = %id, dependents = reactions.len(), "Notifying dependents");
        for reaction in reactions {
            self.dispatch(reaction, &outcome);
        }
    }

    fn dispatch(&self, reaction: Reaction, outcome: &Outcome) {
        match reaction {
            Reaction::Then {
                child,
                on_fulfilled,
                on_rejected,
            } => match outcome {
                Outcome::Fulfilled(value) => self.run_handler(child, on_fulfilled.as_ref(), value, true),
                Outcome::Rejected(reason) => self.run_handler(child, on_rejected.as_ref(), reason, false),
                Outcome::Cancelled => self.cancel_dependent(child),
                Outcome::Pending => {}
            },
            Reaction::Follower { child } => match outcome {
                Outcome::Fulfilled(value) => self.fulfill(child, value.clone()),
                Outcome::Rejected(reason) => self.reject(child, reason.clone(), false),
                Outcome::Cancelled => self.cancel_dependent(child),
                Outcome::Pending => {}
            },
            Reaction::Proxy { listener, index } => match outcome {
                Outcome::Fulfilled(value) => listener.fulfilled(self, value.clone(), index),
                Outcome::Rejected(reason) => listener.rejected(self, reason.clone(), index),
                Outcome::Cancelled => listener.cancelled(self, index),
                Outcome::Pending => {}
            },
            Reaction::Listener(listener) => match outcome {
                Outcome::Fulfilled(value) => listener.on_fulfilled(self, value.clone()),
                Outcome::Rejected(reason) => listener.on_rejected(self, reason.clone()),
                Outcome::Cancelled => listener.on_cancelled(self),
                Outcome::Pending => {}
            },
        }
    }

    fn run_handler(&self, child: FutureId, handler: Option<&Function>, arg: &Value, fulfilled: bool) {
        match handler {
            Some(handler) => {
                let receiver = self.bound_context(child);
                match handler.call(self, &receiver, std::slice::from_ref(arg)) {
                    Ok(value) => self.resolve(child, value),
                    Err(reason) => self.reject(child, reason, false),
                }
            }
            None if fulfilled => self.fulfill(child, arg.clone()),
            None => self.reject(child, arg.clone(), false),
        }
    }
}
