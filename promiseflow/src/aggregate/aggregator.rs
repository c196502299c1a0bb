//! The aggregation engine.
//!
//! An [`Aggregator`] turns a list of values and futures, or a future of such
//! a list, into one result future. It fulfills once every tracked item has
//! fulfilled, rejects with the first rejection it sees and cancels when any
//! item is cancelled. Cancelling the result fans out to every constituent
//! that has not settled yet.
//!
//! All per-index callbacks funnel through one snapshot. The first terminal
//! event swaps it for [`Snapshot::Resolved`], which turns every later
//! callback into a no-op.

use super::{AggregatePolicy, SnapshotMode};
use crate::cancellation::{CancelNotifiable, CleanupHook};
use crate::core::{FutureId, Outcome, Value};
use crate::errors::PromiseError;
use crate::runtime::{PropagateFlags, ProxyListener, Runtime, SettlementListener};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, trace};

/// One tracked position of the snapshot.
#[derive(Debug, Clone, PartialEq)]
enum Slot {
    Empty,
    Waiting(FutureId),
    Value(Value),
}

impl Slot {
    fn into_value(self) -> Value {
        match self {
            Self::Empty => Value::Undefined,
            Self::Waiting(id) => Value::Future(id),
            Self::Value(v) => v,
        }
    }
}

#[derive(Debug)]
enum Snapshot {
    /// Input not examined yet.
    Unstarted,
    /// Waiting on a future that will produce the input list.
    Awaiting(FutureId),
    /// Collecting per-index results.
    Live(Vec<Slot>),
    /// A terminal event was committed.
    Resolved,
}

#[derive(Debug)]
struct AggregateState {
    snapshot: Snapshot,
    declared_length: usize,
    settled_count: usize,
}

/// Aggregates a collection of values and futures into one future.
#[derive(Debug)]
pub(crate) struct Aggregator {
    result: FutureId,
    policy: AggregatePolicy,
    state: RefCell<AggregateState>,
}

impl Aggregator {
    /// Creates the result future for `input` and starts aggregating.
    ///
    /// A future input links the result's cancellation parent and bound
    /// context to it. The aggregator installs itself as the result's cleanup
    /// hook, so cancelling the result reaches [`CancelNotifiable`].
    pub fn start(rt: &Runtime, input: Value, policy: AggregatePolicy) -> Rc<Self> {
        let result = rt.new_future();
        if let Value::Future(source) = input {
            rt.propagate_from(result, source, PropagateFlags::CANCEL | PropagateFlags::BIND);
        }
        let this = Rc::new(Self {
            result,
            policy,
            state: RefCell::new(AggregateState {
                snapshot: Snapshot::Unstarted,
                declared_length: 0,
                settled_count: 0,
            }),
        });
        rt.set_cleanup_hook(result, CleanupHook::Notifiable(this.clone()));
        debug!(result = %result, input = input.type_name(), "Aggregate started");
        Self::init(&this, rt, input);
        this
    }

    /// Returns the result future.
    #[must_use]
    pub fn result(&self) -> FutureId {
        self.result
    }

    /// Returns the number of tracked items, or 0 before the input list is
    /// known.
    #[must_use]
    pub fn length(&self) -> usize {
        self.state.borrow().declared_length
    }

    /// Returns true once the aggregate has committed a terminal event.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        matches!(self.state.borrow().snapshot, Snapshot::Resolved)
    }

    fn init(this: &Rc<Self>, rt: &Runtime, input: Value) {
        let Value::Future(source) = rt.to_future(input.clone()) else {
            Self::iterate(this, rt, input);
            return;
        };
        match rt.outcome(source) {
            Outcome::Fulfilled(value) => Self::iterate(this, rt, value),
            Outcome::Pending => {
                this.state.borrow_mut().snapshot = Snapshot::Awaiting(source);
                trace!(result = %this.result, input = %source, "Aggregate awaiting input");
                rt.listen(
                    source,
                    Rc::new(InputListener {
                        aggregator: this.clone(),
                    }),
                );
            }
            Outcome::Rejected(reason) => {
                rt.mark_rejection_handled(source);
                this.reject(rt, reason);
            }
            Outcome::Cancelled => this.cancel(rt),
        }
    }

    fn iterate(this: &Rc<Self>, rt: &Runtime, values: Value) {
        let Value::List(items) = values else {
            let err = PromiseError::type_error(format!(
                "expecting an array or an iterable object but got {}",
                values.type_name()
            ));
            this.reject(rt, err.into());
            return;
        };
        if items.is_empty() {
            this.resolve_empty(rt);
            return;
        }

        let len = this.policy.tracked_length(items.len());
        let slots = match this.policy.snapshot {
            SnapshotMode::Copy => vec![Slot::Empty; len],
            SnapshotMode::InPlace => items.iter().cloned().map(Slot::Value).collect(),
        };
        {
            let mut state = this.state.borrow_mut();
            state.declared_length = len;
            state.snapshot = Snapshot::Live(slots);
        }
        debug!(result = %this.result, items = items.len(), tracked = len, "Aggregate iterating");
        if len == 0 {
            this.resolve_with_snapshot(rt);
            return;
        }

        let listener: Rc<dyn ProxyListener> = this.clone();
        for (index, item) in items.into_iter().take(len).enumerate() {
            let resolved = this.is_resolved();
            match rt.to_future(item) {
                Value::Future(target) if resolved => rt.mark_rejection_handled(target),
                Value::Future(target) => match rt.outcome(target) {
                    Outcome::Pending => {
                        rt.proxy(target, listener.clone(), index);
                        this.store(index, Slot::Waiting(target));
                    }
                    Outcome::Fulfilled(value) => this.fulfilled(rt, value, index),
                    Outcome::Rejected(reason) => {
                        rt.mark_rejection_handled(target);
                        this.rejected(rt, reason, index);
                    }
                    Outcome::Cancelled => this.cancelled(rt, index),
                },
                _ if resolved => {}
                plain => this.fulfilled(rt, plain, index),
            }
        }
    }

    fn store(&self, index: usize, slot: Slot) {
        if let Snapshot::Live(slots) = &mut self.state.borrow_mut().snapshot {
            slots[index] = slot;
        }
    }

    /// Commits the terminal event, returning the snapshot it replaced.
    fn commit(&self) -> Snapshot {
        std::mem::replace(&mut self.state.borrow_mut().snapshot, Snapshot::Resolved)
    }

    fn resolve_empty(&self, rt: &Runtime) {
        self.commit();
        match self.policy.empty.produce(rt) {
            Ok(value) => rt.resolve(self.result, value),
            Err(reason) => rt.reject(self.result, reason, false),
        }
    }

    fn resolve_with_snapshot(&self, rt: &Runtime) {
        // A cancelled result keeps its snapshot for the queued fan-out.
        if !rt.is_cancellable(self.result) {
            return;
        }
        if let Snapshot::Live(slots) = self.commit() {
            let values = slots.into_iter().map(Slot::into_value).collect();
            debug!(result = %self.result, "Aggregate fulfilled");
            rt.fulfill(self.result, Value::List(values));
        }
    }

    fn reject(&self, rt: &Runtime, reason: Value) {
        if !rt.is_cancellable(self.result) {
            return;
        }
        self.commit();
        debug!(result = %self.result, reason = %reason, "Aggregate rejected");
        rt.reject(self.result, reason, false);
    }

    /// Cancels the aggregate. Does nothing once resolved or if the result is
    /// no longer cancellable.
    fn cancel(&self, rt: &Runtime) {
        if self.is_resolved() || !rt.is_cancellable(self.result) {
            return;
        }
        self.commit();
        debug!(result = %self.result, "Aggregate cancelled");
        rt.finalize_cancelled(self.result);
    }
}

impl ProxyListener for Aggregator {
    fn fulfilled(&self, rt: &Runtime, value: Value, index: usize) {
        let complete = {
            let mut state = self.state.borrow_mut();
            let state = &mut *state;
            let Snapshot::Live(slots) = &mut state.snapshot else {
                return;
            };
            slots[index] = Slot::Value(value);
            state.settled_count += 1;
            state.settled_count >= state.declared_length
        };
        trace!(result = %self.result, index, "Aggregate item fulfilled");
        if complete {
            self.resolve_with_snapshot(rt);
        }
    }

    fn rejected(&self, rt: &Runtime, reason: Value, index: usize) {
        {
            let mut state = self.state.borrow_mut();
            if !matches!(state.snapshot, Snapshot::Live(_)) {
                return;
            }
            state.settled_count += 1;
        }
        trace!(result = %self.result, index, "Aggregate item rejected");
        self.reject(rt, reason);
    }

    fn cancelled(&self, rt: &Runtime, index: usize) {
        trace!(result = %self.result, index, "Aggregate item cancelled");
        self.cancel(rt);
    }
}

impl CancelNotifiable for Aggregator {
    fn result_cancelled(&self, rt: &Runtime, _origin: FutureId) {
        if self.is_resolved() {
            return;
        }
        let previous = self.commit();
        if rt.is_cancellable(self.result) {
            rt.finalize_cancelled(self.result);
        }
        match previous {
            Snapshot::Awaiting(source) => {
                debug!(result = %self.result, input = %source, "Aggregate cancelling input");
                rt.cancel(source);
            }
            Snapshot::Live(slots) => {
                let pending: Vec<FutureId> = slots
                    .into_iter()
                    .filter_map(|slot| match slot {
                        Slot::Waiting(id) if rt.is_cancellable(id) => Some(id),
                        _ => None,
                    })
                    .collect();
                debug!(result = %self.result, constituents = pending.len(), "Aggregate fanning out cancellation");
                for id in pending {
                    rt.cancel(id);
                }
            }
            Snapshot::Unstarted | Snapshot::Resolved => {}
        }
    }
}

/// Waits for a future input to produce the list to aggregate.
struct InputListener {
    aggregator: Rc<Aggregator>,
}

impl SettlementListener for InputListener {
    fn on_fulfilled(&self, rt: &Runtime, value: Value) {
        if matches!(self.aggregator.state.borrow().snapshot, Snapshot::Awaiting(_)) {
            Aggregator::iterate(&self.aggregator, rt, value);
        }
    }

    fn on_rejected(&self, rt: &Runtime, reason: Value) {
        if !self.aggregator.is_resolved() {
            self.aggregator.reject(rt, reason);
        }
    }

    fn on_cancelled(&self, rt: &Runtime) {
        self.aggregator.cancel(rt);
    }
}
