//! The future runtime: record arena, settlement, scheduling and diagnostics.
//!
//! A [`Runtime`] owns every future it creates. Futures are addressed by
//! [`FutureId`] handles, so back-references between futures (cancellation
//! parents, followees) are lookups rather than owning pointers.
//!
//! All notifications between futures go through the runtime's FIFO job
//! queue. Nothing runs until the queue is drained with
//! [`Runtime::run_until_idle`], [`Runtime::run`] or [`Runtime::wait`].

mod arena;
mod config;
mod debug;
mod listener;
mod scheduler;
mod settle;

#[cfg(test)]
mod runtime_tests;

pub use config::{RuntimeConfig, ENV_CANCELLATION, ENV_LONG_STACK_TRACES, ENV_WARNINGS};
pub use listener::{ProxyListener, SettlementListener};
pub use scheduler::{AsyncErrorHandler, Job};
pub use settle::PropagateFlags;

pub(crate) use arena::{FutureRecord, FutureState, Reaction};

use crate::core::{Disposition, FutureId, Outcome, Value};
use crate::errors::UnhandledHookError;
use arena::Arena;
use debug::Diagnostics;
use futures::channel::oneshot;
use scheduler::Scheduler;
use std::cell::RefCell;
use std::panic::Location;
use std::rc::Rc;
use std::time::Duration;
use tracing::{debug, info_span, trace, Span};
use uuid::Uuid;

/// A single-threaded future runtime.
pub struct Runtime {
    id: Uuid,
    arena: RefCell<Arena>,
    scheduler: Scheduler,
    diagnostics: Diagnostics,
    span: Span,
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Runtime {
    /// Creates a runtime with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    /// Creates a runtime with the given configuration.
    #[must_use]
    pub fn with_config(config: RuntimeConfig) -> Self {
        let id = Uuid::new_v4();
        let span = info_span!("promiseflow_runtime", runtime_id = %id);
        debug!(runtime_id = %id, ?config, "Runtime created");
        Self {
            id,
            arena: RefCell::new(Arena::default()),
            scheduler: Scheduler::default(),
            diagnostics: Diagnostics::new(config),
            span,
        }
    }

    /// Returns the runtime identifier used in log fields.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Returns the runtime configuration.
    #[must_use]
    pub fn config(&self) -> &RuntimeConfig {
        self.diagnostics.config()
    }

    /// Creates a new pending future.
    pub fn new_future(&self) -> FutureId {
        self.arena.borrow_mut().insert()
    }

    /// Returns the number of futures created so far.
    #[must_use]
    pub fn future_count(&self) -> usize {
        self.arena.borrow().len()
    }

    pub(crate) fn with_record<R>(&self, id: FutureId, f: impl FnOnce(&FutureRecord) -> R) -> R {
        f(self.arena.borrow().get(id))
    }

    pub(crate) fn with_record_mut<R>(
        &self,
        id: FutureId,
        f: impl FnOnce(&mut FutureRecord) -> R,
    ) -> R {
        f(self.arena.borrow_mut().get_mut(id))
    }

    // -- state predicates -------------------------------------------------

    /// Returns true if the future has not settled. Cancelled futures are
    /// still pending in this sense.
    #[must_use]
    pub fn is_pending(&self, id: FutureId) -> bool {
        self.with_record(id, FutureRecord::is_pending)
    }

    /// Returns true if the future was fulfilled.
    #[must_use]
    pub fn is_fulfilled(&self, id: FutureId) -> bool {
        self.disposition(id) == Disposition::Fulfilled
    }

    /// Returns true if the future was rejected.
    #[must_use]
    pub fn is_rejected(&self, id: FutureId) -> bool {
        self.disposition(id) == Disposition::Rejected
    }

    /// Returns true if the future was cancelled.
    #[must_use]
    pub fn is_cancelled(&self, id: FutureId) -> bool {
        self.with_record(id, |r| r.cancelled)
    }

    /// Returns true if the future is following another future.
    #[must_use]
    pub fn is_following(&self, id: FutureId) -> bool {
        self.with_record(id, |r| r.followee.is_some())
    }

    /// Returns true if the future is pending, not cancelled and has not
    /// adopted another future's outcome.
    #[must_use]
    pub fn is_pending_and_waiting(&self, id: FutureId) -> bool {
        self.with_record(id, |r| r.is_cancellable() && r.followee.is_none())
    }

    /// Returns the disposition of the future.
    #[must_use]
    pub fn disposition(&self, id: FutureId) -> Disposition {
        self.with_record(id, FutureRecord::disposition)
    }

    /// Returns the current outcome of the future.
    #[must_use]
    pub fn outcome(&self, id: FutureId) -> Outcome {
        self.with_record(id, FutureRecord::outcome)
    }

    /// Returns the fulfillment value, if fulfilled.
    #[must_use]
    pub fn value(&self, id: FutureId) -> Option<Value> {
        self.with_record(id, |r| match &r.state {
            FutureState::Fulfilled(v) => Some(v.clone()),
            _ => None,
        })
    }

    /// Returns the rejection reason, if rejected.
    #[must_use]
    pub fn reason(&self, id: FutureId) -> Option<Value> {
        self.with_record(id, |r| match &r.state {
            FutureState::Rejected(reason) => Some(reason.clone()),
            _ => None,
        })
    }

    /// Returns the receiver used when invoking the future's callback hooks.
    #[must_use]
    pub fn bound_context(&self, id: FutureId) -> Value {
        self.with_record(id, |r| r.bound_context.clone())
    }

    /// Returns the future this one was derived from, if still linked.
    #[must_use]
    pub fn cancellation_parent(&self, id: FutureId) -> Option<FutureId> {
        self.with_record(id, |r| r.cancellation_parent)
    }

    /// Returns the future whose outcome this one adopted.
    #[must_use]
    pub fn followee(&self, id: FutureId) -> Option<FutureId> {
        self.with_record(id, |r| r.followee)
    }

    /// Returns the trace frames recorded for the future.
    #[must_use]
    pub fn trace(&self, id: FutureId) -> Vec<String> {
        self.with_record(id, |r| r.trace.clone())
    }

    // -- diagnostics ------------------------------------------------------

    pub(crate) fn cancellation_enabled(&self) -> bool {
        self.diagnostics.cancellation_enabled()
    }

    pub(crate) fn warn(&self, message: impl Into<String>) {
        self.diagnostics.warn(message);
    }

    pub(crate) fn deprecated(&self, what: &str, replacement: &str) {
        self.diagnostics.deprecated(what, replacement);
    }

    /// Records a trace frame for `id` at `location` when trace capture is on.
    pub(crate) fn capture_trace(&self, id: FutureId, label: &str, location: &Location<'_>) {
        if let Some(frame) = self.diagnostics.trace_frame(label, location) {
            self.with_record_mut(id, |r| self.diagnostics.push_frame(&mut r.trace, frame));
        }
    }

    /// Returns the future's trace enriched with a frame describing `context`.
    pub(crate) fn attach_extra_trace(&self, id: FutureId, context: &str) -> Vec<String> {
        let mut trace = self.trace(id);
        if self.config().long_stack_traces {
            self.diagnostics.push_frame(&mut trace, format!("{context} of {id}"));
        }
        trace
    }

    /// Drains and returns the warnings emitted so far.
    pub fn take_warnings(&self) -> Vec<String> {
        self.diagnostics.take_warnings()
    }

    // -- scheduling -------------------------------------------------------

    /// Queues a job to run after everything already queued.
    pub fn invoke(&self, job: impl FnOnce(&Self) + 'static) {
        self.scheduler.invoke(Box::new(job));
    }

    /// Arms a timer that queues `job` once `delay` has elapsed.
    pub fn set_timeout(&self, delay: Duration, job: impl FnOnce(&Self) + 'static) {
        self.scheduler.set_timeout(delay, Box::new(job));
    }

    pub(crate) fn throw_later(&self, err: UnhandledHookError) {
        self.scheduler.throw_later(err);
    }

    /// Installs a handler for errors reported through the asynchronous
    /// error channel.
    pub fn on_async_error(&self, handler: impl Fn(&UnhandledHookError) + 'static) {
        self.scheduler.set_async_error_handler(Rc::new(handler));
    }

    /// Drains and returns the errors reported through the asynchronous
    /// error channel.
    pub fn take_async_errors(&self) -> Vec<UnhandledHookError> {
        self.scheduler.take_async_errors()
    }

    /// Returns the number of queued jobs.
    #[must_use]
    pub fn pending_jobs(&self) -> usize {
        self.scheduler.pending_jobs()
    }

    /// Returns the number of armed timers.
    #[must_use]
    pub fn pending_timers(&self) -> usize {
        self.scheduler.pending_timers()
    }

    /// Queues the jobs of every expired timer. Returns how many fired.
    pub fn fire_due_timers(&self) -> usize {
        self.scheduler.fire_due_timers()
    }

    /// Runs queued jobs until the queue is empty, including jobs queued by
    /// the jobs themselves. Returns the number of jobs run.
    pub fn run_until_idle(&self) -> usize {
        let _entered = self.span.enter();
        let mut ran = 0;
        while let Some(job) = self.scheduler.pop() {
            job(self);
            ran += 1;
        }
        if ran > 0 {
            trace!(jobs = ran, "Job queue drained");
        }
        ran
    }

    /// Runs jobs and timers until neither remain, sleeping on the tokio clock
    /// between timers.
    pub async fn run(&self) {
        loop {
            self.fire_due_timers();
            self.run_until_idle();
            let Some(deadline) = self.scheduler.next_deadline() else {
                break;
            };
            tokio::time::sleep_until(deadline).await;
        }
    }

    /// Drives the runtime until `id` settles or no work is left, and returns
    /// its outcome. A future that is still pending when the runtime goes idle
    /// yields [`Outcome::Pending`].
    pub async fn wait(&self, id: FutureId) -> Outcome {
        let (tx, mut rx) = oneshot::channel();
        self.listen(id, Rc::new(OutcomeListener::new(tx)));
        loop {
            self.fire_due_timers();
            self.run_until_idle();
            if let Ok(Some(outcome)) = rx.try_recv() {
                return outcome;
            }
            match self.scheduler.next_deadline() {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => return self.outcome(id),
            }
        }
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("id", &self.id)
            .field("futures", &self.future_count())
            .field("scheduler", &self.scheduler)
            .finish()
    }
}

/// Forwards a settlement into a oneshot channel.
struct OutcomeListener {
    tx: RefCell<Option<oneshot::Sender<Outcome>>>,
}

impl OutcomeListener {
    fn new(tx: oneshot::Sender<Outcome>) -> Self {
        Self {
            tx: RefCell::new(Some(tx)),
        }
    }

    fn send(&self, outcome: Outcome) {
        if let Some(tx) = self.tx.borrow_mut().take() {
            // Receiver dropped: nobody is waiting.
            let _ = tx.send(outcome);
        }
    }
}

impl SettlementListener for OutcomeListener {
    fn on_fulfilled(&self, _rt: &Runtime, value: Value) {
        self.send(Outcome::Fulfilled(value));
    }

    fn on_rejected(&self, _rt: &Runtime, reason: Value) {
        self.send(Outcome::Rejected(reason));
    }

    fn on_cancelled(&self, _rt: &Runtime) {
        self.send(Outcome::Cancelled);
    }
}
