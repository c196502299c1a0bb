//! FIFO job queue, timers and the asynchronous error channel.

use super::Runtime;
use crate::errors::UnhandledHookError;
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{error, trace};

/// A deferred unit of work.
pub type Job = Box<dyn FnOnce(&Runtime)>;

/// Handler receiving errors reported through the asynchronous error channel.
pub type AsyncErrorHandler = Rc<dyn Fn(&UnhandledHookError)>;

/// Single-threaded cooperative scheduler.
///
/// Jobs run strictly in the order they were queued. Timers fire by moving
/// their job to the back of the queue once their deadline has passed.
#[derive(Default)]
pub(crate) struct Scheduler {
    queue: RefCell<VecDeque<Job>>,
    timers: RefCell<BTreeMap<(Instant, u64), Job>>,
    timer_seq: Cell<u64>,
    async_errors: RefCell<Vec<UnhandledHookError>>,
    async_error_handler: RefCell<Option<AsyncErrorHandler>>,
}

impl Scheduler {
    /// Queues a job.
    pub fn invoke(&self, job: Job) {
        self.queue.borrow_mut().push_back(job);
    }

    /// Removes the next job, if any.
    pub fn pop(&self) -> Option<Job> {
        self.queue.borrow_mut().pop_front()
    }

    pub fn pending_jobs(&self) -> usize {
        self.queue.borrow().len()
    }

    /// Arms a timer. Timers are never disarmed.
    pub fn set_timeout(&self, delay: Duration, job: Job) {
        let seq = self.timer_seq.get();
        self.timer_seq.set(seq + 1);
        let deadline = Instant::now() + delay;
        trace!(?delay, seq, "Timer armed");
        self.timers.borrow_mut().insert((deadline, seq), job);
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.borrow().len()
    }

    /// Earliest armed deadline.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.borrow().keys().next().map(|(deadline, _)| *deadline)
    }

    /// Moves every expired timer into the job queue, earliest first.
    pub fn fire_due_timers(&self) -> usize {
        let now = Instant::now();
        let due: Vec<Job> = {
            let mut timers = self.timers.borrow_mut();
            let later = timers.split_off(&(now, u64::MAX));
            std::mem::replace(&mut *timers, later).into_values().collect()
        };
        let fired = due.len();
        for job in due {
            self.invoke(job);
        }
        fired
    }

    /// Reports an error that must not interrupt the current operation.
    pub fn throw_later(&self, err: UnhandledHookError) {
        error!(
            future = %err.future,
            reason = %err.reason,
            trace = ?err.trace,
            "Unhandled error in cancellation hook"
        );
        let handler = self.async_error_handler.borrow().clone();
        if let Some(handler) = handler {
            handler(&err);
        }
        self.async_errors.borrow_mut().push(err);
    }

    pub fn set_async_error_handler(&self, handler: AsyncErrorHandler) {
        *self.async_error_handler.borrow_mut() = Some(handler);
    }

    pub fn take_async_errors(&self) -> Vec<UnhandledHookError> {
        std::mem::take(&mut *self.async_errors.borrow_mut())
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("pending_jobs", &self.pending_jobs())
            .field("pending_timers", &self.pending_timers())
            .field("async_errors", &self.async_errors.borrow().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_is_fifo() {
        let scheduler = Scheduler::default();
        let order = Rc::new(RefCell::new(Vec::new()));
        for i in 0..3 {
            let order = order.clone();
            scheduler.invoke(Box::new(move |_: &Runtime| order.borrow_mut().push(i)));
        }
        assert_eq!(scheduler.pending_jobs(), 3);

        let rt = Runtime::new();
        while let Some(job) = scheduler.pop() {
            job(&rt);
        }
        assert_eq!(*order.borrow(), vec![0, 1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timers_fire_in_deadline_order() {
        let scheduler = Scheduler::default();
        let order = Rc::new(RefCell::new(Vec::new()));
        for (label, ms) in [("late", 20), ("early", 10), ("tie", 10)] {
            let order = order.clone();
            scheduler.set_timeout(
                Duration::from_millis(ms),
                Box::new(move |_: &Runtime| order.borrow_mut().push(label)),
            );
        }
        assert_eq!(scheduler.fire_due_timers(), 0);

        tokio::time::advance(Duration::from_millis(10)).await;
        assert_eq!(scheduler.fire_due_timers(), 2);
        assert_eq!(scheduler.pending_timers(), 1);

        let rt = Runtime::new();
        while let Some(job) = scheduler.pop() {
            job(&rt);
        }
        assert_eq!(*order.borrow(), vec!["early", "tie"]);
    }

    #[test]
    fn test_throw_later_collects_and_notifies() {
        let scheduler = Scheduler::default();
        let seen = Rc::new(Cell::new(0));
        let seen_clone = seen.clone();
        scheduler.set_async_error_handler(Rc::new(move |_: &UnhandledHookError| seen_clone.set(seen_clone.get() + 1)));

        scheduler.throw_later(UnhandledHookError {
            future: crate::core::FutureId(0),
            reason: crate::core::Value::from("bad"),
            trace: Vec::new(),
        });

        assert_eq!(seen.get(), 1);
        assert_eq!(scheduler.take_async_errors().len(), 1);
        assert!(scheduler.take_async_errors().is_empty());
    }
}
