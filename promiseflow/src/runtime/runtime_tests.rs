//! Tests for settlement, adoption and the job loop.

#[cfg(test)]
mod tests {
    use crate::core::{Disposition, Function, Outcome, Value};
    use crate::runtime::{OutcomeListener, Runtime, RuntimeConfig, SettlementListener};
    use crate::testing::{
        assert_fulfilled_with, assert_pending, assert_rejected_with, assert_type_error,
        init_test_logging, HookRecorder,
    };
    use futures::channel::oneshot;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::Duration;

    #[derive(Default)]
    struct Collect {
        seen: RefCell<Vec<String>>,
    }

    impl SettlementListener for Collect {
        fn on_fulfilled(&self, _rt: &Runtime, value: Value) {
            self.seen.borrow_mut().push(format!("fulfilled {value}"));
        }

        fn on_rejected(&self, _rt: &Runtime, reason: Value) {
            self.seen.borrow_mut().push(format!("rejected {reason}"));
        }

        fn on_cancelled(&self, _rt: &Runtime) {
            self.seen.borrow_mut().push("cancelled".to_string());
        }
    }

    fn add_one() -> Function {
        Function::named("add_one", |_, _, args| match args.first() {
            Some(Value::Number(n)) => Ok(Value::Number(n + 1.0)),
            _ => Err(Value::from("not a number")),
        })
    }

    #[test]
    fn test_new_runtime_is_empty() {
        let rt = Runtime::new();
        assert_eq!(rt.future_count(), 0);
        assert_eq!(rt.pending_jobs(), 0);
        assert_eq!(rt.run_until_idle(), 0);
        assert!(rt.config().cancellation);
    }

    #[test]
    fn test_settles_only_once() {
        let rt = Runtime::new();
        let f = rt.new_future();
        rt.fulfill(f, Value::from(1));
        rt.fulfill(f, Value::from(2));
        rt.reject(f, Value::from("late"), false);
        assert_fulfilled_with(&rt, f, &Value::from(1));
        assert_eq!(rt.disposition(f), Disposition::Fulfilled);
    }

    #[test]
    fn test_cancelled_future_ignores_settlement() {
        let rt = Runtime::new();
        let f = rt.new_future();
        rt.cancel(f);
        rt.fulfill(f, Value::from(1));
        assert_eq!(rt.outcome(f), Outcome::Cancelled);
        assert_eq!(rt.value(f), None);
    }

    #[test]
    fn test_listeners_are_notified_in_a_job() {
        init_test_logging();
        let rt = Runtime::new();
        let listener = Rc::new(Collect::default());
        let f = rt.new_future();
        rt.listen(f, listener.clone());

        rt.fulfill(f, Value::from("x"));
        assert!(listener.seen.borrow().is_empty());
        assert_eq!(rt.pending_jobs(), 1);

        rt.run_until_idle();
        assert_eq!(*listener.seen.borrow(), vec!["fulfilled \"x\""]);
    }

    #[test]
    fn test_listening_to_settled_future_schedules_notification() {
        let rt = Runtime::new();
        let listener = Rc::new(Collect::default());
        let f = rt.rejected(Value::from("no"));
        rt.listen(f, listener.clone());
        rt.run_until_idle();
        assert_eq!(*listener.seen.borrow(), vec!["rejected \"no\""]);
    }

    #[test]
    fn test_then_runs_handler() {
        let rt = Runtime::new();
        let f = rt.resolved(Value::from(1));
        let g = rt.then(f, Some(add_one()), None);
        assert_pending(&rt, g);
        rt.run_until_idle();
        assert_fulfilled_with(&rt, g, &Value::from(2));
    }

    #[test]
    fn test_then_without_handler_passes_through() {
        let rt = Runtime::new();
        let f = rt.rejected(Value::from("boom"));
        let g = rt.then(f, Some(add_one()), None);
        rt.run_until_idle();
        assert_rejected_with(&rt, g, &Value::from("boom"));
    }

    #[test]
    fn test_throwing_handler_rejects_child() {
        let rt = Runtime::new();
        let f = rt.resolved(Value::from("text"));
        let g = rt.then(f, Some(add_one()), None);
        rt.run_until_idle();
        assert_rejected_with(&rt, g, &Value::from("not a number"));
    }

    #[test]
    fn test_resolve_adopts_future_outcome() {
        let rt = Runtime::new();
        let inner = rt.new_future();
        let outer = rt.resolved(Value::Future(inner));
        assert!(rt.is_following(outer));
        assert_eq!(rt.followee(outer), Some(inner));
        assert_eq!(rt.target(outer), inner);
        assert!(!rt.is_pending_and_waiting(outer));

        rt.fulfill(inner, Value::from(7));
        rt.run_until_idle();
        assert_fulfilled_with(&rt, outer, &Value::from(7));
    }

    #[test]
    fn test_resolve_with_settled_future_settles_immediately() {
        let rt = Runtime::new();
        let inner = rt.resolved(Value::from(3));
        let outer = rt.resolved(Value::Future(inner));
        assert_fulfilled_with(&rt, outer, &Value::from(3));
    }

    #[test]
    fn test_to_future_follows_adoption_chain() {
        let rt = Runtime::new();
        let inner = rt.new_future();
        let outer = rt.resolved(Value::Future(inner));
        assert_eq!(rt.to_future(Value::Future(outer)), Value::Future(inner));
        assert_eq!(rt.to_future(Value::from(1)), Value::from(1));
    }

    #[test]
    fn test_outcome_listener_tolerates_dropped_receiver() {
        let rt = Runtime::new();
        let (tx, rx) = oneshot::channel();
        drop(rx);
        let listener = OutcomeListener::new(tx);

        listener.on_fulfilled(&rt, Value::from(1));
        listener.on_cancelled(&rt);
        assert!(listener.tx.borrow().is_none());
    }

    #[test]
    fn test_circular_resolution_is_a_type_error() {
        let rt = Runtime::new();
        let f = rt.new_future();
        rt.resolve(f, Value::Future(f));
        assert_type_error(&rt, f, "circular");
    }

    #[test]
    fn test_bind_sets_receiver_for_handlers() {
        let rt = Runtime::new();
        let recorder = HookRecorder::new();
        let f = rt.resolved(Value::Null);
        let bound = rt.bind(f, Value::from("self"));
        assert_eq!(rt.bound_context(bound), Value::from("self"));

        let derived = rt.then(bound, recorder.receiver_hook().as_function().cloned(), None);
        rt.run_until_idle();
        assert_eq!(recorder.entries(), vec!["\"self\""]);
        assert_fulfilled_with(&rt, derived, &Value::Undefined);
    }

    #[test]
    fn test_then_links_cancellation_parent_only_while_cancellable() {
        let rt = Runtime::new();
        let pending = rt.new_future();
        let settled = rt.resolved(Value::Null);
        let a = rt.then(pending, None, None);
        let b = rt.then(settled, None, None);
        assert_eq!(rt.cancellation_parent(a), Some(pending));
        assert_eq!(rt.cancellation_parent(b), None);
    }

    #[test]
    fn test_unhandled_rejections_excludes_observed() {
        let rt = Runtime::new();
        let lonely = rt.rejected(Value::from("lonely"));
        let watched = rt.rejected(Value::from("watched"));
        rt.then(watched, None, None);
        let handled = rt.new_future();
        rt.reject(handled, Value::from("handled"), true);

        assert_eq!(
            rt.unhandled_rejections(),
            vec![(lonely, Value::from("lonely"))]
        );
    }

    #[test]
    fn test_jobs_run_in_fifo_order() {
        let rt = Runtime::new();
        let recorder = HookRecorder::new();
        for label in ["one", "two"] {
            let recorder = recorder.clone();
            rt.invoke(move |rt| {
                recorder.record(label);
                let recorder = recorder.clone();
                rt.invoke(move |_| recorder.record(format!("{label} nested")));
            });
        }
        assert_eq!(rt.run_until_idle(), 4);
        assert_eq!(
            recorder.entries(),
            vec!["one", "two", "one nested", "two nested"]
        );
    }

    #[test]
    fn test_trace_capture_respects_config() {
        let quiet = Runtime::new();
        let f = quiet.new_future();
        quiet.capture_trace(f, "created", std::panic::Location::caller());
        assert!(quiet.trace(f).is_empty());

        let verbose = Runtime::with_config(RuntimeConfig::new().with_long_stack_traces(true));
        let g = verbose.new_future();
        verbose.capture_trace(g, "created", std::panic::Location::caller());
        assert_eq!(verbose.trace(g).len(), 1);
        assert!(verbose.trace(g)[0].starts_with("created at "));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_drives_timers_in_deadline_order() {
        let rt = Runtime::new();
        let recorder = HookRecorder::new();
        for (label, ms) in [("late", 30), ("early", 10)] {
            let recorder = recorder.clone();
            rt.set_timeout(Duration::from_millis(ms), move |_| recorder.record(label));
        }
        rt.run().await;
        assert_eq!(recorder.entries(), vec!["early", "late"]);
        assert_eq!(rt.pending_timers(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_returns_outcome_settled_by_timer() {
        let rt = Runtime::new();
        let f = rt.new_future();
        rt.set_timeout(Duration::from_secs(1), move |rt| rt.fulfill(f, Value::from("late")));
        assert_eq!(rt.wait(f).await, Outcome::Fulfilled(Value::from("late")));
    }

    #[test]
    fn test_wait_reports_pending_when_idle() {
        let rt = Runtime::new();
        let f = rt.new_future();
        let outcome = tokio_test::block_on(rt.wait(f));
        assert_eq!(outcome, Outcome::Pending);
    }

    #[test]
    fn test_wait_observes_cancellation() {
        let rt = Runtime::new();
        let f = rt.new_future();
        let g = rt.then(f, None, None);
        rt.cancel(f);
        let outcome = tokio_test::block_on(rt.wait(g));
        assert_eq!(outcome, Outcome::Cancelled);
    }
}
