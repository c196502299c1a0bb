//! Adapters that run synchronous functions eagerly and capture their outcome
//! in a future.
//!
//! A function that returns normally fulfills the future (or makes it follow
//! a returned future). A function that throws or panics rejects it. None of
//! these adapters ever report failure to their caller directly.

use crate::core::{Function, FutureId, Value};
use crate::errors::{PromiseError, SetupError};
use crate::runtime::Runtime;
use std::panic::Location;
use tracing::trace;

/// Wraps `f` so every call returns a future of its outcome.
///
/// The returned function creates a fresh future per call, invokes `f` with
/// the same receiver and arguments, and returns `Value::Future`. It never
/// returns `Err`.
///
/// # Errors
///
/// Returns [`SetupError`] right away if `f` is not a function.
///
/// # Example
///
/// ```
/// use promiseflow::core::Value;
/// use promiseflow::method::wrap;
/// use promiseflow::runtime::Runtime;
///
/// let rt = Runtime::new();
/// let double = wrap(Value::function(|_, _, args| match args.first() {
///     Some(Value::Number(n)) => Ok(Value::Number(n * 2.0)),
///     _ => Err(Value::from("not a number")),
/// }))
/// .unwrap();
///
/// let id = double.call(&rt, &Value::Undefined, &[Value::from(21)]).unwrap();
/// let id = id.as_future().unwrap();
/// assert_eq!(rt.value(id), Some(Value::from(42)));
///
/// assert!(wrap(Value::from("nope")).is_err());
/// ```
#[track_caller]
pub fn wrap(f: Value) -> Result<Function, SetupError> {
    let f = match f {
        Value::Function(f) => f,
        other => return Err(SetupError::not_callable(other.type_name())),
    };
    let location = Location::caller();
    let name = f.name().to_string();
    Ok(Function::named(name, move |rt, receiver, args| {
        let ret = rt.new_future();
        rt.capture_trace(ret, "wrapped call", location);
        let outcome = f.call(rt, receiver, args);
        rt.resolve_from_sync_value(ret, outcome);
        Ok(Value::Future(ret))
    }))
}

fn not_callable(f: &Value) -> Value {
    PromiseError::type_error(SetupError::not_callable(f.type_name()).to_string()).into()
}

impl Runtime {
    /// Calls `f` with no arguments right away and returns a future of its
    /// outcome. A non-function yields a future rejected with a type error.
    #[track_caller]
    pub fn attempt(&self, f: Value) -> FutureId {
        let location = Location::caller();
        let Value::Function(func) = &f else {
            return self.rejected(not_callable(&f));
        };
        let ret = self.new_future();
        self.capture_trace(ret, "attempt", location);
        let outcome = func.call(self, &Value::Undefined, &[]);
        self.resolve_from_sync_value(ret, outcome);
        ret
    }

    /// Alias of [`Runtime::attempt`].
    #[track_caller]
    pub fn r#try(&self, f: Value) -> FutureId {
        self.attempt(f)
    }

    /// Calls `f` with `receiver`, spreading a list `arg` into arguments and
    /// passing anything else as the only argument.
    #[deprecated(note = "bind the receiver and arguments in a closure and call `attempt`")]
    #[track_caller]
    pub fn attempt_with(&self, f: Value, arg: Value, receiver: Value) -> FutureId {
        let location = Location::caller();
        let Value::Function(func) = &f else {
            return self.rejected(not_callable(&f));
        };
        self.deprecated("calling attempt with more than 1 argument", "attempt");
        let ret = self.new_future();
        self.capture_trace(ret, "attempt", location);
        let outcome = match arg {
            Value::List(args) => func.call(self, &receiver, &args),
            arg => func.call(self, &receiver, std::slice::from_ref(&arg)),
        };
        self.resolve_from_sync_value(ret, outcome);
        ret
    }

    /// Settles `id` from the outcome of a synchronous call: `Err` rejects,
    /// `Ok` resolves and may follow a returned future.
    pub fn resolve_from_sync_value(&self, id: FutureId, outcome: Result<Value, Value>) {
        debug_assert!(!self.is_following(id), "{id} is already following");
        match outcome {
            Ok(value) => {
                trace!(future = %id, "Synchronous call returned");
                self.resolve(id, value);
            }
            Err(reason) => {
                trace!(future = %id, reason = %reason, "Synchronous call threw");
                self.reject(id, reason, false);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::RuntimeConfig;
    use crate::testing::{assert_fulfilled_with, assert_rejected_with, assert_type_error};
    use pretty_assertions::assert_eq;

    fn call_wrapped(rt: &Runtime, wrapped: &Function, receiver: Value, args: &[Value]) -> FutureId {
        let ret = wrapped.call(rt, &receiver, args).unwrap();
        ret.as_future().unwrap()
    }

    #[test]
    fn test_wrap_rejects_non_callable_eagerly() {
        let err = wrap(Value::Null).unwrap_err();
        assert_eq!(err.to_string(), "expecting a function but got null");
    }

    #[test]
    fn test_wrapped_throw_becomes_rejection() {
        let rt = Runtime::new();
        let wrapped = wrap(Value::function(|_, _, _| Err(PromiseError::error("x").into()))).unwrap();
        let id = call_wrapped(&rt, &wrapped, Value::Undefined, &[]);
        assert_rejected_with(&rt, id, &Value::from(PromiseError::error("x")));
    }

    #[test]
    fn test_wrapped_panic_becomes_rejection() {
        let rt = Runtime::new();
        let wrapped = wrap(Value::Function(Function::named("bad", |_, _, _| {
            panic!("went wrong")
        })))
        .unwrap();
        let id = call_wrapped(&rt, &wrapped, Value::Undefined, &[]);
        assert_rejected_with(
            &rt,
            id,
            &Value::from(PromiseError::error("bad panicked: went wrong")),
        );
    }

    #[test]
    fn test_wrapped_passes_receiver_and_args() {
        let rt = Runtime::new();
        let wrapped = wrap(Value::function(|_, receiver, args| {
            Ok(Value::List(
                std::iter::once(receiver.clone()).chain(args.iter().cloned()).collect(),
            ))
        }))
        .unwrap();
        let id = call_wrapped(&rt, &wrapped, Value::from("me"), &[Value::from(1), Value::from(2)]);
        assert_fulfilled_with(
            &rt,
            id,
            &Value::List(vec![Value::from("me"), Value::from(1), Value::from(2)]),
        );
    }

    #[test]
    fn test_wrapped_returning_future_follows_it() {
        let rt = Runtime::new();
        let inner = rt.new_future();
        let wrapped = wrap(Value::function(move |_, _, _| Ok(Value::Future(inner)))).unwrap();
        let id = call_wrapped(&rt, &wrapped, Value::Undefined, &[]);
        assert_eq!(rt.followee(id), Some(inner));

        rt.fulfill(inner, Value::from("later"));
        rt.run_until_idle();
        assert_fulfilled_with(&rt, id, &Value::from("later"));
    }

    #[test]
    fn test_wrapped_call_records_trace_when_enabled() {
        let rt = Runtime::with_config(RuntimeConfig::new().with_long_stack_traces(true));
        let wrapped = wrap(Value::function(|_, _, _| Ok(Value::Null))).unwrap();
        let id = call_wrapped(&rt, &wrapped, Value::Undefined, &[]);
        let trace = rt.trace(id);
        assert_eq!(trace.len(), 1);
        assert!(trace[0].starts_with("wrapped call at "));
        assert!(trace[0].contains("method.rs"));
    }

    #[test]
    fn test_attempt_runs_eagerly() {
        let rt = Runtime::new();
        let id = rt.attempt(Value::function(|_, _, _| Ok(Value::from(5))));
        assert_fulfilled_with(&rt, id, &Value::from(5));
        assert_eq!(rt.pending_jobs(), 0);

        let id = rt.r#try(Value::function(|_, _, _| Err(Value::from("nope"))));
        assert_rejected_with(&rt, id, &Value::from("nope"));
    }

    #[test]
    fn test_attempt_non_callable_returns_rejection() {
        let rt = Runtime::new();
        let id = rt.attempt(Value::from(true));
        assert_type_error(&rt, id, "expecting a function but got boolean");
    }

    #[test]
    #[allow(deprecated)]
    fn test_attempt_with_spreads_list_and_warns() {
        let rt = Runtime::new();
        let join = Value::function(|_, receiver, args| {
            let parts: Vec<String> = std::iter::once(receiver)
                .chain(args.iter())
                .map(ToString::to_string)
                .collect();
            Ok(Value::from(parts.join(",")))
        });

        let spread = rt.attempt_with(join.clone(), Value::from(vec![1, 2]), Value::from(0));
        assert_fulfilled_with(&rt, spread, &Value::from("0,1,2"));

        let single = rt.attempt_with(join, Value::from(7), Value::Null);
        assert_fulfilled_with(&rt, single, &Value::from("null,7"));

        let warnings = rt.take_warnings();
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].starts_with("calling attempt with more than 1 argument is deprecated"));
    }

    #[test]
    #[allow(deprecated)]
    fn test_attempt_with_non_callable_skips_notice() {
        let rt = Runtime::new();
        let id = rt.attempt_with(Value::Null, Value::Undefined, Value::Undefined);
        assert_type_error(&rt, id, "got null");
        assert!(rt.take_warnings().is_empty());
    }

    #[test]
    fn test_resolve_from_sync_value() {
        let rt = Runtime::new();
        let ok = rt.new_future();
        rt.resolve_from_sync_value(ok, Ok(Value::from("v")));
        assert_fulfilled_with(&rt, ok, &Value::from("v"));

        let err = rt.new_future();
        rt.resolve_from_sync_value(err, Err(Value::from("e")));
        assert_rejected_with(&rt, err, &Value::from("e"));
        assert_eq!(rt.unhandled_rejections(), vec![(err, Value::from("e"))]);
    }
}
