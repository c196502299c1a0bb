//! # Promiseflow
//!
//! Cancellable futures with cascading cleanup and bulk aggregation.
//!
//! Promiseflow provides a single-threaded future runtime with support for:
//!
//! - **Cascading cancellation**: cancelling a derived future walks up to the
//!   futures it was derived from, running cleanup hooks leaf to root
//! - **Composable cleanup hooks**: hooks registered on one future run in
//!   registration order, and failures never interrupt the cascade
//! - **Aggregation**: turn a list of values and futures into one future that
//!   short-circuits on the first rejection and fans cancellation out
//! - **Eager invocation**: run a synchronous function and capture its outcome
//!   in a future
//!
//! ## Quick Start
//!
//! ```rust
//! use promiseflow::prelude::*;
//!
//! let rt = Runtime::new();
//! let pending = rt.new_future();
//! let all = rt.all(Value::List(vec![Value::from(1), Value::Future(pending)]));
//!
//! rt.fulfill(pending, Value::from(2));
//! rt.run_until_idle();
//! assert_eq!(rt.value(all), Some(Value::from(vec![1, 2])));
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod aggregate;
pub mod cancellation;
pub mod core;
pub mod errors;
pub mod method;
pub mod runtime;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::aggregate::{AggregatePolicy, EmptyResult, SnapshotMode};
    pub use crate::cancellation::{CancelNotifiable, CleanupHook};
    pub use crate::core::{Disposition, Function, FutureId, Outcome, Value};
    pub use crate::errors::{PromiseError, PromiseflowError, SetupError, UnhandledHookError};
    pub use crate::method::wrap;
    pub use crate::runtime::{
        PropagateFlags, ProxyListener, Runtime, RuntimeConfig, SettlementListener,
    };
}
