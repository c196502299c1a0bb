//! Bulk aggregation of values and futures into one future.
//!
//! [`Runtime::all`] fulfills with the list of item values once every item has
//! fulfilled. [`Runtime::aggregate`] runs the same engine under a custom
//! [`AggregatePolicy`].
//!
//! The engine stays internal. Callers only hold the result future, so the
//! only way to cancel an aggregate is to cancel that future:
//!
//! ```
//! use promiseflow::prelude::*;
//!
//! let rt = Runtime::new();
//! let item = rt.new_future();
//! let all = rt.all(Value::List(vec![Value::Future(item)]));
//!
//! rt.cancel(all);
//! rt.run_until_idle();
//! assert_eq!(rt.disposition(item), Disposition::Cancelled);
//! ```
//!
//! ```compile_fail
//! use promiseflow::aggregate::Aggregator;
//! ```

mod aggregator;
mod policy;


pub(crate) use aggregator::Aggregator;
pub use policy::{AggregatePolicy, EmptyResult, SnapshotMode};

use crate::core::{FutureId, Value};
use crate::runtime::Runtime;

impl Runtime {
    /// Aggregates `input`, a list or a future of a list, tracking every item.
    pub fn all(&self, input: Value) -> FutureId {
        self.aggregate(input, AggregatePolicy::all())
    }

    /// Aggregates `input` under `policy` and returns the result future.
    pub fn aggregate(&self, input: Value, policy: AggregatePolicy) -> FutureId {
        Aggregator::start(self, input, policy).result()
    }
}
