//! Policies distinguishing aggregation flavors that share one engine.

use crate::core::{Function, Value};
use crate::runtime::Runtime;
use std::collections::BTreeMap;

/// How the aggregator stores per-index results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SnapshotMode {
    /// Start from an empty snapshot sized to the tracked length.
    #[default]
    Copy,
    /// Start from the input items, overwriting tracked indices as they
    /// settle. Items beyond the tracked length appear in the result as is.
    InPlace,
}

/// What an aggregate of an empty collection resolves to.
#[derive(Debug, Clone, Default)]
pub enum EmptyResult {
    /// An empty list.
    #[default]
    List,
    /// An empty object.
    Object,
    /// The outcome of calling a function with no arguments.
    Hook(Function),
}

impl EmptyResult {
    /// Produces the outcome for an empty input.
    pub(crate) fn produce(&self, rt: &Runtime) -> Result<Value, Value> {
        match self {
            Self::List => Ok(Value::List(Vec::new())),
            Self::Object => Ok(Value::Object(BTreeMap::new())),
            Self::Hook(hook) => hook.call(rt, &Value::Undefined, &[]),
        }
    }
}

/// Extension points of the aggregation engine.
///
/// # Example
///
/// ```
/// use promiseflow::aggregate::{AggregatePolicy, SnapshotMode};
///
/// let policy = AggregatePolicy::all()
///     .with_length_cap(2)
///     .with_snapshot(SnapshotMode::InPlace);
/// assert_eq!(policy.tracked_length(5), 2);
/// assert_eq!(policy.tracked_length(1), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct AggregatePolicy {
    /// Upper bound on the number of tracked items. `None` tracks every item.
    pub length_cap: Option<usize>,
    /// Snapshot initialization.
    pub snapshot: SnapshotMode,
    /// Resolution of an empty input.
    pub empty: EmptyResult,
}

impl AggregatePolicy {
    /// Tracks every item, copies into a fresh snapshot and resolves an empty
    /// input to an empty list.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Tracks only the first item.
    #[must_use]
    pub fn first_settled() -> Self {
        Self::all().with_length_cap(1)
    }

    /// Caps the number of tracked items.
    #[must_use]
    pub fn with_length_cap(mut self, cap: usize) -> Self {
        self.length_cap = Some(cap);
        self
    }

    /// Sets the snapshot mode.
    #[must_use]
    pub fn with_snapshot(mut self, mode: SnapshotMode) -> Self {
        self.snapshot = mode;
        self
    }

    /// Sets the empty result.
    #[must_use]
    pub fn with_empty(mut self, empty: EmptyResult) -> Self {
        self.empty = empty;
        self
    }

    /// Returns how many of `len` input items are tracked.
    #[must_use]
    pub fn tracked_length(&self, len: usize) -> usize {
        self.length_cap.map_or(len, |cap| cap.min(len))
    }
}
