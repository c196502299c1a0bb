//! Arena storage for future records.

use super::{ProxyListener, SettlementListener};
use crate::cancellation::CleanupHook;
use crate::core::{Disposition, Function, FutureId, Outcome, Value};
use std::rc::Rc;

/// Settlement state of a record. Cancellation is tracked separately.
#[derive(Debug, Clone)]
pub(crate) enum FutureState {
    Pending,
    Fulfilled(Value),
    Rejected(Value),
}

/// A dependent waiting on a record's settlement.
pub(crate) enum Reaction {
    /// A derived future created by `then`.
    Then {
        child: FutureId,
        on_fulfilled: Option<Function>,
        on_rejected: Option<Function>,
    },
    /// A future that adopted this one's outcome.
    Follower { child: FutureId },
    /// An indexed pass-through registration.
    Proxy {
        listener: Rc<dyn ProxyListener>,
        index: usize,
    },
    /// A plain listener.
    Listener(Rc<dyn SettlementListener>),
}

/// Everything the runtime knows about one future.
pub(crate) struct FutureRecord {
    pub state: FutureState,
    pub cancelled: bool,
    pub cancellation_parent: Option<FutureId>,
    pub cleanup_hook: Option<CleanupHook>,
    pub followee: Option<FutureId>,
    pub bound_context: Value,
    pub reactions: Vec<Reaction>,
    pub rejection_handled: bool,
    pub trace: Vec<String>,
}

impl FutureRecord {
    fn new() -> Self {
        Self {
            state: FutureState::Pending,
            cancelled: false,
            cancellation_parent: None,
            cleanup_hook: None,
            followee: None,
            bound_context: Value::Undefined,
            reactions: Vec::new(),
            rejection_handled: false,
            trace: Vec::new(),
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, FutureState::Pending)
    }

    pub fn is_cancellable(&self) -> bool {
        self.is_pending() && !self.cancelled
    }

    pub fn disposition(&self) -> Disposition {
        match self.state {
            FutureState::Fulfilled(_) => Disposition::Fulfilled,
            FutureState::Rejected(_) => Disposition::Rejected,
            FutureState::Pending if self.cancelled => Disposition::Cancelled,
            FutureState::Pending => Disposition::Pending,
        }
    }

    pub fn outcome(&self) -> Outcome {
        match &self.state {
            FutureState::Fulfilled(v) => Outcome::Fulfilled(v.clone()),
            FutureState::Rejected(r) => Outcome::Rejected(r.clone()),
            FutureState::Pending if self.cancelled => Outcome::Cancelled,
            FutureState::Pending => Outcome::Pending,
        }
    }
}

/// Dense storage of records addressed by [`FutureId`].
///
/// Records are never removed; a runtime lives as long as the work it drives.
#[derive(Default)]
pub(crate) struct Arena {
    records: Vec<FutureRecord>,
}

impl Arena {
    pub fn insert(&mut self) -> FutureId {
        let id = FutureId(self.records.len());
        self.records.push(FutureRecord::new());
        id
    }

    /// Panics if `id` was not issued by this arena.
    pub fn get(&self, id: FutureId) -> &FutureRecord {
        &self.records[id.index()]
    }

    pub fn get_mut(&mut self, id: FutureId) -> &mut FutureRecord {
        &mut self.records[id.index()]
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (FutureId, &FutureRecord)> {
        self.records
            .iter()
            .enumerate()
            .map(|(i, r)| (FutureId(i), r))
    }
}
