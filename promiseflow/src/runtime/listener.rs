//! Settlement listener traits.

use super::Runtime;
use crate::core::Value;

/// Receives the settlement of a single future.
///
/// Listeners are called from a scheduler job, never from inside the call that
/// settled the future.
pub trait SettlementListener {
    /// The future was fulfilled.
    fn on_fulfilled(&self, rt: &Runtime, value: Value);

    /// The future was rejected.
    fn on_rejected(&self, rt: &Runtime, reason: Value);

    /// The future was cancelled.
    fn on_cancelled(&self, rt: &Runtime);
}

/// Receives settlements of many futures, each registered under an index.
///
/// A proxy registration passes updates straight through to the listener
/// instead of allocating a derived future per registration.
pub trait ProxyListener {
    /// The future at `index` was fulfilled.
    fn fulfilled(&self, rt: &Runtime, value: Value, index: usize);

    /// The future at `index` was rejected.
    fn rejected(&self, rt: &Runtime, reason: Value, index: usize);

    /// The future at `index` was cancelled.
    fn cancelled(&self, rt: &Runtime, index: usize);
}
