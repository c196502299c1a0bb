//! Cooperative, cascading cancellation.
//!
//! This module provides:
//! - `cancel` / `cancel_after` on [`Runtime`](crate::runtime::Runtime),
//!   walking the cancellation-parent chain of a future
//! - [`CleanupHook`], the tagged payload of a future's cleanup slot
//! - [`CancelNotifiable`] for owners that fan cancellation out further

mod controller;
mod hook;


pub use hook::{CancelNotifiable, CleanupHook};
