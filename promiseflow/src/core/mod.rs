//! Core value types for promiseflow.
//!
//! This module contains the types shared by every other module:
//! - The dynamic [`Value`] model and callable [`Function`]s
//! - Future handles and dispositions

mod status;
mod value;

pub use status::{Disposition, FutureId, Outcome};
pub use value::{Function, NativeFn, Value};
