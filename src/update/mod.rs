//! Update subsystem for digitooldb
//!
//! Supported operators: `$set`, `$unset`, `$inc`, `$push`, `$pull`.
//! Within one update they apply in that fixed order.

mod executor;
mod spec;

pub use executor::UpdateExecutor;
pub use spec::{UpdateOp, UpdateSpec};
