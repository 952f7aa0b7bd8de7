//! Index Manager subsystem for digitooldb
//!
//! Indexes are derived state: every index must be exactly reconstructible
//! from the collection it covers. They are persisted next to the
//! collection so a restart does not need a full rebuild, but the
//! collection stays the source of truth.
//!
//! # Invariants
//!
//! - Indexes are updated AFTER the collection write succeeds
//! - Lookup of an unindexed value returns the empty set
//! - A divergent index is rebuilt from the collection, never trusted

mod btree;
mod manager;

pub use btree::{IndexKey, IndexTree};
pub use manager::{FieldIndex, IndexManager, PersistedIndex};
