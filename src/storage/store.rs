//! The collection store abstraction
//!
//! Every collection is loaded and persisted as one unit. Implementations
//! must make `persist` atomic: a subsequent `load` sees either the old or
//! the new document set, never a mix.

use crate::document::Document;
use crate::index::PersistedIndex;

use super::errors::StorageResult;

/// Durable home of databases, collections, and their index units.
///
/// Callers are expected to serialize access per collection; stores do no
/// locking of their own beyond what their own bookkeeping needs.
pub trait CollectionStore: Send + Sync {
    /// Fails with `AlreadyExists` if the database is present
    fn create_database(&self, db: &str) -> StorageResult<()>;

    /// Removes a database with all its collections; `NotFound` if absent
    fn drop_database(&self, db: &str) -> StorageResult<()>;

    fn database_exists(&self, db: &str) -> bool;

    /// Database names in ascending order
    fn list_databases(&self) -> StorageResult<Vec<String>>;

    /// Collection names in ascending order; `NotFound` if the database is absent
    fn list_collections(&self, db: &str) -> StorageResult<Vec<String>>;

    /// Creates an empty collection; `AlreadyExists` if present
    fn create_collection(&self, db: &str, coll: &str) -> StorageResult<()>;

    /// Removes a collection and all of its index units; `NotFound` if absent
    fn drop_collection(&self, db: &str, coll: &str) -> StorageResult<()>;

    fn collection_exists(&self, db: &str, coll: &str) -> bool;

    /// Every document of the collection in stored order
    fn load(&self, db: &str, coll: &str) -> StorageResult<Vec<Document>>;

    /// Atomically replace the collection's documents
    fn persist(&self, db: &str, coll: &str, documents: &[Document]) -> StorageResult<()>;

    /// Fields with a persisted index unit, in ascending order
    fn list_index_units(&self, db: &str, coll: &str) -> StorageResult<Vec<String>>;

    /// Read an index unit; `Ok(None)` when the unit does not exist
    fn load_index(&self, db: &str, coll: &str, field: &str) -> StorageResult<Option<PersistedIndex>>;

    /// Atomically replace an index unit
    fn persist_index(&self, db: &str, coll: &str, index: &PersistedIndex) -> StorageResult<()>;

    /// Remove an index unit; a missing unit is not an error
    fn drop_index(&self, db: &str, coll: &str, field: &str) -> StorageResult<()>;
}
