//! Storage Manager subsystem for digitooldb
//!
//! Owns durable persistence of each collection as a single unit. Every
//! other component reads and writes collections through `CollectionStore`.
//!
//! # Design Principles
//!
//! - Whole-unit writes: a collection is replaced atomically or not at all
//! - Checksum-verified on every read
//! - Index units live beside their collection and die with it
//!
//! Concurrent edits of the data directory by other processes are not
//! supported.

mod checksum;
mod errors;
mod file;
mod memory;
mod store;

pub use checksum::{compute_checksum, verify_checksum};
pub use errors::{StorageError, StorageErrorCode, StorageResult};
pub use file::{FileStore, COLLECTION_EXTENSION, FORMAT_VERSION};
pub use memory::MemoryStore;
pub use store::CollectionStore;
