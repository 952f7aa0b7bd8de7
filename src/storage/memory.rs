//! In-memory collection store
//!
//! Same contract as the file store without touching disk. Used for
//! embedding and tests.

use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::document::Document;
use crate::index::PersistedIndex;

use super::errors::{StorageError, StorageResult};
use super::store::CollectionStore;

#[derive(Debug, Default)]
struct MemoryCollection {
    documents: Vec<Document>,
    indexes: BTreeMap<String, PersistedIndex>,
}

type Databases = BTreeMap<String, BTreeMap<String, MemoryCollection>>;

/// Store keeping every database in process memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    databases: Mutex<Databases>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with<T>(&self, f: impl FnOnce(&mut Databases) -> StorageResult<T>) -> StorageResult<T> {
        let mut guard = self.databases.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut guard)
    }

    fn collection<'a>(
        databases: &'a mut Databases,
        db: &str,
        coll: &str,
    ) -> StorageResult<&'a mut MemoryCollection> {
        databases
            .get_mut(db)
            .and_then(|collections| collections.get_mut(coll))
            .ok_or_else(|| {
                StorageError::not_found(format!("Collection '{}.{}' does not exist", db, coll))
            })
    }
}

impl CollectionStore for MemoryStore {
    fn create_database(&self, db: &str) -> StorageResult<()> {
        self.with(|dbs| {
            if dbs.contains_key(db) {
                return Err(StorageError::already_exists(format!("Database '{}' already exists", db)));
            }
            dbs.insert(db.to_string(), BTreeMap::new());
            Ok(())
        })
    }

    fn drop_database(&self, db: &str) -> StorageResult<()> {
        self.with(|dbs| {
            dbs.remove(db)
                .map(|_| ())
                .ok_or_else(|| StorageError::not_found(format!("Database '{}' does not exist", db)))
        })
    }

    fn database_exists(&self, db: &str) -> bool {
        self.with(|dbs| Ok(dbs.contains_key(db))).unwrap_or(false)
    }

    fn list_databases(&self) -> StorageResult<Vec<String>> {
        self.with(|dbs| Ok(dbs.keys().cloned().collect()))
    }

    fn list_collections(&self, db: &str) -> StorageResult<Vec<String>> {
        self.with(|dbs| {
            dbs.get(db)
                .map(|collections| collections.keys().cloned().collect())
                .ok_or_else(|| StorageError::not_found(format!("Database '{}' does not exist", db)))
        })
    }

    fn create_collection(&self, db: &str, coll: &str) -> StorageResult<()> {
        self.with(|dbs| {
            let collections = dbs
                .get_mut(db)
                .ok_or_else(|| StorageError::not_found(format!("Database '{}' does not exist", db)))?;
            if collections.contains_key(coll) {
                return Err(StorageError::already_exists(format!(
                    "Collection '{}.{}' already exists",
                    db, coll
                )));
            }
            collections.insert(coll.to_string(), MemoryCollection::default());
            Ok(())
        })
    }

    fn drop_collection(&self, db: &str, coll: &str) -> StorageResult<()> {
        self.with(|dbs| {
            dbs.get_mut(db)
                .and_then(|collections| collections.remove(coll))
                .map(|_| ())
                .ok_or_else(|| {
                    StorageError::not_found(format!("Collection '{}.{}' does not exist", db, coll))
                })
        })
    }

    fn collection_exists(&self, db: &str, coll: &str) -> bool {
        self.with(|dbs| Ok(dbs.get(db).map_or(false, |c| c.contains_key(coll))))
            .unwrap_or(false)
    }

    fn load(&self, db: &str, coll: &str) -> StorageResult<Vec<Document>> {
        self.with(|dbs| Ok(Self::collection(dbs, db, coll)?.documents.clone()))
    }

    fn persist(&self, db: &str, coll: &str, documents: &[Document]) -> StorageResult<()> {
        self.with(|dbs| {
            Self::collection(dbs, db, coll)?.documents = documents.to_vec();
            Ok(())
        })
    }

    fn list_index_units(&self, db: &str, coll: &str) -> StorageResult<Vec<String>> {
        self.with(|dbs| Ok(Self::collection(dbs, db, coll)?.indexes.keys().cloned().collect()))
    }

    fn load_index(&self, db: &str, coll: &str, field: &str) -> StorageResult<Option<PersistedIndex>> {
        self.with(|dbs| Ok(Self::collection(dbs, db, coll)?.indexes.get(field).cloned()))
    }

    fn persist_index(&self, db: &str, coll: &str, index: &PersistedIndex) -> StorageResult<()> {
        self.with(|dbs| {
            Self::collection(dbs, db, coll)?
                .indexes
                .insert(index.field.clone(), index.clone());
            Ok(())
        })
    }

    fn drop_index(&self, db: &str, coll: &str, field: &str) -> StorageResult<()> {
        self.with(|dbs| {
            Self::collection(dbs, db, coll)?.indexes.remove(field);
            Ok(())
        })
    }
}
