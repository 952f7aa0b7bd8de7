//! The engine: registry of collections and the single entry point for
//! every operation.
//!
//! Each operation on a collection runs one load -> match -> mutate ->
//! persist -> index cycle while holding that collection's lock, so
//! operations on one collection serialize and operations on different
//! collections proceed independently.
//!
//! Lock order is catalog -> handle map -> collection state. Collection
//! operations never take the catalog lock and never hold the handle map
//! lock while waiting on a collection.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};

use crate::document::{Clock, Document, UPDATED_AT_FIELD};
use crate::errors::{EngineError, EngineResult};
use crate::index::{FieldIndex, IndexManager};
use crate::query::{Query, QueryMatcher};
use crate::storage::{CollectionStore, FileStore, MemoryStore};
use crate::update::{UpdateExecutor, UpdateSpec};

use super::names::{validate_collection_name, validate_db_name, validate_field};

/// Outcome of a multi-document update
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateSummary {
    /// Documents the query selected
    pub matched: usize,
    /// Documents whose content changed and were written
    pub modified: usize,
    /// Documents the update could not be applied to
    pub failed: usize,
}

/// Result of verifying one index against its collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexReport {
    pub field: String,
    /// True if the persisted index matched the rebuilt one
    pub consistent: bool,
    /// True if the persisted index was rewritten
    pub rebuilt: bool,
}

#[derive(Default)]
struct CollectionState {
    /// Set once the collection is dropped; the handle must not be reused
    dropped: bool,
    /// Verified indexes, loaded on first use
    indexes: Option<IndexManager>,
}

#[derive(Default)]
struct CollectionHandle {
    state: Mutex<CollectionState>,
}

type HandleKey = (String, String);

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Document engine over a `CollectionStore`
pub struct Engine {
    store: Arc<dyn CollectionStore>,
    clock: Clock,
    /// Serializes database and collection lifecycle changes
    catalog: Mutex<()>,
    handles: Mutex<HashMap<HandleKey, Arc<CollectionHandle>>>,
}

impl Engine {
    /// Open an engine over a data directory
    pub fn open(data_dir: impl Into<PathBuf>) -> EngineResult<Self> {
        let data_dir = data_dir.into();
        let store = FileStore::open(&data_dir)?;
        info!(data_dir = %data_dir.display(), "opened data directory");
        Ok(Self::with_store(Arc::new(store)))
    }

    /// Engine keeping all data in memory
    pub fn in_memory() -> Self {
        Self::with_store(Arc::new(MemoryStore::new()))
    }

    pub fn with_store(store: Arc<dyn CollectionStore>) -> Self {
        Self {
            store,
            clock: Clock::new(),
            catalog: Mutex::new(()),
            handles: Mutex::new(HashMap::new()),
        }
    }

    // ---------------------------------------------------------------
    // Databases
    // ---------------------------------------------------------------

    pub fn create_database(&self, name: &str) -> EngineResult<()> {
        validate_db_name(name)?;
        let _catalog = lock(&self.catalog);
        self.store.create_database(name)?;
        info!(db = name, "created database");
        Ok(())
    }

    /// Drop a database with every collection and index in it
    pub fn drop_database(&self, name: &str) -> EngineResult<()> {
        validate_db_name(name)?;
        let _catalog = lock(&self.catalog);
        if !self.store.database_exists(name) {
            return Err(EngineError::database_not_found(name));
        }

        let mut handles = lock(&self.handles);
        let mut keys: Vec<HandleKey> = handles.keys().filter(|(db, _)| db == name).cloned().collect();
        keys.sort();
        let retired: Vec<Arc<CollectionHandle>> =
            keys.iter().filter_map(|key| handles.remove(key)).collect();
        let mut states: Vec<_> = retired.iter().map(|h| lock(&h.state)).collect();
        for state in states.iter_mut() {
            state.dropped = true;
            state.indexes = None;
        }

        self.store.drop_database(name)?;
        drop(states);
        drop(handles);
        info!(db = name, "dropped database");
        Ok(())
    }

    pub fn list_databases(&self) -> EngineResult<Vec<String>> {
        Ok(self.store.list_databases()?)
    }

    // ---------------------------------------------------------------
    // Collections
    // ---------------------------------------------------------------

    pub fn create_collection(&self, db: &str, name: &str) -> EngineResult<()> {
        validate_db_name(db)?;
        validate_collection_name(name)?;
        let _catalog = lock(&self.catalog);
        if !self.store.database_exists(db) {
            return Err(EngineError::database_not_found(db));
        }
        self.store.create_collection(db, name)?;
        info!(db, coll = name, "created collection");
        Ok(())
    }

    /// Drop a collection together with all of its indexes
    pub fn drop_collection(&self, db: &str, name: &str) -> EngineResult<()> {
        validate_db_name(db)?;
        validate_collection_name(name)?;
        let _catalog = lock(&self.catalog);
        self.require_collection(db, name)?;

        let mut handles = lock(&self.handles);
        let retired = handles.remove(&(db.to_string(), name.to_string()));
        let mut state = retired.as_ref().map(|h| lock(&h.state));
        if let Some(state) = state.as_mut() {
            state.dropped = true;
            state.indexes = None;
        }

        self.store.drop_collection(db, name)?;
        drop(state);
        drop(handles);
        info!(db, coll = name, "dropped collection");
        Ok(())
    }

    pub fn list_collections(&self, db: &str) -> EngineResult<Vec<String>> {
        validate_db_name(db)?;
        if !self.store.database_exists(db) {
            return Err(EngineError::database_not_found(db));
        }
        Ok(self.store.list_collections(db)?)
    }

    // ---------------------------------------------------------------
    // Documents
    // ---------------------------------------------------------------

    /// Insert one document, returning its `_id`
    pub fn insert(&self, db: &str, coll: &str, document: Value) -> EngineResult<String> {
        self.insert_many(db, coll, vec![document])?
            .pop()
            .ok_or_else(|| EngineError::storage_failure("insert produced no _id", None))
    }

    /// Insert a batch of documents, returning their `_id`s in order.
    ///
    /// The batch is validated as a whole before anything is written: a
    /// malformed document or a duplicate `_id` fails the call with the
    /// collection unchanged.
    pub fn insert_many(&self, db: &str, coll: &str, documents: Vec<Value>) -> EngineResult<Vec<String>> {
        self.with_collection(db, coll, |cx| {
            let timestamp = self.clock.timestamp();
            let mut taken: HashSet<String> = cx.documents.iter().map(|d| d.id().to_string()).collect();

            let mut batch = Vec::with_capacity(documents.len());
            for value in documents {
                let doc = Document::for_insert(value, &timestamp)?;
                if !taken.insert(doc.id().to_string()) {
                    return Err(EngineError::already_exists(format!(
                        "Document with _id '{}' already exists in '{}.{}'",
                        doc.id(),
                        db,
                        coll
                    )));
                }
                batch.push(doc);
            }
            if batch.is_empty() {
                return Ok(Vec::new());
            }

            let ids: Vec<String> = batch.iter().map(|d| d.id().to_string()).collect();
            let mut next = cx.documents.to_vec();
            next.extend(batch.iter().cloned());
            self.store.persist(db, coll, &next)?;

            for doc in &batch {
                cx.indexes.on_insert(doc);
            }
            debug!(db, coll, inserted = ids.len(), "inserted documents");
            Ok(ids)
        })
    }

    /// Every document matching `query`, in stored order
    pub fn find(&self, db: &str, coll: &str, query: Option<&Value>) -> EngineResult<Vec<Value>> {
        let query = Query::parse_optional(query)?;
        self.with_collection(db, coll, |cx| {
            Ok(cx
                .select(&query)
                .map(|i| cx.documents[i].to_value())
                .collect())
        })
    }

    /// First document matching `query`, if any
    pub fn find_one(&self, db: &str, coll: &str, query: Option<&Value>) -> EngineResult<Option<Value>> {
        let query = Query::parse_optional(query)?;
        self.with_collection(db, coll, |cx| {
            Ok(cx.select(&query).next().map(|i| cx.documents[i].to_value()))
        })
    }

    /// Apply `update` to every document matching `query`.
    ///
    /// Each document is updated atomically. A document the update cannot
    /// be applied to (`TypeMismatch`) is counted as failed and left
    /// unchanged; the remaining documents are still updated.
    pub fn update(&self, db: &str, coll: &str, query: &Value, update: &Value) -> EngineResult<UpdateSummary> {
        let query = Query::parse(query)?;
        let spec = UpdateSpec::parse(update)?;

        self.with_collection(db, coll, |cx| {
            let mut summary = UpdateSummary::default();
            let selected: Vec<usize> = cx.select(&query).collect();
            summary.matched = selected.len();

            let mut changes = Vec::new();
            for i in selected {
                let old = &cx.documents[i];
                let timestamp = self.clock.timestamp();
                match UpdateExecutor::apply(old, &spec, &timestamp) {
                    Ok(new) if same_content(old, &new) => {}
                    Ok(new) => changes.push((i, new)),
                    Err(e) => {
                        debug!(db, coll, id = old.id(), error = %e, "update skipped document");
                        summary.failed += 1;
                    }
                }
            }
            if changes.is_empty() {
                return Ok(summary);
            }

            let mut next = cx.documents.to_vec();
            for (i, new) in &changes {
                next[*i] = new.clone();
            }
            self.store.persist(db, coll, &next)?;

            for (i, new) in &changes {
                cx.indexes.on_update(&cx.documents[*i], new);
            }
            summary.modified = changes.len();
            debug!(db, coll, ?summary, "updated documents");
            Ok(summary)
        })
    }

    /// Remove every document matching `query`; `{}` removes all
    pub fn delete(&self, db: &str, coll: &str, query: &Value) -> EngineResult<usize> {
        let query = Query::parse(query)?;
        self.with_collection(db, coll, |cx| {
            let doomed: BTreeSet<usize> = cx.select(&query).collect();
            if doomed.is_empty() {
                return Ok(0);
            }

            let kept: Vec<Document> = cx
                .documents
                .iter()
                .enumerate()
                .filter(|(i, _)| !doomed.contains(i))
                .map(|(_, d)| d.clone())
                .collect();
            self.store.persist(db, coll, &kept)?;

            for i in &doomed {
                cx.indexes.on_delete(&cx.documents[*i]);
            }
            debug!(db, coll, deleted = doomed.len(), "deleted documents");
            Ok(doomed.len())
        })
    }

    // ---------------------------------------------------------------
    // Indexes
    // ---------------------------------------------------------------

    /// Build and persist an index on `field`
    pub fn create_index(&self, db: &str, coll: &str, field: &str) -> EngineResult<()> {
        let path = validate_field(field)?;
        self.with_collection(db, coll, |cx| {
            if cx.indexes.contains(field) {
                return Err(EngineError::already_exists(format!(
                    "Index on '{}' already exists in '{}.{}'",
                    field, db, coll
                )));
            }
            let index = FieldIndex::build(path, cx.documents);
            self.store.persist_index(db, coll, &index.to_persisted())?;
            info!(db, coll, field, entries = index.len(), "created index");
            cx.indexes.add(index);
            Ok(())
        })
    }

    pub fn drop_index(&self, db: &str, coll: &str, field: &str) -> EngineResult<()> {
        self.with_collection(db, coll, |cx| {
            if !cx.indexes.contains(field) {
                return Err(EngineError::not_found(format!(
                    "No index on '{}' in '{}.{}'",
                    field, db, coll
                )));
            }
            self.store.drop_index(db, coll, field)?;
            cx.indexes.remove(field);
            info!(db, coll, field, "dropped index");
            Ok(())
        })
    }

    /// Indexed fields in ascending order
    pub fn list_indices(&self, db: &str, coll: &str) -> EngineResult<Vec<String>> {
        self.with_collection(db, coll, |cx| Ok(cx.indexes.fields()))
    }

    /// Rebuild every index from the collection and rewrite those whose
    /// persisted form diverges.
    pub fn verify_indices(&self, db: &str, coll: &str) -> EngineResult<Vec<IndexReport>> {
        self.locked(db, coll, |state| self.verify_locked(db, coll, state))
    }

    fn verify_locked(&self, db: &str, coll: &str, state: &mut CollectionState) -> EngineResult<Vec<IndexReport>> {
        let documents = self.load_documents(db, coll)?;

        let mut fields: BTreeSet<String> = self.store.list_index_units(db, coll)?.into_iter().collect();
        if let Some(indexes) = &state.indexes {
            fields.extend(indexes.fields());
        }

        let mut manager = IndexManager::new();
        let mut reports = Vec::with_capacity(fields.len());
        for field in fields {
            let Ok(path) = validate_field(&field) else {
                warn!(db, coll, field = %field, "ignoring index unit with invalid field");
                continue;
            };
            let rebuilt = FieldIndex::build(path, &documents);
            let consistent = matches!(
                self.store.load_index(db, coll, &field),
                Ok(Some(persisted)) if persisted == rebuilt.to_persisted()
            );
            if !consistent {
                warn!(db, coll, field = %field, "index diverged from collection, rewriting");
                self.store.persist_index(db, coll, &rebuilt.to_persisted())?;
            }
            reports.push(IndexReport {
                field,
                consistent,
                rebuilt: !consistent,
            });
            manager.add(rebuilt);
        }
        state.indexes = Some(manager);

        info!(db, coll, indexes = reports.len(), "verified indexes");
        Ok(reports)
    }

    // ---------------------------------------------------------------
    // Internals
    // ---------------------------------------------------------------

    fn require_collection(&self, db: &str, coll: &str) -> EngineResult<()> {
        if !self.store.database_exists(db) {
            return Err(EngineError::database_not_found(db));
        }
        if !self.store.collection_exists(db, coll) {
            return Err(EngineError::collection_not_found(db, coll));
        }
        Ok(())
    }

    fn handle(&self, db: &str, coll: &str) -> Arc<CollectionHandle> {
        let mut handles = lock(&self.handles);
        handles
            .entry((db.to_string(), coll.to_string()))
            .or_default()
            .clone()
    }

    /// Run `f` holding the collection's lock.
    ///
    /// A handle retired by a concurrent drop is skipped for a fresh one,
    /// which then observes the collection as missing.
    fn locked<T>(
        &self,
        db: &str,
        coll: &str,
        f: impl FnOnce(&mut CollectionState) -> EngineResult<T>,
    ) -> EngineResult<T> {
        validate_db_name(db)?;
        validate_collection_name(coll)?;

        loop {
            let handle = self.handle(db, coll);
            let mut state = lock(&handle.state);
            if state.dropped {
                continue;
            }
            self.require_collection(db, coll)?;
            return f(&mut *state);
        }
    }

    /// Run `f` inside the collection's critical section.
    ///
    /// Loads the documents and the verified indexes, then persists any
    /// index changes `f` made once it returns successfully.
    fn with_collection<T>(
        &self,
        db: &str,
        coll: &str,
        f: impl FnOnce(&mut CollectionContext<'_>) -> EngineResult<T>,
    ) -> EngineResult<T> {
        self.locked(db, coll, |state| {
            let documents = self.load_documents(db, coll)?;

            let indexes = match state.indexes.take() {
                Some(indexes) => indexes,
                None => self.load_indexes(db, coll, &documents)?,
            };
            let indexes = state.indexes.insert(indexes);

            let mut cx = CollectionContext {
                documents: &documents,
                indexes,
            };
            let result = f(&mut cx)?;
            self.flush_indexes(db, coll, state);
            Ok(result)
        })
    }

    fn load_documents(&self, db: &str, coll: &str) -> EngineResult<Vec<Document>> {
        match self.store.load(db, coll) {
            Ok(documents) => Ok(documents),
            Err(e) if e.is_corruption() => {
                error!(db, coll, error = %e, "collection unit failed verification");
                Err(e.into())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Derive every index from the documents and verify the persisted
    /// units against it, rewriting any that are missing or divergent.
    fn load_indexes(&self, db: &str, coll: &str, documents: &[Document]) -> EngineResult<IndexManager> {
        let mut manager = IndexManager::new();
        for field in self.store.list_index_units(db, coll)? {
            let Ok(path) = validate_field(&field) else {
                warn!(db, coll, field = %field, "ignoring index unit with invalid field");
                continue;
            };
            let derived = FieldIndex::build(path, documents);
            match self.store.load_index(db, coll, &field) {
                Ok(Some(persisted)) if persisted == derived.to_persisted() => {}
                Ok(_) => {
                    warn!(db, coll, field = %field, "index diverged from collection, rebuilding");
                    self.store.persist_index(db, coll, &derived.to_persisted())?;
                }
                Err(e) => {
                    warn!(db, coll, field = %field, error = %e, "index unit unreadable, rebuilding");
                    self.store.persist_index(db, coll, &derived.to_persisted())?;
                }
            }
            manager.add(derived);
        }
        Ok(manager)
    }

    /// Write index units changed by a committed operation.
    ///
    /// A failed write leaves a stale unit behind; dropping the cached
    /// indexes makes the next use re-derive and rewrite it.
    fn flush_indexes(&self, db: &str, coll: &str, state: &mut CollectionState) {
        let Some(indexes) = state.indexes.as_mut() else {
            return;
        };
        for persisted in indexes.take_dirty() {
            if let Err(e) = self.store.persist_index(db, coll, &persisted) {
                state.indexes = None;
                warn!(db, coll, field = %persisted.field, error = %e, "failed to persist index");
                return;
            }
        }
    }
}

/// Documents and indexes of one collection inside its critical section
struct CollectionContext<'a> {
    documents: &'a [Document],
    indexes: &'a mut IndexManager,
}

impl CollectionContext<'_> {
    /// Positions of matching documents, in stored order.
    ///
    /// When an index can answer the query, only its candidates are
    /// checked; the matcher still decides every result.
    fn select<'q>(&'q self, query: &'q Query) -> impl Iterator<Item = usize> + 'q {
        let candidates = self.indexes.candidates(query);
        self.documents
            .iter()
            .enumerate()
            .filter(move |(_, doc)| {
                candidates
                    .as_ref()
                    .map_or(true, |ids| ids.contains(doc.id()))
            })
            .filter(move |(_, doc)| QueryMatcher::matches(doc, query))
            .map(|(i, _)| i)
    }
}

/// True when two versions differ only in `_updated_at`
fn same_content(old: &Document, new: &Document) -> bool {
    let strip = |doc: &Document| -> Map<String, Value> {
        let mut fields = doc.fields().clone();
        fields.shift_remove(UPDATED_AT_FIELD);
        fields
    };
    strip(old) == strip(new)
}
