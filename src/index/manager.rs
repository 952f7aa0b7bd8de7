//! Index Manager for digitooldb
//!
//! Maintains one in-memory index per indexed field of a collection.
//!
//! # API
//!
//! - `FieldIndex::build(field, documents)` - Full scan of the collection
//! - `on_insert` / `on_update` / `on_delete` - Incremental maintenance
//! - `lookup(field, value)` - Exact match lookup, empty set when unindexed
//! - `candidates(query)` - Pre-filter ids for an equality-shaped query

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::document::{Document, FieldPath};
use crate::query::Query;

use super::btree::{IndexKey, IndexTree};

/// On-disk form of one field index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedIndex {
    pub field: String,
    pub entries: Vec<(IndexKey, Vec<String>)>,
}

/// Index over one field path of one collection
#[derive(Debug, Clone, PartialEq)]
pub struct FieldIndex {
    path: FieldPath,
    tree: IndexTree,
}

impl FieldIndex {
    /// Build an index by scanning every document once.
    pub fn build(path: FieldPath, documents: &[Document]) -> Self {
        let mut index = Self {
            path,
            tree: IndexTree::new(),
        };
        for doc in documents {
            index.on_insert(doc);
        }
        index
    }

    pub fn to_persisted(&self) -> PersistedIndex {
        PersistedIndex {
            field: self.path.as_str().to_string(),
            entries: self
                .tree
                .entries()
                .map(|(key, ids)| (key.clone(), ids.iter().cloned().collect()))
                .collect(),
        }
    }

    pub fn field(&self) -> &str {
        self.path.as_str()
    }

    fn key_for(&self, doc: &Document) -> Option<IndexKey> {
        self.path.resolve(doc.fields()).and_then(IndexKey::from_json)
    }

    /// Returns true if the index changed
    pub fn on_insert(&mut self, doc: &Document) -> bool {
        match self.key_for(doc) {
            Some(key) => {
                self.tree.insert(key, doc.id());
                true
            }
            None => false,
        }
    }

    /// Returns true if the index changed
    pub fn on_delete(&mut self, doc: &Document) -> bool {
        match self.key_for(doc) {
            Some(key) => {
                self.tree.remove(&key, doc.id());
                true
            }
            None => false,
        }
    }

    /// Move a document between keys; returns true if the index changed
    pub fn on_update(&mut self, old: &Document, new: &Document) -> bool {
        let old_key = self.key_for(old);
        let new_key = self.key_for(new);
        if old_key == new_key {
            return false;
        }
        if let Some(key) = old_key {
            self.tree.remove(&key, old.id());
        }
        if let Some(key) = new_key {
            self.tree.insert(key, new.id());
        }
        true
    }

    /// Ids of documents whose field equals `value`
    pub fn lookup(&self, value: &Value) -> BTreeSet<String> {
        match IndexKey::from_json(value) {
            Some(key) => self.tree.lookup_eq(&key),
            None => BTreeSet::new(),
        }
    }

    /// Number of indexed documents
    pub fn len(&self) -> usize {
        self.tree.id_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Index Manager holding every index of one collection
#[derive(Debug, Default)]
pub struct IndexManager {
    /// Field path -> index, ordered by field name
    indexes: BTreeMap<String, FieldIndex>,
    /// Fields changed since the last `take_dirty`
    dirty: BTreeSet<String>,
}

impl IndexManager {
    /// Creates a new empty index manager
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an index whose unit is already persisted, replacing any
    /// index on the same field
    pub fn add(&mut self, index: FieldIndex) {
        self.indexes.insert(index.field().to_string(), index);
    }

    /// Remove an index, returning it if it existed
    pub fn remove(&mut self, field: &str) -> Option<FieldIndex> {
        self.dirty.remove(field);
        self.indexes.remove(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.indexes.contains_key(field)
    }

    /// Indexed fields in ascending order
    pub fn fields(&self) -> Vec<String> {
        self.indexes.keys().cloned().collect()
    }

    pub fn on_insert(&mut self, doc: &Document) {
        for (field, index) in self.indexes.iter_mut() {
            if index.on_insert(doc) {
                self.dirty.insert(field.clone());
            }
        }
    }

    pub fn on_update(&mut self, old: &Document, new: &Document) {
        for (field, index) in self.indexes.iter_mut() {
            if index.on_update(old, new) {
                self.dirty.insert(field.clone());
            }
        }
    }

    pub fn on_delete(&mut self, doc: &Document) {
        for (field, index) in self.indexes.iter_mut() {
            if index.on_delete(doc) {
                self.dirty.insert(field.clone());
            }
        }
    }

    /// Lookup ids for an exact field match.
    ///
    /// Returns an empty set when the field is not indexed.
    pub fn lookup(&self, field: &str, value: &Value) -> BTreeSet<String> {
        self.indexes
            .get(field)
            .map(|index| index.lookup(value))
            .unwrap_or_default()
    }

    /// Candidate ids for a query, or `None` when the query cannot be
    /// answered from an index and the caller must scan.
    ///
    /// Uses the first clause that is both equality-shaped and indexed.
    /// The result is a superset of the matching ids; callers still run the
    /// matcher over every candidate.
    pub fn candidates(&self, query: &Query) -> Option<BTreeSet<String>> {
        query.clauses().iter().find_map(|clause| {
            let index = self.indexes.get(clause.path.as_str())?;
            let values = clause.equality_values()?;
            Some(values.into_iter().flat_map(|v| index.lookup(v)).collect())
        })
    }

    /// Drain the set of indexes changed since the last call
    pub fn take_dirty(&mut self) -> Vec<PersistedIndex> {
        let dirty = std::mem::take(&mut self.dirty);
        dirty
            .iter()
            .filter_map(|field| self.indexes.get(field))
            .map(FieldIndex::to_persisted)
            .collect()
    }
}
