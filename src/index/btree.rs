//! BTreeMap-based index structures
//!
//! Indexes use BTreeMap<IndexKey, BTreeSet<String>> for deterministic
//! ordering. Each key maps to the sorted set of `_id`s holding that value.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Index key representing a normalized field value.
///
/// Keys are normalized so that values the matcher treats as equal map to
/// the same key: `30` and `30.0` share a `Number` key, and mappings with
/// the same entries in different order share a `Composite` key.
/// Ordering is deterministic: Bool < Number < String < Composite.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum IndexKey {
    /// Boolean value (false < true)
    Bool(bool),
    /// Numeric value (f64 stored as order-preserving bits)
    Number(u64),
    /// String value
    String(String),
    /// Array or mapping, rendered as canonical JSON
    Composite(String),
}

impl IndexKey {
    /// Create a key from a float
    ///
    /// Uses bit representation for total ordering.
    pub fn from_float(v: f64) -> Self {
        // -0.0 and 0.0 are equal values
        let v = if v == 0.0 { 0.0 } else { v };
        let bits = v.to_bits();
        let ordered = if (bits >> 63) == 1 {
            !bits // Negative: flip all bits
        } else {
            bits ^ (1 << 63) // Positive: flip sign bit
        };
        IndexKey::Number(ordered)
    }

    /// Create a key from a string
    pub fn from_string(v: impl Into<String>) -> Self {
        IndexKey::String(v.into())
    }

    /// Create a key from a JSON value.
    ///
    /// Null is never indexed; a field holding null behaves like an absent
    /// field for index purposes.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Bool(b) => Some(IndexKey::Bool(*b)),
            Value::Number(n) => n.as_f64().map(IndexKey::from_float),
            Value::String(s) => Some(IndexKey::from_string(s)),
            Value::Array(_) | Value::Object(_) => {
                let mut canonical = String::new();
                write_canonical(value, &mut canonical);
                Some(IndexKey::Composite(canonical))
            }
        }
    }
}

/// Render JSON with sorted mapping keys and every number as f64.
fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&map[key], out);
            }
            out.push('}');
        }
        Value::Number(n) => match n.as_f64() {
            Some(f) if f == 0.0 => out.push_str("0e0"),
            Some(f) => out.push_str(&format!("{:e}", f)),
            None => out.push_str(&n.to_string()),
        },
        other => out.push_str(&other.to_string()),
    }
}

/// A single field index using BTreeMap for deterministic ordering.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IndexTree {
    /// Maps key values to sorted sets of `_id`s
    tree: BTreeMap<IndexKey, BTreeSet<String>>,
}

impl IndexTree {
    /// Creates a new empty index tree
    pub fn new() -> Self {
        Self {
            tree: BTreeMap::new(),
        }
    }

    /// Insert an `_id` for a key.
    pub fn insert(&mut self, key: IndexKey, id: &str) {
        self.tree.entry(key).or_default().insert(id.to_string());
    }

    /// Remove an `_id` for a key.
    ///
    /// If the key has no more ids, removes the key entirely.
    pub fn remove(&mut self, key: &IndexKey, id: &str) {
        if let Some(ids) = self.tree.get_mut(key) {
            ids.remove(id);
            if ids.is_empty() {
                self.tree.remove(key);
            }
        }
    }

    /// Lookup all ids for an exact key match.
    ///
    /// Returns an empty set for unindexed values.
    pub fn lookup_eq(&self, key: &IndexKey) -> BTreeSet<String> {
        self.tree.get(key).cloned().unwrap_or_default()
    }

    /// Iterate entries in key order
    pub fn entries(&self) -> impl Iterator<Item = (&IndexKey, &BTreeSet<String>)> {
        self.tree.iter()
    }

    /// Returns the number of distinct keys
    /// Returns the total number of ids
    pub fn id_count(&self) -> usize {
        self.tree.values().map(|v| v.len()).sum()
    }
}
