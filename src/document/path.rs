//! Dot-separated field paths into nested documents
//!
//! `address.city` addresses the `city` key of the `address` mapping.
//! Paths never index into arrays: descending through anything that is not
//! a mapping resolves to absent.

use std::fmt;

use serde_json::{Map, Value};

/// Error raised when a write must descend through a non-mapping value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathConflict {
    /// Prefix of the path that holds the non-mapping value
    pub prefix: String,
}

impl fmt::Display for PathConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' is not a mapping", self.prefix)
    }
}

/// A parsed field path
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath {
    raw: String,
    segments: Vec<String>,
}

impl FieldPath {
    /// Parse a path, rejecting empty paths and empty segments (`a..b`).
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.is_empty() {
            return None;
        }
        let segments: Vec<String> = raw.split('.').map(str::to_string).collect();
        if segments.iter().any(|s| s.is_empty()) {
            return None;
        }
        Some(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    /// The path as written
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// First segment (the top-level field)
    pub fn root(&self) -> &str {
        &self.segments[0]
    }

    /// Resolve the path inside a document's fields.
    pub fn resolve<'a>(&self, fields: &'a Map<String, Value>) -> Option<&'a Value> {
        let (last, parents) = self.segments.split_last()?;
        let mut current = fields;
        for segment in parents {
            current = current.get(segment)?.as_object()?;
        }
        current.get(last)
    }

    /// Assign `value` at the path, creating intermediate mappings.
    pub fn set(&self, fields: &mut Map<String, Value>, value: Value) -> Result<(), PathConflict> {
        let parent = self.parent_mut(fields, true)?;
        match parent {
            Some(map) => {
                map.insert(self.leaf().to_string(), value);
                Ok(())
            }
            None => Err(self.conflict_at(self.segments.len() - 1)),
        }
    }

    /// Remove the value at the path, returning it if it was present.
    pub fn remove(&self, fields: &mut Map<String, Value>) -> Option<Value> {
        match self.parent_mut(fields, false) {
            Ok(Some(map)) => map.shift_remove(self.leaf()),
            _ => None,
        }
    }

    fn leaf(&self) -> &str {
        &self.segments[self.segments.len() - 1]
    }

    /// Walk to the mapping that holds the leaf.
    ///
    /// With `create`, missing intermediates are inserted as empty mappings
    /// and a non-mapping intermediate is a conflict. Without it, a missing
    /// intermediate yields `Ok(None)`.
    fn parent_mut<'a>(
        &self,
        fields: &'a mut Map<String, Value>,
        create: bool,
    ) -> Result<Option<&'a mut Map<String, Value>>, PathConflict> {
        let parents = &self.segments[..self.segments.len() - 1];
        let mut current = fields;
        for (depth, segment) in parents.iter().enumerate() {
            if create && !current.contains_key(segment.as_str()) {
                current.insert(segment.clone(), Value::Object(Map::new()));
            }
            current = match current.get_mut(segment.as_str()) {
                Some(Value::Object(map)) => map,
                Some(_) if create => return Err(self.conflict_at(depth + 1)),
                _ => return Ok(None),
            };
        }
        Ok(Some(current))
    }

    fn conflict_at(&self, depth: usize) -> PathConflict {
        PathConflict {
            prefix: self.segments[..depth.max(1)].join("."),
        }
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}
