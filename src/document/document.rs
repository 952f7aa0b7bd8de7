//! The document type
//!
//! A document is an ordered mapping with three engine-owned fields:
//! `_id` (unique, immutable), `_created_at` (set once on insert) and
//! `_updated_at` (refreshed on every successful mutation).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::errors::{EngineError, EngineResult};

pub const ID_FIELD: &str = "_id";
pub const CREATED_AT_FIELD: &str = "_created_at";
pub const UPDATED_AT_FIELD: &str = "_updated_at";

/// Returns true for fields that only the engine may write.
pub fn is_reserved_field(name: &str) -> bool {
    name == ID_FIELD || name == CREATED_AT_FIELD || name == UPDATED_AT_FIELD
}

/// A stored document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document {
    fields: Map<String, Value>,
}

impl Document {
    /// Build a new document for insertion.
    ///
    /// Assigns a UUIDv4 `_id` when the caller omitted one and stamps both
    /// bookkeeping timestamps with `timestamp`.
    pub fn for_insert(value: Value, timestamp: &str) -> EngineResult<Self> {
        let Value::Object(mut fields) = value else {
            return Err(EngineError::invalid_document("Document must be a JSON object"));
        };

        check_field_names(&fields)?;

        match fields.get(ID_FIELD) {
            None | Some(Value::Null) => {
                // `_id` leads the mapping, like every engine-assigned id
                let mut with_id = Map::with_capacity(fields.len() + 3);
                with_id.insert(ID_FIELD.to_string(), Value::String(Uuid::new_v4().to_string()));
                fields.shift_remove(ID_FIELD);
                with_id.extend(fields);
                fields = with_id;
            }
            Some(Value::String(id)) if !id.is_empty() => {}
            Some(_) => {
                return Err(EngineError::invalid_document("_id must be a non-empty string"));
            }
        }

        fields.insert(CREATED_AT_FIELD.to_string(), Value::String(timestamp.to_string()));
        fields.insert(UPDATED_AT_FIELD.to_string(), Value::String(timestamp.to_string()));

        Ok(Self { fields })
    }

    /// Wrap fields read back from storage.
    ///
    /// Returns `None` when the stored value lacks a string `_id`.
    pub fn from_stored(value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) if matches!(fields.get(ID_FIELD), Some(Value::String(_))) => {
                Some(Self { fields })
            }
            _ => None,
        }
    }

    /// The document's `_id`
    pub fn id(&self) -> &str {
        self.fields
            .get(ID_FIELD)
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub(crate) fn fields_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.fields
    }

    /// Refresh `_updated_at`.
    pub(crate) fn touch(&mut self, timestamp: &str) {
        self.fields
            .insert(UPDATED_AT_FIELD.to_string(), Value::String(timestamp.to_string()));
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.fields.clone())
    }
}

/// Literal field names never contain `.`, at any depth.
fn check_field_names(fields: &Map<String, Value>) -> EngineResult<()> {
    for (name, value) in fields {
        if name.contains('.') {
            return Err(EngineError::invalid_document(format!(
                "Field name '{}' must not contain '.'",
                name
            )));
        }
        check_nested(value)?;
    }
    Ok(())
}

/// Checks every mapping nested in `value` for dotted field names.
pub(crate) fn check_nested(value: &Value) -> EngineResult<()> {
    match value {
        Value::Object(map) => check_field_names(map),
        Value::Array(items) => items.iter().try_for_each(check_nested),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::EngineErrorCode;
    use serde_json::json;

    const TS: &str = "2026-10-19T08:30:00.000000Z";

    #[test]
    fn test_insert_assigns_id_and_timestamps() {
        let doc = Document::for_insert(json!({"name": "John", "age": 30}), TS).unwrap();
        assert_eq!(doc.id().len(), 36);
        assert_eq!(doc.fields().get(CREATED_AT_FIELD), Some(&json!(TS)));
        assert_eq!(doc.fields().get(UPDATED_AT_FIELD), Some(&json!(TS)));
        assert_eq!(doc.fields().keys().next().map(String::as_str), Some(ID_FIELD));
        assert_eq!(doc.fields().get("age"), Some(&json!(30)));
    }

    #[test]
    fn test_insert_keeps_caller_id() {
        let doc = Document::for_insert(json!({"_id": "user_1", "name": "John"}), TS).unwrap();
        assert_eq!(doc.id(), "user_1");
    }

    #[test]
    fn test_insert_overrides_caller_timestamps() {
        let doc = Document::for_insert(json!({"_created_at": "yesterday"}), TS).unwrap();
        assert_eq!(doc.fields().get(CREATED_AT_FIELD), Some(&json!(TS)));
    }

    #[test]
    fn test_insert_rejects_non_object() {
        let err = Document::for_insert(json!([1, 2]), TS).unwrap_err();
        assert_eq!(err.code(), EngineErrorCode::InvalidDocument);
    }

    #[test]
    fn test_insert_rejects_bad_id() {
        assert!(Document::for_insert(json!({"_id": 5}), TS).is_err());
        assert!(Document::for_insert(json!({"_id": ""}), TS).is_err());
    }

    #[test]
    fn test_insert_rejects_dotted_names() {
        let err = Document::for_insert(json!({"a": {"b.c": 1}}), TS).unwrap_err();
        assert_eq!(err.code(), EngineErrorCode::InvalidDocument);
        let err = Document::for_insert(json!({"a": [{"x.y": 1}]}), TS).unwrap_err();
        assert_eq!(err.code(), EngineErrorCode::InvalidDocument);
    }

    #[test]
    fn test_from_stored_requires_id() {
        assert!(Document::from_stored(json!({"_id": "a"})).is_some());
        assert!(Document::from_stored(json!({"name": "a"})).is_none());
        assert!(Document::from_stored(json!("a")).is_none());
    }
}
