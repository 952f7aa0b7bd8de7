//! Parsed update specification
//!
//! An update is a mapping of operator to operand mapping, for example
//! `{"$set": {"age": 31}, "$inc": {"visits": 1}}`. Raw replacement
//! documents (keys without `$`) are rejected.

use serde_json::{Number, Value};

use crate::document::{check_nested, is_reserved_field, FieldPath};
use crate::errors::{EngineError, EngineResult};

/// A single field mutation
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOp {
    /// `$set`: assign, creating intermediate mappings
    Set(FieldPath, Value),
    /// `$unset`: remove if present
    Unset(FieldPath),
    /// `$inc`: numeric add, absent counts as zero
    Inc(FieldPath, Number),
    /// `$push`: append to an array, absent becomes `[value]`
    Push(FieldPath, Value),
    /// `$pull`: remove every equal array element
    Pull(FieldPath, Value),
}

impl UpdateOp {
    pub fn path(&self) -> &FieldPath {
        match self {
            UpdateOp::Set(path, _)
            | UpdateOp::Unset(path)
            | UpdateOp::Inc(path, _)
            | UpdateOp::Push(path, _)
            | UpdateOp::Pull(path, _) => path,
        }
    }
}

/// Operators in the order they are applied, regardless of how the
/// caller ordered them.
const OPERATOR_ORDER: [&str; 5] = ["$set", "$unset", "$inc", "$push", "$pull"];

/// A parsed, validated update
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateSpec {
    ops: Vec<UpdateOp>,
}

impl UpdateSpec {
    /// Parse an update expression.
    ///
    /// Paths targeting `_id`, `_created_at` or `_updated_at` are dropped.
    pub fn parse(expr: &Value) -> EngineResult<Self> {
        let Value::Object(map) = expr else {
            return Err(EngineError::invalid_update("Update must be a JSON object"));
        };
        if map.is_empty() {
            return Err(EngineError::invalid_update("Update must contain at least one operator"));
        }

        for key in map.keys() {
            if !key.starts_with('$') {
                return Err(EngineError::invalid_update(format!(
                    "Replacement documents are not supported, found field '{}'",
                    key
                )));
            }
            if !OPERATOR_ORDER.contains(&key.as_str()) {
                return Err(EngineError::invalid_update(format!(
                    "Unsupported update operator: {}",
                    key
                )));
            }
        }

        let mut ops = Vec::new();
        for name in OPERATOR_ORDER {
            let Some(operand) = map.get(name) else {
                continue;
            };
            let Value::Object(fields) = operand else {
                return Err(EngineError::invalid_update(format!(
                    "{} requires a mapping of field paths",
                    name
                )));
            };

            for (raw_path, value) in fields {
                let path = FieldPath::parse(raw_path).ok_or_else(|| {
                    EngineError::invalid_update(format!("Invalid field path: '{}'", raw_path))
                })?;
                if is_reserved_field(path.root()) {
                    continue;
                }
                ops.push(Self::build_op(name, path, value)?);
            }
        }

        Ok(Self { ops })
    }

    fn build_op(name: &str, path: FieldPath, value: &Value) -> EngineResult<UpdateOp> {
        if name == "$set" || name == "$push" {
            check_nested(value).map_err(|e| {
                EngineError::invalid_update(format!("{} value for '{}': {}", name, path, e.message()))
            })?;
        }
        let op = match name {
            "$set" => UpdateOp::Set(path, value.clone()),
            "$unset" => UpdateOp::Unset(path),
            "$inc" => {
                let Value::Number(delta) = value else {
                    return Err(EngineError::invalid_update(format!(
                        "$inc value for '{}' must be a number",
                        path
                    )));
                };
                UpdateOp::Inc(path, delta.clone())
            }
            "$push" => UpdateOp::Push(path, value.clone()),
            "$pull" => UpdateOp::Pull(path, value.clone()),
            other => {
                return Err(EngineError::invalid_update(format!(
                    "Unsupported update operator: {}",
                    other
                )))
            }
        };
        Ok(op)
    }

    pub fn ops(&self) -> &[UpdateOp] {
        &self.ops
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::EngineErrorCode;
    use serde_json::json;

    #[test]
    fn test_parse_applies_fixed_operator_order() {
        let spec = UpdateSpec::parse(&json!({
            "$pull": {"tags": "x"},
            "$inc": {"n": 1},
            "$set": {"a": 1, "b": 2}
        }))
        .unwrap();
        let names: Vec<_> = spec
            .ops()
            .iter()
            .map(|op| match op {
                UpdateOp::Set(p, _) => format!("set:{}", p),
                UpdateOp::Inc(p, _) => format!("inc:{}", p),
                UpdateOp::Pull(p, _) => format!("pull:{}", p),
                other => format!("{:?}", other),
            })
            .collect();
        assert_eq!(names, vec!["set:a", "set:b", "inc:n", "pull:tags"]);
    }

    #[test]
    fn test_reserved_fields_are_ignored() {
        let spec = UpdateSpec::parse(&json!({"$set": {"_id": "x", "_created_at": "y", "name": "n"}}))
            .unwrap();
        assert_eq!(spec.ops().len(), 1);
        assert_eq!(spec.ops()[0].path().as_str(), "name");

        let spec = UpdateSpec::parse(&json!({"$unset": {"_updated_at": ""}})).unwrap();
        assert!(spec.ops().is_empty());
    }

    #[test]
    fn test_rejects_malformed_updates() {
        let cases = [
            json!("x"),
            json!({}),
            json!({"name": "John"}),
            json!({"$rename": {"a": "b"}}),
            json!({"$set": 5}),
            json!({"$inc": {"n": "1"}}),
            json!({"$set": {"a..b": 1}}),
        ];
        for case in cases {
            let err = UpdateSpec::parse(&case).unwrap_err();
            assert_eq!(err.code(), EngineErrorCode::InvalidUpdate, "{}", case);
        }
    }

    #[test]
    fn test_set_rejects_dotted_names_in_value() {
        let err = UpdateSpec::parse(&json!({"$set": {"a": {"b.c": 1}}})).unwrap_err();
        assert_eq!(err.code(), EngineErrorCode::InvalidUpdate);
        let err = UpdateSpec::parse(&json!({"$set": {"a": [{"b.c": 1}]}})).unwrap_err();
        assert_eq!(err.code(), EngineErrorCode::InvalidUpdate);
        assert!(UpdateSpec::parse(&json!({"$set": {"a.b": {"c": 1}}})).is_ok());
    }

    #[test]
    fn test_push_rejects_dotted_names_in_value() {
        let err = UpdateSpec::parse(&json!({"$push": {"l": {"k.j": 2}}})).unwrap_err();
        assert_eq!(err.code(), EngineErrorCode::InvalidUpdate);
    }
}
