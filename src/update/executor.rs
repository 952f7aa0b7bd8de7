//! Update application
//!
//! Applies a parsed update to one document. The update is applied to a
//! working copy; the original is only replaced once every operator has
//! succeeded, so a failure never leaves a half-updated document.

use serde_json::Value;

use crate::document::{add_numbers, type_name, values_equal, Document, FieldPath, PathConflict};
use crate::errors::{EngineError, EngineResult};

use super::spec::{UpdateOp, UpdateSpec};

/// Applies update specifications to documents
pub struct UpdateExecutor;

impl UpdateExecutor {
    /// Apply `spec` to `document`, returning the updated copy.
    ///
    /// `_updated_at` is refreshed with `timestamp` even when no field
    /// value changed.
    pub fn apply(document: &Document, spec: &UpdateSpec, timestamp: &str) -> EngineResult<Document> {
        let mut working = document.clone();

        for op in spec.ops() {
            Self::apply_op(&mut working, op)?;
        }

        working.touch(timestamp);
        Ok(working)
    }

    fn apply_op(document: &mut Document, op: &UpdateOp) -> EngineResult<()> {
        let fields = document.fields_mut();
        match op {
            UpdateOp::Set(path, value) => set(fields, path, value.clone()),
            UpdateOp::Unset(path) => {
                path.remove(fields);
                Ok(())
            }
            UpdateOp::Inc(path, delta) => {
                let next = match path.resolve(fields) {
                    None => Value::Number(delta.clone()),
                    Some(Value::Number(current)) => {
                        let sum = add_numbers(current, delta).ok_or_else(|| {
                            EngineError::type_mismatch(format!(
                                "$inc on '{}' produced a non-finite number",
                                path
                            ))
                        })?;
                        Value::Number(sum)
                    }
                    Some(other) => {
                        return Err(EngineError::type_mismatch(format!(
                            "Cannot $inc '{}': value is a {}",
                            path,
                            type_name(other)
                        )))
                    }
                };
                set(fields, path, next)
            }
            UpdateOp::Push(path, value) => {
                let next = match path.resolve(fields) {
                    None => Value::Array(vec![value.clone()]),
                    Some(Value::Array(items)) => {
                        let mut items = items.clone();
                        items.push(value.clone());
                        Value::Array(items)
                    }
                    Some(other) => {
                        return Err(EngineError::type_mismatch(format!(
                            "Cannot $push to '{}': value is a {}",
                            path,
                            type_name(other)
                        )))
                    }
                };
                set(fields, path, next)
            }
            UpdateOp::Pull(path, value) => match path.resolve(fields) {
                None => Ok(()),
                Some(Value::Array(items)) => {
                    let kept: Vec<Value> = items
                        .iter()
                        .filter(|item| !values_equal(item, value))
                        .cloned()
                        .collect();
                    set(fields, path, Value::Array(kept))
                }
                Some(other) => Err(EngineError::type_mismatch(format!(
                    "Cannot $pull from '{}': value is a {}",
                    path,
                    type_name(other)
                ))),
            },
        }
    }
}

fn set(
    fields: &mut serde_json::Map<String, Value>,
    path: &FieldPath,
    value: Value,
) -> EngineResult<()> {
    path.set(fields, value).map_err(|PathConflict { prefix }| {
        EngineError::type_mismatch(format!(
            "Cannot write '{}': '{}' is not a mapping",
            path, prefix
        ))
    })
}
