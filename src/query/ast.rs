//! Parsed query representation
//!
//! A query is a mapping from field path to either a literal (equality) or
//! an operator mapping such as `{"$gte": 18, "$lt": 65}`. Top-level
//! clauses are AND-ed. An empty query matches every document.

use serde_json::Value;

use crate::document::FieldPath;
use crate::errors::{EngineError, EngineResult};

/// Comparison operators accepted inside an operator mapping
#[derive(Debug, Clone, PartialEq)]
pub enum FilterOp {
    /// `$eq`
    Eq(Value),
    /// `$ne`
    Ne(Value),
    /// `$lt`
    Lt(Value),
    /// `$lte`
    Lte(Value),
    /// `$gt`
    Gt(Value),
    /// `$gte`
    Gte(Value),
    /// `$in`
    In(Vec<Value>),
    /// `$nin`
    Nin(Vec<Value>),
}

impl FilterOp {
    /// Parse one `"$op": operand` entry.
    fn parse(name: &str, operand: &Value) -> EngineResult<Self> {
        let op = match name {
            "$eq" => FilterOp::Eq(operand.clone()),
            "$ne" => FilterOp::Ne(operand.clone()),
            "$lt" => FilterOp::Lt(operand.clone()),
            "$lte" => FilterOp::Lte(operand.clone()),
            "$gt" => FilterOp::Gt(operand.clone()),
            "$gte" => FilterOp::Gte(operand.clone()),
            "$in" | "$nin" => {
                let Value::Array(items) = operand else {
                    return Err(EngineError::invalid_query(format!(
                        "{} requires an array operand",
                        name
                    )));
                };
                if name == "$in" {
                    FilterOp::In(items.clone())
                } else {
                    FilterOp::Nin(items.clone())
                }
            }
            other => {
                return Err(EngineError::invalid_query(format!(
                    "Unsupported query operator: {}",
                    other
                )))
            }
        };
        Ok(op)
    }
}

/// Right-hand side of a clause
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Plain value: structural equality
    Literal(Value),
    /// Operator mapping: every operator must hold
    Operators(Vec<FilterOp>),
}

/// One `field: condition` entry
#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    pub path: FieldPath,
    pub condition: Condition,
}

impl Clause {
    /// Values an index on this clause's field could be probed with.
    ///
    /// Only equality-shaped conditions reduce to index lookups. A null
    /// operand also matches documents lacking the field, which no index
    /// holds, so those clauses return `None` and force a scan.
    pub fn equality_values(&self) -> Option<Vec<&Value>> {
        match &self.condition {
            Condition::Literal(value) if !value.is_null() => Some(vec![value]),
            Condition::Literal(_) => None,
            Condition::Operators(ops) => ops.iter().find_map(|op| match op {
                FilterOp::Eq(value) if !value.is_null() => Some(vec![value]),
                FilterOp::In(values) if !values.iter().any(Value::is_null) => {
                    Some(values.iter().collect())
                }
                _ => None,
            }),
        }
    }
}

/// A parsed query
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    clauses: Vec<Clause>,
}

impl Query {
    /// The empty query, matching everything
    pub fn all() -> Self {
        Self::default()
    }

    /// Parse a query expression.
    pub fn parse(expr: &Value) -> EngineResult<Self> {
        let Value::Object(map) = expr else {
            return Err(EngineError::invalid_query("Query must be a JSON object"));
        };

        let mut clauses = Vec::with_capacity(map.len());
        for (key, value) in map {
            if key.starts_with('$') {
                return Err(EngineError::invalid_query(format!(
                    "Unsupported top-level operator: {}",
                    key
                )));
            }
            let path = FieldPath::parse(key)
                .ok_or_else(|| EngineError::invalid_query(format!("Invalid field path: '{}'", key)))?;
            let condition = Self::parse_condition(key, value)?;
            clauses.push(Clause { path, condition });
        }

        Ok(Self { clauses })
    }

    /// Parse an optional query; absent or null means match-all.
    pub fn parse_optional(expr: Option<&Value>) -> EngineResult<Self> {
        match expr {
            None | Some(Value::Null) => Ok(Self::all()),
            Some(value) => Self::parse(value),
        }
    }

    fn parse_condition(key: &str, value: &Value) -> EngineResult<Condition> {
        let Value::Object(map) = value else {
            return Ok(Condition::Literal(value.clone()));
        };

        let operator_keys = map.keys().filter(|k| k.starts_with('$')).count();
        if operator_keys == 0 {
            return Ok(Condition::Literal(value.clone()));
        }
        if operator_keys != map.len() {
            return Err(EngineError::invalid_query(format!(
                "Field '{}' mixes operators and plain keys",
                key
            )));
        }

        map.iter()
            .map(|(name, operand)| FilterOp::parse(name, operand))
            .collect::<EngineResult<Vec<_>>>()
            .map(Condition::Operators)
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    /// Returns true if this query matches every document
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::EngineErrorCode;
    use serde_json::json;

    #[test]
    fn test_parse_literal_and_operators() {
        let query = Query::parse(&json!({"name": "John", "age": {"$gte": 18, "$lt": 65}})).unwrap();
        assert_eq!(query.clauses().len(), 2);
        assert_eq!(query.clauses()[0].condition, Condition::Literal(json!("John")));
        assert_eq!(
            query.clauses()[1].condition,
            Condition::Operators(vec![FilterOp::Gte(json!(18)), FilterOp::Lt(json!(65))])
        );
    }

    #[test]
    fn test_plain_mapping_is_literal() {
        let query = Query::parse(&json!({"address": {"city": "Oslo"}})).unwrap();
        assert_eq!(
            query.clauses()[0].condition,
            Condition::Literal(json!({"city": "Oslo"}))
        );
    }

    #[test]
    fn test_empty_query_matches_all() {
        assert!(Query::parse(&json!({})).unwrap().is_empty());
        assert!(Query::parse_optional(None).unwrap().is_empty());
        assert!(Query::parse_optional(Some(&json!(null))).unwrap().is_empty());
    }

    #[test]
    fn test_rejects_malformed_queries() {
        let cases = [
            json!([1]),
            json!({"$or": [{"a": 1}]}),
            json!({"age": {"$regex": "x"}}),
            json!({"age": {"$in": 5}}),
            json!({"age": {"$gt": 1, "plain": 2}}),
            json!({"a..b": 1}),
        ];
        for case in cases {
            let err = Query::parse(&case).unwrap_err();
            assert_eq!(err.code(), EngineErrorCode::InvalidQuery, "{}", case);
        }
    }

    #[test]
    fn test_equality_values() {
        let query = Query::parse(&json!({
            "name": "John",
            "age": {"$gt": 1, "$in": [30, 31]},
            "nick": null,
            "tag": {"$in": ["a", null]},
            "score": {"$lt": 5}
        }))
        .unwrap();
        let values: Vec<_> = query.clauses().iter().map(Clause::equality_values).collect();
        assert_eq!(values[0], Some(vec![&json!("John")]));
        assert_eq!(values[1], Some(vec![&json!(30), &json!(31)]));
        assert_eq!(values[2], None);
        assert_eq!(values[3], None);
        assert_eq!(values[4], None);
    }
}
