//! Query matching
//!
//! Evaluates a parsed query against one document. No type coercion:
//! range operators only compare numbers with numbers and strings with
//! strings, and any other pairing simply fails the clause.

use std::cmp::Ordering;

use serde_json::Value;

use crate::document::{compare_values, values_equal, Document};

use super::ast::{Clause, Condition, FilterOp, Query};

/// Evaluates queries against documents
pub struct QueryMatcher;

impl QueryMatcher {
    /// Checks if a document matches every clause of the query
    pub fn matches(document: &Document, query: &Query) -> bool {
        query
            .clauses()
            .iter()
            .all(|clause| Self::matches_clause(document, clause))
    }

    fn matches_clause(document: &Document, clause: &Clause) -> bool {
        let actual = clause.path.resolve(document.fields());

        match &clause.condition {
            Condition::Literal(expected) => Self::eq_match(actual, expected),
            Condition::Operators(ops) => ops.iter().all(|op| Self::op_match(actual, op)),
        }
    }

    /// Absent fields only equal an explicit null.
    fn eq_match(actual: Option<&Value>, expected: &Value) -> bool {
        match actual {
            Some(value) => values_equal(value, expected),
            None => expected.is_null(),
        }
    }

    fn op_match(actual: Option<&Value>, op: &FilterOp) -> bool {
        match (op, actual) {
            (FilterOp::Eq(expected), _) => Self::eq_match(actual, expected),
            (FilterOp::In(candidates), _) => candidates.iter().any(|c| Self::eq_match(actual, c)),
            // Every other operator fails against an absent field
            (_, None) => false,
            (FilterOp::Ne(expected), Some(actual)) => !values_equal(actual, expected),
            (FilterOp::Lt(bound), Some(actual)) => Self::ordered(actual, bound, |o| o == Ordering::Less),
            (FilterOp::Lte(bound), Some(actual)) => {
                Self::ordered(actual, bound, |o| o != Ordering::Greater)
            }
            (FilterOp::Gt(bound), Some(actual)) => {
                Self::ordered(actual, bound, |o| o == Ordering::Greater)
            }
            (FilterOp::Gte(bound), Some(actual)) => Self::ordered(actual, bound, |o| o != Ordering::Less),
            (FilterOp::Nin(excluded), Some(actual)) => {
                !excluded.iter().any(|e| values_equal(actual, e))
            }
        }
    }

    fn ordered(actual: &Value, bound: &Value, accept: impl Fn(Ordering) -> bool) -> bool {
        compare_values(actual, bound).map_or(false, accept)
    }
}
