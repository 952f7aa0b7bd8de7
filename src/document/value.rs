//! Equality and ordering rules for document values
//!
//! Values are `serde_json::Value`: null, bool, number, string, array, object.
//! Equality is structural with numbers compared by magnitude (`30 == 30.0`)
//! and objects compared without regard to key order. Ordering is only
//! defined between two numbers or two strings; any other pairing is
//! unordered and makes range comparisons fail instead of erroring.

use std::cmp::Ordering;

use serde_json::{Number, Value};

/// Structural equality used by the matcher, `$pull`, and index lookups.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Number(x), Value::Number(y)) => numbers_equal(x, y),
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(l, r)| values_equal(l, r))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x
                    .iter()
                    .all(|(k, v)| y.get(k).map_or(false, |other| values_equal(v, other)))
        }
        _ => false,
    }
}

/// Ordering between mutually ordered values, `None` otherwise.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => compare_numbers(x, y),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Numeric equality across integer and float representations.
pub fn numbers_equal(a: &Number, b: &Number) -> bool {
    compare_numbers(a, b) == Some(Ordering::Equal)
}

/// Numeric ordering across integer and float representations.
///
/// Exact integer comparison is used when both sides fit the same integer
/// type; otherwise both sides are compared as f64.
pub fn compare_numbers(a: &Number, b: &Number) -> Option<Ordering> {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        return Some(x.cmp(&y));
    }
    if let (Some(x), Some(y)) = (a.as_u64(), b.as_u64()) {
        return Some(x.cmp(&y));
    }
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x.partial_cmp(&y),
        _ => None,
    }
}

/// Adds two numbers, staying integral while both sides are integers and
/// the sum does not overflow.
pub fn add_numbers(a: &Number, b: &Number) -> Option<Number> {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        if let Some(sum) = x.checked_add(y) {
            return Some(Number::from(sum));
        }
    }
    Number::from_f64(a.as_f64()? + b.as_f64()?)
}

/// Human-readable type name for error messages.
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_numbers_equal_across_representations() {
        assert!(values_equal(&json!(30), &json!(30.0)));
        assert!(!values_equal(&json!(30), &json!(30.5)));
        assert!(values_equal(&json!(-1), &json!(-1.0)));
    }

    #[test]
    fn test_no_cross_type_equality() {
        assert!(!values_equal(&json!("30"), &json!(30)));
        assert!(!values_equal(&json!(null), &json!(false)));
        assert!(!values_equal(&json!(0), &json!(false)));
    }

    #[test]
    fn test_object_equality_ignores_key_order() {
        let a = json!({"a": 1, "b": [1, 2]});
        let b = json!({"b": [1.0, 2], "a": 1});
        assert!(values_equal(&a, &b));
        assert!(!values_equal(&a, &json!({"a": 1})));
    }

    #[test]
    fn test_array_equality_is_ordered() {
        assert!(!values_equal(&json!([1, 2]), &json!([2, 1])));
    }

    #[test]
    fn test_compare_only_ordered_pairs() {
        assert_eq!(compare_values(&json!(1), &json!(2.5)), Some(Ordering::Less));
        assert_eq!(compare_values(&json!("b"), &json!("a")), Some(Ordering::Greater));
        assert_eq!(compare_values(&json!("1"), &json!(1)), None);
        assert_eq!(compare_values(&json!(true), &json!(false)), None);
        assert_eq!(compare_values(&json!(null), &json!(null)), None);
    }

    #[test]
    fn test_large_integers_compare_exactly() {
        let a = json!(9_007_199_254_740_993_i64);
        let b = json!(9_007_199_254_740_992_i64);
        assert_eq!(compare_values(&a, &b), Some(Ordering::Greater));
        assert_eq!(compare_values(&json!(u64::MAX), &json!(u64::MAX - 1)), Some(Ordering::Greater));
    }

    #[test]
    fn test_add_numbers() {
        let sum = add_numbers(&Number::from(30), &Number::from(1)).unwrap();
        assert_eq!(sum.as_i64(), Some(31));

        let sum = add_numbers(&Number::from(1), &Number::from_f64(0.5).unwrap()).unwrap();
        assert_eq!(sum.as_f64(), Some(1.5));

        let sum = add_numbers(&Number::from(i64::MAX), &Number::from(1)).unwrap();
        assert!(sum.as_i64().is_none());
    }
}
