//! Comparison of JSON values found in search data.

use std::cmp::Ordering;

use serde_json::Value;

fn kind_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Ordering between two values of the same JSON kind, `None` otherwise.
pub fn compare_same_kind(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Array(a), Value::Array(b)) => {
            for (x, y) in a.iter().zip(b) {
                match compare_total(x, y) {
                    Ordering::Equal => continue,
                    other => return Some(other),
                }
            }
            Some(a.len().cmp(&b.len()))
        }
        (Value::Object(a), Value::Object(b)) => Some(a.len().cmp(&b.len())),
        _ => None,
    }
}

/// A total order over JSON values: kinds rank null < bool < number <
/// string < array < object, then values compare within their kind.
pub fn compare_total(a: &Value, b: &Value) -> Ordering {
    kind_rank(a)
        .cmp(&kind_rank(b))
        .then_with(|| compare_same_kind(a, b).unwrap_or(Ordering::Equal))
}

/// Strict equality; numbers compare by value so `1` equals `1.0`.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// Text used by substring matching.
pub fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_numbers_compare_by_value() {
        assert_eq!(compare_same_kind(&json!(2), &json!(10.5)), Some(Ordering::Less));
        assert!(values_equal(&json!(1), &json!(1.0)));
    }

    #[test]
    fn test_mixed_kinds() {
        assert_eq!(compare_same_kind(&json!("1"), &json!(1)), None);
        assert_eq!(compare_total(&json!(true), &json!(0)), Ordering::Less);
        assert_eq!(compare_total(&json!("a"), &json!(99)), Ordering::Greater);
    }

    #[test]
    fn test_value_text() {
        assert_eq!(value_text(&json!("Mango")), "Mango");
        assert_eq!(value_text(&json!(12)), "12");
    }
}
