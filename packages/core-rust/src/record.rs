//! Record representation shared by the engine, the store, and the views.

use serde_json::Value;

use crate::field::ID_KEY;

/// A business record: field key to JSON value, in insertion order.
///
/// Form submissions produce strings; numeric fields are coerced to JSON
/// numbers at submission time, and imported records carry whatever JSON the
/// user supplied.
pub type Record = serde_json::Map<String, Value>;

/// Numeric identifier of a record within its business.
pub type RecordId = i64;

/// Reads the record's `id`, accepting JSON integers, integral floats, and
/// numeric strings. Returns `None` when the id is absent or unusable.
#[must_use]
pub fn record_id(record: &Record) -> Option<RecordId> {
    record.get(ID_KEY).and_then(id_from_value)
}

/// Interprets a JSON value as a record id.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn id_from_value(value: &Value) -> Option<RecordId> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < 9.0e15)
                .map(|f| f as RecordId)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Whether a value counts as "not filled in": `null` or a whitespace-only
/// string. Numbers and booleans are always considered filled.
#[must_use]
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// Whether `key` is absent from the record or holds a blank value.
#[must_use]
pub fn is_missing(record: &Record, key: &str) -> bool {
    record.get(key).is_none_or(is_blank)
}

/// Whether a value is "truthy" in the sense the form layer uses when deciding
/// to validate it: not `null`, `false`, zero, or the empty string.
#[must_use]
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Renders a scalar the way it appears in a text input or table cell.
///
/// Integral floats lose their trailing `.0`; `null` renders as an empty
/// string; arrays and objects fall back to compact JSON.
#[must_use]
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => i.to_string(),
            (None, Some(f)) if f.fract() == 0.0 && f.abs() < 1.0e15 => format!("{f:.0}"),
            _ => n.to_string(),
        },
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn rec(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn record_id_from_numbers_and_strings() {
        assert_eq!(record_id(&rec(json!({"id": 7}))), Some(7));
        assert_eq!(record_id(&rec(json!({"id": 7.0}))), Some(7));
        assert_eq!(record_id(&rec(json!({"id": " 12 "}))), Some(12));
        assert_eq!(record_id(&rec(json!({"id": 7.5}))), None);
        assert_eq!(record_id(&rec(json!({"id": "abc"}))), None);
        assert_eq!(record_id(&rec(json!({"id": null}))), None);
        assert_eq!(record_id(&rec(json!({}))), None);
    }

    #[test]
    fn blank_and_missing() {
        let r = rec(json!({"a": "  ", "b": 0, "c": null, "d": "x"}));
        assert!(is_missing(&r, "a"));
        assert!(!is_missing(&r, "b"));
        assert!(is_missing(&r, "c"));
        assert!(!is_missing(&r, "d"));
        assert!(is_missing(&r, "e"));
    }

    #[test]
    fn truthiness() {
        assert!(!is_truthy(&json!("")));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!(false)));
        assert!(is_truthy(&json!(" ")));
        assert!(is_truthy(&json!(3)));
    }

    #[test]
    fn display_drops_integral_fraction() {
        assert_eq!(display_value(&json!(3.0)), "3");
        assert_eq!(display_value(&json!(3.25)), "3.25");
        assert_eq!(display_value(&json!(null)), "");
        assert_eq!(display_value(&json!("VENCIDA")), "VENCIDA");
    }
}
