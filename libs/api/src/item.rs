use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::IngestError;

// ════════════════════════════════════════════════════════════════
//  Wire item
// ════════════════════════════════════════════════════════════════

/// Attribute value in the key-value wire form.
///
/// Numbers travel as decimal strings (DynamoDB `N`), so the textual
/// representation is fixed once at serialization time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeValue {
    S(String),
    N(String),
    Bool(bool),
}

impl std::fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttributeValue::S(s) | AttributeValue::N(s) => f.write_str(s),
            AttributeValue::Bool(b) => write!(f, "{b}"),
        }
    }
}

/// One serialized record: attribute name → value, ordered by name.
pub type Item = BTreeMap<String, AttributeValue>;

/// Serialize a flat record into an [`Item`].
///
/// Absent optional fields must be skipped by the record's serde attributes
/// (`skip_serializing_if = "Option::is_none"`); a `null` reaching this point
/// means an unset field or a non-finite float and is rejected as a
/// [`Format`](crate::ErrorKind::Format) error. Nested values are not
/// supported.
pub fn to_item<T: Serialize>(record: &T) -> Result<Item, IngestError> {
    let fields = match serde_json::to_value(record)? {
        Value::Object(fields) => fields,
        other => {
            return Err(IngestError::format_err(format!(
                "record must serialize to an object, got {}",
                type_name(&other)
            )));
        }
    };

    let mut item = Item::new();
    for (name, value) in fields {
        let attr = match value {
            Value::String(s) => AttributeValue::S(s),
            Value::Number(n) => AttributeValue::N(n.to_string()),
            Value::Bool(b) => AttributeValue::Bool(b),
            Value::Null => {
                return Err(IngestError::format_err(format!(
                    "attribute '{name}' is null (unset field or non-finite number)"
                )));
            }
            other => {
                return Err(IngestError::format_err(format!(
                    "attribute '{name}': nested {} is not supported",
                    type_name(&other)
                )));
            }
        };
        item.insert(name, attr);
    }
    Ok(item)
}

fn type_name(v: &Value) -> &'static str {
    match v {
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

    #[derive(Serialize)]
    struct Sample {
        id: i64,
        name: String,
        px: f64,
        live: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        qty: Option<f64>,
    }

    fn sample() -> Sample {
        Sample { id: 7, name: "buy".into(), px: 0.12345, live: true, qty: None }
    }

    #[test]
    fn flat_record_maps_to_attributes() {
        let item = to_item(&sample()).unwrap();
        assert_eq!(item.len(), 4);
        assert_eq!(item["id"], AttributeValue::N("7".into()));
        assert_eq!(item["name"], AttributeValue::S("buy".into()));
        assert_eq!(item["px"], AttributeValue::N("0.12345".into()));
        assert_eq!(item["live"], AttributeValue::Bool(true));
        assert!(!item.contains_key("qty"));
    }

    #[test]
    fn present_optional_is_kept() {
        let mut s = sample();
        s.qty = Some(2.5);
        let item = to_item(&s).unwrap();
        assert_eq!(item["qty"], AttributeValue::N("2.5".into()));
    }

    #[test]
    fn non_finite_number_is_format_error() {
        let mut s = sample();
        s.px = f64::NAN;
        let err = to_item(&s).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Format);
        assert!(err.message().contains("px"));
    }

    #[test]
    fn non_object_is_rejected() {
        let err = to_item(&42).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Format);
    }

    #[test]
    fn nested_is_rejected() {
        #[derive(Serialize)]
        struct Nested {
            tags: Vec<String>,
        }
        let err = to_item(&Nested { tags: vec!["a".into()] }).unwrap_err();
        assert!(err.message().contains("array"));
    }
}
