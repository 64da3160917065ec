//! Loosely-typed caller input
//!
//! A raw record maps arbitrary keys to a tagged scalar/list value. Every
//! conversion here is total: nothing in this module can fail on a value.

use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

use crate::errors::{CoreError, Result};

/// One caller-supplied field value
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    /// Explicit `null`
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<RawValue>),
}

impl RawValue {
    /// Numeric coercion. Unparseable or non-finite values yield `None`.
    pub fn to_number(&self) -> Option<f64> {
        let n = match self {
            RawValue::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            RawValue::Int(i) => *i as f64,
            RawValue::Float(f) => *f,
            RawValue::Text(s) => s.trim().parse::<f64>().ok()?,
            RawValue::Null | RawValue::List(_) => return None,
        };
        n.is_finite().then_some(n)
    }

    /// Text form used for categorical columns; `None` for `Null`
    pub fn to_text(&self) -> Option<String> {
        match self {
            RawValue::Null => None,
            RawValue::Text(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, RawValue::Null)
    }
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawValue::Null => f.write_str("null"),
            RawValue::Bool(b) => write!(f, "{b}"),
            RawValue::Int(i) => write!(f, "{i}"),
            RawValue::Float(v) if v.is_finite() && v.fract() == 0.0 => write!(f, "{v:.1}"),
            RawValue::Float(v) => write!(f, "{v}"),
            RawValue::Text(s) => f.write_str(s),
            RawValue::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
        }
    }
}

impl From<&Value> for RawValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => RawValue::Null,
            Value::Bool(b) => RawValue::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => RawValue::Int(i),
                None => n.as_f64().map(RawValue::Float).unwrap_or(RawValue::Null),
            },
            Value::String(s) => RawValue::Text(s.clone()),
            Value::Array(items) => RawValue::List(items.iter().map(RawValue::from).collect()),
            // Nested objects keep their JSON text so they coerce like any other string
            Value::Object(_) => RawValue::Text(value.to_string()),
        }
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        RawValue::Text(value.to_string())
    }
}

impl From<String> for RawValue {
    fn from(value: String) -> Self {
        RawValue::Text(value)
    }
}

impl From<i64> for RawValue {
    fn from(value: i64) -> Self {
        RawValue::Int(value)
    }
}

impl From<f64> for RawValue {
    fn from(value: f64) -> Self {
        RawValue::Float(value)
    }
}

impl From<bool> for RawValue {
    fn from(value: bool) -> Self {
        RawValue::Bool(value)
    }
}

impl<T: Into<RawValue>> From<Vec<T>> for RawValue {
    fn from(values: Vec<T>) -> Self {
        RawValue::List(values.into_iter().map(Into::into).collect())
    }
}

/// Caller input: field name to raw value
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord {
    fields: BTreeMap<String, RawValue>,
}

impl RawRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a record from a JSON value; anything but an object is rejected
    pub fn from_json(value: &Value) -> Result<Self> {
        let map = value.as_object().ok_or_else(|| {
            CoreError::InvalidInput(format!(
                "input must be a mapping of feature -> value, got {}",
                json_kind(value)
            ))
        })?;

        let fields = map
            .iter()
            .map(|(k, v)| (k.clone(), RawValue::from(v)))
            .collect();
        Ok(Self { fields })
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<RawValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<RawValue>) {
        self.fields.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&RawValue> {
        self.fields.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a mapping",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_numeric_coercion() {
        assert_eq!(RawValue::Int(3).to_number(), Some(3.0));
        assert_eq!(RawValue::Float(2.5).to_number(), Some(2.5));
        assert_eq!(RawValue::from(" 1200 ").to_number(), Some(1200.0));
        assert_eq!(RawValue::Bool(true).to_number(), Some(1.0));
        assert_eq!(RawValue::from("abc").to_number(), None);
        assert_eq!(RawValue::from("inf").to_number(), None);
        assert_eq!(RawValue::Null.to_number(), None);
        assert_eq!(RawValue::from(vec!["1"]).to_number(), None);
    }

    #[test]
    fn test_text_coercion() {
        assert_eq!(RawValue::from("Dwarka").to_text().as_deref(), Some("Dwarka"));
        assert_eq!(RawValue::Int(2).to_text().as_deref(), Some("2"));
        assert_eq!(RawValue::Float(2.0).to_text().as_deref(), Some("2.0"));
        assert_eq!(RawValue::Float(2.5).to_text().as_deref(), Some("2.5"));
        assert_eq!(RawValue::Null.to_text(), None);
        assert_eq!(
            RawValue::from(vec!["a", "b"]).to_text().as_deref(),
            Some("[a, b]")
        );
    }

    #[test]
    fn test_from_json_object() {
        let value = json!({"BHK": 3, "Size_in_SqFt": 1450.5, "Locality": "Rohini", "x": null});
        let record = RawRecord::from_json(&value).unwrap();

        assert_eq!(record.len(), 4);
        assert_eq!(record.get("BHK"), Some(&RawValue::Int(3)));
        assert_eq!(record.get("Size_in_SqFt"), Some(&RawValue::Float(1450.5)));
        assert_eq!(record.get("x"), Some(&RawValue::Null));
    }

    #[test]
    fn test_from_json_rejects_non_mapping() {
        for value in [json!([1, 2]), json!("BHK"), json!(3), json!(null)] {
            let err = RawRecord::from_json(&value).unwrap_err();
            assert!(err.is_client_error());
        }
    }

    #[test]
    fn test_nested_object_becomes_text() {
        let value = json!({"Facing": {"dir": "N"}});
        let record = RawRecord::from_json(&value).unwrap();
        assert_eq!(
            record.get("Facing"),
            Some(&RawValue::Text(r#"{"dir":"N"}"#.to_string()))
        );
    }
}
