//! Normalized run records, ready for export.

use chrono::{NaiveDateTime, Timelike};
use serde_json::Value;

/// Rendering used for parsed timestamps in exports
pub const EXPORT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Rendering used for timestamps that fall on a whole second
pub const EXPORT_WHOLE_SECOND_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A single exported value
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    /// Value passed through from the API
    Json(Value),
    /// Timestamp parsed during normalization
    Timestamp(NaiveDateTime),
}

impl Field {
    /// Textual form used for CSV cells and database columns.
    ///
    /// Nested values are serialized as compact JSON so they stay parseable.
    pub fn render(&self) -> String {
        match self {
            Field::Timestamp(ts) if ts.nanosecond() == 0 => {
                ts.format(EXPORT_WHOLE_SECOND_FORMAT).to_string()
            }
            Field::Timestamp(ts) => ts.format(EXPORT_TIMESTAMP_FORMAT).to_string(),
            Field::Json(Value::Null) => String::new(),
            Field::Json(Value::String(s)) => s.clone(),
            Field::Json(Value::Bool(b)) => b.to_string(),
            Field::Json(Value::Number(n)) => n.to_string(),
            Field::Json(value) => value.to_string(),
        }
    }

    pub fn as_timestamp(&self) -> Option<&NaiveDateTime> {
        match self {
            Field::Timestamp(ts) => Some(ts),
            Field::Json(_) => None,
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Field::Json(value) => Some(value),
            Field::Timestamp(_) => None,
        }
    }
}

impl From<Value> for Field {
    fn from(value: Value) -> Self {
        Field::Json(value)
    }
}

/// Ordered set of named fields for one run
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RunRecord {
    fields: Vec<(String, Field)>,
}

impl RunRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a field; replaces the value in place when the key already exists
    pub fn insert(&mut self, key: impl Into<String>, field: Field) {
        let key = key.into();
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = field,
            None => self.fields.push((key, field)),
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<Field> {
        let idx = self.fields.iter().position(|(k, _)| k == key)?;
        Some(self.fields.remove(idx).1)
    }

    pub fn get(&self, key: &str) -> Option<&Field> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, f)| f)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Rendered value of a field, empty when absent
    pub fn render(&self, key: &str) -> String {
        self.get(key).map(Field::render).unwrap_or_default()
    }

    pub fn id(&self) -> String {
        self.render("id")
    }

    pub fn state(&self) -> Option<&str> {
        self.get("state")
            .and_then(Field::as_json)
            .and_then(Value::as_str)
    }
}
