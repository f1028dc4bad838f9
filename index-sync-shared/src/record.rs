//! Record identity and record payload types.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use serde_json::{Map, Value};

/// Identifier of one logical record, shared by the source and every destination.
///
/// Relational keys are read as text so integer, uuid and text primary keys
/// all compare the same way on both sides.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId(String);

impl RecordId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for RecordId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<i64> for RecordId {
    fn from(value: i64) -> Self {
        Self(value.to_string())
    }
}

/// Unordered, duplicate-free set of identifiers.
pub type IdentifierSet = HashSet<RecordId>;

/// Raw value of one fetched column.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// SQL NULL, or a left-joined column with no matching row.
    Null,
    /// Scalar column rendered as text by the source.
    Text(String),
    /// Structured column (arrays, vectors) rendered as JSON by the source.
    Json(Value),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null | FieldValue::Json(Value::Null))
    }
}

impl From<Option<String>> for FieldValue {
    fn from(value: Option<String>) -> Self {
        value.map_or(FieldValue::Null, FieldValue::Text)
    }
}

/// A fetched row plus its joined auxiliary data.
///
/// Created by the fetcher and only read afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRecord {
    pub id: RecordId,
    pub fields: BTreeMap<String, FieldValue>,
}

impl SourceRecord {
    pub fn new(id: impl Into<RecordId>) -> Self {
        Self {
            id: id.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Set a column value (builder style).
    pub fn with_field(mut self, name: impl Into<String>, value: FieldValue) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    /// Set a text column value (builder style).
    pub fn with_text(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.with_field(name, FieldValue::Text(value.into()))
    }

    /// Look up a column; absent columns read as `Null`.
    pub fn field(&self, name: &str) -> &FieldValue {
        self.fields.get(name).unwrap_or(&FieldValue::Null)
    }
}

/// A destination-typed field value.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentValue {
    Text(String),
    Number(f64),
    Vector(Vec<f32>),
}

/// A record reshaped for a destination.
///
/// Missing fields are absent from `fields`; they are never carried as null.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedDocument {
    pub id: RecordId,
    pub fields: BTreeMap<String, DocumentValue>,
}

impl NormalizedDocument {
    pub fn new(id: RecordId) -> Self {
        Self {
            id,
            fields: BTreeMap::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&DocumentValue> {
        self.fields.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Render the document as a JSON object body.
    ///
    /// The identifier is always written under `id`.
    pub fn to_json(&self) -> Map<String, Value> {
        let mut body = Map::with_capacity(self.fields.len() + 1);
        body.insert("id".to_string(), Value::String(self.id.to_string()));
        for (name, value) in &self.fields {
            let json = match value {
                DocumentValue::Text(s) => Value::String(s.clone()),
                DocumentValue::Number(n) => {
                    serde_json::Number::from_f64(*n).map_or(Value::Null, Value::Number)
                }
                DocumentValue::Vector(v) => Value::Array(
                    v.iter()
                        .filter_map(|x| serde_json::Number::from_f64(f64::from(*x)))
                        .map(Value::Number)
                        .collect(),
                ),
            };
            if !json.is_null() {
                body.insert(name.clone(), json);
            }
        }
        body
    }
}
