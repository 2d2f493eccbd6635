//! Document model.
//!
//! A [`Document`] is a key plus typed, non-vector field values. Vector field
//! values live only in each field's vector store and are re-attached when a
//! document is returned. [`Document::from_json`] validates an incoming JSON
//! object against the index schema.

use crate::error::{check_vector, Result, SearchError};
use crate::schema::{FieldType, IndexSchema};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;

/// A typed field value.
///
/// Uses the default externally-tagged serde representation for bincode
/// snapshots; JSON at the HTTP boundary goes through [`FieldValue::to_json`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    StringCollection(Vec<String>),
}

impl FieldValue {
    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::Boolean(b) => Value::Bool(*b),
            FieldValue::Integer(i) => Value::Number((*i).into()),
            FieldValue::Float(f) => Number::from_f64(*f).map_or(Value::Null, Value::Number),
            FieldValue::String(s) => Value::String(s.clone()),
            FieldValue::StringCollection(items) => {
                Value::Array(items.iter().cloned().map(Value::String).collect())
            }
        }
    }

    /// Text that the BM25 index sees for this value.
    pub fn searchable_text(&self) -> Option<String> {
        match self {
            FieldValue::String(s) => Some(s.clone()),
            FieldValue::StringCollection(items) => Some(items.join(" ")),
            _ => None,
        }
    }
}

/// A stored document without its vectors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub key: String,
    pub fields: BTreeMap<String, FieldValue>,
}

/// A parsed indexing payload: the document's scalar fields plus its vectors.
///
/// A field mapped to `None` was explicitly set to JSON `null`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentInput {
    pub key: String,
    pub fields: BTreeMap<String, Option<FieldValue>>,
    pub vectors: BTreeMap<String, Option<Vec<f32>>>,
}

impl Document {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    /// Parse and validate a JSON document body against `schema`.
    ///
    /// `@search.action` and other `@`-prefixed annotations are ignored here.
    /// Vector values are checked for dimension and finiteness.
    pub fn from_json(schema: &IndexSchema, body: &Map<String, Value>) -> Result<DocumentInput> {
        let key_field = schema.key_field();
        let key = match body.get(key_field) {
            Some(Value::String(k)) if is_valid_key(k) => k.clone(),
            Some(Value::String(k)) => {
                return Err(SearchError::InvalidDocument(format!("invalid document key '{k}'")))
            }
            _ => {
                return Err(SearchError::InvalidDocument(format!(
                    "missing string key field '{key_field}'"
                )))
            }
        };

        let mut input = DocumentInput {
            key,
            ..DocumentInput::default()
        };
        for (name, value) in body {
            if name.starts_with('@') || name == key_field {
                continue;
            }
            let def = schema
                .field(name)
                .ok_or_else(|| SearchError::InvalidDocument(format!("unknown field '{name}'")))?;
            if value.is_null() {
                if def.field_type == FieldType::Vector {
                    input.vectors.insert(name.clone(), None);
                } else {
                    input.fields.insert(name.clone(), None);
                }
                continue;
            }
            match def.field_type {
                FieldType::Vector => {
                    let vector = parse_vector(name, value)?;
                    check_vector(&vector, def.dimensions.unwrap_or(0))?;
                    input.vectors.insert(name.clone(), Some(vector));
                }
                ty => {
                    let parsed = parse_scalar(name, ty, value)?;
                    input.fields.insert(name.clone(), Some(parsed));
                }
            }
        }
        Ok(input)
    }
}

/// Keys may contain letters, digits, `_`, `-`, `=`, and must not be empty.
fn is_valid_key(key: &str) -> bool {
    !key.is_empty()
        && key.len() <= 1024
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '='))
}

fn type_error(name: &str, expected: &str) -> SearchError {
    SearchError::InvalidDocument(format!("field '{name}' expects {expected}"))
}

fn parse_vector(name: &str, value: &Value) -> Result<Vec<f32>> {
    let items = value
        .as_array()
        .ok_or_else(|| type_error(name, "an array of numbers"))?;
    items
        .iter()
        .map(|v| {
            v.as_f64()
                .map(|f| f as f32)
                .ok_or_else(|| type_error(name, "an array of numbers"))
        })
        .collect()
}

fn parse_scalar(name: &str, ty: FieldType, value: &Value) -> Result<FieldValue> {
    match (ty, value) {
        (FieldType::String, Value::String(s)) => Ok(FieldValue::String(s.clone())),
        (FieldType::Boolean, Value::Bool(b)) => Ok(FieldValue::Boolean(*b)),
        (FieldType::Int32, Value::Number(n)) => n
            .as_i64()
            .filter(|i| i32::try_from(*i).is_ok())
            .map(FieldValue::Integer)
            .ok_or_else(|| type_error(name, "a 32-bit integer")),
        (FieldType::Int64, Value::Number(n)) => n
            .as_i64()
            .map(FieldValue::Integer)
            .ok_or_else(|| type_error(name, "a 64-bit integer")),
        (FieldType::Double, Value::Number(n)) => n
            .as_f64()
            .map(FieldValue::Float)
            .ok_or_else(|| type_error(name, "a number")),
        (FieldType::StringCollection, Value::Array(items)) => items
            .iter()
            .map(|v| v.as_str().map(str::to_string))
            .collect::<Option<Vec<_>>>()
            .map(FieldValue::StringCollection)
            .ok_or_else(|| type_error(name, "an array of strings")),
        (FieldType::String, _) => Err(type_error(name, "a string")),
        (FieldType::Boolean, _) => Err(type_error(name, "a boolean")),
        (FieldType::StringCollection, _) => Err(type_error(name, "an array of strings")),
        _ => Err(type_error(name, "a number")),
    }
}
