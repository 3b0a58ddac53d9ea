//! Change-set and write payload types.

use super::schema::{Schema, SchemaError};
use serde::Serialize;
use serde_json::{Map, Value};

/// Mapping of field name to new value.
///
/// Backed by an ordered map so generated SQL is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ChangeSet(Map<String, Value>);

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(field, value);
        self
    }

    /// Sets one field, returning the previous value if any.
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(field.into(), value.into())
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Field names in sorted order.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(field, value)| (field.as_str(), value))
    }

    /// Keeps only the fields accepted by `keep`.
    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.0.retain(|field, _| keep(field));
    }

    /// Validates `schema` and exports its set fields.
    ///
    /// # Errors
    /// - Returns the schema's own validation error.
    /// - Returns an object-level error when the schema does not serialize to a
    ///   JSON object.
    pub fn from_schema<S: Schema>(schema: &S) -> Result<Self, SchemaError> {
        schema.validate()?;
        match serde_json::to_value(schema) {
            Ok(Value::Object(map)) => Ok(Self(map)),
            Ok(other) => Err(SchemaError::object(format!(
                "schema must serialize to an object, got {}",
                json_kind(&other)
            ))),
            Err(err) => Err(SchemaError::object(err.to_string())),
        }
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for ChangeSet {
    fn from(value: Map<String, Value>) -> Self {
        Self(value)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for ChangeSet {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(field, value)| (field.into(), value.into()))
                .collect(),
        )
    }
}

impl IntoIterator for ChangeSet {
    type Item = (String, Value);
    type IntoIter = serde_json::map::IntoIter;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// A raw change-set is already a valid schema of itself.
impl Schema for ChangeSet {}

/// Write input chosen by the caller: a raw mapping or a schema object.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload<S> {
    Fields(ChangeSet),
    Schema(S),
}

impl<S: Schema> Payload<S> {
    /// Reduces the payload to a change-set, validating schema input.
    pub fn into_change_set(self) -> Result<ChangeSet, SchemaError> {
        match self {
            Self::Fields(fields) => Ok(fields),
            Self::Schema(schema) => ChangeSet::from_schema(&schema),
        }
    }
}

impl<S> From<ChangeSet> for Payload<S> {
    fn from(value: ChangeSet) -> Self {
        Self::Fields(value)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
