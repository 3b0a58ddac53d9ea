//! Validated input objects.

use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Validation failure raised by a [`Schema`] implementation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaError {
    /// Offending field, when the failure is attributable to one.
    pub field: Option<String>,
    pub message: String,
}

impl SchemaError {
    /// Builds an error attached to one field.
    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: Some(field.into()),
            message: message.into(),
        }
    }

    /// Builds an error for the object as a whole.
    pub fn object(message: impl Into<String>) -> Self {
        Self {
            field: None,
            message: message.into(),
        }
    }
}

impl Display for SchemaError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.field {
            Some(field) => write!(f, "invalid field `{field}`: {}", self.message),
            None => write!(f, "invalid input: {}", self.message),
        }
    }
}

impl Error for SchemaError {}

/// Typed, validated input for create/update calls.
///
/// The serialized form must be a JSON object. Fields that serialize as absent
/// are treated as unset and never reach the change-set, so update schemas
/// usually mark optional fields with
/// `#[serde(skip_serializing_if = "Option::is_none")]`.
pub trait Schema: Serialize {
    /// Checks object-level invariants before conversion.
    fn validate(&self) -> Result<(), SchemaError> {
        Ok(())
    }
}
