//! Event data model.
//!
//! A [`Model`] tells the compiler which fields exist, what type each field
//! holds, and which event type a field belongs to. The crate ships
//! [`SchemaModel`], a table-driven model that can be loaded from YAML.

pub mod schema;

pub use schema::{FieldSchema, SchemaModel};

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of an event attribute path, e.g. `process.name`.
pub type Field = String;

/// Identifier of an event kind, e.g. `exec` or `open`.
pub type EventType = String;

/// Value type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Int,
    String,
    Bool,
    IntArray,
    StringArray,
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldType::Int => "int",
            FieldType::String => "string",
            FieldType::Bool => "bool",
            FieldType::IntArray => "int array",
            FieldType::StringArray => "string array",
        };
        f.write_str(name)
    }
}

/// What the model knows about a single field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub field_type: FieldType,
    /// `None` when the field cannot be tied to an event type.
    pub event_type: Option<EventType>,
}

/// Schema of the events that compiled macros are evaluated against.
pub trait Model: Send + Sync {
    /// Returns the spec of `field`, or a `Field { NotFound }` error.
    fn field_spec(&self, field: &str) -> Result<FieldSpec>;
}

impl<M: Model + ?Sized> Model for &M {
    fn field_spec(&self, field: &str) -> Result<FieldSpec> {
        (**self).field_spec(field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_type_serde_names() {
        let parsed: FieldType = serde_yaml::from_str("string_array").unwrap();
        assert_eq!(parsed, FieldType::StringArray);
        assert_eq!(serde_json::to_string(&FieldType::Int).unwrap(), "\"int\"");
    }

    #[test]
    fn test_field_type_display() {
        assert_eq!(FieldType::IntArray.to_string(), "int array");
        assert_eq!(FieldType::Bool.to_string(), "bool");
    }
}
