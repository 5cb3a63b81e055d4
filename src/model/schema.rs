//! Table-driven model loaded from YAML.
//!
//! ```yaml
//! fields:
//!   process.name:
//!     type: string
//!   process.uid:
//!     type: int
//!   open.file.path:
//!     type: string
//!     event_type: open
//! ```
//!
//! A field without an explicit `event_type` belongs to the event type named
//! by its first dotted segment, so `process.name` maps to `process`.

use super::{EventType, Field, FieldSpec, FieldType, Model};
use crate::error::{FieldErrorKind, Result, SeclError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSchema {
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_type: Option<EventType>,
}

/// A [`Model`] backed by a field table.
///
/// # Examples
///
/// ```rust
/// use secl_macro::{FieldType, Model, SchemaModel};
///
/// let model = SchemaModel::new()
///     .with_field("process.name", FieldType::String)
///     .with_field("process.uid", FieldType::Int);
///
/// let spec = model.field_spec("process.uid").unwrap();
/// assert_eq!(spec.field_type, FieldType::Int);
/// assert_eq!(spec.event_type.as_deref(), Some("process"));
/// assert!(model.field_spec("unknown.attr").is_err());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaModel {
    #[serde(default)]
    fields: BTreeMap<Field, FieldSchema>,
}

impl SchemaModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let model: SchemaModel = serde_yaml::from_str(yaml)?;
        model.validate()?;
        Ok(model)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml(&yaml)
    }

    /// Adds a field whose event type is derived from its first segment.
    pub fn with_field(mut self, name: impl Into<Field>, field_type: FieldType) -> Self {
        self.fields.insert(
            name.into(),
            FieldSchema {
                field_type,
                event_type: None,
            },
        );
        self
    }

    /// Adds a field bound to an explicit event type.
    pub fn with_event_field(
        mut self,
        name: impl Into<Field>,
        field_type: FieldType,
        event_type: impl Into<EventType>,
    ) -> Self {
        self.fields.insert(
            name.into(),
            FieldSchema {
                field_type,
                event_type: Some(event_type.into()),
            },
        );
        self
    }

    pub fn fields(&self) -> impl Iterator<Item = (&Field, &FieldSchema)> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    fn validate(&self) -> Result<()> {
        for name in self.fields.keys() {
            let valid = !name.is_empty()
                && !name.starts_with('.')
                && !name.ends_with('.')
                && !name.contains("..")
                && name
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
            if !valid {
                return Err(SeclError::Schema(format!("invalid field name: `{name}`")));
            }
        }
        Ok(())
    }
}

impl Model for SchemaModel {
    fn field_spec(&self, field: &str) -> Result<FieldSpec> {
        let schema = self
            .fields
            .get(field)
            .ok_or_else(|| SeclError::field(field, FieldErrorKind::NotFound))?;

        let event_type = schema.event_type.clone().or_else(|| {
            field
                .split_once('.')
                .map(|(prefix, _)| prefix.to_string())
        });

        Ok(FieldSpec {
            field_type: schema.field_type,
            event_type,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SCHEMA: &str = r#"
fields:
  process.name:
    type: string
  process.uid:
    type: int
  open.file.path:
    type: string
    event_type: open
  hostname:
    type: string
"#;

    #[test]
    fn test_from_yaml() {
        let model = SchemaModel::from_yaml(SCHEMA).unwrap();
        assert_eq!(model.len(), 4);

        let spec = model.field_spec("open.file.path").unwrap();
        assert_eq!(spec.field_type, FieldType::String);
        assert_eq!(spec.event_type.as_deref(), Some("open"));

        let spec = model.field_spec("process.name").unwrap();
        assert_eq!(spec.event_type.as_deref(), Some("process"));
    }

    #[test]
    fn test_field_without_event_type() {
        let model = SchemaModel::from_yaml(SCHEMA).unwrap();
        let spec = model.field_spec("hostname").unwrap();
        assert_eq!(spec.event_type, None);
    }

    #[test]
    fn test_unknown_field() {
        let model = SchemaModel::from_yaml(SCHEMA).unwrap();
        let err = model.field_spec("unknown.attr").unwrap_err();
        assert_eq!(
            err,
            SeclError::Field {
                field: "unknown.attr".to_string(),
                kind: FieldErrorKind::NotFound,
            }
        );
    }

    #[test]
    fn test_invalid_field_name_rejected() {
        let yaml = "fields:\n  \"process..name\":\n    type: string\n";
        let err = SchemaModel::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, SeclError::Schema(msg) if msg.contains("process..name")));
    }

    #[test]
    fn test_invalid_type_rejected() {
        let yaml = "fields:\n  process.name:\n    type: float\n";
        assert!(matches!(
            SchemaModel::from_yaml(yaml),
            Err(SeclError::Schema(_))
        ));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SCHEMA.as_bytes()).unwrap();

        let model = SchemaModel::from_file(file.path()).unwrap();
        assert_eq!(model.len(), 4);
    }

    #[test]
    fn test_from_missing_file() {
        let err = SchemaModel::from_file("/nonexistent/schema.yaml").unwrap_err();
        assert!(matches!(err, SeclError::Io(_)));
    }

    #[test]
    fn test_builder() {
        let model = SchemaModel::new()
            .with_field("process.name", FieldType::String)
            .with_event_field("exec.file.path", FieldType::String, "exec");

        assert_eq!(
            model.field_spec("exec.file.path").unwrap().event_type.as_deref(),
            Some("exec")
        );
        assert!(!model.is_empty());
        assert_eq!(model.fields().count(), 2);
    }
}
