//! Event-type inference from field usage.

use crate::compiler::state::CompilerState;
use crate::error::{FieldErrorKind, Result, SeclError};
use crate::model::{EventType, Model};
use std::collections::BTreeSet;

/// Event types implied by every field the compile read.
pub fn event_types_from_fields(
    model: &dyn Model,
    state: &CompilerState,
) -> Result<BTreeSet<EventType>> {
    let mut event_types = BTreeSet::new();

    for field in state.field_values().keys() {
        let spec = model.field_spec(field)?;
        match spec.event_type {
            Some(event_type) => {
                event_types.insert(event_type);
            }
            None => return Err(SeclError::field(field, FieldErrorKind::NoEventType)),
        }
    }

    Ok(event_types)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FieldType, SchemaModel};
    use std::collections::HashMap;

    #[test]
    fn test_event_types_by_prefix() {
        let model = SchemaModel::new()
            .with_field("process.name", FieldType::String)
            .with_field("process.uid", FieldType::Int)
            .with_field("open.file.path", FieldType::String);
        let mut state = CompilerState::new(&model, None, HashMap::new());
        state.use_field("process.name");
        state.use_field("process.uid");
        state.use_field("open.file.path");

        let event_types = event_types_from_fields(&model, &state).unwrap();
        assert_eq!(
            event_types.into_iter().collect::<Vec<_>>(),
            vec!["open".to_string(), "process".to_string()]
        );
    }

    #[test]
    fn test_explicit_event_type() {
        let model = SchemaModel::new().with_event_field("container.id", FieldType::String, "*");
        let mut state = CompilerState::new(&model, None, HashMap::new());
        state.use_field("container.id");

        let event_types = event_types_from_fields(&model, &state).unwrap();
        assert!(event_types.contains("*"));
    }

    #[test]
    fn test_field_without_event_type() {
        let model = SchemaModel::new().with_field("hostname", FieldType::String);
        let mut state = CompilerState::new(&model, None, HashMap::new());
        state.use_field("hostname");

        let err = event_types_from_fields(&model, &state).unwrap_err();
        assert_eq!(
            err,
            SeclError::Field {
                field: "hostname".to_string(),
                kind: FieldErrorKind::NoEventType,
            }
        );
    }

    #[test]
    fn test_no_fields_no_event_types() {
        let model = SchemaModel::new();
        let state = CompilerState::new(&model, None, HashMap::new());
        assert!(event_types_from_fields(&model, &state).unwrap().is_empty());
    }
}
