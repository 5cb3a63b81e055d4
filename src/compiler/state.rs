//! Compilation state threaded through the node compiler.

use crate::eval::evaluator::FieldValue;
use crate::eval::macros::MacroEvaluator;
use crate::model::{Field, Model};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

/// Macro identifier.
pub type MacroId = String;

/// Mutable context for one compile.
///
/// A fresh state is built for every compile and dropped afterwards; only the
/// field usage it accumulated survives, copied into the resulting
/// [`MacroEvaluator`].
pub struct CompilerState<'a> {
    pub(crate) model: &'a dyn Model,
    /// Field targeted by a partial compile; `None` for a full compile.
    pub(crate) target_field: Option<Field>,
    pub(crate) macros: HashMap<MacroId, Arc<MacroEvaluator>>,
    pub(crate) field_values: BTreeMap<Field, Vec<FieldValue>>,
    pub(crate) used_macros: BTreeSet<MacroId>,
}

impl<'a> CompilerState<'a> {
    pub fn new(
        model: &'a dyn Model,
        target_field: Option<Field>,
        macros: HashMap<MacroId, Arc<MacroEvaluator>>,
    ) -> Self {
        Self {
            model,
            target_field,
            macros,
            field_values: BTreeMap::new(),
            used_macros: BTreeSet::new(),
        }
    }

    /// Records that `field` is read, even when it is never compared to a literal.
    pub(crate) fn use_field(&mut self, field: &str) {
        if !self.field_values.contains_key(field) {
            self.field_values.insert(field.to_string(), Vec::new());
        }
    }

    pub(crate) fn add_field_value(&mut self, field: &str, value: FieldValue) {
        let values = self.field_values.entry(field.to_string()).or_default();
        if !values.contains(&value) {
            values.push(value);
        }
    }

    pub(crate) fn is_target(&self, field: &str) -> bool {
        self.target_field.as_deref() == Some(field)
    }

    pub fn field_values(&self) -> &BTreeMap<Field, Vec<FieldValue>> {
        &self.field_values
    }

    pub fn used_macros(&self) -> &BTreeSet<MacroId> {
        &self.used_macros
    }

    pub(crate) fn into_parts(self) -> (BTreeMap<Field, Vec<FieldValue>>, BTreeSet<MacroId>) {
        (self.field_values, self.used_macros)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SchemaModel;

    #[test]
    fn test_field_usage_accumulates() {
        let model = SchemaModel::new();
        let mut state = CompilerState::new(&model, None, HashMap::new());

        state.use_field("process.name");
        state.add_field_value("process.name", FieldValue::scalar("bash"));
        state.add_field_value("process.name", FieldValue::scalar("bash"));
        state.use_field("process.name");
        state.use_field("process.uid");

        assert_eq!(state.field_values().len(), 2);
        assert_eq!(state.field_values()["process.name"].len(), 1);
        assert!(state.field_values()["process.uid"].is_empty());
    }

    #[test]
    fn test_target_field() {
        let model = SchemaModel::new();
        let state = CompilerState::new(
            &model,
            Some("process.uid".to_string()),
            HashMap::new(),
        );
        assert!(state.is_target("process.uid"));
        assert!(!state.is_target("process.name"));
    }
}
