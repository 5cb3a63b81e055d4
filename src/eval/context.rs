//! Evaluation context passed to compiled evaluators.

use crate::model::Field;
use serde_json::Value as JsonValue;
use std::cell::RefCell;
use std::collections::HashMap;

/// A runtime field value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Int(i64),
    Str(String),
    Bool(bool),
    IntList(Vec<i64>),
    StrList(Vec<String>),
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<Vec<i64>> for Value {
    fn from(value: Vec<i64>) -> Self {
        Value::IntList(value)
    }
}

impl From<Vec<String>> for Value {
    fn from(value: Vec<String>) -> Self {
        Value::StrList(value)
    }
}

/// Source of field values for a single event.
pub trait Event {
    fn field_value(&self, field: &str) -> Option<Value>;
}

impl Event for HashMap<Field, Value> {
    fn field_value(&self, field: &str) -> Option<Value> {
        self.get(field).cloned()
    }
}

/// [`Event`] over a JSON document.
///
/// A field is looked up as a flat key first (`{"process.name": ...}`), then
/// as a dotted path (`{"process": {"name": ...}}`).
///
/// ```rust
/// use secl_macro::{Event, JsonEvent, Value};
/// use serde_json::json;
///
/// let doc = json!({"process": {"name": "bash", "uid": 0}});
/// let event = JsonEvent::new(&doc);
/// assert_eq!(event.field_value("process.name"), Some(Value::Str("bash".into())));
/// assert_eq!(event.field_value("process.uid"), Some(Value::Int(0)));
/// ```
pub struct JsonEvent<'a> {
    document: &'a JsonValue,
}

impl<'a> JsonEvent<'a> {
    pub fn new(document: &'a JsonValue) -> Self {
        Self { document }
    }

    fn lookup(&self, field: &str) -> Option<&'a JsonValue> {
        if let Some(value) = self.document.get(field) {
            return Some(value);
        }

        let mut current = self.document;
        for part in field.split('.') {
            current = match current {
                JsonValue::Object(map) => map.get(part)?,
                JsonValue::Array(items) => items.get(part.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }
}

fn convert(value: &JsonValue) -> Option<Value> {
    match value {
        JsonValue::Bool(b) => Some(Value::Bool(*b)),
        JsonValue::Number(n) => n.as_i64().map(Value::Int),
        JsonValue::String(s) => Some(Value::Str(s.clone())),
        JsonValue::Array(items) => {
            if items.iter().all(JsonValue::is_i64) {
                Some(Value::IntList(
                    items.iter().filter_map(JsonValue::as_i64).collect(),
                ))
            } else {
                Some(Value::StrList(
                    items
                        .iter()
                        .map(|item| match item {
                            JsonValue::String(s) => s.clone(),
                            other => other.to_string(),
                        })
                        .collect(),
                ))
            }
        }
        JsonValue::Null | JsonValue::Object(_) => None,
    }
}

impl Event for JsonEvent<'_> {
    fn field_value(&self, field: &str) -> Option<Value> {
        self.lookup(field).and_then(convert)
    }
}

/// Per-evaluation view of an event.
///
/// Field reads are cached for the lifetime of the context. [`Context::update`]
/// overlays a value on top of the event, which is how callers express "only
/// this field changed" before running a partial evaluator.
///
/// Missing or mistyped values read as the zero value of the requested type,
/// so compiled evaluators never fail.
///
/// `Context` is not thread-safe due to the interior cache; create one per
/// event and per thread. The compiled evaluators themselves are shared.
pub struct Context<'a> {
    event: &'a dyn Event,
    overrides: HashMap<Field, Value>,
    field_cache: RefCell<HashMap<Field, Option<Value>>>,
}

impl<'a> Context<'a> {
    pub fn new(event: &'a dyn Event) -> Self {
        Self {
            event,
            overrides: HashMap::new(),
            field_cache: RefCell::new(HashMap::new()),
        }
    }

    /// Replaces the value of `field` for subsequent reads.
    pub fn update(&mut self, field: impl Into<Field>, value: impl Into<Value>) {
        let field = field.into();
        self.field_cache.borrow_mut().remove(&field);
        self.overrides.insert(field, value.into());
    }

    /// Builder form of [`Context::update`].
    pub fn with_update(mut self, field: impl Into<Field>, value: impl Into<Value>) -> Self {
        self.update(field, value);
        self
    }

    pub fn value(&self, field: &str) -> Option<Value> {
        if let Some(value) = self.overrides.get(field) {
            return Some(value.clone());
        }

        {
            let cache = self.field_cache.borrow();
            if let Some(cached) = cache.get(field) {
                return cached.clone();
            }
        }

        let value = self.event.field_value(field);
        self.field_cache
            .borrow_mut()
            .insert(field.to_string(), value.clone());
        value
    }

    pub fn int(&self, field: &str) -> i64 {
        match self.value(field) {
            Some(Value::Int(v)) => v,
            _ => 0,
        }
    }

    pub fn string(&self, field: &str) -> String {
        match self.value(field) {
            Some(Value::Str(v)) => v,
            _ => String::new(),
        }
    }

    pub fn bool(&self, field: &str) -> bool {
        matches!(self.value(field), Some(Value::Bool(true)))
    }

    pub fn ints(&self, field: &str) -> Vec<i64> {
        match self.value(field) {
            Some(Value::IntList(v)) => v,
            Some(Value::Int(v)) => vec![v],
            _ => Vec::new(),
        }
    }

    pub fn strings(&self, field: &str) -> Vec<String> {
        match self.value(field) {
            Some(Value::StrList(v)) => v,
            Some(Value::Str(v)) => vec![v],
            _ => Vec::new(),
        }
    }

    /// Drops cached reads.
    pub fn clear_cache(&self) {
        self.field_cache.borrow_mut().clear();
    }

    pub fn cache_size(&self) -> usize {
        self.field_cache.borrow().len()
    }
}
