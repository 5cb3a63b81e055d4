//! Compiled evaluators.
//!
//! The result of compiling a syntax node is an [`Evaluator`]: a tagged value
//! whose variant tells callers whether it produces a boolean, a scalar, a list,
//! or a constant matcher. Each typed variant is either a constant folded at
//! compile time or a closure over the evaluation [`Context`].

use crate::eval::context::{Context, Value};
use crate::eval::matcher::{StringMatcher, StringValues};
use crate::model::Field;
use std::fmt;
use std::sync::Arc;

/// Closure evaluated against a context. Shared across threads.
pub type EvalFn<T> = Arc<dyn Fn(&Context) -> T + Send + Sync>;

/// Boolean closure, as used for partial evaluators.
pub type BoolEvalFn = EvalFn<bool>;

/// Boxes a closure as an [`EvalFn`], fixing its signature to take any context.
pub fn eval_fn<T, F>(f: F) -> EvalFn<T>
where
    F: Fn(&Context) -> T + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Either a compile-time constant or a closure.
pub enum Operand<T> {
    Const(T),
    Dynamic(EvalFn<T>),
}

impl<T: Clone> Clone for Operand<T> {
    fn clone(&self) -> Self {
        match self {
            Operand::Const(value) => Operand::Const(value.clone()),
            Operand::Dynamic(f) => Operand::Dynamic(Arc::clone(f)),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Operand<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Const(value) => f.debug_tuple("Const").field(value).finish(),
            Operand::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

/// A typed evaluator with the metadata the compiler needs to combine it.
#[derive(Clone, Debug)]
pub struct Typed<T> {
    pub operand: Operand<T>,
    /// Set when the evaluator reads a single field directly.
    pub field: Option<Field>,
    /// True when the value depends on the field targeted by a partial compile.
    pub is_partial: bool,
}

impl<T: Clone + Send + Sync + 'static> Typed<T> {
    pub fn constant(value: T) -> Self {
        Self {
            operand: Operand::Const(value),
            field: None,
            is_partial: false,
        }
    }

    pub fn dynamic(f: EvalFn<T>, is_partial: bool) -> Self {
        Self {
            operand: Operand::Dynamic(f),
            field: None,
            is_partial,
        }
    }

    pub fn field_accessor(field: Field, f: EvalFn<T>, is_partial: bool) -> Self {
        Self {
            operand: Operand::Dynamic(f),
            field: Some(field),
            is_partial,
        }
    }

    pub fn eval(&self, ctx: &Context) -> T {
        match &self.operand {
            Operand::Const(value) => value.clone(),
            Operand::Dynamic(f) => f(ctx),
        }
    }

    pub fn as_const(&self) -> Option<&T> {
        match &self.operand {
            Operand::Const(value) => Some(value),
            Operand::Dynamic(_) => None,
        }
    }

    pub fn is_const(&self) -> bool {
        self.as_const().is_some()
    }

    /// Closure form, wrapping constants.
    pub fn into_fn(self) -> EvalFn<T> {
        match self.operand {
            Operand::Const(value) => eval_fn(move |_| value.clone()),
            Operand::Dynamic(f) => f,
        }
    }
}

pub type BoolEvaluator = Typed<bool>;
pub type IntEvaluator = Typed<i64>;
pub type StringEvaluator = Typed<String>;
pub type IntArrayEvaluator = Typed<Vec<i64>>;
pub type StringArrayEvaluator = Typed<Vec<String>>;

/// Compiled value of a syntax node.
#[derive(Clone, Debug)]
pub enum Evaluator {
    Bool(BoolEvaluator),
    Int(IntEvaluator),
    Str(StringEvaluator),
    IntArray(IntArrayEvaluator),
    StrArray(StringArrayEvaluator),
    /// A glob or regex literal.
    StrMatcher(StringMatcher),
    /// A literal array of string operands.
    StrValues(StringValues),
}

impl Evaluator {
    pub fn kind(&self) -> EvaluatorKind {
        match self {
            Evaluator::Bool(_) => EvaluatorKind::Bool,
            Evaluator::Int(_) => EvaluatorKind::Int,
            Evaluator::Str(_) | Evaluator::StrMatcher(_) => EvaluatorKind::String,
            Evaluator::IntArray(_) => EvaluatorKind::IntArray,
            Evaluator::StrArray(_) | Evaluator::StrValues(_) => EvaluatorKind::StringArray,
        }
    }

    pub fn is_partial(&self) -> bool {
        match self {
            Evaluator::Bool(e) => e.is_partial,
            Evaluator::Int(e) => e.is_partial,
            Evaluator::Str(e) => e.is_partial,
            Evaluator::IntArray(e) => e.is_partial,
            Evaluator::StrArray(e) => e.is_partial,
            Evaluator::StrMatcher(_) | Evaluator::StrValues(_) => false,
        }
    }

    /// Field read directly by this evaluator, if any.
    pub fn field(&self) -> Option<&str> {
        match self {
            Evaluator::Bool(e) => e.field.as_deref(),
            Evaluator::Int(e) => e.field.as_deref(),
            Evaluator::Str(e) => e.field.as_deref(),
            Evaluator::IntArray(e) => e.field.as_deref(),
            Evaluator::StrArray(e) => e.field.as_deref(),
            Evaluator::StrMatcher(_) | Evaluator::StrValues(_) => None,
        }
    }

    /// Copy used when a macro's value is substituted into another expression:
    /// the field binding and partial flag belong to the defining macro.
    pub(crate) fn detached(&self) -> Evaluator {
        fn strip<T: Clone>(typed: &Typed<T>) -> Typed<T> {
            Typed {
                operand: typed.operand.clone(),
                field: None,
                is_partial: false,
            }
        }

        match self {
            Evaluator::Bool(e) => Evaluator::Bool(strip(e)),
            Evaluator::Int(e) => Evaluator::Int(strip(e)),
            Evaluator::Str(e) => Evaluator::Str(strip(e)),
            Evaluator::IntArray(e) => Evaluator::IntArray(strip(e)),
            Evaluator::StrArray(e) => Evaluator::StrArray(strip(e)),
            Evaluator::StrMatcher(m) => Evaluator::StrMatcher(m.clone()),
            Evaluator::StrValues(v) => Evaluator::StrValues(v.clone()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvaluatorKind {
    Bool,
    Int,
    String,
    IntArray,
    StringArray,
}

impl fmt::Display for EvaluatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EvaluatorKind::Bool => "bool",
            EvaluatorKind::Int => "int",
            EvaluatorKind::String => "string",
            EvaluatorKind::IntArray => "int array",
            EvaluatorKind::StringArray => "string array",
        };
        f.write_str(name)
    }
}

/// How a literal was written in the expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldValueKind {
    Scalar,
    Pattern,
    Regex,
}

/// A literal a field is compared against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldValue {
    pub value: Value,
    pub kind: FieldValueKind,
}

impl FieldValue {
    pub fn scalar(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
            kind: FieldValueKind::Scalar,
        }
    }
}

impl From<&StringMatcher> for FieldValue {
    fn from(matcher: &StringMatcher) -> Self {
        Self {
            value: Value::Str(matcher.source().to_string()),
            kind: matcher.kind(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::context::Event;
    use std::collections::HashMap;

    #[test]
    fn test_constant_eval() {
        let event: HashMap<Field, Value> = HashMap::new();
        let ctx = Context::new(&event);

        let e = IntEvaluator::constant(42);
        assert!(e.is_const());
        assert_eq!(e.eval(&ctx), 42);
        assert_eq!(e.into_fn()(&ctx), 42);
    }

    #[test]
    fn test_field_accessor_eval() {
        let mut event: HashMap<Field, Value> = HashMap::new();
        event.insert("process.name".to_string(), Value::from("bash"));
        let ctx = Context::new(&event as &dyn Event);

        let e = StringEvaluator::field_accessor(
            "process.name".to_string(),
            eval_fn(|ctx| ctx.string("process.name")),
            false,
        );
        let evaluator = Evaluator::Str(e.clone());
        assert_eq!(evaluator.field(), Some("process.name"));
        assert_eq!(evaluator.kind(), EvaluatorKind::String);
        assert_eq!(e.eval(&ctx), "bash");
        assert!(!e.is_const());
    }

    #[test]
    fn test_detached_strips_field_binding() {
        let e = BoolEvaluator::field_accessor(
            "process.is_thread".to_string(),
            eval_fn(|ctx| ctx.bool("process.is_thread")),
            true,
        );
        let detached = Evaluator::Bool(e).detached();
        assert_eq!(detached.field(), None);
        assert!(!detached.is_partial());
    }

    #[test]
    fn test_field_value_from_matcher() {
        let matcher = StringMatcher::scalar("bash");
        let value = FieldValue::from(&matcher);
        assert_eq!(value, FieldValue::scalar("bash"));
    }

    #[test]
    fn test_evaluators_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Evaluator>();
        assert_send_sync::<BoolEvalFn>();
    }
}
