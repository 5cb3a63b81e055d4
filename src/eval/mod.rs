//! Compiled macros and the runtime they evaluate against.
//!
//! - [`context`] - Runtime values, events and the per-evaluation context
//! - [`evaluator`] - Typed evaluators produced by the compiler
//! - [`matcher`] - Literal, glob and regex string matching
//! - [`macros`] - The [`Macro`] lifecycle and metadata queries
//! - [`opts`] - Compilation options and the macro registry
//! - [`macro_set`] - Dependency-ordered compilation of many macros

pub mod context;
pub mod evaluator;
pub mod macro_set;
pub mod macros;
pub mod matcher;
pub mod opts;

pub use context::{Context, Event, JsonEvent, Value};
pub use evaluator::{
    eval_fn, BoolEvalFn, BoolEvaluator, EvalFn, Evaluator, EvaluatorKind, FieldValue,
    FieldValueKind, IntArrayEvaluator, IntEvaluator, Operand, StringArrayEvaluator,
    StringEvaluator, Typed,
};
pub use macro_set::{MacroDefinition, MacroSet};
pub use macros::{Macro, MacroEvaluator};
pub use matcher::{StringMatcher, StringValues};
pub use opts::Opts;
