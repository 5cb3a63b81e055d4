//! # SECL Macros
//!
//! Compilation of named, reusable sub-expressions ("macros") of a security
//! event rule language into evaluators, together with the metadata event
//! pipelines need to route and re-evaluate events cheaply:
//!
//! - which event types a macro depends on
//! - which fields it reads, and the literals each field is compared against
//! - per-field partial evaluators for incremental re-evaluation
//!
//! Macros may reference other macros. Referenced macros must be compiled
//! first and registered in the [`Opts`] the referencing macro is compiled
//! with; [`MacroSet`] handles that ordering for a whole policy.
//!
//! ## Quick Start
//!
//! ```rust
//! use secl_macro::{Context, FieldType, JsonEvent, Macro, Opts, SchemaModel};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let model = SchemaModel::new()
//!     .with_field("process.name", FieldType::String)
//!     .with_field("process.uid", FieldType::Int);
//!
//! let mut shells = Macro::new("shells", r#"["bash", "zsh", ~"*ksh"]"#);
//! shells.parse()?;
//! shells.compile(&model, &Opts::new())?;
//!
//! let opts = Opts::new().with_macro(Arc::new(shells))?;
//! let mut root_shell = Macro::new("root_shell", "process.name in shells && process.uid == 0");
//! root_shell.parse()?;
//! let evaluator = root_shell.compile(&model, &opts)?;
//!
//! let doc = json!({"process": {"name": "mksh", "uid": 0}});
//! let event = JsonEvent::new(&doc);
//! assert_eq!(evaluator.eval(&Context::new(&event)), Some(true));
//!
//! assert!(root_shell.fields()?.contains("process.uid"));
//! assert!(root_shell.event_types()?.contains("process"));
//! # Ok::<(), secl_macro::SeclError>(())
//! ```
//!
//! ## Partial Evaluation
//!
//! When a single attribute of a long-lived object changes, the partial
//! evaluator for that field gives the same answer as a full evaluation:
//!
//! ```rust
//! use secl_macro::{Context, FieldType, Field, Macro, Opts, SchemaModel, Value};
//! use std::collections::HashMap;
//!
//! let model = SchemaModel::new()
//!     .with_field("process.name", FieldType::String)
//!     .with_field("process.uid", FieldType::Int);
//!
//! let mut m = Macro::new("root_bash", r#"process.name == "bash" && process.uid == 0"#);
//! m.parse()?;
//! let evaluator = m.compile(&model, &Opts::new())?;
//!
//! let mut event: HashMap<Field, Value> = HashMap::new();
//! event.insert("process.name".into(), Value::from("bash"));
//! event.insert("process.uid".into(), Value::Int(1000));
//!
//! let ctx = Context::new(&event).with_update("process.uid", 0i64);
//! assert_eq!(evaluator.eval_partial("process.uid", &ctx), Some(true));
//! # Ok::<(), secl_macro::SeclError>(())
//! ```
//!
//! ## Policy Loading
//!
//! ```rust
//! use secl_macro::{FieldType, MacroDefinition, MacroSet, Opts, SchemaModel};
//!
//! let model = SchemaModel::new().with_field("process.name", FieldType::String);
//! let definitions = MacroDefinition::from_yaml(r#"
//! macros:
//!   - id: is_shell
//!     expression: process.name in shells
//!   - id: shells
//!     expression: '["bash", "zsh"]'
//! "#)?;
//!
//! let set = MacroSet::compile(definitions, &model, &Opts::new())?;
//! assert_eq!(set.len(), 2);
//! assert!(set.get("is_shell").is_some());
//! # Ok::<(), secl_macro::SeclError>(())
//! ```

pub mod ast;
pub mod compiler;
pub mod config;
pub mod error;
pub mod eval;
pub mod model;

// Compiler and configuration
pub use compiler::{parse_expression, parse_macro, CompilerState, MacroId};
pub use config::CompilerConfig;

// Core types and errors
pub use ast::MacroAst;
pub use error::{FieldErrorKind, Position, Result, SeclError};
pub use model::{EventType, Field, FieldSchema, FieldSpec, FieldType, Model, SchemaModel};

// Evaluation
pub use eval::{
    Context, Evaluator, EvaluatorKind, Event, FieldValue, FieldValueKind, JsonEvent, Macro,
    MacroDefinition, MacroEvaluator, MacroSet, Opts, Value,
};
