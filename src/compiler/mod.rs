//! Macro expression compiler.
//!
//! Compilation runs in three stages:
//! - [`parser`] turns expression text into a [`MacroAst`](crate::ast::MacroAst)
//! - [`codegen`] turns the tree into an [`Evaluator`](crate::eval::Evaluator),
//!   accumulating field usage in a [`CompilerState`]
//! - [`event_types`] and [`partial`] derive the metadata stored alongside the
//!   compiled value
//!
//! Most callers go through [`Macro`](crate::eval::Macro) rather than these
//! functions directly.
//!
//! # Examples
//!
//! ```rust
//! use secl_macro::compiler::{macro_to_evaluator, parse_macro, CompilerState};
//! use secl_macro::{CompilerConfig, FieldType, Opts, SchemaModel};
//! use std::collections::HashMap;
//!
//! let model = SchemaModel::new().with_field("process.uid", FieldType::Int);
//! let ast = parse_macro("process.uid == 0", &CompilerConfig::default())?;
//!
//! let mut state = CompilerState::new(&model, None, HashMap::new());
//! let evaluator = macro_to_evaluator(&ast, &Opts::new(), &mut state)?;
//!
//! assert!(state.field_values().contains_key("process.uid"));
//! # let _ = evaluator;
//! # Ok::<(), secl_macro::SeclError>(())
//! ```

pub mod codegen;
pub mod event_types;
pub mod parser;
pub mod partial;
pub mod state;

pub use codegen::macro_to_evaluator;
pub use event_types::event_types_from_fields;
pub use parser::{parse_expression, parse_macro};
pub use partial::partial_evaluators;
pub use state::{CompilerState, MacroId};
