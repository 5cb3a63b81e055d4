//! Named, reusable sub-expressions.
//!
//! A [`Macro`] goes from source text to a [`MacroEvaluator`] in two steps,
//! [`Macro::parse`] then [`Macro::compile`]. Once compiled, a macro can be
//! registered in an [`Opts`] so other macros may reference it by ID; the
//! referencing macro inlines the compiled value.
//!
//! Metadata queries ([`Macro::event_types`], [`Macro::fields`]) walk the
//! registry the macro was compiled with, since inlined values do not carry
//! their own field usage into the outer macro.

use crate::ast::MacroAst;
use crate::compiler::codegen::macro_to_evaluator;
use crate::compiler::event_types::event_types_from_fields;
use crate::compiler::parser::parse_macro;
use crate::compiler::partial::partial_evaluators;
use crate::compiler::state::{CompilerState, MacroId};
use crate::config::CompilerConfig;
use crate::error::{Result, SeclError};
use crate::eval::context::Context;
use crate::eval::evaluator::{BoolEvalFn, Evaluator, FieldValue};
use crate::eval::opts::Opts;
use crate::model::{EventType, Field, Model};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Compiled form of a macro.
///
/// Immutable once built and shared behind an [`Arc`]; the value and every
/// partial evaluator may be invoked from many threads at once.
pub struct MacroEvaluator {
    pub value: Evaluator,
    /// Event types implied by the fields this macro reads directly.
    pub event_types: BTreeSet<EventType>,
    /// Fields read directly, with the literals each is compared against.
    pub field_values: BTreeMap<Field, Vec<FieldValue>>,
    partial_evals: HashMap<Field, BoolEvalFn>,
}

impl MacroEvaluator {
    /// Fields read directly by this macro. Referenced macros are not included.
    pub fn fields(&self) -> BTreeSet<Field> {
        self.field_values.keys().cloned().collect()
    }

    pub fn partial(&self, field: &str) -> Option<&BoolEvalFn> {
        self.partial_evals.get(field)
    }

    /// Re-evaluates the macro when only `field` changed in `ctx`.
    pub fn eval_partial(&self, field: &str, ctx: &Context) -> Option<bool> {
        self.partial(field).map(|f| f(ctx))
    }

    /// Evaluates a boolean macro. Returns `None` for array and scalar macros.
    pub fn eval(&self, ctx: &Context) -> Option<bool> {
        match &self.value {
            Evaluator::Bool(e) => Some(e.eval(ctx)),
            _ => None,
        }
    }

    pub fn partial_fields(&self) -> impl Iterator<Item = &Field> {
        self.partial_evals.keys()
    }
}

impl fmt::Debug for MacroEvaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut partials: Vec<&Field> = self.partial_evals.keys().collect();
        partials.sort();
        f.debug_struct("MacroEvaluator")
            .field("kind", &self.value.kind())
            .field("event_types", &self.event_types)
            .field("field_values", &self.field_values)
            .field("partials", &partials)
            .finish()
    }
}

/// A named expression that other expressions may reference by ID.
///
/// # Examples
///
/// ```rust
/// use secl_macro::{Context, FieldType, JsonEvent, Macro, Opts, SchemaModel};
/// use serde_json::json;
///
/// let model = SchemaModel::new()
///     .with_field("process.name", FieldType::String)
///     .with_field("process.uid", FieldType::Int);
///
/// let mut m = Macro::new("root_shell", r#"process.name == "bash" && process.uid == 0"#);
/// m.parse()?;
/// let evaluator = m.compile(&model, &Opts::new())?;
///
/// let doc = json!({"process": {"name": "bash", "uid": 0}});
/// let event = JsonEvent::new(&doc);
/// assert_eq!(evaluator.eval(&Context::new(&event)), Some(true));
/// assert_eq!(m.event_types()?.len(), 1);
/// # Ok::<(), secl_macro::SeclError>(())
/// ```
#[derive(Debug)]
pub struct Macro {
    id: MacroId,
    expression: String,
    ast: Option<MacroAst>,
    evaluator: Option<Arc<MacroEvaluator>>,
    opts: Option<Opts>,
    references: BTreeSet<MacroId>,
}

impl Macro {
    pub fn new(id: impl Into<MacroId>, expression: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            expression: expression.into(),
            ast: None,
            evaluator: None,
            opts: None,
            references: BTreeSet::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn ast(&self) -> Option<&MacroAst> {
        self.ast.as_ref()
    }

    pub fn evaluator(&self) -> Option<&Arc<MacroEvaluator>> {
        self.evaluator.as_ref()
    }

    /// Options of the last successful compile.
    pub fn opts(&self) -> Option<&Opts> {
        self.opts.as_ref()
    }

    /// Macros substituted into this one by the last successful compile.
    pub fn references(&self) -> &BTreeSet<MacroId> {
        &self.references
    }

    /// Parses the expression with the default configuration.
    pub fn parse(&mut self) -> Result<()> {
        self.parse_with_config(&CompilerConfig::default())
    }

    /// Parses the expression. On failure the parser's positioned error is
    /// returned as is and any previous tree is kept.
    pub fn parse_with_config(&mut self, config: &CompilerConfig) -> Result<()> {
        let ast = parse_macro(&self.expression, config)?;
        debug!(macro_id = %self.id, "Parsed macro");
        self.ast = Some(ast);
        Ok(())
    }

    /// Compiles the parsed tree against `model`, substituting the macros in
    /// `opts`.
    ///
    /// Nothing on `self` changes unless compilation succeeds. Macros in `opts`
    /// are only read.
    pub fn compile(&mut self, model: &dyn Model, opts: &Opts) -> Result<Arc<MacroEvaluator>> {
        let ast = self
            .ast
            .as_ref()
            .ok_or_else(|| SeclError::NotParsed(self.id.clone()))?;

        let macros: HashMap<MacroId, Arc<MacroEvaluator>> = opts
            .macros()
            .iter()
            .filter_map(|(id, m)| m.evaluator().map(|e| (id.clone(), Arc::clone(e))))
            .collect();

        let mut state = CompilerState::new(model, None, macros.clone());
        let value = macro_to_evaluator(ast, opts, &mut state)
            .and_then(|value| {
                let event_types = event_types_from_fields(model, &state)?;
                Ok((value, event_types))
            })
            .map_err(|e| self.compile_error(e));

        let (value, event_types) = match value {
            Ok(compiled) => compiled,
            Err(err) => {
                debug!(macro_id = %self.id, error = %err, "Macro compilation failed");
                return Err(err);
            }
        };
        let (field_values, used_macros) = state.into_parts();

        if let Some(path) = self.find_cycle(&used_macros, opts) {
            warn!(macro_id = %self.id, path = ?path, "Rejected cyclic macro reference");
            return Err(SeclError::CyclicReference { path });
        }

        let partial_evals =
            if opts.config().generate_partials && matches!(value, Evaluator::Bool(_)) {
                partial_evaluators(ast, opts, model, &macros, field_values.keys())
                    .map_err(|e| self.compile_error(e))?
            } else {
                HashMap::new()
            };

        let evaluator = Arc::new(MacroEvaluator {
            value,
            event_types,
            field_values,
            partial_evals,
        });

        debug!(
            macro_id = %self.id,
            fields = ?evaluator.field_values.keys().collect::<Vec<_>>(),
            event_types = ?evaluator.event_types,
            references = ?used_macros,
            "Compiled macro"
        );

        self.evaluator = Some(Arc::clone(&evaluator));
        self.opts = Some(opts.clone());
        self.references = used_macros;
        Ok(evaluator)
    }

    fn compile_error(&self, err: SeclError) -> SeclError {
        match err {
            SeclError::AstToEval { pos, message } => SeclError::Syntax {
                expr: self.expression.clone(),
                pos,
                message,
            },
            other => SeclError::Compilation {
                macro_id: self.id.clone(),
                source: Box::new(other),
            },
        }
    }

    /// Follows substitutions from `used` and returns the path back to this
    /// macro's ID, if any.
    fn find_cycle(&self, used: &BTreeSet<MacroId>, opts: &Opts) -> Option<Vec<MacroId>> {
        let mut visited = BTreeSet::new();
        let mut stack: Vec<(&Macro, Vec<MacroId>)> = used
            .iter()
            .filter_map(|id| opts.get_macro(id))
            .map(|m| (m.as_ref(), vec![self.id.clone(), m.id.clone()]))
            .collect();

        while let Some((current, path)) = stack.pop() {
            if current.id == self.id {
                return Some(path);
            }
            if !visited.insert(current.id.clone()) {
                continue;
            }

            let Some(current_opts) = current.opts() else {
                continue;
            };
            for reference in current.references() {
                if let Some(next) = current_opts.get_macro(reference) {
                    let mut next_path = path.clone();
                    next_path.push(next.id.clone());
                    stack.push((next.as_ref(), next_path));
                }
            }
        }
        None
    }

    /// Visits this macro's evaluator and those of every macro reachable
    /// through compile-time registries, once per macro instance.
    ///
    /// Instances are told apart by address, not ID: a registry may hold an
    /// older macro under the same ID as one visited earlier.
    fn walk<F>(&self, mut visit: F) -> Result<()>
    where
        F: FnMut(&MacroEvaluator),
    {
        let evaluator = self
            .evaluator
            .as_ref()
            .ok_or_else(|| SeclError::NotCompiled(self.id.clone()))?;
        visit(evaluator);

        let mut visited: HashSet<*const Macro> = HashSet::new();
        visited.insert(self as *const Macro);
        let mut stack: Vec<&Macro> = vec![self];

        while let Some(current) = stack.pop() {
            let Some(opts) = current.opts() else {
                continue;
            };
            for dependency in opts.macros().values() {
                if !visited.insert(Arc::as_ptr(dependency)) {
                    continue;
                }
                if let Some(evaluator) = dependency.evaluator() {
                    visit(evaluator);
                }
                stack.push(dependency.as_ref());
            }
        }
        Ok(())
    }

    /// Event types of this macro and, recursively, of every macro in the
    /// registry it was compiled with.
    pub fn event_types(&self) -> Result<BTreeSet<EventType>> {
        let mut event_types = BTreeSet::new();
        self.walk(|evaluator| event_types.extend(evaluator.event_types.iter().cloned()))?;
        Ok(event_types)
    }

    /// Fields of this macro and, recursively, of every macro in the registry
    /// it was compiled with.
    pub fn fields(&self) -> Result<BTreeSet<Field>> {
        let mut fields = BTreeSet::new();
        self.walk(|evaluator| fields.extend(evaluator.field_values.keys().cloned()))?;
        Ok(fields)
    }
}
