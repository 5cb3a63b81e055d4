//! Compilation options.

use crate::compiler::state::MacroId;
use crate::config::CompilerConfig;
use crate::error::{Result, SeclError};
use crate::eval::context::Value;
use crate::eval::macros::Macro;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Options a macro is compiled with: the macros it may reference, named
/// constants, and the compiler configuration.
///
/// The registry only ever holds compiled macros. `Opts` is cheap to clone and
/// is stored on each [`Macro`] it compiles, so later metadata queries walk the
/// registry the macro was actually compiled against.
///
/// # Examples
///
/// ```rust
/// use secl_macro::{FieldType, Macro, Opts, SchemaModel};
/// use std::sync::Arc;
///
/// let model = SchemaModel::new().with_field("process.uid", FieldType::Int);
///
/// let mut is_root = Macro::new("is_root", "process.uid == ROOT");
/// is_root.parse()?;
///
/// let opts = Opts::new().with_constant("ROOT", 0i64);
/// is_root.compile(&model, &opts)?;
///
/// let opts = opts.with_macro(Arc::new(is_root))?;
/// assert!(opts.macros().contains_key("is_root"));
/// # Ok::<(), secl_macro::SeclError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct Opts {
    macros: BTreeMap<MacroId, Arc<Macro>>,
    constants: BTreeMap<String, Value>,
    config: CompilerConfig,
}

impl Opts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: CompilerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_constant(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.constants.insert(name.into(), value.into());
        self
    }

    /// Registers a compiled macro, replacing any macro with the same ID.
    pub fn add_macro(&mut self, macro_: Arc<Macro>) -> Result<()> {
        if macro_.evaluator().is_none() {
            return Err(SeclError::NotCompiled(macro_.id().to_string()));
        }
        self.macros.insert(macro_.id().to_string(), macro_);
        Ok(())
    }

    pub fn with_macro(mut self, macro_: Arc<Macro>) -> Result<Self> {
        self.add_macro(macro_)?;
        Ok(self)
    }

    pub fn macros(&self) -> &BTreeMap<MacroId, Arc<Macro>> {
        &self.macros
    }

    pub fn get_macro(&self, id: &str) -> Option<&Arc<Macro>> {
        self.macros.get(id)
    }

    pub fn constant(&self, name: &str) -> Option<&Value> {
        self.constants.get(name)
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }
}
