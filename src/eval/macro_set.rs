//! Dependency-ordered compilation of a set of macros.
//!
//! [`MacroSet::compile`] parses every definition, orders them so each macro
//! is compiled after the macros it references, and compiles each level of
//! that order in parallel.

use crate::compiler::state::MacroId;
use crate::error::{Result, SeclError};
use crate::eval::macros::Macro;
use crate::eval::opts::Opts;
use crate::model::Model;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// Source form of a macro.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacroDefinition {
    pub id: MacroId,
    pub expression: String,
}

#[derive(Debug, Deserialize)]
struct MacroFile {
    #[serde(default)]
    macros: Vec<MacroDefinition>,
}

impl MacroDefinition {
    pub fn new(id: impl Into<MacroId>, expression: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            expression: expression.into(),
        }
    }

    /// Reads a `macros:` list.
    ///
    /// ```rust
    /// use secl_macro::MacroDefinition;
    ///
    /// let yaml = r#"
    /// macros:
    ///   - id: shells
    ///     expression: '["bash", "zsh"]'
    ///   - id: is_shell
    ///     expression: process.name in shells
    /// "#;
    /// let definitions = MacroDefinition::from_yaml(yaml)?;
    /// assert_eq!(definitions.len(), 2);
    /// assert_eq!(definitions[1].expression, "process.name in shells");
    /// # Ok::<(), secl_macro::SeclError>(())
    /// ```
    pub fn from_yaml(yaml: &str) -> Result<Vec<MacroDefinition>> {
        let file: MacroFile = serde_yaml::from_str(yaml)?;
        Ok(file.macros)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Vec<MacroDefinition>> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml(&yaml)
    }
}

/// A compiled set of macros.
#[derive(Debug)]
pub struct MacroSet {
    macros: BTreeMap<MacroId, Arc<Macro>>,
    order: Vec<MacroId>,
    opts: Opts,
}

impl MacroSet {
    /// Compiles `definitions` against `model`.
    ///
    /// Macros already registered in `base` may be referenced; a definition
    /// with the same ID shadows them. Each macro is compiled with an [`Opts`]
    /// holding `base`'s constants and config plus its direct dependencies.
    pub fn compile(
        definitions: Vec<MacroDefinition>,
        model: &dyn Model,
        base: &Opts,
    ) -> Result<Self> {
        let mut ids = BTreeSet::new();
        for definition in &definitions {
            if !ids.insert(definition.id.clone()) {
                return Err(SeclError::DuplicateMacro(definition.id.clone()));
            }
        }

        let config = base.config();
        let parsed: Vec<Macro> = definitions
            .into_par_iter()
            .map(|definition| -> Result<Macro> {
                let mut m = Macro::new(definition.id, definition.expression);
                m.parse_with_config(config)
                    .map_err(|e| SeclError::Compilation {
                        macro_id: m.id().to_string(),
                        source: Box::new(e),
                    })?;
                Ok(m)
            })
            .collect::<Result<_>>()?;

        let dependencies: BTreeMap<MacroId, BTreeSet<MacroId>> = parsed
            .iter()
            .map(|m| {
                let deps = m
                    .ast()
                    .map(|ast| {
                        ast.identifiers()
                            .into_iter()
                            .filter(|id| ids.contains(id))
                            .collect()
                    })
                    .unwrap_or_default();
                (m.id().to_string(), deps)
            })
            .collect();

        let levels = dependency_levels(&dependencies).map_err(|err| {
            warn!(error = %err, "Rejected macro set");
            err
        })?;

        let mut pending: HashMap<MacroId, Macro> = parsed
            .into_iter()
            .map(|m| (m.id().to_string(), m))
            .collect();
        let mut compiled: BTreeMap<MacroId, Arc<Macro>> = BTreeMap::new();
        let mut order = Vec::with_capacity(pending.len());

        for (depth, level) in levels.into_iter().enumerate() {
            debug!(depth, macros = level.len(), "Compiling macro level");

            let batch: Vec<(Macro, Opts)> = level
                .iter()
                .filter_map(|id| pending.remove(id))
                .map(|m| -> Result<(Macro, Opts)> {
                    let mut opts = base.clone();
                    for dep in &dependencies[m.id()] {
                        if let Some(dependency) = compiled.get(dep) {
                            opts.add_macro(Arc::clone(dependency))?;
                        }
                    }
                    Ok((m, opts))
                })
                .collect::<Result<_>>()?;

            let results: Vec<Arc<Macro>> = batch
                .into_par_iter()
                .map(|(mut m, opts)| -> Result<Arc<Macro>> {
                    if let Err(err) = m.compile(model, &opts) {
                        warn!(macro_id = %m.id(), error = %err, "Failed to compile macro");
                        return Err(err);
                    }
                    Ok(Arc::new(m))
                })
                .collect::<Result<_>>()?;

            for m in results {
                order.push(m.id().to_string());
                compiled.insert(m.id().to_string(), m);
            }
        }

        let mut opts = base.clone();
        for m in compiled.values() {
            opts.add_macro(Arc::clone(m))?;
        }

        Ok(Self {
            macros: compiled,
            order,
            opts,
        })
    }

    pub fn get(&self, id: &str) -> Option<&Arc<Macro>> {
        self.macros.get(id)
    }

    /// `base` options extended with every macro in the set.
    pub fn opts(&self) -> &Opts {
        &self.opts
    }

    pub fn len(&self) -> usize {
        self.macros.len()
    }

    pub fn is_empty(&self) -> bool {
        self.macros.is_empty()
    }

    /// Macros in compilation order: every macro follows its dependencies.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Macro>> {
        self.order.iter().filter_map(|id| self.macros.get(id))
    }
}

/// Groups macros into levels where every dependency sits in an earlier level.
fn dependency_levels(
    dependencies: &BTreeMap<MacroId, BTreeSet<MacroId>>,
) -> Result<Vec<Vec<MacroId>>> {
    let mut in_degree: BTreeMap<&MacroId, usize> = dependencies
        .iter()
        .map(|(id, deps)| (id, deps.len()))
        .collect();
    let mut dependents: HashMap<&MacroId, Vec<&MacroId>> = HashMap::new();
    for (id, deps) in dependencies {
        for dep in deps {
            dependents.entry(dep).or_default().push(id);
        }
    }

    let mut levels = Vec::new();
    let mut ready: Vec<&MacroId> = in_degree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(id, _)| *id)
        .collect();

    while !ready.is_empty() {
        let mut next = Vec::new();
        for id in &ready {
            in_degree.remove(*id);
            for dependent in dependents.get(*id).into_iter().flatten() {
                if let Some(degree) = in_degree.get_mut(*dependent) {
                    *degree -= 1;
                    if *degree == 0 {
                        next.push(*dependent);
                    }
                }
            }
        }
        next.sort();
        levels.push(ready.into_iter().cloned().collect());
        ready = next;
    }

    if let Some((start, _)) = in_degree.iter().next() {
        return Err(SeclError::CyclicReference {
            path: cycle_from(start, dependencies, &in_degree),
        });
    }
    Ok(levels)
}

/// Follows unresolved dependencies from `start` until an ID repeats.
fn cycle_from(
    start: &MacroId,
    dependencies: &BTreeMap<MacroId, BTreeSet<MacroId>>,
    unresolved: &BTreeMap<&MacroId, usize>,
) -> Vec<MacroId> {
    let mut path: Vec<MacroId> = Vec::new();
    let mut current = start.clone();

    loop {
        if let Some(index) = path.iter().position(|id| *id == current) {
            let mut cycle = path.split_off(index);
            cycle.push(current);
            return cycle;
        }
        path.push(current.clone());

        let next = dependencies
            .get(&current)
            .and_then(|deps| deps.iter().find(|dep| unresolved.contains_key(dep)));
        match next {
            Some(dep) => current = dep.clone(),
            None => return path,
        }
    }
}
