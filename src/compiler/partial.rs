//! Per-field partial evaluators.

use crate::ast::MacroAst;
use crate::compiler::codegen::macro_to_evaluator;
use crate::compiler::state::{CompilerState, MacroId};
use crate::error::{Result, SeclError};
use crate::eval::evaluator::{BoolEvalFn, Evaluator};
use crate::eval::macros::MacroEvaluator;
use crate::eval::opts::Opts;
use crate::model::{Field, Model};
use std::collections::HashMap;
use std::sync::Arc;

/// Recompiles `ast` once per field with that field as the partial target.
///
/// Each returned closure is a full evaluation of the macro and gives the same
/// result as the full evaluator. The only difference is operand order: in
/// `&&`/`||` the operand that reads the targeted field runs first, so a
/// changed field that decides the result short-circuits the rest.
pub fn partial_evaluators<'f>(
    ast: &MacroAst,
    opts: &Opts,
    model: &dyn Model,
    macros: &HashMap<MacroId, Arc<MacroEvaluator>>,
    fields: impl IntoIterator<Item = &'f Field>,
) -> Result<HashMap<Field, BoolEvalFn>> {
    let mut partials = HashMap::new();

    for field in fields {
        let mut state = CompilerState::new(model, Some(field.clone()), macros.clone());
        match macro_to_evaluator(ast, opts, &mut state)? {
            Evaluator::Bool(evaluator) => {
                partials.insert(field.clone(), evaluator.into_fn());
            }
            other => {
                return Err(SeclError::ast(
                    ast.position(),
                    format!("partial for `{field}` is not boolean: {}", other.kind()),
                ))
            }
        }
    }

    Ok(partials)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::parser::parse_macro;
    use crate::config::CompilerConfig;
    use crate::eval::context::{Context, Value};
    use crate::model::{FieldType, SchemaModel};

    #[test]
    fn test_partials_match_full_evaluation() {
        let model = SchemaModel::new()
            .with_field("process.name", FieldType::String)
            .with_field("process.uid", FieldType::Int);
        let ast = parse_macro(
            r#"process.name == "bash" || process.uid == 0"#,
            &CompilerConfig::default(),
        )
        .unwrap();
        let fields = vec!["process.name".to_string(), "process.uid".to_string()];
        let partials =
            partial_evaluators(&ast, &Opts::new(), &model, &HashMap::new(), &fields).unwrap();

        assert_eq!(partials.len(), 2);

        let mut event: HashMap<Field, Value> = HashMap::new();
        event.insert("process.name".to_string(), Value::from("zsh"));
        event.insert("process.uid".to_string(), Value::Int(1000));

        let ctx = Context::new(&event);
        assert!(!partials["process.uid"](&ctx));

        let ctx = Context::new(&event).with_update("process.uid", 0i64);
        assert!(partials["process.uid"](&ctx));
        assert!(partials["process.name"](&ctx));
    }

    #[test]
    fn test_non_boolean_macro_has_no_partial() {
        let model = SchemaModel::new().with_field("process.uid", FieldType::Int);
        let ast = parse_macro("process.uid", &CompilerConfig::default()).unwrap();
        let fields = vec!["process.uid".to_string()];
        let err = partial_evaluators(&ast, &Opts::new(), &model, &HashMap::new(), &fields)
            .err().unwrap();
        assert!(matches!(err, SeclError::AstToEval { .. }));
    }
}
