//! Evaluator generation from syntax nodes.
//!
//! Each node is compiled into an [`Evaluator`]. Constant sub-expressions are
//! folded; everything else becomes a closure over the evaluation context.
//! Field reads are recorded in the [`CompilerState`], along with every literal
//! a field is compared against.

use crate::ast::{ArrayLit, CmpOp, Expr, LogicalOp, MacroAst, Primary, PrimaryKind};
use crate::compiler::state::CompilerState;
use crate::error::{Position, Result, SeclError};
use crate::eval::context::Value;
use crate::eval::evaluator::{
    eval_fn, BoolEvaluator, Evaluator, FieldValue, Operand, Typed,
};
use crate::eval::matcher::{StringMatcher, StringValues};
use crate::eval::opts::Opts;
use crate::model::{FieldType, Model};

/// Compiles whichever shape the macro holds.
pub fn macro_to_evaluator(
    ast: &MacroAst,
    opts: &Opts,
    state: &mut CompilerState,
) -> Result<Evaluator> {
    match ast {
        MacroAst::Expression(expr) => compile_expr(expr, opts, state),
        MacroAst::Array(array) => compile_array(array, opts, state),
        MacroAst::Primary(primary) => compile_primary(primary, opts, state),
    }
}

pub fn compile_expr(expr: &Expr, opts: &Opts, state: &mut CompilerState) -> Result<Evaluator> {
    match expr {
        Expr::Primary(primary) => compile_primary(primary, opts, state),
        Expr::Array(array) => compile_array(array, opts, state),
        Expr::Not { pos, expr } => {
            let operand = expect_bool(compile_expr(expr, opts, state)?, *pos, "`!`")?;
            Ok(Evaluator::Bool(negate(operand)))
        }
        Expr::Logical {
            pos,
            op,
            left,
            right,
        } => {
            let what = match op {
                LogicalOp::And => "`&&`",
                LogicalOp::Or => "`||`",
            };
            let l = expect_bool(compile_expr(left, opts, state)?, *pos, what)?;
            let r = expect_bool(compile_expr(right, opts, state)?, *pos, what)?;
            Ok(Evaluator::Bool(logical(*op, l, r, state)))
        }
        Expr::Comparison {
            pos,
            op,
            left,
            right,
        } => {
            let l = compile_expr(left, opts, state)?;
            let r = compile_expr(right, opts, state)?;
            Ok(Evaluator::Bool(comparison(*op, *pos, l, r, opts, state)?))
        }
    }
}

pub fn compile_primary(
    primary: &Primary,
    opts: &Opts,
    state: &mut CompilerState,
) -> Result<Evaluator> {
    let pos = primary.pos;
    match &primary.kind {
        PrimaryKind::Ident(name) => identifier(name, opts, state),
        PrimaryKind::Int(value) => Ok(Evaluator::Int(Typed::constant(*value))),
        PrimaryKind::Str(value) => Ok(Evaluator::Str(Typed::constant(value.clone()))),
        PrimaryKind::Bool(value) => Ok(Evaluator::Bool(Typed::constant(*value))),
        PrimaryKind::Pattern(source) => Ok(Evaluator::StrMatcher(StringMatcher::glob(
            source,
            opts.config().case_insensitive_patterns,
            pos,
        )?)),
        PrimaryKind::Regex(source) => Ok(Evaluator::StrMatcher(StringMatcher::regex(
            source, pos,
        )?)),
        PrimaryKind::Paren(expr) => compile_expr(expr, opts, state),
    }
}

pub fn compile_array(
    array: &ArrayLit,
    opts: &Opts,
    state: &mut CompilerState,
) -> Result<Evaluator> {
    let mut ints: Vec<i64> = Vec::new();
    let mut strings = StringValues::new();

    for item in &array.items {
        let not_constant = || {
            SeclError::ast(
                item.pos,
                "array items must be integer or string constants",
            )
        };

        match compile_primary(item, opts, state)? {
            Evaluator::Int(e) => ints.push(*e.as_const().ok_or_else(not_constant)?),
            Evaluator::IntArray(e) => ints.extend(e.as_const().ok_or_else(not_constant)?),
            Evaluator::Str(e) => {
                let value = e.as_const().ok_or_else(not_constant)?;
                strings.push(StringMatcher::scalar(value.clone()));
            }
            Evaluator::StrArray(e) => {
                for value in e.as_const().ok_or_else(not_constant)? {
                    strings.push(StringMatcher::scalar(value.clone()));
                }
            }
            Evaluator::StrMatcher(matcher) => strings.push(matcher),
            Evaluator::StrValues(values) => {
                for matcher in values.iter() {
                    strings.push(matcher);
                }
            }
            Evaluator::Bool(_) => return Err(not_constant()),
        }
    }

    match (ints.is_empty(), strings.is_empty()) {
        (false, false) => Err(SeclError::ast(
            array.pos,
            "array mixes integer and string items",
        )),
        (false, true) => Ok(Evaluator::IntArray(Typed::constant(ints))),
        _ => Ok(Evaluator::StrValues(strings)),
    }
}

/// Resolves an identifier: macro first, then constant, then model field.
fn identifier(name: &str, opts: &Opts, state: &mut CompilerState) -> Result<Evaluator> {
    if let Some(evaluator) = state.macros.get(name) {
        let value = evaluator.value.detached();
        state.used_macros.insert(name.to_string());
        return Ok(value);
    }

    if let Some(value) = opts.constant(name) {
        return Ok(constant(value));
    }

    let spec = state.model.field_spec(name)?;
    state.use_field(name);
    let is_partial = state.is_target(name);
    let field = name.to_string();
    let key = field.clone();

    let evaluator = match spec.field_type {
        FieldType::Int => Evaluator::Int(Typed::field_accessor(
            field,
            eval_fn(move |ctx| ctx.int(&key)),
            is_partial,
        )),
        FieldType::String => Evaluator::Str(Typed::field_accessor(
            field,
            eval_fn(move |ctx| ctx.string(&key)),
            is_partial,
        )),
        FieldType::Bool => Evaluator::Bool(Typed::field_accessor(
            field,
            eval_fn(move |ctx| ctx.bool(&key)),
            is_partial,
        )),
        FieldType::IntArray => Evaluator::IntArray(Typed::field_accessor(
            field,
            eval_fn(move |ctx| ctx.ints(&key)),
            is_partial,
        )),
        FieldType::StringArray => Evaluator::StrArray(Typed::field_accessor(
            field,
            eval_fn(move |ctx| ctx.strings(&key)),
            is_partial,
        )),
    };
    Ok(evaluator)
}

fn constant(value: &Value) -> Evaluator {
    match value {
        Value::Int(v) => Evaluator::Int(Typed::constant(*v)),
        Value::Str(v) => Evaluator::Str(Typed::constant(v.clone())),
        Value::Bool(v) => Evaluator::Bool(Typed::constant(*v)),
        Value::IntList(v) => Evaluator::IntArray(Typed::constant(v.clone())),
        Value::StrList(v) => Evaluator::StrValues(
            v.iter().map(|s| StringMatcher::scalar(s.clone())).collect(),
        ),
    }
}

fn expect_bool(evaluator: Evaluator, pos: Position, what: &str) -> Result<BoolEvaluator> {
    match evaluator {
        Evaluator::Bool(e) => Ok(e),
        other => Err(SeclError::ast(
            pos,
            format!("operand of {what} must be bool, found {}", other.kind()),
        )),
    }
}

fn negate(operand: BoolEvaluator) -> BoolEvaluator {
    let is_partial = operand.is_partial;
    match operand.operand {
        Operand::Const(value) => BoolEvaluator::constant(!value),
        Operand::Dynamic(f) => BoolEvaluator::dynamic(eval_fn(move |ctx| !f(ctx)), is_partial),
    }
}

fn logical(
    op: LogicalOp,
    left: BoolEvaluator,
    right: BoolEvaluator,
    state: &CompilerState,
) -> BoolEvaluator {
    match (op, left.as_const().copied(), right.as_const().copied()) {
        (LogicalOp::And, Some(a), Some(b)) => return BoolEvaluator::constant(a && b),
        (LogicalOp::Or, Some(a), Some(b)) => return BoolEvaluator::constant(a || b),
        (LogicalOp::And, Some(false), _) | (LogicalOp::And, _, Some(false)) => {
            return BoolEvaluator::constant(false)
        }
        (LogicalOp::Or, Some(true), _) | (LogicalOp::Or, _, Some(true)) => {
            return BoolEvaluator::constant(true)
        }
        // `true && x`, `false || x`
        (_, Some(_), None) => return right,
        (_, None, Some(_)) => return left,
        _ => {}
    }

    let is_partial = left.is_partial || right.is_partial;

    // Operands are pure, so a partial compile can test the targeted field first.
    let (first, second) =
        if state.target_field.is_some() && right.is_partial && !left.is_partial {
            (right, left)
        } else {
            (left, right)
        };

    let first = first.into_fn();
    let second = second.into_fn();
    let f = match op {
        LogicalOp::And => eval_fn(move |ctx| first(ctx) && second(ctx)),
        LogicalOp::Or => eval_fn(move |ctx| first(ctx) || second(ctx)),
    };
    BoolEvaluator::dynamic(f, is_partial)
}

/// Combines two typed operands into a boolean, folding constants.
fn binary<A, B, F>(left: Typed<A>, right: Typed<B>, f: F) -> BoolEvaluator
where
    A: Clone + Send + Sync + 'static,
    B: Clone + Send + Sync + 'static,
    F: Fn(&A, &B) -> bool + Send + Sync + 'static,
{
    let is_partial = left.is_partial || right.is_partial;
    match (left.operand, right.operand) {
        (Operand::Const(a), Operand::Const(b)) => BoolEvaluator::constant(f(&a, &b)),
        (Operand::Const(a), Operand::Dynamic(rf)) => {
            BoolEvaluator::dynamic(eval_fn(move |ctx| f(&a, &rf(ctx))), is_partial)
        }
        (Operand::Dynamic(lf), Operand::Const(b)) => {
            BoolEvaluator::dynamic(eval_fn(move |ctx| f(&lf(ctx), &b)), is_partial)
        }
        (Operand::Dynamic(lf), Operand::Dynamic(rf)) => {
            BoolEvaluator::dynamic(eval_fn(move |ctx| f(&lf(ctx), &rf(ctx))), is_partial)
        }
    }
}

/// Tests a typed operand against a compile-time predicate.
fn predicate<A, F>(operand: Typed<A>, f: F) -> BoolEvaluator
where
    A: Clone + Send + Sync + 'static,
    F: Fn(&A) -> bool + Send + Sync + 'static,
{
    let is_partial = operand.is_partial;
    match operand.operand {
        Operand::Const(a) => BoolEvaluator::constant(f(&a)),
        Operand::Dynamic(g) => BoolEvaluator::dynamic(eval_fn(move |ctx| f(&g(ctx))), is_partial),
    }
}

/// Literal values held by a constant evaluator.
fn literal_values(evaluator: &Evaluator) -> Vec<FieldValue> {
    match evaluator {
        Evaluator::Bool(e) => e.as_const().map(|v| vec![FieldValue::scalar(*v)]),
        Evaluator::Int(e) => e.as_const().map(|v| vec![FieldValue::scalar(*v)]),
        Evaluator::Str(e) => e.as_const().map(|v| vec![FieldValue::scalar(v.clone())]),
        Evaluator::IntArray(e) => e
            .as_const()
            .map(|v| v.iter().map(|i| FieldValue::scalar(*i)).collect()),
        Evaluator::StrArray(e) => e
            .as_const()
            .map(|v| v.iter().map(|s| FieldValue::scalar(s.clone())).collect()),
        Evaluator::StrMatcher(m) => Some(vec![FieldValue::from(m)]),
        Evaluator::StrValues(values) => Some(values.iter().map(|m| FieldValue::from(&m)).collect()),
    }
    .unwrap_or_default()
}

fn record_comparison(state: &mut CompilerState, left: &Evaluator, right: &Evaluator) {
    if let Some(field) = left.field() {
        for value in literal_values(right) {
            state.add_field_value(field, value);
        }
    }
    if let Some(field) = right.field() {
        for value in literal_values(left) {
            state.add_field_value(field, value);
        }
    }
}

fn comparison(
    op: CmpOp,
    pos: Position,
    left: Evaluator,
    right: Evaluator,
    opts: &Opts,
    state: &mut CompilerState,
) -> Result<BoolEvaluator> {
    // `=~ "glob"` takes a plain string literal as a pattern.
    let right = match (op, right) {
        (CmpOp::Match | CmpOp::NotMatch, Evaluator::Str(e)) if e.is_const() => {
            let source = e.as_const().cloned().unwrap_or_default();
            Evaluator::StrMatcher(StringMatcher::glob(
                &source,
                opts.config().case_insensitive_patterns,
                pos,
            )?)
        }
        (_, other) => other,
    };

    record_comparison(state, &left, &right);

    let (left_kind, right_kind) = (left.kind(), right.kind());

    let result = match op {
        CmpOp::Eq | CmpOp::Ne => equality(left, right),
        CmpOp::Lt | CmpOp::Le | CmpOp::Gt | CmpOp::Ge => ordering(op, left, right),
        CmpOp::Match | CmpOp::NotMatch => pattern_match(left, right),
        CmpOp::In | CmpOp::NotIn => membership(left, right),
    };

    let result = result.ok_or_else(|| {
        SeclError::ast(
            pos,
            format!(
                "cannot apply `{}` to {left_kind} and {right_kind}",
                op.as_str()
            ),
        )
    })?;
    Ok(match op {
        CmpOp::Ne | CmpOp::NotMatch | CmpOp::NotIn => negate(result),
        _ => result,
    })
}

fn equality(left: Evaluator, right: Evaluator) -> Option<BoolEvaluator> {
    use Evaluator::*;

    let result = match (left, right) {
        (Bool(l), Bool(r)) => binary(l, r, |a, b| a == b),
        (Int(l), Int(r)) => binary(l, r, |a, b| a == b),
        (Str(l), Str(r)) => binary(l, r, |a, b| a == b),
        (Str(s), StrMatcher(m)) | (StrMatcher(m), Str(s)) => {
            predicate(s, move |v| m.matches(v))
        }
        (StrArray(list), Str(s)) | (Str(s), StrArray(list)) => {
            binary(list, s, |list, v| list.iter().any(|item| item == v))
        }
        (StrArray(list), StrMatcher(m)) | (StrMatcher(m), StrArray(list)) => {
            predicate(list, move |list| list.iter().any(|item| m.matches(item)))
        }
        (IntArray(list), Int(i)) | (Int(i), IntArray(list)) => {
            binary(list, i, |list, v| list.contains(v))
        }
        (StrArray(l), StrArray(r)) => binary(l, r, |a, b| a == b),
        (IntArray(l), IntArray(r)) => binary(l, r, |a, b| a == b),
        _ => return None,
    };
    Some(result)
}

fn ordering(op: CmpOp, left: Evaluator, right: Evaluator) -> Option<BoolEvaluator> {
    let cmp: fn(&i64, &i64) -> bool = match op {
        CmpOp::Lt => |a, b| a < b,
        CmpOp::Le => |a, b| a <= b,
        CmpOp::Gt => |a, b| a > b,
        _ => |a, b| a >= b,
    };

    let result = match (left, right) {
        (Evaluator::Int(l), Evaluator::Int(r)) => binary(l, r, move |a, b| cmp(a, b)),
        (Evaluator::IntArray(l), Evaluator::Int(r)) => {
            binary(l, r, move |list, b| list.iter().any(|a| cmp(a, b)))
        }
        (Evaluator::Int(l), Evaluator::IntArray(r)) => {
            binary(l, r, move |a, list| list.iter().any(|b| cmp(a, b)))
        }
        _ => return None,
    };
    Some(result)
}

fn pattern_match(left: Evaluator, right: Evaluator) -> Option<BoolEvaluator> {
    let matcher = match right {
        Evaluator::StrMatcher(matcher) => matcher,
        _ => return None,
    };

    match left {
        Evaluator::Str(s) => Some(predicate(s, move |v| matcher.matches(v))),
        Evaluator::StrArray(list) => Some(predicate(list, move |list: &Vec<String>| {
            list.iter().any(|item| matcher.matches(item))
        })),
        _ => None,
    }
}

fn membership(left: Evaluator, right: Evaluator) -> Option<BoolEvaluator> {
    use Evaluator::*;

    let result = match (left, right) {
        (Str(s), StrValues(values)) => predicate(s, move |v| values.matches(v)),
        (StrArray(list), StrValues(values)) => {
            predicate(list, move |list| values.matches_any(list.as_slice()))
        }
        (Str(s), StrMatcher(m)) => predicate(s, move |v| m.matches(v)),
        (Str(s), StrArray(list)) => binary(s, list, |v, list| list.contains(v)),
        (StrArray(l), StrArray(r)) => binary(l, r, |l, r: &Vec<String>| {
            l.iter().any(|item| r.contains(item))
        }),
        (Int(i), IntArray(list)) => binary(i, list, |v, list| list.contains(v)),
        (IntArray(l), IntArray(r)) => binary(l, r, |l, r: &Vec<i64>| {
            l.iter().any(|item| r.contains(item))
        }),
        // `[]` compiles to an empty string set; nothing is a member of it.
        (Int(_) | IntArray(_), StrValues(values)) if values.is_empty() => {
            BoolEvaluator::constant(false)
        }
        _ => return None,
    };
    Some(result)
}
