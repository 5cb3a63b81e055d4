//! Syntax tree for SECL macro expressions.

use crate::error::Position;
use std::collections::BTreeSet;

/// Parsed form of a macro. Exactly one shape per macro.
#[derive(Debug, Clone, PartialEq)]
pub enum MacroAst {
    /// A boolean/logical expression, e.g. `process.uid == 0 && is_shell`.
    Expression(Expr),
    /// An array literal, e.g. `["bash", "zsh"]`.
    Array(ArrayLit),
    /// A single operand, e.g. `process.name` or `42`.
    Primary(Primary),
}

impl MacroAst {
    /// Every identifier referenced by the macro, in sorted order.
    pub fn identifiers(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        match self {
            MacroAst::Expression(expr) => expr.collect_identifiers(&mut out),
            MacroAst::Array(array) => array.collect_identifiers(&mut out),
            MacroAst::Primary(primary) => primary.collect_identifiers(&mut out),
        }
        out
    }

    pub fn position(&self) -> Position {
        match self {
            MacroAst::Expression(expr) => expr.position(),
            MacroAst::Array(array) => array.pos,
            MacroAst::Primary(primary) => primary.pos,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Match,
    NotMatch,
    In,
    NotIn,
}

impl CmpOp {
    pub fn as_str(self) -> &'static str {
        match self {
            CmpOp::Eq => "==",
            CmpOp::Ne => "!=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
            CmpOp::Match => "=~",
            CmpOp::NotMatch => "!~",
            CmpOp::In => "in",
            CmpOp::NotIn => "notin",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Primary(Primary),
    Array(ArrayLit),
    Not {
        pos: Position,
        expr: Box<Expr>,
    },
    Logical {
        pos: Position,
        op: LogicalOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Comparison {
        pos: Position,
        op: CmpOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

impl Expr {
    pub fn position(&self) -> Position {
        match self {
            Expr::Primary(primary) => primary.pos,
            Expr::Array(array) => array.pos,
            Expr::Not { pos, .. } | Expr::Logical { pos, .. } | Expr::Comparison { pos, .. } => {
                *pos
            }
        }
    }

    fn collect_identifiers(&self, out: &mut BTreeSet<String>) {
        match self {
            Expr::Primary(primary) => primary.collect_identifiers(out),
            Expr::Array(array) => array.collect_identifiers(out),
            Expr::Not { expr, .. } => expr.collect_identifiers(out),
            Expr::Logical { left, right, .. } | Expr::Comparison { left, right, .. } => {
                left.collect_identifiers(out);
                right.collect_identifiers(out);
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Primary {
    pub pos: Position,
    pub kind: PrimaryKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PrimaryKind {
    /// Field, macro or constant name.
    Ident(String),
    Int(i64),
    Str(String),
    /// Glob pattern, `~"*.sh"`.
    Pattern(String),
    /// Regular expression, `r"^ba.h$"`.
    Regex(String),
    Bool(bool),
    Paren(Box<Expr>),
}

impl Primary {
    pub fn new(pos: Position, kind: PrimaryKind) -> Self {
        Self { pos, kind }
    }

    fn collect_identifiers(&self, out: &mut BTreeSet<String>) {
        match &self.kind {
            PrimaryKind::Ident(name) => {
                out.insert(name.clone());
            }
            PrimaryKind::Paren(expr) => expr.collect_identifiers(out),
            _ => {}
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArrayLit {
    pub pos: Position,
    pub items: Vec<Primary>,
}

impl ArrayLit {
    fn collect_identifiers(&self, out: &mut BTreeSet<String>) {
        for item in &self.items {
            item.collect_identifiers(out);
        }
    }
}
