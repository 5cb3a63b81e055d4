//! Error types for the SECL macro crate.

use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SeclError>;

/// Location of a token inside an expression.
///
/// `offset` is a byte offset; `line` and `column` are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub offset: usize,
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(offset: usize, line: usize, column: usize) -> Self {
        Self {
            offset,
            line,
            column,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Why a field was rejected by the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldErrorKind {
    /// The model has no such field.
    NotFound,
    /// The field exists but cannot be mapped to an event type.
    NoEventType,
}

impl fmt::Display for FieldErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldErrorKind::NotFound => write!(f, "field not found"),
            FieldErrorKind::NoEventType => write!(f, "no event type for field"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SeclError {
    /// The expression text does not parse.
    #[error("Syntax error at {pos}: {message}")]
    Parse { pos: Position, message: String },

    /// A syntax node could not be turned into an evaluator.
    #[error("Invalid expression at {pos}: {message}")]
    AstToEval { pos: Position, message: String },

    /// A macro whose text is malformed for compilation.
    #[error("Macro syntax error in `{expr}` at {pos}: {message}")]
    Syntax {
        expr: String,
        pos: Position,
        message: String,
    },

    #[error("Field error on `{field}`: {kind}")]
    Field { field: String, kind: FieldErrorKind },

    /// Generic compile failure, chained to its cause.
    #[error("Compilation error in macro `{macro_id}`")]
    Compilation {
        macro_id: String,
        #[source]
        source: Box<SeclError>,
    },

    #[error("Macro `{0}` has not been parsed")]
    NotParsed(String),

    #[error("Macro `{0}` has not been compiled")]
    NotCompiled(String),

    #[error("Cyclic macro reference: {}", .path.join(" -> "))]
    CyclicReference { path: Vec<String> },

    #[error("Duplicate macro: {0}")]
    DuplicateMacro(String),

    #[error("Invalid schema: {0}")]
    Schema(String),

    #[error("IO error: {0}")]
    Io(String),
}

impl SeclError {
    pub(crate) fn ast(pos: Position, message: impl Into<String>) -> Self {
        SeclError::AstToEval {
            pos,
            message: message.into(),
        }
    }

    pub(crate) fn field(field: impl Into<String>, kind: FieldErrorKind) -> Self {
        SeclError::Field {
            field: field.into(),
            kind,
        }
    }

    /// Innermost error of a `Compilation` chain.
    pub fn root_cause(&self) -> &SeclError {
        let mut current = self;
        while let SeclError::Compilation { source, .. } = current {
            current = source;
        }
        current
    }

    /// True when the error, or its root cause, is a field/model error.
    pub fn is_field_error(&self) -> bool {
        matches!(self.root_cause(), SeclError::Field { .. })
    }

    /// Source position for positioned errors.
    pub fn position(&self) -> Option<Position> {
        match self.root_cause() {
            SeclError::Parse { pos, .. }
            | SeclError::AstToEval { pos, .. }
            | SeclError::Syntax { pos, .. } => Some(*pos),
            _ => None,
        }
    }
}

impl From<std::io::Error> for SeclError {
    fn from(err: std::io::Error) -> Self {
        SeclError::Io(err.to_string())
    }
}

impl From<serde_yaml::Error> for SeclError {
    fn from(err: serde_yaml::Error) -> Self {
        SeclError::Schema(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_parse_error_display() {
        let err = SeclError::Parse {
            pos: Position::new(16, 1, 17),
            message: "unexpected end of input".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Syntax error at 1:17: unexpected end of input"
        );
        assert!(err.source().is_none());
    }

    #[test]
    fn test_compilation_error_chains_source() {
        let err = SeclError::Compilation {
            macro_id: "is_root".to_string(),
            source: Box::new(SeclError::field("unknown.attr", FieldErrorKind::NotFound)),
        };
        assert_eq!(err.to_string(), "Compilation error in macro `is_root`");

        let source = err.source().expect("compilation errors carry a source");
        assert_eq!(
            source.to_string(),
            "Field error on `unknown.attr`: field not found"
        );
        assert!(err.is_field_error());
        assert!(err.position().is_none());
    }

    #[test]
    fn test_root_cause_nested() {
        let inner = SeclError::ast(Position::new(3, 1, 4), "type mismatch");
        let err = SeclError::Compilation {
            macro_id: "outer".to_string(),
            source: Box::new(SeclError::Compilation {
                macro_id: "inner".to_string(),
                source: Box::new(inner.clone()),
            }),
        };
        assert_eq!(err.root_cause(), &inner);
        assert_eq!(err.position(), Some(Position::new(3, 1, 4)));
        assert!(!err.is_field_error());
    }

    #[test]
    fn test_cyclic_reference_display() {
        let err = SeclError::CyclicReference {
            path: vec!["a".to_string(), "b".to_string(), "a".to_string()],
        };
        assert_eq!(err.to_string(), "Cyclic macro reference: a -> b -> a");
    }

    #[test]
    fn test_from_io_error() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: SeclError = io_error.into();

        match err {
            SeclError::Io(msg) => assert!(msg.contains("file not found")),
            _ => panic!("Expected Io variant"),
        }
    }

    #[test]
    fn test_from_yaml_error() {
        let yaml_err = serde_yaml::from_str::<serde_yaml::Value>("invalid: yaml: [").unwrap_err();
        let err: SeclError = yaml_err.into();
        assert!(matches!(err, SeclError::Schema(_)));
    }
}
