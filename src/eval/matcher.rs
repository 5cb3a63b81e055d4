//! String matchers for literal, glob and regex operands.
//!
//! Globs and regexes are compiled once when the macro is compiled; matching
//! at evaluation time never allocates a new automaton.

use crate::error::{Position, Result, SeclError};
use crate::eval::evaluator::FieldValueKind;
use regex::{Regex, RegexBuilder};
use std::collections::HashSet;

/// A single string operand.
#[derive(Debug, Clone)]
pub enum StringMatcher {
    Scalar(String),
    Glob { source: String, regex: Regex },
    Regex { source: String, regex: Regex },
}

impl StringMatcher {
    pub fn scalar(value: impl Into<String>) -> Self {
        StringMatcher::Scalar(value.into())
    }

    /// Compiles a glob where `*` matches any run of characters and `?` one character.
    pub fn glob(source: &str, case_insensitive: bool, pos: Position) -> Result<Self> {
        let mut pattern = String::with_capacity(source.len() + 8);
        pattern.push('^');
        for ch in source.chars() {
            match ch {
                '*' => pattern.push_str(".*"),
                '?' => pattern.push('.'),
                other => pattern.push_str(&regex::escape(&other.to_string())),
            }
        }
        pattern.push('$');

        let regex = RegexBuilder::new(&pattern)
            .case_insensitive(case_insensitive)
            .dot_matches_new_line(true)
            .build()
            .map_err(|e| SeclError::ast(pos, format!("invalid pattern `{source}`: {e}")))?;

        Ok(StringMatcher::Glob {
            source: source.to_string(),
            regex,
        })
    }

    pub fn regex(source: &str, pos: Position) -> Result<Self> {
        let regex = Regex::new(source)
            .map_err(|e| SeclError::ast(pos, format!("invalid regex `{source}`: {e}")))?;
        Ok(StringMatcher::Regex {
            source: source.to_string(),
            regex,
        })
    }

    pub fn matches(&self, value: &str) -> bool {
        match self {
            StringMatcher::Scalar(expected) => expected == value,
            StringMatcher::Glob { regex, .. } | StringMatcher::Regex { regex, .. } => {
                regex.is_match(value)
            }
        }
    }

    pub fn source(&self) -> &str {
        match self {
            StringMatcher::Scalar(value) => value,
            StringMatcher::Glob { source, .. } | StringMatcher::Regex { source, .. } => source,
        }
    }

    pub fn kind(&self) -> FieldValueKind {
        match self {
            StringMatcher::Scalar(_) => FieldValueKind::Scalar,
            StringMatcher::Glob { .. } => FieldValueKind::Pattern,
            StringMatcher::Regex { .. } => FieldValueKind::Regex,
        }
    }
}

/// A set of string operands, as produced by an array literal.
///
/// Scalars are kept in a hash set; globs and regexes are tried in order.
#[derive(Debug, Clone, Default)]
pub struct StringValues {
    scalars: HashSet<String>,
    matchers: Vec<StringMatcher>,
}

impl StringValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, matcher: StringMatcher) {
        match matcher {
            StringMatcher::Scalar(value) => {
                self.scalars.insert(value);
            }
            other => self.matchers.push(other),
        }
    }

    pub fn matches(&self, value: &str) -> bool {
        self.scalars.contains(value) || self.matchers.iter().any(|m| m.matches(value))
    }

    pub fn matches_any<S: AsRef<str>>(&self, values: &[S]) -> bool {
        values.iter().any(|value| self.matches(value.as_ref()))
    }

    /// Every operand, scalars first.
    pub fn iter(&self) -> impl Iterator<Item = StringMatcher> + '_ {
        let mut scalars: Vec<&String> = self.scalars.iter().collect();
        scalars.sort();
        scalars
            .into_iter()
            .map(|s| StringMatcher::Scalar(s.clone()))
            .chain(self.matchers.iter().cloned())
    }

    pub fn len(&self) -> usize {
        self.scalars.len() + self.matchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FromIterator<StringMatcher> for StringValues {
    fn from_iter<I: IntoIterator<Item = StringMatcher>>(iter: I) -> Self {
        let mut values = StringValues::new();
        for matcher in iter {
            values.push(matcher);
        }
        values
    }
}
