//! Compiler configuration.
//!
//! [`CompilerConfig`] controls how macros are compiled: whether partial
//! evaluators are generated, how large and how deeply nested an expression
//! may be, and how glob patterns compare strings. It travels inside [`crate::Opts`] so every macro
//! compiled in the same session sees the same settings.

/// Default upper bound for expression text, in bytes.
pub const DEFAULT_MAX_EXPRESSION_LENGTH: usize = 64 * 1024;

/// Default upper bound for operator and parenthesis nesting.
pub const DEFAULT_MAX_NESTING_DEPTH: usize = 256;

/// Configuration for macro compilation.
///
/// # Examples
///
/// ```rust
/// use secl_macro::CompilerConfig;
///
/// let config = CompilerConfig::default()
///     .with_partials(false)
///     .with_case_insensitive_patterns(true);
/// assert!(!config.generate_partials);
/// assert!(config.case_insensitive_patterns);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerConfig {
    /// Build per-field partial evaluators for boolean macros.
    pub generate_partials: bool,

    /// Expressions longer than this are rejected by the parser.
    pub max_expression_length: usize,

    /// Deepest nesting of `!`, parentheses and chained `&&`/`||` the parser
    /// accepts.
    pub max_nesting_depth: usize,

    /// Glob patterns (`~"..."`) ignore ASCII case.
    pub case_insensitive_patterns: bool,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            generate_partials: true,
            max_expression_length: DEFAULT_MAX_EXPRESSION_LENGTH,
            max_nesting_depth: DEFAULT_MAX_NESTING_DEPTH,
            case_insensitive_patterns: false,
        }
    }
}

impl CompilerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration for callers that only need the compiled value and its
    /// metadata, without incremental re-evaluation.
    pub fn minimal() -> Self {
        Self {
            generate_partials: false,
            ..Self::default()
        }
    }

    /// Configuration for policy authoring: small expressions, full metadata.
    pub fn development() -> Self {
        Self {
            generate_partials: true,
            max_expression_length: 4 * 1024,
            max_nesting_depth: 64,
            case_insensitive_patterns: false,
        }
    }

    pub fn with_partials(mut self, enable: bool) -> Self {
        self.generate_partials = enable;
        self
    }

    pub fn with_max_expression_length(mut self, length: usize) -> Self {
        self.max_expression_length = length;
        self
    }

    pub fn with_max_nesting_depth(mut self, depth: usize) -> Self {
        self.max_nesting_depth = depth;
        self
    }

    pub fn with_case_insensitive_patterns(mut self, enable: bool) -> Self {
        self.case_insensitive_patterns = enable;
        self
    }
}
