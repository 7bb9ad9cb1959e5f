//! Error types for compilation and evaluation

use thiserror::Error;

use crate::governance::Violation;

/// Byte range into the source text.
pub type Span = std::ops::Range<usize>;

/// Category of a compile-time diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileErrorKind {
    /// Malformed token (invalid character sequence, unterminated string, ...)
    Lex,

    /// Grammar violation
    Syntax,

    /// Undefined symbol, type/arity mismatch, assignment into an
    /// immutable binding, unmatched generic-function overload
    Semantic,

    /// The compile-continuation check aborted compilation
    Timeout,
}

impl std::fmt::Display for CompileErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CompileErrorKind::Lex => "lex error",
            CompileErrorKind::Syntax => "syntax error",
            CompileErrorKind::Semantic => "semantic error",
            CompileErrorKind::Timeout => "compilation timeout",
        };
        f.write_str(s)
    }
}

/// A single positioned compile-time diagnostic.
#[derive(Debug, Clone, PartialEq)]
pub struct CompileError {
    /// Diagnostic category
    pub kind: CompileErrorKind,

    /// Byte range of the offending source text
    pub span: Span,

    /// 1-based line number
    pub line: usize,

    /// 1-based column number
    pub column: usize,

    /// Human-readable description
    pub message: String,
}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} at line {}, column {}: {}",
            self.kind, self.line, self.column, self.message
        )
    }
}

impl std::error::Error for CompileError {}

/// All diagnostics collected during one `compile` call.
///
/// Compilation never stops at the first problem: lexing continues past
/// malformed tokens and the parser resynchronizes at statement
/// boundaries, so one compile can report many errors at once.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompileErrors {
    errors: Vec<CompileError>,
}

impl CompileErrors {
    pub(crate) fn new(errors: Vec<CompileError>) -> Self {
        Self { errors }
    }

    /// Number of collected diagnostics.
    pub fn count(&self) -> usize {
        self.errors.len()
    }

    /// Diagnostic at position `i`, in source order.
    pub fn get(&self, i: usize) -> Option<&CompileError> {
        self.errors.get(i)
    }

    /// Iterate over all diagnostics in source order.
    pub fn iter(&self) -> impl Iterator<Item = &CompileError> {
        self.errors.iter()
    }

    /// True if any diagnostic is a [`CompileErrorKind::Timeout`].
    pub fn timed_out(&self) -> bool {
        self.errors
            .iter()
            .any(|e| e.kind == CompileErrorKind::Timeout)
    }
}

impl std::fmt::Display for CompileErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.errors.as_slice() {
            [] => write!(f, "compilation failed"),
            [single] => write!(f, "{single}"),
            many => {
                writeln!(f, "{} compilation errors:", many.len())?;
                for e in many {
                    writeln!(f, "  {e}")?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for CompileErrors {}

impl IntoIterator for CompileErrors {
    type Item = CompileError;
    type IntoIter = std::vec::IntoIter<CompileError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

/// Runtime error raised by [`Expression::value`](crate::Expression::value).
#[derive(Error, Debug, Clone)]
pub enum EvalError {
    /// A governance check failed and its handler aborted evaluation.
    #[error("governance violation: {0}")]
    Governance(Violation),

    /// A composed function was called after its defining compositor
    /// (the owner of its function table) was dropped.
    #[error("function '{0}' is no longer available")]
    FunctionUnavailable(String),

    /// A composed function was called while still a declaration stub
    /// (its body never finished compiling).
    #[error("function '{0}' has no body")]
    FunctionUndefined(String),

    /// Internal control-flow signal for `break`/`continue`/`return`.
    ///
    /// Propagates as an `Err` until caught by the enclosing loop,
    /// function call, or the top level; escaping to the host indicates
    /// a bug in the evaluator.
    #[doc(hidden)]
    #[error("control flow escaped evaluation")]
    Control(crate::eval::ControlFlow),

    /// Operand kind did not match what the compiled node expects.
    /// The compiler's type checking should make this unreachable.
    #[error("type mismatch: expected {expected}, got {got}")]
    TypeMismatch {
        /// Expected operand kind
        expected: &'static str,
        /// Actual operand kind
        got: &'static str,
    },
}

/// Result type alias for evaluation.
pub type EvalResult<T> = std::result::Result<T, EvalError>;
