//! Diagnostic reporting with source locations
//!
//! Read errors carry the named source and a labelled span so they render
//! through miette. Evaluation errors have no spans: the evaluator works on
//! data, not on located syntax.

use crate::common::Span;
use miette::{Diagnostic, NamedSource, SourceSpan};
use std::sync::Arc;
use thiserror::Error;

/// Source text for error reporting
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub name: String,
    pub content: Arc<str>,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: Arc::from(content.into()),
        }
    }

    /// Source without a file behind it (inline expressions, REPL lines)
    pub fn anonymous(content: impl Into<String>) -> Self {
        Self::new("<input>", content)
    }

    pub fn to_named_source(&self) -> NamedSource<String> {
        NamedSource::new(self.name.clone(), self.content.to_string())
    }
}

/// Convert our Span to miette's SourceSpan
impl From<Span> for SourceSpan {
    fn from(span: Span) -> Self {
        SourceSpan::new(span.start.into(), span.len())
    }
}

/// The source did not form a valid program
#[derive(Error, Debug, Diagnostic, Clone)]
pub enum ReadError {
    #[error("Unexpected `)`")]
    #[diagnostic(code(read::paren_unexpected))]
    UnexpectedParen {
        #[label("no list is open here")]
        span: SourceSpan,
        #[source_code]
        src: NamedSource<String>,
    },

    #[error("Expected `)` before end of input")]
    #[diagnostic(code(read::paren_expected))]
    ExpectedParen {
        #[label("this list is never closed")]
        span: SourceSpan,
        #[source_code]
        src: NamedSource<String>,
    },

    #[error("Unexpected `.`")]
    #[diagnostic(
        code(read::dot_unexpected),
        help("a dot may only appear before the last element of a list")
    )]
    UnexpectedDot {
        #[label("dot not allowed here")]
        span: SourceSpan,
        #[source_code]
        src: NamedSource<String>,
    },

    #[error("Expected exactly one expression after `.`")]
    #[diagnostic(code(read::dot_expected))]
    MalformedDot {
        #[label("dotted tail is malformed")]
        span: SourceSpan,
        #[source_code]
        src: NamedSource<String>,
    },

    #[error("Unrecognized token `{text}`")]
    #[diagnostic(code(read::bad_token))]
    BadToken {
        text: String,
        #[label("cannot read this")]
        span: SourceSpan,
        #[source_code]
        src: NamedSource<String>,
    },

    #[error("Unterminated string literal")]
    #[diagnostic(code(read::unterminated_string))]
    UnterminatedString {
        #[label("string starts here")]
        span: SourceSpan,
        #[source_code]
        src: NamedSource<String>,
    },

    #[error("Quote is not followed by an expression")]
    #[diagnostic(code(read::bad_quote))]
    BadQuote {
        #[label("nothing to quote")]
        span: SourceSpan,
        #[source_code]
        src: NamedSource<String>,
    },

    #[error("Unknown character name `{text}`")]
    #[diagnostic(
        code(read::bad_char),
        help("use a single character or one of: space, newline, tab")
    )]
    BadChar {
        text: String,
        #[label("unknown character")]
        span: SourceSpan,
        #[source_code]
        src: NamedSource<String>,
    },

    #[error("Expression nests deeper than {limit} levels")]
    #[diagnostic(code(read::too_deep))]
    TooDeep {
        limit: usize,
        #[label("nesting limit reached here")]
        span: SourceSpan,
        #[source_code]
        src: NamedSource<String>,
    },
}

impl ReadError {
    /// Short name of the failure, stable across messages
    pub fn kind(&self) -> &'static str {
        match self {
            ReadError::UnexpectedParen { .. } => "paren-unexpected",
            ReadError::ExpectedParen { .. } => "paren-expected",
            ReadError::UnexpectedDot { .. } => "dot-unexpected",
            ReadError::MalformedDot { .. } => "dot-expected",
            ReadError::BadToken { .. } => "bad-token",
            ReadError::UnterminatedString { .. } => "unterminated-string",
            ReadError::BadQuote { .. } => "bad-quote",
            ReadError::BadChar { .. } => "bad-char",
            ReadError::TooDeep { .. } => "too-deep",
        }
    }
}

/// The program read fine but failed while evaluating
#[derive(Error, Debug, Diagnostic, Clone, PartialEq)]
pub enum EvalError {
    #[error("Malformed `{form}` form: {reason}")]
    #[diagnostic(code(eval::form_syntax))]
    FormSyntax { form: &'static str, reason: String },

    #[error("Unknown variable `{name}`")]
    #[diagnostic(
        code(eval::unknown_var),
        help("bind it first with `define`, `let` or a lambda parameter")
    )]
    UnknownVar { name: String },

    #[error("Cannot call a value of type {found}: {repr}")]
    #[diagnostic(code(eval::bad_op))]
    BadOp { found: &'static str, repr: String },

    #[error("`{func}` expected {expected}, found {found}")]
    #[diagnostic(code(eval::bad_arg))]
    BadArg {
        func: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("`{func}` expects {expected} argument(s), got {found}")]
    #[diagnostic(code(eval::arity))]
    ArityMismatch {
        func: String,
        expected: String,
        found: usize,
    },

    #[error("`{func}` index {index} out of bounds for length {len}")]
    #[diagnostic(code(eval::out_of_bounds))]
    OutOfBounds {
        func: String,
        index: i64,
        len: usize,
    },

    #[error("Integer division by zero")]
    #[diagnostic(code(eval::division_by_zero))]
    DivisionByZero,

    #[error("Environment has no key `{key}`")]
    #[diagnostic(
        code(eval::missing_key),
        help("check with `HAS-ENV?` first, or configure `missing_key = {{ fallback = 0.0 }}`")
    )]
    MissingKey { key: String },

    #[error("Recursion depth limit of {limit} exceeded")]
    #[diagnostic(code(eval::depth))]
    DepthExceeded { limit: usize },

    #[error("Evaluation step limit of {limit} exceeded")]
    #[diagnostic(code(eval::step_limit))]
    StepLimitExceeded { limit: u64 },
}

/// Non-fatal condition raised while evaluating an expression
#[derive(Error, Debug, Clone)]
pub enum Warning {
    #[error("Lisp: {0}")]
    Read(ReadError),

    #[error("Lisp: {0}")]
    Eval(EvalError),

    #[error("Unhandled value of type {type_name} from Lisp")]
    UnhandledType { type_name: &'static str },
}

/// Collects warnings for one evaluation and forwards each to the log
pub struct Reporter {
    source: SourceFile,
    warnings: Vec<Warning>,
}

impl Reporter {
    pub fn new(source: SourceFile) -> Self {
        Self {
            source,
            warnings: Vec::new(),
        }
    }

    pub fn warning(&mut self, warning: Warning) {
        tracing::warn!(target: "envlisp", source = %self.source.name, "{}", warning);
        self.warnings.push(warning);
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Get the source file
    pub fn source(&self) -> &SourceFile {
        &self.source
    }

    /// Get warnings by reference
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Consume and return warnings
    pub fn into_warnings(self) -> Vec<Warning> {
        self.warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unhandled_type_message() {
        let warning = Warning::UnhandledType { type_name: "pair" };
        assert_eq!(warning.to_string(), "Unhandled value of type pair from Lisp");
    }

    #[test]
    fn test_eval_warning_is_prefixed() {
        let warning = Warning::Eval(EvalError::UnknownVar {
            name: "FOO".to_string(),
        });
        assert_eq!(warning.to_string(), "Lisp: Unknown variable `FOO`");
    }

    #[test]
    fn test_reporter_collects_in_order() {
        let mut reporter = Reporter::new(SourceFile::anonymous("x"));
        assert!(!reporter.has_warnings());
        reporter.warning(Warning::Eval(EvalError::DivisionByZero));
        reporter.warning(Warning::UnhandledType { type_name: "string" });
        assert_eq!(reporter.warnings().len(), 2);
        let warnings = reporter.into_warnings();
        assert!(matches!(warnings[0], Warning::Eval(EvalError::DivisionByZero)));
    }
}
