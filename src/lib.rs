//! BoxScheme - a small Scheme-like evaluator over a boxed environment model
//!
//! This crate implements the evaluator core of a lexically scoped Scheme dialect with
//! closures, in-place mutation (`set!`), recursive binding groups (`letrec`), mutually
//! recursive top-level `define`s and an opt-in call tracer for procedures.
//!
//! ```scheme
//! (define sq (lambda (x) (* x x)))
//! (sq 5)                                  ; => 25
//! (let ((x 1)) (set! x 2) x)              ; => 2
//! (letrec ((even? (lambda (n) (if (= n 0) #t (odd? (- n 1)))))
//!          (odd?  (lambda (n) (if (= n 0) #f (even? (- n 1))))))
//!   (even? 10))                           ; => #t
//! (trace sq)
//! (sq 3)                                  ; prints "> (sq 3)" then "< 9"
//! ```
//!
//! ## Environment model
//!
//! Every variable lives in a binding cell (a box). Frames map names to cells and are shared
//! by reference between the closures that capture them, so a `set!` performed through one
//! closure is visible through every other closure holding the same frame. Only the global
//! frame grows after creation; it is where `define` inserts new names.
//!
//! ## Run context
//!
//! Global frame, trace registry, trace output and limits are owned by an
//! [`evaluator::Interpreter`] and threaded explicitly through evaluation. The free
//! functions [`eval_program`] and [`eval_source`] start every run from a fresh context.
//!
//! ## Modules
//!
//! - `scheme`: S-expression reading from text (feature `scheme`)
//! - `ast`: expression tree and datum-to-expression conversion
//! - `value`: runtime values and their rendering
//! - `env`: frames, binding cells and the global frame
//! - `primitives`: primitive operations
//! - `trace`: procedure call tracing
//! - `evaluator`: the evaluator proper

use std::fmt;

/// Maximum parsing depth to prevent stack overflow attacks
/// This limits deeply nested structures in the S-expression reader and AST conversion
pub const MAX_PARSE_DEPTH: usize = 64;

/// Default maximum evaluation depth
/// Evaluation is stack-recursive; this turns runaway recursion into an error
/// instead of a host stack overflow. See [`EvalConfig::max_eval_depth`].
pub const MAX_EVAL_DEPTH: usize = 1_000;

/// Categorizes the different kinds of parsing errors.
#[derive(Debug, PartialEq, Clone)]
pub enum ParseErrorKind {
    /// Invalid or unexpected syntax (bad tokens, malformed special forms)
    InvalidSyntax,
    /// Input ended before the expression was complete (EOF, unterminated string, unclosed parens)
    Incomplete,
    /// Expression nesting exceeded the maximum parse depth
    TooDeeplyNested,
    /// Extra input found after a complete, valid expression
    TrailingContent,
    /// Implementation-imposed limit exceeded (integer overflow, etc.)
    ImplementationLimit,
}

/// A structured error providing detailed information about a parsing failure.
#[derive(Debug, PartialEq, Clone)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    /// Context snippet from the input showing where the error occurred (max 100 chars)
    pub context: Option<String>,
    /// The problematic token or character encountered, if identifiable
    pub found: Option<String>,
}

impl ParseError {
    /// Create a ParseError with all fields
    pub fn new(
        kind: ParseErrorKind,
        message: impl Into<String>,
        context: Option<String>,
        found: Option<String>,
    ) -> Self {
        ParseError {
            kind,
            message: message.into(),
            context,
            found,
        }
    }

    /// Create a simple ParseError with a kind and message but no context
    pub fn from_message(kind: ParseErrorKind, message: impl Into<String>) -> Self {
        Self::new(kind, message, None, None)
    }

    /// Create a syntax error about a malformed form, naming the offending datum
    pub(crate) fn invalid_syntax(message: impl Into<String>, found: impl fmt::Display) -> Self {
        Self::new(
            ParseErrorKind::InvalidSyntax,
            message,
            None,
            Some(found.to_string()),
        )
    }

    /// Create a ParseError with context extracted from input at a given offset
    pub fn with_context(
        kind: ParseErrorKind,
        message: impl Into<String>,
        input: &str,
        error_offset: usize,
    ) -> Self {
        const MAX_CONTEXT: usize = 100;

        let context_start = error_offset.saturating_sub(20);
        let context_str: String = input
            .chars()
            .skip(context_start)
            .take(MAX_CONTEXT)
            .collect();

        let mut display_context = String::new();
        if context_start > 0 {
            display_context.push_str("[...]");
        }
        display_context.push_str(&context_str);
        if context_start + context_str.len() < input.len() {
            display_context.push_str("[...]");
        }

        let display_context = display_context.replace('\n', "\\n").replace('\r', "");

        Self::new(kind, message, Some(display_context), None)
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ParseError: {}", self.message)?;
        if let Some(found) = &self.found {
            write!(f, "\nFound: {found}")?;
        }
        if let Some(context) = &self.context {
            write!(f, "\nContext: {context}")?;
        }
        Ok(())
    }
}

/// Error types for the interpreter
///
/// Evaluation errors are never wrapped on their way up: the first failure in a
/// left-to-right, depth-first evaluation is returned as-is to the caller.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("{0}")]
    ParseError(ParseError),
    #[error("Unbound variable: {0}")]
    UnboundVariable(String),
    #[error("Not a procedure: {0}")]
    NotAProcedure(String),
    #[error("ArityMismatch: expected {expected} arguments, got {got}")]
    ArityMismatch { expected: usize, got: usize },
    #[error("Duplicate binding in one frame: {0}")]
    DuplicateBinding(String),
    #[error("Empty program")]
    EmptyProgram,
    #[error("Primitive error: {0}")]
    PrimitiveError(String),
    #[error("Cannot trace a non-procedure value bound to: {0}")]
    TraceOnNonProcedure(String),
    #[error("Evaluation depth limit exceeded (max: {0})")]
    DepthLimitExceeded(usize),
}

impl Error {
    /// Create an ArityMismatch error
    pub fn arity_mismatch(expected: usize, got: usize) -> Self {
        Error::ArityMismatch { expected, got }
    }

    /// Create a PrimitiveError from any message
    pub(crate) fn primitive(message: impl Into<String>) -> Self {
        Error::PrimitiveError(message.into())
    }
}

impl From<ParseError> for Error {
    fn from(error: ParseError) -> Self {
        Error::ParseError(error)
    }
}

/// What happens to a traced procedure's call-depth counter when the traced call fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TraceDepthOnError {
    /// Decrement the counter even when the call fails, keeping later indentation correct
    #[default]
    Restore,
    /// Leave the counter incremented after a failing call
    Keep,
}

/// Evaluation settings for one [`evaluator::Interpreter`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvalConfig {
    /// Maximum nesting of `eval` calls before `Error::DepthLimitExceeded`
    pub max_eval_depth: usize,
    /// Counter policy for traced calls that fail
    pub trace_depth_on_error: TraceDepthOnError,
}

impl Default for EvalConfig {
    fn default() -> Self {
        EvalConfig {
            max_eval_depth: MAX_EVAL_DEPTH,
            trace_depth_on_error: TraceDepthOnError::default(),
        }
    }
}

pub mod ast;
pub mod env;
pub mod evaluator;
pub mod primitives;
pub mod trace;
pub mod value;

#[cfg(feature = "scheme")]
pub mod scheme;

pub use ast::{Binding, CExp, Exp, Program};
pub use evaluator::Interpreter;
pub use value::Value;

/// Evaluate a whole program in a fresh run context.
///
/// The global frame and trace registry are created anew for every call, so runs never
/// observe each other's definitions. Returns the value of the last expression.
pub fn eval_program(program: &Program) -> Result<Value, Error> {
    Interpreter::new().eval_program(program)
}

/// Parse a single expression (which may be a `define`) and evaluate it in a fresh run context.
#[cfg(feature = "scheme")]
pub fn eval_source(input: &str) -> Result<Value, Error> {
    Interpreter::new().eval_source(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let cases = vec![
            (Error::UnboundVariable("x".into()), "Unbound variable: x"),
            (
                Error::arity_mismatch(2, 3),
                "ArityMismatch: expected 2 arguments, got 3",
            ),
            (Error::EmptyProgram, "Empty program"),
            (Error::NotAProcedure("5".into()), "Not a procedure: 5"),
            (
                Error::DepthLimitExceeded(10),
                "Evaluation depth limit exceeded (max: 10)",
            ),
        ];
        for (error, expected) in cases {
            assert_eq!(error.to_string(), expected);
        }
    }

    #[test]
    fn test_parse_error_display_includes_found_and_context() {
        let err = ParseError::new(
            ParseErrorKind::InvalidSyntax,
            "bad let",
            Some("(let x)".into()),
            Some("x".into()),
        );
        let shown = Error::from(err).to_string();
        assert!(shown.starts_with("ParseError: bad let"));
        assert!(shown.contains("Found: x"));
        assert!(shown.contains("Context: (let x)"));
    }

    #[test]
    fn test_parse_error_context_is_truncated() {
        let input = format!("{}@{}", "a".repeat(50), "b".repeat(200));
        let err = ParseError::with_context(ParseErrorKind::InvalidSyntax, "oops", &input, 50);
        let context = err.context.unwrap_or_default();
        assert!(context.starts_with("[...]"));
        assert!(context.ends_with("[...]"));
    }

    #[test]
    fn test_default_config() {
        let config = EvalConfig::default();
        assert_eq!(config.max_eval_depth, MAX_EVAL_DEPTH);
        assert_eq!(config.trace_depth_on_error, TraceDepthOnError::Restore);
    }
}
