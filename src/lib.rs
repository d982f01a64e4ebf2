//! envlisp: evaluate Lisp expressions against a numeric environment
//!
//! A host program hands in a `String → f32` [`Environment`] and a Lisp
//! source string. The program can read the environment with `GET-ENV`,
//! write it with `SET-ENV!` and test keys with `HAS-ENV?`. Its result is
//! classified into an [`Outcome`], and the possibly mutated environment
//! comes back to the caller.
//!
//! # Architecture
//!
//! ```text
//! Source → Lexer → Reader → Value → Interpreter (+ HostContext) → Outcome
//! ```
//!
//! # Example
//!
//! ```
//! use envlisp::{Environment, evaluate_lisp_expression};
//!
//! let (result, env) = evaluate_lisp_expression(Environment::new(), r#"(SET-ENV! "x" 42.0)"#);
//! assert_eq!(result, 100.0);
//! assert_eq!(env.get("x"), Some(42.0));
//! ```

pub mod common;
pub mod config;
pub mod diagnostics;
pub mod environment;
pub mod evaluate;
pub mod interp;
pub mod lexer;
pub mod parser;
pub mod repl;

pub use config::{ConfigError, EvalConfig};
pub use diagnostics::{EvalError, ReadError, Reporter, SourceFile, Warning};
pub use environment::Environment;
pub use evaluate::{
    Evaluation, Outcome, evaluate, evaluate_lisp_expression, evaluate_source, evaluate_with,
};
pub use interp::{HostContext, Interpreter, MissingKeyPolicy, Value};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
