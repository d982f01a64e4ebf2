//! Tree-walking interpreter for Lisp data
//!
//! Values, lexical scopes, the base library, and the host functions that
//! expose the caller's environment.

pub mod builtins;
pub mod eval;
pub mod host;
pub mod scope;
pub mod symbols;
pub mod value;

pub use eval::{Interpreter, Limits};
pub use host::{HostContext, HostPolicy, MissingKeyPolicy};
pub use symbols::{Symbol, SymbolTable};
pub use value::{Arity, EvalResult, NativeFn, Value, ValueKind};
