//! Host functions bridging evaluated code and the caller's environment
//!
//! The environment is reached through the `HostContext` handed to every
//! native call, never through shared state, so independent evaluations
//! cannot observe each other.

use serde::{Deserialize, Serialize};

use super::eval::Interpreter;
use super::value::{Arity, EvalResult, Value};
use crate::diagnostics::EvalError;
use crate::environment::Environment;

/// What `GET-ENV` does when the key is not bound
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingKeyPolicy {
    /// Fail the evaluation with `EvalError::MissingKey`
    #[default]
    Error,
    /// Return this value instead
    Fallback(f32),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HostPolicy {
    pub missing_key: MissingKeyPolicy,
    /// Returned by `SET-ENV!`
    pub sentinel: f64,
}

impl Default for HostPolicy {
    fn default() -> Self {
        Self {
            missing_key: MissingKeyPolicy::Error,
            sentinel: 100.0,
        }
    }
}

/// Per-evaluation handle to the caller's environment
pub struct HostContext<'env> {
    environment: &'env mut Environment,
    policy: HostPolicy,
}

impl<'env> HostContext<'env> {
    pub fn new(environment: &'env mut Environment, policy: HostPolicy) -> Self {
        Self {
            environment,
            policy,
        }
    }

    pub fn environment(&self) -> &Environment {
        &*self.environment
    }

    pub fn environment_mut(&mut self) -> &mut Environment {
        &mut *self.environment
    }

    pub fn policy(&self) -> HostPolicy {
        self.policy
    }
}

/// Register `GET-ENV`, `SET-ENV!` and `HAS-ENV?` in the global scope
pub fn install(interp: &mut Interpreter) {
    interp.define_native("GET-ENV", Arity::Exact(1), get_env);
    interp.define_native("SET-ENV!", Arity::Exact(2), set_env);
    interp.define_native("HAS-ENV?", Arity::Exact(1), has_env);
}

/// Keys may be given as strings or symbols
fn key_arg(interp: &Interpreter, func: &str, value: &Value) -> Result<String, EvalError> {
    match value {
        Value::String(s) => Ok(s.to_string()),
        Value::Symbol(s) => Ok(interp.symbols().name(*s).to_string()),
        other => Err(EvalError::BadArg {
            func: func.to_string(),
            expected: "a string key",
            found: other.type_name(),
        }),
    }
}

fn get_env(interp: &mut Interpreter, host: &mut HostContext<'_>, args: &[Value]) -> EvalResult {
    let key = key_arg(interp, "GET-ENV", &args[0])?;
    match host.environment().get(&key) {
        Some(value) => Ok(Value::Real(f64::from(value))),
        None => match host.policy().missing_key {
            MissingKeyPolicy::Fallback(value) => {
                tracing::debug!(key = %key, fallback = value, "GET-ENV fell back on missing key");
                Ok(Value::Real(f64::from(value)))
            }
            MissingKeyPolicy::Error => Err(EvalError::MissingKey { key }),
        },
    }
}

fn set_env(interp: &mut Interpreter, host: &mut HostContext<'_>, args: &[Value]) -> EvalResult {
    let key = key_arg(interp, "SET-ENV!", &args[0])?;
    let value = args[1].as_real().ok_or_else(|| EvalError::BadArg {
        func: "SET-ENV!".to_string(),
        expected: "a number",
        found: args[1].type_name(),
    })?;
    host.environment_mut().set(key, value as f32);
    Ok(Value::Real(host.policy().sentinel))
}

fn has_env(interp: &mut Interpreter, host: &mut HostContext<'_>, args: &[Value]) -> EvalResult {
    let key = key_arg(interp, "HAS-ENV?", &args[0])?;
    Ok(interp.boolean(host.environment().contains_key(&key)))
}
