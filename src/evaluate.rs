//! One-shot evaluation of a Lisp expression against an environment
//!
//! A fresh interpreter is built for every call, given access to the
//! environment through a [`HostContext`], and dropped before returning.
//! Whatever the program leaves behind is classified into an [`Outcome`].

use crate::config::EvalConfig;
use crate::diagnostics::{EvalError, ReadError, Reporter, SourceFile, Warning};
use crate::environment::Environment;
use crate::interp::{HostContext, Interpreter, Value, host};

/// How an evaluation ended
#[derive(Debug, Clone)]
pub enum Outcome {
    /// An integer or real result, narrowed to `f32`
    Number(f32),
    /// The program produced null
    Null,
    /// The program produced a value with no numeric reading
    Unhandled { type_name: &'static str },
    /// The source did not read; nothing was evaluated
    ReadFailed(ReadError),
    /// Evaluation stopped with an error
    EvalFailed(EvalError),
}

impl Outcome {
    /// Collapse to a number, with `0.0` for everything non-numeric
    pub fn value(&self) -> f32 {
        match self {
            Outcome::Number(n) => *n,
            _ => 0.0,
        }
    }

    /// False only when reading or evaluating failed
    pub fn is_success(&self) -> bool {
        !matches!(self, Outcome::ReadFailed(_) | Outcome::EvalFailed(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Number(_) => "number",
            Outcome::Null => "null",
            Outcome::Unhandled { .. } => "unhandled",
            Outcome::ReadFailed(_) => "read-failed",
            Outcome::EvalFailed(_) => "eval-failed",
        }
    }
}

/// Everything an evaluation hands back to the caller
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub outcome: Outcome,
    /// The environment after evaluation, mutations included
    pub environment: Environment,
    /// Warnings in the order they were raised
    pub diagnostics: Vec<Warning>,
}

impl Evaluation {
    pub fn value(&self) -> f32 {
        self.outcome.value()
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }

    pub fn into_parts(self) -> (f32, Environment) {
        (self.outcome.value(), self.environment)
    }
}

/// Evaluate `source` with the default configuration
pub fn evaluate(environment: Environment, source: &str) -> Evaluation {
    evaluate_with(environment, source, &EvalConfig::default())
}

pub fn evaluate_with(environment: Environment, source: &str, config: &EvalConfig) -> Evaluation {
    evaluate_source(environment, SourceFile::anonymous(source), config)
}

/// Evaluate a named source file.
///
/// A read failure short-circuits: nothing is evaluated and the environment
/// comes back untouched. An evaluation failure keeps every `SET-ENV!` that
/// ran before it.
pub fn evaluate_source(mut environment: Environment, source: SourceFile, config: &EvalConfig) -> Evaluation {
    let mut reporter = Reporter::new(source);
    let mut interp = Interpreter::with_limits(config.limits());
    host::install(&mut interp);

    tracing::debug!(
        source = %reporter.source().name,
        keys = environment.len(),
        "Evaluation started"
    );

    let outcome = match interp.read_source(reporter.source()) {
        Err(err) => {
            reporter.warning(Warning::Read(err.clone()));
            Outcome::ReadFailed(err)
        }
        Ok(program) => {
            let mut host = HostContext::new(&mut environment, config.host_policy());
            match interp.eval(&program, &mut host) {
                Ok(value) => classify(&value, &mut reporter),
                Err(err) => {
                    reporter.warning(Warning::Eval(err.clone()));
                    Outcome::EvalFailed(err)
                }
            }
        }
    };

    let steps = interp.steps();
    drop(interp);

    tracing::debug!(
        outcome = outcome.label(),
        value = outcome.value(),
        steps,
        "Evaluation finished"
    );

    Evaluation {
        outcome,
        environment,
        diagnostics: reporter.into_warnings(),
    }
}

/// Two-output form: the numeric result and the mutated environment
pub fn evaluate_lisp_expression(environment: Environment, input: &str) -> (f32, Environment) {
    evaluate(environment, input).into_parts()
}

fn classify(value: &Value, reporter: &mut Reporter) -> Outcome {
    match value {
        Value::Int(n) => Outcome::Number(*n as f32),
        Value::Real(f) => Outcome::Number(*f as f32),
        Value::Null => Outcome::Null,
        other => {
            let type_name = other.type_name();
            reporter.warning(Warning::UnhandledType { type_name });
            Outcome::Unhandled { type_name }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_numbers() {
        let mut reporter = Reporter::new(SourceFile::anonymous(""));
        assert!(matches!(classify(&Value::Int(3), &mut reporter), Outcome::Number(n) if n == 3.0));
        assert!(matches!(classify(&Value::Real(0.5), &mut reporter), Outcome::Number(n) if n == 0.5));
        assert!(matches!(classify(&Value::Null, &mut reporter), Outcome::Null));
        assert!(!reporter.has_warnings());
    }

    #[test]
    fn test_classify_unhandled_warns_once() {
        let mut reporter = Reporter::new(SourceFile::anonymous(""));
        let outcome = classify(&Value::string("hi"), &mut reporter);
        assert!(matches!(outcome, Outcome::Unhandled { type_name: "string" }));
        assert_eq!(outcome.value(), 0.0);
        assert_eq!(reporter.warnings().len(), 1);
    }
}
