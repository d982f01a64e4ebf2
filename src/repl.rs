//! Interactive read-eval-print loop
//!
//! One interpreter and one environment live for the whole session, so
//! definitions and `SET-ENV!` writes carry over between lines.

use miette::Report;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use crate::config::EvalConfig;
use crate::diagnostics::SourceFile;
use crate::environment::Environment;
use crate::interp::{HostContext, HostPolicy, Interpreter, host};

const HELP: &str = "\
Commands:
  :env         Show the environment
  :help, :h    Show this help
  :quit, :q    Exit the REPL

Anything else is read and evaluated as Lisp.";

/// What the loop should do after a line
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Print(String),
    Nothing,
    Quit,
}

pub struct Repl {
    interp: Interpreter,
    environment: Environment,
    policy: HostPolicy,
    line_no: usize,
}

impl Repl {
    pub fn new(environment: Environment, config: &EvalConfig) -> Self {
        let mut interp = Interpreter::with_limits(config.limits());
        host::install(&mut interp);
        Self {
            interp,
            environment,
            policy: config.host_policy(),
            line_no: 0,
        }
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    /// Handle one line of input
    pub fn handle(&mut self, line: &str) -> Reply {
        let trimmed = line.trim();
        match trimmed {
            "" => Reply::Nothing,
            ":quit" | ":q" => Reply::Quit,
            ":help" | ":h" => Reply::Print(HELP.to_string()),
            ":env" => Reply::Print(self.show_environment()),
            _ if trimmed.starts_with(':') => {
                Reply::Print(format!("Unknown command `{trimmed}`, try :help"))
            }
            _ => Reply::Print(self.eval_line(trimmed)),
        }
    }

    fn eval_line(&mut self, line: &str) -> String {
        self.line_no += 1;
        let source = SourceFile::new(format!("<repl:{}>", self.line_no), line);
        let program = match self.interp.read_source(&source) {
            Ok(program) => program,
            Err(err) => return format!("{:?}", Report::new(err)),
        };

        let mut host = HostContext::new(&mut self.environment, self.policy);
        match self.interp.eval(&program, &mut host) {
            Ok(value) => self.interp.print(&value),
            Err(err) => format!("{:?}", Report::new(err)),
        }
    }

    fn show_environment(&self) -> String {
        if self.environment.is_empty() {
            return "(empty)".to_string();
        }
        self.environment
            .iter()
            .map(|(key, value)| format!("  {key} = {value:?}"))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Run the loop on the terminal until `:quit` or end of input
    pub fn run(mut self) -> miette::Result<Environment> {
        println!("envlisp REPL v{}", crate::VERSION);
        println!("Type :help for help, :quit to exit");
        println!();

        let mut editor =
            DefaultEditor::new().map_err(|e| miette::miette!("Failed to start line editor: {}", e))?;

        loop {
            match editor.readline("lisp> ") {
                Ok(line) => {
                    if !line.trim().is_empty() {
                        if let Err(e) = editor.add_history_entry(line.as_str()) {
                            tracing::debug!("Failed to record history: {}", e);
                        }
                    }
                    match self.handle(&line) {
                        Reply::Print(text) => println!("{text}"),
                        Reply::Nothing => {}
                        Reply::Quit => break,
                    }
                }
                Err(ReadlineError::Interrupted) => continue,
                Err(ReadlineError::Eof) => break,
                Err(e) => return Err(miette::miette!("Failed to read line: {}", e)),
            }
        }

        println!("Goodbye!");
        Ok(self.environment)
    }
}
