//! envlisp CLI
//!
//! Main entry point for the `envlisp` command.

use clap::{Parser, Subcommand};
use envlisp::{Environment, EvalConfig, Evaluation, Outcome, SourceFile, Warning};
use miette::{IntoDiagnostic, Result};
use std::path::{Path, PathBuf};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser)]
#[command(name = "envlisp")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Evaluate Lisp expressions against a numeric environment", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(clap::Args)]
struct EvalOptions {
    /// Bind an environment key (repeatable)
    #[arg(short, long = "env", value_name = "KEY=VALUE", value_parser = parse_binding)]
    bindings: Vec<(String, f32)>,

    /// Load the environment from a JSON object of numbers
    #[arg(long, value_name = "FILE")]
    env_file: Option<PathBuf>,

    /// Evaluation settings
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Print result, outcome and environment as JSON
    #[arg(long)]
    json: bool,

    /// Fail when reading or evaluating fails
    #[arg(long)]
    strict: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate an expression given on the command line
    Eval {
        /// Lisp source
        #[arg(value_name = "EXPR")]
        expr: String,

        #[command(flatten)]
        options: EvalOptions,
    },

    /// Evaluate a Lisp source file
    Run {
        /// Input file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        #[command(flatten)]
        options: EvalOptions,
    },

    /// Start the interactive REPL
    Repl {
        /// Load the environment from a JSON object of numbers
        #[arg(long, value_name = "FILE")]
        env_file: Option<PathBuf>,

        /// Evaluation settings
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,
    },

    /// Show version and host vocabulary
    Info,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .init();

    match cli.command {
        Commands::Eval { expr, options } => {
            evaluate(SourceFile::new("<expr>", expr), &options)
        }
        Commands::Run { input, options } => {
            let content = std::fs::read_to_string(&input)
                .map_err(|e| miette::miette!("Failed to read input file: {}", e))?;
            let source = SourceFile::new(input.to_string_lossy().to_string(), content);
            evaluate(source, &options)
        }
        Commands::Repl { env_file, config } => {
            let environment = load_environment(env_file.as_deref(), &[])?;
            let config = load_config(config.as_deref())?;
            envlisp::repl::Repl::new(environment, &config).run()?;
            Ok(())
        }
        Commands::Info => info(),
    }
}

fn parse_binding(s: &str) -> Result<(String, f32), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got `{s}`"))?;
    let value = value
        .trim()
        .parse::<f32>()
        .map_err(|e| format!("bad value for `{key}`: {e}"))?;
    Ok((key.to_string(), value))
}

fn load_config(path: Option<&Path>) -> Result<EvalConfig> {
    match path {
        Some(path) => Ok(EvalConfig::load(path)?),
        None => Ok(EvalConfig::default()),
    }
}

/// File bindings first, command-line bindings on top
fn load_environment(path: Option<&Path>, bindings: &[(String, f32)]) -> Result<Environment> {
    let mut environment = match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .map_err(|e| miette::miette!("Failed to read environment file: {}", e))?;
            serde_json::from_str(&text).into_diagnostic()?
        }
        None => Environment::new(),
    };
    environment.extend(bindings.iter().cloned());
    Ok(environment)
}

fn evaluate(source: SourceFile, options: &EvalOptions) -> Result<()> {
    let environment = load_environment(options.env_file.as_deref(), &options.bindings)?;
    let config = load_config(options.config.as_deref())?;

    tracing::info!("Evaluating {}", source.name);
    let evaluation = envlisp::evaluate_source(environment, source, &config);

    if options.json {
        print_json(&evaluation)?;
    } else {
        for warning in &evaluation.diagnostics {
            match warning {
                Warning::Read(err) => eprintln!("{:?}", miette::Report::new(err.clone())),
                Warning::Eval(err) => eprintln!("{:?}", miette::Report::new(err.clone())),
                Warning::UnhandledType { .. } => {}
            }
        }
        println!("{}", evaluation.value());
    }

    if options.strict && !evaluation.is_success() {
        return Err(miette::miette!(
            "Evaluation failed ({})",
            evaluation.outcome.label()
        ));
    }
    Ok(())
}

fn print_json(evaluation: &Evaluation) -> Result<()> {
    let error = match &evaluation.outcome {
        Outcome::ReadFailed(err) => Some(err.to_string()),
        Outcome::EvalFailed(err) => Some(err.to_string()),
        Outcome::Unhandled { type_name } => Some(format!("unhandled value of type {type_name}")),
        Outcome::Number(_) | Outcome::Null => None,
    };
    let report = serde_json::json!({
        "result": evaluation.value(),
        "outcome": evaluation.outcome.label(),
        "error": error,
        "environment": evaluation.environment,
    });
    let json = serde_json::to_string_pretty(&report).into_diagnostic()?;
    println!("{}", json);
    Ok(())
}

fn info() -> Result<()> {
    println!("envlisp");
    println!("Version: {}", envlisp::VERSION);
    println!();
    println!("Host functions:");
    println!("  (GET-ENV key)         Read a key; missing keys follow `missing_key`");
    println!("  (SET-ENV! key value)  Write a key; returns the sentinel (default 100)");
    println!("  (HAS-ENV? key)        T when the key is bound");
    println!();
    println!("Results:");
    println!("  int, real   the number as f32");
    println!("  null        0");
    println!("  others      0, with a warning naming the type");
    Ok(())
}
