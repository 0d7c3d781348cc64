mod ast;
mod config;
mod env;
mod error;
mod eval;
mod functions;
mod grammar;
mod lexer;
mod lr;
mod orchestrator;
mod parser;
mod simplify;
mod token;
mod value;

use clap::{Parser, Subcommand};
use env::Environment;
use error::EngineError;
use eval::evaluate;
use log::info;
use orchestrator::{execute_steps, FormulaSet};
use parser::Parser as FormulaParser;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use simplify::simplify;
use std::path::PathBuf;
use value::Value;

/// Dynamic formula evaluation engine: lex, parse, simplify, and evaluate
/// formula expressions, or run an ordered set of them through the step
/// orchestrator.
#[derive(Parser, Debug)]
#[command(name = "formula-engine")]
#[command(version = config::VERSION)]
#[command(about = "A table-driven formula lexer/parser/evaluator")]
struct CliArgs {
    #[command(subcommand)]
    command: Option<Command>,

    /// Enable verbose (debug-level) logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Evaluate a single expression
    Eval {
        expression: String,

        /// Variable binding in the form name=value, repeatable
        #[arg(long = "var", value_name = "NAME=VALUE")]
        vars: Vec<String>,
    },
    /// Execute a formula set loaded from a JSON file
    Run {
        /// Path to a FormulaSet JSON document
        formula_set: PathBuf,

        /// Stop at the first failing step instead of continuing
        #[arg(long)]
        fail_fast: bool,
    },
}

fn main() {
    let args = CliArgs::parse();

    if args.verbose {
        simple_logger::init_with_level(log::Level::Debug).expect("logger already initialized");
    } else {
        simple_logger::init_with_level(log::Level::Warn).expect("logger already initialized");
    }

    let result = match args.command {
        Some(Command::Eval { expression, vars }) => run_eval(&expression, &vars),
        Some(Command::Run { formula_set, fail_fast }) => run_formula_set(&formula_set, fail_fast),
        None => run_repl(),
    };

    if let Err(e) = result {
        eprintln!("Error [{}]: {}", e.code(), e);
        std::process::exit(1);
    }
}

fn parse_var_binding(binding: &str) -> Result<(String, f64), String> {
    let (name, value) = binding
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{binding}'"))?;
    let value: f64 = value
        .parse()
        .map_err(|_| format!("'{value}' is not a number"))?;
    Ok((name.to_string(), value))
}

fn run_eval(expression: &str, vars: &[String]) -> Result<(), EngineError> {
    let mut env = Environment::new();
    for binding in vars {
        let (name, value) = parse_var_binding(binding)
            .map_err(|message| EngineError::Internal { kind: "cli".into(), message })?;
        env.define(name, Value::Number(value))?;
    }

    info!("evaluating expression: {expression}");
    let value = evaluate_one(expression, &env)?;
    println!("{value}");
    Ok(())
}

fn evaluate_one(expression: &str, env: &Environment) -> Result<Value, EngineError> {
    let tokens = lexer::lex(expression)?;
    let ast = FormulaParser::new(tokens).parse()?;
    let ast = simplify(&ast);
    Ok(evaluate(&ast, env)?)
}

fn run_formula_set(path: &PathBuf, fail_fast: bool) -> Result<(), EngineError> {
    let contents = std::fs::read_to_string(path).map_err(|e| EngineError::Internal {
        kind: "io".into(),
        message: format!("cannot read {}: {e}", path.display()),
    })?;
    let formula_set: FormulaSet = serde_json::from_str(&contents).map_err(|e| EngineError::Internal {
        kind: "deserialize".into(),
        message: e.to_string(),
    })?;

    info!("executing {} steps from {}", formula_set.steps.len(), path.display());
    let records = execute_steps(&formula_set, Environment::new(), fail_fast)?;
    for record in &records {
        if record.skipped {
            println!("step{} ({}): skipped", record.order, record.name);
        } else if let Some(result) = &record.result {
            println!(
                "step{} ({}): {result} [{}ms]",
                record.order, record.name, record.execution_time_ms
            );
        } else {
            for error in &record.errors {
                println!("step{} ({}): error [{}] {}", record.order, record.name, error.code, error.message);
            }
        }
    }
    Ok(())
}

fn run_repl() -> Result<(), EngineError> {
    let env = Environment::new();
    let mut rl = DefaultEditor::new().map_err(|e| EngineError::Internal {
        kind: "repl".into(),
        message: e.to_string(),
    })?;

    println!("{}", config::WELCOME_MESSAGE);
    println!("{}", config::WELCOME_SUBTITLE);

    loop {
        match rl.readline("formula> ") {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line.as_str());
                match evaluate_one(&line, &env) {
                    Ok(value) => println!("=> {value}"),
                    Err(e) => eprintln!("Error [{}]: {}", e.code(), e),
                }
            }
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("Error: {e}");
                break;
            }
        }
    }
    Ok(())
}
