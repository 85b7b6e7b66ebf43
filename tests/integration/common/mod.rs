#![allow(dead_code)]

use std::process::Command;

use specweave::config::{ChecksConfig, Config};
use specweave::contracts::ContractViolation;
use specweave::interp::{Interpreter, Outcome, Value};
use specweave::{BuildError, build};

pub fn specweave() -> Command {
    Command::new(env!("CARGO_BIN_EXE_specweave"))
}

/// Build with every check enabled and run `Main.main`.
pub fn run(source: &str) -> Outcome {
    run_with(source, &ChecksConfig::default())
}

pub fn run_with(source: &str, checks: &ChecksConfig) -> Outcome {
    let built = match build(source, checks) {
        Ok(built) => built,
        Err(BuildError::Compile(err)) => panic!("compilation failed: {err}"),
        Err(BuildError::Contracts(diags)) => panic!("invalid clauses: {:?}", diags.errors),
    };
    let config = Config::default();
    Interpreter::new(&built.program, &config.runtime).run("Main.main").unwrap()
}

pub fn run_value(source: &str) -> Value {
    match run(source) {
        Outcome::Returned(value) => value,
        other => panic!("expected a normal return, got {other:?}"),
    }
}

pub fn run_int(source: &str) -> i64 {
    match run_value(source) {
        Value::Int(n) => n,
        other => panic!("expected an int, got {other}"),
    }
}

pub fn run_violation(source: &str) -> ContractViolation {
    match run(source) {
        Outcome::Violated(violation) => violation,
        other => panic!("expected a contract violation, got {other:?}"),
    }
}

/// Class of the exception that escaped `Main.main`.
pub fn run_throws(source: &str) -> String {
    match run(source) {
        Outcome::Threw { class } => class,
        other => panic!("expected an uncaught exception, got {other:?}"),
    }
}

/// Messages of every invalid clause.
pub fn clause_errors(source: &str) -> Vec<String> {
    let (_, plan) = specweave::analyze(source).unwrap_or_else(|e| panic!("compilation failed: {e}"));
    plan.diagnostics.errors.iter().map(|d| d.error.to_string()).collect()
}

pub fn clause_error_with(source: &str, expected: &str) {
    let errors = clause_errors(source);
    assert!(
        errors.iter().any(|e| e.contains(expected)),
        "expected a clause error containing {expected:?}, got {errors:?}"
    );
}

pub fn compile_should_fail_with(source: &str, expected: &str) {
    match specweave::analyze(source) {
        Ok(_) => panic!("expected compilation to fail with {expected:?}"),
        Err(err) => {
            let msg = err.to_string();
            assert!(msg.contains(expected), "expected error containing {expected:?}, got: {msg}");
        }
    }
}
