pub mod span;
pub mod diagnostics;
pub mod lexer;
pub mod parser;
pub mod clauses;
pub mod typeck;
pub mod contracts;
pub mod interp;
pub mod config;

use std::path::Path;

use config::{ChecksConfig, RuntimeConfig};
use contracts::ContractPlan;
use diagnostics::{CompileError, Diagnostics};
use interp::{CheckTable, Interpreter, Outcome, RuntimeError, WovenProgram};
use typeck::env::Env;

/// Why a program could not be prepared for running.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error("{} invalid contract clause(s)", .0.errors.len())]
    Contracts(Diagnostics),
}

/// A program ready to run, with the plan its checks were woven from.
#[derive(Debug)]
pub struct Build {
    pub plan: ContractPlan,
    pub program: WovenProgram,
}

/// Parse, type-check and analyze the contracts of a source string (lex → parse
/// → typeck → contract passes). Invalid clauses are reported in the plan's
/// diagnostics, not as an error.
pub fn analyze(source: &str) -> Result<(Env, ContractPlan), CompileError> {
    let unit = parser::parse_source(source)?;
    let env = typeck::typecheck(&unit)?;
    let plan = contracts::analyze(&unit, &env);
    Ok((env, plan))
}

/// Analyze, then weave the enabled check categories into a runnable program.
/// Any invalid clause fails the build.
pub fn build(source: &str, checks: &ChecksConfig) -> Result<Build, BuildError> {
    let (env, mut plan) = analyze(source)?;
    if plan.diagnostics.has_errors() {
        return Err(BuildError::Contracts(std::mem::take(&mut plan.diagnostics)));
    }
    let mut table = CheckTable::default();
    contracts::weave::weave(&env, &plan, checks, &mut table);
    Ok(Build { plan, program: WovenProgram::new(env, table) })
}

/// Build and run `entry` (`Class.method`).
pub fn run(source: &str, entry: &str, checks: &ChecksConfig, runtime: &RuntimeConfig) -> Result<Outcome, RunError> {
    let built = build(source, checks)?;
    Ok(Interpreter::new(&built.program, runtime).run(entry)?)
}

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    Build(#[from] BuildError),

    #[error("runtime error: {0}")]
    Runtime(#[from] RuntimeError),
}

/// Read a source file.
pub fn read_source(path: &Path) -> Result<String, CompileError> {
    std::fs::read_to_string(path)
        .map_err(|e| CompileError::io(format!("could not read {}: {e}", path.display()), path.to_path_buf()))
}
