use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use specweave::config::Config;
use specweave::diagnostics::{self, CompileError, Diagnostics};
use specweave::interp::{Interpreter, Outcome, Value};
use specweave::BuildError;

#[derive(Parser)]
#[command(name = "specweave", version, about = "Runtime-checked contracts in doc comments")]
struct Cli {
    /// Path to a specweave.toml (defaults to the one next to the source file)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log pass summaries to stderr; repeat for per-declaration detail
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse, type-check and validate every contract clause
    Check {
        /// Source file path
        file: PathBuf,
    },
    /// Run a static method with contract checks woven in
    Run {
        /// Source file path
        file: PathBuf,
        /// Entry point as Class.method
        #[arg(long, default_value = "Main.main")]
        entry: String,
    },
    /// Print the effective specifications as JSON
    Specs {
        /// Source file path
        file: PathBuf,
    },
}

const EXIT_ERROR: i32 = 1;
const EXIT_EXCEPTION: i32 = 2;
const EXIT_VIOLATION: i32 = 3;
const EXIT_RUNTIME: i32 = 4;

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Check { file } => {
            let source = read_or_exit(&file);
            let filename = file.display().to_string();
            match specweave::analyze(&source) {
                Ok((_, plan)) => {
                    report_diagnostics(&source, &filename, &plan.diagnostics);
                    if plan.diagnostics.has_errors() {
                        std::process::exit(EXIT_ERROR);
                    }
                    println!(
                        "{filename}: {} specified member(s), {} soundness note(s)",
                        plan.specs.len(),
                        plan.diagnostics.notes.len()
                    );
                }
                Err(err) => fail(&source, &filename, &err),
            }
        }
        Commands::Run { file, entry } => {
            let source = read_or_exit(&file);
            let filename = file.display().to_string();
            let config = config_or_exit(cli.config.as_deref(), &file);
            let built = match specweave::build(&source, &config.checks) {
                Ok(built) => built,
                Err(BuildError::Compile(err)) => fail(&source, &filename, &err),
                Err(BuildError::Contracts(diags)) => {
                    report_diagnostics(&source, &filename, &diags);
                    std::process::exit(EXIT_ERROR);
                }
            };
            for note in &built.plan.diagnostics.notes {
                diagnostics::render_note(&source, note);
            }

            let mut interpreter = Interpreter::new(&built.program, &config.runtime);
            match interpreter.run(&entry) {
                Ok(Outcome::Returned(Value::Void)) => println!("{entry} completed"),
                Ok(Outcome::Returned(value)) => println!("{entry} returned {value}"),
                Ok(Outcome::Threw { class }) => {
                    eprintln!("error: uncaught {class}");
                    std::process::exit(EXIT_EXCEPTION);
                }
                Ok(Outcome::Violated(violation)) => {
                    let title = format!("{} violated in {}", violation.kind, violation.member);
                    diagnostics::render_failure(&source, &title, &violation.detail, violation.span, violation.site);
                    std::process::exit(EXIT_VIOLATION);
                }
                Err(err) => {
                    eprintln!("error [{filename}]: {err}");
                    std::process::exit(EXIT_RUNTIME);
                }
            }
        }
        Commands::Specs { file } => {
            let source = read_or_exit(&file);
            let filename = file.display().to_string();
            match specweave::analyze(&source) {
                Ok((env, plan)) => {
                    if plan.diagnostics.has_errors() {
                        report_diagnostics(&source, &filename, &plan.diagnostics);
                        std::process::exit(EXIT_ERROR);
                    }
                    match serde_json::to_string_pretty(&plan.report(&env)) {
                        Ok(json) => println!("{json}"),
                        Err(e) => {
                            eprintln!("error: serialization failed: {e}");
                            std::process::exit(EXIT_ERROR);
                        }
                    }
                }
                Err(err) => fail(&source, &filename, &err),
            }
        }
    }
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();
}

fn read_or_exit(file: &Path) -> String {
    match specweave::read_source(file) {
        Ok(source) => source,
        Err(err) => fail("", &file.display().to_string(), &err),
    }
}

fn config_or_exit(explicit: Option<&Path>, file: &Path) -> Config {
    match Config::discover(explicit, file) {
        Ok(config) => config,
        Err(err) => fail("", &file.display().to_string(), &err),
    }
}

fn report_diagnostics(source: &str, filename: &str, diags: &Diagnostics) {
    for diag in &diags.errors {
        diagnostics::render_error(source, filename, &diag.error);
    }
    for note in &diags.notes {
        diagnostics::render_note(source, note);
    }
}

fn fail(source: &str, filename: &str, err: &CompileError) -> ! {
    diagnostics::render_error(source, filename, err);
    std::process::exit(EXIT_ERROR);
}
