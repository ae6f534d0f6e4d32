//! spanlint CLI
//!
//! Command-line interface for checking frontend dump files for tracing
//! span mistakes.

use clap::{CommandFactory, Parser as ClapParser, Subcommand};
use clap_complete::{Shell, generate};
use std::io;
use std::path::{Path, PathBuf};
use std::process;

use spanlint::diagnostics::format_diagnostics;

#[derive(ClapParser)]
#[command(name = "spanlint")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Check that tracing spans are ended and their error status recorded", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check frontend dump files for span mistakes
    Check {
        /// Input dump files (JSON) or directories to check
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Path to custom check configuration (TOML)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Comma-separated list of checks to enable
        /// (options: end, set-status, record-error)
        #[arg(long)]
        checks: Option<String>,

        /// Comma-separated list of regex for function signatures that
        /// disable checks on errors
        #[arg(long = "ignore-check-signatures")]
        ignore_check_signatures: Option<String>,

        /// Downgrade questionable configuration values to warnings
        #[arg(long)]
        lenient: bool,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() {
    // Set up logging
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Check {
            inputs,
            config,
            checks,
            ignore_check_signatures,
            lenient,
        } => {
            run_check(
                &inputs,
                config.as_deref(),
                checks.as_deref(),
                ignore_check_signatures.as_deref(),
                lenient,
            );
        }
        Commands::Completions { shell } => {
            run_completions(shell);
        }
    }
}

fn run_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "spanlint", &mut io::stdout());
}

fn run_check(
    inputs: &[PathBuf],
    config_path: Option<&Path>,
    checks: Option<&str>,
    ignore_check_signatures: Option<&str>,
    lenient: bool,
) {
    let mut config = match spanlint::load_config(config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading check config: {}", e);
            process::exit(2);
        }
    };
    if let Err(e) = config.apply_cli(checks, ignore_check_signatures, lenient) {
        eprintln!("Error in check config: {}", e);
        process::exit(2);
    }

    let mut all_diagnostics = Vec::new();
    let mut files_checked = 0;
    let mut input_errors = false;

    for path in inputs {
        if path.is_dir() {
            for entry in walkdir(path) {
                if entry.extension().is_some_and(|e| e == "json") {
                    check_dump_file(&entry, &config, &mut all_diagnostics, &mut input_errors);
                    files_checked += 1;
                }
            }
        } else if path.exists() {
            check_dump_file(path, &config, &mut all_diagnostics, &mut input_errors);
            files_checked += 1;
        } else {
            eprintln!("Warning: {} does not exist", path.display());
        }
    }

    if all_diagnostics.is_empty() {
        println!("No span issues found in {} file(s)", files_checked);
    } else {
        print!("{}", format_diagnostics(&all_diagnostics));
        println!(
            "\n{} issue(s) in {} file(s)",
            all_diagnostics.len(),
            files_checked
        );
    }

    if input_errors {
        process::exit(2);
    }
    if !all_diagnostics.is_empty() {
        process::exit(1);
    }
}

fn check_dump_file(
    path: &Path,
    config: &spanlint::CheckConfig,
    diagnostics: &mut Vec<spanlint::Diagnostic>,
    input_errors: &mut bool,
) {
    match spanlint::check_file(path, config) {
        Ok(found) => diagnostics.extend(found),
        Err(e) => {
            eprintln!("Error: {}", e);
            *input_errors = true;
        }
    }
}

/// Simple recursive directory walker with error logging
fn walkdir(dir: &Path) -> Vec<PathBuf> {
    use std::fs;

    let mut files = Vec::new();
    match fs::read_dir(dir) {
        Ok(entries) => {
            for entry in entries {
                match entry {
                    Ok(entry) => {
                        let path = entry.path();
                        if path.is_dir() {
                            files.extend(walkdir(&path));
                        } else {
                            files.push(path);
                        }
                    }
                    Err(e) => {
                        eprintln!(
                            "Warning: Could not read directory entry in {}: {}",
                            dir.display(),
                            e
                        );
                    }
                }
            }
        }
        Err(e) => {
            eprintln!("Warning: Could not read directory {}: {}", dir.display(), e);
        }
    }
    files
}
