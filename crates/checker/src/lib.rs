//! spanlint - tracing-span lifecycle checker
//!
//! Flags functions that create a tracing span but can reach an exit
//! without calling `End` on it, and - when the function can return an
//! error - without calling `SetStatus`/`RecordError` first.
//!
//! Parsing, type resolution, and CFG construction are an external
//! frontend's job; this crate consumes `spanlint_ir` function units
//! (typically JSON dumps, see [`check_file`]) and runs the reachability
//! analysis:
//!
//! ```rust,ignore
//! use spanlint::{CheckConfig, Checker};
//!
//! let config = CheckConfig::default_config();
//! let diagnostics = Checker::new(&config).check_dump(&dump);
//! ```
//!
//! Units are analyzed independently with no shared mutable state, so a
//! `Checker` can be used from any number of threads.

pub mod bindings;
pub mod checks;
pub mod config;
pub mod diagnostics;
pub mod engine;
pub mod matcher;
pub mod search;

#[cfg(test)]
pub(crate) mod testkit;

pub use bindings::{CollectedBindings, SpanBinding};
pub use checks::{CheckKind, ErrorCapability};
pub use config::CheckConfig;
pub use diagnostics::{Diagnostic, Severity, format_diagnostics};
pub use engine::{Checker, EngineError};
pub use matcher::{SignatureMatcher, SpanKind};
pub use search::{SearchPolicy, search};

use std::fs;
use std::path::Path;

use spanlint_ir::Dump;

/// Load a frontend dump file (JSON) and check every unit in it.
pub fn check_file(path: &Path, config: &CheckConfig) -> Result<Vec<Diagnostic>, String> {
    let contents = fs::read_to_string(path)
        .map_err(|e| format!("failed to read dump file {}: {}", path.display(), e))?;
    let dump: Dump = serde_json::from_str(&contents)
        .map_err(|e| format!("failed to parse dump file {}: {}", path.display(), e))?;
    Ok(Checker::new(config).check_dump(&dump))
}

/// Load a configuration file, or the embedded defaults when `path` is
/// `None`.
pub fn load_config(path: Option<&Path>) -> Result<CheckConfig, String> {
    match path {
        None => Ok(CheckConfig::default_config()),
        Some(path) => {
            let contents = fs::read_to_string(path)
                .map_err(|e| format!("failed to read config {}: {}", path.display(), e))?;
            CheckConfig::from_toml(&contents)
        }
    }
}
