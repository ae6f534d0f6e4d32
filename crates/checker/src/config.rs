//! Checker configuration
//!
//! - `CheckConfig` - validated, compiled configuration threaded into every
//!   entry point (no process-wide state)
//! - `RawConfig` - the TOML shape, overlaid onto the embedded defaults
//!
//! Unknown check names are always fatal. Regex problems and unknown span
//! kinds are fatal in strict mode; lenient mode downgrades them to a
//! warning and drops the offending value.

use regex::Regex;
use serde::Deserialize;

use crate::checks::CheckKind;
use crate::matcher::{SignatureMatcher, SpanKind};

/// Embedded default configuration
pub static DEFAULT_CHECKS: &str = include_str!("checks.toml");

/// The TOML configuration shape. Absent fields keep the base value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    checks: Option<Vec<String>>,
    #[serde(default, rename = "ignore-check-signatures")]
    ignore_check_signatures: Option<Vec<String>>,
    #[serde(default, rename = "start-matcher")]
    start_matchers: Vec<RawMatcher>,
    #[serde(default, rename = "replace-default-matchers")]
    replace_default_matchers: bool,
    #[serde(default)]
    strict: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawMatcher {
    pattern: String,
    kind: String,
}

/// Validated checker configuration.
#[derive(Debug, Clone)]
pub struct CheckConfig {
    /// Checks to run
    pub enabled: Vec<CheckKind>,
    /// OR-joined exemption matcher for the error-gated checks
    pub ignore_signatures: Option<Regex>,
    /// Span-start rule table
    pub matcher: SignatureMatcher,
    /// Fail loud on questionable configuration values
    pub strict: bool,
}

impl CheckConfig {
    /// The embedded default configuration.
    pub fn default_config() -> Self {
        CheckConfig {
            enabled: CheckKind::ALL
                .into_iter()
                .filter(|c| c.default_enabled())
                .collect(),
            ignore_signatures: None,
            matcher: SignatureMatcher::with_defaults(),
            strict: true,
        }
    }

    /// Every check enabled, defaults otherwise. Test and tooling helper.
    pub fn all_checks() -> Self {
        CheckConfig {
            enabled: CheckKind::ALL.to_vec(),
            ..Self::default_config()
        }
    }

    /// Parse a TOML configuration string, overlaying the defaults.
    pub fn from_toml(toml_str: &str) -> Result<Self, String> {
        let raw: RawConfig = toml::from_str(toml_str)
            .map_err(|e| format!("failed to parse check config: {}", e))?;
        let mut config = Self::default_config();
        config.apply_raw(raw)?;
        Ok(config)
    }

    fn apply_raw(&mut self, raw: RawConfig) -> Result<(), String> {
        if let Some(strict) = raw.strict {
            self.strict = strict;
        }

        if let Some(names) = raw.checks {
            let mut enabled = Vec::new();
            for name in &names {
                let name = name.trim();
                if name.is_empty() {
                    continue;
                }
                let check = CheckKind::parse(name)?;
                if !enabled.contains(&check) {
                    enabled.push(check);
                }
            }
            if enabled.is_empty() {
                return Err("no checks enabled".to_string());
            }
            self.enabled = enabled;
        }

        if let Some(sigs) = raw.ignore_check_signatures {
            self.set_ignore_signatures(&sigs)?;
        }

        if raw.replace_default_matchers {
            self.matcher = SignatureMatcher::empty();
        }
        for rule in raw.start_matchers {
            let kind = match SpanKind::parse(&rule.kind) {
                Ok(kind) => kind,
                Err(e) if self.strict => return Err(e),
                Err(e) => {
                    tracing::warn!("skipping start-matcher: {}", e);
                    continue;
                }
            };
            match self.matcher.push_rule(&rule.pattern, kind) {
                Ok(()) => {}
                Err(e) if self.strict => return Err(e),
                Err(e) => tracing::warn!("skipping start-matcher: {}", e),
            }
        }
        if self.matcher.rule_count() == 0 {
            return Err("no span-start matchers configured".to_string());
        }

        Ok(())
    }

    /// Compile and install the ignore-signature regex list, OR-joined into
    /// a single matcher. An empty list clears it.
    pub fn set_ignore_signatures(&mut self, sigs: &[String]) -> Result<(), String> {
        let sigs: Vec<&str> = sigs
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect();
        if sigs.is_empty() {
            self.ignore_signatures = None;
            return Ok(());
        }

        let joined = format!("({})", sigs.join("|"));
        match Regex::new(&joined) {
            Ok(regex) => {
                self.ignore_signatures = Some(regex);
                Ok(())
            }
            Err(e) if self.strict => Err(format!(
                "invalid ignore-check-signatures regex '{}': {}",
                joined, e
            )),
            Err(e) => {
                tracing::warn!(regex = %joined, "failed to compile ignore-check-signatures, matcher disabled: {}", e);
                self.ignore_signatures = None;
                Ok(())
            }
        }
    }

    /// Apply CLI overrides on top of the file configuration. Values are
    /// comma-separated.
    pub fn apply_cli(
        &mut self,
        checks: Option<&str>,
        ignore_signatures: Option<&str>,
        lenient: bool,
    ) -> Result<(), String> {
        if lenient {
            self.strict = false;
        }
        let raw = RawConfig {
            checks: checks.map(|s| s.split(',').map(str::to_string).collect()),
            ignore_check_signatures: ignore_signatures
                .map(|s| s.split(',').map(str::to_string).collect()),
            ..RawConfig::default()
        };
        self.apply_raw(raw)
    }
}
