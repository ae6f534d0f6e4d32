//! Check kinds, exit classification, and requirement policy
//!
//! Each check is one row of a closed table: its configuration name, the
//! method selector that discharges it, whether it only applies to
//! functions that can return an error, and whether it is on by default.
//! New checks extend the table; nothing else in the traversal changes.

use spanlint_ir::FuncUnit;

use crate::config::CheckConfig;

/// A span-lifecycle check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckKind {
    /// `span.End()` must be called on every path
    End,
    /// `span.SetStatus(codes.Error, ...)` must be called before returning an error
    SetStatus,
    /// `span.RecordError(err)` must be called before returning an error
    RecordError,
}

impl CheckKind {
    pub const ALL: [CheckKind; 3] = [CheckKind::End, CheckKind::SetStatus, CheckKind::RecordError];

    /// Configuration name of the check.
    pub fn name(self) -> &'static str {
        match self {
            CheckKind::End => "end",
            CheckKind::SetStatus => "set-status",
            CheckKind::RecordError => "record-error",
        }
    }

    /// Method selector whose call on the span variable discharges the check.
    pub fn selector(self) -> &'static str {
        match self {
            CheckKind::End => "End",
            CheckKind::SetStatus => "SetStatus",
            CheckKind::RecordError => "RecordError",
        }
    }

    /// Whether the check only applies when the function can return an
    /// error, and only error-returning exits count as witnesses.
    pub fn error_gated(self) -> bool {
        match self {
            CheckKind::End => false,
            CheckKind::SetStatus | CheckKind::RecordError => true,
        }
    }

    pub fn default_enabled(self) -> bool {
        matches!(self, CheckKind::End)
    }

    /// Parse a configuration check name. Unknown names fail loud.
    pub fn parse(s: &str) -> Result<Self, String> {
        CheckKind::ALL
            .into_iter()
            .find(|c| c.name() == s)
            .ok_or_else(|| {
                let options: Vec<&str> = CheckKind::ALL.iter().map(|c| c.name()).collect();
                format!("invalid check '{}' (options: {})", s, options.join(", "))
            })
    }
}

/// Whether a function's result list can carry an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCapability {
    /// At least one declared result slot is error-capable
    Yes,
    /// The signature is resolved and no result slot is error-capable
    No,
    /// The frontend could not resolve the signature; error-gated checks
    /// are skipped rather than guessed at
    Unknown,
}

/// Classify a unit's result list.
pub fn classify_results(unit: &FuncUnit) -> ErrorCapability {
    match &unit.results {
        None => ErrorCapability::Unknown,
        Some(slots) => {
            if slots.iter().any(|s| s.error_capable) {
                ErrorCapability::Yes
            } else {
                ErrorCapability::No
            }
        }
    }
}

/// Whether `check` runs at all for `unit` under `config`.
///
/// Combines the global enable set, the error gate, and the per-function
/// exemption (ignore-signature regex matched against the unit's full
/// declaration text). The end check is never exempted: an unreleased span
/// is a leak regardless of convention.
pub fn check_active(check: CheckKind, unit: &FuncUnit, config: &CheckConfig) -> bool {
    if !config.enabled.contains(&check) {
        return false;
    }
    if !check.error_gated() {
        return true;
    }
    match classify_results(unit) {
        ErrorCapability::Yes => {}
        ErrorCapability::No => return false,
        ErrorCapability::Unknown => {
            tracing::debug!(
                func = %unit.name,
                check = check.name(),
                "signature unresolved, skipping error-gated check"
            );
            return false;
        }
    }
    if let Some(ignore) = &config.ignore_signatures
        && ignore.is_match(&unit.signature)
    {
        tracing::debug!(
            func = %unit.name,
            check = check.name(),
            "signature matches ignore rule, check exempt"
        );
        return false;
    }
    true
}
