//! Diagnostic output types
//!
//! The engine emits positioned diagnostics; how they are transported is the
//! embedder's concern. The CLI formatter here is the only rendering this
//! crate ships.

use std::path::{Path, PathBuf};

use spanlint_ir::Span;

use crate::checks::CheckKind;

/// Severity level for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

impl Severity {
    /// Convert to LSP DiagnosticSeverity number
    pub fn to_lsp_severity(&self) -> u32 {
        match self {
            Severity::Error => 1,
            Severity::Warning => 2,
        }
    }
}

/// A secondary position linked to a diagnostic, e.g. the witness exit for a
/// diagnostic anchored at the span's declaration.
#[derive(Debug, Clone)]
pub struct Related {
    pub message: String,
    pub span: Span,
}

/// One reported finding.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// Check that produced this finding; `None` for the unassigned-span
    /// diagnostic, which precedes any path analysis
    pub check: Option<CheckKind>,
    pub message: String,
    pub severity: Severity,
    /// File the analyzed unit came from
    pub file: PathBuf,
    /// Name of the enclosing function unit
    pub func: String,
    pub span: Span,
    /// Linked secondary position, when the finding has a counterpart
    pub related: Option<Related>,
}

impl Diagnostic {
    pub fn warning(
        check: Option<CheckKind>,
        message: impl Into<String>,
        file: &Path,
        func: &str,
        span: Span,
    ) -> Self {
        Diagnostic {
            check,
            message: message.into(),
            severity: Severity::Warning,
            file: file.to_path_buf(),
            func: func.to_string(),
            span,
            related: None,
        }
    }

    pub fn with_related(mut self, message: impl Into<String>, span: Span) -> Self {
        self.related = Some(Related {
            message: message.into(),
            span,
        });
        self
    }
}

/// Format diagnostics for CLI output
pub fn format_diagnostics(diagnostics: &[Diagnostic]) -> String {
    let mut output = String::new();
    for d in diagnostics {
        let severity_str = match d.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        let check_str = d.check.map(|c| c.name()).unwrap_or("unassigned-span");
        output.push_str(&format!(
            "{}:{}:{}: {} [{}]: {}\n",
            d.file.display(),
            d.span.line + 1,
            d.span.column + 1,
            severity_str,
            check_str,
            d.message
        ));
        if let Some(related) = &d.related {
            output.push_str(&format!(
                "  {}:{}:{}: {}\n",
                d.file.display(),
                related.span.line + 1,
                related.span.column + 1,
                related.message
            ));
        }
    }
    output
}
