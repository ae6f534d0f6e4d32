//! Span-start signature matching
//!
//! Decides whether a call expression creates a span, and which tracing API
//! family it came from. Rules are `(regex, family)` pairs matched against
//! the call's fully qualified target; the first match wins. The built-in
//! rules recognize the OpenTelemetry and OpenCensus start calls; user
//! rules from configuration are appended after them.

use regex::Regex;

/// Tracing API family a start call belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanKind {
    OpenTelemetry,
    OpenCensus,
}

impl SpanKind {
    pub fn name(&self) -> &'static str {
        match self {
            SpanKind::OpenTelemetry => "opentelemetry",
            SpanKind::OpenCensus => "opencensus",
        }
    }

    /// Parse a configuration kind tag. Unknown tags are a configuration
    /// error; the caller decides whether that is fatal (strict) or skipped
    /// (lenient).
    pub fn parse(s: &str) -> Result<Self, String> {
        match s {
            "opentelemetry" => Ok(SpanKind::OpenTelemetry),
            "opencensus" => Ok(SpanKind::OpenCensus),
            other => Err(format!(
                "unknown span kind '{}' (options: opentelemetry, opencensus)",
                other
            )),
        }
    }
}

/// Default rule patterns, in match order.
const DEFAULT_RULES: &[(&str, SpanKind)] = &[
    (
        r"\(go\.opentelemetry\.io/otel/trace\.Tracer\)\.Start$",
        SpanKind::OpenTelemetry,
    ),
    (
        r"go\.opencensus\.io/trace\.StartSpan(WithRemoteParent)?$",
        SpanKind::OpenCensus,
    ),
];

/// One compiled start rule.
#[derive(Debug, Clone)]
struct StartRule {
    pattern: Regex,
    kind: SpanKind,
    /// Built-in rules follow the `ctx, span := start(...)` convention and
    /// only ever bind the second assignment target; user rules may wrap
    /// helpers that return just the span.
    builtin: bool,
}

/// The result of matching a call target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartMatch {
    pub kind: SpanKind,
    pub builtin: bool,
}

/// Table of span-start rules.
#[derive(Debug, Clone)]
pub struct SignatureMatcher {
    rules: Vec<StartRule>,
}

impl Default for SignatureMatcher {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl SignatureMatcher {
    /// Matcher with only the built-in rules.
    pub fn with_defaults() -> Self {
        let rules = DEFAULT_RULES
            .iter()
            .map(|(pattern, kind)| StartRule {
                // Compile-time constants; a failure here is a bug in this table.
                pattern: Regex::new(pattern).expect("invalid built-in span-start pattern"),
                kind: *kind,
                builtin: true,
            })
            .collect();
        SignatureMatcher { rules }
    }

    /// Matcher with no rules at all, for configurations that replace the
    /// defaults outright.
    pub fn empty() -> Self {
        SignatureMatcher { rules: Vec::new() }
    }

    /// Append a user-supplied rule.
    pub fn push_rule(&mut self, pattern: &str, kind: SpanKind) -> Result<(), String> {
        let pattern = Regex::new(pattern)
            .map_err(|e| format!("invalid span-start pattern '{}': {}", pattern, e))?;
        self.rules.push(StartRule {
            pattern,
            kind,
            builtin: false,
        });
        Ok(())
    }

    /// First rule matching the qualified call target, or `None`.
    pub fn match_target(&self, target: &str) -> Option<StartMatch> {
        if target.is_empty() {
            return None;
        }
        self.rules
            .iter()
            .find(|r| r.pattern.is_match(target))
            .map(|r| StartMatch {
                kind: r.kind,
                builtin: r.builtin,
            })
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }
}
