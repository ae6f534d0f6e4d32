//! Span binding collection
//!
//! Finds, for one function unit, every span-start call and the variable it
//! binds. The walk covers the unit's own statements only: closure bodies
//! are separate units and are skipped entirely here (the search's
//! one-level defer rule does not apply to collection).
//!
//! Start calls that bind nothing - bare calls, or a discarded second
//! target - are reported immediately and never reach path analysis.
//! Variables resolved to an enclosing scope are skipped silently; they
//! belong to the enclosing unit's analysis.

use std::path::Path;

use spanlint_ir::{AssignTarget, FuncUnit, NodeId, NodeKind, VarId};

use crate::diagnostics::Diagnostic;
use crate::matcher::{SignatureMatcher, SpanKind};

/// Message for a span that is created but never bound to a variable.
pub const MSG_UNASSIGNED: &str = "span is unassigned, probable memory leak";

/// A tracked span variable and the statement that binds it.
#[derive(Debug, Clone)]
pub struct SpanBinding {
    /// The assignment node that declares the span
    pub stmt: NodeId,
    /// Identifier name, for messages
    pub name: String,
    /// Declared variable identity
    pub var: VarId,
    /// Tracing API family that produced the span
    pub kind: SpanKind,
}

/// Result of collecting one unit.
#[derive(Debug, Default)]
pub struct CollectedBindings {
    pub bindings: Vec<SpanBinding>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Which assignment target a matched start call binds.
///
/// The built-in families follow the `ctx, span := start(...)` convention:
/// the span is the second target, and a single-target form binds nothing.
/// User-supplied rules commonly wrap helpers returning only the span, so
/// they fall back to the sole target.
pub(crate) fn binding_target(targets: &[AssignTarget], builtin: bool) -> Option<&AssignTarget> {
    match targets.len() {
        0 => None,
        1 => {
            if builtin {
                None
            } else {
                Some(&targets[0])
            }
        }
        _ => Some(&targets[1]),
    }
}

/// Collect the span bindings of one unit.
pub fn collect(unit: &FuncUnit, matcher: &SignatureMatcher, file: &Path) -> CollectedBindings {
    let mut collector = Collector {
        unit,
        matcher,
        file,
        out: CollectedBindings::default(),
    };
    for &stmt in &unit.body {
        collector.walk(stmt);
    }
    collector.out
}

struct Collector<'a> {
    unit: &'a FuncUnit,
    matcher: &'a SignatureMatcher,
    file: &'a Path,
    out: CollectedBindings,
}

impl Collector<'_> {
    fn walk(&mut self, id: NodeId) {
        let unit = self.unit;
        match &unit.node(id).kind {
            NodeKind::Assign { targets, value } => {
                if !self.try_bind(id, targets, *value) {
                    self.walk(*value);
                }
            }
            NodeKind::Call(call) => {
                // A matched start call not directly under an assignment
                // discards its span.
                if self.matcher.match_target(&call.target).is_some() {
                    self.report_unassigned(id);
                }
                if let Some(callee) = call.callee {
                    self.walk(callee);
                }
                for &arg in &call.args {
                    self.walk(arg);
                }
            }
            NodeKind::Return { results } => {
                for &r in results {
                    self.walk(r);
                }
            }
            NodeKind::Defer { call } => self.walk(*call),
            NodeKind::Closure { .. } => {
                // Closure bodies are their own units.
            }
            NodeKind::Ident(_) => {}
            NodeKind::Other { children } => {
                for &c in children {
                    self.walk(c);
                }
            }
        }
    }

    /// Handle an assignment whose value is a start call. Returns true when
    /// the value was consumed (matched), whether or not a binding resulted.
    fn try_bind(&mut self, stmt: NodeId, targets: &[AssignTarget], value: NodeId) -> bool {
        let unit = self.unit;
        let NodeKind::Call(call) = &unit.node(value).kind else {
            return false;
        };
        let Some(hit) = self.matcher.match_target(&call.target) else {
            return false;
        };

        match binding_target(targets, hit.builtin) {
            None => self.report_unassigned(value),
            Some(AssignTarget::Discard { span }) => {
                self.out.diagnostics.push(Diagnostic::warning(
                    None,
                    MSG_UNASSIGNED,
                    self.file,
                    &self.unit.name,
                    *span,
                ));
            }
            Some(AssignTarget::Ident(ident)) => {
                let Some(var) = ident.var else {
                    // Unresolved target; nothing to track.
                    return true;
                };
                if !self.unit.local_vars.contains(&var) {
                    // Declared in an enclosing scope; owned by that
                    // unit's analysis.
                    return true;
                }
                // One binding per textually distinct declaration: later
                // matched assignments of the same variable are reset
                // events, handled by the search.
                if self.out.bindings.iter().all(|b| b.var != var) {
                    self.out.bindings.push(SpanBinding {
                        stmt,
                        name: ident.name.clone(),
                        var,
                        kind: hit.kind,
                    });
                }
            }
        }
        true
    }

    fn report_unassigned(&mut self, at: NodeId) {
        self.out.diagnostics.push(Diagnostic::warning(
            None,
            MSG_UNASSIGNED,
            self.file,
            &self.unit.name,
            self.unit.node(at).span,
        ));
    }
}
