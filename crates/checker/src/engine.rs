//! Analysis driver
//!
//! Runs the pipeline for each function unit: collect bindings, decide the
//! active checks, search per (binding, check) pair, and turn witnesses
//! into diagnostics. Units are independent; an internal consistency
//! failure in one unit is logged and the batch continues.

use std::fmt;
use std::path::Path;

use spanlint_ir::{Dump, FuncUnit};

use crate::bindings::{self, SpanBinding};
use crate::checks::{self, CheckKind};
use crate::config::CheckConfig;
use crate::diagnostics::Diagnostic;
use crate::search::{SearchPolicy, search};

/// Internal consistency failures. These abort one unit's analysis, never
/// the whole run, and are not user-facing findings.
#[derive(Debug)]
pub enum EngineError {
    /// A binding's declaring statement was not found in its own CFG
    MissingDefiningBlock { func: String, var: String },
    /// A unit's arena or CFG references ids out of range
    MalformedUnit { func: String, reason: String },
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::MissingDefiningBlock { func, var } => write!(
                f,
                "internal error: defining block for span var '{}' not found in CFG of '{}'",
                var, func
            ),
            EngineError::MalformedUnit { func, reason } => {
                write!(f, "malformed unit '{}': {}", func, reason)
            }
        }
    }
}

impl std::error::Error for EngineError {}

/// The span checker. Holds no state beyond its configuration; units can be
/// checked from any number of threads with a shared `Checker`.
pub struct Checker<'a> {
    config: &'a CheckConfig,
}

impl<'a> Checker<'a> {
    pub fn new(config: &'a CheckConfig) -> Self {
        Checker { config }
    }

    /// Check every unit of a dump. Per-unit internal errors are logged and
    /// skipped so one malformed unit cannot take down the batch.
    pub fn check_dump(&self, dump: &Dump) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        for unit in &dump.functions {
            match self.check_unit(unit, &dump.file) {
                Ok(found) => diagnostics.extend(found),
                Err(e) => {
                    tracing::error!(file = %dump.file.display(), func = %unit.name, "{}", e);
                }
            }
        }
        diagnostics
    }

    /// Check one function unit.
    pub fn check_unit(
        &self,
        unit: &FuncUnit,
        file: &Path,
    ) -> Result<Vec<Diagnostic>, EngineError> {
        unit.validate().map_err(|reason| EngineError::MalformedUnit {
            func: unit.name.clone(),
            reason,
        })?;

        let collected = bindings::collect(unit, &self.config.matcher, file);
        let mut diagnostics = collected.diagnostics;

        if collected.bindings.is_empty() {
            return Ok(diagnostics); // no need to inspect the CFG
        }

        for binding in &collected.bindings {
            for &check in &self.config.enabled {
                if !checks::check_active(check, unit, self.config) {
                    continue;
                }

                let policy = SearchPolicy {
                    selector: check.selector(),
                    error_gated: check.error_gated(),
                    discharge: if check.error_gated() {
                        self.config.ignore_signatures.as_ref()
                    } else {
                        None
                    },
                    matcher: &self.config.matcher,
                };

                if let Some(witness) = search(unit, binding, &policy)? {
                    self.report(unit, file, binding, check, witness, &mut diagnostics);
                }
            }
        }

        Ok(diagnostics)
    }

    /// Two cross-linked diagnostics per witness: one at the binding, one
    /// at the offending exit.
    fn report(
        &self,
        unit: &FuncUnit,
        file: &Path,
        binding: &SpanBinding,
        check: CheckKind,
        witness: spanlint_ir::NodeId,
        diagnostics: &mut Vec<Diagnostic>,
    ) {
        let decl_span = unit.node(binding.stmt).span;
        let witness_span = unit.node(witness).span;
        let reach_msg = format!(
            "this return statement may be reached without calling {}.{}",
            binding.name,
            check.selector()
        );

        let binding_msg = match check {
            CheckKind::End => format!(
                "{}.End is not called on all paths, possible memory leak",
                binding.name
            ),
            CheckKind::SetStatus | CheckKind::RecordError => format!(
                "{}.{} is not called on all paths",
                binding.name,
                check.selector()
            ),
        };

        diagnostics.push(
            Diagnostic::warning(Some(check), binding_msg, file, &unit.name, decl_span)
                .with_related(reach_msg.clone(), witness_span),
        );
        diagnostics.push(
            Diagnostic::warning(Some(check), reach_msg, file, &unit.name, witness_span)
                .with_related(format!("{} started here", binding.name), decl_span),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindings::MSG_UNASSIGNED;
    use crate::testkit::{Tgt, UnitBuilder};
    use spanlint_ir::{NodeId, VarId};
    use std::path::PathBuf;

    const CTX: VarId = 0;
    const SPAN: VarId = 1;

    fn bind_stmt(b: &mut UnitBuilder) -> NodeId {
        let start = b.start_otel();
        b.assign(vec![Tgt::Var(CTX, "ctx"), Tgt::Var(SPAN, "span")], start)
    }

    fn check(unit: &FuncUnit, config: &CheckConfig) -> Vec<Diagnostic> {
        Checker::new(config)
            .check_unit(unit, Path::new("test.go"))
            .unwrap()
    }

    #[test]
    fn test_scenario_unassigned_start() {
        // func() { start() } - exactly one diagnostic, no search.
        let mut b = UnitBuilder::new("f");
        let start = b.start_otel();
        let stmt = b.expr_stmt(start);
        b.body(vec![stmt]);
        // Deliberately no CFG: collection must not need one.
        let unit = b.build();

        let config = CheckConfig::default_config();
        let diagnostics = check(&unit, &config);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].message, MSG_UNASSIGNED);
        assert!(diagnostics[0].check.is_none());
    }

    #[test]
    fn test_scenario_missing_end_two_diagnostics() {
        // func() { ctx, span := start(); use(ctx) } with a trailing return.
        let mut b = UnitBuilder::new("f");
        let bind = bind_stmt(&mut b);
        let use_call = b.helper_call("pkg.use", vec![]);
        let use_stmt = b.expr_stmt(use_call);
        let ret = b.ret_nil();
        b.body(vec![bind, use_stmt, ret]);
        b.single_block();
        let unit = b.build();

        let config = CheckConfig::default_config();
        let diagnostics = check(&unit, &config);
        assert_eq!(diagnostics.len(), 2);

        let binding_diag = &diagnostics[0];
        assert_eq!(
            binding_diag.message,
            "span.End is not called on all paths, possible memory leak"
        );
        assert_eq!(binding_diag.span, unit.node(bind).span);
        assert_eq!(
            binding_diag.related.as_ref().unwrap().span,
            unit.node(ret).span
        );

        let witness_diag = &diagnostics[1];
        assert_eq!(
            witness_diag.message,
            "this return statement may be reached without calling span.End"
        );
        assert_eq!(witness_diag.span, unit.node(ret).span);
    }

    #[test]
    fn test_scenario_deferred_end_clean() {
        let mut b = UnitBuilder::new("f");
        let bind = bind_stmt(&mut b);
        let deferred = b.defer_method(SPAN, "span", "End");
        let ret = b.ret_nil();
        b.body(vec![bind, deferred, ret]);
        b.single_block();
        let unit = b.build();

        let config = CheckConfig::default_config();
        assert!(check(&unit, &config).is_empty());
    }

    #[test]
    fn test_scenario_set_status_witness_only_on_error_return() {
        // func() error { bind; defer End; if cond { return err }; return nil }
        let mut b = UnitBuilder::new("f").returns_error();
        let bind = bind_stmt(&mut b);
        let deferred = b.defer_method(SPAN, "span", "End");
        let ret_err = b.ret_err();
        let ret_nil = b.ret_nil();
        b.body(vec![bind, deferred, ret_err, ret_nil]);
        b.block(vec![bind, deferred], vec![1, 2], None);
        b.block(vec![ret_err], vec![], Some(ret_err));
        b.block(vec![ret_nil], vec![], Some(ret_nil));
        let unit = b.build();

        let mut config = CheckConfig::default_config();
        config.enabled = vec![CheckKind::End, CheckKind::SetStatus];

        let diagnostics = check(&unit, &config);
        // End is satisfied; SetStatus produces the cross-linked pair, and
        // its witness is the error-returning exit only.
        assert_eq!(diagnostics.len(), 2);
        assert!(
            diagnostics
                .iter()
                .all(|d| d.check == Some(CheckKind::SetStatus))
        );
        assert_eq!(diagnostics[1].span, unit.node(ret_err).span);
    }

    #[test]
    fn test_gated_checks_never_fire_without_error_results() {
        let mut b = UnitBuilder::new("f"); // resolved, no error result
        let bind = bind_stmt(&mut b);
        let ret = b.ret_nil();
        b.body(vec![bind, ret]);
        b.single_block();
        let unit = b.build();

        let config = CheckConfig::all_checks();
        let diagnostics = check(&unit, &config);
        // Only the end pair; set-status/record-error are gated off.
        assert_eq!(diagnostics.len(), 2);
        assert!(diagnostics.iter().all(|d| d.check == Some(CheckKind::End)));
    }

    #[test]
    fn test_unresolved_signature_fails_open() {
        let mut b = UnitBuilder::new("f").no_type_info();
        let bind = bind_stmt(&mut b);
        let ret = b.ret_err();
        b.body(vec![bind, ret]);
        b.single_block();
        let unit = b.build();

        let config = CheckConfig::all_checks();
        let diagnostics = check(&unit, &config);
        // end still runs; the error-gated checks are skipped, not guessed.
        assert_eq!(diagnostics.len(), 2);
        assert!(diagnostics.iter().all(|d| d.check == Some(CheckKind::End)));
    }

    #[test]
    fn test_function_signature_exemption_suppresses_gated_pair() {
        let mut b = UnitBuilder::new("record")
            .signature("func telemetry.Record(span trace.Span, err error) error")
            .returns_error();
        let bind = bind_stmt(&mut b);
        let deferred = b.defer_method(SPAN, "span", "End");
        let ret = b.ret_err();
        b.body(vec![bind, deferred, ret]);
        b.single_block();
        let unit = b.build();

        let mut config = CheckConfig::all_checks();
        config
            .set_ignore_signatures(&["telemetry\\.Record".to_string()])
            .unwrap();

        assert!(check(&unit, &config).is_empty());
    }

    #[test]
    fn test_record_error_and_set_status_fire_independently() {
        // SetStatus is called on the error path, RecordError is not.
        let mut b = UnitBuilder::new("f").returns_error();
        let bind = bind_stmt(&mut b);
        let deferred = b.defer_method(SPAN, "span", "End");
        let set_status = b.method_call(SPAN, "span", "SetStatus");
        let set_status_stmt = b.expr_stmt(set_status);
        let ret_err = b.ret_err();
        let ret_nil = b.ret_nil();
        b.body(vec![bind, deferred, set_status_stmt, ret_err, ret_nil]);
        b.block(vec![bind, deferred], vec![1, 2], None);
        b.block(vec![set_status_stmt, ret_err], vec![], Some(ret_err));
        b.block(vec![ret_nil], vec![], Some(ret_nil));
        let unit = b.build();

        let config = CheckConfig::all_checks();
        let diagnostics = check(&unit, &config);
        assert_eq!(diagnostics.len(), 2);
        assert!(
            diagnostics
                .iter()
                .all(|d| d.check == Some(CheckKind::RecordError))
        );
    }

    #[test]
    fn test_malformed_unit_is_sandboxed_in_dump() {
        // First unit's CFG omits the binding statement; second is fine.
        let mut bad = UnitBuilder::new("bad");
        let bind = bind_stmt(&mut bad);
        let ret = bad.ret_nil();
        bad.body(vec![bind, ret]);
        bad.block(vec![ret], vec![], Some(ret));
        let bad = bad.build();

        let mut good = UnitBuilder::new("good");
        let bind = bind_stmt(&mut good);
        let ret = good.ret_nil();
        good.body(vec![bind, ret]);
        good.single_block();
        let good = good.build();

        let dump = Dump {
            file: PathBuf::from("test.go"),
            functions: vec![bad, good],
        };

        let config = CheckConfig::default_config();
        let diagnostics = Checker::new(&config).check_dump(&dump);
        // The good unit still reports its missing End.
        assert_eq!(diagnostics.len(), 2);
        assert!(diagnostics.iter().all(|d| d.func == "good"));
    }

    #[test]
    fn test_dangling_arena_reference_is_sandboxed() {
        let mut b = UnitBuilder::new("f");
        let bind = bind_stmt(&mut b);
        b.body(vec![bind]);
        // CFG points at a node that does not exist.
        b.block(vec![99], vec![], None);
        let unit = b.build();

        let config = CheckConfig::default_config();
        let err = Checker::new(&config)
            .check_unit(&unit, Path::new("test.go"))
            .unwrap_err();
        assert!(matches!(err, EngineError::MalformedUnit { .. }));

        // In a dump it is skipped, not fatal.
        let dump = Dump {
            file: PathBuf::from("test.go"),
            functions: vec![unit],
        };
        assert!(Checker::new(&config).check_dump(&dump).is_empty());
    }

    #[test]
    fn test_engine_error_display() {
        let e = EngineError::MissingDefiningBlock {
            func: "f".to_string(),
            var: "span".to_string(),
        };
        let msg = e.to_string();
        assert!(msg.contains("internal error"), "{msg}");
        assert!(msg.contains("span"), "{msg}");
    }
}
