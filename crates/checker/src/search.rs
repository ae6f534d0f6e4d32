//! CFG reachability search
//!
//! The core question: starting from the statement that binds a span, can a
//! function exit be reached without the required operation happening on
//! that span? The search answers it per (binding, check) pair:
//!
//! 1. Find the binding's defining block (its absence is an internal
//!    consistency failure, not a finding).
//! 2. If the remainder of the defining block satisfies the obligation, the
//!    binding is satisfied without any traversal.
//! 3. If the defining block itself exits, that exit is the witness.
//! 4. Otherwise search successors depth-first. A block containing a
//!    satisfying use prunes its entire branch; the first reachable exit in
//!    an unsatisfied block is returned as the witness. A visited set keyed
//!    by block id bounds the walk on cyclic graphs, and per-block
//!    satisfaction is memoized since blocks are shared across paths.
//!
//! Satisfying-use scanning recognizes `span.Sel(...)` on the tracked
//! variable, discharging helper calls admitted by the policy, and
//! re-binding: a start call reassigning the tracked variable clears any
//! use found earlier in the scanned sequence, so only uses that follow the
//! newest start count. Closure bodies are scanned one level deep - enough
//! for `defer func() { span.End() }()` - and no further.

use std::collections::{HashMap, HashSet};

use regex::Regex;
use spanlint_ir::{AssignTarget, BlockId, FuncUnit, NodeId, NodeKind, VarId};

use crate::bindings::{SpanBinding, binding_target};
use crate::engine::EngineError;
use crate::matcher::SignatureMatcher;

/// How deep satisfying-use scanning follows closure literals.
pub(crate) const MAX_CLOSURE_DEPTH: usize = 1;

/// Whether scanning at `depth` may step into another closure body.
pub(crate) fn may_enter_closure(depth: usize) -> bool {
    depth < MAX_CLOSURE_DEPTH
}

/// What counts as satisfying, and what counts as a witness, for one check.
#[derive(Debug)]
pub struct SearchPolicy<'a> {
    /// Method selector that discharges the obligation, e.g. "End"
    pub selector: &'a str,
    /// Only error-returning exits are witnesses
    pub error_gated: bool,
    /// A call matching this and passing the tracked variable also
    /// discharges the obligation (helper exemption)
    pub discharge: Option<&'a Regex>,
    /// Start-rule table, for recognizing re-binding
    pub matcher: &'a SignatureMatcher,
}

/// Whether an assignment re-binds `var` to a fresh span.
pub(crate) fn is_reassignment(
    unit: &FuncUnit,
    matcher: &SignatureMatcher,
    targets: &[AssignTarget],
    value: NodeId,
    var: VarId,
) -> bool {
    let NodeKind::Call(call) = &unit.node(value).kind else {
        return false;
    };
    let Some(hit) = matcher.match_target(&call.target) else {
        return false;
    };
    matches!(
        binding_target(targets, hit.builtin),
        Some(AssignTarget::Ident(ident)) if ident.var == Some(var)
    )
}

/// Whether a return node actually returns an error-capable value, directly
/// or through a call whose result tuple carries one.
pub(crate) fn returns_error_value(unit: &FuncUnit, ret: NodeId) -> bool {
    let NodeKind::Return { results } = &unit.node(ret).kind else {
        return false;
    };
    results.iter().any(|&r| {
        let node = unit.node(r);
        node.error_capable
            || matches!(
                &node.kind,
                NodeKind::Call(call) if call.result_error_capable.iter().any(|&e| e)
            )
    })
}

/// Search one (binding, check) pair. `Ok(None)` means satisfied;
/// `Ok(Some(id))` is the witness exit node.
pub fn search(
    unit: &FuncUnit,
    binding: &SpanBinding,
    policy: &SearchPolicy,
) -> Result<Option<NodeId>, EngineError> {
    // Locate the defining block and the statements after the declaration.
    let mut def = None;
    'outer: for (bid, block) in unit.cfg.blocks.iter().enumerate() {
        for (i, &n) in block.nodes.iter().enumerate() {
            if n == binding.stmt {
                def = Some((bid as BlockId, i));
                break 'outer;
            }
        }
    }
    let Some((def_block, def_idx)) = def else {
        return Err(EngineError::MissingDefiningBlock {
            func: unit.name.clone(),
            var: binding.name.clone(),
        });
    };

    let mut searcher = Searcher {
        unit,
        policy,
        binding_var: binding.var,
        seen: HashSet::new(),
        memo: HashMap::new(),
    };

    let block = unit.cfg.block(def_block);

    // Satisfied in the remainder of the defining block?
    if searcher.uses_call(&block.nodes[def_idx + 1..]) {
        return Ok(None);
    }

    // Does the defining block exit without a satisfying use?
    if let Some(ret) = block.ret {
        return Ok(searcher.is_witness(ret).then_some(ret));
    }

    Ok(searcher.dfs(&block.succs))
}

struct Searcher<'a> {
    unit: &'a FuncUnit,
    policy: &'a SearchPolicy<'a>,
    binding_var: VarId,
    /// Blocks already inspected this search; bounds cyclic graphs
    seen: HashSet<BlockId>,
    /// Per-block "contains a satisfying use", shared across paths
    memo: HashMap<BlockId, bool>,
}

impl<'a> Searcher<'a> {
    fn dfs(&mut self, succs: &[BlockId]) -> Option<NodeId> {
        let unit = self.unit;
        for &b in succs {
            if !self.seen.insert(b) {
                continue;
            }

            // A satisfying block prunes every path through it.
            if self.block_uses(b) {
                continue;
            }

            let block = unit.cfg.block(b);
            if let Some(ret) = block.ret
                && self.is_witness(ret)
            {
                tracing::debug!(block = b, "found path to unguarded exit");
                return Some(ret);
            }

            if let Some(found) = self.dfs(&block.succs) {
                return Some(found);
            }
        }
        None
    }

    fn block_uses(&mut self, b: BlockId) -> bool {
        if let Some(&res) = self.memo.get(&b) {
            return res;
        }
        let res = self.uses_call(&self.unit.cfg.block(b).nodes);
        self.memo.insert(b, res);
        res
    }

    /// Forward scan of a statement sequence. Re-binding the tracked
    /// variable invalidates any use found so far; the final state decides.
    fn uses_call(&self, stmts: &[NodeId]) -> bool {
        let mut found = false;
        for &stmt in stmts {
            self.scan(stmt, 0, &mut found);
        }
        found
    }

    fn scan(&self, id: NodeId, depth: usize, found: &mut bool) {
        let unit = self.unit;
        match &unit.node(id).kind {
            NodeKind::Assign { targets, value } => {
                if is_reassignment(unit, self.policy.matcher, targets, *value, self.binding_var) {
                    *found = false;
                    return;
                }
                self.scan(*value, depth, found);
            }
            NodeKind::Call(call) => {
                if self.is_satisfying_call(call) {
                    *found = true;
                }
                if let Some(callee) = call.callee {
                    self.scan(callee, depth, found);
                }
                for &arg in &call.args {
                    self.scan(arg, depth, found);
                }
            }
            NodeKind::Return { results } => {
                for &r in results {
                    self.scan(r, depth, found);
                }
            }
            NodeKind::Defer { call } => self.scan(*call, depth, found),
            NodeKind::Closure { body } => {
                if may_enter_closure(depth) {
                    for &stmt in body {
                        self.scan(stmt, depth + 1, found);
                    }
                }
            }
            NodeKind::Ident(_) => {}
            NodeKind::Other { children } => {
                for &c in children {
                    self.scan(c, depth, found);
                }
            }
        }
    }

    fn is_satisfying_call(&self, call: &spanlint_ir::Call) -> bool {
        if let Some(receiver) = &call.receiver
            && receiver.var == Some(self.binding_var)
            && call.selector == self.policy.selector
        {
            return true;
        }

        // Helper exemption: a discharging call that takes the span.
        if let Some(discharge) = self.policy.discharge
            && !call.target.is_empty()
            && discharge.is_match(&call.target)
            && call.args.iter().any(|&a| {
                matches!(
                    &self.unit.node(a).kind,
                    NodeKind::Ident(ident) if ident.var == Some(self.binding_var)
                )
            })
        {
            return true;
        }

        false
    }

    fn is_witness(&self, ret: NodeId) -> bool {
        if !self.policy.error_gated {
            return true;
        }
        returns_error_value(self.unit, ret)
    }
}
