//! Test fixtures: a small builder for function units and their CFGs.
//!
//! Tests construct arenas by hand; this keeps the node/block bookkeeping in
//! one place. Each created node gets a fresh line number so positions stay
//! distinguishable in assertions.

use spanlint_ir::{
    AssignTarget, Block, BlockId, Call, Cfg, FuncUnit, IdentRef, Node, NodeId, NodeKind,
    ResultSlot, Span, VarId,
};

/// Qualified target of the built-in OpenTelemetry start rule.
pub(crate) const OTEL_START: &str = "(go.opentelemetry.io/otel/trace.Tracer).Start";

/// An assignment target in fixture shorthand.
pub(crate) enum Tgt {
    /// `_`
    Discard,
    /// Variable declared in the unit's own scope
    Var(VarId, &'static str),
    /// Variable resolved to an enclosing scope
    Outer(VarId, &'static str),
}

pub(crate) struct UnitBuilder {
    name: String,
    signature: String,
    results: Option<Vec<ResultSlot>>,
    local_vars: Vec<VarId>,
    body: Vec<NodeId>,
    nodes: Vec<Node>,
    blocks: Vec<Block>,
    line: usize,
}

impl UnitBuilder {
    pub fn new(name: &str) -> Self {
        UnitBuilder {
            name: name.to_string(),
            signature: format!("func {}()", name),
            results: Some(vec![]),
            local_vars: vec![],
            body: vec![],
            nodes: vec![],
            blocks: vec![],
            line: 0,
        }
    }

    pub fn signature(mut self, sig: &str) -> Self {
        self.signature = sig.to_string();
        self
    }

    pub fn returns_error(mut self) -> Self {
        self.results = Some(vec![ResultSlot {
            type_name: "error".to_string(),
            error_capable: true,
        }]);
        self
    }

    pub fn no_type_info(mut self) -> Self {
        self.results = None;
        self
    }

    fn push_node(&mut self, kind: NodeKind, error_capable: bool) -> NodeId {
        let id = self.nodes.len() as NodeId;
        let line = self.line;
        self.line += 1;
        self.nodes.push(Node {
            span: Span::new(line, 0, 1),
            error_capable,
            kind,
        });
        id
    }

    fn ident_ref(&self, var: Option<VarId>, name: &str) -> IdentRef {
        IdentRef {
            name: name.to_string(),
            var,
            span: Span::new(self.line, 0, name.len()),
        }
    }

    /// A resolved identifier expression node.
    pub fn ident(&mut self, var: VarId, name: &str) -> NodeId {
        let ident = self.ident_ref(Some(var), name);
        self.push_node(NodeKind::Ident(ident), false)
    }

    /// An opaque expression with an error-capable type.
    pub fn err_expr(&mut self) -> NodeId {
        self.push_node(NodeKind::Other { children: vec![] }, true)
    }

    /// A span-start call with the given qualified target.
    pub fn start_custom(&mut self, target: &str) -> NodeId {
        let selector = target.rsplit('.').next().unwrap_or(target).to_string();
        self.push_node(
            NodeKind::Call(Call {
                target: target.to_string(),
                callee: None,
                receiver: None,
                selector,
                args: vec![],
                result_error_capable: vec![],
            }),
            false,
        )
    }

    /// A built-in OpenTelemetry start call.
    pub fn start_otel(&mut self) -> NodeId {
        self.start_custom(OTEL_START)
    }

    /// A method call on a local variable, e.g. `span.End()`.
    pub fn method_call(&mut self, var: VarId, name: &str, selector: &str) -> NodeId {
        let receiver = self.ident_ref(Some(var), name);
        self.push_node(
            NodeKind::Call(Call {
                target: String::new(),
                callee: None,
                receiver: Some(receiver),
                selector: selector.to_string(),
                args: vec![],
                result_error_capable: vec![],
            }),
            false,
        )
    }

    /// A named-function call with argument nodes, e.g. `telemetry.Record(span, err)`.
    pub fn helper_call(&mut self, target: &str, args: Vec<NodeId>) -> NodeId {
        let selector = target.rsplit('.').next().unwrap_or(target).to_string();
        self.push_node(
            NodeKind::Call(Call {
                target: target.to_string(),
                callee: None,
                receiver: None,
                selector,
                args,
                result_error_capable: vec![],
            }),
            false,
        )
    }

    /// A call whose result tuple error-capability is known, for returns of
    /// the form `return f()`.
    pub fn call_with_results(&mut self, target: &str, result_error_capable: Vec<bool>) -> NodeId {
        let selector = target.rsplit('.').next().unwrap_or(target).to_string();
        self.push_node(
            NodeKind::Call(Call {
                target: target.to_string(),
                callee: None,
                receiver: None,
                selector,
                args: vec![],
                result_error_capable,
            }),
            false,
        )
    }

    /// An assignment statement. `Tgt::Var` targets are recorded as locally
    /// declared variables.
    pub fn assign(&mut self, targets: Vec<Tgt>, value: NodeId) -> NodeId {
        let targets = targets
            .into_iter()
            .map(|t| match t {
                Tgt::Discard => AssignTarget::Discard {
                    span: Span::new(self.line, 0, 1),
                },
                Tgt::Var(var, name) => {
                    if !self.local_vars.contains(&var) {
                        self.local_vars.push(var);
                    }
                    AssignTarget::Ident(self.ident_ref(Some(var), name))
                }
                Tgt::Outer(var, name) => AssignTarget::Ident(self.ident_ref(Some(var), name)),
            })
            .collect();
        self.push_node(NodeKind::Assign { targets, value }, false)
    }

    /// A bare expression statement wrapping `child`.
    pub fn expr_stmt(&mut self, child: NodeId) -> NodeId {
        self.push_node(
            NodeKind::Other {
                children: vec![child],
            },
            false,
        )
    }

    /// A return statement.
    pub fn ret(&mut self, results: Vec<NodeId>) -> NodeId {
        self.push_node(NodeKind::Return { results }, false)
    }

    /// `return nil` / implicit end-of-function return.
    pub fn ret_nil(&mut self) -> NodeId {
        self.ret(vec![])
    }

    /// `return err` with an error-capable result expression.
    pub fn ret_err(&mut self) -> NodeId {
        let err = self.err_expr();
        self.ret(vec![err])
    }

    /// `defer span.End()` style statement.
    pub fn defer_method(&mut self, var: VarId, name: &str, selector: &str) -> NodeId {
        let call = self.method_call(var, name, selector);
        self.push_node(NodeKind::Defer { call }, false)
    }

    /// A function literal node.
    pub fn closure(&mut self, body: Vec<NodeId>) -> NodeId {
        self.push_node(NodeKind::Closure { body }, false)
    }

    /// `defer func() { ... }()` - a deferred call to a closure literal.
    pub fn defer_closure(&mut self, body: Vec<NodeId>) -> NodeId {
        let closure = self.closure(body);
        let call = self.push_node(
            NodeKind::Call(Call {
                target: String::new(),
                callee: Some(closure),
                receiver: None,
                selector: String::new(),
                args: vec![],
                result_error_capable: vec![],
            }),
            false,
        );
        self.push_node(NodeKind::Defer { call }, false)
    }

    /// Append statements to the unit body, in order.
    pub fn body(&mut self, stmts: Vec<NodeId>) -> &mut Self {
        self.body.extend(stmts);
        self
    }

    /// Append a CFG block; returns its id.
    pub fn block(&mut self, nodes: Vec<NodeId>, succs: Vec<BlockId>, ret: Option<NodeId>) -> BlockId {
        let id = self.blocks.len() as BlockId;
        self.blocks.push(Block { nodes, succs, ret });
        id
    }

    /// One straight-line block holding the whole body, terminated by the
    /// last statement when it is a return.
    pub fn single_block(&mut self) -> BlockId {
        let nodes = self.body.clone();
        let ret = nodes
            .last()
            .copied()
            .filter(|&id| matches!(self.nodes[id as usize].kind, NodeKind::Return { .. }));
        self.block(nodes, vec![], ret)
    }

    pub fn build(self) -> FuncUnit {
        FuncUnit {
            name: self.name,
            signature: self.signature,
            results: self.results,
            local_vars: self.local_vars,
            body: self.body,
            nodes: self.nodes,
            cfg: Cfg {
                blocks: self.blocks,
            },
        }
    }
}
