//! Function units and the statement-node arena
//!
//! A [`FuncUnit`] is one function (named declaration or closure literal)
//! as resolved by the frontend. Its statements form a flat arena of
//! [`Node`]s addressed by [`NodeId`]; tree structure is expressed through
//! child id lists. The frontend also resolves every identifier to a
//! [`VarId`] (two identifiers denote the same declared variable iff their
//! ids are equal) and annotates expressions with error-capability, so the
//! checker never needs a type table of its own.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Index of a statement/expression node in [`FuncUnit::nodes`].
pub type NodeId = u32;

/// Identity of a resolved declared variable.
pub type VarId = u32;

/// Source span of a node or identifier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    /// Line number (0-indexed)
    pub line: usize,
    /// Start column (0-indexed)
    pub column: usize,
    /// Length of the span in characters
    pub length: usize,
}

impl Span {
    pub fn new(line: usize, column: usize, length: usize) -> Self {
        Span {
            line,
            column,
            length,
        }
    }
}

/// One frontend dump file: every function unit of one source file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dump {
    /// Source file the units were extracted from
    pub file: PathBuf,
    /// All function units, outermost first
    pub functions: Vec<FuncUnit>,
}

/// One function as handed over by the frontend.
///
/// Closures are their own units: a nested function literal appears both as
/// a [`NodeKind::Closure`] node inside its enclosing unit (opaque to that
/// unit's analysis, except for the one-level defer rule) and as a separate
/// `FuncUnit` in the dump.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FuncUnit {
    /// Display name; frontends use "_" or "func@line" for anonymous units
    pub name: String,
    /// Full declaration text, e.g. `func (s *Server) handle(ctx context.Context) error`.
    /// Ignore-signature rules match against this.
    pub signature: String,
    /// Declared result slots, or `None` when the frontend could not resolve
    /// the signature's types. `None` makes the error-gated checks skip this
    /// unit entirely.
    #[serde(default)]
    pub results: Option<Vec<ResultSlot>>,
    /// Variables declared within this unit's own scope. A span bound to a
    /// variable not listed here belongs to an enclosing unit's analysis.
    pub local_vars: Vec<VarId>,
    /// Top-level statement nodes, in source order
    pub body: Vec<NodeId>,
    /// Node arena; `NodeId`s index into this
    pub nodes: Vec<Node>,
    /// Pre-built control-flow graph over the arena
    pub cfg: crate::cfg::Cfg,
}

impl FuncUnit {
    /// Arena lookup. Ids are produced by the same frontend that produced
    /// the arena, so an out-of-range id is a malformed dump; [`validate`]
    /// rejects those up front.
    ///
    /// [`validate`]: FuncUnit::validate
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id as usize]
    }

    /// Check that every node and block reference stays inside the arenas,
    /// so later traversal cannot index out of range. Analyzers run this
    /// once per unit and skip units that fail.
    pub fn validate(&self) -> Result<(), String> {
        let node_count = self.nodes.len();
        let check_node = |id: NodeId, what: &str| -> Result<(), String> {
            if (id as usize) < node_count {
                Ok(())
            } else {
                Err(format!(
                    "{} references node {} out of range ({} nodes)",
                    what, id, node_count
                ))
            }
        };

        for &id in &self.body {
            check_node(id, "body")?;
        }

        for (i, node) in self.nodes.iter().enumerate() {
            let what = format!("node {}", i);
            match &node.kind {
                NodeKind::Assign { value, .. } => check_node(*value, &what)?,
                NodeKind::Call(call) => {
                    if let Some(callee) = call.callee {
                        check_node(callee, &what)?;
                    }
                    for &arg in &call.args {
                        check_node(arg, &what)?;
                    }
                }
                NodeKind::Return { results } => {
                    for &r in results {
                        check_node(r, &what)?;
                    }
                }
                NodeKind::Defer { call } => check_node(*call, &what)?,
                NodeKind::Closure { body } => {
                    for &stmt in body {
                        check_node(stmt, &what)?;
                    }
                }
                NodeKind::Ident(_) => {}
                NodeKind::Other { children } => {
                    for &c in children {
                        check_node(c, &what)?;
                    }
                }
            }
        }

        let block_count = self.cfg.blocks.len();
        for (i, block) in self.cfg.blocks.iter().enumerate() {
            let what = format!("block {}", i);
            for &id in &block.nodes {
                check_node(id, &what)?;
            }
            if let Some(ret) = block.ret {
                check_node(ret, &what)?;
            }
            for &succ in &block.succs {
                if (succ as usize) >= block_count {
                    return Err(format!(
                        "{} successor {} out of range ({} blocks)",
                        what, succ, block_count
                    ));
                }
            }
        }

        Ok(())
    }
}

/// One declared result slot of a function signature.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultSlot {
    /// Type name as written, for messages
    pub type_name: String,
    /// Whether the type fulfills the error contract
    pub error_capable: bool,
}

/// A node in the statement/expression arena.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub span: Span,
    /// Whether this node, read as an expression, has an error-capable type.
    /// False when not applicable or unknown.
    #[serde(default)]
    pub error_capable: bool,
    pub kind: NodeKind,
}

/// Node shapes the checker distinguishes. Everything else arrives as
/// [`NodeKind::Other`] with its children preserved, so traversal stays
/// complete even for constructs the checker has no opinion about.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeKind {
    /// `a, b = expr` / `a, b := expr`; `value` is usually a call
    Assign {
        targets: Vec<AssignTarget>,
        value: NodeId,
    },
    /// A call expression, direct or method-style
    Call(Call),
    /// A return statement; `results` are the returned expression nodes.
    /// Frontends materialize an implicit return node (spanning the closing
    /// brace) for falling off the end of a function.
    Return { results: Vec<NodeId> },
    /// A deferred call; `call` is the call node being deferred
    Defer { call: NodeId },
    /// A function literal. Its body is opaque to the enclosing unit's
    /// binding collection; the use-scan descends exactly one level.
    Closure { body: Vec<NodeId> },
    /// A resolved identifier expression
    Ident(IdentRef),
    /// Any other statement or expression; children in source order
    Other { children: Vec<NodeId> },
}

/// One left-hand side of an assignment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AssignTarget {
    /// The blank identifier `_`
    Discard { span: Span },
    /// A named target; unresolved targets (field stores etc.) carry no `var`
    Ident(IdentRef),
}

/// An identifier occurrence with its resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentRef {
    pub name: String,
    /// Declared variable this occurrence denotes; `None` if unresolved
    pub var: Option<VarId>,
    pub span: Span,
}

/// A call expression.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Call {
    /// Fully qualified callee path resolved by the frontend, e.g.
    /// `(go.opentelemetry.io/otel/trace.Tracer).Start`. Empty when the
    /// callee is dynamic or a literal.
    #[serde(default)]
    pub target: String,
    /// Callee expression node when the callee is not a named function
    /// (closure literal, computed expression)
    #[serde(default)]
    pub callee: Option<NodeId>,
    /// Receiver variable for method-style calls on a local variable
    #[serde(default)]
    pub receiver: Option<IdentRef>,
    /// Final selector (method name); equals the last path segment of
    /// `target` for named callees
    pub selector: String,
    /// Argument expression nodes
    #[serde(default)]
    pub args: Vec<NodeId>,
    /// Error-capability of each result position of the call, left to
    /// right. Empty when unknown or the call has no results.
    #[serde(default)]
    pub result_error_capable: Vec<bool>,
}
