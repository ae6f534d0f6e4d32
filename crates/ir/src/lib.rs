//! Frontend interface types for spanlint
//!
//! The checker does not parse or type-check source code itself. An external
//! frontend resolves identifiers, types, and control flow, then hands each
//! function over as a [`FuncUnit`]: a flat statement-node arena plus a
//! pre-built control-flow graph over that arena. This crate defines those
//! types and nothing else - the analysis lives in the `spanlint` crate.
//!
//! All cross-references are index-based (`NodeId` into [`FuncUnit::nodes`],
//! `BlockId` into [`Cfg::blocks`]), so the graph can be cyclic without any
//! ownership cycles and search state can be keyed by plain integers.

pub mod cfg;
pub mod unit;

pub use cfg::{Block, BlockId, Cfg};
pub use unit::{
    AssignTarget, Call, Dump, FuncUnit, IdentRef, Node, NodeId, NodeKind, ResultSlot, Span, VarId,
};
