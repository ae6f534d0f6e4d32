//! Control-flow graphs over the statement arena
//!
//! The frontend builds one [`Cfg`] per function unit. Blocks are stored in
//! a flat vector and referenced by [`BlockId`] index, successor lists
//! included, so loops produce cyclic id references rather than cyclic
//! ownership. The checker treats the graph as read-only.

use serde::{Deserialize, Serialize};

use crate::unit::NodeId;

/// Index of a block in [`Cfg::blocks`].
pub type BlockId = u32;

/// A control-flow graph for one function unit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Cfg {
    /// All basic blocks; entry is block 0 by convention
    pub blocks: Vec<Block>,
}

impl Cfg {
    /// Block lookup by id.
    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id as usize]
    }
}

/// A maximal straight-line run of statements with explicit successors.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Block {
    /// Statement nodes in execution order
    pub nodes: Vec<NodeId>,
    /// Successor blocks; empty for exit blocks
    #[serde(default)]
    pub succs: Vec<BlockId>,
    /// The return node this block terminates in, if it exits the function.
    /// Implicit function-end returns are materialized by the frontend.
    #[serde(default)]
    pub ret: Option<NodeId>,
}
