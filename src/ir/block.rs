//! Basic blocks.
//!
//! A block is an ordered list of instruction handles. The handles point into the module's
//! instruction arena; the block only fixes their order.
//!
//! ```text
//! bb1 (critical):
//!   %3 = call i32 @pthread_mutex_lock(@m)
//!   store @counter, %2
//!   %4 = call i32 @pthread_mutex_unlock(@m)
//!   br bb2
//! ```

use std::fmt;

use crate::ir::InstId;

/// Index of a block within its function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(u32);

impl BlockId {
    /// Creates a block id from a raw index.
    #[must_use]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Returns the raw index.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bb{}", self.0)
    }
}

/// A basic block.
#[derive(Debug, Clone)]
pub struct Block {
    id: BlockId,
    label: String,
    instructions: Vec<InstId>,
}

impl Block {
    /// Creates a new empty block.
    ///
    /// # Arguments
    ///
    /// * `id` - The block index inside its function
    /// * `label` - Human readable label
    #[must_use]
    pub fn new(id: BlockId, label: impl Into<String>) -> Self {
        Self {
            id,
            label: label.into(),
            instructions: Vec::new(),
        }
    }

    /// Returns the block index.
    #[must_use]
    pub const fn id(&self) -> BlockId {
        self.id
    }

    /// Returns the label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Returns the instruction handles in execution order.
    #[must_use]
    pub fn instructions(&self) -> &[InstId] {
        &self.instructions
    }

    pub(crate) fn instructions_mut(&mut self) -> &mut Vec<InstId> {
        &mut self.instructions
    }

    /// Returns the number of instructions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Returns true if the block holds no instructions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Returns the position of `id` within the block.
    #[must_use]
    pub fn position(&self, id: InstId) -> Option<usize> {
        self.instructions.iter().position(|candidate| *candidate == id)
    }

    /// Returns the last instruction.
    #[must_use]
    pub fn last(&self) -> Option<InstId> {
        self.instructions.last().copied()
    }
}
