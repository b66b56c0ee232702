//! Functions: named, typed containers of basic blocks.
//!
//! A function without blocks is a declaration. Lock primitives, `sleep`, `sem_init` and
//! friends are declarations; the mutation operators only ever edit definitions.

use std::fmt;

use crate::ir::{Block, BlockId, Type};

/// Index of a function within its module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FuncId(u32);

impl FuncId {
    /// Creates a function id from a raw index.
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

impl fmt::Display for FuncId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@f{}", self.0)
    }
}

/// A function definition or declaration.
#[derive(Debug, Clone)]
pub struct Function {
    id: FuncId,
    name: String,
    ret: Type,
    params: Vec<Type>,
    blocks: Vec<Block>,
}

impl Function {
    /// Creates a new function without blocks.
    ///
    /// # Arguments
    ///
    /// * `id` - Index of the function in its module
    /// * `name` - Symbol name (possibly mangled)
    /// * `ret` - Return type
    /// * `params` - Parameter types
    #[must_use]
    pub fn new(id: FuncId, name: impl Into<String>, ret: Type, params: Vec<Type>) -> Self {
        Self {
            id,
            name: name.into(),
            ret,
            params,
            blocks: Vec::new(),
        }
    }

    /// Returns the function index.
    #[must_use]
    pub const fn id(&self) -> FuncId {
        self.id
    }

    /// Returns the symbol name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the return type.
    #[must_use]
    pub const fn ret(&self) -> Type {
        self.ret
    }

    /// Returns the parameter types.
    #[must_use]
    pub fn params(&self) -> &[Type] {
        &self.params
    }

    /// Returns true if the function has no body.
    #[must_use]
    pub fn is_declaration(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Returns the blocks in layout order.
    #[must_use]
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Returns a block by id.
    #[must_use]
    pub fn block(&self, id: BlockId) -> Option<&Block> {
        self.blocks.get(id.index())
    }

    pub(crate) fn block_mut(&mut self, id: BlockId) -> Option<&mut Block> {
        self.blocks.get_mut(id.index())
    }

    pub(crate) fn add_block(&mut self, label: impl Into<String>) -> BlockId {
        #[allow(clippy::cast_possible_truncation)]
        let id = BlockId::new(self.blocks.len() as u32);
        self.blocks.push(Block::new(id, label));
        id
    }

    /// Returns the number of blocks.
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Returns the total number of instructions in all blocks.
    #[must_use]
    pub fn instruction_count(&self) -> usize {
        self.blocks.iter().map(Block::len).sum()
    }
}
