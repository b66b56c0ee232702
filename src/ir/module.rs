//! The module: functions plus a generation-checked instruction arena.
//!
//! # Architecture
//!
//! ```text
//! Module
//!  ├── functions: [f0, f1, ...]          (definitions and declarations)
//!  │     └── blocks: [bb0, bb1, ...]
//!  │           └── instructions: [InstId, ...]   (order only)
//!  └── slots: [Slot { generation, entry }, ...]  (instruction storage)
//! ```
//!
//! Blocks hold handles, the arena holds the instructions. Erasing an instruction removes
//! its handle from the block, empties the slot and advances the slot generation. A handle
//! kept across that edit fails every later lookup with [`Error::StaleHandle`].
//!
//! # Visitation Order
//!
//! Every query that walks a function (distance, relative insertion, enumeration) uses the
//! same order: blocks in layout order, then instructions in block order. Positions and
//! distances are counted in single steps along that order, crossing block boundaries.
//!
//! # Thread Safety
//!
//! `Module` is `Send` and `Sync`; mutation requires exclusive access (`&mut self`).

use crate::{
    ir::{BlockId, Callee, Constant, FuncId, Function, InstId, Instruction, Type, Value},
    Error, Result,
};

/// Result of [`Module::erase_or_replace_with_zero`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    /// The instruction had no uses and was erased.
    Erased,
    /// The uses were rewritten to a zero constant, then the instruction was erased.
    Replaced {
        /// Number of operands that were rewritten
        uses: usize,
    },
}

/// Result of walking a number of steps through a function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    /// The instruction the walk stopped at.
    pub target: InstId,
    /// True if the walk hit the first or last instruction before completing.
    pub clamped: bool,
}

#[derive(Debug, Clone)]
struct Placed {
    inst: Instruction,
    func: FuncId,
    block: BlockId,
}

#[derive(Debug, Clone, Default)]
struct Slot {
    generation: u32,
    entry: Option<Placed>,
}

/// A compiled program: the unit a mutation run operates on.
///
/// # Examples
///
/// ```rust
/// use syncmut::ir::{Module, Type, Value};
///
/// let mut module = Module::new("demo");
/// let lock = module.declare("pthread_mutex_lock", Type::I32);
/// let mut f = module.build_function("worker", Type::Void);
/// f.block("entry");
/// let call = f.call(lock, vec![Value::global("m")])?;
/// f.ret(None)?;
///
/// assert_eq!(module.use_count(call)?, 0);
/// # Ok::<(), syncmut::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct Module {
    name: String,
    functions: Vec<Function>,
    slots: Vec<Slot>,
    free: Vec<u32>,
}

impl Module {
    /// Creates an empty module.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Returns the module name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    // ── Functions ───────────────────────────────────────────────────────

    /// Adds a new function (without blocks) and returns its id.
    pub fn add_function(&mut self, name: impl Into<String>, ret: Type, params: Vec<Type>) -> FuncId {
        #[allow(clippy::cast_possible_truncation)]
        let id = FuncId::new(self.functions.len() as u32);
        self.functions.push(Function::new(id, name, ret, params));
        id
    }

    /// Returns the function named `name`, declaring it if it does not exist yet.
    pub fn get_or_declare(&mut self, name: &str, ret: Type, params: Vec<Type>) -> FuncId {
        match self.function_by_name(name) {
            Some(id) => id,
            None => self.add_function(name, ret, params),
        }
    }

    /// Declares an external function with no declared parameters.
    pub fn declare(&mut self, name: &str, ret: Type) -> FuncId {
        self.get_or_declare(name, ret, Vec::new())
    }

    /// Returns a function by id.
    #[must_use]
    pub fn function(&self, id: FuncId) -> Option<&Function> {
        self.functions.get(id.index())
    }

    fn function_mut(&mut self, id: FuncId) -> Result<&mut Function> {
        self.functions
            .get_mut(id.index())
            .ok_or(Error::UnknownFunction(id.index()))
    }

    /// Looks a function up by symbol name.
    #[must_use]
    pub fn function_by_name(&self, name: &str) -> Option<FuncId> {
        self.functions
            .iter()
            .find(|f| f.name() == name)
            .map(Function::id)
    }

    /// Iterates over all functions in module order.
    pub fn functions(&self) -> impl Iterator<Item = &Function> {
        self.functions.iter()
    }

    /// Returns the number of functions (definitions and declarations).
    #[must_use]
    pub fn function_count(&self) -> usize {
        self.functions.len()
    }

    /// Appends a new block to a function.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownFunction`] if `func` does not exist.
    pub fn add_block(&mut self, func: FuncId, label: impl Into<String>) -> Result<BlockId> {
        Ok(self.function_mut(func)?.add_block(label))
    }

    // ── Instruction lookup ──────────────────────────────────────────────

    fn placed(&self, id: InstId) -> Result<&Placed> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.entry.as_ref())
            .ok_or(Error::StaleHandle(id))
    }

    fn placed_mut(&mut self, id: InstId) -> Result<&mut Placed> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.entry.as_mut())
            .ok_or(Error::StaleHandle(id))
    }

    /// Returns true if the handle still refers to a live instruction.
    #[must_use]
    pub fn is_live(&self, id: InstId) -> bool {
        self.placed(id).is_ok()
    }

    /// Returns the instruction behind a handle.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StaleHandle`] if the instruction has been erased.
    pub fn instruction(&self, id: InstId) -> Result<&Instruction> {
        Ok(&self.placed(id)?.inst)
    }

    /// Returns the instruction behind a handle for in-place modification.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StaleHandle`] if the instruction has been erased.
    pub fn instruction_mut(&mut self, id: InstId) -> Result<&mut Instruction> {
        Ok(&mut self.placed_mut(id)?.inst)
    }

    /// Returns the function and block containing an instruction.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StaleHandle`] if the instruction has been erased.
    pub fn parent(&self, id: InstId) -> Result<(FuncId, BlockId)> {
        let placed = self.placed(id)?;
        Ok((placed.func, placed.block))
    }

    /// Returns the raw symbol name of a direct call's target.
    ///
    /// Returns `Ok(None)` for indirect calls and for instructions that are not calls.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StaleHandle`] if the instruction has been erased.
    pub fn callee_name(&self, id: InstId) -> Result<Option<&str>> {
        let callee = self.instruction(id)?.op().callee();
        Ok(match callee {
            Some(Callee::Direct(func)) => self.function(*func).map(Function::name),
            _ => None,
        })
    }

    /// Returns the instructions of a function in visitation order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownFunction`] if `func` does not exist.
    pub fn instructions_of(&self, func: FuncId) -> Result<Vec<InstId>> {
        let function = self
            .function(func)
            .ok_or(Error::UnknownFunction(func.index()))?;
        Ok(function
            .blocks()
            .iter()
            .flat_map(|block| block.instructions().iter().copied())
            .collect())
    }

    /// Iterates over every live instruction of the module in visitation order.
    ///
    /// Yields `(function, handle, instruction)` triples: functions in module order,
    /// blocks in layout order, instructions in block order.
    pub fn iter_instructions(&self) -> impl Iterator<Item = (FuncId, InstId, &Instruction)> + '_ {
        self.functions.iter().flat_map(move |function| {
            function.blocks().iter().flat_map(move |block| {
                block.instructions().iter().filter_map(move |id| {
                    self.instruction(*id)
                        .ok()
                        .map(|inst| (function.id(), *id, inst))
                })
            })
        })
    }

    /// Returns the terminator of a block, if the block ends in one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownFunction`] or [`Error::UnknownBlock`] for invalid ids.
    pub fn terminator(&self, func: FuncId, block: BlockId) -> Result<Option<InstId>> {
        let function = self
            .function(func)
            .ok_or(Error::UnknownFunction(func.index()))?;
        let block = function.block(block).ok_or(Error::UnknownBlock {
            function: func.index(),
            block: block.index(),
        })?;
        Ok(block
            .last()
            .filter(|id| self.instruction(*id).is_ok_and(Instruction::is_terminator)))
    }

    // ── Arena ───────────────────────────────────────────────────────────

    fn alloc(&mut self, inst: Instruction, func: FuncId, block: BlockId) -> InstId {
        let entry = Some(Placed { inst, func, block });
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.entry = entry;
            return InstId {
                index,
                generation: slot.generation,
            };
        }

        #[allow(clippy::cast_possible_truncation)]
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            entry,
        });
        InstId {
            index,
            generation: 0,
        }
    }

    fn release(&mut self, id: InstId) -> Option<Instruction> {
        let slot = self.slots.get_mut(id.index as usize)?;
        let placed = slot.entry.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        Some(placed.inst)
    }

    // ── Insertion ───────────────────────────────────────────────────────

    /// Appends an instruction to the end of a block.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownFunction`] or [`Error::UnknownBlock`] for invalid ids.
    pub fn push(&mut self, func: FuncId, block: BlockId, inst: Instruction) -> Result<InstId> {
        let exists = self
            .function(func)
            .ok_or(Error::UnknownFunction(func.index()))?
            .block(block)
            .is_some();
        if !exists {
            return Err(Error::UnknownBlock {
                function: func.index(),
                block: block.index(),
            });
        }

        let id = self.alloc(inst, func, block);
        if let Some(target) = self.function_mut(func)?.block_mut(block) {
            target.instructions_mut().push(id);
        }
        Ok(id)
    }

    /// Inserts an instruction immediately before `anchor`, in the anchor's block.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StaleHandle`] if the anchor has been erased.
    pub fn insert_before(&mut self, anchor: InstId, inst: Instruction) -> Result<InstId> {
        let (func, block) = self.parent(anchor)?;
        let id = self.alloc(inst, func, block);

        let target = self
            .function_mut(func)?
            .block_mut(block)
            .ok_or(Error::UnknownBlock {
                function: func.index(),
                block: block.index(),
            })?;
        match target.position(anchor) {
            Some(pos) => {
                target.instructions_mut().insert(pos, id);
                Ok(id)
            }
            None => {
                self.release(id);
                Err(malformed_error!(
                    "instruction {} is not listed in its parent block {}",
                    anchor,
                    block
                ))
            }
        }
    }

    // ── Uses ────────────────────────────────────────────────────────────

    /// Returns the instructions that consume the result of `id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StaleHandle`] if the instruction has been erased.
    pub fn users(&self, id: InstId) -> Result<Vec<InstId>> {
        let (func, _) = self.parent(id)?;
        let mut users = Vec::new();
        for candidate in self.instructions_of(func)? {
            let inst = self.instruction(candidate)?;
            if inst.op().operands().iter().any(|operand| operand.uses(id)) {
                users.push(candidate);
            }
        }
        Ok(users)
    }

    /// Returns the number of operands that consume the result of `id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StaleHandle`] if the instruction has been erased.
    pub fn use_count(&self, id: InstId) -> Result<usize> {
        let (func, _) = self.parent(id)?;
        let mut count = 0;
        for candidate in self.instructions_of(func)? {
            let inst = self.instruction(candidate)?;
            count += inst
                .op()
                .operands()
                .iter()
                .filter(|operand| operand.uses(id))
                .count();
        }
        Ok(count)
    }

    /// Rewrites every use of `id` to `with` and returns the number of rewritten operands.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StaleHandle`] if the instruction has been erased.
    pub fn replace_all_uses(&mut self, id: InstId, with: &Value) -> Result<usize> {
        let (func, _) = self.parent(id)?;
        let mut rewritten = 0;
        for candidate in self.instructions_of(func)? {
            let inst = self.instruction_mut(candidate)?;
            for operand in inst.op_mut().operands_mut() {
                if operand.uses(id) {
                    *operand = with.clone();
                    rewritten += 1;
                }
            }
        }
        Ok(rewritten)
    }

    // ── Removal and replacement ─────────────────────────────────────────

    /// Erases an instruction that has no remaining uses.
    ///
    /// # Errors
    ///
    /// Returns [`Error::HasUses`] if the result is still consumed and
    /// [`Error::StaleHandle`] if the instruction has already been erased.
    pub fn erase(&mut self, id: InstId) -> Result<Instruction> {
        let uses = self.use_count(id)?;
        if uses > 0 {
            return Err(Error::HasUses { id, uses });
        }

        let (func, block) = self.parent(id)?;
        if let Some(target) = self.function_mut(func)?.block_mut(block) {
            target.instructions_mut().retain(|candidate| *candidate != id);
        }
        self.release(id).ok_or(Error::StaleHandle(id))
    }

    /// Erases an instruction, first rewriting its uses to a zero constant if it has any.
    ///
    /// # Arguments
    ///
    /// * `id` - The instruction to remove
    /// * `width` - Bit width of the replacement constant
    /// * `signed` - Signedness of the replacement constant
    ///
    /// # Errors
    ///
    /// Returns [`Error::StaleHandle`] if the instruction has already been erased.
    pub fn erase_or_replace_with_zero(
        &mut self,
        id: InstId,
        width: u32,
        signed: bool,
    ) -> Result<Removal> {
        let uses = self.use_count(id)?;
        if uses == 0 {
            self.erase(id)?;
            return Ok(Removal::Erased);
        }

        let zero = Value::Const(Constant::zero(width, signed));
        let uses = self.replace_all_uses(id, &zero)?;
        self.erase(id)?;
        Ok(Removal::Replaced { uses })
    }

    /// Replaces an instruction with another one at the same position.
    ///
    /// The new instruction takes the old one's place in its block, every use of the old
    /// result is rewritten to the new result, and the old instruction is erased.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StaleHandle`] if `old` has already been erased.
    pub fn replace_with(&mut self, old: InstId, new: Instruction) -> Result<InstId> {
        let id = self.insert_before(old, new)?;
        self.replace_all_uses(old, &Value::Inst(id))?;
        self.erase(old)?;
        Ok(id)
    }

    // ── Distances and relative positions ────────────────────────────────

    /// Returns the zero-based position of an instruction in its function's visitation order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StaleHandle`] if the instruction has been erased.
    pub fn position(&self, id: InstId) -> Result<usize> {
        let (func, _) = self.parent(id)?;
        self.instructions_of(func)?
            .iter()
            .position(|candidate| *candidate == id)
            .ok_or_else(|| malformed_error!("instruction {} is not listed in its function", id))
    }

    /// Returns the number of steps between two instructions of the same function.
    ///
    /// The count starts at whichever of the two comes first in visitation order, so the
    /// result does not depend on the argument order. The distance of an instruction to
    /// itself is zero.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DifferentFunctions`] if the instructions live in different
    /// functions and [`Error::StaleHandle`] if either has been erased.
    pub fn distance(&self, a: InstId, b: InstId) -> Result<usize> {
        let (func_a, _) = self.parent(a)?;
        let (func_b, _) = self.parent(b)?;
        if func_a != func_b {
            return Err(Error::DifferentFunctions(a, b));
        }
        let pos_a = self.position(a)?;
        let pos_b = self.position(b)?;
        Ok(pos_a.abs_diff(pos_b))
    }

    /// Walks `steps` instructions forward (positive) or backward (negative) from `from`.
    ///
    /// The walk never leaves the function: it stops at the first or last instruction and
    /// reports that it was clamped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StaleHandle`] if `from` has been erased.
    pub fn step(&self, from: InstId, steps: isize) -> Result<Step> {
        let (func, _) = self.parent(from)?;
        let order = self.instructions_of(func)?;
        let pos = order
            .iter()
            .position(|candidate| *candidate == from)
            .ok_or_else(|| malformed_error!("instruction {} is not listed in its function", from))?;

        let last = order.len() - 1;
        let (index, clamped) = if steps >= 0 {
            let wanted = pos.saturating_add(steps.unsigned_abs());
            (wanted.min(last), wanted > last)
        } else {
            let back = steps.unsigned_abs();
            (pos.saturating_sub(back), back > pos)
        };

        Ok(Step {
            target: order[index],
            clamped,
        })
    }

    /// Inserts `inst` before the instruction `steps` positions after `base`.
    ///
    /// With `steps == 0` the new instruction lands directly before `base`. If the walk
    /// reaches the last instruction of the function before completing, the instruction is
    /// inserted before that last instruction and the returned flag is `true`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StaleHandle`] if `base` has been erased.
    pub fn insert_relative(
        &mut self,
        base: InstId,
        inst: Instruction,
        steps: usize,
    ) -> Result<(InstId, bool)> {
        let steps = isize::try_from(steps).unwrap_or(isize::MAX);
        let step = self.step(base, steps)?;
        let id = self.insert_before(step.target, inst)?;
        Ok((id, step.clamped))
    }
}
