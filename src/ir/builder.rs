//! Fluent construction of function bodies.
//!
//! [`FunctionBuilder`] appends instructions to a current block, attaching the current
//! source location to each of them. It is the way tests, benchmarks and library users
//! build programs to mutate:
//!
//! ```rust
//! use syncmut::ir::{Module, Type, Value};
//!
//! let mut module = Module::new("demo");
//! let lock = module.declare("pthread_mutex_lock", Type::I32);
//! let unlock = module.declare("pthread_mutex_unlock", Type::I32);
//!
//! let mut f = module.build_function("worker", Type::Void);
//! f.block("entry");
//! f.at("worker.c", 10).call(lock, vec![Value::global("m")])?;
//! f.at("worker.c", 12).call(unlock, vec![Value::global("m")])?;
//! f.ret(None)?;
//! let worker = f.finish();
//!
//! assert_eq!(module.instructions_of(worker)?.len(), 3);
//! # Ok::<(), syncmut::Error>(())
//! ```

use crate::{
    ir::{
        AtomicOrdering, BinaryOp, BlockId, CallAttrs, Callee, DebugLoc, FuncId, InstId,
        Instruction, Module, Op, RmwOp, SyncScope, Type, Value,
    },
    Error, Result,
};

impl Module {
    /// Adds a new function and returns a builder positioned on it.
    ///
    /// The function has no blocks yet; call [`FunctionBuilder::block`] first.
    pub fn build_function(&mut self, name: impl Into<String>, ret: Type) -> FunctionBuilder<'_> {
        let func = self.add_function(name, ret, Vec::new());
        FunctionBuilder {
            module: self,
            func,
            current: None,
            loc: None,
        }
    }

    /// Returns a builder that appends to an existing function.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownFunction`] if `func` does not exist.
    pub fn edit_function(&mut self, func: FuncId) -> Result<FunctionBuilder<'_>> {
        let function = self
            .function(func)
            .ok_or(Error::UnknownFunction(func.index()))?;
        let current = function.blocks().last().map(|block| block.id());
        Ok(FunctionBuilder {
            module: self,
            func,
            current,
            loc: None,
        })
    }
}

/// Appends instructions to one function of a [`Module`].
pub struct FunctionBuilder<'m> {
    module: &'m mut Module,
    func: FuncId,
    current: Option<BlockId>,
    loc: Option<DebugLoc>,
}

impl FunctionBuilder<'_> {
    /// Returns the function being built.
    #[must_use]
    pub const fn func(&self) -> FuncId {
        self.func
    }

    /// Returns the block instructions are currently appended to.
    #[must_use]
    pub const fn current_block(&self) -> Option<BlockId> {
        self.current
    }

    /// Creates a new block and makes it current.
    pub fn block(&mut self, label: &str) -> BlockId {
        let id = self.create_block(label);
        self.current = Some(id);
        id
    }

    /// Creates a new block without switching to it (for forward branch targets).
    pub fn create_block(&mut self, label: &str) -> BlockId {
        match self.module.add_block(self.func, label) {
            Ok(id) => id,
            // Functions are never removed from a module; the builder's function exists.
            Err(_) => BlockId::new(0),
        }
    }

    /// Makes `block` the current block.
    pub fn switch_to(&mut self, block: BlockId) -> &mut Self {
        self.current = Some(block);
        self
    }

    /// Sets the source location attached to subsequent instructions.
    pub fn at(&mut self, file: &str, line: u32) -> &mut Self {
        self.loc = Some(DebugLoc::new(file, line));
        self
    }

    /// Stops attaching a source location.
    pub fn no_loc(&mut self) -> &mut Self {
        self.loc = None;
        self
    }

    /// Appends a fully formed instruction to the current block.
    ///
    /// The current location is attached if the instruction has none.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] if no block has been created yet.
    pub fn emit(&mut self, inst: Instruction) -> Result<InstId> {
        let block = self
            .current
            .ok_or_else(|| malformed_error!("no current block in function {}", self.func))?;
        let inst = if inst.loc().is_none() {
            inst.at(self.loc.clone())
        } else {
            inst
        };
        self.module.push(self.func, block, inst)
    }

    /// Appends an operation to the current block.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] if no block has been created yet.
    pub fn op(&mut self, op: Op) -> Result<InstId> {
        self.emit(Instruction::new(op))
    }

    fn return_type(&self, func: FuncId) -> Result<Type> {
        self.module
            .function(func)
            .map(|f| f.ret())
            .ok_or(Error::UnknownFunction(func.index()))
    }

    // ── Calls ───────────────────────────────────────────────────────────

    /// Appends a direct call. The result type is the callee's return type.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownFunction`] if `callee` does not exist.
    pub fn call(&mut self, callee: FuncId, args: Vec<Value>) -> Result<InstId> {
        self.call_with_attrs(callee, args, CallAttrs::empty())
    }

    /// Appends a direct call with call-site attributes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownFunction`] if `callee` does not exist.
    pub fn call_with_attrs(
        &mut self,
        callee: FuncId,
        args: Vec<Value>,
        attrs: CallAttrs,
    ) -> Result<InstId> {
        let ret = self.return_type(callee)?;
        self.emit(
            Instruction::new(Op::Call {
                callee: Callee::Direct(callee),
                args,
                ret,
            })
            .with_attrs(attrs),
        )
    }

    /// Appends an invoke terminating the current block.
    ///
    /// # Arguments
    ///
    /// * `callee` - The called function
    /// * `args` - Call arguments
    /// * `normal` - Block reached when the call returns
    /// * `unwind` - Block reached when the call unwinds
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownFunction`] if `callee` does not exist.
    pub fn invoke(
        &mut self,
        callee: FuncId,
        args: Vec<Value>,
        normal: BlockId,
        unwind: BlockId,
    ) -> Result<InstId> {
        let ret = self.return_type(callee)?;
        self.op(Op::Invoke {
            callee: Callee::Direct(callee),
            args,
            ret,
            normal,
            unwind,
        })
    }

    /// Appends a call through a function pointer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] if no block has been created yet.
    pub fn indirect_call(&mut self, target: Value, args: Vec<Value>, ret: Type) -> Result<InstId> {
        self.op(Op::Call {
            callee: Callee::Indirect(target),
            args,
            ret,
        })
    }

    // ── Terminators ─────────────────────────────────────────────────────

    /// Appends an unconditional branch.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] if no block has been created yet.
    pub fn br(&mut self, target: BlockId) -> Result<InstId> {
        self.op(Op::Br { target })
    }

    /// Appends a conditional branch.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] if no block has been created yet.
    pub fn cond_br(&mut self, cond: Value, then_block: BlockId, else_block: BlockId) -> Result<InstId> {
        self.op(Op::CondBr {
            cond,
            then_block,
            else_block,
        })
    }

    /// Appends a return.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] if no block has been created yet.
    pub fn ret(&mut self, value: Option<Value>) -> Result<InstId> {
        self.op(Op::Ret { value })
    }

    /// Appends `unreachable`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] if no block has been created yet.
    pub fn unreachable(&mut self) -> Result<InstId> {
        self.op(Op::Unreachable)
    }

    // ── Memory ──────────────────────────────────────────────────────────

    /// Appends a fence.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] if no block has been created yet.
    pub fn fence(&mut self, ordering: AtomicOrdering, scope: SyncScope) -> Result<InstId> {
        self.op(Op::Fence { ordering, scope })
    }

    /// Appends a plain load.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] if no block has been created yet.
    pub fn load(&mut self, ptr: Value, ty: Type) -> Result<InstId> {
        self.atomic_load(ptr, ty, AtomicOrdering::NotAtomic, SyncScope::CrossThread)
    }

    /// Appends a load with the given ordering and scope.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] if no block has been created yet.
    pub fn atomic_load(
        &mut self,
        ptr: Value,
        ty: Type,
        ordering: AtomicOrdering,
        scope: SyncScope,
    ) -> Result<InstId> {
        self.op(Op::Load {
            ptr,
            ty,
            volatile: false,
            ordering,
            scope,
        })
    }

    /// Appends a volatile, non-atomic load.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] if no block has been created yet.
    pub fn volatile_load(&mut self, ptr: Value, ty: Type) -> Result<InstId> {
        self.op(Op::Load {
            ptr,
            ty,
            volatile: true,
            ordering: AtomicOrdering::NotAtomic,
            scope: SyncScope::CrossThread,
        })
    }

    /// Appends a plain store.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] if no block has been created yet.
    pub fn store(&mut self, ptr: Value, value: Value) -> Result<InstId> {
        self.atomic_store(ptr, value, AtomicOrdering::NotAtomic, SyncScope::CrossThread)
    }

    /// Appends a store with the given ordering and scope.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] if no block has been created yet.
    pub fn atomic_store(
        &mut self,
        ptr: Value,
        value: Value,
        ordering: AtomicOrdering,
        scope: SyncScope,
    ) -> Result<InstId> {
        self.op(Op::Store {
            ptr,
            value,
            volatile: false,
            ordering,
            scope,
        })
    }

    /// Appends a volatile, non-atomic store.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] if no block has been created yet.
    pub fn volatile_store(&mut self, ptr: Value, value: Value) -> Result<InstId> {
        self.op(Op::Store {
            ptr,
            value,
            volatile: true,
            ordering: AtomicOrdering::NotAtomic,
            scope: SyncScope::CrossThread,
        })
    }

    /// Appends a compare-and-exchange.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] if no block has been created yet.
    pub fn cmpxchg(
        &mut self,
        ptr: Value,
        expected: Value,
        new: Value,
        ty: Type,
        success: AtomicOrdering,
        failure: AtomicOrdering,
    ) -> Result<InstId> {
        self.op(Op::CmpXchg {
            ptr,
            expected,
            new,
            ty,
            success,
            failure,
            scope: SyncScope::CrossThread,
            volatile: false,
        })
    }

    /// Appends an atomic read-modify-write.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] if no block has been created yet.
    pub fn atomic_rmw(
        &mut self,
        op: RmwOp,
        ptr: Value,
        value: Value,
        ty: Type,
        ordering: AtomicOrdering,
    ) -> Result<InstId> {
        self.op(Op::AtomicRmw {
            op,
            ptr,
            value,
            ty,
            ordering,
            scope: SyncScope::CrossThread,
            volatile: false,
        })
    }

    // ── Arithmetic and opaque operations ────────────────────────────────

    /// Appends a field address computation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] if no block has been created yet.
    pub fn gep(&mut self, base: Value, field: u32) -> Result<InstId> {
        self.op(Op::Gep { base, field })
    }

    /// Appends a binary operation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] if no block has been created yet.
    pub fn binary(&mut self, op: BinaryOp, lhs: Value, rhs: Value, ty: Type) -> Result<InstId> {
        self.op(Op::Binary { op, lhs, rhs, ty })
    }

    /// Appends an opaque operation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] if no block has been created yet.
    pub fn other(&mut self, opcode: &str, operands: Vec<Value>, ty: Type) -> Result<InstId> {
        self.op(Op::Other {
            opcode: opcode.to_string(),
            operands,
            ty,
        })
    }

    /// Finishes building and returns the function id.
    pub fn finish(self) -> FuncId {
        self.func
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_without_block_fails() {
        let mut module = Module::new("test");
        let mut f = module.build_function("f", Type::Void);
        assert!(matches!(f.ret(None), Err(Error::Malformed { .. })));
    }

    #[test]
    fn test_location_is_attached() -> Result<()> {
        let mut module = Module::new("test");
        let mut f = module.build_function("f", Type::Void);
        f.block("entry");
        let first = f.at("a.c", 3).fence(AtomicOrdering::Acquire, SyncScope::CrossThread)?;
        let second = f.no_loc().ret(None)?;
        f.finish();

        assert_eq!(module.instruction(first)?.loc(), Some(&DebugLoc::new("a.c", 3)));
        assert!(module.instruction(second)?.loc().is_none());
        Ok(())
    }

    #[test]
    fn test_invoke_forward_blocks() -> Result<()> {
        let mut module = Module::new("test");
        let lock = module.declare("_ZNSt3__15mutex4lockEv", Type::Void);
        let mut f = module.build_function("f", Type::Void);
        f.block("entry");
        let normal = f.create_block("cont");
        let unwind = f.create_block("lpad");
        let invoke = f.invoke(lock, vec![Value::global("m")], normal, unwind)?;
        f.switch_to(normal).ret(None)?;
        f.switch_to(unwind).unreachable()?;
        let func = f.finish();

        assert_eq!(module.parent(invoke)?, (func, BlockId::new(0)));
        assert_eq!(module.terminator(func, BlockId::new(0))?, Some(invoke));
        assert_eq!(module.instructions_of(func)?.len(), 3);
        Ok(())
    }

    #[test]
    fn test_edit_function_appends_to_last_block() -> Result<()> {
        let mut module = Module::new("test");
        let mut f = module.build_function("f", Type::Void);
        f.block("entry");
        f.fence(AtomicOrdering::Release, SyncScope::CrossThread)?;
        let func = f.finish();

        let mut g = module.edit_function(func)?;
        g.ret(None)?;
        assert_eq!(module.instructions_of(func)?.len(), 2);
        Ok(())
    }
}
