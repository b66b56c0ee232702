//! Instructions with explicit operands, call forms and generation-checked handles.
//!
//! # Design
//!
//! Each instruction consists of:
//!
//! - **Op**: the operation in `result = op(operands)` form
//! - **Name**: optional result name (purely cosmetic, kept for printing)
//! - **Attrs**: call-site attributes, copied onto every clone of a call site
//! - **Loc**: optional source location used by occurrence reports
//!
//! Calls exist in two forms. A plain [`Op::Call`] falls through to the next instruction;
//! an [`Op::Invoke`] is a block terminator with a normal-continuation block and an
//! unwind block. Every edit that removes an invoke must leave a terminator behind.
//!
//! ```text
//! bb0:
//!   %0 = call i32 @pthread_mutex_lock(@m)
//!   invoke void @_ZNSt3__15mutex4lockEv(@sm) to bb1 unwind bb2
//! bb1:
//!   ...
//! ```
//!
//! # Thread Safety
//!
//! All types in this module are `Send` and `Sync`.

use std::fmt;

use bitflags::bitflags;
use strum::Display;

use crate::ir::{AtomicOrdering, BlockId, DebugLoc, FuncId, SyncScope, Type, Value};

/// Handle to an instruction in a [`crate::ir::Module`].
///
/// The handle pairs the arena slot with the generation the slot had when the instruction
/// was created. Erasing the instruction advances the slot generation, so every handle to
/// an erased instruction is detected as stale even if the slot is later reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstId {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl InstId {
    /// Returns the arena slot index.
    #[must_use]
    pub const fn index(&self) -> u32 {
        self.index
    }

    /// Returns the slot generation this handle was issued for.
    #[must_use]
    pub const fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Display for InstId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.generation == 0 {
            write!(f, "%{}", self.index)
        } else {
            write!(f, "%{}.{}", self.index, self.generation)
        }
    }
}

/// The target of a call site.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Callee {
    /// Statically resolved function.
    Direct(FuncId),
    /// Function pointer; never resolved by this crate.
    Indirect(Value),
}

impl Callee {
    /// Returns the resolved function, if any.
    #[must_use]
    pub const fn function(&self) -> Option<FuncId> {
        match self {
            Callee::Direct(id) => Some(*id),
            Callee::Indirect(_) => None,
        }
    }
}

/// The two call-instruction forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum CallForm {
    /// Ordinary call; falls through.
    #[strum(serialize = "call")]
    Call,
    /// Call with an exceptional-control-flow edge; terminates its block.
    #[strum(serialize = "invoke")]
    Invoke,
}

bitflags! {
    /// Call-site attributes.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CallAttrs: u16 {
        /// The callee never unwinds
        const NOUNWIND = 0x0001;
        /// The callee never returns
        const NORETURN = 0x0002;
        /// The callee only reads memory
        const READONLY = 0x0004;
        /// The call is rarely executed
        const COLD = 0x0008;
        /// The call must not be inlined
        const NOINLINE = 0x0010;
        /// The call is a tail call
        const TAIL = 0x0020;
    }
}

/// Binary arithmetic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[allow(missing_docs)]
pub enum BinaryOp {
    #[strum(serialize = "add")]
    Add,
    #[strum(serialize = "sub")]
    Sub,
    #[strum(serialize = "mul")]
    Mul,
    #[strum(serialize = "and")]
    And,
    #[strum(serialize = "or")]
    Or,
    #[strum(serialize = "xor")]
    Xor,
}

/// Read-modify-write operators of `atomicrmw`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[allow(missing_docs)]
pub enum RmwOp {
    #[strum(serialize = "xchg")]
    Xchg,
    #[strum(serialize = "add")]
    Add,
    #[strum(serialize = "sub")]
    Sub,
    #[strum(serialize = "and")]
    And,
    #[strum(serialize = "or")]
    Or,
    #[strum(serialize = "xor")]
    Xor,
}

/// An IR operation.
#[derive(Debug, Clone, PartialEq)]
#[allow(missing_docs)]
pub enum Op {
    /// Plain call.
    Call {
        callee: Callee,
        args: Vec<Value>,
        ret: Type,
    },
    /// Call with normal and unwind continuations. Terminator.
    Invoke {
        callee: Callee,
        args: Vec<Value>,
        ret: Type,
        normal: BlockId,
        unwind: BlockId,
    },
    /// Unconditional branch. Terminator.
    Br { target: BlockId },
    /// Conditional branch. Terminator.
    CondBr {
        cond: Value,
        then_block: BlockId,
        else_block: BlockId,
    },
    /// Return. Terminator.
    Ret { value: Option<Value> },
    /// Unreachable. Terminator.
    Unreachable,
    /// Memory fence.
    Fence {
        ordering: AtomicOrdering,
        scope: SyncScope,
    },
    /// Load, atomic when `ordering` is not `NotAtomic`.
    Load {
        ptr: Value,
        ty: Type,
        volatile: bool,
        ordering: AtomicOrdering,
        scope: SyncScope,
    },
    /// Store, atomic when `ordering` is not `NotAtomic`.
    Store {
        ptr: Value,
        value: Value,
        volatile: bool,
        ordering: AtomicOrdering,
        scope: SyncScope,
    },
    /// Compare-and-exchange.
    CmpXchg {
        ptr: Value,
        expected: Value,
        new: Value,
        ty: Type,
        success: AtomicOrdering,
        failure: AtomicOrdering,
        scope: SyncScope,
        volatile: bool,
    },
    /// Atomic read-modify-write.
    AtomicRmw {
        op: RmwOp,
        ptr: Value,
        value: Value,
        ty: Type,
        ordering: AtomicOrdering,
        scope: SyncScope,
        volatile: bool,
    },
    /// Address of a field of the aggregate `base` points to.
    Gep { base: Value, field: u32 },
    /// Binary arithmetic.
    Binary {
        op: BinaryOp,
        lhs: Value,
        rhs: Value,
        ty: Type,
    },
    /// Any other operation; opaque to the mutation operators.
    Other {
        opcode: String,
        operands: Vec<Value>,
        ty: Type,
    },
}

impl Op {
    /// Returns the type of the value produced by this operation.
    #[must_use]
    pub fn result_type(&self) -> Type {
        match self {
            Op::Call { ret, .. } | Op::Invoke { ret, .. } => *ret,
            Op::Load { ty, .. }
            | Op::CmpXchg { ty, .. }
            | Op::AtomicRmw { ty, .. }
            | Op::Binary { ty, .. }
            | Op::Other { ty, .. } => *ty,
            Op::Gep { .. } => Type::Ptr,
            Op::Br { .. }
            | Op::CondBr { .. }
            | Op::Ret { .. }
            | Op::Unreachable
            | Op::Fence { .. }
            | Op::Store { .. } => Type::Void,
        }
    }

    /// Returns true if this operation ends a basic block.
    #[must_use]
    pub const fn is_terminator(&self) -> bool {
        matches!(
            self,
            Op::Invoke { .. } | Op::Br { .. } | Op::CondBr { .. } | Op::Ret { .. } | Op::Unreachable
        )
    }

    /// Returns the call form, or `None` for non-call operations.
    #[must_use]
    pub const fn call_form(&self) -> Option<CallForm> {
        match self {
            Op::Call { .. } => Some(CallForm::Call),
            Op::Invoke { .. } => Some(CallForm::Invoke),
            _ => None,
        }
    }

    /// Returns the callee of a call or invoke.
    #[must_use]
    pub const fn callee(&self) -> Option<&Callee> {
        match self {
            Op::Call { callee, .. } | Op::Invoke { callee, .. } => Some(callee),
            _ => None,
        }
    }

    /// Returns the argument list of a call or invoke.
    #[must_use]
    pub fn call_args(&self) -> Option<&[Value]> {
        match self {
            Op::Call { args, .. } | Op::Invoke { args, .. } => Some(args),
            _ => None,
        }
    }

    /// Returns the mutable argument list of a call or invoke.
    pub fn call_args_mut(&mut self) -> Option<&mut Vec<Value>> {
        match self {
            Op::Call { args, .. } | Op::Invoke { args, .. } => Some(args),
            _ => None,
        }
    }

    /// Returns the blocks control may transfer to after this operation.
    #[must_use]
    pub fn successors(&self) -> Vec<BlockId> {
        match self {
            Op::Invoke { normal, unwind, .. } => vec![*normal, *unwind],
            Op::Br { target } => vec![*target],
            Op::CondBr {
                then_block,
                else_block,
                ..
            } => vec![*then_block, *else_block],
            _ => Vec::new(),
        }
    }

    /// Returns all value operands in order.
    #[must_use]
    pub fn operands(&self) -> Vec<&Value> {
        match self {
            Op::Call { callee, args, .. } | Op::Invoke { callee, args, .. } => {
                let mut ops: Vec<&Value> = args.iter().collect();
                if let Callee::Indirect(target) = callee {
                    ops.push(target);
                }
                ops
            }
            Op::CondBr { cond, .. } => vec![cond],
            Op::Ret { value } => value.iter().collect(),
            Op::Load { ptr, .. } => vec![ptr],
            Op::Store { ptr, value, .. } | Op::AtomicRmw { ptr, value, .. } => vec![ptr, value],
            Op::CmpXchg {
                ptr, expected, new, ..
            } => vec![ptr, expected, new],
            Op::Gep { base, .. } => vec![base],
            Op::Binary { lhs, rhs, .. } => vec![lhs, rhs],
            Op::Other { operands, .. } => operands.iter().collect(),
            Op::Br { .. } | Op::Unreachable | Op::Fence { .. } => Vec::new(),
        }
    }

    /// Returns all value operands for in-place rewriting.
    pub fn operands_mut(&mut self) -> Vec<&mut Value> {
        match self {
            Op::Call { callee, args, .. } | Op::Invoke { callee, args, .. } => {
                let mut ops: Vec<&mut Value> = args.iter_mut().collect();
                if let Callee::Indirect(target) = callee {
                    ops.push(target);
                }
                ops
            }
            Op::CondBr { cond, .. } => vec![cond],
            Op::Ret { value } => value.iter_mut().collect(),
            Op::Load { ptr, .. } => vec![ptr],
            Op::Store { ptr, value, .. } | Op::AtomicRmw { ptr, value, .. } => vec![ptr, value],
            Op::CmpXchg {
                ptr, expected, new, ..
            } => vec![ptr, expected, new],
            Op::Gep { base, .. } => vec![base],
            Op::Binary { lhs, rhs, .. } => vec![lhs, rhs],
            Op::Other { operands, .. } => operands.iter_mut().collect(),
            Op::Br { .. } | Op::Unreachable | Op::Fence { .. } => Vec::new(),
        }
    }

    /// Returns the mnemonic of the operation.
    #[must_use]
    pub fn opcode(&self) -> &str {
        match self {
            Op::Call { .. } => "call",
            Op::Invoke { .. } => "invoke",
            Op::Br { .. } | Op::CondBr { .. } => "br",
            Op::Ret { .. } => "ret",
            Op::Unreachable => "unreachable",
            Op::Fence { .. } => "fence",
            Op::Load { .. } => "load",
            Op::Store { .. } => "store",
            Op::CmpXchg { .. } => "cmpxchg",
            Op::AtomicRmw { .. } => "atomicrmw",
            Op::Gep { .. } => "getelementptr",
            Op::Binary { op, .. } => match op {
                BinaryOp::Add => "add",
                BinaryOp::Sub => "sub",
                BinaryOp::Mul => "mul",
                BinaryOp::And => "and",
                BinaryOp::Or => "or",
                BinaryOp::Xor => "xor",
            },
            Op::Other { opcode, .. } => opcode,
        }
    }
}

/// An instruction: an operation plus its cosmetic and debug attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    op: Op,
    name: Option<String>,
    attrs: CallAttrs,
    loc: Option<DebugLoc>,
}

impl Instruction {
    /// Creates a new instruction from an operation.
    #[must_use]
    pub fn new(op: Op) -> Self {
        Self {
            op,
            name: None,
            attrs: CallAttrs::empty(),
            loc: None,
        }
    }

    /// Sets the result name.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the call-site attributes.
    #[must_use]
    pub fn with_attrs(mut self, attrs: CallAttrs) -> Self {
        self.attrs = attrs;
        self
    }

    /// Sets the source location.
    #[must_use]
    pub fn at(mut self, loc: Option<DebugLoc>) -> Self {
        self.loc = loc;
        self
    }

    /// Returns the operation.
    #[must_use]
    pub const fn op(&self) -> &Op {
        &self.op
    }

    /// Returns the operation for in-place modification.
    pub fn op_mut(&mut self) -> &mut Op {
        &mut self.op
    }

    /// Returns the result name, if any.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Returns the call-site attributes.
    #[must_use]
    pub const fn attrs(&self) -> CallAttrs {
        self.attrs
    }

    /// Returns the source location, if known.
    #[must_use]
    pub const fn loc(&self) -> Option<&DebugLoc> {
        self.loc.as_ref()
    }

    /// Returns true if this instruction ends a basic block.
    #[must_use]
    pub const fn is_terminator(&self) -> bool {
        self.op.is_terminator()
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(name) = &self.name {
            write!(f, "%{name} = ")?;
        }
        write!(f, "{}", self.op.opcode())?;
        match &self.op {
            Op::Call { callee, args, ret } | Op::Invoke { callee, args, ret, .. } => {
                write!(f, " {ret} ")?;
                match callee {
                    Callee::Direct(func) => write!(f, "{func}")?,
                    Callee::Indirect(target) => write!(f, "{target}")?,
                }
                f.write_str("(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                f.write_str(")")?;
                if let Op::Invoke { normal, unwind, .. } = &self.op {
                    write!(f, " to {normal} unwind {unwind}")?;
                }
            }
            Op::Br { target } => write!(f, " {target}")?,
            Op::CondBr {
                cond,
                then_block,
                else_block,
            } => write!(f, " {cond}, {then_block}, {else_block}")?,
            Op::Fence { ordering, scope } => write!(f, " {scope} {ordering}")?,
            Op::Load {
                ordering, scope, ..
            }
            | Op::Store {
                ordering, scope, ..
            }
            | Op::AtomicRmw {
                ordering, scope, ..
            } if ordering.is_atomic() => {
                for operand in self.op.operands() {
                    write!(f, " {operand}")?;
                }
                write!(f, " {scope} {ordering}")?;
            }
            Op::CmpXchg {
                success,
                failure,
                scope,
                ..
            } => {
                for operand in self.op.operands() {
                    write!(f, " {operand}")?;
                }
                write!(f, " {scope} {success} {failure}")?;
            }
            _ => {
                for operand in self.op.operands() {
                    write!(f, " {operand}")?;
                }
            }
        }
        if let Some(loc) = &self.loc {
            write!(f, " ; {loc}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_forms() {
        let call = Op::Call {
            callee: Callee::Direct(FuncId::new(0)),
            args: vec![Value::global("m")],
            ret: Type::I32,
        };
        let invoke = Op::Invoke {
            callee: Callee::Direct(FuncId::new(0)),
            args: vec![Value::global("m")],
            ret: Type::Void,
            normal: BlockId::new(1),
            unwind: BlockId::new(2),
        };

        assert_eq!(call.call_form(), Some(CallForm::Call));
        assert_eq!(invoke.call_form(), Some(CallForm::Invoke));
        assert!(!call.is_terminator());
        assert!(invoke.is_terminator());
        assert_eq!(invoke.successors(), vec![BlockId::new(1), BlockId::new(2)]);
        assert_eq!(call.result_type(), Type::I32);
    }

    #[test]
    fn test_indirect_callee_is_an_operand() {
        let op = Op::Call {
            callee: Callee::Indirect(Value::Arg(0)),
            args: vec![Value::global("m")],
            ret: Type::Void,
        };
        assert_eq!(op.operands().len(), 2);
        assert!(op.callee().and_then(Callee::function).is_none());
    }

    #[test]
    fn test_display() {
        let instr = Instruction::new(Op::Fence {
            ordering: AtomicOrdering::SequentiallyConsistent,
            scope: SyncScope::CrossThread,
        })
        .at(Some(DebugLoc::new("main.c", 12)));
        assert_eq!(instr.to_string(), "fence crossthread seq_cst ; main.c:12");
    }
}
