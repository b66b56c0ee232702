//! Collectors for memory-model instructions.
//!
//! Each collector walks the module in visitation order and returns one [`MemorySite`]
//! per matching instruction. The returned order is the user position order of the
//! corresponding operator.

use strum::Display;

use crate::{
    ir::{Constant, DebugLoc, FuncId, InstId, Module, Op, Value},
    Result,
};

/// Which kind of memory instruction a site is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum MemoryKind {
    /// `fence`
    #[strum(serialize = "fence")]
    Fence,
    /// `load`
    #[strum(serialize = "load")]
    Load,
    /// `store`
    #[strum(serialize = "store")]
    Store,
    /// `cmpxchg`
    #[strum(serialize = "cmpxchg")]
    CmpXchg,
    /// `atomicrmw`
    #[strum(serialize = "atomicrmw")]
    AtomicRmw,
    /// A call to an `llvm.memcpy*` intrinsic.
    #[strum(serialize = "memcpy")]
    MemCpy,
}

/// A memory instruction found by a collector.
#[derive(Debug, Clone, PartialEq)]
pub struct MemorySite {
    /// Instruction handle.
    pub id: InstId,
    /// Enclosing function.
    pub function: FuncId,
    /// Instruction kind.
    pub kind: MemoryKind,
    /// Source location, if known.
    pub loc: Option<DebugLoc>,
}

/// Argument index of the `isvolatile` flag of `llvm.memcpy*`.
pub const MEMCPY_VOLATILE_ARG: usize = 4;

fn collect<F>(module: &Module, mut select: F) -> Result<Vec<MemorySite>>
where
    F: FnMut(&Module, &Op) -> Option<MemoryKind>,
{
    let mut sites = Vec::new();
    for (function, id, inst) in module.iter_instructions() {
        if let Some(kind) = select(module, inst.op()) {
            sites.push(MemorySite {
                id,
                function,
                kind,
                loc: inst.loc().cloned(),
            });
        }
    }
    Ok(sites)
}

/// Collects all fences.
///
/// # Errors
///
/// Returns an error only if the module is internally inconsistent.
pub fn fences(module: &Module) -> Result<Vec<MemorySite>> {
    collect(module, |_, op| {
        matches!(op, Op::Fence { .. }).then_some(MemoryKind::Fence)
    })
}

/// Collects loads; with `only_atomic` plain loads are skipped.
///
/// # Errors
///
/// Returns an error only if the module is internally inconsistent.
pub fn loads(module: &Module, only_atomic: bool) -> Result<Vec<MemorySite>> {
    collect(module, |_, op| match op {
        Op::Load { ordering, .. } if !only_atomic || ordering.is_atomic() => Some(MemoryKind::Load),
        _ => None,
    })
}

/// Collects stores; with `only_atomic` plain stores are skipped.
///
/// # Errors
///
/// Returns an error only if the module is internally inconsistent.
pub fn stores(module: &Module, only_atomic: bool) -> Result<Vec<MemorySite>> {
    collect(module, |_, op| match op {
        Op::Store { ordering, .. } if !only_atomic || ordering.is_atomic() => {
            Some(MemoryKind::Store)
        }
        _ => None,
    })
}

/// Collects compare-and-exchange instructions.
///
/// # Errors
///
/// Returns an error only if the module is internally inconsistent.
pub fn cmpxchgs(module: &Module) -> Result<Vec<MemorySite>> {
    collect(module, |_, op| {
        matches!(op, Op::CmpXchg { .. }).then_some(MemoryKind::CmpXchg)
    })
}

/// Collects atomic read-modify-write instructions.
///
/// # Errors
///
/// Returns an error only if the module is internally inconsistent.
pub fn atomic_rmws(module: &Module) -> Result<Vec<MemorySite>> {
    collect(module, |_, op| {
        matches!(op, Op::AtomicRmw { .. }).then_some(MemoryKind::AtomicRmw)
    })
}

/// Returns true if `op` calls an `llvm.memcpy*` intrinsic with `isvolatile` set.
#[must_use]
pub fn is_volatile_memcpy(module: &Module, op: &Op) -> bool {
    let Some(target) = op.callee().and_then(|callee| callee.function()) else {
        return false;
    };
    let is_memcpy = module
        .function(target)
        .is_some_and(|f| f.name().starts_with("llvm.memcpy"));
    is_memcpy
        && op
            .call_args()
            .and_then(|args| args.get(MEMCPY_VOLATILE_ARG))
            .and_then(Value::as_const)
            .and_then(Constant::as_int)
            == Some(1)
}

/// Collects volatile accesses: volatile loads, stores, cmpxchg and atomicrmw, plus
/// volatile `llvm.memcpy*` calls.
///
/// # Errors
///
/// Returns an error only if the module is internally inconsistent.
pub fn volatiles(module: &Module) -> Result<Vec<MemorySite>> {
    collect(module, |module, op| match op {
        Op::Load { volatile: true, .. } => Some(MemoryKind::Load),
        Op::Store { volatile: true, .. } => Some(MemoryKind::Store),
        Op::CmpXchg { volatile: true, .. } => Some(MemoryKind::CmpXchg),
        Op::AtomicRmw { volatile: true, .. } => Some(MemoryKind::AtomicRmw),
        Op::Call { .. } | Op::Invoke { .. } if is_volatile_memcpy(module, op) => {
            Some(MemoryKind::MemCpy)
        }
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{AtomicOrdering, RmwOp, SyncScope, Type};

    #[test]
    fn test_collectors() -> Result<()> {
        let mut module = Module::new("test");
        let memcpy = module.declare("llvm.memcpy.p0.p0.i64", Type::Void);
        let mut f = module.build_function("f", Type::Void);
        f.block("entry");
        f.fence(AtomicOrdering::SequentiallyConsistent, SyncScope::CrossThread)?;
        f.load(Value::global("x"), Type::I32)?;
        f.atomic_load(
            Value::global("x"),
            Type::I32,
            AtomicOrdering::Acquire,
            SyncScope::CrossThread,
        )?;
        f.store(Value::global("x"), Value::int(32, true, 1))?;
        f.volatile_store(Value::global("y"), Value::int(32, true, 2))?;
        f.atomic_rmw(
            RmwOp::Add,
            Value::global("x"),
            Value::int(32, true, 1),
            Type::I32,
            AtomicOrdering::Monotonic,
        )?;
        let args = |flag| {
            vec![
                Value::global("d"),
                Value::global("s"),
                Value::int(64, false, 8),
                Value::int(32, false, 4),
                Value::int(1, false, flag),
            ]
        };
        f.call(memcpy, args(1))?;
        f.call(memcpy, args(0))?;
        f.ret(None)?;
        f.finish();

        assert_eq!(fences(&module)?.len(), 1);
        assert_eq!(loads(&module, false)?.len(), 2);
        assert_eq!(loads(&module, true)?.len(), 1);
        assert_eq!(stores(&module, false)?.len(), 2);
        assert_eq!(stores(&module, true)?.len(), 0);
        assert_eq!(atomic_rmws(&module)?.len(), 1);
        assert!(cmpxchgs(&module)?.is_empty());

        let volatile: Vec<_> = volatiles(&module)?.into_iter().map(|s| s.kind).collect();
        assert_eq!(volatile, vec![MemoryKind::Store, MemoryKind::MemCpy]);
        Ok(())
    }
}
