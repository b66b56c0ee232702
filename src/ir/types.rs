//! Types, constants, operands and memory-model attributes of the IR.
//!
//! Values are plain data: an operand either names the result of another instruction
//! (through a generation-checked [`InstId`]), a function parameter, a global symbol, or a
//! constant. Erasing an instruction whose result is still consumed rewrites every
//! [`Value::Inst`] operand that names it into a [`Value::Const`] of the requested width,
//! which keeps the dependents well typed.
//!
//! # Thread Safety
//!
//! All types in this module are `Send` and `Sync`.

use std::fmt;

use strum::{Display, EnumIter, EnumString};

use crate::ir::InstId;

/// The type of a value produced by an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    /// No value (void calls, stores, fences, terminators).
    Void,
    /// Integer of the given bit width.
    Int(u32),
    /// Opaque pointer.
    Ptr,
}

impl Type {
    /// 1-bit integer (booleans, `isvolatile` flags).
    pub const I1: Type = Type::Int(1);
    /// 32-bit integer (`int` return values of POSIX primitives).
    pub const I32: Type = Type::Int(32);
    /// 64-bit integer.
    pub const I64: Type = Type::Int(64);

    /// Returns true for [`Type::Void`].
    #[must_use]
    pub const fn is_void(&self) -> bool {
        matches!(self, Type::Void)
    }

    /// Returns the bit width of integer types.
    #[must_use]
    pub const fn bit_width(&self) -> Option<u32> {
        match self {
            Type::Int(bits) => Some(*bits),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Void => f.write_str("void"),
            Type::Int(bits) => write!(f, "i{bits}"),
            Type::Ptr => f.write_str("ptr"),
        }
    }
}

/// A compile-time constant operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Constant {
    /// Integer constant with explicit width and signedness.
    Int {
        /// Bit width of the constant
        width: u32,
        /// Whether the value is interpreted as signed
        signed: bool,
        /// The value (sign-extended)
        value: i64,
    },
    /// Null pointer.
    Null,
}

impl Constant {
    /// Creates an integer constant.
    #[must_use]
    pub const fn int(width: u32, signed: bool, value: i64) -> Self {
        Constant::Int {
            width,
            signed,
            value,
        }
    }

    /// Creates the zero constant used by erase-or-replace.
    #[must_use]
    pub const fn zero(width: u32, signed: bool) -> Self {
        Self::int(width, signed, 0)
    }

    /// Returns the integer value, if this is an integer constant.
    #[must_use]
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Constant::Int { value, .. } => Some(*value),
            Constant::Null => None,
        }
    }

    /// Returns the type of the constant.
    #[must_use]
    pub const fn ty(&self) -> Type {
        match self {
            Constant::Int { width, .. } => Type::Int(*width),
            Constant::Null => Type::Ptr,
        }
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Int { width, value, .. } => write!(f, "i{width} {value}"),
            Constant::Null => f.write_str("null"),
        }
    }
}

/// An instruction operand.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    /// Result of another instruction in the same function.
    Inst(InstId),
    /// Function parameter by position.
    Arg(u32),
    /// Global symbol (a global mutex, a timespec, ...).
    Global(String),
    /// Constant.
    Const(Constant),
    /// Undefined value.
    Undef,
}

impl Value {
    /// Creates a reference to a global symbol.
    pub fn global(name: impl Into<String>) -> Self {
        Value::Global(name.into())
    }

    /// Creates an integer constant operand.
    #[must_use]
    pub const fn int(width: u32, signed: bool, value: i64) -> Self {
        Value::Const(Constant::int(width, signed, value))
    }

    /// Returns the instruction this operand refers to, if any.
    #[must_use]
    pub const fn as_inst(&self) -> Option<InstId> {
        match self {
            Value::Inst(id) => Some(*id),
            _ => None,
        }
    }

    /// Returns the constant, if this operand is one.
    #[must_use]
    pub const fn as_const(&self) -> Option<&Constant> {
        match self {
            Value::Const(c) => Some(c),
            _ => None,
        }
    }

    /// Returns true if the operand uses the result of `id`.
    #[must_use]
    pub fn uses(&self, id: InstId) -> bool {
        matches!(self, Value::Inst(other) if *other == id)
    }
}

impl From<InstId> for Value {
    fn from(id: InstId) -> Self {
        Value::Inst(id)
    }
}

impl From<Constant> for Value {
    fn from(c: Constant) -> Self {
        Value::Const(c)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Inst(id) => write!(f, "{id}"),
            Value::Arg(n) => write!(f, "%arg{n}"),
            Value::Global(name) => write!(f, "@{name}"),
            Value::Const(c) => write!(f, "{c}"),
            Value::Undef => f.write_str("undef"),
        }
    }
}

/// Memory ordering of atomic instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
pub enum AtomicOrdering {
    /// Plain, non-atomic access.
    #[strum(serialize = "not_atomic")]
    NotAtomic,
    /// `unordered`
    #[strum(serialize = "unordered")]
    Unordered,
    /// `monotonic` (C++ relaxed)
    #[strum(serialize = "monotonic")]
    Monotonic,
    /// `acquire`
    #[strum(serialize = "acquire")]
    Acquire,
    /// `release`
    #[strum(serialize = "release")]
    Release,
    /// `acq_rel`
    #[strum(serialize = "acq_rel")]
    AcquireRelease,
    /// `seq_cst`
    #[strum(serialize = "seq_cst")]
    SequentiallyConsistent,
}

impl AtomicOrdering {
    /// Returns true for every ordering except [`AtomicOrdering::NotAtomic`].
    #[must_use]
    pub const fn is_atomic(&self) -> bool {
        !matches!(self, AtomicOrdering::NotAtomic)
    }
}

/// Synchronization scope of atomic instructions and fences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
pub enum SyncScope {
    /// Synchronizes only with code running on the same thread (signal handlers).
    #[strum(serialize = "singlethread")]
    SingleThread,
    /// Synchronizes with all threads.
    #[strum(serialize = "crossthread")]
    CrossThread,
}

impl SyncScope {
    /// Returns the other scope.
    #[must_use]
    pub const fn toggled(self) -> Self {
        match self {
            SyncScope::SingleThread => SyncScope::CrossThread,
            SyncScope::CrossThread => SyncScope::SingleThread,
        }
    }
}

/// Source location attached to an instruction (from debug metadata).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DebugLoc {
    /// Source file name
    pub file: String,
    /// 1-based line number
    pub line: u32,
}

impl DebugLoc {
    /// Creates a new debug location.
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }
}

impl fmt::Display for DebugLoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn test_zero_constant_keeps_width() {
        let zero = Constant::zero(32, true);
        assert_eq!(zero.as_int(), Some(0));
        assert_eq!(zero.ty(), Type::I32);
    }

    #[test]
    fn test_ordering_names() {
        assert_eq!(AtomicOrdering::AcquireRelease.to_string(), "acq_rel");
        assert_eq!(
            AtomicOrdering::from_str("seq_cst").ok(),
            Some(AtomicOrdering::SequentiallyConsistent)
        );
        assert!(!AtomicOrdering::NotAtomic.is_atomic());
        assert!(AtomicOrdering::Unordered.is_atomic());
    }

    #[test]
    fn test_scope_toggle() {
        assert_eq!(SyncScope::SingleThread.toggled(), SyncScope::CrossThread);
        assert_eq!(
            SyncScope::CrossThread.toggled().toggled(),
            SyncScope::CrossThread
        );
    }

    #[test]
    fn test_value_display() {
        assert_eq!(Value::global("mtx").to_string(), "@mtx");
        assert_eq!(Value::int(32, true, 0).to_string(), "i32 0");
        assert_eq!(Value::Arg(1).to_string(), "%arg1");
    }
}
