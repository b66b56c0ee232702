//! In-memory program model the mutation operators work on.
//!
//! The model is a small SSA-like IR with exactly the features concurrency mutations need:
//! direct and indirect calls in both call forms, atomic memory operations with orderings
//! and synchronization scopes, fences, and source locations.
//!
//! # Key Components
//!
//! - [`Module`] - Functions plus the instruction arena and all edit primitives
//! - [`Function`] / [`Block`] - Layout (which instruction is where)
//! - [`Instruction`] / [`Op`] - What an instruction does
//! - [`InstId`] - Generation-checked handle; erased instructions are detected
//! - [`FunctionBuilder`] - Fluent construction API
//!
//! # Edit Primitives
//!
//! | Primitive | Method |
//! |---|---|
//! | erase-or-replace with zero | [`Module::erase_or_replace_with_zero`] |
//! | insert before | [`Module::insert_before`] |
//! | replace instruction with instruction | [`Module::replace_with`] |
//! | distance | [`Module::distance`] |
//! | relative insertion | [`Module::insert_relative`] |

mod block;
mod builder;
mod function;
mod instruction;
mod module;
mod types;

pub use block::{Block, BlockId};
pub use builder::FunctionBuilder;
pub use function::{FuncId, Function};
pub use instruction::{BinaryOp, CallAttrs, CallForm, Callee, InstId, Instruction, Op, RmwOp};
pub use module::{Module, Removal, Step};
pub use types::{AtomicOrdering, Constant, DebugLoc, SyncScope, Type, Value};
