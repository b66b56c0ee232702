//! Read-only analyses over the program model.
//!
//! Everything in this module observes a [`crate::ir::Module`] without changing it:
//!
//! - [`alias`] - The alias oracle interface the pair matcher consumes
//! - [`callsite`] - [`CallSite`], one view over both call forms
//! - [`demangle`] - Target-name normalization
//! - [`enumerate`] - [`CallEnumerator`], call sites by target name
//! - [`pairs`] - [`PairIndex`], lock/unlock matching and position numbering
//! - [`visitors`] - Collectors for fences, atomics and volatile accesses

pub mod alias;
pub mod callsite;
pub mod demangle;
pub mod enumerate;
pub mod pairs;
pub mod visitors;

pub use alias::{AliasAnalysis, AliasResult, AliasTable, IdentityAlias};
pub use callsite::{CallSite, SiteForm};
pub use enumerate::{CallEnumerator, EnumeratedCalls};
pub use pairs::{LockUnlockPair, PairCategory, PairIndex, PrimitiveFamily, Role};
pub use visitors::{MemoryKind, MemorySite};
