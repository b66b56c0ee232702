//! # syncmut Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and traits
//! from the syncmut library. Import this module to get quick access to the program model,
//! the operators and their configurations.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all syncmut operations
pub use crate::Error;

/// The result type used throughout syncmut
pub use crate::Result;

// ================================================================================================
// Program Model
// ================================================================================================

/// Module, functions and the builder
pub use crate::ir::{FuncId, Function, FunctionBuilder, Module};

/// Instructions and their handles
pub use crate::ir::{BlockId, CallForm, InstId, Instruction, Op};

/// Values, types and memory-model attributes
pub use crate::ir::{AtomicOrdering, DebugLoc, SyncScope, Type, Value};

// ================================================================================================
// Analysis
// ================================================================================================

/// Alias oracle interface and the two built-in oracles
pub use crate::analysis::{AliasAnalysis, AliasResult, AliasTable, IdentityAlias};

/// Call sites and lock/unlock pairs
pub use crate::analysis::{CallEnumerator, CallSite, LockUnlockPair, PairCategory, PairIndex};

// ================================================================================================
// Configuration
// ================================================================================================

/// Operator configurations
pub use crate::config::{
    AtomicConfig, AtomicMode, AtomicTarget, CondSignalConfig, CondSignalMode, CondWaitConfig,
    CondWaitMode, FenceConfig, FenceMode, JoinConfig, JoinMode, MutexConfig, MutexMode,
    PairAddressing, SemaphoreConfig, VolatileConfig, YieldConfig,
};

// ================================================================================================
// Mutation
// ================================================================================================

/// The operator interface and the driver
pub use crate::mutation::{run_pass, MutationContext, MutationPass, PassOutcome};

/// Operators
pub use crate::mutation::{
    AtomicMutator, CondSignalMutator, CondWaitMutator, FenceMutator, JoinMutator, MutexMutator,
    SemaphoreMutator, VolatileMutator, YieldMutator,
};

/// Diagnostics and reports
pub use crate::mutation::{DiagnosticKind, DiagnosticLog, OccurrenceReport, Stats};
