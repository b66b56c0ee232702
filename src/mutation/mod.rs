//! Mutation operators and their run infrastructure.
//!
//! Every operator is a [`MutationPass`]: constructed from a validated configuration, it
//! either reports the candidates it would number (find mode) or edits the module in place
//! at the positions the configuration selects.
//!
//! # Operators
//!
//! | Operator | Candidates | Mutations |
//! |---|---|---|
//! | [`MutexMutator`] | lock/unlock pairs | remove, swap, shift, split |
//! | [`FenceMutator`] | `fence` | remove, ordering, scope |
//! | [`AtomicMutator`] | `cmpxchg`, `store`, `load`, `atomicrmw` | ordering, scope, atomicity |
//! | [`VolatileMutator`] | volatile accesses, volatile `memcpy` | clear volatile |
//! | [`SemaphoreMutator`] | `sem_init`, `sem_open` | initial value |
//! | [`JoinMutator`] | `pthread_join`, `std::thread::join` | remove, sleep |
//! | [`CondSignalMutator`] | `pthread_cond_signal`, `pthread_cond_broadcast` | remove, swap |
//! | [`CondWaitMutator`] | `pthread_cond_wait`, `pthread_cond_timedwait` | remove, switch, timeout |
//! | [`YieldMutator`] | `pthread_yield`, `sched_yield` | remove |
//!
//! # Diagnostics
//!
//! Skipped requests and completed edits are recorded on the [`DiagnosticLog`] of the
//! run's [`MutationContext`]; see [`Stats`] for a summary.

mod calls;
mod context;
mod events;
mod pass;
mod report;

mod atomic;
mod condvar;
mod fence;
mod join;
mod mutex;
mod semaphore;
mod volatile;
mod yielding;

pub use atomic::AtomicMutator;
pub use condvar::{CondSignalMutator, CondWaitMutator};
pub use context::{Claim, MutationContext};
pub use events::{Diagnostic, DiagnosticBuilder, DiagnosticIter, DiagnosticKind, DiagnosticLog, Stats};
pub use fence::FenceMutator;
pub use join::JoinMutator;
pub use mutex::MutexMutator;
pub use pass::{run_pass, MutationPass, PassOutcome};
pub use report::{OccurrenceReport, ReportLine};
pub use semaphore::SemaphoreMutator;
pub use volatile::VolatileMutator;
pub use yielding::YieldMutator;
