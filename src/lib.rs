// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![deny(unsafe_code)]

//! # syncmut
//!
//! Mutation operators for concurrent programs. `syncmut` takes a compiled program in a small
//! in-memory IR and injects concurrency faults into it: it removes, swaps, shifts or splits
//! lock/unlock pairs, weakens fences and atomic orderings, drops joins, yields and condition
//! signals, and rewrites semaphore counts. Test suites that still pass on the mutated program
//! are not exercising its synchronization.
//!
//! ## Features
//!
//! - **🔒 Lock/unlock pairing** - Matches POSIX and `std::mutex` lock calls with their unlocks
//!   through a pluggable alias oracle, across calls and invokes
//! - **🧬 Nine operators** - Mutexes, fences, atomics, volatile accesses, semaphores, joins,
//!   condition signals, condition waits and yields
//! - **🔢 Stable positions** - Find mode numbers the candidates; mutation mode takes those numbers
//! - **🛡️ Handle safety** - Generation-checked instruction handles catch edits to erased code
//! - **📋 Diagnostics** - Every edit and every skipped request is recorded, never silently dropped
//!
//! ## Quick Start
//!
//! ```rust
//! use syncmut::prelude::*;
//!
//! // Build a critical section: lock, store, unlock.
//! let mut module = Module::new("demo");
//! let lock = module.declare("pthread_mutex_lock", Type::I32);
//! let unlock = module.declare("pthread_mutex_unlock", Type::I32);
//! let mut f = module.build_function("worker", Type::Void);
//! f.block("entry");
//! f.call(lock, vec![Value::global("m")])?;
//! f.store(Value::global("shared"), Value::int(32, true, 1))?;
//! f.call(unlock, vec![Value::global("m")])?;
//! f.ret(None)?;
//! f.finish();
//!
//! // Find mode: one Call-Call pair.
//! let finder = MutexMutator::new(MutexConfig::new())?;
//! let outcome = run_pass(&finder, &mut module, &IdentityAlias)?;
//! assert_eq!(outcome.report.map(|r| r.to_string()), Some("0\t1\n".to_string()));
//!
//! // Remove pair (category 0, index 0).
//! let remover = MutexMutator::new(MutexConfig::remove(vec![0, 0]))?;
//! let outcome = run_pass(&remover, &mut module, &IdentityAlias)?;
//! assert!(outcome.modified);
//! assert_eq!(outcome.stats().removed, 1);
//! # Ok::<(), syncmut::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`ir`] - The program model and its edit primitives
//! - [`analysis`] - Read-only views: call sites, call enumeration, pair matching, collectors
//! - [`config`] - Operator configurations and their validation
//! - [`mutation`] - The operators, the run context and diagnostics
//! - [`prelude`] - Convenient re-exports
//! - [`Error`] and [`Result`] - Error handling

#[macro_use]
pub(crate) mod error;

/// Shared functionality which is used in unit- and integration-tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust
/// use syncmut::prelude::*;
///
/// let config = MutexConfig::swap(vec![0, 0, 0, 1]);
/// assert!(MutexMutator::new(config).is_ok());
/// ```
pub mod prelude;

/// The in-memory program model.
///
/// Functions hold blocks, blocks hold instruction handles, and the module owns the
/// instruction arena. All edits the operators perform (erase, insert, replace) are methods
/// of [`ir::Module`].
pub mod ir;

/// Read-only analyses over [`ir::Module`].
pub mod analysis;

/// Operator configurations.
///
/// Each operator has a configuration struct that mirrors its command-line switches.
/// `validate()` rejects contradictory combinations before anything is mutated.
pub mod config;

/// Mutation operators, run context and diagnostics.
pub mod mutation;

/// `syncmut` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type defaults to
/// [`Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// `syncmut` Error type
///
/// Returned for invalid configurations and for misuse of the program model. Skipped
/// mutation requests are warnings on the run's diagnostic log instead.
pub use error::Error;
