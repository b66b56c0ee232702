//! Operator configuration.
//!
//! One plain struct per operator: public fields, a [`Default`] that selects find mode,
//! mode constructors, `with_*` setters and a `validate()` that rejects contradictory or
//! incomplete parameter sets before any mutation is attempted. Operator constructors call
//! `validate()` themselves, so an operator that exists always has a usable configuration.
//!
//! Positions are zero-based indices into the candidate list of an operator. For the mutex
//! operator they come in `(category, index)` pairs (or `(function, index)` pairs, see
//! [`PairAddressing`]); for all other operators each position is a single index.

use strum::{Display, EnumString};

use crate::{ir::AtomicOrdering, Result};

/// Largest permit count a semaphore accepts.
pub const SEM_VALUE_MAX: u32 = i32::MAX as u32;

/// Default argument of the `sleep()` call that replaces a thread join.
pub const DEFAULT_SLEEP_SECONDS: u32 = 1;

/// How the numeric ordering codes of a command line map onto orderings.
///
/// Every instruction kind accepts a different set of orderings, so each has its own code
/// table:
///
/// | code | fence | cmpxchg / atomicrmw | store | load |
/// |---|---|---|---|---|
/// | 0 | acquire | monotonic | unordered | unordered |
/// | 1 | release | acquire | monotonic | monotonic |
/// | 2 | acq_rel | release | release | acquire |
/// | 3 | seq_cst | acq_rel | seq_cst | seq_cst |
/// | 4 | - | seq_cst | - | - |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum OrderingTable {
    /// Codes for `fence`.
    #[strum(serialize = "fence")]
    Fence,
    /// Codes for `cmpxchg` and `atomicrmw`.
    #[strum(serialize = "cmpxchg")]
    CmpXchg,
    /// Codes for `store`.
    #[strum(serialize = "store")]
    Store,
    /// Codes for `load`.
    #[strum(serialize = "load")]
    Load,
}

impl OrderingTable {
    /// Maps a code to an ordering, or `None` if the code is too large.
    #[must_use]
    pub const fn decode(&self, code: u32) -> Option<AtomicOrdering> {
        use AtomicOrdering::{
            Acquire, AcquireRelease, Monotonic, Release, SequentiallyConsistent, Unordered,
        };

        let ordering = match (self, code) {
            (OrderingTable::Fence, 0) => Acquire,
            (OrderingTable::Fence, 1) => Release,
            (OrderingTable::Fence, 2) => AcquireRelease,
            (OrderingTable::Fence, 3) => SequentiallyConsistent,
            (OrderingTable::CmpXchg, 0) => Monotonic,
            (OrderingTable::CmpXchg, 1) => Acquire,
            (OrderingTable::CmpXchg, 2) => Release,
            (OrderingTable::CmpXchg, 3) => AcquireRelease,
            (OrderingTable::CmpXchg, 4) => SequentiallyConsistent,
            (OrderingTable::Store, 0) | (OrderingTable::Load, 0) => Unordered,
            (OrderingTable::Store, 1) | (OrderingTable::Load, 1) => Monotonic,
            (OrderingTable::Store, 2) => Release,
            (OrderingTable::Load, 2) => Acquire,
            (OrderingTable::Store, 3) | (OrderingTable::Load, 3) => SequentiallyConsistent,
            _ => return None,
        };
        Some(ordering)
    }

    /// Returns the largest valid code.
    #[must_use]
    pub const fn max_code(&self) -> u32 {
        match self {
            OrderingTable::CmpXchg => 4,
            _ => 3,
        }
    }

    /// Checks that every code of `orders` is valid.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Config`] naming the first code that is too large.
    pub fn check(&self, orders: &[u32]) -> Result<()> {
        match orders.iter().position(|code| *code > self.max_code()) {
            Some(index) => Err(config_error!(
                "{} ordering value {} at index {} is too large (maximum is {})",
                self,
                orders[index],
                index,
                self.max_code()
            )),
            None => Ok(()),
        }
    }
}

/// Returns the element for the `index`-th request, reusing the last element when the list
/// is shorter than the request list.
#[must_use]
pub fn nth_or_last<T: Copy>(values: &[T], index: usize) -> Option<T> {
    values.get(index).or_else(|| values.last()).copied()
}

fn require_positions(positions: &[usize], what: &str) -> Result<()> {
    if positions.is_empty() {
        return Err(config_error!("{} requires at least one position", what));
    }
    Ok(())
}

// ── Mutex ───────────────────────────────────────────────────────────────

/// Mutex operator modes. Find mode is the absence of a mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum MutexMode {
    /// Delete both calls of each selected pair.
    Remove,
    /// Exchange the lock calls and the unlock calls of two pairs.
    Swap,
    /// Move the lock and/or unlock call of each selected pair.
    Shift,
    /// Insert an unlock/lock pair inside each selected critical section.
    Split,
}

/// How the two numbers of a mutex position select a pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display)]
pub enum PairAddressing {
    /// `(category, index)`: the index counts pairs of one category over the module.
    #[default]
    #[strum(serialize = "category")]
    Category,
    /// `(function, index)`: the index counts pairs of one function, all categories.
    #[strum(serialize = "function")]
    Function,
}

/// Configuration of the mutex operator.
///
/// # Examples
///
/// ```rust
/// use syncmut::config::MutexConfig;
///
/// // Split pair (0, 0) with an unlock after 3 and a lock after 7 instructions.
/// let config = MutexConfig::split(vec![0, 0], vec![3, 7]);
/// assert!(config.validate().is_ok());
///
/// // Swapping needs positions in groups of four.
/// assert!(MutexConfig::swap(vec![0, 0, 0]).validate().is_err());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MutexConfig {
    /// Selected mode; `None` only reports the pairs.
    pub mode: Option<MutexMode>,

    /// How positions select pairs (default: by category).
    pub addressing: PairAddressing,

    /// Flattened position pairs (swap: groups of four).
    pub positions: Vec<usize>,

    /// Shift of the lock call of each selected pair.
    pub lock_dirs: Vec<isize>,

    /// Shift of the unlock call of each selected pair.
    pub unlock_dirs: Vec<isize>,

    /// Flattened `(unlock offset, lock offset)` pairs for split.
    pub split_positions: Vec<usize>,

    /// Report each pair with locations instead of per-category counts.
    pub verbose: bool,
}

impl MutexConfig {
    /// Creates a find-mode configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a remove configuration.
    #[must_use]
    pub fn remove(positions: Vec<usize>) -> Self {
        Self {
            mode: Some(MutexMode::Remove),
            positions,
            ..Self::default()
        }
    }

    /// Creates a swap configuration; positions are `(cat1, idx1, cat2, idx2)` groups.
    #[must_use]
    pub fn swap(positions: Vec<usize>) -> Self {
        Self {
            mode: Some(MutexMode::Swap),
            positions,
            ..Self::default()
        }
    }

    /// Creates a shift configuration.
    #[must_use]
    pub fn shift(positions: Vec<usize>, lock_dirs: Vec<isize>, unlock_dirs: Vec<isize>) -> Self {
        Self {
            mode: Some(MutexMode::Shift),
            positions,
            lock_dirs,
            unlock_dirs,
            ..Self::default()
        }
    }

    /// Creates a split configuration.
    #[must_use]
    pub fn split(positions: Vec<usize>, split_positions: Vec<usize>) -> Self {
        Self {
            mode: Some(MutexMode::Split),
            positions,
            split_positions,
            ..Self::default()
        }
    }

    /// Builds the mode from four independent mode switches, as a command line delivers
    /// them.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Config`] if more than one switch is set.
    pub fn from_flags(remove: bool, swap: bool, shift: bool, split: bool) -> Result<Self> {
        let flags = [
            (remove, MutexMode::Remove),
            (swap, MutexMode::Swap),
            (shift, MutexMode::Shift),
            (split, MutexMode::Split),
        ];
        let selected: Vec<MutexMode> = flags
            .iter()
            .filter(|(set, _)| *set)
            .map(|(_, mode)| *mode)
            .collect();

        match selected.as_slice() {
            [] => Ok(Self::default()),
            [mode] => Ok(Self {
                mode: Some(*mode),
                ..Self::default()
            }),
            [first, second, ..] => Err(config_error!(
                "{} and {} cannot be specified at the same time",
                first,
                second
            )),
        }
    }

    /// Sets the positions.
    #[must_use]
    pub fn with_positions(mut self, positions: Vec<usize>) -> Self {
        self.positions = positions;
        self
    }

    /// Sets the pair addressing.
    #[must_use]
    pub fn with_addressing(mut self, addressing: PairAddressing) -> Self {
        self.addressing = addressing;
        self
    }

    /// Sets the lock shift directions.
    #[must_use]
    pub fn with_lock_dirs(mut self, dirs: Vec<isize>) -> Self {
        self.lock_dirs = dirs;
        self
    }

    /// Sets the unlock shift directions.
    #[must_use]
    pub fn with_unlock_dirs(mut self, dirs: Vec<isize>) -> Self {
        self.unlock_dirs = dirs;
        self
    }

    /// Sets the split offsets.
    #[must_use]
    pub fn with_split_positions(mut self, split_positions: Vec<usize>) -> Self {
        self.split_positions = split_positions;
        self
    }

    /// Enables verbose reports.
    #[must_use]
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Checks the parameter lists against the selected mode.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Config`] describing the first violated rule.
    pub fn validate(&self) -> Result<()> {
        let Some(mode) = self.mode else {
            return Ok(());
        };

        if self.positions.is_empty() {
            return Err(config_error!("{} but no positions to mutate", mode));
        }

        match mode {
            MutexMode::Remove | MutexMode::Shift | MutexMode::Split => {
                if self.positions.len() % 2 != 0 {
                    return Err(config_error!(
                        "{} requires an even number of positions (pairs), got {}",
                        mode,
                        self.positions.len()
                    ));
                }
            }
            MutexMode::Swap => {
                if self.positions.len() % 4 != 0 {
                    return Err(config_error!(
                        "swap requires positions in groups of 4 (pairs of pairs), got {}",
                        self.positions.len()
                    ));
                }
            }
        }

        match mode {
            MutexMode::Remove | MutexMode::Swap | MutexMode::Split => {
                if !self.lock_dirs.is_empty() {
                    return Err(config_error!("lock directions are not used with {}", mode));
                }
                if !self.unlock_dirs.is_empty() {
                    return Err(config_error!("unlock directions are not used with {}", mode));
                }
            }
            MutexMode::Shift => {
                if self.lock_dirs.is_empty() && self.unlock_dirs.is_empty() {
                    return Err(config_error!(
                        "shift specified with no lock or unlock directions"
                    ));
                }
            }
        }

        if mode == MutexMode::Split {
            if self.split_positions.is_empty() {
                return Err(config_error!(
                    "split requires at least one pair of split positions"
                ));
            }
            if self.split_positions.len() % 2 != 0 {
                return Err(config_error!(
                    "split positions need to be specified in pairs, got {}",
                    self.split_positions.len()
                ));
            }
        } else if !self.split_positions.is_empty() {
            return Err(config_error!("split positions are not used with {}", mode));
        }

        Ok(())
    }
}

// ── Fence ───────────────────────────────────────────────────────────────

/// Fence operator modes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FenceMode {
    /// Erase the selected fences.
    Remove,
    /// Set the ordering of the selected fences from [`OrderingTable::Fence`] codes.
    Ordering {
        /// One code per position; the last code is reused for surplus positions
        orders: Vec<u32>,
    },
    /// Toggle single-thread / cross-thread scope.
    ToggleScope,
}

/// Configuration of the fence operator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FenceConfig {
    /// Selected mode; `None` only reports the fences.
    pub mode: Option<FenceMode>,
    /// Fence positions.
    pub positions: Vec<usize>,
    /// Report locations instead of a count.
    pub verbose: bool,
}

impl FenceConfig {
    /// Creates a find-mode configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration for `mode` at `positions`.
    #[must_use]
    pub fn mutate(mode: FenceMode, positions: Vec<usize>) -> Self {
        Self {
            mode: Some(mode),
            positions,
            verbose: false,
        }
    }

    /// Builds the mode from the three command-line switches.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Config`] if more than one switch is set.
    pub fn from_flags(remove: bool, orders: Option<Vec<u32>>, scope: bool) -> Result<Self> {
        let mode = match (remove, orders, scope) {
            (false, None, false) => None,
            (true, None, false) => Some(FenceMode::Remove),
            (false, Some(orders), false) => Some(FenceMode::Ordering { orders }),
            (false, None, true) => Some(FenceMode::ToggleScope),
            (true, Some(_), _) => return Err(config_error!("remove and ordering specified")),
            (true, None, true) => return Err(config_error!("remove and scope specified")),
            (false, Some(_), true) => return Err(config_error!("ordering and scope specified")),
        };
        Ok(Self {
            mode,
            ..Self::default()
        })
    }

    /// Sets the positions.
    #[must_use]
    pub fn with_positions(mut self, positions: Vec<usize>) -> Self {
        self.positions = positions;
        self
    }

    /// Enables verbose reports.
    #[must_use]
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Checks the parameters against the selected mode.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Config`] describing the first violated rule.
    pub fn validate(&self) -> Result<()> {
        match &self.mode {
            None => Ok(()),
            Some(FenceMode::Remove) => require_positions(&self.positions, "fence removal"),
            Some(FenceMode::ToggleScope) => {
                require_positions(&self.positions, "fence scope toggling")
            }
            Some(FenceMode::Ordering { orders }) => {
                require_positions(&self.positions, "fence ordering change")?;
                if orders.is_empty() {
                    return Err(config_error!("fence ordering change but no orderings given"));
                }
                OrderingTable::Fence.check(orders)
            }
        }
    }
}

// ── Atomic instructions ─────────────────────────────────────────────────

/// Modes shared by the atomic instruction operators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AtomicMode {
    /// Set the ordering from the operator's [`OrderingTable`] codes.
    Ordering {
        /// One code per position; the last code is reused for surplus positions
        orders: Vec<u32>,
    },
    /// Toggle single-thread / cross-thread scope.
    ToggleScope,
    /// Make an atomic store a plain store (stores only).
    ToggleAtomic,
}

/// Which instruction kind an [`AtomicConfig`] targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum AtomicTarget {
    /// `cmpxchg` (the success ordering is changed).
    #[strum(serialize = "cmpxchg")]
    CmpXchg,
    /// `store`.
    #[strum(serialize = "store")]
    Store,
    /// `load`.
    #[strum(serialize = "load")]
    Load,
    /// `atomicrmw`.
    #[strum(serialize = "atomicrmw")]
    AtomicRmw,
}

impl AtomicTarget {
    /// Returns the ordering code table of the target.
    #[must_use]
    pub const fn table(&self) -> OrderingTable {
        match self {
            AtomicTarget::CmpXchg | AtomicTarget::AtomicRmw => OrderingTable::CmpXchg,
            AtomicTarget::Store => OrderingTable::Store,
            AtomicTarget::Load => OrderingTable::Load,
        }
    }
}

/// Configuration of the compare-exchange, store, load and atomicrmw operators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtomicConfig {
    /// Instruction kind.
    pub target: AtomicTarget,
    /// Selected mode; `None` only reports the candidates.
    pub mode: Option<AtomicMode>,
    /// Candidate positions.
    pub positions: Vec<usize>,
    /// Only enumerate atomic loads and stores (ignored for cmpxchg and atomicrmw).
    pub only_atomic: bool,
    /// Report locations instead of a count.
    pub verbose: bool,
}

impl AtomicConfig {
    /// Creates a find-mode configuration for `target`.
    #[must_use]
    pub fn new(target: AtomicTarget) -> Self {
        Self {
            target,
            mode: None,
            positions: Vec::new(),
            only_atomic: false,
            verbose: false,
        }
    }

    /// Creates a configuration for `mode` at `positions`.
    #[must_use]
    pub fn mutate(target: AtomicTarget, mode: AtomicMode, positions: Vec<usize>) -> Self {
        Self {
            mode: Some(mode),
            positions,
            ..Self::new(target)
        }
    }

    /// Builds the mode from the command-line switches of the store operator (the other
    /// targets pass `toggle = false`).
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Config`] if more than one switch is set.
    pub fn from_flags(
        target: AtomicTarget,
        toggle: bool,
        orders: Option<Vec<u32>>,
        scope: bool,
    ) -> Result<Self> {
        let mode = match (toggle, orders, scope) {
            (false, None, false) => None,
            (true, None, false) => Some(AtomicMode::ToggleAtomic),
            (false, Some(orders), false) => Some(AtomicMode::Ordering { orders }),
            (false, None, true) => Some(AtomicMode::ToggleScope),
            (true, Some(_), _) => {
                return Err(config_error!("ordering and toggle can not both be specified"))
            }
            (true, None, true) => {
                return Err(config_error!("toggle and scope can not both be specified"))
            }
            (false, Some(_), true) => {
                return Err(config_error!("ordering and scope can not both be specified"))
            }
        };
        Ok(Self {
            mode,
            ..Self::new(target)
        })
    }

    /// Sets the positions.
    #[must_use]
    pub fn with_positions(mut self, positions: Vec<usize>) -> Self {
        self.positions = positions;
        self
    }

    /// Restricts loads and stores to atomic ones.
    #[must_use]
    pub fn with_only_atomic(mut self, only_atomic: bool) -> Self {
        self.only_atomic = only_atomic;
        self
    }

    /// Enables verbose reports.
    #[must_use]
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Checks the parameters against the selected mode.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Config`] describing the first violated rule.
    pub fn validate(&self) -> Result<()> {
        let Some(mode) = &self.mode else {
            return Ok(());
        };
        require_positions(&self.positions, &format!("{} mutation", self.target))?;
        match mode {
            AtomicMode::Ordering { orders } => {
                if orders.is_empty() {
                    return Err(config_error!(
                        "{} ordering change but no orderings given",
                        self.target
                    ));
                }
                self.target.table().check(orders)
            }
            AtomicMode::ToggleAtomic if self.target != AtomicTarget::Store => Err(config_error!(
                "atomicity toggling is only supported for stores, not {}",
                self.target
            )),
            AtomicMode::ToggleAtomic | AtomicMode::ToggleScope => Ok(()),
        }
    }
}

// ── Volatile ────────────────────────────────────────────────────────────

/// Configuration of the volatile operator. Empty positions mean find mode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VolatileConfig {
    /// Positions whose volatile flag is cleared.
    pub positions: Vec<usize>,
    /// Report locations instead of a count.
    pub verbose: bool,
}

impl VolatileConfig {
    /// Creates a removal configuration.
    #[must_use]
    pub fn remove(positions: Vec<usize>) -> Self {
        Self {
            positions,
            verbose: false,
        }
    }

    /// Enables verbose reports.
    #[must_use]
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Always succeeds; every position list is meaningful.
    ///
    /// # Errors
    ///
    /// Never returns an error.
    pub fn validate(&self) -> Result<()> {
        Ok(())
    }
}

// ── Semaphore ───────────────────────────────────────────────────────────

/// Configuration of the semaphore permit operator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SemaphoreConfig {
    /// Rewrite permit counts; otherwise only report.
    pub modify: bool,
    /// Call positions.
    pub positions: Vec<usize>,
    /// New permit count per position (by list index).
    pub values: Vec<u32>,
    /// Permit count for positions without a value.
    pub fallback: u32,
    /// Report locations instead of a count.
    pub verbose: bool,
}

impl SemaphoreConfig {
    /// Creates a modify configuration.
    #[must_use]
    pub fn modify(positions: Vec<usize>, values: Vec<u32>) -> Self {
        Self {
            modify: true,
            positions,
            values,
            ..Self::default()
        }
    }

    /// Sets the fallback permit count.
    #[must_use]
    pub fn with_fallback(mut self, fallback: u32) -> Self {
        self.fallback = fallback;
        self
    }

    /// Enables verbose reports.
    #[must_use]
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Checks the parameters.
    ///
    /// Missing positions in modify mode are not an error; the run warns instead.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Config`] if verbose output is combined with modify mode.
    pub fn validate(&self) -> Result<()> {
        if self.modify && self.verbose {
            return Err(config_error!("verbose output has no meaning when modifying"));
        }
        Ok(())
    }
}

// ── Thread join ─────────────────────────────────────────────────────────

/// Thread join operator modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinMode {
    /// Remove the join call.
    Remove,
    /// Replace the join with `sleep(seconds)`.
    ReplaceWithSleep {
        /// Argument of the `sleep()` call
        seconds: u32,
    },
}

/// Configuration of the thread join operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinConfig {
    /// Match `pthread_join`.
    pub posix: bool,
    /// Match `std::thread::join`.
    pub cxx11: bool,
    /// Selected mode; `None` only reports the joins.
    pub mode: Option<JoinMode>,
    /// Join positions.
    pub positions: Vec<usize>,
    /// Report locations instead of a count.
    pub verbose: bool,
}

impl Default for JoinConfig {
    fn default() -> Self {
        Self {
            posix: true,
            cxx11: false,
            mode: None,
            positions: Vec::new(),
            verbose: false,
        }
    }
}

impl JoinConfig {
    /// Creates a find-mode configuration for POSIX joins.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a removal configuration for POSIX joins.
    #[must_use]
    pub fn remove(positions: Vec<usize>) -> Self {
        Self {
            mode: Some(JoinMode::Remove),
            positions,
            ..Self::default()
        }
    }

    /// Creates a sleep-replacement configuration for POSIX joins.
    #[must_use]
    pub fn replace_with_sleep(positions: Vec<usize>, seconds: u32) -> Self {
        Self {
            mode: Some(JoinMode::ReplaceWithSleep { seconds }),
            positions,
            ..Self::default()
        }
    }

    /// Builds the mode from the remove/replace switches.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Config`] if both switches are set.
    pub fn from_flags(remove: bool, replace: bool, sleep_seconds: Option<u32>) -> Result<Self> {
        let mode = match (remove, replace) {
            (true, true) => {
                return Err(config_error!(
                    "both remove mode and replace mode were specified"
                ))
            }
            (true, false) => Some(JoinMode::Remove),
            (false, true) => Some(JoinMode::ReplaceWithSleep {
                seconds: sleep_seconds.unwrap_or(DEFAULT_SLEEP_SECONDS),
            }),
            (false, false) => None,
        };
        Ok(Self {
            mode,
            ..Self::default()
        })
    }

    /// Selects the join families.
    #[must_use]
    pub fn with_families(mut self, posix: bool, cxx11: bool) -> Self {
        self.posix = posix;
        self.cxx11 = cxx11;
        self
    }

    /// Sets the positions.
    #[must_use]
    pub fn with_positions(mut self, positions: Vec<usize>) -> Self {
        self.positions = positions;
        self
    }

    /// Enables verbose reports.
    #[must_use]
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Checks the parameters.
    ///
    /// Missing positions in remove mode are not an error; the run warns instead.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Config`] describing the first violated rule.
    pub fn validate(&self) -> Result<()> {
        if !self.posix && !self.cxx11 {
            return Err(config_error!(
                "at least one of the POSIX or C++11 join families must be selected"
            ));
        }
        match self.mode {
            Some(JoinMode::Remove) if self.verbose => {
                Err(config_error!("verbose output has no meaning with remove"))
            }
            Some(JoinMode::ReplaceWithSleep { .. }) if self.verbose => {
                Err(config_error!("verbose output has no meaning with replace"))
            }
            _ => Ok(()),
        }
    }
}

// ── Condition variables ─────────────────────────────────────────────────

/// Condition signal operator modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CondSignalMode {
    /// Remove the signal or broadcast.
    Remove,
    /// Turn a signal into a broadcast and a broadcast into a signal.
    Swap,
}

/// Configuration of the condition signal operator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CondSignalConfig {
    /// Selected mode; `None` only reports the calls.
    pub mode: Option<CondSignalMode>,
    /// Call positions.
    pub positions: Vec<usize>,
    /// Both switches were given and remove won; the run reports it.
    pub overridden: bool,
    /// Report locations instead of a count.
    pub verbose: bool,
}

impl CondSignalConfig {
    /// Creates a configuration for `mode` at `positions`.
    #[must_use]
    pub fn mutate(mode: CondSignalMode, positions: Vec<usize>) -> Self {
        Self {
            mode: Some(mode),
            positions,
            ..Self::default()
        }
    }

    /// Builds the mode from the remove/swap switches. Remove takes precedence when both
    /// are set.
    #[must_use]
    pub fn from_flags(remove: bool, swap: bool) -> Self {
        let mode = if remove {
            Some(CondSignalMode::Remove)
        } else if swap {
            Some(CondSignalMode::Swap)
        } else {
            None
        };
        Self {
            mode,
            overridden: remove && swap,
            ..Self::default()
        }
    }

    /// Sets the positions.
    #[must_use]
    pub fn with_positions(mut self, positions: Vec<usize>) -> Self {
        self.positions = positions;
        self
    }

    /// Enables verbose reports.
    #[must_use]
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Always succeeds; conflicting switches are resolved by [`CondSignalConfig::from_flags`].
    ///
    /// # Errors
    ///
    /// Never returns an error.
    pub fn validate(&self) -> Result<()> {
        Ok(())
    }
}

/// Condition wait operator modes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CondWaitMode {
    /// Remove the wait.
    Remove,
    /// Turn `pthread_cond_timedwait` into `pthread_cond_wait`.
    Switch,
    /// Add deltas to the timespec of a `pthread_cond_timedwait`.
    Timeout {
        /// Added to `tv_sec`, per position (last value reused)
        seconds: Vec<i64>,
        /// Added to `tv_nsec`, per position (last value reused)
        nanos: Vec<i64>,
        /// Function-relative instruction index to insert before, per position (last
        /// value reused); empty inserts before the call
        insert_points: Vec<usize>,
    },
}

/// Configuration of the condition wait operator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CondWaitConfig {
    /// Selected mode; `None` only reports the calls.
    pub mode: Option<CondWaitMode>,
    /// Call positions.
    pub positions: Vec<usize>,
    /// Report locations instead of a count.
    pub verbose: bool,
}

impl CondWaitConfig {
    /// Creates a configuration for `mode` at `positions`.
    #[must_use]
    pub fn mutate(mode: CondWaitMode, positions: Vec<usize>) -> Self {
        Self {
            mode: Some(mode),
            positions,
            verbose: false,
        }
    }

    /// Sets the positions.
    #[must_use]
    pub fn with_positions(mut self, positions: Vec<usize>) -> Self {
        self.positions = positions;
        self
    }

    /// Enables verbose reports.
    #[must_use]
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Checks the parameters against the selected mode.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Config`] describing the first violated rule.
    pub fn validate(&self) -> Result<()> {
        let Some(mode) = &self.mode else {
            return Ok(());
        };
        if self.verbose {
            return Err(config_error!("verbose output has no meaning when mutating"));
        }
        match mode {
            CondWaitMode::Remove => require_positions(&self.positions, "wait removal"),
            CondWaitMode::Switch => require_positions(&self.positions, "wait switching"),
            CondWaitMode::Timeout { seconds, nanos, .. } => {
                require_positions(&self.positions, "timeout modification")?;
                if seconds.is_empty() || nanos.is_empty() {
                    return Err(config_error!(
                        "timeout modification requires both second and nanosecond values"
                    ));
                }
                Ok(())
            }
        }
    }
}

// ── Yield ───────────────────────────────────────────────────────────────

/// Configuration of the yield operator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct YieldConfig {
    /// Remove the calls at `positions`; otherwise only report.
    pub remove: bool,
    /// Call positions.
    pub positions: Vec<usize>,
    /// Report locations instead of a count.
    pub verbose: bool,
}

impl YieldConfig {
    /// Creates a removal configuration.
    #[must_use]
    pub fn remove(positions: Vec<usize>) -> Self {
        Self {
            remove: true,
            positions,
            verbose: false,
        }
    }

    /// Enables verbose reports.
    #[must_use]
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Checks the parameters.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Config`] describing the first violated rule.
    pub fn validate(&self) -> Result<()> {
        if self.remove && self.verbose {
            return Err(config_error!("verbose output has no meaning with remove"));
        }
        if self.remove {
            require_positions(&self.positions, "yield removal")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    fn message(result: Result<()>) -> String {
        match result {
            Err(Error::Config { message, .. }) => message,
            other => panic!("expected a configuration error, got {other:?}"),
        }
    }

    #[test]
    fn test_find_mode_is_always_valid() {
        assert!(MutexConfig::new().validate().is_ok());
        assert!(FenceConfig::new().validate().is_ok());
        assert!(AtomicConfig::new(AtomicTarget::Store).validate().is_ok());
        assert!(JoinConfig::new().validate().is_ok());
        assert!(CondWaitConfig::default().validate().is_ok());
    }

    #[test]
    fn test_mutex_exclusive_modes() {
        let err = MutexConfig::from_flags(true, false, true, false).unwrap_err();
        assert!(err.to_string().contains("remove and shift cannot be specified"));
        assert_eq!(
            MutexConfig::from_flags(false, false, false, true)
                .unwrap()
                .mode,
            Some(MutexMode::Split)
        );
    }

    #[test]
    fn test_mutex_position_shapes() {
        assert!(message(MutexConfig::remove(vec![]).validate()).contains("no positions"));
        assert!(message(MutexConfig::remove(vec![0, 1, 2]).validate()).contains("even number"));
        assert!(message(MutexConfig::swap(vec![0, 0]).validate()).contains("groups of 4"));
        assert!(MutexConfig::swap(vec![0, 0, 0, 1]).validate().is_ok());
    }

    #[test]
    fn test_mutex_unused_lists() {
        let config = MutexConfig::remove(vec![0, 0]).with_lock_dirs(vec![2]);
        assert!(message(config.validate()).contains("lock directions are not used"));

        let config = MutexConfig::shift(vec![0, 0], vec![], vec![]);
        assert!(message(config.validate()).contains("no lock or unlock directions"));

        let config = MutexConfig::shift(vec![0, 0], vec![-2], vec![]).with_split_positions(vec![1, 2]);
        assert!(message(config.validate()).contains("split positions are not used"));

        assert!(message(MutexConfig::split(vec![0, 0], vec![]).validate())
            .contains("at least one pair"));
        assert!(message(MutexConfig::split(vec![0, 0], vec![1]).validate()).contains("in pairs"));
    }

    #[test]
    fn test_ordering_tables() {
        assert_eq!(
            OrderingTable::Fence.decode(2),
            Some(AtomicOrdering::AcquireRelease)
        );
        assert_eq!(
            OrderingTable::CmpXchg.decode(4),
            Some(AtomicOrdering::SequentiallyConsistent)
        );
        assert_eq!(OrderingTable::Store.decode(2), Some(AtomicOrdering::Release));
        assert_eq!(OrderingTable::Load.decode(2), Some(AtomicOrdering::Acquire));
        assert_eq!(OrderingTable::Fence.decode(4), None);

        let config = FenceConfig::mutate(FenceMode::Ordering { orders: vec![1, 4] }, vec![0, 1]);
        assert!(message(config.validate()).contains("too large"));
    }

    #[test]
    fn test_nth_or_last() {
        assert_eq!(nth_or_last(&[1, 2, 3], 1), Some(2));
        assert_eq!(nth_or_last(&[1, 2, 3], 7), Some(3));
        assert_eq!(nth_or_last::<u32>(&[], 0), None);
    }

    #[test]
    fn test_sibling_flags() {
        assert!(FenceConfig::from_flags(true, Some(vec![0]), false).is_err());
        assert!(AtomicConfig::from_flags(AtomicTarget::Store, true, None, true).is_err());
        assert!(JoinConfig::from_flags(true, true, None).is_err());
        assert_eq!(
            JoinConfig::from_flags(false, true, None).unwrap().mode,
            Some(JoinMode::ReplaceWithSleep {
                seconds: DEFAULT_SLEEP_SECONDS
            })
        );

        let signal = CondSignalConfig::from_flags(true, true);
        assert_eq!(signal.mode, Some(CondSignalMode::Remove));
        assert!(signal.overridden);
    }

    #[test]
    fn test_sibling_validation() {
        let config = AtomicConfig::mutate(AtomicTarget::Load, AtomicMode::ToggleAtomic, vec![0]);
        assert!(message(config.validate()).contains("only supported for stores"));

        let config = JoinConfig::remove(vec![0]).with_families(false, false);
        assert!(message(config.validate()).contains("at least one"));

        let config = CondWaitConfig::mutate(
            CondWaitMode::Timeout {
                seconds: vec![1],
                nanos: vec![],
                insert_points: vec![],
            },
            vec![0],
        );
        assert!(message(config.validate()).contains("nanosecond"));

        assert!(YieldConfig::remove(vec![]).validate().is_err());
        assert!(YieldConfig::remove(vec![0]).with_verbose(true).validate().is_err());
    }
}
