//! Lock/unlock pair matching and the position index.
//!
//! # Matching
//!
//! Per function, every lock call (plain calls first, then invokes) is compared against
//! every other lock-primitive call of the function (plain calls first, then invokes). A
//! pair is emitted when the other call is the unlock of the same primitive family and the
//! alias oracle answers `MustAlias` for the two first arguments:
//!
//! ```text
//! for lock in calls ++ invokes           (lock role only)
//!     for other in calls ++ invokes      (skip lock itself)
//!         other is unlock of lock.family
//!         && alias(lock.arg0, other.arg0) == MustAlias   => pair(lock, other)
//! ```
//!
//! The inner scan is not restricted to calls after the lock, so an unlock that precedes
//! its lock in visitation order still pairs with it.
//!
//! # Categories
//!
//! | Category | Lock form | Unlock form |
//! |---|---|---|
//! | `CallCall` (0) | call | call |
//! | `CallInvoke` (1) | call | invoke |
//! | `InvokeCall` (2) | invoke | call |
//! | `InvokeInvoke` (3) | invoke | invoke |
//!
//! Positions are append-order indices within a category. They are deterministic for a
//! given module and oracle, and become meaningless once the pair's call sites are edited.

use std::{collections::BTreeMap, fmt};

use strum::{Display, EnumIter, IntoEnumIterator};

use crate::{
    analysis::{AliasAnalysis, CallEnumerator, CallSite, EnumeratedCalls},
    ir::{CallForm, Callee, FuncId, Module},
    mutation::{DiagnosticKind, MutationContext},
    Result,
};

/// A lock/unlock API whose two halves can be paired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum PrimitiveFamily {
    /// `pthread_mutex_lock` / `pthread_mutex_unlock`, returning `int`.
    #[strum(serialize = "pthread")]
    Posix,
    /// `std::mutex::lock` / `std::mutex::unlock` (libc++), returning `void`.
    #[strum(serialize = "std::mutex")]
    StdMutex,
}

/// Which half of a primitive a call is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Acquires the mutex.
    Lock,
    /// Releases the mutex.
    Unlock,
}

impl PrimitiveFamily {
    /// Returns the (demangled) name of the lock function.
    #[must_use]
    pub const fn lock_name(&self) -> &'static str {
        match self {
            PrimitiveFamily::Posix => "pthread_mutex_lock",
            PrimitiveFamily::StdMutex => "std::__1::mutex::lock",
        }
    }

    /// Returns the (demangled) name of the unlock function.
    #[must_use]
    pub const fn unlock_name(&self) -> &'static str {
        match self {
            PrimitiveFamily::Posix => "pthread_mutex_unlock",
            PrimitiveFamily::StdMutex => "std::__1::mutex::unlock",
        }
    }

    /// Returns the name of one half.
    #[must_use]
    pub const fn name(&self, role: Role) -> &'static str {
        match role {
            Role::Lock => self.lock_name(),
            Role::Unlock => self.unlock_name(),
        }
    }

    /// Returns true if the primitive returns a value (a signed 32-bit status).
    #[must_use]
    pub const fn returns_status(&self) -> bool {
        matches!(self, PrimitiveFamily::Posix)
    }

    /// Classifies a target key.
    #[must_use]
    pub fn classify(name: &str) -> Option<(PrimitiveFamily, Role)> {
        PrimitiveFamily::iter().find_map(|family| {
            if name == family.lock_name() {
                Some((family, Role::Lock))
            } else if name == family.unlock_name() {
                Some((family, Role::Unlock))
            } else {
                None
            }
        })
    }

    /// Returns every lock and unlock name of every family.
    #[must_use]
    pub fn all_names() -> Vec<&'static str> {
        PrimitiveFamily::iter()
            .flat_map(|family| [family.lock_name(), family.unlock_name()])
            .collect()
    }
}

/// The four pair categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumIter)]
#[repr(u32)]
pub enum PairCategory {
    /// Plain lock, plain unlock.
    #[strum(serialize = "Call-Call")]
    CallCall = 0,
    /// Plain lock, invoked unlock.
    #[strum(serialize = "Call-Invoke")]
    CallInvoke = 1,
    /// Invoked lock, plain unlock.
    #[strum(serialize = "Invoke-Call")]
    InvokeCall = 2,
    /// Invoked lock, invoked unlock.
    #[strum(serialize = "Invoke-Invoke")]
    InvokeInvoke = 3,
}

impl PairCategory {
    /// Derives the category from the two call forms.
    #[must_use]
    pub const fn from_forms(lock: CallForm, unlock: CallForm) -> Self {
        match (lock, unlock) {
            (CallForm::Call, CallForm::Call) => PairCategory::CallCall,
            (CallForm::Call, CallForm::Invoke) => PairCategory::CallInvoke,
            (CallForm::Invoke, CallForm::Call) => PairCategory::InvokeCall,
            (CallForm::Invoke, CallForm::Invoke) => PairCategory::InvokeInvoke,
        }
    }

    /// Converts a user-supplied category number.
    #[must_use]
    pub const fn from_index(index: u32) -> Option<Self> {
        match index {
            0 => Some(PairCategory::CallCall),
            1 => Some(PairCategory::CallInvoke),
            2 => Some(PairCategory::InvokeCall),
            3 => Some(PairCategory::InvokeInvoke),
            _ => None,
        }
    }

    /// Returns the category number.
    #[must_use]
    pub const fn index(&self) -> usize {
        *self as usize
    }
}

/// A lock call and the unlock call that releases the same mutex.
#[derive(Debug, Clone, PartialEq)]
pub struct LockUnlockPair {
    family: PrimitiveFamily,
    lock: CallSite,
    unlock: CallSite,
}

impl LockUnlockPair {
    /// Returns the primitive family.
    #[must_use]
    pub const fn family(&self) -> PrimitiveFamily {
        self.family
    }

    /// Returns the lock side.
    #[must_use]
    pub const fn lock(&self) -> &CallSite {
        &self.lock
    }

    /// Returns the unlock side.
    #[must_use]
    pub const fn unlock(&self) -> &CallSite {
        &self.unlock
    }

    /// Returns the enclosing function.
    #[must_use]
    pub const fn function(&self) -> FuncId {
        self.lock.function()
    }

    /// Returns the category.
    #[must_use]
    pub const fn category(&self) -> PairCategory {
        PairCategory::from_forms(self.lock.form(), self.unlock.form())
    }

    /// Checks that neither side has been erased or retargeted since matching.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::StaleHandle`] for the first stale side.
    pub fn validate(&self, module: &Module) -> Result<()> {
        self.lock.validate(module)?;
        self.unlock.validate(module)
    }

    /// Returns the instruction distance between the two sides.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::StaleHandle`] if either side has been erased.
    pub fn distance(&self, module: &Module) -> Result<usize> {
        module.distance(self.lock.id(), self.unlock.id())
    }
}

impl fmt::Display for LockUnlockPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} -> {}",
            self.category(),
            self.lock.id(),
            self.unlock.id()
        )
    }
}

/// Pairs of a module, numbered per category and per function.
#[derive(Debug, Clone, Default)]
pub struct PairIndex {
    categories: [Vec<LockUnlockPair>; 4],
    by_function: BTreeMap<usize, Vec<(PairCategory, usize)>>,
}

impl PairIndex {
    /// Matches all lock/unlock pairs of a module.
    ///
    /// Call sites without arguments are reported as warnings on `ctx.events` (once per
    /// site) and never pair. Indirect calls cannot be resolved to a primitive, so a
    /// function containing any gets one warning with their count. Every pair found is
    /// recorded as [`DiagnosticKind::PairFound`].
    ///
    /// # Errors
    ///
    /// Returns an error only if the module is internally inconsistent.
    pub fn build(
        module: &Module,
        alias: &dyn AliasAnalysis,
        ctx: &MutationContext,
    ) -> Result<Self> {
        let enumerator = CallEnumerator::new(PrimitiveFamily::all_names()).demangle(true);
        let mut index = PairIndex::default();

        let mut indirect: BTreeMap<usize, usize> = BTreeMap::new();
        for (func, _, inst) in module.iter_instructions() {
            if let Some(Callee::Indirect(_)) = inst.op().callee() {
                *indirect.entry(func.index()).or_default() += 1;
            }
        }
        for function in module.functions() {
            if let Some(count) = indirect.get(&function.id().index()) {
                ctx.events.warn(format!(
                    "{}: {count} indirect call(s) cannot be resolved and are not considered for pairing",
                    function.name()
                ));
            }
        }

        for (func, sites) in enumerator.enumerate(module)?.per_function() {
            index.match_function(func, &sites, alias, ctx);
        }
        Ok(index)
    }

    fn match_function(
        &mut self,
        func: FuncId,
        sites: &EnumeratedCalls,
        alias: &dyn AliasAnalysis,
        ctx: &MutationContext,
    ) {
        let mut warned = Vec::new();
        let mut missing_argument = |site: &CallSite| {
            if !warned.contains(&site.id()) {
                warned.push(site.id());
                ctx.events.warn(format!(
                    "{} call {} in {} has no arguments; it cannot be paired",
                    site.name(),
                    site.id(),
                    func
                ));
            }
        };

        for lock in sites.iter() {
            let Some((family, Role::Lock)) = PrimitiveFamily::classify(lock.name()) else {
                continue;
            };
            let Some(lock_mutex) = lock.arg(0) else {
                missing_argument(lock);
                continue;
            };

            for other in sites.iter() {
                if other.id() == lock.id()
                    || PrimitiveFamily::classify(other.name()) != Some((family, Role::Unlock))
                {
                    continue;
                }
                let Some(unlock_mutex) = other.arg(0) else {
                    missing_argument(other);
                    continue;
                };
                if !alias.must_alias(lock_mutex, unlock_mutex) {
                    continue;
                }

                let pair = LockUnlockPair {
                    family,
                    lock: lock.clone(),
                    unlock: other.clone(),
                };
                let category = pair.category();
                let position = self.categories[category.index()].len();
                ctx.events
                    .record(DiagnosticKind::PairFound)
                    .at(func, position)
                    .message(format!("{category} pair {position}: {pair}"));

                self.categories[category.index()].push(pair);
                self.by_function
                    .entry(func.index())
                    .or_default()
                    .push((category, position));
            }
        }
    }

    /// Returns the pair at a position of a category.
    #[must_use]
    pub fn get(&self, category: PairCategory, index: usize) -> Option<&LockUnlockPair> {
        self.categories[category.index()].get(index)
    }

    /// Returns the `pair_index`-th pair found in function `func_index`.
    #[must_use]
    pub fn get_by_function(&self, func_index: usize, pair_index: usize) -> Option<&LockUnlockPair> {
        let (category, position) = *self.by_function.get(&func_index)?.get(pair_index)?;
        self.get(category, position)
    }

    /// Returns the pairs of a category in position order.
    #[must_use]
    pub fn category(&self, category: PairCategory) -> &[LockUnlockPair] {
        &self.categories[category.index()]
    }

    /// Returns the number of pairs in a category.
    #[must_use]
    pub fn len(&self, category: PairCategory) -> usize {
        self.categories[category.index()].len()
    }

    /// Returns the number of pairs over all categories.
    #[must_use]
    pub fn total(&self) -> usize {
        self.categories.iter().map(Vec::len).sum()
    }

    /// Returns true if no pair was found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// Returns the pair count of each category, indexed by category number.
    #[must_use]
    pub fn counts(&self) -> [usize; 4] {
        [
            self.categories[0].len(),
            self.categories[1].len(),
            self.categories[2].len(),
            self.categories[3].len(),
        ]
    }

    /// Iterates over `(category, position, pair)` in category, then position order.
    pub fn iter(&self) -> impl Iterator<Item = (PairCategory, usize, &LockUnlockPair)> {
        PairCategory::iter().flat_map(move |category| {
            self.categories[category.index()]
                .iter()
                .enumerate()
                .map(move |(position, pair)| (category, position, pair))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        analysis::{AliasResult, IdentityAlias},
        ir::{Type, Value},
        test::factories::{posix_critical_section, std_mutex_invoke_section},
    };

    #[test]
    fn test_classify() {
        assert_eq!(
            PrimitiveFamily::classify("pthread_mutex_unlock"),
            Some((PrimitiveFamily::Posix, Role::Unlock))
        );
        assert_eq!(
            PrimitiveFamily::classify("std::__1::mutex::lock"),
            Some((PrimitiveFamily::StdMutex, Role::Lock))
        );
        assert_eq!(PrimitiveFamily::classify("pthread_mutex_trylock"), None);
        assert_eq!(PrimitiveFamily::all_names().len(), 4);
    }

    #[test]
    fn test_category_numbers() {
        for category in PairCategory::iter() {
            assert_eq!(
                PairCategory::from_index(category.index() as u32),
                Some(category)
            );
        }
        assert_eq!(PairCategory::from_index(4), None);
        assert_eq!(PairCategory::InvokeCall.to_string(), "Invoke-Call");
    }

    #[test]
    fn test_single_posix_pair() -> Result<()> {
        let (module, _) = posix_critical_section()?;
        let ctx = MutationContext::new();
        let index = PairIndex::build(&module, &IdentityAlias, &ctx)?;

        assert_eq!(index.counts(), [1, 0, 0, 0]);
        let pair = index.get(PairCategory::CallCall, 0).unwrap();
        assert_eq!(pair.family(), PrimitiveFamily::Posix);
        assert_eq!(pair.distance(&module)?, 2);
        assert_eq!(ctx.events.count_kind(DiagnosticKind::PairFound), 1);
        Ok(())
    }

    #[test]
    fn test_invoke_invoke_pair() -> Result<()> {
        let (module, _) = std_mutex_invoke_section()?;
        let ctx = MutationContext::new();
        let index = PairIndex::build(&module, &IdentityAlias, &ctx)?;

        assert_eq!(index.counts(), [0, 0, 0, 1]);
        assert!(index.get_by_function(0, 0).is_none());
        let func = index.get(PairCategory::InvokeInvoke, 0).unwrap().function();
        assert!(index.get_by_function(func.index(), 0).is_some());
        Ok(())
    }

    #[test]
    fn test_no_pair_without_must_alias() -> Result<()> {
        let (module, _) = posix_critical_section()?;
        let ctx = MutationContext::new();
        let may = |_: &Value, _: &Value| AliasResult::MayAlias;
        let index = PairIndex::build(&module, &may, &ctx)?;
        assert!(index.is_empty());
        Ok(())
    }

    #[test]
    fn test_zero_argument_lock_warns_once() -> Result<()> {
        let mut module = Module::new("test");
        let lock = module.declare("pthread_mutex_lock", Type::I32);
        let unlock = module.declare("pthread_mutex_unlock", Type::I32);
        let mut f = module.build_function("f", Type::Void);
        f.block("entry");
        f.call(lock, vec![])?;
        f.call(unlock, vec![Value::global("m")])?;
        f.call(unlock, vec![Value::global("m")])?;
        f.ret(None)?;
        f.finish();

        let ctx = MutationContext::new();
        let index = PairIndex::build(&module, &IdentityAlias, &ctx)?;
        assert!(index.is_empty());
        assert_eq!(ctx.events.count_kind(DiagnosticKind::Warning), 1);
        assert!(ctx.events.has_warning("no arguments"));
        Ok(())
    }

    #[test]
    fn test_indirect_calls_warn_once_per_function() -> Result<()> {
        let mut module = Module::new("test");
        let lock = module.declare("pthread_mutex_lock", Type::I32);
        let mut f = module.build_function("f", Type::Void);
        f.block("entry");
        f.call(lock, vec![Value::global("m")])?;
        f.indirect_call(Value::Arg(0), vec![Value::global("m")], Type::I32)?;
        f.indirect_call(Value::Arg(1), vec![Value::global("m")], Type::I32)?;
        f.ret(None)?;
        f.finish();

        let ctx = MutationContext::new();
        let index = PairIndex::build(&module, &IdentityAlias, &ctx)?;
        assert!(index.is_empty());
        assert_eq!(ctx.events.count_kind(DiagnosticKind::Warning), 1);
        assert!(ctx.events.has_warning("f: 2 indirect call(s) cannot be resolved"));
        Ok(())
    }
}
