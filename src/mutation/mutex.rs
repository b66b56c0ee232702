//! The lock/unlock pair operator.
//!
//! [`MutexMutator`] matches lock/unlock pairs (see [`PairIndex`]) and applies one of four
//! edits to the pairs selected by position:
//!
//! | Mode | Positions | Edit |
//! |---|---|---|
//! | remove | `(a, b)` pairs | erase both calls; used results become a zero constant |
//! | swap | `(a1, b1, a2, b2)` groups | exchange the two locks, then the two unlocks |
//! | shift | `(a, b)` pairs | move the lock and/or unlock by a signed instruction count |
//! | split | `(a, b)` pairs | insert an unlock and a lock after the original lock |
//!
//! `(a, b)` is `(category, index)` or `(function, index)` depending on
//! [`PairAddressing`].
//!
//! Every problem with a single request (unknown position, shared calls, mixed primitive
//! families, bad argument counts, offsets past the unlock) is a warning and only skips
//! that request.

use std::collections::HashSet;

use crate::{
    analysis::{
        AliasAnalysis, CallSite, LockUnlockPair, PairCategory, PairIndex, PrimitiveFamily, Role,
    },
    config::{MutexConfig, MutexMode, PairAddressing},
    ir::{InstId, Module, Value},
    mutation::{
        calls::{is_untouched, remove_call},
        DiagnosticKind, MutationContext, MutationPass, OccurrenceReport,
    },
    Result,
};

const NAME: &str = "mutex";

/// Bit width of the status value returned by the POSIX lock functions.
const STATUS_WIDTH: u32 = 32;

/// Mutation operator over lock/unlock pairs.
///
/// # Examples
///
/// ```rust
/// use syncmut::{
///     analysis::IdentityAlias,
///     config::MutexConfig,
///     ir::{Module, Type, Value},
///     mutation::{run_pass, MutexMutator},
/// };
///
/// let mut module = Module::new("demo");
/// let lock = module.declare("pthread_mutex_lock", Type::I32);
/// let unlock = module.declare("pthread_mutex_unlock", Type::I32);
/// let mut f = module.build_function("worker", Type::Void);
/// f.block("entry");
/// f.call(lock, vec![Value::global("m")])?;
/// f.call(unlock, vec![Value::global("m")])?;
/// f.ret(None)?;
/// f.finish();
///
/// let op = MutexMutator::new(MutexConfig::remove(vec![0, 0]))?;
/// let outcome = run_pass(&op, &mut module, &IdentityAlias)?;
/// assert!(outcome.modified);
/// # Ok::<(), syncmut::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct MutexMutator {
    config: MutexConfig,
}

impl MutexMutator {
    /// Creates the operator.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Config`] if the configuration is contradictory.
    pub fn new(config: MutexConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &MutexConfig {
        &self.config
    }

    /// Looks up the pair a position selects, warning if there is none.
    fn resolve<'a>(
        &self,
        index: &'a PairIndex,
        first: usize,
        second: usize,
        ctx: &MutationContext,
    ) -> Option<&'a LockUnlockPair> {
        let pair = match self.config.addressing {
            PairAddressing::Category => u32::try_from(first)
                .ok()
                .and_then(PairCategory::from_index)
                .and_then(|category| index.get(category, second)),
            PairAddressing::Function => index.get_by_function(first, second),
        };
        if pair.is_none() {
            ctx.events.warn(format!(
                "{NAME}: position ({first}, {second}) is out of bounds, skipping"
            ));
        }
        pair
    }

    /// Checks both sides of a pair before editing.
    fn is_pair_untouched(module: &Module, ctx: &MutationContext, pair: &LockUnlockPair) -> bool {
        is_untouched(module, ctx, NAME, pair.lock()) && is_untouched(module, ctx, NAME, pair.unlock())
    }

    // ── Remove ──────────────────────────────────────────────────────────

    fn remove(&self, module: &mut Module, index: &PairIndex, ctx: &MutationContext) -> Result<bool> {
        let mut scheduled: HashSet<InstId> = HashSet::new();
        let mut sites: Vec<(CallSite, PrimitiveFamily)> = Vec::new();
        let mut pairs: Vec<(usize, usize, InstId, InstId)> = Vec::new();

        for chunk in self.config.positions.chunks_exact(2) {
            let (first, second) = (chunk[0], chunk[1]);
            let Some(pair) = self.resolve(index, first, second, ctx) else {
                continue;
            };

            let fresh: Vec<&CallSite> = [pair.lock(), pair.unlock()]
                .into_iter()
                .filter(|site| scheduled.insert(site.id()))
                .collect();
            if fresh.len() < 2 {
                ctx.events.warn(format!(
                    "{NAME}: position pair ({first} {second}) shares {} call(s) with an earlier \
                     request, removing them once",
                    2 - fresh.len()
                ));
            }
            for site in fresh {
                sites.push((site.clone(), pair.family()));
            }
            let ids = (pair.lock().id(), pair.unlock().id());
            if !pairs.iter().any(|(_, _, lock, unlock)| (*lock, *unlock) == ids) {
                pairs.push((first, second, ids.0, ids.1));
            }
        }

        let mut removed: HashSet<InstId> = HashSet::new();
        for (site, family) in &sites {
            if !is_untouched(module, ctx, NAME, site) {
                continue;
            }
            if !family.returns_status() && module.use_count(site.id())? > 0 {
                ctx.events.warn(format!(
                    "{NAME}: {} call {} still has uses, skipping",
                    family,
                    site.id()
                ));
                continue;
            }

            remove_call(module, site, STATUS_WIDTH, true)?;
            ctx.mark_site_mutated(site.id());
            removed.insert(site.id());
        }

        for (first, second, lock, unlock) in pairs {
            if removed.contains(&lock) && removed.contains(&unlock) {
                ctx.events
                    .record(DiagnosticKind::PairRemoved)
                    .pass(NAME)
                    .message(format!("removed pair ({first} {second})"));
            }
        }
        Ok(!removed.is_empty())
    }

    // ── Swap ────────────────────────────────────────────────────────────

    fn swap(&self, module: &mut Module, index: &PairIndex, ctx: &MutationContext) -> Result<bool> {
        let mut modified = false;

        for group in self.config.positions.chunks_exact(4) {
            let Some(first) = self.resolve(index, group[0], group[1], ctx) else {
                continue;
            };
            let Some(second) = self.resolve(index, group[2], group[3], ctx) else {
                continue;
            };

            if first.lock().id() == second.lock().id() {
                ctx.events.warn(format!(
                    "{NAME}: lock pairs stem from the same lock call, skipping"
                ));
                continue;
            }
            if first.unlock().id() == second.unlock().id() {
                ctx.events.warn(format!(
                    "{NAME}: lock pairs stem from the same unlock call, skipping"
                ));
                continue;
            }
            if first.family() != second.family() {
                ctx.events.warn(format!(
                    "{NAME}: unable to swap a {} pair with a {} pair, skipping",
                    first.family(),
                    second.family()
                ));
                continue;
            }

            let sides = [first.lock(), first.unlock(), second.lock(), second.unlock()];
            if let Some(site) = sides.iter().find(|site| site.arg_count() != 1) {
                ctx.events.warn(format!(
                    "{NAME}: call {} to {} does not have exactly one argument, skipping",
                    site.id(),
                    site.name()
                ));
                continue;
            }
            if !Self::is_pair_untouched(module, ctx, first)
                || !Self::is_pair_untouched(module, ctx, second)
            {
                continue;
            }

            Self::swap_sites(module, ctx, first.lock(), second.lock())?;
            Self::swap_sites(module, ctx, first.unlock(), second.unlock())?;
            modified = true;
        }
        Ok(modified)
    }

    /// Gives each slot the other slot's target, argument and attributes, keeping the
    /// slot's own call form and continuations.
    fn swap_sites(
        module: &mut Module,
        ctx: &MutationContext,
        a: &CallSite,
        b: &CallSite,
    ) -> Result<()> {
        let into_a = a
            .clone_with(b.target(), b.args().to_vec(), b.ret())
            .with_attrs(b.attrs());
        let into_b = b
            .clone_with(a.target(), a.args().to_vec(), a.ret())
            .with_attrs(a.attrs());

        let new_a = module.replace_with(a.id(), into_a)?;
        let new_b = module.replace_with(b.id(), into_b)?;
        ctx.mark_site_mutated(a.id());
        ctx.mark_site_mutated(b.id());
        ctx.mark_site_mutated(new_a);
        ctx.mark_site_mutated(new_b);

        ctx.events
            .record(DiagnosticKind::CallSwapped)
            .function(a.function())
            .pass(NAME)
            .message(format!("{} {} <-> {} {}", a.name(), a.id(), b.name(), b.id()));
        Ok(())
    }

    // ── Shift ───────────────────────────────────────────────────────────

    fn shift(&self, module: &mut Module, index: &PairIndex, ctx: &MutationContext) -> Result<bool> {
        let mut modified = false;

        for (i, chunk) in self.config.positions.chunks_exact(2).enumerate() {
            let (first, second) = (chunk[0], chunk[1]);
            let Some(pair) = self.resolve(index, first, second, ctx) else {
                continue;
            };
            if !Self::is_pair_untouched(module, ctx, pair) {
                continue;
            }

            for (role, site, dirs) in [
                (Role::Lock, pair.lock(), &self.config.lock_dirs),
                (Role::Unlock, pair.unlock(), &self.config.unlock_dirs),
            ] {
                let role_name = match role {
                    Role::Lock => "lock",
                    Role::Unlock => "unlock",
                };
                match dirs.get(i).copied() {
                    None => ctx.events.warn(format!(
                        "{NAME}: position pair ({first} {second}) has no {role_name} shift \
                         direction specified"
                    )),
                    Some(1) => ctx
                        .events
                        .warn(format!("{NAME}: a shift of positive 1 is a no-op")),
                    Some(0) => {}
                    Some(dir) => {
                        if Self::shift_site(module, ctx, site, pair.family(), dir)? {
                            modified = true;
                        }
                    }
                }
            }
        }
        Ok(modified)
    }

    /// Moves one call `dir` instructions (negative: backwards) as a plain call.
    fn shift_site(
        module: &mut Module,
        ctx: &MutationContext,
        site: &CallSite,
        family: PrimitiveFamily,
        dir: isize,
    ) -> Result<bool> {
        let Some(mutex) = site.arg(0).cloned() else {
            ctx.events.warn(format!(
                "{NAME}: call {} has no arguments, skipping shift",
                site.id()
            ));
            return Ok(false);
        };
        if !family.returns_status() && module.use_count(site.id())? > 0 {
            ctx.events.warn(format!(
                "{NAME}: {} call {} still has uses, skipping shift",
                family,
                site.id()
            ));
            return Ok(false);
        }

        let base = if site.is_invoke() {
            if site.arg_count() != 1 {
                ctx.events.warn(format!(
                    "{NAME}: invoke {} does not have exactly one argument, skipping shift",
                    site.id()
                ));
                return Ok(false);
            }
            site.branch_to_normal(module)?;
            let call = module.insert_before(site.id(), site.as_call(vec![mutex.clone()]))?;
            module.erase_or_replace_with_zero(site.id(), STATUS_WIDTH, true)?;
            call
        } else {
            site.id()
        };

        let step = module.step(base, dir)?;
        if step.clamped {
            ctx.events.warn(format!(
                "{NAME}: shift of {dir} from call {} reached the function boundary",
                site.id()
            ));
        }
        let moved = module.insert_before(step.target, site.as_call(vec![mutex]))?;
        module.erase_or_replace_with_zero(base, STATUS_WIDTH, true)?;

        ctx.mark_site_mutated(site.id());
        ctx.mark_site_mutated(moved);
        ctx.events
            .record(DiagnosticKind::CallShifted)
            .at(site.function(), module.position(moved)?)
            .pass(NAME)
            .message(format!("shifted {} {} by {dir}", site.name(), site.id()));
        Ok(true)
    }

    // ── Split ───────────────────────────────────────────────────────────

    fn split(&self, module: &mut Module, index: &PairIndex, ctx: &MutationContext) -> Result<bool> {
        let mut modified = false;

        for (i, chunk) in self.config.positions.chunks_exact(2).enumerate() {
            let (first, second) = (chunk[0], chunk[1]);
            let Some(pair) = self.resolve(index, first, second, ctx) else {
                continue;
            };
            if !Self::is_pair_untouched(module, ctx, pair) {
                continue;
            }

            let offsets = (
                self.config.split_positions.get(2 * i).copied(),
                self.config.split_positions.get(2 * i + 1).copied(),
            );
            let (Some(unlock_offset), Some(lock_offset)) = offsets else {
                ctx.events.warn(format!(
                    "{NAME}: position pair ({first} {second}) has no split positions \
                     specified, skipping"
                ));
                continue;
            };

            let distance = pair.distance(module)?;
            if unlock_offset >= distance {
                ctx.events.warn(format!(
                    "{NAME}: position pair ({first} {second}) has an unlock position {unlock_offset} \
                     that is not less than the distance {distance} between the pair, skipping"
                ));
                continue;
            }
            if lock_offset >= distance {
                ctx.events.warn(format!(
                    "{NAME}: position pair ({first} {second}) has a lock position {lock_offset} \
                     that is not less than the distance {distance} between the pair, skipping"
                ));
                continue;
            }

            let args = (
                Self::single_arg(pair.lock()),
                Self::single_arg(pair.unlock()),
            );
            let (Some(lock_arg), Some(unlock_arg)) = args else {
                ctx.events.warn(format!(
                    "{NAME}: position pair ({first} {second}) has a call without exactly one \
                     argument, skipping"
                ));
                continue;
            };

            let lock = pair.lock().id();
            let unlock_call = pair.unlock().as_call(vec![unlock_arg]);
            let (unlock_copy, clamped) = module.insert_relative(lock, unlock_call, unlock_offset)?;
            if clamped {
                ctx.events.warn(format!(
                    "{NAME}: unlock insertion reached the end of the function"
                ));
            }

            let lock_offset = if unlock_offset < lock_offset {
                lock_offset + 1
            } else {
                lock_offset
            };
            let lock_call = pair.lock().as_call(vec![lock_arg]);
            let (lock_copy, clamped) = module.insert_relative(lock, lock_call, lock_offset)?;
            if clamped {
                ctx.events.warn(format!(
                    "{NAME}: lock insertion reached the end of the function"
                ));
            }

            ctx.mark_site_mutated(unlock_copy);
            ctx.mark_site_mutated(lock_copy);
            ctx.events
                .record(DiagnosticKind::PairSplit)
                .function(pair.function())
                .pass(NAME)
                .message(format!(
                    "split pair ({first} {second}): unlock after {unlock_offset}, lock after {lock_offset}"
                ));
            modified = true;
        }
        Ok(modified)
    }

    fn single_arg(site: &CallSite) -> Option<Value> {
        match site.args() {
            [only] => Some(only.clone()),
            _ => None,
        }
    }
}

impl MutationPass for MutexMutator {
    fn name(&self) -> &'static str {
        NAME
    }

    fn description(&self) -> &'static str {
        "Removes, swaps, shifts or splits lock/unlock pairs"
    }

    fn mutates(&self) -> bool {
        self.config.mode.is_some()
    }

    fn run(
        &self,
        module: &mut Module,
        alias: &dyn AliasAnalysis,
        ctx: &MutationContext,
    ) -> Result<bool> {
        let Some(mode) = self.config.mode else {
            return Ok(false);
        };
        let index = PairIndex::build(module, alias, ctx)?;
        match mode {
            MutexMode::Remove => self.remove(module, &index, ctx),
            MutexMode::Swap => self.swap(module, &index, ctx),
            MutexMode::Shift => self.shift(module, &index, ctx),
            MutexMode::Split => self.split(module, &index, ctx),
        }
    }

    fn report(
        &self,
        module: &Module,
        alias: &dyn AliasAnalysis,
        ctx: &MutationContext,
    ) -> Result<OccurrenceReport> {
        let index = PairIndex::build(module, alias, ctx)?;
        OccurrenceReport::pairs(NAME, &index, module, self.config.verbose)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        analysis::IdentityAlias,
        ir::{CallForm, Op},
        mutation::Stats,
        test::factories::{
            critical_section_with_body, posix_critical_section, std_mutex_invoke_section,
            swappable_sections,
        },
    };

    fn run(config: MutexConfig, module: &mut Module) -> Result<(bool, MutationContext)> {
        let ctx = MutationContext::new();
        let modified = MutexMutator::new(config)?.run(module, &IdentityAlias, &ctx)?;
        Ok((modified, ctx))
    }

    fn call_names(module: &Module, func: crate::ir::FuncId) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for id in module.instructions_of(func)? {
            if let Some(name) = module.callee_name(id)? {
                names.push(name.to_string());
            }
        }
        Ok(names)
    }

    #[test]
    fn test_remove_posix_pair() -> Result<()> {
        let (mut module, func) = posix_critical_section()?;
        let (modified, ctx) = run(MutexConfig::remove(vec![0, 0]), &mut module)?;

        assert!(modified);
        assert!(call_names(&module, func)?.is_empty());
        assert_eq!(ctx.events.count_kind(DiagnosticKind::PairRemoved), 1);
        Ok(())
    }

    #[test]
    fn test_repeated_removal_records_one_pair() -> Result<()> {
        let (mut module, func) = posix_critical_section()?;
        let (modified, ctx) = run(MutexConfig::remove(vec![0, 0, 0, 0]), &mut module)?;

        assert!(modified);
        assert!(call_names(&module, func)?.is_empty());
        assert_eq!(ctx.events.count_kind(DiagnosticKind::PairRemoved), 1);
        assert_eq!(ctx.events.count_kind(DiagnosticKind::Warning), 1);
        assert_eq!(Stats::from_log(&ctx.events).removed, 1);
        Ok(())
    }

    #[test]
    fn test_remove_invoke_pair_keeps_blocks_terminated() -> Result<()> {
        let (mut module, func) = std_mutex_invoke_section()?;
        let (modified, _) = run(MutexConfig::remove(vec![3, 0]), &mut module)?;
        assert!(modified);

        let function = module.function(func).unwrap();
        for block in function.blocks() {
            let last = block.last().unwrap();
            assert!(module.instruction(last)?.is_terminator(), "{}", block.label());
        }
        assert!(call_names(&module, func)?.is_empty());
        Ok(())
    }

    #[test]
    fn test_out_of_bounds_position_warns() -> Result<()> {
        let (mut module, _) = posix_critical_section()?;
        let (modified, ctx) = run(MutexConfig::remove(vec![0, 5, 7, 0]), &mut module)?;

        assert!(!modified);
        assert_eq!(ctx.events.count_kind(DiagnosticKind::Warning), 2);
        assert!(ctx.events.has_warning("(0, 5) is out of bounds"));
        Ok(())
    }

    #[test]
    fn test_function_addressing() -> Result<()> {
        let (mut module, func) = posix_critical_section()?;
        let config = MutexConfig::remove(vec![func.index(), 0])
            .with_addressing(PairAddressing::Function);
        let (modified, _) = run(config, &mut module)?;
        assert!(modified);
        Ok(())
    }

    #[test]
    fn test_shift_converts_invoke_to_call() -> Result<()> {
        let (mut module, func) = std_mutex_invoke_section()?;
        let config = MutexConfig::shift(vec![3, 0], vec![-1], vec![0]);
        let (modified, ctx) = run(config, &mut module)?;

        assert!(modified);
        assert_eq!(ctx.events.count_kind(DiagnosticKind::CallShifted), 1);
        let forms: Vec<CallForm> = module
            .instructions_of(func)?
            .into_iter()
            .filter_map(|id| module.instruction(id).ok()?.op().call_form())
            .collect();
        assert_eq!(forms.iter().filter(|f| **f == CallForm::Invoke).count(), 1);
        assert!(module
            .instructions_of(func)?
            .iter()
            .any(|id| matches!(module.instruction(*id).map(|i| i.op()), Ok(Op::Br { .. }))));
        Ok(())
    }

    #[test]
    fn test_missing_shift_direction_warns() -> Result<()> {
        let (mut module, _) = posix_critical_section()?;
        let config = MutexConfig::shift(vec![0, 0], vec![-1], vec![]);
        let (modified, ctx) = run(config, &mut module)?;

        assert!(modified);
        assert!(ctx.events.has_warning("no unlock shift direction specified"));
        Ok(())
    }

    #[test]
    fn test_split_rejects_offset_past_unlock() -> Result<()> {
        let (mut module, _) = posix_critical_section()?;
        let (modified, ctx) = run(MutexConfig::split(vec![0, 0], vec![2, 1]), &mut module)?;

        assert!(!modified);
        assert!(ctx.events.has_warning("unlock position 2"));
        Ok(())
    }

    fn call_positions(module: &Module, func: crate::ir::FuncId) -> Result<Vec<(String, usize)>> {
        let mut calls = Vec::new();
        for (position, id) in module.instructions_of(func)?.into_iter().enumerate() {
            if let Some(name) = module.callee_name(id)? {
                calls.push((name.to_string(), position));
            }
        }
        Ok(calls)
    }

    #[test]
    fn test_swap_exchanges_mutexes() -> Result<()> {
        let (mut module, func) = swappable_sections()?;
        let (modified, ctx) = run(MutexConfig::swap(vec![0, 0, 0, 1]), &mut module)?;

        assert!(modified);
        assert_eq!(ctx.events.count_kind(DiagnosticKind::CallSwapped), 2);
        let args: Vec<Value> = module
            .instructions_of(func)?
            .into_iter()
            .filter_map(|id| module.instruction(id).ok()?.op().call_args()?.first().cloned())
            .collect();
        assert_eq!(
            args,
            vec![
                Value::global("b"),
                Value::global("b"),
                Value::global("a"),
                Value::global("a")
            ]
        );
        Ok(())
    }

    #[test]
    fn test_swap_with_itself_is_skipped() -> Result<()> {
        let (mut module, _) = swappable_sections()?;
        let (modified, ctx) = run(MutexConfig::swap(vec![0, 1, 0, 1]), &mut module)?;

        assert!(!modified);
        assert!(ctx.events.has_warning("same lock call"));
        Ok(())
    }

    #[test]
    fn test_split_offsets() -> Result<()> {
        let (mut module, func) = critical_section_with_body(9)?;
        let (modified, ctx) = run(MutexConfig::split(vec![0, 0], vec![3, 7]), &mut module)?;

        assert!(modified);
        assert_eq!(ctx.events.count_kind(DiagnosticKind::PairSplit), 1);
        assert_eq!(
            call_positions(&module, func)?,
            vec![
                ("pthread_mutex_lock".to_string(), 0),
                ("pthread_mutex_unlock".to_string(), 3),
                ("pthread_mutex_lock".to_string(), 8),
                ("pthread_mutex_unlock".to_string(), 12),
            ]
        );
        Ok(())
    }

    #[test]
    fn test_shift_posix_unlock_backward() -> Result<()> {
        let (mut module, func) = critical_section_with_body(2)?;
        let config = MutexConfig::shift(vec![0, 0], vec![0], vec![-2]);
        let (modified, _) = run(config, &mut module)?;

        assert!(modified);
        assert_eq!(
            call_positions(&module, func)?,
            vec![
                ("pthread_mutex_lock".to_string(), 0),
                ("pthread_mutex_unlock".to_string(), 1),
            ]
        );
        Ok(())
    }

    #[test]
    fn test_shift_posix_lock_forward() -> Result<()> {
        let (mut module, func) = posix_critical_section()?;
        let config = MutexConfig::shift(vec![0, 0], vec![2], vec![0]);
        let (modified, ctx) = run(config, &mut module)?;

        assert!(modified);
        assert_eq!(
            call_positions(&module, func)?,
            vec![
                ("pthread_mutex_lock".to_string(), 1),
                ("pthread_mutex_unlock".to_string(), 2),
            ]
        );
        assert!(!ctx.events.has_warning("reached the function boundary"));
        Ok(())
    }

    #[test]
    fn test_shift_past_end_stops_before_ret() -> Result<()> {
        let (mut module, func) = posix_critical_section()?;
        let config = MutexConfig::shift(vec![0, 0], vec![10], vec![0]);
        let (modified, ctx) = run(config, &mut module)?;

        assert!(modified);
        assert_eq!(
            call_positions(&module, func)?,
            vec![
                ("pthread_mutex_unlock".to_string(), 1),
                ("pthread_mutex_lock".to_string(), 2),
            ]
        );
        let ids = module.instructions_of(func)?;
        assert_eq!(ids.len(), 4);
        assert!(module.instruction(ids[3])?.is_terminator());
        assert!(ctx.events.has_warning("reached the function boundary"));
        Ok(())
    }

    #[test]
    fn test_find_mode_reports_counts() -> Result<()> {
        let (module, _) = posix_critical_section()?;
        let op = MutexMutator::new(MutexConfig::new())?;
        assert!(!op.mutates());
        let report = op.report(&module, &IdentityAlias, &MutationContext::new())?;
        assert_eq!(report.to_string(), "0\t1\n");
        Ok(())
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        assert!(MutexMutator::new(MutexConfig::swap(vec![0, 0])).is_err());
    }
}
