//! The condition variable operators.
//!
//! [`CondSignalMutator`] works on `pthread_cond_signal` / `pthread_cond_broadcast`:
//! it removes a call or exchanges signal and broadcast.
//!
//! [`CondWaitMutator`] works on `pthread_cond_wait` / `pthread_cond_timedwait`: it removes
//! a wait, turns a timed wait into an untimed one, or shifts the deadline of a timed wait
//! by adding constant deltas to its `timespec`:
//!
//! ```text
//! %sec  = gep %ts, 0        %nsec  = gep %ts, 1
//! %s    = load i64 %sec     %n     = load i64 %nsec
//! %s2   = add %s, <sec>     %n2    = add %n, <nsec>
//! store %s2, %sec           store %n2, %nsec
//! ```

use crate::{
    analysis::{AliasAnalysis, CallEnumerator, CallSite},
    config::{nth_or_last, CondSignalConfig, CondSignalMode, CondWaitConfig, CondWaitMode},
    ir::{AtomicOrdering, BinaryOp, DebugLoc, InstId, Instruction, Module, Op, SyncScope, Type, Value},
    mutation::{
        calls::{claim_call, is_untouched, remove_call},
        DiagnosticKind, MutationContext, MutationPass, OccurrenceReport,
    },
    Result,
};

const SIGNAL_NAME: &str = "cond-signal";
const WAIT_NAME: &str = "cond-wait";

const COND_SIGNAL: &str = "pthread_cond_signal";
const COND_BROADCAST: &str = "pthread_cond_broadcast";
const COND_WAIT: &str = "pthread_cond_wait";
const COND_TIMEDWAIT: &str = "pthread_cond_timedwait";

fn remove(module: &mut Module, ctx: &MutationContext, pass: &'static str, site: &CallSite) -> Result<()> {
    remove_call(module, site, 32, true)?;
    ctx.mark_site_mutated(site.id());
    ctx.events
        .record(DiagnosticKind::CallRemoved)
        .function(site.function())
        .pass(pass)
        .message(format!("removed {} {}", site.name(), site.id()));
    Ok(())
}

fn site_report(
    pass: &'static str,
    module: &Module,
    names: [&str; 2],
    verbose: bool,
    ctx: &MutationContext,
) -> Result<OccurrenceReport> {
    let calls = CallEnumerator::new(names).enumerate(module)?;
    Ok(OccurrenceReport::sites(
        pass,
        calls.iter().map(|site| (site.loc(), site.name().to_string())),
        verbose,
        ctx,
    ))
}

// ── Signal / broadcast ──────────────────────────────────────────────────

/// Mutation operator over condition signals and broadcasts.
#[derive(Debug, Clone)]
pub struct CondSignalMutator {
    config: CondSignalConfig,
}

impl CondSignalMutator {
    /// Creates the operator.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Config`] if the configuration is invalid.
    pub fn new(config: CondSignalConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &CondSignalConfig {
        &self.config
    }

    /// Retargets a signal to broadcast and vice versa, keeping arguments and call form.
    fn swap(module: &mut Module, ctx: &MutationContext, site: &CallSite) -> Result<()> {
        let other = if site.name() == COND_SIGNAL {
            COND_BROADCAST
        } else {
            COND_SIGNAL
        };
        let target = module.get_or_declare(other, Type::I32, vec![Type::Ptr]);
        let replacement = site.clone_with(target, site.args().to_vec(), site.ret());
        let new = module.replace_with(site.id(), replacement)?;

        ctx.mark_site_mutated(site.id());
        ctx.mark_site_mutated(new);
        ctx.events
            .record(DiagnosticKind::CallReplaced)
            .function(site.function())
            .pass(SIGNAL_NAME)
            .message(format!("{} -> {other}", site.name()));
        Ok(())
    }
}

impl MutationPass for CondSignalMutator {
    fn name(&self) -> &'static str {
        SIGNAL_NAME
    }

    fn description(&self) -> &'static str {
        "Removes condition signals or exchanges signal and broadcast"
    }

    fn mutates(&self) -> bool {
        self.config.mode.is_some()
    }

    fn run(
        &self,
        module: &mut Module,
        _alias: &dyn AliasAnalysis,
        ctx: &MutationContext,
    ) -> Result<bool> {
        let Some(mode) = self.config.mode else {
            return Ok(false);
        };
        if self.config.overridden {
            ctx.events.warn(format!(
                "{SIGNAL_NAME}: both remove and swap specified; remove takes precedence"
            ));
        }
        let calls = CallEnumerator::new([COND_SIGNAL, COND_BROADCAST]).enumerate(module)?;

        let mut modified = false;
        for &position in &self.config.positions {
            let Some(site) = claim_call(ctx, SIGNAL_NAME, &calls, position) else {
                continue;
            };
            if !is_untouched(module, ctx, SIGNAL_NAME, site) {
                continue;
            }
            if site.arg_count() == 0 {
                ctx.events.warn(format!(
                    "{SIGNAL_NAME}: call to {} has no arguments, skipping",
                    site.name()
                ));
                continue;
            }
            match mode {
                CondSignalMode::Remove => remove(module, ctx, SIGNAL_NAME, site)?,
                CondSignalMode::Swap => Self::swap(module, ctx, site)?,
            }
            modified = true;
        }
        Ok(modified)
    }

    fn report(
        &self,
        module: &Module,
        _alias: &dyn AliasAnalysis,
        ctx: &MutationContext,
    ) -> Result<OccurrenceReport> {
        site_report(
            SIGNAL_NAME,
            module,
            [COND_SIGNAL, COND_BROADCAST],
            self.config.verbose,
            ctx,
        )
    }
}

// ── Wait / timed wait ───────────────────────────────────────────────────

/// Mutation operator over condition waits.
#[derive(Debug, Clone)]
pub struct CondWaitMutator {
    config: CondWaitConfig,
}

impl CondWaitMutator {
    /// Creates the operator.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Config`] if the configuration is invalid.
    pub fn new(config: CondWaitConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &CondWaitConfig {
        &self.config
    }

    fn switch(module: &mut Module, ctx: &MutationContext, site: &CallSite) -> Result<bool> {
        if site.name() == COND_WAIT {
            ctx.events.warn(format!(
                "{WAIT_NAME}: switching pthread_cond_wait to pthread_cond_timedwait is not supported"
            ));
            return Ok(false);
        }
        if site.arg_count() != 3 {
            ctx.events.warn(format!(
                "{WAIT_NAME}: pthread_cond_timedwait call {} has {} arguments, expected 3, skipping",
                site.id(),
                site.arg_count()
            ));
            return Ok(false);
        }

        let wait = module.get_or_declare(COND_WAIT, Type::I32, vec![Type::Ptr, Type::Ptr]);
        let replacement = site.clone_with(wait, site.args()[..2].to_vec(), Type::I32);
        let new = module.replace_with(site.id(), replacement)?;

        ctx.mark_site_mutated(site.id());
        ctx.mark_site_mutated(new);
        ctx.events
            .record(DiagnosticKind::CallReplaced)
            .function(site.function())
            .pass(WAIT_NAME)
            .message(format!("{COND_TIMEDWAIT} -> {COND_WAIT}"));
        Ok(true)
    }

    /// Adds `seconds` and `nanos` to the deadline of a timed wait.
    fn timeout(
        module: &mut Module,
        ctx: &MutationContext,
        site: &CallSite,
        seconds: i64,
        nanos: i64,
        insert_point: Option<usize>,
    ) -> Result<bool> {
        if site.name() != COND_TIMEDWAIT {
            ctx.events.warn(format!(
                "{WAIT_NAME}: timeout modification only applies to pthread_cond_timedwait, skipping"
            ));
            return Ok(false);
        }
        let Some(timespec) = site.arg(2).cloned() else {
            ctx.events.warn(format!(
                "{WAIT_NAME}: pthread_cond_timedwait call {} has no timespec argument, skipping",
                site.id()
            ));
            return Ok(false);
        };

        let anchor = match insert_point {
            None => site.id(),
            Some(index) => {
                let order = module.instructions_of(site.function())?;
                match order.get(index) {
                    Some(id) => *id,
                    None => {
                        ctx.events.error(format!(
                            "{WAIT_NAME}: insert point {index} is out of range ({} instructions)",
                            order.len()
                        ));
                        return Ok(false);
                    }
                }
            }
        };

        let loc = site.loc().cloned();
        let mut inserted = Vec::with_capacity(8);
        for (field, delta) in [(0, seconds), (1, nanos)] {
            inserted.extend(Self::add_to_field(
                module,
                anchor,
                &timespec,
                field,
                delta,
                loc.as_ref(),
            )?);
        }

        for id in &inserted {
            ctx.mark_site_mutated(*id);
        }
        ctx.mark_site_mutated(site.id());
        ctx.events
            .record(DiagnosticKind::CodeInserted)
            .at(site.function(), module.position(anchor)?)
            .pass(WAIT_NAME)
            .message(format!(
                "timeout of call {} shifted by {seconds}s {nanos}ns",
                site.id()
            ));
        Ok(true)
    }

    /// Emits `*field += delta` in front of `anchor` and returns the new instructions.
    fn add_to_field(
        module: &mut Module,
        anchor: InstId,
        timespec: &Value,
        field: u32,
        delta: i64,
        loc: Option<&DebugLoc>,
    ) -> Result<[InstId; 4]> {
        let mut emit = |op: Op| module.insert_before(anchor, Instruction::new(op).at(loc.cloned()));

        let ptr = emit(Op::Gep {
            base: timespec.clone(),
            field,
        })?;
        let old = emit(Op::Load {
            ptr: Value::Inst(ptr),
            ty: Type::I64,
            volatile: false,
            ordering: AtomicOrdering::NotAtomic,
            scope: SyncScope::CrossThread,
        })?;
        let sum = emit(Op::Binary {
            op: BinaryOp::Add,
            lhs: Value::Inst(old),
            rhs: Value::int(64, true, delta),
            ty: Type::I64,
        })?;
        let store = emit(Op::Store {
            ptr: Value::Inst(ptr),
            value: Value::Inst(sum),
            volatile: false,
            ordering: AtomicOrdering::NotAtomic,
            scope: SyncScope::CrossThread,
        })?;
        Ok([ptr, old, sum, store])
    }
}

impl MutationPass for CondWaitMutator {
    fn name(&self) -> &'static str {
        WAIT_NAME
    }

    fn description(&self) -> &'static str {
        "Removes condition waits, drops their timeout or shifts their deadline"
    }

    fn mutates(&self) -> bool {
        self.config.mode.is_some()
    }

    fn run(
        &self,
        module: &mut Module,
        _alias: &dyn AliasAnalysis,
        ctx: &MutationContext,
    ) -> Result<bool> {
        let Some(mode) = &self.config.mode else {
            return Ok(false);
        };
        let calls = CallEnumerator::new([COND_WAIT, COND_TIMEDWAIT]).enumerate(module)?;

        let mut modified = false;
        for (request, &position) in self.config.positions.iter().enumerate() {
            let Some(site) = claim_call(ctx, WAIT_NAME, &calls, position) else {
                continue;
            };
            if !is_untouched(module, ctx, WAIT_NAME, site) {
                continue;
            }
            let changed = match mode {
                CondWaitMode::Remove => {
                    remove(module, ctx, WAIT_NAME, site)?;
                    true
                }
                CondWaitMode::Switch => Self::switch(module, ctx, site)?,
                CondWaitMode::Timeout {
                    seconds,
                    nanos,
                    insert_points,
                } => Self::timeout(
                    module,
                    ctx,
                    site,
                    nth_or_last(seconds, request).unwrap_or(0),
                    nth_or_last(nanos, request).unwrap_or(0),
                    nth_or_last(insert_points, request),
                )?,
            };
            modified |= changed;
        }
        Ok(modified)
    }

    fn report(
        &self,
        module: &Module,
        _alias: &dyn AliasAnalysis,
        ctx: &MutationContext,
    ) -> Result<OccurrenceReport> {
        site_report(
            WAIT_NAME,
            module,
            [COND_WAIT, COND_TIMEDWAIT],
            self.config.verbose,
            ctx,
        )
    }
}
