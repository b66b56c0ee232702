//! The fence operator.
//!
//! Fences are numbered in module order (function by function, block by block). A selected
//! fence is erased, gets a new ordering or has its scope toggled.

use crate::{
    analysis::{visitors, AliasAnalysis, MemorySite},
    config::{nth_or_last, FenceConfig, FenceMode, OrderingTable},
    ir::{Module, Op},
    mutation::{DiagnosticKind, MutationContext, MutationPass, OccurrenceReport},
    Result,
};

const NAME: &str = "fence";

/// Mutation operator over `fence` instructions.
#[derive(Debug, Clone)]
pub struct FenceMutator {
    config: FenceConfig,
}

impl FenceMutator {
    /// Creates the operator.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Config`] if the configuration is invalid.
    pub fn new(config: FenceConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &FenceConfig {
        &self.config
    }

    fn mutate_one(
        module: &mut Module,
        ctx: &MutationContext,
        mode: &FenceMode,
        request: usize,
        site: &MemorySite,
    ) -> Result<()> {
        match mode {
            FenceMode::Remove => {
                module.erase(site.id)?;
                ctx.events
                    .record(DiagnosticKind::InstructionRemoved)
                    .function(site.function)
                    .pass(NAME)
                    .message("removed fence");
            }
            FenceMode::Ordering { orders } => {
                let new = nth_or_last(orders, request).and_then(|code| OrderingTable::Fence.decode(code));
                let Some(new) = new else {
                    ctx.events
                        .warn(format!("{NAME}: no valid ordering for request {request}, skipping"));
                    return Ok(());
                };
                if let Op::Fence { ordering, .. } = module.instruction_mut(site.id)?.op_mut() {
                    let old = std::mem::replace(ordering, new);
                    ctx.events
                        .record(DiagnosticKind::OrderingChanged)
                        .function(site.function)
                        .pass(NAME)
                        .message(format!("{old} -> {new}"));
                }
            }
            FenceMode::ToggleScope => {
                if let Op::Fence { scope, .. } = module.instruction_mut(site.id)?.op_mut() {
                    *scope = scope.toggled();
                    ctx.events
                        .record(DiagnosticKind::ScopeToggled)
                        .function(site.function)
                        .pass(NAME)
                        .message(format!("scope is now {scope}"));
                }
            }
        }
        Ok(())
    }
}

impl MutationPass for FenceMutator {
    fn name(&self) -> &'static str {
        NAME
    }

    fn description(&self) -> &'static str {
        "Removes fences, changes their ordering or toggles their scope"
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
        let sites = visitors::fences(module)?;

        let mut modified = false;
        for (request, &position) in self.config.positions.iter().enumerate() {
            if !ctx.claim_or_warn(NAME, position, sites.len()) {
                continue;
            }
            Self::mutate_one(module, ctx, mode, request, &sites[position])?;
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
        let sites = visitors::fences(module)?;
        Ok(OccurrenceReport::sites(
            NAME,
            sites.iter().map(|site| (site.loc.as_ref(), String::new())),
            self.config.verbose,
            ctx,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        analysis::IdentityAlias,
        ir::{AtomicOrdering, FuncId, SyncScope, Type},
    };

    fn three_fences() -> Result<(Module, FuncId)> {
        let mut module = Module::new("fences");
        let mut f = module.build_function("f", Type::Void);
        f.block("entry");
        f.at("f.c", 3).fence(AtomicOrdering::Acquire, SyncScope::CrossThread)?;
        f.at("f.c", 4).fence(AtomicOrdering::Release, SyncScope::CrossThread)?;
        f.at("f.c", 5).fence(AtomicOrdering::SequentiallyConsistent, SyncScope::SingleThread)?;
        f.ret(None)?;
        let func = f.finish();
        Ok((module, func))
    }

    fn fence_state(module: &Module) -> Result<Vec<(AtomicOrdering, SyncScope)>> {
        let mut state = Vec::new();
        for site in visitors::fences(module)? {
            if let Op::Fence { ordering, scope } = module.instruction(site.id)?.op() {
                state.push((*ordering, *scope));
            }
        }
        Ok(state)
    }

    #[test]
    fn test_remove_and_out_of_bounds() -> Result<()> {
        let (mut module, _) = three_fences()?;
        let ctx = MutationContext::new();
        let op = FenceMutator::new(FenceConfig::mutate(FenceMode::Remove, vec![1, 9]))?;

        assert!(op.run(&mut module, &IdentityAlias, &ctx)?);
        assert_eq!(visitors::fences(&module)?.len(), 2);
        assert!(ctx.events.has_warning("position 9 is out of bounds"));
        Ok(())
    }

    #[test]
    fn test_ordering_reuses_last_code() -> Result<()> {
        let (mut module, _) = three_fences()?;
        let ctx = MutationContext::new();
        let mode = FenceMode::Ordering { orders: vec![1] };
        let op = FenceMutator::new(FenceConfig::mutate(mode, vec![0, 2]))?;

        op.run(&mut module, &IdentityAlias, &ctx)?;
        let state = fence_state(&module)?;
        assert_eq!(state[0].0, AtomicOrdering::Release);
        assert_eq!(state[1].0, AtomicOrdering::Release);
        assert_eq!(state[2].0, AtomicOrdering::Release);
        assert_eq!(ctx.events.count_kind(DiagnosticKind::OrderingChanged), 2);
        Ok(())
    }

    #[test]
    fn test_toggle_scope_and_duplicate_position() -> Result<()> {
        let (mut module, _) = three_fences()?;
        let ctx = MutationContext::new();
        let op = FenceMutator::new(FenceConfig::mutate(FenceMode::ToggleScope, vec![2, 2]))?;

        op.run(&mut module, &IdentityAlias, &ctx)?;
        assert_eq!(fence_state(&module)?[2].1, SyncScope::CrossThread);
        assert!(ctx.events.has_warning("position 2 was already mutated"));
        Ok(())
    }

    #[test]
    fn test_verbose_report() -> Result<()> {
        let (module, _) = three_fences()?;
        let op = FenceMutator::new(FenceConfig::new().with_verbose(true))?;
        let report = op.report(&module, &IdentityAlias, &MutationContext::new())?;
        assert_eq!(report.to_string(), "0\tf.c:3\n1\tf.c:4\n2\tf.c:5\n");
        Ok(())
    }
}
