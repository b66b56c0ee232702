//! The yield operator: removes `pthread_yield` / `sched_yield` calls.

use crate::{
    analysis::{AliasAnalysis, CallEnumerator, CallSite},
    config::YieldConfig,
    ir::Module,
    mutation::{
        calls::{claim_call, is_untouched},
        DiagnosticKind, MutationContext, MutationPass, OccurrenceReport,
    },
    Result,
};

const NAME: &str = "yield";

/// Mutation operator over thread yields.
#[derive(Debug, Clone)]
pub struct YieldMutator {
    config: YieldConfig,
}

impl YieldMutator {
    /// Creates the operator.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Config`] if the configuration is invalid.
    pub fn new(config: YieldConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &YieldConfig {
        &self.config
    }

    fn enumerator() -> CallEnumerator {
        CallEnumerator::new(["pthread_yield", "sched_yield"])
    }

    fn remove(module: &mut Module, ctx: &MutationContext, site: &CallSite) -> Result<bool> {
        // Yield results are never rewritten; a used yield stays.
        if module.use_count(site.id())? > 0 {
            ctx.events.warn(format!(
                "{NAME}: call to {} {} has uses, skipping",
                site.name(),
                site.id()
            ));
            return Ok(false);
        }
        site.branch_to_normal(module)?;
        module.erase(site.id())?;
        ctx.mark_site_mutated(site.id());
        ctx.events
            .record(DiagnosticKind::CallRemoved)
            .function(site.function())
            .pass(NAME)
            .message(format!("removed {}", site.name()));
        Ok(true)
    }
}

impl MutationPass for YieldMutator {
    fn name(&self) -> &'static str {
        NAME
    }

    fn description(&self) -> &'static str {
        "Removes thread yields"
    }

    fn mutates(&self) -> bool {
        self.config.remove
    }

    fn run(
        &self,
        module: &mut Module,
        _alias: &dyn AliasAnalysis,
        ctx: &MutationContext,
    ) -> Result<bool> {
        let calls = Self::enumerator().enumerate(module)?;

        let mut modified = false;
        for &position in &self.config.positions {
            let Some(site) = claim_call(ctx, NAME, &calls, position) else {
                continue;
            };
            if is_untouched(module, ctx, NAME, site) && Self::remove(module, ctx, site)? {
                modified = true;
            }
        }
        Ok(modified)
    }

    fn report(
        &self,
        module: &Module,
        _alias: &dyn AliasAnalysis,
        ctx: &MutationContext,
    ) -> Result<OccurrenceReport> {
        let calls = Self::enumerator().enumerate(module)?;
        Ok(OccurrenceReport::sites(
            NAME,
            calls.iter().map(|site| (site.loc(), site.name().to_string())),
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
        ir::{Type, Value},
    };

    #[test]
    fn test_remove_unused_yield_only() -> Result<()> {
        let mut module = Module::new("yield");
        let sched = module.declare("sched_yield", Type::I32);
        let pthread = module.declare("pthread_yield", Type::I32);
        let mut f = module.build_function("spin", Type::Void);
        f.block("entry");
        f.call(sched, Vec::new())?;
        let used = f.call(pthread, Vec::new())?;
        f.store(Value::global("rc"), Value::Inst(used))?;
        f.ret(None)?;
        f.finish();

        let ctx = MutationContext::new();
        let op = YieldMutator::new(YieldConfig::remove(vec![0, 1]))?;
        assert!(op.run(&mut module, &IdentityAlias, &ctx)?);

        assert_eq!(ctx.events.count_kind(DiagnosticKind::CallRemoved), 1);
        assert!(ctx.events.has_warning("has uses"));
        assert!(module.is_live(used));
        Ok(())
    }

    #[test]
    fn test_remove_requires_positions() {
        assert!(YieldMutator::new(YieldConfig::remove(Vec::new())).is_err());
    }
}
