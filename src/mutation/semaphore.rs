//! The semaphore operator: rewrites the initial value of `sem_init` / `sem_open`.
//!
//! The initial value is argument 2 of `sem_init(sem, pshared, value)` and argument 3 of
//! `sem_open(name, oflag, mode, value)`. The new value is an unsigned 32-bit constant,
//! capped at [`SEM_VALUE_MAX`].

use crate::{
    analysis::{AliasAnalysis, CallEnumerator, CallSite},
    config::{SemaphoreConfig, SEM_VALUE_MAX},
    ir::{Module, Value},
    mutation::{
        calls::{claim_call, is_untouched},
        DiagnosticKind, MutationContext, MutationPass, OccurrenceReport,
    },
    Result,
};

const NAME: &str = "semaphore";

const SEM_INIT: &str = "sem_init";
const SEM_OPEN: &str = "sem_open";

/// Returns the index of the initial-value argument for a semaphore constructor.
fn value_arg(name: &str) -> Option<usize> {
    match name {
        SEM_INIT => Some(2),
        SEM_OPEN => Some(3),
        _ => None,
    }
}

/// Mutation operator over semaphore initial values.
#[derive(Debug, Clone)]
pub struct SemaphoreMutator {
    config: SemaphoreConfig,
}

impl SemaphoreMutator {
    /// Creates the operator.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Config`] if the configuration is invalid.
    pub fn new(config: SemaphoreConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &SemaphoreConfig {
        &self.config
    }

    fn enumerator() -> CallEnumerator {
        CallEnumerator::new([SEM_INIT, SEM_OPEN])
    }

    /// Picks the value for the `request`-th position.
    fn value_for(&self, request: usize, ctx: &MutationContext) -> u32 {
        let value = match self.config.values.get(request) {
            Some(value) => *value,
            None => {
                ctx.events.warn(format!(
                    "{NAME}: no value given for request {request}, using {}",
                    self.config.fallback
                ));
                self.config.fallback
            }
        };
        if value > SEM_VALUE_MAX {
            ctx.events.warn(format!(
                "{NAME}: value {value} exceeds SEM_VALUE_MAX, using {SEM_VALUE_MAX}"
            ));
            return SEM_VALUE_MAX;
        }
        value
    }

    fn set_value(
        module: &mut Module,
        ctx: &MutationContext,
        site: &CallSite,
        value: u32,
    ) -> Result<bool> {
        let Some(index) = value_arg(site.name()) else {
            return Ok(false);
        };
        if site.arg_count() <= index {
            ctx.events.warn(format!(
                "{NAME}: call to {} has {} arguments, expected at least {}, skipping",
                site.name(),
                site.arg_count(),
                index + 1
            ));
            return Ok(false);
        }

        let inst = module.instruction_mut(site.id())?;
        let Some(slot) = inst.op_mut().call_args_mut().and_then(|args| args.get_mut(index)) else {
            return Ok(false);
        };
        let old = std::mem::replace(slot, Value::int(32, false, i64::from(value)));
        ctx.mark_site_mutated(site.id());
        ctx.events
            .record(DiagnosticKind::ArgumentChanged)
            .function(site.function())
            .pass(NAME)
            .message(format!("{} value {old} -> {value}", site.name()));
        Ok(true)
    }
}

impl MutationPass for SemaphoreMutator {
    fn name(&self) -> &'static str {
        NAME
    }

    fn description(&self) -> &'static str {
        "Changes the initial value of semaphores"
    }

    fn mutates(&self) -> bool {
        self.config.modify
    }

    fn run(
        &self,
        module: &mut Module,
        _alias: &dyn AliasAnalysis,
        ctx: &MutationContext,
    ) -> Result<bool> {
        if self.config.positions.is_empty() {
            ctx.events
                .warn(format!("{NAME}: modify specified without any positions"));
            return Ok(false);
        }
        let calls = Self::enumerator().enumerate(module)?;

        let mut modified = false;
        for (request, &position) in self.config.positions.iter().enumerate() {
            let Some(site) = claim_call(ctx, NAME, &calls, position) else {
                continue;
            };
            if !is_untouched(module, ctx, NAME, site) {
                continue;
            }
            let value = self.value_for(request, ctx);
            if Self::set_value(module, ctx, site, value)? {
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
            calls.iter().map(|site| {
                let value = value_arg(site.name())
                    .and_then(|index| site.arg(index))
                    .map_or_else(|| "?".to_string(), ToString::to_string);
                (site.loc(), format!("{} {value}", site.name()))
            }),
            self.config.verbose,
            ctx,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{analysis::IdentityAlias, ir::Type};

    fn semaphores() -> Result<Module> {
        let mut module = Module::new("sem");
        let init = module.declare("sem_init", Type::I32);
        let open = module.declare("sem_open", Type::Ptr);
        let mut f = module.build_function("f", Type::Void);
        f.block("entry");
        f.call(
            init,
            vec![Value::global("s"), Value::int(32, true, 0), Value::int(32, false, 1)],
        )?;
        f.call(
            open,
            vec![
                Value::global("name"),
                Value::int(32, true, 64),
                Value::int(32, false, 0o644),
                Value::int(32, false, 2),
            ],
        )?;
        f.call(init, vec![Value::global("t")])?;
        f.ret(None)?;
        f.finish();
        Ok(module)
    }

    fn value_of(module: &Module, position: usize) -> Result<Option<i64>> {
        let calls = SemaphoreMutator::enumerator().enumerate(module)?;
        let site = calls.get(position).unwrap();
        Ok(value_arg(site.name())
            .and_then(|index| site.arg(index))
            .and_then(Value::as_const)
            .and_then(|c| c.as_int()))
    }

    #[test]
    fn test_modify_values() -> Result<()> {
        let mut module = semaphores()?;
        let ctx = MutationContext::new();
        let config = SemaphoreConfig::modify(vec![0, 1], vec![5, u32::MAX]);
        let op = SemaphoreMutator::new(config)?;

        assert!(op.run(&mut module, &IdentityAlias, &ctx)?);
        assert_eq!(value_of(&module, 0)?, Some(5));
        assert_eq!(value_of(&module, 1)?, Some(i64::from(SEM_VALUE_MAX)));
        assert!(ctx.events.has_warning("exceeds SEM_VALUE_MAX"));
        Ok(())
    }

    #[test]
    fn test_missing_value_uses_fallback() -> Result<()> {
        let mut module = semaphores()?;
        let ctx = MutationContext::new();
        let config = SemaphoreConfig::modify(vec![1], vec![]).with_fallback(7);
        SemaphoreMutator::new(config)?.run(&mut module, &IdentityAlias, &ctx)?;

        assert_eq!(value_of(&module, 1)?, Some(7));
        assert!(ctx.events.has_warning("no value given for request 0"));
        Ok(())
    }

    #[test]
    fn test_short_argument_list_is_skipped() -> Result<()> {
        let mut module = semaphores()?;
        let ctx = MutationContext::new();
        let op = SemaphoreMutator::new(SemaphoreConfig::modify(vec![2], vec![3]))?;

        assert!(!op.run(&mut module, &IdentityAlias, &ctx)?);
        assert!(ctx.events.has_warning("expected at least 3"));
        Ok(())
    }

    #[test]
    fn test_report_counts_constructors() -> Result<()> {
        let module = semaphores()?;
        let op = SemaphoreMutator::new(SemaphoreConfig::default())?;
        let report = op.report(&module, &IdentityAlias, &MutationContext::new())?;
        assert_eq!(report.to_string(), "3\n");
        Ok(())
    }
}
