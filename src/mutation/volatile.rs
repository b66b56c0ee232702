//! The volatile operator: clears the volatile flag of selected accesses.
//!
//! Candidates are volatile loads, stores, `cmpxchg` and `atomicrmw` instructions and
//! `llvm.memcpy*` calls whose `isvolatile` argument is `1`. For the intrinsic the
//! argument is rewritten to an `i1 0`.

use crate::{
    analysis::{visitors, visitors::MEMCPY_VOLATILE_ARG, AliasAnalysis, MemorySite},
    config::VolatileConfig,
    ir::{Module, Op, Value},
    mutation::{DiagnosticKind, MutationContext, MutationPass, OccurrenceReport},
    Result,
};

const NAME: &str = "volatile";

/// Mutation operator over volatile memory accesses.
#[derive(Debug, Clone)]
pub struct VolatileMutator {
    config: VolatileConfig,
}

impl VolatileMutator {
    /// Creates the operator.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Config`] if the configuration is invalid.
    pub fn new(config: VolatileConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &VolatileConfig {
        &self.config
    }

    fn clear(module: &mut Module, site: &MemorySite) -> Result<bool> {
        let op = module.instruction_mut(site.id)?.op_mut();
        if let Some(args) = op.call_args_mut() {
            let Some(flag) = args.get_mut(MEMCPY_VOLATILE_ARG) else {
                return Ok(false);
            };
            *flag = Value::int(1, false, 0);
            return Ok(true);
        }
        match op {
            Op::Load { volatile, .. }
            | Op::Store { volatile, .. }
            | Op::CmpXchg { volatile, .. }
            | Op::AtomicRmw { volatile, .. } => {
                *volatile = false;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

impl MutationPass for VolatileMutator {
    fn name(&self) -> &'static str {
        NAME
    }

    fn description(&self) -> &'static str {
        "Clears the volatile flag of memory accesses and memcpy intrinsics"
    }

    fn mutates(&self) -> bool {
        !self.config.positions.is_empty()
    }

    fn run(
        &self,
        module: &mut Module,
        _alias: &dyn AliasAnalysis,
        ctx: &MutationContext,
    ) -> Result<bool> {
        let sites = visitors::volatiles(module)?;

        let mut modified = false;
        for &position in &self.config.positions {
            if !ctx.claim_or_warn(NAME, position, sites.len()) {
                continue;
            }
            let site = &sites[position];
            if Self::clear(module, site)? {
                ctx.events
                    .record(DiagnosticKind::VolatileRemoved)
                    .function(site.function)
                    .pass(NAME)
                    .message(format!("{} is no longer volatile", site.kind));
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
        let sites = visitors::volatiles(module)?;
        Ok(OccurrenceReport::sites(
            NAME,
            sites
                .iter()
                .map(|site| (site.loc.as_ref(), site.kind.to_string())),
            self.config.verbose,
            ctx,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{analysis::IdentityAlias, ir::Type};

    fn volatile_module() -> Result<Module> {
        let mut module = Module::new("volatile");
        let memcpy = module.declare("llvm.memcpy.p0.p0.i64", Type::Void);
        let mut f = module.build_function("f", Type::Void);
        f.block("entry");
        f.at("v.c", 1).volatile_load(Value::global("x"), Type::I32)?;
        f.no_loc().volatile_store(Value::global("x"), Value::int(32, true, 1))?;
        f.call(
            memcpy,
            vec![
                Value::global("dst"),
                Value::global("src"),
                Value::int(64, false, 16),
                Value::int(32, false, 4),
                Value::int(1, false, 1),
            ],
        )?;
        f.ret(None)?;
        f.finish();
        Ok(module)
    }

    #[test]
    fn test_clear_all_candidates() -> Result<()> {
        let mut module = volatile_module()?;
        let ctx = MutationContext::new();
        let op = VolatileMutator::new(VolatileConfig::remove(vec![0, 1, 2]))?;

        assert!(op.run(&mut module, &IdentityAlias, &ctx)?);
        assert!(visitors::volatiles(&module)?.is_empty());
        assert_eq!(ctx.events.count_kind(DiagnosticKind::VolatileRemoved), 3);
        Ok(())
    }

    #[test]
    fn test_verbose_report_warns_on_missing_location() -> Result<()> {
        let module = volatile_module()?;
        let ctx = MutationContext::new();
        let op = VolatileMutator::new(VolatileConfig::default().with_verbose(true))?;

        let report = op.report(&module, &IdentityAlias, &ctx)?;
        assert_eq!(report.total(), 3);
        assert_eq!(ctx.events.count_kind(DiagnosticKind::Warning), 2);
        Ok(())
    }
}
