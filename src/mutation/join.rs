//! The thread join operator.
//!
//! Selected `pthread_join` and/or `std::thread::join` calls are removed or replaced by a
//! `sleep(seconds)` call. A replaced `pthread_join` passes the `int` result of `sleep` on
//! to its users. `std::thread::join` returns nothing, so the sleep is inserted in front of
//! it and the join is erased.

use crate::{
    analysis::{AliasAnalysis, CallEnumerator, CallSite, SiteForm},
    config::{JoinConfig, JoinMode},
    ir::{Callee, Instruction, Module, Op, Type, Value},
    mutation::{
        calls::{claim_call, is_untouched, remove_call, replace_call},
        DiagnosticKind, MutationContext, MutationPass, OccurrenceReport,
    },
    Result,
};

const NAME: &str = "join";

const PTHREAD_JOIN: &str = "pthread_join";
const STD_THREAD_JOIN: &str = "std::__1::thread::join";

/// Mutation operator over thread joins.
#[derive(Debug, Clone)]
pub struct JoinMutator {
    config: JoinConfig,
}

impl JoinMutator {
    /// Creates the operator.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Config`] if the configuration is invalid.
    pub fn new(config: JoinConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &JoinConfig {
        &self.config
    }

    fn enumerator(&self) -> CallEnumerator {
        let mut names = Vec::new();
        if self.config.posix {
            names.push(PTHREAD_JOIN);
        }
        if self.config.cxx11 {
            names.push(STD_THREAD_JOIN);
        }
        CallEnumerator::new(names).demangle(self.config.cxx11)
    }

    fn remove(module: &mut Module, ctx: &MutationContext, site: &CallSite) -> Result<()> {
        remove_call(module, site, 32, true)?;
        ctx.events
            .record(DiagnosticKind::CallRemoved)
            .function(site.function())
            .pass(NAME)
            .message(format!("removed {} {}", site.name(), site.id()));
        Ok(())
    }

    fn replace_with_sleep(
        module: &mut Module,
        ctx: &MutationContext,
        site: &CallSite,
        seconds: u32,
    ) -> Result<bool> {
        let is_std = site.name() == STD_THREAD_JOIN;
        if is_std && module.use_count(site.id())? > 0 {
            ctx.events.warn(format!(
                "{NAME}: std::thread::join call {} still has uses, skipping",
                site.id()
            ));
            return Ok(false);
        }

        let sleep = module.get_or_declare("sleep", Type::I32, vec![Type::I32]);
        let call = Instruction::new(Op::Call {
            callee: Callee::Direct(sleep),
            args: vec![Value::int(32, true, i64::from(seconds))],
            ret: Type::I32,
        })
        .at(site.loc().cloned());

        let sleep_call = if is_std {
            let sleep_call = module.insert_before(site.id(), call)?;
            if let SiteForm::Invoke { normal, .. } = site.site_form() {
                let branch = Instruction::new(Op::Br { target: normal }).at(site.loc().cloned());
                module.insert_before(site.id(), branch)?;
            }
            module.erase(site.id())?;
            sleep_call
        } else {
            replace_call(module, site, call)?
        };

        ctx.mark_site_mutated(sleep_call);
        ctx.events
            .record(DiagnosticKind::CallReplaced)
            .function(site.function())
            .pass(NAME)
            .message(format!("{} -> sleep({seconds})", site.name()));
        Ok(true)
    }
}

impl MutationPass for JoinMutator {
    fn name(&self) -> &'static str {
        NAME
    }

    fn description(&self) -> &'static str {
        "Removes thread joins or replaces them with a sleep"
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
        if self.config.positions.is_empty() {
            ctx.events
                .warn(format!("{NAME}: mutation specified without any positions"));
            return Ok(false);
        }
        let calls = self.enumerator().enumerate(module)?;

        let mut modified = false;
        for &position in &self.config.positions {
            let Some(site) = claim_call(ctx, NAME, &calls, position) else {
                continue;
            };
            if !is_untouched(module, ctx, NAME, site) {
                continue;
            }
            match mode {
                JoinMode::Remove => {
                    Self::remove(module, ctx, site)?;
                    modified = true;
                }
                JoinMode::ReplaceWithSleep { seconds } => {
                    if Self::replace_with_sleep(module, ctx, site, seconds)? {
                        modified = true;
                    }
                }
            }
            ctx.mark_site_mutated(site.id());
        }
        Ok(modified)
    }

    fn report(
        &self,
        module: &Module,
        _alias: &dyn AliasAnalysis,
        ctx: &MutationContext,
    ) -> Result<OccurrenceReport> {
        let calls = self.enumerator().enumerate(module)?;
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
    use crate::{analysis::IdentityAlias, ir::FuncId};

    /// `pthread_join` whose status is stored, then a `std::thread::join` invoke.
    fn joins() -> Result<(Module, FuncId)> {
        let mut module = Module::new("joins");
        let pthread_join = module.declare("pthread_join", Type::I32);
        let std_join = module.declare("_ZNSt3__16thread4joinEv", Type::Void);
        let mut f = module.build_function("main", Type::Void);
        f.block("entry");
        let status = f.call(pthread_join, vec![Value::global("t"), Value::global("ret")])?;
        f.store(Value::global("rc"), Value::Inst(status))?;
        let cont = f.create_block("cont");
        let lpad = f.create_block("lpad");
        f.invoke(std_join, vec![Value::global("thr")], cont, lpad)?;
        f.switch_to(cont).ret(None)?;
        f.switch_to(lpad).unreachable()?;
        let func = f.finish();
        Ok((module, func))
    }

    fn callees(module: &Module, func: FuncId) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for id in module.instructions_of(func)? {
            if let Some(name) = module.callee_name(id)? {
                names.push(name.to_string());
            }
        }
        Ok(names)
    }

    #[test]
    fn test_remove_posix_join_rewrites_status() -> Result<()> {
        let (mut module, func) = joins()?;
        let ctx = MutationContext::new();
        let op = JoinMutator::new(JoinConfig::remove(vec![0]))?;

        assert!(op.run(&mut module, &IdentityAlias, &ctx)?);
        assert_eq!(callees(&module, func)?, vec!["_ZNSt3__16thread4joinEv"]);
        let stored = module
            .instructions_of(func)?
            .into_iter()
            .find_map(|id| match module.instruction(id).ok()?.op() {
                Op::Store { value, .. } => Some(value.clone()),
                _ => None,
            });
        assert_eq!(stored, Some(Value::int(32, true, 0)));
        Ok(())
    }

    #[test]
    fn test_replace_both_families_with_sleep() -> Result<()> {
        let (mut module, func) = joins()?;
        let ctx = MutationContext::new();
        let config = JoinConfig::replace_with_sleep(vec![0, 1], 3).with_families(true, true);
        let op = JoinMutator::new(config)?;

        assert!(op.run(&mut module, &IdentityAlias, &ctx)?);
        assert_eq!(callees(&module, func)?, vec!["sleep", "sleep"]);
        assert_eq!(ctx.events.count_kind(DiagnosticKind::CallReplaced), 2);

        let entry = &module.function(func).unwrap().blocks()[0];
        let last = entry.last().unwrap();
        assert!(matches!(module.instruction(last)?.op(), Op::Br { .. }));
        Ok(())
    }

    #[test]
    fn test_duplicate_position_warns_once() -> Result<()> {
        let (mut module, _) = joins()?;
        let ctx = MutationContext::new();
        let op = JoinMutator::new(JoinConfig::remove(vec![0, 0, 4]))?;

        op.run(&mut module, &IdentityAlias, &ctx)?;
        assert_eq!(ctx.events.count_kind(DiagnosticKind::CallRemoved), 1);
        assert!(ctx.events.has_warning("position 0 was already mutated"));
        assert!(ctx.events.has_warning("position 4 is out of bounds"));
        Ok(())
    }

    #[test]
    fn test_remove_without_positions_warns() -> Result<()> {
        let (mut module, _) = joins()?;
        let ctx = MutationContext::new();
        let op = JoinMutator::new(JoinConfig::remove(Vec::new()))?;

        assert!(!op.run(&mut module, &IdentityAlias, &ctx)?);
        assert!(ctx.events.has_warning("without any positions"));
        Ok(())
    }

    #[test]
    fn test_report_only_selected_families() -> Result<()> {
        let (module, _) = joins()?;
        let posix = JoinMutator::new(JoinConfig::new())?;
        let both = JoinMutator::new(JoinConfig::new().with_families(true, true))?;
        let ctx = MutationContext::new();

        assert_eq!(posix.report(&module, &IdentityAlias, &ctx)?.total(), 1);
        assert_eq!(both.report(&module, &IdentityAlias, &ctx)?.total(), 2);
        Ok(())
    }
}
