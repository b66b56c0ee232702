//! The atomic instruction operators: `cmpxchg`, `store`, `load` and `atomicrmw`.
//!
//! One [`AtomicMutator`] type serves all four instruction kinds; the
//! [`AtomicTarget`] of its configuration selects the collector, the ordering code table
//! and the operator name used for positions and diagnostics.
//!
//! | Target | Ordering field changed | Extra mode |
//! |---|---|---|
//! | cmpxchg | success ordering | - |
//! | store | ordering (atomic stores only) | toggle atomicity |
//! | load | ordering (atomic loads only) | - |
//! | atomicrmw | ordering | - |

use crate::{
    analysis::{visitors, AliasAnalysis, MemorySite},
    config::{nth_or_last, AtomicConfig, AtomicMode, AtomicTarget},
    ir::{AtomicOrdering, Module, Op, SyncScope},
    mutation::{DiagnosticKind, MutationContext, MutationPass, OccurrenceReport},
    Result,
};

/// Mutation operator over one kind of atomic memory instruction.
#[derive(Debug, Clone)]
pub struct AtomicMutator {
    config: AtomicConfig,
}

/// The ordering and scope fields of one instruction.
struct AtomicFields<'a> {
    ordering: &'a mut AtomicOrdering,
    scope: &'a mut SyncScope,
}

fn fields_of(op: &mut Op) -> Option<AtomicFields<'_>> {
    match op {
        Op::Load {
            ordering, scope, ..
        }
        | Op::Store {
            ordering, scope, ..
        }
        | Op::AtomicRmw {
            ordering, scope, ..
        } => Some(AtomicFields { ordering, scope }),
        Op::CmpXchg { success, scope, .. } => Some(AtomicFields {
            ordering: success,
            scope,
        }),
        _ => None,
    }
}

impl AtomicMutator {
    /// Creates the operator.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Config`] if the configuration is invalid.
    pub fn new(config: AtomicConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &AtomicConfig {
        &self.config
    }

    fn collect(&self, module: &Module) -> Result<Vec<MemorySite>> {
        match self.config.target {
            AtomicTarget::CmpXchg => visitors::cmpxchgs(module),
            AtomicTarget::Store => visitors::stores(module, self.config.only_atomic),
            AtomicTarget::Load => visitors::loads(module, self.config.only_atomic),
            AtomicTarget::AtomicRmw => visitors::atomic_rmws(module),
        }
    }

    /// Plain loads and stores are candidates too, but only atomic ones have an ordering
    /// and a scope to change.
    fn requires_atomic(&self) -> bool {
        matches!(self.config.target, AtomicTarget::Store | AtomicTarget::Load)
    }

    fn mutate_one(
        &self,
        module: &mut Module,
        ctx: &MutationContext,
        mode: &AtomicMode,
        request: usize,
        site: &MemorySite,
    ) -> Result<bool> {
        let name = self.name();
        let table = self.config.target.table();
        let Some(fields) = fields_of(module.instruction_mut(site.id)?.op_mut()) else {
            return Ok(false);
        };

        let is_atomic = fields.ordering.is_atomic();
        match mode {
            AtomicMode::ToggleAtomic => {
                if !is_atomic {
                    ctx.events.warn(format!(
                        "{name}: toggle only supported for atomic stores, skipping"
                    ));
                    return Ok(false);
                }
                *fields.ordering = AtomicOrdering::NotAtomic;
                *fields.scope = SyncScope::CrossThread;
                ctx.events
                    .record(DiagnosticKind::AtomicityRemoved)
                    .function(site.function)
                    .pass(name)
                    .message(format!("{name} is no longer atomic"));
            }
            AtomicMode::Ordering { orders } => {
                if self.requires_atomic() && !is_atomic {
                    ctx.events.warn(format!(
                        "{name}: ordering change only supported for atomic {name}s, skipping"
                    ));
                    return Ok(false);
                }
                let Some(new) = nth_or_last(orders, request).and_then(|code| table.decode(code))
                else {
                    ctx.events
                        .warn(format!("{name}: no valid ordering for request {request}, skipping"));
                    return Ok(false);
                };
                let old = std::mem::replace(fields.ordering, new);
                ctx.events
                    .record(DiagnosticKind::OrderingChanged)
                    .function(site.function)
                    .pass(name)
                    .message(format!("{old} -> {new}"));
            }
            AtomicMode::ToggleScope => {
                if self.requires_atomic() && !is_atomic {
                    ctx.events.warn(format!(
                        "{name}: scope toggle only supported for atomic {name}s, skipping"
                    ));
                    return Ok(false);
                }
                *fields.scope = fields.scope.toggled();
                ctx.events
                    .record(DiagnosticKind::ScopeToggled)
                    .function(site.function)
                    .pass(name)
                    .message(format!("scope is now {}", fields.scope));
            }
        }
        Ok(true)
    }
}

impl MutationPass for AtomicMutator {
    fn name(&self) -> &'static str {
        match self.config.target {
            AtomicTarget::CmpXchg => "cmpxchg",
            AtomicTarget::Store => "store",
            AtomicTarget::Load => "load",
            AtomicTarget::AtomicRmw => "atomicrmw",
        }
    }

    fn description(&self) -> &'static str {
        "Changes the ordering or scope of atomic instructions, or makes stores non-atomic"
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
        let sites = self.collect(module)?;

        let mut modified = false;
        for (request, &position) in self.config.positions.iter().enumerate() {
            if !ctx.claim_or_warn(self.name(), position, sites.len()) {
                continue;
            }
            if self.mutate_one(module, ctx, mode, request, &sites[position])? {
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
        let mut lines = Vec::new();
        for site in self.collect(module)? {
            let detail = match module.instruction(site.id)?.op() {
                Op::Load { ordering, .. } | Op::Store { ordering, .. } | Op::AtomicRmw { ordering, .. } => {
                    ordering.to_string()
                }
                Op::CmpXchg {
                    success, failure, ..
                } => format!("{success} {failure}"),
                _ => String::new(),
            };
            lines.push((site.loc, detail));
        }
        Ok(OccurrenceReport::sites(
            self.name(),
            lines.iter().map(|(loc, detail)| (loc.as_ref(), detail.clone())),
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
        ir::{RmwOp, Type, Value},
    };

    fn memory_ops() -> Result<Module> {
        let mut module = Module::new("atomics");
        let mut f = module.build_function("f", Type::Void);
        f.block("entry");
        f.store(Value::global("plain"), Value::int(32, true, 0))?;
        f.atomic_store(
            Value::global("flag"),
            Value::int(32, true, 1),
            AtomicOrdering::Release,
            SyncScope::CrossThread,
        )?;
        f.atomic_load(
            Value::global("flag"),
            Type::I32,
            AtomicOrdering::Acquire,
            SyncScope::CrossThread,
        )?;
        f.cmpxchg(
            Value::global("flag"),
            Value::int(32, true, 0),
            Value::int(32, true, 1),
            Type::I32,
            AtomicOrdering::SequentiallyConsistent,
            AtomicOrdering::Monotonic,
        )?;
        f.atomic_rmw(
            RmwOp::Add,
            Value::global("counter"),
            Value::int(32, true, 1),
            Type::I32,
            AtomicOrdering::Monotonic,
        )?;
        f.ret(None)?;
        f.finish();
        Ok(module)
    }

    fn run(config: AtomicConfig, module: &mut Module) -> Result<MutationContext> {
        let ctx = MutationContext::new();
        AtomicMutator::new(config)?.run(module, &IdentityAlias, &ctx)?;
        Ok(ctx)
    }

    fn op_at(module: &Module, target: AtomicTarget, position: usize) -> Result<Op> {
        let op = AtomicMutator::new(AtomicConfig::new(target))?;
        let site = &op.collect(module)?[position];
        Ok(module.instruction(site.id)?.op().clone())
    }

    #[test]
    fn test_toggle_store_atomicity() -> Result<()> {
        let mut module = memory_ops()?;
        let config = AtomicConfig::mutate(AtomicTarget::Store, AtomicMode::ToggleAtomic, vec![0, 1]);
        let ctx = run(config, &mut module)?;

        assert!(ctx.events.has_warning("toggle only supported for atomic stores"));
        assert_eq!(ctx.events.count_kind(DiagnosticKind::AtomicityRemoved), 1);
        let Op::Store { ordering, .. } = op_at(&module, AtomicTarget::Store, 1)? else {
            panic!("expected a store");
        };
        assert_eq!(ordering, AtomicOrdering::NotAtomic);
        Ok(())
    }

    #[test]
    fn test_only_atomic_renumbers_stores() -> Result<()> {
        let mut module = memory_ops()?;
        let config = AtomicConfig::mutate(
            AtomicTarget::Store,
            AtomicMode::Ordering { orders: vec![3] },
            vec![0],
        )
        .with_only_atomic(true);
        let ctx = run(config, &mut module)?;

        assert_eq!(ctx.events.count_kind(DiagnosticKind::OrderingChanged), 1);
        let Op::Store { ordering, .. } = op_at(&module, AtomicTarget::Store, 1)? else {
            panic!("expected a store");
        };
        assert_eq!(ordering, AtomicOrdering::SequentiallyConsistent);
        Ok(())
    }

    #[test]
    fn test_cmpxchg_changes_success_ordering() -> Result<()> {
        let mut module = memory_ops()?;
        let config = AtomicConfig::mutate(
            AtomicTarget::CmpXchg,
            AtomicMode::Ordering { orders: vec![0] },
            vec![0],
        );
        run(config, &mut module)?;

        let Op::CmpXchg {
            success, failure, ..
        } = op_at(&module, AtomicTarget::CmpXchg, 0)?
        else {
            panic!("expected a cmpxchg");
        };
        assert_eq!(success, AtomicOrdering::Monotonic);
        assert_eq!(failure, AtomicOrdering::Monotonic);
        Ok(())
    }

    #[test]
    fn test_scope_toggle_on_rmw_and_load() -> Result<()> {
        let mut module = memory_ops()?;
        run(
            AtomicConfig::mutate(AtomicTarget::AtomicRmw, AtomicMode::ToggleScope, vec![0]),
            &mut module,
        )?;
        run(
            AtomicConfig::mutate(AtomicTarget::Load, AtomicMode::ToggleScope, vec![0]),
            &mut module,
        )?;

        assert!(matches!(
            op_at(&module, AtomicTarget::AtomicRmw, 0)?,
            Op::AtomicRmw {
                scope: SyncScope::SingleThread,
                ..
            }
        ));
        assert!(matches!(
            op_at(&module, AtomicTarget::Load, 0)?,
            Op::Load {
                scope: SyncScope::SingleThread,
                ..
            }
        ));
        Ok(())
    }

    #[test]
    fn test_store_report_counts_plain_and_atomic() -> Result<()> {
        let module = memory_ops()?;
        let op = AtomicMutator::new(AtomicConfig::new(AtomicTarget::Store))?;
        let report = op.report(&module, &IdentityAlias, &MutationContext::new())?;
        assert_eq!(report.total(), 2);
        Ok(())
    }

    #[test]
    fn test_toggle_atomic_rejected_for_loads() {
        let config = AtomicConfig::mutate(AtomicTarget::Load, AtomicMode::ToggleAtomic, vec![0]);
        assert!(AtomicMutator::new(config).is_err());
    }
}
