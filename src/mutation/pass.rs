//! The operator interface and the single-operator driver.
//!
//! Every operator implements [`MutationPass`]. A run selects exactly one operator, lets
//! it edit the module in place and collects what happened in a [`MutationContext`]:
//!
//! ```text
//! config.validate()  ->  Operator::new(config)  ->  run_pass(&op, &mut module, &alias)
//!                                                      │
//!                                                      ├── op.run(...)     (mutation modes)
//!                                                      └── op.report(...)  (find mode)
//! ```

use crate::{
    analysis::AliasAnalysis,
    ir::Module,
    mutation::{MutationContext, OccurrenceReport, Stats},
    Result,
};

/// A mutation operator.
///
/// Operators must be thread-safe (`Send + Sync`) so a configured operator can be shared,
/// but a single run always has exclusive access to its module.
///
/// Per-position problems (out of range, already mutated, wrong argument count, mixed
/// primitive families) are warnings on `ctx.events`; `run` only returns `Err` when the
/// module itself is inconsistent.
pub trait MutationPass: Send + Sync {
    /// Unique name, used in diagnostics and as the key for consumed positions.
    fn name(&self) -> &'static str;

    /// Human-readable description.
    fn description(&self) -> &'static str {
        "No description available"
    }

    /// Returns true if the configuration selects a mutation (not only find mode).
    fn mutates(&self) -> bool;

    /// Applies the configured mutation.
    ///
    /// Returns `true` if at least one requested mutation succeeded.
    ///
    /// # Arguments
    ///
    /// * `module` - The program to edit in place
    /// * `alias` - The alias oracle (only the mutex operator consults it)
    /// * `ctx` - Diagnostics and consumed-position tracking for this run
    ///
    /// # Errors
    ///
    /// Returns an error if the module is internally inconsistent.
    fn run(&self, module: &mut Module, alias: &dyn AliasAnalysis, ctx: &MutationContext)
        -> Result<bool>;

    /// Lists the candidates this operator would number, without editing anything.
    ///
    /// # Errors
    ///
    /// Returns an error if the module is internally inconsistent.
    fn report(
        &self,
        module: &Module,
        alias: &dyn AliasAnalysis,
        ctx: &MutationContext,
    ) -> Result<OccurrenceReport>;
}

/// What a single-operator run produced.
pub struct PassOutcome {
    /// True if the module was changed.
    pub modified: bool,
    /// The candidate listing, for find-mode runs.
    pub report: Option<OccurrenceReport>,
    /// Diagnostics and markers of the run.
    pub context: MutationContext,
}

impl PassOutcome {
    /// Summarizes the run's diagnostics.
    #[must_use]
    pub fn stats(&self) -> Stats {
        Stats::from_log(&self.context.events)
    }
}

/// Runs one operator on a module with a fresh context.
///
/// Operators in find mode produce a report and leave the module untouched.
///
/// # Errors
///
/// Returns an error if the module is internally inconsistent.
pub fn run_pass(
    pass: &dyn MutationPass,
    module: &mut Module,
    alias: &dyn AliasAnalysis,
) -> Result<PassOutcome> {
    let context = MutationContext::new();
    if !pass.mutates() {
        let report = pass.report(module, alias, &context)?;
        return Ok(PassOutcome {
            modified: false,
            report: Some(report),
            context,
        });
    }

    let modified = pass.run(module, alias, &context)?;
    context.events.info(format!(
        "{}: {} in {:?}",
        pass.name(),
        context.events.summary(),
        context.elapsed()
    ));
    Ok(PassOutcome {
        modified,
        report: None,
        context,
    })
}
