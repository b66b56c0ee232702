//! Edit helpers shared by the call-site operators.
//!
//! Removing or replacing an invoke needs one extra step compared to a plain call: the
//! invoke terminates its block, so a branch to the normal continuation is appended first.
//! These helpers make that step impossible to forget.

use crate::{
    analysis::{CallSite, EnumeratedCalls},
    ir::{InstId, Instruction, Module, Removal},
    mutation::MutationContext,
    Result,
};

/// Removes a call site, rewriting remaining uses to a zero of `width` bits.
///
/// Invokes get a branch to their normal continuation before they are erased.
///
/// # Errors
///
/// Returns [`crate::Error::StaleHandle`] if the call was already erased.
pub(crate) fn remove_call(
    module: &mut Module,
    site: &CallSite,
    width: u32,
    signed: bool,
) -> Result<Removal> {
    site.validate(module)?;
    site.branch_to_normal(module)?;
    module.erase_or_replace_with_zero(site.id(), width, signed)
}

/// Replaces a call site with `inst` at the same position.
///
/// For invokes the branch to the normal continuation is appended first, so `inst` should
/// be a plain call.
///
/// # Errors
///
/// Returns [`crate::Error::StaleHandle`] if the call was already erased.
pub(crate) fn replace_call(module: &mut Module, site: &CallSite, inst: Instruction) -> Result<InstId> {
    site.validate(module)?;
    site.branch_to_normal(module)?;
    module.replace_with(site.id(), inst)
}

/// Claims a combined-index position of `calls` and returns the call site behind it.
///
/// Out of range and already claimed positions are reported as warnings and yield `None`.
pub(crate) fn claim_call<'a>(
    ctx: &MutationContext,
    pass: &'static str,
    calls: &'a EnumeratedCalls,
    position: usize,
) -> Option<&'a CallSite> {
    if !ctx.claim_or_warn(pass, position, calls.len()) {
        return None;
    }
    calls.get(position)
}

/// Checks that a call site is still unchanged and was not edited earlier in this run.
pub(crate) fn is_untouched(
    module: &Module,
    ctx: &MutationContext,
    pass: &'static str,
    site: &CallSite,
) -> bool {
    if ctx.is_site_mutated(site.id()) {
        ctx.events.warn(format!(
            "{pass}: call {} was already mutated in this run, skipping",
            site.id()
        ));
        return false;
    }
    if let Err(error) = site.validate(module) {
        ctx.events.warn(format!("{pass}: {error}, skipping"));
        return false;
    }
    true
}
