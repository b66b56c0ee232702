//! Shared state of one mutation run.
//!
//! The [`MutationContext`] carries the diagnostic log and the "already mutated" markers
//! that keep two requests (of the same operator or of different operators) from editing
//! the same call site or position twice within one invocation.

use std::time::{Duration, Instant};

use dashmap::DashSet;

use crate::{ir::InstId, mutation::events::DiagnosticLog};

/// Outcome of claiming a user position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Claim {
    /// The position is valid and now marked as mutated.
    Claimed,
    /// The position exceeds the number of candidates.
    OutOfBounds,
    /// The position was consumed earlier in this run.
    AlreadyMutated,
}

/// State shared by every operator of a mutation run.
///
/// All fields use thread-safe collections so the context can be shared through a plain
/// reference while the module itself is borrowed mutably by the running operator.
pub struct MutationContext {
    /// Accumulated diagnostics: edits, skipped requests, analysis findings.
    pub events: DiagnosticLog,

    /// Call sites that have been edited or removed.
    mutated_sites: DashSet<InstId>,

    /// Consumed positions, keyed by operator name.
    consumed: DashSet<(&'static str, usize)>,

    /// When the run started.
    start_time: Instant,
}

impl Default for MutationContext {
    fn default() -> Self {
        Self::new()
    }
}

impl MutationContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self {
            events: DiagnosticLog::new(),
            mutated_sites: DashSet::new(),
            consumed: DashSet::new(),
            start_time: Instant::now(),
        }
    }

    /// Returns the time since the context was created.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    // ── Call-site tracking ──────────────────────────────────────────────

    /// Checks if a call site has already been edited in this run.
    #[must_use]
    pub fn is_site_mutated(&self, id: InstId) -> bool {
        self.mutated_sites.contains(&id)
    }

    /// Marks a call site as edited. Returns false if it was already marked.
    pub fn mark_site_mutated(&self, id: InstId) -> bool {
        self.mutated_sites.insert(id)
    }

    /// Returns the number of edited call sites.
    #[must_use]
    pub fn mutated_site_count(&self) -> usize {
        self.mutated_sites.len()
    }

    // ── Position tracking ───────────────────────────────────────────────

    /// Checks if an operator already consumed a position.
    #[must_use]
    pub fn is_consumed(&self, pass: &'static str, position: usize) -> bool {
        self.consumed.contains(&(pass, position))
    }

    /// Validates a user position against the candidate count and consumes it.
    ///
    /// # Arguments
    ///
    /// * `pass` - Operator name; positions of different operators are independent
    /// * `position` - Zero-based user position
    /// * `len` - Number of candidates the position indexes into
    pub fn claim(&self, pass: &'static str, position: usize, len: usize) -> Claim {
        if position >= len {
            Claim::OutOfBounds
        } else if self.consumed.insert((pass, position)) {
            Claim::Claimed
        } else {
            Claim::AlreadyMutated
        }
    }

    /// Like [`MutationContext::claim`], but reports rejected positions as warnings.
    ///
    /// Returns true if the position was claimed.
    pub fn claim_or_warn(&self, pass: &'static str, position: usize, len: usize) -> bool {
        match self.claim(pass, position, len) {
            Claim::Claimed => true,
            Claim::OutOfBounds => {
                self.events.warn(format!(
                    "{pass}: position {position} is out of bounds ({len} candidates)"
                ));
                false
            }
            Claim::AlreadyMutated => {
                self.events
                    .warn(format!("{pass}: position {position} was already mutated"));
                false
            }
        }
    }
}
