//! Diagnostic stream of a mutation run.
//!
//! Every operator reports what it did, and every position it had to skip, through a
//! shared [`DiagnosticLog`]. The log is append-only and can be written through a shared
//! reference, so an operator that only holds `&MutationContext` can still report.
//!
//! - [`Diagnostic`] - One recorded entry (edit, warning, info, ...)
//! - [`DiagnosticLog`] - The collection, with query and summary helpers
//! - [`DiagnosticBuilder`] - Fluent API; appends the entry when dropped
//!
//! # Example
//!
//! ```rust
//! use syncmut::ir::FuncId;
//! use syncmut::mutation::{DiagnosticKind, DiagnosticLog};
//!
//! let log = DiagnosticLog::new();
//! log.record(DiagnosticKind::PairRemoved)
//!     .at(FuncId::new(0), 3)
//!     .message("removed Call-Call pair 0");
//! log.warn("position 7 is out of bounds");
//!
//! assert_eq!(log.warnings().count(), 1);
//! assert_eq!(log.summary(), "1 lock/unlock pair removed");
//! ```

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    fmt,
};

use crate::ir::FuncId;

/// Categories of diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DiagnosticKind {
    /// Both call sites of a lock/unlock pair were removed.
    PairRemoved,
    /// A single call site was removed (join, signal, wait, yield).
    CallRemoved,
    /// A non-call instruction, such as a fence, was removed.
    InstructionRemoved,
    /// A call site was replaced by a different call.
    CallReplaced,
    /// Two call sites exchanged their targets and arguments.
    CallSwapped,
    /// A call site was moved.
    CallShifted,
    /// A critical section was split in two.
    PairSplit,
    /// The memory ordering of an atomic operation or fence changed.
    OrderingChanged,
    /// The synchronization scope was toggled.
    ScopeToggled,
    /// An atomic store was made non-atomic.
    AtomicityRemoved,
    /// A volatile flag was cleared.
    VolatileRemoved,
    /// A constant call argument was rewritten.
    ArgumentChanged,
    /// New instructions were inserted.
    CodeInserted,

    /// A lock/unlock pair was discovered.
    PairFound,

    /// Informational message.
    Info,
    /// Warning: a requested mutation was skipped.
    Warning,
    /// Error: something failed.
    Error,
}

impl DiagnosticKind {
    /// Returns a human-readable description of this kind.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::PairRemoved => "lock/unlock pair removed",
            Self::CallRemoved => "call removed",
            Self::InstructionRemoved => "instruction removed",
            Self::CallReplaced => "call replaced",
            Self::CallSwapped => "call swapped",
            Self::CallShifted => "call shifted",
            Self::PairSplit => "critical section split",
            Self::OrderingChanged => "ordering changed",
            Self::ScopeToggled => "scope toggled",
            Self::AtomicityRemoved => "atomicity removed",
            Self::VolatileRemoved => "volatile removed",
            Self::ArgumentChanged => "argument changed",
            Self::CodeInserted => "code inserted",
            Self::PairFound => "lock/unlock pair found",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }

    /// Returns true if this kind records a change to the program.
    #[must_use]
    pub fn is_transformation(&self) -> bool {
        !matches!(
            self,
            Self::PairFound | Self::Info | Self::Warning | Self::Error
        )
    }

    /// Returns true for info, warning and error entries.
    #[must_use]
    pub fn is_diagnostic(&self) -> bool {
        matches!(self, Self::Info | Self::Warning | Self::Error)
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// A single logged diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// What happened.
    pub kind: DiagnosticKind,
    /// The function the entry refers to, if any.
    pub function: Option<FuncId>,
    /// Position within the function (instruction position or user position).
    pub location: Option<usize>,
    /// Human-readable message.
    pub message: String,
    /// Name of the pass that produced the entry.
    pub pass: Option<String>,
}

impl Diagnostic {
    fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            function: None,
            location: None,
            message: message.into(),
            pass: None,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.pass {
            Some(pass) => write!(f, "[{}] {}: {}", self.kind, pass, self.message),
            None => write!(f, "[{}] {}", self.kind, self.message),
        }
    }
}

/// Builder created by [`DiagnosticLog::record`]; the entry is appended when it is dropped.
pub struct DiagnosticBuilder<'a> {
    log: &'a DiagnosticLog,
    kind: DiagnosticKind,
    function: Option<FuncId>,
    location: Option<usize>,
    message: Option<String>,
    pass: Option<String>,
}

impl<'a> DiagnosticBuilder<'a> {
    fn new(log: &'a DiagnosticLog, kind: DiagnosticKind) -> Self {
        Self {
            log,
            kind,
            function: None,
            location: None,
            message: None,
            pass: None,
        }
    }

    /// Sets the function and the position inside it.
    pub fn at(mut self, function: FuncId, location: usize) -> Self {
        self.function = Some(function);
        self.location = Some(location);
        self
    }

    /// Sets only the function.
    pub fn function(mut self, function: FuncId) -> Self {
        self.function = Some(function);
        self
    }

    /// Sets only the position.
    pub fn location(mut self, location: usize) -> Self {
        self.location = Some(location);
        self
    }

    /// Sets the message. Without one the kind's description is used.
    pub fn message(mut self, msg: impl Into<String>) -> Self {
        self.message = Some(msg.into());
        self
    }

    /// Associates the entry with a pass.
    pub fn pass(mut self, name: impl Into<String>) -> Self {
        self.pass = Some(name.into());
        self
    }
}

impl Drop for DiagnosticBuilder<'_> {
    fn drop(&mut self) {
        let message = self
            .message
            .take()
            .unwrap_or_else(|| self.kind.description().to_string());

        self.log.entries.push(Diagnostic {
            kind: self.kind,
            function: self.function.take(),
            location: self.location.take(),
            message,
            pass: self.pass.take(),
        });
    }
}

/// Append-only, thread-safe collection of diagnostics.
#[derive(Debug, Default)]
pub struct DiagnosticLog {
    entries: boxcar::Vec<Diagnostic>,
}

impl Clone for DiagnosticLog {
    fn clone(&self) -> Self {
        self.iter().cloned().collect()
    }
}

impl DiagnosticLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if nothing has been logged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.count() == 0
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.count()
    }

    /// Starts building an entry of the given kind.
    pub fn record(&self, kind: DiagnosticKind) -> DiagnosticBuilder<'_> {
        DiagnosticBuilder::new(self, kind)
    }

    /// Records an informational message.
    pub fn info(&self, message: impl Into<String>) {
        self.entries.push(Diagnostic::new(DiagnosticKind::Info, message));
    }

    /// Records a warning.
    pub fn warn(&self, message: impl Into<String>) {
        self.entries
            .push(Diagnostic::new(DiagnosticKind::Warning, message));
    }

    /// Records an error.
    pub fn error(&self, message: impl Into<String>) {
        self.entries
            .push(Diagnostic::new(DiagnosticKind::Error, message));
    }

    /// Appends copies of all entries of `other`.
    pub fn merge(&self, other: &DiagnosticLog) {
        for entry in other {
            self.entries.push(entry.clone());
        }
    }

    /// Returns true if an entry of the given kind exists.
    #[must_use]
    pub fn has(&self, kind: DiagnosticKind) -> bool {
        self.iter().any(|e| e.kind == kind)
    }

    /// Counts entries of the given kind.
    #[must_use]
    pub fn count_kind(&self, kind: DiagnosticKind) -> usize {
        self.iter().filter(|e| e.kind == kind).count()
    }

    /// Iterates over all entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter().map(|(_, e)| e)
    }

    /// Iterates over entries of one kind.
    pub fn filter_kind(&self, kind: DiagnosticKind) -> impl Iterator<Item = &Diagnostic> + '_ {
        self.iter().filter(move |e| e.kind == kind)
    }

    /// Iterates over entries that refer to one function.
    pub fn filter_function(&self, function: FuncId) -> impl Iterator<Item = &Diagnostic> + '_ {
        self.iter().filter(move |e| e.function == Some(function))
    }

    /// Iterates over program changes.
    pub fn transformations(&self) -> impl Iterator<Item = &Diagnostic> + '_ {
        self.iter().filter(|e| e.kind.is_transformation())
    }

    /// Iterates over warnings.
    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> + '_ {
        self.filter_kind(DiagnosticKind::Warning)
    }

    /// Iterates over errors.
    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> + '_ {
        self.filter_kind(DiagnosticKind::Error)
    }

    /// Returns true if some warning message contains `needle`.
    #[must_use]
    pub fn has_warning(&self, needle: &str) -> bool {
        self.warnings().any(|e| e.message.contains(needle))
    }

    /// Counts entries grouped by kind.
    #[must_use]
    pub fn count_by_kind(&self) -> HashMap<DiagnosticKind, usize> {
        let mut counts = HashMap::new();
        for entry in self {
            *counts.entry(entry.kind).or_insert(0) += 1;
        }
        counts
    }

    /// Returns the number of distinct functions that were changed.
    #[must_use]
    pub fn functions_affected(&self) -> usize {
        self.transformations()
            .filter_map(|e| e.function)
            .collect::<HashSet<_>>()
            .len()
    }

    /// Summarizes the changes, e.g. `"2 call swapped, 1 code inserted"`.
    #[must_use]
    pub fn summary(&self) -> String {
        if self.is_empty() {
            return "no events".to_string();
        }

        let mut counts: BTreeMap<DiagnosticKind, usize> = BTreeMap::new();
        for entry in self.transformations() {
            *counts.entry(entry.kind).or_insert(0) += 1;
        }
        if counts.is_empty() {
            return format!("{} events", self.len());
        }

        counts
            .iter()
            .map(|(kind, count)| format!("{count} {kind}"))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Iterator over the entries of a [`DiagnosticLog`].
pub struct DiagnosticIter<'a> {
    inner: boxcar::Iter<'a, Diagnostic>,
}

impl<'a> Iterator for DiagnosticIter<'a> {
    type Item = &'a Diagnostic;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, e)| e)
    }
}

impl<'a> IntoIterator for &'a DiagnosticLog {
    type Item = &'a Diagnostic;
    type IntoIter = DiagnosticIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        DiagnosticIter {
            inner: self.entries.iter(),
        }
    }
}

impl Extend<Diagnostic> for DiagnosticLog {
    fn extend<T: IntoIterator<Item = Diagnostic>>(&mut self, iter: T) {
        for entry in iter {
            self.entries.push(entry);
        }
    }
}

impl FromIterator<Diagnostic> for DiagnosticLog {
    fn from_iter<T: IntoIterator<Item = Diagnostic>>(iter: T) -> Self {
        let log = Self::new();
        for entry in iter {
            log.entries.push(entry);
        }
        log
    }
}

/// Counters derived from a [`DiagnosticLog`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    /// Functions with at least one change.
    pub functions_changed: usize,
    /// Lock/unlock pairs discovered.
    pub pairs_found: usize,
    /// Call sites or pairs removed.
    pub removed: usize,
    /// Call sites swapped, replaced or shifted.
    pub rewritten: usize,
    /// Critical sections split.
    pub splits: usize,
    /// Attribute-only changes (ordering, scope, atomicity, volatility, arguments).
    pub attributes: usize,
    /// Insertions of new code.
    pub insertions: usize,
    /// Skipped mutations.
    pub warnings: usize,
    /// Failures.
    pub errors: usize,
}

impl Stats {
    /// Computes the counters from a log.
    #[must_use]
    pub fn from_log(log: &DiagnosticLog) -> Self {
        let counts = log.count_by_kind();
        let get = |kind: DiagnosticKind| counts.get(&kind).copied().unwrap_or(0);

        Self {
            functions_changed: log.functions_affected(),
            pairs_found: get(DiagnosticKind::PairFound),
            removed: get(DiagnosticKind::PairRemoved)
                + get(DiagnosticKind::CallRemoved)
                + get(DiagnosticKind::InstructionRemoved),
            rewritten: get(DiagnosticKind::CallReplaced)
                + get(DiagnosticKind::CallSwapped)
                + get(DiagnosticKind::CallShifted),
            splits: get(DiagnosticKind::PairSplit),
            attributes: get(DiagnosticKind::OrderingChanged)
                + get(DiagnosticKind::ScopeToggled)
                + get(DiagnosticKind::AtomicityRemoved)
                + get(DiagnosticKind::VolatileRemoved)
                + get(DiagnosticKind::ArgumentChanged),
            insertions: get(DiagnosticKind::CodeInserted),
            warnings: get(DiagnosticKind::Warning),
            errors: get(DiagnosticKind::Error),
        }
    }
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if self.functions_changed > 0 {
            parts.push(format!("{} functions", self.functions_changed));
        }
        if self.removed > 0 {
            parts.push(format!("{} removed", self.removed));
        }
        if self.rewritten > 0 {
            parts.push(format!("{} rewritten", self.rewritten));
        }
        if self.splits > 0 {
            parts.push(format!("{} split", self.splits));
        }
        if self.attributes > 0 {
            parts.push(format!("{} attributes changed", self.attributes));
        }
        if self.insertions > 0 {
            parts.push(format!("{} insertions", self.insertions));
        }
        if self.warnings > 0 {
            parts.push(format!("{} warnings", self.warnings));
        }
        if self.errors > 0 {
            parts.push(format!("{} errors", self.errors));
        }

        if parts.is_empty() {
            f.write_str("no mutations")
        } else {
            f.write_str(&parts.join(", "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_log() {
        let log = DiagnosticLog::new();
        assert!(log.is_empty());
        assert_eq!(log.summary(), "no events");
        assert!(!log.has(DiagnosticKind::PairRemoved));
    }

    #[test]
    fn test_builder_appends_on_drop() {
        let log = DiagnosticLog::new();
        log.record(DiagnosticKind::CallSwapped)
            .at(FuncId::new(2), 5)
            .pass("mutex")
            .message("swapped lock slots");

        assert_eq!(log.len(), 1);
        let entry = log.iter().next().unwrap();
        assert_eq!(entry.function, Some(FuncId::new(2)));
        assert_eq!(entry.location, Some(5));
        assert_eq!(entry.pass.as_deref(), Some("mutex"));
        assert_eq!(entry.to_string(), "[call swapped] mutex: swapped lock slots");
    }

    #[test]
    fn test_default_message() {
        let log = DiagnosticLog::new();
        log.record(DiagnosticKind::ScopeToggled);
        assert_eq!(log.iter().next().unwrap().message, "scope toggled");
    }

    #[test]
    fn test_warning_queries() {
        let log = DiagnosticLog::new();
        log.info("starting");
        log.warn("position 4 is already mutated");
        log.error("boom");

        assert_eq!(log.count_kind(DiagnosticKind::Warning), 1);
        assert!(log.has_warning("already mutated"));
        assert!(!log.has_warning("out of bounds"));
        assert_eq!(log.transformations().count(), 0);
        assert_eq!(log.summary(), "3 events");
    }

    #[test]
    fn test_summary_and_stats() {
        let log = DiagnosticLog::new();
        log.record(DiagnosticKind::CallSwapped).function(FuncId::new(0));
        log.record(DiagnosticKind::CallSwapped).function(FuncId::new(1));
        log.record(DiagnosticKind::CodeInserted).function(FuncId::new(1));
        log.record(DiagnosticKind::PairFound).function(FuncId::new(3));
        log.warn("skipped");

        assert_eq!(log.summary(), "2 call swapped, 1 code inserted");

        let stats = Stats::from_log(&log);
        assert_eq!(stats.functions_changed, 2);
        assert_eq!(stats.rewritten, 2);
        assert_eq!(stats.insertions, 1);
        assert_eq!(stats.pairs_found, 1);
        assert_eq!(stats.warnings, 1);
        assert_eq!(
            stats.to_string(),
            "2 functions, 2 rewritten, 1 insertions, 1 warnings"
        );
    }

    #[test]
    fn test_merge_and_collect() {
        let first = DiagnosticLog::new();
        let second = DiagnosticLog::new();
        first.warn("a");
        second.record(DiagnosticKind::CallRemoved);

        first.merge(&second);
        assert_eq!(first.len(), 2);

        let copy: DiagnosticLog = first.iter().cloned().collect();
        assert_eq!(copy.len(), 2);
        assert!(copy.has(DiagnosticKind::CallRemoved));
    }

    #[test]
    fn test_thread_safe_append() {
        use std::{sync::Arc, thread};

        let log = Arc::new(DiagnosticLog::new());
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let log = Arc::clone(&log);
                thread::spawn(move || {
                    for i in 0..50 {
                        log.record(DiagnosticKind::OrderingChanged)
                            .location(i)
                            .message(format!("thread {t} entry {i}"));
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(log.len(), 200);
    }
}
