//! Call enumeration by target name.
//!
//! [`CallEnumerator`] scans functions in visitation order (function, block, in-block
//! position) and collects the direct calls whose target key is one of a configured name
//! set, split by call form. Indirect calls are skipped silently.
//!
//! The two sequences also form one combined index space, calls first and invokes after
//! them, which the single-call operators (join, yield, condition variables, semaphores)
//! use for their user positions:
//!
//! ```text
//! calls:   [c0, c1, c2]        invokes: [i0, i1]
//! index:     0   1   2                    3   4
//! ```

use std::collections::BTreeMap;

use crate::{
    analysis::CallSite,
    ir::{FuncId, Module},
    Result,
};

/// Collects call sites by target name.
#[derive(Debug, Clone)]
pub struct CallEnumerator {
    names: Vec<String>,
    demangle: bool,
}

impl CallEnumerator {
    /// Creates an enumerator for the given target names.
    ///
    /// Names are compared against the parameter-stripped symbol name; enable
    /// [`CallEnumerator::demangle`] for C++ targets.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
            demangle: false,
        }
    }

    /// Enables or disables demangling before comparison.
    #[must_use]
    pub fn demangle(mut self, enabled: bool) -> Self {
        self.demangle = enabled;
        self
    }

    /// Returns the configured target names.
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Returns true if `key` is one of the target names.
    #[must_use]
    pub fn matches(&self, key: &str) -> bool {
        self.names.iter().any(|name| name == key)
    }

    /// Enumerates matching call sites of the whole module.
    ///
    /// # Errors
    ///
    /// Returns an error only if the module is internally inconsistent.
    pub fn enumerate(&self, module: &Module) -> Result<EnumeratedCalls> {
        let mut found = EnumeratedCalls::default();
        for function in module.functions() {
            self.collect(module, function.id(), &mut found)?;
        }
        Ok(found)
    }

    /// Enumerates matching call sites of one function.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::UnknownFunction`] if `func` does not exist.
    pub fn enumerate_function(&self, module: &Module, func: FuncId) -> Result<EnumeratedCalls> {
        let mut found = EnumeratedCalls::default();
        self.collect(module, func, &mut found)?;
        Ok(found)
    }

    fn collect(&self, module: &Module, func: FuncId, found: &mut EnumeratedCalls) -> Result<()> {
        for id in module.instructions_of(func)? {
            if module.instruction(id)?.op().call_form().is_none() {
                continue;
            }
            let Some(site) = CallSite::capture(module, id, self.demangle)? else {
                continue;
            };
            if self.matches(site.name()) {
                found.push(site);
            }
        }
        Ok(())
    }
}

/// Call sites found by a [`CallEnumerator`], one ordered sequence per call form.
#[derive(Debug, Clone, Default)]
pub struct EnumeratedCalls {
    calls: Vec<CallSite>,
    invokes: Vec<CallSite>,
}

impl EnumeratedCalls {
    fn push(&mut self, site: CallSite) {
        if site.is_invoke() {
            self.invokes.push(site);
        } else {
            self.calls.push(site);
        }
    }

    /// Returns the plain calls in visitation order.
    #[must_use]
    pub fn calls(&self) -> &[CallSite] {
        &self.calls
    }

    /// Returns the invokes in visitation order.
    #[must_use]
    pub fn invokes(&self) -> &[CallSite] {
        &self.invokes
    }

    /// Returns the total number of call sites.
    #[must_use]
    pub fn len(&self) -> usize {
        self.calls.len() + self.invokes.len()
    }

    /// Returns true if nothing was found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.calls.is_empty() && self.invokes.is_empty()
    }

    /// Returns the call site at a combined index (calls first, then invokes).
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&CallSite> {
        match index.checked_sub(self.calls.len()) {
            None => self.calls.get(index),
            Some(rest) => self.invokes.get(rest),
        }
    }

    /// Iterates in combined index order.
    pub fn iter(&self) -> impl Iterator<Item = &CallSite> {
        self.calls.iter().chain(self.invokes.iter())
    }

    /// Iterates over the sites whose target key is `name`, in combined index order.
    pub fn named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a CallSite> + 'a {
        self.iter().filter(move |site| site.name() == name)
    }

    /// Groups the sites by enclosing function, keeping the order within each group.
    #[must_use]
    pub fn per_function(&self) -> BTreeMap<FuncId, EnumeratedCalls> {
        let mut groups: BTreeMap<FuncId, EnumeratedCalls> = BTreeMap::new();
        for site in self.iter() {
            groups
                .entry(site.function())
                .or_default()
                .push(site.clone());
        }
        groups
    }
}
