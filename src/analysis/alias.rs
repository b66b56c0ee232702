//! Alias oracle interface.
//!
//! The crate never computes aliasing itself; the pair matcher asks an external oracle
//! whether the first arguments of a lock and an unlock call denote the same mutex. Only
//! [`AliasResult::MustAlias`] produces a pair.
//!
//! Three ready-made oracles exist for hosts without one:
//!
//! - closures `Fn(&Value, &Value) -> AliasResult`
//! - [`AliasTable`] - explicit answers with a fallback
//! - [`IdentityAlias`] - structural identity

use std::collections::HashMap;

use strum::{Display, EnumString};

use crate::ir::Value;

/// Answer of an alias query, from weakest to strongest certainty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
pub enum AliasResult {
    /// The references never denote the same location.
    NoAlias,
    /// The references may denote the same location.
    MayAlias,
    /// The references overlap partially.
    PartialAlias,
    /// The references always denote the same location.
    MustAlias,
}

/// An alias oracle.
pub trait AliasAnalysis {
    /// Answers whether `a` and `b` denote the same memory location.
    fn alias(&self, a: &Value, b: &Value) -> AliasResult;

    /// Returns true if the oracle answers [`AliasResult::MustAlias`].
    fn must_alias(&self, a: &Value, b: &Value) -> bool {
        self.alias(a, b) == AliasResult::MustAlias
    }
}

impl<F> AliasAnalysis for F
where
    F: Fn(&Value, &Value) -> AliasResult,
{
    fn alias(&self, a: &Value, b: &Value) -> AliasResult {
        self(a, b)
    }
}

/// Answers `MustAlias` for structurally identical operands.
///
/// Two different globals are `NoAlias`; everything else is `MayAlias`.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityAlias;

impl AliasAnalysis for IdentityAlias {
    fn alias(&self, a: &Value, b: &Value) -> AliasResult {
        if a == b {
            return AliasResult::MustAlias;
        }
        match (a, b) {
            (Value::Global(_), Value::Global(_)) => AliasResult::NoAlias,
            _ => AliasResult::MayAlias,
        }
    }
}

/// An oracle backed by explicit, symmetric answers.
///
/// ```rust
/// use syncmut::analysis::{AliasAnalysis, AliasResult, AliasTable};
/// use syncmut::ir::Value;
///
/// let table = AliasTable::new(AliasResult::NoAlias)
///     .with(Value::global("m"), Value::Arg(0), AliasResult::MustAlias);
///
/// assert!(table.must_alias(&Value::Arg(0), &Value::global("m")));
/// assert_eq!(table.alias(&Value::global("m"), &Value::global("n")), AliasResult::NoAlias);
/// ```
#[derive(Debug, Clone)]
pub struct AliasTable {
    answers: HashMap<(Value, Value), AliasResult>,
    fallback: AliasResult,
    identity: bool,
}

impl Default for AliasTable {
    fn default() -> Self {
        Self::new(AliasResult::MayAlias)
    }
}

impl AliasTable {
    /// Creates an empty table answering `fallback` for unknown pairs.
    ///
    /// Identical operands answer `MustAlias` unless disabled with
    /// [`AliasTable::without_identity`].
    #[must_use]
    pub fn new(fallback: AliasResult) -> Self {
        Self {
            answers: HashMap::new(),
            fallback,
            identity: true,
        }
    }

    /// Adds an answer for the unordered pair `(a, b)`.
    #[must_use]
    pub fn with(mut self, a: Value, b: Value, result: AliasResult) -> Self {
        self.insert(a, b, result);
        self
    }

    /// Stops treating identical operands as `MustAlias`.
    #[must_use]
    pub fn without_identity(mut self) -> Self {
        self.identity = false;
        self
    }

    /// Adds an answer for the unordered pair `(a, b)`.
    pub fn insert(&mut self, a: Value, b: Value, result: AliasResult) {
        self.answers.insert((b.clone(), a.clone()), result);
        self.answers.insert((a, b), result);
    }

    /// Returns the number of stored answers (each unordered pair counts twice).
    #[must_use]
    pub fn len(&self) -> usize {
        self.answers.len()
    }

    /// Returns true if no answers are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }
}

impl AliasAnalysis for AliasTable {
    fn alias(&self, a: &Value, b: &Value) -> AliasResult {
        if let Some(result) = self.answers.get(&(a.clone(), b.clone())) {
            return *result;
        }
        if self.identity && a == b {
            AliasResult::MustAlias
        } else {
            self.fallback
        }
    }
}
