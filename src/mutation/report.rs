//! Find-mode output.
//!
//! An [`OccurrenceReport`] is what an operator prints when no mutation is selected: the
//! number of candidates, or in verbose mode one line per candidate in position order.
//! The line numbers double as the positions a later mutation run accepts.

use std::fmt;

use crate::{
    analysis::{PairIndex, PairCategory},
    ir::{DebugLoc, Module},
    mutation::MutationContext,
    Result,
};

/// One line of a report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportLine {
    /// A candidate count, optionally labelled (`<label>\t<count>`).
    Count {
        /// Label column, e.g. a pair category number
        label: Option<String>,
        /// Number of candidates
        count: usize,
    },
    /// A single candidate (`<position>\t<file>:<line>\t<detail>`).
    Site {
        /// User position of the candidate
        position: usize,
        /// Source location
        loc: Option<DebugLoc>,
        /// Free-form description
        detail: String,
    },
}

impl fmt::Display for ReportLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportLine::Count { label: Some(label), count } => write!(f, "{label}\t{count}"),
            ReportLine::Count { label: None, count } => write!(f, "{count}"),
            ReportLine::Site {
                position,
                loc,
                detail,
            } => {
                match loc {
                    Some(loc) => write!(f, "{position}\t{loc}")?,
                    None => write!(f, "{position}\t<unknown location>")?,
                }
                if !detail.is_empty() {
                    write!(f, "\t{detail}")?;
                }
                Ok(())
            }
        }
    }
}

/// Candidate listing of one operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OccurrenceReport {
    pass: &'static str,
    lines: Vec<ReportLine>,
}

impl OccurrenceReport {
    /// Creates an empty report.
    #[must_use]
    pub fn new(pass: &'static str) -> Self {
        Self {
            pass,
            lines: Vec::new(),
        }
    }

    /// Creates a report holding a single count.
    #[must_use]
    pub fn count(pass: &'static str, count: usize) -> Self {
        let mut report = Self::new(pass);
        report.lines.push(ReportLine::Count { label: None, count });
        report
    }

    /// Builds a report from candidate locations, either as one count or, in verbose mode,
    /// one line per candidate.
    ///
    /// Candidates without a location produce a warning in verbose mode.
    pub fn sites<'a, I>(pass: &'static str, sites: I, verbose: bool, ctx: &MutationContext) -> Self
    where
        I: IntoIterator<Item = (Option<&'a DebugLoc>, String)>,
    {
        let sites: Vec<_> = sites.into_iter().collect();
        if !verbose {
            return Self::count(pass, sites.len());
        }

        let mut report = Self::new(pass);
        for (position, (loc, detail)) in sites.into_iter().enumerate() {
            if loc.is_none() {
                ctx.events
                    .warn(format!("{pass}: candidate {position} has no debug location"));
            }
            report.push(ReportLine::Site {
                position,
                loc: loc.cloned(),
                detail,
            });
        }
        report
    }

    /// Builds the lock/unlock pair report: `<category>\t<count>` for every non-empty
    /// category, or in verbose mode one line per pair with both locations and the
    /// lock/unlock distance.
    ///
    /// # Errors
    ///
    /// Returns an error if a pair refers to an erased instruction.
    pub fn pairs(
        pass: &'static str,
        index: &PairIndex,
        module: &Module,
        verbose: bool,
    ) -> Result<Self> {
        let mut report = Self::new(pass);
        if !verbose {
            for (number, count) in index.counts().into_iter().enumerate() {
                if count > 0 {
                    report.push(ReportLine::Count {
                        label: Some(number.to_string()),
                        count,
                    });
                }
            }
            return Ok(report);
        }

        for (category, position, pair) in index.iter() {
            let unlock_loc = pair
                .unlock()
                .loc()
                .map_or_else(|| "<unknown location>".to_string(), ToString::to_string);
            report.push(ReportLine::Site {
                position,
                loc: pair.lock().loc().cloned(),
                detail: format!(
                    "{} {} -> {} distance {}",
                    category,
                    pair.family(),
                    unlock_loc,
                    pair.distance(module)?
                ),
            });
        }
        Ok(report)
    }

    /// Appends a line.
    pub fn push(&mut self, line: ReportLine) {
        self.lines.push(line);
    }

    /// Returns the operator name.
    #[must_use]
    pub fn pass(&self) -> &'static str {
        self.pass
    }

    /// Returns the lines.
    #[must_use]
    pub fn lines(&self) -> &[ReportLine] {
        &self.lines
    }

    /// Returns the number of candidates the report covers.
    #[must_use]
    pub fn total(&self) -> usize {
        self.lines
            .iter()
            .map(|line| match line {
                ReportLine::Count { count, .. } => *count,
                ReportLine::Site { .. } => 1,
            })
            .sum()
    }

    /// Returns the count of a category line, or zero if the category is empty.
    #[must_use]
    pub fn category_count(&self, category: PairCategory) -> usize {
        let label = category.index().to_string();
        self.lines
            .iter()
            .find_map(|line| match line {
                ReportLine::Count {
                    label: Some(l),
                    count,
                } if *l == label => Some(*count),
                _ => None,
            })
            .unwrap_or(0)
    }
}

impl fmt::Display for OccurrenceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.lines {
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        analysis::IdentityAlias,
        mutation::DiagnosticKind,
        test::factories::posix_critical_section,
    };

    #[test]
    fn test_count_and_verbose_sites() {
        let ctx = MutationContext::new();
        let loc = DebugLoc::new("main.c", 12);
        let sites = vec![(Some(&loc), String::new()), (None, "fence".to_string())];

        let plain = OccurrenceReport::sites("fence", sites.clone(), false, &ctx);
        assert_eq!(plain.to_string(), "2\n");

        let verbose = OccurrenceReport::sites("fence", sites, true, &ctx);
        assert_eq!(
            verbose.to_string(),
            "0\tmain.c:12\n1\t<unknown location>\tfence\n"
        );
        assert_eq!(verbose.total(), 2);
        assert_eq!(ctx.events.count_kind(DiagnosticKind::Warning), 1);
    }

    #[test]
    fn test_pair_report() -> Result<()> {
        let (module, _) = posix_critical_section()?;
        let ctx = MutationContext::new();
        let index = PairIndex::build(&module, &IdentityAlias, &ctx)?;

        let report = OccurrenceReport::pairs("mutex", &index, &module, false)?;
        assert_eq!(report.to_string(), "0\t1\n");
        assert_eq!(report.category_count(PairCategory::CallCall), 1);
        assert_eq!(report.category_count(PairCategory::InvokeCall), 0);

        let verbose = OccurrenceReport::pairs("mutex", &index, &module, true)?;
        assert!(verbose.to_string().contains("distance 2"));
        Ok(())
    }
}
