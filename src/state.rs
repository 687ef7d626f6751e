//! Run-scoped aggregation of per-batch results.
//!
//! [`AggregationState`] is owned by the pipeline for one run and only changes
//! through [`AggregationState::fold`]. Summaries are append-only: once a path
//! has a summary it is never overwritten.

use crate::{
    error::{Error, Result},
    processor::{BatchOutcome, FileSummary, SkippedFile},
};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// What to do when a path is folded a second time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DuplicatePolicy {
    /// Keep the first summary and ignore later ones
    #[default]
    KeepFirst,

    /// Fail the fold with [`Error::DuplicateSummary`]
    Reject,
}

/// Counts produced by one fold.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FoldReport {
    /// Summaries inserted
    pub inserted: usize,

    /// Summaries ignored because their path was already present
    pub duplicates: usize,

    /// Files the batch skipped
    pub skipped: usize,
}

/// Accumulated results of one pipeline run.
#[derive(Debug, Clone)]
pub struct AggregationState {
    summaries: Vec<FileSummary>,
    index: HashMap<String, usize>,
    skipped: Vec<SkippedFile>,
    batches_processed: usize,
    batches_total: usize,
    project_summary: Option<String>,
    policy: DuplicatePolicy,
    duplicates_ignored: usize,
}

impl AggregationState {
    /// Creates an empty state expecting `batches_total` folds.
    #[must_use]
    pub fn new(batches_total: usize, policy: DuplicatePolicy) -> Self {
        Self {
            summaries: Vec::new(),
            index: HashMap::new(),
            skipped: Vec::new(),
            batches_processed: 0,
            batches_total,
            project_summary: None,
            policy,
            duplicates_ignored: 0,
        }
    }

    /// Inserts one summary.
    ///
    /// Returns `Ok(true)` if it was inserted and `Ok(false)` if the path was
    /// already present under [`DuplicatePolicy::KeepFirst`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateSummary`] under [`DuplicatePolicy::Reject`].
    pub fn insert(&mut self, summary: FileSummary) -> Result<bool> {
        if self.index.contains_key(&summary.path) {
            return match self.policy {
                DuplicatePolicy::KeepFirst => {
                    warn!("Ignoring duplicate summary for {}", summary.path);
                    self.duplicates_ignored += 1;
                    Ok(false)
                }
                DuplicatePolicy::Reject => Err(Error::duplicate_summary(summary.path)),
            };
        }

        self.index.insert(summary.path.clone(), self.summaries.len());
        self.summaries.push(summary);
        Ok(true)
    }

    /// Folds one batch outcome into the state and counts the batch.
    ///
    /// Under [`DuplicatePolicy::Reject`] the whole outcome is checked first, so
    /// a rejected fold leaves the state untouched.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidState`] if every expected batch was already folded
    /// - [`Error::DuplicateSummary`] under [`DuplicatePolicy::Reject`]
    pub fn fold(&mut self, outcome: BatchOutcome) -> Result<FoldReport> {
        if self.is_complete() {
            return Err(Error::invalid_state(format!(
                "batch {} folded after all {} batches were processed",
                outcome.index + 1,
                self.batches_total
            )));
        }

        if self.policy == DuplicatePolicy::Reject {
            self.check_unique(&outcome.summaries)?;
        }

        let mut report = FoldReport {
            skipped: outcome.skipped.len(),
            ..FoldReport::default()
        };

        for summary in outcome.summaries {
            if self.insert(summary)? {
                report.inserted += 1;
            } else {
                report.duplicates += 1;
            }
        }

        self.skipped.extend(outcome.skipped);
        self.batches_processed += 1;

        debug!(
            "Folded batch {}: {} inserted, {} duplicate(s), {} skipped ({}/{})",
            outcome.index + 1,
            report.inserted,
            report.duplicates,
            report.skipped,
            self.batches_processed,
            self.batches_total
        );

        Ok(report)
    }

    fn check_unique(&self, summaries: &[FileSummary]) -> Result<()> {
        let mut seen = HashSet::with_capacity(summaries.len());
        for summary in summaries {
            if self.index.contains_key(&summary.path) || !seen.insert(summary.path.as_str()) {
                return Err(Error::duplicate_summary(summary.path.clone()));
            }
        }
        Ok(())
    }

    /// Returns true once every expected batch has been folded.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.batches_processed >= self.batches_total
    }

    /// All summaries in insertion order.
    #[must_use]
    pub fn all_summaries(&self) -> &[FileSummary] {
        &self.summaries
    }

    /// Looks up the summary for a path.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&FileSummary> {
        self.index.get(path).map(|&i| &self.summaries[i])
    }

    /// Files skipped so far.
    #[must_use]
    pub fn skipped(&self) -> &[SkippedFile] {
        &self.skipped
    }

    /// Batches folded so far.
    #[must_use]
    pub const fn batches_processed(&self) -> usize {
        self.batches_processed
    }

    /// Batches expected in this run.
    #[must_use]
    pub const fn batches_total(&self) -> usize {
        self.batches_total
    }

    /// Summaries ignored under [`DuplicatePolicy::KeepFirst`].
    #[must_use]
    pub const fn duplicates_ignored(&self) -> usize {
        self.duplicates_ignored
    }

    /// The project description, once computed.
    #[must_use]
    pub fn project_summary(&self) -> Option<&str> {
        self.project_summary.as_deref()
    }

    /// Records the project description.
    pub fn set_project_summary(&mut self, summary: impl Into<String>) {
        self.project_summary = Some(summary.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(index: usize, paths: &[&str]) -> BatchOutcome {
        BatchOutcome {
            index,
            summaries: paths
                .iter()
                .map(|p| FileSummary::new(*p, format!("about {p}")))
                .collect(),
            skipped: Vec::new(),
        }
    }

    #[test]
    fn test_fold_preserves_insertion_order() {
        let mut state = AggregationState::new(2, DuplicatePolicy::KeepFirst);

        state.fold(outcome(0, &["z.md", "a.md"])).unwrap();
        state.fold(outcome(1, &["m.md"])).unwrap();

        let paths: Vec<_> = state.all_summaries().iter().map(|s| s.path.as_str()).collect();
        assert_eq!(paths, vec!["z.md", "a.md", "m.md"]);
        assert_eq!(state.batches_processed(), 2);
        assert!(state.is_complete());
        assert_eq!(state.get("a.md").unwrap().summary, "about a.md");
    }

    #[test]
    fn test_keep_first_is_idempotent() {
        let mut state = AggregationState::new(3, DuplicatePolicy::KeepFirst);
        state.fold(outcome(0, &["a.md"])).unwrap();
        let before = state.all_summaries().to_vec();

        let mut again = outcome(1, &["a.md"]);
        again.summaries[0].summary = "something else".to_string();
        let report = state.fold(again).unwrap();

        assert_eq!(report.inserted, 0);
        assert_eq!(report.duplicates, 1);
        assert_eq!(state.all_summaries(), before.as_slice());
        assert_eq!(state.duplicates_ignored(), 1);
    }

    #[test]
    fn test_reject_policy_leaves_state_untouched() {
        let mut state = AggregationState::new(3, DuplicatePolicy::Reject);
        state.fold(outcome(0, &["a.md"])).unwrap();

        let err = state.fold(outcome(1, &["b.md", "a.md"])).unwrap_err();

        assert!(matches!(err, Error::DuplicateSummary { ref path } if path == "a.md"));
        assert_eq!(state.all_summaries().len(), 1);
        assert!(state.get("b.md").is_none());
        assert_eq!(state.batches_processed(), 1);
    }

    #[test]
    fn test_reject_policy_catches_duplicates_within_batch() {
        let mut state = AggregationState::new(1, DuplicatePolicy::Reject);
        assert!(state.fold(outcome(0, &["x.md", "x.md"])).is_err());
        assert!(state.all_summaries().is_empty());
    }

    #[test]
    fn test_fold_past_total_is_invalid() {
        let mut state = AggregationState::new(1, DuplicatePolicy::KeepFirst);
        state.fold(outcome(0, &["a.md"])).unwrap();

        let err = state.fold(outcome(1, &["b.md"])).unwrap_err();
        assert!(matches!(err, Error::InvalidState { .. }));
    }

    #[test]
    fn test_skipped_files_are_tracked() {
        let mut state = AggregationState::new(1, DuplicatePolicy::KeepFirst);
        let mut result = outcome(0, &["a.md"]);
        result.skipped.push(SkippedFile {
            path: "b.md".to_string(),
            reason: "unreadable".to_string(),
        });

        let report = state.fold(result).unwrap();

        assert_eq!(report.skipped, 1);
        assert_eq!(state.skipped()[0].path, "b.md");
    }

    #[test]
    fn test_empty_run_is_complete() {
        let mut state = AggregationState::new(0, DuplicatePolicy::KeepFirst);
        assert!(state.is_complete());
        assert!(state.project_summary().is_none());

        state.set_project_summary("Nothing here.");
        assert_eq!(state.project_summary(), Some("Nothing here."));
    }
}
