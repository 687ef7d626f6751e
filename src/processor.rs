use crate::{
    batch::Batch,
    error::Result,
    file::{ContentReader, FileDescriptor},
    summarizer::ResilientSummarizer,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

/// Summary of one successfully processed file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileSummary {
    /// Path relative to the repository root
    pub path: String,

    /// One-line summary text
    pub summary: String,
}

impl FileSummary {
    /// Creates a file summary.
    #[must_use]
    pub fn new(path: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            summary: summary.into(),
        }
    }
}

/// A file left out of the output, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedFile {
    /// Path relative to the repository root
    pub path: String,

    /// Why the file was skipped
    pub reason: String,
}

/// Result of processing one batch.
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    /// Index of the processed batch
    pub index: usize,

    /// Summaries, in the batch's file order
    pub summaries: Vec<FileSummary>,

    /// Files that could not be summarized
    pub skipped: Vec<SkippedFile>,
}

impl BatchOutcome {
    /// Total files handled, successful or not.
    #[must_use]
    pub fn file_count(&self) -> usize {
        self.summaries.len() + self.skipped.len()
    }
}

/// Reads and summarizes the files of one batch.
///
/// Failures are isolated per file: a file that cannot be read or summarized
/// is recorded as skipped and the rest of the batch continues. The processor
/// never touches aggregation state.
#[derive(Clone)]
pub struct BatchProcessor {
    reader: Arc<dyn ContentReader>,
    summarizer: ResilientSummarizer,
}

impl std::fmt::Debug for BatchProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchProcessor")
            .field("summarizer", &self.summarizer)
            .finish_non_exhaustive()
    }
}

impl BatchProcessor {
    /// Creates a processor.
    #[must_use]
    pub fn new(reader: Arc<dyn ContentReader>, summarizer: ResilientSummarizer) -> Self {
        Self { reader, summarizer }
    }

    /// Processes every file in `batch`, in order.
    #[must_use]
    pub fn process(&self, batch: &Batch) -> BatchOutcome {
        let mut outcome = BatchOutcome {
            index: batch.index,
            summaries: Vec::with_capacity(batch.file_count()),
            skipped: Vec::new(),
        };

        for file in &batch.files {
            let path = file.relative_path.as_str();

            match self.summarize_one(file) {
                Ok(summary) => {
                    debug!("Summarized {}", path);
                    outcome.summaries.push(FileSummary::new(path, summary));
                }
                Err(e) => {
                    warn!("Skipping {}: {}", path, e);
                    outcome.skipped.push(SkippedFile {
                        path: path.to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        outcome
    }

    fn summarize_one(&self, file: &FileDescriptor) -> Result<String> {
        let content = self.reader.read(file)?;
        self.summarizer.summarize_file(&file.relative_path, &content)
    }
}
