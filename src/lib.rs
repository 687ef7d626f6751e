//! # llms-gen
//!
//! Generates an `llms.txt` index for a code repository: a title, a project
//! overview and per-directory sections listing every file with a one-line
//! summary.
//!
//! ## Features
//!
//! - Parallel file discovery with `.gitignore` support
//! - Bounded batches processed strictly in order
//! - Exponential backoff for rate-limited summarization backends
//! - Offline heuristic summarizer and a Gemini HTTP backend
//! - Markdown, JSON or custom Tera template output, written atomically
//!
//! ## Quick Start
//!
//! ```no_run
//! use llms_gen::{Config, HeuristicSummarizer, OutputFormat, Pipeline};
//! use std::sync::Arc;
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = Config::builder()
//!     .root_dir("./my-repo")
//!     .output_path("./llms.txt")
//!     .format(OutputFormat::Markdown)
//!     .batch_size(10)
//!     .build()?;
//!
//! Pipeline::new(config, Arc::new(HeuristicSummarizer::new()))?.run()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! The library follows a pipeline architecture:
//! 1. **Scanner**: Discovers files respecting `.gitignore`
//! 2. **Partitioner**: Splits the file list into bounded batches
//! 3. **Processor**: Reads and summarizes each batch, retrying transient failures
//! 4. **Aggregation**: Folds batch outcomes into one run-scoped state
//! 5. **Assembly**: Groups summaries into sections and renders the index

#![warn(
    missing_docs,
    rust_2018_idioms,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery
)]
#![allow(clippy::module_name_repetitions)]

mod assembly;
mod batch;
mod config;
mod error;
mod file;
mod filter;
mod gemini;
mod heuristic;
mod pipeline;
mod processor;
mod retry;
mod scanner;
mod state;
mod summarizer;
mod template;
mod template_validator;
mod writer;

pub use assembly::{
    Document, Entry, MISSING_PROJECT_SUMMARY, ROOT_SECTION, Section, SectionLayout, assemble,
    base_url_for_repo, remote_url_from_git_config, repo_name, section_key, section_title,
};
pub use batch::{Batch, BatchPolicy, partition};
pub use config::{Config, ConfigBuilder, OutputFormat};
pub use error::{Error, Result};
pub use file::{ContentReader, FileDescriptor, FsReader, language_for_path};
pub use filter::{
    DEFAULT_EXCLUDED_DIRS, DEFAULT_EXCLUDED_FILE_PREFIXES, DEFAULT_INCLUDED_EXTENSIONS,
    FileFilterConfig,
};
pub use gemini::{DEFAULT_API_BASE_URL, DEFAULT_MODEL, GeminiSummarizer};
pub use heuristic::HeuristicSummarizer;
pub use pipeline::{EMPTY_PROJECT_SUMMARY, Pipeline, PipelineStats, Stage};
pub use processor::{BatchOutcome, BatchProcessor, FileSummary, SkippedFile};
pub use retry::{BackoffPolicy, RecordingSleeper, Retrier, Sleeper, ThreadSleeper};
pub use scanner::{FileCatalog, Scanner};
pub use state::{AggregationState, DuplicatePolicy, FoldReport};
pub use summarizer::{
    ResilientSummarizer, Summarizer, Summary, SummaryInput, normalize_summary, render_prompt,
    truncate_at_char_boundary,
};

use std::sync::Arc;

/// Runs the complete pipeline over the filesystem with the given summarizer.
///
/// This is the main entry point for the library.
///
/// # Errors
///
/// Returns an error if:
/// - Configuration is invalid
/// - Root directory doesn't exist or is inaccessible
/// - The project summary cannot be produced
/// - The output file cannot be written
///
/// # Examples
///
/// ```no_run
/// use llms_gen::{Config, HeuristicSummarizer, run};
/// use std::sync::Arc;
///
/// # fn main() -> anyhow::Result<()> {
/// let config = Config::builder()
///     .root_dir(".")
///     .build()?;
///
/// run(config, Arc::new(HeuristicSummarizer::new()))?;
/// # Ok(())
/// # }
/// ```
pub fn run(config: Config, summarizer: Arc<dyn Summarizer>) -> Result<PipelineStats> {
    Pipeline::new(config, summarizer)?.run()
}
