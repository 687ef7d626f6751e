use crate::{
    assembly::{SectionLayout, assemble},
    batch::{BatchPolicy, partition},
    config::Config,
    error::{Error, Result},
    file::{ContentReader, FileDescriptor, FsReader},
    processor::{BatchProcessor, SkippedFile},
    retry::{Retrier, Sleeper, ThreadSleeper},
    scanner::{FileCatalog, Scanner},
    state::AggregationState,
    summarizer::{ResilientSummarizer, Summarizer},
    template::TemplateEngine,
    writer::Writer,
};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, instrument, warn};

/// Project summary used when there is nothing to summarize.
pub const EMPTY_PROJECT_SUMMARY: &str = "No content was available to summarize.";

const README_CANDIDATES: &[&str] = &["README.md", "readme.md", "README"];

/// States of a pipeline run.
///
/// ```text
/// Init -> Partitioning -> ProcessingBatch (loop) -> ProjectSummary -> Finalizing -> Done
/// ```
///
/// `Partitioning` goes straight to `ProjectSummary` when there are no
/// batches. Any state except `Done` can move to `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Discovering files
    #[default]
    Init,
    /// Splitting files into batches
    Partitioning,
    /// Summarizing batches one at a time
    ProcessingBatch,
    /// Describing the whole project
    ProjectSummary,
    /// Assembling, rendering and writing the index
    Finalizing,
    /// Run completed
    Done,
    /// Run aborted
    Failed,
}

impl Stage {
    /// Returns true if the machine may move from `self` to `next`.
    #[must_use]
    pub const fn can_advance_to(self, next: Self) -> bool {
        match (self, next) {
            (Self::Init, Self::Partitioning)
            | (Self::Partitioning, Self::ProcessingBatch | Self::ProjectSummary)
            | (Self::ProcessingBatch, Self::ProcessingBatch | Self::ProjectSummary)
            | (Self::ProjectSummary, Self::Finalizing)
            | (Self::Finalizing, Self::Done) => true,
            (_, Self::Failed) => !self.is_terminal(),
            _ => false,
        }
    }

    /// `Done` and `Failed` are terminal.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Human-readable stage name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Partitioning => "partitioning",
            Self::ProcessingBatch => "processing batch",
            Self::ProjectSummary => "project summary",
            Self::Finalizing => "finalizing",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Statistics collected during pipeline execution.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineStats {
    /// Files returned by discovery
    pub files_discovered: usize,

    /// Files left after `max_files_to_process`
    pub files_considered: usize,

    /// Batches created by partitioning
    pub batches_total: usize,

    /// Batches folded into the aggregate
    pub batches_processed: usize,

    /// Files with a summary in the output
    pub files_summarized: usize,

    /// Files left out of the output
    pub files_skipped: usize,

    /// Skipped files with reasons
    pub skipped: Vec<SkippedFile>,

    /// Duplicate summaries ignored during folding
    pub duplicates_ignored: usize,

    /// Sections in the output
    pub sections: usize,

    /// Summarization backend
    pub backend: &'static str,

    /// Total execution time
    pub duration: Duration,

    /// Time spent discovering files
    pub scan_duration: Duration,

    /// Time spent summarizing files
    pub summarize_duration: Duration,

    /// Time spent on the project summary
    pub project_summary_duration: Duration,

    /// Time spent rendering and writing
    pub finalize_duration: Duration,

    /// Written file, `None` on a dry run
    pub output_path: Option<PathBuf>,

    /// Stage the run ended in
    pub final_stage: Stage,
}

impl PipelineStats {
    /// Prints a human-readable summary to stdout.
    pub fn print_summary(&self) {
        println!("\n╔═══════════════════════════════════════════════════════╗");
        println!("║            Pipeline Execution Summary                 ║");
        println!("╠═══════════════════════════════════════════════════════╣");
        println!(
            "║ Files Discovered:     {:>8}                        ║",
            self.files_discovered
        );
        println!(
            "║   - Considered:       {:>8}                        ║",
            self.files_considered
        );
        println!(
            "║   - Summarized:       {:>8}                        ║",
            self.files_summarized
        );
        println!(
            "║   - Skipped:          {:>8}                        ║",
            self.files_skipped
        );
        println!(
            "║   - Duplicates:       {:>8}                        ║",
            self.duplicates_ignored
        );
        println!("║                                                       ║");
        println!(
            "║ Batches:              {:>4}/{:<4}                      ║",
            self.batches_processed, self.batches_total
        );
        println!(
            "║ Sections:             {:>8}                        ║",
            self.sections
        );
        println!(
            "║ Summarizer:           {:>8}                        ║",
            self.backend
        );
        println!("║                                                       ║");
        println!("║ Output File:                                          ║");
        match self.output_path {
            Some(ref path) => println!("║   {}", path.display()),
            None => println!("║   ⚠ Not written (dry run mode)                        ║"),
        }
        println!("║                                                       ║");
        println!("║ Timing Breakdown:                                     ║");
        println!(
            "║   - Scanning:         {:>8.2}s                     ║",
            self.scan_duration.as_secs_f64()
        );
        println!(
            "║   - Summarizing:      {:>8.2}s                     ║",
            self.summarize_duration.as_secs_f64()
        );
        println!(
            "║   - Project summary:  {:>8.2}s                     ║",
            self.project_summary_duration.as_secs_f64()
        );
        println!(
            "║   - Finalizing:       {:>8.2}s                     ║",
            self.finalize_duration.as_secs_f64()
        );
        println!(
            "║   - Total:            {:>8.2}s                     ║",
            self.duration.as_secs_f64()
        );
        println!(
            "║ Throughput:           {:>8.2} files/s              ║",
            self.throughput_files_per_sec()
        );
        println!("╚═══════════════════════════════════════════════════════╝\n");

        if !self.skipped.is_empty() {
            println!("Skipped files:");
            for file in &self.skipped {
                println!("  {} ({})", file.path, file.reason);
            }
            println!();
        }
    }

    /// Returns the throughput in summarized files per second.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn throughput_files_per_sec(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            self.files_summarized as f64 / secs
        } else {
            0.0
        }
    }
}

/// Drives one run: discover, partition, summarize batch by batch, describe
/// the project, then render and write the index.
///
/// Batches run strictly in order on the calling thread. The aggregation
/// state lives on the stack of [`Pipeline::run`] and is only changed by
/// folding batch outcomes into it.
pub struct Pipeline {
    config: Config,
    catalog: Arc<dyn FileCatalog>,
    reader: Arc<dyn ContentReader>,
    summarizer: Arc<dyn Summarizer>,
    sleeper: Arc<dyn Sleeper>,
    stage: Stage,
    current_batch: Option<usize>,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .field("summarizer", &self.summarizer.name())
            .field("stage", &self.stage)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    /// Creates a pipeline over the filesystem with the given summarizer.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration validation fails or the discovery
    /// rules do not compile.
    pub fn new(config: Config, summarizer: Arc<dyn Summarizer>) -> Result<Self> {
        config.validate()?;

        let catalog = Arc::new(Scanner::from_config(&config)?);

        Ok(Self {
            config,
            catalog,
            reader: Arc::new(FsReader),
            summarizer,
            sleeper: Arc::new(ThreadSleeper),
            stage: Stage::Init,
            current_batch: None,
        })
    }

    /// Replaces file discovery.
    #[must_use]
    pub fn with_catalog(mut self, catalog: Arc<dyn FileCatalog>) -> Self {
        self.catalog = catalog;
        self
    }

    /// Replaces the content reader.
    #[must_use]
    pub fn with_reader(mut self, reader: Arc<dyn ContentReader>) -> Self {
        self.reader = reader;
        self
    }

    /// Replaces how retries wait.
    #[must_use]
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Current stage.
    #[must_use]
    pub const fn stage(&self) -> Stage {
        self.stage
    }

    /// Executes the complete pipeline and returns statistics.
    ///
    /// File-level failures are skipped and counted. Anything else moves the
    /// run to [`Stage::Failed`] and nothing is written. Afterwards
    /// [`Pipeline::stage`] reports the terminal stage. A pipeline runs once.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Stage`] naming the stage and batch that failed, or
    /// [`Error::InvalidState`] if the pipeline has already run.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use llms_gen::{Config, HeuristicSummarizer, Pipeline};
    /// use std::sync::Arc;
    ///
    /// # fn main() -> anyhow::Result<()> {
    /// let config = Config::builder()
    ///     .root_dir("./my-repo")
    ///     .build()?;
    ///
    /// let stats = Pipeline::new(config, Arc::new(HeuristicSummarizer::new()))?.run()?;
    /// stats.print_summary();
    /// # Ok(())
    /// # }
    /// ```
    #[instrument(skip(self), fields(root_dir = %self.config.root_dir.display()))]
    pub fn run(&mut self) -> Result<PipelineStats> {
        if self.stage != Stage::Init {
            return Err(Error::invalid_state(format!(
                "pipeline has already run (stage {})",
                self.stage
            )));
        }

        let start_time = Instant::now();
        let mut stats = PipelineStats {
            backend: self.summarizer.name(),
            ..PipelineStats::default()
        };

        info!("Starting pipeline with {} summarizer", stats.backend);

        match self.execute(&mut stats) {
            Ok(()) => {
                stats.duration = start_time.elapsed();
                stats.final_stage = self.stage;
                info!(
                    "✓ Pipeline completed successfully in {:.2}s",
                    stats.duration.as_secs_f64()
                );
                Ok(stats)
            }
            Err(e) => {
                let failed_in = self.stage;
                let batch = self.current_batch;
                self.stage = Stage::Failed;
                error!("Pipeline failed during {}: {}", failed_in, e);
                Err(Error::stage(failed_in, batch, e))
            }
        }
    }

    fn execute(&mut self, stats: &mut PipelineStats) -> Result<()> {
        info!("Discovering files...");
        let scan_start = Instant::now();
        let mut files = self.catalog.discover(&self.config.root_dir)?;
        stats.files_discovered = files.len();

        let limit = self.config.max_files_to_process;
        if limit > 0 && files.len() > limit {
            info!("Limiting run to the first {} of {} files", limit, files.len());
            files.truncate(limit);
        }
        stats.files_considered = files.len();
        stats.scan_duration = scan_start.elapsed();

        info!(
            "✓ Discovered {} files ({} considered) in {:.2}s",
            stats.files_discovered,
            stats.files_considered,
            stats.scan_duration.as_secs_f64()
        );

        self.advance(Stage::Partitioning)?;
        let batches = partition(files, &BatchPolicy::from_config(&self.config))?;
        stats.batches_total = batches.len();
        info!("✓ Created {} batch(es)", batches.len());

        let mut state = AggregationState::new(batches.len(), self.config.duplicate_policy);
        let summarizer = self.resilient_summarizer();

        let summarize_start = Instant::now();
        if batches.is_empty() {
            info!("No files to summarize");
        } else {
            self.advance(Stage::ProcessingBatch)?;
            let processor = BatchProcessor::new(Arc::clone(&self.reader), summarizer.clone());

            for batch in &batches {
                self.current_batch = Some(batch.index);
                info!(
                    "Processing batch {}/{} ({} files)",
                    batch.index + 1,
                    batches.len(),
                    batch.file_count()
                );

                let outcome = processor.process(batch);
                let report = state.fold(outcome)?;

                info!(
                    "✓ Batch {}/{}: {} summarized, {} skipped",
                    batch.index + 1,
                    batches.len(),
                    report.inserted,
                    report.skipped
                );
            }
            self.current_batch = None;
        }

        if !state.is_complete() {
            return Err(Error::invalid_state(format!(
                "{} of {} batches folded",
                state.batches_processed(),
                state.batches_total()
            )));
        }
        stats.summarize_duration = summarize_start.elapsed();
        stats.batches_processed = state.batches_processed();
        stats.files_summarized = state.all_summaries().len();
        stats.skipped = state.skipped().to_vec();
        stats.files_skipped = stats.skipped.len();
        stats.duplicates_ignored = state.duplicates_ignored();

        self.advance(Stage::ProjectSummary)?;
        let project_start = Instant::now();
        let layout = SectionLayout::from_config(&self.config);
        let project_summary = self.summarize_project(&summarizer, &layout.project_name, &state)?;
        state.set_project_summary(project_summary);
        stats.project_summary_duration = project_start.elapsed();
        info!(
            "✓ Project summary ready in {:.2}s",
            stats.project_summary_duration.as_secs_f64()
        );

        self.advance(Stage::Finalizing)?;
        let finalize_start = Instant::now();
        let document = assemble(&state, &layout);
        stats.sections = document.sections.len();

        let rendered = TemplateEngine::new(&self.config)?.render(&document)?;

        if self.config.dry_run {
            warn!("Dry run mode enabled - skipping file writes");
            debug!("Rendered {} bytes", rendered.len());
        } else {
            let path = Writer::new(&self.config).write_document(&rendered)?;
            stats.output_path = Some(path);
        }
        stats.finalize_duration = finalize_start.elapsed();

        self.advance(Stage::Done)
    }

    fn advance(&mut self, next: Stage) -> Result<()> {
        if !self.stage.can_advance_to(next) {
            return Err(Error::invalid_state(format!(
                "cannot move from {} to {}",
                self.stage, next
            )));
        }

        info!("Stage: {} → {}", self.stage, next);
        self.stage = next;
        Ok(())
    }

    fn resilient_summarizer(&self) -> ResilientSummarizer {
        ResilientSummarizer::new(
            Arc::clone(&self.summarizer),
            Retrier::new(self.config.backoff.clone(), Arc::clone(&self.sleeper)),
            self.config.max_input_bytes,
        )
    }

    fn summarize_project(
        &self,
        summarizer: &ResilientSummarizer,
        project_name: &str,
        state: &AggregationState,
    ) -> Result<String> {
        let readme = self.read_readme();

        if state.all_summaries().is_empty() && readme.is_none() {
            info!("Nothing to summarize, using placeholder project summary");
            return Ok(EMPTY_PROJECT_SUMMARY.to_string());
        }

        summarizer.summarize_project(project_name, readme.as_deref(), state.all_summaries())
    }

    /// Reads the first README found at the repository root.
    fn read_readme(&self) -> Option<String> {
        let root: &Path = &self.config.root_dir;

        README_CANDIDATES.iter().find_map(|name| {
            let path = root.join(name);
            let metadata = path.metadata().ok().filter(std::fs::Metadata::is_file)?;
            let file = FileDescriptor::new(&path, *name, metadata.len());

            match self.reader.read(&file) {
                Ok(content) => {
                    debug!("Using {} for the project summary", name);
                    Some(content)
                }
                Err(e) => {
                    warn!("Could not read {}: {}", path.display(), e);
                    None
                }
            }
        })
    }
}
