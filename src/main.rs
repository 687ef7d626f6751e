use anyhow::{Context, bail};
use clap::Parser;
use llms_gen::{
    BackoffPolicy, Config, DEFAULT_MODEL, DuplicatePolicy, FileFilterConfig, GeminiSummarizer,
    HeuristicSummarizer, OutputFormat, Pipeline, Summarizer,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    name = "llms-gen",
    version,
    author,
    about = "Generate an llms.txt index for a code repository",
    long_about = "Generate an llms.txt index for a code repository.\n\n\
    Files are discovered (respecting .gitignore), summarized in bounded batches with \
    exponential backoff on rate limits, and grouped into per-directory sections under \
    a project overview.\n\n\
    USAGE EXAMPLES:\n  \
      # Index the current directory with the offline summarizer\n  \
      llms-gen\n\n  \
      # Index a project with Gemini\n  \
      GEMINI_API_KEY=... llms-gen --repo-path ./my-project --summarizer gemini\n\n  \
      # Preview without writing\n  \
      llms-gen -r ./my-project --dry-run -v"
)]
struct Cli {
    /// Repository to index
    #[arg(short, long, default_value = ".", value_name = "PATH")]
    repo_path: PathBuf,

    /// Where the index is written
    #[arg(short, long, default_value = "temp/llms.txt", value_name = "FILE")]
    output_path: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value = "markdown")]
    format: CliFormat,

    /// Summarization backend
    #[arg(short, long, value_enum, env = "SUMMARIZER", default_value = "heuristic")]
    summarizer: CliSummarizer,

    /// Gemini model name
    #[arg(long, env = "MODEL", default_value = DEFAULT_MODEL)]
    model: String,

    /// Gemini API key
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Maximum files per batch
    #[arg(long, env = "BATCH_SIZE", default_value_t = 10)]
    batch_size: usize,

    /// Optional cap on the cumulative bytes of a batch
    #[arg(long, env = "MAX_BATCH_BYTES")]
    max_batch_bytes: Option<u64>,

    /// Only process the first N discovered files (0 means all)
    #[arg(long, env = "MAX_FILES_TO_PROCESS", default_value_t = 0)]
    max_files_to_process: usize,

    /// Delay before the first retry, in seconds
    #[arg(long, env = "BACKOFF_INIT_DELAY", default_value_t = 2.0)]
    backoff_init_delay: f64,

    /// Total summarization attempts per call
    #[arg(long, env = "BACKOFF_ATTEMPTS", default_value_t = 5)]
    backoff_attempts: u32,

    /// Longest single retry delay, in seconds
    #[arg(long, env = "BACKOFF_MAX_DELAY", default_value_t = 60.0)]
    backoff_max_delay: f64,

    /// Growth factor between retry delays
    #[arg(long, env = "BACKOFF_MULTIPLIER", default_value_t = 2.0)]
    backoff_multiplier: f64,

    /// Directory names never descended into (comma separated)
    #[arg(
        long,
        env = "EXCLUDED_DIRS",
        value_delimiter = ',',
        default_value = ".git,.github,overrides,.venv,node_modules,__pycache__,.pytest_cache"
    )]
    excluded_dirs: Vec<String>,

    /// File name prefixes to skip (comma separated)
    #[arg(long, env = "EXCLUDED_FILES", value_delimiter = ',', default_value = "__init__")]
    excluded_files: Vec<String>,

    /// File extensions to summarize (comma separated)
    #[arg(long, env = "INCLUDED_EXTENSIONS", value_delimiter = ',', default_value = ".md,.py")]
    included_extensions: Vec<String>,

    /// Glob pattern to exclude, relative to the repository (repeatable)
    #[arg(long, value_name = "GLOB")]
    exclude: Vec<String>,

    /// Do not honor .gitignore files
    #[arg(long)]
    no_gitignore: bool,

    /// Directory components kept in a section heading
    #[arg(long, default_value_t = 2)]
    max_section_depth: usize,

    /// Title of the index (defaults to the repository directory name)
    #[arg(long)]
    project_name: Option<String>,

    /// Link prefix (defaults to the origin remote's blob/main URL)
    #[arg(long)]
    base_url: Option<String>,

    /// File content beyond this many bytes is not sent to the summarizer
    #[arg(long, default_value_t = 100_000)]
    max_input_bytes: usize,

    /// Fail when a file is summarized twice instead of keeping the first summary
    #[arg(long)]
    reject_duplicates: bool,

    /// Keep a timestamped copy of an existing output file
    #[arg(long)]
    backup: bool,

    /// Dry run (don't write files)
    #[arg(long)]
    dry_run: bool,

    /// Path to custom Tera template file
    ///
    /// The template receives `ctx.project_name`, `ctx.project_summary` and
    /// `ctx.sections` (each with `title` and `entries` of `name`, `url`,
    /// `summary`).
    #[arg(long, value_name = "FILE")]
    template: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL")]
    log_level: Option<String>,

    /// Verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliFormat {
    Markdown,
    Json,
}

impl From<CliFormat> for OutputFormat {
    fn from(f: CliFormat) -> Self {
        match f {
            CliFormat::Markdown => Self::Markdown,
            CliFormat::Json => Self::Json,
        }
    }
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliSummarizer {
    /// Offline extractive summaries
    Heuristic,
    /// Google Gemini
    Gemini,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_tracing(cli.verbose, cli.log_level.as_deref())?;

    let backoff = BackoffPolicy::new(
        seconds(cli.backoff_init_delay, "BACKOFF_INIT_DELAY")?,
        cli.backoff_attempts,
        seconds(cli.backoff_max_delay, "BACKOFF_MAX_DELAY")?,
        cli.backoff_multiplier,
    )
    .context("Invalid backoff policy")?;

    let mut builder = Config::builder()
        .root_dir(cli.repo_path)
        .output_path(cli.output_path)
        .format(cli.format.into())
        .batch_size(cli.batch_size)
        .max_files_to_process(cli.max_files_to_process)
        .backoff(backoff)
        .file_filter_config(
            FileFilterConfig::default()
                .excluded_dirs(cli.excluded_dirs)
                .excluded_file_prefixes(cli.excluded_files)
                .included_extensions(cli.included_extensions)
                .exclude_globs(cli.exclude),
        )
        .respect_gitignore(!cli.no_gitignore)
        .max_section_depth(cli.max_section_depth)
        .max_input_bytes(cli.max_input_bytes)
        .backup_existing(cli.backup)
        .dry_run(cli.dry_run);

    if let Some(bytes) = cli.max_batch_bytes {
        builder = builder.max_batch_bytes(bytes);
    }

    if let Some(name) = cli.project_name {
        builder = builder.project_name(name);
    }

    if let Some(url) = cli.base_url {
        builder = builder.base_url(url);
    }

    if cli.reject_duplicates {
        builder = builder.duplicate_policy(DuplicatePolicy::Reject);
    }

    if let Some(template_path) = cli.template {
        builder = builder.template_path(template_path);
    }

    let config = builder.build().context("Failed to build configuration")?;

    let summarizer: Arc<dyn Summarizer> = match cli.summarizer {
        CliSummarizer::Heuristic => Arc::new(HeuristicSummarizer::new()),
        CliSummarizer::Gemini => {
            let Some(api_key) = cli.api_key else {
                bail!("GEMINI_API_KEY (or --api-key) is required for the gemini summarizer");
            };
            Arc::new(
                GeminiSummarizer::new(api_key, cli.model)
                    .context("Failed to create Gemini summarizer")?,
            )
        }
    };

    let stats = Pipeline::new(config, summarizer)
        .context("Failed to create pipeline")?
        .run()
        .context("Pipeline execution failed")?;

    stats.print_summary();

    Ok(())
}

fn seconds(value: f64, name: &str) -> anyhow::Result<Duration> {
    Duration::try_from_secs_f64(value)
        .with_context(|| format!("{name} must be a non-negative number of seconds"))
}

fn setup_tracing(verbosity: u8, log_level: Option<&str>) -> anyhow::Result<()> {
    let level = match (log_level, verbosity) {
        (Some(level), _) => level.trim().to_ascii_lowercase(),
        (None, 0) => "info".to_string(),
        (None, 1) => "debug".to_string(),
        (None, _) => "trace".to_string(),
    };

    let filter = EnvFilter::try_new(format!("llms_gen={level}"))
        .with_context(|| format!("Invalid log level '{level}'"))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_thread_ids(false))
        .init();

    Ok(())
}
