use crate::error::{Error, Result};
use crate::filter::FileFilterConfig;
use crate::retry::BackoffPolicy;
use crate::state::DuplicatePolicy;
use std::path::PathBuf;

const DEFAULT_OUTPUT_PATH: &str = "temp/llms.txt";
const DEFAULT_BATCH_SIZE: usize = 10;
const DEFAULT_MAX_SECTION_DEPTH: usize = 2;
const DEFAULT_MAX_INPUT_BYTES: usize = 100_000;

/// Output format for the generated index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// `llms.txt` Markdown
    #[default]
    Markdown,
    /// The assembled document as JSON
    Json,
}

/// Configuration for the llms-gen pipeline.
///
/// Use [`Config::builder()`] to construct a new configuration.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct Config {
    /// Repository root to index
    pub root_dir: PathBuf,

    /// Where the index is written
    pub output_path: PathBuf,

    /// Output format
    pub format: OutputFormat,

    /// Maximum files per batch
    pub batch_size: usize,

    /// Optional cap on the cumulative size of a batch
    pub max_batch_bytes: Option<u64>,

    /// Only the first N discovered files are processed (0 means all)
    pub max_files_to_process: usize,

    /// Retry policy for summarization calls
    pub backoff: BackoffPolicy,

    /// Discovery include/exclude rules
    pub file_filter_config: FileFilterConfig,

    /// Honor `.gitignore` and git exclude files during discovery
    pub respect_gitignore: bool,

    /// Directory components kept in a section key
    pub max_section_depth: usize,

    /// H1 title (defaults to the repository directory name)
    pub project_name: Option<String>,

    /// Link prefix (defaults to the `origin` remote, if any)
    pub base_url: Option<String>,

    /// File content beyond this many bytes is not sent to the summarizer
    pub max_input_bytes: usize,

    /// What to do when the same path is summarized twice
    pub duplicate_policy: DuplicatePolicy,

    /// Dry run mode (no file writes)
    pub dry_run: bool,

    /// Keep a timestamped copy of an existing output file
    pub backup_existing: bool,

    /// Path to an external template file
    pub template_path: Option<PathBuf>,
}

impl Config {
    /// Creates a new configuration builder.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use llms_gen::Config;
    ///
    /// let config = Config::builder()
    ///     .root_dir("./my-repo")
    ///     .batch_size(5)
    ///     .build()
    ///     .expect("valid configuration");
    /// ```
    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Root directory doesn't exist or is not a directory
    /// - A batch limit or `max_input_bytes` is zero
    /// - The backoff policy is invalid
    /// - The template file is missing or invalid
    pub fn validate(&self) -> Result<()> {
        if !self.root_dir.exists() {
            return Err(Error::config(format!(
                "Root directory does not exist: {}",
                self.root_dir.display()
            )));
        }

        if !self.root_dir.is_dir() {
            return Err(Error::config(format!(
                "Root path is not a directory: {}",
                self.root_dir.display()
            )));
        }

        if self.batch_size == 0 {
            return Err(Error::config("batch_size must be greater than 0"));
        }

        if self.max_batch_bytes == Some(0) {
            return Err(Error::config("max_batch_bytes must be greater than 0"));
        }

        if self.max_input_bytes == 0 {
            return Err(Error::config("max_input_bytes must be greater than 0"));
        }

        if self.output_path.as_os_str().is_empty() {
            return Err(Error::config("output_path must not be empty"));
        }

        self.backoff.validate()?;

        if let Some(ref template_path) = self.template_path {
            if !template_path.exists() {
                return Err(Error::config(format!(
                    "Template file does not exist: {}",
                    template_path.display()
                )));
            }

            if !template_path.is_file() {
                return Err(Error::config(format!(
                    "Template path is not a file: {}",
                    template_path.display()
                )));
            }

            crate::template_validator::TemplateValidator::validate_template(template_path)?;

            if self.format == OutputFormat::Json {
                tracing::warn!("template_path is ignored for JSON output");
            }
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("."),
            output_path: PathBuf::from(DEFAULT_OUTPUT_PATH),
            format: OutputFormat::Markdown,
            batch_size: DEFAULT_BATCH_SIZE,
            max_batch_bytes: None,
            max_files_to_process: 0,
            backoff: BackoffPolicy::default(),
            file_filter_config: FileFilterConfig::default(),
            respect_gitignore: true,
            max_section_depth: DEFAULT_MAX_SECTION_DEPTH,
            project_name: None,
            base_url: None,
            max_input_bytes: DEFAULT_MAX_INPUT_BYTES,
            duplicate_policy: DuplicatePolicy::KeepFirst,
            dry_run: false,
            backup_existing: false,
            template_path: None,
        }
    }
}

/// Builder for creating a [`Config`].
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    root_dir: Option<PathBuf>,
    output_path: Option<PathBuf>,
    format: Option<OutputFormat>,
    batch_size: Option<usize>,
    max_batch_bytes: Option<u64>,
    max_files_to_process: Option<usize>,
    backoff: Option<BackoffPolicy>,
    file_filter_config: Option<FileFilterConfig>,
    respect_gitignore: Option<bool>,
    max_section_depth: Option<usize>,
    project_name: Option<String>,
    base_url: Option<String>,
    max_input_bytes: Option<usize>,
    duplicate_policy: Option<DuplicatePolicy>,
    dry_run: bool,
    backup_existing: bool,
    template_path: Option<PathBuf>,
}

impl ConfigBuilder {
    /// Sets the repository root.
    #[must_use]
    pub fn root_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.root_dir = Some(path.into());
        self
    }

    /// Sets the output file path.
    #[must_use]
    pub fn output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = Some(path.into());
        self
    }

    /// Sets the output format.
    #[must_use]
    pub fn format(mut self, format: OutputFormat) -> Self {
        self.format = Some(format);
        self
    }

    /// Sets the maximum number of files per batch.
    #[must_use]
    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = Some(size);
        self
    }

    /// Caps the cumulative size of a batch in bytes.
    #[must_use]
    pub fn max_batch_bytes(mut self, bytes: u64) -> Self {
        self.max_batch_bytes = Some(bytes);
        self
    }

    /// Limits processing to the first `count` discovered files (0 means all).
    #[must_use]
    pub fn max_files_to_process(mut self, count: usize) -> Self {
        self.max_files_to_process = Some(count);
        self
    }

    /// Sets the retry policy.
    #[must_use]
    pub fn backoff(mut self, policy: BackoffPolicy) -> Self {
        self.backoff = Some(policy);
        self
    }

    /// Sets the discovery rules.
    #[must_use]
    pub fn file_filter_config(mut self, config: FileFilterConfig) -> Self {
        self.file_filter_config = Some(config);
        self
    }

    /// Enables or disables `.gitignore` handling.
    #[must_use]
    pub fn respect_gitignore(mut self, enabled: bool) -> Self {
        self.respect_gitignore = Some(enabled);
        self
    }

    /// Sets how many directory levels become separate sections.
    #[must_use]
    pub fn max_section_depth(mut self, depth: usize) -> Self {
        self.max_section_depth = Some(depth);
        self
    }

    /// Overrides the project name.
    #[must_use]
    pub fn project_name(mut self, name: impl Into<String>) -> Self {
        self.project_name = Some(name.into());
        self
    }

    /// Overrides the link prefix.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the per-file input limit for the summarizer.
    #[must_use]
    pub fn max_input_bytes(mut self, bytes: usize) -> Self {
        self.max_input_bytes = Some(bytes);
        self
    }

    /// Sets the duplicate summary policy.
    #[must_use]
    pub fn duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicate_policy = Some(policy);
        self
    }

    /// Enables dry run mode (no file writes).
    #[must_use]
    pub fn dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }

    /// Enables or disables backup creation.
    #[must_use]
    pub fn backup_existing(mut self, enabled: bool) -> Self {
        self.backup_existing = enabled;
        self
    }

    /// Sets the path to an external template file.
    ///
    /// The template receives the assembled document as `ctx` and must
    /// reference `project_name`, `project_summary` and `sections`.
    #[must_use]
    pub fn template_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.template_path = Some(path.into());
        self
    }

    /// Builds the configuration.
    ///
    /// The root directory is canonicalized so the project name and
    /// relative paths do not depend on how it was spelled.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails.
    pub fn build(self) -> Result<Config> {
        let mut config = Config {
            root_dir: self.root_dir.unwrap_or_else(|| PathBuf::from(".")),
            output_path: self
                .output_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_PATH)),
            format: self.format.unwrap_or_default(),
            batch_size: self.batch_size.unwrap_or(DEFAULT_BATCH_SIZE),
            max_batch_bytes: self.max_batch_bytes,
            max_files_to_process: self.max_files_to_process.unwrap_or(0),
            backoff: self.backoff.unwrap_or_default(),
            file_filter_config: self.file_filter_config.unwrap_or_default(),
            respect_gitignore: self.respect_gitignore.unwrap_or(true),
            max_section_depth: self.max_section_depth.unwrap_or(DEFAULT_MAX_SECTION_DEPTH),
            project_name: self.project_name,
            base_url: self.base_url,
            max_input_bytes: self.max_input_bytes.unwrap_or(DEFAULT_MAX_INPUT_BYTES),
            duplicate_policy: self.duplicate_policy.unwrap_or_default(),
            dry_run: self.dry_run,
            backup_existing: self.backup_existing,
            template_path: self.template_path,
        };

        config.validate()?;

        config.root_dir = config
            .root_dir
            .canonicalize()
            .map_err(|e| Error::io(&config.root_dir, e))?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;
    use std::time::Duration;

    #[test]
    fn test_default_config() {
        let temp = assert_fs::TempDir::new().unwrap();
        let config = Config::builder().root_dir(temp.path()).build().unwrap();

        assert_eq!(config.batch_size, DEFAULT_BATCH_SIZE);
        assert_eq!(config.max_files_to_process, 0);
        assert_eq!(config.format, OutputFormat::Markdown);
        assert_eq!(config.output_path, PathBuf::from("temp/llms.txt"));
        assert_eq!(config.max_section_depth, 2);
        assert_eq!(config.backoff, BackoffPolicy::default());
        assert_eq!(config.duplicate_policy, DuplicatePolicy::KeepFirst);
        assert!(config.respect_gitignore);
        assert!(!config.backup_existing);
        assert!(config.root_dir.is_absolute());
    }

    #[test]
    fn test_invalid_root_dir() {
        let result = Config::builder()
            .root_dir("/nonexistent/path/that/should/not/exist")
            .build();

        assert!(result.unwrap_err().is_config());
    }

    #[test]
    fn test_root_must_be_directory() {
        let temp = assert_fs::TempDir::new().unwrap();
        let file = temp.child("file.md");
        file.write_str("x").unwrap();

        assert!(Config::builder().root_dir(file.path()).build().is_err());
    }

    #[test]
    fn test_zero_batch_size_is_rejected() {
        let temp = assert_fs::TempDir::new().unwrap();

        let err = Config::builder()
            .root_dir(temp.path())
            .batch_size(0)
            .build()
            .unwrap_err();

        assert!(err.is_config());
        assert!(err.to_string().contains("batch_size"));
    }

    #[test]
    fn test_zero_limits_are_rejected() {
        let temp = assert_fs::TempDir::new().unwrap();

        assert!(
            Config::builder()
                .root_dir(temp.path())
                .max_batch_bytes(0)
                .build()
                .is_err()
        );
        assert!(
            Config::builder()
                .root_dir(temp.path())
                .max_input_bytes(0)
                .build()
                .is_err()
        );
    }

    #[test]
    fn test_invalid_backoff_is_rejected() {
        let temp = assert_fs::TempDir::new().unwrap();
        let policy = BackoffPolicy {
            multiplier: 0.5,
            ..BackoffPolicy::default()
        };

        let err = Config::builder()
            .root_dir(temp.path())
            .backoff(policy)
            .build()
            .unwrap_err();

        assert!(err.is_config());
    }

    #[test]
    fn test_custom_values() {
        let temp = assert_fs::TempDir::new().unwrap();
        let policy =
            BackoffPolicy::new(Duration::from_millis(10), 2, Duration::from_secs(1), 1.5).unwrap();

        let config = Config::builder()
            .root_dir(temp.path())
            .output_path(temp.path().join("out/llms.txt"))
            .batch_size(3)
            .max_files_to_process(7)
            .backoff(policy.clone())
            .project_name("Demo")
            .duplicate_policy(DuplicatePolicy::Reject)
            .build()
            .unwrap();

        assert_eq!(config.batch_size, 3);
        assert_eq!(config.max_files_to_process, 7);
        assert_eq!(config.backoff, policy);
        assert_eq!(config.project_name.as_deref(), Some("Demo"));
        assert_eq!(config.duplicate_policy, DuplicatePolicy::Reject);
    }

    #[test]
    fn test_missing_template_is_rejected() {
        let temp = assert_fs::TempDir::new().unwrap();

        let err = Config::builder()
            .root_dir(temp.path())
            .template_path(temp.path().join("missing.tera"))
            .build()
            .unwrap_err();

        assert!(err.to_string().contains("does not exist"));
    }
}
