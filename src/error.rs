use crate::pipeline::Stage;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using the library's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Comprehensive error types for the llms-gen library.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum Error {
    /// IO error with context about the file path.
    #[error("IO error accessing '{path}': {message}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// Error message
        message: String,
    },

    /// Template rendering error.
    #[error("Failed to render template '{template}': {message}")]
    Template {
        /// Template name
        template: String,
        /// Error message
        message: String,
    },

    /// A user supplied template failed validation.
    #[error("Invalid template '{template}': {message}")]
    TemplateValidation {
        /// Template path or name
        template: String,
        /// Reason the template was rejected
        message: String,
    },

    /// Configuration validation error.
    #[error("Invalid configuration: {message}")]
    Config {
        /// Detailed error message
        message: String,
    },

    /// JSON serialization error.
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error message
        message: String,
    },

    /// Invalid UTF-8 encountered in file.
    #[error("Invalid UTF-8 encoding in file '{path}'. File may be binary or use unsupported encoding.")]
    InvalidUtf8 {
        /// Path to file with encoding issues
        path: PathBuf,
    },

    /// File content looks binary and cannot be summarized.
    #[error("File '{path}' appears to be binary")]
    BinaryContent {
        /// Path to the binary file
        path: PathBuf,
    },

    /// Retryable upstream failure (rate limiting, transient network trouble).
    #[error("Transient failure: {message}")]
    Transient {
        /// Error message
        message: String,
    },

    /// Non-retryable failure (bad input, rejected request).
    #[error("Permanent failure: {message}")]
    Permanent {
        /// Error message
        message: String,
    },

    /// Every allowed attempt failed with a transient error.
    #[error("Gave up after {attempts} attempt(s): {last}")]
    RetryExhausted {
        /// Number of attempts made
        attempts: u32,
        /// The error returned by the final attempt
        #[source]
        last: Box<Error>,
    },

    /// A summary for the same path was folded twice.
    #[error("Duplicate summary for '{path}'")]
    DuplicateSummary {
        /// Path that was summarized more than once
        path: String,
    },

    /// Internal state was driven outside its contract.
    #[error("Invalid pipeline state: {message}")]
    InvalidState {
        /// Error message
        message: String,
    },

    /// The pipeline aborted in the given stage.
    #[error("Pipeline failed during {stage}{}: {source}", batch_suffix(.batch))]
    Stage {
        /// Stage that was running when the failure happened
        stage: Stage,
        /// Batch being processed, if any
        batch: Option<usize>,
        /// Underlying error
        source: Box<Error>,
    },
}

fn batch_suffix(batch: &Option<usize>) -> String {
    batch.map_or_else(String::new, |index| format!(" (batch {})", index + 1))
}

impl Error {
    /// Creates an IO error with path context.
    #[must_use]
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            message: source.to_string(),
        }
    }

    /// Creates a configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a template error.
    #[must_use]
    pub fn template(template: impl Into<String>, source: tera::Error) -> Self {
        Self::Template {
            template: template.into(),
            message: source.to_string(),
        }
    }

    /// Creates a template validation error.
    #[must_use]
    pub fn template_validation(template: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TemplateValidation {
            template: template.into(),
            message: message.into(),
        }
    }

    /// Creates an invalid UTF-8 error.
    #[must_use]
    pub fn invalid_utf8(path: impl Into<PathBuf>) -> Self {
        Self::InvalidUtf8 { path: path.into() }
    }

    /// Creates a binary content error.
    #[must_use]
    pub fn binary_content(path: impl Into<PathBuf>) -> Self {
        Self::BinaryContent { path: path.into() }
    }

    /// Creates a retryable error.
    #[must_use]
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient {
            message: message.into(),
        }
    }

    /// Creates a non-retryable error.
    #[must_use]
    pub fn permanent(message: impl Into<String>) -> Self {
        Self::Permanent {
            message: message.into(),
        }
    }

    /// Wraps the last error of an exhausted retry loop.
    #[must_use]
    pub fn retry_exhausted(attempts: u32, last: Self) -> Self {
        Self::RetryExhausted {
            attempts,
            last: Box::new(last),
        }
    }

    /// Creates a duplicate summary error.
    #[must_use]
    pub fn duplicate_summary(path: impl Into<String>) -> Self {
        Self::DuplicateSummary { path: path.into() }
    }

    /// Creates an invalid state error.
    #[must_use]
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Attaches stage and batch context to a pipeline failure.
    #[must_use]
    pub fn stage(stage: Stage, batch: Option<usize>, source: Self) -> Self {
        Self::Stage {
            stage,
            batch,
            source: Box::new(source),
        }
    }

    /// Returns true if this is an IO error.
    #[must_use]
    pub const fn is_io(&self) -> bool {
        matches!(self, Self::Io { .. })
    }

    /// Returns true if this is a configuration error.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config { .. })
    }

    /// Returns true if the failure may succeed when retried.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    /// Returns true if retrying cannot help.
    ///
    /// Unreadable, non-UTF-8 and binary files count as permanent failures.
    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        matches!(
            self,
            Self::Permanent { .. }
                | Self::Io { .. }
                | Self::InvalidUtf8 { .. }
                | Self::BinaryContent { .. }
        )
    }

    /// Returns true if retries were exhausted.
    #[must_use]
    pub const fn is_retry_exhausted(&self) -> bool {
        matches!(self, Self::RetryExhausted { .. })
    }

    /// Returns the stage a pipeline failure happened in.
    #[must_use]
    pub const fn failed_stage(&self) -> Option<Stage> {
        match self {
            Self::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization {
            message: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = Error::config("test message");
        assert!(err.is_config());
        assert!(err.to_string().contains("test message"));
    }

    #[test]
    fn test_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = Error::io("/tmp/test.txt", io_err);
        assert!(err.is_io());
        assert!(err.is_permanent());
        assert!(err.to_string().contains("/tmp/test.txt"));
    }

    #[test]
    fn test_transient_vs_permanent() {
        assert!(Error::transient("429").is_transient());
        assert!(!Error::transient("429").is_permanent());
        assert!(Error::permanent("400").is_permanent());
        assert!(!Error::permanent("400").is_transient());
        assert!(Error::invalid_utf8("a.md").is_permanent());
        assert!(Error::binary_content("a.bin").is_permanent());
    }

    #[test]
    fn test_retry_exhausted_keeps_last_error() {
        let err = Error::retry_exhausted(3, Error::transient("rate limited"));
        assert!(err.is_retry_exhausted());
        assert!(!err.is_transient());

        let message = err.to_string();
        assert!(message.contains("3 attempt"));
        assert!(message.contains("rate limited"));

        match err {
            Error::RetryExhausted { attempts, last } => {
                assert_eq!(attempts, 3);
                assert!(last.is_transient());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_stage_error_context() {
        let err = Error::stage(
            Stage::ProcessingBatch,
            Some(1),
            Error::duplicate_summary("src/lib.rs"),
        );

        assert_eq!(err.failed_stage(), Some(Stage::ProcessingBatch));
        let message = err.to_string();
        assert!(message.contains("batch 2"));
        assert!(message.contains("src/lib.rs"));

        let err = Error::stage(Stage::ProjectSummary, None, Error::permanent("quota"));
        assert!(!err.to_string().contains("batch"));
    }

    #[test]
    fn test_error_clone() {
        let err = Error::config("test");
        let cloned = err.clone();
        assert_eq!(err.to_string(), cloned.to_string());
    }

    #[test]
    fn test_serialization_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let err: Error = json_err.into();
        assert!(err.to_string().contains("Serialization error"));
    }
}
