//! The summarization capability and its resilient wrapper.
//!
//! A [`Summarizer`] is an opaque backend that turns one [`SummaryInput`] into a
//! [`Summary`], failing with [`Error::Transient`] when a retry may help and
//! [`Error::Permanent`] when it cannot. [`ResilientSummarizer`] validates input,
//! drives the backend through a [`Retrier`] and normalizes the reply.

use crate::{
    error::{Error, Result},
    processor::FileSummary,
    retry::Retrier,
};
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::trace;

/// Text produced by a summarizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    /// The summary text
    pub text: String,
}

impl Summary {
    /// Creates a summary.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// What to summarize.
#[derive(Debug, Clone, Copy)]
pub enum SummaryInput<'a> {
    /// A single file.
    File {
        /// Path relative to the repository root
        path: &'a str,
        /// File content
        content: &'a str,
    },

    /// The whole project, from per-file summaries and an optional README.
    Project {
        /// Project name
        name: &'a str,
        /// README content, if one was found
        readme: Option<&'a str>,
        /// Per-file summaries in fold order
        summaries: &'a [FileSummary],
    },
}

impl SummaryInput<'_> {
    /// Short label used in logs.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::File { path, .. } => format!("summarize {path}"),
            Self::Project { name, .. } => format!("summarize project {name}"),
        }
    }
}

/// Opaque summarization capability.
pub trait Summarizer: Send + Sync {
    /// Summarizes the input.
    ///
    /// # Errors
    ///
    /// - [`Error::Transient`] for failures that may succeed on retry
    /// - [`Error::Permanent`] (or another non-transient error) otherwise
    fn summarize(&self, input: &SummaryInput<'_>) -> Result<Summary>;

    /// Backend name for logs and statistics.
    fn name(&self) -> &'static str {
        "custom"
    }
}

/// Builds the instruction text sent to language-model backends.
#[must_use]
pub fn render_prompt(input: &SummaryInput<'_>) -> String {
    match input {
        SummaryInput::File { path, content } => format!(
            "Summarize the file `{path}` for a repository index.\n\
             Write at most four sentences of plain text. Do not use Markdown, \
             do not start with \"This document\" or \"This file\", and do not \
             repeat the file name.\n\n\
             --- BEGIN {path} ---\n{content}\n--- END {path} ---\n"
        ),
        SummaryInput::Project {
            name,
            readme,
            summaries,
        } => {
            let mut prompt = format!(
                "Write a single paragraph of plain text describing the project `{name}`: \
                 what it is for and how it is organized. Do not use Markdown.\n"
            );

            if let Some(readme) = readme {
                let _ = write!(prompt, "\n--- BEGIN README ---\n{readme}\n--- END README ---\n");
            }

            if !summaries.is_empty() {
                prompt.push_str("\nFile summaries:\n");
                for summary in *summaries {
                    let _ = writeln!(prompt, "- {}: {}", summary.path, summary.summary);
                }
            }

            prompt
        }
    }
}

/// Collapses a reply into a single trimmed line.
#[must_use]
pub fn normalize_summary(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Cuts `text` to at most `max_bytes` bytes without splitting a character.
#[must_use]
pub fn truncate_at_char_boundary(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }

    let mut end = max_bytes;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Wraps a [`Summarizer`] with input validation, retries and normalization.
#[derive(Clone)]
pub struct ResilientSummarizer {
    inner: Arc<dyn Summarizer>,
    retrier: Retrier,
    max_input_bytes: usize,
}

impl std::fmt::Debug for ResilientSummarizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilientSummarizer")
            .field("backend", &self.inner.name())
            .field("retrier", &self.retrier)
            .field("max_input_bytes", &self.max_input_bytes)
            .finish()
    }
}

impl ResilientSummarizer {
    /// Creates the wrapper.
    #[must_use]
    pub fn new(inner: Arc<dyn Summarizer>, retrier: Retrier, max_input_bytes: usize) -> Self {
        Self {
            inner,
            retrier,
            max_input_bytes,
        }
    }

    /// Name of the wrapped backend.
    #[must_use]
    pub fn backend_name(&self) -> &'static str {
        self.inner.name()
    }

    /// Summarizes one file.
    ///
    /// # Errors
    ///
    /// - [`Error::Permanent`] if the content is blank or the reply is empty
    /// - Any non-transient backend error, unchanged
    /// - [`Error::RetryExhausted`] once every attempt failed transiently
    pub fn summarize_file(&self, path: &str, content: &str) -> Result<String> {
        if content.trim().is_empty() {
            return Err(Error::permanent(format!("'{path}' has no content to summarize")));
        }

        let content = self.clip(path, content);
        self.summarize_with_retry(&SummaryInput::File { path, content })
    }

    /// Summarizes the whole project.
    ///
    /// # Errors
    ///
    /// Same as [`summarize_file`](Self::summarize_file), except that an empty
    /// input is allowed.
    pub fn summarize_project(
        &self,
        name: &str,
        readme: Option<&str>,
        summaries: &[FileSummary],
    ) -> Result<String> {
        let readme = readme
            .filter(|r| !r.trim().is_empty())
            .map(|r| self.clip("README", r));

        self.summarize_with_retry(&SummaryInput::Project {
            name,
            readme,
            summaries,
        })
    }

    /// Calls the backend through the retrier and normalizes the reply.
    ///
    /// # Errors
    ///
    /// See [`Retrier::call`]. An empty reply is a permanent error.
    pub fn summarize_with_retry(&self, input: &SummaryInput<'_>) -> Result<String> {
        let label = input.label();
        let summary = self.retrier.call(&label, || self.inner.summarize(input))?;

        let text = normalize_summary(&summary.text);
        if text.is_empty() {
            return Err(Error::permanent(format!("{label}: backend returned an empty summary")));
        }

        Ok(text)
    }

    fn clip<'a>(&self, label: &str, content: &'a str) -> &'a str {
        let clipped = truncate_at_char_boundary(content, self.max_input_bytes);
        if clipped.len() < content.len() {
            trace!(
                "Truncated {} from {} to {} bytes",
                label,
                content.len(),
                clipped.len()
            );
        }
        clipped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::{BackoffPolicy, RecordingSleeper};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Replays scripted results and records the inputs it saw.
    struct Scripted {
        replies: Mutex<Vec<Result<Summary>>>,
        seen: Mutex<Vec<String>>,
    }

    impl Scripted {
        fn new(mut replies: Vec<Result<Summary>>) -> Arc<Self> {
            replies.reverse();
            Arc::new(Self {
                replies: Mutex::new(replies),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.seen.lock().unwrap().len()
        }
    }

    impl Summarizer for Scripted {
        fn summarize(&self, input: &SummaryInput<'_>) -> Result<Summary> {
            let seen = match input {
                SummaryInput::File { content, .. } => (*content).to_string(),
                SummaryInput::Project { readme, .. } => readme.unwrap_or_default().to_string(),
            };
            self.seen.lock().unwrap().push(seen);
            self.replies
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Ok(Summary::new("fallback")))
        }
    }

    fn resilient(
        backend: Arc<Scripted>,
        max_attempts: u32,
        max_input_bytes: usize,
    ) -> (ResilientSummarizer, Arc<RecordingSleeper>) {
        let policy = BackoffPolicy::new(
            Duration::from_secs(1),
            max_attempts,
            Duration::from_secs(30),
            2.0,
        )
        .unwrap();
        let sleeper = Arc::new(RecordingSleeper::new());
        let retrier = Retrier::new(policy, sleeper.clone());
        (
            ResilientSummarizer::new(backend, retrier, max_input_bytes),
            sleeper,
        )
    }

    #[test]
    fn test_normalize_summary() {
        assert_eq!(normalize_summary("  Parses\n\tconfig   files.\n"), "Parses config files.");
        assert_eq!(normalize_summary(" \n "), "");
    }

    #[test]
    fn test_truncate_at_char_boundary() {
        assert_eq!(truncate_at_char_boundary("hello", 10), "hello");
        assert_eq!(truncate_at_char_boundary("hello", 3), "hel");
        // 'é' is two bytes; cutting inside it backs off to the previous char.
        assert_eq!(truncate_at_char_boundary("héllo", 2), "h");
    }

    #[test]
    fn test_transient_then_success() {
        let backend = Scripted::new(vec![
            Err(Error::transient("429")),
            Err(Error::transient("429")),
            Ok(Summary::new("Reads\nconfig.")),
        ]);
        let (summarizer, sleeper) = resilient(backend.clone(), 3, 1000);

        let text = summarizer.summarize_file("config.py", "x = 1").unwrap();

        assert_eq!(text, "Reads config.");
        assert_eq!(backend.calls(), 3);
        assert_eq!(
            sleeper.recorded(),
            vec![Duration::from_secs(1), Duration::from_secs(2)]
        );
    }

    #[test]
    fn test_blank_content_is_rejected_without_calling_backend() {
        let backend = Scripted::new(Vec::new());
        let (summarizer, _) = resilient(backend.clone(), 3, 1000);

        let err = summarizer.summarize_file("empty.md", "  \n").unwrap_err();

        assert!(err.is_permanent());
        assert_eq!(backend.calls(), 0);
    }

    #[test]
    fn test_empty_reply_is_permanent() {
        let backend = Scripted::new(vec![Ok(Summary::new("   "))]);
        let (summarizer, sleeper) = resilient(backend, 3, 1000);

        let err = summarizer.summarize_file("a.md", "text").unwrap_err();

        assert!(err.is_permanent());
        assert!(sleeper.recorded().is_empty());
    }

    #[test]
    fn test_long_input_is_truncated() {
        let backend = Scripted::new(vec![Ok(Summary::new("ok"))]);
        let (summarizer, _) = resilient(backend.clone(), 1, 4);

        summarizer.summarize_file("a.md", "abcdefgh").unwrap();

        assert_eq!(backend.seen.lock().unwrap()[0], "abcd");
    }

    #[test]
    fn test_project_summary_without_readme() {
        let backend = Scripted::new(vec![Ok(Summary::new("A demo project."))]);
        let (summarizer, _) = resilient(backend.clone(), 1, 1000);

        let text = summarizer.summarize_project("demo", Some("  "), &[]).unwrap();

        assert_eq!(text, "A demo project.");
        assert_eq!(backend.seen.lock().unwrap()[0], "");
    }

    #[test]
    fn test_render_prompt_mentions_inputs() {
        let file_prompt = render_prompt(&SummaryInput::File {
            path: "src/app.py",
            content: "print('hi')",
        });
        assert!(file_prompt.contains("src/app.py"));
        assert!(file_prompt.contains("print('hi')"));
        assert!(file_prompt.contains("four sentences"));

        let summaries = vec![FileSummary::new("docs/a.md", "Explains A.")];
        let project_prompt = render_prompt(&SummaryInput::Project {
            name: "demo",
            readme: Some("# Demo"),
            summaries: &summaries,
        });
        assert!(project_prompt.contains("demo"));
        assert!(project_prompt.contains("# Demo"));
        assert!(project_prompt.contains("- docs/a.md: Explains A."));
    }
}
