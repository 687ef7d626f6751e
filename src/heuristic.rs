//! Offline, deterministic summarizer.
//!
//! Extracts a sentence from the file itself: the first Markdown paragraph,
//! a leading doc comment or module docstring, or failing both a description
//! of the file's language and length. Useful without network access and as a
//! predictable backend for tests.

use crate::{
    error::Result,
    file::language_for_path,
    summarizer::{Summarizer, Summary, SummaryInput},
};
use std::collections::BTreeSet;

const MAX_SUMMARY_CHARS: usize = 200;
const MAX_PROJECT_CHARS: usize = 400;

/// Extractive summarizer that never fails transiently.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicSummarizer;

impl HeuristicSummarizer {
    /// Creates the summarizer.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn summarize_file(path: &str, content: &str) -> String {
        let extracted = if is_prose(path) {
            first_paragraph(content)
        } else {
            leading_doc_comment(content)
        };

        extracted
            .map(|text| clamp_chars(first_sentence(&text), MAX_SUMMARY_CHARS))
            .filter(|text| !text.is_empty())
            .unwrap_or_else(|| {
                format!(
                    "{} source file ({} lines).",
                    language_for_path(path),
                    content.lines().count()
                )
            })
    }

    fn summarize_project(
        name: &str,
        readme: Option<&str>,
        summaries: &[crate::processor::FileSummary],
    ) -> String {
        if let Some(paragraph) = readme.and_then(first_paragraph) {
            return clamp_chars(&paragraph, MAX_PROJECT_CHARS);
        }

        if summaries.is_empty() {
            return format!("{name} has no summarized files.");
        }

        let directories: BTreeSet<&str> = summaries
            .iter()
            .map(|s| s.path.rsplit_once('/').map_or(".", |(dir, _)| dir))
            .collect();

        format!(
            "{name} contains {} summarized file(s) across {} director{}.",
            summaries.len(),
            directories.len(),
            if directories.len() == 1 { "y" } else { "ies" }
        )
    }
}

impl Summarizer for HeuristicSummarizer {
    fn summarize(&self, input: &SummaryInput<'_>) -> Result<Summary> {
        let text = match input {
            SummaryInput::File { path, content } => Self::summarize_file(path, content),
            SummaryInput::Project {
                name,
                readme,
                summaries,
            } => Self::summarize_project(name, *readme, summaries),
        };

        Ok(Summary::new(text))
    }

    fn name(&self) -> &'static str {
        "heuristic"
    }
}

fn is_prose(path: &str) -> bool {
    let lower = path.to_ascii_lowercase();
    [".md", ".markdown", ".rst", ".txt"]
        .iter()
        .any(|ext| lower.ends_with(ext))
        || !lower.rsplit('/').next().unwrap_or(lower.as_str()).contains('.')
}

/// Returns the first prose paragraph, or the first heading if there is none.
fn first_paragraph(markdown: &str) -> Option<String> {
    let mut lines = markdown.lines().peekable();
    let mut paragraph: Vec<String> = Vec::new();
    let mut first_heading = None;
    let mut in_fence = false;

    // Front matter
    if lines.peek().is_some_and(|l| l.trim() == "---") {
        lines.next();
        for line in lines.by_ref() {
            if line.trim() == "---" {
                break;
            }
        }
    }

    for line in lines {
        let trimmed = line.trim();

        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            in_fence = !in_fence;
            if !paragraph.is_empty() {
                break;
            }
            continue;
        }
        if in_fence {
            continue;
        }

        if trimmed.is_empty() {
            if paragraph.is_empty() {
                continue;
            }
            break;
        }

        if let Some(heading) = trimmed.strip_prefix('#') {
            if !paragraph.is_empty() {
                break;
            }
            if first_heading.is_none() {
                let heading = strip_inline_markup(heading.trim_start_matches('#').trim());
                if !heading.is_empty() {
                    first_heading = Some(heading);
                }
            }
            continue;
        }

        if is_decoration(trimmed) {
            continue;
        }

        let text = strip_inline_markup(strip_block_marker(trimmed));
        if !text.is_empty() {
            paragraph.push(text);
        }
    }

    if paragraph.is_empty() {
        first_heading
    } else {
        Some(paragraph.join(" "))
    }
}

/// Lines that carry no prose: badges, images, tables, HTML, rules.
fn is_decoration(line: &str) -> bool {
    line.starts_with("[![")
        || line.starts_with("![")
        || line.starts_with('<')
        || line.starts_with('|')
        || line.chars().all(|c| matches!(c, '-' | '=' | '*' | '_' | ' '))
}

fn strip_block_marker(line: &str) -> &str {
    for marker in ["> ", "- ", "* ", "+ "] {
        if let Some(rest) = line.strip_prefix(marker) {
            return rest.trim_start();
        }
    }
    line
}

/// Removes emphasis and code markers and turns `[text](url)` into `text`.
fn strip_inline_markup(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(open) = rest.find('[') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];

        match after.find("](") {
            Some(close) => {
                let tail = &after[close + 2..];
                out.push_str(&after[..close]);
                rest = tail.find(')').map_or("", |end| &tail[end + 1..]);
            }
            None => {
                out.push('[');
                rest = after;
            }
        }
    }
    out.push_str(rest);

    out.replace("**", "")
        .replace("__", "")
        .replace('`', "")
        .trim()
        .to_string()
}

/// Returns the comment block at the top of a source file.
fn leading_doc_comment(source: &str) -> Option<String> {
    let mut lines = source
        .lines()
        .map(str::trim)
        .skip_while(|l| l.is_empty() || l.starts_with("#!") || l.contains("-*- coding"))
        .peekable();

    let first = *lines.peek()?;
    let mut collected: Vec<String> = Vec::new();

    if let Some(quote) = ["\"\"\"", "'''"].into_iter().find(|q| first.starts_with(q)) {
        let opening = lines.next()?;
        let body = &opening[quote.len()..];

        if let Some(end) = body.find(quote) {
            collected.push(body[..end].trim().to_string());
        } else {
            collected.push(body.trim().to_string());
            for line in lines {
                if let Some(end) = line.find(quote) {
                    collected.push(line[..end].trim().to_string());
                    break;
                }
                collected.push(line.to_string());
            }
        }
    } else if first.starts_with("/*") {
        for line in lines {
            let done = line.contains("*/");
            let text = line
                .trim_start_matches("/**")
                .trim_start_matches("/*!")
                .trim_start_matches("/*")
                .trim_end_matches("*/")
                .trim_start_matches('*')
                .trim();
            collected.push(text.to_string());
            if done {
                break;
            }
        }
    } else {
        let prefixes: &[&str] = if first.starts_with("//") {
            &["//!", "///", "//"]
        } else if first.starts_with('#') && !first.starts_with("#[") {
            &["#"]
        } else if first.starts_with("--") {
            &["--"]
        } else {
            return None;
        };

        for line in lines {
            let Some(text) = prefixes.iter().find_map(|p| line.strip_prefix(p)) else {
                break;
            };
            collected.push(text.trim().to_string());
        }
    }

    let text = first_paragraph(&collected.join("\n"))?;
    Some(text)
}

/// Returns `text` up to and including its first sentence terminator.
fn first_sentence(text: &str) -> &str {
    let bytes = text.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        if matches!(b, b'.' | b'!' | b'?') && bytes.get(i + 1).is_none_or(|next| *next == b' ') {
            return &text[..=i];
        }
    }
    text
}

fn clamp_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let mut clipped: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    clipped.truncate(clipped.trim_end().len());
    clipped.push_str("...");
    clipped
}
