//! Turns aggregated summaries into the document handed to the renderer.
//!
//! Files are grouped by directory, truncated to a maximum depth, so a deep
//! tree still produces a short list of sections. Root files land in the
//! `Home` section.

use crate::{config::Config, state::AggregationState};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// Overview used when no project summary was produced.
pub const MISSING_PROJECT_SUMMARY: &str = "No project summary found.";

/// Key of the section holding files at the repository root.
pub const ROOT_SECTION: &str = ".";

/// One link in a section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entry {
    /// Link text (the file name)
    pub name: String,

    /// Link target
    pub url: String,

    /// One-line summary
    pub summary: String,
}

/// A group of entries sharing a directory prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Section {
    /// Directory prefix, `.` for the root
    pub key: String,

    /// Display title
    pub title: String,

    /// Entries ordered by path
    pub entries: Vec<Entry>,
}

/// Everything the renderer needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Document {
    /// Project name, rendered as the H1
    pub project_name: String,

    /// Overview paragraph
    pub project_summary: String,

    /// Sections ordered by key
    pub sections: Vec<Section>,
}

impl Document {
    /// Total number of entries across sections.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.sections.iter().map(|s| s.entries.len()).sum()
    }
}

/// How entries are grouped and linked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionLayout {
    /// Project name for the H1
    pub project_name: String,

    /// Prefix for every link, empty for relative links
    pub base_url: String,

    /// Directory components kept in a section key
    pub max_depth: usize,
}

impl SectionLayout {
    /// Resolves the layout for a run, falling back to values derived from
    /// the repository when they are not configured.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let project_name = config
            .project_name
            .clone()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| repo_name(&config.root_dir));

        let base_url = config.base_url.as_deref().map_or_else(
            || base_url_for_repo(&config.root_dir),
            |url| {
                if url.is_empty() || url.ends_with('/') {
                    url.to_string()
                } else {
                    format!("{url}/")
                }
            },
        );

        Self {
            project_name,
            base_url,
            max_depth: config.max_section_depth,
        }
    }
}

/// Builds the document from the aggregated state.
///
/// Only files with a summary appear; skipped files are left out.
#[must_use]
pub fn assemble(state: &AggregationState, layout: &SectionLayout) -> Document {
    let mut grouped: BTreeMap<String, Vec<Entry>> = BTreeMap::new();
    let mut sorted: Vec<_> = state.all_summaries().iter().collect();
    sorted.sort_by(|a, b| a.path.cmp(&b.path));

    for summary in sorted {
        let name = summary
            .path
            .rsplit('/')
            .next()
            .unwrap_or(summary.path.as_str())
            .to_string();

        grouped
            .entry(section_key(&summary.path, layout.max_depth))
            .or_default()
            .push(Entry {
                name,
                url: format!("{}{}", layout.base_url, summary.path),
                summary: summary.summary.clone(),
            });
    }

    let sections: Vec<Section> = grouped
        .into_iter()
        .map(|(key, entries)| Section {
            title: section_title(&key),
            key,
            entries,
        })
        .collect();

    debug!(
        "Assembled {} sections from {} summaries",
        sections.len(),
        state.all_summaries().len()
    );

    Document {
        project_name: layout.project_name.clone(),
        project_summary: state
            .project_summary()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(MISSING_PROJECT_SUMMARY)
            .to_string(),
        sections,
    }
}

/// Returns the section a file belongs to: its directory, cut to `max_depth`
/// components.
#[must_use]
pub fn section_key(relative_path: &str, max_depth: usize) -> String {
    let Some((dir, _)) = relative_path.rsplit_once('/') else {
        return ROOT_SECTION.to_string();
    };

    let parts: Vec<&str> = dir
        .split('/')
        .filter(|p| !p.is_empty() && *p != ".")
        .take(max_depth)
        .collect();

    if parts.is_empty() {
        ROOT_SECTION.to_string()
    } else {
        parts.join("/")
    }
}

/// Converts a section key to its display title.
///
/// Path separators become spaces and every word is title-cased
/// (`docs/api_ref` becomes `Docs Api_Ref`). The root section is `Home`.
#[must_use]
pub fn section_title(key: &str) -> String {
    if key == ROOT_SECTION {
        return "Home".to_string();
    }

    let spaced = key.replace('/', " ");
    let mut title = String::with_capacity(spaced.len());
    let mut prev_alphabetic = false;

    for c in spaced.trim().chars() {
        if c.is_alphabetic() {
            if prev_alphabetic {
                title.extend(c.to_lowercase());
            } else {
                title.extend(c.to_uppercase());
            }
            prev_alphabetic = true;
        } else {
            title.push(c);
            prev_alphabetic = false;
        }
    }

    title
}

/// Last component of the repository path.
#[must_use]
pub fn repo_name(root: &Path) -> String {
    root.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| "repository".to_string())
}

/// Extracts the `origin` remote from `.git/config` text, as an HTTPS URL
/// without a `.git` suffix.
#[must_use]
pub fn remote_url_from_git_config(git_config: &str) -> Option<String> {
    let mut in_origin = false;

    for line in git_config.lines() {
        let line = line.trim();

        if line.starts_with('[') {
            let header: String = line.chars().filter(|c| !c.is_whitespace()).collect();
            in_origin = header == "[remote\"origin\"]";
            continue;
        }

        if !in_origin {
            continue;
        }

        if let Some((key, value)) = line.split_once('=') {
            if key.trim() == "url" {
                return Some(normalize_remote(value.trim()));
            }
        }
    }

    None
}

fn normalize_remote(remote: &str) -> String {
    let https = if let Some(rest) = remote.strip_prefix("git@") {
        match rest.split_once(':') {
            Some((host, path)) => format!("https://{host}/{path}"),
            None => format!("https://{rest}"),
        }
    } else if let Some(rest) = remote.strip_prefix("ssh://git@") {
        format!("https://{rest}")
    } else {
        remote.to_string()
    };

    https
        .strip_suffix(".git")
        .map_or_else(|| https.clone(), ToString::to_string)
}

/// Link prefix for a repository: `<remote>/blob/main/`, or empty when the
/// repository has no readable origin remote.
#[must_use]
pub fn base_url_for_repo(root: &Path) -> String {
    std::fs::read_to_string(root.join(".git").join("config"))
        .ok()
        .and_then(|text| remote_url_from_git_config(&text))
        .map(|remote| format!("{remote}/blob/main/"))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::{BatchOutcome, FileSummary};
    use crate::state::DuplicatePolicy;
    use assert_fs::prelude::*;

    fn state_with(paths: &[&str]) -> AggregationState {
        let mut state = AggregationState::new(1, DuplicatePolicy::KeepFirst);
        state
            .fold(BatchOutcome {
                index: 0,
                summaries: paths
                    .iter()
                    .map(|p| FileSummary::new(*p, format!("About {p}.")))
                    .collect(),
                skipped: Vec::new(),
            })
            .unwrap();
        state
    }

    fn layout(base_url: &str) -> SectionLayout {
        SectionLayout {
            project_name: "demo".to_string(),
            base_url: base_url.to_string(),
            max_depth: 2,
        }
    }

    #[test]
    fn test_section_key_depth() {
        assert_eq!(section_key("README.md", 2), ".");
        assert_eq!(section_key("docs/intro.md", 2), "docs");
        assert_eq!(section_key("docs/guide/setup.md", 2), "docs/guide");
        assert_eq!(section_key("docs/guide/deep/more/x.md", 2), "docs/guide");
        assert_eq!(section_key("docs/guide/x.md", 1), "docs");
        assert_eq!(section_key("docs/guide/x.md", 0), ".");
    }

    #[test]
    fn test_section_title() {
        assert_eq!(section_title("."), "Home");
        assert_eq!(section_title("docs"), "Docs");
        assert_eq!(section_title("src/llms_gen_agent"), "Src Llms_Gen_Agent");
        assert_eq!(section_title("API/v2docs"), "Api V2Docs");
    }

    #[test]
    fn test_assemble_groups_and_sorts() {
        let mut state = state_with(&["src/b.py", "README.md", "src/a.py", "docs/guide/x/deep.md"]);
        state.set_project_summary("A demo.");

        let doc = assemble(&state, &layout(""));

        assert_eq!(doc.project_name, "demo");
        assert_eq!(doc.project_summary, "A demo.");
        let keys: Vec<_> = doc.sections.iter().map(|s| s.key.as_str()).collect();
        assert_eq!(keys, vec![".", "docs/guide", "src"]);

        let src = &doc.sections[2];
        assert_eq!(src.title, "Src");
        let names: Vec<_> = src.entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a.py", "b.py"]);
        assert_eq!(src.entries[0].url, "src/a.py");
        assert_eq!(doc.entry_count(), 4);
    }

    #[test]
    fn test_assemble_uses_base_url() {
        let state = state_with(&["docs/a.md"]);
        let doc = assemble(&state, &layout("https://github.com/o/r/blob/main/"));

        assert_eq!(doc.sections[0].entries[0].url, "https://github.com/o/r/blob/main/docs/a.md");
        assert_eq!(doc.project_summary, MISSING_PROJECT_SUMMARY);
    }

    #[test]
    fn test_assemble_empty_state() {
        let state = AggregationState::new(0, DuplicatePolicy::KeepFirst);
        let doc = assemble(&state, &layout(""));

        assert!(doc.sections.is_empty());
        assert_eq!(doc.entry_count(), 0);
    }

    #[test]
    fn test_remote_url_from_git_config() {
        let https = "[core]\n\tbare = false\n[remote \"origin\"]\n\turl = https://github.com/o/r.git\n\tfetch = +refs/heads/*\n";
        assert_eq!(remote_url_from_git_config(https).as_deref(), Some("https://github.com/o/r"));

        let ssh = "[remote \"origin\"]\n  url = git@github.com:owner/repo.git\n";
        assert_eq!(
            remote_url_from_git_config(ssh).as_deref(),
            Some("https://github.com/owner/repo")
        );

        let other = "[remote \"upstream\"]\n  url = https://example.com/x\n";
        assert_eq!(remote_url_from_git_config(other), None);
    }

    #[test]
    fn test_base_url_for_repo() {
        let temp = assert_fs::TempDir::new().unwrap();
        assert_eq!(base_url_for_repo(temp.path()), "");

        temp.child(".git/config")
            .write_str("[remote \"origin\"]\n\turl = git@gitlab.com:team/proj.git\n")
            .unwrap();
        assert_eq!(base_url_for_repo(temp.path()), "https://gitlab.com/team/proj/blob/main/");
    }

    #[test]
    fn test_repo_name() {
        assert_eq!(repo_name(Path::new("/home/user/my-project")), "my-project");
        assert_eq!(repo_name(Path::new("/")), "repository");
    }
}
