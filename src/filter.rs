//! Include/exclude rules applied during discovery.
//!
//! Directory names are pruned before descending, file names are checked
//! against excluded prefixes and included extensions, and optional glob
//! patterns can exclude anything by relative path.

use crate::error::{Error, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::Path;

/// Directories never descended into by default.
pub const DEFAULT_EXCLUDED_DIRS: &[&str] = &[
    ".git",
    ".github",
    "overrides",
    ".venv",
    "node_modules",
    "__pycache__",
    ".pytest_cache",
];

/// File name prefixes skipped by default.
pub const DEFAULT_EXCLUDED_FILE_PREFIXES: &[&str] = &["__init__"];

/// File name suffixes summarized by default.
pub const DEFAULT_INCLUDED_EXTENSIONS: &[&str] = &[".md", ".py"];

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(ToString::to_string).collect()
}

/// Configuration for file filtering during discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFilterConfig {
    /// Directory names pruned wherever they appear
    pub excluded_dirs: Vec<String>,

    /// File names starting with any of these are skipped
    pub excluded_file_prefixes: Vec<String>,

    /// File names must end with one of these (empty means any file)
    pub included_extensions: Vec<String>,

    /// Glob patterns matched against the relative path
    pub exclude_globs: Vec<String>,
}

impl Default for FileFilterConfig {
    fn default() -> Self {
        Self {
            excluded_dirs: to_strings(DEFAULT_EXCLUDED_DIRS),
            excluded_file_prefixes: to_strings(DEFAULT_EXCLUDED_FILE_PREFIXES),
            included_extensions: to_strings(DEFAULT_INCLUDED_EXTENSIONS),
            exclude_globs: Vec::new(),
        }
    }
}

impl FileFilterConfig {
    /// Creates a configuration with the default rules.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the excluded directory names.
    #[must_use]
    pub fn excluded_dirs(mut self, dirs: Vec<String>) -> Self {
        self.excluded_dirs = dirs;
        self
    }

    /// Replaces the excluded file name prefixes.
    #[must_use]
    pub fn excluded_file_prefixes(mut self, prefixes: Vec<String>) -> Self {
        self.excluded_file_prefixes = prefixes;
        self
    }

    /// Replaces the included extensions. A missing leading dot is added.
    #[must_use]
    pub fn included_extensions(mut self, extensions: Vec<String>) -> Self {
        self.included_extensions = extensions
            .into_iter()
            .map(|ext| {
                if ext.is_empty() || ext.starts_with('.') {
                    ext
                } else {
                    format!(".{ext}")
                }
            })
            .collect();
        self
    }

    /// Replaces the exclusion globs.
    #[must_use]
    pub fn exclude_globs(mut self, globs: Vec<String>) -> Self {
        self.exclude_globs = globs;
        self
    }
}

/// Compiled form of [`FileFilterConfig`].
#[derive(Debug, Clone)]
pub(crate) struct FileFilter {
    excluded_dirs: Vec<String>,
    excluded_file_prefixes: Vec<String>,
    included_extensions: Vec<String>,
    exclude_globs: GlobSet,
}

impl FileFilter {
    /// Compiles the configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a glob pattern is invalid.
    pub(crate) fn new(config: &FileFilterConfig) -> Result<Self> {
        Ok(Self {
            excluded_dirs: non_empty(&config.excluded_dirs),
            excluded_file_prefixes: non_empty(&config.excluded_file_prefixes),
            included_extensions: non_empty(&config.included_extensions),
            exclude_globs: Self::build_globset(&config.exclude_globs)?,
        })
    }

    fn build_globset(patterns: &[String]) -> Result<GlobSet> {
        let mut builder = GlobSetBuilder::new();

        for pattern in patterns {
            let glob = Glob::new(pattern).map_err(|e| {
                Error::config(format!("Invalid glob pattern '{pattern}': {e}"))
            })?;
            builder.add(glob);
        }

        builder
            .build()
            .map_err(|e| Error::config(format!("Failed to build glob set: {e}")))
    }

    /// Returns true if a directory with this name must not be descended into.
    pub(crate) fn is_excluded_dir(&self, name: &str) -> bool {
        self.excluded_dirs.iter().any(|dir| dir == name)
    }

    /// Decides whether a file (given relative to the root) is summarized.
    pub(crate) fn should_process(&self, relative_path: &Path) -> bool {
        let Some(name) = relative_path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };

        // Ancestors are checked too so the filter stands on its own when the
        // walker did not prune.
        let in_excluded_dir = relative_path
            .parent()
            .into_iter()
            .flat_map(Path::components)
            .filter_map(|c| c.as_os_str().to_str())
            .any(|component| self.is_excluded_dir(component));
        if in_excluded_dir {
            return false;
        }

        if self
            .excluded_file_prefixes
            .iter()
            .any(|prefix| name.starts_with(prefix.as_str()))
        {
            return false;
        }

        if !self.included_extensions.is_empty()
            && !self
                .included_extensions
                .iter()
                .any(|ext| name.ends_with(ext.as_str()))
        {
            return false;
        }

        !self.exclude_globs.is_match(relative_path)
    }
}

fn non_empty(values: &[String]) -> Vec<String> {
    values
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(ToString::to_string)
        .collect()
}
