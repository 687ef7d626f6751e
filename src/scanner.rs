use crate::{
    config::Config,
    error::{Error, Result},
    file::FileDescriptor,
    filter::{FileFilter, FileFilterConfig},
};
use ignore::{DirEntry, WalkBuilder, WalkState};
use std::{
    path::Path,
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicUsize, Ordering},
    },
};
use tracing::{debug, trace, warn};

/// Resolves a repository root into the files to summarize.
pub trait FileCatalog: Send + Sync {
    /// Returns the candidate files under `root`.
    ///
    /// Implementations must be deterministic for a given filesystem snapshot
    /// and must never return the same relative path twice.
    ///
    /// # Errors
    ///
    /// Returns an error if the root itself cannot be walked.
    fn discover(&self, root: &Path) -> Result<Vec<FileDescriptor>>;
}

/// Parallel, gitignore-aware directory walker.
#[derive(Debug, Clone)]
pub struct Scanner {
    file_filter: FileFilter,
    respect_gitignore: bool,
    threads: usize,
}

impl Scanner {
    /// Creates a scanner from explicit filter rules.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a glob pattern is invalid.
    pub fn new(filter_config: &FileFilterConfig, respect_gitignore: bool) -> Result<Self> {
        Ok(Self {
            file_filter: FileFilter::new(filter_config)?,
            respect_gitignore,
            threads: num_cpus::get(),
        })
    }

    /// Creates a scanner from the pipeline configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a glob pattern is invalid.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.file_filter_config, config.respect_gitignore)
    }

    fn descriptor(entry: &DirEntry, root: &Path) -> FileDescriptor {
        let path = entry.path();

        let relative_path = pathdiff::diff_paths(path, root)
            .unwrap_or_else(|| path.to_path_buf())
            .to_string_lossy()
            .to_string();

        let size_bytes = entry.metadata().map(|m| m.len()).unwrap_or(0);

        FileDescriptor::new(path, relative_path, size_bytes)
    }
}

impl FileCatalog for Scanner {
    fn discover(&self, root: &Path) -> Result<Vec<FileDescriptor>> {
        if !root.is_dir() {
            return Err(Error::config(format!(
                "Repository root is not a directory: {}",
                root.display()
            )));
        }

        let files = Arc::new(Mutex::new(Vec::new()));
        let walk_errors = Arc::new(AtomicUsize::new(0));

        debug!("Starting parallel scan of {}", root.display());

        let prune = self.file_filter.clone();
        let walker = WalkBuilder::new(root)
            .git_ignore(self.respect_gitignore)
            .git_global(self.respect_gitignore)
            .git_exclude(self.respect_gitignore)
            .require_git(false)
            .hidden(false)
            .follow_links(false)
            .skip_stdout(true)
            .threads(self.threads)
            .filter_entry(move |entry| {
                let is_dir = entry.file_type().is_some_and(|ft| ft.is_dir());
                !(is_dir
                    && entry.depth() > 0
                    && entry
                        .file_name()
                        .to_str()
                        .is_some_and(|name| prune.is_excluded_dir(name)))
            })
            .build_parallel();

        walker.run(|| {
            let files = Arc::clone(&files);
            let walk_errors = Arc::clone(&walk_errors);
            let file_filter = self.file_filter.clone();

            Box::new(move |result| {
                match result {
                    Ok(entry) if entry.file_type().is_some_and(|ft| ft.is_file()) => {
                        let descriptor = Self::descriptor(&entry, root);

                        if file_filter.should_process(Path::new(&descriptor.relative_path)) {
                            trace!("Discovered {}", descriptor.relative_path);
                            files
                                .lock()
                                .unwrap_or_else(PoisonError::into_inner)
                                .push(descriptor);
                        }
                    }
                    Err(e) => {
                        warn!("Walk error: {}", e);
                        walk_errors.fetch_add(1, Ordering::Relaxed);
                    }
                    _ => {}
                }
                WalkState::Continue
            })
        });

        let mut files = std::mem::take(&mut *files.lock().unwrap_or_else(PoisonError::into_inner));

        let errors = walk_errors.load(Ordering::Relaxed);
        if errors > 0 {
            warn!("Encountered {} errors during scanning (non-fatal)", errors);
        }

        // Sort for deterministic ordering
        files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
        files.dedup_by(|a, b| a.relative_path == b.relative_path);

        debug!("Discovered {} files", files.len());
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;

    fn scan(root: &Path) -> Vec<String> {
        Scanner::new(&FileFilterConfig::default(), true)
            .unwrap()
            .discover(root)
            .unwrap()
            .into_iter()
            .map(|f| f.relative_path)
            .collect()
    }

    #[test]
    fn test_scanner_finds_files_sorted() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("src/tools.py").write_str("def run(): pass").unwrap();
        temp.child("README.md").write_str("# Demo").unwrap();
        temp.child("docs/guide.md").write_str("Guide").unwrap();

        assert_eq!(scan(temp.path()), vec!["README.md", "docs/guide.md", "src/tools.py"]);
    }

    #[test]
    fn test_scanner_applies_filter_rules() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("pkg/__init__.py").write_str("").unwrap();
        temp.child("pkg/core.py").write_str("x = 1").unwrap();
        temp.child("pkg/core.rs").write_str("fn main() {}").unwrap();
        temp.child("node_modules/lib/README.md").write_str("vendored").unwrap();
        temp.child(".github/workflows/README.md").write_str("ci").unwrap();

        assert_eq!(scan(temp.path()), vec!["pkg/core.py"]);
    }

    #[test]
    fn test_scanner_records_sizes() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("a.md").write_str("12345").unwrap();

        let files = Scanner::new(&FileFilterConfig::default(), true)
            .unwrap()
            .discover(temp.path())
            .unwrap();

        assert_eq!(files.len(), 1);
        assert_eq!(files[0].size_bytes, 5);
        assert!(files[0].path.ends_with("a.md"));
    }

    #[test]
    fn test_scanner_respects_gitignore() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child(".gitignore").write_str("ignored.md\n").unwrap();
        temp.child("included.md").write_str("kept").unwrap();
        temp.child("ignored.md").write_str("dropped").unwrap();

        assert_eq!(scan(temp.path()), vec!["included.md"]);

        let all = Scanner::new(&FileFilterConfig::default(), false)
            .unwrap()
            .discover(temp.path())
            .unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn test_scanner_empty_directory_is_not_an_error() {
        let temp = assert_fs::TempDir::new().unwrap();
        assert!(scan(temp.path()).is_empty());
    }

    #[test]
    fn test_scanner_rejects_missing_root() {
        let temp = assert_fs::TempDir::new().unwrap();
        let result = Scanner::new(&FileFilterConfig::default(), true)
            .unwrap()
            .discover(&temp.path().join("missing"));

        assert!(result.unwrap_err().is_config());
    }
}
