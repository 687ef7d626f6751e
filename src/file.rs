use crate::error::{Error, Result};
use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

static BINARY_EXTENSIONS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "exe", "dll", "so", "dylib", "a", "o", "obj", "png", "jpg", "jpeg", "gif", "bmp", "ico",
        "webp", "mp3", "mp4", "avi", "mkv", "mov", "wav", "flac", "pdf", "doc", "docx", "xls",
        "xlsx", "ppt", "pptx", "zip", "tar", "gz", "bz2", "xz", "7z", "rar", "wasm", "pyc",
        "class",
    ]
    .into_iter()
    .collect()
});

/// A file found during discovery.
///
/// Identity is the relative path; descriptors are never mutated after
/// discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileDescriptor {
    /// Absolute path used for reading
    #[serde(skip)]
    pub path: PathBuf,

    /// Path relative to the repository root, always `/`-separated
    pub relative_path: String,

    /// Size on disk in bytes
    pub size_bytes: u64,
}

impl FileDescriptor {
    /// Creates a new descriptor.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, relative_path: impl Into<String>, size_bytes: u64) -> Self {
        Self {
            path: path.into(),
            relative_path: normalize_separators(&relative_path.into()),
            size_bytes,
        }
    }

    /// Returns the final path component.
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.relative_path
            .rsplit('/')
            .next()
            .unwrap_or(&self.relative_path)
    }
}

/// Provides file content for summarization.
pub trait ContentReader: Send + Sync {
    /// Reads the whole file as UTF-8 text.
    ///
    /// # Errors
    ///
    /// Fails with a permanent error (`Io`, `InvalidUtf8` or `BinaryContent`)
    /// when the file cannot be turned into text.
    fn read(&self, file: &FileDescriptor) -> Result<String>;
}

/// Reads files from the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsReader;

impl ContentReader for FsReader {
    fn read(&self, file: &FileDescriptor) -> Result<String> {
        let path = file.path.as_path();

        if has_binary_extension(path) || is_likely_binary(path)? {
            return Err(Error::binary_content(path));
        }

        std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::InvalidData {
                Error::invalid_utf8(path)
            } else {
                Error::io(path, e)
            }
        })
    }
}

/// Replaces platform separators so relative paths compare and render the
/// same everywhere.
#[must_use]
pub(crate) fn normalize_separators(path: &str) -> String {
    if std::path::MAIN_SEPARATOR == '/' {
        path.to_string()
    } else {
        path.replace(std::path::MAIN_SEPARATOR, "/")
    }
}

/// Determines if a file is likely binary by analyzing its content.
///
/// # Algorithm
///
/// 1. Reads the first 8KB of the file
/// 2. Checks for null bytes (binary indicator)
/// 3. Calculates the ratio of ASCII characters
/// 4. Files with null bytes or low ASCII ratio are considered binary
///
/// # Errors
///
/// Returns an error if the file cannot be opened or read.
pub(crate) fn is_likely_binary(path: &Path) -> Result<bool> {
    const BUFFER_SIZE: usize = 8192;
    const ASCII_THRESHOLD: f64 = 0.85;

    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    let mut reader = BufReader::with_capacity(BUFFER_SIZE, file);
    let mut buffer = [0u8; BUFFER_SIZE];

    let bytes_read = reader.read(&mut buffer).map_err(|e| Error::io(path, e))?;

    if bytes_read == 0 {
        return Ok(false);
    }

    let sample = &buffer[..bytes_read];

    if memchr::memchr(0, sample).is_some() {
        return Ok(true);
    }

    // Valid UTF-8 text with many non-ASCII characters is still text.
    if std::str::from_utf8(sample).is_ok() {
        return Ok(false);
    }

    #[allow(clippy::cast_precision_loss)]
    let ascii_ratio = sample.iter().filter(|&&b| b < 128).count() as f64 / bytes_read as f64;

    Ok(ascii_ratio < ASCII_THRESHOLD)
}

/// Checks if a file extension suggests a binary file.
#[must_use]
pub(crate) fn has_binary_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| BINARY_EXTENSIONS.contains(ext.to_ascii_lowercase().as_str()))
}

/// Returns a human readable language name for a path, based on its extension.
#[must_use]
pub fn language_for_path(path: &str) -> &'static str {
    let Some((_, ext)) = path.rsplit_once('.') else {
        return "Text";
    };

    match ext.to_ascii_lowercase().as_str() {
        "rs" => "Rust",
        "py" | "pyi" => "Python",
        "js" | "mjs" | "cjs" => "JavaScript",
        "ts" => "TypeScript",
        "jsx" => "JSX",
        "tsx" => "TSX",
        "go" => "Go",
        "java" => "Java",
        "kt" | "kts" => "Kotlin",
        "c" | "h" => "C",
        "cpp" | "cc" | "cxx" | "hpp" | "hh" | "hxx" => "C++",
        "cs" => "C#",
        "rb" => "Ruby",
        "php" => "PHP",
        "swift" => "Swift",
        "scala" => "Scala",
        "sh" | "bash" | "zsh" => "Shell",
        "ps1" => "PowerShell",
        "html" | "htm" => "HTML",
        "css" | "scss" | "sass" => "CSS",
        "md" | "markdown" => "Markdown",
        "json" => "JSON",
        "yaml" | "yml" => "YAML",
        "toml" => "TOML",
        "xml" => "XML",
        "sql" => "SQL",
        _ => "Text",
    }
}
