use crate::{
    config::Config,
    error::{Error, Result},
};
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};
use tracing::{debug, info};

/// Writes the rendered index with atomic operations.
pub(crate) struct Writer {
    output_path: PathBuf,
    backup_existing: bool,
}

impl Writer {
    /// Creates a new writer from configuration.
    pub(crate) fn new(config: &Config) -> Self {
        Self {
            output_path: config.output_path.clone(),
            backup_existing: config.backup_existing,
        }
    }

    /// Writes the rendered document, replacing any previous output.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory cannot be created or a file
    /// operation fails.
    pub(crate) fn write_document(&self, content: &str) -> Result<PathBuf> {
        if let Some(parent) = self.output_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
            }
        }

        self.write_file_atomic(&self.output_path, content)?;

        info!(
            "Wrote {} bytes to {}",
            content.len(),
            self.output_path.display()
        );
        Ok(self.output_path.clone())
    }

    /// Writes a file atomically with optional backup.
    ///
    /// # Process
    ///
    /// 1. Creates backup if file exists and backup is enabled
    /// 2. Writes content to temporary file
    /// 3. Syncs temporary file to disk
    /// 4. Atomically renames temporary file to target path
    fn write_file_atomic(&self, path: &Path, content: &str) -> Result<()> {
        if path.exists() && self.backup_existing {
            Self::backup_file(path)?;
        }

        let temp_path = path.with_extension("tmp");

        Self::write_and_rename(&temp_path, path, content).inspect_err(|_| {
            if temp_path.exists() {
                let _ = fs::remove_file(&temp_path);
                debug!("Removed temporary file {}", temp_path.display());
            }
        })
    }

    fn write_and_rename(temp_path: &Path, path: &Path, content: &str) -> Result<()> {
        let mut temp_file = fs::File::create(temp_path).map_err(|e| Error::io(temp_path, e))?;

        temp_file
            .write_all(content.as_bytes())
            .map_err(|e| Error::io(temp_path, e))?;

        temp_file
            .sync_all()
            .map_err(|e| Error::io(temp_path, e))?;

        drop(temp_file);

        fs::rename(temp_path, path).map_err(|e| Error::io(path, e))
    }

    /// Creates a timestamped backup of an existing file.
    fn backup_file(path: &Path) -> Result<PathBuf> {
        let timestamp = chrono::Local::now().format("%Y%m%d-%H%M%S%.3f");

        let filename = path
            .file_name()
            .ok_or_else(|| Error::config("Invalid output path"))?
            .to_string_lossy();

        let backup_path = path.with_file_name(format!("{filename}.backup.{timestamp}"));

        fs::copy(path, &backup_path).map_err(|e| Error::io(&backup_path, e))?;

        debug!("Created backup: {}", backup_path.display());
        Ok(backup_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;

    fn writer(temp: &assert_fs::TempDir, output: &Path, backup: bool) -> Writer {
        let config = Config::builder()
            .root_dir(temp.path())
            .output_path(output)
            .backup_existing(backup)
            .build()
            .unwrap();
        Writer::new(&config)
    }

    #[test]
    fn test_writer_creates_parent_directories() {
        let temp = assert_fs::TempDir::new().unwrap();
        let output = temp.child("nested/out/llms.txt");

        let path = writer(&temp, output.path(), false)
            .write_document("# demo\n")
            .unwrap();

        assert_eq!(path, output.path());
        output.assert("# demo\n");
        assert!(!temp.child("nested/out/llms.tmp").exists());
    }

    #[test]
    fn test_writer_replaces_existing_output() {
        let temp = assert_fs::TempDir::new().unwrap();
        let output = temp.child("llms.txt");
        output.write_str("old content").unwrap();

        writer(&temp, output.path(), false)
            .write_document("new content")
            .unwrap();

        output.assert("new content");
        let entries: Vec<_> = fs::read_dir(temp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert!(!entries.iter().any(|name| name.contains(".backup.")));
    }

    #[test]
    fn test_failed_rename_leaves_no_temp_file() {
        let temp = assert_fs::TempDir::new().unwrap();
        let output = temp.child("out/llms.txt");
        output.create_dir_all().unwrap();

        let err = writer(&temp, output.path(), false)
            .write_document("# demo\n")
            .unwrap_err();

        assert!(err.is_io());
        assert!(!temp.child("out/llms.tmp").exists());
        assert!(output.path().is_dir());
    }

    #[test]
    fn test_writer_creates_backup() {
        let temp = assert_fs::TempDir::new().unwrap();
        let output = temp.child("llms.txt");
        output.write_str("old content").unwrap();

        writer(&temp, output.path(), true)
            .write_document("new content")
            .unwrap();

        let backups: Vec<_> = fs::read_dir(temp.path())
            .unwrap()
            .map(|e| e.unwrap().path())
            .filter(|p| p.to_string_lossy().contains("llms.txt.backup."))
            .collect();

        assert_eq!(backups.len(), 1);
        assert_eq!(fs::read_to_string(&backups[0]).unwrap(), "old content");
        output.assert("new content");
    }
}
