use crate::{
    config::Config,
    error::{Error, Result},
    file::FileDescriptor,
};
use serde::Serialize;
use tracing::debug;

/// An ordered, bounded group of files processed as one unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Batch {
    /// Sequential batch index (0-based)
    pub index: usize,

    /// Files in this batch, in discovery order
    pub files: Vec<FileDescriptor>,
}

impl Batch {
    /// Creates a new batch.
    #[must_use]
    pub const fn new(index: usize, files: Vec<FileDescriptor>) -> Self {
        Self { index, files }
    }

    /// Returns the number of files in this batch.
    #[must_use]
    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Returns true if this batch is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Returns the cumulative size of the batch in bytes.
    #[must_use]
    pub fn total_bytes(&self) -> u64 {
        self.files.iter().map(|f| f.size_bytes).sum()
    }
}

/// Limits applied when partitioning files into batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPolicy {
    /// Maximum number of files per batch
    pub max_files: usize,

    /// Optional cap on the cumulative size of a batch
    pub max_bytes: Option<u64>,
}

impl BatchPolicy {
    /// Creates a count-only policy.
    #[must_use]
    pub const fn new(max_files: usize) -> Self {
        Self {
            max_files,
            max_bytes: None,
        }
    }

    /// Adds a cumulative byte cap.
    #[must_use]
    pub const fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = Some(max_bytes);
        self
    }

    /// Builds the policy from configuration.
    #[must_use]
    pub const fn from_config(config: &Config) -> Self {
        Self {
            max_files: config.batch_size,
            max_bytes: config.max_batch_bytes,
        }
    }

    /// Validates the policy.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a limit is zero.
    pub fn validate(&self) -> Result<()> {
        if self.max_files == 0 {
            return Err(Error::config("batch_size must be greater than 0"));
        }

        if self.max_bytes == Some(0) {
            return Err(Error::config("max_batch_bytes must be greater than 0"));
        }

        Ok(())
    }
}

/// Splits files into ordered batches.
///
/// # Algorithm
///
/// Greedy, order preserving: files are appended to the current batch until it
/// holds `max_files` files, or until the next file would push it past
/// `max_bytes`. A single file larger than `max_bytes` gets a batch of its own
/// rather than being dropped.
///
/// Without a byte cap this is plain fixed-size chunking, so batch `i` holds
/// files `[i * max_files, (i + 1) * max_files)`.
///
/// # Errors
///
/// Returns a configuration error if the policy is invalid.
pub fn partition(files: Vec<FileDescriptor>, policy: &BatchPolicy) -> Result<Vec<Batch>> {
    policy.validate()?;

    if files.is_empty() {
        return Ok(Vec::new());
    }

    let total_files = files.len();
    let mut batches = Vec::with_capacity(total_files.div_ceil(policy.max_files));
    let mut builder = BatchBuilder::new(0, policy);

    for file in files {
        if !builder.can_fit(&file) {
            let next = BatchBuilder::new(batches.len() + 1, policy);
            if let Some(batch) = std::mem::replace(&mut builder, next).build() {
                batches.push(batch);
            }
        }
        builder.add_file(file);
    }

    if let Some(batch) = builder.build() {
        batches.push(batch);
    }

    debug!(
        "Partitioned {} files into {} batches (max {} files{})",
        total_files,
        batches.len(),
        policy.max_files,
        policy
            .max_bytes
            .map(|b| format!(", {b} bytes"))
            .unwrap_or_default()
    );

    Ok(batches)
}

/// Builder for constructing batches incrementally.
struct BatchBuilder<'a> {
    index: usize,
    files: Vec<FileDescriptor>,
    current_bytes: u64,
    policy: &'a BatchPolicy,
}

impl<'a> BatchBuilder<'a> {
    fn new(index: usize, policy: &'a BatchPolicy) -> Self {
        Self {
            index,
            files: Vec::with_capacity(policy.max_files.min(1024)),
            current_bytes: 0,
            policy,
        }
    }

    /// Checks if a file can join the current batch.
    fn can_fit(&self, file: &FileDescriptor) -> bool {
        if self.files.is_empty() {
            return true;
        }

        if self.files.len() >= self.policy.max_files {
            return false;
        }

        self.policy
            .max_bytes
            .is_none_or(|max| self.current_bytes.saturating_add(file.size_bytes) <= max)
    }

    fn add_file(&mut self, file: FileDescriptor) {
        self.current_bytes = self.current_bytes.saturating_add(file.size_bytes);
        self.files.push(file);
    }

    /// Builds the final batch if not empty.
    fn build(self) -> Option<Batch> {
        if self.files.is_empty() {
            None
        } else {
            Some(Batch::new(self.index, self.files))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn files(sizes: &[u64]) -> Vec<FileDescriptor> {
        sizes
            .iter()
            .enumerate()
            .map(|(i, size)| {
                let name = format!("file{i}.md");
                FileDescriptor::new(format!("/repo/{name}"), name, *size)
            })
            .collect()
    }

    fn paths(batches: &[Batch]) -> Vec<String> {
        batches
            .iter()
            .flat_map(|b| b.files.iter().map(|f| f.relative_path.clone()))
            .collect()
    }

    #[test]
    fn test_partition_sizes() {
        let batches = partition(files(&[1, 1, 1, 1, 1]), &BatchPolicy::new(2)).unwrap();

        let sizes: Vec<_> = batches.iter().map(Batch::file_count).collect();
        assert_eq!(sizes, vec![2, 2, 1]);

        let indices: Vec<_> = batches.iter().map(|b| b.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn test_partition_is_complete_and_ordered() {
        let input = files(&[3; 23]);
        let expected: Vec<_> = input.iter().map(|f| f.relative_path.clone()).collect();

        for max_files in 1..=25 {
            let batches = partition(input.clone(), &BatchPolicy::new(max_files)).unwrap();

            assert_eq!(paths(&batches), expected);
            assert_eq!(batches.len(), input.len().div_ceil(max_files));
            assert!(
                batches[..batches.len() - 1]
                    .iter()
                    .all(|b| b.file_count() == max_files)
            );
        }
    }

    #[test]
    fn test_partition_empty_input() {
        let batches = partition(Vec::new(), &BatchPolicy::new(10)).unwrap();
        assert!(batches.is_empty());
    }

    #[test]
    fn test_partition_batch_larger_than_input() {
        let batches = partition(files(&[1, 1, 1]), &BatchPolicy::new(100)).unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].file_count(), 3);
    }

    #[test]
    fn test_partition_rejects_zero_batch_size() {
        let err = partition(files(&[1]), &BatchPolicy::new(0)).unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_partition_rejects_zero_byte_cap() {
        let policy = BatchPolicy::new(2).with_max_bytes(0);
        assert!(partition(files(&[1]), &policy).unwrap_err().is_config());
    }

    #[test]
    fn test_partition_respects_byte_cap() {
        let policy = BatchPolicy::new(10).with_max_bytes(100);
        let batches = partition(files(&[60, 30, 20, 150, 10]), &policy).unwrap();

        let sizes: Vec<_> = batches.iter().map(Batch::file_count).collect();
        assert_eq!(sizes, vec![2, 1, 1, 1]);
        assert_eq!(batches[2].total_bytes(), 150);
        assert_eq!(paths(&batches).len(), 5);
    }
}
