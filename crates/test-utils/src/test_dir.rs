//! Temporary directories for snapshot files.

// Test utilities are expected to panic on failure
#![allow(clippy::expect_used)]

use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// A temporary directory removed on drop.
///
/// # Example
///
/// ```
/// use user_migration_test_utils::TestDir;
///
/// let dir = TestDir::new();
/// let snapshot = dir.snapshot_path();
/// assert!(snapshot.ends_with("users.json"));
/// ```
pub struct TestDir {
    inner: TempDir,
}

impl TestDir {
    /// Creates a new temporary directory.
    ///
    /// # Panics
    ///
    /// Panics if the directory cannot be created.
    #[must_use]
    pub fn new() -> Self {
        let inner = TempDir::new().expect("failed to create temp directory");
        Self { inner }
    }

    /// Returns the directory path.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.inner.path()
    }

    /// Joins a relative path onto the directory.
    #[must_use]
    pub fn join<P: AsRef<Path>>(&self, path: P) -> PathBuf {
        self.inner.path().join(path)
    }

    /// Path of a snapshot file inside the directory. The file is not created.
    #[must_use]
    pub fn snapshot_path(&self) -> PathBuf {
        self.join("users.json")
    }

    /// Writes a file under the directory, creating parents as needed.
    ///
    /// # Panics
    ///
    /// Panics if the file cannot be written.
    pub fn write_file<P: AsRef<Path>>(&self, path: P, contents: &str) -> PathBuf {
        let path = self.join(path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create parent directories");
        }
        std::fs::write(&path, contents).expect("write file");
        path
    }
}

impl Default for TestDir {
    fn default() -> Self {
        Self::new()
    }
}
