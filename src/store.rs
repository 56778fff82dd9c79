//! Persistent storage for the locally installed version.
//!
//! The version is a single line of text in a `VERSION` file at the app
//! root. Reads never fail the caller: a missing or unreadable file means
//! "nothing installed yet" and yields the zero sentinel. Writes go
//! through the temp-and-rename discipline so a crash mid-write leaves
//! either the old or the new value, never a torn one.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use crate::constants::VERSION_FILE_NAME;
use crate::utils::fs::atomic_write_str;
use crate::version::VersionId;

/// Reads and writes the version artifact under a given app root.
pub struct VersionStore {
    path: PathBuf,
}

impl VersionStore {
    /// Create a store for the `VERSION` file under `app_root`.
    pub fn new(app_root: &Path) -> Self {
        Self {
            path: app_root.join(VERSION_FILE_NAME),
        }
    }

    /// The path of the version artifact.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the persisted version, or the zero sentinel if absent.
    pub fn read(&self) -> VersionId {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => VersionId::parse(content.trim()),
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "No readable version file, using zero sentinel");
                VersionId::zero()
            }
        }
    }

    /// Atomically replace the persisted version.
    pub fn write(&self, version: &VersionId) -> Result<()> {
        atomic_write_str(&self.path, version.as_str())
            .with_context(|| format!("Failed to write version file: {}", self.path.display()))?;
        debug!(version = %version, "Version file updated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_reads_as_zero() {
        let dir = TempDir::new().unwrap();
        let store = VersionStore::new(dir.path());
        assert_eq!(store.read(), VersionId::zero());
    }

    #[test]
    fn write_then_read_round_trips() {
        let dir = TempDir::new().unwrap();
        let store = VersionStore::new(dir.path());
        store.write(&VersionId::parse("v1.1.0")).unwrap();
        assert_eq!(store.read(), VersionId::parse("v1.1.0"));
        // File contains exactly the version string.
        let raw = std::fs::read_to_string(dir.path().join(VERSION_FILE_NAME)).unwrap();
        assert_eq!(raw, "v1.1.0");
    }

    #[test]
    fn surrounding_whitespace_is_tolerated_on_read() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(VERSION_FILE_NAME), "v2.0.0\n").unwrap();
        let store = VersionStore::new(dir.path());
        assert_eq!(store.read(), VersionId::parse("v2.0.0"));
    }
}
