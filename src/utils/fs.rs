//! Atomic file write operations using the temp-and-rename strategy.
//!
//! The version artifact and the plan file are the only mutable pieces of
//! shared state between host and orchestrator; both must never be
//! observable half-written. A crash mid-write leaves either the old or
//! the new value, never a corrupt one.

use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};

/// Create a directory and all its parents if missing.
pub fn ensure_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path)
        .with_context(|| format!("Failed to create directory: {}", path.display()))
}

/// Atomically write bytes to a file.
///
/// Writes to a `.tmp` sibling, syncs it to disk, then renames over the
/// target. Parent directories are created as needed.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        ensure_dir(parent)?;
    }

    let temp_path = path.with_extension("tmp");
    {
        let mut file = fs::File::create(&temp_path)
            .with_context(|| format!("Failed to create temp file: {}", temp_path.display()))?;
        file.write_all(content)
            .with_context(|| format!("Failed to write temp file: {}", temp_path.display()))?;
        file.sync_all().context("Failed to sync temp file to disk")?;
    }

    fs::rename(&temp_path, path).with_context(|| {
        format!(
            "Failed to rename {} -> {}",
            temp_path.display(),
            path.display()
        )
    })
}

/// Atomically write a string to a file.
pub fn atomic_write_str(path: &Path, content: &str) -> Result<()> {
    atomic_write(path, content.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn writes_and_replaces() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("VERSION");

        atomic_write_str(&target, "v1.0.0").unwrap();
        assert_eq!(fs::read_to_string(&target).unwrap(), "v1.0.0");

        atomic_write_str(&target, "v1.1.0").unwrap();
        assert_eq!(fs::read_to_string(&target).unwrap(), "v1.1.0");
    }

    #[test]
    fn no_temp_file_left_behind() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("VERSION");
        atomic_write_str(&target, "v2").unwrap();
        assert!(!dir.path().join("VERSION.tmp").exists());
    }

    #[test]
    fn creates_missing_parents() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("a/b/c.txt");
        atomic_write_str(&target, "x").unwrap();
        assert_eq!(fs::read_to_string(&target).unwrap(), "x");
    }
}
