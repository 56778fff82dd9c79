//! Pre-mutation snapshots of the live installation.
//!
//! Before any file is touched, the app root (minus excluded top-level
//! paths and their subtrees) is written into a single deflated zip under
//! `backups/`, named with a UTC timestamp so archives sort temporally
//! and never collide. The archive is finished and synced to disk before
//! this function returns; the orchestrator only proceeds to the overlay
//! once that has happened. If the backup fails, the run aborts with the
//! installation untouched.
//!
//! Backups are never auto-deleted here; retention is an external
//! concern. Restoration is a documented manual operation.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{debug, info};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;

use crate::constants::BACKUPS_DIR_NAME;
use crate::utils::fs::ensure_dir;

/// Snapshot `app_root` into a timestamped archive under its backups
/// directory, skipping excluded top-level names and everything beneath
/// them. Returns the path of the finished archive.
pub fn create_backup(app_root: &Path, exclude: &[String]) -> Result<PathBuf> {
    let backups_dir = app_root.join(BACKUPS_DIR_NAME);
    ensure_dir(&backups_dir)?;

    let stamp = Utc::now().format("%Y%m%d_%H%M%S");
    let archive_path = backups_dir.join(format!("backup_{stamp}.zip"));

    let file = std::fs::File::create(&archive_path)
        .with_context(|| format!("Failed to create backup archive: {}", archive_path.display()))?;
    let mut writer = zip::ZipWriter::new(file);
    let options = SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);

    let walker = WalkDir::new(app_root)
        .min_depth(1)
        .into_iter()
        .filter_entry(|entry| {
            if entry.depth() == 1 {
                let name = entry.file_name().to_string_lossy();
                // Never capture the backups directory itself.
                name != BACKUPS_DIR_NAME && !exclude.iter().any(|x| x.as_str() == name)
            } else {
                true
            }
        });

    for entry in walker {
        let entry = entry.context("Failed to walk app root for backup")?;
        let rel = entry
            .path()
            .strip_prefix(app_root)
            .expect("walkdir yields paths under its root");
        let rel_name = rel.to_string_lossy().replace('\\', "/");

        if entry.file_type().is_dir() {
            writer
                .add_directory(rel_name, options)
                .context("Failed to add directory to backup")?;
        } else if entry.file_type().is_file() {
            writer
                .start_file(rel_name, options)
                .context("Failed to start backup entry")?;
            let mut src = std::fs::File::open(entry.path())
                .with_context(|| format!("Failed to read for backup: {}", entry.path().display()))?;
            std::io::copy(&mut src, &mut writer)
                .with_context(|| format!("Failed to archive: {}", entry.path().display()))?;
        } else {
            debug!(path = %entry.path().display(), "Skipping non-regular file in backup");
        }
    }

    let mut file = writer.finish().context("Failed to finish backup archive")?;
    file.flush().context("Failed to flush backup archive")?;
    file.sync_all().context("Failed to sync backup archive to disk")?;

    info!(backup = %archive_path.display(), "Backup created");
    Ok(archive_path)
}

/// The newest backup archive under `app_root`, by file name.
///
/// Timestamped names sort temporally, so the lexical maximum is the most
/// recent. Used to point at the restore candidate in failure logs.
pub fn latest_backup(app_root: &Path) -> Option<PathBuf> {
    let dir = app_root.join(BACKUPS_DIR_NAME);
    let mut newest: Option<PathBuf> = None;
    for entry in std::fs::read_dir(dir).ok()?.flatten() {
        let path = entry.path();
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with("backup_") && name.ends_with(".zip") {
            match &newest {
                Some(current)
                    if current.file_name().unwrap_or_default().to_string_lossy().as_ref()
                        >= name.as_ref() => {}
                _ => newest = Some(path),
            }
        }
    }
    newest
}
