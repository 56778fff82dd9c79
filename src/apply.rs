//! Applying a staged payload to the live installation.
//!
//! Two separate phases, so payloads that only add or
//! update files can never destroy anything by accident:
//!
//! 1. [`overlay`] copies staged entries on top of the app root without
//!    deleting anything it does not replace.
//! 2. [`apply_delete_list`] removes only the paths explicitly listed in
//!    the payload's `delete` file, each one validated against the app
//!    root boundary.
//!
//! The overlay favors "mostly updated" over "stuck": individual copy
//! failures are logged and skipped, while error classes that threaten
//! overall consistency (disk full, read-only filesystem) abort the run.

use std::io::ErrorKind;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::constants::DELETE_LIST_NAME;
use crate::core::UpdaterError;
use crate::utils::paths::resolve_within;

/// Copy the staging tree over the app root.
///
/// Per level, entries whose name is in `exclude` are skipped along with
/// everything beneath them. Type conflicts are resolved in favor of the
/// payload: a staged file replaces a same-named destination directory
/// and vice versa. The currently executing orchestrator binary is never
/// overwritten while it is the active process.
pub fn overlay(staging: &Path, app_root: &Path, exclude: &[String]) -> Result<()> {
    let current_exe = std::env::current_exe()
        .ok()
        .and_then(|p| p.canonicalize().ok());
    overlay_dir(staging, app_root, exclude, current_exe.as_deref())?;
    info!(staging = %staging.display(), app_root = %app_root.display(), "Overlay complete");
    Ok(())
}

fn overlay_dir(
    src: &Path,
    dst: &Path,
    exclude: &[String],
    current_exe: Option<&Path>,
) -> Result<()> {
    let entries = std::fs::read_dir(src)
        .with_context(|| format!("Failed to list staging directory: {}", src.display()))?;

    for entry in entries {
        let entry = entry.with_context(|| format!("Failed to read entry in {}", src.display()))?;
        let name = entry.file_name();
        if exclude.iter().any(|x| x.as_str() == name.to_string_lossy()) {
            debug!(name = %name.to_string_lossy(), "Overlay skipping excluded entry");
            continue;
        }

        let src_path = entry.path();
        let dst_path = dst.join(&name);

        // Never replace the running orchestrator from under itself.
        if let Some(exe) = current_exe
            && dst_path.canonicalize().is_ok_and(|p| p == exe)
        {
            debug!(path = %dst_path.display(), "Overlay skipping the running updater binary");
            continue;
        }

        let file_type = entry
            .file_type()
            .with_context(|| format!("Failed to stat {}", src_path.display()))?;

        if file_type.is_dir() {
            if dst_path.exists() && !dst_path.is_dir() {
                remove_checked(&dst_path, false)?;
            }
            std::fs::create_dir_all(&dst_path)
                .map_err(|e| filesystem_error(&dst_path, e))?;
            overlay_dir(&src_path, &dst_path, exclude, current_exe)?;
        } else {
            if dst_path.is_dir() {
                remove_checked(&dst_path, true)?;
            }
            if let Some(parent) = dst_path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| filesystem_error(parent, e))?;
            }
            if let Err(e) = std::fs::copy(&src_path, &dst_path) {
                if is_fatal_fs_error(&e) {
                    return Err(filesystem_error(&dst_path, e).into());
                }
                // Best-effort: a single locked or unreadable file must
                // not leave the deployment stuck half-way.
                warn!(src = %src_path.display(), dst = %dst_path.display(), error = %e,
                      "Overlay could not replace file; continuing");
            }
        }
    }
    Ok(())
}

/// Process the payload's delete-list, removing obsolete paths.
///
/// Missing list file: nothing to do. Per entry: blank lines and `#`
/// comments are ignored, separators are normalized, absolute paths and
/// paths resolving outside the app root are rejected with a warning
/// (never a hard failure), missing targets are logged and skipped.
pub fn apply_delete_list(app_root: &Path, staging: &Path) -> Result<()> {
    let list_path = staging.join(DELETE_LIST_NAME);
    let raw = match std::fs::read(&list_path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(e) => {
            warn!(path = %list_path.display(), error = %e, "Cannot read delete list");
            return Ok(());
        }
    };
    // Payloads have shipped this file in odd encodings; take what we can.
    let text = String::from_utf8_lossy(&raw);

    for line in text.lines() {
        let entry = line.trim();
        if entry.is_empty() || entry.starts_with('#') {
            continue;
        }

        let target = match resolve_within(app_root, entry) {
            Ok(target) => target,
            Err(UpdaterError::UnsafePath { .. }) => {
                warn!(entry, "Skipping unsafe delete-list entry");
                continue;
            }
            Err(e) => {
                warn!(entry, error = %e, "Skipping delete-list entry");
                continue;
            }
        };

        match std::fs::symlink_metadata(&target) {
            Ok(meta) => {
                let result = if meta.is_dir() {
                    std::fs::remove_dir_all(&target)
                } else {
                    // Files and symlinks alike; a symlinked directory is
                    // unlinked, not traversed.
                    std::fs::remove_file(&target)
                };
                match result {
                    Ok(()) => info!(target = %target.display(), "Deleted"),
                    Err(e) => {
                        warn!(target = %target.display(), error = %e, "Failed to delete")
                    }
                }
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(target = %target.display(), "Delete target not found, skipping");
            }
            Err(e) => warn!(target = %target.display(), error = %e, "Cannot stat delete target"),
        }
    }
    Ok(())
}

fn remove_checked(path: &Path, is_dir: bool) -> Result<()> {
    let result = if is_dir {
        std::fs::remove_dir_all(path)
    } else {
        std::fs::remove_file(path)
    };
    result.map_err(|e| filesystem_error(path, e).into())
}

fn filesystem_error(path: &Path, source: std::io::Error) -> UpdaterError {
    UpdaterError::Filesystem {
        path: path.to_path_buf(),
        source,
    }
}

fn is_fatal_fs_error(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        ErrorKind::StorageFull | ErrorKind::QuotaExceeded | ErrorKind::ReadOnlyFilesystem
    )
}
