//! Payload staging: materialize a candidate release on local disk.
//!
//! Two modes, matching the two catalog shapes:
//!
//! - **Archive**: download to a temp file, verify the manifest checksum
//!   when one was declared (a mismatch is fatal and happens before any
//!   mutation), extract into a fresh staging directory. Archives that
//!   wrap their content in a single version-named folder are unwrapped
//!   so the effective staging root holds the payload directly.
//! - **Directory mirror**: recursively walk the remote autoindex tree
//!   and stream every file under a local staging root. Every discovered
//!   name is percent-decoded and reduced to its final path segment
//!   before joining, which is the mandatory defense against traversal via
//!   crafted hrefs. Directories are created eagerly so empty ones
//!   survive.
//!
//! Staging is all-or-nothing: any single failure aborts and removes the
//! partial staging directory; later stages never see one. Mirrored
//! payloads carry no per-file integrity check and are trusted by
//! transport alone. This is a known gap, kept as-is.

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::catalog::{Fetcher, autoindex, join_url};
use crate::core::UpdaterError;
use crate::utils::fs::ensure_dir;
use crate::utils::paths::sanitize_remote_name;

/// Stages release payloads into local directories.
pub struct PayloadStager {
    fetcher: Fetcher,
}

impl PayloadStager {
    pub fn new(fetcher: Fetcher) -> Self {
        Self { fetcher }
    }

    /// Download an archive payload, verifying `sha256` when supplied.
    ///
    /// Returns the path of the downloaded archive inside a persisted
    /// temp directory; the caller owns its cleanup (the orchestrator
    /// removes it unconditionally at exit).
    pub async fn download_archive(&self, url: &str, sha256: Option<&str>) -> Result<PathBuf> {
        let dir = tempfile::Builder::new()
            .prefix("moviebot_upd_")
            .tempdir()
            .context("Failed to create download directory")?
            .keep();
        let archive = dir.join("update.zip");

        let downloaded = async {
            self.fetcher.download(url, &archive).await?;
            if let Some(expected) = sha256 {
                verify_sha256(&archive, expected)?;
            }
            Ok::<_, anyhow::Error>(())
        }
        .await;

        if let Err(e) = downloaded {
            let _ = std::fs::remove_dir_all(&dir);
            return Err(e);
        }
        info!(url, archive = %archive.display(), "Archive downloaded");
        Ok(archive)
    }

    /// Mirror a remote version directory into a fresh staging root.
    pub async fn mirror_tree(&self, version_url: &str) -> Result<PathBuf> {
        let dir = tempfile::Builder::new()
            .prefix("moviebot_upd_")
            .tempdir()
            .context("Failed to create staging directory")?
            .keep();
        let root = dir.join("payload");

        if let Err(e) = self.mirror_into(version_url.to_string(), root.clone()).await {
            // No partial staging directory is ever handed to later stages.
            let _ = std::fs::remove_dir_all(&dir);
            return Err(e.context(format!("Failed to mirror {version_url}")));
        }
        info!(url = version_url, staging = %root.display(), "Remote tree mirrored");
        Ok(root)
    }

    async fn mirror_into(&self, url: String, dst: PathBuf) -> Result<()> {
        // Eager creation keeps empty remote directories in the payload.
        ensure_dir(&dst)?;
        let html = self.fetcher.fetch_text(&url).await?;

        for entry in autoindex::parse_listing(&html) {
            let Some(name) = sanitize_remote_name(&entry.href) else {
                warn!(href = %entry.href, "Skipping href with no safe name");
                continue;
            };
            let item_url = join_url(&url, &entry.href)?;
            if entry.is_dir {
                Box::pin(self.mirror_into(item_url, dst.join(&name))).await?;
            } else {
                self.fetcher.download(&item_url, &dst.join(&name)).await?;
            }
        }
        Ok(())
    }
}

/// Extract a local archive into a fresh staging directory and return the
/// effective staging root.
///
/// If extraction yields exactly one top-level directory, that directory
/// becomes the root; release archives commonly wrap their content in a
/// version-named folder.
pub fn unpack_archive(zip_path: &Path) -> Result<PathBuf> {
    let staging = tempfile::Builder::new()
        .prefix("moviebot_stage_")
        .tempdir()
        .context("Failed to create staging directory")?
        .keep();

    let file = std::fs::File::open(zip_path)
        .with_context(|| format!("Failed to open archive: {}", zip_path.display()))?;
    let mut archive = zip::ZipArchive::new(file)
        .with_context(|| format!("Failed to read archive: {}", zip_path.display()))?;
    archive
        .extract(&staging)
        .with_context(|| format!("Failed to extract archive: {}", zip_path.display()))?;

    let mut children: Vec<PathBuf> = std::fs::read_dir(&staging)
        .context("Failed to list staging directory")?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .collect();

    if children.len() == 1 && children[0].is_dir() {
        let root = children.remove(0);
        debug!(root = %root.display(), "Archive wraps a single top-level directory");
        return Ok(root);
    }
    Ok(staging)
}

/// Hex-encoded sha256 of a file, streamed in 1 MiB chunks.
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open for hashing: {}", path.display()))?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 1024 * 1024];
    loop {
        let n = file
            .read(&mut buf)
            .with_context(|| format!("Failed to read for hashing: {}", path.display()))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Verify a file against an expected hex sha256 (case-insensitive).
///
/// A mismatch is [`UpdaterError::ChecksumMismatch`]: always fatal, and
/// always raised before any mutation of the live installation.
pub fn verify_sha256(path: &Path, expected: &str) -> Result<()> {
    let actual = sha256_file(path)?;
    if !actual.eq_ignore_ascii_case(expected.trim()) {
        return Err(UpdaterError::ChecksumMismatch {
            expected: expected.trim().to_lowercase(),
            actual,
        }
        .into());
    }
    debug!(path = %path.display(), "Checksum verified");
    Ok(())
}
