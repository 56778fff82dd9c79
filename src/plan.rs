//! The update plan: the contract between the host process and the
//! short-lived orchestrator.
//!
//! The host builds a plan after staging (or downloading) a payload,
//! serializes it to a transient JSON file in the OS temp directory, and
//! spawns the orchestrator with `--plan <file>`. The plan is
//! self-contained (the orchestrator must not need any other
//! process-local state to complete its job) and it is consumed exactly
//! once, then deleted.
//!
//! Wire format (field names are stable):
//! `{app_dir, python_exe, zip | dir, version, exclude[], post_install[], cleanup_dir}`
//! with exactly one of `zip` / `dir` present, selecting archive mode vs.
//! pre-staged-directory mode.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_EXCLUDES, PLAN_FILE_NAME};
use crate::core::UpdaterError;
use crate::utils::fs::atomic_write;

/// A complete, self-contained update job description.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdatePlan {
    /// Root directory of the live installation.
    pub app_dir: PathBuf,

    /// Interpreter used for the dependency step and the relaunch.
    /// When absent both are skipped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub python_exe: Option<PathBuf>,

    /// Local archive to unpack into a fresh staging directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zip: Option<PathBuf>,

    /// Pre-staged payload directory, ready to overlay.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,

    /// Target version string, written to the version file after apply.
    #[serde(default)]
    pub version: String,

    /// Top-level names to skip during backup and overlay.
    /// Empty means "use the built-in defaults".
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Shell commands run in order inside the app root after apply.
    #[serde(default)]
    pub post_install: Vec<String>,

    /// Whether the staging directory must be deleted after use.
    /// Defaults to true for archive mode (the staging dir is ours),
    /// false for pre-staged directories unless the plan says otherwise.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cleanup_dir: Option<bool>,
}

/// The payload source a plan selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanSource<'a> {
    /// A local archive to unpack.
    Archive(&'a Path),
    /// A directory already staged on local disk.
    Staged(&'a Path),
}

impl UpdatePlan {
    /// Which payload source this plan carries.
    ///
    /// Exactly one of `zip` / `dir` must be present; anything else is an
    /// [`UpdaterError::InvalidPlan`].
    pub fn source(&self) -> Result<PlanSource<'_>, UpdaterError> {
        match (&self.zip, &self.dir) {
            (Some(zip), None) => Ok(PlanSource::Archive(zip)),
            (None, Some(dir)) => Ok(PlanSource::Staged(dir)),
            (Some(_), Some(_)) => Err(UpdaterError::InvalidPlan {
                reason: "both 'zip' and 'dir' are present".into(),
            }),
            (None, None) => Err(UpdaterError::InvalidPlan {
                reason: "neither 'zip' nor 'dir' is present".into(),
            }),
        }
    }

    /// Effective exclusion list: the plan's own, or the built-in defaults.
    pub fn effective_exclude(&self) -> Vec<String> {
        if self.exclude.is_empty() {
            DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect()
        } else {
            self.exclude.clone()
        }
    }

    /// Whether the staging directory is ephemeral and must be removed
    /// during cleanup.
    pub fn should_cleanup_staging(&self) -> bool {
        self.cleanup_dir.unwrap_or(self.zip.is_some())
    }

    /// The well-known transient plan path in the OS temp directory.
    pub fn default_path() -> PathBuf {
        std::env::temp_dir().join(PLAN_FILE_NAME)
    }

    /// Serialize the plan to `path` atomically.
    pub fn save(&self, path: &Path) -> Result<()> {
        let body = serde_json::to_vec_pretty(self).context("Failed to serialize update plan")?;
        atomic_write(path, &body)
            .with_context(|| format!("Failed to write update plan: {}", path.display()))
    }

    /// Load a plan from `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let body = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read update plan: {}", path.display()))?;
        let plan: Self = serde_json::from_str(&body)
            .with_context(|| format!("Failed to parse update plan: {}", path.display()))?;
        plan.source()
            .map_err(|e| anyhow::Error::from(e).context("Update plan failed validation"))?;
        Ok(plan)
    }
}
