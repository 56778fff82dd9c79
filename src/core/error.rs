//! Error handling for the updater.
//!
//! Two layers, following the usual split:
//! 1. [`UpdaterError`]: strongly-typed variants for the failure classes
//!    the orchestrator has to distinguish (network vs. integrity vs.
//!    filesystem vs. command failures).
//! 2. `anyhow::Result` with `.context()` everywhere the caller only needs
//!    to propagate and log.
//!
//! The propagation policy is uneven on purpose:
//! - Discovery-phase errors ([`UpdaterError::Unreachable`],
//!   [`UpdaterError::Malformed`]) degrade to "no update available" at the
//!   host boundary; a background check must never hard-fail the host.
//! - [`UpdaterError::ChecksumMismatch`] is always fatal and always occurs
//!   before any mutation.
//! - [`UpdaterError::UnsafePath`] marks a skipped entry, never a crashed
//!   run; callers log it and continue.

use std::path::PathBuf;

use colored::Colorize;
use thiserror::Error;

/// All typed failure classes of the update pipeline.
#[derive(Error, Debug)]
pub enum UpdaterError {
    /// Network failure after exhausting retries and the cache fallback.
    #[error("update source unreachable: {url}: {reason}")]
    Unreachable {
        /// The URL that could not be fetched.
        url: String,
        /// Underlying transport error, flattened to text.
        reason: String,
    },

    /// The remote content was fetched but could not be interpreted.
    #[error("malformed {what}: {reason}")]
    Malformed {
        /// What was being parsed (e.g. "manifest", "autoindex listing").
        what: String,
        /// Parser diagnostics.
        reason: String,
    },

    /// Downloaded archive does not match the checksum the manifest declared.
    ///
    /// Fatal before any mutation: the plan must not proceed.
    #[error("checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// Hex sha256 from the manifest item.
        expected: String,
        /// Hex sha256 of the downloaded file.
        actual: String,
    },

    /// Disk or permission failure during backup or apply.
    #[error("filesystem error at {path}")]
    Filesystem {
        /// Path the operation was touching.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A dependency-install or post-install command exited non-zero.
    #[error("command failed ({code:?}): {command}")]
    CommandFailed {
        /// The command line as logged.
        command: String,
        /// Exit code, when the process was not killed by a signal.
        code: Option<i32>,
    },

    /// A delete-list entry or remote href tried to escape the app root.
    ///
    /// The offending entry is skipped with a warning; never fatal.
    #[error("unsafe path rejected: {entry}")]
    UnsafePath {
        /// The raw entry as it appeared in the delete-list or listing.
        entry: String,
    },

    /// The update plan file is missing required fields or is inconsistent.
    #[error("invalid update plan: {reason}")]
    InvalidPlan {
        /// What check failed.
        reason: String,
    },
}

impl UpdaterError {
    /// Whether this error should degrade to "no update available" when it
    /// surfaces from a background discovery check.
    pub fn is_discovery_degradable(&self) -> bool {
        matches!(self, Self::Unreachable { .. } | Self::Malformed { .. })
    }
}

/// Print an error chain to stderr the way the CLI reports fatal failures.
///
/// The top-level message is highlighted; each `source()` below it is
/// indented so users can read the chain bottom-up.
pub fn display_error(err: &anyhow::Error) {
    eprintln!("{} {}", "error:".red().bold(), err);
    for cause in err.chain().skip(1) {
        eprintln!("  {} {}", "caused by:".yellow(), cause);
    }
}
