//! Advisory update lock.
//!
//! A marker file in the app root signals "update in progress" to external
//! process supervisors that poll for its existence. It is an ordinary
//! create/delete marker, not a kernel lock, so it stays observable by
//! anything that can stat a file. Creation is best-effort: failing to
//! write the marker is logged but never aborts the run. Release happens
//! unconditionally when the orchestrator exits, success or failure.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::constants::LOCK_FILE_NAME;

/// Handle for the advisory lock marker in the app root.
pub struct UpdateLock {
    path: PathBuf,
}

impl UpdateLock {
    /// Create the marker file under `app_root` (best-effort).
    pub fn acquire(app_root: &Path) -> Self {
        let path = app_root.join(LOCK_FILE_NAME);
        if let Err(e) = std::fs::write(&path, "1") {
            warn!(path = %path.display(), error = %e, "Could not write update lock marker");
        } else {
            debug!(path = %path.display(), "Update lock marker created");
        }
        Self { path }
    }

    /// Whether a lock marker currently exists under `app_root`.
    pub fn exists(app_root: &Path) -> bool {
        app_root.join(LOCK_FILE_NAME).exists()
    }

    /// Remove the marker. Errors are logged, never raised.
    pub fn release(&self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Update lock marker removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Could not remove update lock marker");
            }
        }
    }
}
