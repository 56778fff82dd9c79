//! Global constants used throughout the updater codebase.
//!
//! Fixed file names, environment variables, timeouts and retry parameters
//! are defined centrally so the on-disk and wire contracts stay in one
//! place and magic numbers remain discoverable.

use std::time::Duration;

/// Name of the single-line version artifact in the app root.
pub const VERSION_FILE_NAME: &str = "VERSION";

/// Name of the delete-list file at the staged payload root.
///
/// One relative path per line; `#` comments and blank lines are ignored.
pub const DELETE_LIST_NAME: &str = "delete";

/// Advisory lock marker created in the app root while an update runs.
///
/// External supervisors poll for its presence; it is an ordinary file,
/// not a kernel-level lock.
pub const LOCK_FILE_NAME: &str = ".updating.lock";

/// Directory under the app root where backup archives are written.
pub const BACKUPS_DIR_NAME: &str = "backups";

/// Directory under the app root where the orchestrator log is written.
pub const LOGS_DIR_NAME: &str = "logs";

/// File name of the persistent orchestrator log inside [`LOGS_DIR_NAME`].
pub const UPDATER_LOG_NAME: &str = "updater.log";

/// Dependency spec the staged payload may carry; triggers the pip step.
pub const REQUIREMENTS_FILE_NAME: &str = "requirements.txt";

/// Application entry point relaunched after a successful update.
pub const APP_ENTRY_NAME: &str = "main.py";

/// Transient plan file name placed in the OS temp directory.
pub const PLAN_FILE_NAME: &str = "moviebot_update_plan.json";

/// Optional release-notes file inside an autoindex version directory.
pub const INFO_FILE_NAME: &str = "info.txt";

/// Last known-good catalog response, persisted in the app root.
pub const CATALOG_CACHE_FILE_NAME: &str = ".catalog_cache.json";

/// How long a cached catalog response may stand in for an unreachable
/// source (6 hours).
pub const CATALOG_CACHE_TTL: Duration = Duration::from_secs(6 * 60 * 60);

/// Top-level paths never captured by backups or touched by overlay
/// unless the plan overrides them: secrets, the virtualenv, user data,
/// local databases and our own log/backup directories.
pub const DEFAULT_EXCLUDES: &[&str] = &[
    ".env",
    "venv",
    "data",
    "posters",
    "logs",
    "backups",
    "films.db",
    "users.db",
];

/// Environment variable selecting the remote catalog source.
pub const ENV_SOURCE_URL: &str = "UPDATE_SOURCE_URL";

/// Environment toggle for automatic update checks (default on).
pub const ENV_AUTO_UPDATE: &str = "AUTO_UPDATE";

/// Environment toggle for spawning a fresh app instance after apply
/// (default on; set to `0` under an external supervisor).
pub const ENV_SPAWN: &str = "UPDATER_SPAWN";

/// Timeout for small metadata fetches (manifest, listings, info.txt).
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(15);

/// Timeout for payload downloads (archives and mirrored files).
pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60);

/// Starting delay for network retry backoff (200ms, doubling).
pub const RETRY_BASE_DELAY_MS: u64 = 200;

/// Total fetch attempts before declaring a source unreachable.
pub const RETRY_ATTEMPTS: usize = 3;
