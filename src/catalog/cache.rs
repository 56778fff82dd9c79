//! Last known-good catalog responses.
//!
//! A background check should prefer staleness over noisy failure: when
//! the live fetch exhausts its retries, the most recent successful
//! response can stand in for it, but only within a bounded TTL. The
//! cache is a single JSON file next to the version artifact; writes are
//! best-effort and never fail a check.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::CATALOG_CACHE_FILE_NAME;
use crate::utils::fs::atomic_write;

/// One cached response body with its provenance.
#[derive(Debug, Serialize, Deserialize)]
struct CachedResponse {
    source_url: String,
    fetched_at: DateTime<Utc>,
    body: String,
}

/// File-backed cache of the last successful catalog fetch.
pub struct CatalogCache {
    path: PathBuf,
}

impl CatalogCache {
    /// Cache stored under `app_root`.
    pub fn new(app_root: &Path) -> Self {
        Self {
            path: app_root.join(CATALOG_CACHE_FILE_NAME),
        }
    }

    /// Store a fresh response. Failures are logged and swallowed.
    pub fn store(&self, source_url: &str, body: &str) {
        let record = CachedResponse {
            source_url: source_url.to_string(),
            fetched_at: Utc::now(),
            body: body.to_string(),
        };
        match serde_json::to_vec(&record) {
            Ok(bytes) => {
                if let Err(e) = atomic_write(&self.path, &bytes) {
                    debug!(error = %e, "Could not persist catalog cache");
                }
            }
            Err(e) => debug!(error = %e, "Could not serialize catalog cache"),
        }
    }

    /// The cached body for `source_url`, if it is younger than `ttl`.
    pub fn load_fresh(&self, source_url: &str, ttl: Duration) -> Option<String> {
        let raw = std::fs::read_to_string(&self.path).ok()?;
        let record: CachedResponse = serde_json::from_str(&raw).ok()?;
        if record.source_url != source_url {
            return None;
        }
        let age = Utc::now().signed_duration_since(record.fetched_at);
        if age.num_seconds() < 0 || age.num_seconds() as u64 >= ttl.as_secs() {
            debug!("Catalog cache expired");
            return None;
        }
        Some(record.body)
    }
}
