//! Remote version catalog.
//!
//! Resolves "what is the latest published version and where is its
//! payload" from one of two source shapes, selected by the source URL:
//!
//! - **JSON manifest** (URL ends in `.json`): a [`manifest::Manifest`]
//!   document whose resolved item points at a single archive.
//! - **Autoindex tree** (anything else): the URL is a base directory
//!   whose HTML listing contains `v*/` version subdirectories; the
//!   newest one becomes a tree to mirror, with an optional `info.txt`
//!   supplying release notes.
//!
//! Discovery is forgiving at the host boundary: network and
//! parse failures degrade to "no update available" in [`RemoteCatalog::check`]
//! so a background check never hard-fails the application. The typed
//! [`RemoteCatalog::discover_latest`] is available when callers do want
//! the error.

pub mod autoindex;
pub mod cache;
pub mod fetch;
pub mod manifest;

use anyhow::Result;
use tracing::{debug, error, warn};
use url::Url;

use crate::constants::{CATALOG_CACHE_TTL, INFO_FILE_NAME};
use crate::core::UpdaterError;
use crate::version::VersionId;

pub use cache::CatalogCache;
pub use fetch::Fetcher;

/// Where a release payload lives and how to obtain it.
#[derive(Debug, Clone)]
pub enum PayloadRef {
    /// A single archive to download (and optionally checksum-verify).
    Archive {
        /// Archive URL.
        url: String,
        /// Hex sha256 from the manifest, when declared.
        sha256: Option<String>,
        /// Post-install commands the release ships with.
        post_install: Vec<String>,
        /// Per-release exclusion override.
        exclude: Option<Vec<String>>,
    },
    /// A remote directory tree to mirror recursively.
    Tree {
        /// URL of the version directory (with trailing slash).
        url: String,
    },
}

/// Outcome of a catalog check.
#[derive(Debug, Clone)]
pub struct UpdateCheck {
    /// The locally installed version.
    pub current: VersionId,
    /// The newest remote version, when discoverable.
    pub latest: Option<VersionId>,
    /// Whether `latest` is strictly newer than `current`.
    pub available: bool,
    /// Human-readable release notes, when the source provides them.
    pub notes: Option<String>,
    /// Payload location; present only when an update is available.
    pub payload: Option<PayloadRef>,
}

impl UpdateCheck {
    fn not_available(current: VersionId, latest: Option<VersionId>) -> Self {
        Self {
            current,
            latest,
            available: false,
            notes: None,
            payload: None,
        }
    }
}

/// Resolves the latest published version from a remote source.
pub struct RemoteCatalog {
    fetcher: Fetcher,
    cache: Option<CatalogCache>,
}

impl RemoteCatalog {
    /// Catalog without a fallback cache.
    pub fn new(fetcher: Fetcher) -> Self {
        Self {
            fetcher,
            cache: None,
        }
    }

    /// Catalog with a last-known-good cache for transient outages.
    pub fn with_cache(fetcher: Fetcher, cache: CatalogCache) -> Self {
        Self {
            fetcher,
            cache: Some(cache),
        }
    }

    /// Host-facing check: degrades every discovery failure to
    /// "no update available" after logging it.
    pub async fn check(&self, source_url: &str, current: VersionId) -> UpdateCheck {
        match self.discover_latest(source_url, current.clone()).await {
            Ok(check) => check,
            Err(e) => {
                if e.is_discovery_degradable() {
                    warn!(source = source_url, error = %e, "Update check failed; treating as no update");
                } else {
                    error!(source = source_url, error = %e, "Unexpected update check failure; treating as no update");
                }
                UpdateCheck::not_available(current, None)
            }
        }
    }

    /// Resolve the latest version and payload ref, with typed errors.
    pub async fn discover_latest(
        &self,
        source_url: &str,
        current: VersionId,
    ) -> Result<UpdateCheck, UpdaterError> {
        let trimmed = source_url.trim();
        if trimmed.to_ascii_lowercase().ends_with(".json") {
            self.discover_from_manifest(trimmed, current).await
        } else {
            self.discover_from_autoindex(trimmed, current).await
        }
    }

    async fn discover_from_manifest(
        &self,
        url: &str,
        current: VersionId,
    ) -> Result<UpdateCheck, UpdaterError> {
        let body = self.fetch_with_cache(url).await?;
        let manifest = manifest::Manifest::parse(&body)?;

        let Some(latest) = manifest.latest_version() else {
            debug!("Manifest lists no versions");
            return Ok(UpdateCheck::not_available(current, None));
        };
        if !latest.is_newer_than(&current) {
            return Ok(UpdateCheck::not_available(current, Some(latest)));
        }

        let Some(item) = manifest.item_for(&latest) else {
            warn!(latest = %latest, "Manifest names a latest version without a matching item");
            return Ok(UpdateCheck::not_available(current, Some(latest)));
        };
        if item.url.is_empty() {
            warn!(latest = %latest, "Manifest item has no payload URL");
            return Ok(UpdateCheck::not_available(current, Some(latest)));
        }

        let notes = match (&item.info, &item.info_url) {
            (Some(text), _) => Some(text.clone()),
            (None, Some(info_url)) => self.fetcher.fetch_text(info_url).await.ok(),
            (None, None) => None,
        };

        Ok(UpdateCheck {
            current,
            latest: Some(latest),
            available: true,
            notes,
            payload: Some(PayloadRef::Archive {
                url: item.url.clone(),
                sha256: item.sha256.clone(),
                post_install: item.post_install.clone(),
                exclude: item.exclude.clone(),
            }),
        })
    }

    async fn discover_from_autoindex(
        &self,
        url: &str,
        current: VersionId,
    ) -> Result<UpdateCheck, UpdaterError> {
        let base = if url.ends_with('/') {
            url.to_string()
        } else {
            format!("{url}/")
        };

        let html = self.fetch_with_cache(&base).await?;
        let entries = autoindex::parse_listing(&html);

        let Some(latest_dir) = autoindex::latest_version_dir(&entries) else {
            debug!("No version directories in listing");
            return Ok(UpdateCheck::not_available(current, None));
        };
        let latest = VersionId::parse(&latest_dir.name);
        if !latest.is_newer_than(&current) {
            return Ok(UpdateCheck::not_available(current, Some(latest)));
        }

        let version_url = join_url(&base, &latest_dir.href)?;
        // Release notes are optional; absence is not an error.
        let notes = {
            let info_url = join_url(&version_url, INFO_FILE_NAME)?;
            self.fetcher.fetch_text(&info_url).await.ok()
        };

        Ok(UpdateCheck {
            current,
            latest: Some(latest),
            available: true,
            notes,
            payload: Some(PayloadRef::Tree { url: version_url }),
        })
    }

    async fn fetch_with_cache(&self, url: &str) -> Result<String, UpdaterError> {
        match self.fetcher.fetch_text(url).await {
            Ok(body) => {
                if let Some(cache) = &self.cache {
                    cache.store(url, &body);
                }
                Ok(body)
            }
            Err(e) => {
                if let Some(cache) = &self.cache
                    && let Some(body) = cache.load_fresh(url, CATALOG_CACHE_TTL)
                {
                    warn!(url, error = %e, "Source unreachable; using cached catalog response");
                    return Ok(body);
                }
                Err(e)
            }
        }
    }
}

/// Join a relative href against a base URL.
pub fn join_url(base: &str, rel: &str) -> Result<String, UpdaterError> {
    let parsed = Url::parse(base).map_err(|e| UpdaterError::Malformed {
        what: "source URL".into(),
        reason: format!("{base}: {e}"),
    })?;
    let joined = parsed.join(rel).map_err(|e| UpdaterError::Malformed {
        what: "href".into(),
        reason: format!("{rel}: {e}"),
    })?;
    Ok(joined.to_string())
}
