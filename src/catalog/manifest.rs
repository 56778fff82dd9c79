//! The JSON release manifest.
//!
//! One of the two remote catalog shapes: a document with an optional
//! `latest` field and a list of published items. When `latest` is absent
//! it is computed as the maximum item version under
//! [`VersionId`](crate::version::VersionId) ordering. Manifests are
//! read-only and fetched fresh on every check.

use serde::Deserialize;

use crate::core::UpdaterError;
use crate::version::VersionId;

/// A remote release manifest.
#[derive(Debug, Clone, Deserialize)]
pub struct Manifest {
    /// Explicit latest version; computed from `items` when absent.
    #[serde(default)]
    pub latest: Option<String>,
    /// Published releases.
    #[serde(default)]
    pub items: Vec<ManifestItem>,
}

/// One publishable release inside a manifest.
#[derive(Debug, Clone, Deserialize)]
pub struct ManifestItem {
    /// Version string, compared with [`VersionId`] semantics.
    pub version: String,
    /// Archive payload URL.
    pub url: String,
    /// Optional hex sha256 of the archive; verified before unpacking.
    #[serde(default)]
    pub sha256: Option<String>,
    /// Commands run in the app root after a successful overlay.
    #[serde(default)]
    pub post_install: Vec<String>,
    /// Per-release override of the exclusion list.
    #[serde(default)]
    pub exclude: Option<Vec<String>>,
    /// Inline release notes.
    #[serde(default)]
    pub info: Option<String>,
    /// URL of release notes to fetch instead of inline text.
    #[serde(default)]
    pub info_url: Option<String>,
}

impl Manifest {
    /// Parse a manifest body, mapping parser failures to
    /// [`UpdaterError::Malformed`].
    pub fn parse(body: &str) -> Result<Self, UpdaterError> {
        serde_json::from_str(body).map_err(|e| UpdaterError::Malformed {
            what: "manifest".into(),
            reason: e.to_string(),
        })
    }

    /// The latest published version: the `latest` field when present,
    /// otherwise the maximum item version.
    pub fn latest_version(&self) -> Option<VersionId> {
        match &self.latest {
            Some(s) => Some(VersionId::parse(s)),
            None => self.items.iter().map(|i| VersionId::parse(&i.version)).max(),
        }
    }

    /// The item publishing `version`, if any.
    pub fn item_for(&self, version: &VersionId) -> Option<&ManifestItem> {
        self.items
            .iter()
            .find(|i| VersionId::parse(&i.version) == *version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_manifest() {
        let body = r#"{
            "latest": "v1.1.0",
            "items": [
                {"version": "v1.0.0", "url": "https://dl.example/v1.0.0.zip"},
                {"version": "v1.1.0", "url": "https://dl.example/v1.1.0.zip",
                 "sha256": "ab12", "post_install": ["alembic upgrade head"],
                 "exclude": [".env"], "info": "bugfixes"}
            ]
        }"#;
        let manifest = Manifest::parse(body).unwrap();
        assert_eq!(
            manifest.latest_version().unwrap(),
            VersionId::parse("v1.1.0")
        );
        let item = manifest.item_for(&VersionId::parse("1.1.0")).unwrap();
        assert_eq!(item.sha256.as_deref(), Some("ab12"));
        assert_eq!(item.post_install, vec!["alembic upgrade head"]);
        assert_eq!(item.info.as_deref(), Some("bugfixes"));
    }

    #[test]
    fn latest_computed_from_items_when_absent() {
        let body = r#"{"items": [
            {"version": "v2", "url": "u2"},
            {"version": "v10", "url": "u10"},
            {"version": "v9.9", "url": "u9"}
        ]}"#;
        let manifest = Manifest::parse(body).unwrap();
        // Numeric, not lexical: v10 wins.
        assert_eq!(manifest.latest_version().unwrap(), VersionId::parse("v10"));
    }

    #[test]
    fn empty_manifest_has_no_latest() {
        let manifest = Manifest::parse(r#"{"items": []}"#).unwrap();
        assert!(manifest.latest_version().is_none());
    }

    #[test]
    fn unparseable_body_is_malformed() {
        let err = Manifest::parse("<html>not json</html>").unwrap_err();
        assert!(matches!(err, UpdaterError::Malformed { .. }));
    }
}
