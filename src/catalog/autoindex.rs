//! Autoindex directory listings.
//!
//! The second remote catalog shape: any HTTP server that returns an
//! auto-generated HTML listing of a directory. We extract anchor hrefs,
//! classify them as files or subdirectories (trailing slash), and pick
//! version directories named `v<digits>(.<digits>)*`. Hrefs that merely
//! look version-ish but do not match are ignored, never errors, and the
//! maximum is always taken under version ordering, never lexically.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};

use crate::version::VersionId;

/// `v<digits>(.<digits>)*`, optionally capitalized.
static VERSION_DIR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[vV][0-9]+(\.[0-9]+)*$").expect("static regex"));

/// A discovered href inside a remote directory listing.
///
/// Transient: used during discovery and recursive mirroring only.
#[derive(Debug, Clone)]
pub struct DirEntry {
    /// The raw href as it appeared in the HTML.
    pub href: String,
    /// The href without its trailing slash.
    pub name: String,
    /// Subdirectories carry a trailing slash in autoindex listings.
    pub is_dir: bool,
}

/// Extract all anchor hrefs from an HTML document.
pub fn extract_hrefs(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("a[href]").expect("static selector");
    document
        .select(&selector)
        .filter_map(|el| el.value().attr("href"))
        .map(str::to_string)
        .collect()
}

/// Parse a listing into usable entries, dropping navigation and the
/// sort-order junk links autoindex pages carry (`?C=M;O=D` and friends).
pub fn parse_listing(html: &str) -> Vec<DirEntry> {
    extract_hrefs(html)
        .into_iter()
        .filter_map(|href| {
            if href.starts_with("../") || href.starts_with('?') || href.starts_with('#') {
                return None;
            }
            let name = href.trim_end_matches('/').to_string();
            if name.is_empty() {
                return None;
            }
            let is_dir = href.ends_with('/');
            Some(DirEntry { href, name, is_dir })
        })
        .collect()
}

/// The newest version directory in a listing, by version ordering.
pub fn latest_version_dir(entries: &[DirEntry]) -> Option<&DirEntry> {
    entries
        .iter()
        .filter(|e| e.is_dir && VERSION_DIR_RE.is_match(&e.name))
        .max_by_key(|e| VersionId::parse(&e.name))
}
