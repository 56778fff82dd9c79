//! Version identifiers and their ordering.
//!
//! Published versions are dotted numeric tuples with an optional leading
//! `v`/`V` tag (`v3.1.2`, `2.0`, `V10`). They are *not*
//! semver: the original release folders are named by hand, so parsing is
//! forgiving: non-numeric fragments are reduced to their digits (`rc1`
//! becomes `1`) and fragments with no digits at all become `0`.
//!
//! Ordering is pure tuple comparison, right-padded with zeros to equal
//! length, so `v1.0 == 1.0.0` and `v10 > v2`. The comparison is total and
//! stable regardless of prefix or casing, which is what lets autoindex
//! directory names and manifest version strings be compared directly.

use std::cmp::Ordering;
use std::fmt;

/// A parsed version identifier.
///
/// Keeps the original string for display while comparing on the parsed
/// numeric tuple. Equality follows the padded tuple comparison, so two
/// differently spelled identifiers can be equal (`"v1.0" == "1.0.0"`).
#[derive(Debug, Clone)]
pub struct VersionId {
    raw: String,
    parts: Vec<u64>,
}

impl VersionId {
    /// Parse a version string. Never fails: unparseable fragments
    /// degrade to zero, and an empty string parses as the zero version.
    pub fn parse(s: &str) -> Self {
        let raw = s.trim().to_string();
        let body = raw.strip_prefix(['v', 'V']).unwrap_or(&raw);

        let mut parts: Vec<u64> = Vec::new();
        for fragment in body.split('.') {
            match fragment.parse::<u64>() {
                Ok(n) => parts.push(n),
                Err(_) => {
                    let digits: String =
                        fragment.chars().filter(|c| c.is_ascii_digit()).collect();
                    parts.push(digits.parse().unwrap_or(0));
                }
            }
        }
        if parts.is_empty() {
            parts.push(0);
        }

        Self { raw, parts }
    }

    /// The sentinel returned when no version has ever been persisted.
    pub fn zero() -> Self {
        Self::parse("v0")
    }

    /// The original string as read from disk or from the remote source.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Whether `self` is strictly newer than `other`.
    pub fn is_newer_than(&self, other: &Self) -> bool {
        self > other
    }
}

impl fmt::Display for VersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl Ord for VersionId {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.parts.len().max(other.parts.len());
        for i in 0..len {
            let a = self.parts.get(i).copied().unwrap_or(0);
            let b = other.parts.get(i).copied().unwrap_or(0);
            match a.cmp(&b) {
                Ordering::Equal => continue,
                non_eq => return non_eq,
            }
        }
        Ordering::Equal
    }
}

impl PartialOrd for VersionId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for VersionId {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for VersionId {}
