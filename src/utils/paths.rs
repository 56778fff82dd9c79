//! Path sanitization for untrusted input.
//!
//! Two trust boundaries feed paths into the updater:
//! - remote autoindex hrefs, which may carry percent-encoded slashes or
//!   `../` segments crafted to escape the staging directory;
//! - delete-list entries shipped inside a payload, which may try to reach
//!   outside the app root.
//!
//! Both are neutralized here. The mirror side keeps only the final path
//! segment of a decoded name; the delete-list side normalizes the entry
//! lexically and rejects anything that is absolute or escapes the root.

use std::path::{Component, Path, PathBuf};

use percent_encoding::percent_decode_str;

use crate::core::UpdaterError;

/// Decode a remote href name and reduce it to a bare file name.
///
/// Any directory component embedded in the decoded value is discarded, so
/// a crafted `..%2F..%2Fetc%2Fpasswd` yields `passwd` and lands under the
/// staging root like any other entry. Returns `None` when nothing safe
/// remains (empty names, bare `..`, `/`).
pub fn sanitize_remote_name(raw: &str) -> Option<String> {
    let trimmed = raw.trim_end_matches('/');
    if trimmed.is_empty() {
        return None;
    }
    let decoded = percent_decode_str(trimmed).decode_utf8_lossy();
    // Backslashes are path separators on Windows servers; treat them the same.
    let decoded = decoded.replace('\\', "/");
    let leaf = Path::new(&decoded).file_name()?.to_string_lossy().into_owned();
    if leaf.is_empty() || leaf == "." || leaf == ".." {
        return None;
    }
    Some(leaf)
}

/// Resolve a relative delete-list entry to an absolute target under `root`.
///
/// The entry is normalized lexically (no filesystem access, the target may
/// not exist yet): `.` segments drop out and `..` pops the previous
/// segment. Absolute entries and entries whose normalization climbs above
/// `root` are rejected with [`UpdaterError::UnsafePath`].
pub fn resolve_within(root: &Path, entry: &str) -> Result<PathBuf, UpdaterError> {
    let normalized = entry.replace('\\', "/");
    let rel = Path::new(&normalized);

    if rel.is_absolute() || has_windows_prefix(rel) {
        return Err(UpdaterError::UnsafePath {
            entry: entry.to_string(),
        });
    }

    let mut stack: Vec<&std::ffi::OsStr> = Vec::new();
    for component in rel.components() {
        match component {
            Component::Normal(part) => stack.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                if stack.pop().is_none() {
                    // Escapes above the root.
                    return Err(UpdaterError::UnsafePath {
                        entry: entry.to_string(),
                    });
                }
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(UpdaterError::UnsafePath {
                    entry: entry.to_string(),
                });
            }
        }
    }

    if stack.is_empty() {
        // Normalized to the root itself; deleting the whole installation
        // is never what a delete-list means.
        return Err(UpdaterError::UnsafePath {
            entry: entry.to_string(),
        });
    }

    let mut target = root.to_path_buf();
    for part in stack {
        target.push(part);
    }
    Ok(target)
}

fn has_windows_prefix(p: &Path) -> bool {
    matches!(p.components().next(), Some(Component::Prefix(_)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_name_plain_file() {
        assert_eq!(sanitize_remote_name("app.py"), Some("app.py".into()));
        assert_eq!(sanitize_remote_name("subdir/"), Some("subdir".into()));
    }

    #[test]
    fn remote_name_percent_decoded() {
        assert_eq!(
            sanitize_remote_name("caf%C3%A9.txt"),
            Some("café.txt".into())
        );
    }

    #[test]
    fn remote_name_traversal_reduced_to_leaf() {
        assert_eq!(sanitize_remote_name("../evil.py"), Some("evil.py".into()));
        assert_eq!(
            sanitize_remote_name("..%2F..%2Fetc%2Fpasswd"),
            Some("passwd".into())
        );
        assert_eq!(
            sanitize_remote_name("a%5C..%5Cb.txt"),
            Some("b.txt".into())
        );
    }

    #[test]
    fn remote_name_nothing_safe_left() {
        assert_eq!(sanitize_remote_name(""), None);
        assert_eq!(sanitize_remote_name("/"), None);
        assert_eq!(sanitize_remote_name(".."), None);
        assert_eq!(sanitize_remote_name("%2E%2E"), None);
    }

    #[test]
    fn resolve_simple_entry() {
        let root = Path::new("/srv/app");
        let target = resolve_within(root, "app/web/old.py").unwrap();
        assert_eq!(target, root.join("app/web/old.py"));
    }

    #[test]
    fn resolve_normalizes_backslashes_and_dots() {
        let root = Path::new("/srv/app");
        let target = resolve_within(root, r"app\.\web\x.py").unwrap();
        assert_eq!(target, root.join("app/web/x.py"));
        // `..` inside the tree is fine as long as it stays inside
        let target = resolve_within(root, "app/sub/../other.py").unwrap();
        assert_eq!(target, root.join("app/other.py"));
    }

    #[test]
    fn resolve_rejects_absolute() {
        let root = Path::new("/srv/app");
        assert!(matches!(
            resolve_within(root, "/etc/passwd"),
            Err(UpdaterError::UnsafePath { .. })
        ));
    }

    #[test]
    fn resolve_rejects_escape() {
        let root = Path::new("/srv/app");
        assert!(matches!(
            resolve_within(root, "../outside.txt"),
            Err(UpdaterError::UnsafePath { .. })
        ));
        assert!(matches!(
            resolve_within(root, "a/../../outside.txt"),
            Err(UpdaterError::UnsafePath { .. })
        ));
    }

    #[test]
    fn resolve_rejects_empty_and_root() {
        let root = Path::new("/srv/app");
        assert!(resolve_within(root, "").is_err());
        assert!(resolve_within(root, ".").is_err());
        assert!(resolve_within(root, "a/..").is_err());
    }
}
