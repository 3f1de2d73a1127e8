//! Remote path arithmetic for the session's root and working folders.
//!
//! Remote paths always use `/` separators regardless of the local platform.
//! The invariant kept by these helpers: folder strings are either empty or
//! start with `/`, and never end with `/`.

/// Normalizes a root folder string: empty stays empty, anything else gains
/// a leading `/` and loses one trailing `/`.
pub fn normalize_root(root: &str) -> String {
    let root = root.trim();
    if root.is_empty() {
        return String::new();
    }
    let mut out = String::new();
    if !root.starts_with('/') {
        out.push('/');
    }
    out.push_str(root);
    if out.ends_with('/') {
        out.pop();
    }
    out
}

/// Applies one folder change and returns the new working folder.
///
/// A `/`-prefixed folder replaces the whole working folder; anything else
/// descends one level from the current one. Empty input or a bare `/`
/// resets to the root.
pub fn push_folder(working: &str, folder: &str) -> String {
    let folder = folder.trim();
    let mut next = if folder.is_empty() || folder == "/" {
        String::new()
    } else if let Some(absolute) = folder.strip_prefix('/') {
        absolute.to_string()
    } else {
        format!("{working}/{folder}")
    };
    if next.ends_with('/') {
        next.pop();
    }
    if !next.is_empty() && !next.starts_with('/') {
        next.insert(0, '/');
    }
    next
}

/// Joins a file name onto a folder path the way the wire expects: always a
/// single `/` between folder and name, even when the folder is the root.
pub fn join_name(folder: &str, name: &str) -> String {
    format!("{folder}/{name}")
}

/// Path for a listing request: the folder itself, or the folder plus a
/// `/`-joined wildcard when one is given.
pub fn listing_path(folder: &str, filter: &str) -> String {
    if filter.is_empty() {
        folder.to_string()
    } else if filter.starts_with('/') {
        format!("{folder}{filter}")
    } else {
        format!("{folder}/{filter}")
    }
}
