//! Path helpers.
//!
//! Remote paths always use `/`. Local paths use the platform separator;
//! crossing the boundary goes through [`remote_to_local`] and
//! [`local_to_remote_relative`].

use std::path::{Component, Path, PathBuf};

/// Join `name` onto `base` the POSIX way. An absolute `name` wins.
pub fn posix_join(base: &str, name: &str) -> String {
    if name.starts_with('/') || base.is_empty() {
        name.to_string()
    } else if name.is_empty() {
        base.to_string()
    } else if base.ends_with('/') {
        format!("{}{}", base, name)
    } else {
        format!("{}/{}", base, name)
    }
}

/// Directory part of a remote path (`/a/b` → `/a`, `/a` → `/`, `a` → ``).
pub fn posix_dirname(path: &str) -> &str {
    match path.rfind('/') {
        None => "",
        Some(idx) => {
            let head = &path[..=idx];
            let trimmed = head.trim_end_matches('/');
            if trimmed.is_empty() {
                &head[..1]
            } else {
                trimmed
            }
        }
    }
}

/// Final component of a remote path.
pub fn posix_basename(path: &str) -> &str {
    match path.rfind('/') {
        None => path,
        Some(idx) => &path[idx + 1..],
    }
}

/// Strip trailing slashes, keeping a lone root as `/`.
pub fn trim_trailing_slashes(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() && !path.is_empty() {
        "/"
    } else {
        trimmed
    }
}

/// Offset of `current` below the walk root `root`, without a leading slash.
///
/// An empty root yields all of `current` (minus a leading `/`), so a walk
/// that started at the working directory maps every path verbatim.
pub fn remote_relative<'a>(root: &str, current: &'a str) -> &'a str {
    if root.is_empty() {
        return current.trim_start_matches('/');
    }
    match current.strip_prefix(root) {
        Some("") => "",
        Some(rest) if rest.starts_with('/') || root.ends_with('/') => rest.trim_start_matches('/'),
        _ => current.trim_start_matches('/'),
    }
}

/// Append the `/`-separated relative path `rel` to a local directory.
pub fn remote_to_local(dest: &Path, rel: &str) -> PathBuf {
    rel.split('/')
        .filter(|seg| !seg.is_empty() && *seg != ".")
        .fold(dest.to_path_buf(), |acc, seg| acc.join(seg))
}

/// Express `current` relative to `root` as a `/`-separated remote path.
pub fn local_to_remote_relative(root: &Path, current: &Path) -> String {
    let rel = current.strip_prefix(root).unwrap_or(current);
    rel.components()
        .filter_map(|c| match c {
            Component::Normal(seg) => Some(seg.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Whether any segment of a remote path starts with a dot.
pub fn has_dot_segment(path: &str) -> bool {
    path.split('/').any(|seg| seg.starts_with('.'))
}

/// Every accumulated prefix of `path`, root to leaf
/// (`/a/b/c` → `/a`, `/a/b`, `/a/b/c`). Empty segments are skipped.
pub fn accumulated_prefixes(path: &str) -> Vec<String> {
    let mut current = if path.starts_with('/') {
        String::from("/")
    } else {
        String::new()
    };
    let mut prefixes = Vec::new();
    for seg in path.split('/').filter(|s| !s.is_empty()) {
        current = posix_join(&current, seg);
        prefixes.push(current.clone());
    }
    prefixes
}
