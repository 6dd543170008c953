//! Canonical file names
//!
//! Measured files are keyed by canonical path strings. These helpers are
//! string based on purpose: paths recorded on another machine may use the
//! other platform's separators, so they can't always go through `Path`.

use std::path::{Component, Path, PathBuf};

use directories::BaseDirs;

/// Returns the first path separator used in `s`, or the host separator
pub fn sep(s: &str) -> char {
    s.chars()
        .find(|c| *c == '/' || *c == '\\')
        .unwrap_or(std::path::MAIN_SEPARATOR)
}

/// True if `s` is absolute on either POSIX or Windows
pub fn isabs_anywhere(s: &str) -> bool {
    if s.starts_with('/') || s.starts_with('\\') {
        return true;
    }
    let bytes = s.as_bytes();
    bytes.len() >= 3
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && (bytes[2] == b'/' || bytes[2] == b'\\')
}

/// Expands a leading `~` to the current user's home directory
pub fn expand_home(s: &str) -> String {
    let rest = if s == "~" {
        ""
    } else if let Some(rest) = s.strip_prefix("~/").or_else(|| s.strip_prefix("~\\")) {
        rest
    } else {
        return s.to_string();
    };

    match BaseDirs::new() {
        Some(dirs) if rest.is_empty() => dirs.home_dir().to_string_lossy().into_owned(),
        Some(dirs) => dirs.home_dir().join(rest).to_string_lossy().into_owned(),
        None => s.to_string(),
    }
}

/// Makes `s` absolute against the current directory and removes `.` and
/// `..` components without touching the filesystem
pub fn abs_file(s: &str) -> String {
    let expanded = expand_home(s);
    let path = Path::new(&expanded);
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        match std::env::current_dir() {
            Ok(cwd) => cwd.join(path),
            Err(e) => {
                tracing::warn!("Can't resolve current directory: {e}");
                path.to_path_buf()
            }
        }
    };
    normalize(&joined).to_string_lossy().into_owned()
}

/// The canonical form of a file name: absolute, normalized, and lower-cased
/// on case-insensitive platforms
pub fn canonical_filename(s: &str) -> String {
    let abs = abs_file(s);
    if cfg!(windows) {
        abs.to_lowercase()
    } else {
        abs
    }
}

/// Removes `.` and `..` components from `path` lexically
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(out.components().next_back(), Some(Component::Normal(_))) {
                    out.pop();
                } else if !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
