use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Name of git's control directory inside a working copy.
const GIT_DIR: &str = ".git";

/// Normalize a store key: strip leading/trailing slashes, collapse `.`
/// segments and repeated slashes, and reject anything that could resolve
/// outside the working copy.
///
/// # Arguments
/// * `key` - The raw key as supplied by the caller.
///
/// # Errors
/// Returns [`Error::InvalidKey`] if the key is empty, contains `..`,
/// a backslash or NUL byte, or has a `.git` segment.
pub fn normalize_key(key: &str) -> Result<String> {
    if key.contains('\\') || key.contains('\0') {
        return Err(Error::invalid_key(format!(
            "key {:?} contains a forbidden character",
            key,
        )));
    }

    let mut segments: Vec<&str> = Vec::new();
    for seg in key.split('/') {
        if seg.is_empty() || seg == "." {
            continue;
        }
        if seg == ".." {
            return Err(Error::invalid_key(format!(
                "key {:?} escapes the repository root",
                key,
            )));
        }
        // git refuses to track anything under a `.git` component
        if seg.eq_ignore_ascii_case(GIT_DIR) {
            return Err(Error::invalid_key(format!(
                "key {:?} addresses a git directory",
                key,
            )));
        }
        segments.push(seg);
    }

    if segments.is_empty() {
        return Err(Error::invalid_key("key must not be empty"));
    }
    Ok(segments.join("/"))
}

/// Resolve a normalized key under `root` without following symlinks.
///
/// Each existing component from `root` down to the key itself is checked
/// with `symlink_metadata`. Returns `Ok(None)` when a leading component is a
/// regular file, since nothing can be stored beneath it.
///
/// # Errors
/// Returns [`Error::InvalidKey`] if any component is a symbolic link, as the
/// link may point outside the working copy.
pub fn resolve_key(root: &Path, key: &str) -> Result<Option<PathBuf>> {
    let mut path = root.to_path_buf();
    let mut segments = key.split('/').peekable();

    while let Some(seg) = segments.next() {
        path.push(seg);
        let meta = match std::fs::symlink_metadata(&path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                path.extend(segments);
                return Ok(Some(path));
            }
            Err(e) => return Err(Error::io(&path, e)),
        };
        if meta.file_type().is_symlink() {
            return Err(Error::invalid_key(format!(
                "key {:?} passes through a symbolic link",
                key,
            )));
        }
        if !meta.is_dir() && segments.peek().is_some() {
            return Ok(None);
        }
    }
    Ok(Some(path))
}

/// Commit message for setting `key`.
pub fn set_message(key: &str) -> String {
    format!("Set key: {}", key)
}

/// Commit message for deleting `key`.
pub fn delete_message(key: &str) -> String {
    format!("Delete key: {}", key)
}
