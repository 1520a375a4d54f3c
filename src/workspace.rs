use std::path::{Component, Path, PathBuf};

use unicode_normalization::UnicodeNormalization;

use crate::error::PatchError;

/// Resolve a root-relative path without touching the filesystem.
///
/// The input is NFKC-folded before any checking so that visually confusable
/// separators (fullwidth solidus, one-dot leader) cannot smuggle a traversal
/// past a naive string scan.
pub fn resolve(root: &Path, relative: &str) -> Result<PathBuf, PatchError> {
    let folded: String = relative.nfkc().collect();
    let candidate = folded.replace('\\', "/");

    if candidate.trim().is_empty() {
        return Err(PatchError::path(relative, "empty path"));
    }
    if candidate.contains('\0') {
        return Err(PatchError::path(relative, "contains a NUL byte"));
    }
    if candidate.starts_with('/') || has_windows_prefix(&candidate) {
        return Err(PatchError::path(relative, "absolute paths are not allowed"));
    }

    let mut clean = PathBuf::new();
    for component in Path::new(&candidate).components() {
        match component {
            Component::Normal(segment) => clean.push(segment),
            Component::CurDir => {}
            Component::ParentDir => {
                return Err(PatchError::path(relative, "path traversal ('..') is not allowed"));
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(PatchError::path(relative, "absolute paths are not allowed"));
            }
        }
    }

    if clean.as_os_str().is_empty() {
        return Err(PatchError::path(relative, "path has no file component"));
    }

    Ok(root.join(clean))
}

fn has_windows_prefix(candidate: &str) -> bool {
    let bytes = candidate.as_bytes();
    bytes.len() >= 2 && bytes[1] == b':' && bytes[0].is_ascii_alphabetic()
}
