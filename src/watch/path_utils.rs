// src/watch/path_utils.rs

//! Utility functions for path handling in the watcher.

use std::path::Path;

/// Convert a path into a string relative to `root`, with forward slashes.
///
/// - First we try a direct `strip_prefix(root)`.
/// - If that fails (e.g. due to symlinks or different absolute prefixes),
///   we canonicalize both paths and try again. Deleted paths cannot be
///   canonicalized, so for those we canonicalize the parent instead.
///
/// Returns `None` if the path cannot be reasonably related to `root`.
pub fn relative_str(root: &Path, path: &Path) -> Option<String> {
    if let Ok(rel) = path.strip_prefix(root) {
        return Some(to_slash(rel));
    }

    let root_canon = root.canonicalize().ok()?;

    if let Ok(path_canon) = path.canonicalize() {
        if let Ok(rel) = path_canon.strip_prefix(&root_canon) {
            return Some(to_slash(rel));
        }
    }

    // The file may be gone already (delete events); relate via its parent.
    let parent = path.parent()?.canonicalize().ok()?;
    let name = path.file_name()?;
    let rel_parent = parent.strip_prefix(&root_canon).ok()?;
    Some(to_slash(&rel_parent.join(name)))
}

fn to_slash(rel: &Path) -> String {
    rel.to_string_lossy().replace('\\', "/")
}

/// Extension of a slash-separated relative path, without the dot.
pub fn extension(rel_path: &str) -> Option<&str> {
    let name = rel_path.rsplit('/').next()?;
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext)
}

/// Editor artifacts that should never trigger a reload.
pub fn is_temp_file(rel_path: &str) -> bool {
    let name = rel_path.rsplit('/').next().unwrap_or(rel_path);
    let ext = extension(rel_path).unwrap_or("");

    matches!(ext, "bck" | "bak" | "backup" | "swp" | "swo" | "swx" | "tmp")
        || name.ends_with('~')
        || name.starts_with(".#")
        || name == "4913"
}
