// src/resolve/discover.rs
// =============================================================================
// Marker-driven folder discovery ("skill grabber").
//
// A folder matches when it directly contains the marker file (SKILL.md by
// default). Depth is counted from the base: its immediate children are
// depth 0. The base itself is never returned.
//
// Traversal is sorted by file name, so repeated runs over the same snapshot
// return matches in the same (lexicographic by path) order.
// =============================================================================

use crate::error::{GrabError, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub fn find_marked_dirs(base: &Path, marker: &str, recursive: bool) -> Result<Vec<PathBuf>> {
    let max_depth = if recursive { usize::MAX } else { 1 };
    let mut found = Vec::new();

    let walker = WalkDir::new(base)
        .min_depth(1)
        .max_depth(max_depth)
        .follow_links(false)
        .sort_by_file_name();

    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(base).to_path_buf();
            GrabError::io(path, e.into())
        })?;

        if entry.file_type().is_dir() && has_marker(entry.path(), marker) {
            found.push(entry.into_path());
        }
    }

    Ok(found)
}

// The marker must be a real file; a symlink named SKILL.md does not count
fn has_marker(dir: &Path, marker: &str) -> bool {
    std::fs::symlink_metadata(dir.join(marker))
        .map(|meta| meta.file_type().is_file())
        .unwrap_or(false)
}
