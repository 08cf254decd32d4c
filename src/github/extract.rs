// src/github/extract.rs
// =============================================================================
// Unpacks a downloaded `.tar.gz` snapshot into the workspace.
//
// Every entry is checked BEFORE anything is written for it:
// - absolute paths are rejected
// - `..` components that climb above the extraction root are rejected
// - entries whose path goes through an earlier symlink entry are rejected
// - symlinks / hardlinks whose target lands outside the root, or reaches it
//   by walking through another symlink, are rejected
//
// Link targets are resolved one component at a time against the set of
// symlinks already written, so `d -> ..`, `d/d2 -> ..`, `e -> d/d2/..`
// cannot chain their way out even though each looks harmless on its own.
//
// A single bad entry fails the whole extraction with `UnsafeArchiveEntry`.
// Entries already written stay inside the root, which the workspace removes.
// =============================================================================

use crate::error::{GrabError, Result};
use flate2::read::GzDecoder;
use std::collections::HashSet;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Component, Path, PathBuf};
use tar::EntryType;
use tracing::debug;

/// What ended up on disk after extraction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractStats {
    pub entries: usize,
    pub bytes: u64,
}

pub fn extract_targz(archive_path: &Path, dest: &Path) -> Result<ExtractStats> {
    let file = File::open(archive_path).map_err(|e| GrabError::io(archive_path, e))?;
    let mut archive = tar::Archive::new(GzDecoder::new(BufReader::new(file)));
    archive.set_overwrite(true);

    fs::create_dir_all(dest).map_err(|e| GrabError::io(dest, e))?;

    let entries = archive.entries().map_err(malformed)?;
    let mut stats = ExtractStats::default();
    // Normalized paths of every symlink written so far
    let mut links: HashSet<PathBuf> = HashSet::new();

    for entry in entries {
        let mut entry = entry.map_err(malformed)?;
        let entry_type = entry.header().entry_type();

        // GitHub prepends a pax global header carrying the commit id
        if matches!(entry_type, EntryType::XGlobalHeader | EntryType::XHeader) {
            continue;
        }

        let path: PathBuf = entry.path().map_err(malformed)?.into_owned();
        let shown = path.display().to_string();
        let unsafe_entry = || GrabError::UnsafeArchiveEntry {
            entry: shown.clone(),
        };

        let parts = lexical_parts(&path).ok_or_else(unsafe_entry)?;
        if touches_link(&parts, &links) {
            return Err(unsafe_entry());
        }

        if entry_type.is_symlink() || entry_type.is_hard_link() {
            let target = entry
                .link_name()
                .map_err(malformed)?
                .ok_or_else(|| GrabError::MalformedArchive {
                    reason: format!("link entry '{}' has no target", shown),
                })?
                .into_owned();

            // Symlink targets are relative to the link's folder,
            // hardlink targets to the archive root
            let base: &[OsString] = if entry_type.is_symlink() {
                &parts[..parts.len().saturating_sub(1)]
            } else {
                &[]
            };

            if !target_stays_inside(base, &target, &links) {
                return Err(GrabError::UnsafeArchiveEntry {
                    entry: format!("{} -> {}", shown, target.display()),
                });
            }
        }

        let size = entry.header().size().unwrap_or(0);
        let unpacked = entry.unpack_in(dest).map_err(|e| {
            if is_unpack_refusal(&e) {
                unsafe_entry()
            } else {
                GrabError::io(dest.join(&path), e)
            }
        })?;

        // unpack_in refuses (returns false) anything it considers escaping
        if !unpacked {
            return Err(unsafe_entry());
        }

        if entry_type.is_symlink() {
            links.insert(parts.iter().collect());
        }

        stats.entries += 1;
        if entry_type.is_file() {
            stats.bytes += size;
        }
    }

    debug!(
        entries = stats.entries,
        bytes = stats.bytes,
        dest = %dest.display(),
        "archive extracted"
    );

    Ok(stats)
}

/// Lexically checks that a relative path never climbs above its root
pub fn stays_inside(path: &Path) -> bool {
    lexical_parts(path).is_some()
}

// Resolves `.` and `..` without touching the disk; None if the path is
// absolute or climbs above its root
fn lexical_parts(path: &Path) -> Option<Vec<OsString>> {
    let mut parts = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(name) => parts.push(name.to_os_string()),
            Component::CurDir => {}
            Component::ParentDir => {
                parts.pop()?;
            }
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(parts)
}

// True when the entry itself, or any folder on its way, is a symlink that
// was already written
fn touches_link(parts: &[OsString], links: &HashSet<PathBuf>) -> bool {
    let mut prefix = PathBuf::new();
    parts.iter().any(|part| {
        prefix.push(part);
        links.contains(&prefix)
    })
}

// Walks `target` from `base` one component at a time. Stepping past a known
// symlink (into it, or `..` out of it) means the real location depends on
// that link's target, so it is refused. Ending on a symlink is fine: that
// link was itself checked when it was written.
fn target_stays_inside(base: &[OsString], target: &Path, links: &HashSet<PathBuf>) -> bool {
    let mut current: PathBuf = base.iter().collect();

    for component in target.components() {
        match component {
            Component::CurDir => continue,
            Component::RootDir | Component::Prefix(_) => return false,
            Component::ParentDir | Component::Normal(_) if links.contains(&current) => {
                return false
            }
            Component::ParentDir => {
                if !current.pop() {
                    return false;
                }
            }
            Component::Normal(name) => current.push(name),
        }
    }
    true
}

// tar reports entries it will not write outside the destination as a plain
// io::Error; find that message anywhere in the error chain
fn is_unpack_refusal(error: &std::io::Error) -> bool {
    let mut current = Some(error as &dyn std::error::Error);
    while let Some(e) = current {
        if e.to_string().contains("outside of destination") {
            return true;
        }
        current = e.source();
    }
    false
}

fn malformed(e: std::io::Error) -> GrabError {
    GrabError::MalformedArchive {
        reason: e.to_string(),
    }
}
