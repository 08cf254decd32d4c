// src/output/mod.rs
// =============================================================================
// This module writes resolved folders into the destination directory.
//
// Submodules:
// - naming: output names, duplicate disambiguation, collision policy
// - archive: optional .tar.gz re-pack of each copied folder
// - metadata: optional .source.json sidecar
//
// The materializer only ever touches the destination after resolution has
// finished, and each match is handled independently so the orchestrator can
// keep going when one of them fails.
// =============================================================================

mod archive;
mod metadata;
mod naming;

pub use metadata::SourceMetadata;
pub use naming::{output_names, CollisionPolicy};

use naming::OutputPaths;

use crate::error::{GrabError, Result};
use crate::resolve::Match;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// What one materialized match produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MaterializedOutput {
    pub destination_path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_archive: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata_path: Option<PathBuf>,
    pub file_count: u64,
    pub total_bytes: u64,
}

#[derive(Debug, Clone)]
pub struct MaterializeOptions {
    pub dest_root: PathBuf,
    pub collision: CollisionPolicy,
    /// Also write `<name>.tar.gz`
    pub archive: bool,
    /// Write `<name>.source.json` with these run facts
    pub metadata: Option<SourceMetadata>,
}

pub struct Materializer {
    options: MaterializeOptions,
    /// `YYYYMMDD-HHMMSS`, fixed for the whole run
    stamp: String,
}

impl Materializer {
    pub fn new(options: MaterializeOptions, started_at: chrono::DateTime<chrono::Local>) -> Self {
        Self {
            options,
            stamp: started_at.format("%Y%m%d-%H%M%S").to_string(),
        }
    }

    /// Copies one match into the destination under `name`
    pub fn materialize(&self, source: &Match, name: &str) -> Result<MaterializedOutput> {
        let dest_root = &self.options.dest_root;
        fs::create_dir_all(dest_root).map_err(|e| GrabError::io(dest_root, e))?;

        let paths = naming::claim_destination(
            dest_root,
            name,
            self.options.collision,
            &self.stamp,
            self.options.archive,
            self.options.metadata.is_some(),
        )?;

        debug!(
            from = %source.path.display(),
            to = %paths.dir.display(),
            "copying {}",
            source.relative_display()
        );

        let (file_count, total_bytes) = match copy_dir(&source.path, &paths.dir) {
            Ok(counts) => counts,
            Err(e) => {
                discard(&paths);
                return Err(e);
            }
        };

        // A match either produces everything it was asked for or nothing
        let (created_archive, metadata_path) = match self.write_extras(source, &paths) {
            Ok(extras) => extras,
            Err(e) => {
                discard(&paths);
                return Err(e);
            }
        };

        Ok(MaterializedOutput {
            destination_path: paths.dir,
            created_archive,
            metadata_path,
            file_count,
            total_bytes,
        })
    }

    fn write_extras(
        &self,
        source: &Match,
        paths: &OutputPaths,
    ) -> Result<(Option<PathBuf>, Option<PathBuf>)> {
        let created_archive = if self.options.archive {
            archive::write_targz(&paths.dir, &paths.archive)?;
            Some(paths.archive.clone())
        } else {
            None
        };

        let metadata_path = match &self.options.metadata {
            Some(meta) => {
                metadata::write_sidecar(
                    &paths.sidecar,
                    meta,
                    &source.relative_display(),
                    &paths.dir,
                )?;
                Some(paths.sidecar.clone())
            }
            None => None,
        };

        Ok((created_archive, metadata_path))
    }
}

// Best-effort removal of whatever a failed match left behind. Every path here
// was claimed for this match, so nothing older is touched.
fn discard(paths: &OutputPaths) {
    if paths.dir.is_dir() {
        let _ = fs::remove_dir_all(&paths.dir);
    }
    for file in [&paths.archive, &paths.sidecar] {
        if file.is_file() {
            let _ = fs::remove_file(file);
        }
    }
}

/// Recursively copies `src` to `dest`, returning (files, bytes)
fn copy_dir(src: &Path, dest: &Path) -> Result<(u64, u64)> {
    let mut files = 0u64;
    let mut bytes = 0u64;

    for entry in WalkDir::new(src).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(src).to_path_buf();
            GrabError::io(path, e.into())
        })?;

        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| GrabError::io(entry.path(), std::io::Error::other(e)))?;
        let target = dest.join(relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&target).map_err(|e| GrabError::io(&target, e))?;
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &target)?;
        } else {
            bytes += fs::copy(entry.path(), &target).map_err(|e| GrabError::io(&target, e))?;
            files += 1;
        }
    }

    Ok((files, bytes))
}

#[cfg(unix)]
fn copy_symlink(link: &Path, target: &Path) -> Result<()> {
    let points_to = fs::read_link(link).map_err(|e| GrabError::io(link, e))?;
    std::os::unix::fs::symlink(&points_to, target).map_err(|e| GrabError::io(target, e))
}

#[cfg(not(unix))]
fn copy_symlink(link: &Path, _target: &Path) -> Result<()> {
    tracing::warn!("skipping symlink {} (not supported on this platform)", link.display());
    Ok(())
}
