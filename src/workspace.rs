// src/workspace.rs
// =============================================================================
// The temporary directory one run downloads and extracts into.
//
// Layout:
//   <tmp>/repo-grabber-XXXXXX/
//       snapshot.tar.gz        the downloaded archive
//       snapshot.tar.gz.part   in-flight download (renamed on success)
//       extract/               extraction root
//
// The directory is a `tempfile::TempDir`, so it is removed when the
// `Workspace` is dropped: on success, on every error path, and when main.rs
// drops the run future after Ctrl-C.
// =============================================================================

use crate::error::{GrabError, Result};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;

pub struct Workspace {
    root: TempDir,
    archive_path: PathBuf,
    extract_root: PathBuf,
}

impl Workspace {
    /// Creates a workspace under the system temp directory
    pub fn create() -> Result<Self> {
        Self::create_in(&std::env::temp_dir())
    }

    pub fn create_in(parent: &Path) -> Result<Self> {
        let root = tempfile::Builder::new()
            .prefix("repo-grabber-")
            .tempdir_in(parent)
            .map_err(|e| GrabError::io(parent, e))?;

        let archive_path = root.path().join("snapshot.tar.gz");
        let extract_root = root.path().join("extract");
        std::fs::create_dir(&extract_root).map_err(|e| GrabError::io(&extract_root, e))?;

        debug!(root = %root.path().display(), "workspace created");

        Ok(Self {
            root,
            archive_path,
            extract_root,
        })
    }

    pub fn root(&self) -> &Path {
        self.root.path()
    }

    pub fn archive_path(&self) -> &Path {
        &self.archive_path
    }

    /// Where a download streams to before it is known to be complete
    pub fn partial_archive_path(&self) -> PathBuf {
        self.archive_path.with_extension("gz.part")
    }

    pub fn extract_root(&self) -> &Path {
        &self.extract_root
    }

    /// Removes the workspace now and reports failure instead of ignoring it
    pub fn close(self) -> Result<()> {
        let path = self.root.path().to_path_buf();
        debug!(root = %path.display(), "workspace removed");
        self.root.close().map_err(|e| GrabError::io(path, e))
    }
}
