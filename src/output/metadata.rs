// src/output/metadata.rs
// =============================================================================
// The optional `<name>.source.json` sidecar written next to each output.
//
// It records where the folder came from so a later reader (or a script) can
// re-fetch it: repository, ref actually used, discovery mode and when.
// =============================================================================

use crate::error::{GrabError, Result};
use crate::github::RefKind;
use crate::resolve::DiscoveryMode;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Run-wide facts shared by every sidecar of one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceMetadata {
    /// "owner/repo"
    pub repository: String,
    /// Input exactly as the user typed it
    pub source: String,
    pub git_ref: String,
    pub ref_kind: RefKind,
    pub archive_url: String,
    pub mode: DiscoveryMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marker: Option<String>,
    /// RFC 3339
    pub fetched_at: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Sidecar {
    #[serde(flatten)]
    pub source: SourceMetadata,
    /// Folder inside the repository, "." for the root
    pub matched_path: String,
    pub destination: PathBuf,
}

pub fn write_sidecar(
    path: &Path,
    source: &SourceMetadata,
    matched_path: &str,
    destination: &Path,
) -> Result<()> {
    let sidecar = Sidecar {
        source: source.clone(),
        matched_path: matched_path.to_string(),
        destination: destination.to_path_buf(),
    };

    let json = serde_json::to_string_pretty(&sidecar)
        .map_err(|e| GrabError::io(path, std::io::Error::other(e)))?;
    std::fs::write(path, json + "\n").map_err(|e| GrabError::io(path, e))
}
