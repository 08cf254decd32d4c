// src/error.rs
// =============================================================================
// The error taxonomy for a grab run.
//
// Every failure the pipeline can produce is one variant of `GrabError`.
// Each variant knows:
// - its stable snake_case `kind()` (used in the JSON report)
// - its process exit code (used by main.rs)
//
// Exit codes:
//   1 = invalid input (bad reference, path not in the snapshot)
//   2 = network / ref failure
//   3 = destination / filesystem failure
//   4 = unsafe or malformed archive
// =============================================================================

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GrabError {
    /// The input could not be turned into an owner/repo reference
    #[error("invalid repository reference '{input}': {reason}")]
    InvalidReference { input: String, reason: String },

    /// Every candidate ref returned 404
    #[error("no matching ref found (tried: {})", attempted.join(", "))]
    RefNotFound { attempted: Vec<String> },

    /// Transport failure or unexpected HTTP status
    #[error("network error fetching {url}: {message}")]
    Network { url: String, message: String },

    /// An archive entry would land outside the extraction root
    #[error("unsafe archive entry '{entry}' escapes the extraction root")]
    UnsafeArchiveEntry { entry: String },

    #[error("malformed archive: {reason}")]
    MalformedArchive { reason: String },

    /// The requested sub-path does not exist in the snapshot
    #[error("path '{path}' not found in snapshot{}", format_suggestions(suggestions))]
    PathNotFound {
        path: String,
        suggestions: Vec<String>,
    },

    /// Only produced under the `abort` collision policy
    #[error("destination already exists: {}", path.display())]
    DestinationExists { path: PathBuf },

    /// One match in a discovery run failed to materialize
    #[error("failed to materialize '{source_path}': {message}")]
    PartialMaterialization { source_path: String, message: String },

    #[error("filesystem error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl GrabError {
    /// Wraps an io::Error together with the path it happened on
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        GrabError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            GrabError::InvalidReference { .. } => "invalid_reference",
            GrabError::RefNotFound { .. } => "ref_not_found",
            GrabError::Network { .. } => "network_error",
            GrabError::UnsafeArchiveEntry { .. } => "unsafe_archive_entry",
            GrabError::MalformedArchive { .. } => "malformed_archive",
            GrabError::PathNotFound { .. } => "path_not_found",
            GrabError::DestinationExists { .. } => "destination_exists",
            GrabError::PartialMaterialization { .. } => "partial_materialization_failure",
            GrabError::Io { .. } => "io_error",
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            GrabError::InvalidReference { .. } | GrabError::PathNotFound { .. } => 1,
            GrabError::RefNotFound { .. } | GrabError::Network { .. } => 2,
            GrabError::DestinationExists { .. }
            | GrabError::PartialMaterialization { .. }
            | GrabError::Io { .. } => 3,
            GrabError::UnsafeArchiveEntry { .. } | GrabError::MalformedArchive { .. } => 4,
        }
    }

    /// Suggestions carried by `PathNotFound`, empty for every other variant
    pub fn suggestions(&self) -> &[String] {
        match self {
            GrabError::PathNotFound { suggestions, .. } => suggestions,
            _ => &[],
        }
    }
}

fn format_suggestions(suggestions: &[String]) -> String {
    if suggestions.is_empty() {
        String::new()
    } else {
        format!(" (did you mean: {}?)", suggestions.join(", "))
    }
}

pub type Result<T> = std::result::Result<T, GrabError>;
