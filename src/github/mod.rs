// src/github/mod.rs
// =============================================================================
// This module handles everything that talks about, or to, GitHub.
//
// Submodules:
// - reference: Parsing GitHub URLs / owner/repo into a RepoReference
// - fetch: Downloading the snapshot archive with ref fallback and retries
// - extract: Unpacking the archive with a path-traversal guard
// =============================================================================

pub mod extract;
mod fetch;
mod reference;

// Re-export the public API so callers can write `github::RepoReference`
pub use fetch::{
    ArchiveFetcher, ArchiveTransport, DownloadOutcome, FetchedSnapshot, HttpTransport,
    TransportError,
};
pub use reference::{RefCandidate, RefKind, ReferenceInput, RepoReference};
