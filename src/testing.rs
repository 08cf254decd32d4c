// src/testing.rs
// =============================================================================
// Test-only helpers: a tar.gz fixture builder and a stub archive transport,
// so fetch and run tests never touch the network.
// =============================================================================

use crate::github::{ArchiveTransport, DownloadOutcome, TransportError};
use async_trait::async_trait;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tar::{EntryType, Header};

/// One entry of a fixture archive.
///
/// The name is written straight into the header bytes, so fixtures can carry
/// paths the tar builder itself would refuse (`../evil.txt`, `/abs`).
pub struct RawEntry {
    name: String,
    contents: Vec<u8>,
    link: Option<String>,
}

impl RawEntry {
    pub fn file(name: &str, contents: &str) -> Self {
        Self {
            name: name.to_string(),
            contents: contents.as_bytes().to_vec(),
            link: None,
        }
    }

    pub fn symlink(name: &str, target: &str) -> Self {
        Self {
            name: name.to_string(),
            contents: Vec::new(),
            link: Some(target.to_string()),
        }
    }
}

/// Builds an in-memory .tar.gz from fixture entries
pub fn targz(entries: &[RawEntry]) -> Vec<u8> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);

    for entry in entries {
        let mut header = Header::new_gnu();
        let name = entry.name.as_bytes();
        header.as_old_mut().name[..name.len()].copy_from_slice(name);
        header.set_mode(0o644);
        header.set_mtime(0);

        match &entry.link {
            Some(target) => {
                header.set_entry_type(EntryType::Symlink);
                header.set_size(0);
                header.set_link_name(target).unwrap();
            }
            None => {
                header.set_entry_type(EntryType::Regular);
                header.set_size(entry.contents.len() as u64);
            }
        }

        header.set_cksum();
        builder.append(&header, entry.contents.as_slice()).unwrap();
    }

    builder.into_inner().unwrap().finish().unwrap()
}

/// Convenience wrapper: a snapshot rooted at `<top>/` holding `files`
pub fn snapshot(top: &str, files: &[(&str, &str)]) -> Vec<u8> {
    let entries: Vec<RawEntry> = files
        .iter()
        .map(|(path, contents)| RawEntry::file(&format!("{}/{}", top, path), contents))
        .collect();
    targz(&entries)
}

pub fn write_archive(dir: &Path, bytes: &[u8]) -> PathBuf {
    let path = dir.join("fixture.tar.gz");
    std::fs::write(&path, bytes).unwrap();
    path
}

/// What the stub should answer for one URL
#[derive(Clone)]
pub enum StubResponse {
    Archive(Vec<u8>),
    NotFound,
    Status(u16),
    /// Fail with a transport error `n` times, then serve the archive
    Flaky(u32, Vec<u8>),
}

/// In-memory transport keyed by URL suffix
pub struct StubTransport {
    responses: HashMap<String, StubResponse>,
    calls: Mutex<Vec<String>>,
    failures: Mutex<HashMap<String, u32>>,
}

impl StubTransport {
    pub fn new() -> Self {
        Self {
            responses: HashMap::new(),
            calls: Mutex::new(Vec::new()),
            failures: Mutex::new(HashMap::new()),
        }
    }

    /// Registers a response for every URL ending in `suffix`
    pub fn on(mut self, suffix: &str, response: StubResponse) -> Self {
        self.responses.insert(suffix.to_string(), response);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ArchiveTransport for StubTransport {
    async fn download(
        &self,
        url: &str,
        dest: &Path,
    ) -> Result<DownloadOutcome, TransportError> {
        self.calls.lock().unwrap().push(url.to_string());

        let response = self
            .responses
            .iter()
            .find(|(suffix, _)| url.ends_with(suffix.as_str()))
            .map(|(_, response)| response.clone())
            .unwrap_or(StubResponse::NotFound);

        let bytes = match response {
            StubResponse::NotFound => return Ok(DownloadOutcome::NotFound),
            StubResponse::Status(code) => return Err(TransportError::Status(code)),
            StubResponse::Archive(bytes) => bytes,
            StubResponse::Flaky(times, bytes) => {
                let mut failures = self.failures.lock().unwrap();
                let seen = failures.entry(url.to_string()).or_insert(0);
                if *seen < times {
                    *seen += 1;
                    // Leave a partial file behind like a dropped connection would
                    std::fs::write(dest, b"partial").map_err(TransportError::Io)?;
                    return Err(TransportError::Transport("connection reset".to_string()));
                }
                bytes
            }
        };

        std::fs::write(dest, &bytes).map_err(TransportError::Io)?;
        Ok(DownloadOutcome::Saved {
            bytes: bytes.len() as u64,
        })
    }
}
