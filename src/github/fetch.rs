// src/github/fetch.rs
// =============================================================================
// This module downloads a repository snapshot and unpacks it.
//
// Strategy:
// - Ask the reference for its ordered list of candidate refs
//   (explicit ref only, or main -> master -> develop)
// - Download `archive/refs/heads/<ref>.tar.gz` for each candidate until one
//   is not a 404
// - Extract the archive into the workspace
//
// Why the archive endpoint and not the GitHub API?
// - The API requires authentication for higher rate limits
// - One static GET gives us the whole tree in one go
//
// Retry policy (the only one in the program):
// - Transport failures (timeout, DNS, connection reset) are retried
//   `retries` times with linear backoff
// - 404 moves on to the next candidate ref
// - Any other HTTP status fails immediately
// =============================================================================

use crate::config::Settings;
use crate::error::{GrabError, Result};
use crate::github::extract::{self, ExtractStats};
use crate::github::reference::{RefCandidate, RepoReference};
use crate::workspace::Workspace;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// Result of a single download attempt that reached the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    Saved { bytes: u64 },
    NotFound,
}

#[derive(Debug)]
pub enum TransportError {
    /// Server answered with an error status other than 404
    Status(u16),
    /// Timeout, DNS, connection reset, truncated body... (retryable)
    Transport(String),
    /// Writing the download to local disk failed
    Io(std::io::Error),
}

/// Anything that can put the bytes behind a URL into a local file.
///
/// The real implementation is `HttpTransport`; tests use a stub.
#[async_trait]
pub trait ArchiveTransport: Send + Sync {
    async fn download(&self, url: &str, dest: &Path)
        -> std::result::Result<DownloadOutcome, TransportError>;
}

pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(settings: &Settings) -> anyhow::Result<Self> {
        let mut builder = Client::builder()
            .user_agent(concat!("repo-grabber/", env!("CARGO_PKG_VERSION")))
            .timeout(settings.timeout)
            .connect_timeout(settings.connect_timeout)
            .redirect(reqwest::redirect::Policy::limited(5)); // archive URLs redirect to codeload

        if let Some(proxy) = &settings.proxy {
            builder = builder.proxy(reqwest::Proxy::all(proxy)?);
        }

        Ok(Self {
            client: builder.build()?,
        })
    }
}

#[async_trait]
impl ArchiveTransport for HttpTransport {
    async fn download(
        &self,
        url: &str,
        dest: &Path,
    ) -> std::result::Result<DownloadOutcome, TransportError> {
        let mut response = self.client.get(url).send().await.map_err(describe_error)?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(DownloadOutcome::NotFound);
        }
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }

        // Stream the body to disk chunk by chunk instead of buffering it all
        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(TransportError::Io)?;
        let mut bytes = 0u64;

        while let Some(chunk) = response.chunk().await.map_err(describe_error)? {
            file.write_all(&chunk).await.map_err(TransportError::Io)?;
            bytes += chunk.len() as u64;
        }
        file.flush().await.map_err(TransportError::Io)?;

        Ok(DownloadOutcome::Saved { bytes })
    }
}

// Turns a reqwest error into a short human message
fn describe_error(error: reqwest::Error) -> TransportError {
    let message = if error.is_timeout() {
        "request timed out".to_string()
    } else if error.is_connect() {
        format!("connection failed: {}", error)
    } else if error.is_redirect() {
        "too many redirects".to_string()
    } else {
        error.to_string()
    };
    TransportError::Transport(message)
}

/// A downloaded and extracted snapshot
#[derive(Debug, Clone, Serialize)]
pub struct FetchedSnapshot {
    pub ref_used: RefCandidate,
    pub url: String,
    /// Every ref name tried, in order, including the one that worked
    pub attempted: Vec<String>,
    pub archive_bytes: u64,
    #[serde(skip)]
    pub extracted: ExtractStats,
}

pub struct ArchiveFetcher<T> {
    transport: T,
    base_url: String,
    retries: u32,
    backoff: Duration,
}

impl<T: ArchiveTransport> ArchiveFetcher<T> {
    pub fn new(transport: T, settings: &Settings) -> Self {
        Self {
            transport,
            base_url: settings.base_url.clone(),
            retries: settings.retries,
            backoff: settings.backoff,
        }
    }

    #[cfg(test)]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Downloads the first candidate ref that exists and extracts it into
    /// the workspace.
    pub async fn fetch(
        &self,
        reference: &RepoReference,
        workspace: &Workspace,
    ) -> Result<FetchedSnapshot> {
        let mut attempted = Vec::new();

        for candidate in reference.candidates() {
            let url = candidate.archive_url(&self.base_url, &reference.owner, &reference.repo);
            attempted.push(candidate.name.clone());
            debug!(%url, kind = %candidate.kind, "trying ref {}", candidate.name);

            match self.download_with_retry(&url, workspace).await? {
                DownloadOutcome::NotFound => {
                    info!("{} {} not found", candidate.kind, candidate.name);
                }
                DownloadOutcome::Saved { bytes } => {
                    info!(bytes, "downloaded {} at {}", reference.slug(), candidate.name);
                    let extracted =
                        extract::extract_targz(workspace.archive_path(), workspace.extract_root())?;

                    return Ok(FetchedSnapshot {
                        ref_used: candidate,
                        url,
                        attempted,
                        archive_bytes: bytes,
                        extracted,
                    });
                }
            }
        }

        Err(GrabError::RefNotFound { attempted })
    }

    // One candidate ref: retries transport failures, never leaves a partial
    // file where extraction would look for the archive
    async fn download_with_retry(&self, url: &str, workspace: &Workspace) -> Result<DownloadOutcome> {
        let part = workspace.partial_archive_path();
        let mut attempt: u32 = 0;

        loop {
            let result = self.transport.download(url, &part).await;

            match result {
                Ok(DownloadOutcome::Saved { bytes }) => {
                    std::fs::rename(&part, workspace.archive_path())
                        .map_err(|e| GrabError::io(workspace.archive_path(), e))?;
                    return Ok(DownloadOutcome::Saved { bytes });
                }
                Ok(DownloadOutcome::NotFound) => {
                    discard(&part);
                    return Ok(DownloadOutcome::NotFound);
                }
                Err(TransportError::Transport(message)) if attempt < self.retries => {
                    discard(&part);
                    attempt += 1;
                    let delay = self.backoff * attempt;
                    warn!(
                        %url,
                        attempt,
                        retries = self.retries,
                        "download failed ({}), retrying in {:?}",
                        message,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(TransportError::Transport(message)) => {
                    discard(&part);
                    return Err(GrabError::Network {
                        url: url.to_string(),
                        message: format!("{} (gave up after {} attempts)", message, attempt + 1),
                    });
                }
                Err(TransportError::Status(code)) => {
                    discard(&part);
                    return Err(GrabError::Network {
                        url: url.to_string(),
                        message: format!("HTTP {}", code),
                    });
                }
                Err(TransportError::Io(e)) => {
                    discard(&part);
                    return Err(GrabError::io(&part, e));
                }
            }
        }
    }
}

// Best-effort removal of an incomplete download
fn discard(part: &Path) {
    if part.exists() {
        let _ = std::fs::remove_file(part);
    }
}

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. Why is ArchiveFetcher generic over T?
//    - The fetcher only needs "something that can download a URL to a file"
//    - In production T = HttpTransport (reqwest)
//    - In tests T = StubTransport, so no test needs the internet
//
// 2. What does #[async_trait] do?
//    - It lets a trait contain async fn and still be used behind generics
//    - It rewrites the method to return a boxed future
//
// 3. Why rename the .part file instead of writing the archive directly?
//    - If the connection drops halfway, the half-written file keeps the .part
//      name and is deleted; extraction only ever sees complete downloads
// -----------------------------------------------------------------------------
