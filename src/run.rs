// src/run.rs
// =============================================================================
// One run of either command, start to finish.
//
// States, in order:
//   Init -> Parsing -> Fetching -> Resolving -> Materializing -> Reporting -> Done
// Any fatal error moves the run to Failed and is recorded in the report.
//
// The Workspace lives inside `execute`, so it is dropped (and the temp folder
// removed) on every way out of that function: Ok, `?`, or the whole future
// being dropped by main.rs on Ctrl-C.
// =============================================================================

use crate::error::{GrabError, Result};
use crate::github::{ArchiveFetcher, ArchiveTransport, ReferenceInput, RepoReference};
use crate::output::{output_names, CollisionPolicy, MaterializeOptions, Materializer, SourceMetadata};
use crate::report::RunReport;
use crate::resolve::{self, DiscoveryMode};
use crate::workspace::Workspace;
use chrono::{DateTime, Local};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Init,
    Parsing,
    Fetching,
    Resolving,
    Materializing,
    Reporting,
    Done,
    Failed,
}

/// Everything one run needs, already validated by the CLI layer
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub input: ReferenceInput,
    pub mode: DiscoveryMode,
    /// Ignored in Single mode
    pub marker: String,
    pub dest: PathBuf,
    pub collision: CollisionPolicy,
    pub archive: bool,
    pub metadata: bool,
    /// Resolve and report matches without copying anything
    pub list_only: bool,
}

pub struct Orchestrator<T> {
    fetcher: ArchiveFetcher<T>,
    workspace_parent: Option<PathBuf>,
    state: RunState,
}

impl<T: ArchiveTransport> Orchestrator<T> {
    pub fn new(fetcher: ArchiveFetcher<T>) -> Self {
        Self {
            fetcher,
            workspace_parent: None,
            state: RunState::Init,
        }
    }

    /// Creates workspaces under `parent` instead of the system temp dir
    #[cfg(test)]
    pub fn with_workspace_parent(mut self, parent: impl Into<PathBuf>) -> Self {
        self.workspace_parent = Some(parent.into());
        self
    }

    #[cfg(test)]
    pub fn state(&self) -> RunState {
        self.state
    }

    /// Runs the request to completion. Never fails: errors end up in the report.
    pub async fn run(&mut self, request: &RunRequest) -> RunReport {
        self.state = RunState::Init;
        let started_at = Local::now();
        let marker = (request.mode != DiscoveryMode::Single).then(|| request.marker.clone());
        let mut report = RunReport::new(
            &request.input.source,
            request.mode,
            marker,
            &request.dest,
            request.list_only,
            started_at.to_rfc3339(),
        );

        match self.execute(request, &mut report, started_at).await {
            Ok(()) => {
                self.transition(RunState::Reporting);
                info!(
                    matches = report.matches.len(),
                    failed = report.failed_matches(),
                    "run finished"
                );
                self.transition(RunState::Done);
            }
            Err(e) => {
                error!(state = ?self.state, kind = e.kind(), "{}", e);
                report.record_failure(&e, self.state);
                self.transition(RunState::Failed);
            }
        }

        report
    }

    async fn execute(
        &mut self,
        request: &RunRequest,
        report: &mut RunReport,
        started_at: DateTime<Local>,
    ) -> Result<()> {
        self.transition(RunState::Parsing);
        let reference = RepoReference::parse(&request.input)?;
        report.record_reference(&reference);
        info!("resolved reference {}", reference);

        self.transition(RunState::Fetching);
        let workspace = match &self.workspace_parent {
            Some(parent) => Workspace::create_in(parent)?,
            None => Workspace::create()?,
        };
        debug!(workspace = %workspace.root().display(), "fetching {}", reference.slug());
        let snapshot = self.fetcher.fetch(&reference, &workspace).await?;
        report.record_snapshot(&snapshot);
        debug!(
            entries = snapshot.extracted.entries,
            bytes = snapshot.extracted.bytes,
            "snapshot extracted"
        );

        self.transition(RunState::Resolving);
        let result = resolve::resolve(
            workspace.extract_root(),
            &reference,
            request.mode,
            &request.marker,
        )?;
        let names = output_names(&result);

        self.transition(RunState::Materializing);
        if request.list_only {
            for (m, name) in result.matches.iter().zip(&names) {
                report.record_listed(m, name);
            }
            return workspace.close();
        }

        let metadata = request.metadata.then(|| SourceMetadata {
            repository: reference.slug(),
            source: request.input.source.clone(),
            git_ref: snapshot.ref_used.name.clone(),
            ref_kind: snapshot.ref_used.kind,
            archive_url: snapshot.url.clone(),
            mode: request.mode,
            marker: report.marker.clone(),
            fetched_at: started_at.to_rfc3339(),
        });

        let materializer = Materializer::new(
            MaterializeOptions {
                dest_root: request.dest.clone(),
                collision: request.collision,
                archive: request.archive,
                metadata,
            },
            started_at,
        );

        for (m, name) in result.matches.iter().zip(&names) {
            match materializer.materialize(m, name) {
                Ok(output) => {
                    info!(to = %output.destination_path.display(), "copied {}", m.relative_display());
                    report.record_output(m, name, output);
                }
                // Single mode has nothing else to do, so a failure is the run's failure
                Err(e) if request.mode == DiscoveryMode::Single => return Err(e),
                Err(e) => {
                    warn!("skipping {}: {}", m.relative_display(), e);
                    let failure = GrabError::PartialMaterialization {
                        source_path: m.relative_display(),
                        message: e.to_string(),
                    };
                    report.record_match_failure(m, name, &failure);
                }
            }
        }

        workspace.close()
    }

    fn transition(&mut self, next: RunState) {
        debug!(from = ?self.state, to = ?next, "state change");
        self.state = next;
    }
}
