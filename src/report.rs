// src/report.rs
// =============================================================================
// The end-of-run report: one entry per resolved match, or a single failure.
//
// Two renderings:
// - a human-readable summary (default)
// - pretty JSON (--json, and always for --report FILE) for scripting
// =============================================================================

use crate::error::GrabError;
use crate::github::{FetchedSnapshot, RefCandidate, RepoReference};
use crate::output::MaterializedOutput;
use crate::resolve::{DiscoveryMode, Match};
use crate::run::RunState;
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    /// Some matches were materialized, some failed
    Partial,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailureReport {
    pub kind: String,
    pub message: String,
    pub exit_code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_during: Option<RunState>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
}

impl FailureReport {
    pub fn from_error(error: &GrabError, failed_during: Option<RunState>) -> Self {
        Self {
            kind: error.kind().to_string(),
            message: error.to_string(),
            exit_code: error.exit_code(),
            failed_during,
            suggestions: error.suggestions().to_vec(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MatchOutcome {
    Materialized(MaterializedOutput),
    /// --list: found, not copied
    Listed,
    Failed(FailureReport),
}

#[derive(Debug, Clone, Serialize)]
pub struct MatchReport {
    /// Path inside the repository, "." for the root
    pub path: String,
    pub output_name: String,
    #[serde(flatten)]
    pub outcome: MatchOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub status: RunStatus,
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_path: Option<String>,
    pub mode: DiscoveryMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marker: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ref_used: Option<RefCandidate>,
    pub refs_attempted: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archive_url: Option<String>,
    pub destination: PathBuf,
    pub listed_only: bool,
    pub matches: Vec<MatchReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<FailureReport>,
    pub started_at: String,
}

impl RunReport {
    pub fn new(
        source: &str,
        mode: DiscoveryMode,
        marker: Option<String>,
        destination: &Path,
        listed_only: bool,
        started_at: String,
    ) -> Self {
        Self {
            status: RunStatus::Success,
            source: source.to_string(),
            repository: None,
            sub_path: None,
            mode,
            marker,
            ref_used: None,
            refs_attempted: Vec::new(),
            archive_url: None,
            destination: destination.to_path_buf(),
            listed_only,
            matches: Vec::new(),
            error: None,
            started_at,
        }
    }

    pub fn record_reference(&mut self, reference: &RepoReference) {
        self.repository = Some(reference.slug());
        self.sub_path = Some(reference.sub_path_display());
    }

    pub fn record_snapshot(&mut self, snapshot: &FetchedSnapshot) {
        self.ref_used = Some(snapshot.ref_used.clone());
        self.refs_attempted = snapshot.attempted.clone();
        self.archive_url = Some(snapshot.url.clone());
    }

    pub fn record_listed(&mut self, m: &Match, output_name: &str) {
        self.matches.push(MatchReport {
            path: m.relative_display(),
            output_name: output_name.to_string(),
            outcome: MatchOutcome::Listed,
        });
    }

    pub fn record_output(&mut self, m: &Match, output_name: &str, output: MaterializedOutput) {
        self.matches.push(MatchReport {
            path: m.relative_display(),
            output_name: output_name.to_string(),
            outcome: MatchOutcome::Materialized(output),
        });
    }

    pub fn record_match_failure(&mut self, m: &Match, output_name: &str, error: &GrabError) {
        self.matches.push(MatchReport {
            path: m.relative_display(),
            output_name: output_name.to_string(),
            outcome: MatchOutcome::Failed(FailureReport::from_error(error, None)),
        });
        self.status = RunStatus::Partial;
    }

    /// Marks the whole run as failed
    pub fn record_failure(&mut self, error: &GrabError, state: RunState) {
        if let GrabError::RefNotFound { attempted } = error {
            self.refs_attempted = attempted.clone();
        }
        self.error = Some(FailureReport::from_error(error, Some(state)));
        self.status = RunStatus::Failed;
    }

    pub fn failed_matches(&self) -> usize {
        self.matches
            .iter()
            .filter(|m| matches!(m.outcome, MatchOutcome::Failed(_)))
            .count()
    }

    pub fn exit_code(&self) -> i32 {
        match &self.error {
            Some(failure) => failure.exit_code,
            None if self.failed_matches() > 0 => 3,
            None => 0,
        }
    }
}

/// Prints the report either as JSON or as a human summary
pub fn print_report(report: &RunReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        print_summary(report);
    }
    Ok(())
}

pub fn write_report(report: &RunReport, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, json + "\n")
        .with_context(|| format!("failed to write report to {}", path.display()))
}

fn print_summary(report: &RunReport) {
    println!("📦 Repository: {}", report.repository.as_deref().unwrap_or(&report.source));
    if let Some(sub_path) = report.sub_path.as_deref().filter(|p| !p.is_empty()) {
        println!("📁 Path: {}", sub_path);
    }
    if let Some(ref_used) = &report.ref_used {
        println!("🔖 Ref: {} ({})", ref_used.name, ref_used.kind);
    }
    if report.mode != DiscoveryMode::Single {
        println!(
            "🔍 Mode: {} (marker: {})",
            report.mode,
            report.marker.as_deref().unwrap_or("-")
        );
    }

    if let Some(error) = &report.error {
        println!();
        println!("❌ {}", error.message);
        for suggestion in &error.suggestions {
            println!("   💡 {}", suggestion);
        }
        if !report.refs_attempted.is_empty() {
            println!("   Refs tried: {}", report.refs_attempted.join(", "));
        }
        return;
    }

    println!();

    if report.matches.is_empty() {
        println!("⚠️  No matching folders found");
        return;
    }

    println!("{:<40} {:<12} {:>8} {:>12}", "PATH", "STATUS", "FILES", "BYTES");
    println!("{}", "=".repeat(75));

    let mut total_files = 0;
    let mut total_bytes = 0;

    for entry in &report.matches {
        let path = truncate(&entry.path, 40);
        match &entry.outcome {
            MatchOutcome::Materialized(output) => {
                total_files += output.file_count;
                total_bytes += output.total_bytes;
                println!(
                    "{:<40} {:<12} {:>8} {:>12}",
                    path, "✅ COPIED", output.file_count, output.total_bytes
                );
                println!("   → {}", output.destination_path.display());
                if let Some(archive) = &output.created_archive {
                    println!("   🗜  {}", archive.display());
                }
            }
            MatchOutcome::Listed => {
                println!("{:<40} {:<12} {:>8} {:>12}", path, "📋 FOUND", "-", "-");
            }
            MatchOutcome::Failed(failure) => {
                println!("{:<40} {:<12} {:>8} {:>12}", path, "❌ FAILED", "-", "-");
                println!("   {}", failure.message);
            }
        }
    }

    println!();
    println!("📊 Summary:");
    println!("   📋 Matches: {}", report.matches.len());
    if !report.listed_only {
        println!("   ✅ Copied: {}", report.matches.len() - report.failed_matches());
        println!("   ❌ Failed: {}", report.failed_matches());
        println!("   📄 Files: {} ({} bytes)", total_files, total_bytes);
        println!("   📂 Destination: {}", report.destination.display());
    }
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() > width {
        let kept: String = text.chars().take(width - 3).collect();
        format!("{}...", kept)
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_match() -> Match {
        Match {
            path: PathBuf::from("/tmp/snap/skills/pdf"),
            relative: PathBuf::from("skills/pdf"),
            leaf: "pdf".to_string(),
        }
    }

    fn empty_report() -> RunReport {
        RunReport::new(
            "owner/repo",
            DiscoveryMode::Recursive,
            Some("SKILL.md".to_string()),
            Path::new("out"),
            false,
            "2026-10-18T09:30:00+00:00".to_string(),
        )
    }

    #[test]
    fn test_zero_matches_is_success() {
        let report = empty_report();
        assert_eq!(report.status, RunStatus::Success);
        assert_eq!(report.exit_code(), 0);
    }

    #[test]
    fn test_partial_failure_exit_code() {
        let mut report = empty_report();
        report.record_output(
            &sample_match(),
            "pdf",
            MaterializedOutput {
                destination_path: PathBuf::from("out/pdf"),
                created_archive: None,
                metadata_path: None,
                file_count: 1,
                total_bytes: 3,
            },
        );
        report.record_match_failure(
            &sample_match(),
            "pdf",
            &GrabError::PartialMaterialization {
                source_path: "skills/pdf".to_string(),
                message: "disk full".to_string(),
            },
        );

        assert_eq!(report.status, RunStatus::Partial);
        assert_eq!(report.failed_matches(), 1);
        assert_eq!(report.exit_code(), 3);
    }

    #[test]
    fn test_fatal_failure_keeps_attempted_refs() {
        let mut report = empty_report();
        report.record_failure(
            &GrabError::RefNotFound {
                attempted: vec!["main".into(), "master".into(), "develop".into()],
            },
            RunState::Fetching,
        );

        assert_eq!(report.status, RunStatus::Failed);
        assert_eq!(report.exit_code(), 2);
        assert_eq!(report.refs_attempted.len(), 3);
    }

    #[test]
    fn test_json_shape() {
        let mut report = empty_report();
        report.record_listed(&sample_match(), "pdf");

        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["status"], "success");
        assert_eq!(value["mode"], "recursive");
        assert_eq!(value["matches"][0]["outcome"], "listed");
        assert_eq!(value["matches"][0]["path"], "skills/pdf");
        assert!(value.get("error").is_none());
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a-very-long-path-name", 10), "a-very-...");
    }
}
