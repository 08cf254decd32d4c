// src/main.rs
// =============================================================================
// This is the entry point of our CLI application.
//
// What happens here:
// 1. Parse command-line arguments using clap
// 2. Install the tracing subscriber (logs go to stderr)
// 3. Turn the subcommand into a RunRequest and run it
// 4. Print the report and exit with its code:
//      0 success, 1 invalid input, 2 network/ref, 3 destination/filesystem,
//      4 unsafe archive, 130 interrupted
// =============================================================================

mod cli;
mod config;
mod error;
mod github;
mod output;
mod report;
mod resolve;
mod run;
mod workspace;

#[cfg(test)]
mod testing;

use anyhow::{bail, Context, Result};
use clap::Parser;
use cli::{Cli, Commands, OutputArgs, SourceArgs};
use config::Settings;
use github::{ArchiveFetcher, HttpTransport, ReferenceInput};
use resolve::DiscoveryMode;
use run::{Orchestrator, RunRequest};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

const EXIT_INTERRUPTED: i32 = 130;

// A current-thread runtime is enough: one download at a time, and Ctrl-C
// handling only needs the signal future to be polled alongside the run
#[tokio::main(flavor = "current_thread")]
async fn main() {
    let exit_code = match run().await {
        Ok(code) => code,
        Err(e) => {
            // Anything that fails before a run starts is a usage problem
            eprintln!("Error: {:#}", e);
            1
        }
    };

    std::process::exit(exit_code);
}

async fn run() -> Result<i32> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let settings = Settings::from_env()?;
    let (request, output) = build_request(cli.command)?;

    let transport = HttpTransport::new(&settings).context("failed to build HTTP client")?;
    let mut orchestrator = Orchestrator::new(ArchiveFetcher::new(transport, &settings));

    if !output.json {
        println!("🔍 Fetching {}", request.input.source);
    }

    // Losing the race drops the run future, and with it the workspace
    let finished = tokio::select! {
        report = orchestrator.run(&request) => Some(report),
        _ = tokio::signal::ctrl_c() => None,
    };

    let Some(report) = finished else {
        eprintln!("Interrupted, temporary files removed");
        return Ok(EXIT_INTERRUPTED);
    };

    report::print_report(&report, output.json)?;
    if let Some(path) = &output.report {
        report::write_report(&report, path)?;
    }

    Ok(report.exit_code())
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_env("REPO_GRABBER_LOG")
        .unwrap_or_else(|_| EnvFilter::new(format!("repo_grabber={}", level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

fn build_request(command: Commands) -> Result<(RunRequest, OutputArgs)> {
    match command {
        Commands::FetchFolder {
            source,
            dest,
            output,
        } => {
            let request = request_from(
                source,
                DiscoveryMode::Single,
                "SKILL.md".to_string(),
                dest,
                &output,
                false,
            );
            Ok((request, output))
        }
        Commands::FetchSkills {
            source,
            dest,
            mode,
            marker,
            list,
            output,
        } => {
            validate_marker(&marker)?;
            let request = request_from(source, mode, marker, dest, &output, list);
            Ok((request, output))
        }
    }
}

fn request_from(
    source: SourceArgs,
    mode: DiscoveryMode,
    marker: String,
    dest: PathBuf,
    output: &OutputArgs,
    list_only: bool,
) -> RunRequest {
    RunRequest {
        input: ReferenceInput {
            source: source.source,
            path: source.path,
            git_ref: source.git_ref,
            ref_kind: source.ref_kind,
        },
        mode,
        marker,
        dest,
        collision: output.on_collision,
        archive: output.zip,
        metadata: output.metadata,
        list_only,
    }
}

// The marker is matched against file names, so it must be one
fn validate_marker(marker: &str) -> Result<()> {
    if marker.trim().is_empty() {
        bail!("--marker must not be empty");
    }
    if marker.contains(['/', '\\']) || marker == "." || marker == ".." {
        bail!("--marker must be a plain file name, got '{}'", marker);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_marker() {
        assert!(validate_marker("SKILL.md").is_ok());
        assert!(validate_marker("AGENT.md").is_ok());
        assert!(validate_marker("").is_err());
        assert!(validate_marker("skills/SKILL.md").is_err());
        assert!(validate_marker("..").is_err());
    }

    #[test]
    fn test_fetch_folder_builds_single_request() {
        let cli = Cli::parse_from([
            "repo-grabber",
            "fetch-folder",
            "owner/repo",
            "--path",
            "docs",
            "--zip",
            "--on-collision",
            "overwrite",
        ]);
        let (request, output) = build_request(cli.command).unwrap();

        assert_eq!(request.mode, DiscoveryMode::Single);
        assert_eq!(request.input.path.as_deref(), Some("docs"));
        assert!(request.archive);
        assert!(!request.list_only);
        assert_eq!(request.collision, output.on_collision);
    }

    #[test]
    fn test_fetch_skills_rejects_bad_marker() {
        let cli = Cli::parse_from([
            "repo-grabber",
            "fetch-skills",
            "owner/repo",
            "--dest",
            "out",
            "--marker",
            "a/b.md",
        ]);
        assert!(build_request(cli.command).is_err());
    }
}
