// src/cli.rs
// =============================================================================
// This file defines our command-line interface using the `clap` crate.
//
// Two subcommands share most of their flags, so the shared ones live in
// two `#[derive(Args)]` structs that each subcommand flattens in:
// - SourceArgs: what to fetch (repo, path, ref)
// - OutputArgs: how to write it (zip, metadata, collisions, report format)
// =============================================================================

use crate::github::RefKind;
use crate::output::CollisionPolicy;
use crate::resolve::DiscoveryMode;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "repo-grabber",
    version,
    about = "Fetch a single folder (or every skill folder) out of a GitHub repository",
    long_about = "repo-grabber downloads a repository snapshot as a tar.gz archive, extracts it \
                  into a temporary workspace and copies only the folders you asked for. \
                  No git clone, no API token."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    ///
    /// REPO_GRABBER_LOG overrides this with a full filter expression.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Copy one folder of a repository
    ///
    /// Example: repo-grabber fetch-folder https://github.com/owner/repo/tree/main/docs
    FetchFolder {
        #[command(flatten)]
        source: SourceArgs,

        /// Folder the output is written into
        #[arg(long, default_value = ".")]
        dest: PathBuf,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Copy every folder that contains a marker file (SKILL.md by default)
    ///
    /// Example: repo-grabber fetch-skills owner/skills --dest ./skills --mode top
    FetchSkills {
        #[command(flatten)]
        source: SourceArgs,

        /// Folder the outputs are written into
        #[arg(long)]
        dest: PathBuf,

        /// single: just --path; top: marker folders directly under it;
        /// recursive: marker folders at any depth
        #[arg(long, value_enum, default_value_t = DiscoveryMode::Recursive)]
        mode: DiscoveryMode,

        /// File name that marks a folder as a match
        #[arg(long, default_value = "SKILL.md")]
        marker: String,

        /// Only list what would be copied
        #[arg(long)]
        list: bool,

        #[command(flatten)]
        output: OutputArgs,
    },
}

#[derive(Args, Debug, Clone)]
pub struct SourceArgs {
    /// GitHub URL (https://github.com/owner/repo/tree/ref/path) or owner/repo[/path]
    pub source: String,

    /// Folder inside the repository (overrides any path in the URL)
    #[arg(long)]
    pub path: Option<String>,

    /// Branch, tag or commit (default: try main, master, develop)
    #[arg(long = "ref", value_name = "REF")]
    pub git_ref: Option<String>,

    /// How to interpret --ref when auto-detection guesses wrong
    #[arg(long, value_enum)]
    pub ref_kind: Option<RefKind>,
}

#[derive(Args, Debug, Clone)]
pub struct OutputArgs {
    /// Also write <name>.tar.gz next to each copied folder
    #[arg(long)]
    pub zip: bool,

    /// Also write <name>.source.json describing where it came from
    #[arg(long)]
    pub metadata: bool,

    /// What to do when the output name already exists
    #[arg(long, value_enum, default_value_t = CollisionPolicy::TimestampSuffix)]
    pub on_collision: CollisionPolicy,

    /// Print the report as JSON instead of a table
    #[arg(long)]
    pub json: bool,

    /// Also write the JSON report to FILE
    #[arg(long, value_name = "FILE")]
    pub report: Option<PathBuf>,
}
