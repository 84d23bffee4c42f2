//! CLI argument parsing using clap derive

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// notesync - Keep a folder of Markdown notes in step with remote issues
#[derive(Parser, Debug)]
#[command(name = "notesync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// The command to run
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Synchronize documents with an item feed
    ///
    /// Examples:
    ///   notesync sync --items feed.json
    ///   notesync sync --items feed.json --dry-run
    ///   notesync sync -c notes/notesync.toml --items feed.json --json
    Sync(SyncArgs),

    /// Check a configuration file and report template problems
    Validate {
        /// Configuration file
        #[arg(short, long, default_value = "notesync.toml", env = "NOTESYNC_CONFIG")]
        config: PathBuf,
    },
}

/// Arguments of `notesync sync`
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct SyncArgs {
    /// Configuration file
    #[arg(short, long, default_value = "notesync.toml", env = "NOTESYNC_CONFIG")]
    pub config: PathBuf,

    /// JSON feed: an array of {"collection": ..., "items": [...]} entries
    #[arg(short, long)]
    pub items: PathBuf,

    /// Folder documents live in (defaults to the configuration file's folder)
    #[arg(short, long)]
    pub root: Option<PathBuf>,

    /// Preview changes without applying them
    #[arg(long)]
    pub dry_run: bool,

    /// Output the report as JSON
    #[arg(long)]
    pub json: bool,

    /// Reference time for retention, RFC 3339 (defaults to the current time)
    #[arg(long)]
    pub now: Option<String>,
}
