//! notesync CLI
//!
//! Loads a configuration and an item feed, then keeps a folder of Markdown
//! documents in step with it.

mod cli;
mod commands;
mod error;
mod logging;

use clap::Parser;
use colored::Colorize;

use cli::{Cli, Commands};
use error::Result;

fn main() {
    if let Err(e) = run() {
        eprintln!("{}: {}", "error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    if let Err(e) = logging::init(cli.verbose) {
        eprintln!("{}: failed to initialize logging: {}", "warning".yellow().bold(), e);
    }
    tracing::debug!("Verbose mode enabled");

    match cli.command {
        Some(Commands::Sync(args)) => commands::run_sync(&args),
        Some(Commands::Validate { config }) => commands::run_validate(&config),
        None => {
            println!("{} Markdown notes for remote issues", "notesync".green().bold());
            println!();
            println!("Run {} for available commands.", "notesync --help".cyan());
            Ok(())
        }
    }
}
