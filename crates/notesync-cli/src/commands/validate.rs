//! The validate command

use std::path::Path;

use colored::Colorize;
use notesync_core::Settings;

use crate::error::Result;

/// Load and check a configuration file, printing any warnings.
pub fn run_validate(config: &Path) -> Result<()> {
    println!("{} Checking {}...", "=>".blue().bold(), config.display());

    let settings = Settings::load(config)?;
    let warnings = settings.validate()?;

    for warning in &warnings {
        println!("   {} {}", "!".yellow(), warning);
    }
    println!(
        "{} {} collection(s), {} warning(s)",
        "OK".green().bold(),
        settings.collections.len(),
        warnings.len()
    );
    Ok(())
}
