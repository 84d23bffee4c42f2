//! The sync command
//!
//! Runs one pass per collection found in the feed: the sync engine first,
//! then lifecycle cleanup when the collection enables it.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use colored::Colorize;

use notesync_content::parse_timestamp;
use notesync_core::{
    CollectionFeed, LifecycleReconciler, Settings, SyncAction, SyncEngine, SyncOptions, SyncReport,
};
use notesync_fs::FsStore;

use crate::cli::SyncArgs;
use crate::error::{CliError, Result};

/// Run the sync command
pub fn run_sync(args: &SyncArgs) -> Result<()> {
    let settings = Settings::load(&args.config)?;
    for warning in settings.validate()? {
        eprintln!("{} {}", "warning:".yellow().bold(), warning);
    }

    let feed = std::fs::read_to_string(&args.items).map_err(|source| CliError::Read {
        path: args.items.clone(),
        source,
    })?;
    let feeds = CollectionFeed::parse_all(&feed)?;

    let now = match args.now.as_deref() {
        Some(value) => parse_timestamp(value)
            .ok_or_else(|| CliError::user(format!("Invalid --now timestamp: {}", value)))?,
        None => Utc::now(),
    };
    let root = resolve_root(args.root.as_deref(), &args.config);
    let options = SyncOptions {
        dry_run: args.dry_run,
    };

    if !args.json {
        let verb = if args.dry_run { "Previewing" } else { "Synchronizing" };
        println!(
            "{} {} {} collection(s) into {}",
            "=>".blue().bold(),
            verb,
            feeds.len(),
            root.display()
        );
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let report = runtime.block_on(sync_feeds(&settings, &feeds, &root, options, now));

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    let failed = report.count("failed");
    if failed > 0 {
        return Err(CliError::user(format!("{} item(s) failed to synchronize", failed)));
    }
    Ok(())
}

/// The store root: `--root`, else the folder holding the configuration.
fn resolve_root(root: Option<&Path>, config: &Path) -> PathBuf {
    if let Some(root) = root {
        return root.to_path_buf();
    }
    match config.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

async fn sync_feeds(
    settings: &Settings,
    feeds: &[CollectionFeed],
    root: &Path,
    options: SyncOptions,
    now: DateTime<Utc>,
) -> SyncReport {
    let store = FsStore::new(root);
    let mut report = SyncReport::new(options.dry_run);

    for feed in feeds {
        let Some(collection) = settings.collection(&feed.collection) else {
            tracing::warn!(collection = %feed.collection, "Collection is not configured, skipping");
            report
                .warnings
                .push(format!("collection \"{}\" is not configured; skipped", feed.collection));
            continue;
        };

        let synced = SyncEngine::new(&store, settings, options)
            .with_now(now)
            .sync_collection(collection, &feed.items)
            .await;
        report.extend(synced);

        if collection.cleanup {
            let reconciled = LifecycleReconciler::new(&store, settings, options, now)
                .reconcile(collection, &feed.items)
                .await;
            report.extend(reconciled);
        }
    }

    report
}

fn print_report(report: &SyncReport) {
    for warning in &report.warnings {
        println!("   {} {}", "!".yellow(), warning);
    }

    for item in &report.items {
        let marker = match &item.action {
            SyncAction::Created | SyncAction::Updated { .. } | SyncAction::Appended => "+".green(),
            SyncAction::Deleted { .. } | SyncAction::FolderRemoved => "-".red(),
            SyncAction::Failed { .. } => "!".red().bold(),
            SyncAction::DeletionDenied { .. } => "!".yellow(),
            SyncAction::Skipped { .. } | SyncAction::Retained { .. } => "=".dimmed(),
        };
        println!("   {} {} {}", marker, item.path.cyan(), item.action.to_string().dimmed());
        for diagnostic in &item.diagnostics {
            println!("       {}", diagnostic.dimmed());
        }
        if let Some(preview) = &item.preview {
            for line in preview.lines() {
                println!("       {}", line);
            }
        }
    }

    let writes = report.items.iter().filter(|item| item.action.is_write()).count();
    let label = if report.dry_run { "DRY RUN" } else { "OK" };
    println!(
        "{} {} written, {} deleted, {} skipped, {} failed",
        label.green().bold(),
        writes,
        report.count("deleted"),
        report.count("skipped"),
        report.count("failed"),
    );
}
