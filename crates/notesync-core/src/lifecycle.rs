//! Lifecycle reconciliation
//!
//! Decides which previously synchronized documents may go: those whose item
//! vanished from the remote and those closed for longer than the retention
//! window. Nothing is deleted without permission, resolved from the
//! document's own `allowDelete` first and the collection policy second.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use notesync_content::{Frontmatter, Template};
use notesync_fs::{DocumentStore, NormalizedPath};

use crate::config::{CollectionConfig, FolderLayout, Settings};
use crate::item::{ItemKind, RemoteItem};
use crate::render::{DOCUMENT_EXTENSION, DocumentRenderer};
use crate::sync::{ItemReport, SyncAction, SyncOptions, SyncReport};

/// Why a document stays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetainReason {
    Open,
    WithinRetention { days_closed: i64 },
    /// Closed, but the remote did not say when.
    ClosedAtUnknown,
}

/// Why a document may go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteReason {
    NoLongerTracked,
    ClosedBeyondRetention { days_closed: i64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Retain(RetainReason),
    Delete(DeleteReason),
}

impl fmt::Display for RetainReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => f.write_str("item is open"),
            Self::WithinRetention { days_closed } => {
                write!(f, "closed {} days ago, within retention window", days_closed)
            }
            Self::ClosedAtUnknown => f.write_str("closed at an unknown time"),
        }
    }
}

impl fmt::Display for DeleteReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoLongerTracked => f.write_str("item is no longer tracked"),
            Self::ClosedBeyondRetention { days_closed } => {
                write!(f, "closed {} days ago, beyond retention window", days_closed)
            }
        }
    }
}

/// Classify one document against the current fetch.
///
/// `item` is `None` when the identifier is absent from the fetch. A closed
/// item is due for deletion once it has been closed for strictly longer than
/// `retention_days`.
pub fn classify(item: Option<&RemoteItem>, now: DateTime<Utc>, retention_days: u32) -> Disposition {
    let Some(item) = item else {
        return Disposition::Delete(DeleteReason::NoLongerTracked);
    };
    if !item.common().state.is_closed() {
        return Disposition::Retain(RetainReason::Open);
    }
    let Some(closed_at) = item.closed_at() else {
        return Disposition::Retain(RetainReason::ClosedAtUnknown);
    };

    let closed_for = now - closed_at;
    let days_closed = closed_for.num_days();
    if closed_for > Duration::days(i64::from(retention_days)) {
        Disposition::Delete(DeleteReason::ClosedBeyondRetention { days_closed })
    } else {
        Disposition::Retain(RetainReason::WithinRetention { days_closed })
    }
}

/// Deletion permission: the document's override, else the policy default.
pub fn resolve_permission(doc: &Frontmatter, default: bool) -> bool {
    doc.allow_delete.unwrap_or(default)
}

/// Recovers a document's item identifier: frontmatter first, then the file
/// name read back through the filename template.
pub fn recover_identifier(
    doc: &Frontmatter,
    path: &NormalizedPath,
    filename_template: &Template,
) -> Option<String> {
    if let Some(number) = &doc.number {
        return Some(number.clone());
    }
    let stem = path.file_stem()?;
    filename_template.extract_variable(stem, "number")
}

/// Works out which item a document in a folder stands for.
///
/// Returns the identifier and the kinds that may own it: those whose filename
/// template reads the same identifier back from the file name, else every
/// kind stored in the folder. `renderers` must not be empty.
fn claim(
    doc: &Frontmatter,
    path: &NormalizedPath,
    renderers: &[(ItemKind, DocumentRenderer)],
) -> Option<(String, Vec<ItemKind>)> {
    let id = renderers
        .iter()
        .find_map(|(_, renderer)| recover_identifier(doc, path, renderer.filename_template()))?;
    let named: Vec<ItemKind> = renderers
        .iter()
        .filter(|(_, renderer)| {
            path.file_stem()
                .and_then(|stem| renderer.filename_template().extract_variable(stem, "number"))
                .is_some_and(|number| number == id)
        })
        .map(|(kind, _)| *kind)
        .collect();
    if named.is_empty() {
        Some((id, renderers.iter().map(|(kind, _)| *kind).collect()))
    } else {
        Some((id, named))
    }
}

/// Removes documents of items that are gone or long closed
pub struct LifecycleReconciler<'a, S: DocumentStore + ?Sized> {
    store: &'a S,
    settings: &'a Settings,
    options: SyncOptions,
    now: DateTime<Utc>,
}

impl<'a, S: DocumentStore + ?Sized> LifecycleReconciler<'a, S> {
    pub fn new(store: &'a S, settings: &'a Settings, options: SyncOptions, now: DateTime<Utc>) -> Self {
        Self {
            store,
            settings,
            options,
            now,
        }
    }

    /// Reconcile every kind of one collection against `items`, the full
    /// current fetch including recently closed items.
    ///
    /// Kinds that share a folder are reconciled together, so a document is
    /// judged only against the items of the kind it belongs to.
    pub async fn reconcile(&self, collection: &CollectionConfig, items: &[RemoteItem]) -> SyncReport {
        let mut report = SyncReport::new(self.options.dry_run);
        let mut folders: Vec<(FolderLayout, Vec<ItemKind>)> = Vec::new();
        for kind in ItemKind::ALL {
            let layout = collection.layout(kind);
            match folders.iter_mut().find(|(seen, _)| seen.folder() == layout.folder()) {
                Some((_, kinds)) => kinds.push(kind),
                None => folders.push((layout, vec![kind])),
            }
        }
        for (layout, kinds) in &folders {
            self.reconcile_folder(collection, layout, kinds, items, &mut report).await;
        }
        report
    }

    async fn reconcile_folder(
        &self,
        collection: &CollectionConfig,
        layout: &FolderLayout,
        kinds: &[ItemKind],
        items: &[RemoteItem],
        report: &mut SyncReport,
    ) {
        let folder = layout.folder();
        let entry = |id: Option<String>, path: &NormalizedPath, action: SyncAction| {
            ItemReport::new(&collection.name, id, path.as_str(), action)
        };

        match self.store.folder_exists(folder).await {
            Ok(true) => {}
            Ok(false) => return,
            Err(e) => {
                report.push(entry(None, folder, SyncAction::Failed { message: e.to_string() }));
                return;
            }
        }

        let documents = match self.store.list(folder).await {
            Ok(documents) => documents,
            Err(e) => {
                report.push(entry(None, folder, SyncAction::Failed { message: e.to_string() }));
                return;
            }
        };

        let renderers: Vec<(ItemKind, DocumentRenderer)> = kinds
            .iter()
            .map(|&kind| (kind, DocumentRenderer::new(kind, collection.policy(kind))))
            .collect();
        let by_id: HashMap<(ItemKind, String), &RemoteItem> = items
            .iter()
            .filter(|item| kinds.contains(&item.kind()))
            .map(|item| ((item.kind(), item.id().to_string()), item))
            .collect();

        let mut deleted_any = false;
        for path in documents {
            // Only direct children that look like synchronized documents
            if path.parent().as_ref() != Some(folder) || path.extension() != Some(DOCUMENT_EXTENSION) {
                continue;
            }

            let content = match self.store.read(&path).await {
                Ok(Some(content)) => content,
                Ok(None) => continue,
                Err(e) => {
                    report.push(entry(None, &path, SyncAction::Failed { message: e.to_string() }));
                    continue;
                }
            };
            let doc = Frontmatter::read(&content);

            let Some((id, claimants)) = claim(&doc, &path, &renderers) else {
                tracing::debug!(path = %path, "Could not determine item identifier, leaving document");
                report.push(entry(
                    None,
                    &path,
                    SyncAction::Retained {
                        reason: "item identifier could not be determined; add a number to the frontmatter".to_string(),
                    },
                ));
                continue;
            };

            let item = claimants
                .iter()
                .find_map(|&kind| by_id.get(&(kind, id.clone())).copied());
            let owner = item.map_or(claimants[0], RemoteItem::kind);
            let policy = collection.policy(owner);

            let disposition = classify(item, self.now, self.settings.retention_days);
            let reason = match disposition {
                Disposition::Retain(RetainReason::Open) => continue,
                Disposition::Retain(reason) => {
                    report.push(entry(
                        Some(id),
                        &path,
                        SyncAction::Retained {
                            reason: reason.to_string(),
                        },
                    ));
                    continue;
                }
                Disposition::Delete(reason) => reason,
            };

            if !resolve_permission(&doc, policy.allow_delete) {
                tracing::warn!(path = %path, %reason, "Deletion denied by allowDelete");
                report.push(entry(
                    Some(id),
                    &path,
                    SyncAction::DeletionDenied {
                        reason: format!("{}; deletion not allowed", reason),
                    },
                ));
                continue;
            }

            if self.options.dry_run {
                tracing::info!(path = %path, %reason, "[dry-run] Would delete document");
            } else if let Err(e) = self.store.remove(&path).await {
                tracing::error!(path = %path, error = %e, "Failed to delete document");
                report.push(entry(Some(id), &path, SyncAction::Failed { message: e.to_string() }));
                continue;
            } else {
                tracing::info!(path = %path, %reason, "Deleted document");
                deleted_any = true;
            }
            report.push(entry(
                Some(id),
                &path,
                SyncAction::Deleted {
                    reason: reason.to_string(),
                },
            ));
        }

        if deleted_any {
            for folder in layout.removable_folders() {
                match self.store.remove_folder_if_empty(&folder).await {
                    Ok(true) => {
                        tracing::info!(path = %folder, "Removed empty folder");
                        report.push(entry(None, &folder, SyncAction::FolderRemoved));
                    }
                    Ok(false) => break,
                    Err(e) => {
                        report.push(entry(None, &folder, SyncAction::Failed { message: e.to_string() }));
                        break;
                    }
                }
            }
        }
    }
}
