//! SyncEngine implementation
//!
//! For every remote item the engine renders a fresh document, compares it
//! with what the store holds and decides between create, update, append and
//! skip. Items are processed one at a time, each to completion, and a failure
//! on one item never stops the rest of the pass.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use notesync_blocks::{ExtractOptions, extract_blocks, merge_blocks};
use notesync_content::{Frontmatter, TemplateContext, format_timestamp, stamp};
use notesync_fs::{DocumentStore, NormalizedPath};
use similar::TextDiff;

use crate::Result;
use crate::config::{CollectionConfig, Settings, UpdateMode};
use crate::context::ContextBuilder;
use crate::detect::ChangeVerdict;
use crate::item::{ItemKind, RemoteItem};
use crate::lifecycle::{Disposition, classify};
use crate::render::{DocumentRenderer, RenderedDocument};

use super::report::{ItemReport, SyncAction, SyncReport};

/// Why a document is fully re-rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateReason {
    /// The item's status differs from the stored one; applies in every mode.
    StatusChanged,
    /// The item changed since the last write and the mode is `update`.
    ContentStale,
}

impl fmt::Display for UpdateReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StatusChanged => f.write_str("status changed"),
            Self::ContentStale => f.write_str("remote item changed"),
        }
    }
}

/// Why a document is left alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Nothing changed since the last write.
    UpToDate,
    /// The mode is `none` and the status did not change.
    UpdateModeNone,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UpToDate => f.write_str("up to date"),
            Self::UpdateModeNone => f.write_str("update mode is none"),
        }
    }
}

/// What to do with one item's document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Create,
    Update { reason: UpdateReason },
    Append,
    Skip { reason: SkipReason },
}

/// The decision state machine.
///
/// `verdict` is `None` when no document exists yet. A status change always
/// triggers a full update; otherwise the update mode decides, and both
/// `update` and `append` act only on stale content.
///
/// # Example
///
/// ```
/// use notesync_core::config::UpdateMode;
/// use notesync_core::detect::ChangeVerdict;
/// use notesync_core::sync::{Decision, UpdateReason, decide};
///
/// let closed = ChangeVerdict { stale: false, status_changed: true };
/// assert_eq!(
///     decide(Some(closed), UpdateMode::None),
///     Decision::Update { reason: UpdateReason::StatusChanged },
/// );
/// assert_eq!(decide(None, UpdateMode::None), Decision::Create);
/// ```
pub fn decide(verdict: Option<ChangeVerdict>, mode: UpdateMode) -> Decision {
    let Some(verdict) = verdict else {
        return Decision::Create;
    };
    if verdict.status_changed {
        return Decision::Update {
            reason: UpdateReason::StatusChanged,
        };
    }
    match (mode, verdict.stale) {
        (UpdateMode::Update, true) => Decision::Update {
            reason: UpdateReason::ContentStale,
        },
        (UpdateMode::Append, true) => Decision::Append,
        (UpdateMode::Update | UpdateMode::Append, false) => Decision::Skip {
            reason: SkipReason::UpToDate,
        },
        (UpdateMode::None, _) => Decision::Skip {
            reason: SkipReason::UpdateModeNone,
        },
    }
}

/// Options for sync and reconcile passes
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncOptions {
    /// If true, compute and report every decision without touching the
    /// store. Writes carry a diff preview instead.
    pub dry_run: bool,
}

/// The content a decision produced, before it is written.
struct Plan {
    action: SyncAction,
    content: Option<String>,
    diagnostics: Vec<String>,
}

impl Plan {
    fn skip(reason: SkipReason) -> Self {
        Self {
            action: SyncAction::Skipped {
                reason: reason.to_string(),
            },
            content: None,
            diagnostics: Vec::new(),
        }
    }
}

/// Writes `number`, `status` and `updated` into the document's frontmatter so
/// the next pass can compare against them, whatever the template wrote.
pub fn stamp_identity(content: &str, item: &RemoteItem) -> String {
    stamp(
        content,
        &[
            ("number", item.id().to_string()),
            ("status", item.status().to_string()),
            ("updated", format_timestamp(&item.updated_at())),
        ],
    )
}

/// Unified diff between the stored and the planned document.
pub fn preview_diff(path: &NormalizedPath, old: &str, new: &str) -> String {
    let (old_name, new_name) = (format!("a/{}", path), format!("b/{}", path));
    TextDiff::from_lines(old, new)
        .unified_diff()
        .context_radius(3)
        .header(&old_name, &new_name)
        .to_string()
}

/// Engine for synchronizing documents with remote items
pub struct SyncEngine<'a, S: DocumentStore + ?Sized> {
    store: &'a S,
    settings: &'a Settings,
    options: SyncOptions,
    now: Option<DateTime<Utc>>,
}

impl<'a, S: DocumentStore + ?Sized> SyncEngine<'a, S> {
    pub fn new(store: &'a S, settings: &'a Settings, options: SyncOptions) -> Self {
        Self {
            store,
            settings,
            options,
            now: None,
        }
    }

    /// Judge retention as of `now`: an item closed beyond the retention
    /// window gets no new document, as cleanup would only remove it again.
    /// Existing documents are still updated.
    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = Some(now);
        self
    }

    /// Synchronize every item of one collection, in order.
    pub async fn sync_collection(
        &self,
        collection: &CollectionConfig,
        items: &[RemoteItem],
    ) -> SyncReport {
        let mut report = SyncReport::new(self.options.dry_run);
        let builder = ContextBuilder::new(self.settings, collection);

        let renderers: BTreeMap<ItemKind, DocumentRenderer> = ItemKind::ALL
            .into_iter()
            .map(|kind| (kind, DocumentRenderer::new(kind, collection.policy(kind))))
            .collect();
        for (kind, renderer) in &renderers {
            for issue in renderer.issues() {
                report
                    .warnings
                    .push(format!("{} ({} templates): {}", collection.name, kind, issue));
            }
        }

        tracing::info!(
            collection = %collection.name,
            items = items.len(),
            dry_run = self.options.dry_run,
            "Synchronizing collection"
        );

        for item in items {
            let Some(renderer) = renderers.get(&item.kind()) else {
                continue;
            };
            let entry = self.sync_item(collection, &builder, renderer, item).await;
            report.push(entry);
        }

        report
    }

    async fn sync_item(
        &self,
        collection: &CollectionConfig,
        builder: &ContextBuilder<'_>,
        renderer: &DocumentRenderer,
        item: &RemoteItem,
    ) -> ItemReport {
        let id = item.id().to_string();
        let folder = collection.layout(item.kind()).folder().clone();
        let context = builder.build(item);
        let rendered = renderer.render(&context);
        let path = folder.join(&rendered.filename);

        let entry = |action: SyncAction| {
            ItemReport::new(&collection.name, Some(id.clone()), path.as_str(), action)
        };
        let failed = |message: String| {
            tracing::error!(item = %id, path = %path, error = %message, "Failed to synchronize item");
            entry(SyncAction::Failed { message })
        };

        let existing = match self.store.read(&path).await {
            Ok(existing) => existing,
            Err(e) => return failed(e.to_string()),
        };

        if existing.is_none()
            && let Some(now) = self.now
            && let Disposition::Delete(reason) = classify(Some(item), now, self.settings.retention_days)
        {
            tracing::debug!(item = %id, %reason, "Not creating document for retired item");
            return entry(SyncAction::Skipped {
                reason: format!("{}; not created", reason),
            });
        }

        let plan = match self.plan(
            collection,
            renderer,
            item,
            &context,
            &rendered,
            existing.as_deref(),
        ) {
            Ok(plan) => plan,
            Err(e) => return failed(e.to_string()),
        };

        let Some(content) = plan.content else {
            return entry(plan.action).with_diagnostics(plan.diagnostics);
        };

        if self.options.dry_run {
            let preview = preview_diff(&path, existing.as_deref().unwrap_or(""), &content);
            tracing::info!(path = %path, action = %plan.action, "[dry-run] Would write document");
            return entry(plan.action)
                .with_diagnostics(plan.diagnostics)
                .with_preview(Some(preview));
        }

        if existing.is_none()
            && let Err(e) = self.store.create_folder(&folder).await
        {
            return failed(e.to_string()).with_diagnostics(plan.diagnostics);
        }
        if let Err(e) = self.store.write(&path, &content).await {
            return failed(e.to_string()).with_diagnostics(plan.diagnostics);
        }

        tracing::info!(path = %path, action = %plan.action, "Wrote document");
        entry(plan.action).with_diagnostics(plan.diagnostics)
    }

    fn plan(
        &self,
        collection: &CollectionConfig,
        renderer: &DocumentRenderer,
        item: &RemoteItem,
        context: &TemplateContext,
        rendered: &RenderedDocument,
        existing: Option<&str>,
    ) -> Result<Plan> {
        let mode = collection.policy(item.kind()).update_mode;
        let verdict = existing.map(|doc| ChangeVerdict::evaluate(&Frontmatter::read(doc), item));
        let decision = decide(verdict, mode);
        tracing::debug!(item = %item.id(), ?verdict, ?decision, %mode, "Sync decision");

        match (decision, existing) {
            (Decision::Create, _) | (_, None) => Ok(Plan {
                action: SyncAction::Created,
                content: Some(stamp_identity(&rendered.body, item)),
                diagnostics: Vec::new(),
            }),
            (Decision::Skip { reason }, Some(_)) => Ok(Plan::skip(reason)),
            (Decision::Append, Some(doc)) => {
                let fragment = renderer.render_append(context);
                let content = format!("{}\n\n{}", doc, fragment);
                Ok(Plan {
                    action: SyncAction::Appended,
                    content: Some(stamp_identity(&content, item)),
                    diagnostics: Vec::new(),
                })
            }
            (Decision::Update { reason }, Some(doc)) => {
                let options = ExtractOptions::with_anchor_len(self.settings.anchor_length);
                let extraction = extract_blocks(doc, &options)?;
                let mut diagnostics: Vec<String> =
                    extraction.issues.iter().map(ToString::to_string).collect();

                let merged = merge_blocks(&rendered.body, &extraction.blocks);
                for placement in &merged.placements {
                    if placement.is_fallback() {
                        tracing::warn!(
                            item = %item.id(),
                            block = %placement.name,
                            "Persist block anchor not found, moved to end of document"
                        );
                        diagnostics.push(format!(
                            "persist block \"{}\" could not be placed at its original position and was moved to the end of the document",
                            placement.name
                        ));
                    } else {
                        diagnostics.push(format!(
                            "persist block \"{}\" restored ({})",
                            placement.name, placement.strategy
                        ));
                    }
                }

                Ok(Plan {
                    action: SyncAction::Updated {
                        reason: reason.to_string(),
                    },
                    content: Some(stamp_identity(&merged.content, item)),
                    diagnostics,
                })
            }
        }
    }
}
