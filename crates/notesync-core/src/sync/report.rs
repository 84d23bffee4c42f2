//! Per-item outcome reporting

use serde::{Deserialize, Serialize};
use std::fmt;

/// What happened to one item or document during a pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum SyncAction {
    Created,
    Updated { reason: String },
    Appended,
    Skipped { reason: String },
    Failed { message: String },
    Deleted { reason: String },
    Retained { reason: String },
    /// Deletion was due but the document's permission flag said no.
    DeletionDenied { reason: String },
    FolderRemoved,
}

impl SyncAction {
    pub fn is_write(&self) -> bool {
        matches!(self, Self::Created | Self::Updated { .. } | Self::Appended)
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// Short lowercase label, as shown by the CLI.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated { .. } => "updated",
            Self::Appended => "appended",
            Self::Skipped { .. } => "skipped",
            Self::Failed { .. } => "failed",
            Self::Deleted { .. } => "deleted",
            Self::Retained { .. } => "retained",
            Self::DeletionDenied { .. } => "deletion denied",
            Self::FolderRemoved => "folder removed",
        }
    }

    fn detail(&self) -> Option<&str> {
        match self {
            Self::Updated { reason }
            | Self::Skipped { reason }
            | Self::Deleted { reason }
            | Self::Retained { reason }
            | Self::DeletionDenied { reason } => Some(reason),
            Self::Failed { message } => Some(message),
            Self::Created | Self::Appended | Self::FolderRemoved => None,
        }
    }
}

impl fmt::Display for SyncAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.detail() {
            Some(detail) => write!(f, "{} ({})", self.label(), detail),
            None => f.write_str(self.label()),
        }
    }
}

/// Outcome for one item or document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemReport {
    pub collection: String,
    /// Remote identifier, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Document or folder path, relative to the store root.
    pub path: String,
    #[serde(flatten)]
    pub action: SyncAction,
    /// Merge placements, relocated blocks, malformed markers.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<String>,
    /// Unified diff of the change, filled on dry runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,
}

impl ItemReport {
    pub fn new(
        collection: impl Into<String>,
        id: Option<String>,
        path: impl Into<String>,
        action: SyncAction,
    ) -> Self {
        Self {
            collection: collection.into(),
            id,
            path: path.into(),
            action,
            diagnostics: Vec::new(),
            preview: None,
        }
    }

    pub fn with_diagnostics(mut self, diagnostics: Vec<String>) -> Self {
        self.diagnostics.extend(diagnostics);
        self
    }

    pub fn with_preview(mut self, preview: Option<String>) -> Self {
        self.preview = preview;
        self
    }
}

/// Report from a sync or reconcile pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    /// Whether the pass only simulated its changes
    pub dry_run: bool,
    /// One entry per processed item or document
    pub items: Vec<ItemReport>,
    /// Pass-level warnings, such as malformed templates
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl SyncReport {
    pub fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            ..Self::default()
        }
    }

    pub fn push(&mut self, item: ItemReport) {
        self.items.push(item);
    }

    /// Append another report's entries to this one
    pub fn extend(&mut self, other: SyncReport) {
        self.items.extend(other.items);
        self.warnings.extend(other.warnings);
    }

    pub fn has_failures(&self) -> bool {
        self.items.iter().any(|item| item.action.is_failure())
    }

    /// Number of entries whose action has the given label
    pub fn count(&self, label: &str) -> usize {
        self.items
            .iter()
            .filter(|item| item.action.label() == label)
            .count()
    }

    pub fn find(&self, path: &str) -> Option<&ItemReport> {
        self.items.iter().find(|item| item.path == path)
    }
}
