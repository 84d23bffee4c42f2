//! Change detection between a document's frontmatter and its remote item

use crate::item::RemoteItem;
use notesync_content::Frontmatter;
use serde::Serialize;

/// Whether the remote item changed after the document was last written.
///
/// A missing or unparsable `updated` field counts as stale. Both sides are
/// compared as UTC instants at whole-second precision, the precision the
/// stored field is written with.
pub fn content_is_stale(doc: &Frontmatter, item: &RemoteItem) -> bool {
    match doc.updated {
        Some(stored) => item.updated_at().timestamp() > stored.timestamp(),
        None => true,
    }
}

/// Whether the item's status differs from the stored one. A missing status
/// counts as changed.
pub fn status_changed(doc: &Frontmatter, item: &RemoteItem) -> bool {
    match doc.status.as_deref() {
        Some(stored) => stored.trim() != item.status(),
        None => true,
    }
}

/// Both change predicates for one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChangeVerdict {
    pub stale: bool,
    pub status_changed: bool,
}

impl ChangeVerdict {
    pub fn evaluate(doc: &Frontmatter, item: &RemoteItem) -> Self {
        Self {
            stale: content_is_stale(doc, item),
            status_changed: status_changed(doc, item),
        }
    }
}
