//! Synchronization core for notesync
//!
//! Keeps a folder of Markdown documents in step with a remote collection of
//! issues, pull requests and project items:
//!
//! - **Item model**: tagged [`RemoteItem`] variants with a shared projection
//! - **Context and rendering**: template variables and built-in templates
//! - **Change detection**: staleness and status comparison against frontmatter
//! - **SyncEngine**: create, update (with persist block merge), append, skip
//! - **LifecycleReconciler**: retention and permission-gated deletion
//!
//! # Architecture
//!
//! ```text
//!                  notesync-cli
//!                        |
//!                  notesync-core
//!                        |
//!     +------------------+------------------+
//!     |                  |                  |
//! notesync-fs     notesync-blocks    notesync-content
//! ```

pub mod config;
pub mod context;
pub mod detect;
pub mod error;
pub mod item;
pub mod lifecycle;
pub mod render;
pub mod sync;

pub use config::{CollectionConfig, ConfigWarning, FolderLayout, Settings, SyncPolicy, UpdateMode};
pub use context::ContextBuilder;
pub use detect::{ChangeVerdict, content_is_stale, status_changed};
pub use error::{Error, Result};
pub use item::{
    CollectionFeed, Comment, Issue, ItemCommon, ItemId, ItemKind, ItemState, ProjectItem,
    PullRequest, RemoteItem,
};
pub use lifecycle::{Disposition, LifecycleReconciler, classify, resolve_permission};
pub use render::{DocumentRenderer, RenderedDocument};
pub use sync::{
    Decision, ItemReport, SyncAction, SyncEngine, SyncOptions, SyncReport, decide,
};

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn error_config_not_found_displays_path() {
        let error = Error::ConfigNotFound {
            path: PathBuf::from("/path/to/notesync.toml"),
        };
        let display = error.to_string();
        assert!(
            display.contains("/path/to/notesync.toml"),
            "Error display should contain the path, got: {}",
            display
        );
    }
}
