//! Error types for notesync-core

use std::path::PathBuf;

/// Result type for notesync-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in notesync-core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration file not found at expected path
    #[error("Configuration not found at {path}")]
    ConfigNotFound { path: PathBuf },

    /// Configuration parsed but is not usable
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// A body template file could not be read
    #[error("Failed to load template {path}: {source}")]
    TemplateLoad {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Malformed item feed
    #[error("Invalid item feed: {0}")]
    Feed(#[from] serde_json::Error),

    /// Configuration file is not valid TOML
    #[error("Failed to parse configuration: {0}")]
    Toml(#[from] toml::de::Error),

    // Transparent wrappers for underlying crate errors
    /// Store error from notesync-fs
    #[error(transparent)]
    Fs(#[from] notesync_fs::Error),

    /// Persist block error from notesync-blocks
    #[error(transparent)]
    Blocks(#[from] notesync_blocks::Error),

    /// Content error from notesync-content
    #[error(transparent)]
    Content(#[from] notesync_content::Error),

    /// Standard I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
