//! Error types for notesync-fs

use std::path::PathBuf;

/// Result type for notesync-fs operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in notesync-fs operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Lock acquisition failed for {path}")]
    LockFailed { path: PathBuf },

    #[error("Document not found: {path}")]
    NotFound { path: PathBuf },

    #[error("Folder is not empty: {path}")]
    FolderNotEmpty { path: PathBuf },

    #[error("Background task failed: {message}")]
    Task { message: String },
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
