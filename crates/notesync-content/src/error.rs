//! Error types for notesync-content

/// Result type for notesync-content operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in notesync-content operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Failed to parse frontmatter: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Frontmatter must be a mapping, found {found}")]
    NotAMapping { found: String },
}
