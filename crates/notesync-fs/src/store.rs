//! The document store collaborator and its filesystem implementation

use crate::{Error, NormalizedPath, Result, io};
use async_trait::async_trait;
use std::path::PathBuf;

/// Storage for synchronized documents.
///
/// Every call completes or fails on its own; the sync core never relies on
/// transactions spanning several calls. Paths are relative to whatever root
/// the implementation was built with.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Read a document, returning `None` when it does not exist.
    async fn read(&self, path: &NormalizedPath) -> Result<Option<String>>;

    /// Create or overwrite a document, creating parent folders as needed.
    async fn write(&self, path: &NormalizedPath, content: &str) -> Result<()>;

    /// Delete a document.
    async fn remove(&self, path: &NormalizedPath) -> Result<()>;

    /// List every document below `prefix`, recursively, in sorted order.
    async fn list(&self, prefix: &NormalizedPath) -> Result<Vec<NormalizedPath>>;

    /// Create a folder and its parents.
    async fn create_folder(&self, path: &NormalizedPath) -> Result<()>;

    /// Whether a folder exists.
    async fn folder_exists(&self, path: &NormalizedPath) -> Result<bool>;

    /// Remove a folder only if it has no children. Returns whether it was
    /// removed.
    async fn remove_folder_if_empty(&self, path: &NormalizedPath) -> Result<bool>;
}

/// A [`DocumentStore`] backed by a directory on disk.
#[derive(Debug, Clone)]
pub struct FsStore {
    root: NormalizedPath,
}

impl FsStore {
    /// Create a store rooted at `root`.
    pub fn new(root: impl Into<NormalizedPath>) -> Self {
        Self { root: root.into() }
    }

    /// The root every document path is resolved against.
    pub fn root(&self) -> &NormalizedPath {
        &self.root
    }

    fn resolve(&self, path: &NormalizedPath) -> NormalizedPath {
        self.root.join(path.as_str())
    }

    fn relative(&self, native: &std::path::Path) -> NormalizedPath {
        let full = NormalizedPath::new(native);
        match full.as_str().strip_prefix(self.root.as_str()) {
            Some(rest) if full.is_inside(&self.root) => NormalizedPath::new(rest.trim_start_matches('/')),
            _ => full,
        }
    }
}

#[async_trait]
impl DocumentStore for FsStore {
    async fn read(&self, path: &NormalizedPath) -> Result<Option<String>> {
        let native = self.resolve(path).to_native();
        match tokio::fs::read_to_string(&native).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::io(native, e)),
        }
    }

    async fn write(&self, path: &NormalizedPath, content: &str) -> Result<()> {
        let target = self.resolve(path);
        let content = content.to_string();
        tokio::task::spawn_blocking(move || io::write_text(&target, &content))
            .await
            .map_err(|e| Error::Task {
                message: e.to_string(),
            })?
    }

    async fn remove(&self, path: &NormalizedPath) -> Result<()> {
        let native = self.resolve(path).to_native();
        tokio::fs::remove_file(&native).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::NotFound {
                    path: native.clone(),
                }
            } else {
                Error::io(&native, e)
            }
        })
    }

    async fn list(&self, prefix: &NormalizedPath) -> Result<Vec<NormalizedPath>> {
        let mut found = Vec::new();
        let mut pending: Vec<PathBuf> = vec![self.resolve(prefix).to_native()];

        while let Some(dir) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(Error::io(&dir, e)),
            };
            while let Some(entry) = entries.next_entry().await.map_err(|e| Error::io(&dir, e))? {
                let file_type = entry.file_type().await.map_err(|e| Error::io(entry.path(), e))?;
                let name = entry.file_name();
                // Temp files from in-flight atomic writes
                if name.to_string_lossy().ends_with(".tmp") {
                    continue;
                }
                if file_type.is_dir() {
                    pending.push(entry.path());
                } else if file_type.is_file() {
                    found.push(self.relative(&entry.path()));
                }
            }
        }

        found.sort();
        Ok(found)
    }

    async fn create_folder(&self, path: &NormalizedPath) -> Result<()> {
        let native = self.resolve(path).to_native();
        tokio::fs::create_dir_all(&native)
            .await
            .map_err(|e| Error::io(native, e))
    }

    async fn folder_exists(&self, path: &NormalizedPath) -> Result<bool> {
        let native = self.resolve(path).to_native();
        match tokio::fs::metadata(&native).await {
            Ok(meta) => Ok(meta.is_dir()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::io(native, e)),
        }
    }

    async fn remove_folder_if_empty(&self, path: &NormalizedPath) -> Result<bool> {
        let native = self.resolve(path).to_native();
        let mut entries = match tokio::fs::read_dir(&native).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(Error::io(&native, e)),
        };
        if entries
            .next_entry()
            .await
            .map_err(|e| Error::io(&native, e))?
            .is_some()
        {
            return Ok(false);
        }
        tokio::fs::remove_dir(&native)
            .await
            .map_err(|e| Error::io(&native, e))?;
        tracing::debug!(path = %path, "Removed empty folder");
        Ok(true)
    }
}
