//! In-memory document store

use crate::{DocumentStore, Error, NormalizedPath, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
struct State {
    documents: BTreeMap<NormalizedPath, String>,
    folders: BTreeSet<NormalizedPath>,
    writes: usize,
}

/// A [`DocumentStore`] that keeps everything in memory.
///
/// Folders are tracked explicitly so empty-folder cleanup behaves like it
/// does on disk. The store also counts writes, which makes "nothing was
/// written" assertions cheap in tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a document without counting it as a write.
    pub fn with_document(self, path: impl Into<NormalizedPath>, content: impl Into<String>) -> Self {
        {
            let mut state = self.lock();
            let path = path.into();
            add_parents(&mut state.folders, &path);
            state.documents.insert(path, content.into());
        }
        self
    }

    /// Snapshot of a document's content.
    pub fn get(&self, path: impl Into<NormalizedPath>) -> Option<String> {
        self.lock().documents.get(&path.into()).cloned()
    }

    /// Number of successful `write` calls.
    pub fn write_count(&self) -> usize {
        self.lock().writes
    }

    /// Whether a folder is currently known to the store.
    pub fn has_folder(&self, path: impl Into<NormalizedPath>) -> bool {
        self.lock().folders.contains(&path.into())
    }

    /// All document paths, sorted.
    pub fn paths(&self) -> Vec<NormalizedPath> {
        self.lock().documents.keys().cloned().collect()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // A poisoned lock only means a test panicked mid-call; the maps are still usable
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn add_parents(folders: &mut BTreeSet<NormalizedPath>, path: &NormalizedPath) {
    let mut current = path.parent();
    while let Some(folder) = current {
        if folder.as_str() == "/" || !folders.insert(folder.clone()) {
            break;
        }
        current = folder.parent();
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn read(&self, path: &NormalizedPath) -> Result<Option<String>> {
        Ok(self.lock().documents.get(path).cloned())
    }

    async fn write(&self, path: &NormalizedPath, content: &str) -> Result<()> {
        let mut state = self.lock();
        add_parents(&mut state.folders, path);
        state.documents.insert(path.clone(), content.to_string());
        state.writes += 1;
        Ok(())
    }

    async fn remove(&self, path: &NormalizedPath) -> Result<()> {
        match self.lock().documents.remove(path) {
            Some(_) => Ok(()),
            None => Err(Error::NotFound {
                path: path.to_native(),
            }),
        }
    }

    async fn list(&self, prefix: &NormalizedPath) -> Result<Vec<NormalizedPath>> {
        Ok(self
            .lock()
            .documents
            .keys()
            .filter(|path| path.is_inside(prefix))
            .cloned()
            .collect())
    }

    async fn create_folder(&self, path: &NormalizedPath) -> Result<()> {
        let mut state = self.lock();
        state.folders.insert(path.clone());
        add_parents(&mut state.folders, path);
        Ok(())
    }

    async fn folder_exists(&self, path: &NormalizedPath) -> Result<bool> {
        Ok(self.lock().folders.contains(path))
    }

    async fn remove_folder_if_empty(&self, path: &NormalizedPath) -> Result<bool> {
        let mut state = self.lock();
        if !state.folders.contains(path) {
            return Ok(false);
        }
        let occupied = state.documents.keys().any(|doc| doc.is_inside(path))
            || state.folders.iter().any(|folder| folder.is_inside(path));
        if occupied {
            return Ok(false);
        }
        state.folders.remove(path);
        Ok(true)
    }
}
