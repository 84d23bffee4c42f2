//! Document store abstraction for notesync
//!
//! Provides forward-slash normalized paths, filename sanitizing, atomic
//! writes, and the [`DocumentStore`] trait the sync core reads and writes
//! documents through.

pub mod error;
pub mod io;
pub mod memory;
pub mod path;
pub mod store;

pub use error::{Error, Result};
pub use memory::MemoryStore;
pub use path::{NormalizedPath, sanitize_file_name};
pub use store::{DocumentStore, FsStore};
