//! Persist block extraction and merging for notesync.
//!
//! A persist block is a named region of a synchronized document that belongs
//! to the user:
//!
//! ```text
//! {% persist "notes" %}
//! anything here survives re-synchronization
//! {% endpersist %}
//! ```
//!
//! [`parser`] pulls blocks out of the previous version of a document together
//! with an [`Anchor`] describing where they sat. [`merge`] puts them back into
//! freshly rendered content at the best-matching position.

pub mod error;
pub mod merge;
pub mod parser;

pub use error::{Error, Result};
pub use merge::{MergeOutcome, Placement, RELOCATED_MARKER, Strategy, format_block, merge_blocks};
pub use parser::{
    Anchor, ExtractIssue, ExtractOptions, Extraction, PersistBlock, extract_blocks, has_blocks,
    parse_blocks,
};
