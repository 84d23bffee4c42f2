//! Error types for notesync-blocks

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Duplicate persist block \"{name}\" at line {line} (first defined at line {first_line})")]
    DuplicateBlock {
        name: String,
        first_line: usize,
        line: usize,
    },
}
