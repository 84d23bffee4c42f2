//! Command implementations for notesync-cli

pub mod sync;
pub mod validate;

pub use sync::run_sync;
pub use validate::run_validate;
