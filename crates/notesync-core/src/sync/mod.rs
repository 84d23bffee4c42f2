//! Per-item synchronization
//!
//! This module provides:
//! - **decide**: the create / update / append / skip state machine
//! - **SyncEngine**: renders, merges and writes documents through a store
//! - **report**: per-item outcomes shared with the lifecycle reconciler

mod engine;
mod report;

pub use engine::{
    Decision, SkipReason, SyncEngine, SyncOptions, UpdateReason, decide, preview_diff,
    stamp_identity,
};
pub use report::{ItemReport, SyncAction, SyncReport};
