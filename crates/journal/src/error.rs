//! Engine error types

use crate::settings::SettingsError;
use store::StoreError;
use thiserror::Error;

/// Errors surfaced by the checkpoint engine
///
/// Validation errors (`InvalidStrategy`, `InvalidRetentionTarget`) are raised
/// before anything is mutated.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid checkpoint strategy {0:?} (expected manual, per_prompt, per_tool_use or smart)")]
    InvalidStrategy(String),

    #[error("invalid retention target {0}: keep_count must be at least 1")]
    InvalidRetentionTarget(i64),

    /// A manual checkpoint could not be written
    #[error("checkpoint write failed: {0}")]
    StorageWrite(#[source] StoreError),

    /// Cleanup planned deletions but none of them succeeded
    #[error("cleanup failed to delete any checkpoint: {0}")]
    StorageDelete(#[source] StoreError),

    #[error("cleanup cancelled before deleting")]
    Cancelled,

    #[error("invalid engine configuration: {0}")]
    Config(String),

    #[error("settings error: {0}")]
    Settings(#[from] SettingsError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
