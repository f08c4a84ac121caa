//! Snapshot storage for session checkpoints
//!
//! This crate provides:
//! - Checkpoint records (per-session sequential IDs, BLAKE3 state digests)
//! - The `SnapshotStore` trait the engine writes through
//! - A durable sled-backed store with zstd blob compression
//! - A volatile in-memory store with failure injection
//!
//! Every checkpoint holds a full, independent snapshot of the session state.
//! `parent_id` records lineage only; no checkpoint is needed to reconstruct
//! another, so any subset of a history can be deleted, the newest included.

pub mod blob;
pub mod checkpoint;
pub mod error;
pub mod hash;
pub mod memory;
pub mod sled_store;

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::BTreeSet;

// Re-exports
pub use checkpoint::{Checkpoint, CheckpointId, SessionId, Trigger};
pub use error::StoreError;
pub use hash::StateDigest;
pub use memory::MemoryStore;
pub use sled_store::SledStore;

/// Result type for store operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Durable, ordered storage of checkpoint records
///
/// Implementations must make `append` all-or-nothing: a failed append
/// allocates no ID and leaves no record behind.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Write a new checkpoint with the next ID for the session
    async fn append(
        &self,
        session: &SessionId,
        trigger: Trigger,
        parent: Option<CheckpointId>,
        state: Bytes,
    ) -> Result<Checkpoint>;

    /// All checkpoints of a session, ascending by ID
    async fn list(&self, session: &SessionId) -> Result<Vec<Checkpoint>>;

    /// Load the state blob of a checkpoint, verified against its digest
    async fn load_state(&self, session: &SessionId, id: CheckpointId) -> Result<Option<Bytes>>;

    /// Delete checkpoints in ascending ID order
    ///
    /// Each deletion succeeds or fails on its own. Failures are collected in
    /// the report and the rest of the batch still runs. Unknown IDs are
    /// skipped silently.
    async fn delete(&self, session: &SessionId, ids: &BTreeSet<CheckpointId>) -> Result<DeleteReport>;

    /// Remove every checkpoint, blob and the ID counter of a session
    async fn purge_session(&self, session: &SessionId) -> Result<usize>;

    /// Newest checkpoint of a session
    async fn latest(&self, session: &SessionId) -> Result<Option<Checkpoint>> {
        Ok(self.list(session).await?.pop())
    }

    /// Number of checkpoints held for a session
    async fn total_count(&self, session: &SessionId) -> Result<usize> {
        Ok(self.list(session).await?.len())
    }

    /// Aggregate uncompressed state size of a session
    async fn total_size_bytes(&self, session: &SessionId) -> Result<u64> {
        Ok(self.list(session).await?.iter().map(|c| c.size_bytes).sum())
    }
}

/// Outcome of a batch delete
#[derive(Debug, Default)]
pub struct DeleteReport {
    /// IDs actually removed, ascending
    pub removed: Vec<CheckpointId>,
    /// IDs that could not be removed, with the reason
    pub failed: Vec<(CheckpointId, StoreError)>,
}

impl DeleteReport {
    /// Number of checkpoints actually removed
    pub fn removed_count(&self) -> usize {
        self.removed.len()
    }

    /// True if no deletion failed
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}
