//! Store error types

use crate::checkpoint::{CheckpointId, SessionId};
use thiserror::Error;

/// Errors raised by snapshot stores
#[derive(Debug, Error)]
pub enum StoreError {
    /// The medium rejected a checkpoint write; no ID was allocated
    #[error("failed to write checkpoint for session {session}: {reason}")]
    Write { session: SessionId, reason: String },

    /// A single checkpoint could not be deleted
    #[error("failed to delete checkpoint {id} of session {session}: {reason}")]
    Delete {
        session: SessionId,
        id: CheckpointId,
        reason: String,
    },

    /// The requested parent is not part of the session's history
    #[error("parent checkpoint {parent} does not exist in session {session}")]
    UnknownParent {
        session: SessionId,
        parent: CheckpointId,
    },

    /// A state blob no longer matches its recorded digest
    #[error("state of checkpoint {id} in session {session} does not match its digest")]
    Corrupt { session: SessionId, id: CheckpointId },

    #[error("invalid session id {0:?}")]
    InvalidSession(String),

    #[error("record codec error: {0}")]
    Codec(#[from] bincode::Error),

    #[error("blob compression error: {0}")]
    Compression(#[from] std::io::Error),

    #[error("storage backend error: {0}")]
    Backend(#[from] sled::Error),

    #[error("storage task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl StoreError {
    /// Build a write error
    pub fn write(session: &SessionId, reason: impl std::fmt::Display) -> Self {
        Self::Write {
            session: session.clone(),
            reason: reason.to_string(),
        }
    }

    /// Build a delete error
    pub fn delete(session: &SessionId, id: CheckpointId, reason: impl std::fmt::Display) -> Self {
        Self::Delete {
            session: session.clone(),
            id,
            reason: reason.to_string(),
        }
    }
}
