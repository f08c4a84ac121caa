//! Checkpoint data structures

use crate::hash::StateDigest;
use crate::StoreError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of an agent session
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Create a session ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the ID as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check the ID can be used as a storage key prefix
    ///
    /// Empty IDs and IDs containing NUL are rejected, since NUL separates the
    /// session from the checkpoint ID in on-disk keys.
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.0.is_empty() || self.0.contains('\0') {
            return Err(StoreError::InvalidSession(self.0.clone()));
        }
        Ok(())
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for SessionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Checkpoint ID, strictly increasing within a session (first is 1)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CheckpointId(pub u64);

impl CheckpointId {
    /// The ID following this one
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for CheckpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Event class that caused a checkpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    /// Explicit user request
    Manual,
    /// Prompt submission under the per-prompt strategy
    Prompt,
    /// Tool invocation under the per-tool-use strategy
    ToolUse,
    /// Prompt or mutating tool call under the smart strategy
    SmartHeuristic,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Manual => write!(f, "manual"),
            Self::Prompt => write!(f, "prompt"),
            Self::ToolUse => write!(f, "tool_use"),
            Self::SmartHeuristic => write!(f, "smart_heuristic"),
        }
    }
}

/// An immutable snapshot record of a session at a point in time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Sequential ID within the session
    pub id: CheckpointId,
    /// Owning session
    pub session_id: SessionId,
    /// Creation time (Unix milliseconds)
    pub created_at_ms: u64,
    /// What caused this checkpoint
    pub trigger: Trigger,
    /// Uncompressed size of the state blob
    pub size_bytes: u64,
    /// Checkpoint this one was derived from (existed at creation time)
    pub parent_id: Option<CheckpointId>,
    /// Digest of the state blob, used to load and verify it
    pub state_ref: StateDigest,
}

impl Checkpoint {
    /// Encode for storage
    pub fn serialize(&self) -> Result<Vec<u8>, StoreError> {
        Ok(bincode::serialize(self)?)
    }

    /// Decode from storage
    pub fn deserialize(bytes: &[u8]) -> Result<Self, StoreError> {
        Ok(bincode::deserialize(bytes)?)
    }

    /// Resolve the parent within a history
    ///
    /// Returns `None` for the first checkpoint and for the oldest retained
    /// checkpoint once its parent has been pruned.
    pub fn parent_in<'a>(&self, history: &'a [Checkpoint]) -> Option<&'a Checkpoint> {
        let parent = self.parent_id?;
        history
            .binary_search_by_key(&parent, |c| c.id)
            .ok()
            .map(|idx| &history[idx])
    }
}

/// Current time in Unix milliseconds
pub(crate) fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
