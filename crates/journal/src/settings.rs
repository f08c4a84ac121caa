//! Per-session checkpoint settings records

use crate::strategy::CheckpointStrategy;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use store::SessionId;
use thiserror::Error;

/// Settings persistence errors
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("settings backend error: {0}")]
    Backend(#[from] sled::Error),

    #[error("settings codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

/// Checkpoint configuration of one session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointSettings {
    /// Master switch for automatic checkpoints
    pub auto_checkpoint_enabled: bool,
    /// Active strategy
    pub checkpoint_strategy: CheckpointStrategy,
}

impl Default for CheckpointSettings {
    fn default() -> Self {
        Self {
            auto_checkpoint_enabled: true,
            checkpoint_strategy: CheckpointStrategy::Smart,
        }
    }
}

enum Backend {
    Sled { db: sled::Db, tree: sled::Tree },
    Memory(Mutex<HashMap<SessionId, CheckpointSettings>>),
}

/// Storage for settings records, keyed by session
///
/// Sessions without a record read back as the defaults.
pub struct SettingsStore {
    backend: Backend,
}

impl SettingsStore {
    /// Open or create settings storage in the given directory
    pub fn open(path: &Path) -> Result<Self, SettingsError> {
        Self::from_db(sled::open(path.join("settings.db"))?)
    }

    /// Volatile storage
    pub fn in_memory() -> Self {
        Self {
            backend: Backend::Memory(Mutex::new(HashMap::new())),
        }
    }

    fn from_db(db: sled::Db) -> Result<Self, SettingsError> {
        let tree = db.open_tree("settings")?;
        Ok(Self {
            backend: Backend::Sled { db, tree },
        })
    }

    /// Current settings of a session
    pub fn load(&self, session: &SessionId) -> Result<CheckpointSettings, SettingsError> {
        match &self.backend {
            Backend::Sled { tree, .. } => match tree.get(session.as_str().as_bytes())? {
                Some(value) => Ok(serde_json::from_slice(&value)?),
                None => Ok(CheckpointSettings::default()),
            },
            Backend::Memory(map) => Ok(map.lock().get(session).copied().unwrap_or_default()),
        }
    }

    /// Persist settings; durable once this returns
    pub fn save(&self, session: &SessionId, settings: &CheckpointSettings) -> Result<(), SettingsError> {
        match &self.backend {
            Backend::Sled { db, tree } => {
                tree.insert(session.as_str().as_bytes(), serde_json::to_vec(settings)?)?;
                db.flush()?;
            }
            Backend::Memory(map) => {
                map.lock().insert(session.clone(), *settings);
            }
        }
        Ok(())
    }

    /// Drop a session's record; returns whether one existed
    pub fn remove(&self, session: &SessionId) -> Result<bool, SettingsError> {
        match &self.backend {
            Backend::Sled { db, tree } => {
                let existed = tree.remove(session.as_str().as_bytes())?.is_some();
                db.flush()?;
                Ok(existed)
            }
            Backend::Memory(map) => Ok(map.lock().remove(session).is_some()),
        }
    }
}
