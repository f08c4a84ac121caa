//! Project discovery and engine wiring

use crate::locks::StoreLock;
use crate::system_config::SystemConfig;
use anyhow::{Context, Result};
use journal::{CheckpointApi, CheckpointEngine, SessionScope, SettingsStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use store::SledStore;

/// Name of the per-project state directory
pub const KEEPSAKE_DIR: &str = ".keepsake";

/// A directory with a `.keepsake/` state directory
#[derive(Debug, Clone)]
pub struct Project {
    root: PathBuf,
}

impl Project {
    /// Create `.keepsake/` under `root`; returns whether it already existed
    pub fn init(root: &Path) -> Result<(Self, bool)> {
        let project = Self {
            root: root.to_path_buf(),
        };
        let existed = project.keepsake_dir().is_dir();
        std::fs::create_dir_all(project.store_dir())
            .context("Failed to create .keepsake/store directory")?;
        Ok((project, existed))
    }

    /// Walk up from `start` to the nearest project root
    pub fn discover(start: &Path) -> Result<Self> {
        let mut current = start.to_path_buf();
        loop {
            if current.join(KEEPSAKE_DIR).is_dir() {
                return Ok(Self { root: current });
            }
            match current.parent() {
                Some(parent) => current = parent.to_path_buf(),
                None => anyhow::bail!(
                    "Not a Keepsake project (no {} directory found). Run 'ks init' first.",
                    KEEPSAKE_DIR
                ),
            }
        }
    }

    /// Discover from an explicit directory or the current one
    pub fn locate(dir: Option<&Path>) -> Result<Self> {
        match dir {
            Some(dir) => Self::discover(dir),
            None => {
                let cwd = std::env::current_dir().context("Failed to get current directory")?;
                Self::discover(&cwd)
            }
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn keepsake_dir(&self) -> PathBuf {
        self.root.join(KEEPSAKE_DIR)
    }

    pub fn store_dir(&self) -> PathBuf {
        self.keepsake_dir().join("store")
    }

    /// Project identifier: the root directory name
    pub fn id(&self) -> String {
        self.root
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "root".to_string())
    }

    /// Request scope for a session of this project
    pub fn scope(&self, session: &str) -> SessionScope {
        SessionScope::new(session, self.id(), self.root.clone())
    }

    /// Lock the store and build an engine over it
    pub fn open(&self, config: &SystemConfig) -> Result<OpenProject> {
        let lock = StoreLock::acquire(&self.keepsake_dir())?;
        let store_dir = self.store_dir();

        let store = SledStore::open(&store_dir)
            .context("Failed to open checkpoint store")?
            .with_compress_threshold(config.store.compress_threshold_bytes);
        let settings = SettingsStore::open(&store_dir).context("Failed to open settings store")?;
        let engine = CheckpointEngine::new(Arc::new(store), settings, config.engine.clone())
            .context("Failed to start checkpoint engine")?;

        tracing::debug!(root = %self.root.display(), "Opened project");

        Ok(OpenProject {
            api: CheckpointApi::new(Arc::new(engine)),
            _lock: lock,
        })
    }
}

/// A project with its store locked and engine running
pub struct OpenProject {
    pub api: CheckpointApi,
    _lock: StoreLock,
}

impl OpenProject {
    pub fn engine(&self) -> &CheckpointEngine {
        self.api.engine()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_discover_from_subdirectory() {
        let temp_dir = TempDir::new().unwrap();
        let (_, existed) = Project::init(temp_dir.path()).unwrap();
        assert!(!existed);

        let nested = temp_dir.path().join("src/deep");
        std::fs::create_dir_all(&nested).unwrap();

        let project = Project::discover(&nested).unwrap();
        assert_eq!(project.root(), temp_dir.path());
        assert!(project.store_dir().is_dir());
    }

    #[test]
    fn test_discover_fails_outside_project() {
        let temp_dir = TempDir::new().unwrap();
        assert!(Project::discover(temp_dir.path()).is_err());
    }

    #[tokio::test]
    async fn test_open_is_exclusive() {
        let temp_dir = TempDir::new().unwrap();
        let (project, _) = Project::init(temp_dir.path()).unwrap();
        let config = SystemConfig::default();

        let open = project.open(&config).unwrap();
        assert!(project.open(&config).is_err());

        let count = open
            .engine()
            .get_settings(&"s".into())
            .await
            .unwrap()
            .total_checkpoints;
        assert_eq!(count, 0);
    }
}
