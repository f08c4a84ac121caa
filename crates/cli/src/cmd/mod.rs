//! CLI command implementations

pub mod api;
pub mod cleanup;
pub mod config;
pub mod count;
pub mod forget;
pub mod init;
pub mod log;
pub mod record;
pub mod set;
pub mod settings;

use crate::project::{OpenProject, Project};
use crate::system_config::{self, SystemConfig};
use anyhow::Result;
use journal::{SessionId, SessionScope};
use std::path::PathBuf;

/// Which project and session a command targets
#[derive(Debug, Clone)]
pub struct Target {
    /// Start project discovery here instead of the current directory
    pub project_dir: Option<PathBuf>,
    pub session: String,
}

/// Everything a project command needs once the store is open
pub struct CommandContext {
    pub project: Project,
    pub open: OpenProject,
    pub config: SystemConfig,
    pub scope: SessionScope,
}

impl CommandContext {
    pub fn session(&self) -> &SessionId {
        &self.scope.session_id
    }
}

impl Target {
    /// Discover the project, load config and open the store
    pub fn open(&self) -> Result<CommandContext> {
        let project = Project::locate(self.project_dir.as_deref())?;
        let config = system_config::load()?;
        let open = project.open(&config)?;
        let scope = project.scope(&self.session);

        Ok(CommandContext {
            project,
            open,
            config,
            scope,
        })
    }
}
