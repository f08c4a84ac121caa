//! Initialize Keepsake in a directory

use crate::project::Project;
use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use std::path::PathBuf;

pub async fn run(dir: Option<PathBuf>) -> Result<()> {
    let root = match dir {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    let (project, existed) = Project::init(&root)?;

    if existed {
        println!(
            "{} Already initialized at {}",
            "✓".green(),
            project.keepsake_dir().display()
        );
    } else {
        println!(
            "{} Initialized Keepsake in {}",
            "✓".green(),
            project.keepsake_dir().display()
        );
    }

    Ok(())
}
