//! Configuration management command
//!
//! Provides CLI interface to view and edit the user configuration file.

use crate::system_config::{self, SystemConfig};
use anyhow::{Context, Result};
use owo_colors::OwoColorize;

/// List all configuration values
pub async fn run_list() -> Result<()> {
    let config = system_config::load()?;
    let config_path =
        system_config::config_file_path().context("Could not determine config file path")?;

    println!("{}", "Keepsake Configuration".bold());
    println!("{}: {}\n", "Location".dimmed(), config_path.display().dimmed());

    print_section(&config, "engine", &[
        "auto_cleanup_threshold",
        "auto_cleanup_keep",
        "event_capacity",
    ])?;
    println!();
    print_section(&config, "store", &["compress_threshold_bytes"])?;

    println!("\n{}", "Valid Ranges:".bold());
    println!("  auto_cleanup_threshold: off, or greater than auto_cleanup_keep");
    println!("  auto_cleanup_keep: 1 or more");
    println!("  event_capacity: 1-65,536");
    println!("  compress_threshold_bytes: 0-67,108,864");

    Ok(())
}

fn print_section(config: &SystemConfig, section: &str, keys: &[&str]) -> Result<()> {
    println!("{}", format!("[{}]", section).yellow());
    for key in keys {
        let value = config.get(&format!("{}.{}", section, key))?;
        println!("  {} = {}", key.cyan(), value);
    }
    Ok(())
}

/// Get a single configuration value
pub async fn run_get(key: &str) -> Result<()> {
    let config = system_config::load()?;
    println!("{}", config.get(key)?);
    Ok(())
}

/// Set a configuration value
pub async fn run_set(key: &str, value: &str) -> Result<()> {
    let mut config = system_config::load()?;
    config.set(key, value)?;
    system_config::save(&config)?;

    println!("{} {} = {}", "✓".green(), key.cyan(), value);
    Ok(())
}

/// Show the config file path and optionally create it
pub async fn run_path(create: bool) -> Result<()> {
    let config_path =
        system_config::config_file_path().context("Could not determine config file path")?;

    if create && system_config::init_if_missing()? {
        println!("{} Created config file at: {}", "✓".green(), config_path.display());
    } else if config_path.exists() {
        println!("{}", config_path.display());
    } else {
        println!("{}", config_path.display());
        println!("{}", "File does not exist. Use --create to create it.".yellow());
    }

    Ok(())
}

/// Show example configuration
pub async fn run_example() -> Result<()> {
    println!("{}", system_config::example_config());
    Ok(())
}
