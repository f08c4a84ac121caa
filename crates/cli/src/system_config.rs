//! User-level configuration file
//!
//! Lives at `~/.config/keepsake/config.toml` unless `KEEPSAKE_CONFIG` points
//! elsewhere. Missing files and missing keys fall back to defaults.

use anyhow::{Context, Result};
use journal::EngineConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable overriding the config file location
pub const CONFIG_ENV: &str = "KEEPSAKE_CONFIG";

const MAX_EVENT_CAPACITY: usize = 65_536;
const MAX_COMPRESS_THRESHOLD: usize = 64 * 1024 * 1024;

/// Full configuration file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    pub engine: EngineConfig,
    pub store: StoreConfig,
}

/// `[store]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// State blobs at least this large are zstd-compressed
    pub compress_threshold_bytes: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            compress_threshold_bytes: store::blob::DEFAULT_COMPRESS_THRESHOLD,
        }
    }
}

impl SystemConfig {
    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        self.engine.validate().map_err(anyhow::Error::msg)?;

        if self.engine.event_capacity > MAX_EVENT_CAPACITY {
            anyhow::bail!(
                "event_capacity must be at most {} (got {})",
                MAX_EVENT_CAPACITY,
                self.engine.event_capacity
            );
        }
        if self.store.compress_threshold_bytes > MAX_COMPRESS_THRESHOLD {
            anyhow::bail!(
                "compress_threshold_bytes must be at most {} (got {})",
                MAX_COMPRESS_THRESHOLD,
                self.store.compress_threshold_bytes
            );
        }
        Ok(())
    }

    /// Read a single value by dotted key
    pub fn get(&self, key: &str) -> Result<String> {
        let value = match key {
            "engine.auto_cleanup_threshold" => self
                .engine
                .auto_cleanup_threshold
                .map_or_else(|| "off".to_string(), |t| t.to_string()),
            "engine.auto_cleanup_keep" => self.engine.auto_cleanup_keep.to_string(),
            "engine.event_capacity" => self.engine.event_capacity.to_string(),
            "store.compress_threshold_bytes" => self.store.compress_threshold_bytes.to_string(),
            _ => anyhow::bail!(
                "Unknown config key: {}. Use 'ks config list' to see available keys.",
                key
            ),
        };
        Ok(value)
    }

    /// Set a single value by dotted key; nothing changes if the result is invalid
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let mut next = self.clone();
        next.assign(key, value)?;
        next.validate().context("Invalid configuration value")?;
        *self = next;
        Ok(())
    }

    fn assign(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "engine.auto_cleanup_threshold" => {
                self.engine.auto_cleanup_threshold = match value {
                    "off" | "none" => None,
                    _ => Some(
                        value
                            .parse()
                            .context("Invalid value: must be a positive integer or 'off'")?,
                    ),
                };
            }
            "engine.auto_cleanup_keep" => {
                self.engine.auto_cleanup_keep = value
                    .parse()
                    .context("Invalid value: must be a positive integer")?;
            }
            "engine.event_capacity" => {
                self.engine.event_capacity = value
                    .parse()
                    .context("Invalid value: must be a positive integer")?;
            }
            "store.compress_threshold_bytes" => {
                self.store.compress_threshold_bytes = value
                    .parse()
                    .context("Invalid value: must be a non-negative integer")?;
            }
            _ => anyhow::bail!(
                "Unknown config key: {}. Use 'ks config list' to see available keys.",
                key
            ),
        }
        Ok(())
    }
}

/// Location of the config file
pub fn config_file_path() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os(CONFIG_ENV) {
        return Some(PathBuf::from(path));
    }
    dirs::config_dir().map(|dir| dir.join("keepsake").join("config.toml"))
}

/// Load the config file, or defaults if it does not exist
pub fn load() -> Result<SystemConfig> {
    let Some(path) = config_file_path() else {
        return Ok(SystemConfig::default());
    };
    if !path.exists() {
        return Ok(SystemConfig::default());
    }

    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let config: SystemConfig = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("Invalid configuration in {}", path.display()))?;

    Ok(config)
}

/// Write the config file, creating parent directories
pub fn save(config: &SystemConfig) -> Result<()> {
    let path = config_file_path().context("Could not determine config file path")?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create config directory")?;
    }

    let contents = toml::to_string_pretty(config).context("Failed to serialize config")?;
    std::fs::write(&path, contents)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Create a default config file if none exists; returns whether one was created
pub fn init_if_missing() -> Result<bool> {
    let path = config_file_path().context("Could not determine config file path")?;
    if path.exists() {
        return Ok(false);
    }
    save(&SystemConfig::default())?;
    Ok(true)
}

/// Annotated example configuration
pub fn example_config() -> &'static str {
    r#"# Keepsake configuration

[engine]
# Run a cleanup pass once a session holds more checkpoints than this.
# Omit to disable threshold cleanup.
auto_cleanup_threshold = 200
# Checkpoints kept by threshold cleanup (must be below the threshold)
auto_cleanup_keep = 50
# Buffered notifications per subscriber (1-65536)
event_capacity = 256

[store]
# State blobs at least this large are compressed (0-67108864)
compress_threshold_bytes = 4096
"#
}
