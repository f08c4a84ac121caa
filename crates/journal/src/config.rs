//! Engine configuration

use serde::{Deserialize, Serialize};

/// Configuration for the checkpoint engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Run a cleanup pass once a session holds more checkpoints than this
    pub auto_cleanup_threshold: Option<usize>,
    /// Checkpoints kept by threshold-triggered cleanup
    pub auto_cleanup_keep: usize,
    /// Buffered notifications per subscriber before it starts lagging
    pub event_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            auto_cleanup_threshold: None,
            auto_cleanup_keep: 10,
            event_capacity: 256,
        }
    }
}

impl EngineConfig {
    /// Enable threshold-triggered cleanup
    pub fn with_auto_cleanup(mut self, threshold: usize, keep: usize) -> Self {
        self.auto_cleanup_threshold = Some(threshold);
        self.auto_cleanup_keep = keep;
        self
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        if self.auto_cleanup_keep < 1 {
            return Err("auto_cleanup_keep must be at least 1".to_string());
        }
        if let Some(threshold) = self.auto_cleanup_threshold {
            if threshold <= self.auto_cleanup_keep {
                return Err(format!(
                    "auto_cleanup_threshold ({}) must be greater than auto_cleanup_keep ({})",
                    threshold, self.auto_cleanup_keep
                ));
            }
        }
        if self.event_capacity < 1 {
            return Err("event_capacity must be at least 1".to_string());
        }
        Ok(())
    }
}
