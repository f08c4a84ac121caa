//! Checkpoint strategy and retention engine
//!
//! This crate provides:
//! - Strategy evaluation (which session events trigger a checkpoint)
//! - Retention planning (which checkpoints a cleanup pass deletes)
//! - Per-session settings records
//! - The `CheckpointEngine` orchestrator with per-session serialization
//! - Push notifications for observers
//! - Transport-agnostic request/response API

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod retention;
pub mod settings;
pub mod strategy;

// Re-exports
pub use api::{ApiError, ApiReply, ApiRequest, ApiResponse, CheckpointApi, SessionScope};
pub use config::EngineConfig;
pub use engine::{CheckpointEngine, CleanupReport, EventOutcome, Phase, SettingsView};
pub use error::EngineError;
pub use events::{EngineEvent, EventBus};
pub use retention::{RetentionPlan, RetentionPolicy};
pub use settings::{CheckpointSettings, SettingsStore};
pub use strategy::{CheckpointStrategy, SessionEvent};

pub use store::{Checkpoint, CheckpointId, SessionId, SnapshotStore, Trigger};

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;
