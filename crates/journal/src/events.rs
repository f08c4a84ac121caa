//! Push notifications from the engine to observers
//!
//! Observers subscribe instead of polling the engine for state.

use crate::engine::Phase;
use crate::settings::CheckpointSettings;
use serde::Serialize;
use store::{Checkpoint, SessionId};
use tokio::sync::broadcast;

/// Something observable happened to a session
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    /// The session entered a new phase
    PhaseChanged { session_id: SessionId, phase: Phase },
    /// A checkpoint was written
    CheckpointCreated { checkpoint: Checkpoint },
    /// An automatic checkpoint could not be written and was dropped
    CheckpointDropped { session_id: SessionId, reason: String },
    /// Settings were changed
    SettingsUpdated {
        session_id: SessionId,
        settings: CheckpointSettings,
    },
    /// A cleanup pass finished
    CleanupCompleted {
        session_id: SessionId,
        removed: usize,
        failed: usize,
    },
    /// The session and its history were deleted
    SessionDeleted { session_id: SessionId },
}

impl EngineEvent {
    /// Session the event concerns
    pub fn session_id(&self) -> &SessionId {
        match self {
            Self::CheckpointCreated { checkpoint } => &checkpoint.session_id,
            Self::PhaseChanged { session_id, .. }
            | Self::CheckpointDropped { session_id, .. }
            | Self::SettingsUpdated { session_id, .. }
            | Self::CleanupCompleted { session_id, .. }
            | Self::SessionDeleted { session_id } => session_id,
        }
    }
}

/// Broadcast channel for engine events
#[derive(Debug)]
pub struct EventBus {
    sender: broadcast::Sender<EngineEvent>,
}

impl EventBus {
    /// Create a bus buffering `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an event; returns how many subscribers will see it
    pub fn publish(&self, event: EngineEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    /// Receive every event published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_reaches_subscribers() {
        let bus = EventBus::new(8);
        assert_eq!(bus.publish(EngineEvent::SessionDeleted { session_id: "s".into() }), 0);

        let mut rx = bus.subscribe();
        assert_eq!(bus.publish(EngineEvent::SessionDeleted { session_id: "s".into() }), 1);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.session_id().as_str(), "s");
    }

    #[test]
    fn test_event_wire_format() {
        let event = EngineEvent::CleanupCompleted {
            session_id: "s".into(),
            removed: 3,
            failed: 0,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "cleanup_completed");
        assert_eq!(json["removed"], 3);
    }
}
