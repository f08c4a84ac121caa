//! Checkpoint engine
//!
//! Owns the per-session state machine:
//! ```text
//! Idle -> Writing  -> Idle
//! Idle -> Cleaning -> Idle
//! ```
//! `Writing` and `Cleaning` never overlap for one session. Every operation
//! that touches a session's history takes the session's async lock, so a
//! cleanup arriving during a write waits for it (and vice versa) instead of
//! planning against a history that is about to change. Sessions share no
//! mutable state and run in parallel.

use crate::config::EngineConfig;
use crate::events::{EngineEvent, EventBus};
use crate::retention::{self, RetentionPolicy};
use crate::settings::{CheckpointSettings, SettingsStore};
use crate::strategy::{self, CheckpointStrategy, SessionEvent};
use crate::{EngineError, Result};
use bytes::Bytes;
use dashmap::DashMap;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use store::{Checkpoint, CheckpointId, DeleteReport, SessionId, SnapshotStore, StoreError, Trigger};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// What a session is doing right now
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Idle,
    /// An append is in flight
    Writing,
    /// A retention pass is in flight
    Cleaning,
}

/// Result of feeding a session event to the engine
#[derive(Debug)]
pub enum EventOutcome {
    /// A checkpoint was written
    Created(Checkpoint),
    /// The active strategy does not checkpoint this event
    Skipped,
    /// An automatic checkpoint failed to write and was dropped
    Dropped { reason: String },
}

impl EventOutcome {
    /// The written checkpoint, if any
    pub fn checkpoint(&self) -> Option<&Checkpoint> {
        match self {
            Self::Created(checkpoint) => Some(checkpoint),
            _ => None,
        }
    }
}

/// Settings of a session together with its checkpoint count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SettingsView {
    pub auto_checkpoint_enabled: bool,
    pub checkpoint_strategy: CheckpointStrategy,
    pub total_checkpoints: usize,
}

/// Outcome of a cleanup pass
#[derive(Debug, Default)]
pub struct CleanupReport {
    /// Checkpoints the retention plan selected
    pub planned: usize,
    /// Checkpoints actually deleted, oldest first
    pub removed: Vec<CheckpointId>,
    /// Deletions that failed; successful ones are not rolled back
    pub failed: Vec<(CheckpointId, StoreError)>,
    /// Uncompressed state size of the removed checkpoints
    pub bytes_reclaimed: u64,
}

impl CleanupReport {
    /// Number of checkpoints actually deleted
    pub fn removed_count(&self) -> usize {
        self.removed.len()
    }
}

#[derive(Default)]
struct SessionSlot {
    /// Serializes writes, cleanups and deletion of this session
    lock: tokio::sync::Mutex<()>,
    phase: parking_lot::Mutex<Phase>,
}

/// Resets the session to `Idle` when dropped, including on cancellation
struct PhaseGuard<'a> {
    engine: &'a CheckpointEngine,
    session: &'a SessionId,
    slot: &'a SessionSlot,
}

impl PhaseGuard<'_> {
    fn set(&self, phase: Phase) {
        *self.slot.phase.lock() = phase;
        self.engine.events.publish(EngineEvent::PhaseChanged {
            session_id: self.session.clone(),
            phase,
        });
    }
}

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        self.set(Phase::Idle);
    }
}

/// Orchestrates strategy decisions, snapshot writes and retention passes
pub struct CheckpointEngine {
    store: Arc<dyn SnapshotStore>,
    settings: SettingsStore,
    sessions: DashMap<SessionId, Arc<SessionSlot>, ahash::RandomState>,
    events: EventBus,
    config: EngineConfig,
}

impl CheckpointEngine {
    /// Create an engine over a snapshot store and settings storage
    pub fn new(
        store: Arc<dyn SnapshotStore>,
        settings: SettingsStore,
        config: EngineConfig,
    ) -> Result<Self> {
        config.validate().map_err(EngineError::Config)?;
        Ok(Self {
            store,
            settings,
            sessions: DashMap::with_hasher(ahash::RandomState::new()),
            events: EventBus::new(config.event_capacity),
            config,
        })
    }

    /// Subscribe to engine notifications
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    /// Current phase of a session
    pub fn phase(&self, session: &SessionId) -> Phase {
        self.sessions
            .get(session)
            .map(|slot| *slot.phase.lock())
            .unwrap_or_default()
    }

    /// Feed a session event to the engine
    ///
    /// `capture` produces the state blob and is only called when a checkpoint
    /// is actually written. Settings are read under the session lock, so an
    /// update that lands while the event waits on an in-flight write applies
    /// to it. A failed write for an automatic event is logged, published and
    /// reported as `Dropped`; for a manual request it is an error.
    pub async fn on_event<F>(
        &self,
        session: &SessionId,
        event: SessionEvent,
        capture: F,
    ) -> Result<EventOutcome>
    where
        F: FnOnce() -> Bytes + Send,
    {
        let slot = self.slot(session);
        let _serial = slot.lock.lock().await;

        let settings = self.settings.load(session)?;
        let strategy = settings.checkpoint_strategy;

        if !strategy::decide(strategy, settings.auto_checkpoint_enabled, &event) {
            debug!(
                %session,
                event = event.kind(),
                %strategy,
                enabled = settings.auto_checkpoint_enabled,
                "Event does not trigger a checkpoint"
            );
            return Ok(EventOutcome::Skipped);
        }

        let trigger = strategy::trigger_for(strategy, &event);
        match self.write_checkpoint(session, &slot, trigger, capture).await {
            Ok(checkpoint) => Ok(EventOutcome::Created(checkpoint)),
            Err(err) if event.is_manual() => Err(EngineError::StorageWrite(err)),
            Err(err) => {
                warn!(%session, event = event.kind(), "Dropping automatic checkpoint: {}", err);
                let reason = err.to_string();
                self.events.publish(EngineEvent::CheckpointDropped {
                    session_id: session.clone(),
                    reason: reason.clone(),
                });
                Ok(EventOutcome::Dropped { reason })
            }
        }
    }

    /// Write a checkpoint on explicit user request
    pub async fn create_manual(&self, session: &SessionId, state: Bytes) -> Result<Checkpoint> {
        let slot = self.slot(session);
        let _serial = slot.lock.lock().await;
        self.write_checkpoint(session, &slot, Trigger::Manual, move || state)
            .await
            .map_err(EngineError::StorageWrite)
    }

    /// Settings of a session plus its checkpoint count
    pub async fn get_settings(&self, session: &SessionId) -> Result<SettingsView> {
        let settings = self.settings.load(session)?;
        let total_checkpoints = self.store.total_count(session).await?;

        Ok(SettingsView {
            auto_checkpoint_enabled: settings.auto_checkpoint_enabled,
            checkpoint_strategy: settings.checkpoint_strategy,
            total_checkpoints,
        })
    }

    /// Change settings; the strategy is given by its wire name
    ///
    /// An unknown strategy is rejected before anything is written. The new
    /// settings are durable when this returns.
    pub fn update_settings(
        &self,
        session: &SessionId,
        auto_checkpoint_enabled: bool,
        strategy: &str,
    ) -> Result<CheckpointSettings> {
        let settings = CheckpointSettings {
            auto_checkpoint_enabled,
            checkpoint_strategy: strategy.parse()?,
        };
        self.apply_settings(session, settings)?;
        Ok(settings)
    }

    /// Replace the settings of a session
    pub fn apply_settings(&self, session: &SessionId, settings: CheckpointSettings) -> Result<()> {
        self.settings.save(session, &settings)?;
        info!(
            %session,
            enabled = settings.auto_checkpoint_enabled,
            strategy = %settings.checkpoint_strategy,
            "Updated checkpoint settings"
        );
        self.events.publish(EngineEvent::SettingsUpdated {
            session_id: session.clone(),
            settings,
        });
        Ok(())
    }

    /// Delete all but the `keep_count` most recent checkpoints
    pub async fn cleanup(&self, session: &SessionId, keep_count: usize) -> Result<CleanupReport> {
        self.cleanup_with_cancel(session, keep_count, &CancellationToken::new())
            .await
    }

    /// Cleanup that can be cancelled until the delete batch starts
    ///
    /// Once deletes are issued the pass runs to completion and reports the
    /// true number removed.
    pub async fn cleanup_with_cancel(
        &self,
        session: &SessionId,
        keep_count: usize,
        cancel: &CancellationToken,
    ) -> Result<CleanupReport> {
        let policy = RetentionPolicy::new(keep_count)?;
        let slot = self.slot(session);

        let _serial = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(EngineError::Cancelled),
            guard = slot.lock.lock() => guard,
        };
        let _phase = self.enter(session, &slot, Phase::Cleaning);

        self.run_cleanup(session, &policy, Some(cancel)).await
    }

    /// Delete a session: every checkpoint, its ID counter and its settings
    ///
    /// The session's slot is dropped too unless another caller is queued on it.
    pub async fn delete_session(&self, session: &SessionId) -> Result<usize> {
        let slot = self.slot(session);
        let removed = {
            let _serial = slot.lock.lock().await;
            let removed = {
                let _phase = self.enter(session, &slot, Phase::Cleaning);
                let removed = self.store.purge_session(session).await?;
                self.settings.remove(session)?;
                removed
            };
            // Map entry plus the local handle
            self.sessions.remove_if(session, |_, held| Arc::strong_count(held) <= 2);
            removed
        };

        info!(%session, removed, "Deleted session");
        self.events.publish(EngineEvent::SessionDeleted {
            session_id: session.clone(),
        });
        Ok(removed)
    }

    /// Checkpoint history of a session, oldest first
    pub async fn history(&self, session: &SessionId) -> Result<Vec<Checkpoint>> {
        Ok(self.store.list(session).await?)
    }

    /// State blob of a checkpoint
    pub async fn load_state(&self, session: &SessionId, id: CheckpointId) -> Result<Option<Bytes>> {
        Ok(self.store.load_state(session, id).await?)
    }

    /// Append a checkpoint; the caller holds the session lock
    async fn write_checkpoint<F>(
        &self,
        session: &SessionId,
        slot: &SessionSlot,
        trigger: Trigger,
        capture: F,
    ) -> std::result::Result<Checkpoint, StoreError>
    where
        F: FnOnce() -> Bytes + Send,
    {
        let phase = self.enter(session, slot, Phase::Writing);

        let parent = self.store.latest(session).await?.map(|c| c.id);
        let checkpoint = self.store.append(session, trigger, parent, capture()).await?;

        info!(
            %session,
            id = %checkpoint.id,
            %trigger,
            size = checkpoint.size_bytes,
            "Created checkpoint"
        );
        self.events.publish(EngineEvent::CheckpointCreated {
            checkpoint: checkpoint.clone(),
        });

        if let Some(threshold) = self.config.auto_cleanup_threshold {
            self.auto_cleanup(session, threshold, &phase).await;
        }

        Ok(checkpoint)
    }

    /// Threshold-triggered cleanup, run while still holding the session lock
    async fn auto_cleanup(&self, session: &SessionId, threshold: usize, phase: &PhaseGuard<'_>) {
        let count = match self.store.total_count(session).await {
            Ok(count) => count,
            Err(err) => {
                warn!(%session, "Skipping threshold cleanup, count failed: {}", err);
                return;
            }
        };
        if count <= threshold {
            return;
        }
        let Ok(policy) = RetentionPolicy::new(self.config.auto_cleanup_keep) else {
            return;
        };

        phase.set(Phase::Cleaning);
        match self.run_cleanup(session, &policy, None).await {
            Ok(report) => info!(
                %session,
                count,
                threshold,
                removed = report.removed_count(),
                "Threshold cleanup finished"
            ),
            Err(err) => warn!(%session, "Threshold cleanup failed: {}", err),
        }
    }

    async fn run_cleanup(
        &self,
        session: &SessionId,
        policy: &RetentionPolicy,
        cancel: Option<&CancellationToken>,
    ) -> Result<CleanupReport> {
        let history = self.store.list(session).await?;
        let plan = retention::plan(&history, policy);
        debug!(
            %session,
            history = history.len(),
            keep = policy.keep_count(),
            planned = plan.to_delete.len(),
            "Planned cleanup"
        );

        if plan.is_empty() {
            self.events.publish(EngineEvent::CleanupCompleted {
                session_id: session.clone(),
                removed: 0,
                failed: 0,
            });
            return Ok(CleanupReport::default());
        }

        if cancel.is_some_and(CancellationToken::is_cancelled) {
            info!(%session, "Cleanup cancelled before deleting");
            return Err(EngineError::Cancelled);
        }

        let DeleteReport { removed, mut failed } =
            self.store.delete(session, &plan.delete_set()).await?;

        let removed_set: BTreeSet<CheckpointId> = removed.iter().copied().collect();
        let bytes_reclaimed = history
            .iter()
            .filter(|c| removed_set.contains(&c.id))
            .map(|c| c.size_bytes)
            .sum();

        self.events.publish(EngineEvent::CleanupCompleted {
            session_id: session.clone(),
            removed: removed.len(),
            failed: failed.len(),
        });

        if !failed.is_empty() {
            warn!(
                %session,
                removed = removed.len(),
                failed = failed.len(),
                "Cleanup finished with failed deletions"
            );
            if removed.is_empty() {
                let (_, err) = failed.remove(0);
                return Err(EngineError::StorageDelete(err));
            }
        } else {
            info!(%session, removed = removed.len(), bytes_reclaimed, "Cleaned up checkpoints");
        }

        Ok(CleanupReport {
            planned: plan.to_delete.len(),
            removed,
            failed,
            bytes_reclaimed,
        })
    }

    fn slot(&self, session: &SessionId) -> Arc<SessionSlot> {
        if let Some(slot) = self.sessions.get(session) {
            return Arc::clone(&slot);
        }
        Arc::clone(&self.sessions.entry(session.clone()).or_default())
    }

    fn enter<'a>(&'a self, session: &'a SessionId, slot: &'a SessionSlot, phase: Phase) -> PhaseGuard<'a> {
        let guard = PhaseGuard {
            engine: self,
            session,
            slot,
        };
        guard.set(phase);
        guard
    }
}
