//! In-memory checkpoint store
//!
//! Volatile, for tests and embedders that do not need durability. Supports
//! injecting write and delete failures.

use crate::checkpoint::now_ms;
use crate::{
    Checkpoint, CheckpointId, DeleteReport, Result, SessionId, SnapshotStore, StateDigest,
    StoreError, Trigger,
};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, HashMap};

#[derive(Default)]
struct SessionRecords {
    checkpoints: BTreeMap<CheckpointId, (Checkpoint, Bytes)>,
    last_id: u64,
}

#[derive(Default)]
struct Inner {
    sessions: HashMap<SessionId, SessionRecords>,
    failing_appends: usize,
    failing_deletes: BTreeSet<CheckpointId>,
}

/// In-memory snapshot store
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` appends fail with a write error
    pub fn fail_next_appends(&self, count: usize) {
        self.inner.lock().failing_appends = count;
    }

    /// Make deletion of these IDs fail (in any session)
    pub fn fail_deletes_of(&self, ids: impl IntoIterator<Item = CheckpointId>) {
        self.inner.lock().failing_deletes.extend(ids);
    }

    /// Clear all injected failures
    pub fn clear_failures(&self) {
        let mut inner = self.inner.lock();
        inner.failing_appends = 0;
        inner.failing_deletes.clear();
    }
}

#[async_trait]
impl SnapshotStore for MemoryStore {
    async fn append(
        &self,
        session: &SessionId,
        trigger: Trigger,
        parent: Option<CheckpointId>,
        state: Bytes,
    ) -> Result<Checkpoint> {
        session.validate()?;
        let mut inner = self.inner.lock();

        if inner.failing_appends > 0 {
            inner.failing_appends -= 1;
            return Err(StoreError::write(session, "injected write failure"));
        }

        let records = inner.sessions.entry(session.clone()).or_default();
        if let Some(parent) = parent {
            if !records.checkpoints.contains_key(&parent) {
                return Err(StoreError::UnknownParent {
                    session: session.clone(),
                    parent,
                });
            }
        }

        let checkpoint = Checkpoint {
            id: CheckpointId(records.last_id + 1),
            session_id: session.clone(),
            created_at_ms: now_ms(),
            trigger,
            size_bytes: state.len() as u64,
            parent_id: parent,
            state_ref: StateDigest::of(&state),
        };
        records.last_id = checkpoint.id.0;
        records
            .checkpoints
            .insert(checkpoint.id, (checkpoint.clone(), state));

        Ok(checkpoint)
    }

    async fn list(&self, session: &SessionId) -> Result<Vec<Checkpoint>> {
        let inner = self.inner.lock();
        Ok(inner
            .sessions
            .get(session)
            .map(|r| r.checkpoints.values().map(|(c, _)| c.clone()).collect())
            .unwrap_or_default())
    }

    async fn load_state(&self, session: &SessionId, id: CheckpointId) -> Result<Option<Bytes>> {
        let inner = self.inner.lock();
        Ok(inner
            .sessions
            .get(session)
            .and_then(|r| r.checkpoints.get(&id))
            .map(|(_, state)| state.clone()))
    }

    async fn delete(&self, session: &SessionId, ids: &BTreeSet<CheckpointId>) -> Result<DeleteReport> {
        let mut inner = self.inner.lock();
        let Inner {
            sessions,
            failing_deletes,
            ..
        } = &mut *inner;

        let mut report = DeleteReport::default();
        let records = match sessions.get_mut(session) {
            Some(records) => records,
            None => return Ok(report),
        };

        for &id in ids {
            if failing_deletes.contains(&id) {
                report
                    .failed
                    .push((id, StoreError::delete(session, id, "injected delete failure")));
            } else if records.checkpoints.remove(&id).is_some() {
                report.removed.push(id);
            }
        }

        Ok(report)
    }

    async fn purge_session(&self, session: &SessionId) -> Result<usize> {
        let mut inner = self.inner.lock();
        Ok(inner
            .sessions
            .remove(session)
            .map(|r| r.checkpoints.len())
            .unwrap_or(0))
    }
}
