//! Durable checkpoint store using sled
//!
//! Layout (one sled database, three trees):
//! ```text
//! checkpoints   <session>\0<id:be64> -> bincode(Checkpoint)
//! blobs         <session>\0<id:be64> -> codec byte + state payload
//! sequences     <session>            -> last allocated id (be64)
//! ```
//! The sequence counter only grows, so IDs are never reused after deletion.

use crate::blob::{self, DEFAULT_COMPRESS_THRESHOLD};
use crate::checkpoint::now_ms;
use crate::{
    Checkpoint, CheckpointId, DeleteReport, Result, SessionId, SnapshotStore, StateDigest,
    StoreError, Trigger,
};
use async_trait::async_trait;
use bytes::Bytes;
use sled::transaction::{ConflictableTransactionError, TransactionError, TransactionResult};
use sled::{Batch, Db, Transactional, Tree};
use std::collections::BTreeSet;
use std::path::Path;

/// sled-backed snapshot store
#[derive(Clone)]
pub struct SledStore {
    db: Db,
    checkpoints: Tree,
    blobs: Tree,
    sequences: Tree,
    compress_threshold: usize,
}

impl SledStore {
    /// Open or create a store in the given directory
    pub fn open(path: &Path) -> Result<Self> {
        let db = sled::open(path.join("checkpoints.db"))?;
        Self::from_db(db)
    }

    /// Open a throwaway store that is removed on drop
    pub fn temporary() -> Result<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> Result<Self> {
        Ok(Self {
            checkpoints: db.open_tree("checkpoints")?,
            blobs: db.open_tree("blobs")?,
            sequences: db.open_tree("sequences")?,
            db,
            compress_threshold: DEFAULT_COMPRESS_THRESHOLD,
        })
    }

    /// Set the blob size at which compression kicks in
    pub fn with_compress_threshold(mut self, bytes: usize) -> Self {
        self.compress_threshold = bytes;
        self
    }

    /// Lazily iterate a session's checkpoints, ascending by ID
    ///
    /// Each call starts a fresh scan.
    pub fn history(&self, session: &SessionId) -> impl Iterator<Item = Result<Checkpoint>> {
        self.checkpoints
            .scan_prefix(session_prefix(session))
            .values()
            .map(|value| Checkpoint::deserialize(&value?))
    }

    fn append_blocking(
        &self,
        session: &SessionId,
        trigger: Trigger,
        parent: Option<CheckpointId>,
        state: &[u8],
    ) -> Result<Checkpoint> {
        session.validate()?;

        let state_ref = StateDigest::of(state);
        let stored = blob::encode(state, self.compress_threshold)
            .map_err(|e| StoreError::write(session, e))?;
        let seq_key = session.as_str().as_bytes();
        let created_at_ms = now_ms();

        let result: TransactionResult<Checkpoint, StoreError> =
            (&self.checkpoints, &self.blobs, &self.sequences).transaction(
                |(records, blobs, sequences)| {
                    if let Some(parent) = parent {
                        if records.get(record_key(session, parent))?.is_none() {
                            return Err(ConflictableTransactionError::Abort(
                                StoreError::UnknownParent {
                                    session: session.clone(),
                                    parent,
                                },
                            ));
                        }
                    }

                    let last = match sequences.get(seq_key)? {
                        Some(value) => decode_seq(&value).ok_or_else(|| {
                            ConflictableTransactionError::Abort(StoreError::write(
                                session,
                                "corrupt sequence counter",
                            ))
                        })?,
                        None => 0,
                    };

                    let checkpoint = Checkpoint {
                        id: CheckpointId(last + 1),
                        session_id: session.clone(),
                        created_at_ms,
                        trigger,
                        size_bytes: state.len() as u64,
                        parent_id: parent,
                        state_ref,
                    };
                    let encoded = checkpoint
                        .serialize()
                        .map_err(ConflictableTransactionError::Abort)?;

                    let key = record_key(session, checkpoint.id);
                    records.insert(key.as_slice(), encoded)?;
                    blobs.insert(key.as_slice(), stored.as_slice())?;
                    sequences.insert(seq_key, &checkpoint.id.0.to_be_bytes()[..])?;
                    Ok(checkpoint)
                },
            );

        let checkpoint = result.map_err(|e| match e {
            TransactionError::Abort(err) => err,
            TransactionError::Storage(err) => StoreError::write(session, err),
        })?;

        // Not acknowledged until durable
        if let Err(err) = self.db.flush() {
            self.rollback_append(session, checkpoint.id);
            return Err(StoreError::write(session, err));
        }

        Ok(checkpoint)
    }

    /// Undo a committed but unflushed append
    fn rollback_append(&self, session: &SessionId, id: CheckpointId) {
        let key = record_key(session, id);
        let seq_key = session.as_str().as_bytes();
        let result: TransactionResult<(), StoreError> =
            (&self.checkpoints, &self.blobs, &self.sequences).transaction(
                |(records, blobs, sequences)| {
                    records.remove(key.as_slice())?;
                    blobs.remove(key.as_slice())?;
                    if id.0 > 1 {
                        sequences.insert(seq_key, &(id.0 - 1).to_be_bytes()[..])?;
                    } else {
                        sequences.remove(seq_key)?;
                    }
                    Ok(())
                },
            );
        if let Err(err) = result {
            tracing::error!(%session, %id, "Failed to roll back unflushed checkpoint: {}", err);
        }
    }

    fn latest_blocking(&self, session: &SessionId) -> Result<Option<Checkpoint>> {
        match self.checkpoints.scan_prefix(session_prefix(session)).next_back() {
            Some(item) => {
                let (_, value) = item?;
                Ok(Some(Checkpoint::deserialize(&value)?))
            }
            None => Ok(None),
        }
    }

    fn count_blocking(&self, session: &SessionId) -> Result<usize> {
        let mut count = 0;
        for key in self.checkpoints.scan_prefix(session_prefix(session)).keys() {
            key?;
            count += 1;
        }
        Ok(count)
    }

    fn load_state_blocking(&self, session: &SessionId, id: CheckpointId) -> Result<Option<Bytes>> {
        let key = record_key(session, id);
        let record = match self.checkpoints.get(&key)? {
            Some(record) => record,
            None => return Ok(None),
        };
        let checkpoint = Checkpoint::deserialize(&record)?;

        let corrupt = || StoreError::Corrupt {
            session: session.clone(),
            id,
        };
        let stored = self.blobs.get(&key)?.ok_or_else(corrupt)?;
        let state = blob::decode(&stored)?;
        if !checkpoint.state_ref.matches(&state) {
            return Err(corrupt());
        }

        Ok(Some(Bytes::from(state)))
    }

    fn delete_blocking(&self, session: &SessionId, ids: &BTreeSet<CheckpointId>) -> Result<DeleteReport> {
        let mut report = DeleteReport::default();

        for &id in ids {
            let key = record_key(session, id);
            let outcome: TransactionResult<bool, StoreError> =
                (&self.checkpoints, &self.blobs).transaction(|(records, blobs)| {
                    let existed = records.remove(key.as_slice())?.is_some();
                    blobs.remove(key.as_slice())?;
                    Ok(existed)
                });

            match outcome {
                Ok(true) => report.removed.push(id),
                Ok(false) => {}
                Err(err) => report.failed.push((id, StoreError::delete(session, id, err))),
            }
        }

        if !report.removed.is_empty() {
            if let Err(err) = self.db.flush() {
                tracing::warn!(%session, "Flush after delete failed: {}", err);
            }
        }

        Ok(report)
    }

    fn purge_blocking(&self, session: &SessionId) -> Result<usize> {
        session.validate()?;
        let prefix = session_prefix(session);

        let mut records = Batch::default();
        let mut count = 0;
        for key in self.checkpoints.scan_prefix(&prefix).keys() {
            records.remove(key?);
            count += 1;
        }

        let mut blobs = Batch::default();
        for key in self.blobs.scan_prefix(&prefix).keys() {
            blobs.remove(key?);
        }

        self.checkpoints.apply_batch(records)?;
        self.blobs.apply_batch(blobs)?;
        self.sequences.remove(session.as_str().as_bytes())?;
        self.db.flush()?;

        Ok(count)
    }
}

#[async_trait]
impl SnapshotStore for SledStore {
    async fn append(
        &self,
        session: &SessionId,
        trigger: Trigger,
        parent: Option<CheckpointId>,
        state: Bytes,
    ) -> Result<Checkpoint> {
        let store = self.clone();
        let session = session.clone();
        tokio::task::spawn_blocking(move || store.append_blocking(&session, trigger, parent, &state))
            .await?
    }

    async fn list(&self, session: &SessionId) -> Result<Vec<Checkpoint>> {
        let store = self.clone();
        let session = session.clone();
        tokio::task::spawn_blocking(move || store.history(&session).collect::<Result<Vec<_>>>())
            .await?
    }

    async fn load_state(&self, session: &SessionId, id: CheckpointId) -> Result<Option<Bytes>> {
        let store = self.clone();
        let session = session.clone();
        tokio::task::spawn_blocking(move || store.load_state_blocking(&session, id)).await?
    }

    async fn delete(&self, session: &SessionId, ids: &BTreeSet<CheckpointId>) -> Result<DeleteReport> {
        let store = self.clone();
        let session = session.clone();
        let ids = ids.clone();
        tokio::task::spawn_blocking(move || store.delete_blocking(&session, &ids)).await?
    }

    async fn purge_session(&self, session: &SessionId) -> Result<usize> {
        let store = self.clone();
        let session = session.clone();
        tokio::task::spawn_blocking(move || store.purge_blocking(&session)).await?
    }

    async fn latest(&self, session: &SessionId) -> Result<Option<Checkpoint>> {
        let store = self.clone();
        let session = session.clone();
        tokio::task::spawn_blocking(move || store.latest_blocking(&session)).await?
    }

    async fn total_count(&self, session: &SessionId) -> Result<usize> {
        let store = self.clone();
        let session = session.clone();
        tokio::task::spawn_blocking(move || store.count_blocking(&session)).await?
    }
}

fn session_prefix(session: &SessionId) -> Vec<u8> {
    let mut prefix = Vec::with_capacity(session.as_str().len() + 1);
    prefix.extend_from_slice(session.as_str().as_bytes());
    prefix.push(0);
    prefix
}

fn record_key(session: &SessionId, id: CheckpointId) -> Vec<u8> {
    let mut key = session_prefix(session);
    key.extend_from_slice(&id.0.to_be_bytes());
    key
}

fn decode_seq(value: &[u8]) -> Option<u64> {
    Some(u64::from_be_bytes(value.try_into().ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn session() -> SessionId {
        SessionId::new("session-1")
    }

    async fn append_n(store: &SledStore, n: usize) -> Vec<Checkpoint> {
        let mut out: Vec<Checkpoint> = Vec::new();
        for i in 0..n {
            let parent = out.last().map(|c| c.id);
            let cp = store
                .append(&session(), Trigger::Prompt, parent, Bytes::from(format!("state {}", i)))
                .await
                .unwrap();
            out.push(cp);
        }
        out
    }

    #[tokio::test]
    async fn test_append_allocates_sequential_ids() {
        let store = SledStore::temporary().unwrap();
        let checkpoints = append_n(&store, 3).await;

        let ids: Vec<u64> = checkpoints.iter().map(|c| c.id.0).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(checkpoints[0].parent_id, None);
        assert_eq!(checkpoints[2].parent_id, Some(CheckpointId(2)));
        assert_eq!(store.total_count(&session()).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_unknown_parent_allocates_no_id() {
        let store = SledStore::temporary().unwrap();
        append_n(&store, 1).await;

        let err = store
            .append(&session(), Trigger::Manual, Some(CheckpointId(42)), Bytes::from_static(b"x"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UnknownParent { .. }));

        let next = store
            .append(&session(), Trigger::Manual, Some(CheckpointId(1)), Bytes::from_static(b"y"))
            .await
            .unwrap();
        assert_eq!(next.id, CheckpointId(2));
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let store = SledStore::temporary().unwrap();
        append_n(&store, 2).await;

        let other = SessionId::new("session-10");
        let cp = store
            .append(&other, Trigger::Manual, None, Bytes::from_static(b"other"))
            .await
            .unwrap();

        assert_eq!(cp.id, CheckpointId(1));
        assert_eq!(store.list(&session()).await.unwrap().len(), 2);
        assert_eq!(store.list(&other).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_load_state_roundtrip_and_compression() {
        let store = SledStore::temporary().unwrap().with_compress_threshold(16);
        let state = Bytes::from(vec![7u8; 10_000]);
        let cp = store
            .append(&session(), Trigger::Manual, None, state.clone())
            .await
            .unwrap();

        assert_eq!(cp.size_bytes, 10_000);
        let loaded = store.load_state(&session(), cp.id).await.unwrap().unwrap();
        assert_eq!(loaded, state);
        assert!(store.load_state(&session(), CheckpointId(99)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_corrupt_blob_is_detected() {
        let store = SledStore::temporary().unwrap();
        let cp = append_n(&store, 1).await.remove(0);

        let key = record_key(&session(), cp.id);
        let tampered = blob::encode(b"tampered", DEFAULT_COMPRESS_THRESHOLD).unwrap();
        store.blobs.insert(key, tampered).unwrap();

        let err = store.load_state(&session(), cp.id).await.unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }

    #[tokio::test]
    async fn test_delete_any_subset_and_ids_are_not_reused() {
        let store = SledStore::temporary().unwrap();
        append_n(&store, 4).await;

        let ids: BTreeSet<_> = [CheckpointId(2), CheckpointId(4)].into_iter().collect();
        let report = store.delete(&session(), &ids).await.unwrap();

        assert_eq!(report.removed, vec![CheckpointId(2), CheckpointId(4)]);
        assert!(report.is_complete());
        assert_eq!(store.latest(&session()).await.unwrap().map(|c| c.id), Some(CheckpointId(3)));

        let next = store
            .append(&session(), Trigger::Prompt, Some(CheckpointId(3)), Bytes::from_static(b"z"))
            .await
            .unwrap();
        assert_eq!(next.id, CheckpointId(5));
    }

    #[tokio::test]
    async fn test_delete_unknown_ids_is_noop() {
        let store = SledStore::temporary().unwrap();
        append_n(&store, 2).await;

        let ids: BTreeSet<_> = [CheckpointId(7), CheckpointId(8)].into_iter().collect();
        let report = store.delete(&session(), &ids).await.unwrap();
        assert_eq!(report.removed_count(), 0);
        assert!(report.is_complete());
    }

    #[tokio::test]
    async fn test_history_is_restartable() {
        let store = SledStore::temporary().unwrap();
        append_n(&store, 3).await;

        let first: Vec<_> = store.history(&session()).take(2).collect::<Result<_>>().unwrap();
        let second: Vec<_> = store.history(&session()).collect::<Result<_>>().unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(second.len(), 3);
        assert_eq!(first[0], second[0]);
    }

    #[tokio::test]
    async fn test_purge_session_resets_counter() {
        let store = SledStore::temporary().unwrap();
        append_n(&store, 3).await;

        assert_eq!(store.purge_session(&session()).await.unwrap(), 3);
        assert_eq!(store.total_count(&session()).await.unwrap(), 0);
        assert_eq!(store.count_blocking(&session()).unwrap(), 0);

        let cp = store
            .append(&session(), Trigger::Manual, None, Bytes::from_static(b"fresh"))
            .await
            .unwrap();
        assert_eq!(cp.id, CheckpointId(1));
    }

    #[tokio::test]
    async fn test_reopen_preserves_history() {
        let dir = TempDir::new().unwrap();
        {
            let store = SledStore::open(dir.path()).unwrap();
            append_n(&store, 2).await;
        }

        let store = SledStore::open(dir.path()).unwrap();
        let history = store.list(&session()).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(store.total_size_bytes(&session()).await.unwrap(), 14);
    }
}
