//! Retention policies and cleanup planning

use crate::EngineError;
use std::collections::BTreeSet;
use store::{Checkpoint, CheckpointId};

/// Retention policy configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    keep_count: usize,
}

impl RetentionPolicy {
    /// Keep the `keep_count` most recent checkpoints (at least 1)
    pub fn new(keep_count: usize) -> Result<Self, EngineError> {
        if keep_count < 1 {
            return Err(EngineError::InvalidRetentionTarget(keep_count as i64));
        }
        Ok(Self { keep_count })
    }

    /// Number of most recent checkpoints retained unconditionally
    pub fn keep_count(&self) -> usize {
        self.keep_count
    }
}

/// Checkpoints selected by a cleanup pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetentionPlan {
    /// Checkpoints to delete, oldest first
    pub to_delete: Vec<CheckpointId>,
    /// Checkpoints that survive, oldest first
    pub retained: Vec<CheckpointId>,
    /// Uncompressed state size freed if every deletion succeeds
    pub bytes_reclaimable: u64,
}

impl RetentionPlan {
    /// True if the pass has nothing to delete
    pub fn is_empty(&self) -> bool {
        self.to_delete.is_empty()
    }

    /// Deletion set in store order
    pub fn delete_set(&self) -> BTreeSet<CheckpointId> {
        self.to_delete.iter().copied().collect()
    }
}

/// Select every checkpoint except the `keep_count` with the largest IDs
///
/// Deletions are ordered ascending so a pass interrupted halfway leaves the
/// newest of the doomed checkpoints behind, and re-running the same plan
/// finishes the job.
pub fn plan(history: &[Checkpoint], policy: &RetentionPolicy) -> RetentionPlan {
    if history.len() <= policy.keep_count() {
        return RetentionPlan {
            retained: history.iter().map(|c| c.id).collect(),
            ..Default::default()
        };
    }

    let mut ordered: Vec<&Checkpoint> = history.iter().collect();
    ordered.sort_unstable_by_key(|c| c.id);

    let split = ordered.len() - policy.keep_count();
    let (doomed, kept) = ordered.split_at(split);

    RetentionPlan {
        to_delete: doomed.iter().map(|c| c.id).collect(),
        retained: kept.iter().map(|c| c.id).collect(),
        bytes_reclaimable: doomed.iter().map(|c| c.size_bytes).sum(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use store::{SessionId, StateDigest, Trigger};

    fn history(ids: impl IntoIterator<Item = u64>) -> Vec<Checkpoint> {
        ids.into_iter()
            .map(|id| Checkpoint {
                id: CheckpointId(id),
                session_id: SessionId::new("s"),
                created_at_ms: id * 1000,
                trigger: Trigger::Prompt,
                size_bytes: 100,
                parent_id: id.checked_sub(1).filter(|p| *p > 0).map(CheckpointId),
                state_ref: StateDigest::of(&id.to_le_bytes()),
            })
            .collect()
    }

    fn ids(range: std::ops::RangeInclusive<u64>) -> Vec<CheckpointId> {
        range.map(CheckpointId).collect()
    }

    #[test]
    fn test_keeps_most_recent() {
        let plan = plan(&history(1..=15), &RetentionPolicy::new(10).unwrap());

        assert_eq!(plan.to_delete, ids(1..=5));
        assert_eq!(plan.retained, ids(6..=15));
        assert_eq!(plan.bytes_reclaimable, 500);
    }

    #[test]
    fn test_short_history_is_noop() {
        let policy = RetentionPolicy::new(10).unwrap();
        assert!(plan(&history(1..=10), &policy).is_empty());
        assert!(plan(&history(1..=3), &policy).is_empty());
        assert!(plan(&[], &policy).is_empty());
    }

    #[test]
    fn test_keep_one_leaves_only_newest() {
        let plan = plan(&history(1..=4), &RetentionPolicy::new(1).unwrap());
        assert_eq!(plan.to_delete, ids(1..=3));
        assert_eq!(plan.retained, ids(4..=4));
    }

    #[test]
    fn test_unordered_input_gives_same_plan() {
        let mut shuffled = history(1..=8);
        shuffled.reverse();
        shuffled.swap(1, 5);

        let policy = RetentionPolicy::new(3).unwrap();
        assert_eq!(plan(&shuffled, &policy), plan(&history(1..=8), &policy));
    }

    #[test]
    fn test_sparse_ids_after_previous_cleanup() {
        let plan = plan(&history([4, 5, 9, 12, 13]), &RetentionPolicy::new(2).unwrap());
        assert_eq!(plan.to_delete, vec![CheckpointId(4), CheckpointId(5), CheckpointId(9)]);
        assert_eq!(plan.delete_set().len(), 3);
    }

    #[test]
    fn test_zero_keep_count_rejected() {
        let err = RetentionPolicy::new(0).unwrap_err();
        assert!(matches!(err, EngineError::InvalidRetentionTarget(0)));
    }
}
