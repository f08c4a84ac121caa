//! Engine performance benchmarks

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use journal::retention::{self, RetentionPolicy};
use journal::strategy::{self, CheckpointStrategy, SessionEvent};
use journal::{CheckpointEngine, EngineConfig, SettingsStore};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::sync::Arc;
use store::{Checkpoint, CheckpointId, MemoryStore, SessionId, StateDigest, Trigger};

fn history(len: u64) -> Vec<Checkpoint> {
    let session = SessionId::new("bench");
    (1..=len)
        .map(|id| Checkpoint {
            id: CheckpointId(id),
            session_id: session.clone(),
            created_at_ms: 1_700_000_000_000 + id,
            trigger: Trigger::Prompt,
            size_bytes: 4096,
            parent_id: id.checked_sub(1).filter(|p| *p > 0).map(CheckpointId),
            state_ref: StateDigest::of(&id.to_le_bytes()),
        })
        .collect()
}

fn bench_retention_plan(c: &mut Criterion) {
    let mut group = c.benchmark_group("retention_plan");
    let policy = RetentionPolicy::new(10).unwrap();

    for len in [100u64, 1_000, 10_000] {
        let checkpoints = history(len);
        group.bench_with_input(BenchmarkId::from_parameter(len), &checkpoints, |b, checkpoints| {
            b.iter(|| black_box(retention::plan(black_box(checkpoints), &policy)));
        });
    }

    group.finish();
}

fn bench_decide(c: &mut Criterion) {
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let events: Vec<SessionEvent> = (0..1_000)
        .map(|_| match rng.gen_range(0..3) {
            0 => SessionEvent::PromptSubmitted,
            1 => SessionEvent::tool("edit", rng.gen_bool(0.5)),
            _ => SessionEvent::ManualRequest,
        })
        .collect();

    c.bench_function("decide_1k_events", |b| {
        b.iter(|| {
            events
                .iter()
                .filter(|e| strategy::decide(CheckpointStrategy::Smart, true, e))
                .count()
        });
    });
}

fn bench_append(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();
    let engine = CheckpointEngine::new(
        Arc::new(MemoryStore::new()),
        SettingsStore::in_memory(),
        EngineConfig::default().with_auto_cleanup(200, 100),
    )
    .unwrap();
    let session = SessionId::new("bench");
    let state = Bytes::from(vec![0u8; 16 * 1024]);

    c.bench_function("create_manual_16k", |b| {
        b.iter(|| {
            rt.block_on(engine.create_manual(&session, state.clone()))
                .unwrap()
        });
    });
}

criterion_group!(benches, bench_retention_plan, bench_decide, bench_append);
criterion_main!(benches);
