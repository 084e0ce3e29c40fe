//! Criterion benchmarks for the javelin pipeline.
//!
//! Covers the two hot paths:
//! - enqueueing change records into the queue store
//! - draining the queue into a search engine in batches

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use javelin::engine::client::{
    BulkItemResult, BulkOp, BulkResponse, IndexState, SearchEngine,
};
use javelin::engine::resolver::StaticConfigResolver;
use javelin::engine::IndexConfiguration;
use javelin::enqueue::Enqueuer;
use javelin::error::Result;
use javelin::indexer::BatchIndexer;
use javelin::queue::{ChangeKind, ChangeQueueStore, MemoryQueueStore};
use javelin::store::MemoryPrimaryStore;
use serde_json::json;
use std::hint::black_box;
use std::sync::Arc;

/// Engine stub that accepts every operation without I/O.
#[derive(Debug, Default)]
struct AcceptAllEngine;

impl SearchEngine for AcceptAllEngine {
    fn bulk(&self, ops: &[BulkOp]) -> Result<BulkResponse> {
        Ok(BulkResponse {
            items: ops
                .iter()
                .map(|op| BulkItemResult::ok(op.index.clone(), op.id.clone()))
                .collect(),
        })
    }

    fn get_index(&self, _name: &str) -> Result<Option<IndexState>> {
        Ok(None)
    }

    fn create_index(&self, _config: &IndexConfiguration) -> Result<bool> {
        Ok(true)
    }

    fn delete_index(&self, _name: &str) -> Result<bool> {
        Ok(false)
    }
}

fn primary_store(rows: usize) -> Arc<MemoryPrimaryStore> {
    let store = Arc::new(MemoryPrimaryStore::new());
    store.register_entity("customer", "id");
    for i in 0..rows {
        store
            .save(
                "customer",
                json!({"id": i, "name": format!("customer {i}"), "tier": i % 5}),
            )
            .unwrap();
    }
    store
}

fn resolver() -> Arc<StaticConfigResolver> {
    let mut resolver = StaticConfigResolver::new();
    resolver.register(
        "customer",
        IndexConfiguration::new("search-customer", json!({"name": {"type": "text"}}), json!({}))
            .unwrap(),
    );
    Arc::new(resolver)
}

fn bench_enqueue(c: &mut Criterion) {
    const BATCH: usize = 1000;
    let store = primary_store(0);
    let keys: Vec<String> = (0..BATCH).map(|i| i.to_string()).collect();

    let mut group = c.benchmark_group("enqueue");
    group.throughput(Throughput::Elements(BATCH as u64));
    group.bench_function("keys_per_1000", |b| {
        b.iter(|| {
            let queue = Arc::new(MemoryQueueStore::default());
            let enqueuer = Enqueuer::new(queue.clone(), store.clone());
            let written = enqueuer
                .enqueue_keys("customer", black_box(&keys), ChangeKind::Upsert)
                .unwrap();
            black_box(written)
        })
    });
    group.finish();
}

fn bench_drain(c: &mut Criterion) {
    const RECORDS: usize = 1000;
    let store = primary_store(RECORDS);
    let resolver = resolver();
    let keys: Vec<String> = (0..RECORDS).map(|i| i.to_string()).collect();

    let mut group = c.benchmark_group("drain");
    group.throughput(Throughput::Elements(RECORDS as u64));
    group.bench_function("process_queue_batch_100", |b| {
        b.iter(|| {
            let queue = Arc::new(MemoryQueueStore::default());
            let enqueuer = Enqueuer::new(queue.clone(), store.clone());
            enqueuer
                .enqueue_keys("customer", &keys, ChangeKind::Upsert)
                .unwrap();

            let indexer = BatchIndexer::new(
                queue.clone(),
                Arc::new(AcceptAllEngine),
                store.clone(),
                resolver.clone(),
            );
            let processed = indexer.process_queue(100, 0).unwrap();
            assert!(queue.is_empty().unwrap());
            black_box(processed)
        })
    });
    group.finish();
}

criterion_group!(benches, bench_enqueue, bench_drain);
criterion_main!(benches);
