use std::io::Write;

use javelin::queue::{
    ChangeKind, ChangeQueueStore, FileQueueStore, FileQueueStoreConfig, QueueFailure, QueueRecord,
};

fn config() -> FileQueueStoreConfig {
    FileQueueStoreConfig {
        sync_writes: false,
        ..Default::default()
    }
}

#[test]
fn test_recovery_after_torn_write() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("queue.log");

    // 1. "First run": enqueue three batches.
    {
        let store = FileQueueStore::open(&path, config()).unwrap();
        for batch in 0..3 {
            let records = (0..4)
                .map(|i| {
                    QueueRecord::new("customer", format!("k{batch}-{i}"), ChangeKind::Upsert)
                })
                .collect();
            store.append(records).unwrap();
        }
        assert_eq!(store.len().unwrap(), 12);
    }

    // 2. A crash leaves a half-written frame at the tail of the log.
    {
        let mut file = std::fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .unwrap();
        file.write_all(&[0x40, 0x00, 0x00, 0x00, 0xDE, 0xAD, 0xBE]).unwrap();
    }

    // 3. "Restart": every fully-written record is recovered, the torn frame
    // is gone, and the store keeps working.
    {
        let store = FileQueueStore::open(&path, config()).unwrap();
        assert_eq!(store.len().unwrap(), 12);

        let oldest = store.peek_oldest(4).unwrap();
        assert_eq!(oldest[0].key, "k0-0");
        store
            .remove(&oldest.iter().map(|r| r.id).collect::<Vec<_>>())
            .unwrap();
        assert_eq!(store.len().unwrap(), 8);
    }

    // 4. "Second restart": the post-recovery writes replay cleanly too.
    {
        let store = FileQueueStore::open(&path, config()).unwrap();
        assert_eq!(store.len().unwrap(), 8);
        assert_eq!(store.peek_oldest(1).unwrap()[0].key, "k1-0");
    }
}

#[test]
fn test_dead_letters_and_attempts_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("queue.log");
    let config = FileQueueStoreConfig {
        sync_writes: false,
        max_attempts: 3,
        ..Default::default()
    };

    let (failing_id, healthy_id) = {
        let store = FileQueueStore::open(&path, config.clone()).unwrap();
        let failing = QueueRecord::new("customer", "bad", ChangeKind::Upsert);
        let healthy = QueueRecord::new("customer", "good", ChangeKind::Upsert);
        let ids = (failing.id, healthy.id);
        store.append(vec![failing, healthy]).unwrap();

        // Two of three allowed attempts fail before the "crash".
        for _ in 0..2 {
            store
                .record_failures(&[QueueFailure {
                    id: ids.0,
                    error: "mapping conflict".to_string(),
                }])
                .unwrap();
        }
        ids
    };

    let store = FileQueueStore::open(&path, config).unwrap();
    assert_eq!(store.len().unwrap(), 2);

    // The third failure crosses the ceiling that was accumulated before the
    // restart.
    let dead = store
        .record_failures(&[QueueFailure {
            id: failing_id,
            error: "mapping conflict".to_string(),
        }])
        .unwrap();
    assert_eq!(dead.len(), 1);
    assert_eq!(dead[0].attempts, 3);

    let remaining = store.peek_oldest(10).unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, healthy_id);
}

#[test]
fn test_compaction_under_load_keeps_live_records() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("queue.log");
    let config = FileQueueStoreConfig {
        sync_writes: false,
        compact_min_frames: 16,
        compact_dead_ratio: 0.5,
        ..Default::default()
    };

    let store = FileQueueStore::open(&path, config.clone()).unwrap();

    // Interleave appends and removals so compaction triggers mid-stream.
    for round in 0..10 {
        let records: Vec<QueueRecord> = (0..4)
            .map(|i| QueueRecord::new("customer", format!("r{round}-{i}"), ChangeKind::Upsert))
            .collect();
        store.append(records).unwrap();

        let oldest = store.peek_oldest(3).unwrap();
        store
            .remove(&oldest.iter().map(|r| r.id).collect::<Vec<_>>())
            .unwrap();
    }

    let survivors = store.len().unwrap();
    assert_eq!(survivors, 10);

    // Whatever compaction did, a reopen sees the same queue in the same order.
    let before: Vec<String> = store
        .peek_oldest(usize::MAX)
        .unwrap()
        .into_iter()
        .map(|r| r.key)
        .collect();
    drop(store);

    let store = FileQueueStore::open(&path, config).unwrap();
    let after: Vec<String> = store
        .peek_oldest(usize::MAX)
        .unwrap()
        .into_iter()
        .map(|r| r.key)
        .collect();
    assert_eq!(before, after);
}
