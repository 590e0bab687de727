//! SQLite heartbeat store: appends survive a reopen against the same file
//! and per-monitor queries/deletes stay isolated.

#![cfg(feature = "storage-sqlite")]

use chrono::Utc;
use peekaping_engine::model::{Heartbeat, Status};
use peekaping_engine::store::sqlite::SqliteStore;
use peekaping_engine::store::HeartbeatStore;

fn heartbeat(monitor_id: &str, sequence: u64, status: Status) -> Heartbeat {
    Heartbeat {
        monitor_id: monitor_id.to_string(),
        sequence,
        timestamp: Utc::now(),
        status,
        message: "probe result".to_string(),
        latency_ms: 12,
        retries: 0,
        important: sequence == 1,
    }
}

#[tokio::test]
async fn appended_heartbeats_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("heartbeats.sqlite3");

    {
        let store = SqliteStore::new(&db_path).await.unwrap();
        store.append(heartbeat("m1", 1, Status::Up)).await.unwrap();
        store.append(heartbeat("m1", 2, Status::Down)).await.unwrap();
    }

    let reopened = SqliteStore::new(&db_path).await.unwrap();
    let latest = reopened.latest("m1", 10).await.unwrap();
    assert_eq!(latest.len(), 2);
    assert_eq!(latest[0].sequence, 2, "latest() returns newest first");
    assert_eq!(latest[0].status, Status::Down);
}

#[tokio::test]
async fn delete_by_monitor_leaves_other_monitors_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::new(dir.path().join("heartbeats.sqlite3")).await.unwrap();

    store.append(heartbeat("m1", 1, Status::Up)).await.unwrap();
    store.append(heartbeat("m2", 1, Status::Up)).await.unwrap();

    let deleted = store.delete_by_monitor("m1").await.unwrap();
    assert_eq!(deleted, 1);

    assert!(store.latest("m1", 10).await.unwrap().is_empty());
    assert_eq!(store.latest("m2", 10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn delete_older_than_cutoff_purges_stale_rows() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::new(dir.path().join("heartbeats.sqlite3")).await.unwrap();

    let mut old = heartbeat("m1", 1, Status::Up);
    old.timestamp = Utc::now() - chrono::Duration::days(40);
    store.append(old).await.unwrap();
    store.append(heartbeat("m1", 2, Status::Up)).await.unwrap();

    let cutoff = Utc::now() - chrono::Duration::days(30);
    let deleted = store.delete_older_than(cutoff).await.unwrap();
    assert_eq!(deleted, 1);

    let remaining = store.latest("m1", 10).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].sequence, 2);
}
