//! SQLite-backed heartbeat store, grounded on the teacher's
//! `storage/sqlite.rs`: WAL mode, a bounded connection pool, and
//! `sqlx::migrate!` for schema versioning, generalized from "batches of
//! server metrics" to "append-ordered heartbeats per monitor".

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Pool, Row, Sqlite};
use tracing::{debug, info, instrument};

use super::{uptime_ratio, HeartbeatStore, StoreResult, UptimeWindow};
use crate::error::StoreError;
use crate::executor::push::LastHeartbeat;
use crate::model::{Heartbeat, Status};

pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    #[instrument(skip_all)]
    pub async fn new(db_path: impl AsRef<Path>) -> StoreResult<Self> {
        let db_path_str = db_path.as_ref().to_string_lossy().to_string();
        info!("initializing SQLite heartbeat store at: {}", db_path_str);

        let options = SqliteConnectOptions::new()
            .filename(&db_path_str)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::ConnectionFailed(e.to_string()))?;

        debug!("running heartbeat store migrations");
        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    fn status_to_text(status: Status) -> &'static str {
        match status {
            Status::Up => "up",
            Status::Down => "down",
            Status::Pending => "pending",
            Status::Maint => "maint",
        }
    }

    fn status_from_text(text: &str) -> Status {
        match text {
            "up" => Status::Up,
            "down" => Status::Down,
            "maint" => Status::Maint,
            _ => Status::Pending,
        }
    }

    fn row_to_heartbeat(row: &sqlx::sqlite::SqliteRow) -> Heartbeat {
        let timestamp_ms: i64 = row.get("timestamp_ms");
        Heartbeat {
            monitor_id: row.get("monitor_id"),
            sequence: row.get::<i64, _>("sequence") as u64,
            timestamp: Utc.timestamp_millis_opt(timestamp_ms).single().unwrap_or_else(Utc::now),
            status: Self::status_from_text(row.get::<String, _>("status").as_str()),
            message: row.get("message"),
            latency_ms: row.get("latency_ms"),
            retries: row.get::<i64, _>("retries") as u32,
            important: row.get::<i64, _>("important") != 0,
        }
    }
}

#[async_trait]
impl HeartbeatStore for SqliteStore {
    #[instrument(skip(self, heartbeat), fields(monitor_id = %heartbeat.monitor_id))]
    async fn append(&self, heartbeat: Heartbeat) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO heartbeats (monitor_id, sequence, timestamp_ms, status, message, latency_ms, retries, important)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&heartbeat.monitor_id)
        .bind(heartbeat.sequence as i64)
        .bind(heartbeat.timestamp.timestamp_millis())
        .bind(Self::status_to_text(heartbeat.status))
        .bind(&heartbeat.message)
        .bind(heartbeat.latency_ms)
        .bind(heartbeat.retries as i64)
        .bind(heartbeat.important as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn latest(&self, monitor_id: &str, n: usize) -> StoreResult<Vec<Heartbeat>> {
        let rows = sqlx::query(
            "SELECT monitor_id, sequence, timestamp_ms, status, message, latency_ms, retries, important
             FROM heartbeats WHERE monitor_id = ? ORDER BY sequence DESC LIMIT ?",
        )
        .bind(monitor_id)
        .bind(n as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(Self::row_to_heartbeat).collect())
    }

    async fn range(&self, monitor_id: &str, from: DateTime<Utc>, to: DateTime<Utc>) -> StoreResult<Vec<Heartbeat>> {
        let rows = sqlx::query(
            "SELECT monitor_id, sequence, timestamp_ms, status, message, latency_ms, retries, important
             FROM heartbeats WHERE monitor_id = ? AND timestamp_ms >= ? AND timestamp_ms <= ?
             ORDER BY sequence ASC",
        )
        .bind(monitor_id)
        .bind(from.timestamp_millis())
        .bind(to.timestamp_millis())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(Self::row_to_heartbeat).collect())
    }

    async fn uptime_stats(&self, monitor_id: &str, windows: &[UptimeWindow]) -> StoreResult<HashMap<String, f64>> {
        let now = Utc::now();
        let mut stats = HashMap::new();
        for window in windows {
            let window_start = now - window.duration;
            let heartbeats = self.range(monitor_id, window_start, now).await?;
            stats.insert(window.name.clone(), uptime_ratio(&heartbeats, window_start, now));
        }
        Ok(stats)
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM heartbeats WHERE timestamp_ms < ?")
            .bind(cutoff.timestamp_millis())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_by_monitor(&self, monitor_id: &str) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM heartbeats WHERE monitor_id = ?")
            .bind(monitor_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl LastHeartbeat for SqliteStore {
    async fn last_heartbeat(&self, monitor_id: &str) -> Option<Heartbeat> {
        self.latest(monitor_id, 1).await.ok()?.into_iter().next()
    }
}
