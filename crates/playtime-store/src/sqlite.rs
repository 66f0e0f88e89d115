//! SQLite-based store implementation

use chrono::{DateTime, Local};
use playtime_api::TrackerTimes;
use playtime_util::{TrackerId, UserId};
use rusqlite::{Connection, params};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, warn};

use crate::{AuditEvent, PlayTimeUpdate, Store, StoreError, StoreResult};

/// SQLite-based store
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a store at the given path
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    fn init_schema(&self) -> StoreResult<()> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            -- Audit log (append-only)
            CREATE TABLE IF NOT EXISTS audit_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                event_json TEXT NOT NULL
            );

            -- Tracker totals
            CREATE TABLE IF NOT EXISTS play_time (
                user_id TEXT NOT NULL,
                tracker TEXT NOT NULL,
                millis INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (user_id, tracker)
            );

            -- Indexes
            CREATE INDEX IF NOT EXISTS idx_audit_timestamp ON audit_log(timestamp);
            "#,
        )?;

        debug!("Store schema initialized");
        Ok(())
    }
}

impl Store for SqliteStore {
    fn append_audit(&self, mut event: AuditEvent) -> StoreResult<()> {
        let conn = self.conn()?;
        let event_json = serde_json::to_string(&event.event)?;

        conn.execute(
            "INSERT INTO audit_log (timestamp, event_json) VALUES (?, ?)",
            params![event.timestamp.to_rfc3339(), event_json],
        )?;

        event.id = conn.last_insert_rowid();
        debug!(event_id = event.id, "Audit event appended");

        Ok(())
    }

    fn get_recent_audits(&self, limit: usize) -> StoreResult<Vec<AuditEvent>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(
            "SELECT id, timestamp, event_json FROM audit_log ORDER BY id DESC LIMIT ?",
        )?;

        let rows = stmt.query_map([i64::try_from(limit).unwrap_or(i64::MAX)], |row| {
            let id: i64 = row.get(0)?;
            let timestamp_str: String = row.get(1)?;
            let event_json: String = row.get(2)?;
            Ok((id, timestamp_str, event_json))
        })?;

        let mut events = Vec::new();
        for row in rows {
            let (id, timestamp_str, event_json) = row?;
            let timestamp = DateTime::parse_from_rfc3339(&timestamp_str)
                .map(|dt| dt.with_timezone(&Local))
                .unwrap_or_else(|_| playtime_util::now());
            let event: crate::AuditEventType = serde_json::from_str(&event_json)?;

            events.push(AuditEvent {
                id,
                timestamp,
                event,
            });
        }

        Ok(events)
    }

    fn get_play_times(&self, user_id: &UserId) -> StoreResult<TrackerTimes> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare("SELECT tracker, millis FROM play_time WHERE user_id = ?")?;
        let rows = stmt.query_map([user_id.to_string()], |row| {
            let tracker: String = row.get(0)?;
            let millis: i64 = row.get(1)?;
            Ok((tracker, millis))
        })?;

        let mut times = TrackerTimes::new();
        for row in rows {
            let (tracker, millis) = row?;
            times.insert(TrackerId::new(tracker), Duration::from_millis(millis.max(0) as u64));
        }

        debug!(user_id = %user_id, trackers = times.len(), "Play times loaded");
        Ok(times)
    }

    fn save_play_times(&self, updates: &[PlayTimeUpdate]) -> StoreResult<()> {
        if updates.is_empty() {
            return Ok(());
        }

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO play_time (user_id, tracker, millis)
                VALUES (?, ?, ?)
                ON CONFLICT(user_id, tracker)
                DO UPDATE SET millis = excluded.millis
                "#,
            )?;

            for update in updates {
                let millis = i64::try_from(update.time.as_millis()).unwrap_or(i64::MAX);
                stmt.execute(params![update.user_id.to_string(), update.tracker.as_str(), millis])?;
            }
        }
        tx.commit()?;

        debug!(rows = updates.len(), "Play times saved");
        Ok(())
    }

    fn is_healthy(&self) -> bool {
        match self.conn.lock() {
            Ok(conn) => conn.query_row("SELECT 1", [], |_| Ok(())).is_ok(),
            Err(_) => {
                warn!("Store lock poisoned");
                false
            }
        }
    }
}
