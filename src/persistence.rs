//! # SQLite Accuracy Store
//!
//! Durable [`AccuracyStore`] backed by SQLite. One row per recorded activity
//! holds the run summary in plain columns, so historical queries never touch
//! the per-fix snapshots; those are kept as a MessagePack blob and read back
//! only on request.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use log::{debug, info};
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{IngestError, Result};
use crate::signal::{AccuracySnapshot, AccuracyStore, AccuracyTrend, RunAccuracyRecord};

/// SQLite-backed run accuracy storage.
///
/// The connection sits behind a mutex so the store can be shared between
/// threads like any other [`AccuracyStore`].
pub struct SqliteAccuracyStore {
    db: Mutex<Connection>,
}

impl SqliteAccuracyStore {
    /// Open (or create) a store at `db_path`.
    pub fn new(db_path: &str) -> Result<Self> {
        let db = Connection::open(db_path).map_err(IngestError::storage)?;
        Self::init_schema(&db).map_err(IngestError::storage)?;
        debug!("[AccuracyStore] opened {}", db_path);

        Ok(Self { db: Mutex::new(db) })
    }

    /// Create an in-memory database (for testing).
    pub fn in_memory() -> Result<Self> {
        Self::new(":memory:")
    }

    fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS gps_accuracy_runs (
                activity_id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                recorded_at INTEGER NOT NULL,
                sample_count INTEGER NOT NULL,
                average_accuracy REAL NOT NULL,
                best_accuracy REAL NOT NULL,
                worst_accuracy REAL NOT NULL,
                trend TEXT NOT NULL,
                snapshots BLOB NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_accuracy_runs_user
                ON gps_accuracy_runs(user_id, recorded_at);
            "#,
        )
    }

    fn conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.db
            .lock()
            .map_err(|e| IngestError::storage(format!("accuracy store poisoned: {}", e)))
    }

    /// Per-fix snapshots saved with a run, `None` if the run is unknown.
    pub fn load_snapshots(&self, activity_id: &str) -> Result<Option<Vec<AccuracySnapshot>>> {
        let db = self.conn()?;
        let blob: Option<Vec<u8>> = db
            .query_row(
                "SELECT snapshots FROM gps_accuracy_runs WHERE activity_id = ?",
                params![activity_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(IngestError::storage)?;

        blob.map(|b| rmp_serde::from_slice(&b).map_err(IngestError::storage))
            .transpose()
    }

    /// Number of stored runs across all users.
    pub fn run_count(&self) -> Result<usize> {
        let db = self.conn()?;
        let count: i64 = db
            .query_row("SELECT COUNT(*) FROM gps_accuracy_runs", [], |row| row.get(0))
            .map_err(IngestError::storage)?;
        Ok(count as usize)
    }

    /// Remove a run. Returns whether a row was deleted.
    pub fn delete_run(&self, activity_id: &str) -> Result<bool> {
        let db = self.conn()?;
        let deleted = db
            .execute(
                "DELETE FROM gps_accuracy_runs WHERE activity_id = ?",
                params![activity_id],
            )
            .map_err(IngestError::storage)?;
        Ok(deleted > 0)
    }
}

impl AccuracyStore for SqliteAccuracyStore {
    fn save_run(&self, record: &RunAccuracyRecord) -> Result<()> {
        let blob = rmp_serde::to_vec(&record.snapshots).map_err(IngestError::storage)?;
        let db = self.conn()?;
        db.execute(
            "INSERT OR REPLACE INTO gps_accuracy_runs
                (activity_id, user_id, recorded_at, sample_count,
                 average_accuracy, best_accuracy, worst_accuracy, trend, snapshots)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                record.activity_id,
                record.user_id,
                record.recorded_at.timestamp_millis(),
                record.sample_count,
                record.average_accuracy,
                record.best_accuracy,
                record.worst_accuracy,
                record.trend.label(),
                blob,
            ],
        )
        .map_err(IngestError::storage)?;

        info!(
            "[AccuracyStore] stored run {} ({} samples)",
            record.activity_id, record.sample_count
        );
        Ok(())
    }

    /// Run summaries only; `snapshots` is left empty; use
    /// [`SqliteAccuracyStore::load_snapshots`] for the per-fix data.
    fn load_runs(&self, user_id: &str) -> Result<Vec<RunAccuracyRecord>> {
        let db = self.conn()?;
        let mut stmt = db
            .prepare(
                "SELECT activity_id, recorded_at, sample_count, average_accuracy,
                        best_accuracy, worst_accuracy, trend
                 FROM gps_accuracy_runs WHERE user_id = ? ORDER BY recorded_at",
            )
            .map_err(IngestError::storage)?;

        let runs = stmt
            .query_map(params![user_id], |row| {
                let recorded_ms: i64 = row.get(1)?;
                let trend: String = row.get(6)?;
                Ok(RunAccuracyRecord {
                    activity_id: row.get(0)?,
                    user_id: user_id.to_string(),
                    recorded_at: DateTime::<Utc>::from_timestamp_millis(recorded_ms)
                        .unwrap_or_default(),
                    sample_count: row.get(2)?,
                    average_accuracy: row.get(3)?,
                    best_accuracy: row.get(4)?,
                    worst_accuracy: row.get(5)?,
                    trend: AccuracyTrend::from_label(&trend),
                    snapshots: Vec::new(),
                })
            })
            .map_err(IngestError::storage)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(IngestError::storage)?;

        Ok(runs)
    }
}

#[cfg(all(test, feature = "persistence"))]
mod tests {
    use super::*;
    use crate::signal::{historical_accuracy_data, save_accuracy_data, SignalConfig};
    use crate::{RawLocationFix, SignalQualityEngine};

    fn recorded_run(radii: &[f64], start_ms: i64) -> Vec<AccuracySnapshot> {
        let mut engine = SignalQualityEngine::new();
        for (i, &r) in radii.iter().enumerate() {
            let mut fix = RawLocationFix::new(51.5 + i as f64 * 0.0001, -0.12, r);
            fix.timestamp = Some(start_ms + i as i64 * 1000);
            engine.record_fix(&fix);
        }
        engine.history()
    }

    #[test]
    fn test_create_store() {
        let store = SqliteAccuracyStore::in_memory().unwrap();
        assert_eq!(store.run_count().unwrap(), 0);
        assert!(store.load_runs("u1").unwrap().is_empty());
    }

    #[test]
    fn test_save_and_load_run() {
        let store = SqliteAccuracyStore::in_memory().unwrap();
        let config = SignalConfig::default();
        let snapshots = recorded_run(&[4.0, 8.0, 12.0], 1_700_000_000_000);

        let saved = save_accuracy_data(&store, &config, "u1", "run-1", &snapshots)
            .unwrap()
            .unwrap();

        let runs = store.load_runs("u1").unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].activity_id, "run-1");
        assert_eq!(runs[0].sample_count, 3);
        assert_eq!(runs[0].average_accuracy, 8.0);
        assert_eq!(runs[0].recorded_at, saved.recorded_at);
        assert_eq!(runs[0].trend, saved.trend);

        let blob = store.load_snapshots("run-1").unwrap().unwrap();
        assert_eq!(blob, snapshots);
        assert!(store.load_snapshots("missing").unwrap().is_none());
    }

    #[test]
    fn test_replace_and_delete() {
        let store = SqliteAccuracyStore::in_memory().unwrap();
        let config = SignalConfig::default();
        save_accuracy_data(&store, &config, "u1", "run-1", &recorded_run(&[40.0], 0)).unwrap();
        save_accuracy_data(&store, &config, "u1", "run-1", &recorded_run(&[4.0], 0)).unwrap();

        assert_eq!(store.run_count().unwrap(), 1);
        assert_eq!(store.load_runs("u1").unwrap()[0].average_accuracy, 4.0);

        assert!(store.delete_run("run-1").unwrap());
        assert!(!store.delete_run("run-1").unwrap());
        assert_eq!(store.run_count().unwrap(), 0);
    }

    #[test]
    fn test_historical_over_sqlite() {
        let store = SqliteAccuracyStore::in_memory().unwrap();
        let config = SignalConfig::default();
        let day_ms = 86_400_000;
        for (i, avg) in [30.0, 20.0, 10.0, 5.0].iter().enumerate() {
            let id = format!("run-{}", i);
            let snapshots = recorded_run(&[*avg], i as i64 * day_ms);
            save_accuracy_data(&store, &config, "u1", &id, &snapshots).unwrap();
        }
        save_accuracy_data(&store, &config, "u2", "other", &recorded_run(&[3.0], 0)).unwrap();

        let history = historical_accuracy_data(&store, &config, "u1").unwrap();
        assert_eq!(history.total_runs, 4);
        assert_eq!(history.best_accuracy, 5.0);
        assert_eq!(history.worst_accuracy, 30.0);
        assert_eq!(history.accuracy_trend, AccuracyTrend::Improving);
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("accuracy.db");
        let path = path.to_str().unwrap();
        let config = SignalConfig::default();

        {
            let store = SqliteAccuracyStore::new(path).unwrap();
            save_accuracy_data(&store, &config, "u1", "run-1", &recorded_run(&[6.0, 7.0], 0))
                .unwrap();
        }

        let store = SqliteAccuracyStore::new(path).unwrap();
        let runs = store.load_runs("u1").unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].best_accuracy, 6.0);
        assert_eq!(store.load_snapshots("run-1").unwrap().unwrap().len(), 2);
    }
}
