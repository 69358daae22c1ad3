//! Persistence boundary for per-run GPS accuracy.
//!
//! The engine summarizes a finished run and hands it to an [`AccuracyStore`];
//! durable storage belongs to the store. Historical aggregation reads every
//! run for a user back and applies the same statistics and trend logic as
//! the live path.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::history::{accuracy_trend, summarize_radii};
use super::{AccuracySnapshot, AccuracyTrend, SignalConfig};
use crate::error::{IngestError, Result};

/// Accuracy summary of one recorded activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunAccuracyRecord {
    pub activity_id: String,
    pub user_id: String,
    /// Time of the last snapshot in the run
    pub recorded_at: DateTime<Utc>,
    pub sample_count: u32,
    pub average_accuracy: f64,
    pub best_accuracy: f64,
    pub worst_accuracy: f64,
    pub trend: AccuracyTrend,
    pub snapshots: Vec<AccuracySnapshot>,
}

impl RunAccuracyRecord {
    /// Summarize a run. `None` when there is nothing to summarize.
    pub fn from_snapshots(
        user_id: &str,
        activity_id: &str,
        snapshots: &[AccuracySnapshot],
        config: &SignalConfig,
    ) -> Option<Self> {
        let last = snapshots.last()?;
        let radii: Vec<f64> = snapshots.iter().map(|s| s.accuracy_radius).collect();
        let (average, best, worst) = summarize_radii(&radii);

        Some(Self {
            activity_id: activity_id.to_string(),
            user_id: user_id.to_string(),
            recorded_at: last.timestamp,
            sample_count: snapshots.len() as u32,
            average_accuracy: average,
            best_accuracy: best,
            worst_accuracy: worst,
            trend: accuracy_trend(&radii, config),
            snapshots: snapshots.to_vec(),
        })
    }
}

/// Accuracy across every run a user has recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoricalAccuracy {
    pub total_runs: u32,
    pub average_accuracy: f64,
    pub best_accuracy: f64,
    pub worst_accuracy: f64,
    pub accuracy_trend: AccuracyTrend,
}

impl HistoricalAccuracy {
    /// Aggregate per-run summaries. Runs are ordered by time before the
    /// trend is computed over their average accuracies.
    pub fn from_runs(runs: &[RunAccuracyRecord], config: &SignalConfig) -> Self {
        let mut ordered: Vec<&RunAccuracyRecord> = runs.iter().collect();
        ordered.sort_by_key(|r| r.recorded_at);

        let averages: Vec<f64> = ordered.iter().map(|r| r.average_accuracy).collect();
        let (average, _, _) = summarize_radii(&averages);
        let best = ordered
            .iter()
            .map(|r| r.best_accuracy)
            .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.min(v))));
        let worst = ordered
            .iter()
            .map(|r| r.worst_accuracy)
            .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.max(v))));

        Self {
            total_runs: runs.len() as u32,
            average_accuracy: average,
            best_accuracy: best.unwrap_or(0.0),
            worst_accuracy: worst.unwrap_or(0.0),
            accuracy_trend: accuracy_trend(&averages, config),
        }
    }
}

/// External storage for run accuracy summaries.
pub trait AccuracyStore: Send + Sync {
    /// Insert or replace the summary for `record.activity_id`.
    fn save_run(&self, record: &RunAccuracyRecord) -> Result<()>;

    /// All runs recorded by a user, in any order.
    fn load_runs(&self, user_id: &str) -> Result<Vec<RunAccuracyRecord>>;
}

/// Summarize and store a finished run.
///
/// Returns `Ok(None)` without touching the store when there are no snapshots.
pub fn save_accuracy_data(
    store: &dyn AccuracyStore,
    config: &SignalConfig,
    user_id: &str,
    activity_id: &str,
    snapshots: &[AccuracySnapshot],
) -> Result<Option<RunAccuracyRecord>> {
    let Some(record) = RunAccuracyRecord::from_snapshots(user_id, activity_id, snapshots, config)
    else {
        debug!(
            "[SignalQuality] no accuracy samples for activity {}, nothing saved",
            activity_id
        );
        return Ok(None);
    };

    store.save_run(&record)?;
    info!(
        "[SignalQuality] saved {} accuracy samples for activity {} (avg ±{:.1}m)",
        record.sample_count, activity_id, record.average_accuracy
    );
    Ok(Some(record))
}

/// Aggregate accuracy over all of a user's past runs.
pub fn historical_accuracy_data(
    store: &dyn AccuracyStore,
    config: &SignalConfig,
    user_id: &str,
) -> Result<HistoricalAccuracy> {
    let runs = store.load_runs(user_id)?;
    Ok(HistoricalAccuracy::from_runs(&runs, config))
}

/// In-process store, keyed by activity id.
#[derive(Debug, Default)]
pub struct MemoryAccuracyStore {
    runs: Mutex<HashMap<String, RunAccuracyRecord>>,
}

impl MemoryAccuracyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AccuracyStore for MemoryAccuracyStore {
    fn save_run(&self, record: &RunAccuracyRecord) -> Result<()> {
        let mut runs = self
            .runs
            .lock()
            .map_err(|e| IngestError::storage(format!("accuracy store poisoned: {}", e)))?;
        runs.insert(record.activity_id.clone(), record.clone());
        Ok(())
    }

    fn load_runs(&self, user_id: &str) -> Result<Vec<RunAccuracyRecord>> {
        let runs = self
            .runs
            .lock()
            .map_err(|e| IngestError::storage(format!("accuracy store poisoned: {}", e)))?;
        Ok(runs
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect())
    }
}
