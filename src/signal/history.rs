//! Bounded rolling history of accuracy snapshots and the statistics derived
//! from it.

use std::collections::VecDeque;

use super::{AccuracySnapshot, AccuracyTrend, SignalConfig};

/// Default number of snapshots kept per recording session.
pub const DEFAULT_HISTORY_CAPACITY: usize = 100;

/// FIFO of the most recent snapshots, oldest first.
///
/// Every push trims back to `capacity`, so the buffer never holds more than
/// `capacity` entries.
#[derive(Debug, Clone)]
pub struct AccuracyHistory {
    capacity: usize,
    entries: VecDeque<AccuracySnapshot>,
}

impl AccuracyHistory {
    /// Create an empty history. A zero capacity is bumped to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity + 1),
        }
    }

    /// Append a snapshot, evicting the oldest entries past capacity.
    pub fn push(&mut self, snapshot: AccuracySnapshot) {
        self.entries.push_back(snapshot);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    /// Most recent snapshot.
    pub fn latest(&self) -> Option<&AccuracySnapshot> {
        self.entries.back()
    }

    /// Snapshots oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &AccuracySnapshot> {
        self.entries.iter()
    }

    /// Copy of the buffer, oldest first.
    pub fn to_vec(&self) -> Vec<AccuracySnapshot> {
        self.iter().cloned().collect()
    }

    /// Accuracy radii in chronological order.
    pub fn radii(&self) -> Vec<f64> {
        self.iter().map(|s| s.accuracy_radius).collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for AccuracyHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

/// Average, best (smallest) and worst (largest) radius; zeros when empty.
pub fn summarize_radii(radii: &[f64]) -> (f64, f64, f64) {
    if radii.is_empty() {
        return (0.0, 0.0, 0.0);
    }
    let sum: f64 = radii.iter().sum();
    let best = radii.iter().copied().fold(f64::INFINITY, f64::min);
    let worst = radii.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    (sum / radii.len() as f64, best, worst)
}

/// Classify a chronological series of accuracy radii.
///
/// Takes the last `trend_window` values, splits them into an early and a
/// late half and compares their means. A shrinking radius is an improving
/// signal. Changes smaller than `max(trend_change_ratio * early, trend_min_change_m)`
/// are stable, as is any series shorter than `trend_min_samples`.
pub fn accuracy_trend(radii: &[f64], config: &SignalConfig) -> AccuracyTrend {
    let window = config.trend_window.max(2);
    let recent = &radii[radii.len().saturating_sub(window)..];
    if recent.len() < config.trend_min_samples.max(2) {
        return AccuracyTrend::Stable;
    }

    let half = recent.len() / 2;
    let (early, late) = recent.split_at(half);
    let late = &late[late.len() - half..];

    let early_avg = early.iter().sum::<f64>() / early.len() as f64;
    let late_avg = late.iter().sum::<f64>() / late.len() as f64;

    let threshold = (early_avg * config.trend_change_ratio).max(config.trend_min_change_m);
    let delta = late_avg - early_avg;

    if delta < -threshold {
        AccuracyTrend::Improving
    } else if delta > threshold {
        AccuracyTrend::Degrading
    } else {
        AccuracyTrend::Stable
    }
}
