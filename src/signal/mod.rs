//! # GPS Signal Quality
//!
//! Scores each incoming location fix while a run is being recorded.
//!
//! ## Pipeline
//! 1. A raw platform fix is converted into an [`AccuracySnapshot`]
//!    (quality bucket, estimated satellites, estimated signal strength)
//! 2. The snapshot is appended to a bounded [`AccuracyHistory`]
//! 3. Registered listeners are notified in registration order
//! 4. Statistics, trend, troubleshooting guidance and the "ready to record"
//!    gate are derived from the history on demand
//!
//! One engine belongs to one recording session. It is not internally
//! synchronized; callers delivering fixes from several threads must
//! serialize `record_fix` themselves.

mod guidance;
mod heuristics;
mod history;
mod store;

use std::panic::{catch_unwind, AssertUnwindSafe};

use chrono::{DateTime, TimeZone, Utc};
use log::{debug, error};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::Coordinate;

pub use guidance::{
    accuracy_message, tracking_readiness, troubleshooting_guide, AccuracyMessage, GuideIssue,
    GuidePriority, TrackingReadiness, TroubleshootingGuide,
};
pub use heuristics::{
    estimate_satellites, estimate_signal_strength, quality_for_radius, MAX_ESTIMATED_SATELLITES,
};
pub use history::{accuracy_trend, summarize_radii, AccuracyHistory, DEFAULT_HISTORY_CAPACITY};
pub use store::{
    historical_accuracy_data, save_accuracy_data, AccuracyStore, HistoricalAccuracy,
    MemoryAccuracyStore, RunAccuracyRecord,
};

// ============================================================================
// Types
// ============================================================================

/// Coarse quality bucket for a fix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationQuality {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl LocationQuality {
    pub fn label(&self) -> &'static str {
        match self {
            LocationQuality::Excellent => "excellent",
            LocationQuality::Good => "good",
            LocationQuality::Fair => "fair",
            LocationQuality::Poor => "poor",
        }
    }
}

/// Direction the accuracy radius is moving in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccuracyTrend {
    Improving,
    Degrading,
    Stable,
}

impl AccuracyTrend {
    pub fn label(&self) -> &'static str {
        match self {
            AccuracyTrend::Improving => "improving",
            AccuracyTrend::Degrading => "degrading",
            AccuracyTrend::Stable => "stable",
        }
    }

    /// Inverse of [`AccuracyTrend::label`]; unknown labels read as stable.
    pub fn from_label(label: &str) -> Self {
        match label {
            "improving" => AccuracyTrend::Improving,
            "degrading" => AccuracyTrend::Degrading,
            _ => AccuracyTrend::Stable,
        }
    }
}

/// A location reading as delivered by the platform geolocation API.
///
/// Every field is optional; missing values are defaulted when the fix is
/// scored rather than rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLocationFix {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Horizontal accuracy radius in meters
    pub accuracy: Option<f64>,
    pub altitude: Option<f64>,
    pub altitude_accuracy: Option<f64>,
    pub heading: Option<f64>,
    pub speed: Option<f64>,
    /// Milliseconds since the Unix epoch
    pub timestamp: Option<i64>,
}

impl RawLocationFix {
    /// Convenience constructor for a fix with position and accuracy.
    pub fn new(latitude: f64, longitude: f64, accuracy: f64) -> Self {
        Self {
            latitude: Some(latitude),
            longitude: Some(longitude),
            accuracy: Some(accuracy),
            ..Default::default()
        }
    }
}

/// Quality assessment of a single fix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccuracySnapshot {
    /// Estimated strength, 0-100
    pub signal_strength: u8,
    /// Horizontal accuracy radius in meters
    pub accuracy_radius: f64,
    /// Heuristic estimate, not a measured count
    pub satellites_visible: u32,
    pub location_quality: LocationQuality,
    pub timestamp: DateTime<Utc>,
    pub coordinates: Coordinate,
    pub altitude: Option<f64>,
    pub heading: Option<f64>,
    pub speed: Option<f64>,
}

/// Aggregate view of the current history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccuracyStats {
    pub current: Option<AccuracySnapshot>,
    pub average: f64,
    /// Smallest radius seen
    pub best: f64,
    /// Largest radius seen
    pub worst: f64,
    pub trend: AccuracyTrend,
}

/// Configuration for signal quality scoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalConfig {
    /// Snapshots kept in the rolling history
    pub history_capacity: usize,
    /// Inclusive upper radius (m) for each quality bucket
    pub excellent_max_m: f64,
    pub good_max_m: f64,
    pub fair_max_m: f64,
    /// Radius (m) past which a fix is reported as very poor
    pub very_poor_min_m: f64,
    /// Radius (m) assumed when a fix carries no usable accuracy
    pub missing_accuracy_m: f64,
    /// Number of recent radii considered for the trend
    pub trend_window: usize,
    /// Fewer samples than this is always a stable trend
    pub trend_min_samples: usize,
    /// Relative change of the mean radius needed to call a trend
    pub trend_change_ratio: f64,
    /// Absolute change (m) needed to call a trend
    pub trend_min_change_m: f64,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            excellent_max_m: 5.0,
            good_max_m: 10.0,
            fair_max_m: 20.0,
            very_poor_min_m: 50.0,
            missing_accuracy_m: 1000.0,
            trend_window: 20,
            trend_min_samples: 4,
            trend_change_ratio: 0.2,
            trend_min_change_m: 1.0,
        }
    }
}

/// Handle returned by [`SignalQualityEngine::on_accuracy_update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Box<dyn Fn(&AccuracySnapshot) + Send + Sync>;

// ============================================================================
// Engine
// ============================================================================

/// Per-session GPS signal quality engine.
pub struct SignalQualityEngine {
    config: SignalConfig,
    history: AccuracyHistory,
    listeners: Vec<(ListenerId, Listener)>,
    next_listener_id: u64,
}

impl SignalQualityEngine {
    /// Create an engine with default configuration.
    pub fn new() -> Self {
        Self::with_config(SignalConfig::default())
    }

    /// Create an engine with custom configuration.
    pub fn with_config(config: SignalConfig) -> Self {
        Self {
            history: AccuracyHistory::new(config.history_capacity),
            config,
            listeners: Vec::new(),
            next_listener_id: 0,
        }
    }

    pub fn config(&self) -> &SignalConfig {
        &self.config
    }

    /// Score a raw fix, append it to the history and notify listeners.
    ///
    /// Never fails: missing or nonsensical fields are defaulted, and a
    /// panicking listener is logged and skipped.
    pub fn record_fix(&mut self, fix: &RawLocationFix) -> AccuracySnapshot {
        let snapshot = self.snapshot_from_fix(fix);
        self.history.push(snapshot.clone());
        self.notify(&snapshot);
        snapshot
    }

    /// Pure conversion from a raw fix to a snapshot, without side effects.
    pub fn snapshot_from_fix(&self, fix: &RawLocationFix) -> AccuracySnapshot {
        let radius = match fix.accuracy {
            Some(r) if r.is_finite() && r >= 0.0 => r,
            other => {
                debug!(
                    "[SignalQuality] unusable accuracy {:?}, assuming {}m",
                    other, self.config.missing_accuracy_m
                );
                self.config.missing_accuracy_m
            }
        };

        let timestamp = fix
            .timestamp
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
            .unwrap_or_else(Utc::now);

        AccuracySnapshot {
            signal_strength: estimate_signal_strength(radius),
            accuracy_radius: radius,
            satellites_visible: estimate_satellites(radius),
            location_quality: quality_for_radius(radius, &self.config),
            timestamp,
            coordinates: Coordinate::new(
                finite_or_zero(fix.latitude),
                finite_or_zero(fix.longitude),
            ),
            altitude: fix.altitude,
            heading: fix.heading,
            speed: fix.speed,
        }
    }

    fn notify(&self, snapshot: &AccuracySnapshot) {
        for (id, listener) in &self.listeners {
            let outcome = catch_unwind(AssertUnwindSafe(|| listener(snapshot)));
            if let Err(panic) = outcome {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!("[SignalQuality] listener {:?} panicked: {}", id, message);
            }
        }
    }

    // ========================================================================
    // History
    // ========================================================================

    /// Snapshots recorded so far, oldest first.
    pub fn history(&self) -> Vec<AccuracySnapshot> {
        self.history.to_vec()
    }

    /// Most recent snapshot.
    pub fn latest(&self) -> Option<&AccuracySnapshot> {
        self.history.latest()
    }

    /// Reset between recordings.
    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Current, average, best and worst radius plus trend.
    pub fn accuracy_stats(&self) -> AccuracyStats {
        let radii = self.history.radii();
        let (average, best, worst) = summarize_radii(&radii);
        AccuracyStats {
            current: self.history.latest().cloned(),
            average,
            best,
            worst,
            trend: accuracy_trend(&radii, &self.config),
        }
    }

    // ========================================================================
    // Listeners
    // ========================================================================

    /// Register a callback invoked with every new snapshot.
    pub fn on_accuracy_update<F>(&mut self, listener: F) -> ListenerId
    where
        F: Fn(&AccuracySnapshot) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_listener_id);
        self.next_listener_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Unsubscribe a listener. Returns false if it was already removed.
    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(existing, _)| *existing != id);
        self.listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    // ========================================================================
    // Guidance
    // ========================================================================

    /// Most important troubleshooting guide, or `None` if the signal is fine.
    ///
    /// Falls back to the latest recorded snapshot when none is given.
    pub fn troubleshooting_guide(
        &self,
        snapshot: Option<&AccuracySnapshot>,
    ) -> Option<TroubleshootingGuide> {
        let current = snapshot.or_else(|| self.history.latest());
        let trend = accuracy_trend(&self.history.radii(), &self.config);
        troubleshooting_guide(current, trend)
    }

    pub fn accuracy_message(&self, snapshot: &AccuracySnapshot) -> AccuracyMessage {
        accuracy_message(snapshot.location_quality)
    }

    /// Whether recording should start with the given (or latest) fix.
    pub fn is_ready_for_tracking(&self, snapshot: Option<&AccuracySnapshot>) -> TrackingReadiness {
        let current = snapshot.or_else(|| self.history.latest());
        tracking_readiness(current, &self.config)
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    /// Summarize a finished run and hand it to the store.
    pub fn save_accuracy_data(
        &self,
        store: &dyn AccuracyStore,
        user_id: &str,
        activity_id: &str,
        snapshots: &[AccuracySnapshot],
    ) -> Result<Option<RunAccuracyRecord>> {
        save_accuracy_data(store, &self.config, user_id, activity_id, snapshots)
    }

    /// Accuracy statistics across all of a user's stored runs.
    pub fn historical_accuracy_data(
        &self,
        store: &dyn AccuracyStore,
        user_id: &str,
    ) -> Result<HistoricalAccuracy> {
        historical_accuracy_data(store, &self.config, user_id)
    }
}

impl Default for SignalQualityEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn finite_or_zero(value: Option<f64>) -> f64 {
    value.filter(|v| v.is_finite()).unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    fn fix(accuracy: f64) -> RawLocationFix {
        RawLocationFix {
            latitude: Some(32.0853),
            longitude: Some(34.7818),
            accuracy: Some(accuracy),
            altitude: Some(12.0),
            altitude_accuracy: None,
            heading: Some(90.0),
            speed: Some(3.2),
            timestamp: Some(1_700_000_000_000),
        }
    }

    #[test]
    fn test_record_fix_derivation() {
        let mut engine = SignalQualityEngine::new();

        let first = engine.record_fix(&fix(3.0));
        assert_eq!(first.location_quality, LocationQuality::Excellent);
        assert!(first.satellites_visible > 6);
        assert_eq!(first.accuracy_radius, 3.0);
        assert_eq!(first.coordinates, Coordinate::new(32.0853, 34.7818));
        assert_eq!(first.altitude, Some(12.0));
        assert_eq!(first.heading, Some(90.0));
        assert_eq!(first.speed, Some(3.2));
        assert_eq!(first.timestamp.timestamp_millis(), 1_700_000_000_000);

        let second = engine.record_fix(&fix(100.0));
        assert_eq!(second.location_quality, LocationQuality::Poor);
        assert!(second.satellites_visible < 6);
        assert!(second.signal_strength > 0);
        assert!(second.signal_strength < first.signal_strength);

        let stats = engine.accuracy_stats();
        assert_eq!(stats.best, 3.0);
        assert_eq!(stats.worst, 100.0);
        assert_eq!(stats.average, 51.5);
        assert_eq!(stats.current, Some(second));
    }

    #[test]
    fn test_good_bucket_example() {
        let mut engine = SignalQualityEngine::new();
        let snapshot = engine.record_fix(&fix(8.0));
        assert_eq!(snapshot.location_quality, LocationQuality::Good);
    }

    #[test]
    fn test_missing_fields_are_defaulted() {
        let mut engine = SignalQualityEngine::new();
        let snapshot = engine.record_fix(&RawLocationFix::default());
        assert_eq!(snapshot.location_quality, LocationQuality::Poor);
        assert_eq!(snapshot.accuracy_radius, 1000.0);
        assert_eq!(snapshot.coordinates, Coordinate::new(0.0, 0.0));

        let negative = engine.record_fix(&RawLocationFix::new(1.0, 2.0, -4.0));
        assert_eq!(negative.location_quality, LocationQuality::Poor);
        assert_eq!(engine.len(), 2);
    }

    #[test]
    fn test_history_capped() {
        let mut engine = SignalQualityEngine::new();
        for i in 0..250 {
            engine.record_fix(&fix(i as f64));
        }
        let history = engine.history();
        assert_eq!(history.len(), 100);
        assert_eq!(history[0].accuracy_radius, 150.0);
        assert_eq!(history[99].accuracy_radius, 249.0);

        engine.clear_history();
        assert!(engine.is_empty());
    }

    #[test]
    fn test_empty_stats() {
        let engine = SignalQualityEngine::new();
        let stats = engine.accuracy_stats();
        assert!(stats.current.is_none());
        assert_eq!(stats.average, 0.0);
        assert_eq!(stats.best, 0.0);
        assert_eq!(stats.worst, 0.0);
        assert_eq!(stats.trend, AccuracyTrend::Stable);
    }

    #[test]
    fn test_trend_from_fixes() {
        let mut engine = SignalQualityEngine::new();
        for r in [40.0, 30.0, 20.0, 10.0, 5.0, 4.0] {
            engine.record_fix(&fix(r));
        }
        assert_eq!(engine.accuracy_stats().trend, AccuracyTrend::Improving);
    }

    #[test]
    fn test_panicking_listener_is_isolated() {
        let mut engine = SignalQualityEngine::new();
        let received: Arc<Mutex<Vec<f64>>> = Arc::new(Mutex::new(Vec::new()));

        engine.on_accuracy_update(|_| panic!("listener bug"));
        let sink = Arc::clone(&received);
        engine.on_accuracy_update(move |s| sink.lock().unwrap().push(s.accuracy_radius));

        let snapshot = engine.record_fix(&fix(7.0));
        assert_eq!(snapshot.accuracy_radius, 7.0);
        assert_eq!(*received.lock().unwrap(), vec![7.0]);
        assert_eq!(engine.len(), 1);
    }

    #[test]
    fn test_unsubscribe() {
        let mut engine = SignalQualityEngine::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&calls);
        let id = engine.on_accuracy_update(move |_| {
            counter.fetch_add(1, Ordering::Relaxed);
        });

        engine.record_fix(&fix(5.0));
        assert!(engine.remove_listener(id));
        assert!(!engine.remove_listener(id));
        engine.record_fix(&fix(5.0));

        assert_eq!(calls.load(Ordering::Relaxed), 1);
        assert_eq!(engine.listener_count(), 0);
    }

    #[test]
    fn test_listeners_run_in_registration_order() {
        let mut engine = SignalQualityEngine::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for tag in ["first", "second", "third"] {
            let order = Arc::clone(&order);
            engine.on_accuracy_update(move |_| order.lock().unwrap().push(tag));
        }
        engine.record_fix(&fix(5.0));
        assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_engine_guidance() {
        let mut engine = SignalQualityEngine::new();
        let guide = engine.troubleshooting_guide(None).unwrap();
        assert_eq!(guide.issue, GuideIssue::NoSignal);
        assert!(!engine.is_ready_for_tracking(None).ready);

        let good = engine.record_fix(&fix(4.0));
        assert!(engine.troubleshooting_guide(None).is_none());
        assert!(engine.is_ready_for_tracking(None).ready);
        assert_eq!(engine.accuracy_message(&good).color, "green");

        engine.record_fix(&fix(80.0));
        let guide = engine.troubleshooting_guide(None).unwrap();
        assert_eq!(guide.issue, GuideIssue::PoorAccuracy);
        assert!(!engine.is_ready_for_tracking(None).ready);
    }

    #[test]
    fn test_raw_fix_deserializes_platform_shape() {
        let raw = r#"{"latitude":51.5,"longitude":-0.12,"accuracy":6.5,
                      "altitudeAccuracy":3,"speed":null,"timestamp":1700000000000}"#;
        let fix: RawLocationFix = serde_json::from_str(raw).unwrap();
        assert_eq!(fix.accuracy, Some(6.5));
        assert_eq!(fix.altitude_accuracy, Some(3.0));
        assert_eq!(fix.speed, None);
        assert_eq!(fix.heading, None);
    }
}
