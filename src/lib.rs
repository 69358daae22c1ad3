//! # Activity Core
//!
//! Turns raw motion/location data into structured activity metrics for a
//! running coach.
//!
//! This library provides:
//! - Route geometry: haversine distance, path length, Douglas-Peucker
//!   simplification, bounding boxes, waypoint interpolation
//! - GPS path serialization tolerant of `{lat,lng}` and `{latitude,longitude}`
//! - Live GPS signal-quality scoring with rolling history and trend detection
//! - FIT activity file download, decoding and normalization into laps,
//!   kilometer splits and a downsampled track
//!
//! ## Features
//!
//! - **`http`** - HTTP client for downloading activity files (default)
//! - **`persistence`** - SQLite storage for GPS accuracy history (default)
//! - **`parallel`** - Parallel batch decoding with rayon
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use activity_core::{geo_utils, path_codec, Coordinate};
//!
//! let tel_aviv = Coordinate::new(32.0853, 34.7818);
//! let jerusalem = Coordinate::new(31.7683, 35.2137);
//!
//! let km = geo_utils::haversine_distance_points(&tel_aviv, &jerusalem);
//! assert!(km > 50.0 && km < 60.0);
//!
//! let stored = path_codec::serialize_path(&[tel_aviv, jerusalem]);
//! assert_eq!(path_codec::parse_path(Some(&stored)), vec![tel_aviv, jerusalem]);
//! ```

use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{IngestError, Result};

// Geographic utilities (distance, bounds, simplification, formatting)
pub mod geo_utils;

// GPS path serialization and validation
pub mod path_codec;

// Live GPS signal quality engine
pub mod signal;
pub use signal::{
    AccuracyHistory, AccuracyMessage, AccuracySnapshot, AccuracyStats, AccuracyStore,
    AccuracyTrend, GuideIssue, GuidePriority, HistoricalAccuracy, ListenerId, LocationQuality,
    MemoryAccuracyStore, RawLocationFix, RunAccuracyRecord, SignalConfig, SignalQualityEngine,
    TrackingReadiness, TroubleshootingGuide,
};

// FIT activity file decoding and normalization
pub mod fit;
pub use fit::{
    decode_fit, parse_fit_activity, parse_fit_files, transform, FitKmSplit, FitLap, FitRecord,
    ParsedFitActivity, RawFitData, SessionSummary, TransformConfig,
};
#[cfg(feature = "parallel")]
pub use fit::parse_fit_files_parallel;

// HTTP module for activity file download
#[cfg(feature = "http")]
pub mod http;
#[cfg(feature = "http")]
pub use http::{fetch_activity_blocking, ActivityFileClient, DownloadConfig};

// SQLite-backed accuracy history
#[cfg(feature = "persistence")]
pub mod persistence;
#[cfg(feature = "persistence")]
pub use persistence::SqliteAccuracyStore;

// ============================================================================
// Core Types
// ============================================================================

/// A GPS coordinate with latitude and longitude.
///
/// Always serializes as `{lat,lng}`. Deserialization also accepts the
/// platform geolocation shape `{latitude,longitude,...}`; extra fields such
/// as `timestamp` or `accuracy` are ignored.
///
/// # Example
/// ```
/// use activity_core::Coordinate;
/// let point = Coordinate::new(51.5074, -0.1278); // London
/// assert!(point.is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    #[serde(alias = "latitude")]
    pub lat: f64,
    #[serde(alias = "longitude")]
    pub lng: f64,
}

impl Coordinate {
    /// Create a new coordinate.
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        path_codec::is_valid_coordinate(self)
    }
}

/// Axis-aligned rectangle containing a path.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapBounds {
    /// North-east corner (max lat, max lng)
    pub ne: Coordinate,
    /// South-west corner (min lat, min lng)
    pub sw: Coordinate,
}

impl MapBounds {
    /// Degenerate bounds around a single point.
    pub fn from_point(point: Coordinate) -> Self {
        Self {
            ne: point,
            sw: point,
        }
    }

    /// Get the center point of the bounds.
    pub fn center(&self) -> Coordinate {
        Coordinate::new(
            (self.ne.lat + self.sw.lat) / 2.0,
            (self.ne.lng + self.sw.lng) / 2.0,
        )
    }
}
