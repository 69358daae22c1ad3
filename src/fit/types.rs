//! Types on both sides of the FIT transformation.
//!
//! `Raw*` types mirror the vendor's session/lap/record hierarchy with FIT
//! field names. They deserialize from JSON as well, so fixtures and other
//! decoders can feed [`super::transform`] directly. The normalized types
//! are the public activity shape shared with live recordings.

use serde::{Deserialize, Serialize};

use chrono::{DateTime, Utc};

use crate::Coordinate;

// ============================================================================
// Raw vendor hierarchy
// ============================================================================

/// A numeric FIT field that may arrive as a number or a numeric string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FitNumber {
    Number(f64),
    Text(String),
}

impl FitNumber {
    /// Finite numeric value, `None` for non-numeric or non-finite input.
    pub fn as_f64(&self) -> Option<f64> {
        let value = match self {
            FitNumber::Number(v) => *v,
            FitNumber::Text(s) => s.trim().parse::<f64>().ok()?,
        };
        value.is_finite().then_some(value)
    }
}

impl From<f64> for FitNumber {
    fn from(value: f64) -> Self {
        FitNumber::Number(value)
    }
}

/// Finite value of an optional FIT number.
pub(crate) fn finite(value: &Option<FitNumber>) -> Option<f64> {
    value.as_ref().and_then(FitNumber::as_f64)
}

/// Decoded file: sessions nest laps, laps nest records.
///
/// Laps and records that no enclosing message claimed stay at the top level.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawFitData {
    pub sessions: Vec<RawSession>,
    pub laps: Vec<RawLap>,
    pub records: Vec<RawRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawSession {
    pub sport: Option<String>,
    pub sub_sport: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub total_distance: Option<FitNumber>,
    pub total_elapsed_time: Option<FitNumber>,
    pub avg_heart_rate: Option<FitNumber>,
    pub max_heart_rate: Option<FitNumber>,
    /// Strides per minute (one leg)
    pub avg_cadence: Option<FitNumber>,
    pub total_calories: Option<FitNumber>,
    pub total_ascent: Option<FitNumber>,
    pub total_descent: Option<FitNumber>,
    pub max_speed: Option<FitNumber>,
    pub enhanced_max_speed: Option<FitNumber>,
    pub laps: Vec<RawLap>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawLap {
    pub start_time: Option<DateTime<Utc>>,
    pub total_distance: Option<FitNumber>,
    pub total_elapsed_time: Option<FitNumber>,
    pub avg_heart_rate: Option<FitNumber>,
    pub max_heart_rate: Option<FitNumber>,
    /// Strides per minute (one leg)
    pub avg_cadence: Option<FitNumber>,
    pub avg_speed: Option<FitNumber>,
    pub enhanced_avg_speed: Option<FitNumber>,
    pub total_ascent: Option<FitNumber>,
    pub records: Vec<RawRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawRecord {
    pub timestamp: Option<DateTime<Utc>>,
    pub heart_rate: Option<FitNumber>,
    /// Strides per minute (one leg)
    pub cadence: Option<FitNumber>,
    pub speed: Option<FitNumber>,
    pub enhanced_speed: Option<FitNumber>,
    /// Cumulative distance in meters
    pub distance: Option<FitNumber>,
    pub altitude: Option<FitNumber>,
    pub enhanced_altitude: Option<FitNumber>,
    /// Degrees
    pub position_lat: Option<FitNumber>,
    /// Degrees
    pub position_long: Option<FitNumber>,
}

// ============================================================================
// Normalized activity
// ============================================================================

/// Whole-activity summary. Every numeric field is optional because devices
/// omit fields inconsistently. Cadence is in full steps per minute.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub sport: Option<String>,
    /// ISO 8601, UTC
    pub start_time: Option<String>,
    pub total_distance_m: Option<f64>,
    pub total_elapsed_s: Option<f64>,
    pub avg_heart_rate: Option<f64>,
    pub max_heart_rate: Option<f64>,
    pub avg_cadence: Option<f64>,
    pub total_calories: Option<f64>,
    pub total_ascent_m: Option<f64>,
    pub total_descent_m: Option<f64>,
    pub max_speed_mps: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FitLap {
    /// 1-based, file order
    pub lap_number: u32,
    pub start_time: Option<String>,
    pub total_distance_m: f64,
    pub total_elapsed_s: f64,
    pub avg_heart_rate: Option<f64>,
    pub max_heart_rate: Option<f64>,
    pub avg_cadence: Option<f64>,
    pub avg_speed_mps: Option<f64>,
    pub total_ascent_m: Option<f64>,
}

/// One kilometer of the activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FitKmSplit {
    /// 1-based kilometer number
    pub split_index: u32,
    /// Seconds per kilometer, 0 when the split covered no distance
    pub pace_s_per_km: i64,
    pub avg_heart_rate: Option<i64>,
    pub avg_cadence: Option<i64>,
    /// Sum of positive altitude deltas, never negative
    pub elevation_gain_m: i64,
}

/// A single (downsampled) sample.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FitRecord {
    /// Milliseconds since the Unix epoch
    pub timestamp_ms: Option<i64>,
    pub heart_rate: Option<f64>,
    pub cadence: Option<f64>,
    pub speed_mps: Option<f64>,
    pub distance_m: Option<f64>,
    pub altitude_m: Option<f64>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

impl FitRecord {
    /// Position of the sample, if it has a valid one.
    pub fn coordinate(&self) -> Option<Coordinate> {
        let coord = Coordinate::new(self.lat?, self.lng?);
        coord.is_valid().then_some(coord)
    }
}

/// A device activity in the same shape as a recorded run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedFitActivity {
    pub session: SessionSummary,
    pub laps: Vec<FitLap>,
    pub km_splits: Vec<FitKmSplit>,
    pub records: Vec<FitRecord>,
}

impl ParsedFitActivity {
    /// GPS track of the downsampled records that carry a valid position.
    pub fn track(&self) -> Vec<Coordinate> {
        self.records.iter().filter_map(FitRecord::coordinate).collect()
    }
}
