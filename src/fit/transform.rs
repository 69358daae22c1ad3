//! Normalization of the raw FIT hierarchy into [`ParsedFitActivity`].
//!
//! Cadence arrives as one-legged strides per minute and is doubled exactly
//! once here, for every surface that exposes it. Km splits are derived from
//! the full-resolution record stream before it is downsampled.

use chrono::{DateTime, SecondsFormat, Utc};
use log::info;
use serde::{Deserialize, Serialize};

use super::types::{
    finite, FitKmSplit, FitLap, FitRecord, ParsedFitActivity, RawFitData, RawLap, RawRecord,
    RawSession, SessionSummary,
};

/// Every Nth record is kept for the public record stream.
pub const DEFAULT_RECORD_SAMPLE_EVERY: usize = 5;

const METERS_PER_KM: f64 = 1000.0;

/// Upper bound on derived splits; corrupt distance values stop here.
const MAX_KM_SPLITS: u32 = 10_000;

/// Strides per minute to steps per minute.
const CADENCE_FACTOR: f64 = 2.0;

/// Configuration for [`transform`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformConfig {
    /// Downsampling stride for `ParsedFitActivity::records`. Values below 1
    /// are treated as 1 (keep everything).
    pub record_sample_every: usize,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            record_sample_every: DEFAULT_RECORD_SAMPLE_EVERY,
        }
    }
}

/// Turn a decoded file into the normalized activity shape.
///
/// Never fails: missing sections produce empty collections and missing or
/// non-numeric fields produce `None`.
pub fn transform(raw: &RawFitData, config: &TransformConfig) -> ParsedFitActivity {
    let default_session = RawSession::default();
    let session = raw.sessions.first().unwrap_or(&default_session);

    let raw_laps: &[RawLap] = if session.laps.is_empty() {
        &raw.laps
    } else {
        &session.laps
    };

    let lap_records: Vec<&RawRecord> = raw_laps.iter().flat_map(|lap| &lap.records).collect();
    let records: Vec<&RawRecord> = if lap_records.is_empty() {
        raw.records.iter().collect()
    } else {
        lap_records
    };

    let laps: Vec<FitLap> = raw_laps
        .iter()
        .enumerate()
        .map(|(i, lap)| normalize_lap(i, lap))
        .collect();
    let km_splits = km_splits(&records);
    let public_records: Vec<FitRecord> = records
        .iter()
        .step_by(config.record_sample_every.max(1))
        .map(|r| normalize_record(r))
        .collect();

    let activity = ParsedFitActivity {
        session: normalize_session(session),
        laps,
        km_splits,
        records: public_records,
    };

    info!(
        "[FitImport] transformed {} laps, {} km splits, {}/{} records",
        activity.laps.len(),
        activity.km_splits.len(),
        activity.records.len(),
        records.len()
    );
    activity
}

fn format_time(time: &Option<DateTime<Utc>>) -> Option<String> {
    time.map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true))
}

fn doubled(value: Option<f64>) -> Option<f64> {
    value.map(|v| v * CADENCE_FACTOR)
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(String::from)
}

fn normalize_session(session: &RawSession) -> SessionSummary {
    SessionSummary {
        sport: non_empty(&session.sport).or_else(|| non_empty(&session.sub_sport)),
        start_time: format_time(&session.start_time),
        total_distance_m: finite(&session.total_distance),
        total_elapsed_s: finite(&session.total_elapsed_time),
        avg_heart_rate: finite(&session.avg_heart_rate),
        max_heart_rate: finite(&session.max_heart_rate),
        avg_cadence: doubled(finite(&session.avg_cadence)),
        total_calories: finite(&session.total_calories),
        total_ascent_m: finite(&session.total_ascent),
        total_descent_m: finite(&session.total_descent),
        max_speed_mps: finite(&session.max_speed).or_else(|| finite(&session.enhanced_max_speed)),
    }
}

fn normalize_lap(index: usize, lap: &RawLap) -> FitLap {
    FitLap {
        lap_number: index as u32 + 1,
        start_time: format_time(&lap.start_time),
        total_distance_m: finite(&lap.total_distance).unwrap_or(0.0),
        total_elapsed_s: finite(&lap.total_elapsed_time).unwrap_or(0.0),
        avg_heart_rate: finite(&lap.avg_heart_rate),
        max_heart_rate: finite(&lap.max_heart_rate),
        avg_cadence: doubled(finite(&lap.avg_cadence)),
        avg_speed_mps: finite(&lap.avg_speed).or_else(|| finite(&lap.enhanced_avg_speed)),
        total_ascent_m: finite(&lap.total_ascent),
    }
}

fn altitude_of(record: &RawRecord) -> Option<f64> {
    finite(&record.altitude).or_else(|| finite(&record.enhanced_altitude))
}

fn normalize_record(record: &RawRecord) -> FitRecord {
    FitRecord {
        timestamp_ms: record.timestamp.map(|t| t.timestamp_millis()),
        heart_rate: finite(&record.heart_rate),
        cadence: doubled(finite(&record.cadence)),
        speed_mps: finite(&record.speed).or_else(|| finite(&record.enhanced_speed)),
        distance_m: finite(&record.distance),
        altitude_m: altitude_of(record),
        lat: finite(&record.position_lat),
        lng: finite(&record.position_long),
    }
}

/// Running totals for the split currently being built.
#[derive(Default)]
struct SplitAccumulator {
    hr_sum: f64,
    hr_count: u32,
    cadence_sum: f64,
    cadence_count: u32,
    elevation_gain: f64,
}

impl SplitAccumulator {
    fn close(&mut self, split_index: u32, pace_s_per_km: i64) -> FitKmSplit {
        let split = FitKmSplit {
            split_index,
            pace_s_per_km,
            avg_heart_rate: (self.hr_count > 0)
                .then(|| (self.hr_sum / self.hr_count as f64).round() as i64),
            avg_cadence: (self.cadence_count > 0).then(|| {
                (self.cadence_sum / self.cadence_count as f64 * CADENCE_FACTOR).round() as i64
            }),
            elevation_gain_m: self.elevation_gain.round().max(0.0) as i64,
        };
        *self = Self::default();
        split
    }
}

/// Seconds per kilometer over a distance/time delta, 0 when the distance
/// delta is not positive or either time is unknown.
fn split_pace(elapsed_s: Option<f64>, distance_m: f64) -> i64 {
    match elapsed_s {
        Some(dt) if distance_m > 0.0 => (dt / distance_m * METERS_PER_KM).round() as i64,
        _ => 0,
    }
}

/// Close a split each time cumulative distance reaches the next whole
/// kilometer.
///
/// A single record that jumps several kilometers closes one split per
/// boundary; every split after the first covers zero distance and reports
/// pace 0. Distance after the last boundary does not form a split.
fn km_splits(records: &[&RawRecord]) -> Vec<FitKmSplit> {
    let mut splits = Vec::new();
    let mut acc = SplitAccumulator::default();

    let mut split_start_distance = 0.0;
    let mut split_start_time: Option<f64> = records
        .iter()
        .find_map(|r| r.timestamp)
        .map(|t| t.timestamp_millis() as f64 / 1000.0);
    let mut last_time = split_start_time;
    let mut previous_altitude: Option<f64> = None;
    let mut next_km: u32 = 1;

    for record in records {
        if let Some(hr) = finite(&record.heart_rate) {
            acc.hr_sum += hr;
            acc.hr_count += 1;
        }
        if let Some(cadence) = finite(&record.cadence) {
            acc.cadence_sum += cadence;
            acc.cadence_count += 1;
        }
        if let Some(altitude) = altitude_of(record) {
            if let Some(previous) = previous_altitude {
                let delta = altitude - previous;
                if delta > 0.0 {
                    acc.elevation_gain += delta;
                }
            }
            previous_altitude = Some(altitude);
        }
        if let Some(t) = record.timestamp {
            last_time = Some(t.timestamp_millis() as f64 / 1000.0);
        }

        let Some(distance) = finite(&record.distance) else {
            continue;
        };

        while next_km <= MAX_KM_SPLITS && distance >= next_km as f64 * METERS_PER_KM {
            let elapsed = match (split_start_time, last_time) {
                (Some(start), Some(now)) => Some(now - start),
                _ => None,
            };
            splits.push(acc.close(next_km, split_pace(elapsed, distance - split_start_distance)));

            split_start_distance = distance;
            split_start_time = last_time;
            next_km += 1;
        }
    }

    splits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fit::types::FitNumber;
    use chrono::{Duration, TimeZone};

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 6, 30, 0).unwrap()
    }

    fn record(offset_s: i64, distance: f64) -> RawRecord {
        RawRecord {
            timestamp: Some(start() + Duration::seconds(offset_s)),
            distance: Some(distance.into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_one_km_split_pace() {
        let raw = RawFitData {
            laps: vec![RawLap {
                total_distance: Some(1000.0.into()),
                total_elapsed_time: Some(300.0.into()),
                records: vec![record(0, 0.0), record(150, 500.0), record(300, 1000.0)],
                ..Default::default()
            }],
            ..Default::default()
        };

        let activity = transform(&raw, &TransformConfig::default());
        assert_eq!(activity.km_splits.len(), 1);
        assert_eq!(activity.km_splits[0].split_index, 1);
        assert_eq!(activity.km_splits[0].pace_s_per_km, 300);
        assert_eq!(activity.laps[0].total_distance_m, 1000.0);
        assert_eq!(activity.laps[0].total_elapsed_s, 300.0);
    }

    #[test]
    fn test_multi_km_jump_yields_zero_pace() {
        let raw = RawFitData {
            records: vec![record(0, 0.0), record(600, 2500.0)],
            ..Default::default()
        };
        let splits = transform(&raw, &TransformConfig::default()).km_splits;
        assert_eq!(splits.len(), 2);
        assert_eq!(splits[0].pace_s_per_km, 240);
        assert_eq!(splits[1].split_index, 2);
        assert_eq!(splits[1].pace_s_per_km, 0);
    }

    #[test]
    fn test_cadence_doubled_everywhere() {
        let mut records: Vec<RawRecord> = (0..10)
            .map(|i| RawRecord {
                cadence: Some(85.0.into()),
                ..record(i * 30, i as f64 * 120.0)
            })
            .collect();
        records.push(RawRecord {
            cadence: Some(85.0.into()),
            ..record(300, 1000.0)
        });

        let raw = RawFitData {
            sessions: vec![RawSession {
                avg_cadence: Some(85.0.into()),
                laps: vec![RawLap {
                    avg_cadence: Some(FitNumber::Text("85".to_string())),
                    records,
                    ..Default::default()
                }],
                ..Default::default()
            }],
            ..Default::default()
        };

        let activity = transform(&raw, &TransformConfig::default());
        assert_eq!(activity.session.avg_cadence, Some(170.0));
        assert_eq!(activity.laps[0].avg_cadence, Some(170.0));
        assert!(activity.records.iter().all(|r| r.cadence == Some(170.0)));
        assert_eq!(activity.km_splits[0].avg_cadence, Some(170));
    }

    #[test]
    fn test_downsampling_keeps_every_fifth() {
        let raw = RawFitData {
            records: (0..12).map(|i| record(i, i as f64)).collect(),
            ..Default::default()
        };
        let activity = transform(&raw, &TransformConfig::default());
        let distances: Vec<f64> = activity.records.iter().filter_map(|r| r.distance_m).collect();
        assert_eq!(distances, vec![0.0, 5.0, 10.0]);

        let everything = transform(
            &raw,
            &TransformConfig {
                record_sample_every: 0,
            },
        );
        assert_eq!(everything.records.len(), 12);
    }

    #[test]
    fn test_splits_use_full_resolution_records() {
        // 11 records; downsampling keeps indices 0, 5, 10 only
        let raw = RawFitData {
            records: (0..=10)
                .map(|i| RawRecord {
                    heart_rate: Some(FitNumber::Number(if i == 3 { 190.0 } else { 150.0 })),
                    ..record(i * 30, i as f64 * 100.0)
                })
                .collect(),
            ..Default::default()
        };
        let activity = transform(&raw, &TransformConfig::default());
        assert_eq!(activity.records.len(), 3);
        // (10 * 150 + 190) / 11 = 153.6
        assert_eq!(activity.km_splits[0].avg_heart_rate, Some(154));
    }

    #[test]
    fn test_elevation_gain_only_counts_climbs() {
        let altitudes = [100.0, 110.0, 105.0, 120.0, 90.0, 95.0];
        let raw = RawFitData {
            records: altitudes
                .iter()
                .enumerate()
                .map(|(i, &alt)| RawRecord {
                    altitude: Some(alt.into()),
                    ..record(i as i64 * 60, (i as f64 + 1.0) * 200.0)
                })
                .collect(),
            ..Default::default()
        };
        let splits = transform(&raw, &TransformConfig::default()).km_splits;
        assert_eq!(splits.len(), 1);
        // +10 +15 before the 1000 m boundary (record 4 at 1000 m drops 30)
        assert_eq!(splits[0].elevation_gain_m, 25);
    }

    #[test]
    fn test_session_fallbacks() {
        let raw = RawFitData {
            sessions: vec![
                RawSession {
                    sub_sport: Some("trail".to_string()),
                    start_time: Some(start()),
                    enhanced_max_speed: Some(4.2.into()),
                    total_distance: Some(FitNumber::Text("not a number".to_string())),
                    ..Default::default()
                },
                RawSession {
                    sport: Some("cycling".to_string()),
                    ..Default::default()
                },
            ],
            laps: vec![RawLap::default()],
            ..Default::default()
        };

        let activity = transform(&raw, &TransformConfig::default());
        assert_eq!(activity.session.sport.as_deref(), Some("trail"));
        assert_eq!(
            activity.session.start_time.as_deref(),
            Some("2024-05-01T06:30:00.000Z")
        );
        assert_eq!(activity.session.max_speed_mps, Some(4.2));
        assert_eq!(activity.session.total_distance_m, None);

        // Session had no nested laps, so top-level laps are used
        assert_eq!(activity.laps.len(), 1);
        assert_eq!(activity.laps[0].lap_number, 1);
        assert_eq!(activity.laps[0].total_distance_m, 0.0);
        assert_eq!(activity.laps[0].avg_heart_rate, None);
    }

    #[test]
    fn test_empty_input() {
        let activity = transform(&RawFitData::default(), &TransformConfig::default());
        assert_eq!(activity.session, SessionSummary::default());
        assert!(activity.laps.is_empty());
        assert!(activity.km_splits.is_empty());
        assert!(activity.records.is_empty());
    }

    #[test]
    fn test_record_fallback_fields() {
        let raw = RawFitData {
            records: vec![RawRecord {
                enhanced_speed: Some(3.1.into()),
                enhanced_altitude: Some(42.0.into()),
                position_lat: Some(51.5.into()),
                position_long: Some((-0.12).into()),
                ..record(0, 0.0)
            }],
            ..Default::default()
        };
        let activity = transform(&raw, &TransformConfig::default());
        let r = &activity.records[0];
        assert_eq!(r.speed_mps, Some(3.1));
        assert_eq!(r.altitude_m, Some(42.0));
        assert_eq!(r.timestamp_ms, Some(start().timestamp_millis()));
        assert_eq!(activity.track().len(), 1);
    }
}
