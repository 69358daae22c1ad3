//! Binary FIT decoding into the raw session/lap/record hierarchy.
//!
//! FIT files are a flat message stream. Devices write a lap message when a
//! lap ends and a session message when the session ends, so records are
//! claimed by the next lap and laps by the next session. Whatever is left
//! unclaimed at the end of the file stays at the top level.

use chrono::Utc;
use fitparser::profile::MesgNum;
use fitparser::{FitDataRecord, Value};
use log::info;

use super::types::{FitNumber, RawFitData, RawLap, RawRecord, RawSession};
use crate::error::{IngestError, Result};

/// Degrees per semicircle (2^31 semicircles = 180 degrees).
const SEMICIRCLE_TO_DEGREES: f64 = 180.0 / 2_147_483_648.0;

/// Decode FIT bytes into the raw hierarchy.
///
/// Any parse failure is returned as [`IngestError::DecodeFailed`]; there is
/// no partial result. A file without a single session, lap or record
/// message is a failure too.
pub fn decode_fit(bytes: &[u8]) -> Result<RawFitData> {
    if bytes.is_empty() {
        return Err(IngestError::decode("empty FIT file"));
    }
    let messages = fitparser::de::from_bytes(bytes).map_err(IngestError::decode)?;
    let data = cascade(&messages);
    if data.sessions.is_empty() && data.laps.is_empty() && data.records.is_empty() {
        return Err(IngestError::decode(format!(
            "no activity messages in {} decoded messages",
            messages.len()
        )));
    }

    info!(
        "[FitImport] decoded {} sessions, {} nested laps, {} records from {} messages",
        data.sessions.len(),
        data.sessions.iter().map(|s| s.laps.len()).sum::<usize>() + data.laps.len(),
        data.sessions
            .iter()
            .flat_map(|s| &s.laps)
            .chain(&data.laps)
            .map(|l| l.records.len())
            .sum::<usize>()
            + data.records.len(),
        messages.len()
    );
    Ok(data)
}

fn cascade(messages: &[FitDataRecord]) -> RawFitData {
    let mut data = RawFitData::default();
    let mut pending_records: Vec<RawRecord> = Vec::new();
    let mut pending_laps: Vec<RawLap> = Vec::new();

    for message in messages {
        match message.kind() {
            MesgNum::Record => pending_records.push(record_from(message)),
            MesgNum::Lap => {
                let mut lap = lap_from(message);
                lap.records = std::mem::take(&mut pending_records);
                pending_laps.push(lap);
            }
            MesgNum::Session => {
                let mut session = session_from(message);
                session.laps = std::mem::take(&mut pending_laps);
                data.sessions.push(session);
            }
            _ => {}
        }
    }

    data.laps = pending_laps;
    data.records = pending_records;
    data
}

fn session_from(message: &FitDataRecord) -> RawSession {
    let mut session = RawSession::default();
    for field in message.fields() {
        let value = field.value();
        match field.name() {
            "sport" => session.sport = text_value(value),
            "sub_sport" => session.sub_sport = text_value(value),
            "start_time" => session.start_time = time_value(value),
            "total_distance" => session.total_distance = number_value(value),
            "total_elapsed_time" => session.total_elapsed_time = number_value(value),
            "avg_heart_rate" => session.avg_heart_rate = number_value(value),
            "max_heart_rate" => session.max_heart_rate = number_value(value),
            "avg_cadence" | "avg_running_cadence" => {
                session.avg_cadence = session.avg_cadence.take().or(number_value(value))
            }
            "total_calories" => session.total_calories = number_value(value),
            "total_ascent" => session.total_ascent = number_value(value),
            "total_descent" => session.total_descent = number_value(value),
            "max_speed" => session.max_speed = number_value(value),
            "enhanced_max_speed" => session.enhanced_max_speed = number_value(value),
            _ => {}
        }
    }
    session
}

fn lap_from(message: &FitDataRecord) -> RawLap {
    let mut lap = RawLap::default();
    for field in message.fields() {
        let value = field.value();
        match field.name() {
            "start_time" => lap.start_time = time_value(value),
            "total_distance" => lap.total_distance = number_value(value),
            "total_elapsed_time" => lap.total_elapsed_time = number_value(value),
            "avg_heart_rate" => lap.avg_heart_rate = number_value(value),
            "max_heart_rate" => lap.max_heart_rate = number_value(value),
            "avg_cadence" | "avg_running_cadence" => {
                lap.avg_cadence = lap.avg_cadence.take().or(number_value(value))
            }
            "avg_speed" => lap.avg_speed = number_value(value),
            "enhanced_avg_speed" => lap.enhanced_avg_speed = number_value(value),
            "total_ascent" => lap.total_ascent = number_value(value),
            _ => {}
        }
    }
    lap
}

fn record_from(message: &FitDataRecord) -> RawRecord {
    let mut record = RawRecord::default();
    for field in message.fields() {
        let value = field.value();
        match field.name() {
            "timestamp" => record.timestamp = time_value(value),
            "heart_rate" => record.heart_rate = number_value(value),
            "cadence" => record.cadence = number_value(value),
            "speed" => record.speed = number_value(value),
            "enhanced_speed" => record.enhanced_speed = number_value(value),
            "distance" => record.distance = number_value(value),
            "altitude" => record.altitude = number_value(value),
            "enhanced_altitude" => record.enhanced_altitude = number_value(value),
            "position_lat" => record.position_lat = position_value(value, field.units()),
            "position_long" => record.position_long = position_value(value, field.units()),
            _ => {}
        }
    }
    record
}

fn number_value(value: &Value) -> Option<FitNumber> {
    fit_value_to_f64(value).map(FitNumber::Number)
}

fn position_value(value: &Value, units: &str) -> Option<FitNumber> {
    let raw = fit_value_to_f64(value)?;
    let degrees = if units == "semicircles" {
        raw * SEMICIRCLE_TO_DEGREES
    } else {
        raw
    };
    Some(FitNumber::Number(degrees))
}

fn text_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        other => fit_value_to_f64(other).map(|v| v.to_string()),
    }
}

fn time_value(value: &Value) -> Option<chrono::DateTime<Utc>> {
    match value {
        Value::Timestamp(ts) => Some(ts.with_timezone(&Utc)),
        _ => None,
    }
}

fn fit_value_to_f64(value: &Value) -> Option<f64> {
    let v = match value {
        Value::Float32(v) => *v as f64,
        Value::Float64(v) => *v,
        Value::SInt8(v) => *v as f64,
        Value::UInt8(v) => *v as f64,
        Value::UInt8z(v) => *v as f64,
        Value::Byte(v) => *v as f64,
        Value::SInt16(v) => *v as f64,
        Value::UInt16(v) => *v as f64,
        Value::UInt16z(v) => *v as f64,
        Value::SInt32(v) => *v as f64,
        Value::UInt32(v) => *v as f64,
        Value::UInt32z(v) => *v as f64,
        Value::SInt64(v) => *v as f64,
        Value::UInt64(v) => *v as f64,
        Value::UInt64z(v) => *v as f64,
        Value::Array(values) => return values.iter().find_map(fit_value_to_f64),
        _ => return None,
    };
    v.is_finite().then_some(v)
}
