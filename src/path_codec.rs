//! GPS path serialization.
//!
//! Paths are stored as a JSON array of `{lat,lng}` objects. On the way back
//! in, elements may also use the platform geolocation shape
//! `{latitude,longitude,timestamp,accuracy,...}`; both are normalized to
//! [`Coordinate`] at this boundary and never leak further.
//!
//! [`parse_path`] is lenient per element, [`validate_geometry`] is strict
//! for the whole path.

use log::debug;
use serde::Deserialize;
use serde_json::Value;

use crate::Coordinate;

/// Check a latitude is within `[-90, 90]`.
pub fn is_valid_latitude(lat: f64) -> bool {
    (-90.0..=90.0).contains(&lat)
}

/// Check a longitude is within `[-180, 180]`.
pub fn is_valid_longitude(lng: f64) -> bool {
    (-180.0..=180.0).contains(&lng)
}

/// Check both components of a coordinate are in range.
pub fn is_valid_coordinate(coord: &Coordinate) -> bool {
    is_valid_latitude(coord.lat) && is_valid_longitude(coord.lng)
}

/// Encode a path as a JSON array of `{lat,lng}` objects.
///
/// An empty path encodes as `[]`.
pub fn serialize_path(points: &[Coordinate]) -> String {
    serde_json::to_string(points).unwrap_or_else(|_| "[]".to_string())
}

/// Decode a stored path, dropping anything that is not a valid coordinate.
///
/// Missing input or malformed JSON yields an empty path rather than an error.
pub fn parse_path(raw: Option<&str>) -> Vec<Coordinate> {
    let Some(elements) = raw.and_then(parse_array) else {
        return Vec::new();
    };

    let total = elements.len();
    let points: Vec<Coordinate> = elements
        .into_iter()
        .filter_map(decode_point)
        .filter(is_valid_coordinate)
        .collect();

    if points.len() < total {
        debug!(
            "[PathCodec] dropped {} of {} stored points",
            total - points.len(),
            total
        );
    }
    points
}

/// Strict gate before a path is accepted for persistence.
///
/// True only for a JSON array of at least two elements where every element
/// is a valid coordinate in either field-naming shape.
pub fn validate_geometry(raw: Option<&str>) -> bool {
    let Some(elements) = raw.and_then(parse_array) else {
        return false;
    };
    elements.len() >= 2
        && elements
            .into_iter()
            .all(|v| decode_point(v).is_some_and(|c| is_valid_coordinate(&c)))
}

/// Build coordinates from a flat `[lat, lng, lat, lng, ...]` buffer.
///
/// A trailing unpaired value is ignored; invalid pairs are dropped.
pub fn parse_flat(flat: &[f64]) -> Vec<Coordinate> {
    flat.chunks_exact(2)
        .map(|pair| Coordinate::new(pair[0], pair[1]))
        .filter(is_valid_coordinate)
        .collect()
}

/// Flatten coordinates to `[lat, lng, lat, lng, ...]`.
pub fn to_flat(points: &[Coordinate]) -> Vec<f64> {
    points.iter().flat_map(|p| [p.lat, p.lng]).collect()
}

fn parse_array(raw: &str) -> Option<Vec<Value>> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Array(elements)) => Some(elements),
        Ok(_) => None,
        Err(e) => {
            debug!("[PathCodec] unparseable path: {}", e);
            None
        }
    }
}

/// One stored element in either naming. Both names may be present at once;
/// `lat`/`lng` win over `latitude`/`longitude`.
#[derive(Deserialize)]
struct StoredPoint {
    lat: Option<f64>,
    lng: Option<f64>,
    latitude: Option<f64>,
    longitude: Option<f64>,
}

fn decode_point(value: Value) -> Option<Coordinate> {
    let point: StoredPoint = serde_json::from_value(value).ok()?;
    Some(Coordinate::new(
        point.lat.or(point.latitude)?,
        point.lng.or(point.longitude)?,
    ))
}
