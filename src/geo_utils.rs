//! # Geographic Utilities
//!
//! Pure numeric helpers shared by live recording and device imports:
//!
//! - **Haversine Distance**: Great-circle distance between GPS points (km)
//! - **Path Length**: Total distance along a path (km)
//! - **Douglas-Peucker**: Line simplification
//! - **Bounds**: Bounding box, containment and expansion
//! - **Waypoints**: Linear interpolation between two points
//! - **Pace/Time**: Time estimates and display formatting
//!
//! None of these validate coordinate ranges; filter with
//! [`crate::path_codec::is_valid_coordinate`] first.

use geo::{Coord, LineString, Simplify};

use crate::{Coordinate, MapBounds};

/// Mean Earth radius used for haversine distances, in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Default Douglas-Peucker tolerance in degrees (roughly 11m of latitude).
pub const DEFAULT_SIMPLIFY_TOLERANCE: f64 = 0.0001;

/// Default running pace for time estimates.
pub const DEFAULT_PACE_MIN_PER_KM: f64 = 6.0;

/// Default number of decimals for [`format_distance`].
pub const DEFAULT_DISTANCE_DECIMALS: usize = 2;

// ============================================================================
// Distance
// ============================================================================

/// Great-circle distance between two points in kilometers.
///
/// Returns exactly `0.0` for identical points and is symmetric.
///
/// # Example
/// ```
/// use activity_core::geo_utils::haversine_distance;
/// let km = haversine_distance(32.0853, 34.7818, 31.7683, 35.2137);
/// assert!(km > 50.0 && km < 60.0);
/// ```
pub fn haversine_distance(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lng = (lng2 - lng1).to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

/// Haversine distance between two coordinates in kilometers.
pub fn haversine_distance_points(a: &Coordinate, b: &Coordinate) -> f64 {
    haversine_distance(a.lat, a.lng, b.lat, b.lng)
}

/// Sum of consecutive haversine distances in kilometers.
pub fn path_length(points: &[Coordinate]) -> f64 {
    points
        .windows(2)
        .map(|w| haversine_distance_points(&w[0], &w[1]))
        .sum()
}

// ============================================================================
// Simplification
// ============================================================================

/// Douglas-Peucker line simplification.
///
/// `tolerance` is the maximum perpendicular deviation from a chord, in the
/// same units as the coordinates (degrees). Larger tolerances keep fewer
/// points. The first and last points are always kept; paths of two points
/// or fewer come back unchanged.
///
/// # Example
/// ```rust
/// use activity_core::{geo_utils::simplify, Coordinate};
///
/// let track = vec![
///     Coordinate::new(51.5074, -0.1278),
///     Coordinate::new(51.50741, -0.1279),
///     Coordinate::new(51.5090, -0.1300),
/// ];
/// let simplified = simplify(&track, 0.0001);
/// assert_eq!(simplified.len(), 2);
/// ```
pub fn simplify(points: &[Coordinate], tolerance: f64) -> Vec<Coordinate> {
    if points.len() <= 2 || !tolerance.is_finite() || tolerance <= 0.0 {
        return points.to_vec();
    }

    let coords: Vec<Coord<f64>> = points.iter().map(|p| Coord { x: p.lng, y: p.lat }).collect();

    let line = LineString::new(coords);
    let simplified = line.simplify(&tolerance);

    simplified
        .coords()
        .map(|c| Coordinate::new(c.y, c.x))
        .collect()
}

// ============================================================================
// Bounds
// ============================================================================

/// Tight bounding box for a path, or `None` for an empty path.
pub fn compute_bounds(points: &[Coordinate]) -> Option<MapBounds> {
    let first = points.first()?;
    Some(
        points[1..]
            .iter()
            .fold(MapBounds::from_point(*first), |bounds, p| {
                expand_bounds(bounds, p)
            }),
    )
}

/// Whether a point lies inside the bounds. Edges count as inside.
pub fn point_in_bounds(point: &Coordinate, bounds: &MapBounds) -> bool {
    point.lat >= bounds.sw.lat
        && point.lat <= bounds.ne.lat
        && point.lng >= bounds.sw.lng
        && point.lng <= bounds.ne.lng
}

/// Grow bounds just enough to contain `point`. Never shrinks.
pub fn expand_bounds(bounds: MapBounds, point: &Coordinate) -> MapBounds {
    if point_in_bounds(point, &bounds) {
        return bounds;
    }
    MapBounds {
        ne: Coordinate::new(bounds.ne.lat.max(point.lat), bounds.ne.lng.max(point.lng)),
        sw: Coordinate::new(bounds.sw.lat.min(point.lat), bounds.sw.lng.min(point.lng)),
    }
}

// ============================================================================
// Waypoints
// ============================================================================

/// Evenly spaced points from `start` to `end`, both included.
///
/// Produces `count + 1` points. Interpolation is linear in lat/lng, which is
/// fine for the short legs this is used for.
pub fn interpolate_waypoints(start: &Coordinate, end: &Coordinate, count: usize) -> Vec<Coordinate> {
    if count == 0 {
        return vec![*start];
    }
    (0..=count)
        .map(|i| {
            let t = i as f64 / count as f64;
            Coordinate::new(
                start.lat + (end.lat - start.lat) * t,
                start.lng + (end.lng - start.lng) * t,
            )
        })
        .collect()
}

// ============================================================================
// Pace / Time
// ============================================================================

/// Estimated duration in whole minutes for a distance at a given pace.
pub fn estimate_time(distance_km: f64, pace_min_per_km: f64) -> i64 {
    (distance_km * pace_min_per_km).round() as i64
}

/// Fixed-decimal distance with a unit suffix, e.g. `"5.00 km"`.
pub fn format_distance(km: f64, decimals: usize) -> String {
    format!("{:.*} km", decimals, km)
}

/// Average pace in minutes per kilometer, `None` when it is undefined.
pub fn pace_min_per_km(distance_km: f64, duration_s: f64) -> Option<f64> {
    if !distance_km.is_finite() || !duration_s.is_finite() || distance_km <= 0.0 {
        return None;
    }
    Some(duration_s / 60.0 / distance_km)
}

/// Pace as `m:ss /km`.
pub fn format_pace(min_per_km: f64) -> String {
    if !min_per_km.is_finite() || min_per_km < 0.0 {
        return "--:-- /km".to_string();
    }
    let total_secs = (min_per_km * 60.0).round() as u64;
    format!("{}:{:02} /km", total_secs / 60, total_secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_track() -> Vec<Coordinate> {
        (0..50)
            .map(|i| Coordinate::new(51.5074 + i as f64 * 0.001, -0.1278 + i as f64 * 0.0005))
            .collect()
    }

    #[test]
    fn test_haversine_identity_and_symmetry() {
        let a = Coordinate::new(32.0853, 34.7818);
        let b = Coordinate::new(31.7683, 35.2137);

        assert_eq!(haversine_distance_points(&a, &a), 0.0);
        assert_eq!(
            haversine_distance_points(&a, &b),
            haversine_distance_points(&b, &a)
        );
    }

    #[test]
    fn test_haversine_tel_aviv_jerusalem() {
        let km = haversine_distance(32.0853, 34.7818, 31.7683, 35.2137);
        assert!(km > 50.0 && km < 60.0, "got {km}");
    }

    #[test]
    fn test_path_length() {
        assert_eq!(path_length(&[]), 0.0);
        assert_eq!(path_length(&[Coordinate::new(1.0, 1.0)]), 0.0);

        // One degree of latitude is ~111.19 km on a 6371 km sphere
        let line = vec![
            Coordinate::new(0.0, 0.0),
            Coordinate::new(0.5, 0.0),
            Coordinate::new(1.0, 0.0),
        ];
        assert!((path_length(&line) - 111.19).abs() < 0.01);
    }

    #[test]
    fn test_simplify_keeps_endpoints() {
        let track = sample_track();
        let simplified = simplify(&track, DEFAULT_SIMPLIFY_TOLERANCE);

        assert!(simplified.len() <= track.len());
        assert_eq!(simplified.first(), track.first());
        assert_eq!(simplified.last(), track.last());
        // Straight line collapses to its endpoints
        assert_eq!(simplified.len(), 2);
    }

    #[test]
    fn test_simplify_short_input_unchanged() {
        let two = vec![Coordinate::new(1.0, 1.0), Coordinate::new(2.0, 2.0)];
        assert_eq!(simplify(&two, 10.0), two);
        assert!(simplify(&[], 1.0).is_empty());
    }

    #[test]
    fn test_simplify_tolerance_monotonic() {
        // Zig-zag so every point matters at small tolerance
        let zigzag: Vec<Coordinate> = (0..1000)
            .map(|i| {
                let offset = if i % 2 == 0 { 0.0 } else { 0.0005 };
                Coordinate::new(51.0 + offset, i as f64 * 0.0001)
            })
            .collect();

        let fine = simplify(&zigzag, 0.0001);
        let coarse = simplify(&zigzag, 0.001);
        assert!(coarse.len() <= fine.len());
        assert_eq!(coarse.len(), 2);
        assert_eq!(fine.len(), zigzag.len());
    }

    #[test]
    fn test_bounds() {
        assert!(compute_bounds(&[]).is_none());

        let p = Coordinate::new(10.0, 20.0);
        let single = compute_bounds(&[p]).unwrap();
        assert_eq!(single.ne, p);
        assert_eq!(single.sw, p);

        let bounds = compute_bounds(&sample_track()).unwrap();
        assert!((bounds.sw.lat - 51.5074).abs() < 1e-9);
        assert!((bounds.ne.lat - (51.5074 + 49.0 * 0.001)).abs() < 1e-9);
        assert!((bounds.sw.lng - -0.1278).abs() < 1e-9);
    }

    #[test]
    fn test_point_in_bounds_inclusive() {
        let bounds = MapBounds {
            ne: Coordinate::new(2.0, 2.0),
            sw: Coordinate::new(0.0, 0.0),
        };
        assert!(point_in_bounds(&Coordinate::new(2.0, 1.0), &bounds));
        assert!(point_in_bounds(&Coordinate::new(0.0, 0.0), &bounds));
        assert!(!point_in_bounds(&Coordinate::new(2.0001, 1.0), &bounds));
    }

    #[test]
    fn test_expand_bounds() {
        let bounds = MapBounds {
            ne: Coordinate::new(2.0, 2.0),
            sw: Coordinate::new(0.0, 0.0),
        };
        assert_eq!(expand_bounds(bounds, &Coordinate::new(1.0, 1.0)), bounds);

        let grown = expand_bounds(bounds, &Coordinate::new(3.0, -1.0));
        assert_eq!(grown.ne, Coordinate::new(3.0, 2.0));
        assert_eq!(grown.sw, Coordinate::new(0.0, -1.0));
    }

    #[test]
    fn test_interpolate_waypoints() {
        let start = Coordinate::new(0.0, 0.0);
        let end = Coordinate::new(1.0, 2.0);
        let points = interpolate_waypoints(&start, &end, 4);

        assert_eq!(points.len(), 5);
        assert_eq!(points[0], start);
        assert_eq!(points[4], end);
        assert_eq!(points[2], Coordinate::new(0.5, 1.0));
        assert_eq!(interpolate_waypoints(&start, &end, 0), vec![start]);
    }

    #[test]
    fn test_time_and_formatting() {
        assert_eq!(estimate_time(5.0, DEFAULT_PACE_MIN_PER_KM), 30);
        assert_eq!(estimate_time(2.55, 5.0), 13);
        assert_eq!(format_distance(5.0, DEFAULT_DISTANCE_DECIMALS), "5.00 km");
        assert_eq!(format_distance(12.3456, 1), "12.3 km");

        assert_eq!(pace_min_per_km(10.0, 3000.0), Some(5.0));
        assert_eq!(pace_min_per_km(0.0, 3000.0), None);
        assert_eq!(format_pace(5.5), "5:30 /km");
        assert_eq!(format_pace(f64::NAN), "--:-- /km");
    }
}
