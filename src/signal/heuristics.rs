//! Presentation heuristics for a single GPS fix.
//!
//! Browsers and mobile platforms only report a horizontal accuracy radius.
//! Satellite count and signal strength are *estimates* derived from it so
//! the UI has something familiar to show; they are not measured values.
//! Each curve is a standalone function so it can be retuned in isolation.

use super::{LocationQuality, SignalConfig};

/// Upper bound of the satellite estimate.
pub const MAX_ESTIMATED_SATELLITES: u32 = 13;

/// Bucket an accuracy radius (meters) into a quality level.
///
/// Thresholds are inclusive upper bounds: with the default config 5m is
/// excellent, 8m good, 20m fair and anything wider poor.
pub fn quality_for_radius(radius_m: f64, config: &SignalConfig) -> LocationQuality {
    if radius_m <= config.excellent_max_m {
        LocationQuality::Excellent
    } else if radius_m <= config.good_max_m {
        LocationQuality::Good
    } else if radius_m <= config.fair_max_m {
        LocationQuality::Fair
    } else {
        LocationQuality::Poor
    }
}

/// Estimated number of satellites in view.
///
/// `13 - 4 * log10(r)` with `r` floored at 1m: about 10 satellites at 5m,
/// 5 at 100m, none beyond a few kilometers. Never increases with `r`.
pub fn estimate_satellites(radius_m: f64) -> u32 {
    if !radius_m.is_finite() {
        return 0;
    }
    let estimate = 13.0 - 4.0 * radius_m.max(1.0).log10();
    estimate.round().clamp(0.0, MAX_ESTIMATED_SATELLITES as f64) as u32
}

/// Estimated signal strength in `[0, 100]`.
///
/// `100 / (1 + r/10)`, rounded up so every finite radius stays above zero:
/// 100 at 0m, 50 at 10m, 10 at 100m.
pub fn estimate_signal_strength(radius_m: f64) -> u8 {
    if !radius_m.is_finite() {
        return 0;
    }
    let strength = 100.0 / (1.0 + radius_m.max(0.0) / 10.0);
    strength.ceil().clamp(1.0, 100.0) as u8
}
