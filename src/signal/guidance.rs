//! User-facing guidance derived from signal quality: troubleshooting tips,
//! status labels and the "ready to record" gate.

use serde::{Deserialize, Serialize};

use super::{AccuracySnapshot, AccuracyTrend, LocationQuality, SignalConfig};

/// What is wrong with the GPS signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuideIssue {
    NoSignal,
    PoorAccuracy,
    AccuracyDegrading,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GuidePriority {
    High,
    Medium,
    Low,
}

/// Troubleshooting steps for a signal problem, most useful first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TroubleshootingGuide {
    pub issue: GuideIssue,
    pub priority: GuidePriority,
    pub title: String,
    pub solutions: Vec<String>,
}

/// Label, color and icon shown next to the live GPS indicator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccuracyMessage {
    pub title: String,
    pub color: String,
    pub icon: String,
}

/// Answer to "can recording start now?".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingReadiness {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<String>,
}

impl TrackingReadiness {
    fn ready() -> Self {
        Self {
            ready: true,
            reason: None,
            recommendation: None,
        }
    }

    fn blocked(reason: impl Into<String>, recommendation: impl Into<String>) -> Self {
        Self {
            ready: false,
            reason: Some(reason.into()),
            recommendation: Some(recommendation.into()),
        }
    }
}

fn solutions(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Pick the single most important guide.
///
/// Priority: no data at all, then a poor current fix, then a degrading
/// trend. `None` when nothing needs fixing.
pub fn troubleshooting_guide(
    current: Option<&AccuracySnapshot>,
    trend: AccuracyTrend,
) -> Option<TroubleshootingGuide> {
    let Some(current) = current else {
        return Some(TroubleshootingGuide {
            issue: GuideIssue::NoSignal,
            priority: GuidePriority::High,
            title: "No GPS signal".to_string(),
            solutions: solutions(&[
                "Make sure location services are enabled for this app",
                "Allow precise location access in your device settings",
                "Step outside; GPS does not work well indoors",
                "Wait up to a minute for the first fix after a cold start",
            ]),
        });
    };

    if current.location_quality == LocationQuality::Poor {
        return Some(TroubleshootingGuide {
            issue: GuideIssue::PoorAccuracy,
            priority: GuidePriority::High,
            title: format!("Poor GPS accuracy (±{:.0}m)", current.accuracy_radius),
            solutions: solutions(&[
                "Move to an open area with a clear view of the sky",
                "Keep away from tall buildings, tunnels and dense trees",
                "Hold still for 30 seconds so the receiver can lock on",
                "Turn off battery saver, which can reduce GPS precision",
            ]),
        });
    }

    if trend == AccuracyTrend::Degrading {
        return Some(TroubleshootingGuide {
            issue: GuideIssue::AccuracyDegrading,
            priority: GuidePriority::Medium,
            title: "GPS accuracy is getting worse".to_string(),
            solutions: solutions(&[
                "Check whether you are entering a covered or built-up area",
                "Keep the phone in an outer pocket or armband, not a bag",
                "If it persists, pause and let the signal recover",
            ]),
        });
    }

    None
}

/// Status label for a quality level.
pub fn accuracy_message(quality: LocationQuality) -> AccuracyMessage {
    let (title, color, icon) = match quality {
        LocationQuality::Excellent => ("Excellent GPS signal", "green", "signal-strong"),
        LocationQuality::Good => ("Good GPS signal", "lightgreen", "signal-good"),
        LocationQuality::Fair => ("Fair GPS signal", "orange", "signal-fair"),
        LocationQuality::Poor => ("Poor GPS signal", "red", "signal-weak"),
    };
    AccuracyMessage {
        title: title.to_string(),
        color: color.to_string(),
        icon: icon.to_string(),
    }
}

/// Gate recording on a usable fix.
///
/// Not ready without a fix, or when the radius is beyond the fair bucket.
/// Radii past `very_poor_min_m` get a stronger recommendation.
pub fn tracking_readiness(
    snapshot: Option<&AccuracySnapshot>,
    config: &SignalConfig,
) -> TrackingReadiness {
    let Some(snapshot) = snapshot else {
        return TrackingReadiness::blocked(
            "No GPS signal detected",
            "Enable location services and wait for a GPS fix",
        );
    };

    let radius = snapshot.accuracy_radius;
    if radius > config.very_poor_min_m {
        TrackingReadiness::blocked(
            format!("GPS accuracy is very poor (±{:.0}m)", radius),
            "Move outdoors to an open area and wait for the signal to settle",
        )
    } else if radius > config.fair_max_m {
        TrackingReadiness::blocked(
            format!("GPS accuracy is poor (±{:.0}m)", radius),
            "Wait a few moments for the signal to improve before starting",
        )
    } else {
        TrackingReadiness::ready()
    }
}
