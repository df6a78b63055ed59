//! Driver style tags inferred from aggregate metrics and racing laps.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::stats;

/// Thresholds for inferred style tags.
///
/// A tag is only considered when its metric is present.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleThresholds {
    /// `steering_variance_mean` above this is `erratic_steering`.
    pub erratic_steering_above: f64,
    /// `steering_variance_mean` below this is `smooth_steering`.
    pub smooth_steering_below: f64,
    /// `brake_spikes_sum` above this is `aggressive_braking`.
    pub aggressive_braking_above: f64,
    /// `throttle_smoothness_mean` below this is `smooth_throttle`.
    pub smooth_throttle_below: f64,
    /// `lap_time_std` above this is `inconsistent_pace`.
    pub inconsistent_pace_above: f64,
    /// Laps averaged at each end of the race for `late_race_fade`.
    pub fade_window_laps: usize,
    /// Racing laps needed before `late_race_fade` is considered.
    pub fade_min_laps: usize,
    /// Closing-window mean slower than the opening-window mean by more than
    /// this many seconds is `late_race_fade`.
    pub late_race_fade_above: f64,
}

impl Default for StyleThresholds {
    fn default() -> Self {
        Self {
            erratic_steering_above: 1000.0,
            smooth_steering_below: 600.0,
            aggressive_braking_above: 5000.0,
            smooth_throttle_below: 1.2,
            inconsistent_pace_above: 70.0,
            fade_window_laps: 3,
            fade_min_laps: 6,
            late_race_fade_above: 0.5,
        }
    }
}

impl StyleThresholds {
    /// Validate thresholds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let all = [
            self.erratic_steering_above,
            self.smooth_steering_below,
            self.aggressive_braking_above,
            self.smooth_throttle_below,
            self.inconsistent_pace_above,
            self.late_race_fade_above,
        ];
        if all.iter().any(|t| !t.is_finite()) {
            return Err(ConfigError::Invalid {
                reason: "style thresholds must be finite".to_string(),
            });
        }
        if self.smooth_steering_below > self.erratic_steering_above {
            return Err(ConfigError::Invalid {
                reason: "smooth_steering_below must not exceed erratic_steering_above".to_string(),
            });
        }
        if self.fade_window_laps == 0 || self.fade_min_laps < self.fade_window_laps {
            return Err(ConfigError::Invalid {
                reason: "fade_min_laps must be at least fade_window_laps, which must be > 0"
                    .to_string(),
            });
        }
        Ok(())
    }
}

/// True if the closing laps are slower than the opening laps by more than the
/// fade threshold. `racing_laps` are lap times in lap order.
fn fades_late(racing_laps: &[f64], thresholds: &StyleThresholds) -> bool {
    let window = thresholds.fade_window_laps;
    if window == 0 || racing_laps.len() < thresholds.fade_min_laps.max(window) {
        return false;
    }
    let opening = stats::mean(&racing_laps[..window]);
    let closing = stats::mean(&racing_laps[racing_laps.len() - window..]);
    match (opening, closing) {
        (Some(first), Some(last)) => last - first > thresholds.late_race_fade_above,
        _ => false,
    }
}

/// Infers style tags from a driver's metrics and racing lap times (in lap
/// order), in a fixed tag order.
#[must_use]
pub fn infer_style_tags(
    metrics: &BTreeMap<String, f64>,
    racing_laps: &[f64],
    thresholds: &StyleThresholds,
) -> Vec<String> {
    let metric = |name: &str| metrics.get(name).copied().filter(|v| v.is_finite());
    let mut tags = Vec::new();

    if let Some(steering) = metric("steering_variance_mean") {
        if steering > thresholds.erratic_steering_above {
            tags.push("erratic_steering");
        } else if steering < thresholds.smooth_steering_below {
            tags.push("smooth_steering");
        }
    }
    if metric("brake_spikes_sum").is_some_and(|v| v > thresholds.aggressive_braking_above) {
        tags.push("aggressive_braking");
    }
    if metric("throttle_smoothness_mean").is_some_and(|v| v < thresholds.smooth_throttle_below) {
        tags.push("smooth_throttle");
    }
    if metric("lap_time_std").is_some_and(|v| v > thresholds.inconsistent_pace_above) {
        tags.push("inconsistent_pace");
    }
    if fades_late(racing_laps, thresholds) {
        tags.push("late_race_fade");
    }

    tags.into_iter().map(str::to_string).collect()
}
