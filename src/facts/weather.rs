//! Weather samples and their race-level summary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::stats;

/// One weather station reading.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherSample {
    /// Reading time.
    pub time_utc: Option<DateTime<Utc>>,
    /// Air temperature.
    pub air_temp: Option<f64>,
    /// Track surface temperature.
    pub track_temp: Option<f64>,
    /// Relative humidity.
    pub humidity: Option<f64>,
    /// Rain indicator; any positive value means rain.
    pub rain: Option<f64>,
    /// Wind speed.
    pub wind_speed: Option<f64>,
}

/// Averages over the race's weather readings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSummary {
    /// Mean air temperature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub air_temp_mean: Option<f64>,
    /// Mean track temperature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track_temp_mean: Option<f64>,
    /// Mean humidity.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub humidity_mean: Option<f64>,
    /// Mean wind speed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wind_speed_mean: Option<f64>,
    /// True if any reading reported rain.
    pub rain_flag: bool,
    /// Number of readings.
    pub samples: usize,
}

impl WeatherSummary {
    /// Summarizes readings. `None` when there are none.
    #[must_use]
    pub fn from_samples(samples: &[WeatherSample]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        let column = |f: fn(&WeatherSample) -> Option<f64>| {
            let values: Vec<f64> = samples.iter().filter_map(f).filter(|v| v.is_finite()).collect();
            stats::mean(&values)
        };
        Some(Self {
            air_temp_mean: column(|s| s.air_temp),
            track_temp_mean: column(|s| s.track_temp),
            humidity_mean: column(|s| s.humidity),
            wind_speed_mean: column(|s| s.wind_speed),
            rain_flag: samples.iter().any(|s| s.rain.is_some_and(|r| r > 0.0)),
            samples: samples.len(),
        })
    }
}
