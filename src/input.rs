//! Typed input rows.
//!
//! These are the in-memory tables handed over by the loaders. Every row keeps
//! the vehicle identifier exactly as its source table spelled it; resolution
//! to a canonical [`VehicleId`](crate::identity::VehicleId) happens through the
//! race's [`AliasTable`](crate::identity::AliasTable).

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::identity::VehicleRef;
use crate::time::TimeValue;

/// Race-level metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaceMeta {
    /// Event name, e.g. "Road America Race 1".
    pub name: String,
    /// Track name.
    pub track: String,
    /// Race date, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    /// Session label ("Race 1", "Race 2", ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<String>,
}

impl RaceMeta {
    /// Creates race metadata with a name and a track.
    #[must_use]
    pub fn new(name: impl Into<String>, track: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            track: track.into(),
            date: None,
            session: None,
        }
    }

    /// Sets the race date.
    #[must_use]
    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }
}

/// One row of the official results.
///
/// Results are the only table that carries both the bare car number and the
/// composite vehicle id, so they anchor identity resolution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    /// Bare car number.
    #[serde(default)]
    pub number: Option<u32>,
    /// Composite vehicle id, e.g. `GR86-026-72`.
    #[serde(default)]
    pub vehicle: Option<String>,
    /// Overall finishing position.
    #[serde(default)]
    pub position: Option<u32>,
    /// Laps completed.
    #[serde(default)]
    pub laps: Option<u32>,
    /// Raw status token ("Classified", "DNF", "DNS", ...).
    #[serde(default)]
    pub status: Option<String>,
    /// Competition class.
    #[serde(default)]
    pub class: Option<String>,
    /// Group within the class, when the series uses one.
    #[serde(default)]
    pub group: Option<String>,
    /// Fastest lap as published.
    #[serde(default)]
    pub fastest_lap: Option<TimeValue>,
    /// Gap to the winner as published ("+1.234", "1 Lap").
    #[serde(default)]
    pub gap_first: Option<String>,
}

impl ResultRow {
    /// Creates a result row for a composite vehicle id.
    #[must_use]
    pub fn vehicle(vehicle: impl Into<String>) -> Self {
        Self {
            vehicle: Some(vehicle.into()),
            ..Self::default()
        }
    }

    /// Sets the car number.
    #[must_use]
    pub fn with_number(mut self, number: u32) -> Self {
        self.number = Some(number);
        self
    }

    /// Sets the finishing position.
    #[must_use]
    pub fn with_position(mut self, position: u32) -> Self {
        self.position = Some(position);
        self
    }

    /// Sets the status token.
    #[must_use]
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    /// Sets the class.
    #[must_use]
    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.class = Some(class.into());
        self
    }

    /// Sets laps completed.
    #[must_use]
    pub fn with_laps(mut self, laps: u32) -> Self {
        self.laps = Some(laps);
        self
    }

    /// Sets the published fastest lap.
    #[must_use]
    pub fn with_fastest_lap(mut self, fastest_lap: TimeValue) -> Self {
        self.fastest_lap = Some(fastest_lap);
        self
    }
}

/// One row of the results-by-class table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassResultRow {
    /// Vehicle as listed by the class table.
    pub vehicle: VehicleRef,
    /// Class name.
    #[serde(default)]
    pub class: Option<String>,
    /// Position within the class.
    #[serde(default)]
    pub class_position: Option<u32>,
}

/// One lap of the lap-time table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LapRow {
    /// Vehicle as listed by the lap table.
    pub vehicle: VehicleRef,
    /// Lap number, starting at 1.
    pub lap: u32,
    /// Lap time in seconds.
    pub lap_time_seconds: f64,
}

impl LapRow {
    /// Creates a lap row.
    #[must_use]
    pub fn new(vehicle: impl Into<VehicleRef>, lap: u32, lap_time_seconds: f64) -> Self {
        Self {
            vehicle: vehicle.into(),
            lap,
            lap_time_seconds,
        }
    }
}

/// Per-lap metrics computed upstream from telemetry (max speed, peak G, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LapAggregateRow {
    /// Vehicle as listed by the per-lap table.
    pub vehicle: VehicleRef,
    /// Lap number.
    pub lap: u32,
    /// Named numeric metrics.
    #[serde(flatten)]
    pub metrics: BTreeMap<String, f64>,
}

/// Per-vehicle aggregates derived directly from raw telemetry.
///
/// Used as a fallback source for driver metrics: a value with the same name in
/// the dedicated driver aggregate table always wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryAggregateRow {
    /// Vehicle as listed by the telemetry table.
    pub vehicle: VehicleRef,
    /// Named numeric metrics.
    #[serde(flatten)]
    pub metrics: BTreeMap<String, f64>,
}

/// Precomputed per-driver summary statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverAggregateRow {
    /// Vehicle as listed by the driver table.
    pub vehicle: VehicleRef,
    /// Style tags assigned upstream; inferred from metrics when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style_tags: Option<Vec<String>>,
    /// Named numeric metrics (`lap_time_mean`, `lap_time_best`, ...).
    #[serde(flatten)]
    pub metrics: BTreeMap<String, f64>,
}

impl DriverAggregateRow {
    /// Creates a driver aggregate row with no metrics.
    #[must_use]
    pub fn new(vehicle: impl Into<VehicleRef>) -> Self {
        Self {
            vehicle: vehicle.into(),
            style_tags: None,
            metrics: BTreeMap::new(),
        }
    }

    /// Adds a metric.
    #[must_use]
    pub fn with_metric(mut self, name: impl Into<String>, value: f64) -> Self {
        self.metrics.insert(name.into(), value);
        self
    }
}

/// One vehicle's best laps as published ("best 10 laps by driver").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestLapsRow {
    /// Vehicle as listed by the best-laps table.
    pub vehicle: VehicleRef,
    /// Best lap times, in any order.
    pub best_laps: Vec<TimeValue>,
}
