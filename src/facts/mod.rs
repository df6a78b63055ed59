//! Race facts: the single enriched record describing one race.
//!
//! [`RaceFactsBuilder`] joins every input table on the canonical vehicle id
//! and produces a [`RaceFacts`] value whose JSON form is deterministic: maps
//! are ordered and lists are sorted, so assembling the same inputs twice
//! yields byte-identical output.

pub mod assembler;
pub mod style;
pub mod weather;

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::classification::{ClassificationInsight, ClassificationSummary};
use crate::diagnostics::Diagnostics;
use crate::error::{RaceError, RaceResult};
use crate::event::Event;
use crate::identity::VehicleId;
use crate::laps::LapType;
use crate::sector::{SectorInsight, SectorSummary};

pub use assembler::RaceFactsBuilder;
pub use style::{infer_style_tags, StyleThresholds};
pub use weather::{WeatherSample, WeatherSummary};

/// Race-level header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceHeader {
    /// Event name.
    pub event_name: String,
    /// Track name.
    pub track: String,
    /// Race date.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    /// Session label.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<String>,
    /// Highest lap number in the lap table.
    pub total_laps: u32,
}

/// Everything known about one vehicle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverEntry {
    /// Canonical id.
    pub vehicle_id: VehicleId,
    /// Car number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub car_number: Option<u32>,
    /// Official finishing position.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_position: Option<u32>,
    /// False for vehicles known only from driver aggregates.
    pub classified: bool,
    /// Telemetry and driver aggregate metrics.
    pub driver_metrics: BTreeMap<String, f64>,
    /// Supplied or inferred style tags.
    pub style_tags: Vec<String>,
    /// The vehicle's events, in detection order.
    pub key_events: Vec<Event>,
    /// Sector strengths and weaknesses.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sector_insight: Option<SectorInsight>,
    /// Classification record.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classification: Option<ClassificationInsight>,
    /// Sum of lap times.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_time_seconds: Option<f64>,
    /// Mean rolling spread of lap-to-lap deltas over racing laps. Lower is steadier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pace_stability_index: Option<f64>,
}

/// One lap of the output lap table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LapTimeEntry {
    /// Canonical id.
    pub vehicle_id: VehicleId,
    /// Lap number.
    pub lap: u32,
    /// Lap time in seconds.
    pub lap_time_seconds: f64,
    /// Racing or formation lap.
    pub lap_type: LapType,
    /// Per-lap aggregate metrics joined on `(vehicle, lap)`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metrics: BTreeMap<String, f64>,
}

/// Baseline figures for counterfactual analysis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WhatIfBase {
    /// Sum of lap times per vehicle.
    pub total_time_seconds: BTreeMap<VehicleId, f64>,
    /// Sum of estimated event losses per vehicle.
    pub total_event_loss_seconds: BTreeMap<VehicleId, f64>,
}

/// Which optional inputs were supplied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct InputAvailability {
    /// Telemetry aggregates.
    pub telemetry_aggregates: bool,
    /// Per-lap aggregates.
    pub lap_aggregates: bool,
    /// Per-driver aggregates.
    pub driver_aggregates: bool,
    /// Detected events.
    pub events: bool,
    /// Results by class.
    pub class_results: bool,
    /// Sector table.
    pub sectors: bool,
    /// Weather readings.
    pub weather: bool,
    /// Best-laps table.
    pub best_laps: bool,
}

/// The enriched race record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceFacts {
    /// Race header.
    pub race: RaceHeader,
    /// One entry per vehicle, results order first.
    pub drivers: Vec<DriverEntry>,
    /// Race-defining events.
    pub race_key_events: Vec<Event>,
    /// Every normalized lap, sorted by vehicle then lap.
    pub lap_times: Vec<LapTimeEntry>,
    /// Weather averages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weather_summary: Option<WeatherSummary>,
    /// Best single-lap sector times.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sector_summary: Option<SectorSummary>,
    /// Classification summary.
    pub classification_summary: ClassificationSummary,
    /// Counterfactual baseline.
    pub what_if_base: WhatIfBase,
    /// Optional input availability.
    pub availability: InputAvailability,
}

impl RaceFacts {
    /// Serializes to compact JSON.
    pub fn to_json(&self) -> RaceResult<String> {
        serde_json::to_string(self).map_err(|e| RaceError::serialization(e.to_string()))
    }

    /// Serializes to indented JSON.
    pub fn to_json_pretty(&self) -> RaceResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| RaceError::serialization(e.to_string()))
    }

    /// BLAKE3 digest (hex) of the compact JSON form.
    pub fn fingerprint(&self) -> RaceResult<String> {
        let json = self.to_json()?;
        Ok(blake3::hash(json.as_bytes()).to_hex().to_string())
    }

    /// Looks a driver entry up by id.
    #[must_use]
    pub fn driver(&self, id: &VehicleId) -> Option<&DriverEntry> {
        self.drivers.iter().find(|d| &d.vehicle_id == id)
    }
}

/// Race facts plus the anomalies met while assembling them.
#[derive(Debug, Clone, PartialEq)]
pub struct Assembly {
    /// The assembled record.
    pub facts: RaceFacts,
    /// Non-fatal anomalies.
    pub diagnostics: Diagnostics,
}
