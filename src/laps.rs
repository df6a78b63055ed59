//! Normalized lap-time table.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::diagnostics::{Diagnostic, InputTable};
use crate::identity::{AliasTable, VehicleId};
use crate::input::LapRow;

/// One valid lap.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Lap {
    /// Lap number.
    pub lap: u32,
    /// Lap time in seconds.
    pub seconds: f64,
}

/// Whether a lap counts toward racing-lap metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LapType {
    /// A flying lap.
    Racing,
    /// A formation or out lap, slower than the configured threshold.
    Formation,
}

impl LapType {
    /// Classifies a lap time against the formation threshold.
    #[must_use]
    pub fn classify(seconds: f64, formation_lap_seconds: f64) -> Self {
        if seconds > formation_lap_seconds {
            Self::Formation
        } else {
            Self::Racing
        }
    }
}

/// Lap records keyed by canonical vehicle id, each vehicle's laps sorted by
/// lap number.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LapTable {
    laps: BTreeMap<VehicleId, Vec<Lap>>,
}

impl LapTable {
    /// Normalizes raw lap rows.
    ///
    /// Rows with an unresolvable vehicle, a zero lap number or a non-finite or
    /// negative time are dropped. Duplicate `(vehicle, lap)` pairs keep the
    /// first row. Gaps in lap numbering are reported but the laps are kept.
    #[must_use]
    pub fn from_rows(rows: &[LapRow], aliases: &AliasTable) -> (Self, Vec<Diagnostic>) {
        let mut diagnostics = Vec::new();
        let resolved = aliases.resolve_rows(InputTable::LapTimes, rows, |r| &r.vehicle, &mut diagnostics);

        let mut laps: BTreeMap<VehicleId, BTreeMap<u32, f64>> = BTreeMap::new();
        for (row_idx, id, row) in resolved {
            if row.lap == 0 {
                diagnostics.push(Diagnostic::InvalidValue {
                    table: InputTable::LapTimes,
                    row: row_idx,
                    field: "lap".to_string(),
                    reason: "lap numbers start at 1".to_string(),
                });
                continue;
            }
            if !row.lap_time_seconds.is_finite() || row.lap_time_seconds < 0.0 {
                diagnostics.push(Diagnostic::InvalidValue {
                    table: InputTable::LapTimes,
                    row: row_idx,
                    field: "lap_time_seconds".to_string(),
                    reason: format!("unusable lap time {}", row.lap_time_seconds),
                });
                continue;
            }

            let per_vehicle = laps.entry(id.clone()).or_default();
            if per_vehicle.contains_key(&row.lap) {
                diagnostics.push(Diagnostic::DuplicateLap {
                    vehicle_id: id,
                    lap: row.lap,
                });
                continue;
            }
            per_vehicle.insert(row.lap, row.lap_time_seconds);
        }

        let mut table = Self::default();
        for (id, per_vehicle) in laps {
            let mut expected = 1u32;
            for &lap in per_vehicle.keys() {
                if lap != expected {
                    diagnostics.push(Diagnostic::LapSequenceGap {
                        vehicle_id: id.clone(),
                        expected,
                        found: lap,
                    });
                }
                expected = lap.saturating_add(1);
            }
            let laps = per_vehicle
                .into_iter()
                .map(|(lap, seconds)| Lap { lap, seconds })
                .collect();
            table.laps.insert(id, laps);
        }

        debug!(vehicles = table.laps.len(), "lap table normalized");
        (table, diagnostics)
    }

    /// Laps of one vehicle, sorted by lap number.
    #[must_use]
    pub fn laps(&self, id: &VehicleId) -> &[Lap] {
        self.laps.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Sum of a vehicle's lap times, `None` when it has no laps.
    #[must_use]
    pub fn total_time(&self, id: &VehicleId) -> Option<f64> {
        let laps = self.laps.get(id)?;
        if laps.is_empty() {
            return None;
        }
        Some(laps.iter().map(|l| l.seconds).sum())
    }

    /// Number of valid laps recorded for a vehicle.
    #[must_use]
    pub fn lap_count(&self, id: &VehicleId) -> usize {
        self.laps(id).len()
    }

    /// Lap times of a vehicle's racing laps, in lap order.
    #[must_use]
    pub fn racing_laps(&self, id: &VehicleId, formation_lap_seconds: f64) -> Vec<f64> {
        self.laps(id)
            .iter()
            .filter(|l| LapType::classify(l.seconds, formation_lap_seconds) == LapType::Racing)
            .map(|l| l.seconds)
            .collect()
    }

    /// Highest lap number across the field.
    #[must_use]
    pub fn max_lap(&self) -> Option<u32> {
        self.laps.values().filter_map(|laps| laps.last()).map(|l| l.lap).max()
    }

    /// Vehicles with at least one lap, in id order.
    pub fn vehicles(&self) -> impl Iterator<Item = &VehicleId> {
        self.laps.keys()
    }

    /// Iterates `(vehicle, laps)` in id order.
    pub fn iter(&self) -> impl Iterator<Item = (&VehicleId, &[Lap])> {
        self.laps.iter().map(|(id, laps)| (id, laps.as_slice()))
    }

    /// True if no lap survived normalization.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.laps.is_empty()
    }
}
