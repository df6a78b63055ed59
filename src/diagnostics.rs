//! Diagnostics returned alongside every computed result.
//!
//! Per-row anomalies are explicit records, not hidden errors: a run that
//! excludes an unresolvable row or omits an optional section says so here.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::event::EventId;
use crate::identity::VehicleId;

/// The input table a diagnostic refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputTable {
    Results,
    ClassResults,
    LapTimes,
    LapAggregates,
    TelemetryAggregates,
    DriverAggregates,
    Events,
    Sectors,
    Weather,
    BestLaps,
}

impl fmt::Display for InputTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Results => "results",
            Self::ClassResults => "class_results",
            Self::LapTimes => "lap_times",
            Self::LapAggregates => "lap_aggregates",
            Self::TelemetryAggregates => "telemetry_aggregates",
            Self::DriverAggregates => "driver_aggregates",
            Self::Events => "events",
            Self::Sectors => "sectors",
            Self::Weather => "weather",
            Self::BestLaps => "best_laps",
        };
        f.write_str(name)
    }
}

/// A single non-fatal anomaly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// A row's vehicle alias could not be resolved; the row was excluded.
    UnresolvedIdentity {
        /// Table the row came from.
        table: InputTable,
        /// Zero-based row index within that table.
        row: usize,
        /// Resolution failure.
        reason: String,
    },

    /// An optional input was not supplied; its output section is omitted.
    OptionalInputAbsent {
        /// The missing table.
        table: InputTable,
    },

    /// A value was present but unusable (negative lap time, bad clock string).
    InvalidValue {
        /// Table the value came from.
        table: InputTable,
        /// Zero-based row index within that table.
        row: usize,
        /// Column name.
        field: String,
        /// What was wrong.
        reason: String,
    },

    /// A status token is not in the configured status map.
    UnknownStatus {
        /// Vehicle carrying the token.
        vehicle_id: VehicleId,
        /// The raw token.
        raw: String,
    },

    /// Lap numbering for a vehicle skips one or more laps.
    LapSequenceGap {
        /// Affected vehicle.
        vehicle_id: VehicleId,
        /// Lap number that was expected next.
        expected: u32,
        /// Lap number that was found instead.
        found: u32,
    },

    /// A `(vehicle, lap)` pair appeared more than once; the first row was kept.
    DuplicateLap {
        /// Affected vehicle.
        vehicle_id: VehicleId,
        /// Duplicated lap number.
        lap: u32,
    },

    /// A vehicle appears in an input table but not in the official results.
    UnclassifiedVehicle {
        /// Vehicle missing from results.
        vehicle_id: VehicleId,
        /// Table it was found in.
        table: InputTable,
    },

    /// A vehicle has no lap records, so no total time can be computed.
    NoLapData {
        /// Affected vehicle.
        vehicle_id: VehicleId,
    },

    /// A classified vehicle has no valid samples for a sector.
    MissingSectorData {
        /// Affected vehicle.
        vehicle_id: VehicleId,
        /// Sector with no samples.
        sector: String,
    },

    /// An event selected for removal is not part of the event catalog.
    UnknownEvent {
        /// The unknown id.
        event_id: EventId,
    },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnresolvedIdentity { table, row, reason } => {
                write!(f, "{table}[{row}]: unresolved vehicle ({reason})")
            }
            Self::OptionalInputAbsent { table } => write!(f, "{table}: not supplied"),
            Self::InvalidValue {
                table,
                row,
                field,
                reason,
            } => write!(f, "{table}[{row}].{field}: {reason}"),
            Self::UnknownStatus { vehicle_id, raw } => {
                write!(f, "{vehicle_id}: unknown status '{raw}'")
            }
            Self::LapSequenceGap {
                vehicle_id,
                expected,
                found,
            } => write!(f, "{vehicle_id}: expected lap {expected}, found {found}"),
            Self::DuplicateLap { vehicle_id, lap } => {
                write!(f, "{vehicle_id}: duplicate lap {lap}")
            }
            Self::UnclassifiedVehicle { vehicle_id, table } => {
                write!(f, "{vehicle_id}: present in {table} but not in results")
            }
            Self::NoLapData { vehicle_id } => write!(f, "{vehicle_id}: no lap data"),
            Self::MissingSectorData { vehicle_id, sector } => {
                write!(f, "{vehicle_id}: no valid {sector} samples")
            }
            Self::UnknownEvent { event_id } => write!(f, "event {event_id} not in catalog"),
        }
    }
}

/// Ordered collection of diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Diagnostics(Vec<Diagnostic>);

impl Diagnostics {
    /// Creates an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a diagnostic.
    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.0.push(diagnostic);
    }

    /// Number of recorded diagnostics.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates in recording order.
    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.0.iter()
    }

    /// True if any recorded diagnostic satisfies `pred`.
    pub fn any(&self, pred: impl Fn(&Diagnostic) -> bool) -> bool {
        self.0.iter().any(pred)
    }

    /// Consumes the collection.
    #[must_use]
    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.0
    }
}

impl Extend<Diagnostic> for Diagnostics {
    fn extend<T: IntoIterator<Item = Diagnostic>>(&mut self, iter: T) {
        self.0.extend(iter);
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
