//! Event catalog.
//!
//! Events (lockups, understeer, pace collapses, ...) are detected upstream and
//! are immutable to the core: it only reads, filters and sums their estimated
//! time loss.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::diagnostics::{Diagnostic, InputTable};
use crate::identity::{AliasTable, VehicleId, VehicleRef};

/// Namespace for ids derived from event content.
const EVENT_ID_NAMESPACE: Uuid = Uuid::from_u128(0x6b1f_0e52_58a4_4c1e_9d0b_7e3a_2f41_c8d5);

/// Stable event identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(String);

impl EventId {
    /// Wraps an upstream id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Derives a deterministic id from event content.
    ///
    /// The ordinal disambiguates otherwise identical events of one vehicle.
    #[must_use]
    pub fn derive(vehicle: &VehicleId, lap: u32, event_type: &str, ordinal: usize) -> Self {
        let name = format!("{vehicle}|{lap}|{event_type}|{ordinal}");
        Self(Uuid::new_v5(&EVENT_ID_NAMESPACE, name.as_bytes()).to_string())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An event row as produced by the detection stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Upstream id, when the detector assigned one.
    #[serde(default)]
    pub event_id: Option<String>,
    /// Vehicle as listed by the detector.
    pub vehicle: VehicleRef,
    /// Lap the event happened on.
    pub lap: u32,
    /// Event type (`lockup`, `understeer`, `pace_collapse`, ...).
    pub event_type: String,
    /// Severity score.
    #[serde(default)]
    pub severity: f64,
    /// Estimated time lost to the event, in seconds.
    #[serde(default, alias = "time_loss")]
    pub time_loss_estimate: f64,
    /// Narrative role (`race_turning_point`, `major_mistake`, ...).
    #[serde(default)]
    pub role: Option<String>,
    /// When the event happened.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    /// Free-text description.
    #[serde(default)]
    pub description: Option<String>,
    /// Event-specific measurements (steering correction, lateral G spike, ...).
    #[serde(default)]
    pub metrics: BTreeMap<String, f64>,
}

impl EventRecord {
    /// Creates an event record with no role, metrics or timestamp.
    #[must_use]
    pub fn new(
        vehicle: impl Into<VehicleRef>,
        lap: u32,
        event_type: impl Into<String>,
        time_loss_estimate: f64,
    ) -> Self {
        Self {
            event_id: None,
            vehicle: vehicle.into(),
            lap,
            event_type: event_type.into(),
            severity: 0.0,
            time_loss_estimate,
            role: None,
            timestamp: None,
            description: None,
            metrics: BTreeMap::new(),
        }
    }

    /// Sets the upstream id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.event_id = Some(id.into());
        self
    }

    /// Sets the role tag.
    #[must_use]
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    /// Sets the severity.
    #[must_use]
    pub fn with_severity(mut self, severity: f64) -> Self {
        self.severity = severity;
        self
    }
}

/// A catalogued event attributed to a canonical vehicle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Stable id.
    pub event_id: EventId,
    /// Canonical vehicle.
    pub vehicle_id: VehicleId,
    /// Lap number.
    pub lap: u32,
    /// Event type.
    pub event_type: String,
    /// Severity score.
    pub severity: f64,
    /// Estimated time lost, in seconds.
    pub time_loss_estimate: f64,
    /// Narrative role tag.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// When the event happened.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    /// Free-text description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Event-specific measurements.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub metrics: BTreeMap<String, f64>,
}

/// The race's events, in detection order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventCatalog {
    events: Vec<Event>,
}

impl EventCatalog {
    /// Builds the catalog from detector rows.
    ///
    /// Rows with an unresolvable vehicle are excluded; rows with a non-finite
    /// time loss are kept with a zero loss and reported. Events without an
    /// upstream id get a deterministic derived id.
    #[must_use]
    pub fn from_records(records: &[EventRecord], aliases: &AliasTable) -> (Self, Vec<Diagnostic>) {
        let mut diagnostics = Vec::new();
        let resolved = aliases.resolve_rows(InputTable::Events, records, |r| &r.vehicle, &mut diagnostics);

        let mut seen: BTreeSet<EventId> = BTreeSet::new();
        let mut ordinals: BTreeMap<(VehicleId, u32, String), usize> = BTreeMap::new();
        let mut events = Vec::with_capacity(resolved.len());

        for (row_idx, vehicle_id, record) in resolved {
            let time_loss_estimate = if record.time_loss_estimate.is_finite() {
                record.time_loss_estimate
            } else {
                diagnostics.push(Diagnostic::InvalidValue {
                    table: InputTable::Events,
                    row: row_idx,
                    field: "time_loss_estimate".to_string(),
                    reason: "not a finite number; treated as 0".to_string(),
                });
                0.0
            };

            let ordinal = ordinals
                .entry((vehicle_id.clone(), record.lap, record.event_type.clone()))
                .or_insert(0);
            let derived = EventId::derive(&vehicle_id, record.lap, &record.event_type, *ordinal);
            *ordinal += 1;

            let event_id = match record.event_id.as_deref().map(str::trim) {
                Some(id) if !id.is_empty() => EventId::new(id),
                _ => derived,
            };
            if !seen.insert(event_id.clone()) {
                diagnostics.push(Diagnostic::InvalidValue {
                    table: InputTable::Events,
                    row: row_idx,
                    field: "event_id".to_string(),
                    reason: format!("duplicate event id {event_id}; row skipped"),
                });
                continue;
            }

            events.push(Event {
                event_id,
                vehicle_id,
                lap: record.lap,
                event_type: record.event_type.clone(),
                severity: if record.severity.is_finite() { record.severity } else { 0.0 },
                time_loss_estimate,
                role: record
                    .role
                    .as_deref()
                    .map(str::trim)
                    .filter(|r| !r.is_empty())
                    .map(str::to_string),
                timestamp: record.timestamp,
                description: record.description.clone(),
                metrics: record.metrics.clone(),
            });
        }

        debug!(events = events.len(), "event catalog built");
        (Self { events }, diagnostics)
    }

    /// Creates a catalog from already-resolved events.
    #[must_use]
    pub fn from_events(events: Vec<Event>) -> Self {
        Self { events }
    }

    /// All events, in detection order.
    #[must_use]
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Events of one vehicle, in detection order.
    pub fn for_vehicle<'a>(&'a self, id: &'a VehicleId) -> impl Iterator<Item = &'a Event> + 'a {
        self.events.iter().filter(move |e| &e.vehicle_id == id)
    }

    /// Looks an event up by id.
    #[must_use]
    pub fn get(&self, id: &EventId) -> Option<&Event> {
        self.events.iter().find(|e| &e.event_id == id)
    }

    /// Total estimated time loss per vehicle.
    #[must_use]
    pub fn loss_by_vehicle(&self) -> BTreeMap<VehicleId, f64> {
        let mut totals = BTreeMap::new();
        for event in &self.events {
            *totals.entry(event.vehicle_id.clone()).or_insert(0.0) += event.time_loss_estimate;
        }
        totals
    }

    /// Number of events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// True if the catalog holds no events.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
