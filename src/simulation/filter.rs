//! Event selection for counterfactual scenarios.

use crate::error::InvalidFilterError;
use crate::event::{Event, EventCatalog, EventId};
use crate::identity::VehicleId;

/// Criteria an event must meet to be removed. Every supplied criterion must
/// match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilter {
    /// Owning vehicle.
    pub vehicle_id: Option<VehicleId>,
    /// Event type.
    pub event_type: Option<String>,
    /// Role tag.
    pub role: Option<String>,
}

impl EventFilter {
    /// Creates an empty filter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts to one vehicle.
    #[must_use]
    pub fn vehicle(mut self, vehicle_id: impl Into<VehicleId>) -> Self {
        self.vehicle_id = Some(vehicle_id.into());
        self
    }

    /// Restricts to one event type.
    #[must_use]
    pub fn event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = Some(event_type.into());
        self
    }

    /// Restricts to one role tag.
    #[must_use]
    pub fn role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    /// Validate the filter.
    ///
    /// An empty filter would select every event in the race.
    pub fn validate(&self) -> Result<(), InvalidFilterError> {
        if self.vehicle_id.is_none() && self.event_type.is_none() && self.role.is_none() {
            return Err(InvalidFilterError::NoFilters);
        }
        let blank = |field: &str| InvalidFilterError::BlankValue {
            field: field.to_string(),
        };
        if self.vehicle_id.as_ref().is_some_and(|v| v.as_str().is_empty()) {
            return Err(blank("vehicle_id"));
        }
        if self.event_type.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err(blank("event_type"));
        }
        if self.role.as_deref().is_some_and(|r| r.trim().is_empty()) {
            return Err(blank("role"));
        }
        Ok(())
    }

    /// True if the event meets every criterion.
    #[must_use]
    pub fn matches(&self, event: &Event) -> bool {
        self.vehicle_id.as_ref().map_or(true, |v| &event.vehicle_id == v)
            && self
                .event_type
                .as_deref()
                .map_or(true, |t| event.event_type == t.trim())
            && self
                .role
                .as_deref()
                .map_or(true, |r| event.role.as_deref() == Some(r.trim()))
    }
}

/// Returns the catalog events matching every criterion of `filter`, in
/// catalog order.
pub fn filter_events_for_removal<'a>(
    catalog: &'a EventCatalog,
    filter: &EventFilter,
) -> Result<Vec<&'a Event>, InvalidFilterError> {
    filter.validate()?;
    Ok(catalog.events().iter().filter(|e| filter.matches(e)).collect())
}

/// Ids of the given events, ready to pass to [`simulate`](super::simulate).
#[must_use]
pub fn event_ids(events: &[&Event]) -> Vec<EventId> {
    events.iter().map(|e| e.event_id.clone()).collect()
}
