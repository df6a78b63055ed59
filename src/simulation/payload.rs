//! What-if payloads: one driver's outcome under one scenario.

use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::AnalysisConfig;
use crate::error::{DriverNotFoundError, InvalidFilterError};
use crate::event::{Event, EventCatalog};
use crate::identity::{AliasTable, VehicleId};
use crate::input::ResultRow;
use crate::laps::LapTable;

use super::counterfactual::{baseline, simulate, AdjustedResults};
use super::filter::{event_ids, filter_events_for_removal, EventFilter};

/// Direction of the position change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultImprovement {
    /// Gained positions.
    Improved,
    /// Same position.
    Unchanged,
    /// Lost positions.
    Worsened,
}

impl ResultImprovement {
    /// Classifies a position change (positive means places gained).
    #[must_use]
    pub fn from_change(change: i64) -> Self {
        match change {
            c if c > 0 => Self::Improved,
            0 => Self::Unchanged,
            _ => Self::Worsened,
        }
    }
}

/// One driver's outcome under a scenario, relative to the original field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhatIfPayload {
    /// Scenario label.
    pub scenario: String,
    /// Driver the payload is about.
    pub driver_id: VehicleId,
    /// Total time in the original field.
    pub original_time_seconds: f64,
    /// Total time under the scenario.
    pub adjusted_time_seconds: f64,
    /// `original - adjusted`.
    pub time_gain_seconds: f64,
    /// Gain as a percentage of the original time; 0 for a non-positive
    /// original time.
    pub time_gain_percent: f64,
    /// Position in the original field.
    pub original_position: u32,
    /// Position under the scenario.
    pub adjusted_position: u32,
    /// `original_position - adjusted_position`.
    pub position_change: i64,
    /// Direction of `position_change`.
    pub result_improvement: ResultImprovement,
}

/// Builds the payload for `driver` from the original and adjusted fields.
///
/// Positions come from each field's ranking, so both sides are ranked by the
/// same rule.
pub fn build_what_if_payload(
    driver: &VehicleId,
    label: &str,
    original: &AdjustedResults,
    adjusted: &AdjustedResults,
) -> Result<WhatIfPayload, DriverNotFoundError> {
    let missing = |scenario: &str| DriverNotFoundError {
        driver_id: driver.clone(),
        scenario: scenario.to_string(),
    };
    let before = original.get(driver).ok_or_else(|| missing("original"))?;
    let after = adjusted.get(driver).ok_or_else(|| missing(label))?;

    let original_time = before.adjusted_total_time;
    let adjusted_time = after.adjusted_total_time;
    let gain = original_time - adjusted_time;
    let position_change = i64::from(before.adjusted_position) - i64::from(after.adjusted_position);

    Ok(WhatIfPayload {
        scenario: label.to_string(),
        driver_id: driver.clone(),
        original_time_seconds: original_time,
        adjusted_time_seconds: adjusted_time,
        time_gain_seconds: gain,
        time_gain_percent: if original_time > 0.0 {
            gain / original_time * 100.0
        } else {
            0.0
        },
        original_position: before.adjusted_position,
        adjusted_position: after.adjusted_position,
        position_change,
        result_improvement: ResultImprovement::from_change(position_change),
    })
}

/// For every vehicle owning at least one event with `role`, removes only that
/// vehicle's events of that role and evaluates the result against the
/// unmodified field.
///
/// Each vehicle is simulated in isolation; other vehicles keep their losses.
pub fn simulate_event_removal_by_role(
    laps: &LapTable,
    catalog: &EventCatalog,
    results: &[ResultRow],
    aliases: &AliasTable,
    config: &AnalysisConfig,
    role: &str,
) -> Result<BTreeMap<VehicleId, WhatIfPayload>, InvalidFilterError> {
    let tagged = filter_events_for_removal(catalog, &EventFilter::new().role(role))?;
    let mut by_vehicle: BTreeMap<&VehicleId, Vec<&Event>> = BTreeMap::new();
    for event in tagged {
        by_vehicle.entry(&event.vehicle_id).or_default().push(event);
    }

    let original = baseline(laps, catalog, results, aliases, config);
    let label = format!("Remove all {} events", role.trim());

    let payloads: Vec<(VehicleId, Result<WhatIfPayload, DriverNotFoundError>)> = by_vehicle
        .into_par_iter()
        .map(|(vehicle, events)| {
            let adjusted = simulate(laps, catalog, &event_ids(&events), results, aliases, config);
            let payload = build_what_if_payload(vehicle, &label, &original, &adjusted);
            (vehicle.clone(), payload)
        })
        .collect();

    let mut out = BTreeMap::new();
    for (vehicle, payload) in payloads {
        match payload {
            Ok(p) => {
                out.insert(vehicle, p);
            }
            Err(err) => warn!(vehicle = %vehicle, error = %err, "skipping vehicle without lap data"),
        }
    }
    debug!(role, vehicles = out.len(), "role removal simulated");
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventRecord;
    use crate::input::LapRow;

    fn field() -> (Vec<ResultRow>, AliasTable, LapTable, EventCatalog) {
        let results = vec![
            ResultRow::vehicle("A").with_number(1).with_position(1),
            ResultRow::vehicle("B").with_number(2).with_position(2),
            ResultRow::vehicle("C").with_number(3).with_position(3),
        ];
        let (aliases, _) = AliasTable::from_results(&results);
        let laps = vec![
            LapRow::new(1u32, 1, 100.0),
            LapRow::new(2u32, 1, 105.0),
            LapRow::new(3u32, 1, 110.0),
        ];
        let (laps, _) = LapTable::from_rows(&laps, &aliases);
        let records = vec![
            EventRecord::new(3u32, 1, "spin", 12.0).with_role("race_turning_point"),
            EventRecord::new(2u32, 1, "lockup", 6.0).with_role("race_turning_point"),
            EventRecord::new(1u32, 1, "lockup", 1.0),
        ];
        let (catalog, _) = EventCatalog::from_records(&records, &aliases);
        (results, aliases, laps, catalog)
    }

    #[test]
    fn payload_reports_gain_and_positions() {
        let (results, aliases, laps, catalog) = field();
        let config = AnalysisConfig::default();
        let original = baseline(&laps, &catalog, &results, &aliases, &config);
        let spin = filter_events_for_removal(&catalog, &EventFilter::new().event_type("spin")).unwrap();
        let adjusted = simulate(&laps, &catalog, &event_ids(&spin), &results, &aliases, &config);

        let p = build_what_if_payload(&VehicleId::new("C"), "no spin", &original, &adjusted).unwrap();
        assert_eq!(p.time_gain_seconds, 12.0);
        assert_eq!(p.original_position, 3);
        assert_eq!(p.adjusted_position, 1);
        assert_eq!(p.position_change, 2);
        assert_eq!(p.result_improvement, ResultImprovement::Improved);

        let a = build_what_if_payload(&VehicleId::new("A"), "no spin", &original, &adjusted).unwrap();
        assert_eq!(a.result_improvement, ResultImprovement::Worsened);
        assert_eq!(a.time_gain_percent, 0.0);
    }

    #[test]
    fn missing_driver_is_an_error() {
        let (results, aliases, laps, catalog) = field();
        let config = AnalysisConfig::default();
        let original = baseline(&laps, &catalog, &results, &aliases, &config);
        let err = build_what_if_payload(&VehicleId::new("Z"), "x", &original, &original).unwrap_err();
        assert_eq!(err.driver_id.as_str(), "Z");
        assert_eq!(err.scenario, "original");
    }

    #[test]
    fn improvement_serializes_lowercase() {
        let json = serde_json::to_string(&ResultImprovement::Unchanged).unwrap();
        assert_eq!(json, "\"unchanged\"");
    }

    #[test]
    fn role_removal_is_evaluated_per_vehicle() {
        let (results, aliases, laps, catalog) = field();
        let payloads = simulate_event_removal_by_role(
            &laps,
            &catalog,
            &results,
            &aliases,
            &AnalysisConfig::default(),
            "race_turning_point",
        )
        .unwrap();
        assert_eq!(payloads.len(), 2);

        // B alone: 99 beats A's untouched 100.
        let b = &payloads[&VehicleId::new("B")];
        assert_eq!(b.adjusted_time_seconds, 99.0);
        assert_eq!(b.adjusted_position, 1);

        // C alone: 98 against A 100 and B 105, not B's adjusted 99.
        let c = &payloads[&VehicleId::new("C")];
        assert_eq!(c.adjusted_position, 1);
        assert_eq!(c.position_change, 2);
        assert_eq!(c.scenario, "Remove all race_turning_point events");
    }

    #[test]
    fn role_removal_rejects_blank_role() {
        let (results, aliases, laps, catalog) = field();
        let err = simulate_event_removal_by_role(
            &laps,
            &catalog,
            &results,
            &aliases,
            &AnalysisConfig::default(),
            " ",
        )
        .unwrap_err();
        assert!(matches!(err, InvalidFilterError::BlankValue { .. }));
    }
}
