//! Side-by-side comparison of scenarios for one driver.

use rayon::prelude::*;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use tracing::debug;

use crate::config::AnalysisConfig;
use crate::error::DriverNotFoundError;
use crate::event::{EventCatalog, EventId};
use crate::identity::{AliasTable, VehicleId};
use crate::input::ResultRow;
use crate::laps::LapTable;

use super::counterfactual::{simulate, AdjustedResults};

/// A labelled selection of events to remove.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scenario {
    /// Label used as the key in comparison reports.
    pub label: String,
    /// Events to remove.
    pub remove: Vec<EventId>,
}

impl Scenario {
    /// Creates a scenario.
    #[must_use]
    pub fn new(label: impl Into<String>, remove: Vec<EventId>) -> Self {
        Self {
            label: label.into(),
            remove,
        }
    }
}

/// One driver's figures under one scenario.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScenarioOutcome {
    /// Adjusted total time.
    pub total_time: f64,
    /// Adjusted position.
    pub position: u32,
    /// Time gained against the untouched total.
    pub time_gain: f64,
}

/// Per-scenario figures for one driver, in caller order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonReport {
    /// Driver compared.
    pub driver_id: VehicleId,
    /// `(label, outcome)` pairs, serialized as an object keyed by label.
    #[serde(serialize_with = "ordered_map")]
    pub scenarios: Vec<(String, ScenarioOutcome)>,
}

impl ComparisonReport {
    /// Looks a scenario up by label.
    #[must_use]
    pub fn get(&self, label: &str) -> Option<&ScenarioOutcome> {
        self.scenarios
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, outcome)| outcome)
    }

    /// Labels in caller order.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.scenarios.iter().map(|(l, _)| l.as_str())
    }
}

fn ordered_map<S: Serializer>(
    scenarios: &[(String, ScenarioOutcome)],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(scenarios.len()))?;
    for (label, outcome) in scenarios {
        map.serialize_entry(label, outcome)?;
    }
    map.end()
}

/// Extracts one driver's figures from each scenario.
///
/// A label given twice keeps its first position and the later figures.
pub fn compare(
    scenarios: &[(&str, &AdjustedResults)],
    driver: &VehicleId,
) -> Result<ComparisonReport, DriverNotFoundError> {
    let mut out: Vec<(String, ScenarioOutcome)> = Vec::with_capacity(scenarios.len());
    for (label, results) in scenarios {
        let entry = results.get(driver).ok_or_else(|| DriverNotFoundError {
            driver_id: driver.clone(),
            scenario: (*label).to_string(),
        })?;
        let outcome = ScenarioOutcome {
            total_time: entry.adjusted_total_time,
            position: entry.adjusted_position,
            time_gain: entry.original_total_time - entry.adjusted_total_time,
        };
        match out.iter_mut().find(|(l, _)| l == label) {
            Some(slot) => slot.1 = outcome,
            None => out.push(((*label).to_string(), outcome)),
        }
    }
    Ok(ComparisonReport {
        driver_id: driver.clone(),
        scenarios: out,
    })
}

/// Runs independent scenarios in parallel, returning `(label, results)` in
/// the order given.
#[must_use]
pub fn simulate_scenarios(
    laps: &LapTable,
    catalog: &EventCatalog,
    results: &[ResultRow],
    aliases: &AliasTable,
    config: &AnalysisConfig,
    scenarios: &[Scenario],
) -> Vec<(String, AdjustedResults)> {
    let out: Vec<(String, AdjustedResults)> = scenarios
        .par_iter()
        .map(|s| {
            let adjusted = simulate(laps, catalog, &s.remove, results, aliases, config);
            (s.label.clone(), adjusted)
        })
        .collect();
    debug!(scenarios = out.len(), "scenario batch simulated");
    out
}
