//! Adjusted race totals and re-ranking.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::AnalysisConfig;
use crate::diagnostics::Diagnostic;
use crate::event::{EventCatalog, EventId};
use crate::identity::{AliasTable, VehicleId};
use crate::input::ResultRow;
use crate::laps::LapTable;

use super::RankingRule;

/// One vehicle's outcome under a scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdjustedEntry {
    /// Canonical id.
    pub vehicle_id: VehicleId,
    /// Sum of lap times.
    pub original_total_time: f64,
    /// Time loss removed by the scenario.
    pub removed_loss: f64,
    /// `original_total_time - removed_loss`.
    pub adjusted_total_time: f64,
    /// Valid laps recorded.
    pub laps_completed: usize,
    /// Official finishing position.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_position: Option<u32>,
    /// Position after re-ranking, 1-based.
    pub adjusted_position: u32,
}

/// A re-ranked field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdjustedResults {
    /// Entries in adjusted finishing order.
    pub entries: Vec<AdjustedEntry>,
    /// Vehicles left out and unknown event ids.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}

impl AdjustedResults {
    /// Looks a vehicle up.
    #[must_use]
    pub fn get(&self, id: &VehicleId) -> Option<&AdjustedEntry> {
        self.entries.iter().find(|e| &e.vehicle_id == id)
    }

    /// Adjusted positions keyed by vehicle.
    #[must_use]
    pub fn positions(&self) -> BTreeMap<VehicleId, u32> {
        self.entries
            .iter()
            .map(|e| (e.vehicle_id.clone(), e.adjusted_position))
            .collect()
    }

    /// Number of ranked vehicles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no vehicle was ranked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn official_positions(results: &[ResultRow], aliases: &AliasTable) -> BTreeMap<VehicleId, u32> {
    results
        .iter()
        .filter_map(|row| Some((aliases.resolve_result(row).ok()?, row.position?)))
        .collect()
}

fn rank(a: &AdjustedEntry, b: &AdjustedEntry, rule: RankingRule) -> Ordering {
    let laps = match rule {
        RankingRule::TotalTime => Ordering::Equal,
        RankingRule::LapsThenTime => b.laps_completed.cmp(&a.laps_completed),
    };
    laps.then_with(|| a.adjusted_total_time.total_cmp(&b.adjusted_total_time))
        .then_with(|| match (a.original_position, b.original_position) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| a.vehicle_id.cmp(&b.vehicle_id))
}

/// Removes the time loss of the selected events and re-ranks the field.
///
/// Every vehicle with lap data is ranked; results vehicles without laps are
/// left out and reported. Selected ids missing from the catalog are reported
/// and otherwise ignored; an id selected twice is removed once.
#[must_use]
pub fn simulate(
    laps: &LapTable,
    catalog: &EventCatalog,
    remove: &[EventId],
    results: &[ResultRow],
    aliases: &AliasTable,
    config: &AnalysisConfig,
) -> AdjustedResults {
    let mut diagnostics = Vec::new();
    let selected: BTreeSet<&EventId> = remove.iter().collect();

    let mut removed: BTreeMap<&VehicleId, f64> = BTreeMap::new();
    for id in &selected {
        match catalog.get(id) {
            Some(event) => {
                *removed.entry(&event.vehicle_id).or_insert(0.0) += event.time_loss_estimate;
            }
            None => diagnostics.push(Diagnostic::UnknownEvent {
                event_id: (*id).clone(),
            }),
        }
    }

    let positions = official_positions(results, aliases);
    for id in aliases.vehicles().filter(|id| laps.lap_count(id) == 0) {
        diagnostics.push(Diagnostic::NoLapData {
            vehicle_id: id.clone(),
        });
    }

    let mut entries: Vec<AdjustedEntry> = laps
        .iter()
        .map(|(id, vehicle_laps)| {
            let original_total_time: f64 = vehicle_laps.iter().map(|l| l.seconds).sum();
            let removed_loss = removed.get(id).copied().unwrap_or(0.0);
            AdjustedEntry {
                vehicle_id: id.clone(),
                original_total_time,
                removed_loss,
                adjusted_total_time: original_total_time - removed_loss,
                laps_completed: vehicle_laps.len(),
                original_position: positions.get(id).copied(),
                adjusted_position: 0,
            }
        })
        .collect();

    entries.sort_by(|a, b| rank(a, b, config.ranking));
    for (position, entry) in (1u32..).zip(entries.iter_mut()) {
        entry.adjusted_position = position;
    }

    debug!(
        vehicles = entries.len(),
        removed_events = selected.len(),
        "scenario simulated"
    );

    AdjustedResults {
        entries,
        diagnostics,
    }
}

/// The unmodified field: [`simulate`] with nothing removed.
#[must_use]
pub fn baseline(
    laps: &LapTable,
    catalog: &EventCatalog,
    results: &[ResultRow],
    aliases: &AliasTable,
    config: &AnalysisConfig,
) -> AdjustedResults {
    simulate(laps, catalog, &[], results, aliases, config)
}
