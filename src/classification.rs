//! Classification insight engine.
//!
//! Combines the official results, class results and best-lap tables into a
//! per-vehicle classification record (position, status, peak pace) plus a
//! race-level summary (winner, fastest lap, class winners).

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::AnalysisConfig;
use crate::diagnostics::{Diagnostic, InputTable};
use crate::identity::{identity_diagnostic, AliasTable, VehicleId};
use crate::input::{BestLapsRow, ClassResultRow, ResultRow};
use crate::laps::LapTable;
use crate::stats;
use crate::time::TimeValue;

/// Normalized finishing status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FinishStatus {
    /// Took the chequered flag.
    Finished,
    /// Started but did not finish.
    Retired,
    /// Did not start.
    #[serde(rename = "DNS")]
    Dns,
    /// Disqualified.
    #[serde(rename = "DSQ")]
    Dsq,
    /// Absent or unrecognized status token.
    Unknown,
}

impl FinishStatus {
    /// True if the vehicle took the start.
    #[must_use]
    pub fn started(self) -> bool {
        self != Self::Dns
    }
}

impl fmt::Display for FinishStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Finished => "Finished",
            Self::Retired => "Retired",
            Self::Dns => "DNS",
            Self::Dsq => "DSQ",
            Self::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

/// Spread of a set of lap times.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaceConsistency {
    /// Mean lap time.
    pub mean_lap_time: f64,
    /// Population standard deviation.
    pub std_dev: f64,
    /// Fastest lap.
    pub min_lap_time: f64,
    /// Slowest lap.
    pub max_lap_time: f64,
    /// `std_dev / mean_lap_time`.
    pub coefficient_of_variation: f64,
}

/// Describes the spread of lap times, ignoring non-positive or non-finite
/// entries. `None` when nothing usable remains.
#[must_use]
pub fn pace_consistency(times: &[f64]) -> Option<PaceConsistency> {
    let clean: Vec<f64> = times
        .iter()
        .copied()
        .filter(|t| t.is_finite() && *t > 0.0)
        .collect();
    let mean = stats::mean(&clean)?;
    let std_dev = stats::population_std(&clean)?;
    Some(PaceConsistency {
        mean_lap_time: mean,
        std_dev,
        min_lap_time: stats::min(&clean)?,
        max_lap_time: stats::max(&clean)?,
        coefficient_of_variation: std_dev / mean,
    })
}

/// Mean of the rolling three-lap standard deviation of lap-to-lap pace
/// changes; lower is steadier. `times` are lap times in lap order.
///
/// The first window holds a single change and contributes nothing, so at
/// least three laps are needed.
#[must_use]
pub fn pace_stability_index(times: &[f64]) -> Option<f64> {
    let deltas: Vec<f64> = times.windows(2).map(|w| w[1] - w[0]).collect();
    let rolling: Vec<f64> = (0..deltas.len())
        .filter_map(|i| stats::sample_std(&deltas[i.saturating_sub(2)..=i]))
        .collect();
    stats::mean(&rolling)
}

/// Classification record of one vehicle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationInsight {
    /// Overall finishing position.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<u32>,
    /// Laps completed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub laps_completed: Option<u32>,
    /// Competition class.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    /// Group within the class.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    /// Position within the class.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_position: Option<u32>,
    /// Normalized status.
    pub status: FinishStatus,
    /// Status token as published.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_raw: Option<String>,
    /// Mean of the fastest laps.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peak_pace_seconds: Option<f64>,
    /// Number of laps averaged into `peak_pace_seconds`.
    pub peak_pace_laps: usize,
    /// Share of the field with a slower peak pace, in percent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pace_percentile: Option<f64>,
    /// Published fastest lap, in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fastest_lap_seconds: Option<f64>,
    /// Gap to the winner as published.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gap_to_first: Option<String>,
    /// Spread of the laps peak pace was drawn from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pace_consistency: Option<PaceConsistency>,
}

/// Fastest lap of the race.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FastestLap {
    /// Vehicle that set it.
    pub vehicle_id: VehicleId,
    /// Lap time in seconds.
    pub seconds: f64,
}

/// Race-level classification summary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassificationSummary {
    /// Vehicles listed in the results.
    pub entries: usize,
    /// Entries that took the start.
    pub starters: usize,
    /// Overall winner.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winner: Option<VehicleId>,
    /// Fastest lap of the race.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fastest_lap: Option<FastestLap>,
    /// Winner of each class.
    pub class_winners: BTreeMap<String, VehicleId>,
}

/// Output of [`compute_classification`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassificationAnalysis {
    /// Race-level summary.
    pub summary: ClassificationSummary,
    /// Record per results vehicle.
    pub per_vehicle: BTreeMap<VehicleId, ClassificationInsight>,
    /// Per-row anomalies.
    pub diagnostics: Vec<Diagnostic>,
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn best_lap_times(
    rows: &[BestLapsRow],
    aliases: &AliasTable,
    diagnostics: &mut Vec<Diagnostic>,
) -> BTreeMap<VehicleId, Vec<f64>> {
    let mut by_vehicle: BTreeMap<VehicleId, Vec<f64>> = BTreeMap::new();
    let resolved = aliases.resolve_rows(InputTable::BestLaps, rows, |r| &r.vehicle, diagnostics);
    for (row_idx, id, row) in resolved {
        let times = by_vehicle.entry(id).or_default();
        for value in &row.best_laps {
            match value.seconds() {
                Ok(t) if t > 0.0 => times.push(t),
                Ok(t) => diagnostics.push(Diagnostic::InvalidValue {
                    table: InputTable::BestLaps,
                    row: row_idx,
                    field: "best_laps".to_string(),
                    reason: format!("unusable lap time {t}"),
                }),
                Err(err) => diagnostics.push(Diagnostic::InvalidValue {
                    table: InputTable::BestLaps,
                    row: row_idx,
                    field: "best_laps".to_string(),
                    reason: err.to_string(),
                }),
            }
        }
    }
    for times in by_vehicle.values_mut() {
        times.sort_by(f64::total_cmp);
    }
    by_vehicle
}

fn percentiles(paces: &BTreeMap<VehicleId, f64>) -> BTreeMap<VehicleId, f64> {
    let n = paces.len();
    paces
        .iter()
        .map(|(id, &own)| {
            if n == 1 {
                return (id.clone(), 100.0);
            }
            let slower = paces.values().filter(|&&other| other > own).count();
            #[allow(clippy::cast_precision_loss)]
            let pct = 100.0 * slower as f64 / (n - 1) as f64;
            (id.clone(), pct)
        })
        .collect()
}

fn fastest_of<'a>(candidates: impl Iterator<Item = (&'a VehicleId, f64)>) -> Option<FastestLap> {
    candidates
        .min_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(b.0)))
        .map(|(id, seconds)| FastestLap {
            vehicle_id: id.clone(),
            seconds,
        })
}

/// Builds the classification of every vehicle in the results.
///
/// Peak pace is the mean of the fastest `config.peak_pace_laps` laps taken
/// from the best-laps table when it lists the vehicle, otherwise from the lap
/// table.
#[must_use]
pub fn compute_classification(
    results: &[ResultRow],
    class_results: Option<&[ClassResultRow]>,
    best_laps: Option<&[BestLapsRow]>,
    laps: Option<&LapTable>,
    aliases: &AliasTable,
    config: &AnalysisConfig,
) -> ClassificationAnalysis {
    let mut diagnostics = Vec::new();

    let class_table: BTreeMap<VehicleId, &ClassResultRow> = class_results
        .map(|rows| {
            aliases
                .resolve_rows(InputTable::ClassResults, rows, |r| &r.vehicle, &mut diagnostics)
                .into_iter()
                .map(|(_, id, row)| (id, row))
                .collect()
        })
        .unwrap_or_default();

    let best = best_laps
        .map(|rows| best_lap_times(rows, aliases, &mut diagnostics))
        .unwrap_or_default();
    for id in best.keys().filter(|id| !aliases.is_classified(id)) {
        diagnostics.push(Diagnostic::UnclassifiedVehicle {
            vehicle_id: id.clone(),
            table: InputTable::BestLaps,
        });
    }

    let mut per_vehicle = BTreeMap::new();
    let mut paces = BTreeMap::new();
    let mut published_fastest = Vec::new();

    for (row_idx, row) in results.iter().enumerate() {
        let id = match aliases.resolve_result(row) {
            Ok(id) => id,
            Err(err) => {
                diagnostics.push(identity_diagnostic(InputTable::Results, row_idx, &err));
                continue;
            }
        };
        if per_vehicle.contains_key(&id) {
            continue;
        }

        let status_raw = non_blank(row.status.as_deref());
        let status = match status_raw.as_deref() {
            None => FinishStatus::Unknown,
            Some(raw) => config.status_for(raw).unwrap_or_else(|| {
                warn!(vehicle = %id, status = raw, "unrecognized status token");
                diagnostics.push(Diagnostic::UnknownStatus {
                    vehicle_id: id.clone(),
                    raw: raw.to_string(),
                });
                FinishStatus::Unknown
            }),
        };

        let fastest_lap_seconds = match row.fastest_lap.as_ref().map(TimeValue::seconds) {
            Some(Ok(t)) => Some(t),
            Some(Err(err)) => {
                diagnostics.push(Diagnostic::InvalidValue {
                    table: InputTable::Results,
                    row: row_idx,
                    field: "fastest_lap".to_string(),
                    reason: err.to_string(),
                });
                None
            }
            None => None,
        };
        if let Some(t) = fastest_lap_seconds.filter(|t| *t > 0.0) {
            published_fastest.push((id.clone(), t));
        }

        let pool: Vec<f64> = match best.get(&id).filter(|times| !times.is_empty()) {
            Some(times) => times.clone(),
            None => laps
                .map(|l| {
                    let mut racing = l.racing_laps(&id, config.formation_lap_seconds);
                    racing.sort_by(f64::total_cmp);
                    racing
                })
                .unwrap_or_default(),
        };
        let fastest_n: Vec<f64> = pool.iter().copied().take(config.peak_pace_laps).collect();
        let peak_pace_seconds = stats::mean(&fastest_n);
        if let Some(pace) = peak_pace_seconds {
            paces.insert(id.clone(), pace);
        }

        let class_row = class_table.get(&id);
        let class = non_blank(row.class.as_deref())
            .or_else(|| class_row.and_then(|c| non_blank(c.class.as_deref())));

        per_vehicle.insert(
            id,
            ClassificationInsight {
                position: row.position,
                laps_completed: row.laps,
                class,
                group: non_blank(row.group.as_deref()),
                class_position: class_row.and_then(|c| c.class_position),
                status,
                status_raw,
                peak_pace_seconds,
                peak_pace_laps: fastest_n.len(),
                pace_percentile: None,
                fastest_lap_seconds,
                gap_to_first: non_blank(row.gap_first.as_deref()),
                pace_consistency: pace_consistency(&pool),
            },
        );
    }

    for (id, pct) in percentiles(&paces) {
        if let Some(insight) = per_vehicle.get_mut(&id) {
            insight.pace_percentile = Some(pct);
        }
    }

    let summary = summarize(&per_vehicle, &published_fastest, laps);
    debug!(
        entries = summary.entries,
        starters = summary.starters,
        "classification computed"
    );

    ClassificationAnalysis {
        summary,
        per_vehicle,
        diagnostics,
    }
}

fn summarize(
    per_vehicle: &BTreeMap<VehicleId, ClassificationInsight>,
    published_fastest: &[(VehicleId, f64)],
    laps: Option<&LapTable>,
) -> ClassificationSummary {
    let winner = per_vehicle
        .iter()
        .filter_map(|(id, c)| Some((c.position?, id)))
        .min()
        .map(|(_, id)| id.clone());

    let fastest_lap = fastest_of(published_fastest.iter().map(|(id, t)| (id, *t))).or_else(|| {
        let laps = laps?;
        fastest_of(laps.iter().filter_map(|(id, l)| {
            let times: Vec<f64> = l.iter().map(|lap| lap.seconds).collect();
            Some((id, stats::min(&times)?))
        }))
    });

    let mut leaders: BTreeMap<String, (u32, u32, &VehicleId)> = BTreeMap::new();
    for (id, c) in per_vehicle {
        let Some(class) = &c.class else { continue };
        // class position ranks first; unpositioned entries sort last
        let key = (
            c.class_position.unwrap_or(u32::MAX),
            c.position.unwrap_or(u32::MAX),
            id,
        );
        if key.0 == u32::MAX && key.1 == u32::MAX {
            continue;
        }
        if leaders.get(class).map_or(true, |current| key < *current) {
            leaders.insert(class.clone(), key);
        }
    }

    ClassificationSummary {
        entries: per_vehicle.len(),
        starters: per_vehicle.values().filter(|c| c.status.started()).count(),
        winner,
        fastest_lap,
        class_winners: leaders
            .into_iter()
            .map(|(class, (_, _, id))| (class, id.clone()))
            .collect(),
    }
}
