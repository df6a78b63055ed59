//! Sector insight engine.
//!
//! Turns the per-lap sector table into per-driver strengths and weaknesses:
//! mean time per sector, loss against the best car of the same class,
//! strongest/weakest sector, a fatigue indicator and per-sector consistency.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::AnalysisConfig;
use crate::diagnostics::{Diagnostic, InputTable};
use crate::identity::{AliasTable, VehicleId, VehicleRef};
use crate::input::ResultRow;
use crate::stats;

/// Name of a track sector (`S1`, `S2`, ...).
///
/// Ordered naturally: `S2` sorts before `S10`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SectorName(String);

impl SectorName {
    /// Creates a sector name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into().trim().to_string())
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn sort_key(&self) -> (&str, Option<u64>) {
        let digits_at = self
            .0
            .rfind(|c: char| !c.is_ascii_digit())
            .map_or(0, |i| i + 1);
        let (prefix, digits) = self.0.split_at(digits_at);
        (prefix, digits.parse().ok())
    }
}

impl Ord for SectorName {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key()
            .cmp(&other.sort_key())
            .then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for SectorName {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for SectorName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SectorName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// One lap of the sector table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorRow {
    /// Vehicle as listed by the sector table (usually the bare car number).
    pub vehicle: VehicleRef,
    /// Lap number.
    pub lap: u32,
    /// Sector times in seconds; `null` or absent for a missing split.
    pub sectors: BTreeMap<SectorName, Option<f64>>,
    /// Top speed on the lap, when timed.
    #[serde(default)]
    pub top_speed: Option<f64>,
}

impl SectorRow {
    /// Creates a row from `(sector, seconds)` pairs.
    #[must_use]
    pub fn new<'a>(
        vehicle: impl Into<VehicleRef>,
        lap: u32,
        times: impl IntoIterator<Item = (&'a str, f64)>,
    ) -> Self {
        Self {
            vehicle: vehicle.into(),
            lap,
            sectors: times
                .into_iter()
                .map(|(name, t)| (SectorName::new(name), Some(t)))
                .collect(),
            top_speed: None,
        }
    }
}

/// The sector table with its ordered sector names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SectorTable {
    /// Sector names in track order.
    pub sectors: Vec<SectorName>,
    /// Rows.
    pub rows: Vec<SectorRow>,
}

impl SectorTable {
    /// Creates a table, deriving the sector order from the rows.
    #[must_use]
    pub fn new(rows: Vec<SectorRow>) -> Self {
        let mut sectors: Vec<SectorName> = rows
            .iter()
            .flat_map(|r| r.sectors.keys().cloned())
            .collect();
        sectors.sort();
        sectors.dedup();
        Self { sectors, rows }
    }

    /// Creates a table with an explicit track order.
    #[must_use]
    pub fn with_order(sectors: Vec<SectorName>, rows: Vec<SectorRow>) -> Self {
        Self { sectors, rows }
    }

    /// True if the table holds no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Per-driver sector insight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorInsight {
    /// Class the driver was compared within.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    /// Mean time per sector.
    pub sector_means: BTreeMap<SectorName, f64>,
    /// Mean minus the best class mean, per sector.
    pub sector_losses_vs_best: BTreeMap<SectorName, f64>,
    /// Sector with the smallest loss.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strongest_sector: Option<SectorName>,
    /// Sector with the largest loss.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weakest_sector: Option<SectorName>,
    /// Percent by which the late sector is slower than the early one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fatigue_indicator_percent: Option<f64>,
    /// Coefficient of variation per sector (lower is more consistent).
    pub sector_consistency: BTreeMap<SectorName, f64>,
    /// Valid samples per sector.
    pub valid_laps: BTreeMap<SectorName, usize>,
}

/// Best single-lap time for a sector across the field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorBest {
    /// Owning vehicle.
    pub vehicle_id: VehicleId,
    /// Lap it was set on.
    pub lap: u32,
    /// Sector time in seconds.
    pub time_seconds: f64,
}

/// Field-wide sector summary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SectorSummary {
    /// Sector names in track order.
    pub sectors: Vec<SectorName>,
    /// Best single-lap time per sector.
    pub best: BTreeMap<SectorName, SectorBest>,
}

/// Output of [`compute_sector_insights`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SectorAnalysis {
    /// Field-wide summary.
    pub summary: SectorSummary,
    /// Insight per vehicle with at least one valid sector sample.
    pub per_vehicle: BTreeMap<VehicleId, SectorInsight>,
    /// Per-row anomalies.
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Default)]
struct VehicleSamples {
    by_sector: BTreeMap<SectorName, Vec<f64>>,
}

fn is_valid_time(t: f64) -> bool {
    t.is_finite() && t > 0.0
}

fn collect_samples(
    table: &SectorTable,
    aliases: &AliasTable,
    diagnostics: &mut Vec<Diagnostic>,
) -> (BTreeMap<VehicleId, VehicleSamples>, SectorSummary) {
    let resolved =
        aliases.resolve_rows(InputTable::Sectors, &table.rows, |r| &r.vehicle, diagnostics);

    let mut samples: BTreeMap<VehicleId, VehicleSamples> = BTreeMap::new();
    let mut best: BTreeMap<SectorName, SectorBest> = BTreeMap::new();

    for (row_idx, id, row) in resolved {
        let entry = samples.entry(id.clone()).or_default();
        for (sector, time) in &row.sectors {
            let Some(t) = *time else { continue };
            if !is_valid_time(t) {
                diagnostics.push(Diagnostic::InvalidValue {
                    table: InputTable::Sectors,
                    row: row_idx,
                    field: sector.to_string(),
                    reason: format!("unusable sector time {t}"),
                });
                continue;
            }
            entry.by_sector.entry(sector.clone()).or_default().push(t);

            let faster = best.get(sector).map_or(true, |current| {
                (t, &id, row.lap) < (current.time_seconds, &current.vehicle_id, current.lap)
            });
            if faster {
                best.insert(
                    sector.clone(),
                    SectorBest {
                        vehicle_id: id.clone(),
                        lap: row.lap,
                        time_seconds: t,
                    },
                );
            }
        }
    }

    let summary = SectorSummary {
        sectors: table.sectors.clone(),
        best,
    };
    (samples, summary)
}

fn class_of(results: &[ResultRow], aliases: &AliasTable) -> BTreeMap<VehicleId, Option<String>> {
    results
        .iter()
        .filter_map(|row| {
            let id = aliases.resolve_result(row).ok()?;
            let class = row
                .class
                .as_deref()
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string);
            Some((id, class))
        })
        .collect()
}

/// Picks the key with the extreme value; ties go to the smallest key.
fn extreme<'a>(
    values: &'a BTreeMap<SectorName, f64>,
    better: impl Fn(f64, f64) -> bool,
) -> Option<&'a SectorName> {
    let mut chosen: Option<(&SectorName, f64)> = None;
    for (name, &v) in values {
        match chosen {
            Some((_, current)) if !better(v, current) => {}
            _ => chosen = Some((name, v)),
        }
    }
    chosen.map(|(name, _)| name)
}

fn fatigue_pair(table: &SectorTable, config: &AnalysisConfig) -> Option<(SectorName, SectorName)> {
    if let Some(pair) = &config.fatigue_sectors {
        return Some((SectorName::new(pair.early.as_str()), SectorName::new(pair.late.as_str())));
    }
    match table.sectors.as_slice() {
        [first, .., last] => Some((first.clone(), last.clone())),
        _ => None,
    }
}

/// Computes sector insights for every vehicle in the sector table.
///
/// Best-in-class comparisons use the class from `results`; vehicles absent
/// from the results (or without a class) are compared within one shared
/// unclassed group.
#[must_use]
pub fn compute_sector_insights(
    table: &SectorTable,
    results: &[ResultRow],
    aliases: &AliasTable,
    config: &AnalysisConfig,
) -> SectorAnalysis {
    let mut diagnostics = Vec::new();
    let (samples, summary) = collect_samples(table, aliases, &mut diagnostics);
    let classes = class_of(results, aliases);

    let mut means: BTreeMap<VehicleId, BTreeMap<SectorName, f64>> = BTreeMap::new();
    for (id, vs) in &samples {
        let per_sector = vs
            .by_sector
            .iter()
            .filter_map(|(sector, times)| Some((sector.clone(), stats::mean(times)?)))
            .collect();
        means.insert(id.clone(), per_sector);
    }

    let mut best_in_class: BTreeMap<(Option<String>, SectorName), f64> = BTreeMap::new();
    for (id, per_sector) in &means {
        let class = classes.get(id).cloned().flatten();
        for (sector, &m) in per_sector {
            best_in_class
                .entry((class.clone(), sector.clone()))
                .and_modify(|b| *b = b.min(m))
                .or_insert(m);
        }
    }

    let fatigue = fatigue_pair(table, config);
    let mut per_vehicle = BTreeMap::new();

    for (id, per_sector) in means {
        let Some(vs) = samples.get(&id) else { continue };
        if !aliases.is_classified(&id) {
            diagnostics.push(Diagnostic::UnclassifiedVehicle {
                vehicle_id: id.clone(),
                table: InputTable::Sectors,
            });
        }
        for sector in &table.sectors {
            if !per_sector.contains_key(sector) {
                diagnostics.push(Diagnostic::MissingSectorData {
                    vehicle_id: id.clone(),
                    sector: sector.to_string(),
                });
            }
        }

        let class = classes.get(&id).cloned().flatten();
        let losses: BTreeMap<SectorName, f64> = per_sector
            .iter()
            .map(|(sector, &m)| {
                let best = best_in_class
                    .get(&(class.clone(), sector.clone()))
                    .copied()
                    .unwrap_or(m);
                (sector.clone(), m - best)
            })
            .collect();

        let strongest_sector = extreme(&losses, |a, b| a < b).cloned();
        let weakest_sector = extreme(&losses, |a, b| a > b).cloned();

        let fatigue_indicator_percent = fatigue.as_ref().and_then(|(early, late)| {
            let e = *per_sector.get(early)?;
            let l = *per_sector.get(late)?;
            (e > 0.0).then(|| (l - e) / e * 100.0)
        });

        let sector_consistency = vs
            .by_sector
            .iter()
            .filter_map(|(sector, times)| {
                Some((sector.clone(), stats::coefficient_of_variation(times)?))
            })
            .collect();
        let valid_laps = vs
            .by_sector
            .iter()
            .map(|(sector, times)| (sector.clone(), times.len()))
            .collect();

        per_vehicle.insert(
            id,
            SectorInsight {
                class,
                sector_means: per_sector,
                sector_losses_vs_best: losses,
                strongest_sector,
                weakest_sector,
                fatigue_indicator_percent,
                sector_consistency,
                valid_laps,
            },
        );
    }

    debug!(
        vehicles = per_vehicle.len(),
        sectors = summary.sectors.len(),
        "sector insights computed"
    );

    SectorAnalysis {
        summary,
        per_vehicle,
        diagnostics,
    }
}

/// Spread of one sector's times for one vehicle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorStats {
    /// Mean time.
    pub mean: f64,
    /// Fastest time.
    pub min: f64,
    /// Slowest time.
    pub max: f64,
    /// Sample standard deviation, absent below two samples.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub std: Option<f64>,
    /// Number of samples.
    pub num_samples: usize,
}

/// Top speed spread for one vehicle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopSpeedStats {
    /// Mean top speed.
    pub mean: f64,
    /// Lowest top speed.
    pub min: f64,
    /// Highest top speed.
    pub max: f64,
}

/// Detailed per-sector pace profile of one vehicle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorPaceProfile {
    /// Per-sector spread.
    pub sectors: BTreeMap<SectorName, SectorStats>,
    /// Top speed spread, when the table carries speeds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_speed: Option<TopSpeedStats>,
}

/// Builds the pace profile of one vehicle. `None` when it has no valid rows.
#[must_use]
pub fn sector_pace_profile(
    table: &SectorTable,
    aliases: &AliasTable,
    vehicle: &VehicleId,
) -> Option<SectorPaceProfile> {
    let mut by_sector: BTreeMap<SectorName, Vec<f64>> = BTreeMap::new();
    let mut speeds = Vec::new();

    for row in &table.rows {
        if aliases.resolve(&row.vehicle).ok().as_ref() != Some(vehicle) {
            continue;
        }
        for (sector, time) in &row.sectors {
            if let Some(t) = time.filter(|t| is_valid_time(*t)) {
                by_sector.entry(sector.clone()).or_default().push(t);
            }
        }
        if let Some(s) = row.top_speed.filter(|s| s.is_finite()) {
            speeds.push(s);
        }
    }

    let sectors: BTreeMap<SectorName, SectorStats> = by_sector
        .into_iter()
        .filter_map(|(sector, times)| {
            let stats = SectorStats {
                mean: stats::mean(&times)?,
                min: stats::min(&times)?,
                max: stats::max(&times)?,
                std: stats::sample_std(&times),
                num_samples: times.len(),
            };
            Some((sector, stats))
        })
        .collect();

    let top_speed = match (stats::mean(&speeds), stats::min(&speeds), stats::max(&speeds)) {
        (Some(mean), Some(min), Some(max)) => Some(TopSpeedStats { mean, min, max }),
        _ => None,
    };

    if sectors.is_empty() && top_speed.is_none() {
        return None;
    }
    Some(SectorPaceProfile { sectors, top_speed })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FatigueSectors;

    fn results() -> Vec<ResultRow> {
        vec![
            ResultRow::vehicle("GR86-001-1").with_number(1).with_class("Am"),
            ResultRow::vehicle("GR86-002-2").with_number(2).with_class("Am"),
            ResultRow::vehicle("GR86-003-3").with_number(3).with_class("Pro"),
        ]
    }

    fn table() -> SectorTable {
        SectorTable::new(vec![
            SectorRow::new(1u32, 1, [("S1", 30.0), ("S2", 40.0), ("S3", 31.0)]),
            SectorRow::new(1u32, 2, [("S1", 30.0), ("S2", 41.0), ("S3", 33.0)]),
            SectorRow::new(2u32, 1, [("S1", 31.0), ("S2", 39.0), ("S3", 30.0)]),
            SectorRow::new(2u32, 2, [("S1", 31.0), ("S2", 39.0), ("S3", 30.0)]),
            SectorRow::new(3u32, 1, [("S1", 35.0), ("S2", 45.0), ("S3", 36.0)]),
        ])
    }

    fn analysis() -> SectorAnalysis {
        let (aliases, _) = AliasTable::from_results(&results());
        compute_sector_insights(&table(), &results(), &aliases, &AnalysisConfig::default())
    }

    #[test]
    fn natural_sector_ordering() {
        let mut names = vec![SectorName::new("S10"), SectorName::new("S2"), SectorName::new("S1")];
        names.sort();
        let sorted: Vec<_> = names.iter().map(SectorName::as_str).collect();
        assert_eq!(sorted, vec!["S1", "S2", "S10"]);
    }

    #[test]
    fn best_in_class_has_zero_loss() {
        let a = analysis();
        let car1 = &a.per_vehicle[&VehicleId::new("GR86-001-1")];
        let car2 = &a.per_vehicle[&VehicleId::new("GR86-002-2")];
        let s1 = SectorName::new("S1");
        assert_eq!(car1.sector_losses_vs_best[&s1], 0.0);
        assert_eq!(car2.sector_losses_vs_best[&s1], 1.0);
        assert!(car1
            .sector_losses_vs_best
            .values()
            .chain(car2.sector_losses_vs_best.values())
            .all(|l| *l >= 0.0));
    }

    #[test]
    fn classes_are_compared_separately() {
        let a = analysis();
        let pro = &a.per_vehicle[&VehicleId::new("GR86-003-3")];
        assert!(pro.sector_losses_vs_best.values().all(|l| *l == 0.0));
        assert_eq!(pro.class.as_deref(), Some("Pro"));
    }

    #[test]
    fn strongest_and_weakest_by_loss() {
        let a = analysis();
        let car1 = &a.per_vehicle[&VehicleId::new("GR86-001-1")];
        // losses: S1 0.0, S2 1.5, S3 2.0
        assert_eq!(car1.strongest_sector.as_ref().unwrap().as_str(), "S1");
        assert_eq!(car1.weakest_sector.as_ref().unwrap().as_str(), "S3");
    }

    #[test]
    fn ties_resolve_to_lowest_sector_name() {
        let a = analysis();
        let pro = &a.per_vehicle[&VehicleId::new("GR86-003-3")];
        assert_eq!(pro.strongest_sector.as_ref().unwrap().as_str(), "S1");
        assert_eq!(pro.weakest_sector.as_ref().unwrap().as_str(), "S1");
    }

    #[test]
    fn fatigue_compares_last_to_first_sector() {
        let a = analysis();
        let car1 = &a.per_vehicle[&VehicleId::new("GR86-001-1")];
        // (32 - 30) / 30 * 100
        let f = car1.fatigue_indicator_percent.unwrap();
        assert!((f - 6.666_666_666).abs() < 1e-6);
    }

    #[test]
    fn fatigue_pair_is_configurable() {
        let (aliases, _) = AliasTable::from_results(&results());
        let mut config = AnalysisConfig::default();
        config.fatigue_sectors = Some(FatigueSectors {
            early: "S2".to_string(),
            late: "S3".to_string(),
        });
        let a = compute_sector_insights(&table(), &results(), &aliases, &config);
        let car2 = &a.per_vehicle[&VehicleId::new("GR86-002-2")];
        let f = car2.fatigue_indicator_percent.unwrap();
        assert!((f - (30.0 - 39.0) / 39.0 * 100.0).abs() < 1e-9);
    }

    #[test]
    fn consistency_needs_two_laps() {
        let a = analysis();
        let car3 = &a.per_vehicle[&VehicleId::new("GR86-003-3")];
        assert!(car3.sector_consistency.is_empty());
        let car2 = &a.per_vehicle[&VehicleId::new("GR86-002-2")];
        assert_eq!(car2.sector_consistency[&SectorName::new("S2")], 0.0);
    }

    #[test]
    fn missing_sector_is_omitted_not_zero() {
        let rows = vec![
            SectorRow {
                vehicle: VehicleRef::Number(1),
                lap: 1,
                sectors: [
                    (SectorName::new("S1"), Some(30.0)),
                    (SectorName::new("S2"), None),
                    (SectorName::new("S3"), Some(31.0)),
                ]
                .into_iter()
                .collect(),
                top_speed: None,
            },
            SectorRow::new(2u32, 1, [("S1", 31.0), ("S2", 39.0), ("S3", 30.0)]),
        ];
        let (aliases, _) = AliasTable::from_results(&results());
        let a = compute_sector_insights(
            &SectorTable::new(rows),
            &results(),
            &aliases,
            &AnalysisConfig::default(),
        );
        let car1 = &a.per_vehicle[&VehicleId::new("GR86-001-1")];
        assert!(!car1.sector_means.contains_key(&SectorName::new("S2")));
        assert!(a.diagnostics.iter().any(|d| matches!(
            d,
            Diagnostic::MissingSectorData { sector, .. } if sector == "S2"
        )));
    }

    #[test]
    fn unknown_car_numbers_are_excluded() {
        let mut t = table();
        t.rows.push(SectorRow::new(77u32, 1, [("S1", 20.0)]));
        let (aliases, _) = AliasTable::from_results(&results());
        let a = compute_sector_insights(&t, &results(), &aliases, &AnalysisConfig::default());
        assert_eq!(a.per_vehicle.len(), 3);
        assert_eq!(a.summary.best[&SectorName::new("S1")].time_seconds, 30.0);
        assert!(a
            .diagnostics
            .iter()
            .any(|d| matches!(d, Diagnostic::UnresolvedIdentity { .. })));
    }

    #[test]
    fn summary_holds_best_single_lap() {
        let a = analysis();
        let s3 = &a.summary.best[&SectorName::new("S3")];
        assert_eq!(s3.vehicle_id.as_str(), "GR86-002-2");
        assert_eq!(s3.lap, 1);
        assert_eq!(s3.time_seconds, 30.0);
    }

    #[test]
    fn pace_profile_reports_spread() {
        let (aliases, _) = AliasTable::from_results(&results());
        let mut t = table();
        t.rows[0].top_speed = Some(201.0);
        t.rows[1].top_speed = Some(199.0);
        let profile = sector_pace_profile(&t, &aliases, &VehicleId::new("GR86-001-1")).unwrap();
        let s3 = &profile.sectors[&SectorName::new("S3")];
        assert_eq!(s3.min, 31.0);
        assert_eq!(s3.max, 33.0);
        assert_eq!(s3.num_samples, 2);
        assert_eq!(profile.top_speed.unwrap().mean, 200.0);
        assert!(sector_pace_profile(&t, &aliases, &VehicleId::new("nobody")).is_none());
    }
}
