//! Race facts builder.
//!
//! The builder collects the race's input tables and joins them on the
//! canonical vehicle id. Only race metadata, lap times and results are
//! required; every other table degrades to an omitted section.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, warn};

use crate::classification::{compute_classification, pace_stability_index};
use crate::config::AnalysisConfig;
use crate::diagnostics::{Diagnostic, Diagnostics, InputTable};
use crate::error::{MissingRequiredInputError, RaceResult};
use crate::event::{Event, EventCatalog, EventRecord};
use crate::facts::style::infer_style_tags;
use crate::facts::weather::{WeatherSample, WeatherSummary};
use crate::facts::{
    Assembly, DriverEntry, InputAvailability, LapTimeEntry, RaceFacts, RaceHeader, WhatIfBase,
};
use crate::identity::{AliasTable, VehicleId};
use crate::input::{
    BestLapsRow, ClassResultRow, DriverAggregateRow, LapAggregateRow, LapRow, RaceMeta, ResultRow,
    TelemetryAggregateRow,
};
use crate::laps::{LapTable, LapType};
use crate::sector::{compute_sector_insights, SectorTable};
use crate::stats;

/// Builder for [`RaceFacts`].
#[derive(Debug, Clone, Default)]
pub struct RaceFactsBuilder {
    race: Option<RaceMeta>,
    telemetry_aggregates: Option<Vec<TelemetryAggregateRow>>,
    lap_times: Option<Vec<LapRow>>,
    lap_aggregates: Option<Vec<LapAggregateRow>>,
    driver_aggregates: Option<Vec<DriverAggregateRow>>,
    events: Option<Vec<EventRecord>>,
    results: Option<Vec<ResultRow>>,
    class_results: Option<Vec<ClassResultRow>>,
    sectors: Option<SectorTable>,
    weather: Option<Vec<WeatherSample>>,
    best_laps: Option<Vec<BestLapsRow>>,
    config: AnalysisConfig,
}

impl RaceFactsBuilder {
    /// Create a new builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set race metadata (required).
    #[must_use]
    pub fn race(mut self, race: RaceMeta) -> Self {
        self.race = Some(race);
        self
    }

    /// Set telemetry aggregates.
    #[must_use]
    pub fn telemetry_aggregates(mut self, rows: Vec<TelemetryAggregateRow>) -> Self {
        self.telemetry_aggregates = Some(rows);
        self
    }

    /// Set the lap-time table (required).
    #[must_use]
    pub fn lap_times(mut self, rows: Vec<LapRow>) -> Self {
        self.lap_times = Some(rows);
        self
    }

    /// Set per-lap aggregates.
    #[must_use]
    pub fn lap_aggregates(mut self, rows: Vec<LapAggregateRow>) -> Self {
        self.lap_aggregates = Some(rows);
        self
    }

    /// Set per-driver aggregates.
    #[must_use]
    pub fn driver_aggregates(mut self, rows: Vec<DriverAggregateRow>) -> Self {
        self.driver_aggregates = Some(rows);
        self
    }

    /// Set detected events.
    #[must_use]
    pub fn events(mut self, rows: Vec<EventRecord>) -> Self {
        self.events = Some(rows);
        self
    }

    /// Set official results (required).
    #[must_use]
    pub fn results(mut self, rows: Vec<ResultRow>) -> Self {
        self.results = Some(rows);
        self
    }

    /// Set results by class.
    #[must_use]
    pub fn class_results(mut self, rows: Vec<ClassResultRow>) -> Self {
        self.class_results = Some(rows);
        self
    }

    /// Set the sector table.
    #[must_use]
    pub fn sectors(mut self, table: SectorTable) -> Self {
        self.sectors = Some(table);
        self
    }

    /// Set weather readings.
    #[must_use]
    pub fn weather(mut self, samples: Vec<WeatherSample>) -> Self {
        self.weather = Some(samples);
        self
    }

    /// Set the best-laps table.
    #[must_use]
    pub fn best_laps(mut self, rows: Vec<BestLapsRow>) -> Self {
        self.best_laps = Some(rows);
        self
    }

    /// Set the analysis configuration.
    #[must_use]
    pub fn config(mut self, config: AnalysisConfig) -> Self {
        self.config = config;
        self
    }

    /// Assemble the race facts.
    ///
    /// Fails only when a required input is missing or the configuration is
    /// invalid; everything else is reported in the returned diagnostics.
    pub fn assemble(self) -> RaceResult<Assembly> {
        let race = self
            .race
            .filter(|r| !r.name.trim().is_empty())
            .ok_or(MissingRequiredInputError::RaceMetadata)?;
        let lap_rows = non_empty(self.lap_times).ok_or(MissingRequiredInputError::LapTable)?;
        let results = non_empty(self.results).ok_or(MissingRequiredInputError::Results)?;
        let config = self.config;
        config.validate()?;

        let mut diagnostics = Diagnostics::new();
        let (aliases, found) = AliasTable::from_results(&results);
        diagnostics.extend(found);

        let (laps, found) = LapTable::from_rows(&lap_rows, &aliases);
        diagnostics.extend(found);
        if laps.is_empty() {
            return Err(MissingRequiredInputError::LapTable.into());
        }
        flag_unclassified(&aliases, laps.vehicles(), InputTable::LapTimes, &mut diagnostics);

        let telemetry_aggregates = non_empty(self.telemetry_aggregates);
        let lap_aggregates = non_empty(self.lap_aggregates);
        let driver_aggregates = non_empty(self.driver_aggregates);
        let events = non_empty(self.events);
        let class_results = non_empty(self.class_results);
        let sectors = self.sectors.filter(|s| !s.is_empty());
        let weather = non_empty(self.weather);
        let best_laps = non_empty(self.best_laps);

        let availability = InputAvailability {
            telemetry_aggregates: telemetry_aggregates.is_some(),
            lap_aggregates: lap_aggregates.is_some(),
            driver_aggregates: driver_aggregates.is_some(),
            events: events.is_some(),
            class_results: class_results.is_some(),
            sectors: sectors.is_some(),
            weather: weather.is_some(),
            best_laps: best_laps.is_some(),
        };
        report_absent(&availability, &mut diagnostics);

        let catalog = match &events {
            Some(records) => {
                let (catalog, found) = EventCatalog::from_records(records, &aliases);
                diagnostics.extend(found);
                let vehicles: BTreeSet<&VehicleId> =
                    catalog.events().iter().map(|e| &e.vehicle_id).collect();
                flag_unclassified(&aliases, vehicles.into_iter(), InputTable::Events, &mut diagnostics);
                catalog
            }
            None => EventCatalog::default(),
        };

        let telemetry = telemetry_aggregates
            .as_deref()
            .map(|rows| telemetry_rows(rows, &aliases, &mut diagnostics))
            .unwrap_or_default();
        let per_lap = lap_aggregates
            .as_deref()
            .map(|rows| lap_metric_rows(rows, &aliases, &mut diagnostics))
            .unwrap_or_default();
        let drivers_table = driver_aggregates
            .as_deref()
            .map(|rows| driver_rows(rows, &aliases, &mut diagnostics))
            .unwrap_or_default();

        let mut sector_analysis = sectors.as_ref().map(|table| {
            let mut analysis = compute_sector_insights(table, &results, &aliases, &config);
            diagnostics.extend(std::mem::take(&mut analysis.diagnostics));
            analysis
        });

        let mut classification = compute_classification(
            &results,
            class_results.as_deref(),
            best_laps.as_deref(),
            Some(&laps),
            &aliases,
            &config,
        );
        diagnostics.extend(std::mem::take(&mut classification.diagnostics));

        // results order: positioned first, then id
        let mut order: Vec<(Option<u32>, VehicleId)> = classification
            .per_vehicle
            .iter()
            .map(|(id, c)| (c.position, id.clone()))
            .collect();
        order.sort_by(|a, b| {
            a.0.is_none()
                .cmp(&b.0.is_none())
                .then_with(|| a.0.cmp(&b.0))
                .then_with(|| a.1.cmp(&b.1))
        });

        let mut drivers = Vec::with_capacity(order.len() + drivers_table.len());
        for (position, id) in order {
            if laps.lap_count(&id) == 0 {
                diagnostics.push(Diagnostic::NoLapData {
                    vehicle_id: id.clone(),
                });
            }
            let entry = DriverEntry {
                car_number: aliases.car_number(&id),
                finish_position: position,
                classified: true,
                sector_insight: sector_analysis
                    .as_mut()
                    .and_then(|a| a.per_vehicle.remove(&id)),
                classification: classification.per_vehicle.remove(&id),
                ..driver_entry(&id, &telemetry, &drivers_table, &catalog, &laps, &config)
            };
            drivers.push(entry);
        }
        for id in drivers_table.keys().filter(|id| !aliases.is_classified(id)) {
            warn!(vehicle = %id, "driver aggregate for a vehicle missing from results");
            diagnostics.push(Diagnostic::UnclassifiedVehicle {
                vehicle_id: id.clone(),
                table: InputTable::DriverAggregates,
            });
            drivers.push(driver_entry(id, &telemetry, &drivers_table, &catalog, &laps, &config));
        }

        let lap_times = laps
            .iter()
            .flat_map(|(id, vehicle_laps)| {
                vehicle_laps.iter().map(|lap| LapTimeEntry {
                    vehicle_id: id.clone(),
                    lap: lap.lap,
                    lap_time_seconds: lap.seconds,
                    lap_type: LapType::classify(lap.seconds, config.formation_lap_seconds),
                    metrics: per_lap.get(&(id.clone(), lap.lap)).cloned().unwrap_or_default(),
                })
            })
            .collect();

        let what_if_base = WhatIfBase {
            total_time_seconds: laps
                .iter()
                .map(|(id, l)| (id.clone(), l.iter().map(|lap| lap.seconds).sum::<f64>()))
                .collect(),
            total_event_loss_seconds: catalog.loss_by_vehicle(),
        };

        let facts = RaceFacts {
            race: RaceHeader {
                event_name: race.name,
                track: race.track,
                date: race.date,
                session: race.session,
                total_laps: laps.max_lap().unwrap_or(0),
            },
            drivers,
            race_key_events: select_key_events(&catalog, &config),
            lap_times,
            weather_summary: weather.as_deref().and_then(WeatherSummary::from_samples),
            sector_summary: sector_analysis.map(|a| a.summary),
            classification_summary: classification.summary,
            what_if_base,
            availability,
        };

        debug!(
            drivers = facts.drivers.len(),
            laps = facts.lap_times.len(),
            events = catalog.len(),
            diagnostics = diagnostics.len(),
            "race facts assembled"
        );

        Ok(Assembly { facts, diagnostics })
    }
}

fn non_empty<T>(rows: Option<Vec<T>>) -> Option<Vec<T>> {
    rows.filter(|r| !r.is_empty())
}

fn report_absent(availability: &InputAvailability, diagnostics: &mut Diagnostics) {
    let tables = [
        (availability.telemetry_aggregates, InputTable::TelemetryAggregates),
        (availability.lap_aggregates, InputTable::LapAggregates),
        (availability.driver_aggregates, InputTable::DriverAggregates),
        (availability.events, InputTable::Events),
        (availability.class_results, InputTable::ClassResults),
        (availability.sectors, InputTable::Sectors),
        (availability.weather, InputTable::Weather),
        (availability.best_laps, InputTable::BestLaps),
    ];
    for (_, table) in tables.into_iter().filter(|(present, _)| !present) {
        debug!(%table, "optional input absent");
        diagnostics.push(Diagnostic::OptionalInputAbsent { table });
    }
}

fn flag_unclassified<'a>(
    aliases: &AliasTable,
    vehicles: impl Iterator<Item = &'a VehicleId>,
    table: InputTable,
    diagnostics: &mut Diagnostics,
) {
    for id in vehicles.filter(|id| !aliases.is_classified(id)) {
        diagnostics.push(Diagnostic::UnclassifiedVehicle {
            vehicle_id: id.clone(),
            table,
        });
    }
}

fn finite_metrics(metrics: &BTreeMap<String, f64>) -> impl Iterator<Item = (&String, f64)> {
    metrics
        .iter()
        .filter(|(_, v)| v.is_finite())
        .map(|(k, v)| (k, *v))
}

fn telemetry_rows(
    rows: &[TelemetryAggregateRow],
    aliases: &AliasTable,
    diagnostics: &mut Diagnostics,
) -> BTreeMap<VehicleId, BTreeMap<String, f64>> {
    let mut found = Vec::new();
    let resolved =
        aliases.resolve_rows(InputTable::TelemetryAggregates, rows, |r| &r.vehicle, &mut found);
    diagnostics.extend(found);

    let mut by_vehicle: BTreeMap<VehicleId, BTreeMap<String, f64>> = BTreeMap::new();
    for (_, id, row) in resolved {
        let metrics = by_vehicle.entry(id).or_default();
        for (name, value) in finite_metrics(&row.metrics) {
            metrics.entry(name.clone()).or_insert(value);
        }
    }
    by_vehicle
}

fn lap_metric_rows(
    rows: &[LapAggregateRow],
    aliases: &AliasTable,
    diagnostics: &mut Diagnostics,
) -> BTreeMap<(VehicleId, u32), BTreeMap<String, f64>> {
    let mut found = Vec::new();
    let resolved = aliases.resolve_rows(InputTable::LapAggregates, rows, |r| &r.vehicle, &mut found);
    diagnostics.extend(found);

    let mut by_lap: BTreeMap<(VehicleId, u32), BTreeMap<String, f64>> = BTreeMap::new();
    for (_, id, row) in resolved {
        let metrics = by_lap.entry((id, row.lap)).or_default();
        for (name, value) in finite_metrics(&row.metrics) {
            metrics.entry(name.clone()).or_insert(value);
        }
    }
    by_lap
}

fn driver_rows<'a>(
    rows: &'a [DriverAggregateRow],
    aliases: &AliasTable,
    diagnostics: &mut Diagnostics,
) -> BTreeMap<VehicleId, &'a DriverAggregateRow> {
    let mut found = Vec::new();
    let resolved =
        aliases.resolve_rows(InputTable::DriverAggregates, rows, |r| &r.vehicle, &mut found);
    diagnostics.extend(found);

    let mut by_vehicle = BTreeMap::new();
    for (row_idx, id, row) in resolved {
        if by_vehicle.contains_key(&id) {
            diagnostics.push(Diagnostic::InvalidValue {
                table: InputTable::DriverAggregates,
                row: row_idx,
                field: "vehicle".to_string(),
                reason: format!("second aggregate row for {id}; ignored"),
            });
            continue;
        }
        by_vehicle.insert(id, row);
    }
    by_vehicle
}

/// Metrics, style tags, events and total time of one vehicle.
fn driver_entry(
    id: &VehicleId,
    telemetry: &BTreeMap<VehicleId, BTreeMap<String, f64>>,
    drivers: &BTreeMap<VehicleId, &DriverAggregateRow>,
    catalog: &EventCatalog,
    laps: &LapTable,
    config: &AnalysisConfig,
) -> DriverEntry {
    let aggregate = drivers.get(id);

    let mut driver_metrics = telemetry.get(id).cloned().unwrap_or_default();
    if let Some(row) = aggregate {
        for (name, value) in finite_metrics(&row.metrics) {
            driver_metrics.insert(name.clone(), value);
        }
    }

    // Racing-lap figures replace aggregate values of the same name.
    let racing = laps.racing_laps(id, config.formation_lap_seconds);
    if let Some(mean) = stats::mean(&racing) {
        driver_metrics.insert("lap_time_mean".to_string(), mean);
        driver_metrics.insert(
            "lap_time_std".to_string(),
            stats::sample_std(&racing).unwrap_or(0.0),
        );
    }
    if let Some(best) = stats::min(&racing) {
        driver_metrics.insert("lap_time_best".to_string(), best);
    }

    let style_tags = match aggregate.and_then(|row| row.style_tags.as_ref()) {
        Some(tags) => tags
            .iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect(),
        None => infer_style_tags(&driver_metrics, &racing, &config.style),
    };

    DriverEntry {
        vehicle_id: id.clone(),
        car_number: None,
        finish_position: None,
        classified: false,
        driver_metrics,
        style_tags,
        key_events: catalog.for_vehicle(id).cloned().collect(),
        sector_insight: None,
        classification: None,
        total_time_seconds: laps.total_time(id),
        pace_stability_index: pace_stability_index(&racing),
    }
}

/// Role-tagged events in catalog order when any exist, otherwise the most
/// severe events.
fn select_key_events(catalog: &EventCatalog, config: &AnalysisConfig) -> Vec<Event> {
    let events = catalog.events();
    if events.iter().any(|e| e.role.is_some()) {
        return events
            .iter()
            .filter(|e| e.role.is_some())
            .take(config.key_event_limit)
            .cloned()
            .collect();
    }

    let mut by_severity: Vec<&Event> = events.iter().collect();
    by_severity.sort_by(|a, b| {
        b.severity
            .total_cmp(&a.severity)
            .then_with(|| a.lap.cmp(&b.lap))
            .then_with(|| a.event_id.cmp(&b.event_id))
    });
    by_severity
        .into_iter()
        .take(config.severity_event_limit)
        .cloned()
        .collect()
}
