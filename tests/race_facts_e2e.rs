use std::collections::BTreeSet;

use racefacts::{
    BestLapsRow, ClassResultRow, Diagnostic, DriverAggregateRow, EventRecord, InputTable,
    LapAggregateRow, LapRow, RaceFactsBuilder, RaceMeta, ResultRow, SectorRow, SectorTable,
    TelemetryAggregateRow, TimeValue, VehicleId, VehicleRef, WeatherSample,
};

fn results() -> Vec<ResultRow> {
    vec![
        ResultRow::vehicle("GR86-004-13")
            .with_number(13)
            .with_position(1)
            .with_class("Am")
            .with_laps(3)
            .with_status("Classified"),
        ResultRow::vehicle("GR86-026-72")
            .with_number(72)
            .with_position(2)
            .with_class("Am")
            .with_laps(3)
            .with_status("Classified"),
        ResultRow::vehicle("GR86-010-22")
            .with_number(22)
            .with_position(3)
            .with_class("Pro")
            .with_laps(3),
        ResultRow::vehicle("GR86-033-5").with_number(5).with_status("DNS"),
    ]
}

fn laps() -> Vec<LapRow> {
    let mut rows = Vec::new();
    for (number, base) in [(13u32, 150.0), (72, 151.0), (22, 152.5)] {
        for lap in 1..=3u32 {
            rows.push(LapRow::new(number, lap, base + f64::from(lap) * 0.25));
        }
    }
    rows
}

fn sectors() -> SectorTable {
    let mut rows = Vec::new();
    for (number, offset) in [(13u32, 0.0), (72, 0.4), (22, 0.9)] {
        for lap in 1..=3u32 {
            let drift = f64::from(lap) * 0.1;
            rows.push(SectorRow::new(
                number,
                lap,
                [
                    ("S1", 45.0 + offset + drift),
                    ("S2", 60.0 + offset),
                    ("S3", 45.0 + offset + drift),
                ],
            ));
        }
    }
    SectorTable::new(rows)
}

fn events() -> Vec<EventRecord> {
    vec![
        EventRecord::new("GR86-026-72", 2, "lockup", 1.4)
            .with_id("ev-72-lockup")
            .with_severity(0.8)
            .with_role("major_mistake"),
        EventRecord::new(13u32, 3, "track_limits", 0.3).with_severity(0.2),
        EventRecord::new(22u32, 1, "spin", 6.0)
            .with_severity(1.0)
            .with_role("race_turning_point"),
    ]
}

fn minimal() -> RaceFactsBuilder {
    RaceFactsBuilder::new()
        .race(RaceMeta::new("Race 1", "Road America"))
        .results(results())
        .lap_times(laps())
}

fn full() -> RaceFactsBuilder {
    minimal()
        .telemetry_aggregates(vec![TelemetryAggregateRow {
            vehicle: VehicleRef::from(72u32),
            metrics: [("steering_variance_mean".to_string(), 1500.0)].into_iter().collect(),
        }])
        .lap_aggregates(vec![LapAggregateRow {
            vehicle: VehicleRef::from(13u32),
            lap: 2,
            metrics: [("max_speed".to_string(), 198.4)].into_iter().collect(),
        }])
        .driver_aggregates(vec![
            DriverAggregateRow::new("GR86-004-13")
                .with_metric("lap_time_mean", 150.5)
                .with_metric("brake_spikes_sum", 6200.0),
            DriverAggregateRow::new("GR86-099-99").with_metric("lap_time_mean", 160.0),
        ])
        .events(events())
        .class_results(vec![ClassResultRow {
            vehicle: VehicleRef::from(22u32),
            class: Some("Pro".to_string()),
            class_position: Some(1),
        }])
        .sectors(sectors())
        .weather(vec![
            WeatherSample {
                air_temp: Some(24.0),
                track_temp: Some(38.0),
                rain: Some(0.0),
                ..WeatherSample::default()
            },
            WeatherSample {
                air_temp: Some(26.0),
                track_temp: Some(40.0),
                rain: Some(0.0),
                ..WeatherSample::default()
            },
        ])
        .best_laps(vec![BestLapsRow {
            vehicle: VehicleRef::from(72u32),
            best_laps: vec![
                TimeValue::Text("2:31.250".to_string()),
                TimeValue::Seconds(151.5),
            ],
        }])
}

#[test]
fn every_results_vehicle_appears_exactly_once() {
    let assembly = full().assemble().unwrap();
    let ids: Vec<&str> = assembly
        .facts
        .drivers
        .iter()
        .filter(|d| d.classified)
        .map(|d| d.vehicle_id.as_str())
        .collect();

    assert_eq!(ids, vec!["GR86-004-13", "GR86-026-72", "GR86-010-22", "GR86-033-5"]);
    let unique: BTreeSet<&str> = ids.iter().copied().collect();
    assert_eq!(unique.len(), ids.len());
}

#[test]
fn assembly_is_deterministic() {
    let first = full().assemble().unwrap();
    let second = full().assemble().unwrap();

    assert_eq!(first.facts.to_json().unwrap(), second.facts.to_json().unwrap());
    assert_eq!(first.facts.fingerprint().unwrap(), second.facts.fingerprint().unwrap());
    assert_eq!(first.diagnostics, second.diagnostics);
}

#[test]
fn optional_tables_degrade_to_omitted_sections() {
    let assembly = minimal().assemble().unwrap();
    let facts = &assembly.facts;

    assert!(facts.weather_summary.is_none());
    assert!(facts.sector_summary.is_none());
    assert!(facts.race_key_events.is_empty());
    assert!(!facts.availability.sectors);
    assert!(!facts.availability.events);
    assert!(facts.drivers.iter().all(|d| d.sector_insight.is_none()));
    assert!(facts.drivers.iter().all(|d| d.key_events.is_empty()));

    assert!(assembly.diagnostics.any(|d| matches!(
        d,
        Diagnostic::OptionalInputAbsent {
            table: InputTable::Weather
        }
    )));

    let json = facts.to_json().unwrap();
    assert!(!json.contains("weather_summary"));
    assert!(!json.contains("sector_summary"));
}

#[test]
fn dns_vehicle_is_listed_without_laps() {
    let assembly = minimal().assemble().unwrap();
    let dns = assembly
        .facts
        .driver(&VehicleId::new("GR86-033-5"))
        .unwrap();

    assert_eq!(dns.finish_position, None);
    assert!(dns.total_time_seconds.is_none());
    assert!(assembly.diagnostics.any(|d| matches!(
        d,
        Diagnostic::NoLapData { vehicle_id } if vehicle_id.as_str() == "GR86-033-5"
    )));
}

#[test]
fn full_assembly_joins_every_table() {
    let assembly = full().assemble().unwrap();
    let facts = &assembly.facts;

    assert_eq!(facts.race.event_name, "Race 1");
    assert_eq!(facts.race.total_laps, 3);
    assert_eq!(facts.lap_times.len(), 9);

    let leader = facts.driver(&VehicleId::new("GR86-004-13")).unwrap();
    assert_eq!(leader.car_number, Some(13));
    assert!(leader.style_tags.iter().any(|t| t == "aggressive_braking"));
    assert!(leader.sector_insight.is_some());
    let classification = leader.classification.as_ref().unwrap();
    assert_eq!(classification.class.as_deref(), Some("Am"));

    let lap_two = facts
        .lap_times
        .iter()
        .find(|l| l.vehicle_id.as_str() == "GR86-004-13" && l.lap == 2)
        .unwrap();
    assert_eq!(lap_two.metrics.get("max_speed"), Some(&198.4));

    let second = facts.driver(&VehicleId::new("GR86-026-72")).unwrap();
    assert!(second.style_tags.iter().any(|t| t == "erratic_steering"));
    assert_eq!(second.key_events.len(), 1);
    assert_eq!(second.key_events[0].event_id.as_str(), "ev-72-lockup");

    let weather = facts.weather_summary.as_ref().unwrap();
    assert_eq!(weather.air_temp_mean, Some(25.0));
    assert!(!weather.rain_flag);

    let sectors = facts.sector_summary.as_ref().unwrap();
    assert_eq!(sectors.sectors.len(), 3);

    let spin_loss = facts.what_if_base.total_event_loss_seconds[&VehicleId::new("GR86-010-22")];
    assert_eq!(spin_loss, 6.0);
    assert!(facts.race_key_events.iter().any(|e| e.event_type == "spin"));
}

#[test]
fn aggregate_only_vehicle_is_flagged_unclassified() {
    let assembly = full().assemble().unwrap();
    let stray = assembly
        .facts
        .drivers
        .iter()
        .find(|d| !d.classified)
        .unwrap();

    assert_eq!(stray.vehicle_id.as_str(), "GR86-099-99");
    assert_eq!(stray.finish_position, None);
    assert!(assembly.diagnostics.any(|d| matches!(
        d,
        Diagnostic::UnclassifiedVehicle {
            table: InputTable::DriverAggregates,
            ..
        }
    )));
}

#[test]
fn number_only_result_sharing_a_car_number_is_kept() {
    let results = vec![
        ResultRow::vehicle("GR86-001-5").with_number(5).with_position(1),
        ResultRow {
            number: Some(5),
            position: Some(2),
            ..ResultRow::default()
        },
    ];
    let assembly = RaceFactsBuilder::new()
        .race(RaceMeta::new("Race 1", "Road America"))
        .results(results)
        .lap_times(vec![LapRow::new("GR86-001-5", 1, 150.0)])
        .assemble()
        .unwrap();

    let ids: Vec<&str> = assembly
        .facts
        .drivers
        .iter()
        .map(|d| d.vehicle_id.as_str())
        .collect();
    assert_eq!(ids, vec!["GR86-001-5", "5"]);
    assert_eq!(assembly.facts.classification_summary.entries, 2);
    assert_eq!(assembly.facts.drivers[1].finish_position, Some(2));
    assert!(!assembly.diagnostics.any(|d| matches!(
        d,
        Diagnostic::UnresolvedIdentity {
            table: InputTable::Results,
            ..
        }
    )));
}
