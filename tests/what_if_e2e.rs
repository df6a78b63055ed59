use racefacts::{
    baseline, build_what_if_payload, compare, event_ids, filter_events_for_removal, simulate,
    simulate_event_removal_by_role, simulate_scenarios, AdjustedResults, AliasTable,
    AnalysisConfig, EventCatalog, EventFilter, EventId, EventRecord, InvalidFilterError, LapRow,
    LapTable, RaceFactsBuilder, RaceMeta, ResultImprovement, ResultRow, Scenario, VehicleId,
};

struct Field {
    results: Vec<ResultRow>,
    aliases: AliasTable,
    laps: LapTable,
    catalog: EventCatalog,
}

fn lap_rows() -> Vec<LapRow> {
    // totals: A 100, B 105, C 110
    vec![
        LapRow::new(1u32, 1, 50.0),
        LapRow::new(1u32, 2, 50.0),
        LapRow::new(2u32, 1, 52.0),
        LapRow::new(2u32, 2, 53.0),
        LapRow::new(3u32, 1, 54.0),
        LapRow::new(3u32, 2, 56.0),
    ]
}

fn field() -> Field {
    let results = vec![
        ResultRow::vehicle("GR86-001-1").with_number(1).with_position(1),
        ResultRow::vehicle("GR86-002-2").with_number(2).with_position(2),
        ResultRow::vehicle("GR86-003-3").with_number(3).with_position(3),
    ];
    let (aliases, _) = AliasTable::from_results(&results);
    let (laps, _) = LapTable::from_rows(&lap_rows(), &aliases);
    let records = vec![
        EventRecord::new(3u32, 2, "spin", 12.0)
            .with_id("c-spin")
            .with_role("race_turning_point"),
        EventRecord::new(2u32, 1, "lockup", 2.0).with_id("b-lockup"),
        EventRecord::new(1u32, 2, "lockup", 0.5).with_id("a-lockup"),
    ];
    let (catalog, _) = EventCatalog::from_records(&records, &aliases);
    Field {
        results,
        aliases,
        laps,
        catalog,
    }
}

fn run(f: &Field, remove: &[EventId]) -> AdjustedResults {
    simulate(
        &f.laps,
        &f.catalog,
        remove,
        &f.results,
        &f.aliases,
        &AnalysisConfig::default(),
    )
}

#[test]
fn removing_a_spin_promotes_the_last_car() {
    let f = field();
    let original = baseline(&f.laps, &f.catalog, &f.results, &f.aliases, &AnalysisConfig::default());
    let spin = filter_events_for_removal(&f.catalog, &EventFilter::new().event_type("spin")).unwrap();
    let adjusted = run(&f, &event_ids(&spin));

    let positions = adjusted.positions();
    assert_eq!(positions[&VehicleId::new("GR86-003-3")], 1);
    assert_eq!(positions[&VehicleId::new("GR86-001-1")], 2);
    assert_eq!(positions[&VehicleId::new("GR86-002-2")], 3);
    assert_eq!(
        adjusted.get(&VehicleId::new("GR86-003-3")).unwrap().adjusted_total_time,
        98.0
    );

    let payload =
        build_what_if_payload(&VehicleId::new("GR86-003-3"), "no spin", &original, &adjusted).unwrap();
    assert_eq!(payload.time_gain_seconds, 12.0);
    assert_eq!(payload.original_position, 3);
    assert_eq!(payload.adjusted_position, 1);
    assert_eq!(payload.position_change, 2);
    assert_eq!(payload.result_improvement, ResultImprovement::Improved);

    let json = serde_json::to_value(&payload).unwrap();
    assert_eq!(json["result_improvement"], "improved");
}

#[test]
fn adjusted_positions_are_a_permutation() {
    let f = field();
    let every: Vec<EventId> = f.catalog.events().iter().map(|e| e.event_id.clone()).collect();
    for remove in [Vec::new(), vec![EventId::new("b-lockup")], every] {
        let adjusted = run(&f, &remove);
        let mut positions: Vec<u32> = adjusted.entries.iter().map(|e| e.adjusted_position).collect();
        positions.sort_unstable();
        assert_eq!(positions, vec![1, 2, 3]);
    }
}

#[test]
fn filters_are_validated() {
    let f = field();
    assert_eq!(
        filter_events_for_removal(&f.catalog, &EventFilter::new()).unwrap_err(),
        InvalidFilterError::NoFilters
    );
    assert!(matches!(
        filter_events_for_removal(&f.catalog, &EventFilter::new().event_type(" ")).unwrap_err(),
        InvalidFilterError::BlankValue { .. }
    ));

    let none = filter_events_for_removal(
        &f.catalog,
        &EventFilter::new().vehicle("GR86-001-1").event_type("spin"),
    )
    .unwrap();
    assert!(none.is_empty());
}

#[test]
fn comparison_keeps_supplied_order() {
    let f = field();
    let scenarios = vec![
        Scenario::new("clean race", f.catalog.events().iter().map(|e| e.event_id.clone()).collect()),
        Scenario::new("no spin", vec![EventId::new("c-spin")]),
    ];
    let runs = simulate_scenarios(
        &f.laps,
        &f.catalog,
        &f.results,
        &f.aliases,
        &AnalysisConfig::default(),
        &scenarios,
    );
    let refs: Vec<(&str, &AdjustedResults)> = runs.iter().map(|(l, r)| (l.as_str(), r)).collect();

    let report = compare(&refs, &VehicleId::new("GR86-002-2")).unwrap();
    assert_eq!(report.labels().collect::<Vec<_>>(), vec!["clean race", "no spin"]);
    assert_eq!(report.get("clean race").unwrap().time_gain, 2.0);
    assert_eq!(report.get("no spin").unwrap().time_gain, 0.0);
    assert_eq!(report.get("no spin").unwrap().position, 3);
}

#[test]
fn role_removal_simulates_each_vehicle_alone() {
    let f = field();
    let payloads = simulate_event_removal_by_role(
        &f.laps,
        &f.catalog,
        &f.results,
        &f.aliases,
        &AnalysisConfig::default(),
        "race_turning_point",
    )
    .unwrap();

    assert_eq!(payloads.len(), 1);
    let c = &payloads[&VehicleId::new("GR86-003-3")];
    assert_eq!(c.adjusted_position, 1);
    assert_eq!(c.scenario, "Remove all race_turning_point events");
}

#[test]
fn simulation_runs_on_assembled_inputs() {
    let f = field();
    let assembly = RaceFactsBuilder::new()
        .race(RaceMeta::new("Race 2", "Sonoma"))
        .results(f.results.clone())
        .lap_times(lap_rows())
        .assemble()
        .unwrap();
    let base = &assembly.facts.what_if_base.total_time_seconds;

    let adjusted = run(&f, &[EventId::new("c-spin")]);
    for entry in &adjusted.entries {
        assert_eq!(base[&entry.vehicle_id], entry.original_total_time);
    }
}
