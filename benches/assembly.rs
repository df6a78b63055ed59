use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion, Throughput};

use racefacts::{
    AliasTable, AnalysisConfig, EventCatalog, EventId, EventRecord, LapRow, LapTable,
    RaceFactsBuilder, RaceMeta, ResultRow, Scenario, SectorRow, SectorTable,
};

const VEHICLES: u32 = 30;
const LAPS: u32 = 40;

struct Race {
    results: Vec<ResultRow>,
    laps: Vec<LapRow>,
    sectors: SectorTable,
    events: Vec<EventRecord>,
}

// 30 cars over 40 laps, one lockup every fifth lap per car.
fn synthetic_race() -> Race {
    let mut results = Vec::new();
    let mut laps = Vec::new();
    let mut sector_rows = Vec::new();
    let mut events = Vec::new();

    for car in 1..=VEHICLES {
        results.push(
            ResultRow::vehicle(format!("GR86-{car:03}-{car}"))
                .with_number(car)
                .with_position(car)
                .with_class(if car % 2 == 0 { "Am" } else { "Pro" }),
        );
        for lap in 1..=LAPS {
            let jitter = f64::from((car * 7 + lap * 13) % 11) * 0.05;
            let base = 150.0 + f64::from(car) * 0.2 + jitter;
            laps.push(LapRow::new(car, lap, base));
            sector_rows.push(SectorRow::new(
                car,
                lap,
                [("S1", base * 0.3), ("S2", base * 0.4), ("S3", base * 0.3)],
            ));
            if lap % 5 == 0 {
                events.push(
                    EventRecord::new(car, lap, "lockup", 0.4 + jitter)
                        .with_id(format!("ev-{car}-{lap}"))
                        .with_severity(jitter),
                );
            }
        }
    }

    Race {
        results,
        laps,
        sectors: SectorTable::new(sector_rows),
        events,
    }
}

fn bench_assemble(c: &mut Criterion) {
    let race = synthetic_race();
    let mut group = c.benchmark_group("assembly");
    group.throughput(Throughput::Elements(u64::from(VEHICLES * LAPS)));
    group.bench_function("assemble_full", |b| {
        b.iter(|| {
            let assembly = RaceFactsBuilder::new()
                .race(RaceMeta::new("Bench", "Road America"))
                .results(race.results.clone())
                .lap_times(race.laps.clone())
                .sectors(race.sectors.clone())
                .events(race.events.clone())
                .assemble()
                .unwrap();
            black_box(assembly.facts.fingerprint().unwrap())
        });
    });
    group.finish();
}

fn bench_scenarios(c: &mut Criterion) {
    let race = synthetic_race();
    let (aliases, _) = AliasTable::from_results(&race.results);
    let (laps, _) = LapTable::from_rows(&race.laps, &aliases);
    let (catalog, _) = EventCatalog::from_records(&race.events, &aliases);
    let config = AnalysisConfig::default();

    let scenarios: Vec<Scenario> = (1..=VEHICLES)
        .map(|car| {
            let remove = (1..=LAPS / 5)
                .map(|i| EventId::new(format!("ev-{car}-{}", i * 5)))
                .collect();
            Scenario::new(format!("clean #{car}"), remove)
        })
        .collect();

    c.bench_function("what_if/simulate_scenarios", |b| {
        b.iter(|| {
            black_box(racefacts::simulate_scenarios(
                &laps,
                &catalog,
                &race.results,
                &aliases,
                &config,
                &scenarios,
            ))
        });
    });
}

criterion_group!(benches, bench_assemble, bench_scenarios);
criterion_main!(benches);
