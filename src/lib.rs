//! # racefacts - Race facts assembly and counterfactual simulation
//!
//! racefacts reconciles the independently keyed tables produced for one
//! motorsport race (lap times, aggregates, detected events, official results,
//! sector times, weather) into a single deterministic record, and recomputes
//! race outcomes with chosen incidents removed.
//!
//! ## Core Concepts
//!
//! - **AliasTable**: maps every car number and composite id seen in a race to
//!   one canonical [`VehicleId`]
//! - **RaceFacts**: the enriched per-race record built by [`RaceFactsBuilder`]
//! - **SectorInsight / ClassificationInsight**: per-driver derived statistics
//! - **AdjustedResults**: a re-ranked field with event time losses removed
//!
//! ## Usage
//!
//! ```rust,ignore
//! use racefacts::{LapRow, RaceFactsBuilder, RaceMeta, ResultRow};
//!
//! let assembly = RaceFactsBuilder::new()
//!     .race(RaceMeta::new("Race 1", "Road America"))
//!     .results(vec![ResultRow::vehicle("GR86-026-72").with_position(1)])
//!     .lap_times(vec![LapRow::new(72u32, 1, 152.3)])
//!     .assemble()?;
//!
//! println!("{}", assembly.facts.to_json_pretty()?);
//! for diagnostic in &assembly.diagnostics {
//!     eprintln!("{diagnostic}");
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Identity and input tables
pub mod diagnostics;
pub mod error;
pub mod event;
pub mod identity;
pub mod input;
pub mod laps;
pub mod stats;
pub mod time;

// Engines
pub mod classification;
pub mod config;
pub mod facts;
pub mod sector;
pub mod simulation;

pub use classification::{
    compute_classification, pace_consistency, pace_stability_index, ClassificationAnalysis, ClassificationInsight,
    ClassificationSummary, FastestLap, FinishStatus, PaceConsistency,
};
pub use config::{AnalysisConfig, FatigueSectors};
pub use diagnostics::{Diagnostic, Diagnostics, InputTable};
pub use error::{
    ConfigError, DriverNotFoundError, IdentityResolutionError, InvalidFilterError,
    MissingRequiredInputError, RaceError, RaceResult, TimeParseError,
};
pub use event::{Event, EventCatalog, EventId, EventRecord};
pub use facts::{
    Assembly, DriverEntry, InputAvailability, LapTimeEntry, RaceFacts, RaceFactsBuilder,
    RaceHeader, StyleThresholds, WeatherSample, WeatherSummary, WhatIfBase,
};
pub use identity::{AliasTable, CompositeId, VehicleId, VehicleRef};
pub use input::{
    BestLapsRow, ClassResultRow, DriverAggregateRow, LapAggregateRow, LapRow, RaceMeta, ResultRow,
    TelemetryAggregateRow,
};
pub use laps::{Lap, LapTable, LapType};
pub use sector::{
    compute_sector_insights, sector_pace_profile, SectorAnalysis, SectorInsight, SectorName,
    SectorPaceProfile, SectorRow, SectorSummary, SectorTable,
};
pub use simulation::{
    baseline, build_what_if_payload, compare, event_ids, filter_events_for_removal, simulate,
    simulate_event_removal_by_role, simulate_scenarios, AdjustedEntry, AdjustedResults,
    ComparisonReport, EventFilter, RankingRule, ResultImprovement, Scenario, ScenarioOutcome,
    WhatIfPayload,
};
pub use time::{parse_lap_time, TimeValue};
