//! Counterfactual simulation.
//!
//! A scenario removes the estimated time loss of a chosen set of events from
//! the affected vehicles' total race time and re-ranks the field. The model is
//! a linear time adjustment: nothing else about the race changes.

pub mod compare;
pub mod counterfactual;
pub mod filter;
pub mod payload;

use serde::{Deserialize, Serialize};

pub use compare::{compare, simulate_scenarios, ComparisonReport, Scenario, ScenarioOutcome};
pub use counterfactual::{baseline, simulate, AdjustedEntry, AdjustedResults};
pub use filter::{event_ids, filter_events_for_removal, EventFilter};
pub use payload::{
    build_what_if_payload, simulate_event_removal_by_role, ResultImprovement, WhatIfPayload,
};

/// How adjusted results are ranked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankingRule {
    /// Ascending total time only.
    #[default]
    TotalTime,
    /// More laps first, then ascending total time.
    LapsThenTime,
}
