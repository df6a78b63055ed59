//! Analysis configuration.
//!
//! Everything track- or series-specific lives here: the status vocabulary of
//! the timing provider, which sectors count as "early" and "late" for the
//! fatigue indicator, how many laps make up peak pace, and the thresholds for
//! inferred style tags.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::classification::FinishStatus;
use crate::error::ConfigError;
use crate::facts::style::StyleThresholds;
use crate::simulation::RankingRule;

/// The sector pair compared by the fatigue indicator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FatigueSectors {
    /// Reference ("early") sector.
    pub early: String,
    /// Compared ("late") sector.
    pub late: String,
}

/// Configuration shared by every engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Status token to finishing status. Tokens match ignoring case and
    /// surrounding whitespace.
    pub status_map: BTreeMap<String, FinishStatus>,
    /// Sector pair for the fatigue indicator. `None` compares the first and
    /// last sector of the sector table.
    pub fatigue_sectors: Option<FatigueSectors>,
    /// Number of fastest laps averaged into peak pace.
    pub peak_pace_laps: usize,
    /// Laps slower than this are formation or out laps and are left out of
    /// racing-lap metrics.
    pub formation_lap_seconds: f64,
    /// Maximum role-tagged events listed as race key events.
    pub key_event_limit: usize,
    /// Maximum events listed by severity when no event carries a role.
    pub severity_event_limit: usize,
    /// How adjusted results are ranked.
    pub ranking: RankingRule,
    /// Thresholds for inferred driver style tags.
    pub style: StyleThresholds,
}

fn status_token(raw: &str) -> String {
    raw.trim().to_uppercase()
}

fn default_status_map() -> BTreeMap<String, FinishStatus> {
    [
        ("CLASSIFIED", FinishStatus::Finished),
        ("FINISHED", FinishStatus::Finished),
        ("RUNNING", FinishStatus::Finished),
        ("DNF", FinishStatus::Retired),
        ("RETIRED", FinishStatus::Retired),
        ("NOT CLASSIFIED", FinishStatus::Retired),
        ("NC", FinishStatus::Retired),
        ("DNS", FinishStatus::Dns),
        ("DID NOT START", FinishStatus::Dns),
        ("DSQ", FinishStatus::Dsq),
        ("DQ", FinishStatus::Dsq),
        ("DISQUALIFIED", FinishStatus::Dsq),
        ("EXCLUDED", FinishStatus::Dsq),
    ]
    .into_iter()
    .map(|(token, status)| (token.to_string(), status))
    .collect()
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            status_map: default_status_map(),
            fatigue_sectors: None,
            peak_pace_laps: 3,
            formation_lap_seconds: 400.0,
            key_event_limit: 20,
            severity_event_limit: 10,
            ranking: RankingRule::default(),
            style: StyleThresholds::default(),
        }
    }
}

impl AnalysisConfig {
    /// Parses a configuration from JSON and validates it.
    ///
    /// Missing fields take their default values.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_json::from_str(json)?;
        config.status_map = config
            .status_map
            .into_iter()
            .map(|(token, status)| (status_token(&token), status))
            .collect();
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates a JSON configuration file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&data)
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.status_map.is_empty() {
            return Err(ConfigError::Invalid {
                reason: "status_map must not be empty".to_string(),
            });
        }
        let mut seen: BTreeMap<String, FinishStatus> = BTreeMap::new();
        for (token, &status) in &self.status_map {
            let normalized = status_token(token);
            if normalized.is_empty() {
                return Err(ConfigError::Invalid {
                    reason: "status_map tokens must not be blank".to_string(),
                });
            }
            if seen.insert(normalized.clone(), status).is_some_and(|prev| prev != status) {
                return Err(ConfigError::Invalid {
                    reason: format!("status token '{normalized}' maps to two statuses"),
                });
            }
        }
        if self.peak_pace_laps == 0 {
            return Err(ConfigError::Invalid {
                reason: "peak_pace_laps must be > 0".to_string(),
            });
        }
        if self.key_event_limit == 0 || self.severity_event_limit == 0 {
            return Err(ConfigError::Invalid {
                reason: "event limits must be > 0".to_string(),
            });
        }
        if !self.formation_lap_seconds.is_finite() || self.formation_lap_seconds <= 0.0 {
            return Err(ConfigError::Invalid {
                reason: "formation_lap_seconds must be a positive number".to_string(),
            });
        }
        if let Some(pair) = &self.fatigue_sectors {
            let (early, late) = (pair.early.trim(), pair.late.trim());
            if early.is_empty() || late.is_empty() {
                return Err(ConfigError::Invalid {
                    reason: "fatigue sectors must be named".to_string(),
                });
            }
            if early == late {
                return Err(ConfigError::Invalid {
                    reason: format!("fatigue sectors must differ (both '{early}')"),
                });
            }
        }
        self.style.validate()
    }

    /// Adds or replaces a status token mapping.
    #[must_use]
    pub fn with_status(mut self, token: &str, status: FinishStatus) -> Self {
        self.status_map.insert(status_token(token), status);
        self
    }

    /// Maps a raw status token, ignoring case and surrounding whitespace.
    /// `None` when the token is not configured.
    #[must_use]
    pub fn status_for(&self, raw: &str) -> Option<FinishStatus> {
        let token = status_token(raw);
        self.status_map.get(&token).copied().or_else(|| {
            self.status_map
                .iter()
                .find(|(key, _)| status_token(key) == token)
                .map(|(_, status)| *status)
        })
    }
}
