//! Error types for racefacts.
//!
//! All errors are strongly typed using thiserror. Per-row problems
//! (an unresolvable car number, an unparsable lap time) are recorded as
//! diagnostics by the component that hits them; only structural problems
//! abort a call.

use serde::Serialize;
use thiserror::Error;

use crate::identity::VehicleId;

/// A vehicle alias could not be mapped to a canonical id.
///
/// Rows carrying such an alias are excluded from aggregation and listed in
/// the diagnostics returned with the result.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IdentityResolutionError {
    #[error("car number {number} does not appear in the official results")]
    UnknownCarNumber { number: u32 },

    #[error("car number {number} is claimed by several vehicles: {candidates:?}")]
    AmbiguousCarNumber {
        number: u32,
        candidates: Vec<VehicleId>,
    },

    #[error("row has no vehicle identifier")]
    EmptyIdentifier,

    #[error("vehicle {vehicle} is listed more than once in the results")]
    DuplicateVehicle { vehicle: VehicleId },
}

/// An event filter was empty or malformed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidFilterError {
    #[error("at least one event filter (vehicle, event type or role) is required")]
    NoFilters,

    #[error("event filter '{field}' cannot be blank")]
    BlankValue { field: String },
}

/// A comparison or payload was requested for a driver absent from a result set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("driver {driver_id} not found in scenario '{scenario}'")]
pub struct DriverNotFoundError {
    /// The requested driver.
    pub driver_id: VehicleId,
    /// Label of the result set the driver was missing from.
    pub scenario: String,
}

/// One of the inputs without which no race facts can be produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MissingRequiredInputError {
    #[error("race metadata is missing or has a blank name")]
    RaceMetadata,

    #[error("lap table is missing or empty")]
    LapTable,

    #[error("official results are missing or empty")]
    Results,
}

/// A lap-time string could not be converted to seconds.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot parse lap time '{raw}': {reason}")]
pub struct TimeParseError {
    /// The offending input.
    pub raw: String,
    /// What was wrong with it.
    pub reason: String,
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {reason}")]
    Invalid { reason: String },

    #[error("failed to read configuration from {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Top-level error type for racefacts.
#[derive(Debug, Error)]
pub enum RaceError {
    #[error("Identity error: {0}")]
    Identity(#[from] IdentityResolutionError),

    #[error("Invalid filter: {0}")]
    InvalidFilter(#[from] InvalidFilterError),

    #[error("Driver not found: {0}")]
    DriverNotFound(#[from] DriverNotFoundError),

    #[error("Missing required input: {0}")]
    MissingRequiredInput(#[from] MissingRequiredInputError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Serialization error: {message}")]
    Serialization { message: String },
}

impl RaceError {
    /// Creates a serialization error.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Returns true if this is an invalid-filter error.
    #[must_use]
    pub const fn is_invalid_filter(&self) -> bool {
        matches!(self, Self::InvalidFilter(_))
    }

    /// Returns true if this is a driver-not-found error.
    #[must_use]
    pub const fn is_driver_not_found(&self) -> bool {
        matches!(self, Self::DriverNotFound(_))
    }

    /// Returns true if a required input was missing.
    #[must_use]
    pub const fn is_missing_input(&self) -> bool {
        matches!(self, Self::MissingRequiredInput(_))
    }

    /// Returns true if this is a configuration error.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

/// Result type alias for racefacts operations.
pub type RaceResult<T> = Result<T, RaceError>;
