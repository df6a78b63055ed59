//! Vehicle identity and alias resolution.
//!
//! Timing tables disagree on how they name a car: official results carry both
//! the bare car number and a composite `CLASS-CHASSIS-NUMBER` id, sector and
//! best-lap exports only the number, telemetry pipelines only the composite id.
//! The [`AliasTable`] is built once per race from the results and is the single
//! place where any alias becomes a canonical [`VehicleId`].

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::diagnostics::{Diagnostic, InputTable};
use crate::error::IdentityResolutionError;
use crate::input::ResultRow;

/// Canonical vehicle identifier, the join key across every table.
///
/// # Examples
///
/// ```
/// use racefacts::VehicleId;
///
/// let id = VehicleId::new("GR86-026-72");
/// assert_eq!(id.as_str(), "GR86-026-72");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VehicleId(String);

impl VehicleId {
    /// Creates a vehicle id, trimming surrounding whitespace.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.len() == id.len() {
            Self(id)
        } else {
            Self(trimmed.to_string())
        }
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VehicleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VehicleId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// A vehicle identifier exactly as an input table spelled it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VehicleRef {
    /// Bare car number.
    Number(u32),
    /// Composite or free-form id. All-digit strings are treated as numbers.
    Composite(String),
}

impl From<u32> for VehicleRef {
    fn from(number: u32) -> Self {
        Self::Number(number)
    }
}

impl From<&str> for VehicleRef {
    fn from(raw: &str) -> Self {
        Self::Composite(raw.to_string())
    }
}

impl From<&VehicleId> for VehicleRef {
    fn from(id: &VehicleId) -> Self {
        Self::Composite(id.as_str().to_string())
    }
}

impl fmt::Display for VehicleRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "#{n}"),
            Self::Composite(s) => f.write_str(s),
        }
    }
}

/// Parsed form of a `CLASS-CHASSIS-NUMBER` vehicle id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositeId {
    /// Class or model prefix, e.g. `GR86`.
    pub class: String,
    /// Chassis number as written (leading zeros kept).
    pub chassis: String,
    /// Car number.
    pub number: u32,
}

fn composite_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(?P<class>[A-Za-z0-9]+)-(?P<chassis>[0-9]+)-(?P<number>[0-9]+)$")
            .unwrap_or_else(|e| unreachable!("static composite id pattern: {e}"))
    })
}

/// Parses a composite vehicle id. Returns `None` for anything else.
///
/// # Examples
///
/// ```
/// use racefacts::identity::parse_composite;
///
/// let parsed = parse_composite("GR86-026-72").unwrap();
/// assert_eq!(parsed.number, 72);
/// assert_eq!(parsed.chassis, "026");
/// ```
#[must_use]
pub fn parse_composite(raw: &str) -> Option<CompositeId> {
    let caps = composite_pattern().captures(raw.trim())?;
    Some(CompositeId {
        class: caps["class"].to_string(),
        chassis: caps["chassis"].to_string(),
        number: caps["number"].parse().ok()?,
    })
}

fn as_number(raw: &str) -> Option<u32> {
    let raw = raw.trim();
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    raw.parse().ok()
}

/// Canonical id and car number a results row stands for: its composite
/// vehicle string when present, otherwise its bare car number.
fn result_identity(row: &ResultRow) -> Option<(VehicleId, Option<u32>)> {
    let composite = row
        .vehicle
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty());

    match (composite, row.number) {
        (Some(v), explicit) => {
            let number = explicit
                .or_else(|| as_number(v))
                .or_else(|| parse_composite(v).map(|c| c.number));
            let id = match as_number(v) {
                Some(n) => VehicleId::new(n.to_string()),
                None => VehicleId::new(v),
            };
            Some((id, number))
        }
        (None, Some(n)) => Some((VehicleId::new(n.to_string()), Some(n))),
        (None, None) => None,
    }
}

/// Mapping from every alias observed in a race to its canonical vehicle id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasTable {
    canonical: BTreeSet<VehicleId>,
    by_number: BTreeMap<u32, VehicleId>,
    ambiguous: BTreeMap<u32, Vec<VehicleId>>,
    number_of: BTreeMap<VehicleId, u32>,
}

impl AliasTable {
    /// Builds the alias table from the official results.
    ///
    /// Each row contributes one canonical id: its composite vehicle string when
    /// present, otherwise its bare car number. The car number (explicit, or
    /// parsed from the composite id) becomes an alias of that id. Rows that
    /// cannot contribute are reported and skipped.
    #[must_use]
    pub fn from_results(results: &[ResultRow]) -> (Self, Vec<Diagnostic>) {
        let mut table = Self::default();
        let mut diagnostics = Vec::new();

        for (row_idx, row) in results.iter().enumerate() {
            let Some((id, number)) = result_identity(row) else {
                diagnostics.push(identity_diagnostic(
                    InputTable::Results,
                    row_idx,
                    &IdentityResolutionError::EmptyIdentifier,
                ));
                continue;
            };

            if !table.canonical.insert(id.clone()) {
                diagnostics.push(identity_diagnostic(
                    InputTable::Results,
                    row_idx,
                    &IdentityResolutionError::DuplicateVehicle { vehicle: id },
                ));
                continue;
            }

            if let Some(number) = number {
                table.register_number(number, id);
            }
        }

        debug!(
            vehicles = table.canonical.len(),
            numbers = table.by_number.len(),
            ambiguous = table.ambiguous.len(),
            "alias table built"
        );

        (table, diagnostics)
    }

    fn register_number(&mut self, number: u32, id: VehicleId) {
        if let Some(candidates) = self.ambiguous.get_mut(&number) {
            candidates.push(id);
            return;
        }
        match self.by_number.remove(&number) {
            None => {
                self.number_of.insert(id.clone(), number);
                self.by_number.insert(number, id);
            }
            Some(existing) => {
                warn!(number, first = %existing, second = %id, "car number claimed twice");
                self.number_of.insert(id.clone(), number);
                self.ambiguous.insert(number, vec![existing, id]);
            }
        }
    }

    /// Resolves an alias to its canonical id.
    ///
    /// Composite ids are authoritative: one not listed in the results still
    /// resolves to itself, and callers flag it as unclassified.
    pub fn resolve(&self, alias: &VehicleRef) -> Result<VehicleId, IdentityResolutionError> {
        match alias {
            VehicleRef::Number(n) => self.resolve_number(*n),
            VehicleRef::Composite(raw) => {
                let raw = raw.trim();
                if raw.is_empty() {
                    return Err(IdentityResolutionError::EmptyIdentifier);
                }
                if let Some(n) = as_number(raw) {
                    return self.resolve_number(n);
                }
                Ok(VehicleId::new(raw))
            }
        }
    }

    fn resolve_number(&self, number: u32) -> Result<VehicleId, IdentityResolutionError> {
        if let Some(id) = self.by_number.get(&number) {
            return Ok(id.clone());
        }
        if let Some(candidates) = self.ambiguous.get(&number) {
            return Err(IdentityResolutionError::AmbiguousCarNumber {
                number,
                candidates: candidates.clone(),
            });
        }
        Err(IdentityResolutionError::UnknownCarNumber { number })
    }

    /// Resolves the canonical id a result row contributed.
    ///
    /// A row registered by [`from_results`](Self::from_results) always maps
    /// back to its own id, even when its car number is shared. Rows from
    /// another results table fall back to alias resolution.
    pub fn resolve_result(&self, row: &ResultRow) -> Result<VehicleId, IdentityResolutionError> {
        let (id, _) = result_identity(row).ok_or(IdentityResolutionError::EmptyIdentifier)?;
        if self.canonical.contains(&id) {
            return Ok(id);
        }
        match as_number(id.as_str()) {
            Some(n) => self.resolve_number(n),
            None => Ok(id),
        }
    }

    /// Resolves every row of a table, dropping unresolvable rows.
    ///
    /// One [`Diagnostic::UnresolvedIdentity`] is pushed per excluded row. The
    /// returned `(row index, id, row)` triples keep the original row order.
    pub fn resolve_rows<'a, T>(
        &self,
        table: InputTable,
        rows: &'a [T],
        key: impl Fn(&T) -> &VehicleRef,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Vec<(usize, VehicleId, &'a T)> {
        let mut resolved = Vec::with_capacity(rows.len());
        for (row_idx, row) in rows.iter().enumerate() {
            match self.resolve(key(row)) {
                Ok(id) => resolved.push((row_idx, id, row)),
                Err(err) => {
                    warn!(%table, row = row_idx, error = %err, "excluding row with unresolved vehicle");
                    diagnostics.push(identity_diagnostic(table, row_idx, &err));
                }
            }
        }
        resolved
    }

    /// True if the vehicle is listed in the official results.
    #[must_use]
    pub fn is_classified(&self, id: &VehicleId) -> bool {
        self.canonical.contains(id)
    }

    /// The car number registered for a vehicle.
    #[must_use]
    pub fn car_number(&self, id: &VehicleId) -> Option<u32> {
        self.number_of.get(id).copied()
    }

    /// Vehicles listed in the results, in id order.
    pub fn vehicles(&self) -> impl Iterator<Item = &VehicleId> {
        self.canonical.iter()
    }

    /// Number of canonical vehicles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.canonical.len()
    }

    /// True if no vehicle was registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.canonical.is_empty()
    }
}

/// Wraps an identity failure into a row-level diagnostic.
#[must_use]
pub fn identity_diagnostic(
    table: InputTable,
    row: usize,
    err: &IdentityResolutionError,
) -> Diagnostic {
    Diagnostic::UnresolvedIdentity {
        table,
        row,
        reason: err.to_string(),
    }
}
