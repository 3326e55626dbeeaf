//! # expost-core: Dispatch-Results Catalog and Snapshot Core
//!
//! Provides the typed catalog, aligned series frames and immutable results
//! snapshot that the ex-post analysis engines (`expost-algo`) operate on.
//!
//! ## Design Philosophy
//!
//! Unit-commitment results arrive as loosely keyed tables: series columns
//! named after units, zones and lines, plus static coefficient tables. This
//! crate resolves every free-form name exactly once, at catalog construction,
//! into a newtype id. After that point a missing entity is a typed lookup
//! failure (`Option`/[`ExpostError`]) and never a silent string-matching
//! surprise.
//!
//! The zone/line topology is a **directed graph** (petgraph) where:
//! - **Nodes**: market zones (including an optional "rest of world" boundary
//!   zone, which the flow tracer excludes)
//! - **Edges**: directed interconnection lines; a line's identity encodes its
//!   two endpoints
//!
//! ## Quick Start
//!
//! ```rust
//! use expost_core::*;
//!
//! let mut catalog = Catalog::new();
//! let be = catalog.add_zone("BE", false).unwrap();
//! let nl = catalog.add_zone("NL", false).unwrap();
//! catalog.add_line(be, nl).unwrap();
//!
//! let mut unit = Unit::new("GasPlant1".to_string(), be);
//! unit.capacity = 400.0;
//! unit.fuel = "GAS".to_string();
//! unit.technology = "COMC".to_string();
//! let id = catalog.push_unit(unit).unwrap();
//!
//! assert_eq!(catalog.unit_by_name("GasPlant1"), Some(id));
//! assert_eq!(catalog.units_in_zone(be).len(), 1);
//! ```
//!
//! ## Modules
//!
//! - [`diagnostics`] - Collected typed warnings/errors ("log and continue")
//! - [`timeindex`] - Fixed-step time index and aggregation windows
//! - [`series`] - Column-per-entity series frames aligned to the index
//! - [`snapshot`] - The immutable results snapshot bundle
//! - [`solver`] - Dense linear-system backends for the flow tracer

use std::collections::HashMap;

use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};

pub mod diagnostics;
pub mod error;
pub mod series;
pub mod snapshot;
pub mod solver;
pub mod timeindex;

pub use diagnostics::{DiagnosticIssue, Diagnostics, Severity};
pub use error::{ExpostError, ExpostResult};
pub use series::{Frame, LineFrame, UnitFrame, ZoneFrame};
pub use snapshot::ResultsSnapshot;
pub use solver::{FaerSolver, GaussSolver, LinearSystemBackend, SolverKind};
pub use timeindex::{TimeIndex, Window};

/// Conventional name of the aggregate boundary zone. Flows to and from this
/// zone are excluded from the tracing matrix.
pub const REST_OF_WORLD: &str = "RoW";

/// Technologies treated as storage when building storage indicators.
pub const STORAGE_TECHS: &[&str] = &["HDAM", "HPHS", "BATS", "BEVS", "CAES", "P2GS", "THMS"];

/// Variable-renewable technologies, used for residual-load curves.
pub const RENEWABLE_TECHS: &[&str] = &["WTON", "WTOF", "PHOT", "HROR"];

// Newtype wrappers for IDs for type safety
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitId(usize);
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ZoneId(usize);
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LineId(usize);

impl UnitId {
    #[inline]
    pub fn new(value: usize) -> Self {
        UnitId(value)
    }
    #[inline]
    pub fn value(&self) -> usize {
        self.0
    }
}

impl ZoneId {
    #[inline]
    pub fn new(value: usize) -> Self {
        ZoneId(value)
    }
    #[inline]
    pub fn value(&self) -> usize {
        self.0
    }
}

impl LineId {
    #[inline]
    pub fn new(value: usize) -> Self {
        LineId(value)
    }
    #[inline]
    pub fn value(&self) -> usize {
        self.0
    }
}

/// CHP coupling type of a unit.
///
/// The heat opportunity-cost term of the objective uses the CHP power-loss
/// factor for `Extraction`/`BackPressure` units; `PowerToHeat` units consume
/// electricity and are priced at the zonal shadow price instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ChpType {
    /// Pure power unit, no heat coupling
    #[default]
    None,
    /// Extraction/condensing steam turbine
    Extraction,
    /// Back-pressure turbine
    BackPressure,
    /// Power-to-heat device (electric boiler, heat pump)
    PowerToHeat,
}

impl ChpType {
    /// Parse the label convention of the upstream plant database.
    pub fn from_label(label: &str) -> ExpostResult<Self> {
        match label.trim() {
            "" => Ok(ChpType::None),
            "Extraction" => Ok(ChpType::Extraction),
            "back-pressure" => Ok(ChpType::BackPressure),
            "P2H" => Ok(ChpType::PowerToHeat),
            other => Err(ExpostError::Parse(format!(
                "unknown CHP type label '{other}'"
            ))),
        }
    }

    /// True for units belonging to the CHP class in fuel cross-tabs.
    pub fn is_chp(&self) -> bool {
        !matches!(self, ChpType::None)
    }
}

/// Static per-unit record. Immutable per run.
///
/// Cost coefficients are `Option`: `None` means the unit was absent from the
/// corresponding coefficient table, which the cost decomposer reports as a
/// reference warning and treats as zero, the unit is never dropped.
#[derive(Debug, Clone)]
pub struct Unit {
    pub id: UnitId,
    pub name: String,
    pub zone: ZoneId,
    pub fuel: String,
    pub technology: String,
    pub chp: ChpType,
    /// Nameplate capacity of a single parallel unit (MW)
    pub capacity: f64,
    /// Number of aggregated parallel units
    pub n_units: f64,
    /// Storage reservoir size (MWh), zero for non-storage units
    pub storage_capacity: f64,
    /// Power output in the step preceding the horizon (MW); the unit counts
    /// as initially committed when this is positive
    pub initial_power: f64,
    /// Fixed cost while committed (EUR/h)
    pub cost_fixed: Option<f64>,
    /// Cost per startup event (EUR)
    pub cost_startup: Option<f64>,
    /// Cost per shutdown event (EUR)
    pub cost_shutdown: Option<f64>,
    /// Ramp-up cost (EUR/MW)
    pub cost_ramp_up: Option<f64>,
    /// Ramp-down cost (EUR/MW)
    pub cost_ramp_down: Option<f64>,
    /// Power lost per unit of heat extracted; `None` when undefined for the
    /// unit, in which case heat is costed at the plain variable cost
    pub chp_power_loss_factor: Option<f64>,
    /// CO2 emission rate (tCO2/MWh)
    pub emission_rate: f64,
    /// Water withdrawal coefficient (m3/MWh)
    pub water_withdrawal: f64,
    /// Water consumption coefficient (m3/MWh)
    pub water_consumption: f64,
    /// Consumption-type unit (power-to-X): costed at the zonal shadow price
    /// instead of its own coefficients
    pub is_consumer: bool,
}

impl Unit {
    /// Create a unit with neutral coefficients in the given zone.
    pub fn new(name: String, zone: ZoneId) -> Self {
        Self {
            id: UnitId(0),
            name,
            zone,
            fuel: String::new(),
            technology: String::new(),
            chp: ChpType::None,
            capacity: 0.0,
            n_units: 1.0,
            storage_capacity: 0.0,
            initial_power: 0.0,
            cost_fixed: None,
            cost_startup: None,
            cost_shutdown: None,
            cost_ramp_up: None,
            cost_ramp_down: None,
            chp_power_loss_factor: None,
            emission_rate: 0.0,
            water_withdrawal: 0.0,
            water_consumption: 0.0,
            is_consumer: false,
        }
    }

    /// Committed state in the artificial step before the horizon.
    pub fn initial_committed(&self) -> bool {
        self.initial_power > 0.0
    }

    pub fn is_storage(&self) -> bool {
        STORAGE_TECHS.contains(&self.technology.as_str())
    }

    pub fn is_renewable(&self) -> bool {
        RENEWABLE_TECHS.contains(&self.technology.as_str())
    }
}

/// Market zone (network node). Immutable per run.
#[derive(Debug, Clone)]
pub struct Zone {
    pub id: ZoneId,
    pub name: String,
    /// Aggregate boundary zone excluded from flow tracing
    pub rest_of_world: bool,
}

/// Directed interconnection line (network edge). Immutable per run.
#[derive(Debug, Clone)]
pub struct Line {
    pub id: LineId,
    /// Conventional "From -> To" label
    pub name: String,
    pub from: ZoneId,
    pub to: ZoneId,
}

impl Line {
    /// The "From -> To" label convention of the upstream results tables.
    pub fn label(from_name: &str, to_name: &str) -> String {
        format!("{} -> {}", from_name, to_name)
    }
}

/// Typed catalog of units, zones and lines, built once per run.
///
/// Zones and lines also live in a directed petgraph, keeping the topology
/// explicit for the flow tracer and the import/export balances.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    units: Vec<Unit>,
    zones: Vec<Zone>,
    lines: Vec<Line>,
    unit_index: HashMap<String, UnitId>,
    zone_index: HashMap<String, ZoneId>,
    line_index: HashMap<String, LineId>,
    /// Zone/line topology; node weights are zone ids, edge weights line ids
    pub graph: DiGraph<ZoneId, LineId>,
    node_of: Vec<NodeIndex>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a zone. Duplicate names are rejected.
    pub fn add_zone(&mut self, name: &str, rest_of_world: bool) -> ExpostResult<ZoneId> {
        if self.zone_index.contains_key(name) {
            return Err(ExpostError::Validation(format!(
                "duplicate zone name '{name}'"
            )));
        }
        let id = ZoneId(self.zones.len());
        self.zones.push(Zone {
            id,
            name: name.to_string(),
            rest_of_world,
        });
        self.zone_index.insert(name.to_string(), id);
        self.node_of.push(self.graph.add_node(id));
        Ok(id)
    }

    /// Register a unit. The zone must exist and the name must be unique; the
    /// id field is assigned by the catalog.
    pub fn push_unit(&mut self, mut unit: Unit) -> ExpostResult<UnitId> {
        if unit.zone.value() >= self.zones.len() {
            return Err(ExpostError::Validation(format!(
                "unit '{}' references unknown zone id {}",
                unit.name,
                unit.zone.value()
            )));
        }
        if self.unit_index.contains_key(&unit.name) {
            return Err(ExpostError::Validation(format!(
                "duplicate unit name '{}'",
                unit.name
            )));
        }
        let id = UnitId(self.units.len());
        unit.id = id;
        self.unit_index.insert(unit.name.clone(), id);
        self.units.push(unit);
        Ok(id)
    }

    /// Register a directed line between two existing zones.
    pub fn add_line(&mut self, from: ZoneId, to: ZoneId) -> ExpostResult<LineId> {
        if from.value() >= self.zones.len() || to.value() >= self.zones.len() {
            return Err(ExpostError::Validation(
                "line endpoints must be registered zones".into(),
            ));
        }
        let name = Line::label(&self.zones[from.value()].name, &self.zones[to.value()].name);
        if self.line_index.contains_key(&name) {
            return Err(ExpostError::Validation(format!(
                "duplicate line '{name}'"
            )));
        }
        let id = LineId(self.lines.len());
        self.lines.push(Line {
            id,
            name: name.clone(),
            from,
            to,
        });
        self.line_index.insert(name, id);
        self.graph
            .add_edge(self.node_of[from.value()], self.node_of[to.value()], id);
        Ok(id)
    }

    pub fn unit(&self, id: UnitId) -> &Unit {
        &self.units[id.value()]
    }

    pub fn zone(&self, id: ZoneId) -> &Zone {
        &self.zones[id.value()]
    }

    pub fn line(&self, id: LineId) -> &Line {
        &self.lines[id.value()]
    }

    pub fn unit_by_name(&self, name: &str) -> Option<UnitId> {
        self.unit_index.get(name).copied()
    }

    pub fn zone_by_name(&self, name: &str) -> Option<ZoneId> {
        self.zone_index.get(name).copied()
    }

    pub fn line_by_name(&self, name: &str) -> Option<LineId> {
        self.line_index.get(name).copied()
    }

    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    /// Units assigned to a specific zone
    pub fn units_in_zone(&self, zone: ZoneId) -> Vec<&Unit> {
        self.units.iter().filter(|u| u.zone == zone).collect()
    }

    /// Zones participating in flow tracing (everything but rest-of-world)
    pub fn internal_zones(&self) -> Vec<ZoneId> {
        self.zones
            .iter()
            .filter(|z| !z.rest_of_world)
            .map(|z| z.id)
            .collect()
    }

    /// Lines whose both endpoints are internal zones
    pub fn internal_lines(&self) -> Vec<&Line> {
        self.lines
            .iter()
            .filter(|l| {
                !self.zone(l.from).rest_of_world && !self.zone(l.to).rest_of_world
            })
            .collect()
    }

    /// True when any line touches the rest-of-world zone
    pub fn has_boundary_lines(&self) -> bool {
        self.lines
            .iter()
            .any(|l| self.zone(l.from).rest_of_world || self.zone(l.to).rest_of_world)
    }

    /// Distinct fuels in unit insertion order
    pub fn fuels(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for u in &self.units {
            if !u.fuel.is_empty() && !seen.contains(&u.fuel) {
                seen.push(u.fuel.clone());
            }
        }
        seen
    }

    /// Distinct technologies in unit insertion order
    pub fn technologies(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for u in &self.units {
            if !u.technology.is_empty() && !seen.contains(&u.technology) {
                seen.push(u.technology.clone());
            }
        }
        seen
    }

    /// Compute basic statistics about the catalog
    pub fn stats(&self) -> CatalogStats {
        let mut stats = CatalogStats {
            num_units: self.units.len(),
            num_zones: self.zones.len(),
            num_lines: self.lines.len(),
            ..CatalogStats::default()
        };
        for u in &self.units {
            stats.total_capacity_mw += u.capacity * u.n_units;
            if u.is_storage() {
                stats.num_storage_units += 1;
            }
            if u.chp.is_chp() {
                stats.num_chp_units += 1;
            }
            if u.is_consumer {
                stats.num_consumer_units += 1;
            }
        }
        stats
    }

    /// Validate the catalog for conditions that would starve the engines.
    ///
    /// Populates the provided `Diagnostics`; fatal structure is reported as
    /// errors, oddities as warnings.
    pub fn validate_into(&self, diag: &mut Diagnostics) {
        if self.zones.is_empty() {
            diag.add_error("structure", "catalog has no zones");
            return;
        }
        if self.units.is_empty() {
            diag.add_error("structure", "catalog has no units");
        }
        for zone in &self.zones {
            if zone.rest_of_world {
                continue;
            }
            if self.units_in_zone(zone.id).is_empty() {
                diag.add_warning_with_entity("structure", "zone has no units", &zone.name);
            }
        }
        if self.zones.iter().filter(|z| z.rest_of_world).count() > 1 {
            diag.add_error("structure", "more than one rest-of-world zone");
        }
    }
}

/// Statistics about a catalog's size
#[derive(Debug, Clone, Default)]
pub struct CatalogStats {
    pub num_units: usize,
    pub num_zones: usize,
    pub num_lines: usize,
    pub num_storage_units: usize,
    pub num_chp_units: usize,
    pub num_consumer_units: usize,
    pub total_capacity_mw: f64,
}

impl std::fmt::Display for CatalogStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} units ({:.0} MW), {} zones, {} lines",
            self.num_units, self.total_capacity_mw, self.num_zones, self.num_lines
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_zone_catalog() -> (Catalog, ZoneId, ZoneId) {
        let mut catalog = Catalog::new();
        let a = catalog.add_zone("AT", false).unwrap();
        let b = catalog.add_zone("DE", false).unwrap();
        (catalog, a, b)
    }

    #[test]
    fn test_catalog_construction() {
        let (mut catalog, a, b) = two_zone_catalog();
        let line = catalog.add_line(a, b).unwrap();

        let mut unit = Unit::new("Gas1".to_string(), a);
        unit.capacity = 400.0;
        unit.n_units = 2.0;
        let id = catalog.push_unit(unit).unwrap();

        assert_eq!(catalog.unit_by_name("Gas1"), Some(id));
        assert_eq!(catalog.line(line).name, "AT -> DE");
        assert_eq!(catalog.line_by_name("AT -> DE"), Some(line));
        assert_eq!(catalog.units_in_zone(a).len(), 1);
        assert_eq!(catalog.units_in_zone(b).len(), 0);
        assert_eq!(catalog.graph.node_count(), 2);
        assert_eq!(catalog.graph.edge_count(), 1);

        let stats = catalog.stats();
        assert_eq!(stats.num_units, 1);
        assert!((stats.total_capacity_mw - 800.0).abs() < 1e-9);
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let (mut catalog, a, b) = two_zone_catalog();
        assert!(catalog.add_zone("AT", false).is_err());
        catalog.add_line(a, b).unwrap();
        assert!(catalog.add_line(a, b).is_err());

        catalog.push_unit(Unit::new("U".to_string(), a)).unwrap();
        assert!(catalog.push_unit(Unit::new("U".to_string(), b)).is_err());
    }

    #[test]
    fn test_unknown_zone_rejected() {
        let mut catalog = Catalog::new();
        catalog.add_zone("AT", false).unwrap();
        let unit = Unit::new("U".to_string(), ZoneId::new(5));
        assert!(catalog.push_unit(unit).is_err());
    }

    #[test]
    fn test_internal_topology_excludes_rest_of_world() {
        let (mut catalog, a, _) = two_zone_catalog();
        let row = catalog.add_zone(REST_OF_WORLD, true).unwrap();
        catalog.add_line(a, row).unwrap();

        assert_eq!(catalog.internal_zones().len(), 2);
        assert!(catalog.internal_lines().is_empty());
        assert!(catalog.has_boundary_lines());
    }

    #[test]
    fn test_chp_type_labels() {
        assert_eq!(ChpType::from_label("").unwrap(), ChpType::None);
        assert_eq!(
            ChpType::from_label("Extraction").unwrap(),
            ChpType::Extraction
        );
        assert_eq!(
            ChpType::from_label("back-pressure").unwrap(),
            ChpType::BackPressure
        );
        assert_eq!(ChpType::from_label("P2H").unwrap(), ChpType::PowerToHeat);
        assert!(ChpType::from_label("???").is_err());
        assert!(ChpType::Extraction.is_chp());
        assert!(!ChpType::None.is_chp());
    }

    #[test]
    fn test_storage_and_renewable_classification() {
        let (mut catalog, a, _) = two_zone_catalog();
        let mut sto = Unit::new("Pump1".to_string(), a);
        sto.technology = "HPHS".to_string();
        let mut wind = Unit::new("Wind1".to_string(), a);
        wind.technology = "WTON".to_string();
        let sto_id = catalog.push_unit(sto).unwrap();
        let wind_id = catalog.push_unit(wind).unwrap();

        assert!(catalog.unit(sto_id).is_storage());
        assert!(!catalog.unit(sto_id).is_renewable());
        assert!(catalog.unit(wind_id).is_renewable());
        assert_eq!(catalog.stats().num_storage_units, 1);
    }

    #[test]
    fn test_validation_empty_catalog() {
        let catalog = Catalog::new();
        let mut diag = Diagnostics::new();
        catalog.validate_into(&mut diag);
        assert!(diag.has_errors());
        assert!(diag.errors().any(|i| i.message.contains("no zones")));
    }

    #[test]
    fn test_validation_zone_without_units() {
        let (catalog, _, _) = two_zone_catalog();
        let mut diag = Diagnostics::new();
        catalog.validate_into(&mut diag);
        assert!(diag.warnings().any(|i| i.message.contains("no units")));
    }

    #[test]
    fn test_id_serde_is_transparent() {
        let id = UnitId::new(7);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "7");
        let back: UnitId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
