//! Immutable results snapshot.
//!
//! A [`ResultsSnapshot`] bundles the typed catalog with every input and
//! result series of one optimization run. It is built once at the boundary
//! (see `expost-io`) and the analysis engines only ever take `&` to it, so a
//! rerun over an identical snapshot yields bit-identical output.
//!
//! Optional series default to empty frames: an absent table contributes zero
//! to every aggregate. Only the power table is fundamental, without it no
//! meaningful downstream output is possible and [`ResultsSnapshot::validate`]
//! aborts with a structural error.

use crate::error::{ExpostError, ExpostResult};
use crate::series::{LineFrame, UnitFrame, ZoneFrame};
use crate::timeindex::{TimeIndex, Window};
use crate::{Catalog, ZoneId};

/// Per-category lost-load series. Max/min power and the reserve categories
/// are zonal; the ramp categories are per unit, mirroring the objective.
#[derive(Debug, Clone)]
pub struct LostLoad {
    pub max_power: ZoneFrame,
    pub min_power: ZoneFrame,
    pub reserve_2u: ZoneFrame,
    pub reserve_2d: ZoneFrame,
    pub reserve_3u: ZoneFrame,
    pub ramp_up: UnitFrame,
    pub ramp_down: UnitFrame,
}

impl LostLoad {
    pub fn empty(len: usize) -> Self {
        Self {
            max_power: ZoneFrame::new(len),
            min_power: ZoneFrame::new(len),
            reserve_2u: ZoneFrame::new(len),
            reserve_2d: ZoneFrame::new(len),
            reserve_3u: ZoneFrame::new(len),
            ramp_up: UnitFrame::new(len),
            ramp_down: UnitFrame::new(len),
        }
    }

    /// Category names paired with horizon totals, for materiality checks.
    pub fn totals(&self) -> Vec<(&'static str, f64)> {
        vec![
            ("LostLoad_MaxPower", self.max_power.total()),
            ("LostLoad_MinPower", self.min_power.total()),
            ("LostLoad_2U", self.reserve_2u.total()),
            ("LostLoad_2D", self.reserve_2d.total()),
            ("LostLoad_3U", self.reserve_3u.total()),
            ("LostLoad_RampUp", self.ramp_up.total()),
            ("LostLoad_RampDown", self.ramp_down.total()),
        ]
    }
}

/// Immutable bundle of one run's inputs and results.
///
/// Field groups follow the upstream result tables: per-unit dispatch series,
/// per-zone balance series, per-line network series, static coefficient
/// series and the reported objective value.
#[derive(Debug, Clone)]
pub struct ResultsSnapshot {
    pub catalog: Catalog,
    pub index: TimeIndex,

    // Per-unit dispatch results
    pub power: UnitFrame,
    pub committed: UnitFrame,
    pub heat: UnitFrame,
    pub power_consumption: UnitFrame,
    pub reserve_2u: UnitFrame,
    pub reserve_2d: UnitFrame,
    pub reserve_3u: UnitFrame,
    pub storage_input: UnitFrame,
    pub storage_slack: UnitFrame,
    pub spillage: UnitFrame,

    // Per-zone balance results
    pub shed_load: ZoneFrame,
    pub curtailed_power: ZoneFrame,
    pub curtailed_heat: ZoneFrame,
    pub heat_slack: ZoneFrame,
    pub demand_modulation: ZoneFrame,
    pub lost_load: LostLoad,

    // Shadow prices (duals) per zone: day-ahead and reserve categories
    pub shadow_price: ZoneFrame,
    pub shadow_price_2u: ZoneFrame,
    pub shadow_price_2d: ZoneFrame,
    pub shadow_price_3u: ZoneFrame,
    /// Heat shadow price is resolved per unit upstream
    pub heat_shadow_price: UnitFrame,

    // Per-line network results and limits
    pub flow: LineFrame,
    pub flow_maximum: LineFrame,
    pub flow_minimum: LineFrame,
    pub price_transmission: LineFrame,

    // Input series
    pub demand_da: ZoneFrame,
    pub demand_flex: ZoneFrame,
    pub reserve_demand_2u: ZoneFrame,
    pub reserve_demand_2d: ZoneFrame,
    pub availability_factor: UnitFrame,
    pub cost_variable: UnitFrame,
    pub cost_load_shedding: ZoneFrame,
    pub cost_heat_slack: ZoneFrame,
    pub cost_h2_slack: UnitFrame,

    /// Solver-reported total system cost per step, for reconciliation
    pub system_cost: Vec<f64>,
}

impl ResultsSnapshot {
    /// Create a snapshot with every series empty, to be filled by a loader.
    pub fn empty(catalog: Catalog, index: TimeIndex) -> Self {
        let len = index.len();
        Self {
            catalog,
            index,
            power: UnitFrame::new(len),
            committed: UnitFrame::new(len),
            heat: UnitFrame::new(len),
            power_consumption: UnitFrame::new(len),
            reserve_2u: UnitFrame::new(len),
            reserve_2d: UnitFrame::new(len),
            reserve_3u: UnitFrame::new(len),
            storage_input: UnitFrame::new(len),
            storage_slack: UnitFrame::new(len),
            spillage: UnitFrame::new(len),
            shed_load: ZoneFrame::new(len),
            curtailed_power: ZoneFrame::new(len),
            curtailed_heat: ZoneFrame::new(len),
            heat_slack: ZoneFrame::new(len),
            demand_modulation: ZoneFrame::new(len),
            lost_load: LostLoad::empty(len),
            shadow_price: ZoneFrame::new(len),
            shadow_price_2u: ZoneFrame::new(len),
            shadow_price_2d: ZoneFrame::new(len),
            shadow_price_3u: ZoneFrame::new(len),
            heat_shadow_price: UnitFrame::new(len),
            flow: LineFrame::new(len),
            flow_maximum: LineFrame::new(len),
            flow_minimum: LineFrame::new(len),
            price_transmission: LineFrame::new(len),
            demand_da: ZoneFrame::new(len),
            demand_flex: ZoneFrame::new(len),
            reserve_demand_2u: ZoneFrame::new(len),
            reserve_demand_2d: ZoneFrame::new(len),
            availability_factor: UnitFrame::new(len),
            cost_variable: UnitFrame::new(len),
            cost_load_shedding: ZoneFrame::new(len),
            cost_heat_slack: ZoneFrame::new(len),
            cost_h2_slack: UnitFrame::new(len),
            system_cost: Vec::new(),
        }
    }

    /// Check the fundamentals. A snapshot that fails here cannot produce any
    /// meaningful downstream output.
    pub fn validate(&self) -> ExpostResult<()> {
        if self.index.is_empty() {
            return Err(ExpostError::Structure("time index is empty".into()));
        }
        if self.power.is_empty() {
            return Err(ExpostError::Structure(
                "power output table is absent or empty".into(),
            ));
        }
        let len = self.index.len();
        for (name, frame_len) in [
            ("power", self.power.len()),
            ("committed", self.committed.len()),
            ("heat", self.heat.len()),
            ("flow", self.flow.len()),
            ("shed_load", self.shed_load.len()),
            ("demand_da", self.demand_da.len()),
            ("cost_variable", self.cost_variable.len()),
        ] {
            if frame_len != len {
                return Err(ExpostError::Structure(format!(
                    "series '{name}' has length {frame_len}, time index has {len}"
                )));
            }
        }
        if !self.system_cost.is_empty() && self.system_cost.len() != len {
            return Err(ExpostError::Structure(format!(
                "reported system cost has length {}, time index has {len}",
                self.system_cost.len()
            )));
        }
        Ok(())
    }

    /// Total demand series of one zone: day-ahead plus flexible demand plus
    /// the consumption of power-to-X units located there.
    pub fn zone_demand(&self, zone: ZoneId) -> Vec<f64> {
        let len = self.index.len();
        let mut out = vec![0.0; len];
        for frame in [&self.demand_da, &self.demand_flex] {
            if let Some(col) = frame.column(zone) {
                for (acc, v) in out.iter_mut().zip(col.iter()) {
                    *acc += v;
                }
            }
        }
        for unit in self.catalog.units_in_zone(zone) {
            if let Some(col) = self.power_consumption.column(unit.id) {
                for (acc, v) in out.iter_mut().zip(col.iter()) {
                    *acc += v;
                }
            }
        }
        out
    }

    /// Net import balance of a zone over a window: inflow minus outflow on
    /// every line touching it.
    pub fn net_imports(&self, zone: ZoneId, window: Window) -> f64 {
        let mut balance = 0.0;
        for line in self.catalog.lines() {
            if line.from == zone {
                balance -= self.flow.column_sum_window(line.id, window);
            } else if line.to == zone {
                balance += self.flow.column_sum_window(line.id, window);
            }
        }
        balance
    }

    /// Total generation of a zone's units over a window.
    pub fn zone_generation(&self, zone: ZoneId, window: Window) -> f64 {
        self.catalog
            .units_in_zone(zone)
            .iter()
            .map(|u| self.power.column_sum_window(u.id, window))
            .sum()
    }
}
