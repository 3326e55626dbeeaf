//! Ex-post cost decomposition.
//!
//! Rebuilds every term of the optimizer's objective from the raw result
//! series and the static coefficients:
//!
//! ```text
//! SystemCost(i) = sum(u, CostFixed(u)·Committed(u,i))
//!               + sum(u, startup/shutdown costs)
//!               + sum(u, ramp-up/ramp-down costs)
//!               + sum(u, CostVariable(u,i)·Power(u,i))
//!               + sum(l, PriceTransmission(l,i)·Flow(l,i))
//!               + sum(n, CostLoadShedding(n,i)·ShedLoad(n,i))
//!               + sum(n, CostHeatSlack(n,i)·HeatSlack(n,i))
//!               + sum(u, CostH2Slack(u,i)·StorageSlack(u,i))
//!               + sum(chp, CostVariable(chp,i)·CHPPowerLossFactor(chp)·Heat(chp,i))
//!               + VOLL·(LL_MaxPower + LL_MinPower)
//!               + 0.8·VOLL·(LL_2U + LL_2D + LL_3U)
//!               + 0.7·VOLL·(LL_RampUp + LL_RampDown)
//!               + CostOfSpillage·Spillage
//! ```
//!
//! The per-time category sums are reconciled against the solver-reported
//! total. A mismatch beyond tolerance is a critical diagnostic, expected
//! numerical slack from solver tolerances, not a fatal error.

use anyhow::Result;
use polars::prelude::*;

use expost_core::{
    Diagnostics, ExpostResult, ResultsSnapshot, TimeIndex, UnitFrame, UnitId,
};

use crate::transitions::StateTransitions;

/// Cost-policy constants. The defaults are the fixed domain policy of the
/// upstream model; callers may override individual values.
#[derive(Debug, Clone)]
pub struct CostConfig {
    /// Price of unserved min/max power (EUR/MWh)
    pub value_of_lost_load: f64,
    /// Share of the value of lost load applied to unmet reserve (2U/2D/3U)
    pub reserve_lost_load_factor: f64,
    /// Share of the value of lost load applied to unmet ramp requirements
    pub ramp_lost_load_factor: f64,
    /// Price of spilled water/energy (EUR/MWh)
    pub spillage_cost: f64,
    /// Reconciliation tolerance as a share of the peak reported cost
    pub reconciliation_tolerance: f64,
    /// Shadow prices above this are treated as spikes and carried forward
    pub price_spike_threshold: f64,
}

impl Default for CostConfig {
    fn default() -> Self {
        Self {
            value_of_lost_load: 100e3,
            reserve_lost_load_factor: 0.8,
            ramp_lost_load_factor: 0.7,
            spillage_cost: 1.0,
            reconciliation_tolerance: 0.01,
            price_spike_threshold: 10e3,
        }
    }
}

/// Objective-function cost categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CostCategory {
    Fixed,
    Startup,
    Shutdown,
    RampUp,
    RampDown,
    Variable,
    Transmission,
    Shedding,
    HeatSlack,
    Heat,
    StorageSlack,
    LostLoad,
    Spillage,
}

impl CostCategory {
    pub const ALL: [CostCategory; 13] = [
        CostCategory::Fixed,
        CostCategory::Startup,
        CostCategory::Shutdown,
        CostCategory::RampUp,
        CostCategory::RampDown,
        CostCategory::Variable,
        CostCategory::Transmission,
        CostCategory::Shedding,
        CostCategory::HeatSlack,
        CostCategory::Heat,
        CostCategory::StorageSlack,
        CostCategory::LostLoad,
        CostCategory::Spillage,
    ];

    /// Column name, matching the upstream result-table convention.
    pub fn as_str(&self) -> &'static str {
        match self {
            CostCategory::Fixed => "FixedCosts",
            CostCategory::Startup => "CostStartUp",
            CostCategory::Shutdown => "CostShutDown",
            CostCategory::RampUp => "CostRampUp",
            CostCategory::RampDown => "CostRampDown",
            CostCategory::Variable => "CostVariable",
            CostCategory::Transmission => "CostTransmission",
            CostCategory::Shedding => "CostLoadShedding",
            CostCategory::HeatSlack => "CostHeatSlack",
            CostCategory::Heat => "CostHeat",
            CostCategory::StorageSlack => "CostH2Slack",
            CostCategory::LostLoad => "LostLoad",
            CostCategory::Spillage => "Spillage",
        }
    }
}

/// Per-time, per-category cost ledger.
///
/// One parallel series per category keeps the reconciliation invariant
/// checkable without any string-keyed intermediate: the per-time total is
/// the sum of thirteen named fields, nothing more.
#[derive(Debug, Clone)]
pub struct CostLedger {
    pub fixed: Vec<f64>,
    pub startup: Vec<f64>,
    pub shutdown: Vec<f64>,
    pub ramp_up: Vec<f64>,
    pub ramp_down: Vec<f64>,
    pub variable: Vec<f64>,
    pub transmission: Vec<f64>,
    pub shedding: Vec<f64>,
    pub heat_slack: Vec<f64>,
    pub heat: Vec<f64>,
    pub storage_slack: Vec<f64>,
    pub lost_load: Vec<f64>,
    pub spillage: Vec<f64>,
    /// Solver-reported total, empty when the run did not report one
    pub reported: Vec<f64>,
}

impl CostLedger {
    fn zeros(len: usize) -> Self {
        Self {
            fixed: vec![0.0; len],
            startup: vec![0.0; len],
            shutdown: vec![0.0; len],
            ramp_up: vec![0.0; len],
            ramp_down: vec![0.0; len],
            variable: vec![0.0; len],
            transmission: vec![0.0; len],
            shedding: vec![0.0; len],
            heat_slack: vec![0.0; len],
            heat: vec![0.0; len],
            storage_slack: vec![0.0; len],
            lost_load: vec![0.0; len],
            spillage: vec![0.0; len],
            reported: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.fixed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fixed.is_empty()
    }

    pub fn category(&self, category: CostCategory) -> &[f64] {
        match category {
            CostCategory::Fixed => &self.fixed,
            CostCategory::Startup => &self.startup,
            CostCategory::Shutdown => &self.shutdown,
            CostCategory::RampUp => &self.ramp_up,
            CostCategory::RampDown => &self.ramp_down,
            CostCategory::Variable => &self.variable,
            CostCategory::Transmission => &self.transmission,
            CostCategory::Shedding => &self.shedding,
            CostCategory::HeatSlack => &self.heat_slack,
            CostCategory::Heat => &self.heat,
            CostCategory::StorageSlack => &self.storage_slack,
            CostCategory::LostLoad => &self.lost_load,
            CostCategory::Spillage => &self.spillage,
        }
    }

    /// Ex-post total at one step (sum over all categories).
    pub fn total_at(&self, t: usize) -> f64 {
        CostCategory::ALL
            .iter()
            .map(|c| self.category(*c)[t])
            .sum()
    }

    /// Ex-post total series.
    pub fn totals(&self) -> Vec<f64> {
        (0..self.len()).map(|t| self.total_at(t)).collect()
    }

    /// Ledger as a table: one timestamp column, one column per category, the
    /// ex-post total and (when present) the reported total.
    pub fn to_dataframe(&self, index: &TimeIndex) -> Result<DataFrame> {
        let timestamps: Vec<String> = index
            .iter()
            .map(|ts| ts.format("%Y-%m-%d %H:%M:%S").to_string())
            .collect();
        let mut columns = vec![Series::new("time", timestamps)];
        for category in CostCategory::ALL {
            columns.push(Series::new(
                category.as_str(),
                self.category(category).to_vec(),
            ));
        }
        columns.push(Series::new("TotalExPost", self.totals()));
        if !self.reported.is_empty() {
            columns.push(Series::new("ReportedCost", self.reported.clone()));
        }
        Ok(DataFrame::new(columns)?)
    }
}

/// Reconciliation outcome, returned alongside the ledger.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ReconciliationSummary {
    pub total_ex_post: f64,
    pub total_reported: f64,
    pub max_abs_gap: f64,
    /// True when the gap exceeded the configured tolerance
    pub flagged: bool,
}

/// Decompose the objective into the per-time cost ledger and reconcile it
/// against the reported total.
pub fn decompose(
    snapshot: &ResultsSnapshot,
    transitions: &StateTransitions,
    config: &CostConfig,
    diag: &mut Diagnostics,
) -> ExpostResult<(CostLedger, ReconciliationSummary)> {
    snapshot.validate()?;
    let len = snapshot.index.len();
    let mut ledger = CostLedger::zeros(len);

    // Fixed costs while committed
    for (unit_id, committed) in snapshot.committed.iter() {
        match coefficient(snapshot, unit_id, "CostFixed", diag) {
            Some(coef) => accumulate_scaled(&mut ledger.fixed, committed, coef),
            None => continue,
        }
    }

    // Startup/shutdown events priced over committed units, ramping levels
    // over dispatched units
    for unit_id in snapshot.committed.keys().to_vec() {
        if let Some(coef) = coefficient(snapshot, unit_id, "CostStartUp", diag) {
            if let Some(series) = transitions.startup.column(unit_id) {
                accumulate_scaled(&mut ledger.startup, series, coef);
            }
        }
        if let Some(coef) = coefficient(snapshot, unit_id, "CostShutDown", diag) {
            if let Some(series) = transitions.shutdown.column(unit_id) {
                accumulate_scaled(&mut ledger.shutdown, series, coef);
            }
        }
    }
    for unit_id in snapshot.power.keys().to_vec() {
        if let Some(coef) = coefficient(snapshot, unit_id, "CostRampUp", diag) {
            if let Some(series) = transitions.ramp_up.column(unit_id) {
                accumulate_scaled(&mut ledger.ramp_up, series, coef);
            }
        }
        if let Some(coef) = coefficient(snapshot, unit_id, "CostRampDown", diag) {
            if let Some(series) = transitions.ramp_down.column(unit_id) {
                accumulate_scaled(&mut ledger.ramp_down, series, coef);
            }
        }
    }

    // Variable cost of produced energy; a missing variable-cost column is a
    // zero-cost unit (renewables), not a data-quality condition
    for (unit_id, power) in snapshot.power.iter() {
        if let Some(costs) = snapshot.cost_variable.column(unit_id) {
            accumulate_product(&mut ledger.variable, power, costs);
        }
    }

    // Transmission cost per line
    for (line_id, flow) in snapshot.flow.iter() {
        if let Some(price) = snapshot.price_transmission.column(line_id) {
            accumulate_product(&mut ledger.transmission, flow, price);
        }
    }

    // Shedding and heat slack per zone
    for (zone_id, shed) in snapshot.shed_load.iter() {
        if let Some(penalty) = snapshot.cost_load_shedding.column(zone_id) {
            accumulate_product(&mut ledger.shedding, shed, penalty);
        }
    }
    for (zone_id, slack) in snapshot.heat_slack.iter() {
        if let Some(cost) = snapshot.cost_heat_slack.column(zone_id) {
            accumulate_product(&mut ledger.heat_slack, slack, cost);
        }
    }

    // CHP heat opportunity cost: fuel cost of the power displaced by heat
    // extraction; plain fuel cost of the heat when no loss factor is defined
    for (unit_id, heat) in snapshot.heat.iter() {
        let Some(costs) = snapshot.cost_variable.column(unit_id) else {
            continue;
        };
        let factor = snapshot
            .catalog
            .unit(unit_id)
            .chp_power_loss_factor
            .unwrap_or(1.0);
        for t in 0..len {
            ledger.heat[t] += costs[t] * heat[t] * factor;
        }
    }

    // Storage (hydrogen) slack per unit
    for (unit_id, cost) in snapshot.cost_h2_slack.iter() {
        if let Some(slack) = snapshot.storage_slack.column(unit_id) {
            accumulate_product(&mut ledger.storage_slack, cost, slack);
        }
    }

    // Lost load, tiered by category
    let voll = config.value_of_lost_load;
    let reserve_price = config.reserve_lost_load_factor * voll;
    let ramp_price = config.ramp_lost_load_factor * voll;
    for series in [
        &snapshot.lost_load.max_power,
        &snapshot.lost_load.min_power,
    ] {
        accumulate_scaled(&mut ledger.lost_load, &series.row_sums(), voll);
    }
    for series in [
        &snapshot.lost_load.reserve_2u,
        &snapshot.lost_load.reserve_2d,
        &snapshot.lost_load.reserve_3u,
    ] {
        accumulate_scaled(&mut ledger.lost_load, &series.row_sums(), reserve_price);
    }
    for series in [&snapshot.lost_load.ramp_up, &snapshot.lost_load.ramp_down] {
        accumulate_scaled(&mut ledger.lost_load, &series.row_sums(), ramp_price);
    }

    // Spillage at a flat price
    accumulate_scaled(
        &mut ledger.spillage,
        &snapshot.spillage.row_sums(),
        config.spillage_cost,
    );

    ledger.reported = snapshot.system_cost.clone();

    let summary = reconcile(&ledger, config, diag);
    Ok((ledger, summary))
}

/// Compare the per-time category sums against the reported total and flag a
/// discrepancy beyond tolerance. Never aborts.
fn reconcile(
    ledger: &CostLedger,
    config: &CostConfig,
    diag: &mut Diagnostics,
) -> ReconciliationSummary {
    let totals = ledger.totals();
    let total_ex_post: f64 = totals.iter().sum();

    if ledger.reported.is_empty() {
        diag.add_warning(
            "reconciliation",
            "no reported system cost in the snapshot, reconciliation skipped",
        );
        return ReconciliationSummary {
            total_ex_post,
            total_reported: 0.0,
            max_abs_gap: 0.0,
            flagged: false,
        };
    }

    let peak_reported = ledger
        .reported
        .iter()
        .copied()
        .fold(0.0_f64, |a, b| a.max(b.abs()));
    let max_abs_gap = totals
        .iter()
        .zip(ledger.reported.iter())
        .map(|(a, b)| (a - b).abs())
        .fold(0.0_f64, f64::max);
    let flagged = max_abs_gap > config.reconciliation_tolerance * peak_reported;

    if flagged {
        diag.add_error(
            "reconciliation",
            &format!(
                "ex-post cost sum diverges from the reported system cost \
                 (max gap {max_abs_gap:.1} EUR, tolerance {:.1} EUR)",
                config.reconciliation_tolerance * peak_reported
            ),
        );
    }

    ReconciliationSummary {
        total_ex_post,
        total_reported: ledger.reported.iter().sum(),
        max_abs_gap,
        flagged,
    }
}

/// Per-unit operating cost table.
///
/// Generating units: Fixed + Startup + Shutdown + RampUp + RampDown +
/// Variable. Consumption-type units have no direct cost coefficients; the
/// energy they displace is valued at the day-ahead shadow price of their
/// zone.
pub fn unit_operation_costs(
    snapshot: &ResultsSnapshot,
    transitions: &StateTransitions,
    diag: &mut Diagnostics,
) -> ExpostResult<UnitFrame> {
    let len = snapshot.index.len();
    let mut out = UnitFrame::new(len);

    for (unit_id, committed) in snapshot.committed.iter() {
        let unit = snapshot.catalog.unit(unit_id);
        let fixed = unit.cost_fixed.unwrap_or(0.0);
        let su_coef = unit.cost_startup.unwrap_or(0.0);
        let sd_coef = unit.cost_shutdown.unwrap_or(0.0);
        let ru_coef = unit.cost_ramp_up.unwrap_or(0.0);
        let rd_coef = unit.cost_ramp_down.unwrap_or(0.0);

        let su = transitions.startup.column(unit_id);
        let sd = transitions.shutdown.column(unit_id);
        let ru = transitions.ramp_up.column(unit_id);
        let rd = transitions.ramp_down.column(unit_id);
        let power = snapshot.power.column(unit_id);
        let var_cost = snapshot.cost_variable.column(unit_id);

        let mut cost = vec![0.0; len];
        for (t, value) in cost.iter_mut().enumerate() {
            *value = fixed * committed[t]
                + su_coef * su.map_or(0.0, |s| s[t])
                + sd_coef * sd.map_or(0.0, |s| s[t])
                + ru_coef * ru.map_or(0.0, |s| s[t])
                + rd_coef * rd.map_or(0.0, |s| s[t])
                + var_cost.map_or(0.0, |c| c[t]) * power.map_or(0.0, |p| p[t]);
        }
        out.insert(unit_id, cost)?;
    }

    for (unit_id, consumption) in snapshot.power_consumption.iter() {
        if out.contains(unit_id) {
            continue;
        }
        let unit = snapshot.catalog.unit(unit_id);
        match snapshot.shadow_price.column(unit.zone) {
            Some(price) => {
                let cost = consumption
                    .iter()
                    .zip(price.iter())
                    .map(|(c, p)| c * p)
                    .collect();
                out.insert(unit_id, cost)?;
            }
            None => {
                diag.add_warning_with_entity(
                    "reference",
                    "no day-ahead shadow price for the unit's zone, consumption cost set to zero",
                    &unit.name,
                );
                out.insert_zero(unit_id)?;
            }
        }
    }

    Ok(out)
}

/// Spike-filtered shadow-price panel of one zone (day-ahead plus the three
/// reserve categories). Prices above the spike threshold repeat the previous
/// step's value.
#[derive(Debug, Clone)]
pub struct ShadowPricePanel {
    pub day_ahead: Vec<f64>,
    pub reserve_2u: Vec<f64>,
    pub reserve_2d: Vec<f64>,
    pub reserve_3u: Vec<f64>,
}

pub fn shadow_price_panel(
    snapshot: &ResultsSnapshot,
    zone: expost_core::ZoneId,
    config: &CostConfig,
) -> ShadowPricePanel {
    let len = snapshot.index.len();
    let pick = |frame: &expost_core::ZoneFrame| -> Vec<f64> {
        let mut values = frame
            .column(zone)
            .map_or(vec![0.0; len], |c| c.to_vec());
        for t in 1..values.len() {
            if values[t] > config.price_spike_threshold {
                values[t] = values[t - 1];
            }
        }
        values
    };
    ShadowPricePanel {
        day_ahead: pick(&snapshot.shadow_price),
        reserve_2u: pick(&snapshot.shadow_price_2u),
        reserve_2d: pick(&snapshot.shadow_price_2d),
        reserve_3u: pick(&snapshot.shadow_price_3u),
    }
}

/// Hourly cash flows of one unit: market revenues at the zone's (spike
/// filtered) shadow prices, heat revenue at the unit's heat shadow price,
/// and the operating cost as the negative leg.
#[derive(Debug, Clone)]
pub struct Cashflows {
    pub unit: UnitId,
    pub day_ahead: Vec<f64>,
    pub reserve_2u: Vec<f64>,
    pub reserve_2d: Vec<f64>,
    pub reserve_3u: Vec<f64>,
    pub heat: Vec<f64>,
    /// Negative of the operating cost
    pub costs: Vec<f64>,
}

impl Cashflows {
    pub fn to_dataframe(&self, index: &TimeIndex) -> Result<DataFrame> {
        let timestamps: Vec<String> = index
            .iter()
            .map(|ts| ts.format("%Y-%m-%d %H:%M:%S").to_string())
            .collect();
        Ok(DataFrame::new(vec![
            Series::new("time", timestamps),
            Series::new("DA", self.day_ahead.clone()),
            Series::new("2U", self.reserve_2u.clone()),
            Series::new("2D", self.reserve_2d.clone()),
            Series::new("3U", self.reserve_3u.clone()),
            Series::new("Heat", self.heat.clone()),
            Series::new("Costs", self.costs.clone()),
        ])?)
    }
}

pub fn cashflows(
    snapshot: &ResultsSnapshot,
    unit_costs: &UnitFrame,
    unit_id: UnitId,
    config: &CostConfig,
) -> Cashflows {
    let len = snapshot.index.len();
    let unit = snapshot.catalog.unit(unit_id);
    let panel = shadow_price_panel(snapshot, unit.zone, config);

    let revenue = |series: Option<&[f64]>, prices: &[f64]| -> Vec<f64> {
        match series {
            Some(values) => values.iter().zip(prices.iter()).map(|(v, p)| v * p).collect(),
            None => vec![0.0; len],
        }
    };

    let heat = match (
        snapshot.heat.column(unit_id),
        snapshot.heat_shadow_price.column(unit_id),
    ) {
        (Some(heat), Some(price)) => heat.iter().zip(price.iter()).map(|(h, p)| h * p).collect(),
        _ => vec![0.0; len],
    };

    Cashflows {
        unit: unit_id,
        day_ahead: revenue(snapshot.power.column(unit_id), &panel.day_ahead),
        reserve_2u: revenue(snapshot.reserve_2u.column(unit_id), &panel.reserve_2u),
        reserve_2d: revenue(snapshot.reserve_2d.column(unit_id), &panel.reserve_2d),
        reserve_3u: revenue(snapshot.reserve_3u.column(unit_id), &panel.reserve_3u),
        heat,
        costs: unit_costs
            .column(unit_id)
            .map_or(vec![0.0; len], |c| c.iter().map(|v| -v).collect()),
    }
}

/// Look up a per-unit cost coefficient; `None` (unit absent from the
/// coefficient table) is a reference warning and excludes the unit from that
/// category only.
fn coefficient(
    snapshot: &ResultsSnapshot,
    unit_id: UnitId,
    table: &str,
    diag: &mut Diagnostics,
) -> Option<f64> {
    let unit = snapshot.catalog.unit(unit_id);
    let value = match table {
        "CostFixed" => unit.cost_fixed,
        "CostStartUp" => unit.cost_startup,
        "CostShutDown" => unit.cost_shutdown,
        "CostRampUp" => unit.cost_ramp_up,
        "CostRampDown" => unit.cost_ramp_down,
        _ => None,
    };
    if value.is_none() {
        diag.add_warning_with_entity(
            "reference",
            &format!("unit not found in input table {table}, category skipped"),
            &unit.name,
        );
    }
    value
}

fn accumulate_scaled(target: &mut [f64], series: &[f64], factor: f64) {
    for (acc, v) in target.iter_mut().zip(series.iter()) {
        *acc += v * factor;
    }
}

fn accumulate_product(target: &mut [f64], a: &[f64], b: &[f64]) {
    for ((acc, x), y) in target.iter_mut().zip(a.iter()).zip(b.iter()) {
        *acc += x * y;
    }
}
