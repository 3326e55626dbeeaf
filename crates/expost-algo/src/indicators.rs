//! Result-analysis indicators.
//!
//! Aggregates the snapshot, the transition series and the per-unit cost
//! table into the zone/unit/fuel/storage/reserve summary tables, and raises
//! materiality flags for unmet demand. All tables are plain DataFrames with
//! columns in a fixed order, so a rerun on an identical snapshot is
//! bit-identical.

use std::collections::HashMap;

use anyhow::Result;
use polars::prelude::*;
use serde::Serialize;

use expost_core::{
    Diagnostics, ExpostResult, ResultsSnapshot, UnitFrame, UnitId, ZoneFrame, ZoneId,
};

use crate::filters;
use crate::transitions::StateTransitions;

/// Flow equality tolerance when counting congested hours.
const CONGESTION_EPS: f64 = 1e-6;

/// Materiality thresholds for unmet demand and shifted load. Defaults are
/// the fixed domain policy of the upstream model.
#[derive(Debug, Clone)]
pub struct MaterialityConfig {
    /// Lost load above this share of total load is critical
    pub critical_share: f64,
    /// Lost load above this absolute floor (MWh) is a warning
    pub warning_floor_mwh: f64,
    /// Net shifted load above this share of total shifted load is flagged
    pub shifted_net_share: f64,
}

impl Default for MaterialityConfig {
    fn default() -> Self {
        Self {
            critical_share: 1e-4,
            warning_floor_mwh: 100.0,
            shifted_net_share: 0.1,
        }
    }
}

/// Top-level aggregated statistics for the studied area.
#[derive(Debug, Clone, Serialize)]
pub struct SystemSummary {
    pub total_load_mwh: f64,
    pub peak_load_mw: f64,
    /// Net imports from the rest-of-world zone (zero for a closed system)
    pub net_imports_mwh: f64,
    pub shed_load_mwh: f64,
    pub max_shed_load_mw: f64,
    pub curtailment_mwh: f64,
    pub max_curtailment_mw: f64,
    pub heat_curtailment_mwh: f64,
    /// Total shifted load (half the absolute demand modulation)
    pub shifted_load_mwh: f64,
    /// Reported system cost per MWh of domestic consumption
    pub avg_cost_eur_per_mwh: f64,
}

/// Compute the system summary and raise the materiality flags.
pub fn system_summary(
    snapshot: &ResultsSnapshot,
    config: &MaterialityConfig,
    diag: &mut Diagnostics,
) -> ExpostResult<SystemSummary> {
    snapshot.validate()?;
    let len = snapshot.index.len();
    let zones = snapshot.catalog.internal_zones();
    let full = snapshot.index.full_window()?;

    // Zone demand includes flexible demand and power-to-X consumption.
    let mut combined = vec![0.0; len];
    for zone in &zones {
        for (acc, v) in combined.iter_mut().zip(snapshot.zone_demand(*zone)) {
            *acc += v;
        }
    }
    let total_load: f64 = combined.iter().sum();
    let peak_load = combined.iter().copied().fold(0.0_f64, f64::max);

    let net_imports = snapshot
        .catalog
        .zones()
        .iter()
        .find(|z| z.rest_of_world)
        .map_or(0.0, |row| -snapshot.net_imports(row.id, full));

    let shifted_net: f64 = snapshot
        .demand_modulation
        .keys()
        .iter()
        .map(|z| snapshot.demand_modulation.column_sum(*z))
        .sum();
    let shifted_abs: f64 = snapshot
        .demand_modulation
        .keys()
        .iter()
        .map(|z| {
            snapshot
                .demand_modulation
                .column(*z)
                .map_or(0.0, |c| c.iter().map(|v| v.abs()).sum())
        })
        .sum();
    let shifted_load = shifted_abs / 2.0;
    if shifted_load > 0.0 && shifted_net.abs() > config.shifted_net_share * shifted_load {
        diag.add_error(
            "validation",
            "net shifted load exceeds 10% of the total shifted load, although it should be zero",
        );
    }

    // Lost-load materiality, per category
    for (category, total) in snapshot.lost_load.totals() {
        if total > config.critical_share * total_load {
            diag.add_error_with_entity(
                "lost-load",
                &format!(
                    "significant lost load of {total:.1} MWh, results should be checked carefully"
                ),
                category,
            );
        } else if total > config.warning_floor_mwh {
            diag.add_warning_with_entity(
                "lost-load",
                &format!("lost load of {total:.1} MWh, results should be checked"),
                category,
            );
        }
    }

    let reported_total: f64 = snapshot.system_cost.iter().sum();
    let domestic = total_load - net_imports;
    let avg_cost = if domestic != 0.0 {
        reported_total / domestic
    } else {
        0.0
    };

    Ok(SystemSummary {
        total_load_mwh: total_load,
        peak_load_mw: peak_load,
        net_imports_mwh: net_imports,
        shed_load_mwh: snapshot.shed_load.total(),
        max_shed_load_mw: snapshot.shed_load.max_row_sum(),
        curtailment_mwh: snapshot.curtailed_power.total(),
        max_curtailment_mw: snapshot.curtailed_power.max_row_sum(),
        heat_curtailment_mwh: snapshot.curtailed_heat.total(),
        shifted_load_mwh: shifted_load,
        avg_cost_eur_per_mwh: avg_cost,
    })
}

/// Zone-level table: demand, peak, net imports, shedding, shifted load and
/// curtailment per internal zone.
pub fn zone_table(snapshot: &ResultsSnapshot) -> Result<DataFrame> {
    let zones = snapshot.catalog.internal_zones();
    let full = snapshot.index.full_window()?;

    let mut names = Vec::with_capacity(zones.len());
    let mut demand = Vec::with_capacity(zones.len());
    let mut peak = Vec::with_capacity(zones.len());
    let mut imports = Vec::with_capacity(zones.len());
    let mut shed = Vec::with_capacity(zones.len());
    let mut shed_max = Vec::with_capacity(zones.len());
    let mut shifted = Vec::with_capacity(zones.len());
    let mut curtailed = Vec::with_capacity(zones.len());
    let mut curtailed_max = Vec::with_capacity(zones.len());

    for zone in zones {
        let zone_demand = snapshot.zone_demand(zone);
        names.push(snapshot.catalog.zone(zone).name.clone());
        demand.push(zone_demand.iter().sum::<f64>());
        peak.push(zone_demand.iter().copied().fold(0.0_f64, f64::max));
        imports.push(snapshot.net_imports(zone, full));
        shed.push(snapshot.shed_load.column_sum(zone));
        shed_max.push(snapshot.shed_load.column_max(zone));
        shifted.push(
            snapshot
                .demand_modulation
                .column(zone)
                .map_or(0.0, |c| c.iter().map(|v| v.abs()).sum()),
        );
        curtailed.push(snapshot.curtailed_power.column_sum(zone));
        curtailed_max.push(snapshot.curtailed_power.column_max(zone));
    }

    Ok(DataFrame::new(vec![
        Series::new("zone", names),
        Series::new("demand_mwh", demand),
        Series::new("peak_load_mw", peak),
        Series::new("net_imports_mwh", imports),
        Series::new("shed_load_mwh", shed),
        Series::new("max_shed_load_mw", shed_max),
        Series::new("shifted_load_mwh", shifted),
        Series::new("curtailment_mwh", curtailed),
        Series::new("max_curtailment_mw", curtailed_max),
    ])?)
}

/// Hours at the flow maximum per internal line.
pub fn congestion_table(snapshot: &ResultsSnapshot) -> Result<DataFrame> {
    let lines = snapshot.catalog.internal_lines();
    let mut names = Vec::with_capacity(lines.len());
    let mut hours = Vec::with_capacity(lines.len());

    for line in lines {
        let congested = match (
            snapshot.flow.column(line.id),
            snapshot.flow_maximum.column(line.id),
        ) {
            (Some(flow), Some(maximum)) => flow
                .iter()
                .zip(maximum.iter())
                .filter(|(f, m)| **m > 0.0 && (**m - **f).abs() < CONGESTION_EPS)
                .count(),
            _ => 0,
        };
        names.push(line.name.clone());
        hours.push(congested as u32);
    }

    Ok(DataFrame::new(vec![
        Series::new("line", names),
        Series::new("congestion_hours", hours),
    ])?)
}

/// Unit-level indicator table: startups, capacity factor, generation, CO2,
/// operating cost and water use per unit.
pub fn unit_table(
    snapshot: &ResultsSnapshot,
    transitions: &StateTransitions,
    unit_costs: &UnitFrame,
) -> Result<DataFrame> {
    let units = snapshot.catalog.units();
    let n = units.len();
    let mut names = Vec::with_capacity(n);
    let mut zones = Vec::with_capacity(n);
    let mut fuels = Vec::with_capacity(n);
    let mut techs = Vec::with_capacity(n);
    let mut chp = Vec::with_capacity(n);
    let mut n_units = Vec::with_capacity(n);
    let mut capacity = Vec::with_capacity(n);
    let mut startups = Vec::with_capacity(n);
    let mut cf = Vec::with_capacity(n);
    let mut generation = Vec::with_capacity(n);
    let mut heat_generation = Vec::with_capacity(n);
    let mut co2 = Vec::with_capacity(n);
    let mut cost = Vec::with_capacity(n);
    let mut withdrawal = Vec::with_capacity(n);
    let mut consumption = Vec::with_capacity(n);

    for unit in units {
        let produced = snapshot.power.column_sum(unit.id);
        let nameplate = unit.capacity * unit.n_units;
        names.push(unit.name.clone());
        zones.push(snapshot.catalog.zone(unit.zone).name.clone());
        fuels.push(unit.fuel.clone());
        techs.push(unit.technology.clone());
        chp.push(if unit.chp.is_chp() { "CHP" } else { "Non-CHP" }.to_string());
        n_units.push(unit.n_units);
        capacity.push(nameplate);
        startups.push(transitions.startup_count(unit.id) as u32);
        cf.push(if nameplate > 0.0 {
            snapshot.power.column_mean(unit.id) / nameplate
        } else {
            0.0
        });
        generation.push(produced);
        heat_generation.push(snapshot.heat.column_sum(unit.id));
        co2.push(produced * unit.emission_rate);
        cost.push(unit_costs.column_sum(unit.id));
        withdrawal.push(produced * unit.water_withdrawal);
        consumption.push(produced * unit.water_consumption);
    }

    Ok(DataFrame::new(vec![
        Series::new("unit", names),
        Series::new("zone", zones),
        Series::new("fuel", fuels),
        Series::new("technology", techs),
        Series::new("chp", chp),
        Series::new("n_units", n_units),
        Series::new("capacity_mw", capacity),
        Series::new("startups", startups),
        Series::new("capacity_factor", cf),
        Series::new("generation_mwh", generation),
        Series::new("heat_generation_mwh", heat_generation),
        Series::new("co2_t", co2),
        Series::new("operating_cost_eur", cost),
        Series::new("water_withdrawal_m3", withdrawal),
        Series::new("water_consumption_m3", consumption),
    ])?)
}

/// Fuel × technology cross-tab of generation, CO2 and operating cost, split
/// into CHP and non-CHP classes. The full grid is emitted, zero rows
/// included, so the table shape only depends on the catalog.
pub fn fuel_crosstab(snapshot: &ResultsSnapshot, unit_costs: &UnitFrame) -> Result<DataFrame> {
    let fuels = snapshot.catalog.fuels();
    let techs = snapshot.catalog.technologies();

    let mut class_col = Vec::new();
    let mut fuel_col = Vec::new();
    let mut tech_col = Vec::new();
    let mut generation = Vec::new();
    let mut co2 = Vec::new();
    let mut cost = Vec::new();

    for class_is_chp in [true, false] {
        for fuel in &fuels {
            for tech in &techs {
                let mut gen_sum = 0.0;
                let mut co2_sum = 0.0;
                let mut cost_sum = 0.0;
                for unit in snapshot.catalog.units() {
                    if unit.chp.is_chp() != class_is_chp
                        || unit.fuel != *fuel
                        || unit.technology != *tech
                    {
                        continue;
                    }
                    let produced = snapshot.power.column_sum(unit.id);
                    gen_sum += produced;
                    co2_sum += produced * unit.emission_rate;
                    cost_sum += unit_costs.column_sum(unit.id);
                }
                class_col.push(if class_is_chp { "CHP" } else { "Non-CHP" }.to_string());
                fuel_col.push(fuel.clone());
                tech_col.push(tech.clone());
                generation.push(gen_sum);
                co2.push(co2_sum);
                cost.push(cost_sum);
            }
        }
    }

    Ok(DataFrame::new(vec![
        Series::new("chp", class_col),
        Series::new("fuel", fuel_col),
        Series::new("technology", tech_col),
        Series::new("generation_mwh", generation),
        Series::new("co2_t", co2),
        Series::new("operating_cost_eur", cost),
    ])?)
}

/// Zone-level storage indicators: installed capacity and power, implied
/// peak-load coverage hours and average daily cycle depth.
pub fn storage_table(snapshot: &ResultsSnapshot) -> Result<DataFrame> {
    let catalog = &snapshot.catalog;
    let zones = catalog.internal_zones();
    let storage_power = filters::filter_by_storage(&snapshot.power, catalog);

    let mut names = Vec::with_capacity(zones.len());
    let mut capacity = Vec::with_capacity(zones.len());
    let mut power = Vec::with_capacity(zones.len());
    let mut cover = Vec::with_capacity(zones.len());
    let mut cycle = Vec::with_capacity(zones.len());

    for zone in zones {
        let mut cap_mwh = 0.0;
        let mut power_mw = 0.0;
        for unit in catalog.units_in_zone(zone) {
            if unit.is_storage() {
                cap_mwh += unit.n_units * unit.storage_capacity;
                power_mw += unit.n_units * unit.capacity;
            }
        }
        let zone_output = filters::filter_by_zone(&storage_power, catalog, zone);
        let mean_output: f64 = zone_output
            .keys()
            .iter()
            .map(|u| zone_output.column_mean(*u))
            .sum();
        let peak = snapshot
            .zone_demand(zone)
            .into_iter()
            .fold(0.0_f64, f64::max);

        names.push(catalog.zone(zone).name.clone());
        capacity.push(cap_mwh);
        power.push(power_mw);
        cover.push(if peak > 0.0 { cap_mwh / peak } else { 0.0 });
        cycle.push(mean_output * 24.0 / (1e-9 + cap_mwh));
    }

    Ok(DataFrame::new(vec![
        Series::new("zone", names),
        Series::new("storage_capacity_mwh", capacity),
        Series::new("storage_power_mw", power),
        Series::new("peak_load_cover_h", cover),
        Series::new("avg_daily_cycle_depth", cycle),
    ])?)
}

/// Reserve availability tables: delivered over required per unit and
/// category (percent), and per-zone reserve demand ratios.
#[derive(Debug, Clone)]
pub struct ReserveAvailability {
    /// Columns: unit, category, mean_prct, total_prct
    pub availability: DataFrame,
    /// Columns: zone, upwards, downwards
    pub demand_ratios: DataFrame,
}

pub fn reserve_availability(
    snapshot: &ResultsSnapshot,
    diag: &mut Diagnostics,
) -> Result<ReserveAvailability> {
    let mut rows = AvailabilityRows::default();

    let (up2, up2_order) = delivered_map(&snapshot.reserve_2u);
    let (up3, up3_order) = delivered_map(&snapshot.reserve_3u);
    let (down, down_order) = delivered_map(&snapshot.reserve_2d);

    // Combined upward delivery per unit (2U + 3U)
    let mut up_total = up2.clone();
    let mut up_order = up2_order.clone();
    for (id, col) in &up3 {
        match up_total.get_mut(id) {
            Some(existing) => {
                for (acc, v) in existing.iter_mut().zip(col.iter()) {
                    *acc += v;
                }
            }
            None => {
                up_total.insert(*id, col.clone());
                up_order.push(*id);
            }
        }
    }

    // The 2U requirement is shared between the 2U and 3U products, hence the
    // halved denominator for those two categories.
    push_category(snapshot, &mut rows, "2U", &up2, &up2_order, &snapshot.reserve_demand_2u, true, diag);
    push_category(snapshot, &mut rows, "3U", &up3, &up3_order, &snapshot.reserve_demand_2u, true, diag);
    push_category(snapshot, &mut rows, "Down", &down, &down_order, &snapshot.reserve_demand_2d, false, diag);
    push_category(snapshot, &mut rows, "Up", &up_total, &up_order, &snapshot.reserve_demand_2u, false, diag);

    let availability = DataFrame::new(vec![
        Series::new("unit", rows.unit),
        Series::new("category", rows.category),
        Series::new("mean_prct", rows.mean),
        Series::new("total_prct", rows.total),
    ])?;

    // Per-zone reserve demand relative to the day-ahead peak
    let zones = snapshot.catalog.internal_zones();
    let mut zone_names = Vec::with_capacity(zones.len());
    let mut upwards = Vec::with_capacity(zones.len());
    let mut downwards = Vec::with_capacity(zones.len());
    for zone in zones {
        let peak_da = snapshot.demand_da.column_max(zone);
        let ratio = |frame: &ZoneFrame| {
            if peak_da > 0.0 {
                frame.column_mean(zone) / peak_da
            } else {
                0.0
            }
        };
        zone_names.push(snapshot.catalog.zone(zone).name.clone());
        upwards.push(ratio(&snapshot.reserve_demand_2u));
        downwards.push(ratio(&snapshot.reserve_demand_2d));
    }
    let demand_ratios = DataFrame::new(vec![
        Series::new("zone", zone_names),
        Series::new("upwards", upwards),
        Series::new("downwards", downwards),
    ])?;

    Ok(ReserveAvailability {
        availability,
        demand_ratios,
    })
}

#[derive(Default)]
struct AvailabilityRows {
    unit: Vec<String>,
    category: Vec<String>,
    mean: Vec<f64>,
    total: Vec<f64>,
}

fn delivered_map(frame: &UnitFrame) -> (HashMap<UnitId, Vec<f64>>, Vec<UnitId>) {
    let mut map = HashMap::new();
    let mut order = Vec::new();
    for (id, col) in frame.iter() {
        map.insert(id, col.to_vec());
        order.push(id);
    }
    (map, order)
}

#[allow(clippy::too_many_arguments)]
fn push_category(
    snapshot: &ResultsSnapshot,
    rows: &mut AvailabilityRows,
    category: &str,
    delivered: &HashMap<UnitId, Vec<f64>>,
    order: &[UnitId],
    requirement: &ZoneFrame,
    halved: bool,
    diag: &mut Diagnostics,
) {
    let divisor = if halved { 2.0 } else { 1.0 };
    for unit_id in order {
        let series = &delivered[unit_id];
        let unit = snapshot.catalog.unit(*unit_id);
        let Some(required) = requirement.column(unit.zone) else {
            diag.add_warning_with_entity(
                "reference",
                &format!(
                    "no reserve requirement for the unit's zone, {category} availability set to zero"
                ),
                &unit.name,
            );
            rows.unit.push(unit.name.clone());
            rows.category.push(category.to_string());
            rows.mean.push(0.0);
            rows.total.push(0.0);
            continue;
        };

        let mut hourly_sum = 0.0;
        for (value, req) in series.iter().zip(required.iter()) {
            let denom = req / divisor;
            if denom > 0.0 {
                hourly_sum += value / denom * 100.0;
            }
        }
        let mean = if series.is_empty() {
            0.0
        } else {
            hourly_sum / series.len() as f64
        };
        let req_total: f64 = required.iter().sum::<f64>() / divisor;
        let total = if req_total > 0.0 {
            series.iter().sum::<f64>() / req_total * 100.0
        } else {
            0.0
        };

        rows.unit.push(unit.name.clone());
        rows.category.push(category.to_string());
        rows.mean.push(mean);
        rows.total.push(total);
    }
}

/// Shed-load detail per internal zone: peak, total and active hours.
pub fn shed_load_table(snapshot: &ResultsSnapshot) -> Result<DataFrame> {
    zone_event_table(snapshot, &snapshot.shed_load)
}

/// Curtailment detail per internal zone: peak, total and active hours.
pub fn curtailment_table(snapshot: &ResultsSnapshot) -> Result<DataFrame> {
    zone_event_table(snapshot, &snapshot.curtailed_power)
}

fn zone_event_table(snapshot: &ResultsSnapshot, frame: &ZoneFrame) -> Result<DataFrame> {
    let zones = snapshot.catalog.internal_zones();
    let mut names = Vec::with_capacity(zones.len());
    let mut max = Vec::with_capacity(zones.len());
    let mut sum = Vec::with_capacity(zones.len());
    let mut hours = Vec::with_capacity(zones.len());
    for zone in zones {
        names.push(snapshot.catalog.zone(zone).name.clone());
        max.push(frame.column_max(zone));
        sum.push(frame.column_sum(zone));
        hours.push(frame.column_nonzero_count(zone) as u32);
    }
    Ok(DataFrame::new(vec![
        Series::new("zone", names),
        Series::new("max_mw", max),
        Series::new("total_mwh", sum),
        Series::new("hours", hours),
    ])?)
}

/// CO2 emissions per internal zone.
pub fn emissions_table(snapshot: &ResultsSnapshot) -> Result<DataFrame> {
    let zones = snapshot.catalog.internal_zones();
    let mut names = Vec::with_capacity(zones.len());
    let mut co2 = Vec::with_capacity(zones.len());
    for zone in zones {
        let total: f64 = snapshot
            .catalog
            .units_in_zone(zone)
            .iter()
            .map(|u| snapshot.power.column_sum(u.id) * u.emission_rate)
            .sum();
        names.push(snapshot.catalog.zone(zone).name.clone());
        co2.push(total);
    }
    Ok(DataFrame::new(vec![
        Series::new("zone", names),
        Series::new("co2_t", co2),
    ])?)
}

/// Load, residual load and net residual load curves of one zone.
///
/// Residual load nets out the variable-renewable production potential of the
/// zone; the net residual additionally nets the committed interconnection
/// minima.
pub fn load_data(snapshot: &ResultsSnapshot, zone: ZoneId) -> Result<DataFrame> {
    let len = snapshot.index.len();
    let mut load = vec![0.0; len];
    for frame in [&snapshot.demand_da, &snapshot.demand_flex] {
        if let Some(col) = frame.column(zone) {
            for (acc, v) in load.iter_mut().zip(col.iter()) {
                *acc += v;
            }
        }
    }

    let mut vre = vec![0.0; len];
    for unit in snapshot.catalog.units_in_zone(zone) {
        if !unit.is_renewable() {
            continue;
        }
        if let Some(af) = snapshot.availability_factor.column(unit.id) {
            let nameplate = unit.capacity * unit.n_units;
            for (acc, factor) in vre.iter_mut().zip(af.iter()) {
                *acc += factor * nameplate;
            }
        }
    }

    let mut interconnections = vec![0.0; len];
    for line in snapshot.catalog.lines() {
        let sign = if line.from == zone {
            -1.0
        } else if line.to == zone {
            1.0
        } else {
            continue;
        };
        if let Some(minimum) = snapshot.flow_minimum.column(line.id) {
            for (acc, v) in interconnections.iter_mut().zip(minimum.iter()) {
                *acc += sign * v;
            }
        }
    }

    let timestamps: Vec<String> = snapshot
        .index
        .iter()
        .map(|ts| ts.format("%Y-%m-%d %H:%M:%S").to_string())
        .collect();
    let residual: Vec<f64> = load.iter().zip(vre.iter()).map(|(l, v)| l - v).collect();
    let net_residual: Vec<f64> = residual
        .iter()
        .zip(interconnections.iter())
        .map(|(r, i)| r - i)
        .collect();

    Ok(DataFrame::new(vec![
        Series::new("time", timestamps),
        Series::new("Load", load),
        Series::new("ResidualLoad", residual),
        Series::new("NetResidualLoad", net_residual),
    ])?)
}

/// Equivalent full-load operating hours of storage-charging units: total
/// storage input over the nameplate charging power.
pub fn equivalent_full_load_hours(snapshot: &ResultsSnapshot) -> Result<DataFrame> {
    let mut names = Vec::new();
    let mut efoh = Vec::new();
    for (unit_id, column) in snapshot.storage_input.iter() {
        let unit = snapshot.catalog.unit(unit_id);
        let nameplate = unit.capacity * unit.n_units;
        names.push(unit.name.clone());
        efoh.push(if nameplate > 0.0 {
            column.iter().sum::<f64>() / nameplate
        } else {
            0.0
        });
    }
    Ok(DataFrame::new(vec![
        Series::new("unit", names),
        Series::new("efoh", efoh),
    ])?)
}

/// Import dependency per zone, from a flow-trace result: the share of served
/// demand contributed by other zones.
pub fn import_dependency_table(
    trace: &crate::trace::FlowTrace,
    snapshot: &ResultsSnapshot,
) -> Result<DataFrame> {
    let mut names = Vec::with_capacity(trace.zones.len());
    let mut own = Vec::with_capacity(trace.zones.len());
    let mut imported = Vec::with_capacity(trace.zones.len());
    for (i, zone) in trace.zones.iter().enumerate() {
        let own_share = trace.trace_prct[i][i];
        names.push(snapshot.catalog.zone(*zone).name.clone());
        own.push(own_share);
        imported.push(if trace.gross_inflow[i] != 0.0 {
            1.0 - own_share
        } else {
            0.0
        });
    }
    Ok(DataFrame::new(vec![
        Series::new("zone", names),
        Series::new("own_share", own),
        Series::new("imported_share", imported),
    ])?)
}

/// Generation of one zone folded by fuel, one column per fuel.
pub fn generation_by_fuel(
    snapshot: &ResultsSnapshot,
    zone: ZoneId,
    diag: &mut Diagnostics,
) -> Result<DataFrame> {
    let zonal = filters::filter_by_zone(&snapshot.power, &snapshot.catalog, zone);
    filters::aggregate_by_fuel(&zonal, &snapshot.catalog, diag)
}
