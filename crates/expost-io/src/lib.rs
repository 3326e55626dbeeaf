//! # expost-io: Snapshot Loading
//!
//! The boundary between the filesystem and the analysis engines. This crate
//! reads a directory of CSV tables, the tabulated exports of a
//! unit-commitment run, and assembles them into an immutable
//! [`ResultsSnapshot`]. All file I/O of the workspace happens here or in
//! `expost_algo::io`; the engines themselves never touch the filesystem.
//!
//! ## Expected layout
//!
//! - `units.csv`: the static unit table (required)
//! - `power.csv`: per-unit power output; defines the time index (required)
//! - optional series tables, one file per series, first column `time`,
//!   remaining columns named after units, zones or `From -> To` lines:
//!   `committed.csv`, `heat.csv`, `flows.csv`, `shed_load.csv`,
//!   `demand_da.csv`, `shadow_price.csv`, `system_cost.csv`, ...
//!
//! Unknown columns are reported as reference warnings and skipped; a missing
//! optional file simply leaves the series empty. A misaligned time column is
//! a structural error, no meaningful output is possible from it.

use std::fs::File;
use std::path::Path;

use anyhow::Context;
use chrono::NaiveDateTime;
use polars::prelude::*;
use serde::Deserialize;

use expost_core::{
    Catalog, ChpType, Diagnostics, ExpostError, ExpostResult, LineFrame, ResultsSnapshot,
    TimeIndex, Unit, UnitFrame, ZoneFrame, REST_OF_WORLD,
};

const TIME_COLUMN: &str = "time";
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Counts of what the loader found, mirrored back to the caller.
#[derive(Debug, Clone, Default)]
pub struct LoadStats {
    pub units: usize,
    pub zones: usize,
    pub lines: usize,
    pub series_tables: usize,
    pub skipped_columns: usize,
}

/// One row of `units.csv`. Absent coefficient cells stay `None`, which the
/// cost decomposer reports as reference warnings.
#[derive(Debug, Deserialize)]
struct UnitRecord {
    unit: String,
    zone: String,
    #[serde(default)]
    fuel: String,
    #[serde(default)]
    technology: String,
    #[serde(default)]
    chp_type: String,
    #[serde(default)]
    power_capacity: f64,
    #[serde(default = "default_nunits")]
    nunits: f64,
    #[serde(default)]
    storage_capacity: f64,
    #[serde(default)]
    power_initial: f64,
    cost_fixed: Option<f64>,
    cost_startup: Option<f64>,
    cost_shutdown: Option<f64>,
    cost_ramp_up: Option<f64>,
    cost_ramp_down: Option<f64>,
    chp_power_loss_factor: Option<f64>,
    #[serde(default)]
    emission_rate: f64,
    #[serde(default)]
    water_withdrawal: f64,
    #[serde(default)]
    water_consumption: f64,
    #[serde(default)]
    is_consumer: bool,
}

fn default_nunits() -> f64 {
    1.0
}

/// Load a snapshot from a directory of CSV tables.
pub fn load_snapshot(
    dir: &Path,
    diag: &mut Diagnostics,
) -> ExpostResult<(ResultsSnapshot, LoadStats)> {
    let mut stats = LoadStats::default();

    // Static unit table first: it seeds the catalog with units and zones.
    let records = load_unit_records(&dir.join("units.csv"))?;
    let mut catalog = Catalog::new();
    for record in &records {
        if catalog.zone_by_name(&record.zone).is_none() {
            catalog.add_zone(&record.zone, record.zone == REST_OF_WORLD)?;
        }
    }
    for record in records {
        let zone = catalog
            .zone_by_name(&record.zone)
            .expect("zone registered above");
        let mut unit = Unit::new(record.unit, zone);
        unit.fuel = record.fuel;
        unit.technology = record.technology;
        unit.chp = ChpType::from_label(&record.chp_type)?;
        unit.capacity = record.power_capacity;
        unit.n_units = record.nunits;
        unit.storage_capacity = record.storage_capacity;
        unit.initial_power = record.power_initial;
        unit.cost_fixed = record.cost_fixed;
        unit.cost_startup = record.cost_startup;
        unit.cost_shutdown = record.cost_shutdown;
        unit.cost_ramp_up = record.cost_ramp_up;
        unit.cost_ramp_down = record.cost_ramp_down;
        unit.chp_power_loss_factor = record.chp_power_loss_factor;
        unit.emission_rate = record.emission_rate;
        unit.water_withdrawal = record.water_withdrawal;
        unit.water_consumption = record.water_consumption;
        unit.is_consumer = record.is_consumer;
        catalog.push_unit(unit)?;
    }

    // The power table is fundamental: it defines the time index.
    let power_df = read_table(&dir.join("power.csv"))?.ok_or_else(|| {
        ExpostError::Structure("power.csv is missing, no meaningful output is possible".into())
    })?;
    let index = TimeIndex::from_timestamps(&timestamps_of(&power_df)?)?;

    // Zones can also appear demand-only; lines come from flow-table headers.
    for file in ["demand_da.csv", "demand_flex.csv", "shed_load.csv"] {
        if let Some(df) = read_table(&dir.join(file))? {
            for name in entity_columns(&df) {
                if catalog.zone_by_name(&name).is_none() {
                    catalog.add_zone(&name, name == REST_OF_WORLD)?;
                }
            }
        }
    }
    for file in LINE_TABLES {
        if let Some(df) = read_table(&dir.join(file))? {
            for name in entity_columns(&df) {
                register_line(&mut catalog, &name, diag)?;
            }
        }
    }

    catalog.validate_into(diag);
    stats.units = catalog.units().len();
    stats.zones = catalog.zones().len();
    stats.lines = catalog.lines().len();

    let mut snapshot = ResultsSnapshot::empty(catalog, index);

    // Per-unit series
    fill_unit_frame(&power_df, &mut snapshot.power, &snapshot.catalog, &snapshot.index, "power.csv", diag, &mut stats)?;
    stats.series_tables += 1;
    {
        let unit_tables: [(&str, fn(&mut ResultsSnapshot) -> &mut UnitFrame); 13] = [
            ("committed.csv", |s| &mut s.committed),
            ("heat.csv", |s| &mut s.heat),
            ("power_consumption.csv", |s| &mut s.power_consumption),
            ("reserve_2u.csv", |s| &mut s.reserve_2u),
            ("reserve_2d.csv", |s| &mut s.reserve_2d),
            ("reserve_3u.csv", |s| &mut s.reserve_3u),
            ("storage_input.csv", |s| &mut s.storage_input),
            ("storage_slack.csv", |s| &mut s.storage_slack),
            ("spillage.csv", |s| &mut s.spillage),
            ("availability_factor.csv", |s| &mut s.availability_factor),
            ("cost_variable.csv", |s| &mut s.cost_variable),
            ("cost_h2_slack.csv", |s| &mut s.cost_h2_slack),
            ("heat_shadow_price.csv", |s| &mut s.heat_shadow_price),
        ];
        for (file, target) in unit_tables {
            if let Some(df) = read_table(&dir.join(file))? {
                let mut frame = UnitFrame::new(snapshot.index.len());
                fill_unit_frame(&df, &mut frame, &snapshot.catalog, &snapshot.index, file, diag, &mut stats)?;
                *target(&mut snapshot) = frame;
                stats.series_tables += 1;
            }
        }
    }

    // Per-zone series
    let zone_tables: [(&str, fn(&mut ResultsSnapshot) -> &mut ZoneFrame); 17] = [
        ("demand_da.csv", |s| &mut s.demand_da),
        ("demand_flex.csv", |s| &mut s.demand_flex),
        ("shed_load.csv", |s| &mut s.shed_load),
        ("curtailed_power.csv", |s| &mut s.curtailed_power),
        ("curtailed_heat.csv", |s| &mut s.curtailed_heat),
        ("heat_slack.csv", |s| &mut s.heat_slack),
        ("demand_modulation.csv", |s| &mut s.demand_modulation),
        ("shadow_price.csv", |s| &mut s.shadow_price),
        ("shadow_price_2u.csv", |s| &mut s.shadow_price_2u),
        ("shadow_price_2d.csv", |s| &mut s.shadow_price_2d),
        ("shadow_price_3u.csv", |s| &mut s.shadow_price_3u),
        ("reserve_demand_2u.csv", |s| &mut s.reserve_demand_2u),
        ("reserve_demand_2d.csv", |s| &mut s.reserve_demand_2d),
        ("cost_load_shedding.csv", |s| &mut s.cost_load_shedding),
        ("cost_heat_slack.csv", |s| &mut s.cost_heat_slack),
        ("lost_load_max_power.csv", |s| &mut s.lost_load.max_power),
        ("lost_load_min_power.csv", |s| &mut s.lost_load.min_power),
    ];
    for (file, target) in zone_tables {
        if let Some(df) = read_table(&dir.join(file))? {
            let mut frame = ZoneFrame::new(snapshot.index.len());
            fill_zone_frame(&df, &mut frame, &snapshot.catalog, &snapshot.index, file, diag, &mut stats)?;
            *target(&mut snapshot) = frame;
            stats.series_tables += 1;
        }
    }
    let zone_ll_tables: [(&str, fn(&mut ResultsSnapshot) -> &mut ZoneFrame); 3] = [
        ("lost_load_2u.csv", |s| &mut s.lost_load.reserve_2u),
        ("lost_load_2d.csv", |s| &mut s.lost_load.reserve_2d),
        ("lost_load_3u.csv", |s| &mut s.lost_load.reserve_3u),
    ];
    for (file, target) in zone_ll_tables {
        if let Some(df) = read_table(&dir.join(file))? {
            let mut frame = ZoneFrame::new(snapshot.index.len());
            fill_zone_frame(&df, &mut frame, &snapshot.catalog, &snapshot.index, file, diag, &mut stats)?;
            *target(&mut snapshot) = frame;
            stats.series_tables += 1;
        }
    }
    let unit_ll_tables: [(&str, fn(&mut ResultsSnapshot) -> &mut UnitFrame); 2] = [
        ("lost_load_ramp_up.csv", |s| &mut s.lost_load.ramp_up),
        ("lost_load_ramp_down.csv", |s| &mut s.lost_load.ramp_down),
    ];
    for (file, target) in unit_ll_tables {
        if let Some(df) = read_table(&dir.join(file))? {
            let mut frame = UnitFrame::new(snapshot.index.len());
            fill_unit_frame(&df, &mut frame, &snapshot.catalog, &snapshot.index, file, diag, &mut stats)?;
            *target(&mut snapshot) = frame;
            stats.series_tables += 1;
        }
    }

    // Per-line series
    let line_tables: [(&str, fn(&mut ResultsSnapshot) -> &mut LineFrame); 4] = [
        ("flows.csv", |s| &mut s.flow),
        ("flow_maximum.csv", |s| &mut s.flow_maximum),
        ("flow_minimum.csv", |s| &mut s.flow_minimum),
        ("price_transmission.csv", |s| &mut s.price_transmission),
    ];
    for (file, target) in line_tables {
        if let Some(df) = read_table(&dir.join(file))? {
            let mut frame = LineFrame::new(snapshot.index.len());
            fill_line_frame(&df, &mut frame, &snapshot.catalog, &snapshot.index, file, diag, &mut stats)?;
            *target(&mut snapshot) = frame;
            stats.series_tables += 1;
        }
    }

    // Reported objective value
    if let Some(df) = read_table(&dir.join("system_cost.csv"))? {
        check_alignment(&df, &snapshot.index, "system_cost.csv")?;
        snapshot.system_cost = numeric_column(&df, "cost")?;
        stats.series_tables += 1;
    }

    snapshot.validate()?;
    Ok((snapshot, stats))
}

/// Line-keyed tables; used both to register lines and to fill frames.
const LINE_TABLES: [&str; 4] = [
    "flows.csv",
    "flow_maximum.csv",
    "flow_minimum.csv",
    "price_transmission.csv",
];

fn load_unit_records(path: &Path) -> ExpostResult<Vec<UnitRecord>> {
    if !path.exists() {
        return Err(ExpostError::Structure(
            "units.csv is missing, the catalog cannot be built".into(),
        ));
    }
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("opening {}", path.display()))?;
    let mut records = Vec::new();
    for row in reader.deserialize() {
        let record: UnitRecord = row
            .map_err(|e| ExpostError::Parse(format!("units.csv: {e}")))?;
        records.push(record);
    }
    Ok(records)
}

fn read_table(path: &Path) -> ExpostResult<Option<DataFrame>> {
    if !path.exists() {
        return Ok(None);
    }
    let mut file =
        File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let df = CsvReader::new(&mut file)
        .has_header(true)
        .finish()
        .with_context(|| format!("reading {}", path.display()))?;
    Ok(Some(df))
}

/// Column names except the time column, as owned strings.
fn entity_columns(df: &DataFrame) -> Vec<String> {
    df.get_column_names()
        .iter()
        .filter(|name| **name != TIME_COLUMN)
        .map(|name| name.to_string())
        .collect()
}

/// Register a "From -> To" line header, creating boundary zones on demand.
fn register_line(
    catalog: &mut Catalog,
    label: &str,
    diag: &mut Diagnostics,
) -> ExpostResult<()> {
    if catalog.line_by_name(label).is_some() {
        return Ok(());
    }
    let Some((from_name, to_name)) = label.split_once(" -> ") else {
        diag.add_warning_with_entity(
            "reference",
            "flow column is not a 'From -> To' label, skipped",
            label,
        );
        return Ok(());
    };
    let from_name = from_name.trim();
    let to_name = to_name.trim();
    let from = match catalog.zone_by_name(from_name) {
        Some(id) => id,
        None => catalog.add_zone(from_name, from_name == REST_OF_WORLD)?,
    };
    let to = match catalog.zone_by_name(to_name) {
        Some(id) => id,
        None => catalog.add_zone(to_name, to_name == REST_OF_WORLD)?,
    };
    catalog.add_line(from, to)?;
    Ok(())
}

fn timestamps_of(df: &DataFrame) -> ExpostResult<Vec<NaiveDateTime>> {
    let column = df
        .column(TIME_COLUMN)
        .map_err(|_| ExpostError::Structure("series table has no 'time' column".into()))?;
    let values = column
        .utf8()
        .map_err(|_| ExpostError::Structure("'time' column must be text timestamps".into()))?;
    let mut out = Vec::with_capacity(values.len());
    for value in values.into_iter() {
        let text = value.ok_or_else(|| {
            ExpostError::Structure("'time' column contains an empty cell".into())
        })?;
        let ts = NaiveDateTime::parse_from_str(text, TIME_FORMAT)
            .map_err(|e| ExpostError::Parse(format!("timestamp '{text}': {e}")))?;
        out.push(ts);
    }
    Ok(out)
}

fn check_alignment(df: &DataFrame, index: &TimeIndex, file: &str) -> ExpostResult<()> {
    let timestamps = timestamps_of(df)?;
    if TimeIndex::from_timestamps(&timestamps)? != *index {
        return Err(ExpostError::Structure(format!(
            "{file} is not aligned to the power table's time index"
        )));
    }
    Ok(())
}

/// Numeric column with nulls as zero (absent cells contribute nothing).
fn numeric_column(df: &DataFrame, name: &str) -> ExpostResult<Vec<f64>> {
    let series = df
        .column(name)
        .map_err(|e| ExpostError::Structure(e.to_string()))?
        .cast(&DataType::Float64)
        .map_err(|e| ExpostError::Parse(format!("column '{name}': {e}")))?;
    let values = series
        .f64()
        .map_err(|e| ExpostError::Parse(format!("column '{name}': {e}")))?;
    Ok(values.into_iter().map(|v| v.unwrap_or(0.0)).collect())
}

fn fill_unit_frame(
    df: &DataFrame,
    frame: &mut UnitFrame,
    catalog: &Catalog,
    index: &TimeIndex,
    file: &str,
    diag: &mut Diagnostics,
    stats: &mut LoadStats,
) -> ExpostResult<()> {
    check_alignment(df, index, file)?;
    for name in entity_columns(df) {
        match catalog.unit_by_name(&name) {
            Some(id) => frame.insert(id, numeric_column(df, &name)?)?,
            None => {
                diag.add_warning_with_entity(
                    "reference",
                    &format!("{file} column does not match any unit, skipped"),
                    &name,
                );
                stats.skipped_columns += 1;
            }
        }
    }
    Ok(())
}

fn fill_zone_frame(
    df: &DataFrame,
    frame: &mut ZoneFrame,
    catalog: &Catalog,
    index: &TimeIndex,
    file: &str,
    diag: &mut Diagnostics,
    stats: &mut LoadStats,
) -> ExpostResult<()> {
    check_alignment(df, index, file)?;
    for name in entity_columns(df) {
        match catalog.zone_by_name(&name) {
            Some(id) => frame.insert(id, numeric_column(df, &name)?)?,
            None => {
                diag.add_warning_with_entity(
                    "reference",
                    &format!("{file} column does not match any zone, skipped"),
                    &name,
                );
                stats.skipped_columns += 1;
            }
        }
    }
    Ok(())
}

fn fill_line_frame(
    df: &DataFrame,
    frame: &mut LineFrame,
    catalog: &Catalog,
    index: &TimeIndex,
    file: &str,
    diag: &mut Diagnostics,
    stats: &mut LoadStats,
) -> ExpostResult<()> {
    check_alignment(df, index, file)?;
    for name in entity_columns(df) {
        match catalog.line_by_name(&name) {
            Some(id) => frame.insert(id, numeric_column(df, &name)?)?,
            None => {
                diag.add_warning_with_entity(
                    "reference",
                    &format!("{file} column does not match any line, skipped"),
                    &name,
                );
                stats.skipped_columns += 1;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const UNITS_CSV: &str = "\
unit,zone,fuel,technology,chp_type,power_capacity,nunits,storage_capacity,power_initial,cost_fixed,cost_startup,cost_shutdown,cost_ramp_up,cost_ramp_down,chp_power_loss_factor,emission_rate,water_withdrawal,water_consumption,is_consumer
Gas1,AT,GAS,COMC,,400,1,0,100,10,500,100,2,1,,0.4,1.5,0.5,false
Wind1,DE,WIN,WTON,,50,2,0,0,,,,,,,0,0,0,false
Chp1,AT,GAS,STUR,Extraction,120,1,0,0,5,200,50,1,1,0.2,0.3,1.0,0.4,false
";

    fn write_sample(dir: &Path) {
        fs::write(dir.join("units.csv"), UNITS_CSV).unwrap();
        fs::write(
            dir.join("power.csv"),
            "time,Gas1,Wind1,Chp1\n\
             2019-01-01 00:00:00,100,40,60\n\
             2019-01-01 01:00:00,120,40,60\n",
        )
        .unwrap();
        fs::write(
            dir.join("committed.csv"),
            "time,Gas1,Chp1\n\
             2019-01-01 00:00:00,1,1\n\
             2019-01-01 01:00:00,1,1\n",
        )
        .unwrap();
        fs::write(
            dir.join("demand_da.csv"),
            "time,AT,DE\n\
             2019-01-01 00:00:00,150,40\n\
             2019-01-01 01:00:00,170,40\n",
        )
        .unwrap();
        fs::write(
            dir.join("flows.csv"),
            "time,AT -> DE,RoW -> AT\n\
             2019-01-01 00:00:00,10,5\n\
             2019-01-01 01:00:00,10,5\n",
        )
        .unwrap();
        fs::write(
            dir.join("system_cost.csv"),
            "time,cost\n\
             2019-01-01 00:00:00,5000\n\
             2019-01-01 01:00:00,5200\n",
        )
        .unwrap();
    }

    #[test]
    fn test_load_snapshot_builds_catalog_and_series() {
        let dir = tempdir().unwrap();
        write_sample(dir.path());
        let mut diag = Diagnostics::new();
        let (snapshot, stats) = load_snapshot(dir.path(), &mut diag).unwrap();

        assert_eq!(stats.units, 3);
        // AT, DE from units; RoW from the flow header.
        assert_eq!(stats.zones, 3);
        assert_eq!(stats.lines, 2);
        assert_eq!(snapshot.index.len(), 2);

        let gas = snapshot.catalog.unit_by_name("Gas1").unwrap();
        assert_eq!(snapshot.power.column(gas).unwrap(), &[100.0, 120.0]);
        assert_eq!(snapshot.catalog.unit(gas).cost_startup, Some(500.0));
        assert!(snapshot.catalog.unit(gas).initial_committed());

        // Wind has no coefficients: loader keeps them as None.
        let wind = snapshot.catalog.unit_by_name("Wind1").unwrap();
        assert_eq!(snapshot.catalog.unit(wind).cost_fixed, None);

        let chp = snapshot.catalog.unit_by_name("Chp1").unwrap();
        assert_eq!(snapshot.catalog.unit(chp).chp, ChpType::Extraction);
        assert_eq!(
            snapshot.catalog.unit(chp).chp_power_loss_factor,
            Some(0.2)
        );

        let row = snapshot
            .catalog
            .zone_by_name(REST_OF_WORLD)
            .map(|z| snapshot.catalog.zone(z).rest_of_world);
        assert_eq!(row, Some(true));

        assert_eq!(snapshot.system_cost, vec![5000.0, 5200.0]);
    }

    #[test]
    fn test_missing_power_table_is_structural() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("units.csv"), UNITS_CSV).unwrap();
        let mut diag = Diagnostics::new();
        let err = load_snapshot(dir.path(), &mut diag).unwrap_err();
        assert!(matches!(err, ExpostError::Structure(_)));
    }

    #[test]
    fn test_misaligned_series_is_structural() {
        let dir = tempdir().unwrap();
        write_sample(dir.path());
        // One step short.
        fs::write(
            dir.path().join("shed_load.csv"),
            "time,AT\n2019-01-01 00:00:00,1\n",
        )
        .unwrap();
        let mut diag = Diagnostics::new();
        let err = load_snapshot(dir.path(), &mut diag).unwrap_err();
        assert!(matches!(err, ExpostError::Structure(_)));
    }

    #[test]
    fn test_unknown_columns_warn_and_skip() {
        let dir = tempdir().unwrap();
        write_sample(dir.path());
        fs::write(
            dir.path().join("heat.csv"),
            "time,Chp1,Ghost1\n\
             2019-01-01 00:00:00,30,1\n\
             2019-01-01 01:00:00,30,1\n",
        )
        .unwrap();
        let mut diag = Diagnostics::new();
        let (snapshot, stats) = load_snapshot(dir.path(), &mut diag).unwrap();

        assert_eq!(stats.skipped_columns, 1);
        assert!(diag
            .issues_by_category("reference")
            .any(|i| i.entity.as_deref() == Some("Ghost1")));
        let chp = snapshot.catalog.unit_by_name("Chp1").unwrap();
        assert_eq!(snapshot.heat.column(chp).unwrap(), &[30.0, 30.0]);
    }

    #[test]
    fn test_commitment_integers_become_floats() {
        let dir = tempdir().unwrap();
        write_sample(dir.path());
        let mut diag = Diagnostics::new();
        let (snapshot, _) = load_snapshot(dir.path(), &mut diag).unwrap();
        let gas = snapshot.catalog.unit_by_name("Gas1").unwrap();
        assert_eq!(snapshot.committed.column(gas).unwrap(), &[1.0, 1.0]);
    }

    #[test]
    fn test_bad_timestamp_is_parse_error() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("units.csv"), UNITS_CSV).unwrap();
        fs::write(
            dir.path().join("power.csv"),
            "time,Gas1\nnot-a-time,1\n",
        )
        .unwrap();
        let mut diag = Diagnostics::new();
        let err = load_snapshot(dir.path(), &mut diag).unwrap_err();
        assert!(matches!(err, ExpostError::Parse(_)));
    }
}
