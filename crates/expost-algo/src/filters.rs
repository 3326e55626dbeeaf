//! Frame filtering and aggregation plumbing.
//!
//! Small helpers for slicing per-unit frames by zone, technology or storage
//! class and for folding them into per-fuel series. The indicator tables are
//! assembled from these.

use anyhow::Result;
use polars::prelude::*;

use expost_core::{Catalog, Diagnostics, UnitFrame};

/// Columns of the units located in one zone.
pub fn filter_by_zone(frame: &UnitFrame, catalog: &Catalog, zone: expost_core::ZoneId) -> UnitFrame {
    let mut out = UnitFrame::new(frame.len());
    for (unit_id, column) in frame.iter() {
        if catalog.unit(unit_id).zone == zone {
            out.insert(unit_id, column.to_vec()).expect("unique key");
        }
    }
    out
}

/// Columns of the units with one specific technology.
pub fn filter_by_tech(frame: &UnitFrame, catalog: &Catalog, tech: &str) -> UnitFrame {
    let mut out = UnitFrame::new(frame.len());
    for (unit_id, column) in frame.iter() {
        if catalog.unit(unit_id).technology == tech {
            out.insert(unit_id, column.to_vec()).expect("unique key");
        }
    }
    out
}

/// Columns of the units whose technology is in the given list.
pub fn filter_by_tech_list(frame: &UnitFrame, catalog: &Catalog, techs: &[&str]) -> UnitFrame {
    let mut out = UnitFrame::new(frame.len());
    for tech in techs {
        for (unit_id, column) in frame.iter() {
            if catalog.unit(unit_id).technology == *tech && !out.contains(unit_id) {
                out.insert(unit_id, column.to_vec()).expect("unique key");
            }
        }
    }
    out
}

/// Columns of the storage units only.
pub fn filter_by_storage(frame: &UnitFrame, catalog: &Catalog) -> UnitFrame {
    let mut out = UnitFrame::new(frame.len());
    for (unit_id, column) in frame.iter() {
        if catalog.unit(unit_id).is_storage() {
            out.insert(unit_id, column.to_vec()).expect("unique key");
        }
    }
    out
}

/// Fold a per-unit frame into one column per fuel.
///
/// A unit without a fuel assignment is reported as a reference warning and
/// its column is left out of the aggregate.
pub fn aggregate_by_fuel(
    frame: &UnitFrame,
    catalog: &Catalog,
    diag: &mut Diagnostics,
) -> Result<DataFrame> {
    let fuels = catalog.fuels();
    let mut sums: Vec<Vec<f64>> = vec![vec![0.0; frame.len()]; fuels.len()];

    for (unit_id, column) in frame.iter() {
        let unit = catalog.unit(unit_id);
        match fuels.iter().position(|f| *f == unit.fuel) {
            Some(fi) => {
                for (acc, v) in sums[fi].iter_mut().zip(column.iter()) {
                    *acc += v;
                }
            }
            None => {
                diag.add_warning_with_entity(
                    "reference",
                    &format!("fuel not found for unit (fuel '{}')", unit.fuel),
                    &unit.name,
                );
            }
        }
    }

    let columns: Vec<Series> = fuels
        .iter()
        .zip(sums.into_iter())
        .map(|(fuel, values)| Series::new(fuel, values))
        .collect();
    Ok(DataFrame::new(columns)?)
}
