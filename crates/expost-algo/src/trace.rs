//! Proportional-sharing (Bialek) power-flow tracing.
//!
//! Attributes the demand served in each zone to the zones that generated it,
//! using the upstream-looking proportional sharing method (Bialek et al.,
//! doi:10.1049/ip-gtd:19960461) over an aggregation window:
//!
//! 1. Gross nodal inflow `P[z] = Demand[z] + NetExports[z] - ShedLoad[z]`
//!    summed over the window.
//! 2. Distribution matrix `D`: diagonal `P[z]`, off-diagonal `-flow` for
//!    each internal line; `A[i][j] = D[j][i] / P[j]`.
//! 3. `trace[i][j] = inv(A)[i][j] · Gen[j] · Demand[i]/P[i]`: the energy of
//!    zone `j`'s generation serving zone `i`'s demand. Row-normalizing gives
//!    percentage shares.
//!
//! A zone with zero gross traffic contributes an identity diagonal and ends
//! up with a zero row and column, not a division error. Any other singular
//! matrix is fatal for that window only and is reported distinctly.
//!
//! Known limitation carried from the method: flows to/from the aggregate
//! rest-of-world zone are excluded from the matrix, so conservation is not
//! guaranteed across that boundary. The caveat is raised as a tracing
//! warning, never silently patched.

use anyhow::Result;
use polars::prelude::*;
use rayon::prelude::*;

use expost_core::{
    Catalog, Diagnostics, ExpostError, ExpostResult, LineId, LinearSystemBackend,
    ResultsSnapshot, Window, ZoneId,
};

/// Tracing policy knobs. The default window length matches the upstream
/// convention of tracing the first day when no window is given.
#[derive(Debug, Clone)]
pub struct TracingConfig {
    pub default_window_len: usize,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            default_window_len: 24,
        }
    }
}

/// Flow allocation of one aggregation window.
///
/// `trace[i][j]` is the energy of zone `j`'s generation serving zone `i`'s
/// demand (MWh over the window); `trace_prct` is the row-normalized share
/// form. Rows and columns follow `zones` order.
#[derive(Debug, Clone)]
pub struct FlowTrace {
    pub window: Window,
    pub zones: Vec<ZoneId>,
    /// Gross nodal inflow P per zone over the window
    pub gross_inflow: Vec<f64>,
    pub trace: Vec<Vec<f64>>,
    pub trace_prct: Vec<Vec<f64>>,
}

impl FlowTrace {
    /// Matrix as a table: one row per consuming zone, one column per
    /// contributing zone.
    pub fn to_dataframe(&self, catalog: &Catalog, percentage: bool) -> Result<DataFrame> {
        let matrix = if percentage { &self.trace_prct } else { &self.trace };
        let zone_names: Vec<String> = self
            .zones
            .iter()
            .map(|z| catalog.zone(*z).name.clone())
            .collect();
        let mut columns = vec![Series::new("zone", zone_names.clone())];
        for (j, source) in zone_names.iter().enumerate() {
            let col: Vec<f64> = matrix.iter().map(|row| row[j]).collect();
            columns.push(Series::new(source, col));
        }
        Ok(DataFrame::new(columns)?)
    }
}

/// Trace one aggregation window.
///
/// With `window = None` the first `default_window_len` steps are used and a
/// warning is raised that a short window may be unrepresentative.
pub fn trace_window(
    snapshot: &ResultsSnapshot,
    window: Option<Window>,
    backend: &dyn LinearSystemBackend,
    config: &TracingConfig,
    diag: &mut Diagnostics,
) -> ExpostResult<FlowTrace> {
    let window = match window {
        Some(w) => snapshot.index.window(w.start, w.len)?,
        None => {
            diag.add_warning(
                "tracing",
                "no window specified, tracing only the first day of the horizon; \
                 a short window may be unrepresentative",
            );
            let len = config.default_window_len.min(snapshot.index.len());
            snapshot.index.window(0, len)?
        }
    };

    let catalog = &snapshot.catalog;
    let zones = catalog.internal_zones();
    let n = zones.len();
    if n == 0 {
        return Err(ExpostError::Validation(
            "no internal zones to trace".into(),
        ));
    }
    if catalog.has_boundary_lines() {
        diag.add_warning(
            "tracing",
            "flows to/from the rest-of-world zone are excluded from the trace matrix; \
             conservation across that boundary is not guaranteed",
        );
    }

    let position: std::collections::HashMap<ZoneId, usize> = zones
        .iter()
        .enumerate()
        .map(|(i, z)| (*z, i))
        .collect();

    // Window totals per zone
    let mut demand = vec![0.0; n];
    let mut generation = vec![0.0; n];
    let mut net_exports = vec![0.0; n];
    let mut shed = vec![0.0; n];
    for (i, zone) in zones.iter().enumerate() {
        demand[i] = snapshot.demand_da.column_sum_window(*zone, window);
        generation[i] = snapshot.zone_generation(*zone, window);
        shed[i] = snapshot.shed_load.column_sum_window(*zone, window);
    }
    // Exports accumulate on the sending zone, including exports across the
    // rest-of-world boundary.
    for line in catalog.lines() {
        if let Some(&i) = position.get(&line.from) {
            net_exports[i] += snapshot.flow.column_sum_window(line.id, window);
        }
    }

    let gross_inflow: Vec<f64> = (0..n)
        .map(|i| demand[i] + net_exports[i] - shed[i])
        .collect();

    // Distribution matrix: diagonal gross inflow, -flow per internal line
    let mut d = vec![vec![0.0; n]; n];
    for (i, row) in d.iter_mut().enumerate() {
        row[i] = gross_inflow[i];
    }
    for line in catalog.internal_lines() {
        let i = position[&line.from];
        let j = position[&line.to];
        let f = snapshot.flow.column_sum_window(line.id, window);
        d[i][j] -= f;
    }

    // A = D^T with columns normalized by gross inflow; zero-traffic zones
    // keep an identity diagonal so they drop out without singularity.
    let mut a = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in 0..n {
            if gross_inflow[j] != 0.0 {
                a[i][j] = d[j][i] / gross_inflow[j];
            } else if i == j {
                a[i][j] = 1.0;
            }
        }
    }

    let inv = backend
        .invert(&a)
        .map_err(|_| ExpostError::SingularWindow {
            start: window.start,
            len: window.len,
        })?;

    let share: Vec<f64> = (0..n)
        .map(|i| {
            if gross_inflow[i] != 0.0 {
                demand[i] / gross_inflow[i]
            } else {
                0.0
            }
        })
        .collect();

    let mut trace = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in 0..n {
            trace[i][j] = inv[i][j] * generation[j] * share[i];
        }
    }

    let trace_prct = trace
        .iter()
        .map(|row| {
            let sum: f64 = row.iter().sum();
            if sum != 0.0 {
                row.iter().map(|v| v / sum).collect()
            } else {
                vec![0.0; n]
            }
        })
        .collect();

    Ok(FlowTrace {
        window,
        zones,
        gross_inflow,
        trace,
        trace_prct,
    })
}

/// Trace several windows in parallel. Windows are independent and read-only
/// over the snapshot; a singular window fails alone. Per-window diagnostics
/// are merged into `diag` in window order.
pub fn trace_windows(
    snapshot: &ResultsSnapshot,
    windows: &[Window],
    backend: &dyn LinearSystemBackend,
    config: &TracingConfig,
    diag: &mut Diagnostics,
) -> Vec<ExpostResult<FlowTrace>> {
    let outcomes: Vec<(ExpostResult<FlowTrace>, Diagnostics)> = windows
        .par_iter()
        .map(|w| {
            let mut local = Diagnostics::new();
            let result = trace_window(snapshot, Some(*w), backend, config, &mut local);
            (result, local)
        })
        .collect();

    let mut results = Vec::with_capacity(outcomes.len());
    for (result, local) in outcomes {
        diag.merge(local);
        results.push(result);
    }
    results
}

/// One directed internal line with its window flow total.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineFlow {
    pub line: LineId,
    pub from: ZoneId,
    pub to: ZoneId,
    pub flow: f64,
}

/// Directed edge list of internal flows over a window, for graph-style
/// consumers of the allocation.
pub fn window_flows(snapshot: &ResultsSnapshot, window: Window) -> Vec<LineFlow> {
    snapshot
        .catalog
        .internal_lines()
        .into_iter()
        .map(|line| LineFlow {
            line: line.id,
            from: line.from,
            to: line.to,
            flow: snapshot.flow.column_sum_window(line.id, window),
        })
        .collect()
}

/// Net position of one zone over a window: demand plus net exports (clipped
/// at zero for importing zones).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NetPosition {
    pub zone: ZoneId,
    pub net_imports: f64,
    pub net_position: f64,
}

pub fn net_positions(snapshot: &ResultsSnapshot, window: Window) -> Vec<NetPosition> {
    snapshot
        .catalog
        .internal_zones()
        .into_iter()
        .map(|zone| {
            let net_imports = snapshot.net_imports(zone, window);
            let net_exports = (-net_imports).max(0.0);
            NetPosition {
                zone,
                net_imports,
                net_position: snapshot.demand_da.column_sum_window(zone, window) + net_exports,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use expost_core::{Catalog, FaerSolver, GaussSolver, TimeIndex, Unit};

    /// Two zones, one line A -> B with constant flow 10 over one step.
    /// Demand_A = 50, Gen_A = 60, Demand_B = 50, Gen_B = 40.
    fn two_zone_snapshot() -> ResultsSnapshot {
        let mut catalog = Catalog::new();
        let a = catalog.add_zone("A", false).unwrap();
        let b = catalog.add_zone("B", false).unwrap();
        catalog.add_line(a, b).unwrap();
        let ga = catalog.push_unit(Unit::new("GenA".to_string(), a)).unwrap();
        let gb = catalog.push_unit(Unit::new("GenB".to_string(), b)).unwrap();

        let start = NaiveDate::from_ymd_opt(2019, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let mut snapshot = ResultsSnapshot::empty(catalog, TimeIndex::hourly(start, 1));
        let line = snapshot.catalog.line_by_name("A -> B").unwrap();
        snapshot.power.insert(ga, vec![60.0]).unwrap();
        snapshot.power.insert(gb, vec![40.0]).unwrap();
        snapshot.flow.insert(line, vec![10.0]).unwrap();
        snapshot.demand_da.insert(a, vec![50.0]).unwrap();
        snapshot.demand_da.insert(b, vec![50.0]).unwrap();
        snapshot
    }

    #[test]
    fn test_two_zone_hand_calculation() {
        let snapshot = two_zone_snapshot();
        let mut diag = Diagnostics::new();
        let window = snapshot.index.full_window().unwrap();
        let result = trace_window(
            &snapshot,
            Some(window),
            &FaerSolver,
            &TracingConfig::default(),
            &mut diag,
        )
        .unwrap();

        // P[A] = 50 + 10 = 60, P[B] = 50 (no exports from B).
        assert_eq!(result.gross_inflow, vec![60.0, 50.0]);
        // Hand-derived: A serves its own 50; B's 50 split 10 from A, 40 own.
        let expected = [[50.0, 0.0], [10.0, 40.0]];
        for i in 0..2 {
            for j in 0..2 {
                assert!(
                    (result.trace[i][j] - expected[i][j]).abs() < 1e-9,
                    "trace[{i}][{j}] = {}",
                    result.trace[i][j]
                );
            }
        }
        assert!((result.trace_prct[1][0] - 0.2).abs() < 1e-9);
        assert!((result.trace_prct[1][1] - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_prct_rows_sum_to_one() {
        let snapshot = two_zone_snapshot();
        let mut diag = Diagnostics::new();
        let window = snapshot.index.full_window().unwrap();
        let result = trace_window(
            &snapshot,
            Some(window),
            &GaussSolver,
            &TracingConfig::default(),
            &mut diag,
        )
        .unwrap();

        for (i, row) in result.trace_prct.iter().enumerate() {
            if result.gross_inflow[i] != 0.0 {
                let sum: f64 = row.iter().sum();
                assert!((sum - 1.0).abs() < 1e-9, "row {i} sums to {sum}");
            }
        }
    }

    #[test]
    fn test_idle_zone_yields_zero_row_and_column() {
        let mut snapshot = two_zone_snapshot();
        // A third zone with no demand, generation or flows.
        snapshot.catalog.add_zone("C", false).unwrap();
        let mut diag = Diagnostics::new();
        let window = snapshot.index.full_window().unwrap();
        let result = trace_window(
            &snapshot,
            Some(window),
            &FaerSolver,
            &TracingConfig::default(),
            &mut diag,
        )
        .unwrap();

        assert_eq!(result.zones.len(), 3);
        assert_eq!(result.gross_inflow[2], 0.0);
        for j in 0..3 {
            assert_eq!(result.trace[2][j], 0.0);
            assert_eq!(result.trace[j][2], 0.0);
            assert_eq!(result.trace_prct[2][j], 0.0);
        }
    }

    #[test]
    fn test_default_window_warns() {
        let snapshot = two_zone_snapshot();
        let mut diag = Diagnostics::new();
        let result = trace_window(
            &snapshot,
            None,
            &FaerSolver,
            &TracingConfig::default(),
            &mut diag,
        )
        .unwrap();

        // Horizon is a single step, so the default day window is clamped.
        assert_eq!(result.window, Window { start: 0, len: 1 });
        assert!(diag
            .warnings()
            .any(|w| w.message.contains("unrepresentative")));
    }

    #[test]
    fn test_rest_of_world_exports_carried_with_caveat() {
        let mut snapshot = two_zone_snapshot();
        let a = snapshot.catalog.zone_by_name("A").unwrap();
        let row = snapshot
            .catalog
            .add_zone(expost_core::REST_OF_WORLD, true)
            .unwrap();
        let boundary = snapshot.catalog.add_line(a, row).unwrap();
        snapshot.flow.insert(boundary, vec![5.0]).unwrap();

        let mut diag = Diagnostics::new();
        let window = snapshot.index.full_window().unwrap();
        let result = trace_window(
            &snapshot,
            Some(window),
            &FaerSolver,
            &TracingConfig::default(),
            &mut diag,
        )
        .unwrap();

        // The boundary export raises A's gross inflow but adds no matrix row.
        assert_eq!(result.zones.len(), 2);
        assert_eq!(result.gross_inflow[0], 65.0);
        assert!(diag.warnings().any(|w| w.message.contains("rest-of-world")));
    }

    #[test]
    fn test_empty_window_rejected() {
        let snapshot = two_zone_snapshot();
        let mut diag = Diagnostics::new();
        let err = trace_window(
            &snapshot,
            Some(Window { start: 0, len: 0 }),
            &FaerSolver,
            &TracingConfig::default(),
            &mut diag,
        )
        .unwrap_err();
        assert!(matches!(err, ExpostError::Validation(_)));
    }

    #[test]
    fn test_singular_window_reported_distinctly() {
        // A circular exchange with no demand anywhere: both zones pass the
        // same 10 MWh back and forth, which makes the sharing matrix rank
        // deficient (det = 1 - f²/(P_A·P_B) = 0).
        let mut catalog = Catalog::new();
        let a = catalog.add_zone("A", false).unwrap();
        let b = catalog.add_zone("B", false).unwrap();
        catalog.add_line(a, b).unwrap();
        catalog.add_line(b, a).unwrap();
        let ga = catalog.push_unit(Unit::new("GenA".to_string(), a)).unwrap();
        let start = NaiveDate::from_ymd_opt(2019, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let mut snapshot = ResultsSnapshot::empty(catalog, TimeIndex::hourly(start, 1));
        let ab = snapshot.catalog.line_by_name("A -> B").unwrap();
        let ba = snapshot.catalog.line_by_name("B -> A").unwrap();
        snapshot.power.insert(ga, vec![0.0]).unwrap();
        snapshot.flow.insert(ab, vec![10.0]).unwrap();
        snapshot.flow.insert(ba, vec![10.0]).unwrap();

        let mut diag = Diagnostics::new();
        let window = snapshot.index.full_window().unwrap();
        let err = trace_window(
            &snapshot,
            Some(window),
            &FaerSolver,
            &TracingConfig::default(),
            &mut diag,
        )
        .unwrap_err();
        assert!(matches!(err, ExpostError::SingularWindow { .. }));
    }

    #[test]
    fn test_parallel_windows_match_sequential() {
        let mut catalog = Catalog::new();
        let a = catalog.add_zone("A", false).unwrap();
        let b = catalog.add_zone("B", false).unwrap();
        catalog.add_line(a, b).unwrap();
        let ga = catalog.push_unit(Unit::new("GenA".to_string(), a)).unwrap();
        let gb = catalog.push_unit(Unit::new("GenB".to_string(), b)).unwrap();
        let start = NaiveDate::from_ymd_opt(2019, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let mut snapshot = ResultsSnapshot::empty(catalog, TimeIndex::hourly(start, 48));
        let line = snapshot.catalog.line_by_name("A -> B").unwrap();
        snapshot.power.insert(ga, vec![60.0; 48]).unwrap();
        snapshot.power.insert(gb, vec![40.0; 48]).unwrap();
        snapshot.flow.insert(line, vec![10.0; 48]).unwrap();
        snapshot.demand_da.insert(a, vec![50.0; 48]).unwrap();
        snapshot.demand_da.insert(b, vec![50.0; 48]).unwrap();

        let windows = [Window { start: 0, len: 24 }, Window { start: 24, len: 24 }];
        let mut diag = Diagnostics::new();
        let results = trace_windows(
            &snapshot,
            &windows,
            &FaerSolver,
            &TracingConfig::default(),
            &mut diag,
        );

        assert_eq!(results.len(), 2);
        let first = results[0].as_ref().unwrap();
        let second = results[1].as_ref().unwrap();
        for i in 0..2 {
            for j in 0..2 {
                assert!((first.trace[i][j] - second.trace[i][j]).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_window_flows_and_net_positions() {
        let snapshot = two_zone_snapshot();
        let window = snapshot.index.full_window().unwrap();

        let flows = window_flows(&snapshot, window);
        assert_eq!(flows.len(), 1);
        assert_eq!(flows[0].flow, 10.0);

        let positions = net_positions(&snapshot, window);
        // A exports 10: net position 60; B imports: net position stays 50.
        assert_eq!(positions[0].net_imports, -10.0);
        assert_eq!(positions[0].net_position, 60.0);
        assert_eq!(positions[1].net_imports, 10.0);
        assert_eq!(positions[1].net_position, 50.0);
    }

    #[test]
    fn test_trace_dataframe_shape() {
        let snapshot = two_zone_snapshot();
        let mut diag = Diagnostics::new();
        let window = snapshot.index.full_window().unwrap();
        let result = trace_window(
            &snapshot,
            Some(window),
            &FaerSolver,
            &TracingConfig::default(),
            &mut diag,
        )
        .unwrap();

        let df = result.to_dataframe(&snapshot.catalog, true).unwrap();
        assert_eq!(df.height(), 2);
        assert_eq!(df.width(), 3); // zone column + one per source zone
    }
}
