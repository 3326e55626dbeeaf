//! End-to-end pipeline tests: CSV tables -> snapshot -> all four engines.

use std::fs;
use std::path::Path;

use expost_algo::costs::{self, CostConfig};
use expost_algo::indicators::{self, MaterialityConfig};
use expost_algo::trace::{self, TracingConfig};
use expost_algo::transitions;
use expost_core::{Diagnostics, FaerSolver};

/// Two zones connected by one line, a gas unit exporting to a wind zone.
/// The reported system cost is the hand-computed objective, so the run must
/// reconcile without flags.
fn write_fixture(dir: &Path) {
    fs::write(
        dir.join("units.csv"),
        "\
unit,zone,fuel,technology,chp_type,power_capacity,nunits,storage_capacity,power_initial,cost_fixed,cost_startup,cost_shutdown,cost_ramp_up,cost_ramp_down,chp_power_loss_factor,emission_rate,water_withdrawal,water_consumption,is_consumer
GasA,AT,GAS,COMC,,100,1,0,60,10,500,100,2,1,,0.4,0,0,false
WindB,DE,WIN,WTON,,50,2,0,0,,,,,,,0,0,0,false
",
    )
    .unwrap();
    fs::write(
        dir.join("power.csv"),
        "time,GasA,WindB\n\
         2019-01-01 00:00:00,60,40\n\
         2019-01-01 01:00:00,60,40\n",
    )
    .unwrap();
    fs::write(
        dir.join("committed.csv"),
        "time,GasA\n\
         2019-01-01 00:00:00,1\n\
         2019-01-01 01:00:00,1\n",
    )
    .unwrap();
    fs::write(
        dir.join("cost_variable.csv"),
        "time,GasA\n\
         2019-01-01 00:00:00,20\n\
         2019-01-01 01:00:00,20\n",
    )
    .unwrap();
    fs::write(
        dir.join("demand_da.csv"),
        "time,AT,DE\n\
         2019-01-01 00:00:00,50,50\n\
         2019-01-01 01:00:00,50,50\n",
    )
    .unwrap();
    fs::write(
        dir.join("flows.csv"),
        "time,AT -> DE\n\
         2019-01-01 00:00:00,10\n\
         2019-01-01 01:00:00,10\n",
    )
    .unwrap();
    fs::write(
        dir.join("price_transmission.csv"),
        "time,AT -> DE\n\
         2019-01-01 00:00:00,0.5\n\
         2019-01-01 01:00:00,0.5\n",
    )
    .unwrap();
    // Objective per step: fixed 10 + variable 20*60 + transmission 0.5*10.
    fs::write(
        dir.join("system_cost.csv"),
        "time,cost\n\
         2019-01-01 00:00:00,1215\n\
         2019-01-01 01:00:00,1215\n",
    )
    .unwrap();
}

#[test]
fn pipeline_reconciles_and_traces() {
    let dir = tempfile::tempdir().unwrap();
    write_fixture(dir.path());

    let mut diag = Diagnostics::new();
    let (snapshot, stats) = expost_io::load_snapshot(dir.path(), &mut diag).unwrap();
    assert_eq!(stats.units, 2);
    assert_eq!(stats.lines, 1);

    let tr = transitions::extract(&snapshot, &mut diag);
    let gas = snapshot.catalog.unit_by_name("GasA").unwrap();
    // Initially on and committed throughout: no events.
    assert_eq!(tr.startup_count(gas), 0);

    let (ledger, reconciliation) =
        costs::decompose(&snapshot, &tr, &CostConfig::default(), &mut diag).unwrap();
    assert_eq!(ledger.totals(), vec![1215.0, 1215.0]);
    assert!(!reconciliation.flagged);

    let window = snapshot.index.full_window().unwrap();
    let trace = trace::trace_window(
        &snapshot,
        Some(window),
        &FaerSolver,
        &TracingConfig::default(),
        &mut diag,
    )
    .unwrap();
    // P[AT] = 100 + 20 exports, P[DE] = 100.
    assert_eq!(trace.gross_inflow, vec![120.0, 100.0]);
    let expected = [[100.0, 0.0], [20.0, 80.0]];
    for i in 0..2 {
        for j in 0..2 {
            assert!((trace.trace[i][j] - expected[i][j]).abs() < 1e-9);
        }
    }
    for row in &trace.trace_prct {
        let sum: f64 = row.iter().sum();
        assert!((sum - 1.0).abs() < 1e-9);
    }

    let unit_costs = costs::unit_operation_costs(&snapshot, &tr, &mut diag).unwrap();
    let summary =
        indicators::system_summary(&snapshot, &MaterialityConfig::default(), &mut diag).unwrap();
    assert_eq!(summary.total_load_mwh, 200.0);
    assert_eq!(summary.peak_load_mw, 100.0);
    assert!((summary.avg_cost_eur_per_mwh - 2430.0 / 200.0).abs() < 1e-9);

    let units = indicators::unit_table(&snapshot, &tr, &unit_costs).unwrap();
    let cf = units.column("capacity_factor").unwrap().f64().unwrap();
    assert!((cf.get(0).unwrap() - 0.6).abs() < 1e-9);

    // The whole pipeline ran on clean data: warnings at most, no errors.
    assert!(!diag.has_errors(), "unexpected errors: {diag}");
}

#[test]
fn pipeline_flags_mismatched_reported_cost() {
    let dir = tempfile::tempdir().unwrap();
    write_fixture(dir.path());
    fs::write(
        dir.path().join("system_cost.csv"),
        "time,cost\n\
         2019-01-01 00:00:00,2000\n\
         2019-01-01 01:00:00,2000\n",
    )
    .unwrap();

    let mut diag = Diagnostics::new();
    let (snapshot, _) = expost_io::load_snapshot(dir.path(), &mut diag).unwrap();
    let tr = transitions::extract(&snapshot, &mut diag);
    let (_, reconciliation) =
        costs::decompose(&snapshot, &tr, &CostConfig::default(), &mut diag).unwrap();

    assert!(reconciliation.flagged);
    assert!(diag.has_errors());
}

#[test]
fn pipeline_persists_result_tables() {
    let dir = tempfile::tempdir().unwrap();
    write_fixture(dir.path());

    let mut diag = Diagnostics::new();
    let (snapshot, _) = expost_io::load_snapshot(dir.path(), &mut diag).unwrap();
    let tr = transitions::extract(&snapshot, &mut diag);
    let (ledger, _) =
        costs::decompose(&snapshot, &tr, &CostConfig::default(), &mut diag).unwrap();

    let out_dir = tempfile::tempdir().unwrap();
    let out = out_dir.path().join("ledger.csv");
    let mut df = ledger.to_dataframe(&snapshot.index).unwrap();
    expost_algo::io::persist_dataframe(&mut df, &out, expost_algo::io::OutputStage::CostLedger)
        .unwrap();

    let text = fs::read_to_string(&out).unwrap();
    assert!(text.contains("FixedCosts"));
    assert!(text.contains("ReportedCost"));
}
