//! State-transition extraction.
//!
//! Derives startup/shutdown event series and ramp-up/ramp-down level series
//! from the commitment and power tables. The horizon is extended one step
//! backward with the unit's externally supplied initial state, so the first
//! real step already carries correct transitions; the artificial leading step
//! itself never appears in the output.

use expost_core::{Diagnostics, ResultsSnapshot, UnitFrame, UnitId};

/// Commitment values are solver output and may carry integrality slack;
/// anything above this counts as "on".
const COMMITTED_THRESHOLD: f64 = 0.5;

/// Startup/shutdown events and ramp levels per unit, aligned to the
/// snapshot's time index.
///
/// Invariants (see the tests):
/// - `startup[t]` and `shutdown[t]` are never both positive,
/// - `startup[t] - shutdown[t]` equals the commitment difference after
///   initial-state correction.
#[derive(Debug, Clone)]
pub struct StateTransitions {
    /// 1.0 at steps where the unit starts up
    pub startup: UnitFrame,
    /// 1.0 at steps where the unit shuts down
    pub shutdown: UnitFrame,
    /// MW increase relative to the previous step (0 when ramping down)
    pub ramp_up: UnitFrame,
    /// MW decrease relative to the previous step (0 when ramping up)
    pub ramp_down: UnitFrame,
}

impl StateTransitions {
    /// Number of startup events of one unit over the horizon.
    pub fn startup_count(&self, unit: UnitId) -> usize {
        self.startup.column_sum(unit).round() as usize
    }
}

/// Extract transition series for every unit appearing in the commitment or
/// power table.
///
/// A unit present in the commitment table but absent from the power table is
/// a data-quality condition: it is reported as a reference warning, its power
/// is taken as zero and the unit is kept in every output frame. A unit with
/// power but no commitment column simply gets zero startup/shutdown series.
pub fn extract(snapshot: &ResultsSnapshot, diag: &mut Diagnostics) -> StateTransitions {
    let len = snapshot.index.len();
    let mut startup = UnitFrame::new(len);
    let mut shutdown = UnitFrame::new(len);
    let mut ramp_up = UnitFrame::new(len);
    let mut ramp_down = UnitFrame::new(len);

    let mut units: Vec<UnitId> = snapshot.committed.keys().to_vec();
    for id in snapshot.power.keys() {
        if !units.contains(id) {
            units.push(*id);
        }
    }

    for unit_id in units {
        let unit = snapshot.catalog.unit(unit_id);

        let commitment = snapshot.committed.column(unit_id);
        let power = snapshot.power.column(unit_id);
        if commitment.is_some() && power.is_none() {
            diag.add_warning_with_entity(
                "reference",
                "unit is in the commitment table but not in the power table, assuming zero power",
                &unit.name,
            );
        }

        let mut su = vec![0.0; len];
        let mut sd = vec![0.0; len];
        let mut ru = vec![0.0; len];
        let mut rd = vec![0.0; len];

        // Artificial step before the horizon, from the supplied initial state.
        let mut prev_committed = if unit.initial_committed() { 1.0 } else { 0.0 };
        let mut prev_power = unit.initial_power;

        for t in 0..len {
            if let Some(c) = commitment {
                let on: f64 = if c[t] > COMMITTED_THRESHOLD { 1.0 } else { 0.0 };
                su[t] = (on - prev_committed).max(0.0);
                sd[t] = (prev_committed - on).max(0.0);
                prev_committed = on;
            }
            let p = power.map_or(0.0, |p| p[t]);
            ru[t] = (p - prev_power).max(0.0);
            rd[t] = (prev_power - p).max(0.0);
            prev_power = p;
        }

        // Keys were deduplicated above, so these inserts cannot fail.
        startup.insert(unit_id, su).expect("unique unit column");
        shutdown.insert(unit_id, sd).expect("unique unit column");
        ramp_up.insert(unit_id, ru).expect("unique unit column");
        ramp_down.insert(unit_id, rd).expect("unique unit column");
    }

    StateTransitions {
        startup,
        shutdown,
        ramp_up,
        ramp_down,
    }
}
