//! # expost-algo: Ex-post Analysis Engines
//!
//! The four engines that turn a [`expost_core::ResultsSnapshot`] into derived
//! results:
//!
//! - [`transitions`], startup/shutdown/ramp series from commitment and power
//! - [`costs`], ex-post reconstruction of every objective cost term,
//!   reconciled against the solver-reported total
//! - [`trace`], proportional-sharing (Bialek) allocation of network flows
//!   to the zones that caused them
//! - [`indicators`], zone/unit/fuel/storage/reserve summary tables and
//!   materiality flags
//!
//! plus [`filters`] (frame slicing plumbing) and [`io`] (result-table
//! persistence). Everything runs single-pass over the immutable snapshot;
//! the engines never touch the filesystem themselves.
//!
//! Data flow:
//!
//! ```text
//! snapshot ─> transitions ─> costs ────────┐
//! snapshot ─> trace (per window, rayon) ───┼─> indicators
//! snapshot ─────────────────────────────────┘
//! ```

pub mod costs;
pub mod filters;
pub mod indicators;
pub mod io;
pub mod trace;
pub mod transitions;

pub use costs::{CostCategory, CostConfig, CostLedger, ReconciliationSummary};
pub use indicators::{MaterialityConfig, SystemSummary};
pub use trace::{FlowTrace, TracingConfig};
pub use transitions::StateTransitions;
