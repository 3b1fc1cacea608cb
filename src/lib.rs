//! Yearly retail-workforce shift scheduling under labor-law and
//! collective-agreement constraints.
//!
//! For each worker and each day of the horizon the engine assigns exactly
//! one status (morning/afternoon shift, ordinary/quality/compensation day
//! off, closed-store day, absence, vacation, out-of-range), honoring the
//! hard-constraint library of contractual quotas and weekend structure
//! while minimizing a weighted staffing-and-fairness objective.
//!
//! The pipeline is strictly linear: normalize the three input tables,
//! materialize decision variables, add constraints and the objective to one
//! model, solve, extract. See [`solve_roster`] for the single entry point.

// === Public Modules (The Canonical Paths) ===
pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod input;
pub mod schedule;
pub mod solver;

// === Facades (Re-exporting internals) ===
pub use crate::config::{EngineParams, ObjectiveWeights, Settings, SolverConfig};
pub use crate::engine::{InputTables, RosterOutcome, SolverStats, solve_prepared, solve_roster};
pub use crate::error::{EscalaError, EscalaResult};
pub use crate::schedule::{Schedule, WorkerStats};
pub use crate::solver::CpStatus;
