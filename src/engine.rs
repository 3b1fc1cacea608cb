//! Model building and solving: decision-variable materialization,
//! the hard-constraint library, the weighted objective, and the solver
//! driver with schedule extraction.

pub mod constraints;
pub mod objective;
pub mod solve;
pub mod variables;

pub use solve::{InputTables, RosterOutcome, SolverStats, solve_prepared, solve_roster};
pub use variables::ShiftTable;
