use std::time::Duration;

use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::EngineParams;
use crate::domain::{DayStatus, RosterData};
use crate::engine::{constraints, objective, variables};
use crate::engine::variables::ShiftTable;
use crate::error::{EscalaResult, SolveError};
use crate::input;
use crate::schedule::{Schedule, WorkerStats};
use crate::solver::{CpSolver, CpStatus, CpModel, Solution};

/// The three read-only input tables of a store section.
#[derive(Debug, Clone)]
pub struct InputTables {
    pub employees: DataFrame,
    pub calendar: DataFrame,
    pub demand: DataFrame,
}

/// Solver statistics reported with every successful run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SolverStats {
    pub status: CpStatus,
    pub objective: i64,
    pub best_bound: i64,
    pub branches: u64,
    pub conflicts: u64,
    pub wall_time: Duration,
}

/// A complete schedule with its solver statistics.
#[derive(Debug, Clone)]
pub struct RosterOutcome {
    pub schedule: Schedule,
    pub stats: SolverStats,
}

/// Normalizes the input tables and solves the scheduling model.
///
/// The run is atomic: it returns a complete schedule satisfying every hard
/// constraint, or the first fatal error. The caller decides whether to retry
/// with relaxed parameters.
#[tracing::instrument(skip_all)]
pub fn solve_roster(tables: &InputTables, params: &EngineParams) -> EscalaResult<RosterOutcome> {
    let data = input::normalize(&tables.employees, &tables.calendar, &tables.demand, params)?;
    solve_prepared(&data, params)
}

/// Builds and solves the model for already-normalized data.
#[tracing::instrument(skip_all)]
pub fn solve_prepared(data: &RosterData, params: &EngineParams) -> EscalaResult<RosterOutcome> {
    let mut model = CpModel::new();
    let table = variables::build(&mut model, data, params);
    constraints::apply_all(&mut model, &table, data, params);
    objective::build(&mut model, &table, data, params);
    info!(
        variables = model.num_vars(),
        constraints = model.num_constraints(),
        time_limit_secs = params.solver.time_limit.as_secs(),
        num_workers = params.solver.num_workers,
        "model built, starting the solver"
    );

    let solver = CpSolver::new(&params.solver);
    let result = solver.solve(&model);
    info!(
        status = result.status.name(),
        objective = result.stats.objective,
        best_bound = result.stats.best_bound,
        branches = result.stats.branches,
        conflicts = result.stats.conflicts,
        wall_time_ms = result.stats.wall_time.as_millis() as u64,
        "solver returned"
    );

    match result.status {
        CpStatus::Optimal | CpStatus::Feasible => {
            let Some(solution) = result.solution else {
                return Err(SolveError::ModelInvalid(String::from(
                    "solver reported a solution status without an assignment",
                ))
                .into());
            };
            let schedule = extract(data, params, &table, &solution);
            Ok(RosterOutcome {
                schedule,
                stats: SolverStats {
                    status: result.status,
                    objective: result.stats.objective,
                    best_bound: result.stats.best_bound,
                    branches: result.stats.branches,
                    conflicts: result.stats.conflicts,
                    wall_time: result.stats.wall_time,
                },
            })
        }
        CpStatus::Infeasible => Err(SolveError::Infeasible {
            diagnostics: infeasibility_diagnostics(data),
        }
        .into()),
        CpStatus::ModelInvalid => {
            let reason = model
                .validate()
                .err()
                .map(|e| e.to_string())
                .unwrap_or_else(|| String::from("constraint emission produced an invalid model"));
            Err(SolveError::ModelInvalid(reason).into())
        }
        CpStatus::Unknown => Err(SolveError::TimeLimit {
            limit_secs: params.solver.time_limit.as_secs(),
        }
        .into()),
    }
}

/// Extracts the dense schedule table and per-worker counters from a
/// solution.
fn extract(
    data: &RosterData,
    params: &EngineParams,
    table: &ShiftTable,
    solution: &Solution,
) -> Schedule {
    let workers: Vec<_> = data.workers.keys().copied().collect();
    let mut schedule = Schedule::new(workers, data.calendar.days.clone());

    for worker in data.all() {
        let mut stats = WorkerStats::default();
        for &day in &data.calendar.days {
            let assigned = params
                .shifts
                .iter()
                .copied()
                .find(|&status| {
                    table
                        .get(worker.id, day, status)
                        .is_some_and(|var| solution.boolean(var))
                });
            let status = match assigned {
                Some(status) => status,
                None => {
                    stats.unassigned += 1;
                    DayStatus::OutOfRange
                }
            };
            schedule.set(worker.id, day, status);
            match status {
                DayStatus::DayOff => stats.ordinary_off += 1,
                DayStatus::QualityOff => stats.quality_off += 1,
                DayStatus::CompensationOff => stats.compensation_off += 1,
                DayStatus::Morning | DayStatus::Afternoon => {
                    if data.calendar.special_days.contains(&day) {
                        stats.worked_special_days += 1;
                    }
                }
                _ => {}
            }
        }
        info!(
            worker = %worker.id,
            ordinary_off = stats.ordinary_off,
            quality_off = stats.quality_off,
            compensation_off = stats.compensation_off,
            worked_special = stats.worked_special_days,
            unassigned = stats.unassigned,
            "worker extracted"
        );
        schedule.set_stats(worker.id, stats);
    }
    schedule
}

/// Names the worker and the week carrying the most pre-fixed days; the
/// usual suspects when the hard constraints collapse.
fn infeasibility_diagnostics(data: &RosterData) -> String {
    let fixed_count = |w: &crate::domain::Worker| {
        w.fixed_days_off.len() + w.fixed_lqs.len() + w.absences.len() + w.missing_days.len()
    };
    let worst_worker = data
        .all()
        .max_by_key(|w| fixed_count(w))
        .map(|w| format!("worker {} carries {} pre-fixed days", w.id, fixed_count(w)));

    let worst_week = data
        .calendar
        .weeks_all
        .iter()
        .map(|(week, days)| {
            let fixed: usize = data
                .all()
                .map(|w| {
                    days.iter()
                        .filter(|d| {
                            w.fixed_days_off.contains(d)
                                || w.fixed_lqs.contains(d)
                                || w.absences.contains(d)
                        })
                        .count()
                })
                .sum();
            (*week, fixed)
        })
        .max_by_key(|(_, fixed)| *fixed)
        .map(|(week, fixed)| format!("week {week} holds {fixed} pre-fixed days"));

    match (worst_worker, worst_week) {
        (Some(worker), Some(week)) => format!("{worker}; {week}"),
        (Some(worker), None) => worker,
        (None, Some(week)) => week,
        (None, None) => String::from("no workers after normalization"),
    }
}
