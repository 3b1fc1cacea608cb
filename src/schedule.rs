use std::collections::BTreeMap;
use std::str::FromStr;

use polars::prelude::{Column, DataFrame, DataType};
use serde::{Deserialize, Serialize};

use crate::domain::{DayStatus, WorkerId};
use crate::error::{EscalaResult, InputError};

// ================================================================================================
// Per-worker statistics
// ================================================================================================

/// Assignment counters per worker, emitted next to the schedule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerStats {
    /// Ordinary `L` days.
    pub ordinary_off: u32,
    /// Quality `LQ` days.
    pub quality_off: u32,
    /// Compensation `LD` days.
    pub compensation_off: u32,
    /// Worked morning/afternoon shifts on Sundays or holidays.
    pub worked_special_days: u32,
    /// Days without any materialized assignment (outside the active range).
    pub unassigned: u32,
}

// ================================================================================================
// Schedule
// ================================================================================================

/// A dense `worker × day` status matrix plus per-worker statistics.
///
/// Equality compares the assignment matrix only; statistics are derived
/// data and dropped by the long-format round trip.
#[derive(Debug, Clone)]
pub struct Schedule {
    workers: Vec<WorkerId>,
    days: Vec<u32>,
    grid: Vec<Vec<DayStatus>>,
    stats: BTreeMap<WorkerId, WorkerStats>,
}

impl PartialEq for Schedule {
    fn eq(&self, other: &Self) -> bool {
        self.workers == other.workers && self.days == other.days && self.grid == other.grid
    }
}

impl Schedule {
    pub fn new(workers: Vec<WorkerId>, days: Vec<u32>) -> Self {
        let grid = vec![vec![DayStatus::OutOfRange; days.len()]; workers.len()];
        Self {
            workers,
            days,
            grid,
            stats: BTreeMap::new(),
        }
    }

    pub fn workers(&self) -> &[WorkerId] {
        &self.workers
    }

    pub fn days(&self) -> &[u32] {
        &self.days
    }

    pub fn set(&mut self, worker: WorkerId, day: u32, status: DayStatus) {
        if let (Some(row), Some(col)) = (self.worker_row(worker), self.day_col(day)) {
            self.grid[row][col] = status;
        }
    }

    pub fn status(&self, worker: WorkerId, day: u32) -> Option<DayStatus> {
        let row = self.worker_row(worker)?;
        let col = self.day_col(day)?;
        Some(self.grid[row][col])
    }

    pub fn set_stats(&mut self, worker: WorkerId, stats: WorkerStats) {
        self.stats.insert(worker, stats);
    }

    pub fn worker_stats(&self, worker: WorkerId) -> Option<&WorkerStats> {
        self.stats.get(&worker)
    }

    pub fn stats(&self) -> impl Iterator<Item = (&WorkerId, &WorkerStats)> {
        self.stats.iter()
    }

    /// Count of a status over one worker's row.
    pub fn count(&self, worker: WorkerId, status: DayStatus) -> usize {
        self.worker_row(worker)
            .map(|row| self.grid[row].iter().filter(|&&s| s == status).count())
            .unwrap_or(0)
    }

    fn worker_row(&self, worker: WorkerId) -> Option<usize> {
        self.workers.iter().position(|&w| w == worker)
    }

    fn day_col(&self, day: u32) -> Option<usize> {
        self.days.iter().position(|&d| d == day)
    }

    // ============================================================================================
    // Frame conversions
    // ============================================================================================

    /// Long format: one row per assignment, columns `worker | day | status`.
    pub fn to_long_frame(&self) -> EscalaResult<DataFrame> {
        let mut workers = Vec::with_capacity(self.workers.len() * self.days.len());
        let mut days = Vec::with_capacity(workers.capacity());
        let mut statuses: Vec<&'static str> = Vec::with_capacity(workers.capacity());
        for (row, worker) in self.workers.iter().enumerate() {
            for (col, day) in self.days.iter().enumerate() {
                workers.push(worker.0);
                days.push(i64::from(*day));
                statuses.push(self.grid[row][col].into());
            }
        }
        Ok(DataFrame::new(vec![
            Column::new("worker".into(), workers),
            Column::new("day".into(), days),
            Column::new("status".into(), statuses),
        ])?)
    }

    /// Wide format: column 0 is the worker id, then one column per day in
    /// chronological order.
    pub fn to_wide_frame(&self) -> EscalaResult<DataFrame> {
        let ids: Vec<i64> = self.workers.iter().map(|w| w.0).collect();
        let mut columns = vec![Column::new("worker".into(), ids)];
        for (col, day) in self.days.iter().enumerate() {
            let letters: Vec<&'static str> =
                self.grid.iter().map(|row| row[col].into()).collect();
            columns.push(Column::new(format!("day_{day}").into(), letters));
        }
        Ok(DataFrame::new(columns)?)
    }

    /// Rebuilds a schedule from the long format. Statistics are recomputed
    /// from the matrix alone (worked-special-day counts need the calendar
    /// and stay zero).
    pub fn from_long_frame(df: &DataFrame) -> EscalaResult<Schedule> {
        let worker_col = df.column("worker")?.cast(&DataType::Int64)?;
        let workers_ca = worker_col.i64()?;
        let day_col = df.column("day")?.cast(&DataType::Int64)?;
        let days_ca = day_col.i64()?;
        let status_col = df.column("status")?.cast(&DataType::String)?;
        let statuses_ca = status_col.str()?;

        let mut cells: BTreeMap<(i64, u32), DayStatus> = BTreeMap::new();
        for i in 0..df.height() {
            let (Some(worker), Some(day), Some(letter)) =
                (workers_ca.get(i), days_ca.get(i), statuses_ca.get(i))
            else {
                continue;
            };
            let status = DayStatus::from_str(letter)
                .map_err(|_| InputError::InvalidStatus(letter.to_string()))?;
            cells.insert((worker, day as u32), status);
        }

        let workers: Vec<WorkerId> = {
            let mut ids: Vec<i64> = cells.keys().map(|(w, _)| *w).collect();
            ids.sort_unstable();
            ids.dedup();
            ids.into_iter().map(WorkerId).collect()
        };
        let days: Vec<u32> = {
            let mut days: Vec<u32> = cells.keys().map(|(_, d)| *d).collect();
            days.sort_unstable();
            days.dedup();
            days
        };

        let mut schedule = Schedule::new(workers.clone(), days);
        for ((worker, day), status) in cells {
            schedule.set(WorkerId(worker), day, status);
        }
        for &worker in &workers {
            let stats = WorkerStats {
                ordinary_off: schedule.count(worker, DayStatus::DayOff) as u32,
                quality_off: schedule.count(worker, DayStatus::QualityOff) as u32,
                compensation_off: schedule.count(worker, DayStatus::CompensationOff) as u32,
                worked_special_days: 0,
                unassigned: 0,
            };
            schedule.set_stats(worker, stats);
        }
        Ok(schedule)
    }
}
