use std::collections::{BTreeSet, HashMap};

use tracing::debug;

use crate::config::EngineParams;
use crate::domain::{Calendar, DayStatus, RosterData, Worker, WorkerId};
use crate::solver::{BoolVar, CpModel, LinearExpr};

// ================================================================================================
// Shift table
// ================================================================================================

/// The decision-variable table, keyed `(worker, day, status)`.
///
/// Only feasible triples are materialized: lookups for anything else return
/// `None`, and every constraint predicate skips such triples cleanly.
#[derive(Debug, Default)]
pub struct ShiftTable {
    vars: HashMap<(WorkerId, u32, DayStatus), BoolVar>,
}

impl ShiftTable {
    pub fn get(&self, worker: WorkerId, day: u32, status: DayStatus) -> Option<BoolVar> {
        self.vars.get(&(worker, day, status)).copied()
    }

    pub fn contains(&self, worker: WorkerId, day: u32, status: DayStatus) -> bool {
        self.vars.contains_key(&(worker, day, status))
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Existing variables among the given statuses for one (worker, day).
    pub fn collect(&self, worker: WorkerId, day: u32, statuses: &[DayStatus]) -> Vec<BoolVar> {
        statuses
            .iter()
            .filter_map(|&s| self.get(worker, day, s))
            .collect()
    }

    /// Unit-coefficient sum of the existing variables among `statuses`.
    pub fn sum(&self, worker: WorkerId, day: u32, statuses: &[DayStatus]) -> LinearExpr {
        LinearExpr::sum_bools(self.collect(worker, day, statuses))
    }

    /// Sum over several days of the existing variables among `statuses`.
    pub fn sum_over<I: IntoIterator<Item = u32>>(
        &self,
        worker: WorkerId,
        days: I,
        statuses: &[DayStatus],
    ) -> LinearExpr {
        let mut expr = LinearExpr::new();
        for day in days {
            for &status in statuses {
                if let Some(var) = self.get(worker, day, status) {
                    expr.add_bool(var, 1);
                }
            }
        }
        expr
    }

    fn insert(&mut self, worker: WorkerId, day: u32, status: DayStatus, var: BoolVar) {
        self.vars.insert((worker, day, status), var);
    }
}

// ================================================================================================
// Builder
// ================================================================================================

/// Materializes decision variables for every worker: a full decision
/// alphabet on open days, a single pinned variable on blocked days, nothing
/// outside the registered range.
pub fn build(model: &mut CpModel, data: &RosterData, params: &EngineParams) -> ShiftTable {
    let mut table = ShiftTable::default();

    // The decision alphabet excludes the statuses that are only ever forced.
    let decision: Vec<DayStatus> = params
        .shifts
        .iter()
        .copied()
        .filter(|s| {
            !matches!(
                s,
                DayStatus::Absence
                    | DayStatus::Vacation
                    | DayStatus::ClosedHoliday
                    | DayStatus::OutOfRange
            )
        })
        .collect();

    let cal = &data.calendar;
    let closed: BTreeSet<u32> = cal.closed_holidays.clone();

    for worker in data.all() {
        let empty = worker.empty_days.clone();
        let missing: BTreeSet<u32> = worker
            .missing_days
            .union(&empty)
            .copied()
            .collect::<BTreeSet<u32>>()
            .difference(&closed)
            .copied()
            .collect();
        let lqs: BTreeSet<u32> = diff(&worker.fixed_lqs, &[&missing, &closed]);
        let fixed: BTreeSet<u32> = diff(&worker.fixed_days_off, &[&missing, &closed, &lqs]);
        let absence: BTreeSet<u32> =
            diff(&worker.absences, &[&fixed, &closed, &lqs, &missing]);

        let mut blocked: BTreeSet<u32> = BTreeSet::new();
        for set in [&absence, &missing, &empty, &closed, &fixed, &lqs] {
            blocked.extend(set.iter().copied());
        }

        for day in worker.first_registered_day..=worker.last_registered_day {
            if blocked.contains(&day) || cal.position(day).is_none() {
                continue;
            }
            for &status in &decision {
                let var = model.new_bool_var();
                table.insert(worker.id, day, status, var);
            }
        }

        force(
            model,
            &mut table,
            cal,
            worker,
            &diff(&missing, &[&absence, &closed, &fixed, &lqs, &empty]),
            DayStatus::Vacation,
        );
        force(
            model,
            &mut table,
            cal,
            worker,
            &diff(&absence, &[&closed, &fixed, &lqs, &empty]),
            DayStatus::Absence,
        );
        force(
            model,
            &mut table,
            cal,
            worker,
            &diff(&fixed, &[&closed, &lqs, &empty]),
            DayStatus::DayOff,
        );
        force(
            model,
            &mut table,
            cal,
            worker,
            &diff(&lqs, &[&closed, &empty]),
            DayStatus::QualityOff,
        );
        force(
            model,
            &mut table,
            cal,
            worker,
            &diff(&closed, &[&empty]),
            DayStatus::ClosedHoliday,
        );
        force(model, &mut table, cal, worker, &empty, DayStatus::OutOfRange);
    }

    debug!(
        variables = table.len(),
        workers = data.workers.len(),
        "decision variables materialized"
    );
    table
}

fn diff(base: &BTreeSet<u32>, removed: &[&BTreeSet<u32>]) -> BTreeSet<u32> {
    let mut out = base.clone();
    for set in removed {
        out = out.difference(set).copied().collect();
    }
    out
}

/// Creates one pinned variable per blocked day inside the registered range.
/// A fixed-off Saturday whose Sunday is also fixed off is promoted to `LQ`
/// so the pre-fixed quality weekend survives extraction.
fn force(
    model: &mut CpModel,
    table: &mut ShiftTable,
    cal: &Calendar,
    worker: &Worker,
    days: &BTreeSet<u32>,
    status: DayStatus,
) {
    for &day in days {
        if day < worker.first_registered_day || day > worker.last_registered_day {
            continue;
        }
        let status = if status == DayStatus::DayOff
            && cal.is_saturday(day)
            && days.contains(&(day + 1))
        {
            DayStatus::QualityOff
        } else {
            status
        };
        let var = model.new_bool_var();
        model.fix_bool(var, true);
        table.insert(worker.id, day, status, var);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ContractType, Quotas, Role, Worker};

    fn worker(id: i64, first: u32, last: u32) -> Worker {
        Worker {
            id: WorkerId(id),
            contract: ContractType::FiveDay,
            role: Role::Normal,
            quotas: Quotas::default(),
            hire_day: 0,
            termination_day: 0,
            first_registered_day: first,
            last_registered_day: last,
            solvable: true,
            empty_days: BTreeSet::new(),
            missing_days: BTreeSet::new(),
            absences: BTreeSet::new(),
            fixed_days_off: BTreeSet::new(),
            fixed_lqs: BTreeSet::new(),
            free_complete_cycle: BTreeSet::new(),
            working_days: (first..=last).collect(),
            work_day_hours: vec![1; (last - first + 1) as usize],
            work_days_per_week: std::collections::BTreeMap::new(),
            week_shift: std::collections::BTreeMap::new(),
        }
    }

    fn roster(workers: Vec<Worker>, days: u32) -> RosterData {
        let calendar = Calendar {
            days: (1..=days).collect(),
            start_weekday: 1,
            ..Calendar::default()
        };
        RosterData {
            calendar,
            workers: workers.into_iter().map(|w| (w.id, w)).collect(),
            demand: Default::default(),
        }
    }

    #[test]
    fn open_days_get_the_full_decision_alphabet() {
        let data = roster(vec![worker(1, 1, 7)], 7);
        let mut model = CpModel::new();
        let table = build(&mut model, &data, &EngineParams::default());
        // 7 days x {M, T, L, LQ, LD}
        assert_eq!(table.len(), 35);
        assert!(table.contains(WorkerId(1), 3, DayStatus::Morning));
        assert!(table.contains(WorkerId(1), 3, DayStatus::CompensationOff));
        assert!(!table.contains(WorkerId(1), 3, DayStatus::Absence));
    }

    #[test]
    fn nothing_is_created_outside_the_registered_range() {
        let mut w = worker(1, 3, 5);
        w.missing_days = BTreeSet::from([1, 2, 6, 7]);
        let data = roster(vec![w], 7);
        let mut model = CpModel::new();
        let table = build(&mut model, &data, &EngineParams::default());
        for day in [1, 2, 6, 7] {
            for status in [DayStatus::Morning, DayStatus::Vacation, DayStatus::OutOfRange] {
                assert!(!table.contains(WorkerId(1), day, status), "day {day}");
            }
        }
        assert!(table.contains(WorkerId(1), 4, DayStatus::Afternoon));
    }

    #[test]
    fn blocked_days_carry_one_pinned_variable() {
        let mut w = worker(1, 1, 7);
        w.absences = BTreeSet::from([2]);
        w.missing_days = BTreeSet::from([3]);
        let data = roster(vec![w], 7);
        let mut model = CpModel::new();
        let table = build(&mut model, &data, &EngineParams::default());
        assert!(table.contains(WorkerId(1), 2, DayStatus::Absence));
        assert!(!table.contains(WorkerId(1), 2, DayStatus::Morning));
        assert!(table.contains(WorkerId(1), 3, DayStatus::Vacation));
    }

    #[test]
    fn fixed_weekend_pair_promotes_saturday_to_lq() {
        // Week starts Monday: days 6 and 7 are Saturday and Sunday.
        let mut w = worker(1, 1, 7);
        w.fixed_days_off = BTreeSet::from([6, 7]);
        let data = roster(vec![w], 7);
        let mut model = CpModel::new();
        let table = build(&mut model, &data, &EngineParams::default());
        assert!(table.contains(WorkerId(1), 6, DayStatus::QualityOff));
        assert!(!table.contains(WorkerId(1), 6, DayStatus::DayOff));
        assert!(table.contains(WorkerId(1), 7, DayStatus::DayOff));
    }
}
