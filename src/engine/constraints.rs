use std::collections::BTreeMap;

use tracing::debug;

use crate::config::EngineParams;
use crate::domain::{ContractType, DayStatus, RosterData, Worker};
use crate::engine::variables::ShiftTable;
use crate::solver::{BoolVar, CpModel, LinearExpr};

const FREE_STATUSES: [DayStatus; 4] = [
    DayStatus::DayOff,
    DayStatus::ClosedHoliday,
    DayStatus::QualityOff,
    DayStatus::CompensationOff,
];

const WEEK_OFF: [DayStatus; 2] = [DayStatus::DayOff, DayStatus::QualityOff];

/// Adds the full hard-constraint library. Every constraint precedes the
/// objective; nothing is rewritten afterwards.
pub fn apply_all(model: &mut CpModel, table: &ShiftTable, data: &RosterData, params: &EngineParams) {
    one_status_per_day(model, table, data, params);
    weekly_working_days_cap(model, table, data);
    max_consecutive_working_days(model, table, data, params.max_continuous_working_days);
    quality_off_floor(model, table, data);
    sunday_off_floor(model, table, data, params);
    weekly_shift_availability(model, table, data);
    working_day_alphabet(model, table, data, params);
    bounded_free_runs(model, table, data);
    quality_weekend_structure(model, table, data, params);
    saturday_sunday_off_exclusion(model, table, data);
    weekly_free_day_quota(model, table, data, params);
    first_active_day_works(model, table, data, params);
    minimum_daily_coverage(model, table, data);
    compensation_days(model, table, data, params);
    debug!(constraints = model.num_constraints(), "hard constraints added");
}

/// Exactly one status per (worker, day) that has any variable.
fn one_status_per_day(
    model: &mut CpModel,
    table: &ShiftTable,
    data: &RosterData,
    params: &EngineParams,
) {
    for worker in data.all() {
        for &day in &data.calendar.days {
            let vars = table.collect(worker.id, day, &params.shifts);
            if !vars.is_empty() {
                model.add_exactly_one(&vars);
            }
        }
    }
}

/// Weekly working-days cap from the contract (per-week override for
/// the week-pattern contract).
fn weekly_working_days_cap(model: &mut CpModel, table: &ShiftTable, data: &RosterData) {
    for worker in data.solvable() {
        for (&week, days) in &data.calendar.weeks_all {
            let expr = table.sum_over(worker.id, days.iter().copied(), &DayStatus::PRODUCTIVE);
            if !expr.is_empty() {
                model.add_le(expr, worker.max_week_days(week));
            }
        }
    }
}

/// No more than `maxi` working days in any window of `maxi + 1`
/// consecutive calendar days.
fn max_consecutive_working_days(
    model: &mut CpModel,
    table: &ShiftTable,
    data: &RosterData,
    maxi: u32,
) {
    let last = data.calendar.last_day();
    for worker in data.solvable() {
        for start in data.calendar.first_day()..=last.saturating_sub(maxi) {
            let expr = table.sum_over(
                worker.id,
                start..=start + maxi,
                &DayStatus::PRODUCTIVE,
            );
            if expr.len() as i64 > i64::from(maxi) {
                model.add_le(expr, i64::from(maxi));
            }
        }
    }
}

/// At least `c2d` quality-off days over the working days.
fn quality_off_floor(model: &mut CpModel, table: &ShiftTable, data: &RosterData) {
    for worker in data.solvable() {
        if worker.quotas.c2d > 0 {
            let expr = table.sum_over(
                worker.id,
                worker.working_days.iter().copied(),
                &[DayStatus::QualityOff],
            );
            model.add_ge(expr, worker.quotas.c2d);
        }
    }
}

/// At least `total_l_dom` ordinary off days on the worker's
/// Sundays. With `free_sundays_plus_c2d` the quality weekends already
/// consume part of the allowance.
fn sunday_off_floor(
    model: &mut CpModel,
    table: &ShiftTable,
    data: &RosterData,
    params: &EngineParams,
) {
    for worker in data.solvable() {
        let mut floor = worker.quotas.total_l_dom;
        if params.settings.free_sundays_plus_c2d {
            floor = (floor - worker.quotas.c2d).max(0);
        }
        if floor <= 0 {
            continue;
        }
        let sundays = data
            .calendar
            .sundays
            .iter()
            .copied()
            .filter(|d| worker.working_days.contains(d));
        let expr = table.sum_over(worker.id, sundays, &[DayStatus::DayOff]);
        model.add_ge(expr, floor);
    }
}

/// A worker may only take a morning/afternoon shift in weeks where
/// the calendar shows availability for it.
fn weekly_shift_availability(model: &mut CpModel, table: &ShiftTable, data: &RosterData) {
    for worker in data.solvable() {
        for (week, days) in &data.calendar.weeks_open {
            let shift = worker.week_shift.get(week).copied().unwrap_or_default();
            for &day in days {
                if !worker.working_days.contains(&day) {
                    continue;
                }
                if !shift.morning {
                    if let Some(var) = table.get(worker.id, day, DayStatus::Morning) {
                        model.fix_bool(var, false);
                    }
                }
                if !shift.afternoon {
                    if let Some(var) = table.get(worker.id, day, DayStatus::Afternoon) {
                        model.fix_bool(var, false);
                    }
                }
            }
        }
    }
}

/// Working days stay inside the check alphabet; complete-cycle
/// workers get the broader alphabet including `F`.
fn working_day_alphabet(
    model: &mut CpModel,
    table: &ShiftTable,
    data: &RosterData,
    params: &EngineParams,
) {
    let complete_alphabet = [
        DayStatus::Morning,
        DayStatus::Afternoon,
        DayStatus::DayOff,
        DayStatus::QualityOff,
        DayStatus::CompensationOff,
        DayStatus::ClosedHoliday,
    ];
    for worker in data.all() {
        let alphabet: &[DayStatus] = if worker.solvable {
            &params.check_shifts
        } else {
            &complete_alphabet
        };
        for &day in &worker.working_days {
            let vars = table.collect(worker.id, day, alphabet);
            if !vars.is_empty() {
                model.add_exactly_one(&vars);
            }
        }
    }
}

/// At least one of any three consecutive calendar days is not free.
fn bounded_free_runs(model: &mut CpModel, table: &ShiftTable, data: &RosterData) {
    for worker in data.solvable() {
        let days: Vec<u32> = worker.working_days.iter().copied().collect();
        for slice in days.windows(3) {
            if slice[2] != slice[0] + 2 {
                continue;
            }
            let expr = table.sum_over(worker.id, slice.iter().copied(), &FREE_STATUSES);
            if !expr.is_empty() {
                model.add_le(expr, 2);
            }
        }
    }
}

/// Quality-weekend structure: the count of (LQ Saturday, L Sunday)
/// pairs meets `c2d`, and `LQ` is only placeable on a Saturday directly
/// before a working Sunday that is off.
fn quality_weekend_structure(
    model: &mut CpModel,
    table: &ShiftTable,
    data: &RosterData,
    params: &EngineParams,
) {
    let cal = &data.calendar;
    for worker in data.solvable() {
        let mut weekends: Vec<BoolVar> = Vec::new();
        for &sunday in &cal.sundays {
            if sunday == 0 {
                continue;
            }
            let saturday = sunday - 1;
            if params.settings.f_special_day {
                let open = |d: u32| {
                    worker.working_days.contains(&d) || cal.closed_holidays.contains(&d)
                };
                if !open(saturday) || !open(sunday) {
                    continue;
                }
                let sat_half = table.sum(
                    worker.id,
                    saturday,
                    &[DayStatus::QualityOff, DayStatus::ClosedHoliday],
                );
                let sun_half = table.sum(
                    worker.id,
                    sunday,
                    &[DayStatus::DayOff, DayStatus::ClosedHoliday],
                );
                if sat_half.is_empty() || sun_half.is_empty() {
                    continue;
                }
                let qw = model.new_aux_bool_var();
                // qw ≤ each half; qw ≥ both pure halves together, so a pair
                // of closed days never counts on its own.
                bound_by_expr(model, qw, &sat_half);
                bound_by_expr(model, qw, &sun_half);
                for (sat_status, sun_status) in [
                    (DayStatus::QualityOff, DayStatus::DayOff),
                    (DayStatus::QualityOff, DayStatus::ClosedHoliday),
                    (DayStatus::ClosedHoliday, DayStatus::DayOff),
                ] {
                    if let (Some(a), Some(b)) = (
                        table.get(worker.id, saturday, sat_status),
                        table.get(worker.id, sunday, sun_status),
                    ) {
                        and_lower_bound(model, qw, a, b);
                    }
                }
                weekends.push(qw);
            } else {
                if !worker.working_days.contains(&sunday)
                    || !worker.working_days.contains(&saturday)
                {
                    continue;
                }
                let (Some(lq_sat), Some(l_sun)) = (
                    table.get(worker.id, saturday, DayStatus::QualityOff),
                    table.get(worker.id, sunday, DayStatus::DayOff),
                ) else {
                    continue;
                };
                let qw = model.new_aux_bool_var();
                model.add_implication(qw, lq_sat);
                model.add_implication(qw, l_sun);
                and_lower_bound(model, qw, lq_sat, l_sun);
                weekends.push(qw);
            }
        }
        if worker.quotas.c2d > 0 {
            model.add_ge(LinearExpr::sum_bools(weekends), worker.quotas.c2d);
        }

        // LQ eligibility: only on a Saturday before a working Sunday, and
        // only underneath that Sunday's L.
        for &day in &worker.working_days {
            let Some(lq) = table.get(worker.id, day, DayStatus::QualityOff) else {
                continue;
            };
            let next = day + 1;
            let next_l = (cal.sundays.contains(&next) && worker.working_days.contains(&next))
                .then(|| table.get(worker.id, next, DayStatus::DayOff))
                .flatten();
            match next_l {
                Some(l_sun) => model.add_implication(lq, l_sun),
                None => model.fix_bool(lq, false),
            }
        }
    }
}

/// `target ≥ a + b − 1`, the lower half of an exact AND linearization.
fn and_lower_bound(model: &mut CpModel, target: BoolVar, a: BoolVar, b: BoolVar) {
    let mut expr = LinearExpr::new();
    expr.add_bool(a, 1);
    expr.add_bool(b, 1);
    expr.add_bool(target, -1);
    model.add_le(expr, 1);
}

/// `target ≤ expr` for a 0/1-valued expression.
fn bound_by_expr(model: &mut CpModel, target: BoolVar, expr: &LinearExpr) {
    let mut bound = expr.clone();
    bound.add_bool(target, -1);
    model.add_ge(bound, 0);
}

/// A Sunday off forbids an ordinary `L` on the preceding Saturday;
/// that pair must be the quality pattern instead.
fn saturday_sunday_off_exclusion(model: &mut CpModel, table: &ShiftTable, data: &RosterData) {
    let cal = &data.calendar;
    for worker in data.solvable() {
        for &day in &worker.working_days {
            if !cal.is_saturday(day) || !worker.working_days.contains(&(day + 1)) {
                continue;
            }
            if let (Some(sat_l), Some(sun_l)) = (
                table.get(worker.id, day, DayStatus::DayOff),
                table.get(worker.id, day + 1, DayStatus::DayOff),
            ) {
                model.add_le(LinearExpr::sum_bools([sat_l, sun_l]), 1);
            }
        }
    }
}

/// Per-week free-day quota, prorated around hire/termination weeks
/// and raised to cover pre-fixed off days.
fn weekly_free_day_quota(
    model: &mut CpModel,
    table: &ShiftTable,
    data: &RosterData,
    params: &EngineParams,
) {
    for worker in data.solvable() {
        for (&week, days) in &data.calendar.weeks_all {
            let week_work: Vec<u32> = days
                .iter()
                .copied()
                .filter(|d| worker.working_days.contains(d))
                .collect();
            if week_work.is_empty() {
                continue;
            }
            let actual = week_work.len() as i64;
            let boundary_week = (worker.hire_day > 0 && days.contains(&worker.hire_day))
                || (worker.termination_day > 0 && days.contains(&worker.termination_day));
            let pattern_six = worker.contract == ContractType::WeekPattern
                && worker.max_week_days(week) == 6;

            let mut required = if worker.contract == ContractType::FourDay {
                let base = 7 - worker.contract.code();
                if boundary_week {
                    params.proration.apply(actual as f64 / 7.0 * base as f64)
                } else {
                    base.min(actual)
                }
            } else if boundary_week {
                if (4..=5).contains(&actual) {
                    1
                } else if actual < 4 {
                    0
                } else if pattern_six {
                    1
                } else {
                    2
                }
            } else if pattern_six {
                1
            } else if actual >= 2 {
                2
            } else {
                1
            };

            if params.settings.missing_days_affect_free_days {
                let vacation = days
                    .iter()
                    .filter(|d| worker.missing_days.contains(d))
                    .count() as i64;
                required = (required - vacation).max(0);
            }

            let pinned = week_work
                .iter()
                .filter(|d| {
                    worker.fixed_days_off.contains(d) || worker.fixed_lqs.contains(d)
                })
                .count() as i64;
            if required < pinned {
                debug!(
                    worker = %worker.id,
                    week,
                    pinned,
                    "raising weekly free-day requirement to the pre-fixed days"
                );
                required = pinned;
            }

            let expr = table.sum_over(worker.id, week_work.iter().copied(), &WEEK_OFF);
            if required <= 0 {
                model.add_eq(expr, 0);
            } else if actual >= required {
                model.add_eq(expr, required);
            }
        }
    }
}

/// A worker hired after the global earliest start works their first
/// active day.
fn first_active_day_works(
    model: &mut CpModel,
    table: &ShiftTable,
    data: &RosterData,
    params: &EngineParams,
) {
    let Some(earliest) = data.earliest_first_day() else {
        return;
    };
    for worker in data.solvable() {
        let first = worker.first_registered_day;
        if first > earliest && worker.working_days.contains(&first) {
            let expr = table.sum(worker.id, first, &params.working_shifts);
            if !expr.is_empty() {
                model.add_eq(expr, 1);
            }
        }
    }
}

/// Every day with at least two candidate workers gets at least one
/// productive shift.
fn minimum_daily_coverage(model: &mut CpModel, table: &ShiftTable, data: &RosterData) {
    for &day in &data.calendar.days {
        let candidates = data
            .all()
            .filter(|w| w.working_days.contains(&day))
            .count();
        if candidates < 2 {
            continue;
        }
        let mut expr = LinearExpr::new();
        for worker in data.all() {
            expr.add_expr(&table.sum(worker.id, day, &DayStatus::PRODUCTIVE));
        }
        if !expr.is_empty() {
            model.add_ge(expr, 1);
        }
    }
}

/// Holiday (and optionally Sunday) compensation days: each worked
/// special day earns `amount` LD days placed in the following weeks, every
/// LD accounts for exactly one worked special day, and the totals balance.
fn compensation_days(
    model: &mut CpModel,
    table: &ShiftTable,
    data: &RosterData,
    params: &EngineParams,
) {
    let cal = &data.calendar;
    for worker in data.all() {
        let mut per_comp: BTreeMap<u32, Vec<BoolVar>> = BTreeMap::new();
        let mut worked_holidays = LinearExpr::new();
        let mut worked_sundays = LinearExpr::new();

        if params.holiday_compensation_amount > 0 {
            let holidays: Vec<u32> = cal.holidays.iter().copied().collect();
            compensation_pass(
                model,
                table,
                data,
                worker,
                &holidays,
                params.compensation_limit_for(worker.id.0),
                params.holiday_compensation_amount,
                &mut per_comp,
                &mut worked_holidays,
            );
        }
        if params.sunday_compensation_amount > 0 {
            let sundays: Vec<u32> = cal
                .sundays
                .iter()
                .copied()
                .filter(|d| !cal.holidays.contains(d))
                .collect();
            compensation_pass(
                model,
                table,
                data,
                worker,
                &sundays,
                params.compensation_limit_for(worker.id.0),
                params.sunday_compensation_amount,
                &mut per_comp,
                &mut worked_sundays,
            );
        }

        // LD never appears outside a compensation slot, and each used slot
        // accounts for exactly one worked special day.
        let mut total_ld = LinearExpr::new();
        for &day in &worker.working_days {
            let Some(ld) = table.get(worker.id, day, DayStatus::CompensationOff) else {
                continue;
            };
            total_ld.add_bool(ld, 1);
            match per_comp.get(&day) {
                None => model.fix_bool(ld, false),
                Some(assignments) => {
                    let mut eq = LinearExpr::sum_bools(assignments.iter().copied());
                    eq.add_bool(ld, -1);
                    model.add_eq(eq, 0);
                }
            }
        }

        // Σ LD == amount_hol · worked holidays + amount_sun · worked Sundays.
        let mut balance = total_ld;
        balance.add_expr_scaled(&worked_holidays, -params.holiday_compensation_amount);
        balance.add_expr_scaled(&worked_sundays, -params.sunday_compensation_amount);
        model.add_eq(balance, 0);
    }
}

#[allow(clippy::too_many_arguments)]
fn compensation_pass(
    model: &mut CpModel,
    table: &ShiftTable,
    data: &RosterData,
    worker: &Worker,
    special_days: &[u32],
    week_limit: u32,
    amount: i64,
    per_comp: &mut BTreeMap<u32, Vec<BoolVar>>,
    worked_total: &mut LinearExpr,
) {
    let cal = &data.calendar;
    let blocked =
        |d: &u32| worker.fixed_days_off.contains(d) || worker.fixed_lqs.contains(d);
    for &day in special_days {
        if !worker.working_days.contains(&day) || blocked(&day) {
            continue;
        }
        if day < worker.first_registered_day || day >= worker.last_registered_day {
            continue;
        }
        let Some(week) = cal.week_of(day) else {
            continue;
        };
        let mut candidate_weeks: Vec<u32> = (week + 1..=week + week_limit)
            .filter(|wk| cal.weeks_open.contains_key(wk))
            .collect();
        if candidate_weeks.is_empty() {
            // Year-end fallback: compensate inside the special day's week.
            candidate_weeks.push(week);
        }
        let candidates: Vec<u32> = candidate_weeks
            .iter()
            .flat_map(|wk| cal.weeks_open[wk].iter().copied())
            .filter(|c| worker.working_days.contains(c) && !blocked(c) && *c != day)
            .filter(|c| table.contains(worker.id, *c, DayStatus::CompensationOff))
            .collect();

        let worked = table.sum(worker.id, day, &DayStatus::PRODUCTIVE);
        if worked.is_empty() {
            continue;
        }
        if candidates.is_empty() {
            // No slot to compensate in: the special day cannot be worked.
            model.add_eq(worked, 0);
            continue;
        }
        let mut assigned = LinearExpr::new();
        for comp_day in candidates {
            let assignment = model.new_bool_var();
            // assignment ⇒ the special day was actually worked
            let mut implied = LinearExpr::new();
            implied.add_bool(assignment, 1);
            implied.add_expr_scaled(&worked, -1);
            model.add_le(implied, 0);
            per_comp.entry(comp_day).or_default().push(assignment);
            assigned.add_bool(assignment, 1);
        }
        // Worked ⇒ exactly `amount` compensation slots, else none.
        assigned.add_expr_scaled(&worked, -amount);
        model.add_eq(assigned, 0);
        worked_total.add_expr(&worked);
    }
}
