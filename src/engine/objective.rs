use tracing::debug;

use crate::config::EngineParams;
use crate::domain::{DayStatus, Role, RosterData, Worker, WorkerId};
use crate::engine::variables::ShiftTable;
use crate::solver::{BoolVar, CpModel, IntVar, LinearExpr};

const OFF_STATUSES: [DayStatus; 2] = [DayStatus::DayOff, DayStatus::QualityOff];

/// Number of chronological segments the horizon is split into for the
/// within-worker balance terms.
const SEGMENTS: usize = 6;

/// Adds every weighted soft term to the minimization objective.
/// Terms whose derived weight is zero are omitted entirely.
pub fn build(model: &mut CpModel, table: &ShiftTable, data: &RosterData, params: &EngineParams) {
    let before = model.num_vars();
    staffing_deviation(model, table, data, params);
    coverage_indicators(model, table, data, params);
    split_free_days(model, table, data, params);
    crowded_days_off(model, table, data, params);
    sunday_and_lq_spread(model, table, data, params);
    segment_balance(model, table, data, params);
    inconsistent_week_shift(model, table, data, params);
    key_shift_coverage(model, table, data, params);
    role_off_conflicts(model, table, data, params);
    pairwise_fairness(model, table, data, params);
    debug!(
        auxiliary_vars = model.num_vars() - before,
        "objective terms added"
    );
}

fn add_int_term(model: &mut CpModel, var: IntVar, weight: i64) {
    if weight != 0 {
        let mut expr = LinearExpr::new();
        expr.add_int(var, 1);
        model.add_objective_term(expr, weight);
    }
}

fn add_bool_term(model: &mut CpModel, var: BoolVar, weight: i64) {
    if weight != 0 {
        let mut expr = LinearExpr::new();
        expr.add_bool(var, 1);
        model.add_objective_term(expr, weight);
    }
}

/// `cap · flag ≥ expr − threshold`: the flag turns on whenever the
/// expression exceeds the threshold; minimization keeps it off otherwise.
fn overflow_flag(
    model: &mut CpModel,
    expr: &LinearExpr,
    threshold: i64,
    cap: i64,
) -> BoolVar {
    let flag = model.new_aux_bool_var();
    let mut link = LinearExpr::new();
    link.add_bool(flag, cap.max(1));
    link.add_expr_scaled(expr, -1);
    model.add_ge(link, -threshold);
    flag
}

/// One-sided maximum: `max_v ≥ expr` for every expression.
fn max_of(model: &mut CpModel, exprs: &[LinearExpr], ub: i64) -> IntVar {
    let max_v = model.new_int_var(0, ub.max(0));
    for expr in exprs {
        let mut link = LinearExpr::new();
        link.add_int(max_v, 1);
        link.add_expr_scaled(expr, -1);
        model.add_ge(link, 0);
    }
    max_v
}

/// One-sided minimum: `min_v ≤ expr` for every expression.
fn min_of(model: &mut CpModel, exprs: &[LinearExpr], ub: i64) -> IntVar {
    let min_v = model.new_int_var(0, ub.max(0));
    for expr in exprs {
        let mut link = LinearExpr::new();
        link.add_int(min_v, 1);
        link.add_expr_scaled(expr, -1);
        model.add_le(link, 0);
    }
    min_v
}

// ================================================================================================
// 1. Staffing excess / deficit (hour-weighted) with per-day mix flags
// ================================================================================================

fn staffing_deviation(
    model: &mut CpModel,
    table: &ShiftTable,
    data: &RosterData,
    params: &EngineParams,
) {
    let wts = &params.weights;
    let total_target = data.demand.total_target() as f64;
    let excess_w = wts.scaled(wts.staffing_excess, 0.6 * total_target);
    let deficit_w = wts.scaled(wts.staffing_deficit, total_target / 7.0);
    let both_w = wts.scaled(wts.excess_and_deficit, 4.0);
    let deficit_day_w = wts.scaled(wts.deficit_day, 5.0);
    if excess_w == 0 && deficit_w == 0 && both_w == 0 && deficit_day_w == 0 {
        return;
    }

    for (pos, &day) in data.calendar.days.iter().enumerate() {
        let mut day_excess: Vec<(IntVar, i64)> = Vec::new();
        let mut day_deficit: Vec<(IntVar, i64)> = Vec::new();
        for &shift in &DayStatus::PRODUCTIVE {
            let mut assigned = LinearExpr::new();
            let mut max_hours = 0i64;
            for worker in data.all() {
                if let Some(var) = table.get(worker.id, day, shift) {
                    let hours = worker.work_day_hours[pos];
                    assigned.add_bool(var, hours);
                    max_hours += hours;
                }
            }
            let target = data.demand.target(day, shift);

            let excess = model.new_int_var(0, max_hours);
            let mut over = LinearExpr::new();
            over.add_int(excess, 1);
            over.add_expr_scaled(&assigned, -1);
            model.add_ge(over, -target);

            let deficit = model.new_int_var(0, target.max(0));
            let mut under = LinearExpr::new();
            under.add_int(deficit, 1);
            under.add_expr(&assigned);
            model.add_ge(under, target);

            add_int_term(model, excess, excess_w);
            add_int_term(model, deficit, deficit_w);
            day_excess.push((excess, max_hours));
            day_deficit.push((deficit, target.max(0)));
        }

        if both_w == 0 && deficit_day_w == 0 {
            continue;
        }
        let excess_sum = int_sum(&day_excess);
        let deficit_sum = int_sum(&day_deficit);
        let excess_cap: i64 = day_excess.iter().map(|(_, ub)| ub).sum();
        let deficit_cap: i64 = day_deficit.iter().map(|(_, ub)| ub).sum();
        let has_excess = overflow_flag(model, &excess_sum, 0, excess_cap);
        let has_deficit = overflow_flag(model, &deficit_sum, 0, deficit_cap);
        let both = model.new_aux_bool_var();
        let mut and_link = LinearExpr::new();
        and_link.add_bool(has_excess, 1);
        and_link.add_bool(has_deficit, 1);
        and_link.add_bool(both, -1);
        model.add_le(and_link, 1);
        add_bool_term(model, both, both_w);
        add_bool_term(model, has_deficit, deficit_day_w);
    }
}

fn int_sum(vars: &[(IntVar, i64)]) -> LinearExpr {
    let mut expr = LinearExpr::new();
    for &(v, _) in vars {
        expr.add_int(v, 1);
    }
    expr
}

// ================================================================================================
// 2–3. Zero coverage and minimum-requirement shortfall
// ================================================================================================

fn coverage_indicators(
    model: &mut CpModel,
    table: &ShiftTable,
    data: &RosterData,
    params: &EngineParams,
) {
    let wts = &params.weights;
    let zero_w = wts.scaled(wts.zero_coverage, 1.0);
    let shortfall_w = wts.min_coverage_shortfall;

    for &day in &data.calendar.days {
        if data.calendar.closed_holidays.contains(&day) {
            continue;
        }
        for &shift in &DayStatus::PRODUCTIVE {
            let mut headcount = LinearExpr::new();
            for worker in data.all() {
                if let Some(var) = table.get(worker.id, day, shift) {
                    headcount.add_bool(var, 1);
                }
            }
            if headcount.is_empty() {
                continue;
            }
            if zero_w > 0 && data.demand.target(day, shift) > 0 {
                let nobody = model.new_aux_bool_var();
                let mut link = headcount.clone();
                link.add_bool(nobody, 1);
                model.add_ge(link, 1);
                add_bool_term(model, nobody, zero_w);
            }
            let min_required = data.demand.minimum(day, shift);
            if shortfall_w > 0 && min_required > 0 {
                let shortfall = model.new_int_var(0, min_required);
                let mut link = headcount.clone();
                link.add_int(shortfall, 1);
                model.add_ge(link, min_required);
                add_int_term(model, shortfall, shortfall_w);
            }
        }
    }
}

// ================================================================================================
// 6. Split free days: penalize isolated off days, reward adjacent pairs
// ================================================================================================

fn split_free_days(
    model: &mut CpModel,
    table: &ShiftTable,
    data: &RosterData,
    params: &EngineParams,
) {
    let wts = &params.weights;
    let n = data.solvable().count() as f64;
    let weight = wts.scaled(wts.split_free_days, 52.0 * 2.0 * n);
    if weight == 0 {
        return;
    }

    for worker in data.solvable() {
        let days: Vec<u32> = worker
            .working_days
            .iter()
            .copied()
            .filter(|&d| {
                table.contains(worker.id, d, DayStatus::DayOff)
                    && table.contains(worker.id, d, DayStatus::QualityOff)
            })
            .collect();
        let mut free_total = LinearExpr::new();
        let mut pair_total = LinearExpr::new();
        for (i, &day) in days.iter().enumerate() {
            let today = table.sum(worker.id, day, &OFF_STATUSES);
            free_total.add_expr(&today);
            if i + 1 < days.len() && days[i + 1] == day + 1 {
                let tomorrow = table.sum(worker.id, day + 1, &OFF_STATUSES);
                let pair = model.new_aux_bool_var();
                bound_by(model, pair, &today);
                bound_by(model, pair, &tomorrow);
                pair_total.add_bool(pair, 1);
            }
        }
        model.add_objective_term(free_total, weight);
        model.add_objective_term(pair_total, -weight);
    }
}

/// `flag ≤ expr` for a 0/1 expression.
fn bound_by(model: &mut CpModel, flag: BoolVar, expr: &LinearExpr) {
    let mut link = expr.clone();
    link.add_bool(flag, -1);
    model.add_ge(link, 0);
}

// ================================================================================================
// 7. Too many workers off on the same day
// ================================================================================================

fn crowded_days_off(
    model: &mut CpModel,
    table: &ShiftTable,
    data: &RosterData,
    params: &EngineParams,
) {
    let wts = &params.weights;
    let weight = wts.scaled(wts.crowded_day_off, 2.0);
    let limit = wts.crowded_day_off_limit;
    if weight == 0 {
        return;
    }

    for &day in &data.calendar.days {
        let mut off_count = LinearExpr::new();
        let mut contributors = 0i64;
        for worker in data.solvable() {
            let off = table.sum(worker.id, day, &OFF_STATUSES);
            if !off.is_empty() {
                off_count.add_expr(&off);
                contributors += 1;
            }
        }
        if contributors <= limit {
            continue;
        }
        let flag = overflow_flag(model, &off_count, limit, contributors - limit);
        add_bool_term(model, flag, weight);
    }
}

// ================================================================================================
// 4–5. Free-Sunday and LQ spread across workers
// ================================================================================================

fn sunday_and_lq_spread(
    model: &mut CpModel,
    table: &ShiftTable,
    data: &RosterData,
    params: &EngineParams,
) {
    let wts = &params.weights;
    let cal = &data.calendar;
    let n_sundays = cal.sundays.len() as i64;
    if n_sundays == 0 || data.solvable().count() < 2 {
        return;
    }

    let sunday_w = wts.scaled(wts.sunday_spread, 2.0);
    if sunday_w > 0 {
        let counts: Vec<LinearExpr> = data
            .solvable()
            .map(|w| {
                table.sum_over(w.id, cal.sundays.iter().copied(), &[DayStatus::DayOff])
            })
            .collect();
        let max_v = max_of(model, &counts, n_sundays);
        let min_v = min_of(model, &counts, n_sundays);
        add_int_term(model, max_v, sunday_w);
        add_int_term(model, min_v, -sunday_w);
    }

    let lq_w = wts.scaled(wts.lq_spread, 2.0);
    if lq_w > 0 {
        let counts: Vec<LinearExpr> = data
            .solvable()
            .map(|w| {
                table.sum_over(
                    w.id,
                    cal.sundays.iter().filter(|&&d| d > 0).map(|&d| d - 1),
                    &[DayStatus::QualityOff],
                )
            })
            .collect();
        let max_v = max_of(model, &counts, n_sundays);
        let min_v = min_of(model, &counts, n_sundays);
        add_int_term(model, max_v, lq_w);
        add_int_term(model, min_v, -lq_w);
    }
}

// ================================================================================================
// 8–9. Within-worker balance across year segments
// ================================================================================================

fn segment_balance(
    model: &mut CpModel,
    table: &ShiftTable,
    data: &RosterData,
    params: &EngineParams,
) {
    let wts = &params.weights;
    let cal = &data.calendar;
    let n_sundays = cal.sundays.len() as i64;
    let n_workers = data.solvable().count() as i64;
    if n_sundays == 0 || n_workers == 0 {
        return;
    }
    let parts = cal.segments(SEGMENTS);

    for (importance, worst, statuses, saturday_side) in [
        (wts.sunday_segment_balance, 3.0, [DayStatus::DayOff], false),
        (wts.lq_segment_balance, 2.0, [DayStatus::QualityOff], true),
    ] {
        let worst_case_w = wts.scaled(importance, worst);
        if worst_case_w == 0 {
            continue;
        }
        let average_w = (worst_case_w + n_workers - 1) / n_workers;

        let mut worker_diffs: Vec<LinearExpr> = Vec::new();
        for worker in data.solvable() {
            let seg_exprs: Vec<LinearExpr> = parts
                .iter()
                .map(|part| {
                    let days = part
                        .iter()
                        .copied()
                        .filter(|d| cal.sundays.contains(d))
                        .filter_map(|d| {
                            if saturday_side {
                                (d > 0).then(|| d - 1)
                            } else {
                                Some(d)
                            }
                        });
                    table.sum_over(worker.id, days, &statuses)
                })
                .collect();
            let max_v = max_of(model, &seg_exprs, n_sundays);
            let min_v = min_of(model, &seg_exprs, n_sundays);
            add_int_term(model, max_v, average_w);
            add_int_term(model, min_v, -average_w);

            let diff = model.new_int_var(0, n_sundays);
            let mut link = LinearExpr::new();
            link.add_int(diff, 1);
            link.add_int(max_v, -1);
            link.add_int(min_v, 1);
            model.add_ge(link, 0);
            let mut diff_expr = LinearExpr::new();
            diff_expr.add_int(diff, 1);
            worker_diffs.push(diff_expr);
        }

        // One extra charge on the worst-balanced worker.
        let worst_diff = max_of(model, &worker_diffs, n_sundays);
        add_int_term(model, worst_diff, worst_case_w);
    }
}

// ================================================================================================
// 10. Inconsistent week shift
// ================================================================================================

fn inconsistent_week_shift(
    model: &mut CpModel,
    table: &ShiftTable,
    data: &RosterData,
    params: &EngineParams,
) {
    let wts = &params.weights;
    let n = data.solvable().count() as f64;
    let weight = wts.scaled(wts.inconsistent_week, 52.0 * n);
    if weight == 0 {
        return;
    }

    for worker in data.solvable() {
        for days in data.calendar.weeks_open.values() {
            let week_days: Vec<u32> = days
                .iter()
                .copied()
                .filter(|d| worker.working_days.contains(d))
                .collect();
            if week_days.len() < 2 {
                continue;
            }
            let has_morning = shift_presence(model, table, worker, &week_days, DayStatus::Morning);
            let has_afternoon =
                shift_presence(model, table, worker, &week_days, DayStatus::Afternoon);
            let mixed = model.new_aux_bool_var();
            let mut link = LinearExpr::new();
            link.add_bool(has_morning, 1);
            link.add_bool(has_afternoon, 1);
            link.add_bool(mixed, -1);
            model.add_le(link, 1);
            add_bool_term(model, mixed, weight);
        }
    }
}

/// Indicator raised by any assignment of `status` across the given days.
fn shift_presence(
    model: &mut CpModel,
    table: &ShiftTable,
    worker: &Worker,
    days: &[u32],
    status: DayStatus,
) -> BoolVar {
    let present = model.new_aux_bool_var();
    for &day in days {
        if let Some(var) = table.get(worker.id, day, status) {
            let mut link = LinearExpr::new();
            link.add_bool(present, 1);
            link.add_bool(var, -1);
            model.add_ge(link, 0);
        }
    }
    present
}

// ================================================================================================
// 11. Keyholder/manager presence on demanded shifts
// ================================================================================================

fn key_shift_coverage(
    model: &mut CpModel,
    table: &ShiftTable,
    data: &RosterData,
    params: &EngineParams,
) {
    let wts = &params.weights;
    let weight = wts.scaled(wts.uncovered_key_shift, 1.0);
    if weight == 0 {
        return;
    }
    let key_workers: Vec<WorkerId> = data
        .solvable()
        .filter(|w| w.role != Role::Normal)
        .map(|w| w.id)
        .collect();
    if key_workers.is_empty() {
        return;
    }

    for &day in &data.calendar.days {
        for &shift in &DayStatus::PRODUCTIVE {
            if data.demand.target(day, shift) <= 0 {
                continue;
            }
            let mut presence = LinearExpr::new();
            for id in &key_workers {
                if let Some(var) = table.get(*id, day, shift) {
                    presence.add_bool(var, 1);
                }
            }
            if presence.is_empty() {
                continue;
            }
            let uncovered = model.new_aux_bool_var();
            presence.add_bool(uncovered, 1);
            model.add_ge(presence, 1);
            add_bool_term(model, uncovered, weight);
        }
    }
}

// ================================================================================================
// 12. Same-day-off conflicts among managers and keyholders
// ================================================================================================

fn role_off_conflicts(
    model: &mut CpModel,
    table: &ShiftTable,
    data: &RosterData,
    params: &EngineParams,
) {
    let wts = &params.weights;
    let managers: Vec<&Worker> = data.solvable().filter(|w| w.role == Role::Manager).collect();
    let keyholders: Vec<&Worker> = data
        .solvable()
        .filter(|w| w.role == Role::Keyholder)
        .collect();
    if managers.is_empty() && keyholders.is_empty() {
        return;
    }

    for &day in &data.calendar.days {
        if data.calendar.closed_holidays.contains(&day) {
            continue;
        }
        let group_offs = |group: &[&Worker]| -> Vec<LinearExpr> {
            group
                .iter()
                .filter(|w| w.working_days.contains(&day))
                .map(|w| table.sum(w.id, day, &OFF_STATUSES))
                .filter(|e| !e.is_empty())
                .collect()
        };
        let manager_offs = group_offs(&managers);
        let keyholder_offs = group_offs(&keyholders);

        if wts.manager_keyholder_same_off > 0
            && !manager_offs.is_empty()
            && !keyholder_offs.is_empty()
        {
            let manager_any = any_of(model, &manager_offs);
            let keyholder_any = any_of(model, &keyholder_offs);
            let both = model.new_aux_bool_var();
            let mut link = LinearExpr::new();
            link.add_bool(manager_any, 1);
            link.add_bool(keyholder_any, 1);
            link.add_bool(both, -1);
            model.add_le(link, 1);
            add_bool_term(model, both, wts.manager_keyholder_same_off);
        }
        for (offs, weight) in [
            (&keyholder_offs, wts.keyholder_overlap),
            (&manager_offs, wts.manager_overlap),
        ] {
            if weight > 0 && offs.len() >= 2 {
                let mut total = LinearExpr::new();
                for off in offs.iter() {
                    total.add_expr(off);
                }
                let overlap = overflow_flag(model, &total, 1, offs.len() as i64 - 1);
                add_bool_term(model, overlap, weight);
            }
        }
    }
}

/// Indicator raised by any of the given 0/1 expressions.
fn any_of(model: &mut CpModel, exprs: &[LinearExpr]) -> BoolVar {
    let any = model.new_aux_bool_var();
    for expr in exprs {
        let mut link = LinearExpr::new();
        link.add_bool(any, 1);
        link.add_expr_scaled(expr, -1);
        model.add_ge(link, 0);
    }
    any
}

// ================================================================================================
// 13–14. Pairwise proportional fairness of free Sundays and quality weekends
// ================================================================================================

fn pairwise_fairness(
    model: &mut CpModel,
    table: &ShiftTable,
    data: &RosterData,
    params: &EngineParams,
) {
    let wts = &params.weights;
    let cal = &data.calendar;
    let total_days = cal.days.len() as i64;
    if total_days == 0 {
        return;
    }

    // 13. Free Sundays, scaled by each worker's active exposure.
    if wts.pairwise_sunday_fairness > 0 {
        let mut participants: Vec<(IntVar, i64, i64)> = Vec::new();
        for worker in data.solvable() {
            let sundays: Vec<u32> = cal
                .sundays
                .iter()
                .copied()
                .filter(|d| worker.working_days.contains(d))
                .collect();
            if sundays.is_empty() {
                continue;
            }
            let expr = table.sum_over(
                worker.id,
                sundays.iter().copied(),
                &[DayStatus::DayOff, DayStatus::ClosedHoliday],
            );
            let count = defined_count(model, &expr, sundays.len() as i64);
            let prop = exposure_percent(worker, cal.last_day(), total_days);
            if prop > 0 {
                participants.push((count, sundays.len() as i64, prop));
            }
        }
        add_pairwise_terms(model, &participants, wts.pairwise_sunday_fairness / 2);
    }

    // 14. Quality weekends over eligible Saturday–Sunday pairs.
    if wts.pairwise_lq_fairness > 0 {
        let mut participants: Vec<(IntVar, i64, i64)> = Vec::new();
        for worker in data.solvable() {
            let eligible: Vec<u32> = cal
                .sundays
                .iter()
                .copied()
                .filter(|&d| d > 0)
                .map(|d| d - 1)
                .filter(|&s| {
                    worker.working_days.contains(&s) && worker.working_days.contains(&(s + 1))
                })
                .collect();
            if eligible.is_empty() {
                continue;
            }
            let mut weekend_count = LinearExpr::new();
            for &saturday in &eligible {
                let (Some(lq_sat), Some(l_sun)) = (
                    table.get(worker.id, saturday, DayStatus::QualityOff),
                    table.get(worker.id, saturday + 1, DayStatus::DayOff),
                ) else {
                    continue;
                };
                let weekend = model.new_aux_bool_var();
                model.add_implication(weekend, lq_sat);
                model.add_implication(weekend, l_sun);
                let mut and_link = LinearExpr::new();
                and_link.add_bool(lq_sat, 1);
                and_link.add_bool(l_sun, 1);
                and_link.add_bool(weekend, -1);
                model.add_le(and_link, 1);
                weekend_count.add_bool(weekend, 1);
            }
            let count = defined_count(model, &weekend_count, eligible.len() as i64);
            let prop = exposure_percent(worker, cal.last_day(), total_days);
            if prop > 0 {
                participants.push((count, eligible.len() as i64, prop));
            }
        }
        add_pairwise_terms(model, &participants, wts.pairwise_lq_fairness / 2);
    }
}

/// Integer percentage of the horizon the worker is active for, clamped to
/// [0, 100]; a zero termination day counts as active to the end.
fn exposure_percent(worker: &Worker, horizon_last_day: u32, total_days: i64) -> i64 {
    let active = worker.active_days(horizon_last_day) as f64;
    let fraction = (active / total_days as f64).clamp(0.0, 1.0);
    (fraction * 100.0) as i64
}

/// An equality-defined counter for a 0/1-summed expression.
fn defined_count(model: &mut CpModel, expr: &LinearExpr, ub: i64) -> IntVar {
    let count = model.new_int_var(0, ub.max(0));
    let mut link = expr.clone();
    link.add_int(count, -1);
    model.add_eq(link, 0);
    count
}

/// For every pair, penalize `|count_a · prop_b − count_b · prop_a|` so
/// free-day counts scale with each worker's exposure.
fn add_pairwise_terms(model: &mut CpModel, participants: &[(IntVar, i64, i64)], weight: i64) {
    if weight == 0 || participants.len() < 2 {
        return;
    }
    for (i, &(count_a, max_a, prop_a)) in participants.iter().enumerate() {
        for &(count_b, max_b, prop_b) in participants.iter().skip(i + 1) {
            let max_diff = (max_a * prop_b).max(max_b * prop_a);
            for sign in [1i64, -1] {
                let gap = model.new_int_var(0, max_diff);
                let mut link = LinearExpr::new();
                link.add_int(gap, 1);
                link.add_int(count_a, -sign * prop_b);
                link.add_int(count_b, sign * prop_a);
                model.add_ge(link, 0);
                add_int_term(model, gap, weight);
            }
        }
    }
}
