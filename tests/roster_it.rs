use chrono::{Datelike, NaiveDate};
use polars::df;
use polars::prelude::*;

use escala::domain::{DayStatus, WorkerId};
use escala::error::{EscalaError, SolveError};
use escala::schedule::Schedule;
use escala::{CpStatus, EngineParams, InputTables, RosterOutcome, solve_roster};

// ================================================================================================
// Fixtures
//
// Horizons sit at the end of 2024 (January 1 is a Monday, so day-of-year
// 344 = Dec 9 is also a Monday). Ending on day 364 keeps the quotas
// unprorated. Weeks are Monday-aligned, ww = (ordinal - 1) / 7 + 1.
// ================================================================================================

fn date_of(ordinal: u32) -> NaiveDate {
    NaiveDate::from_yo_opt(2024, ordinal).unwrap()
}

fn calendar_frame(entries: &[(i64, u32, &[&str])], holidays: &[u32]) -> DataFrame {
    let mut worker = Vec::new();
    let mut data = Vec::new();
    let mut ww = Vec::new();
    let mut wd = Vec::new();
    let mut dia_tipo = Vec::new();
    let mut tipo_turno = Vec::new();
    for &(id, start, marks) in entries {
        for (i, &mark) in marks.iter().enumerate() {
            let ordinal = start + i as u32;
            let date = date_of(ordinal);
            worker.push(id);
            data.push(date.format("%Y-%m-%d").to_string());
            ww.push(i64::from((ordinal - 1) / 7 + 1));
            let weekday = date.weekday().to_string();
            dia_tipo.push(if weekday == "Sun" || holidays.contains(&ordinal) {
                "domYf".to_string()
            } else {
                String::new()
            });
            wd.push(weekday);
            tipo_turno.push(mark.to_string());
        }
    }
    df!(
        "colaborador" => worker,
        "data" => data,
        "ww" => ww,
        "wd" => wd,
        "dia_tipo" => dia_tipo,
        "tipo_turno" => tipo_turno,
    )
    .unwrap()
}

struct Emp {
    id: i64,
    ciclo: &'static str,
    l_total: i64,
    l_dom_salsa: i64,
    c2d: i64,
    funcao: &'static str,
}

impl Emp {
    fn normal(id: i64) -> Self {
        Self {
            id,
            ciclo: "Normal",
            l_total: 6,
            l_dom_salsa: 1,
            c2d: 1,
            funcao: "normal",
        }
    }
}

fn employee_frame(rows: &[Emp]) -> DataFrame {
    let n = rows.len();
    df!(
        "matricula" => rows.iter().map(|r| r.id).collect::<Vec<_>>(),
        "tipo_contrato" => vec![5i64; n],
        "ciclo" => rows.iter().map(|r| r.ciclo.to_string()).collect::<Vec<_>>(),
        "l_total" => rows.iter().map(|r| r.l_total).collect::<Vec<_>>(),
        "l_dom" => vec![0i64; n],
        "l_dom_salsa" => rows.iter().map(|r| r.l_dom_salsa).collect::<Vec<_>>(),
        "c2d" => rows.iter().map(|r| r.c2d).collect::<Vec<_>>(),
        "c3d" => vec![0i64; n],
        "l_d" => vec![0i64; n],
        "cxx" => vec![0i64; n],
        "vz" => vec![0i64; n],
        "l_res" => vec![0i64; n],
        "l_res2" => vec![0i64; n],
        "funcao" => rows.iter().map(|r| r.funcao.to_string()).collect::<Vec<_>>(),
    )
    .unwrap()
}

fn demand_frame(start: u32, len: u32) -> DataFrame {
    let mut data = Vec::new();
    let mut turno = Vec::new();
    let mut pess_obj = Vec::new();
    let mut min_turno = Vec::new();
    let mut max_turno = Vec::new();
    let mut wday = Vec::new();
    for ordinal in start..start + len {
        let date = date_of(ordinal).format("%Y-%m-%d").to_string();
        for shift in ["M", "T"] {
            data.push(date.clone());
            turno.push(shift.to_string());
            pess_obj.push(if shift == "M" { 1.0f64 } else { 0.0 });
            min_turno.push(0.0f64);
            max_turno.push(5.0f64);
            wday.push(i64::from((ordinal - 1) % 7 + 1));
        }
    }
    df!(
        "data" => data,
        "turno" => turno,
        "pess_obj" => pess_obj,
        "min_turno" => min_turno,
        "max_turno" => max_turno,
        "wday" => wday,
    )
    .unwrap()
}

fn params() -> EngineParams {
    EngineParams::default().with_time_limit(std::time::Duration::from_secs(30))
}

fn solve(
    entries: &[(i64, u32, &[&str])],
    employees: &[Emp],
    holidays: &[u32],
    start: u32,
    len: u32,
    params: &EngineParams,
) -> Result<RosterOutcome, EscalaError> {
    let tables = InputTables {
        employees: employee_frame(employees),
        calendar: calendar_frame(entries, holidays),
        demand: demand_frame(start, len),
    };
    solve_roster(&tables, params)
}

fn off_count(schedule: &Schedule, worker: WorkerId, days: impl Iterator<Item = u32>) -> usize {
    days.filter(|&d| {
        matches!(
            schedule.status(worker, d),
            Some(DayStatus::DayOff) | Some(DayStatus::QualityOff)
        )
    })
    .count()
}

fn working_count(schedule: &Schedule, worker: WorkerId, days: impl Iterator<Item = u32>) -> usize {
    days.filter(|&d| {
        matches!(
            schedule.status(worker, d),
            Some(DayStatus::Morning) | Some(DayStatus::Afternoon)
        )
    })
    .count()
}

// ================================================================================================
// Scenarios
// ================================================================================================

/// Single five-day worker over the last two full weeks of the year: each
/// week carries exactly two off days, one of them a quality weekend, the
/// weekly working cap holds, and at least one Sunday is an ordinary L.
#[test]
fn single_worker_weekly_structure() {
    let marks = vec!["M"; 14];
    let entries = [(1i64, 351u32, marks.as_slice())];
    let outcome = solve(&entries, &[Emp::normal(1)], &[], 351, 14, &params()).unwrap();
    assert!(outcome.stats.status.has_solution());

    let schedule = &outcome.schedule;
    let w = WorkerId(1);
    for week_start in [351u32, 358] {
        let days = week_start..week_start + 7;
        assert_eq!(off_count(schedule, w, days.clone()), 2, "week {week_start}");
        assert!(working_count(schedule, w, days) <= 5);
    }
    // Every day inside the range is assigned.
    for d in 351..=364 {
        assert_ne!(schedule.status(w, d), Some(DayStatus::OutOfRange), "day {d}");
        assert_ne!(schedule.status(w, d), None);
    }
    // One quality weekend: LQ Saturday directly under an L Sunday.
    let quality_weekends: Vec<u32> = [356u32, 363]
        .into_iter()
        .filter(|&sat| {
            schedule.status(w, sat) == Some(DayStatus::QualityOff)
                && schedule.status(w, sat + 1) == Some(DayStatus::DayOff)
        })
        .collect();
    assert!(!quality_weekends.is_empty());
    // Every LQ sits on such a Saturday.
    for d in 351..=364 {
        if schedule.status(w, d) == Some(DayStatus::QualityOff) {
            assert!(quality_weekends.contains(&d));
        }
    }
    // Sunday-off floor.
    let sunday_l = [357u32, 364]
        .into_iter()
        .filter(|&d| schedule.status(w, d) == Some(DayStatus::DayOff))
        .count();
    assert!(sunday_l >= 1);
    let stats = schedule.worker_stats(w).unwrap();
    assert_eq!(stats.unassigned, 0);
    assert_eq!(stats.quality_off as usize, quality_weekends.len());
}

/// A worker hired in the middle of the horizon starts with a working shift
/// and shows the out-of-range marker before the hire; days with two
/// candidates keep at least one productive shift.
#[test]
fn mid_horizon_hire_boundaries() {
    let full = vec!["M"; 21];
    let hired = vec!["M"; 14];
    let entries = [
        (1i64, 344u32, full.as_slice()),
        (2i64, 351u32, hired.as_slice()),
    ];
    let outcome = solve(
        &entries,
        &[Emp::normal(1), Emp::normal(2)],
        &[],
        344,
        21,
        &params(),
    )
    .unwrap();
    let schedule = &outcome.schedule;

    // First active day of the late hire is a working shift.
    assert!(matches!(
        schedule.status(WorkerId(2), 351),
        Some(DayStatus::Morning) | Some(DayStatus::Afternoon)
    ));
    // Days before the hire are out of range and counted unassigned.
    for d in 344..=350 {
        assert_eq!(schedule.status(WorkerId(2), d), Some(DayStatus::OutOfRange));
    }
    assert_eq!(schedule.worker_stats(WorkerId(2)).unwrap().unassigned, 7);

    // Shared days keep coverage.
    for d in 351..=364 {
        let covered = working_count(schedule, WorkerId(1), std::iter::once(d))
            + working_count(schedule, WorkerId(2), std::iter::once(d));
        assert!(covered >= 1, "day {d} has no productive shift");
    }
}

/// A "Completo"-cycle worker keeps the pre-fixed weekend pattern and stays
/// out of the free-day decisions.
#[test]
fn complete_cycle_worker_keeps_fixed_days() {
    let solvable_marks = vec!["M"; 14];
    let complete_marks: Vec<&str> = (0..14)
        .map(|i| match i % 7 {
            5 => "L",
            6 => "L_DOM",
            _ => "M",
        })
        .collect();
    let entries = [
        (1i64, 351u32, solvable_marks.as_slice()),
        (2i64, 351u32, complete_marks.as_slice()),
    ];
    let mut complete = Emp::normal(2);
    complete.ciclo = "Completo";
    let outcome = solve(
        &entries,
        &[Emp::normal(1), complete],
        &[],
        351,
        14,
        &params(),
    )
    .unwrap();
    let schedule = &outcome.schedule;

    // The fixed Saturdays survive extraction as forced off days.
    assert_eq!(schedule.status(WorkerId(2), 356), Some(DayStatus::DayOff));
    assert_eq!(schedule.status(WorkerId(2), 363), Some(DayStatus::DayOff));
    // The solvable worker still owns its weekly structure.
    for week_start in [351u32, 358] {
        assert_eq!(
            off_count(schedule, WorkerId(1), week_start..week_start + 7),
            2
        );
    }
}

/// Working an open holiday earns exactly one compensation day in the
/// following weeks; not working it earns none.
#[test]
fn holiday_compensation_balances() {
    let marks = vec!["M"; 21];
    let entries = [(1i64, 344u32, marks.as_slice())];
    // Wednesday Dec 18 (day 353) is an open holiday.
    let outcome = solve(&entries, &[Emp::normal(1)], &[353], 344, 21, &params()).unwrap();
    let schedule = &outcome.schedule;
    let w = WorkerId(1);

    let worked_holiday = usize::from(matches!(
        schedule.status(w, 353),
        Some(DayStatus::Morning) | Some(DayStatus::Afternoon)
    ));
    assert_eq!(
        schedule.count(w, DayStatus::CompensationOff),
        worked_holiday,
        "LD count must match the worked holidays"
    );
    if worked_holiday == 1 {
        // The compensation day lands in the weeks after the holiday's week.
        let ld_days: Vec<u32> = (344..=364)
            .filter(|&d| schedule.status(w, d) == Some(DayStatus::CompensationOff))
            .collect();
        assert!(ld_days.iter().all(|&d| d >= 358));
    }
}

/// With the Sunday knob on, worked non-holiday Sundays earn compensation
/// days too.
#[test]
fn sunday_compensation_knob() {
    let marks = vec!["M"; 21];
    let entries = [(1i64, 344u32, marks.as_slice())];
    let params = params().with_sunday_compensation_amount(1);
    let outcome = solve(&entries, &[Emp::normal(1)], &[], 344, 21, &params).unwrap();
    let schedule = &outcome.schedule;
    let w = WorkerId(1);

    // Sundays eligible for compensation exclude the final one (no room in a
    // following week is handled by the same-week fallback, but the last day
    // of the registered range never compensates).
    let worked_sundays = [350u32, 357]
        .into_iter()
        .filter(|&d| {
            matches!(
                schedule.status(w, d),
                Some(DayStatus::Morning) | Some(DayStatus::Afternoon)
            )
        })
        .count();
    assert_eq!(schedule.count(w, DayStatus::CompensationOff), worked_sundays);
}

/// A quality-weekend quota beyond what the horizon can hold is reported as
/// INFEASIBLE with diagnostics, never as a partial schedule.
#[test]
fn impossible_quality_quota_is_infeasible() {
    let marks = vec!["M"; 14];
    let entries = [(1i64, 351u32, marks.as_slice())];
    let mut employee = Emp::normal(1);
    employee.c2d = 5;
    employee.l_total = 12;
    let err = solve(&entries, &[employee], &[], 351, 14, &params()).unwrap_err();
    match err {
        EscalaError::Solve(SolveError::Infeasible { diagnostics }) => {
            assert!(!diagnostics.is_empty());
        }
        other => panic!("expected infeasibility, got {other}"),
    }
}

/// The long schedule format round-trips, and re-solving the same inputs
/// reproduces the objective value.
#[test]
fn round_trip_and_deterministic_objective() {
    let marks = vec!["M"; 14];
    let entries = [(1i64, 351u32, marks.as_slice())];
    let first = solve(&entries, &[Emp::normal(1)], &[], 351, 14, &params()).unwrap();
    let second = solve(&entries, &[Emp::normal(1)], &[], 351, 14, &params()).unwrap();

    let frame = first.schedule.to_long_frame().unwrap();
    let parsed = Schedule::from_long_frame(&frame).unwrap();
    assert_eq!(parsed, first.schedule);

    if first.stats.status == CpStatus::Optimal && second.stats.status == CpStatus::Optimal {
        assert_eq!(first.stats.objective, second.stats.objective);
    }

    let wide = first.schedule.to_wide_frame().unwrap();
    assert_eq!(wide.width(), 15);
    assert_eq!(wide.height(), 1);
}

/// Two managers: the coverage constraint keeps them off on disjoint days,
/// and the overlap penalties never force infeasibility.
#[test]
fn managers_never_share_a_day_off() {
    let marks = vec!["M"; 14];
    let entries: [(i64, u32, &[&str]); 2] =
        [(1, 351, marks.as_slice()), (2, 351, marks.as_slice())];
    let mut manager_a = Emp::normal(1);
    manager_a.funcao = "manager";
    let mut manager_b = Emp::normal(2);
    manager_b.funcao = "manager";
    let outcome = solve(&entries, &[manager_a, manager_b], &[], 351, 14, &params()).unwrap();
    let schedule = &outcome.schedule;

    for d in 351..=364 {
        let both_off = off_count(schedule, WorkerId(1), std::iter::once(d)) > 0
            && off_count(schedule, WorkerId(2), std::iter::once(d)) > 0;
        assert!(!both_off, "both managers off on day {d}");
    }
}

/// A closed-store day is forced to `F` for everyone and does not consume
/// the weekly free-day quota.
#[test]
fn closed_store_day_forces_f() {
    // Wednesday Dec 18 (day 353) carries the closed marker.
    let marks: Vec<&str> = (0..14).map(|i| if i == 2 { "F" } else { "M" }).collect();
    let entries = [(1i64, 351u32, marks.as_slice())];
    let outcome = solve(&entries, &[Emp::normal(1)], &[], 351, 14, &params()).unwrap();
    let schedule = &outcome.schedule;
    let w = WorkerId(1);

    assert_eq!(schedule.status(w, 353), Some(DayStatus::ClosedHoliday));
    // The quota of two L/LQ days per week holds on top of the F day.
    for week_start in [351u32, 358] {
        assert_eq!(off_count(schedule, w, week_start..week_start + 7), 2);
    }
}

/// Demand beyond the available workforce stays feasible; the shortfall is
/// absorbed by the deficit terms.
#[test]
fn excess_demand_is_soft() {
    let marks = vec!["M"; 14];
    let entries = [(1i64, 351u32, marks.as_slice())];
    let tables = InputTables {
        employees: employee_frame(&[Emp::normal(1)]),
        calendar: calendar_frame(&entries, &[]),
        demand: {
            // Ask for three workers where one exists.
            let mut data = Vec::new();
            let mut turno = Vec::new();
            let mut pess = Vec::new();
            let mut min_t = Vec::new();
            let mut max_t = Vec::new();
            let mut wday = Vec::new();
            for ordinal in 351u32..365 {
                data.push(date_of(ordinal).format("%Y-%m-%d").to_string());
                turno.push("M".to_string());
                pess.push(3.0f64);
                min_t.push(2.0f64);
                max_t.push(5.0f64);
                wday.push(i64::from((ordinal - 1) % 7 + 1));
            }
            df!(
                "data" => data,
                "turno" => turno,
                "pess_obj" => pess,
                "min_turno" => min_t,
                "max_turno" => max_t,
                "wday" => wday,
            )
            .unwrap()
        },
    };
    let outcome = solve_roster(&tables, &params()).unwrap();
    assert!(outcome.stats.status.has_solution());
    assert!(outcome.stats.objective > 0);
}
