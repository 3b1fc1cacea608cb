use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use polars::prelude::{DataFrame, DataType};
use tracing::{debug, info, warn};

use crate::config::EngineParams;
use crate::domain::{
    Calendar, ContractType, Demand, DayStatus, Quotas, Role, RosterData, WeekShift, Worker,
    WorkerId,
};
use crate::error::{EscalaResult, InputError};
use crate::input::columns::{
    self, CalendarCol, DemandCol, EmployeeCol, require_columns,
};
use crate::input::treatment::migrate_weekend_absences;

/// Marker row some upstream exports carry in the id columns; dropped quietly.
const DAY_TYPE_MARKER: &str = "TIPO_DIA";

/// Cycle value of workers whose schedule is fixed upstream.
const COMPLETE_CYCLE: &str = "Completo";

// ================================================================================================
// Entry point
// ================================================================================================

/// Validates and normalizes the three input tables into [`RosterData`].
///
/// Fails fast on missing columns, unparseable dates, malformed quotas, or an
/// empty worker intersection; NaN quota values are recoverable (zero-filled
/// with a warning).
pub fn normalize(
    employees: &DataFrame,
    calendar: &DataFrame,
    demand: &DataFrame,
    params: &EngineParams,
) -> EscalaResult<RosterData> {
    let employees = lowercase_columns(employees)?;
    let calendar_df = lowercase_columns(calendar)?;
    let demand_df = lowercase_columns(demand)?;

    require_columns(&employees, "employee", columns::employee_required())?;
    require_columns(&calendar_df, "calendar", columns::calendar_required())?;
    require_columns(&demand_df, "demand", columns::demand_required())?;

    info!(
        employee_rows = employees.height(),
        calendar_rows = calendar_df.height(),
        demand_rows = demand_df.height(),
        "input tables loaded"
    );

    let employee_rows = read_employee_rows(&employees)?;
    let calendar_rows = read_calendar_rows(&calendar_df)?;

    let cal = build_calendar(&calendar_rows)?;

    // Workers present in both tables; the solvable subset excludes the
    // complete-cycle workers whose off days are fixed upstream.
    let calendar_ids: HashSet<i64> = calendar_rows.iter().map(|r| r.worker).collect();
    let mut complete_ids: BTreeSet<i64> = BTreeSet::new();
    let mut solvable_ids: BTreeSet<i64> = BTreeSet::new();
    for row in &employee_rows {
        if calendar_ids.contains(&row.id) {
            complete_ids.insert(row.id);
            if !row.ciclo.eq_ignore_ascii_case(COMPLETE_CYCLE) {
                solvable_ids.insert(row.id);
            }
        }
    }
    if complete_ids.is_empty() {
        return Err(InputError::EmptyWorkerIntersection.into());
    }
    info!(
        total = complete_ids.len(),
        solvable = solvable_ids.len(),
        "worker intersection resolved"
    );

    let by_worker: HashMap<i64, Vec<&CalendarRow>> = {
        let mut map: HashMap<i64, Vec<&CalendarRow>> = HashMap::new();
        for row in &calendar_rows {
            map.entry(row.worker).or_default().push(row);
        }
        map
    };
    let mut employee_by_id: HashMap<i64, &EmployeeRow> = HashMap::new();
    for row in &employee_rows {
        employee_by_id.entry(row.id).or_insert(row);
    }

    let mut workers: BTreeMap<WorkerId, Worker> = BTreeMap::new();
    for &id in &complete_ids {
        let rows = by_worker.get(&id).map(Vec::as_slice).unwrap_or(&[]);
        let employee = employee_by_id[&id];
        let solvable = solvable_ids.contains(&id);
        let worker = build_worker(id, employee, rows, &cal, solvable)?;
        workers.insert(WorkerId(id), worker);
    }

    let demand = read_demand(&demand_df, &params.shifts)?;

    info!(
        days = cal.days.len(),
        sundays = cal.sundays.len(),
        holidays = cal.holidays.len(),
        closed = cal.closed_holidays.len(),
        weeks = cal.weeks_all.len(),
        "normalization complete"
    );

    Ok(RosterData {
        calendar: cal,
        workers,
        demand,
    })
}

// ================================================================================================
// Frame helpers
// ================================================================================================

fn lowercase_columns(df: &DataFrame) -> EscalaResult<DataFrame> {
    let mut df = df.clone();
    let names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|n| n.to_lowercase())
        .collect();
    df.set_column_names(names)?;
    Ok(df)
}

fn col_as_str(df: &DataFrame, name: &str) -> EscalaResult<Vec<Option<String>>> {
    let casted = df.column(name)?.cast(&DataType::String)?;
    let ca = casted.str()?;
    Ok(ca.into_iter().map(|v| v.map(str::to_string)).collect())
}

fn col_as_i64(df: &DataFrame, name: &str) -> EscalaResult<Vec<Option<i64>>> {
    let casted = df.column(name)?.cast(&DataType::Float64)?;
    let ca = casted.f64()?;
    Ok(ca
        .into_iter()
        .map(|v| v.filter(|x| x.is_finite()).map(|x| x as i64))
        .collect())
}

/// Dates either as a native date column or as `YYYY-MM-DD` strings; any
/// timestamp suffix is ignored.
fn col_as_dates(
    df: &DataFrame,
    table: &'static str,
    name: &str,
) -> EscalaResult<Vec<Option<NaiveDate>>> {
    let casted = df.column(name)?.cast(&DataType::String)?;
    let ca = casted.str()?;
    let mut out = Vec::with_capacity(ca.len());
    for value in ca {
        match value {
            None => out.push(None),
            Some(s) => {
                let prefix = &s[..s.len().min(10)];
                match NaiveDate::parse_from_str(prefix, "%Y-%m-%d") {
                    Ok(date) => out.push(Some(date)),
                    Err(_) => {
                        return Err(InputError::InvalidDate {
                            table,
                            value: s.to_string(),
                        }
                        .into());
                    }
                }
            }
        }
    }
    Ok(out)
}

/// Quota column with NaN/null recovered as zero, logged once per column.
fn col_as_quota(df: &DataFrame, name: &str) -> EscalaResult<Vec<i64>> {
    let values = col_as_i64(df, name)?;
    if values.iter().any(Option::is_none) {
        warn!(column = name, "NaN quota values found, filling with 0");
    }
    Ok(values.into_iter().map(|v| v.unwrap_or(0)).collect())
}

// ================================================================================================
// Employee table
// ================================================================================================

#[derive(Debug)]
struct EmployeeRow {
    id: i64,
    contract_code: Option<i64>,
    ciclo: String,
    role: Role,
    hire: Option<NaiveDate>,
    termination: Option<NaiveDate>,
    l_total: i64,
    l_dom: i64,
    l_dom_salsa: i64,
    c2d: i64,
    c3d: i64,
    l_d: i64,
    cxx: i64,
    vz: i64,
    l_res: i64,
    l_res2: i64,
}

fn read_employee_rows(df: &DataFrame) -> EscalaResult<Vec<EmployeeRow>> {
    let raw_ids = col_as_str(df, EmployeeCol::Matricula.as_str())?;
    let ids = col_as_i64(df, EmployeeCol::Matricula.as_str())?;
    let contract = col_as_i64(df, EmployeeCol::TipoContrato.as_str())?;
    let ciclo = col_as_str(df, EmployeeCol::Ciclo.as_str())?;
    let l_total = col_as_quota(df, EmployeeCol::LTotal.as_str())?;
    let l_dom = col_as_quota(df, EmployeeCol::LDom.as_str())?;
    let l_dom_salsa = col_as_quota(df, EmployeeCol::LDomSalsa.as_str())?;
    let c2d = col_as_quota(df, EmployeeCol::C2d.as_str())?;
    let c3d = col_as_quota(df, EmployeeCol::C3d.as_str())?;
    let l_d = col_as_quota(df, EmployeeCol::LD.as_str())?;
    let cxx = col_as_quota(df, EmployeeCol::Cxx.as_str())?;
    let vz = col_as_quota(df, EmployeeCol::Vz.as_str())?;
    let l_res = col_as_quota(df, EmployeeCol::LRes.as_str())?;
    let l_res2 = col_as_quota(df, EmployeeCol::LRes2.as_str())?;

    let roles = if df.column(columns::EMPLOYEE_ROLE).is_ok() {
        col_as_str(df, columns::EMPLOYEE_ROLE)?
    } else {
        vec![None; df.height()]
    };
    let hires = if df.column(columns::EMPLOYEE_HIRE_DATE).is_ok() {
        col_as_dates(df, "employee", columns::EMPLOYEE_HIRE_DATE)?
    } else {
        vec![None; df.height()]
    };
    let terminations = if df.column(columns::EMPLOYEE_TERMINATION_DATE).is_ok() {
        col_as_dates(df, "employee", columns::EMPLOYEE_TERMINATION_DATE)?
    } else {
        vec![None; df.height()]
    };

    let mut rows = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let Some(id) = ids[i] else {
            let raw = raw_ids[i].clone().unwrap_or_default();
            if raw.eq_ignore_ascii_case(DAY_TYPE_MARKER) {
                continue;
            }
            return Err(InputError::InvalidWorkerId(raw).into());
        };
        let role = match &roles[i] {
            None => Role::Normal,
            Some(value) => Role::from_str(value).unwrap_or_else(|_| {
                warn!(worker = id, role = %value, "unknown role, defaulting to normal");
                Role::Normal
            }),
        };
        rows.push(EmployeeRow {
            id,
            contract_code: contract[i],
            ciclo: ciclo[i].clone().unwrap_or_default(),
            role,
            hire: hires[i],
            termination: terminations[i],
            l_total: l_total[i],
            l_dom: l_dom[i],
            l_dom_salsa: l_dom_salsa[i],
            c2d: c2d[i],
            c3d: c3d[i],
            l_d: l_d[i],
            cxx: cxx[i],
            vz: vz[i],
            l_res: l_res[i],
            l_res2: l_res2[i],
        });
    }
    Ok(rows)
}

// ================================================================================================
// Calendar table
// ================================================================================================

#[derive(Debug)]
struct CalendarRow {
    worker: i64,
    date: NaiveDate,
    day: u32,
    week: u32,
    weekday: String,
    day_type: String,
    shift_mark: String,
    hours: i64,
}

fn read_calendar_rows(df: &DataFrame) -> EscalaResult<Vec<CalendarRow>> {
    let raw_ids = col_as_str(df, CalendarCol::Colaborador.as_str())?;
    let ids = col_as_i64(df, CalendarCol::Colaborador.as_str())?;
    let dates = col_as_dates(df, "calendar", CalendarCol::Data.as_str())?;
    let weeks = col_as_i64(df, CalendarCol::Ww.as_str())?;
    let weekdays = col_as_str(df, CalendarCol::Wd.as_str())?;
    let day_types = col_as_str(df, CalendarCol::DiaTipo.as_str())?;
    let shift_marks = col_as_str(df, CalendarCol::TipoTurno.as_str())?;
    let hours = if df.column(columns::CALENDAR_HOURS).is_ok() {
        col_as_i64(df, columns::CALENDAR_HOURS)?
    } else {
        vec![None; df.height()]
    };

    let mut rows = Vec::with_capacity(df.height());
    let mut dropped = 0usize;
    for i in 0..df.height() {
        let Some(worker) = ids[i] else {
            let raw = raw_ids[i].clone().unwrap_or_default();
            if !raw.eq_ignore_ascii_case(DAY_TYPE_MARKER) {
                dropped += 1;
            }
            continue;
        };
        let Some(date) = dates[i] else {
            return Err(InputError::InvalidDate {
                table: "calendar",
                value: String::from("<null>"),
            }
            .into());
        };
        let Some(week) = weeks[i] else {
            dropped += 1;
            continue;
        };
        rows.push(CalendarRow {
            worker,
            date,
            day: date.ordinal(),
            week: week as u32,
            weekday: weekdays[i].clone().unwrap_or_default(),
            day_type: day_types[i].clone().unwrap_or_default(),
            shift_mark: shift_marks[i].clone().unwrap_or_default(),
            hours: hours[i].unwrap_or(1).max(0),
        });
    }
    if dropped > 0 {
        warn!(dropped, "calendar rows with invalid worker or week removed");
    }
    Ok(rows)
}

fn build_calendar(rows: &[CalendarRow]) -> EscalaResult<Calendar> {
    let mut days: BTreeSet<u32> = BTreeSet::new();
    let mut sundays = BTreeSet::new();
    let mut holidays = BTreeSet::new();
    let mut closed_holidays = BTreeSet::new();
    let mut day_week: BTreeMap<u32, u32> = BTreeMap::new();
    let mut first_date: Option<NaiveDate> = None;

    for row in rows {
        days.insert(row.day);
        day_week.entry(row.day).or_insert(row.week);
        if row.weekday == "Sun" {
            sundays.insert(row.day);
        } else if row.day_type == "domYf" {
            holidays.insert(row.day);
        }
        if row.shift_mark == "F" {
            closed_holidays.insert(row.day);
        }
        if first_date.is_none_or(|d| row.date < d) {
            first_date = Some(row.date);
        }
    }
    let Some(first_date) = first_date else {
        return Err(InputError::EmptyHorizon.into());
    };

    let january_first = NaiveDate::from_ymd_opt(first_date.year(), 1, 1)
        .expect("January 1 always exists");
    let start_weekday = january_first.weekday().number_from_monday();

    let mut weeks_all: BTreeMap<u32, Vec<u32>> = BTreeMap::new();
    let mut weeks_open: BTreeMap<u32, Vec<u32>> = BTreeMap::new();
    for (&day, &week) in &day_week {
        weeks_all.entry(week).or_default().push(day);
        if !closed_holidays.contains(&day) {
            weeks_open.entry(week).or_default().push(day);
        }
    }
    for days in weeks_all.values_mut().chain(weeks_open.values_mut()) {
        days.sort_unstable();
    }

    let special_days: BTreeSet<u32> = sundays.union(&holidays).copied().collect();
    debug!(
        start_weekday,
        year = first_date.year(),
        "calendar horizon derived"
    );

    Ok(Calendar {
        days: days.into_iter().collect(),
        sundays,
        holidays,
        closed_holidays,
        special_days,
        start_weekday,
        weeks_all,
        weeks_open,
    })
}

// ================================================================================================
// Worker assembly
// ================================================================================================

fn build_worker(
    id: i64,
    employee: &EmployeeRow,
    rows: &[&CalendarRow],
    cal: &Calendar,
    solvable: bool,
) -> EscalaResult<Worker> {
    let worker_id = WorkerId(id);

    let mut empty_days = BTreeSet::new();
    let mut missing_days = BTreeSet::new();
    let mut absences = BTreeSet::new();
    let mut fixed_days_off = BTreeSet::new();
    let mut free_complete_cycle = BTreeSet::new();
    let mut week_shift: BTreeMap<u32, WeekShift> = BTreeMap::new();
    let mut week_evidence: BTreeMap<u32, u8> = BTreeMap::new();
    let mut work_day_hours = vec![1i64; cal.days.len()];

    let mut first_registered_day = 0u32;
    let mut last_registered_day = 0u32;

    for row in rows {
        match row.shift_mark.as_str() {
            "-" => {
                empty_days.insert(row.day);
            }
            "V" => {
                missing_days.insert(row.day);
            }
            "A" | "AP" => {
                absences.insert(row.day);
            }
            "L" => {
                fixed_days_off.insert(row.day);
                free_complete_cycle.insert(row.day);
            }
            "L_DOM" => {
                free_complete_cycle.insert(row.day);
            }
            "M" => {
                week_shift.entry(row.week).or_default().morning = true;
                *week_evidence.entry(row.week).or_default() += 1;
            }
            "T" => {
                week_shift.entry(row.week).or_default().afternoon = true;
                *week_evidence.entry(row.week).or_default() += 1;
            }
            _ => {}
        }
        if first_registered_day == 0 || row.day < first_registered_day {
            first_registered_day = row.day;
        }
        last_registered_day = last_registered_day.max(row.day);
        if let Some(pos) = cal.position(row.day) {
            work_day_hours[pos] = row.hours;
        }
    }

    // Every day outside the registered range is a missing day.
    if first_registered_day > 0 || last_registered_day > 0 {
        missing_days.extend(1..first_registered_day);
        missing_days.extend(last_registered_day + 1..366);
    }

    // Precedence resolution, then the weekend migration of absence-heavy
    // weeks.
    let closed = &cal.closed_holidays;
    empty_days = empty_days.difference(closed).copied().collect();
    absences = absences
        .difference(closed)
        .copied()
        .collect::<BTreeSet<u32>>()
        .difference(&fixed_days_off)
        .copied()
        .collect();
    let fixed_lqs =
        migrate_weekend_absences(worker_id, &mut absences, &mut fixed_days_off, &cal.weeks_all);
    missing_days = missing_days.difference(closed).copied().collect();
    free_complete_cycle = free_complete_cycle.difference(closed).copied().collect();
    fixed_days_off = fixed_days_off.difference(closed).copied().collect();

    let mut working_days: BTreeSet<u32> = cal.days.iter().copied().collect();
    for blocked in [
        &empty_days,
        &absences,
        &missing_days,
        closed,
        &free_complete_cycle,
        &fixed_lqs,
    ] {
        working_days = working_days.difference(blocked).copied().collect();
    }
    if working_days.is_empty() {
        warn!(worker = %worker_id, "no working days left after normalization");
    }

    // Contract and quotas; a worker that fails these checks is demoted to
    // the complete-cycle group instead of being scheduled.
    let mut solvable = solvable;
    let contract = match employee.contract_code.and_then(ContractType::from_code) {
        Some(contract) => contract,
        None => {
            if solvable {
                tracing::error!(
                    worker = %worker_id,
                    code = ?employee.contract_code,
                    "unparsable contract type, removing worker from the solvable set"
                );
                solvable = false;
            }
            ContractType::FiveDay
        }
    };
    if solvable && employee.l_total <= 0 {
        tracing::error!(
            worker = %worker_id,
            l_total = employee.l_total,
            "non-positive total day-off quota, removing worker from the solvable set"
        );
        solvable = false;
    }

    let l_q = employee.l_total
        - employee.l_dom
        - employee.c2d
        - employee.c3d
        - employee.l_d
        - employee.cxx
        - employee.vz
        - employee.l_res
        - employee.l_res2;
    if solvable && l_q < 0 {
        return Err(InputError::MalformedQuota { worker: id, l_q }.into());
    }

    let mut quotas = Quotas {
        total_l: employee.l_total,
        total_l_dom: employee.l_dom_salsa,
        c2d: employee.c2d,
        c3d: employee.c3d,
        l_d: employee.l_d,
        l_q,
        cxx: employee.cxx,
        t_lq: l_q + employee.c2d + employee.c3d,
    };

    // Pro-rating for workers leaving before the end of the source year.
    if last_registered_day > 0 && last_registered_day < 364 {
        let factor =
            f64::from(last_registered_day - cal.first_day()) / 364.0;
        debug!(worker = %worker_id, factor, "prorating quotas by registered range");
        quotas.prorate(factor);
    }

    // Contract-8 week patterns from calendar evidence: 5 or 6 required
    // working days, defaulting to 5 without evidence.
    let work_days_per_week: BTreeMap<u32, u8> = week_evidence
        .iter()
        .map(|(&week, &count)| (week, count.clamp(5, 6)))
        .collect();

    let year = rows.first().map(|r| r.date.year());
    let to_day_of_year = |date: Option<NaiveDate>| -> u32 {
        match (date, year) {
            (Some(d), Some(y)) if d.year() == y => d.ordinal(),
            _ => 0,
        }
    };

    Ok(Worker {
        id: worker_id,
        contract,
        role: employee.role,
        quotas,
        hire_day: to_day_of_year(employee.hire),
        termination_day: to_day_of_year(employee.termination),
        first_registered_day,
        last_registered_day,
        solvable,
        empty_days,
        missing_days,
        absences,
        fixed_days_off,
        fixed_lqs,
        free_complete_cycle,
        working_days,
        work_day_hours,
        work_days_per_week,
        week_shift,
    })
}

// ================================================================================================
// Demand table
// ================================================================================================

fn read_demand(df: &DataFrame, shifts: &[DayStatus]) -> EscalaResult<Demand> {
    let dates = col_as_dates(df, "demand", DemandCol::Data.as_str())?;
    let shift_col = col_as_str(df, DemandCol::Turno.as_str())?;
    let targets = col_as_i64_rounded(df, DemandCol::PessObj.as_str())?;
    let minimums = col_as_i64_rounded(df, DemandCol::MinTurno.as_str())?;
    let maximums = col_as_i64_rounded(df, DemandCol::MaxTurno.as_str())?;

    let mut demand = Demand::default();
    for i in 0..df.height() {
        let (Some(date), Some(shift)) = (dates[i], shift_col[i].as_deref()) else {
            continue;
        };
        let Ok(status) = DayStatus::from_str(shift) else {
            continue;
        };
        if !shifts.contains(&status) {
            continue;
        }
        let day = date.ordinal();
        if status.is_working() {
            demand.targets.insert((day, status), targets[i].unwrap_or(0));
        }
        if let Some(min) = minimums[i] {
            demand.minimums.insert((day, status), min);
        }
        if let Some(max) = maximums[i] {
            demand.maximums.insert((day, status), max);
        }
    }
    Ok(demand)
}

/// Float demand values rounded to whole workers, ties to even.
fn col_as_i64_rounded(df: &DataFrame, name: &str) -> EscalaResult<Vec<Option<i64>>> {
    let casted = df.column(name)?.cast(&DataType::Float64)?;
    let ca = casted.f64()?;
    Ok(ca
        .into_iter()
        .map(|v| {
            v.filter(|x| x.is_finite())
                .map(|x| x.round_ties_even() as i64)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::df;
    use polars::prelude::*;

    /// Two ISO weeks starting Monday 2024-01-01, one worker, open Sundays.
    fn calendar_frame(worker: i64, marks: &[&str]) -> DataFrame {
        let mut ids = Vec::new();
        let mut dates = Vec::new();
        let mut ww = Vec::new();
        let mut wd = Vec::new();
        let mut dia_tipo = Vec::new();
        let mut tipo_turno = Vec::new();
        for (i, mark) in marks.iter().enumerate() {
            let date = NaiveDate::from_ymd_opt(2024, 1, 1)
                .unwrap()
                .checked_add_days(chrono::Days::new(i as u64))
                .unwrap();
            ids.push(worker);
            dates.push(date.format("%Y-%m-%d").to_string());
            ww.push((i / 7 + 1) as i64);
            wd.push(match date.weekday() {
                chrono::Weekday::Sun => "Sun".to_string(),
                other => other.to_string(),
            });
            dia_tipo.push(if date.weekday() == chrono::Weekday::Sun {
                "domYf".to_string()
            } else {
                String::new()
            });
            tipo_turno.push(mark.to_string());
        }
        df!(
            "COLABORADOR" => ids,
            "DATA" => dates,
            "WW" => ww,
            "WD" => wd,
            "DIA_TIPO" => dia_tipo,
            "TIPO_TURNO" => tipo_turno,
        )
        .unwrap()
    }

    fn employee_frame(worker: i64, ciclo: &str) -> DataFrame {
        df!(
            "MATRICULA" => [worker],
            "TIPO_CONTRATO" => [5i64],
            "CICLO" => [ciclo],
            "L_TOTAL" => [20i64],
            "L_DOM" => [2i64],
            "L_DOM_SALSA" => [1i64],
            "C2D" => [1i64],
            "C3D" => [0i64],
            "L_D" => [0i64],
            "CXX" => [0i64],
            "VZ" => [0i64],
            "L_RES" => [0i64],
            "L_RES2" => [0i64],
        )
        .unwrap()
    }

    fn demand_frame() -> DataFrame {
        df!(
            "DATA" => ["2024-01-01", "2024-01-01"],
            "TURNO" => ["M", "T"],
            "PESS_OBJ" => [1.4f64, 0.6f64],
            "MIN_TURNO" => [1.0f64, 0.0f64],
            "MAX_TURNO" => [2.5f64, 3.0f64],
            "WDAY" => [1i64, 1i64],
        )
        .unwrap()
    }

    #[test]
    fn normalizes_a_two_week_horizon() {
        let marks = vec!["M"; 14];
        let data = normalize(
            &employee_frame(1, "Normal"),
            &calendar_frame(1, &marks),
            &demand_frame(),
            &EngineParams::default(),
        )
        .unwrap();

        assert_eq!(data.calendar.days.len(), 14);
        assert_eq!(data.calendar.start_weekday, 1);
        assert_eq!(
            data.calendar.sundays,
            BTreeSet::from([7, 14])
        );
        assert!(data.calendar.holidays.is_empty());
        assert_eq!(data.calendar.weeks_all.len(), 2);

        let worker = &data.workers[&WorkerId(1)];
        assert!(worker.solvable);
        assert_eq!(worker.first_registered_day, 1);
        assert_eq!(worker.last_registered_day, 14);
        assert_eq!(worker.working_days.len(), 14);
        // The registered range ends on day 14, so quotas prorate by 13/364.
        assert_eq!(worker.quotas.l_q, 1);
        assert!(worker.week_shift[&1].morning);
        assert!(!worker.week_shift[&1].afternoon);

        // Demand rounds to the nearest integer, ties to even.
        assert_eq!(data.demand.target(1, DayStatus::Morning), 1);
        assert_eq!(data.demand.target(1, DayStatus::Afternoon), 1);
        assert_eq!(data.demand.minimum(1, DayStatus::Morning), 1);
        assert_eq!(data.demand.maximum(1, DayStatus::Morning), 2);
    }

    #[test]
    fn missing_required_column_is_fatal() {
        let calendar = calendar_frame(1, &["M"; 14]);
        let broken = employee_frame(1, "Normal").drop("C2D").unwrap();
        let err = normalize(&broken, &calendar, &demand_frame(), &EngineParams::default())
            .unwrap_err();
        assert!(err.to_string().contains("c2d"));
    }

    #[test]
    fn disjoint_worker_sets_are_fatal() {
        let err = normalize(
            &employee_frame(2, "Normal"),
            &calendar_frame(1, &["M"; 14]),
            &demand_frame(),
            &EngineParams::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            crate::error::EscalaError::Input(InputError::EmptyWorkerIntersection)
        ));
    }

    #[test]
    fn negative_derived_quota_is_fatal() {
        let employees = df!(
            "MATRICULA" => [1i64],
            "TIPO_CONTRATO" => [5i64],
            "CICLO" => ["Normal"],
            "L_TOTAL" => [1i64],
            "L_DOM" => [5i64],
            "L_DOM_SALSA" => [1i64],
            "C2D" => [0i64],
            "C3D" => [0i64],
            "L_D" => [0i64],
            "CXX" => [0i64],
            "VZ" => [0i64],
            "L_RES" => [0i64],
            "L_RES2" => [0i64],
        )
        .unwrap();
        let err = normalize(
            &employees,
            &calendar_frame(1, &["M"; 14]),
            &demand_frame(),
            &EngineParams::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            crate::error::EscalaError::Input(InputError::MalformedQuota { worker: 1, .. })
        ));
    }

    #[test]
    fn complete_cycle_workers_are_not_solvable() {
        let data = normalize(
            &employee_frame(1, "Completo"),
            &calendar_frame(1, &["M"; 14]),
            &demand_frame(),
            &EngineParams::default(),
        )
        .unwrap();
        assert_eq!(data.solvable().count(), 0);
        assert_eq!(data.complete_cycle().count(), 1);
    }

    #[test]
    fn statuses_feed_the_worker_day_sets() {
        let marks = [
            "M", "M", "V", "A", "L", "M", "M", // week 1
            "M", "-", "M", "M", "M", "M", "L_DOM", // week 2
        ];
        let data = normalize(
            &employee_frame(1, "Normal"),
            &calendar_frame(1, &marks),
            &demand_frame(),
            &EngineParams::default(),
        )
        .unwrap();
        let worker = &data.workers[&WorkerId(1)];
        assert!(worker.missing_days.contains(&3));
        assert!(worker.absences.contains(&4));
        assert!(worker.fixed_days_off.contains(&5));
        assert!(worker.empty_days.contains(&9));
        assert!(worker.free_complete_cycle.contains(&14));
        for blocked in [3, 4, 5, 9, 14] {
            assert!(!worker.working_days.contains(&blocked), "day {blocked}");
        }
        assert!(worker.working_days.contains(&1));
    }

    #[test]
    fn quotas_prorate_for_early_leavers() {
        // Worker registered only for the first two weeks of the year.
        let data = normalize(
            &employee_frame(1, "Normal"),
            &calendar_frame(1, &["M"; 14]),
            &demand_frame(),
            &EngineParams::default(),
        )
        .unwrap();
        let worker = &data.workers[&WorkerId(1)];
        // factor = (14 - 1) / 364
        assert_eq!(worker.quotas.total_l, 1);
        assert_eq!(worker.quotas.c2d, 0); // floored
        assert!(worker.missing_days.contains(&15));
    }
}
