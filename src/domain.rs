use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

// ================================================================================================
// Domain Strong Types (NewTypes)
// ================================================================================================

/// Identifies a worker by the integer id carried in both input tables
/// (`matricula` / `colaborador`).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct WorkerId(pub i64);

impl std::fmt::Display for WorkerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The per-day status alphabet. Exactly one status holds for every
/// (worker, day) cell of a schedule.
///
/// The string forms are the single letters used by the input calendar and the
/// output schedule tables. The calendar additionally carries `AP` (treated as
/// [`DayStatus::Absence`]) and `L_DOM` (a pre-fixed Sunday off), which the
/// normalizer folds into the per-worker day sets rather than into this enum.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    EnumIter,
    IntoStaticStr,
)]
pub enum DayStatus {
    /// Morning working shift.
    #[strum(serialize = "M")]
    Morning,

    /// Afternoon working shift.
    #[strum(serialize = "T")]
    Afternoon,

    /// Ordinary day off.
    #[strum(serialize = "L")]
    DayOff,

    /// Quality-weekend Saturday off (paired with an ordinary Sunday off).
    #[strum(serialize = "LQ")]
    QualityOff,

    /// Compensation day off earned by working a holiday or special Sunday.
    #[strum(serialize = "LD")]
    CompensationOff,

    /// Closed-store holiday; the store is shut and the worker is off.
    #[strum(serialize = "F")]
    ClosedHoliday,

    /// Input-provided absence.
    #[strum(serialize = "A")]
    Absence,

    /// Input-provided vacation.
    #[strum(serialize = "V")]
    Vacation,

    /// Day outside the worker's registered range.
    #[strum(serialize = "-")]
    OutOfRange,
}

impl DayStatus {
    /// The two productive shifts used for staffing and weekly caps.
    pub const PRODUCTIVE: [DayStatus; 2] = [DayStatus::Morning, DayStatus::Afternoon];

    pub fn is_working(self) -> bool {
        matches!(self, DayStatus::Morning | DayStatus::Afternoon)
    }

    pub fn is_free(self) -> bool {
        matches!(
            self,
            DayStatus::DayOff
                | DayStatus::QualityOff
                | DayStatus::CompensationOff
                | DayStatus::ClosedHoliday
        )
    }
}

/// Contractual working days per week.
///
/// The `8` code is not a day count: it marks a per-week override pattern
/// where each week independently requires 5 or 6 working days
/// (see [`Worker::work_days_per_week`]).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display,
)]
pub enum ContractType {
    FourDay,
    FiveDay,
    SixDay,
    WeekPattern,
}

impl ContractType {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            4 => Some(ContractType::FourDay),
            5 => Some(ContractType::FiveDay),
            6 => Some(ContractType::SixDay),
            8 => Some(ContractType::WeekPattern),
            _ => None,
        }
    }

    pub fn code(self) -> i64 {
        match self {
            ContractType::FourDay => 4,
            ContractType::FiveDay => 5,
            ContractType::SixDay => 6,
            ContractType::WeekPattern => 8,
        }
    }

    /// Fixed weekly working days, `None` for the per-week override pattern.
    pub fn weekly_working_days(self) -> Option<i64> {
        match self {
            ContractType::FourDay => Some(4),
            ContractType::FiveDay => Some(5),
            ContractType::SixDay => Some(6),
            ContractType::WeekPattern => None,
        }
    }
}

/// Store role of a worker; drives the role-conflict objective terms.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Default,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    IntoStaticStr,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Role {
    #[default]
    Normal,
    Keyholder,
    Manager,
}

// ================================================================================================
// Quotas
// ================================================================================================

/// Per-worker contractual allowances, possibly prorated by the registered
/// range. All counts are whole days.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quotas {
    /// Total ordinary days off for the year (`l_total`).
    pub total_l: i64,
    /// Sundays/holidays off (`l_dom_salsa`).
    pub total_l_dom: i64,
    /// Saturday–Sunday quality weekends (`c2d`).
    pub c2d: i64,
    /// Three-day quality weekends (`c3d`).
    pub c3d: i64,
    /// Compensation allowance (`l_d`).
    pub l_d: i64,
    /// Derived residual quality days: `total_l` minus every other bucket.
    pub l_q: i64,
    /// Complementary allowance (`cxx`).
    pub cxx: i64,
    /// `l_q + c2d + c3d`.
    pub t_lq: i64,
}

impl Quotas {
    /// Scales every allowance for a worker leaving before the end of the
    /// horizon. Weekend-pair quotas floor, everything else rounds with ties
    /// going to even.
    pub fn prorate(&mut self, factor: f64) {
        let round = |v: i64| (v as f64 * factor).round_ties_even() as i64;
        let floor = |v: i64| (v as f64 * factor).floor() as i64;
        self.total_l = round(self.total_l);
        self.total_l_dom = round(self.total_l_dom);
        self.c2d = floor(self.c2d);
        self.c3d = floor(self.c3d);
        self.l_d = round(self.l_d);
        self.l_q = round(self.l_q);
        self.cxx = round(self.cxx);
        self.t_lq = round(self.t_lq);
    }
}

// ================================================================================================
// Worker
// ================================================================================================

/// Pre-known weekly shift availability, read from calendar evidence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeekShift {
    pub morning: bool,
    pub afternoon: bool,
}

/// A worker with all per-day sets resolved to the input-status precedence:
/// closed holidays > empty > missing > fixed off > fixed LQ > absence.
#[derive(Debug, Clone)]
pub struct Worker {
    pub id: WorkerId,
    pub contract: ContractType,
    pub role: Role,
    pub quotas: Quotas,

    /// Hire day-of-year (`data_admissao`), 0 = unknown / before the horizon.
    pub hire_day: u32,
    /// Termination day-of-year (`data_demissao`), 0 = none.
    pub termination_day: u32,
    /// First day-of-year the worker appears in the calendar.
    pub first_registered_day: u32,
    /// Last day-of-year the worker appears in the calendar.
    pub last_registered_day: u32,

    /// `false` for "Completo"-cycle workers whose off days are fixed
    /// upstream; they contribute to counts and staffing only.
    pub solvable: bool,

    pub empty_days: BTreeSet<u32>,
    pub missing_days: BTreeSet<u32>,
    pub absences: BTreeSet<u32>,
    pub fixed_days_off: BTreeSet<u32>,
    pub fixed_lqs: BTreeSet<u32>,
    pub free_complete_cycle: BTreeSet<u32>,

    /// Days on which the model chooses among the check alphabet.
    pub working_days: BTreeSet<u32>,

    /// Contracted hours per horizon position (parallel to `Calendar::days`).
    pub work_day_hours: Vec<i64>,
    /// Required working days per week for the [`ContractType::WeekPattern`]
    /// contract (5 or 6).
    pub work_days_per_week: BTreeMap<u32, u8>,
    /// Calendar evidence of morning/afternoon availability per week.
    pub week_shift: BTreeMap<u32, WeekShift>,
}

impl Worker {
    /// Weekly working-day cap for the given week.
    pub fn max_week_days(&self, week: u32) -> i64 {
        match self.contract.weekly_working_days() {
            Some(n) => n,
            None => self
                .work_days_per_week
                .get(&week)
                .copied()
                .unwrap_or(5)
                .into(),
        }
    }

    /// Number of days in the worker's registered range, clamped to the
    /// horizon for workers active to the end.
    pub fn active_days(&self, horizon_last_day: u32) -> i64 {
        let last = if self.last_registered_day == 0 {
            horizon_last_day
        } else {
            self.last_registered_day
        };
        i64::from(last) - i64::from(self.first_registered_day) + 1
    }
}

// ================================================================================================
// Calendar (horizon)
// ================================================================================================

/// The scheduling horizon and its special-day structure, shared by all
/// workers of a store section.
#[derive(Debug, Clone, Default)]
pub struct Calendar {
    /// Sorted day-of-year indices of the horizon.
    pub days: Vec<u32>,
    pub sundays: BTreeSet<u32>,
    /// Non-Sunday public holidays on which the store is open.
    pub holidays: BTreeSet<u32>,
    /// Days the store is shut; every status is forced to `F`.
    pub closed_holidays: BTreeSet<u32>,
    /// `sundays ∪ holidays`.
    pub special_days: BTreeSet<u32>,
    /// Weekday of January 1 of the source year, Monday = 1 .. Sunday = 7.
    pub start_weekday: u32,
    /// ISO week number -> days, every horizon day included.
    pub weeks_all: BTreeMap<u32, Vec<u32>>,
    /// Same mapping with closed-holiday days removed.
    pub weeks_open: BTreeMap<u32, Vec<u32>>,
}

impl Calendar {
    pub fn first_day(&self) -> u32 {
        self.days.first().copied().unwrap_or(0)
    }

    pub fn last_day(&self) -> u32 {
        self.days.last().copied().unwrap_or(0)
    }

    /// Position of a day within the horizon vector.
    pub fn position(&self, day: u32) -> Option<usize> {
        self.days.binary_search(&day).ok()
    }

    /// Weekday index 0 = Monday .. 6 = Sunday derived from `start_weekday`.
    pub fn weekday(&self, day: u32) -> u32 {
        (day + self.start_weekday + 5) % 7
    }

    pub fn is_saturday(&self, day: u32) -> bool {
        self.weekday(day) == 5
    }

    /// Week containing `day` in the open-week map.
    pub fn week_of(&self, day: u32) -> Option<u32> {
        self.weeks_open
            .iter()
            .find(|(_, days)| days.contains(&day))
            .map(|(w, _)| *w)
    }

    /// Splits the horizon into `n` near-equal chronological chunks (the
    /// leading `len % n` chunks are one day longer).
    pub fn segments(&self, n: usize) -> Vec<&[u32]> {
        if n == 0 || self.days.is_empty() {
            return Vec::new();
        }
        let len = self.days.len();
        let base = len / n;
        let rem = len % n;
        let mut out = Vec::with_capacity(n);
        let mut start = 0usize;
        for i in 0..n {
            let size = base + usize::from(i < rem);
            out.push(&self.days[start..start + size]);
            start += size;
        }
        out
    }
}

// ================================================================================================
// Demand
// ================================================================================================

/// Target / minimum / maximum staffing per (day, shift), integers after
/// rounding the float inputs.
#[derive(Debug, Clone, Default)]
pub struct Demand {
    pub targets: HashMap<(u32, DayStatus), i64>,
    pub minimums: HashMap<(u32, DayStatus), i64>,
    pub maximums: HashMap<(u32, DayStatus), i64>,
}

impl Demand {
    pub fn target(&self, day: u32, shift: DayStatus) -> i64 {
        self.targets.get(&(day, shift)).copied().unwrap_or(0)
    }

    pub fn minimum(&self, day: u32, shift: DayStatus) -> i64 {
        self.minimums.get(&(day, shift)).copied().unwrap_or(0)
    }

    pub fn maximum(&self, day: u32, shift: DayStatus) -> i64 {
        self.maximums.get(&(day, shift)).copied().unwrap_or(0)
    }

    /// Total staffing target over the horizon and both productive shifts.
    pub fn total_target(&self) -> i64 {
        self.targets.values().sum()
    }
}

// ================================================================================================
// Normalized roster data
// ================================================================================================

/// Everything the model builder needs, produced by the input normalizer and
/// immutable afterwards.
#[derive(Debug, Clone, Default)]
pub struct RosterData {
    pub calendar: Calendar,
    pub workers: BTreeMap<WorkerId, Worker>,
    pub demand: Demand,
}

impl RosterData {
    /// Workers whose off days the model decides.
    pub fn solvable(&self) -> impl Iterator<Item = &Worker> {
        self.workers.values().filter(|w| w.solvable)
    }

    /// "Completo"-cycle workers: fixed upstream, counted for staffing.
    pub fn complete_cycle(&self) -> impl Iterator<Item = &Worker> {
        self.workers.values().filter(|w| !w.solvable)
    }

    pub fn all(&self) -> impl Iterator<Item = &Worker> {
        self.workers.values()
    }

    /// The globally earliest first registered day among solvable workers.
    pub fn earliest_first_day(&self) -> Option<u32> {
        self.solvable()
            .map(|w| w.first_registered_day)
            .filter(|d| *d > 0)
            .min()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn day_status_round_trips_through_letters() {
        use std::str::FromStr;
        for (letter, status) in [
            ("M", DayStatus::Morning),
            ("T", DayStatus::Afternoon),
            ("L", DayStatus::DayOff),
            ("LQ", DayStatus::QualityOff),
            ("LD", DayStatus::CompensationOff),
            ("F", DayStatus::ClosedHoliday),
            ("A", DayStatus::Absence),
            ("V", DayStatus::Vacation),
            ("-", DayStatus::OutOfRange),
        ] {
            assert_eq!(DayStatus::from_str(letter).unwrap(), status);
            assert_eq!(status.to_string(), letter);
        }
    }

    #[test]
    fn weekday_follows_start_weekday() {
        let calendar = Calendar {
            start_weekday: 3, // Jan 1 is a Wednesday
            ..Calendar::default()
        };
        assert_eq!(calendar.weekday(1), 2);
        assert!(calendar.is_saturday(4));
        assert_eq!(calendar.weekday(5), 6);
    }

    #[test]
    fn segments_split_near_equally() {
        let calendar = Calendar {
            days: (1..=14).collect(),
            ..Calendar::default()
        };
        let parts = calendar.segments(6);
        let sizes: Vec<usize> = parts.iter().map(|p| p.len()).collect();
        assert_eq!(sizes, vec![3, 3, 2, 2, 2, 2]);
        assert_eq!(parts[0], &[1, 2, 3]);
        assert_eq!(parts[5], &[13, 14]);
    }

    #[test]
    fn quotas_prorate_floors_weekend_pairs() {
        let mut q = Quotas {
            total_l: 104,
            total_l_dom: 10,
            c2d: 3,
            c3d: 1,
            l_d: 5,
            l_q: 7,
            cxx: 0,
            t_lq: 11,
        };
        q.prorate(0.5);
        assert_eq!(q.total_l, 52);
        assert_eq!(q.c2d, 1); // floored, not rounded
        assert_eq!(q.c3d, 0);
        assert_eq!(q.total_l_dom, 5);
        assert_eq!(q.l_d, 2); // 2.5 rounds to even, not away from zero
    }
}
