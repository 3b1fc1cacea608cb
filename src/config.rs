use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::EnumString;

use crate::domain::DayStatus;

// ================================================================================================
// Engine parameters
// ================================================================================================

/// Rounding mode for partial-week free-day quotas of newly hired or
/// terminated workers (`admissao_proporcional`).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, EnumString, strum::Display,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum RoundingMode {
    #[default]
    Floor,
    Ceil,
}

impl RoundingMode {
    pub fn apply(self, value: f64) -> i64 {
        match self {
            RoundingMode::Floor => value.floor() as i64,
            RoundingMode::Ceil => value.ceil() as i64,
        }
    }
}

/// Feature switches of the scheduling engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Closed-store days may stand in for either half of a quality weekend.
    pub f_special_day: bool,
    /// Quality weekends count against the Sunday-off allowance, lowering the
    /// Sunday floor by `c2d`.
    pub free_sundays_plus_c2d: bool,
    /// Vacation days inside a week reduce that week's free-day requirement.
    pub missing_days_affect_free_days: bool,
}

/// Solver invocation knobs. The search is single-threaded; `num_workers`
/// exists for parity with the orchestrator contract and reproducibility
/// stays guaranteed at its default of one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolverConfig {
    pub time_limit: Duration,
    pub num_workers: usize,
    pub log_search: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            time_limit: Duration::from_secs(120),
            num_workers: 1,
            log_search: true,
        }
    }
}

/// Integer penalty weights of the soft objective terms.
///
/// Terms come in two flavors: *scaled* terms hold an importance percentage
/// that is converted to an integer weight as
/// `floor(scale * importance / worst_case)`, and *direct* terms hold the
/// integer weight itself. An importance (or direct weight) of zero drops the
/// term from the objective.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectiveWeights {
    pub scale: i64,

    // --- scaled terms (importance percentages) ---
    pub staffing_excess: f64,
    pub staffing_deficit: f64,
    pub excess_and_deficit: f64,
    pub deficit_day: f64,
    pub zero_coverage: f64,
    pub sunday_spread: f64,
    pub lq_spread: f64,
    pub split_free_days: f64,
    pub crowded_day_off: f64,
    pub sunday_segment_balance: f64,
    pub lq_segment_balance: f64,
    pub inconsistent_week: f64,
    pub uncovered_key_shift: f64,

    // --- direct integer weights ---
    pub min_coverage_shortfall: i64,
    pub pairwise_sunday_fairness: i64,
    pub pairwise_lq_fairness: i64,
    pub manager_keyholder_same_off: i64,
    pub keyholder_overlap: i64,
    pub manager_overlap: i64,

    /// Free workers tolerated on the same day before the crowding flag.
    pub crowded_day_off_limit: i64,
}

impl Default for ObjectiveWeights {
    fn default() -> Self {
        Self {
            scale: 10_000,
            staffing_excess: 1.0,
            staffing_deficit: 1.4,
            excess_and_deficit: 1.0,
            deficit_day: 1.0,
            zero_coverage: 1.0,
            sunday_spread: 1.0,
            lq_spread: 1.0,
            split_free_days: 1.0,
            crowded_day_off: 1.0,
            sunday_segment_balance: 1.0,
            lq_segment_balance: 1.0,
            inconsistent_week: 0.6,
            uncovered_key_shift: 1.0,
            min_coverage_shortfall: 60,
            pairwise_sunday_fairness: 50,
            pairwise_lq_fairness: 50,
            manager_keyholder_same_off: 30_000,
            keyholder_overlap: 50_000,
            manager_overlap: 50_000,
            crowded_day_off_limit: 2,
        }
    }
}

impl ObjectiveWeights {
    /// `floor(scale * importance / worst_case)`; zero when the term is
    /// switched off or the worst case is degenerate.
    pub fn scaled(&self, importance: f64, worst_case: f64) -> i64 {
        if importance <= 0.0 || worst_case <= 0.0 {
            return 0;
        }
        (self.scale as f64 * importance / worst_case).floor() as i64
    }
}

/// The full configuration surface of the core, threaded explicitly through
/// every component (no global state).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineParams {
    /// Decision alphabet.
    pub shifts: Vec<DayStatus>,
    /// Alphabet allowed on working days.
    pub check_shifts: Vec<DayStatus>,
    /// Statuses that count as productive presence.
    pub working_shifts: Vec<DayStatus>,

    pub max_continuous_working_days: u32,
    pub settings: Settings,
    pub proration: RoundingMode,

    /// Weeks after a worked holiday/Sunday in which the compensation day may
    /// be placed; overridable per worker id.
    pub week_compensation_limit: u32,
    pub week_compensation_overrides: BTreeMap<i64, u32>,

    /// Compensation days granted per worked holiday.
    pub holiday_compensation_amount: i64,
    /// Compensation days granted per worked non-holiday Sunday (0 = off).
    pub sunday_compensation_amount: i64,

    pub weights: ObjectiveWeights,
    pub solver: SolverConfig,
}

impl Default for EngineParams {
    fn default() -> Self {
        Self {
            shifts: vec![
                DayStatus::Morning,
                DayStatus::Afternoon,
                DayStatus::DayOff,
                DayStatus::QualityOff,
                DayStatus::CompensationOff,
                DayStatus::ClosedHoliday,
                DayStatus::Absence,
                DayStatus::Vacation,
                DayStatus::OutOfRange,
            ],
            check_shifts: vec![
                DayStatus::Morning,
                DayStatus::Afternoon,
                DayStatus::DayOff,
                DayStatus::QualityOff,
                DayStatus::CompensationOff,
            ],
            working_shifts: vec![
                DayStatus::Morning,
                DayStatus::Afternoon,
                DayStatus::CompensationOff,
            ],
            max_continuous_working_days: 6,
            settings: Settings::default(),
            proration: RoundingMode::default(),
            week_compensation_limit: 2,
            week_compensation_overrides: BTreeMap::new(),
            holiday_compensation_amount: 1,
            sunday_compensation_amount: 0,
            weights: ObjectiveWeights::default(),
            solver: SolverConfig::default(),
        }
    }
}

impl EngineParams {
    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.solver.time_limit = limit;
        self
    }

    pub fn with_max_continuous_working_days(mut self, days: u32) -> Self {
        self.max_continuous_working_days = days;
        self
    }

    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_weights(mut self, weights: ObjectiveWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn with_sunday_compensation_amount(mut self, amount: i64) -> Self {
        self.sunday_compensation_amount = amount;
        self
    }

    /// Compensation window for one worker, override first.
    pub fn compensation_limit_for(&self, worker: i64) -> u32 {
        self.week_compensation_overrides
            .get(&worker)
            .copied()
            .unwrap_or(self.week_compensation_limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_surface() {
        let params = EngineParams::default();
        assert_eq!(params.shifts.len(), 9);
        assert_eq!(params.check_shifts.len(), 5);
        assert_eq!(params.max_continuous_working_days, 6);
        assert_eq!(params.week_compensation_limit, 2);
        assert_eq!(params.holiday_compensation_amount, 1);
        assert_eq!(params.sunday_compensation_amount, 0);
        assert_eq!(params.solver.time_limit, Duration::from_secs(120));
        assert_eq!(params.solver.num_workers, 1);
    }

    #[test]
    fn scaled_weights_follow_the_importance_formula() {
        let weights = ObjectiveWeights::default();
        assert_eq!(weights.scaled(1.0, 2.0), 5_000);
        assert_eq!(weights.scaled(1.4, 7.0), 2_000);
        assert_eq!(weights.scaled(0.0, 2.0), 0);
        assert_eq!(weights.scaled(1.0, 0.0), 0);
    }

    #[test]
    fn params_round_trip_through_serde() {
        let params = EngineParams::default();
        let json = serde_json::to_string(&params).unwrap();
        let back: EngineParams = serde_json::from_str(&json).unwrap();
        assert_eq!(back, params);
    }
}
