use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use strum::{Display, IntoStaticStr};

use crate::config::SolverConfig;
use crate::solver::model::{BoolVar, CpModel, IntVar, LinearExpr};
use crate::solver::propagate::{Domains, check_all, propagate};

// ================================================================================================
// Outcome types
// ================================================================================================

/// Terminal search status, named after the CP-SAT status alphabet.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, IntoStaticStr,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum CpStatus {
    Optimal,
    Feasible,
    Infeasible,
    ModelInvalid,
    Unknown,
}

impl CpStatus {
    pub fn name(self) -> &'static str {
        self.into()
    }

    pub fn has_solution(self) -> bool {
        matches!(self, CpStatus::Optimal | CpStatus::Feasible)
    }
}

/// A complete variable assignment.
#[derive(Debug, Clone)]
pub struct Solution {
    values: Vec<i64>,
}

impl Solution {
    pub fn value(&self, var: BoolVar) -> i64 {
        self.values[var.index()]
    }

    pub fn boolean(&self, var: BoolVar) -> bool {
        self.values[var.index()] == 1
    }

    pub fn int_value(&self, var: IntVar) -> i64 {
        self.values[var.index()]
    }
}

/// Search statistics reported alongside every outcome.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SearchStats {
    pub objective: i64,
    pub best_bound: i64,
    pub branches: u64,
    pub conflicts: u64,
    pub wall_time: Duration,
}

#[derive(Debug)]
pub struct SolveResult {
    pub status: CpStatus,
    pub solution: Option<Solution>,
    pub stats: SearchStats,
}

// ================================================================================================
// Solver
// ================================================================================================

/// Depth-first branch-and-bound over the boolean decision variables with
/// bounds propagation at every node. Integers are completed from their
/// propagated bounds in the direction their objective coefficient prefers.
#[derive(Debug, Clone)]
pub struct CpSolver {
    pub time_limit: Duration,
    pub num_workers: usize,
    pub log_search: bool,
}

impl CpSolver {
    pub fn new(config: &SolverConfig) -> Self {
        Self {
            time_limit: config.time_limit,
            num_workers: config.num_workers,
            log_search: config.log_search,
        }
    }
}

impl Default for CpSolver {
    fn default() -> Self {
        Self::new(&SolverConfig::default())
    }
}

struct Decision {
    var: u32,
    mark: usize,
    first_value: i64,
    tried_second: bool,
}

impl CpSolver {
    pub fn solve(&self, model: &CpModel) -> SolveResult {
        let start = Instant::now();
        if let Err(err) = model.validate() {
            tracing::error!(error = %err, "model rejected before search");
            return SolveResult {
                status: CpStatus::ModelInvalid,
                solution: None,
                stats: SearchStats {
                    wall_time: start.elapsed(),
                    ..SearchStats::default()
                },
            };
        }
        if self.num_workers > 1 {
            tracing::debug!(
                num_workers = self.num_workers,
                "search runs single-threaded; extra workers are ignored"
            );
        }

        let obj_coeff = model.objective_coefficients();
        let mut dom = Domains::from_model(model);
        let mut branches = 0u64;
        let mut conflicts = 0u64;
        let mut incumbent: Option<(Vec<i64>, i64)> = None;

        if dom.any_empty() || !propagate(&model.constraints, &mut dom) {
            return self.finish(
                start,
                CpStatus::Infeasible,
                None,
                SearchStats {
                    wall_time: start.elapsed(),
                    ..SearchStats::default()
                },
            );
        }
        let root_bound = objective_lower_bound(&model.objective, &obj_coeff, &dom);

        let mut decisions: Vec<Decision> = Vec::new();
        let mut timed_out = false;

        'search: loop {
            if start.elapsed() >= self.time_limit {
                timed_out = true;
                break 'search;
            }

            let bound = objective_lower_bound(&model.objective, &obj_coeff, &dom);
            let pruned = incumbent.as_ref().is_some_and(|(_, best)| bound >= *best);

            if !pruned {
                if let Some(var) = pick_decision_var(model, &dom) {
                    let mark = dom.mark();
                    decisions.push(Decision {
                        var,
                        mark,
                        first_value: 1,
                        tried_second: false,
                    });
                    branches += 1;
                    if dom.assign(var, 1) && propagate(&model.constraints, &mut dom) {
                        continue 'search;
                    }
                } else {
                    // Leaf: every decision boolean is fixed.
                    let leaf_mark = dom.mark();
                    if let Some(values) =
                        complete_integers(model, &obj_coeff, &mut dom)
                    {
                        let objective = evaluate_objective(&model.objective, &obj_coeff, &values);
                        let better = incumbent
                            .as_ref()
                            .is_none_or(|(_, best)| objective < *best);
                        if better {
                            if self.log_search {
                                tracing::debug!(objective, branches, conflicts, "new incumbent");
                            }
                            incumbent = Some((values, objective));
                        }
                    }
                    dom.undo_to(leaf_mark);
                }
            }

            // Conflict, exhausted leaf, or pruned subtree: backtrack.
            conflicts += 1;
            loop {
                let Some(last) = decisions.last_mut() else {
                    break 'search;
                };
                if last.tried_second {
                    let d = decisions.pop().expect("decision stack underflow");
                    dom.undo_to(d.mark);
                    continue;
                }
                last.tried_second = true;
                let var = last.var;
                let second = 1 - last.first_value;
                let mark = last.mark;
                dom.undo_to(mark);
                if dom.assign(var, second) && propagate(&model.constraints, &mut dom) {
                    continue 'search;
                }
                conflicts += 1;
            }
        }

        let (status, solution, objective) = match (&incumbent, timed_out) {
            (Some((values, obj)), false) => (
                CpStatus::Optimal,
                Some(Solution {
                    values: values.clone(),
                }),
                *obj,
            ),
            (Some((values, obj)), true) => (
                CpStatus::Feasible,
                Some(Solution {
                    values: values.clone(),
                }),
                *obj,
            ),
            (None, false) => (CpStatus::Infeasible, None, 0),
            (None, true) => (CpStatus::Unknown, None, 0),
        };
        let best_bound = if status == CpStatus::Optimal {
            objective
        } else {
            root_bound
        };
        self.finish(
            start,
            status,
            solution,
            SearchStats {
                objective,
                best_bound,
                branches,
                conflicts,
                wall_time: start.elapsed(),
            },
        )
    }

    fn finish(
        &self,
        start: Instant,
        status: CpStatus,
        solution: Option<Solution>,
        mut stats: SearchStats,
    ) -> SolveResult {
        stats.wall_time = start.elapsed();
        if self.log_search {
            tracing::info!(
                status = status.name(),
                objective = stats.objective,
                best_bound = stats.best_bound,
                branches = stats.branches,
                conflicts = stats.conflicts,
                wall_time_ms = stats.wall_time.as_millis() as u64,
                "search finished"
            );
        }
        SolveResult {
            status,
            solution,
            stats,
        }
    }
}

// ================================================================================================
// Search helpers
// ================================================================================================

fn pick_decision_var(model: &CpModel, dom: &Domains) -> Option<u32> {
    (0..model.num_vars())
        .find(|&i| model.is_decision[i] && !dom.is_fixed(i))
        .map(|i| i as u32)
}

/// With every boolean fixed, pins the remaining integers to the bound their
/// objective coefficient prefers, re-propagating after each. The engine only
/// emits integers that are either equality-defined or one-sided, so this
/// completion is optimal for the fixed booleans; the final exact check
/// guards the general case.
fn complete_integers(model: &CpModel, obj_coeff: &[i64], dom: &mut Domains) -> Option<Vec<i64>> {
    loop {
        let Some(next) = (0..model.num_vars()).find(|&i| !dom.is_fixed(i)) else {
            break;
        };
        let value = if obj_coeff[next] < 0 {
            dom.ub[next]
        } else {
            dom.lb[next]
        };
        if !dom.assign(next as u32, value) || !propagate(&model.constraints, dom) {
            return None;
        }
    }
    if !check_all(&model.constraints, dom) {
        return None;
    }
    Some(dom.lb.clone())
}

fn objective_lower_bound(objective: &LinearExpr, obj_coeff: &[i64], dom: &Domains) -> i64 {
    let mut bound = i128::from(objective.constant);
    for (i, &c) in obj_coeff.iter().enumerate() {
        if c > 0 {
            bound += i128::from(c) * i128::from(dom.lb[i]);
        } else if c < 0 {
            bound += i128::from(c) * i128::from(dom.ub[i]);
        }
    }
    bound.clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64
}

fn evaluate_objective(objective: &LinearExpr, obj_coeff: &[i64], values: &[i64]) -> i64 {
    let mut total = i128::from(objective.constant);
    for (i, &c) in obj_coeff.iter().enumerate() {
        if c != 0 {
            total += i128::from(c) * i128::from(values[i]);
        }
    }
    total.clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::model::LinearExpr;

    fn solver() -> CpSolver {
        CpSolver {
            time_limit: Duration::from_secs(10),
            num_workers: 1,
            log_search: false,
        }
    }

    #[test]
    fn minimizes_a_weighted_choice() {
        let mut m = CpModel::new();
        let a = m.new_bool_var();
        let b = m.new_bool_var();
        let c = m.new_bool_var();
        m.add_exactly_one(&[a, b, c]);
        let mut obj = LinearExpr::new();
        obj.add_bool(a, 5);
        obj.add_bool(b, 2);
        obj.add_bool(c, 9);
        m.add_objective_term(obj, 1);

        let result = solver().solve(&m);
        assert_eq!(result.status, CpStatus::Optimal);
        assert_eq!(result.stats.objective, 2);
        let solution = result.solution.unwrap();
        assert!(solution.boolean(b));
        assert!(!solution.boolean(a));
    }

    #[test]
    fn reports_infeasible_contradiction() {
        let mut m = CpModel::new();
        let a = m.new_bool_var();
        let expr = LinearExpr::sum_bools([a]);
        m.add_ge(expr.clone(), 1);
        m.add_le(expr, 0);
        let result = solver().solve(&m);
        assert_eq!(result.status, CpStatus::Infeasible);
        assert!(result.solution.is_none());
    }

    #[test]
    fn equality_defined_integer_tracks_booleans() {
        let mut m = CpModel::new();
        let a = m.new_bool_var();
        let b = m.new_bool_var();
        let total = m.new_int_var(0, 2);
        let mut link = LinearExpr::sum_bools([a, b]);
        link.add_int(total, -1);
        m.add_eq(link, 0);
        m.add_ge(LinearExpr::sum_bools([a, b]), 1);
        let mut obj = LinearExpr::new();
        obj.add_int(total, 3);
        m.add_objective_term(obj, 1);

        let result = solver().solve(&m);
        assert_eq!(result.status, CpStatus::Optimal);
        assert_eq!(result.stats.objective, 3);
        assert_eq!(result.stats.best_bound, 3);
    }

    #[test]
    fn negative_weights_reward_activation() {
        let mut m = CpModel::new();
        let a = m.new_bool_var();
        let mut obj = LinearExpr::new();
        obj.add_bool(a, 1);
        m.add_objective_term(obj, -4);
        let result = solver().solve(&m);
        assert_eq!(result.status, CpStatus::Optimal);
        assert_eq!(result.stats.objective, -4);
        assert!(result.solution.unwrap().boolean(a));
    }

    #[test]
    fn one_sided_slack_settles_at_its_floor() {
        let mut m = CpModel::new();
        let a = m.new_bool_var();
        let slack = m.new_int_var(0, 10);
        // slack >= 3 - 2a, minimize slack: a flips on, slack bottoms at 1.
        let mut expr = LinearExpr::new();
        expr.add_int(slack, 1);
        expr.add_bool(a, 2);
        m.add_ge(expr, 3);
        let mut obj = LinearExpr::new();
        obj.add_int(slack, 1);
        m.add_objective_term(obj, 1);

        let result = solver().solve(&m);
        assert_eq!(result.status, CpStatus::Optimal);
        assert_eq!(result.stats.objective, 1);
    }

    #[test]
    fn zero_time_limit_reports_unknown() {
        let mut m = CpModel::new();
        let a = m.new_bool_var();
        m.add_ge(LinearExpr::sum_bools([a]), 1);
        let solver = CpSolver {
            time_limit: Duration::ZERO,
            num_workers: 1,
            log_search: false,
        };
        let result = solver.solve(&m);
        assert_eq!(result.status, CpStatus::Unknown);
    }

    #[test]
    fn exactly_one_with_forced_literal_propagates() {
        let mut m = CpModel::new();
        let a = m.new_bool_var();
        let b = m.new_bool_var();
        m.add_exactly_one(&[a, b]);
        m.fix_bool(a, true);
        let result = solver().solve(&m);
        assert_eq!(result.status, CpStatus::Optimal);
        let solution = result.solution.unwrap();
        assert!(solution.boolean(a));
        assert!(!solution.boolean(b));
    }
}
