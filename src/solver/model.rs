use crate::error::ModelError;

// ================================================================================================
// Variables
// ================================================================================================

/// A 0/1 decision variable. Booleans are the only branching variables of the
/// search; integers are completed from their propagated bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoolVar(pub(crate) u32);

/// A bounded integer variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IntVar(pub(crate) u32);

impl BoolVar {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl IntVar {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

// ================================================================================================
// Linear expressions
// ================================================================================================

/// An integer linear expression `Σ coeff_i · var_i + constant`.
#[derive(Debug, Clone, Default)]
pub struct LinearExpr {
    pub(crate) terms: Vec<(u32, i64)>,
    pub(crate) constant: i64,
}

impl LinearExpr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_bool(&mut self, var: BoolVar, coeff: i64) {
        if coeff != 0 {
            self.terms.push((var.0, coeff));
        }
    }

    pub fn add_int(&mut self, var: IntVar, coeff: i64) {
        if coeff != 0 {
            self.terms.push((var.0, coeff));
        }
    }

    pub fn add_constant(&mut self, value: i64) {
        self.constant += value;
    }

    /// Unit-coefficient sum of boolean variables.
    pub fn sum_bools<I: IntoIterator<Item = BoolVar>>(vars: I) -> Self {
        let mut expr = Self::new();
        for v in vars {
            expr.add_bool(v, 1);
        }
        expr
    }

    /// Appends another expression term-by-term.
    pub fn add_expr(&mut self, other: &LinearExpr) {
        self.add_expr_scaled(other, 1);
    }

    /// Appends `scale · other`.
    pub fn add_expr_scaled(&mut self, other: &LinearExpr, scale: i64) {
        if scale == 0 {
            return;
        }
        for &(v, c) in &other.terms {
            self.terms.push((v, c * scale));
        }
        self.constant += other.constant * scale;
    }

    /// True when the expression carries no variable terms.
    pub fn is_constant(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Sorts by variable and merges duplicate terms, dropping zeros.
    fn normalized_terms(&self) -> Vec<(u32, i64)> {
        let mut terms = self.terms.clone();
        terms.sort_unstable_by_key(|(v, _)| *v);
        let mut merged: Vec<(u32, i64)> = Vec::with_capacity(terms.len());
        for (v, c) in terms {
            match merged.last_mut() {
                Some((lv, lc)) if *lv == v => *lc += c,
                _ => merged.push((v, c)),
            }
        }
        merged.retain(|(_, c)| *c != 0);
        merged
    }
}

/// Comparison operator of a linear constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Le,
    Ge,
    Eq,
}

#[derive(Debug, Clone)]
pub(crate) struct LinearConstraint {
    /// Merged variable terms; the expression constant is folded into `rhs`.
    pub(crate) terms: Vec<(u32, i64)>,
    pub(crate) op: CmpOp,
    pub(crate) rhs: i64,
}

// ================================================================================================
// Model
// ================================================================================================

/// An append-only constraint model: variables and constraints accumulate
/// monotonically and nothing is rewritten after being added.
#[derive(Debug, Default)]
pub struct CpModel {
    pub(crate) lb: Vec<i64>,
    pub(crate) ub: Vec<i64>,
    pub(crate) is_decision: Vec<bool>,
    pub(crate) constraints: Vec<LinearConstraint>,
    pub(crate) objective: LinearExpr,
    invalid: Option<ModelError>,
}

impl CpModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn num_vars(&self) -> usize {
        self.lb.len()
    }

    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    pub fn new_bool_var(&mut self) -> BoolVar {
        let id = self.push_var(0, 1, true);
        BoolVar(id)
    }

    /// A 0/1 variable the search never branches on: its value is pinned by
    /// propagation or completed from the objective direction. Use for
    /// indicator variables whose linearization is exact or one-sided.
    pub fn new_aux_bool_var(&mut self) -> BoolVar {
        let id = self.push_var(0, 1, false);
        BoolVar(id)
    }

    pub fn new_int_var(&mut self, lb: i64, ub: i64) -> IntVar {
        if lb > ub && self.invalid.is_none() {
            self.invalid = Some(ModelError::InvalidDomain {
                var: self.lb.len(),
                lb,
                ub,
            });
        }
        let id = self.push_var(lb, ub, false);
        IntVar(id)
    }

    fn push_var(&mut self, lb: i64, ub: i64, decision: bool) -> u32 {
        let id = self.lb.len() as u32;
        self.lb.push(lb);
        self.ub.push(ub);
        self.is_decision.push(decision);
        id
    }

    pub fn add_linear(&mut self, expr: LinearExpr, op: CmpOp, rhs: i64) {
        let terms = expr.normalized_terms();
        self.constraints.push(LinearConstraint {
            terms,
            op,
            rhs: rhs - expr.constant,
        });
    }

    pub fn add_le(&mut self, expr: LinearExpr, rhs: i64) {
        self.add_linear(expr, CmpOp::Le, rhs);
    }

    pub fn add_ge(&mut self, expr: LinearExpr, rhs: i64) {
        self.add_linear(expr, CmpOp::Ge, rhs);
    }

    pub fn add_eq(&mut self, expr: LinearExpr, rhs: i64) {
        self.add_linear(expr, CmpOp::Eq, rhs);
    }

    /// Exactly one of the literals is true. An empty literal set is a
    /// modeling bug and marks the model invalid.
    pub fn add_exactly_one(&mut self, vars: &[BoolVar]) {
        if vars.is_empty() {
            if self.invalid.is_none() {
                self.invalid = Some(ModelError::EmptyExactlyOne);
            }
            return;
        }
        self.add_eq(LinearExpr::sum_bools(vars.iter().copied()), 1);
    }

    /// `a == true  ⇒  b == true`, encoded as `a ≤ b`.
    pub fn add_implication(&mut self, a: BoolVar, b: BoolVar) {
        let mut expr = LinearExpr::new();
        expr.add_bool(a, 1);
        expr.add_bool(b, -1);
        self.add_le(expr, 0);
    }

    /// Pins a boolean by narrowing its domain.
    pub fn fix_bool(&mut self, var: BoolVar, value: bool) {
        let v = i64::from(value);
        let i = var.index();
        self.lb[i] = self.lb[i].max(v);
        self.ub[i] = self.ub[i].min(v);
    }

    /// Appends `weight · expr` to the minimization objective.
    pub fn add_objective_term(&mut self, expr: LinearExpr, weight: i64) {
        if weight == 0 {
            return;
        }
        for (v, c) in expr.terms {
            self.objective.terms.push((v, c * weight));
        }
        self.objective.constant += expr.constant * weight;
    }

    /// Structural validation; any failure here surfaces as `MODEL_INVALID`.
    pub fn validate(&self) -> Result<(), ModelError> {
        if let Some(err) = &self.invalid {
            return Err(err.clone());
        }
        let n = self.lb.len() as u32;
        let check_terms = |terms: &[(u32, i64)]| -> Result<(), ModelError> {
            let mut activity: i128 = 0;
            for (v, c) in terms {
                if *v >= n {
                    return Err(ModelError::UnknownVariable(*v as usize));
                }
                let i = *v as usize;
                let span = (self.lb[i].unsigned_abs().max(self.ub[i].unsigned_abs())) as i128;
                activity += (c.unsigned_abs() as i128) * span;
            }
            if activity > i128::from(i64::MAX / 4) {
                return Err(ModelError::Overflow(format!(
                    "activity bound {activity} over {} terms",
                    terms.len()
                )));
            }
            Ok(())
        };
        for c in &self.constraints {
            check_terms(&c.terms)?;
        }
        check_terms(&self.objective.normalized_terms())?;
        Ok(())
    }

    /// Merged objective coefficients indexed by variable.
    pub(crate) fn objective_coefficients(&self) -> Vec<i64> {
        let mut coeff = vec![0i64; self.num_vars()];
        for (v, c) in &self.objective.terms {
            coeff[*v as usize] += c;
        }
        coeff
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expressions_merge_duplicate_terms() {
        let mut m = CpModel::new();
        let a = m.new_bool_var();
        let mut expr = LinearExpr::new();
        expr.add_bool(a, 2);
        expr.add_bool(a, 3);
        expr.add_constant(1);
        m.add_le(expr, 11);
        let c = &m.constraints[0];
        assert_eq!(c.terms, vec![(a.0, 5)]);
        assert_eq!(c.rhs, 10);
    }

    #[test]
    fn inverted_domain_is_model_invalid() {
        let mut m = CpModel::new();
        let _ = m.new_int_var(3, 1);
        assert!(matches!(
            m.validate(),
            Err(ModelError::InvalidDomain { lb: 3, ub: 1, .. })
        ));
    }

    #[test]
    fn empty_exactly_one_is_model_invalid() {
        let mut m = CpModel::new();
        m.add_exactly_one(&[]);
        assert!(matches!(m.validate(), Err(ModelError::EmptyExactlyOne)));
    }
}
