//! Bound and linear-inequality constraints for nonlinear programs.
//!
//! A [`Constraints`] bundle describes the feasible region
//!
//! ```text
//!   A x <= b
//!   l <= x <= u
//! ```
//!
//! where the bounds may be infinite. The bundle is immutable over a solver
//! run; [`Constraints::shift`] re-expresses it around the current iterate so
//! that a step `p` from `x` is feasible exactly when the shifted bundle
//! accepts `p` directly.

use derive_more::{Display, Error};
use faer::{Col, ColRef, Mat};
use problemo::Problem;

use crate::{E, I};

#[derive(Debug, Display, Error, PartialEq)]
pub enum ConstraintError {
    #[display("Constraint dimensions are inconsistent")]
    DimensionMismatch,

    #[display("Constraint data contains NaN or infinite entries")]
    NotFinite,

    #[display("A lower bound exceeds its upper bound")]
    BoundOrder,

    #[display("Point violates the constraints")]
    Infeasible,
}

/// Bound and linear-inequality constraints on the decision variables:
///
/// ```text
///   A x <= b
///   l <= x <= u
/// ```
#[allow(non_snake_case)]
#[derive(Debug, Clone)]
pub struct Constraints {
    /// Inequality matrix (dense, one row per constraint).
    A: Mat<E>,
    /// Right-hand side of the inequality rows.
    b: Col<E>,
    /// Lower bounds on the variables (entries may be `-inf`).
    lb: Col<E>,
    /// Upper bounds on the variables (entries may be `+inf`).
    ub: Col<E>,
}

#[allow(non_snake_case)]
impl Constraints {
    /// Creates a new constraint bundle from the inequality rows and bounds.
    pub fn new(A: Mat<E>, b: Col<E>, lb: Col<E>, ub: Col<E>) -> Self {
        Self { A, b, lb, ub }
    }

    /// Creates a bundle with no inequality rows and infinite bounds.
    pub fn unbounded(n_vars: I) -> Self {
        Self {
            A: Mat::zeros(0, n_vars),
            b: Col::zeros(0),
            lb: Col::from_fn(n_vars, |_| E::NEG_INFINITY),
            ub: Col::from_fn(n_vars, |_| E::INFINITY),
        }
    }

    /// Creates a bundle with elementwise bounds only.
    pub fn bounds(lb: Col<E>, ub: Col<E>) -> Self {
        let n_vars = lb.nrows();
        Self {
            A: Mat::zeros(0, n_vars),
            b: Col::zeros(0),
            lb,
            ub,
        }
    }

    /// Returns the number of variables (columns of `A`).
    pub fn get_n_vars(&self) -> I {
        self.A.ncols()
    }

    /// Returns the number of inequality rows of `A`.
    pub fn get_n_rows(&self) -> I {
        self.A.nrows()
    }

    pub fn get_matrix(&self) -> &Mat<E> {
        &self.A
    }

    pub fn get_rhs(&self) -> &Col<E> {
        &self.b
    }

    pub fn get_lower_bounds(&self) -> &Col<E> {
        &self.lb
    }

    pub fn get_upper_bounds(&self) -> &Col<E> {
        &self.ub
    }

    /// Feasibility predicate: `A p <= b` and `l <= p <= u`, inclusive.
    ///
    /// NaN entries fail every comparison and are reported infeasible.
    pub fn check(&self, p: ColRef<'_, E>) -> bool {
        if p.nrows() != self.get_n_vars() {
            return false;
        }

        for j in 0..p.nrows() {
            if !(p[j] >= self.lb[j] && p[j] <= self.ub[j]) {
                return false;
            }
        }

        let Ap = self.A.as_ref() * p;
        for i in 0..Ap.nrows() {
            if !(Ap[i] <= self.b[i]) {
                return false;
            }
        }

        true
    }

    /// Validates the bundle, and optionally that `theta` is feasible.
    ///
    /// Checks shape consistency, rejects NaN (and infinite entries of `A`),
    /// and requires `l <= u` elementwise. Intended as a precondition
    /// asserter before a solver run.
    pub fn validate(&self, theta: Option<ColRef<'_, E>>) -> Result<(), Problem> {
        let (m, n) = (self.A.nrows(), self.A.ncols());
        if self.b.nrows() != m || self.lb.nrows() != n || self.ub.nrows() != n {
            return Err(ConstraintError::DimensionMismatch.into());
        }

        for i in 0..m {
            if !self.b[i].is_finite() && !(self.b[i] == E::INFINITY) {
                return Err(ConstraintError::NotFinite.into());
            }
            for j in 0..n {
                if !self.A[(i, j)].is_finite() {
                    return Err(ConstraintError::NotFinite.into());
                }
            }
        }
        for j in 0..n {
            if self.lb[j].is_nan() || self.ub[j].is_nan() {
                return Err(ConstraintError::NotFinite.into());
            }
            if !(self.lb[j] <= self.ub[j]) {
                return Err(ConstraintError::BoundOrder.into());
            }
        }

        if let Some(theta) = theta {
            if theta.nrows() != n {
                return Err(ConstraintError::DimensionMismatch.into());
            }
            if !self.check(theta) {
                return Err(ConstraintError::Infeasible.into());
            }
        }

        Ok(())
    }

    /// Re-expresses the bundle around `x`: a step `p` from `x` satisfies the
    /// original constraints exactly when the shifted bundle accepts `p`.
    pub fn shift(&self, x: ColRef<'_, E>) -> Constraints {
        let Ax = self.A.as_ref() * x;
        Constraints {
            A: self.A.clone(),
            b: &self.b - &Ax,
            lb: Col::from_fn(self.lb.nrows(), |j| self.lb[j] - x[j]),
            ub: Col::from_fn(self.ub.nrows(), |j| self.ub[j] - x[j]),
        }
    }
}
