pub mod tr;

use faer::Col;

use crate::{E, I, linneq::Constraints};

/// A nonlinear program of the form:
///
/// ```text
///   min  f(x)
///   s.t. A x <= b
///        l <= x <= u
/// ```
///
/// where `f` is the objective function and `df` its gradient, both supplied
/// by the caller. The constraint bundle is owned by the program and held
/// fixed over a solver run.
pub struct NonlinearProgram {
    /// Number of decision variables.
    n_var: I,

    /// Objective function `f(x) -> scalar`.
    f: Box<dyn Fn(&Col<E>) -> E>,
    /// Gradient of the objective `∇f(x)`.
    df: Box<dyn Fn(&Col<E>) -> Col<E>>,

    /// Bound and linear-inequality constraints.
    constraints: Constraints,
}

impl NonlinearProgram {
    /// Creates a new nonlinear program from its component functions and
    /// constraints.
    pub fn new(
        n_var: I,
        f: impl Fn(&Col<E>) -> E + 'static,
        df: impl Fn(&Col<E>) -> Col<E> + 'static,
        constraints: Constraints,
    ) -> Self {
        Self {
            n_var,
            f: Box::new(f),
            df: Box::new(df),
            constraints,
        }
    }

    /// Creates an unconstrained program (infinite bounds, no rows).
    pub fn unconstrained(
        n_var: I,
        f: impl Fn(&Col<E>) -> E + 'static,
        df: impl Fn(&Col<E>) -> Col<E> + 'static,
    ) -> Self {
        let constraints = Constraints::unbounded(n_var);
        Self::new(n_var, f, df, constraints)
    }

    pub fn f(&self, x: &Col<E>) -> E {
        (self.f)(x)
    }

    pub fn df(&self, x: &Col<E>) -> Col<E> {
        (self.df)(x)
    }

    pub fn get_n_vars(&self) -> I {
        self.n_var
    }

    pub fn get_constraints(&self) -> &Constraints {
        &self.constraints
    }
}
