//! Gradient and Hessian estimation for the trust-region solver.
//!
//! The user supplies an analytic gradient; this module wraps it into a
//! [`Gradient`] bundle, optionally cross-checks it against finite
//! differences of the objective, and projects it onto the feasible
//! directions at active bounds. The Hessian model is built by central
//! differences of the user gradient with bound-clamped steps.

use derive_more::{Display, Error};
use faer::{Col, Mat};
use problemo::Problem;

use crate::{
    E, I,
    linalg::vector_ops::cwise_abs_max,
    nlp::NonlinearProgram,
};

use super::options::{GradientCheckSchedule, TrustRegionOptions};

#[derive(Debug, Display, Error, PartialEq)]
pub enum DerivativeError {
    #[display(
        "User gradient component {index} is {analytic:.6e} but finite differences give {estimated:.6e}"
    )]
    GradientMismatch {
        index: I,
        analytic: E,
        estimated: E,
    },
}

/// Projected gradient bundle: the gradient capped against the bounds, and
/// its infinity norm.
///
/// The value is `(x - clip(x - 2g, l, u)) / 2`: for components whose double
/// gradient step stays inside the box this is the user gradient unchanged
/// (up to rounding), while a component heading across a bound is capped at
/// half the distance to it. The norm vanishes exactly when no feasible
/// descent direction remains, and a full model step along the value always
/// lands strictly inside the box.
#[derive(Debug, Clone)]
pub struct Gradient {
    pub(crate) value: Col<E>,
    pub(crate) infnorm: E,
}

impl Gradient {
    pub fn get_value(&self) -> &Col<E> {
        &self.value
    }

    pub fn get_infnorm(&self) -> E {
        self.infnorm
    }
}

/// Context threaded into [`make_gradient`] for the cross-check schedule and
/// its tolerance scaling.
pub struct GradientCheck {
    /// Current outer iteration.
    pub iter: I,
    /// Gradient infinity norm captured at iteration 0; zero before the
    /// first evaluation.
    pub init_grad_infnorm: E,
}

/// Feasible central-difference interval around `x[i]`, clamped to the
/// bounds.
fn difference_interval(nlp: &NonlinearProgram, x: &Col<E>, i: I) -> (E, E) {
    let constr = nlp.get_constraints();
    let step = E::EPSILON.sqrt() * x[i].abs().max(1.0);
    let upper = (x[i] + step).min(constr.get_upper_bounds()[i]);
    let lower = (x[i] - step).max(constr.get_lower_bounds()[i]);
    (lower, upper)
}

/// Central-difference gradient of the objective with bound-clamped steps.
fn objective_gradient(nlp: &NonlinearProgram, x: &Col<E>) -> Col<E> {
    let n = x.nrows();
    let mut estimate = Col::<E>::zeros(n);
    let mut trial = x.clone();

    for i in 0..n {
        let (lower, upper) = difference_interval(nlp, x, i);
        if upper <= lower {
            continue;
        }

        trial[i] = upper;
        let f_upper = nlp.f(&trial);
        trial[i] = lower;
        let f_lower = nlp.f(&trial);
        trial[i] = x[i];

        estimate[i] = (f_upper - f_lower) / (upper - lower);
    }

    estimate
}

/// Builds the gradient bundle at `x`.
///
/// Runs the finite-difference cross-check when the schedule asks for it,
/// then caps components against the bounds. The check tolerance scales with
/// the larger of the initial gradient norm and the estimate's own norm, so
/// a gradient that has shrunk by orders of magnitude does not trip the
/// check on finite-difference noise.
pub fn make_gradient(
    nlp: &NonlinearProgram,
    x: &Col<E>,
    opts: &TrustRegionOptions,
    check: &GradientCheck,
) -> Result<Gradient, Problem> {
    let raw = nlp.df(x);

    let run_check = match opts.check_iter {
        GradientCheckSchedule::Always => true,
        GradientCheckSchedule::InitialOnly => check.iter == 0,
        GradientCheckSchedule::Never => false,
    };
    if run_check {
        let estimate = objective_gradient(nlp, x);
        let scale = check
            .init_grad_infnorm
            .max(cwise_abs_max(estimate.as_ref()));
        let mut tol = opts.check_rel * scale;
        if let Some(abs) = opts.check_abs {
            tol = tol.max(abs);
        }

        for i in 0..x.nrows() {
            // Collapsed difference intervals carry no information.
            let (lower, upper) = difference_interval(nlp, x, i);
            if upper - lower < opts.border_abstol {
                continue;
            }
            if (raw[i] - estimate[i]).abs() > tol {
                return Err(DerivativeError::GradientMismatch {
                    index: i,
                    analytic: raw[i],
                    estimated: estimate[i],
                }
                .into());
            }
        }
    }

    let constr = nlp.get_constraints();
    let (lb, ub) = (constr.get_lower_bounds(), constr.get_upper_bounds());
    let value = Col::from_fn(x.nrows(), |i| {
        0.5 * (x[i] - (x[i] - 2.0 * raw[i]).clamp(lb[i], ub[i]))
    });
    let infnorm = cwise_abs_max(value.as_ref());

    Ok(Gradient { value, infnorm })
}

/// Central-difference Hessian of the user gradient, symmetrized.
///
/// Steps are clamped to the bounds so the gradient is only evaluated at
/// feasible points. Costs two gradient evaluations per variable.
pub fn make_hessian(nlp: &NonlinearProgram, x: &Col<E>) -> Mat<E> {
    let n = x.nrows();
    let mut h = Mat::<E>::zeros(n, n);
    let mut trial = x.clone();

    for i in 0..n {
        let (lower, upper) = difference_interval(nlp, x, i);
        if upper <= lower {
            continue;
        }

        trial[i] = upper;
        let df_upper = nlp.df(&trial);
        trial[i] = lower;
        let df_lower = nlp.df(&trial);
        trial[i] = x[i];

        let weight = 1.0 / (upper - lower);
        for j in 0..n {
            h[(i, j)] = (df_upper[j] - df_lower[j]) * weight;
        }
    }

    // Symmetrize.
    for i in 0..n {
        for j in 0..i {
            let value = 0.5 * (h[(i, j)] + h[(j, i)]);
            h[(i, j)] = value;
            h[(j, i)] = value;
        }
    }

    h
}
