//! # Trust-Region Method for Constrained Nonlinear Programming
//!
//! This module implements a trust-region method for problems of the form:
//!
//! ```text
//!   min  f(x)
//!   s.t. A x <= b
//!        l <= x <= u
//! ```
//!
//! At each iterate a quadratic model of the objective is minimized over the
//! intersection of the trust region and the feasible set by a preconditioned
//! conjugate-gradient method ([`pcg`]) with explicit handling of negative
//! curvature, the trust-region boundary, and constraint violation. The
//! radius adapts to the ratio of actual to predicted reduction.
//!
//! The Hessian model is built by finite differences of the user gradient
//! and is expensive, so it is refreshed lazily: acceptance of a step marks
//! the model stale, and it is rebuilt when the subproblem fails, when the
//! reduction ratio turns suspicious, or after a configured number of
//! iterations ([`options::Shaking`]). Convergence and stall terminations
//! are only ever declared on a model built at the current iterate.
//!
//! The algorithmic design follows the classical trust-region framework
//! described in:
//!
//! > J. Nocedal and S. J. Wright, "Numerical Optimization", 2nd ed.,
//! > Springer, 2006, chapters 4 and 7.

pub mod derivatives;
pub mod options;
pub mod pcg;
pub mod policies;
pub mod precondition;

use faer::Mat;
use problemo::Problem;

use crate::{E, Solver, SolverHooks, SolverState, Status, nlp::NonlinearProgram};

use derivatives::{GradientCheck, make_gradient, make_hessian};
use options::{Shaking, TrustRegionOptions};
use pcg::PcgFlag;

/// Trust-region solver for nonlinear programs with bound and
/// linear-inequality constraints.
///
/// The starting point supplied through the [`SolverState`] must be feasible.
/// Every iterate visited afterwards, including the one left in the state at
/// termination, is feasible as well.
pub struct TrustRegion<'a> {
    nlp: &'a NonlinearProgram,
    options: TrustRegionOptions,
}

impl<'a> TrustRegion<'a> {
    /// Creates a new trust-region solver for the given nonlinear program.
    pub fn new(nlp: &'a NonlinearProgram, options: TrustRegionOptions) -> Self {
        Self { nlp, options }
    }

    /// Rebuilds the Hessian model at the current iterate.
    ///
    /// Callers clear the refresh counter themselves; the failed-subproblem
    /// path deliberately keeps it, so a stale model that produced no step
    /// is refreshed again soon.
    fn refresh_hessian(&self, state: &mut SolverState) -> Mat<E> {
        debug_assert!(!state.hessian_fresh);
        let h = make_hessian(self.nlp, &state.x);
        state.hessian_fresh = true;
        state.h = Some(h.clone());
        h
    }
}

impl Solver for TrustRegion<'_> {
    fn solve(
        &mut self,
        state: &mut SolverState,
        hooks: &mut SolverHooks,
    ) -> Result<Status, Problem> {
        let nlp = self.nlp;
        let opts = &self.options;
        let constraints = nlp.get_constraints();
        let n = nlp.get_n_vars();

        constraints.validate(Some(state.x.as_ref()))?;

        let hessian_shaking = match opts.shaking {
            Shaking::Auto => n,
            Shaking::Fixed(k) => k,
        };

        state.status = Status::InProgress;
        state.nit = 0;
        state.delta = opts.init_delta;
        state.pcg = None;
        state.hessian_fresh = false;
        state.hessian_age = 0;

        let mut fval = nlp.f(&state.x);
        let mut grad = make_gradient(
            nlp,
            &state.x,
            opts,
            &GradientCheck {
                iter: 0,
                init_grad_infnorm: 0.0,
            },
        )?;
        let mut shifted = constraints.shift(state.x.as_ref());
        let mut h = self.refresh_hessian(state);

        state.f = Some(fval);
        state.df = Some(grad.clone());

        let init_grad_infnorm = grad.infnorm;
        let mut old_fval = fval;
        let mut stall_iter = 0;

        if opts.display {
            hooks.callback.init(state);
            hooks.callback.call(state);
        }

        loop {
            // Failure cutoffs come first: the no-step path below skips the
            // rest of the loop body.
            if state.delta < opts.tol_step {
                state.status = Status::RadiusTooSmall;
                return Ok(state.status);
            }
            if state.nit > opts.max_iter {
                state.status = Status::IterationLimit;
                return Ok(state.status);
            }

            // The model is overdue for a rebuild.
            if state.hessian_age >= hessian_shaking && !state.hessian_fresh {
                h = self.refresh_hessian(state);
                state.hessian_age = 0;
            }

            let status = pcg::pcg(grad.value.as_ref(), h.as_ref(), &shifted, state.delta);
            state.nit += 1;
            state.hessian_age += 1;
            state.pcg = Some(status.clone());

            let Some(step) = &status.step else {
                if state.hessian_fresh {
                    state.delta /= 4.0;
                } else {
                    // The refresh counter is deliberately not cleared here.
                    h = self.refresh_hessian(state);
                }
                if opts.display {
                    hooks.callback.call(state);
                }
                continue;
            };

            let new_x = &state.x + &step.p;
            let new_fval = nlp.f(&new_x);

            // Ratio of actual to predicted reduction, clamped to [0, 1].
            let reduce = new_fval - fval;
            let ratio = if reduce >= 0.0 {
                0.0
            } else if reduce <= step.fval {
                1.0
            } else {
                reduce / step.fval
            };

            if ratio >= 0.75 && step.size >= 0.9 * state.delta {
                state.delta *= 2.0;
            } else if ratio <= 0.25 {
                if state.hessian_fresh {
                    state.delta = step.size / 4.0;
                } else {
                    h = self.refresh_hessian(state);
                    state.hessian_age = 0;
                }
            }

            if new_fval < fval {
                state.x = new_x;
                fval = new_fval;
                state.f = Some(fval);
                state.hessian_fresh = false;

                grad = make_gradient(
                    nlp,
                    &state.x,
                    opts,
                    &GradientCheck {
                        iter: state.nit,
                        init_grad_infnorm,
                    },
                )?;
                shifted = constraints.shift(state.x.as_ref());
                state.df = Some(grad.clone());

                if opts.abstol_fval.is_some_and(|abstol| old_fval - fval < abstol) {
                    stall_iter += 1;
                } else {
                    old_fval = fval;
                    stall_iter = 0;
                }
            }

            if opts.display {
                hooks.callback.call(state);
            }

            // Convergence is only declared on a model built at the current
            // iterate; a stale model is rebuilt instead.
            if status.flag == PcgFlag::ResidualConvergence {
                if state.hessian_fresh {
                    if grad.infnorm < opts.tol_grad || step.size < opts.tol_step {
                        state.status = Status::Optimal;
                        return Ok(state.status);
                    }
                } else {
                    h = self.refresh_hessian(state);
                    state.hessian_age = 0;
                }
            }

            if opts.max_stall_iter.is_some_and(|max_stall| stall_iter >= max_stall) {
                if state.hessian_fresh {
                    state.status = Status::Stalled;
                    return Ok(state.status);
                }
                h = self.refresh_hessian(state);
                state.hessian_age = 0;
            }
        }
    }
}
