//! Preconditioned conjugate-gradient solver for the trust-region
//! subproblem:
//!
//! ```text
//!   min  g'p + p'Hp/2
//!   s.t. |p| <= delta
//!        A p <= b,  l <= p <= u   (constraints shifted to the iterate)
//! ```
//!
//! The conjugate-gradient recursion runs until the preconditioned residual
//! is flat, a direction of non-positive curvature shows up, or a trial point
//! leaves the trust region or the feasible set. Early exits report the last
//! accepted interior point together with the offending direction, which the
//! policy layer extends to the boundary. Each subproblem is solved under two
//! diagonal preconditioners and the better model value wins.

use faer::{Col, ColRef, MatRef};

use crate::{
    E, I,
    linalg::vector_ops::{col_dot, cwise_abs_max, cwise_neg, cwise_quotient, is_col_positive},
    linneq::Constraints,
};

use super::{
    policies::subspace_decay,
    precondition::{gradient_precon, hessian_precon},
};

/// Exit condition of a conjugate-gradient run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PcgFlag {
    /// Preconditioned residual below tolerance.
    ResidualConvergence,
    /// A direction of non-positive curvature was encountered.
    NegativeCurvature,
    /// A trial point would leave the trust region.
    OutOfTrustRegion,
    /// A trial point would violate the shifted constraints.
    ViolateConstraints,
    /// Step produced by the pure-gradient boundary probe.
    PolicyOnly,
}

/// A candidate step with its quadratic model value and cached norm.
#[derive(Debug, Clone)]
pub(crate) struct PcgStep {
    pub(crate) p: Col<E>,
    pub(crate) fval: E,
    pub(crate) size: E,
}

/// Outcome of a subproblem solve: an optional step, the iteration at which
/// the conjugate-gradient run exited, and its exit flag.
#[derive(Debug, Clone)]
pub struct PcgStatus {
    pub(crate) step: Option<PcgStep>,
    pub(crate) iter: I,
    pub(crate) flag: PcgFlag,
}

impl PcgStatus {
    fn new(step: Option<(Col<E>, E)>, iter: I, flag: PcgFlag) -> Self {
        let step = step.map(|(p, fval)| {
            let size = p.norm_l2();
            PcgStep { p, fval, size }
        });
        Self { step, iter, flag }
    }

    /// The proposed step, if any.
    pub fn get_step(&self) -> Option<&Col<E>> {
        self.step.as_ref().map(|step| &step.p)
    }

    /// Quadratic model value of the step.
    pub fn get_fval(&self) -> Option<E> {
        self.step.as_ref().map(|step| step.fval)
    }

    /// Euclidean norm of the step.
    pub fn get_size(&self) -> Option<E> {
        self.step.as_ref().map(|step| step.size)
    }

    pub fn get_iter(&self) -> I {
        self.iter
    }

    pub fn get_flag(&self) -> PcgFlag {
        self.flag
    }
}

/// Quadratic model of the objective change: `g'p + p'Hp/2`.
fn model_value(g: ColRef<'_, E>, h: MatRef<'_, E>, p: &Col<E>) -> E {
    let hp = h * p.as_ref();
    col_dot(g, p.as_ref()) + 0.5 * col_dot(p.as_ref(), hp.as_ref())
}

/// State of a conjugate-gradient run at exit.
struct CgExit {
    /// Last accepted point: interior, feasible.
    p: Col<E>,
    /// Search direction at exit; absent on residual convergence.
    direct: Option<Col<E>>,
    iter: I,
    flag: PcgFlag,
}

/// The preconditioned conjugate-gradient recursion.
///
/// `r_diag` is the diagonal preconditioner (strictly positive). The
/// recursion never steps outside the trust region or the feasible set; an
/// offending trial point is abandoned and the direction that produced it is
/// handed back to the caller.
fn conjugate_gradient(
    g: ColRef<'_, E>,
    h: MatRef<'_, E>,
    r_diag: ColRef<'_, E>,
    constraints: &Constraints,
    delta: E,
) -> CgExit {
    debug_assert!(is_col_positive(r_diag));

    let n = g.nrows();
    let tol = E::EPSILON.sqrt();

    let mut p = Col::<E>::zeros(n);
    let mut r = cwise_neg(g);
    let mut z = cwise_quotient(r.as_ref(), r_diag);
    let mut direct = z.clone();

    let mut inner1 = col_dot(r.as_ref(), z.as_ref());

    for iter in 0..n {
        // Preconditioned residual is flat.
        if cwise_abs_max(z.as_ref()) < tol {
            return CgExit {
                p,
                direct: None,
                iter,
                flag: PcgFlag::ResidualConvergence,
            };
        }

        // Curvature along the search direction.
        let ww = h * direct.as_ref();
        let denom = col_dot(direct.as_ref(), ww.as_ref());
        if denom <= 0.0 {
            return CgExit {
                p,
                direct: Some(direct),
                iter,
                flag: PcgFlag::NegativeCurvature,
            };
        }

        // Trial point.
        let alpha = inner1 / denom;
        let pnew = &p + alpha * &direct;

        if pnew.norm_l2() > delta {
            return CgExit {
                p,
                direct: Some(direct),
                iter,
                flag: PcgFlag::OutOfTrustRegion,
            };
        }

        if !constraints.check(pnew.as_ref()) {
            return CgExit {
                p,
                direct: Some(direct),
                iter,
                flag: PcgFlag::ViolateConstraints,
            };
        }

        p = pnew;

        // Residual and direction updates.
        r -= alpha * &ww;
        z = cwise_quotient(r.as_ref(), r_diag);

        let inner2 = inner1;
        inner1 = col_dot(r.as_ref(), z.as_ref());
        let beta = inner1 / inner2;
        direct = &z + beta * &direct;
    }

    CgExit {
        p,
        direct: None,
        iter: n,
        flag: PcgFlag::ResidualConvergence,
    }
}

/// Assembles up to three candidate steps under one preconditioner and keeps
/// the best by model value, breaking ties toward the shorter step:
/// a pure-gradient boundary probe, the conjugate-gradient point, and — on a
/// non-convergence exit — the boundary point along the exit direction.
fn best_policy(
    g: ColRef<'_, E>,
    h: MatRef<'_, E>,
    r_diag: ColRef<'_, E>,
    constraints: &Constraints,
    delta: E,
) -> PcgStatus {
    let origin = Col::<E>::zeros(g.nrows());
    let probe_direction = cwise_neg(cwise_quotient(g, r_diag).as_ref());
    let (p0, exit0) = subspace_decay(
        origin.as_ref(),
        probe_direction.as_ref(),
        delta,
        constraints,
        PcgFlag::PolicyOnly,
    );

    let CgExit {
        p: mut p1,
        direct,
        iter,
        flag: mut exit1,
    } = conjugate_gradient(g, h, r_diag, constraints, delta);
    let mut fval1 = model_value(g, h, &p1);

    if let Some(direct) = direct {
        let (p2, exit2) = subspace_decay(p1.as_ref(), direct.as_ref(), delta, constraints, exit1);
        if let Some(p2) = p2 {
            let fval2 = model_value(g, h, &p2);
            if fval2 < fval1 || (fval2 == fval1 && p2.norm_l2() < p1.norm_l2()) {
                (p1, fval1, exit1) = (p2, fval2, exit2);
            }
        }
    }

    if let Some(p0) = p0 {
        let fval0 = model_value(g, h, &p0);
        if fval0 < fval1 || (fval0 == fval1 && p0.norm_l2() < p1.norm_l2()) {
            return PcgStatus::new(Some((p0, fval0)), 0, exit0);
        }
    }

    if (0..p1.nrows()).all(|j| p1[j] == 0.0) {
        PcgStatus::new(None, iter, exit1)
    } else {
        PcgStatus::new(Some((p1, fval1)), iter, exit1)
    }
}

/// Solves the trust-region subproblem, taking the better of a
/// Hessian-preconditioned and a gradient-preconditioned run.
///
/// The returned step, when present, is feasible for the shifted constraints
/// and no longer than `delta`. A step-less status carries the exit flag of
/// the Hessian-preconditioned run.
pub fn pcg(g: ColRef<'_, E>, h: MatRef<'_, E>, constraints: &Constraints, delta: E) -> PcgStatus {
    debug_assert!(delta > 0.0 && delta.is_finite());

    let r1 = hessian_precon(h);
    let ret1 = best_policy(g, h, r1.as_ref(), constraints, delta);
    let r2 = gradient_precon(g);
    let ret2 = best_policy(g, h, r2.as_ref(), constraints, delta);

    match (&ret1.step, &ret2.step) {
        (None, None) => ret1,
        (None, Some(_)) => ret2,
        (Some(_), None) => ret1,
        (Some(step1), Some(step2)) => {
            if step1.fval < step2.fval || (step1.fval == step2.fval && step1.size <= step2.size) {
                ret1
            } else {
                ret2
            }
        }
    }
}
