use serde::{Deserialize, Serialize};

use crate::{E, I};

/// Cadence of forced Hessian recomputation.
///
/// The Hessian model is refreshed lazily; this controls how many iterations
/// a stale model may survive before it is rebuilt at the current iterate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Shaking {
    /// Refresh after as many iterations as the problem has variables.
    Auto,
    /// Refresh after a fixed number of iterations.
    Fixed(I),
}

/// When the user gradient is cross-checked against finite differences of the
/// objective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GradientCheckSchedule {
    /// Check at every gradient evaluation.
    Always,
    /// Check once, before the first iteration.
    InitialOnly,
    /// Disable the check entirely.
    Never,
}

/// Options for the trust-region solver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustRegionOptions {
    /// Hard iteration cap.
    pub max_iter: I,
    /// Initial trust-region radius.
    pub init_delta: E,
    /// Termination threshold on the step norm and on the radius.
    pub tol_step: E,
    /// Convergence threshold on the gradient infinity norm.
    pub tol_grad: E,
    /// Objective decreases below this count as a stall.
    pub abstol_fval: Option<E>,
    /// Consecutive stalls that trigger successful termination.
    pub max_stall_iter: Option<I>,
    /// Cadence of forced Hessian recomputation.
    pub shaking: Shaking,
    /// Distance within which a bound counts as active for the gradient
    /// estimator.
    pub border_abstol: E,
    /// Relative tolerance of the gradient cross-check.
    pub check_rel: E,
    /// Absolute tolerance of the gradient cross-check.
    pub check_abs: Option<E>,
    /// Schedule of the gradient cross-check.
    pub check_iter: GradientCheckSchedule,
    /// Whether the output callback is invoked.
    pub display: bool,
}

impl TrustRegionOptions {
    pub fn new(max_iter: I) -> Self {
        Self {
            max_iter,
            init_delta: 1.0,
            tol_step: 1.0e-10,
            tol_grad: 1.0e-6,
            abstol_fval: None,
            max_stall_iter: None,
            shaking: Shaking::Auto,
            border_abstol: 1.0e-10,
            check_rel: 1.0e-2,
            check_abs: None,
            check_iter: GradientCheckSchedule::Always,
            display: true,
        }
    }

    pub fn with_init_delta(mut self, init_delta: E) -> Self {
        self.init_delta = init_delta;
        self
    }

    pub fn with_tol_step(mut self, tol_step: E) -> Self {
        self.tol_step = tol_step;
        self
    }

    pub fn with_tol_grad(mut self, tol_grad: E) -> Self {
        self.tol_grad = tol_grad;
        self
    }

    pub fn with_stall_detection(mut self, abstol_fval: E, max_stall_iter: I) -> Self {
        self.abstol_fval = Some(abstol_fval);
        self.max_stall_iter = Some(max_stall_iter);
        self
    }

    pub fn with_shaking(mut self, shaking: Shaking) -> Self {
        self.shaking = shaking;
        self
    }

    pub fn with_gradient_check(
        mut self,
        check_rel: E,
        check_abs: Option<E>,
        check_iter: GradientCheckSchedule,
    ) -> Self {
        self.check_rel = check_rel;
        self.check_abs = check_abs;
        self.check_iter = check_iter;
        self
    }

    pub fn with_display(mut self, display: bool) -> Self {
        self.display = display;
        self
    }
}
