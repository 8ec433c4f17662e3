use faer::{Col, Mat};
use problemo::Problem;

pub mod callback;
pub mod linalg;
pub mod linneq;
pub mod nlp;

#[cfg(test)]
pub mod tests;

pub use crate::nlp::tr::derivatives::Gradient;
pub use crate::nlp::tr::pcg::{PcgFlag, PcgStatus};

pub type E = f64;
pub type I = usize;

/// Status codes for optimization solvers.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub enum Status {
    #[default]
    /// The solver is still running.
    InProgress,
    /// An optimal solution was found: the gradient infinity norm or the
    /// proposed step fell below tolerance with a current Hessian model.
    Optimal,
    /// The objective decrease stayed below `abstol_fval` for
    /// `max_stall_iter` consecutive accepted iterations.
    Stalled,
    /// The trust-region radius collapsed below `tol_step` without meeting a
    /// convergence criterion.
    RadiusTooSmall,
    /// The solver stopped due to an iteration limit.
    IterationLimit,
}

impl Status {
    /// Whether the termination leaves the iterate at a point accepted as a
    /// solution (`Optimal` or `Stalled`).
    pub fn is_success(&self) -> bool {
        matches!(self, Status::Optimal | Status::Stalled)
    }
}

/// Trait for iterative optimization solvers.
///
/// Provides a standard interface for algorithms that proceed by repeated
/// iteration, such as trust-region or gradient-based methods.
pub trait Solver {
    /// Run the solver until convergence or maximum iterations.
    fn solve(
        &mut self,
        state: &mut SolverState,
        hooks: &mut SolverHooks,
    ) -> Result<Status, Problem>;
}

/// Mutable iterate state threaded through a solver run.
///
/// The solver owns and updates this state; callbacks observe it read-only
/// through the accessors. Feasibility of `x` and agreement of `f`/`df` with
/// `x` are maintained by the solver between callback invocations.
#[derive(Debug, Clone)]
pub struct SolverState {
    pub(crate) status: Status,
    pub(crate) nit: I,

    pub(crate) x: Col<E>,

    /// Objective value at `x`.
    pub(crate) f: Option<E>,
    /// Gradient bundle at `x`.
    pub(crate) df: Option<Gradient>,
    /// Current Hessian model (dense, symmetric).
    pub(crate) h: Option<Mat<E>>,

    /// Trust-region radius.
    pub(crate) delta: E,
    /// Outcome of the last subproblem solve.
    pub(crate) pcg: Option<PcgStatus>,

    /// Whether `h` was computed at the current `x`.
    pub(crate) hessian_fresh: bool,
    /// Iterations since the last Hessian recomputation.
    pub(crate) hessian_age: I,
}

impl SolverState {
    pub fn new(x: Col<E>) -> Self {
        Self {
            status: Status::InProgress,
            nit: 0,

            x,

            f: None,
            df: None,
            h: None,

            delta: 0.,
            pcg: None,

            hessian_fresh: false,
            hessian_age: 0,
        }
    }

    pub fn get_status(&self) -> Status {
        self.status
    }

    pub fn get_nit(&self) -> I {
        self.nit
    }

    pub fn get_primal(&self) -> &Col<E> {
        &self.x
    }

    pub fn get_objective(&self) -> Option<E> {
        self.f
    }

    pub fn get_gradient(&self) -> Option<&Gradient> {
        self.df.as_ref()
    }

    pub fn get_hessian(&self) -> Option<&Mat<E>> {
        self.h.as_ref()
    }

    pub fn get_delta(&self) -> E {
        self.delta
    }

    pub fn get_pcg(&self) -> Option<&PcgStatus> {
        self.pcg.as_ref()
    }

    pub fn hessian_is_fresh(&self) -> bool {
        self.hessian_fresh
    }

    pub fn get_hessian_age(&self) -> I {
        self.hessian_age
    }
}

/// Caller-supplied hooks observing a solver run.
pub struct SolverHooks {
    pub(crate) callback: Box<dyn crate::callback::Callback>,
}

impl SolverHooks {
    pub fn new(callback: Box<dyn crate::callback::Callback>) -> Self {
        Self { callback }
    }
}

impl Default for SolverHooks {
    fn default() -> Self {
        Self {
            callback: Box::new(crate::callback::NoOpCallback {}),
        }
    }
}
