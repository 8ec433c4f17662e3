use faer::{Col, ColRef, MatRef};

use crate::E;

/// Jacobi-style diagonal preconditioner built from the Hessian model.
///
/// Returns a strictly positive vector; negative or vanishing diagonal
/// entries are floored at machine epsilon so the preconditioned residual
/// stays well defined near singular models.
pub fn hessian_precon(h: MatRef<'_, E>) -> Col<E> {
    Col::from_fn(h.nrows(), |i| h[(i, i)].abs().max(E::EPSILON))
}

/// Diagonal preconditioner built from the gradient magnitudes.
///
/// Normalizes badly scaled gradient components so the conjugate-gradient
/// residual test measures every coordinate on a comparable scale. A
/// gradient that has shrunk to rounding level still yields unit-scale
/// preconditioned residuals, which keeps the subproblem making (tiny)
/// steps right up to the termination tests instead of flat-lining early.
/// Strictly positive with the same epsilon floor as [`hessian_precon`].
pub fn gradient_precon(g: ColRef<'_, E>) -> Col<E> {
    Col::from_fn(g.nrows(), |i| g[i].abs().max(E::EPSILON))
}
