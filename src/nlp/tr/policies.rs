use faer::{Col, ColRef};

use crate::{E, linalg::vector_ops::col_dot, linneq::Constraints};

use super::pcg::PcgFlag;

/// Relative backoff applied to the step-to-boundary so the returned point
/// stays strictly feasible under floating-point rounding.
const BACKOFF: E = 1.0 - 1.0e-12;

/// Walks from `origin` along `direction` to the first active boundary — the
/// trust-region sphere of radius `delta` or a constraint face — and returns
/// the feasible intersection point together with the flag, passed through.
///
/// `origin` must be feasible and inside the sphere. Returns `None` when the
/// walk is degenerate: a vanishing direction, a boundary already at the
/// origin, or a point that stays infeasible after backoff.
pub fn subspace_decay(
    origin: ColRef<'_, E>,
    direction: ColRef<'_, E>,
    delta: E,
    constraints: &Constraints,
    flag: PcgFlag,
) -> (Option<Col<E>>, PcgFlag) {
    let n = origin.nrows();

    let dnorm = direction.norm_l2();
    if !dnorm.is_finite() || dnorm <= E::EPSILON {
        return (None, flag);
    }

    // Positive root of |origin + t d| = delta.
    let a = col_dot(direction, direction);
    let b = col_dot(origin, direction);
    let c = col_dot(origin, origin) - delta * delta;
    let disc = (b * b - a * c).max(0.0);
    let mut t = (-b + disc.sqrt()) / a;

    // First inequality face along the ray.
    let a_dir = constraints.get_matrix().as_ref() * direction;
    let a_origin = constraints.get_matrix().as_ref() * origin;
    let rhs = constraints.get_rhs();
    for i in 0..a_dir.nrows() {
        if a_dir[i] > 0.0 {
            t = t.min((rhs[i] - a_origin[i]) / a_dir[i]);
        }
    }

    // First bound face along the ray.
    let lb = constraints.get_lower_bounds();
    let ub = constraints.get_upper_bounds();
    for j in 0..n {
        if direction[j] > 0.0 {
            t = t.min((ub[j] - origin[j]) / direction[j]);
        } else if direction[j] < 0.0 {
            t = t.min((lb[j] - origin[j]) / direction[j]);
        }
    }

    if !t.is_finite() || t <= 0.0 {
        return (None, flag);
    }

    // Decay the step until rounding no longer pushes the point out.
    t *= BACKOFF;
    for _ in 0..8 {
        let p = Col::from_fn(n, |j| origin[j] + t * direction[j]);
        if constraints.check(p.as_ref()) {
            return (Some(p), flag);
        }
        t *= BACKOFF;
    }

    (None, flag)
}
