//! End-to-end scenarios for the trust-region solver.

use std::cell::RefCell;
use std::rc::Rc;

use faer::Col;
use rstest::rstest;
use rstest_reuse::{apply, template};

use crate::{
    E, PcgFlag, Solver, SolverHooks, SolverState, Status,
    callback::{Callback, ConvergenceOutput},
    linneq::Constraints,
    nlp::{
        NonlinearProgram,
        tr::{
            TrustRegion,
            options::{Shaking, TrustRegionOptions},
        },
    },
};

fn solve(
    nlp: &NonlinearProgram,
    x0: &[E],
    options: TrustRegionOptions,
) -> (Status, SolverState) {
    let mut state = SolverState::new(Col::from_fn(x0.len(), |i| x0[i]));
    let mut hooks = SolverHooks::default();
    let mut solver = TrustRegion::new(nlp, options);
    let status = solver.solve(&mut state, &mut hooks).unwrap();
    (status, state)
}

/// Records feasibility and subproblem flags at every emitted iteration.
struct RecordingCallback {
    constraints: Constraints,
    feasible: Rc<RefCell<Vec<bool>>>,
    flags: Rc<RefCell<Vec<PcgFlag>>>,
}

impl Callback for RecordingCallback {
    fn call(&mut self, state: &SolverState) {
        self.feasible
            .borrow_mut()
            .push(self.constraints.check(state.get_primal().as_ref()));
        if let Some(pcg) = state.get_pcg() {
            self.flags.borrow_mut().push(pcg.get_flag());
        }
    }
}

/// `f(x) = x'Ax/2 - b'x` with `A = diag(1, 2, 3)`, `b = (1, 1, 1)`;
/// minimizer (1, 1/2, 1/3).
fn quadratic_diag() -> NonlinearProgram {
    NonlinearProgram::unconstrained(
        3,
        |x| {
            0.5 * (x[0] * x[0] + 2.0 * x[1] * x[1] + 3.0 * x[2] * x[2]) - (x[0] + x[1] + x[2])
        },
        |x| Col::from_fn(3, |i| (i as E + 1.0) * x[i] - 1.0),
    )
}

fn rosenbrock() -> NonlinearProgram {
    NonlinearProgram::unconstrained(
        2,
        |x| (1.0 - x[0]).powi(2) + 100.0 * (x[1] - x[0] * x[0]).powi(2),
        |x| {
            Col::from_fn(2, |i| match i {
                0 => -2.0 * (1.0 - x[0]) - 400.0 * x[0] * (x[1] - x[0] * x[0]),
                _ => 200.0 * (x[1] - x[0] * x[0]),
            })
        },
    )
}

/// `f(x) = (x1-2)^2 + (x2-2)^2` boxed to `[0, 1]^2`; minimizer (1, 1) with
/// both bounds active.
fn bound_active() -> NonlinearProgram {
    NonlinearProgram::new(
        2,
        |x| (x[0] - 2.0).powi(2) + (x[1] - 2.0).powi(2),
        |x| Col::from_fn(2, |i| 2.0 * (x[i] - 2.0)),
        Constraints::bounds(Col::zeros(2), Col::from_fn(2, |_| 1.0)),
    )
}

#[template]
#[rstest]
fn shaking_cases(#[values(Shaking::Auto, Shaking::Fixed(1), Shaking::Fixed(4))] shaking: Shaking) {}

#[apply(shaking_cases)]
fn test_unconstrained_quadratic(shaking: Shaking) {
    let nlp = quadratic_diag();
    let options = TrustRegionOptions::new(100)
        .with_shaking(shaking)
        .with_display(false);

    let (status, state) = solve(&nlp, &[0.0, 0.0, 0.0], options);

    assert_eq!(status, Status::Optimal);
    assert!(status.is_success());

    let x = state.get_primal();
    assert!((x[0] - 1.0).abs() < 1e-6);
    assert!((x[1] - 0.5).abs() < 1e-6);
    assert!((x[2] - 1.0 / 3.0).abs() < 1e-6);

    let grad = state.get_gradient().unwrap();
    assert!(grad.get_infnorm() < 1e-6);

    // The reported objective agrees with a fresh evaluation.
    assert_eq!(state.get_objective().unwrap(), nlp.f(x));
}

#[apply(shaking_cases)]
fn test_rosenbrock(shaking: Shaking) {
    let nlp = rosenbrock();
    let options = TrustRegionOptions::new(500)
        .with_shaking(shaking)
        .with_display(false);

    let (status, state) = solve(&nlp, &[-1.2, 1.0], options);

    assert!(status.is_success());
    let x = state.get_primal();
    assert!((x[0] - 1.0).abs() < 1e-4);
    assert!((x[1] - 1.0).abs() < 1e-4);
}

#[test]
fn test_bound_active_minimum() {
    let nlp = bound_active();
    let options = TrustRegionOptions::new(300).with_display(false);

    let (status, state) = solve(&nlp, &[0.0, 0.0], options);

    assert!(status.is_success());
    let x = state.get_primal();
    assert!((x[0] - 1.0).abs() < 1e-6);
    assert!((x[1] - 1.0).abs() < 1e-6);
    assert!(nlp.get_constraints().check(x.as_ref()));
}

#[test]
fn test_max_iter_exceeded() {
    let nlp = rosenbrock();
    let options = TrustRegionOptions::new(1).with_display(false);

    let (status, state) = solve(&nlp, &[-1.2, 1.0], options);

    assert_eq!(status, Status::IterationLimit);
    assert!(!status.is_success());
    // The cutoff is strict, so the counter lands one past the cap.
    assert_eq!(state.get_nit(), 2);
}

#[test]
fn test_saddle_negative_curvature() {
    // A saddle with an indefinite Hessian; the minimum over the box sits on
    // the boundary.
    let nlp = NonlinearProgram::new(
        2,
        |x| x[0] * x[0] - x[1] * x[1],
        |x| Col::from_fn(2, |i| if i == 0 { 2.0 * x[0] } else { -2.0 * x[1] }),
        Constraints::bounds(Col::from_fn(2, |_| -1.0), Col::from_fn(2, |_| 1.0)),
    );
    let options = TrustRegionOptions::new(200);

    let feasible = Rc::new(RefCell::new(Vec::new()));
    let flags = Rc::new(RefCell::new(Vec::new()));
    let callback = RecordingCallback {
        constraints: nlp.get_constraints().clone(),
        feasible: feasible.clone(),
        flags: flags.clone(),
    };

    let mut state = SolverState::new(Col::from_fn(2, |i| [0.2, 0.1][i]));
    let mut hooks = SolverHooks::new(Box::new(callback));
    let mut solver = TrustRegion::new(&nlp, options);
    let initial_fval = nlp.f(state.get_primal());
    solver.solve(&mut state, &mut hooks).unwrap();

    // Negative curvature was encountered and turned into boundary steps.
    assert!(flags.borrow().contains(&PcgFlag::NegativeCurvature));
    // Every emitted iterate stayed feasible.
    assert!(feasible.borrow().iter().all(|ok| *ok));
    // Substantial descent towards the boundary minimum at (0, ±1).
    assert!(state.get_objective().unwrap() < initial_fval);
    assert!(state.get_objective().unwrap() < -0.5);
}

#[test]
fn test_stall_termination() {
    // Quartic bowl: the decrease flattens long before the gradient test can
    // fire, so the stall detector ends the run.
    let nlp = NonlinearProgram::unconstrained(
        2,
        |x| (x[0] - 1.0).powi(4) + (x[1] - 1.0).powi(4),
        |x| Col::from_fn(2, |i| 4.0 * (x[i] - 1.0).powi(3)),
    );
    let options = TrustRegionOptions::new(100)
        .with_stall_detection(1e-12, 3)
        .with_display(false);

    let (status, state) = solve(&nlp, &[0.0, 0.0], options);

    assert_eq!(status, Status::Stalled);
    assert!(status.is_success());
    let x = state.get_primal();
    assert!((x[0] - 1.0).abs() < 1e-2);
    assert!((x[1] - 1.0).abs() < 1e-2);
}

#[test]
fn test_iterates_stay_feasible() {
    let nlp = bound_active();

    let feasible = Rc::new(RefCell::new(Vec::new()));
    let flags = Rc::new(RefCell::new(Vec::new()));
    let callback = RecordingCallback {
        constraints: nlp.get_constraints().clone(),
        feasible: feasible.clone(),
        flags: flags.clone(),
    };

    let mut state = SolverState::new(Col::from_fn(2, |i| [0.5, 0.25][i]));
    let mut hooks = SolverHooks::new(Box::new(callback));
    let mut solver = TrustRegion::new(&nlp, TrustRegionOptions::new(300));
    let status = solver.solve(&mut state, &mut hooks).unwrap();

    assert!(status.is_success());
    assert!(!feasible.borrow().is_empty());
    assert!(feasible.borrow().iter().all(|ok| *ok));
}

#[test]
fn test_deterministic_runs() {
    let nlp = rosenbrock();

    let run = || {
        let options = TrustRegionOptions::new(500).with_display(false);
        solve(&nlp, &[-1.2, 1.0], options)
    };
    let (status_a, state_a) = run();
    let (status_b, state_b) = run();

    assert_eq!(status_a, status_b);
    assert_eq!(state_a.get_nit(), state_b.get_nit());
    // Bitwise identical iterates.
    assert_eq!(state_a.get_primal(), state_b.get_primal());
    assert_eq!(state_a.get_objective(), state_b.get_objective());
}

#[test]
fn test_infeasible_start_is_rejected() {
    let nlp = bound_active();
    let options = TrustRegionOptions::new(10).with_display(false);

    let mut state = SolverState::new(Col::from_fn(2, |_| 2.0));
    let mut hooks = SolverHooks::default();
    let mut solver = TrustRegion::new(&nlp, options);

    assert!(solver.solve(&mut state, &mut hooks).is_err());
}

#[test]
fn test_convergence_output_runs() {
    // Smoke test of the printing callback.
    let nlp = quadratic_diag();
    let options = TrustRegionOptions::new(100);

    let mut state = SolverState::new(Col::zeros(3));
    let mut hooks = SolverHooks::new(Box::new(ConvergenceOutput::new()));
    let mut solver = TrustRegion::new(&nlp, options);

    let status = solver.solve(&mut state, &mut hooks).unwrap();
    assert!(status.is_success());
}
