use crate::SolverState;

/// Hook invoked once per solver iteration for logging, monitoring, or early
/// stopping. Callbacks observe the state read-only and must not assume they
/// are called from more than one thread.
pub trait Callback {
    /// Called once before the first iteration.
    fn init(&mut self, _state: &SolverState) {}

    /// Called at the end of each iteration with the current solver state.
    fn call(&mut self, state: &SolverState);
}

/// A callback that does nothing. Use when no per-iteration output is needed.
pub struct NoOpCallback {}

impl Callback for NoOpCallback {
    fn call(&mut self, _state: &SolverState) {
        // Do nothing
    }
}

/// Prints objective value, gradient norm, radius, and subproblem outcome to
/// stdout each iteration.
pub struct ConvergenceOutput {}

impl ConvergenceOutput {
    pub fn new() -> Self {
        Self {}
    }
}

impl Callback for ConvergenceOutput {
    fn init(&mut self, _state: &SolverState) {
        println!(
            "| {:>4} | {:^12} | {:^9} | {:^9} | {:^4} | {:^9} | {:^19} | {:>3} |",
            "nit", "fval", "|g|inf", "delta", "pit", "step", "flag", "age",
        );
    }

    fn call(&mut self, state: &SolverState) {
        let (pcg_iter, pcg_size, pcg_flag) = match state.get_pcg() {
            Some(pcg) => (
                format!("{}", pcg.get_iter()),
                pcg.get_size()
                    .map_or("-".to_string(), |size| format!("{:<9.2e}", size)),
                format!("{:?}", pcg.get_flag()),
            ),
            None => ("-".to_string(), "-".to_string(), "-".to_string()),
        };

        let txt = format!(
            "| {:4} | {:<12.6e} | {:<9.2e} | {:<9.2e} | {:>4} | {:>9} | {:<19} | {:3} |",
            state.get_nit(),
            state.get_objective().unwrap_or(f64::NAN),
            state.get_gradient().map_or(f64::NAN, |df| df.get_infnorm()),
            state.get_delta(),
            pcg_iter,
            pcg_size,
            pcg_flag,
            state.get_hessian_age(),
        );
        println!("{}", txt);
    }
}
