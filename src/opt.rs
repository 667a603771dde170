/// Solver options shared by the interior point method, the OPF formulation
/// and the decommitment driver.
#[derive(Clone, Debug)]
pub struct SolverOpts {
    /// Print per-iteration convergence data at `info` level.
    pub show_progress: bool,
    /// Maximum number of interior point iterations.
    pub max_iterations: usize,
    /// Absolute termination tolerance on the gradient and
    /// complementarity conditions.
    pub absolute_tol: f64,
    /// Relative termination tolerance on the objective change
    /// between iterations.
    pub relative_tol: f64,
    /// Feasibility tolerance on constraint violation.
    pub feasibility_tol: f64,
    /// Iterative refinement steps applied after each linear solve.
    /// Consumed when the solver is built with `DenseLu::from_opts`; a
    /// hand-built solver keeps its own setting.
    pub refinement: usize,
    /// Enforce branch flow limits in the OPF.
    pub flow_limits: bool,
    /// Use trust-region style step-size control in the Newton update.
    pub step_control: bool,
}

impl Default for SolverOpts {
    fn default() -> Self {
        Self {
            show_progress: false,
            max_iterations: 100,
            absolute_tol: 1e-7,
            relative_tol: 1e-6,
            feasibility_tol: 1e-7,
            refinement: 1,
            flow_limits: false,
            step_control: false,
        }
    }
}
