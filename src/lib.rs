//! Unconstrained minimization of smooth `f: ℝⁿ → ℝ` by steepest descent or BFGS.
//!
//! Both drivers share a backtracking line search that enforces the Armijo sufficient-decrease
//! condition and, on request, a Wolfe curvature condition on the trial gradient.
//!
//! # Features
//! - [`SteepestDescent`]: moves along `−∇f`; Armijo-only backtracking from a step of 4.
//! - [`Bfgs`]: dense inverse-Hessian quasi-Newton updates, unit initial step, Wolfe check on,
//!   and a one-shot half-step retry when an accepted step still raises `f`.
//! - Selectable handling of degenerate curvature pairs via [`CurvatureSafeguard`].
//! - Reference objectives ([`Quadratic`], [`PermII`]) and a finite-difference gradient check.
//! - Every objective call is counted, including each backtracking trial and re-evaluation.
//!
//! ## Defaults
//! - Tolerance `1e-5` on the Euclidean gradient norm, at most 1000 iterations.
//! - Armijo constant `c = 1e-4`, curvature constant `gamma = 0.95`.
//!
//! Hitting the iteration cap is not an error: the last iterate is returned with
//! `converged == false`.
//!
//! # Example
//!
//! ```
//! use armijo_bfgs::{Algorithm, Options, Quadratic, minimize};
//! use ndarray::array;
//!
//! // f(x) = x₀² + x₁² − 4x₀ − 6x₁, minimized at (2, 3).
//! let bowl = Quadratic::new(array![[2.0, 0.0], [0.0, 2.0]], array![4.0, 6.0]).unwrap();
//! let options = Options {
//!     tolerance: 1e-6,
//!     ..Options::default()
//! };
//!
//! let result = minimize(Algorithm::Bfgs, array![0.0, 0.0], bowl, &options).unwrap();
//!
//! assert!(result.converged);
//! assert!((result.point[0] - 2.0).abs() < 1e-4);
//! assert!((result.point[1] - 3.0).abs() < 1e-4);
//! assert!((result.value + 13.0).abs() < 1e-8);
//! ```

pub mod bfgs;
mod linalg;
pub mod line_search;
pub mod objective;
pub mod steepest;
#[cfg(test)]
mod testing;

pub use bfgs::{Bfgs, CurvatureSafeguard, UpdateOutcome, inverse_hessian_update};
pub use line_search::{ARMIJO_C, LineSearch, LineSearchError, LineSearchResult, WOLFE_GAMMA};
pub use objective::{
    Objective, PermII, Quadratic, finite_difference_gradient, gradient_discrepancy,
};
pub use steepest::SteepestDescent;

use ndarray::Array1;

/// A vector or matrix whose shape does not match the problem dimension.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Dimension mismatch for {what}: expected {expected}, found {found}.")]
pub struct DimensionMismatch {
    pub what: &'static str,
    pub expected: usize,
    pub found: usize,
}

/// A configuration value outside its admissible range.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Invalid setting `{name}` = {value}: {reason}.")]
pub struct InvalidSetting {
    pub name: &'static str,
    pub value: f64,
    pub reason: &'static str,
}

/// An error type for clear diagnostics.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OptimizeError {
    #[error(transparent)]
    DimensionMismatch(#[from] DimensionMismatch),
    #[error(transparent)]
    InvalidSetting(#[from] InvalidSetting),
    #[error("The line search failed at iteration {iteration}: {source}")]
    LineSearchFailed {
        iteration: usize,
        /// The iterate the search started from.
        point: Box<Array1<f64>>,
        source: LineSearchError,
    },
    #[error(
        "The BFGS inverse-Hessian update was undefined at iteration {iteration}: the step and the gradient change are orthogonal."
    )]
    BfgsUpdateFailed {
        iteration: usize,
        point: Box<Array1<f64>>,
    },
}

impl OptimizeError {
    /// Attaches the iteration and iterate to a line-search failure. Shape and
    /// configuration errors keep their own variants.
    pub(crate) fn from_line_search(
        iteration: usize,
        point: &Array1<f64>,
        source: LineSearchError,
    ) -> Self {
        match source {
            LineSearchError::DimensionMismatch(e) => Self::DimensionMismatch(e),
            LineSearchError::InvalidSetting(e) => Self::InvalidSetting(e),
            source => Self::LineSearchFailed {
                iteration,
                point: Box::new(point.clone()),
                source,
            },
        }
    }
}

/// A summary of an optimization run.
///
/// Note that for non-convex functions, convergence to a local minimum is not guaranteed.
#[derive(Debug, Clone)]
pub struct OptimizationResult {
    /// The final iterate.
    pub point: Array1<f64>,
    /// The objective value at `point`.
    pub value: f64,
    /// The Euclidean norm of the gradient at `point`.
    pub gradient_norm: f64,
    /// The number of accepted steps.
    pub iterations: usize,
    /// Total objective evaluations, line-search trials included.
    pub evaluations: usize,
    /// Whether the gradient-norm test passed at `point`.
    pub converged: bool,
    /// The objective value at every accepted iterate, starting with `x0`.
    pub history: Vec<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    SteepestDescent,
    Bfgs,
}

/// Settings for [`minimize`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Options {
    pub tolerance: f64,
    pub max_iterations: usize,
    /// `None` picks the algorithm's own default search.
    pub line_search: Option<LineSearch>,
    /// Only consulted by BFGS.
    pub curvature_safeguard: CurvatureSafeguard,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            tolerance: 1e-5,
            max_iterations: 1000,
            line_search: None,
            curvature_safeguard: CurvatureSafeguard::default(),
        }
    }
}

/// Minimizes `objective` from `x0` with the chosen algorithm.
pub fn minimize<O>(
    algorithm: Algorithm,
    x0: Array1<f64>,
    objective: O,
    options: &Options,
) -> Result<OptimizationResult, OptimizeError>
where
    O: Objective,
{
    match algorithm {
        Algorithm::SteepestDescent => {
            let line_search = options
                .line_search
                .unwrap_or_else(SteepestDescent::<O>::default_line_search);
            SteepestDescent::new(x0, objective)
                .with_tolerance(options.tolerance)
                .with_max_iterations(options.max_iterations)
                .with_line_search(line_search)
                .run()
        }
        Algorithm::Bfgs => {
            let line_search = options
                .line_search
                .unwrap_or_else(Bfgs::<O>::default_line_search);
            Bfgs::new(x0, objective)
                .with_tolerance(options.tolerance)
                .with_max_iterations(options.max_iterations)
                .with_line_search(line_search)
                .with_curvature_safeguard(options.curvature_safeguard)
                .run()
        }
    }
}

pub(crate) fn validate_tolerance(tolerance: f64) -> Result<(), InvalidSetting> {
    if tolerance.is_finite() && tolerance >= 0.0 {
        Ok(())
    } else {
        Err(InvalidSetting {
            name: "tolerance",
            value: tolerance,
            reason: "must be finite and non-negative",
        })
    }
}
