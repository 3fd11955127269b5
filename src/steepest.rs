//! Steepest descent: move along the negative gradient, with the step length
//! chosen by a backtracking line search.

use crate::line_search::LineSearch;
use crate::linalg::norm;
use crate::objective::{Evaluator, Objective};
use crate::{OptimizationResult, OptimizeError, validate_tolerance};
use ndarray::Array1;

/// A configurable steepest-descent solver.
pub struct SteepestDescent<O> {
    x0: Array1<f64>,
    objective: O,
    tolerance: f64,
    max_iterations: usize,
    line_search: LineSearch,
}

impl<O> SteepestDescent<O>
where
    O: Objective,
{
    /// Creates a solver starting from `x0`.
    pub fn new(x0: Array1<f64>, objective: O) -> Self {
        Self {
            x0,
            objective,
            tolerance: 1e-5,
            max_iterations: 1000,
            line_search: Self::default_line_search(),
        }
    }

    /// Armijo-only backtracking from a step of 4, shrinking by 4 each time.
    pub fn default_line_search() -> LineSearch {
        LineSearch::new(4.0, 0.25)
    }

    /// Sets the gradient-norm threshold (default: 1e-5). Convergence needs `‖g‖ < tolerance`.
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Sets the maximum number of iterations (default: 1000).
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_line_search(mut self, line_search: LineSearch) -> Self {
        self.line_search = line_search;
        self
    }

    /// Runs the solver.
    ///
    /// Running out of iterations is not an error: the last point comes back with
    /// `converged == false`.
    pub fn run(&mut self) -> Result<OptimizationResult, OptimizeError> {
        validate_tolerance(self.tolerance)?;
        self.line_search.validate()?;
        let mut evaluator = Evaluator::new(&mut self.objective, self.x0.len())?;
        let mut x = self.x0.clone();
        let mut history = Vec::new();

        for k in 0..self.max_iterations {
            let (f_k, g_k) = evaluator.evaluate(&x)?;
            history.push(f_k);
            let g_norm = norm(&g_k);
            if !g_norm.is_finite() {
                log::warn!(
                    "[SteepestDescent] Non-finite gradient norm at iter {}: ||g||={:?}",
                    k,
                    g_norm
                );
            }
            if g_norm < self.tolerance {
                log::info!(
                    "[SteepestDescent] Converged by gradient: iters={}, f={:.6e}, ||g||={:.3e}, fe={}",
                    k,
                    f_k,
                    g_norm,
                    evaluator.count()
                );
                return Ok(OptimizationResult {
                    point: x,
                    value: f_k,
                    gradient_norm: g_norm,
                    iterations: k,
                    evaluations: evaluator.count(),
                    converged: true,
                    history,
                });
            }

            let p_k = -g_k;
            let step = self
                .line_search
                .search_counted(&mut evaluator, &x, &p_k)
                .map_err(|source| OptimizeError::from_line_search(k, &x, source))?;
            x = &x + &(&p_k * step.step_length);
            log::debug!(
                "[SteepestDescent] iter {}: alpha={:.3e}, f={:.6e} -> {:.6e}, ||g||={:.3e}, fe={}",
                k,
                step.step_length,
                f_k,
                step.value,
                g_norm,
                evaluator.count()
            );
        }

        // One more evaluation so the report describes the returned point.
        let (f_last, g_last) = evaluator.evaluate(&x)?;
        history.push(f_last);
        let g_norm = norm(&g_last);
        let converged = g_norm < self.tolerance;
        if !converged {
            log::warn!(
                "[SteepestDescent] Max iterations reached: iters={}, f={:.6e}, ||g||={:.3e}, fe={}",
                self.max_iterations,
                f_last,
                g_norm,
                evaluator.count()
            );
        }
        Ok(OptimizationResult {
            point: x,
            value: f_last,
            gradient_norm: g_norm,
            iterations: self.max_iterations,
            evaluations: evaluator.count(),
            converged,
            history,
        })
    }
}
