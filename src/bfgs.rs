//! BFGS quasi-Newton minimization with a dense inverse-Hessian approximation.

use crate::line_search::LineSearch;
use crate::linalg::{norm, outer};
use crate::objective::{Evaluator, Objective};
use crate::{OptimizationResult, OptimizeError, validate_tolerance};
use ndarray::{Array1, Array2};

/// How the inverse-Hessian update treats vanishing or negative curvature `dxᵀdg`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CurvatureSafeguard {
    /// A zero secant denominator contributes a zero weight instead of a
    /// reciprocal; the update is only impossible when both denominators vanish.
    /// Negative curvature is applied as is.
    #[default]
    ZeroWeight,
    /// Keep `H` unchanged whenever `dxᵀdg ≤ 0`, which preserves positive-definiteness.
    SkipNonPositive,
}

/// Result of one inverse-Hessian update.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome {
    Applied(Array2<f64>),
    Skipped,
    /// Both secant denominators were zero.
    Degenerate,
}

/// Rank-two BFGS update of the inverse Hessian:
///
/// `H' = H + (1 + dgᵀH dg·ρ₁)·ρ₂·dx dxᵀ − ρ₂·(H dg dxᵀ + dx dgᵀH)`
///
/// with `ρ₁ = 1/(dgᵀdx)` and `ρ₂ = 1/(dxᵀdg)`. `h` is left untouched; an applied
/// update is a fresh matrix.
pub fn inverse_hessian_update(
    h: &Array2<f64>,
    dx: &Array1<f64>,
    dg: &Array1<f64>,
    safeguard: CurvatureSafeguard,
) -> UpdateOutcome {
    match safeguard {
        CurvatureSafeguard::ZeroWeight => {
            let denom1 = dg.dot(dx);
            let denom2 = dx.dot(dg);
            if denom1 == 0.0 && denom2 == 0.0 {
                return UpdateOutcome::Degenerate;
            }
            let rho1 = if denom1 != 0.0 { 1.0 / denom1 } else { 0.0 };
            let rho2 = if denom2 != 0.0 { 1.0 / denom2 } else { 0.0 };
            UpdateOutcome::Applied(rank_two(h, dx, dg, rho1, rho2))
        }
        CurvatureSafeguard::SkipNonPositive => {
            let curvature = dx.dot(dg);
            if curvature <= 0.0 || !curvature.is_finite() {
                return UpdateOutcome::Skipped;
            }
            let rho = 1.0 / curvature;
            UpdateOutcome::Applied(rank_two(h, dx, dg, rho, rho))
        }
    }
}

fn rank_two(
    h: &Array2<f64>,
    dx: &Array1<f64>,
    dg: &Array1<f64>,
    rho1: f64,
    rho2: f64,
) -> Array2<f64> {
    let h_dg = h.dot(dg);
    let scale = (1.0 + dg.dot(&h_dg) * rho1) * rho2;
    let cross = outer(&h_dg, dx);
    let symmetric_cross = &cross + &cross.t();
    h + &(outer(dx, dx) * scale) - &(symmetric_cross * rho2)
}

/// A configurable BFGS solver.
pub struct Bfgs<O> {
    x0: Array1<f64>,
    objective: O,
    tolerance: f64,
    max_iterations: usize,
    line_search: LineSearch,
    safeguard: CurvatureSafeguard,
}

impl<O> Bfgs<O>
where
    O: Objective,
{
    /// Creates a new BFGS solver.
    ///
    /// # Arguments
    /// * `x0` - The initial guess for the minimum.
    /// * `objective` - The function to minimize, returning `(value, gradient)`.
    pub fn new(x0: Array1<f64>, objective: O) -> Self {
        Self {
            x0,
            objective,
            tolerance: 1e-5,
            max_iterations: 1000,
            line_search: Self::default_line_search(),
            safeguard: CurvatureSafeguard::default(),
        }
    }

    /// Unit initial step, shrink factor 0.85, curvature condition on.
    pub fn default_line_search() -> LineSearch {
        LineSearch::new(1.0, 0.85).with_wolfe(true)
    }

    /// Sets the gradient-norm threshold (default: 1e-5). Convergence needs `‖g‖ ≤ tolerance`.
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

    /// Chooses how degenerate curvature pairs are handled (default: `ZeroWeight`).
    pub fn with_curvature_safeguard(mut self, safeguard: CurvatureSafeguard) -> Self {
        self.safeguard = safeguard;
        self
    }

    /// Executes the BFGS iteration.
    ///
    /// Each iteration searches along `p = −H g`, steps to `x + αp` (falling back
    /// once to `x + ½αp` if that raised `f`), then updates `H` from the step and
    /// gradient change. Running out of iterations returns the last point with
    /// `converged == false`.
    pub fn run(&mut self) -> Result<OptimizationResult, OptimizeError> {
        validate_tolerance(self.tolerance)?;
        self.line_search.validate()?;
        let n = self.x0.len();
        let mut evaluator = Evaluator::new(&mut self.objective, n)?;
        let mut x_k = self.x0.clone();
        let (mut f_k, mut g_k) = evaluator.evaluate(&x_k)?;
        let mut h_k = Array2::<f64>::eye(n);
        let mut history = vec![f_k];

        for k in 0..self.max_iterations {
            let g_norm = norm(&g_k);
            if !g_norm.is_finite() {
                log::warn!(
                    "[BFGS] Non-finite gradient norm at iter {}: ||g||={:?}",
                    k,
                    g_norm
                );
            }
            if g_norm <= self.tolerance {
                log::info!(
                    "[BFGS] Converged by gradient: iters={}, f={:.6e}, ||g||={:.3e}, fe={}",
                    k,
                    f_k,
                    g_norm,
                    evaluator.count()
                );
                return Ok(OptimizationResult {
                    point: x_k,
                    value: f_k,
                    gradient_norm: g_norm,
                    iterations: k,
                    evaluations: evaluator.count(),
                    converged: true,
                    history,
                });
            }

            let d_k = -h_k.dot(&g_k);
            let step = self
                .line_search
                .search_counted(&mut evaluator, &x_k, &d_k)
                .map_err(|source| OptimizeError::from_line_search(k, &x_k, source))?;

            let mut alpha_k = step.step_length;
            let mut x_next = &x_k + &(&d_k * alpha_k);
            let (mut f_next, mut g_next) = evaluator.evaluate(&x_next)?;
            if f_next > f_k {
                log::warn!(
                    "[BFGS] Step raised f at iter {} ({:.6e} > {:.6e}); retrying with half step.",
                    k,
                    f_next,
                    f_k
                );
                alpha_k *= 0.5;
                x_next = &x_k + &(&d_k * alpha_k);
                (f_next, g_next) = evaluator.evaluate(&x_next)?;
            }

            let dx = &x_next - &x_k;
            let dg = &g_next - &g_k;
            match inverse_hessian_update(&h_k, &dx, &dg, self.safeguard) {
                UpdateOutcome::Applied(h_next) => h_k = h_next,
                UpdateOutcome::Skipped => {
                    log::warn!(
                        "[BFGS] Non-positive curvature at iter {} (dxᵀdg = {:.3e}); inverse update skipped.",
                        k,
                        dx.dot(&dg)
                    );
                }
                UpdateOutcome::Degenerate => {
                    log::error!(
                        "[BFGS] Both secant denominators vanished at iter {}; the inverse update is undefined.",
                        k
                    );
                    return Err(OptimizeError::BfgsUpdateFailed {
                        iteration: k,
                        point: Box::new(x_k),
                    });
                }
            }

            log::debug!(
                "[BFGS] iter {}: alpha={:.3e}, f={:.6e} -> {:.6e}, ||g||={:.3e}, fe={}",
                k,
                alpha_k,
                f_k,
                f_next,
                g_norm,
                evaluator.count()
            );
            x_k = x_next;
            f_k = f_next;
            g_k = g_next;
            history.push(f_k);
        }

        let g_norm = norm(&g_k);
        let converged = g_norm <= self.tolerance;
        if !converged {
            log::warn!(
                "[BFGS] Max iterations reached: iters={}, f={:.6e}, ||g||={:.3e}, fe={}",
                self.max_iterations,
                f_k,
                g_norm,
                evaluator.count()
            );
        }
        Ok(OptimizationResult {
            point: x_k,
            value: f_k,
            gradient_norm: g_norm,
            iterations: self.max_iterations,
            evaluations: evaluator.count(),
            converged,
            history,
        })
    }
}
