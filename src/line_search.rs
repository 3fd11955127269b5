//! Backtracking line search enforcing the Armijo sufficient-decrease condition
//! and, optionally, the Wolfe curvature condition.

use crate::objective::{Evaluator, Objective};
use crate::{DimensionMismatch, InvalidSetting};
use ndarray::Array1;

/// Armijo sufficient-decrease constant `c`; fixed for every search.
pub const ARMIJO_C: f64 = 1e-4;
/// Default Wolfe curvature constant `γ`, with `c < γ < 1`.
pub const WOLFE_GAMMA: f64 = 0.95;

/// Configuration of a geometric backtracking search.
///
/// Starting from `initial_step`, the step is multiplied by `reduction_factor`
/// until the trial point satisfies
/// `f(x + αp) ≤ f(x) + c·α·∇f(x)ᵀp` and, when `use_wolfe` is set,
/// `|∇f(x + αp)ᵀp| ≤ γ·|∇f(x)ᵀp|`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineSearch {
    pub initial_step: f64,
    pub reduction_factor: f64,
    pub gamma: f64,
    pub use_wolfe: bool,
}

/// A successful search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineSearchResult {
    /// The accepted step length; always strictly positive.
    pub step_length: f64,
    /// Objective calls made, including the one at the starting point.
    pub evaluations: usize,
    /// Objective value at the accepted trial point.
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LineSearchError {
    #[error(transparent)]
    DimensionMismatch(#[from] DimensionMismatch),
    #[error(transparent)]
    InvalidSetting(#[from] InvalidSetting),
    #[error(
        "The search direction is not a descent direction (directional derivative {slope:e}); no decrease is achievable along it."
    )]
    NonDescentDirection { slope: f64 },
    #[error(
        "No acceptable step was found before the step length reached the numeric floor (last step {last_step:e}, {evaluations} evaluations)."
    )]
    StepUnderflow { last_step: f64, evaluations: usize },
}

impl LineSearch {
    /// Armijo-only search with the given starting step and shrink factor.
    pub fn new(initial_step: f64, reduction_factor: f64) -> Self {
        Self {
            initial_step,
            reduction_factor,
            gamma: WOLFE_GAMMA,
            use_wolfe: false,
        }
    }

    /// Enables or disables the curvature condition.
    pub fn with_wolfe(mut self, enable: bool) -> Self {
        self.use_wolfe = enable;
        self
    }

    /// Sets the curvature constant (default: 0.95).
    pub fn with_gamma(mut self, gamma: f64) -> Self {
        self.gamma = gamma;
        self
    }

    pub fn validate(&self) -> Result<(), InvalidSetting> {
        if !(self.initial_step.is_finite() && self.initial_step > 0.0) {
            return Err(InvalidSetting {
                name: "initial_step",
                value: self.initial_step,
                reason: "must be positive and finite",
            });
        }
        if !(self.reduction_factor > 0.0 && self.reduction_factor < 1.0) {
            return Err(InvalidSetting {
                name: "reduction_factor",
                value: self.reduction_factor,
                reason: "must lie strictly between 0 and 1",
            });
        }
        if !(self.gamma > ARMIJO_C && self.gamma < 1.0) {
            return Err(InvalidSetting {
                name: "gamma",
                value: self.gamma,
                reason: "must lie strictly between the Armijo constant and 1",
            });
        }
        Ok(())
    }

    /// Searches along `p` from `x`.
    ///
    /// The objective is evaluated once at `x` and once per trial step. The search
    /// gives up when `p` is not a descent direction, or once the step is so small
    /// that `x + αp` no longer differs from `x`; it never retries on its own.
    pub fn search<O>(
        &self,
        objective: &mut O,
        x: &Array1<f64>,
        p: &Array1<f64>,
    ) -> Result<LineSearchResult, LineSearchError>
    where
        O: Objective + ?Sized,
    {
        self.validate()?;
        let mut evaluator = Evaluator::new(objective, x.len())?;
        self.search_counted(&mut evaluator, x, p)
    }

    pub(crate) fn search_counted<O>(
        &self,
        evaluator: &mut Evaluator<'_, O>,
        x: &Array1<f64>,
        p: &Array1<f64>,
    ) -> Result<LineSearchResult, LineSearchError>
    where
        O: Objective + ?Sized,
    {
        if p.len() != x.len() {
            return Err(DimensionMismatch {
                what: "search direction",
                expected: x.len(),
                found: p.len(),
            }
            .into());
        }
        let start = evaluator.count();
        let (f_x, g_x) = evaluator.evaluate(x)?;
        let slope = g_x.dot(p);
        if slope.is_nan() || slope >= 0.0 {
            log::debug!(
                "[LineSearch] Non-descent direction (gᵀp = {:.3e}); nothing to search.",
                slope
            );
            return Err(LineSearchError::NonDescentDirection { slope });
        }
        let curvature_bound = self.gamma * slope.abs();

        let mut alpha = self.initial_step;
        loop {
            let candidate = x + &(p * alpha);
            if !(alpha > 0.0 && alpha.is_finite()) || candidate == *x {
                let evaluations = evaluator.count() - start;
                log::debug!(
                    "[LineSearch] Step underflow at alpha={:.3e} after {} evaluations.",
                    alpha,
                    evaluations
                );
                return Err(LineSearchError::StepUnderflow {
                    last_step: alpha,
                    evaluations,
                });
            }

            let (f_trial, g_trial) = evaluator.evaluate(&candidate)?;
            let armijo_ok = f_trial <= f_x + ARMIJO_C * alpha * slope;
            let curvature_ok = !self.use_wolfe || g_trial.dot(p).abs() <= curvature_bound;
            if armijo_ok && curvature_ok {
                let evaluations = evaluator.count() - start;
                log::trace!(
                    "[LineSearch] Accepted alpha={:.3e}, f={:.6e} after {} evaluations.",
                    alpha,
                    f_trial,
                    evaluations
                );
                return Ok(LineSearchResult {
                    step_length: alpha,
                    evaluations,
                    value: f_trial,
                });
            }
            alpha *= self.reduction_factor;
        }
    }
}
