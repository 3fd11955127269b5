//! Objective functions: the evaluation contract, two reference problems and a
//! finite-difference gradient check.

use crate::DimensionMismatch;
use crate::linalg::{cholesky, cholesky_solve, is_symmetric};
use ndarray::{Array1, Array2};

/// A differentiable scalar function of a real vector.
///
/// `evaluate` returns `(f(x), ∇f(x))` and must be deterministic for a fixed `x`.
/// It takes `&mut self` so implementors may cache or count calls.
///
/// Any closure `FnMut(&Array1<f64>) -> (f64, Array1<f64>)` is an objective, which is
/// how callers plug in their own problems.
pub trait Objective {
    /// Value and gradient at `x`.
    fn evaluate(&mut self, x: &Array1<f64>) -> (f64, Array1<f64>);

    /// The fixed input dimension, if the objective has one.
    fn dimension(&self) -> Option<usize> {
        None
    }
}

impl<F> Objective for F
where
    F: FnMut(&Array1<f64>) -> (f64, Array1<f64>),
{
    fn evaluate(&mut self, x: &Array1<f64>) -> (f64, Array1<f64>) {
        self(x)
    }
}

/// The convex quadratic `f(x) = ½ xᵀQx − bᵀx` with gradient `Qx − b`.
///
/// The gradient formula assumes `Q` is symmetric. Convergence guarantees further
/// need `Q` positive-definite, which [`Quadratic::from_factor`] provides for a
/// full-rank factor.
#[derive(Debug, Clone, PartialEq)]
pub struct Quadratic {
    q: Array2<f64>,
    b: Array1<f64>,
}

impl Quadratic {
    /// Builds the quadratic from its coefficient matrix and linear term.
    pub fn new(q: Array2<f64>, b: Array1<f64>) -> Result<Self, DimensionMismatch> {
        let n = q.nrows();
        if q.ncols() != n {
            return Err(DimensionMismatch {
                what: "coefficient matrix columns",
                expected: n,
                found: q.ncols(),
            });
        }
        if b.len() != n {
            return Err(DimensionMismatch {
                what: "linear term",
                expected: n,
                found: b.len(),
            });
        }
        if !is_symmetric(&q, 1e-10) {
            log::warn!(
                "[Quadratic] Coefficient matrix is not symmetric; the gradient Qx - b will be inexact."
            );
        }
        Ok(Self { q, b })
    }

    /// Builds the quadratic with `Q = AᵀA`.
    pub fn from_factor(a: &Array2<f64>, b: Array1<f64>) -> Result<Self, DimensionMismatch> {
        Self::new(a.t().dot(a), b)
    }

    pub fn matrix(&self) -> &Array2<f64> {
        &self.q
    }

    pub fn linear_term(&self) -> &Array1<f64> {
        &self.b
    }

    /// The closed-form minimizer `Q⁻¹b`, or `None` when `Q` is not numerically
    /// positive-definite.
    pub fn minimizer(&self) -> Option<Array1<f64>> {
        let l = cholesky(&self.q)?;
        Some(cholesky_solve(&l, &self.b))
    }
}

impl Objective for Quadratic {
    fn evaluate(&mut self, x: &Array1<f64>) -> (f64, Array1<f64>) {
        let qx = self.q.dot(x);
        let value = 0.5 * x.dot(&qx) - self.b.dot(x);
        (value, qx - &self.b)
    }

    fn dimension(&self) -> Option<usize> {
        Some(self.b.len())
    }
}

/// The PermII benchmark
/// `f(x) = Σᵢ (Σⱼ (j + 10)(xⱼⁱ − j⁻ⁱ))²` for `i, j = 1..n`.
///
/// Stiff and ill-conditioned near its minimizer `xⱼ = 1/j`, where `f = 0`.
/// Accepts any dimension.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PermII;

impl PermII {
    /// The known minimizer `(1, 1/2, …, 1/n)`.
    pub fn minimizer(n: usize) -> Array1<f64> {
        Array1::from_shape_fn(n, |idx| 1.0 / (idx + 1) as f64)
    }
}

impl Objective for PermII {
    fn evaluate(&mut self, x: &Array1<f64>) -> (f64, Array1<f64>) {
        let n = x.len();
        let mut value = 0.0;
        let mut gradient = Array1::<f64>::zeros(n);
        for i in 1..=n {
            let power = i as i32;
            let inner: f64 = x
                .iter()
                .enumerate()
                .map(|(idx, &xj)| {
                    let j = (idx + 1) as f64;
                    (j + 10.0) * (xj.powi(power) - j.powi(-power))
                })
                .sum();
            value += inner * inner;
            // d/dx_l of inner² = 2·inner·(l + 10)·i·x_l^(i-1)
            for (idx, g) in gradient.iter_mut().enumerate() {
                let l = (idx + 1) as f64;
                *g += 2.0 * inner * (l + 10.0) * (i as f64) * x[idx].powi(power - 1);
            }
        }
        (value, gradient)
    }
}

/// Centered finite-difference estimate of the gradient,
/// `(f(x + δeᵢ) − f(x − δeᵢ)) / 2δ` for each coordinate.
pub fn finite_difference_gradient<O>(objective: &mut O, x: &Array1<f64>, delta: f64) -> Array1<f64>
where
    O: Objective + ?Sized,
{
    let mut estimate = Array1::<f64>::zeros(x.len());
    let mut probe = x.clone();
    for i in 0..x.len() {
        probe[i] = x[i] + delta;
        let (f_plus, _) = objective.evaluate(&probe);
        probe[i] = x[i] - delta;
        let (f_minus, _) = objective.evaluate(&probe);
        probe[i] = x[i];
        estimate[i] = (f_plus - f_minus) / (2.0 * delta);
    }
    estimate
}

/// Largest absolute difference between the analytic gradient and its
/// finite-difference estimate at `x`.
pub fn gradient_discrepancy<O>(
    objective: &mut O,
    x: &Array1<f64>,
    delta: f64,
) -> Result<f64, DimensionMismatch>
where
    O: Objective + ?Sized,
{
    let mut evaluator = Evaluator::new(objective, x.len())?;
    let (_, analytic) = evaluator.evaluate(x)?;
    let estimate = finite_difference_gradient(evaluator.objective, x, delta);
    Ok(analytic
        .iter()
        .zip(estimate.iter())
        .fold(0.0_f64, |worst, (a, e)| worst.max((a - e).abs())))
}

/// Counts objective calls for one run and checks every returned gradient has
/// the run's dimension.
pub(crate) struct Evaluator<'a, O: ?Sized> {
    objective: &'a mut O,
    dimension: usize,
    count: usize,
}

impl<'a, O> Evaluator<'a, O>
where
    O: Objective + ?Sized,
{
    pub(crate) fn new(objective: &'a mut O, dimension: usize) -> Result<Self, DimensionMismatch> {
        if let Some(expected) = objective.dimension()
            && expected != dimension
        {
            return Err(DimensionMismatch {
                what: "starting point",
                expected,
                found: dimension,
            });
        }
        Ok(Self {
            objective,
            dimension,
            count: 0,
        })
    }

    pub(crate) fn evaluate(
        &mut self,
        x: &Array1<f64>,
    ) -> Result<(f64, Array1<f64>), DimensionMismatch> {
        if x.len() != self.dimension {
            return Err(DimensionMismatch {
                what: "point",
                expected: self.dimension,
                found: x.len(),
            });
        }
        let (value, gradient) = self.objective.evaluate(x);
        self.count += 1;
        if gradient.len() != self.dimension {
            return Err(DimensionMismatch {
                what: "gradient",
                expected: self.dimension,
                found: gradient.len(),
            });
        }
        Ok((value, gradient))
    }

    /// Objective calls made so far.
    pub(crate) fn count(&self) -> usize {
        self.count
    }
}

#[cfg(test)]
mod tests {
    use super::{Evaluator, Objective, PermII, Quadratic, gradient_discrepancy};
    use crate::DimensionMismatch;
    use crate::linalg::norm;
    use ndarray::{Array1, Array2, array};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use spectral::prelude::*;

    const DELTAS: [f64; 3] = [1e-4, 1e-5, 1e-6];

    fn random_vector(rng: &mut StdRng, n: usize, lo: f64, hi: f64) -> Array1<f64> {
        Array1::from_shape_fn(n, |_| rng.gen_range(lo..hi))
    }

    fn random_quadratic(rng: &mut StdRng, n: usize) -> Quadratic {
        let a = Array2::from_shape_fn((n, n), |_| rng.r#gen::<f64>());
        let b = Array1::from_shape_fn(n, |_| rng.r#gen::<f64>());
        Quadratic::from_factor(&a, b).unwrap()
    }

    fn gradient_scale(objective: &mut impl Objective, x: &Array1<f64>) -> f64 {
        let (_, g) = objective.evaluate(x);
        1.0 + g.iter().fold(0.0_f64, |m, v| m.max(v.abs()))
    }

    #[test]
    fn quadratic_value_and_gradient() {
        let mut quad = Quadratic::new(array![[2.0, 0.0], [0.0, 2.0]], array![4.0, 6.0]).unwrap();
        let (f0, g0) = quad.evaluate(&array![0.0, 0.0]);
        assert_that!(&f0).is_close_to(0.0, 1e-15);
        assert_eq!(g0, array![-4.0, -6.0]);
        let (f_min, g_min) = quad.evaluate(&array![2.0, 3.0]);
        assert_that!(&f_min).is_close_to(-13.0, 1e-12);
        assert_that!(&norm(&g_min)).is_close_to(0.0, 1e-15);
        assert_eq!(quad.dimension(), Some(2));
    }

    #[test]
    fn quadratic_rejects_mismatched_shapes() {
        let err = Quadratic::new(Array2::zeros((2, 3)), array![1.0, 2.0]).unwrap_err();
        assert_eq!(err.found, 3);
        let err = Quadratic::new(Array2::eye(2), array![1.0, 2.0, 3.0]).unwrap_err();
        assert_eq!(
            err,
            DimensionMismatch {
                what: "linear term",
                expected: 2,
                found: 3
            }
        );
    }

    #[test]
    fn quadratic_minimizer_solves_normal_equations() {
        let mut rng = StdRng::seed_from_u64(11);
        let quad = random_quadratic(&mut rng, 5);
        let x_star = quad.minimizer().unwrap();
        let residual = quad.matrix().dot(&x_star) - quad.linear_term();
        assert_that!(&norm(&residual)).is_less_than(1e-8);

        let singular = Quadratic::new(Array2::zeros((2, 2)), array![1.0, 1.0]).unwrap();
        assert!(singular.minimizer().is_none());
    }

    #[test]
    fn perm_vanishes_at_its_minimizer() {
        for n in 1..=6 {
            let x_star = PermII::minimizer(n);
            let (f, g) = PermII.evaluate(&x_star);
            assert_that!(&f).is_close_to(0.0, 1e-20);
            assert_that!(&norm(&g)).is_less_than(1e-10);
        }
        assert_eq!(PermII::minimizer(3), array![1.0, 0.5, 1.0 / 3.0]);
    }

    #[test]
    fn quadratic_gradient_matches_finite_differences() {
        let mut rng = StdRng::seed_from_u64(2021);
        let mut quad = random_quadratic(&mut rng, 5);
        for _ in 0..100 {
            let x = random_vector(&mut rng, 5, -1.0, 1.0);
            let scale = gradient_scale(&mut quad, &x);
            for delta in DELTAS {
                let gap = gradient_discrepancy(&mut quad, &x, delta).unwrap();
                assert_that!(&gap).is_less_than(1e-6 * scale);
            }
        }
    }

    #[test]
    fn perm_gradient_matches_finite_differences() {
        let mut rng = StdRng::seed_from_u64(435);
        for _ in 0..100 {
            let x = random_vector(&mut rng, 4, -1.0, 1.0);
            let scale = gradient_scale(&mut PermII, &x);
            for delta in DELTAS {
                let gap = gradient_discrepancy(&mut PermII, &x, delta).unwrap();
                assert_that!(&gap).is_less_than(1e-4 * scale);
            }
        }
    }

    #[test]
    fn perm_discrepancy_shrinks_with_delta() {
        let x = array![0.7, -0.4, 0.9];
        let gaps: Vec<f64> = [1e-2, 1e-3, 1e-4, 1e-5, 1e-6]
            .iter()
            .map(|&delta| gradient_discrepancy(&mut PermII, &x, delta).unwrap())
            .collect();
        assert_that!(&gaps[0]).is_greater_than(0.0);
        // Truncation error is O(δ²): ten times smaller δ, about a hundred times smaller gap.
        for pair in gaps[..4].windows(2) {
            assert_that!(&pair[1]).is_less_than(0.05 * pair[0]);
        }
        // At δ = 1e-6 rounding starts to compete, so only ask for a smaller gap.
        assert_that!(&gaps[4]).is_less_than(gaps[3]);
    }

    #[test]
    fn closures_are_objectives() {
        let mut calls = 0usize;
        let mut sphere = |x: &Array1<f64>| {
            calls += 1;
            (x.dot(x), 2.0 * x)
        };
        let (f, g) = sphere.evaluate(&array![1.0, 2.0]);
        assert_that!(&f).is_close_to(5.0, 1e-15);
        assert_eq!(g, array![2.0, 4.0]);
        assert_eq!(sphere.dimension(), None);
        assert_eq!(calls, 1);
    }

    #[test]
    fn evaluator_counts_and_checks_dimensions() {
        let mut truncated = |x: &Array1<f64>| (x.sum(), Array1::<f64>::ones(1));
        let mut evaluator = Evaluator::new(&mut truncated, 2).unwrap();
        let err = evaluator.evaluate(&array![1.0, 1.0]).unwrap_err();
        assert_eq!(err.what, "gradient");
        assert_eq!(evaluator.count(), 1);
        let err = evaluator.evaluate(&array![1.0]).unwrap_err();
        assert_eq!(err.what, "point");
        assert_eq!(evaluator.count(), 1);

        let mut quad = Quadratic::new(Array2::eye(3), Array1::zeros(3)).unwrap();
        assert!(Evaluator::new(&mut quad, 2).is_err());
    }
}
