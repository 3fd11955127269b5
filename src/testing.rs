//! Problems shared by the unit tests of several modules.

use crate::objective::Quadratic;
use ndarray::{Array1, Array2, array};
use rand::Rng;
use rand::rngs::StdRng;

/// `f(x) = x₀² + x₁² − 4x₀ − 6x₁`, minimized at `(2, 3)` where `f = −13`.
pub(crate) fn concrete_quadratic() -> Quadratic {
    Quadratic::new(array![[2.0, 0.0], [0.0, 2.0]], array![4.0, 6.0]).unwrap()
}

/// `Q = AᵀA` with `A` the identity plus uniform noise in `(−0.1, 0.1)`, and `b` uniform in
/// `(−1, 1)`.
///
/// The eigenvalues of `Q` stay near 1. The line searches start at a fixed step and only
/// shrink it, so with a badly conditioned `Q` the Wolfe interval can lie entirely above the
/// starting step and the search ends in `StepUnderflow`; the near-identity factor keeps the
/// convergence tests clear of that regime.
pub(crate) fn well_conditioned_quadratic(rng: &mut StdRng, n: usize) -> Quadratic {
    let a = Array2::from_shape_fn((n, n), |(i, j)| {
        let noise = rng.gen_range(-0.1..0.1);
        if i == j { 1.0 + noise } else { noise }
    });
    let b = Array1::from_shape_fn(n, |_| rng.gen_range(-1.0..1.0));
    Quadratic::from_factor(&a, b).unwrap()
}
