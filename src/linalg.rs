//! Small dense helpers shared by the objectives and the drivers.

use ndarray::{Array1, Array2};

/// Euclidean norm of a vector.
#[inline]
pub(crate) fn norm(v: &Array1<f64>) -> f64 {
    v.dot(v).sqrt()
}

/// Outer product `a bᵀ`.
pub(crate) fn outer(a: &Array1<f64>, b: &Array1<f64>) -> Array2<f64> {
    Array2::from_shape_fn((a.len(), b.len()), |(i, j)| a[i] * b[j])
}

/// Whether `a` is square and symmetric up to a relative tolerance.
pub(crate) fn is_symmetric(a: &Array2<f64>, rel_tol: f64) -> bool {
    let n = a.nrows();
    if a.ncols() != n {
        return false;
    }
    let scale = a.iter().fold(0.0_f64, |m, v| m.max(v.abs())).max(1.0);
    (0..n).all(|i| (0..i).all(|j| (a[[i, j]] - a[[j, i]]).abs() <= rel_tol * scale))
}

/// Lower-triangular Cholesky factor `L` with `a = L Lᵀ`.
///
/// Returns `None` if `a` is not square or a pivot is non-positive, i.e. the
/// matrix is not numerically positive-definite.
pub(crate) fn cholesky(a: &Array2<f64>) -> Option<Array2<f64>> {
    let n = a.nrows();
    if a.ncols() != n {
        return None;
    }
    let mut l = Array2::<f64>::zeros((n, n));
    for row in 0..n {
        for col in 0..=row {
            let partial: f64 = (0..col).map(|k| l[[row, k]] * l[[col, k]]).sum();
            let residual = a[[row, col]] - partial;
            if row == col {
                if residual <= 0.0 || !residual.is_finite() {
                    return None;
                }
                l[[row, col]] = residual.sqrt();
            } else {
                l[[row, col]] = residual / l[[col, col]];
            }
        }
    }
    Some(l)
}

/// Solves `L Lᵀ x = rhs` given the Cholesky factor `L`.
pub(crate) fn cholesky_solve(l: &Array2<f64>, rhs: &Array1<f64>) -> Array1<f64> {
    let n = l.nrows();
    let mut forward = Array1::<f64>::zeros(n);
    for i in 0..n {
        let partial: f64 = (0..i).map(|k| l[[i, k]] * forward[k]).sum();
        forward[i] = (rhs[i] - partial) / l[[i, i]];
    }
    let mut x = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let partial: f64 = ((i + 1)..n).map(|k| l[[k, i]] * x[k]).sum();
        x[i] = (forward[i] - partial) / l[[i, i]];
    }
    x
}
