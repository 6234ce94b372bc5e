//! Linear solve for the Newton direction.

use nalgebra::{DMatrix, DVector};
use sprs::CsMat;

/// Solve `jac * x = rhs` by dense LU. Returns `None` when the matrix is
/// singular or the solution is not finite.
pub fn solve_linear(jac: &CsMat<f64>, rhs: &DVector<f64>) -> Option<DVector<f64>> {
    let (rows, cols) = jac.shape();
    if rows != cols || rows != rhs.len() {
        return None;
    }
    let mut dense = DMatrix::zeros(rows, cols);
    for (value, (i, j)) in jac.iter() {
        dense[(i, j)] += *value;
    }
    let x = dense.lu().solve(rhs)?;
    x.iter().all(|v| v.is_finite()).then_some(x)
}
