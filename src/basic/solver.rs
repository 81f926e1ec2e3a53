use nalgebra::{DMatrix, DVector};

use super::error::SolveError;

mod dense;
pub use dense::DenseLuSolver;

#[cfg(feature = "faer")]
mod faer;
#[cfg(feature = "faer")]
pub use faer::*;

#[cfg(feature = "rsparse")]
mod rsparse;
#[cfg(feature = "rsparse")]
pub use rsparse::*;

#[cfg(feature = "faer")]
pub type DefaultSolver = FaerSolver;

#[cfg(all(not(feature = "faer"), feature = "rsparse"))]
pub type DefaultSolver = RSparseSolver;

#[cfg(all(not(feature = "faer"), not(feature = "rsparse")))]
pub type DefaultSolver = DenseLuSolver;

/// A trait for solving the linear correction step of a Newton iteration.
pub trait Solve {
    /// Solves `a · x = b` in place.
    ///
    /// # Parameters
    ///
    /// * `a` - Square Jacobian.
    /// * `b` - Right-hand side on entry, solution on success.
    ///
    /// # Returns
    ///
    /// [`SolveError::Singular`] when the matrix has no unique solution; the
    /// content of `b` is unspecified on error.
    fn solve(&mut self, a: &DMatrix<f64>, b: &mut DVector<f64>) -> Result<(), SolveError>;

    /// Drops any cached factorization.
    fn reset(&mut self) {}
}

pub(crate) fn check_dims(a: &DMatrix<f64>, b: &DVector<f64>) -> Result<(), SolveError> {
    if a.nrows() != a.ncols() || a.nrows() != b.len() {
        return Err(SolveError::Dimension {
            rows: a.nrows(),
            cols: a.ncols(),
            rhs: b.len(),
        });
    }
    Ok(())
}

/// A factorization can succeed on a numerically singular matrix and still
/// produce infinities.
pub(crate) fn check_finite(x: &[f64]) -> Result<(), SolveError> {
    if x.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(SolveError::Singular)
    }
}
