use nalgebra::{DMatrix, DVector};

use super::{Solve, check_dims, check_finite};
use crate::basic::error::SolveError;

/// Dense LU with partial pivoting; always available.
#[derive(Debug, Default, Clone, Copy)]
pub struct DenseLuSolver;

impl Solve for DenseLuSolver {
    fn solve(&mut self, a: &DMatrix<f64>, b: &mut DVector<f64>) -> Result<(), SolveError> {
        check_dims(a, b)?;
        let x = a.clone().lu().solve(b).ok_or(SolveError::Singular)?;
        check_finite(x.as_slice())?;
        b.copy_from(&x);
        Ok(())
    }
}
