use faer::{
    MatMut,
    linalg::solvers::Solve,
    sparse::{
        SparseColMatRef, SymbolicSparseColMatRef,
        linalg::solvers::{Lu, SymbolicLu},
    },
};
use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::CscMatrix;

use super::{Solve as PoSolve, check_dims, check_finite};
use crate::basic::error::SolveError;

/// Sparse LU from `faer`; the dense Jacobian is compressed to CSC first.
#[derive(Debug, Default, Clone, Copy)]
pub struct FaerSolver;

#[allow(non_snake_case)]
impl PoSolve for FaerSolver {
    fn solve(&mut self, a: &DMatrix<f64>, b: &mut DVector<f64>) -> Result<(), SolveError> {
        check_dims(a, b)?;
        let n = a.nrows();
        if n == 0 {
            return Ok(());
        }
        let (Ap, Ai, Ax) = CscMatrix::from(a).disassemble();
        if Ap.windows(2).any(|w| w[0] == w[1]) {
            // an empty column can never be pivoted
            return Err(SolveError::Singular);
        }
        let s = SymbolicSparseColMatRef::new_checked(n, n, &Ap, None, &Ai);
        let mat = SparseColMatRef::new(s, &Ax);
        let symbolic =
            SymbolicLu::try_new(s).map_err(|_| SolveError::Factorization("faer symbolic"))?;
        let lu = Lu::try_new_with_symbolic(symbolic, mat).map_err(|_| SolveError::Singular)?;
        let rhs = MatMut::from_column_major_slice_mut(b.as_mut_slice(), n, 1);
        lu.solve_in_place(rhs);
        check_finite(b.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn faer_contract() {
        crate::basic::solver::tests::exercise(&mut FaerSolver);
    }
}
