use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::CscMatrix;
use rsparse::{
    data::{self, Numeric},
    lsolve, lu, sqr, usolve,
};

use super::{Solve, check_dims, check_finite};
use crate::basic::error::SolveError;

/// Sparse LU from `rsparse`; the dense Jacobian is compressed to CSC first.
#[derive(Debug, Default, Clone, Copy)]
pub struct RSparseSolver;

#[allow(non_snake_case)]
impl Solve for RSparseSolver {
    fn solve(&mut self, a: &DMatrix<f64>, b: &mut DVector<f64>) -> Result<(), SolveError> {
        check_dims(a, b)?;
        let n = a.nrows();
        if n == 0 {
            return Ok(());
        }
        let (Ap, Ai, Ax) = CscMatrix::from(a).disassemble();
        if Ap.windows(2).any(|w| w[0] == w[1]) {
            return Err(SolveError::Singular);
        }
        let p: Vec<isize> = Ap.iter().map(|&v| v as isize).collect();
        let nzmax = Ax.len();
        let a = data::Sprs {
            m: n,
            n,
            i: Ai,
            p,
            x: Ax,
            nzmax,
        };
        // the sparsity pattern moves between iterations, so the symbolic
        // analysis is redone on every call
        let mut s = sqr(&a, 1, false);
        // tol = 1.0 selects plain partial pivoting
        let num = lu(&a, &mut s, 1.0).map_err(|_| SolveError::Singular)?;
        let mut x = vec![0.0; n];
        let rhs = b.as_mut_slice();
        ipvec(&num.pinv, rhs, &mut x[..]); // x = P*b
        lsolve(&num.l, &mut x); // x = L\x
        usolve(&num.u, &mut x); // x = U\x
        ipvec(&s.q, &x, rhs); // b = Q*x
        check_finite(rhs)
    }
}

fn ipvec_identity<T: Numeric<T>>(b: &[T], x: &mut [T]) {
    x.copy_from_slice(b);
}

fn ipvec_perm<T: Numeric<T>>(p: &[isize], b: &[T], x: &mut [T]) {
    for k in 0..b.len() {
        x[p[k] as usize] = b[k];
    }
}

fn ipvec<T: Numeric<T>>(p: &Option<Vec<isize>>, b: &[T], x: &mut [T]) {
    match p {
        Some(pvec) => ipvec_perm(pvec, b, x),
        None => ipvec_identity(b, x),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rsparse_contract() {
        crate::basic::solver::tests::exercise(&mut RSparseSolver);
    }
}
