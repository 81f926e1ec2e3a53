//! Post-solve branch quantities and generation bookkeeping.
use num_complex::Complex64;
use num_traits::Zero;
use serde::{Deserialize, Serialize};

/// Which terminal of a branch a bus sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    From,
    To,
}

/// Current, terminal powers and series loss of one branch.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BranchFlow {
    /// Series current from the `from` bus towards the `to` bus.
    pub current: Complex64,
    /// Power leaving the `from` bus into the branch.
    pub flow: Complex64,
    /// Power leaving the `to` bus into the branch, `-V_to · conj(I)`.
    pub flow_to: Complex64,
    /// Series loss, `|I|² / conj(y)`.
    ///
    /// The real part is the active loss. The imaginary part is
    /// `-|I|²·X`, the conjugate of the reactive power the branch absorbs.
    pub loss: Complex64,
}

impl BranchFlow {
    /// Power leaving the bus on `side` into the branch.
    #[inline]
    pub fn leaving(&self, side: Side) -> Complex64 {
        match side {
            Side::From => self.flow,
            Side::To => self.flow_to,
        }
    }
}

/// Computes the flow through a series admittance `y` between two voltages.
pub fn branch_flow(v_from: Complex64, v_to: Complex64, y: Complex64) -> BranchFlow {
    let current = (v_from - v_to) * y;
    let flow = v_from * current.conj();
    let flow_to = -v_to * current.conj();
    let loss = if y.is_zero() {
        Complex64::zero()
    } else {
        current.norm_sqr() / y.conj()
    };
    BranchFlow {
        current,
        flow,
        flow_to,
        loss,
    }
}

/// Sum of the series losses of every branch.
pub fn total_loss<'a>(flows: impl IntoIterator<Item = &'a BranchFlow>) -> Complex64 {
    flows.into_iter().map(|x| x.loss).sum()
}

/// Reconstructs the power generated at a bus from the solved state.
///
/// Generation covers the local demand, the power absorbed by the shunt
/// admittance and everything leaving through incident branches.
pub fn generation<'a>(
    demand: Complex64,
    v: Complex64,
    ys: Complex64,
    incident: impl IntoIterator<Item = (Side, &'a BranchFlow)>,
) -> Complex64 {
    let shunt = v.norm_sqr() * ys.conj();
    incident
        .into_iter()
        .fold(demand + shunt, |acc, (side, flow)| acc + flow.leaving(side))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basic::{
        fixtures::*, method::SolveOptions, newton_pf, solver::DenseLuSolver,
        system::admittance::derive_y_matrix,
    };
    use approx::assert_abs_diff_eq;

    #[test]
    fn loss_matches_both_ends() {
        let y = Complex64::new(1.0, -10.0);
        let v1 = Complex64::from_polar(1.02, 0.0);
        let v2 = Complex64::from_polar(0.97, -0.05);
        let fwd = branch_flow(v1, v2, y);
        let back = branch_flow(v2, v1, y);
        assert!(fwd.loss.re > 0.0);
        // admittance-based loss carries -|I|²X on the imaginary part
        assert!(fwd.loss.im < 0.0);
        let absorbed = fwd.flow + fwd.flow_to;
        assert_abs_diff_eq!((fwd.loss - absorbed.conj()).norm(), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!((fwd.flow_to - back.flow).norm(), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!((fwd.loss - back.loss).norm(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn loss_uses_conjugate_admittance() {
        let y = Complex64::new(1.0, 0.0) / Complex64::new(0.01, 0.1);
        let flow = branch_flow(
            Complex64::new(1.0, 0.0),
            Complex64::from_polar(0.95, -0.05),
            y,
        );
        assert_abs_diff_eq!(flow.loss.re, 0.004826, epsilon = 1e-6);
        assert_abs_diff_eq!(flow.loss.im, -0.048262, epsilon = 1e-6);
    }

    #[test]
    fn open_branch_carries_nothing() {
        let flow = branch_flow(Complex64::new(1.0, 0.0), Complex64::zero(), Complex64::zero());
        assert_eq!(flow, BranchFlow::default());
    }

    #[test]
    fn generation_balances_solved_case() {
        let (mut nodes, branches) = two_bus();
        let y_bus = derive_y_matrix(&nodes, &branches).unwrap();
        newton_pf(&y_bus, &mut nodes, &SolveOptions::default(), &mut DenseLuSolver).unwrap();
        let (load, grid) = (&nodes[0], &nodes[1]);
        let flow = branch_flow(grid.v, load.v, branches[0].y);

        let sg_grid = generation(Complex64::zero(), grid.v, grid.ys, [(Side::From, &flow)]);
        assert_abs_diff_eq!((sg_grid - grid.s).norm(), 0.0, epsilon = 1e-9);

        let demand = -load.s;
        let sg_load = generation(demand, load.v, load.ys, [(Side::To, &flow)]);
        assert_abs_diff_eq!(sg_load.norm(), 0.0, epsilon = 1e-5);

        let loss = total_loss([&flow]);
        assert_abs_diff_eq!(loss.re, (grid.s + load.s).re, epsilon = 1e-5);
        assert_abs_diff_eq!(loss.im, -(grid.s + load.s).im, epsilon = 1e-5);
    }
}
