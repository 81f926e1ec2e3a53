//! Newton-Raphson power flow in rectangular coordinates.
//!
//! The unknowns of every non-slack bus `i` are `e_i = Re V_i` and
//! `f_i = Im V_i`. Equations and unknowns are interleaved per bus: row `2i`
//! is the reactive (PQ) or squared-magnitude (PV) mismatch, row `2i + 1` the
//! active mismatch; column `2j` is `e_j`, column `2j + 1` is `f_j`.
use nalgebra::{DMatrix, DVector};
use num_complex::Complex64;
use num_traits::Zero;
use tracing::{debug, info, warn};

use super::{
    error::PowerFlowError,
    method::{SolveOptions, SolveReport},
    solver::Solve,
    system::{
        BusType, NodeData, check_isolated, check_ordering, injected_power, max_abs,
        recover_injections,
    },
};

/// Solves the power flow of an ordered working table in rectangular form.
///
/// Each iteration solves `J · Δx = ΔS` with `J` the Jacobian of the mismatch
/// and applies `V ← V - Δx`. PV voltages are projected back onto their
/// magnitude set-point after every correction.
///
/// # Errors
///
/// * ordering and slack-count violations, before any iteration;
/// * [`PowerFlowError::SingularJacobian`] when the correction step cannot be
///   solved, with `nodes` left at the last iterate.
pub fn newton_rect<S: Solve>(
    y_bus: &DMatrix<Complex64>,
    nodes: &mut [NodeData],
    opts: &SolveOptions,
    solver: &mut S,
) -> Result<SolveReport, PowerFlowError> {
    check_ordering(nodes)?;
    check_isolated(y_bus, nodes)?;
    let n = nodes.len();
    let m = n - 1;
    info!(buses = n, tol = opts.tol, "rectangular Newton-Raphson");

    let mut v = DVector::from_iterator(n, nodes.iter().map(|x| x.v));
    let mut iterations = 0;
    loop {
        let current = y_bus * &v;
        let delta = rect_mismatch(nodes, &v, &current, m);
        let max_mismatch =
            max_abs(&delta).ok_or(PowerFlowError::NonFinite { iteration: iterations })?;
        debug!(iteration = iterations, max_mismatch, "rectangular mismatch");

        if max_mismatch <= opts.tol {
            let s_calc = if opts.isolate_pv_on_recovery {
                injected_power(&isolate_pv(y_bus, nodes), &v)
            } else {
                injected_power(y_bus, &v)
            };
            recover_injections(nodes, &s_calc);
            info!(iterations, max_mismatch, "rectangular solve converged");
            return Ok(SolveReport {
                converged: true,
                iterations,
                max_mismatch,
            });
        }
        if iterations >= opts.max_it {
            warn!(iterations, max_mismatch, "rectangular solve did not converge");
            return Ok(SolveReport {
                converged: false,
                iterations,
                max_mismatch,
            });
        }

        let jacobian = rect_jacobian(y_bus, nodes, &v, &current, m);
        let mut dx = delta;
        solver.solve(&jacobian, &mut dx).map_err(|err| {
            warn!(iteration = iterations, %err, "correction step failed");
            PowerFlowError::SingularJacobian {
                iteration: iterations,
            }
        })?;
        apply_corrections(nodes, &mut v, &dx, m);
        iterations += 1;
    }
}

/// Mismatch vector of length `2m` over the non-slack rows.
fn rect_mismatch(
    nodes: &[NodeData],
    v: &DVector<Complex64>,
    current: &DVector<Complex64>,
    m: usize,
) -> DVector<f64> {
    let mut delta = DVector::zeros(2 * m);
    for i in 0..m {
        let (e, f) = (v[i].re, v[i].im);
        let (a, b) = (current[i].re, current[i].im);
        let node = &nodes[i];
        delta[2 * i] = match node.kind {
            BusType::PV => node.v_set * node.v_set - (e * e + f * f),
            _ => node.s.im - (f * a - e * b),
        };
        delta[2 * i + 1] = node.s.re - (e * a + f * b);
    }
    delta
}

/// Jacobian of the mismatch with respect to `(e, f)`.
fn rect_jacobian(
    y_bus: &DMatrix<Complex64>,
    nodes: &[NodeData],
    v: &DVector<Complex64>,
    current: &DVector<Complex64>,
    m: usize,
) -> DMatrix<f64> {
    let mut jac = DMatrix::zeros(2 * m, 2 * m);
    for i in 0..m {
        let (e, f) = (v[i].re, v[i].im);
        let is_pv = nodes[i].kind == BusType::PV;
        for j in 0..m {
            let (g, b) = (y_bus[(i, j)].re, y_bus[(i, j)].im);
            let mut h = -(g * e + b * f);
            let mut n = b * e - g * f;
            let (mut jj, mut l) = if is_pv { (0.0, 0.0) } else { (n, -h) };
            if i == j {
                let (ca, cb) = (current[i].re, current[i].im);
                h -= ca;
                n -= cb;
                if is_pv {
                    jj = -2.0 * e;
                    l = -2.0 * f;
                } else {
                    jj += cb;
                    l -= ca;
                }
            }
            jac[(2 * i, 2 * j)] = jj;
            jac[(2 * i, 2 * j + 1)] = l;
            jac[(2 * i + 1, 2 * j)] = h;
            jac[(2 * i + 1, 2 * j + 1)] = n;
        }
    }
    jac
}

/// `V ← V - Δ` on non-slack rows, then PV magnitudes back to set-point.
///
/// PV buses take the full `(Δe, Δf)` step and are then projected onto
/// `|V| = V_set` at the corrected angle, instead of updating only the
/// imaginary part. Both reach the same fixed point; the projection keeps
/// the magnitude constraint exact at every iterate.
fn apply_corrections(
    nodes: &mut [NodeData],
    v: &mut DVector<Complex64>,
    dx: &DVector<f64>,
    m: usize,
) {
    for i in 0..m {
        let corrected = Complex64::new(v[i].re - dx[2 * i], v[i].im - dx[2 * i + 1]);
        v[i] = match nodes[i].kind {
            BusType::PV => Complex64::from_polar(nodes[i].v_set, corrected.arg()),
            _ => corrected,
        };
        nodes[i].v = v[i];
    }
}

/// Copy of `y_bus` without the mutual admittances of PV buses.
fn isolate_pv(y_bus: &DMatrix<Complex64>, nodes: &[NodeData]) -> DMatrix<Complex64> {
    let mut y = y_bus.clone();
    let n = nodes.len();
    for (i, _) in nodes
        .iter()
        .enumerate()
        .filter(|(_, x)| x.kind == BusType::PV)
    {
        for j in (0..n).filter(|&j| j != i) {
            y[(i, j)] = Complex64::zero();
            y[(j, i)] = Complex64::zero();
        }
    }
    y
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basic::{fixtures::*, solver::DenseLuSolver, system::admittance::derive_y_matrix};
    use approx::assert_abs_diff_eq;

    fn solve(nodes: &mut [NodeData], y_bus: &DMatrix<Complex64>) -> SolveReport {
        newton_rect(y_bus, nodes, &SolveOptions::default(), &mut DenseLuSolver).unwrap()
    }

    #[test]
    fn two_bus_voltage_drops_under_load() {
        let (mut nodes, branches) = two_bus();
        let y_bus = derive_y_matrix(&nodes, &branches).unwrap();
        let report = solve(&mut nodes, &y_bus);
        assert!(report.converged);
        assert!(report.iterations <= 10);
        assert!(nodes[0].v.norm() < 1.0);
        assert_power_balance(&y_bus, &nodes, 1e-6);
    }

    #[test]
    fn pv_bus_holds_set_point() {
        let (mut nodes, branches) = three_bus_pv();
        let y_bus = derive_y_matrix(&nodes, &branches).unwrap();
        let report = solve(&mut nodes, &y_bus);
        assert!(report.converged);
        assert_abs_diff_eq!(nodes[1].v.norm(), nodes[1].v_set, epsilon = 1e-9);
        assert_power_balance(&y_bus, &nodes, 1e-6);
    }

    #[test]
    fn converged_state_needs_no_iteration() {
        let (mut nodes, branches) = three_bus_pv();
        let y_bus = derive_y_matrix(&nodes, &branches).unwrap();
        solve(&mut nodes, &y_bus);
        let before: Vec<_> = nodes.iter().map(|x| x.v).collect();
        let again = solve(&mut nodes, &y_bus);
        assert!(again.converged);
        assert_eq!(again.iterations, 0);
        for (a, b) in before.iter().zip(&nodes) {
            assert_abs_diff_eq!((a - b.v).norm(), 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn isolated_bus_is_singular() {
        let (mut nodes, branches) = isolated_bus();
        let y_bus = derive_y_matrix(&nodes, &branches).unwrap();
        let err = newton_rect(&y_bus, &mut nodes, &SolveOptions::default(), &mut DenseLuSolver);
        assert!(matches!(err, Err(PowerFlowError::SingularJacobian { .. })));
    }

    #[test]
    fn iteration_cap_reports_non_convergence() {
        let (mut nodes, branches) = two_bus();
        let y_bus = derive_y_matrix(&nodes, &branches).unwrap();
        let opts = SolveOptions {
            max_it: 1,
            tol: 1e-14,
            ..Default::default()
        };
        let report = newton_rect(&y_bus, &mut nodes, &opts, &mut DenseLuSolver).unwrap();
        assert!(!report.converged);
        assert_eq!(report.iterations, 1);
        // the last iterate is kept
        assert!(nodes[0].v != Complex64::new(1.0, 0.0));
    }

    #[test]
    fn unordered_table_is_rejected() {
        let (mut nodes, branches) = three_bus_pv();
        let y_bus = derive_y_matrix(&nodes, &branches).unwrap();
        nodes.swap(1, 2);
        let err = newton_rect(&y_bus, &mut nodes, &SolveOptions::default(), &mut DenseLuSolver);
        assert!(matches!(err, Err(PowerFlowError::OrderingViolation { .. })));
    }

    #[test]
    fn pv_isolation_changes_recovered_q() {
        let (mut plain, branches) = three_bus_pv();
        let y_bus = derive_y_matrix(&plain, &branches).unwrap();
        let mut legacy = plain.clone();
        solve(&mut plain, &y_bus);
        let opts = SolveOptions {
            isolate_pv_on_recovery: true,
            ..Default::default()
        };
        newton_rect(&y_bus, &mut legacy, &opts, &mut DenseLuSolver).unwrap();
        // same operating point, different bookkeeping
        assert_abs_diff_eq!((plain[0].v - legacy[0].v).norm(), 0.0, epsilon = 1e-12);
        assert!((plain[1].s.im - legacy[1].s.im).abs() > 1e-3);
    }
}
