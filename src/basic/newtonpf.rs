//! Newton-Raphson power flow in polar coordinates.
use nalgebra::{DMatrix, DVector};
use num_complex::Complex64;
use tracing::{debug, info, warn};

use super::{
    complex::RealImage,
    error::PowerFlowError,
    method::{SolveOptions, SolveReport},
    solver::Solve,
    system::{
        NodeData, check_isolated, check_ordering, injected_power, max_abs, recover_injections,
    },
};

/// Solves the power flow of an ordered working table in polar form.
///
/// The state is `[θ_1 .. θ_m, ΔV/V for each PQ bus]` with `m = n - 1`. The
/// mismatch `ΔS = S_sched - S_calc` stacks the active mismatch of every
/// non-slack bus on top of the reactive mismatch of every PQ bus, and each
/// iteration solves `J · Δx = -ΔS` with `J = ∂ΔS/∂x`.
///
/// PV reactive power and slack power are refreshed from the current voltages
/// at every mismatch evaluation, so a non-converged run still leaves a
/// consistent last iterate in `nodes`.
#[allow(non_snake_case)]
pub fn newton_pf<S: Solve>(
    y_bus: &DMatrix<Complex64>,
    nodes: &mut [NodeData],
    opts: &SolveOptions,
    solver: &mut S,
) -> Result<SolveReport, PowerFlowError> {
    let counts = check_ordering(nodes)?;
    check_isolated(y_bus, nodes)?;
    let n = nodes.len();
    let m = n - 1;
    let npq = counts.npq;
    info!(buses = n, npq, npv = counts.npv, "polar Newton-Raphson");

    let (G, B) = y_bus.real_imag();
    let mut Vm: Vec<f64> = nodes.iter().map(|x| x.v.norm()).collect();
    let mut Va: Vec<f64> = nodes.iter().map(|x| x.v.arg()).collect();
    let mut iterations = 0;
    loop {
        let v = DVector::from_iterator(
            n,
            Vm.iter().zip(&Va).map(|(&r, &a)| Complex64::from_polar(r, a)),
        );
        let s_calc = injected_power(y_bus, &v);
        for (node, v) in nodes.iter_mut().zip(v.iter()) {
            node.v = *v;
        }
        recover_injections(nodes, &s_calc);

        let mut F = DVector::zeros(m + npq);
        for i in 0..m {
            F[i] = nodes[i].s.re - s_calc[i].re;
        }
        for i in 0..npq {
            F[m + i] = nodes[i].s.im - s_calc[i].im;
        }
        let max_mismatch =
            max_abs(&F).ok_or(PowerFlowError::NonFinite { iteration: iterations })?;
        debug!(iteration = iterations, max_mismatch, "polar mismatch");

        if max_mismatch <= opts.tol {
            info!(iterations, max_mismatch, "polar solve converged");
            return Ok(SolveReport {
                converged: true,
                iterations,
                max_mismatch,
            });
        }
        if iterations >= opts.max_it {
            warn!(iterations, max_mismatch, "polar solve did not converge");
            return Ok(SolveReport {
                converged: false,
                iterations,
                max_mismatch,
            });
        }

        let jacobian = polar_jacobian(&G, &B, &Vm, &Va, &s_calc, m, npq);
        let mut dx = -F;
        solver.solve(&jacobian, &mut dx).map_err(|err| {
            warn!(iteration = iterations, %err, "correction step failed");
            PowerFlowError::SingularJacobian {
                iteration: iterations,
            }
        })?;
        for i in 0..m {
            Va[i] += dx[i];
        }
        for i in 0..npq {
            Vm[i] += Vm[i] * dx[m + i];
        }
        iterations += 1;
    }
}

/// Jacobian of `S_sched - S_calc` over angles and relative PQ magnitudes.
///
/// ```text
///        θ_j            ΔV_j/V_j
/// P_i  [ H ]           [ N ]
/// Q_i  [ J ]           [ L ]
/// ```
fn polar_jacobian(
    g_bus: &DMatrix<f64>,
    b_bus: &DMatrix<f64>,
    vm: &[f64],
    va: &[f64],
    s_calc: &DVector<Complex64>,
    m: usize,
    npq: usize,
) -> DMatrix<f64> {
    let mut jac = DMatrix::zeros(m + npq, m + npq);
    for i in 0..m {
        let (p, q) = (s_calc[i].re, s_calc[i].im);
        for j in 0..m {
            let (g, b) = (g_bus[(i, j)], b_bus[(i, j)]);
            let (h, nn, jj, l) = if i == j {
                let vi2 = vm[i] * vm[i];
                (vi2 * b + q, -vi2 * g - p, vi2 * g - p, vi2 * b - q)
            } else {
                let vv = vm[i] * vm[j];
                let (sin, cos) = (va[i] - va[j]).sin_cos();
                let gs_bc = vv * (g * sin - b * cos);
                let gc_bs = vv * (g * cos + b * sin);
                (-gs_bc, -gc_bs, gc_bs, -gs_bc)
            };
            jac[(i, j)] = h;
            if j < npq {
                jac[(i, m + j)] = nn;
            }
            if i < npq {
                jac[(m + i, j)] = jj;
                if j < npq {
                    jac[(m + i, m + j)] = l;
                }
            }
        }
    }
    jac
}
