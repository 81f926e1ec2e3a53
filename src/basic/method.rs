use nalgebra::DMatrix;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use super::{
    error::PowerFlowError, newton_rect::newton_rect, newtonpf::newton_pf, solver::Solve,
    system::NodeData,
};

/// Iteration limits shared by both Newton variants.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolveOptions {
    /// Maximum number of corrective iterations.
    pub max_it: usize,
    /// Convergence threshold on the largest absolute mismatch.
    pub tol: f64,
    /// Rectangular variant only: drop the off-diagonal admittances of PV
    /// buses before recovering the final PV and slack injections.
    pub isolate_pv_on_recovery: bool,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            max_it: 100,
            tol: 1e-6,
            isolate_pv_on_recovery: false,
        }
    }
}

/// Outcome of a solve that did not hit a hard numerical failure.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolveReport {
    pub converged: bool,
    /// Number of corrective iterations applied.
    pub iterations: usize,
    /// Largest absolute mismatch at the last evaluated state.
    pub max_mismatch: f64,
}

/// A Newton-Raphson formulation operating on an ordered working table.
///
/// Implementations share one contract: `nodes` must be ordered PQ → PV →
/// Slack with exactly one slack and `y_bus` must be its admittance matrix.
/// On return `nodes` holds the last iterate; when converged, PV rows carry the
/// solved Q and the slack row the solved P and Q.
pub trait NewtonMethod {
    fn solve<S: Solve>(
        &self,
        y_bus: &DMatrix<Complex64>,
        nodes: &mut [NodeData],
        opts: &SolveOptions,
        solver: &mut S,
    ) -> Result<SolveReport, PowerFlowError>;
}

/// Unknowns are the real and imaginary parts of each bus voltage.
#[derive(Debug, Default, Clone, Copy)]
pub struct Rectangular;

/// Unknowns are voltage angles and relative magnitude corrections.
#[derive(Debug, Default, Clone, Copy)]
pub struct Polar;

impl NewtonMethod for Rectangular {
    fn solve<S: Solve>(
        &self,
        y_bus: &DMatrix<Complex64>,
        nodes: &mut [NodeData],
        opts: &SolveOptions,
        solver: &mut S,
    ) -> Result<SolveReport, PowerFlowError> {
        newton_rect(y_bus, nodes, opts, solver)
    }
}

impl NewtonMethod for Polar {
    fn solve<S: Solve>(
        &self,
        y_bus: &DMatrix<Complex64>,
        nodes: &mut [NodeData],
        opts: &SolveOptions,
        solver: &mut S,
    ) -> Result<SolveReport, PowerFlowError> {
        newton_pf(y_bus, nodes, opts, solver)
    }
}

/// Runtime selection between the two formulations.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Method {
    Rectangular,
    #[default]
    Polar,
}

impl NewtonMethod for Method {
    fn solve<S: Solve>(
        &self,
        y_bus: &DMatrix<Complex64>,
        nodes: &mut [NodeData],
        opts: &SolveOptions,
        solver: &mut S,
    ) -> Result<SolveReport, PowerFlowError> {
        match self {
            Method::Rectangular => Rectangular.solve(y_bus, nodes, opts, solver),
            Method::Polar => Polar.solve(y_bus, nodes, opts, solver),
        }
    }
}
