//! Flat working tables shared by the admittance assembly and both Newton
//! variants.
//!
//! The ECS world is the owner of buses and branches; before a solve their
//! state is copied into a `Vec<NodeData>` laid out PQ → PV → Slack, and the
//! solvers mutate that table in place.
pub mod admittance;

use nalgebra::{DMatrix, DVector};
use num_complex::Complex64;
use num_traits::Zero;
use serde::{Deserialize, Serialize};

use super::error::PowerFlowError;

/// Bus classification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BusType {
    /// Load bus: P and Q scheduled, |V| and θ unknown.
    #[default]
    PQ,
    /// Generator bus: P and |V| scheduled, Q and θ unknown.
    PV,
    /// Reference bus: |V| and θ fixed.
    Slack,
}

impl BusType {
    /// Position of the type in the working table.
    #[inline]
    pub fn rank(self) -> u8 {
        match self {
            BusType::PQ => 0,
            BusType::PV => 1,
            BusType::Slack => 2,
        }
    }
}

/// One row of the working table.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeData {
    pub name: String,
    pub kind: BusType,
    /// Scheduled net injection `(Pg - Pd) + j(Qg - Qd)` in per unit.
    pub s: Complex64,
    /// Complex bus voltage in per unit.
    pub v: Complex64,
    /// Voltage magnitude set-point for PV and Slack buses.
    pub v_set: f64,
    /// Shunt admittance to ground.
    pub ys: Complex64,
}

impl NodeData {
    pub fn pq(name: impl Into<String>, s: Complex64) -> Self {
        Self {
            name: name.into(),
            kind: BusType::PQ,
            s,
            v: Complex64::new(1.0, 0.0),
            v_set: 1.0,
            ys: Complex64::zero(),
        }
    }

    pub fn pv(name: impl Into<String>, p: f64, v_set: f64) -> Self {
        Self {
            name: name.into(),
            kind: BusType::PV,
            s: Complex64::new(p, 0.0),
            v: Complex64::new(v_set, 0.0),
            v_set,
            ys: Complex64::zero(),
        }
    }

    /// Reference bus at `v_set∠theta` (radians).
    pub fn slack(name: impl Into<String>, v_set: f64, theta: f64) -> Self {
        Self {
            name: name.into(),
            kind: BusType::Slack,
            s: Complex64::zero(),
            v: Complex64::from_polar(v_set, theta),
            v_set,
            ys: Complex64::zero(),
        }
    }

    pub fn with_shunt(mut self, ys: Complex64) -> Self {
        self.ys = ys;
        self
    }
}

/// A series element between two named buses.
#[derive(Debug, Clone, PartialEq)]
pub struct BranchData {
    pub name: String,
    pub from: String,
    pub to: String,
    pub y: Complex64,
}

impl BranchData {
    pub fn new(
        name: impl Into<String>,
        from: impl Into<String>,
        to: impl Into<String>,
        y: Complex64,
    ) -> Self {
        Self {
            name: name.into(),
            from: from.into(),
            to: to.into(),
            y,
        }
    }
}

/// Sizes of the contiguous PQ and PV blocks of an ordered table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusCounts {
    pub npq: usize,
    pub npv: usize,
}

/// Returns the row permutation (new → old) that lays `kinds` out PQ, PV,
/// Slack while keeping the relative order inside each group.
pub fn ordering_permutation(kinds: &[BusType]) -> Vec<usize> {
    let mut perm: Vec<usize> = (0..kinds.len()).collect();
    perm.sort_by_key(|&i| kinds[i].rank());
    perm
}

/// Validates that `nodes` is ordered PQ → PV → Slack with exactly one slack.
pub fn check_ordering(nodes: &[NodeData]) -> Result<BusCounts, PowerFlowError> {
    if nodes.is_empty() {
        return Err(PowerFlowError::EmptyNetwork);
    }
    let slacks = nodes.iter().filter(|x| x.kind == BusType::Slack).count();
    if slacks != 1 {
        return Err(PowerFlowError::SlackCount(slacks));
    }
    for (idx, pair) in nodes.windows(2).enumerate() {
        if pair[1].kind.rank() < pair[0].kind.rank() {
            return Err(PowerFlowError::OrderingViolation {
                index: idx + 1,
                name: pair[1].name.clone(),
            });
        }
    }
    let npq = nodes.iter().filter(|x| x.kind == BusType::PQ).count();
    let npv = nodes.iter().filter(|x| x.kind == BusType::PV).count();
    Ok(BusCounts { npq, npv })
}

/// A non-slack bus whose admittance row is entirely zero has no defined
/// operating point and makes every Jacobian singular.
pub(crate) fn check_isolated(
    y_bus: &DMatrix<Complex64>,
    nodes: &[NodeData],
) -> Result<(), PowerFlowError> {
    if y_bus.nrows() != nodes.len() || y_bus.ncols() != nodes.len() {
        return Err(PowerFlowError::DimensionMismatch {
            expected: nodes.len(),
            found: y_bus.nrows(),
        });
    }
    for (i, node) in nodes.iter().enumerate() {
        if node.kind != BusType::Slack && y_bus.row(i).iter().all(|y| y.is_zero()) {
            tracing::warn!(bus = %node.name, "bus has no connection to the network");
            return Err(PowerFlowError::SingularJacobian { iteration: 0 });
        }
    }
    Ok(())
}

/// Complex power injected at each bus, `S = V ∘ conj(Y·V)`.
pub fn injected_power(y_bus: &DMatrix<Complex64>, v: &DVector<Complex64>) -> DVector<Complex64> {
    let current = y_bus * v;
    v.zip_map(&current, |v, i| v * i.conj())
}

/// Writes solved reactive power into PV rows and solved P and Q into the slack
/// row; PV voltages are pinned back to their set-point at the solved angle.
pub(crate) fn recover_injections(nodes: &mut [NodeData], s_calc: &DVector<Complex64>) {
    for (node, s) in nodes.iter_mut().zip(s_calc.iter()) {
        match node.kind {
            BusType::PQ => {}
            BusType::PV => {
                node.s.im = s.im;
                node.v = Complex64::from_polar(node.v_set, node.v.arg());
            }
            BusType::Slack => node.s = *s,
        }
    }
}

/// Largest absolute entry; `None` when any entry is not finite.
pub(crate) fn max_abs(values: &DVector<f64>) -> Option<f64> {
    values.iter().try_fold(0.0_f64, |acc, x| {
        if x.is_finite() {
            Some(acc.max(x.abs()))
        } else {
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> Vec<NodeData> {
        vec![
            NodeData::pq("a", Complex64::new(-0.1, 0.0)),
            NodeData::pq("b", Complex64::new(-0.2, 0.0)),
            NodeData::pv("c", 0.3, 1.02),
            NodeData::slack("d", 1.0, 0.0),
        ]
    }

    #[test]
    fn ordered_table_counts_blocks() {
        let counts = check_ordering(&table()).unwrap();
        assert_eq!(counts, BusCounts { npq: 2, npv: 1 });
    }

    #[test]
    fn slack_in_the_middle_is_rejected() {
        let mut nodes = table();
        nodes.swap(2, 3);
        assert_eq!(
            check_ordering(&nodes),
            Err(PowerFlowError::OrderingViolation {
                index: 3,
                name: "c".into()
            })
        );
    }

    #[test]
    fn slack_count_is_checked() {
        let mut nodes = table();
        nodes.pop();
        assert_eq!(check_ordering(&nodes), Err(PowerFlowError::SlackCount(0)));
        assert_eq!(check_ordering(&[]), Err(PowerFlowError::EmptyNetwork));
    }

    #[test]
    fn permutation_groups_by_type() {
        let kinds = [BusType::Slack, BusType::PV, BusType::PQ, BusType::PQ];
        assert_eq!(ordering_permutation(&kinds), vec![2, 3, 1, 0]);
    }

    #[test]
    fn max_abs_flags_nan() {
        assert_eq!(max_abs(&DVector::from_vec(vec![0.5, -2.0])), Some(2.0));
        assert_eq!(max_abs(&DVector::from_vec(vec![0.5, f64::NAN])), None);
        assert_eq!(max_abs(&DVector::zeros(0)), Some(0.0));
    }
}
