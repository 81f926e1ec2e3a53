pub mod branch_flow;
pub mod complex;
pub mod ecs;
pub mod error;
pub mod method;
pub(crate) mod newton_rect;
pub(crate) mod newtonpf;
pub mod solver;
pub mod system;

pub use method::{Method, NewtonMethod, Polar, Rectangular, SolveOptions, SolveReport};
pub use newton_rect::newton_rect;
pub use newtonpf::newton_pf;

/// Small networks shared by the solver tests.
#[cfg(test)]
pub(crate) mod fixtures {
    use nalgebra::{DMatrix, DVector};
    use num_complex::Complex64;

    use super::system::{BranchData, BusType, NodeData, injected_power};

    fn series(r: f64, x: f64) -> Complex64 {
        Complex64::new(1.0, 0.0) / Complex64::new(r, x)
    }

    /// A load fed by the slack through one line.
    pub(crate) fn two_bus() -> (Vec<NodeData>, Vec<BranchData>) {
        let nodes = vec![
            NodeData::pq("load", Complex64::new(-0.5, -0.2)),
            NodeData::slack("grid", 1.0, 0.0),
        ];
        let branches = vec![BranchData::new("line", "grid", "load", series(0.01, 0.1))];
        (nodes, branches)
    }

    /// A meshed case with one load, one PV generator and the slack.
    pub(crate) fn three_bus_pv() -> (Vec<NodeData>, Vec<BranchData>) {
        let nodes = vec![
            NodeData::pq("load", Complex64::new(-0.8, -0.3))
                .with_shunt(Complex64::new(0.0, 0.05)),
            NodeData::pv("gen", 0.4, 1.02),
            NodeData::slack("grid", 1.0, 0.0),
        ];
        let branches = vec![
            BranchData::new("l1", "grid", "load", series(0.02, 0.08)),
            BranchData::new("l2", "gen", "load", series(0.01, 0.05)),
            BranchData::new("l3", "grid", "gen", series(0.02, 0.1)),
        ];
        (nodes, branches)
    }

    /// `island` has no branch at all.
    pub(crate) fn isolated_bus() -> (Vec<NodeData>, Vec<BranchData>) {
        let nodes = vec![
            NodeData::pq("island", Complex64::new(-0.1, 0.0)),
            NodeData::pq("load", Complex64::new(-0.2, 0.0)),
            NodeData::slack("grid", 1.0, 0.0),
        ];
        let branches = vec![BranchData::new("line", "grid", "load", series(0.01, 0.1))];
        (nodes, branches)
    }

    /// Every scheduled quantity is met by the solved voltages.
    pub(crate) fn assert_power_balance(y_bus: &DMatrix<Complex64>, nodes: &[NodeData], tol: f64) {
        let v = DVector::from_iterator(nodes.len(), nodes.iter().map(|x| x.v));
        let s = injected_power(y_bus, &v);
        for (node, s) in nodes.iter().zip(s.iter()) {
            assert!(
                (node.s.re - s.re).abs() <= 10.0 * tol,
                "P mismatch at {}",
                node.name
            );
            match node.kind {
                BusType::PV => {
                    assert!((node.v.norm() - node.v_set).abs() <= 10.0 * tol);
                    assert!((node.s.im - s.im).abs() <= 10.0 * tol);
                }
                _ => assert!(
                    (node.s.im - s.im).abs() <= 10.0 * tol,
                    "Q mismatch at {}",
                    node.name
                ),
            }
        }
    }
}
