use std::collections::HashMap;

use nalgebra::DMatrix;
use nalgebra_sparse::{CooMatrix, CsrMatrix};
use num_complex::Complex64;
use num_traits::One;

use super::{BranchData, NodeData};
use crate::basic::error::PowerFlowError;

/// Maps bus names to table rows, rejecting duplicates.
fn index_nodes(nodes: &[NodeData]) -> Result<HashMap<&str, usize>, PowerFlowError> {
    let mut index = HashMap::with_capacity(nodes.len());
    for (idx, node) in nodes.iter().enumerate() {
        if index.insert(node.name.as_str(), idx).is_some() {
            return Err(PowerFlowError::DuplicateBus(node.name.clone()));
        }
    }
    Ok(index)
}

/// Creates the bus-branch incidence matrix: `+1` at the from bus, `-1` at the to bus.
fn create_incidence_mat(
    index: &HashMap<&str, usize>,
    nodes: usize,
    branches: &[BranchData],
) -> Result<CooMatrix<Complex64>, PowerFlowError> {
    let mut incidence_matrix = CooMatrix::new(nodes, branches.len());
    for (idx, br) in branches.iter().enumerate() {
        for (bus, sign) in [(&br.from, 1.0), (&br.to, -1.0)] {
            let row = *index
                .get(bus.as_str())
                .ok_or_else(|| PowerFlowError::UnknownBus {
                    branch: br.name.clone(),
                    bus: bus.clone(),
                })?;
            incidence_matrix.push(row, idx, Complex64::one() * sign);
        }
    }
    Ok(incidence_matrix)
}

/// Creates the nodal admittance matrix of an ordered working table.
///
/// The branch part is `A · diag(y) · Aᵀ` with `A` the incidence matrix, so
/// parallel branches between the same pair of buses accumulate. Each bus then
/// adds its own shunt admittance to the diagonal. Buses without branches keep
/// an empty row apart from their shunt term.
///
/// # Errors
///
/// * [`PowerFlowError::DuplicateBus`] if two rows share a name.
/// * [`PowerFlowError::UnknownBus`] if a branch names a bus that is not in `nodes`.
pub fn derive_y_matrix(
    nodes: &[NodeData],
    branches: &[BranchData],
) -> Result<DMatrix<Complex64>, PowerFlowError> {
    let n = nodes.len();
    let index = index_nodes(nodes)?;
    let incidence_matrix = create_incidence_mat(&index, n, branches)?;

    let mut y_bus = if branches.is_empty() {
        DMatrix::zeros(n, n)
    } else {
        let mut diag_admit = CsrMatrix::identity(branches.len());
        diag_admit
            .values_mut()
            .iter_mut()
            .zip(branches)
            .for_each(|(x, br)| *x = br.y);
        let incidence_matrix = CsrMatrix::from(&incidence_matrix);
        let y_br = &incidence_matrix * (diag_admit * incidence_matrix.transpose());
        DMatrix::from(&y_br)
    };

    for (idx, node) in nodes.iter().enumerate() {
        y_bus[(idx, idx)] += node.ys;
    }
    Ok(y_bus)
}
