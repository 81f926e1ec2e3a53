use std::collections::HashMap;

use bevy_ecs::{name::Name, prelude::*};
use nalgebra::{DMatrix, DVector};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::elements::*;
use crate::basic::{
    branch_flow::{branch_flow, generation, total_loss},
    error::PowerFlowError,
    method::{Method, NewtonMethod, SolveOptions, SolveReport},
    solver::DefaultSolver,
    system::{
        BranchData, BusType, NodeData, admittance::derive_y_matrix, check_ordering,
        injected_power, ordering_permutation,
    },
};

/// Resource that holds the power flow configuration options, such as the
/// maximum iterations, tolerance for convergence and the formulation to use.
#[derive(Debug, Default, Resource, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerFlowConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_it: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tol: Option<f64>,
    #[serde(default)]
    pub method: Method,
    /// Rectangular only: recover PV and slack power with PV buses decoupled
    /// from their neighbours.
    #[serde(default)]
    pub isolate_pv_on_recovery: bool,
}

impl PowerFlowConfig {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn options(&self) -> SolveOptions {
        let defaults = SolveOptions::default();
        SolveOptions {
            max_it: self.max_it.unwrap_or(defaults.max_it),
            tol: self.tol.unwrap_or(defaults.tol),
            isolate_pv_on_recovery: self.isolate_pv_on_recovery,
        }
    }
}

#[derive(Default, Resource)]
pub struct PowerFlowSolver {
    pub solver: DefaultSolver,
}

/// Flat working table of the current solve.
///
/// `order[i]` is the bus entity behind row `i` of `nodes` and `y_bus`; rows are
/// laid out PQ → PV → Slack and by insertion index inside each group.
#[derive(Debug, Resource, Clone)]
pub struct PowerFlowMat {
    pub nodes: Vec<NodeData>,
    pub y_bus: DMatrix<Complex64>,
    pub order: Vec<Entity>,
}

impl PowerFlowMat {
    pub fn npq(&self) -> usize {
        self.nodes.iter().filter(|x| x.kind == BusType::PQ).count()
    }

    pub fn npv(&self) -> usize {
        self.nodes.iter().filter(|x| x.kind == BusType::PV).count()
    }
}

/// Outcome of the last `run_pf` and the network-wide loss.
#[derive(Debug, Default, Resource, Clone)]
pub struct PowerFlowResult {
    pub outcome: Option<Result<SolveReport, PowerFlowError>>,
    pub total_loss: Complex64,
}

impl PowerFlowResult {
    pub fn converged(&self) -> bool {
        matches!(self.outcome, Some(Ok(SolveReport { converged: true, .. })))
    }
}

type BusState = (
    Entity,
    &'static Name,
    &'static BusID,
    &'static BusKind,
    &'static PowerSchedule,
    &'static VBusPu,
    &'static VSetpoint,
    &'static ShuntAdmittance,
);
type BranchState = (
    &'static Name,
    &'static BranchID,
    &'static Admittance,
    &'static Terminals,
);

fn initial_voltage(kind: BusType, v: &VBusPu, v_set: &VSetpoint) -> Complex64 {
    match kind {
        BusType::PQ => v.0,
        BusType::PV => Complex64::from_polar(v_set.vm, v.0.arg()),
        BusType::Slack => Complex64::from_polar(v_set.vm, v_set.va),
    }
}

/// Builds the ordered working table and its admittance matrix.
pub(crate) fn build_tables(
    buses: &Query<BusState>,
    branches: &Query<BranchState>,
) -> Result<PowerFlowMat, PowerFlowError> {
    let mut rows: Vec<_> = buses.iter().collect();
    rows.sort_by_key(|x| *x.2);
    let kinds: Vec<_> = rows.iter().map(|x| x.3.kind()).collect();
    let perm = ordering_permutation(&kinds);

    let mut nodes = Vec::with_capacity(rows.len());
    let mut order = Vec::with_capacity(rows.len());
    for &(entity, name, _, kind, schedule, v, v_set, ys) in perm.iter().map(|&i| &rows[i]) {
        nodes.push(NodeData {
            name: name.as_str().to_owned(),
            kind: kind.kind(),
            s: schedule.net(),
            v: initial_voltage(kind.kind(), v, v_set),
            v_set: v_set.vm,
            ys: ys.0,
        });
        order.push(entity);
    }
    check_ordering(&nodes)?;

    let names: HashMap<Entity, &str> = rows.iter().map(|x| (x.0, x.1.as_str())).collect();
    let mut lines: Vec<_> = branches.iter().collect();
    lines.sort_by_key(|x| *x.1);
    let mut branch_data = Vec::with_capacity(lines.len());
    for (name, _, y, t) in lines {
        let end = |e: Entity| {
            names
                .get(&e)
                .map(|x| x.to_string())
                .ok_or_else(|| PowerFlowError::UnknownBus {
                    branch: name.as_str().to_owned(),
                    bus: format!("{e}"),
                })
        };
        branch_data.push(BranchData::new(name.as_str(), end(t.from)?, end(t.to)?, y.0));
    }

    let y_bus = derive_y_matrix(&nodes, &branch_data)?;
    Ok(PowerFlowMat {
        nodes,
        y_bus,
        order,
    })
}

/// Rebuilds the working table from the current world state.
pub fn init_states(
    mut cmd: Commands,
    buses: Query<BusState>,
    branches: Query<BranchState>,
    mut res: ResMut<PowerFlowResult>,
) {
    res.outcome = None;
    res.total_loss = Complex64::default();
    match build_tables(&buses, &branches) {
        Ok(mat) => {
            debug!(buses = mat.nodes.len(), npq = mat.npq(), npv = mat.npv(), "tables built");
            cmd.insert_resource(mat);
        }
        Err(err) => {
            cmd.remove_resource::<PowerFlowMat>();
            res.outcome = Some(Err(err));
        }
    }
}

/// Runs the configured Newton formulation on the working table.
pub fn ecs_run_pf(
    mut mat: ResMut<PowerFlowMat>,
    cfg: Res<PowerFlowConfig>,
    mut solver: ResMut<PowerFlowSolver>,
    mut res: ResMut<PowerFlowResult>,
) {
    let opts = cfg.options();
    info!(method = ?cfg.method, buses = mat.nodes.len(), "running power flow");
    let PowerFlowMat { nodes, y_bus, .. } = &mut *mat;
    res.outcome = Some(cfg.method.solve(y_bus, nodes, &opts, &mut solver.solver));
}

pub fn solve_finished(res: Res<PowerFlowResult>) -> bool {
    matches!(res.outcome, Some(Ok(_)))
}

/// Copies voltages and computed injections back onto the bus entities.
///
/// Once converged, PV reactive generation and slack generation are updated so
/// that the schedule reproduces the solved injection.
pub fn write_back_states(
    mat: Res<PowerFlowMat>,
    res: Res<PowerFlowResult>,
    mut q: Query<(&BusKind, &mut VBusPu, &mut PowerSchedule, &mut SBusResult)>,
) {
    let converged = res.converged();
    let v = DVector::from_iterator(mat.nodes.len(), mat.nodes.iter().map(|x| x.v));
    let s_calc = injected_power(&mat.y_bus, &v);
    for ((node, entity), s) in mat.nodes.iter().zip(&mat.order).zip(s_calc.iter()) {
        let Ok((kind, mut v_bus, mut schedule, mut s_res)) = q.get_mut(*entity) else {
            continue;
        };
        v_bus.0 = node.v;
        s_res.0 = *s;
        if !converged {
            continue;
        }
        match kind.kind() {
            BusType::PQ => {}
            BusType::PV => schedule.generation.im = node.s.im + schedule.demand.im,
            BusType::Slack => schedule.generation = node.s + schedule.demand,
        }
    }
}

/// Recovers current, flow and loss of every branch.
pub fn extract_res_branch(
    mut branches: Query<(&Admittance, &Terminals, &mut BranchResult)>,
    buses: Query<&VBusPu>,
    mut res: ResMut<PowerFlowResult>,
) {
    for (y, t, mut result) in branches.iter_mut() {
        let (Ok(v_from), Ok(v_to)) = (buses.get(t.from), buses.get(t.to)) else {
            continue;
        };
        result.0 = branch_flow(v_from.0, v_to.0, y.0);
    }
    res.total_loss = total_loss(branches.iter().map(|x| &x.2.0));
}

/// Reconstructs the generation of every bus from the branch results.
pub fn extract_res_bus(
    mut buses: Query<(
        &VBusPu,
        &ShuntAdmittance,
        &PowerSchedule,
        &ConnectedBranches,
        &mut SGenResult,
    )>,
    branches: Query<&BranchResult>,
) {
    for (v, ys, schedule, connected, mut sg) in buses.iter_mut() {
        let incident = connected
            .iter()
            .filter_map(|(e, side)| branches.get(*e).ok().map(|r| (*side, &r.0)));
        sg.0 = generation(schedule.demand, v.0, ys.0, incident);
    }
}
