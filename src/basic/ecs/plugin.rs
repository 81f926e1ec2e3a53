use bevy_app::prelude::*;
use bevy_ecs::prelude::*;

use super::{elements::*, network::SolverStage, systems::*};

/// Registers the resources and the three solver stages of a power flow run.
///
/// Every `update` rebuilds the working table from the world
/// ([`SolverStage::BeforeSolve`]), runs the configured Newton formulation
/// ([`SolverStage::Solve`]) and, when the solve did not fail hard, writes the
/// voltages back and recovers branch and generation results
/// ([`SolverStage::AfterSolve`]).
pub struct PowerFlowPlugin;

impl Plugin for PowerFlowPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<PowerFlowConfig>()
            .init_resource::<PowerFlowSolver>()
            .init_resource::<PowerFlowResult>()
            .init_resource::<PFCommonData>()
            .init_resource::<NodeLookup>()
            .init_resource::<BranchLookup>();

        app.configure_sets(
            Update,
            (
                SolverStage::BeforeSolve,
                SolverStage::Solve,
                SolverStage::AfterSolve,
            )
                .chain(),
        );
        app.add_systems(Update, init_states.in_set(SolverStage::BeforeSolve));
        app.add_systems(
            Update,
            ecs_run_pf
                .run_if(resource_exists::<PowerFlowMat>)
                .in_set(SolverStage::Solve),
        );
        app.add_systems(
            Update,
            (write_back_states, extract_res_branch, extract_res_bus)
                .chain()
                .run_if(solve_finished)
                .in_set(SolverStage::AfterSolve),
        );
    }
}
