pub mod elements;
pub mod network;
pub mod plugin;
pub mod post_processing;
pub mod systems;

pub mod prelude {
    pub use super::elements::*;
    pub use super::network::{DataOps, PowerFlow, PowerGrid, SolverStage};
    pub use super::plugin::PowerFlowPlugin;
    pub use super::post_processing::PostProcessing;
    pub use super::systems::{PowerFlowConfig, PowerFlowMat, PowerFlowResult, PowerFlowSolver};
}
