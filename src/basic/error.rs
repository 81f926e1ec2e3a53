use thiserror::Error;

use super::system::BusType;

/// Errors raised while assembling or solving a power flow case.
///
/// Topology and ordering problems are reported before the first iteration.
/// Non-convergence is not an error: it is reported through
/// [`SolveReport::converged`](super::method::SolveReport).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PowerFlowError {
    #[error("network has no buses")]
    EmptyNetwork,

    #[error("branch `{branch}` references unknown bus `{bus}`")]
    UnknownBus { branch: String, bus: String },

    #[error("bus name `{0}` is not unique")]
    DuplicateBus(String),

    #[error("branch name `{0}` is not unique")]
    DuplicateBranch(String),

    #[error("expected exactly one slack bus, found {0}")]
    SlackCount(usize),

    #[error("bus `{name}` at position {index} breaks the PQ, PV, Slack ordering")]
    OrderingViolation { index: usize, name: String },

    #[error("admittance matrix is {found}x{found} but the network has {expected} buses")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("singular Jacobian at iteration {iteration}")]
    SingularJacobian { iteration: usize },

    #[error("mismatch is not finite at iteration {iteration}")]
    NonFinite { iteration: usize },

    #[error("bus type is locked as {0:?}")]
    TypeLocked(BusType),

    #[error("power flow has not been initialised")]
    NotInitialized,
}

/// Failure reported by a [`Solve`](super::solver::Solve) backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SolveError {
    #[error("matrix is singular")]
    Singular,

    #[error("factorization failed: {0}")]
    Factorization(&'static str),

    #[error("system is {rows}x{cols} with a right-hand side of length {rhs}")]
    Dimension { rows: usize, cols: usize, rhs: usize },
}
