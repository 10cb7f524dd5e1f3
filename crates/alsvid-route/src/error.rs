//! Error types for the routing core.

use alsvid_ir::IrError;
use thiserror::Error;

/// Errors that can occur during routing.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RouteError {
    /// A quantum gate with three or more qubit operands reached the router.
    #[error("gate '{0}' has more than two qubit operands; decompose such gates before routing")]
    TooManyOperands(String),

    /// No variant of a required gate exists in the platform gate table.
    #[error("platform defines no '{0}' (nor a '{0}_prim' or '{0}_real' variant)")]
    MissingGate(String),

    /// Two real qubits have no connecting path in the topology.
    #[error("no path between real qubits {0} and {1} in the topology")]
    Disconnected(u32, u32),

    /// The selected heuristic has no defined semantics.
    #[error("heuristic '{0}' is not supported")]
    UnsupportedHeuristic(String),

    /// The initial-placement solver hit its time limit and the caller asked
    /// for that to be fatal.
    #[error("initial placement timed out after {0} seconds")]
    PlacementTimeout(u64),

    /// The block references more virtual qubits than the platform has reals.
    #[error("block uses qubit {index} but the platform has {num_qubits} qubits")]
    QubitOutOfRange {
        /// The offending virtual index.
        index: u32,
        /// Number of real qubits on the platform.
        num_qubits: u32,
    },

    /// Error bubbled up from instruction construction.
    #[error(transparent)]
    Ir(#[from] IrError),
}

/// Result type for routing operations.
pub type RouteResult<T> = Result<T, RouteError>;
