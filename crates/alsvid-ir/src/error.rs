//! Error types for the IR crate.

use thiserror::Error;

/// Errors that can occur in IR operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum IrError {
    /// No instruction with the given name exists in the platform gate table.
    #[error("instruction '{0}' is not defined by the platform")]
    UnknownInstruction(String),

    /// Instruction applied to the wrong number of qubits.
    #[error("instruction '{name}' requires {expected} qubit operands, got {got}")]
    OperandCountMismatch {
        /// Name of the instruction.
        name: String,
        /// Expected number of qubit operands.
        expected: usize,
        /// Actual number of qubit operands provided.
        got: usize,
    },

    /// Qubit index out of range for the platform.
    #[error("qubit index {index} out of range (platform has {num_qubits} qubits)")]
    QubitOutOfRange {
        /// The offending index.
        index: u32,
        /// Number of qubits on the platform.
        num_qubits: u32,
    },

    /// A decomposition rule references an operand its parent does not have.
    #[error("decomposition of '{name}' references operand %{operand} but the gate has {arity}")]
    BadDecomposition {
        /// Name of the composite instruction.
        name: String,
        /// The out-of-range template operand.
        operand: usize,
        /// Arity of the composite.
        arity: usize,
    },

    /// Decomposition rules form a cycle.
    #[error("decomposition of '{0}' does not terminate (cyclic rules)")]
    CyclicDecomposition(String),
}

/// Result type for IR operations.
pub type IrResult<T> = Result<T, IrError>;
