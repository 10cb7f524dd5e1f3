//! Instruction descriptors and instances.
//!
//! Every executable operation is described once by an immutable
//! [`InstructionType`] held in the platform's gate table, and instantiated
//! any number of times as an [`Instruction`] carrying concrete operand
//! indices. This keeps per-gate state small and makes cloning a scheduled
//! window cheap.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Classification of an instruction, as far as routing cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstrKind {
    /// A unitary quantum gate.
    Gate,
    /// State preparation (leaves the qubit in |0>).
    Prep,
    /// Measurement into a classical bit.
    Measure,
    /// Barrier / wait: quantum but never needs routing.
    Barrier,
    /// Classical statement; bypasses the quantum scheduling window.
    Classical,
}

/// One step of a decomposition template.
///
/// `operands` are indices into the composite's own operand list, so a
/// `swap` decomposing into three CNOTs is written as operand patterns
/// `[0,1]`, `[1,0]`, `[0,1]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateInstruction {
    /// Name of the sub-instruction, resolved against the gate table.
    pub name: String,
    /// Operand pattern (indices into the parent's qubit operands).
    pub operands: Vec<usize>,
}

impl TemplateInstruction {
    /// Create a template step.
    pub fn new(name: impl Into<String>, operands: impl IntoIterator<Item = usize>) -> Self {
        Self {
            name: name.into(),
            operands: operands.into_iter().collect(),
        }
    }
}

/// Immutable descriptor for an instruction, shared by all its instances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstructionType {
    /// Name as it appears in the gate table.
    pub name: String,
    /// Classification.
    pub kind: InstrKind,
    /// Number of qubit operands, or `None` for variadic (barrier).
    pub qubit_count: Option<usize>,
    /// Duration in nanoseconds.
    pub duration_ns: u64,
    /// Decomposition template; composites expand on instantiation.
    pub decomposition: Option<Vec<TemplateInstruction>>,
}

impl InstructionType {
    /// Describe a gate with a fixed operand count.
    pub fn gate(name: impl Into<String>, qubit_count: usize, duration_ns: u64) -> Self {
        Self {
            name: name.into(),
            kind: InstrKind::Gate,
            qubit_count: Some(qubit_count),
            duration_ns,
            decomposition: None,
        }
    }

    /// Describe a state-preparation instruction.
    pub fn prep(name: impl Into<String>, duration_ns: u64) -> Self {
        Self {
            name: name.into(),
            kind: InstrKind::Prep,
            qubit_count: Some(1),
            duration_ns,
            decomposition: None,
        }
    }

    /// Describe a measurement.
    pub fn measure(name: impl Into<String>, duration_ns: u64) -> Self {
        Self {
            name: name.into(),
            kind: InstrKind::Measure,
            qubit_count: Some(1),
            duration_ns,
            decomposition: None,
        }
    }

    /// Describe a barrier (variadic, zero duration unless specified).
    pub fn barrier(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: InstrKind::Barrier,
            qubit_count: None,
            duration_ns: 0,
            decomposition: None,
        }
    }

    /// Describe a classical statement.
    pub fn classical(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: InstrKind::Classical,
            qubit_count: Some(0),
            duration_ns: 0,
            decomposition: None,
        }
    }

    /// Attach a decomposition template.
    #[must_use]
    pub fn with_decomposition(mut self, steps: Vec<TemplateInstruction>) -> Self {
        self.decomposition = Some(steps);
        self
    }
}

/// Whether a routing operation is a swap or a move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoutingKind {
    /// Full state exchange.
    Swap,
    /// Cheaper exchange valid when the second operand holds |0>.
    Move,
}

/// Provenance tag for gates emitted by the router.
///
/// Carried by every gate that implements (part of) a swap or move, so
/// reports and equivalence checks can strip routing operations from the
/// output stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoutingTag {
    /// Swap or move.
    pub kind: RoutingKind,
    /// Real qubit pair the operation exchanges.
    pub real: (u32, u32),
    /// Virtual qubits living on those reals before the exchange, if any.
    pub virt: (Option<u32>, Option<u32>),
}

/// A single instruction instance.
///
/// Qubit operands are plain indices; whether they are virtual or real is
/// determined by where the instruction lives (input blocks are virtual,
/// everything a `Past` has seen is real).
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    itype: Arc<InstructionType>,
    /// Qubit operand indices.
    pub qubits: Vec<u32>,
    /// Classical bit operands (measurement results).
    pub bits: Vec<u32>,
    /// Classical bits guarding execution, if conditional.
    pub condition: Option<Vec<u32>>,
    /// Cycle assigned by scheduling, once known.
    pub cycle: Option<u64>,
    /// Routing provenance, set for swap/move gates and their expansions.
    pub routing: Option<RoutingTag>,
}

impl Instruction {
    /// Instantiate a descriptor with qubit operands.
    pub fn new(itype: Arc<InstructionType>, qubits: impl IntoIterator<Item = u32>) -> Self {
        Self {
            itype,
            qubits: qubits.into_iter().collect(),
            bits: vec![],
            condition: None,
            cycle: None,
            routing: None,
        }
    }

    /// Attach classical bit operands.
    #[must_use]
    pub fn with_bits(mut self, bits: impl IntoIterator<Item = u32>) -> Self {
        self.bits = bits.into_iter().collect();
        self
    }

    /// Attach a condition over classical bits.
    #[must_use]
    pub fn with_condition(mut self, bits: impl IntoIterator<Item = u32>) -> Self {
        self.condition = Some(bits.into_iter().collect());
        self
    }

    /// The shared descriptor.
    #[inline]
    pub fn itype(&self) -> &Arc<InstructionType> {
        &self.itype
    }

    /// Instruction name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.itype.name
    }

    /// Classification.
    #[inline]
    pub fn kind(&self) -> InstrKind {
        self.itype.kind
    }

    /// Duration in nanoseconds.
    #[inline]
    pub fn duration_ns(&self) -> u64 {
        self.itype.duration_ns
    }

    /// Check if this is a quantum operation (gate, prep, measure, barrier).
    pub fn is_quantum(&self) -> bool {
        !matches!(self.itype.kind, InstrKind::Classical)
    }

    /// Check if this is a classical statement.
    pub fn is_classical(&self) -> bool {
        matches!(self.itype.kind, InstrKind::Classical)
    }

    /// Check if this is a barrier.
    pub fn is_barrier(&self) -> bool {
        matches!(self.itype.kind, InstrKind::Barrier)
    }

    /// Check if this is a state preparation.
    pub fn is_prep(&self) -> bool {
        matches!(self.itype.kind, InstrKind::Prep)
    }

    /// Check if this is a two-qubit gate (the only kind that needs routing).
    pub fn is_two_qubit(&self) -> bool {
        matches!(self.itype.kind, InstrKind::Gate) && self.qubits.len() == 2
    }

    /// Check if this gate was emitted by the router as part of a swap/move.
    pub fn is_routing_op(&self) -> bool {
        self.routing.is_some()
    }
}

impl std::fmt::Display for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())?;
        for (i, q) in self.qubits.iter().enumerate() {
            if i == 0 {
                write!(f, " q{q}")?;
            } else {
                write!(f, ",q{q}")?;
            }
        }
        for b in &self.bits {
            write!(f, " b{b}")?;
        }
        Ok(())
    }
}
