//! Platform description: gate table, decomposition, scheduling resources.
//!
//! The platform is immutable shared data during routing. It owns the
//! name-keyed table of [`InstructionType`]s and knows how to instantiate a
//! name into an owned sequence of instructions, expanding decomposition
//! templates on the fly.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{IrError, IrResult};
use crate::instruction::{Instruction, InstructionType};

/// Decomposition templates nest at most this deep before we assume a cycle.
const MAX_DECOMPOSITION_DEPTH: usize = 64;

/// A scheduling resource shared by a set of qubits.
///
/// Models shared instruments (e.g. a microwave generator driving several
/// qubits) that bound how many of their qubits can be active in the same
/// cycle window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSpec {
    /// Resource name, for diagnostics.
    pub name: String,
    /// Qubits sharing this resource.
    pub qubits: Vec<u32>,
    /// How many of those qubits may use it concurrently.
    pub capacity: usize,
}

impl ResourceSpec {
    /// Create a resource shared by the given qubits.
    pub fn new(
        name: impl Into<String>,
        qubits: impl IntoIterator<Item = u32>,
        capacity: usize,
    ) -> Self {
        Self {
            name: name.into(),
            qubits: qubits.into_iter().collect(),
            capacity,
        }
    }
}

/// Target platform description.
#[derive(Debug, Clone)]
pub struct Platform {
    /// Platform name, for diagnostics.
    pub name: String,
    /// Number of real qubits.
    pub num_qubits: u32,
    /// Number of classical bits available as scheduling resources.
    pub num_bits: u32,
    /// Cycle time in nanoseconds; durations round up to whole cycles.
    pub cycle_time_ns: u64,
    /// Shared-instrument constraints, if any.
    pub resources: Vec<ResourceSpec>,
    types: Vec<Arc<InstructionType>>,
    by_name: FxHashMap<String, usize>,
}

impl Platform {
    /// Create a platform with an empty gate table.
    pub fn new(name: impl Into<String>, num_qubits: u32, num_bits: u32, cycle_time_ns: u64) -> Self {
        Self {
            name: name.into(),
            num_qubits,
            num_bits,
            cycle_time_ns,
            resources: vec![],
            types: vec![],
            by_name: FxHashMap::default(),
        }
    }

    /// Add an instruction type to the gate table.
    ///
    /// Redefining an existing name replaces the earlier entry.
    pub fn define(&mut self, itype: InstructionType) {
        let name = itype.name.clone();
        let idx = self.types.len();
        self.types.push(Arc::new(itype));
        self.by_name.insert(name, idx);
    }

    /// Add a shared scheduling resource.
    pub fn add_resource(&mut self, spec: ResourceSpec) {
        self.resources.push(spec);
    }

    /// Look up an instruction type by exact name.
    pub fn find(&self, name: &str) -> Option<&Arc<InstructionType>> {
        self.by_name.get(name).map(|&idx| &self.types[idx])
    }

    /// Check if a name exists in the gate table.
    pub fn has(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Instantiate `name` with the given qubit operands, or `None` if the
    /// name is not in the gate table. Composites expand recursively.
    pub fn try_make(
        &self,
        name: &str,
        qubits: &[u32],
        bits: &[u32],
        condition: Option<&[u32]>,
    ) -> IrResult<Option<Vec<Instruction>>> {
        let Some(itype) = self.find(name) else {
            return Ok(None);
        };
        self.check_operands(itype, qubits)?;
        let mut out = Vec::new();
        self.expand(itype, qubits, bits, condition, 0, &mut out)?;
        Ok(Some(out))
    }

    /// Instantiate `name`, failing if the platform does not define it.
    pub fn make_instruction(
        &self,
        name: &str,
        qubits: &[u32],
        bits: &[u32],
        condition: Option<&[u32]>,
    ) -> IrResult<Vec<Instruction>> {
        self.try_make(name, qubits, bits, condition)?
            .ok_or_else(|| IrError::UnknownInstruction(name.to_string()))
    }

    /// Instantiate the best specialized variant of `base`: `{base}_prim`,
    /// then `{base}_real`, then `base` itself. `None` if no variant exists.
    pub fn try_make_specialized(
        &self,
        base: &str,
        qubits: &[u32],
        bits: &[u32],
        condition: Option<&[u32]>,
    ) -> IrResult<Option<Vec<Instruction>>> {
        for name in [format!("{base}_prim"), format!("{base}_real")] {
            if let Some(seq) = self.try_make(&name, qubits, bits, condition)? {
                return Ok(Some(seq));
            }
        }
        self.try_make(base, qubits, bits, condition)
    }

    fn check_operands(&self, itype: &InstructionType, qubits: &[u32]) -> IrResult<()> {
        if let Some(expected) = itype.qubit_count {
            if qubits.len() != expected {
                return Err(IrError::OperandCountMismatch {
                    name: itype.name.clone(),
                    expected,
                    got: qubits.len(),
                });
            }
        }
        for &q in qubits {
            if q >= self.num_qubits {
                return Err(IrError::QubitOutOfRange {
                    index: q,
                    num_qubits: self.num_qubits,
                });
            }
        }
        Ok(())
    }

    fn expand(
        &self,
        itype: &Arc<InstructionType>,
        qubits: &[u32],
        bits: &[u32],
        condition: Option<&[u32]>,
        depth: usize,
        out: &mut Vec<Instruction>,
    ) -> IrResult<()> {
        if depth > MAX_DECOMPOSITION_DEPTH {
            return Err(IrError::CyclicDecomposition(itype.name.clone()));
        }
        if let Some(steps) = &itype.decomposition {
            for step in steps {
                let mut sub_qubits = Vec::with_capacity(step.operands.len());
                for &op in &step.operands {
                    let &q = qubits.get(op).ok_or_else(|| IrError::BadDecomposition {
                        name: itype.name.clone(),
                        operand: op,
                        arity: qubits.len(),
                    })?;
                    sub_qubits.push(q);
                }
                let sub_type = self
                    .find(&step.name)
                    .ok_or_else(|| IrError::UnknownInstruction(step.name.clone()))?
                    .clone();
                self.check_operands(&sub_type, &sub_qubits)?;
                self.expand(&sub_type, &sub_qubits, &[], condition, depth + 1, out)?;
            }
            return Ok(());
        }
        let mut inst = Instruction::new(Arc::clone(itype), qubits.iter().copied());
        inst.bits = bits.to_vec();
        inst.condition = condition.map(<[u32]>::to_vec);
        out.push(inst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::TemplateInstruction;

    fn test_platform() -> Platform {
        let mut plat = Platform::new("test", 5, 2, 20);
        plat.define(InstructionType::gate("h", 1, 20));
        plat.define(InstructionType::gate("cnot", 2, 40));
        plat.define(InstructionType::gate("swap", 2, 0).with_decomposition(vec![
            TemplateInstruction::new("cnot", [0, 1]),
            TemplateInstruction::new("cnot", [1, 0]),
            TemplateInstruction::new("cnot", [0, 1]),
        ]));
        plat.define(InstructionType::measure("measure", 300));
        plat
    }

    #[test]
    fn test_make_simple() {
        let plat = test_platform();
        let seq = plat.make_instruction("h", &[2], &[], None).unwrap();
        assert_eq!(seq.len(), 1);
        assert_eq!(seq[0].name(), "h");
        assert_eq!(seq[0].qubits, vec![2]);
    }

    #[test]
    fn test_unknown_name() {
        let plat = test_platform();
        assert!(plat.try_make("toffoli", &[0, 1], &[], None).unwrap().is_none());
        assert!(matches!(
            plat.make_instruction("toffoli", &[0, 1], &[], None),
            Err(IrError::UnknownInstruction(_))
        ));
    }

    #[test]
    fn test_decomposition_expands() {
        let plat = test_platform();
        let seq = plat.make_instruction("swap", &[1, 3], &[], None).unwrap();
        assert_eq!(seq.len(), 3);
        assert!(seq.iter().all(|g| g.name() == "cnot"));
        assert_eq!(seq[0].qubits, vec![1, 3]);
        assert_eq!(seq[1].qubits, vec![3, 1]);
        assert_eq!(seq[2].qubits, vec![1, 3]);
    }

    #[test]
    fn test_operand_validation() {
        let plat = test_platform();
        assert!(matches!(
            plat.make_instruction("cnot", &[0], &[], None),
            Err(IrError::OperandCountMismatch { .. })
        ));
        assert!(matches!(
            plat.make_instruction("h", &[7], &[], None),
            Err(IrError::QubitOutOfRange { .. })
        ));
    }

    #[test]
    fn test_specialized_resolution_order() {
        let mut plat = test_platform();
        plat.define(InstructionType::gate("x", 1, 20));
        plat.define(InstructionType::gate("x_real", 1, 20));
        plat.define(InstructionType::gate("x_prim", 1, 20));

        // _prim wins over _real and bare.
        let seq = plat.try_make_specialized("x", &[0], &[], None).unwrap().unwrap();
        assert_eq!(seq[0].name(), "x_prim");

        // Without _prim, _real wins over bare.
        let mut plat2 = test_platform();
        plat2.define(InstructionType::gate("x", 1, 20));
        plat2.define(InstructionType::gate("x_real", 1, 20));
        let seq = plat2.try_make_specialized("x", &[0], &[], None).unwrap().unwrap();
        assert_eq!(seq[0].name(), "x_real");

        // Bare fallback.
        let seq = plat2.try_make_specialized("h", &[0], &[], None).unwrap().unwrap();
        assert_eq!(seq[0].name(), "h");
    }

    #[test]
    fn test_cyclic_decomposition_detected() {
        let mut plat = Platform::new("cyclic", 2, 0, 20);
        plat.define(
            InstructionType::gate("a", 1, 20)
                .with_decomposition(vec![TemplateInstruction::new("b", [0])]),
        );
        plat.define(
            InstructionType::gate("b", 1, 20)
                .with_decomposition(vec![TemplateInstruction::new("a", [0])]),
        );
        assert!(matches!(
            plat.make_instruction("a", &[0], &[], None),
            Err(IrError::CyclicDecomposition(_))
        ));
    }
}
