//! Per-resource first-free-cycle map.
//!
//! For every schedulable resource (each real qubit and each classical
//! bit) this tracks the first cycle at which the resource is free. An
//! embedded [`ResourceState`] additionally enforces platform instrument
//! constraints (shared generators with bounded concurrency) when a
//! resource-constrained heuristic is selected.

use alsvid_ir::{Instruction, ResourceSpec};

use crate::context::RouteContext;

/// Cycle numbering starts at 1; this bounds runaway searches.
const MAX_CYCLE: u64 = u64::MAX / 4;

/// Tracks in-flight reservations against the platform's shared-instrument
/// specs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceState {
    specs: Vec<ResourceSpec>,
    /// Per spec: committed busy intervals `[start, end)`, one per operand.
    reservations: Vec<Vec<(u64, u64)>>,
}

impl ResourceState {
    /// Create a state with no reservations.
    pub fn new(specs: &[ResourceSpec]) -> Self {
        Self {
            specs: specs.to_vec(),
            reservations: vec![vec![]; specs.len()],
        }
    }

    fn demand(spec: &ResourceSpec, inst: &Instruction) -> usize {
        inst.qubits
            .iter()
            .filter(|&&q| spec.qubits.contains(&q))
            .count()
    }

    /// Whether `inst` could occupy `[cycle, cycle + duration)` without
    /// exceeding any instrument capacity.
    ///
    /// # Panics
    ///
    /// Panics if a single instruction alone demands more capacity than an
    /// instrument has; such a gate could never be scheduled at all.
    pub fn available(&self, cycle: u64, duration: u64, inst: &Instruction) -> bool {
        let end = cycle + duration.max(1);
        for (spec, busy) in self.specs.iter().zip(&self.reservations) {
            let needed = Self::demand(spec, inst);
            if needed == 0 {
                continue;
            }
            assert!(
                needed <= spec.capacity,
                "instruction '{}' over-subscribes resource '{}'",
                inst.name(),
                spec.name
            );
            let in_use = busy.iter().filter(|&&(s, e)| s < end && cycle < e).count();
            if in_use + needed > spec.capacity {
                return false;
            }
        }
        true
    }

    /// Commit `inst` to occupy `[cycle, cycle + duration)`.
    pub fn reserve(&mut self, cycle: u64, duration: u64, inst: &Instruction) {
        let end = cycle + duration.max(1);
        for (spec, busy) in self.specs.iter().zip(&mut self.reservations) {
            for _ in 0..Self::demand(spec, inst) {
                busy.push((cycle, end));
            }
        }
    }
}

/// First-free-cycle map over `num_qubits + num_bits` resources.
///
/// Entries start at cycle 1: the first scheduled gate lands on cycle 1,
/// not 0. Cloning is a deep copy; speculative exploration relies on it.
#[derive(Debug, Clone)]
pub struct FreeCycle<'p> {
    ctx: RouteContext<'p>,
    /// Free cycle per resource: qubits first, then bits.
    fcv: Vec<u64>,
    resources: ResourceState,
}

impl<'p> FreeCycle<'p> {
    /// Create a map with every resource free from cycle 1.
    pub fn new(ctx: RouteContext<'p>) -> Self {
        let n = (ctx.num_qubits() + ctx.num_bits()) as usize;
        Self {
            ctx,
            fcv: vec![1; n],
            resources: ResourceState::new(&ctx.platform.resources),
        }
    }

    /// Free cycle of a real qubit.
    #[inline]
    pub fn qubit(&self, real: u32) -> u64 {
        self.fcv[real as usize]
    }

    /// Free cycle of a classical bit.
    #[inline]
    pub fn bit(&self, bit: u32) -> u64 {
        self.fcv[(self.ctx.num_qubits() + bit) as usize]
    }

    /// Minimum over all entries.
    pub fn min(&self) -> u64 {
        self.fcv.iter().copied().min().unwrap_or(1)
    }

    /// Maximum over all entries.
    pub fn max(&self) -> u64 {
        self.fcv.iter().copied().max().unwrap_or(1)
    }

    /// Max minus min; the spread of the scheduling frontier.
    pub fn depth(&self) -> u64 {
        self.max() - self.min()
    }

    /// Whether a gate with first operand `r0` would start earlier than one
    /// with first operand `r1`.
    pub fn is_first_operand_earlier(&self, r0: u32, r1: u32) -> bool {
        self.qubit(r0) < self.qubit(r1)
    }

    /// Whether `swap(fr0,fr1)` would start earlier than `swap(sr0,sr1)`.
    ///
    /// Shortcut that assumes the swap decomposition uses its second
    /// operand one cycle earlier than its first (a platform contract the
    /// caller promises). Honors operand reversal when that option is on.
    pub fn is_first_swap_earliest(&self, mut fr0: u32, mut fr1: u32, mut sr0: u32, mut sr1: u32) -> bool {
        if self.ctx.options.reverse_swap_if_better {
            if self.qubit(fr0) < self.qubit(fr1) {
                std::mem::swap(&mut fr0, &mut fr1);
            }
            if self.qubit(sr0) < self.qubit(sr1) {
                std::mem::swap(&mut sr0, &mut sr1);
            }
        }
        let first = (self.qubit(fr0).saturating_sub(1)).max(self.qubit(fr1));
        let second = (self.qubit(sr0).saturating_sub(1)).max(self.qubit(sr1));
        first < second
    }

    /// Earliest start cycle for `inst` from operand data dependences only.
    /// Purely functional on state.
    pub fn start_cycle_no_rc(&self, inst: &Instruction) -> u64 {
        let mut start = 1;
        for &q in &inst.qubits {
            start = start.max(self.qubit(q));
        }
        for &b in &inst.bits {
            start = start.max(self.bit(b));
        }
        if let Some(cond) = &inst.condition {
            for &b in cond {
                start = start.max(self.bit(b));
            }
        }
        debug_assert!(start < MAX_CYCLE);
        start
    }

    /// Earliest start cycle for `inst`, additionally honoring platform
    /// resource constraints when the heuristic is resource-constrained.
    /// Purely functional on state.
    pub fn start_cycle(&self, inst: &Instruction) -> u64 {
        let mut start = self.start_cycle_no_rc(inst);
        if self.ctx.options.heuristic.is_resource_constrained() {
            let duration = self.ctx.cycles(inst.duration_ns());
            while !self.resources.available(start, duration, inst) {
                start += 1;
                debug_assert!(start < MAX_CYCLE);
            }
        }
        start
    }

    /// Commit `inst` at `start`, advancing operand entries only (no
    /// resource reservation). Used for probe scheduling.
    pub fn add_no_rc(&mut self, inst: &Instruction, start: u64) {
        let free = start + self.ctx.cycles(inst.duration_ns());
        for &q in &inst.qubits {
            self.fcv[q as usize] = free;
        }
        let nq = self.ctx.num_qubits();
        for &b in &inst.bits {
            self.fcv[(nq + b) as usize] = free;
        }
    }

    /// Commit `inst` at `start`, advancing operand entries and reserving
    /// platform resources if the heuristic is resource-constrained.
    /// `start` must come from an earlier [`start_cycle`](Self::start_cycle)
    /// call.
    pub fn add(&mut self, inst: &Instruction, start: u64) {
        self.add_no_rc(inst, start);
        if self.ctx.options.heuristic.is_resource_constrained() {
            let duration = self.ctx.cycles(inst.duration_ns());
            self.resources.reserve(start, duration, inst);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{Heuristic, RouterOptions};
    use crate::topology::Topology;
    use alsvid_ir::{InstructionType, Platform};
    use std::sync::Arc;

    fn fixture(heuristic: Heuristic) -> (Platform, Topology, RouterOptions) {
        let mut plat = Platform::new("test", 3, 2, 20);
        plat.define(InstructionType::gate("h", 1, 20));
        plat.define(InstructionType::gate("cnot", 2, 40));
        plat.define(InstructionType::measure("measure", 60));
        let topo = Topology::linear(3);
        let opts = RouterOptions {
            heuristic,
            ..RouterOptions::default()
        };
        (plat, topo, opts)
    }

    fn gate(plat: &Platform, name: &str, qubits: &[u32]) -> Instruction {
        Instruction::new(Arc::clone(plat.find(name).unwrap()), qubits.iter().copied())
    }

    #[test]
    fn test_starts_at_cycle_one() {
        let (plat, topo, opts) = fixture(Heuristic::Base);
        let ctx = RouteContext::new(&plat, &topo, &opts);
        let fc = FreeCycle::new(ctx);
        assert_eq!(fc.min(), 1);
        assert_eq!(fc.max(), 1);
        let h = gate(&plat, "h", &[0]);
        assert_eq!(fc.start_cycle(&h), 1);
    }

    #[test]
    fn test_add_advances_operands() {
        let (plat, topo, opts) = fixture(Heuristic::Base);
        let ctx = RouteContext::new(&plat, &topo, &opts);
        let mut fc = FreeCycle::new(ctx);
        let cnot = gate(&plat, "cnot", &[0, 1]);
        let start = fc.start_cycle(&cnot);
        fc.add(&cnot, start);
        // cnot is 40ns on a 20ns cycle: 2 cycles.
        assert_eq!(fc.qubit(0), 3);
        assert_eq!(fc.qubit(1), 3);
        assert_eq!(fc.qubit(2), 1);

        let h = gate(&plat, "h", &[1]);
        assert_eq!(fc.start_cycle(&h), 3);
    }

    #[test]
    fn test_bits_constrain_start() {
        let (plat, topo, opts) = fixture(Heuristic::Base);
        let ctx = RouteContext::new(&plat, &topo, &opts);
        let mut fc = FreeCycle::new(ctx);
        let m = gate(&plat, "measure", &[0]).with_bits([1]);
        fc.add(&m, 1);
        // measure is 60ns: 3 cycles; bit 1 free at 4.
        assert_eq!(fc.bit(1), 4);

        let conditional = gate(&plat, "h", &[2]).with_condition([1]);
        assert_eq!(fc.start_cycle(&conditional), 4);
    }

    #[test]
    fn test_first_swap_earliest() {
        let (plat, topo, opts) = fixture(Heuristic::Base);
        let ctx = RouteContext::new(&plat, &topo, &opts);
        let mut fc = FreeCycle::new(ctx);
        let cnot = gate(&plat, "cnot", &[0, 1]);
        fc.add(&cnot, 1);
        // Qubits 0,1 busy until 3; qubit 2 free at 1: swap(1,2) can go
        // earlier than swap(0,1) but later than swap involving free pairs.
        assert!(fc.is_first_swap_earliest(1, 2, 0, 1));
        assert!(!fc.is_first_swap_earliest(0, 1, 1, 2));
    }

    #[test]
    fn test_resource_constraint_delays_start() {
        let (mut plat, topo, opts) = fixture(Heuristic::BaseRc);
        // One generator drives qubits 0..3 but only one at a time.
        plat.add_resource(alsvid_ir::ResourceSpec::new("mw0", [0, 1, 2], 1));
        let ctx = RouteContext::new(&plat, &topo, &opts);
        let mut fc = FreeCycle::new(ctx);

        let h0 = gate(&plat, "h", &[0]);
        let start = fc.start_cycle(&h0);
        assert_eq!(start, 1);
        fc.add(&h0, start);

        // Data-wise qubit 1 is free at cycle 1, but the generator is busy.
        let h1 = gate(&plat, "h", &[1]);
        assert_eq!(fc.start_cycle_no_rc(&h1), 1);
        assert_eq!(fc.start_cycle(&h1), 2);
    }
}
