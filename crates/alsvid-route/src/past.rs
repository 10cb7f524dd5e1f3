//! Scheduled window of already-routed gates.
//!
//! A [`Past`] owns its view of the virtual-to-real mapping and the
//! free-cycle map, a waiting list of submitted gates, the cycle-ordered
//! window of scheduled gates, and the output stream flushed so far. It is
//! value-like: cloning yields an independent speculative copy, which the
//! router and [`Alter`](crate::alter::Alter) scoring rely on.

use alsvid_ir::{Instruction, RoutingKind, RoutingTag};
use tracing::debug;

use crate::context::RouteContext;
use crate::error::{RouteError, RouteResult};
use crate::free_cycle::FreeCycle;
use crate::mapping::{QubitMapping, QubitState};

/// Window of placed real-qubit gates plus the state needed to extend it.
#[derive(Debug, Clone)]
pub struct Past<'p> {
    ctx: RouteContext<'p>,
    mapping: QubitMapping,
    fc: FreeCycle<'p>,
    /// Submitted but not yet scheduled, in submission order.
    waiting: Vec<Instruction>,
    /// Scheduled gates in non-decreasing cycle order.
    scheduled: Vec<Instruction>,
    /// Gates flushed out of the window, ready for the result block.
    output: Vec<Instruction>,
    num_swaps_added: u64,
    num_moves_added: u64,
}

impl<'p> Past<'p> {
    /// Create an empty past with the mapping dictated by the options.
    pub fn new(ctx: RouteContext<'p>) -> Self {
        let initial_state = if ctx.options.assume_initialized {
            QubitState::Initialized
        } else {
            QubitState::None
        };
        Self {
            ctx,
            mapping: QubitMapping::new(
                ctx.num_qubits(),
                ctx.options.initialize_one_to_one,
                initial_state,
            ),
            fc: FreeCycle::new(ctx),
            waiting: vec![],
            scheduled: vec![],
            output: vec![],
            num_swaps_added: 0,
            num_moves_added: 0,
        }
    }

    /// Replace the mapping with an externally computed one.
    pub fn import_mapping(&mut self, mapping: QubitMapping) {
        self.mapping = mapping;
    }

    /// The current mapping.
    pub fn mapping(&self) -> &QubitMapping {
        &self.mapping
    }

    /// A copy of the current mapping, for reporting.
    pub fn export_mapping(&self) -> QubitMapping {
        self.mapping.clone()
    }

    /// Number of swaps emitted into this past.
    pub fn num_swaps_added(&self) -> u64 {
        self.num_swaps_added
    }

    /// Number of moves emitted into this past.
    pub fn num_moves_added(&self) -> u64 {
        self.num_moves_added
    }

    /// Maximum entry of the free-cycle map; the window's depth frontier.
    pub fn max_free_cycle(&self) -> u64 {
        self.fc.max()
    }

    /// Whether `swap(fr0,fr1)` would start earlier than `swap(sr0,sr1)`.
    pub fn is_first_swap_earliest(&self, fr0: u32, fr1: u32, sr0: u32, sr1: u32) -> bool {
        self.fc.is_first_swap_earliest(fr0, fr1, sr0, sr1)
    }

    /// Real qubit implementing a virtual qubit, allocating one for
    /// previously unseen virtuals.
    pub fn map_qubit(&mut self, virt: u32) -> u32 {
        match self.mapping.real(virt) {
            Some(real) => real,
            None => self.mapping.allocate(virt),
        }
    }

    /// Append a real-qubit gate to the waiting list.
    pub fn add(&mut self, inst: Instruction) {
        self.waiting.push(inst);
    }

    /// Drain the waiting list into the scheduled window.
    ///
    /// Gates are scheduled in submission order, each at the earliest start
    /// the free-cycle map allows; the swap emission order already respects
    /// data dependences. Each gate is inserted at the latest position that
    /// keeps the window's cycles non-decreasing, so equal-cycle gates stay
    /// in submission order.
    pub fn schedule(&mut self) {
        for mut inst in std::mem::take(&mut self.waiting) {
            let start = self.fc.start_cycle(&inst);
            self.fc.add(&inst, start);
            inst.cycle = Some(start);
            let at = self
                .scheduled
                .iter()
                .rposition(|g| g.cycle.unwrap_or(0) <= start)
                .map_or(0, |i| i + 1);
            self.scheduled.insert(at, inst);
        }
    }

    /// Submit and immediately schedule one gate.
    pub fn add_and_schedule(&mut self, inst: Instruction) {
        self.add(inst);
        self.schedule();
    }

    /// Cycle extension of scheduling `init_seq` before `seq`, relative to
    /// scheduling `seq` alone. Computed on probe copies of the free-cycle
    /// map; `self` is unchanged.
    pub fn insertion_cost(&self, init_seq: &[Instruction], seq: &[Instruction]) -> u64 {
        let mut probe_with_init = self.fc.clone();
        for g in init_seq.iter().chain(seq) {
            let start = probe_with_init.start_cycle_no_rc(g);
            probe_with_init.add_no_rc(g, start);
        }
        let mut probe = self.fc.clone();
        for g in seq {
            let start = probe.start_cycle_no_rc(g);
            probe.add_no_rc(g, start);
        }
        let with_init = probe_with_init.max();
        let without = probe.max();
        debug_assert!(with_init >= without);
        with_init - without
    }

    /// Build the move implementing `swap(r0, r1)`, oriented so the
    /// stateless qubit is the second operand, or `None` when the required
    /// initialization would cost more than `max_move_penalty`.
    fn gen_move(&mut self, mut r0: u32, mut r1: u32) -> RouteResult<Option<Vec<Instruction>>> {
        if self.mapping.state(r0) != QubitState::Live {
            std::mem::swap(&mut r0, &mut r1);
        }
        debug_assert!(self.mapping.state(r0) == QubitState::Live);
        debug_assert!(self.mapping.state(r1) != QubitState::Live);

        let base = if self.ctx.topology.is_inter_core(r0, r1) {
            "tmove"
        } else {
            "move"
        };
        let seq = self
            .ctx
            .platform
            .try_make_specialized(base, &[r0, r1], &[], None)?
            .ok_or_else(|| RouteError::MissingGate(base.to_string()))?;

        if self.mapping.state(r1) == QubitState::None {
            // The move target must hold |0>; see if initializing it is
            // cheap enough.
            let init = match self
                .ctx
                .platform
                .try_make_specialized("move_init", &[r1], &[], None)?
            {
                Some(init) => init,
                None => self
                    .ctx
                    .platform
                    .try_make_specialized("prepz", &[r1], &[], None)?
                    .ok_or_else(|| RouteError::MissingGate("move_init".to_string()))?,
            };
            if self.insertion_cost(&init, &seq) > self.ctx.options.max_move_penalty {
                debug!("move(q{r0},q{r1}) cancelled: initialization too costly");
                return Ok(None);
            }
            self.mapping.set_state(r1, QubitState::Initialized);
            let mut combined = init;
            combined.extend(seq);
            return Ok(Some(combined));
        }
        Ok(Some(seq))
    }

    /// Emit a swap (or cheaper move) of real qubits `r0` and `r1` into the
    /// waiting list and update the mapping accordingly.
    ///
    /// When neither qubit holds live state no gate is emitted at all; only
    /// the mapping changes. When move gates are enabled and exactly one
    /// operand is stateless, a move is tried first and kept if any needed
    /// initialization fits within `max_move_penalty`. Otherwise a swap is
    /// emitted, with operands reversed when the free-cycle map prefers it.
    pub fn add_swap(&mut self, mut r0: u32, mut r1: u32) -> RouteResult<()> {
        debug!(
            "extending with swap(q{r0},q{r1}), states ({}, {})",
            self.mapping.state(r0),
            self.mapping.state(r1)
        );
        let s0 = self.mapping.state(r0);
        let s1 = self.mapping.state(r1);

        if s0 != QubitState::Live && s1 != QubitState::Live {
            self.mapping.swap(r0, r1);
            return Ok(());
        }

        let virt_pair = (self.mapping.virt(r0), self.mapping.virt(r1));
        let mut seq = None;
        let mut kind = RoutingKind::Swap;

        if self.ctx.options.use_move_gates && (s0 != QubitState::Live || s1 != QubitState::Live) {
            seq = self.gen_move(r0, r1)?;
            if seq.is_some() {
                kind = RoutingKind::Move;
                self.num_moves_added += 1;
            }
        }

        let seq = match seq {
            Some(seq) => seq,
            None => {
                if self.ctx.options.reverse_swap_if_better
                    && self.fc.is_first_operand_earlier(r0, r1)
                {
                    std::mem::swap(&mut r0, &mut r1);
                }
                let base = if self.ctx.topology.is_inter_core(r0, r1) {
                    "tswap"
                } else {
                    "swap"
                };
                self.num_swaps_added += 1;
                self.ctx
                    .platform
                    .try_make_specialized(base, &[r0, r1], &[], None)?
                    .ok_or_else(|| RouteError::MissingGate(base.to_string()))?
            }
        };

        let tag = RoutingTag {
            kind,
            real: (r0, r1),
            virt: virt_pair,
        };
        for mut g in seq {
            g.routing = Some(tag);
            self.add(g);
        }
        self.mapping.swap(r0, r1);
        Ok(())
    }

    /// Rewrite a virtual-operand gate to real operands, resolving the best
    /// specialized variant (`_prim`, `_real`, then the gate itself) and
    /// expanding composites. Side effect: touched real qubits become live
    /// (or initialized, for a prep under `assume_prep_only_initializes`).
    pub fn make_real(&mut self, inst: &Instruction) -> RouteResult<Vec<Instruction>> {
        let real_qubits: Vec<u32> = inst.qubits.iter().map(|&v| self.map_qubit(v)).collect();
        let touched_state =
            if inst.is_prep() && self.ctx.options.assume_prep_only_initializes {
                QubitState::Initialized
            } else {
                QubitState::Live
            };
        for &r in &real_qubits {
            self.mapping.set_state(r, touched_state);
        }

        let mut seq = match self.ctx.platform.try_make_specialized(
            inst.name(),
            &real_qubits,
            &inst.bits,
            inst.condition.as_deref(),
        )? {
            Some(seq) => seq,
            None => {
                // Gate table knows no variant; keep the gate and just
                // rewrite its operands.
                let mut g = inst.clone();
                g.qubits = real_qubits;
                vec![g]
            }
        };
        if let Some(tag) = inst.routing {
            for g in &mut seq {
                g.routing = Some(tag);
            }
        }
        Ok(seq)
    }

    /// Move the scheduled window to the output stream.
    pub fn flush_all(&mut self) {
        self.output.append(&mut self.scheduled);
    }

    /// Route a non-quantum statement around the quantum window: flush the
    /// window, then emit the statement directly to the output stream.
    pub fn bypass(&mut self, inst: Instruction) {
        if !self.scheduled.is_empty() {
            self.flush_all();
        }
        self.output.push(inst);
    }

    /// Drain the output stream (cycle-stamped, cycle-ordered).
    pub fn drain_output(&mut self) -> Vec<Instruction> {
        std::mem::take(&mut self.output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::RouterOptions;
    use crate::topology::Topology;
    use alsvid_ir::{InstructionType, Platform, TemplateInstruction};
    use std::sync::Arc;

    fn platform() -> Platform {
        let mut plat = Platform::new("test", 3, 1, 20);
        plat.define(InstructionType::gate("h", 1, 20));
        plat.define(InstructionType::gate("cnot", 2, 40));
        plat.define(InstructionType::gate("swap", 2, 0).with_decomposition(vec![
            TemplateInstruction::new("cnot", [0, 1]),
            TemplateInstruction::new("cnot", [1, 0]),
            TemplateInstruction::new("cnot", [0, 1]),
        ]));
        plat.define(InstructionType::gate("move", 2, 0).with_decomposition(vec![
            TemplateInstruction::new("cnot", [0, 1]),
            TemplateInstruction::new("cnot", [1, 0]),
        ]));
        plat.define(InstructionType::prep("prepz", 40));
        plat
    }

    fn gate(plat: &Platform, name: &str, qubits: &[u32]) -> Instruction {
        Instruction::new(Arc::clone(plat.find(name).unwrap()), qubits.iter().copied())
    }

    #[test]
    fn test_schedule_stamps_cycles_in_order() {
        let plat = platform();
        let topo = Topology::linear(3);
        let opts = RouterOptions::default();
        let ctx = RouteContext::new(&plat, &topo, &opts);
        let mut past = Past::new(ctx);

        past.add(gate(&plat, "h", &[0]));
        past.add(gate(&plat, "cnot", &[0, 1]));
        past.add(gate(&plat, "h", &[2]));
        past.schedule();
        past.flush_all();

        let out = past.drain_output();
        let cycles: Vec<u64> = out.iter().map(|g| g.cycle.unwrap()).collect();
        // h q0 at 1, cnot at 2, h q2 at 1; window is cycle-ordered.
        assert_eq!(cycles, vec![1, 1, 2]);
        // Equal cycles keep submission order: h q0 before h q2.
        assert_eq!(out[0].qubits, vec![0]);
        assert_eq!(out[1].qubits, vec![2]);
    }

    #[test]
    fn test_add_swap_both_stateless_is_free() {
        let plat = platform();
        let topo = Topology::linear(3);
        let opts = RouterOptions::default();
        let ctx = RouteContext::new(&plat, &topo, &opts);
        let mut past = Past::new(ctx);

        past.add_swap(0, 1).unwrap();
        past.schedule();
        past.flush_all();
        assert!(past.drain_output().is_empty());
        assert_eq!(past.num_swaps_added(), 0);
        // Mapping still reflects the exchange.
        assert_eq!(past.mapping().real(0), Some(1));
        assert_eq!(past.mapping().real(1), Some(0));
    }

    #[test]
    fn test_add_swap_live_emits_swap() {
        let plat = platform();
        let topo = Topology::linear(3);
        let opts = RouterOptions {
            use_move_gates: false,
            ..RouterOptions::default()
        };
        let ctx = RouteContext::new(&plat, &topo, &opts);
        let mut past = Past::new(ctx);

        for q in 0..2 {
            for g in past.make_real(&gate(&plat, "h", &[q])).unwrap() {
                past.add_and_schedule(g);
            }
        }
        past.add_swap(0, 1).unwrap();
        past.schedule();
        past.flush_all();

        let out = past.drain_output();
        let swap_gates: Vec<_> = out.iter().filter(|g| g.is_routing_op()).collect();
        // swap decomposes into 3 cnots, all tagged.
        assert_eq!(swap_gates.len(), 3);
        assert!(swap_gates
            .iter()
            .all(|g| g.routing.unwrap().kind == RoutingKind::Swap));
        assert_eq!(past.num_swaps_added(), 1);
    }

    #[test]
    fn test_add_swap_prefers_move_when_initialized() {
        let plat = platform();
        let topo = Topology::linear(3);
        let opts = RouterOptions {
            assume_prep_only_initializes: true,
            ..RouterOptions::default()
        };
        let ctx = RouteContext::new(&plat, &topo, &opts);
        let mut past = Past::new(ctx);

        // Qubit 0 live, qubit 1 initialized by prepz.
        for g in past.make_real(&gate(&plat, "h", &[0])).unwrap() {
            past.add_and_schedule(g);
        }
        for g in past.make_real(&gate(&plat, "prepz", &[1])).unwrap() {
            past.add_and_schedule(g);
        }

        past.add_swap(0, 1).unwrap();
        past.schedule();
        past.flush_all();

        let out = past.drain_output();
        let moved: Vec<_> = out.iter().filter(|g| g.is_routing_op()).collect();
        // move decomposes into 2 cnots, no init needed.
        assert_eq!(moved.len(), 2);
        assert!(moved
            .iter()
            .all(|g| g.routing.unwrap().kind == RoutingKind::Move));
        assert_eq!(past.num_moves_added(), 1);
        assert_eq!(past.num_swaps_added(), 0);
    }

    #[test]
    fn test_move_init_respects_penalty() {
        let plat = platform();
        let topo = Topology::linear(3);
        // Qubit 1 is garbage; initializing it costs cycles, and the
        // allowed penalty is zero, so the move must be abandoned.
        let opts = RouterOptions {
            max_move_penalty: 0,
            ..RouterOptions::default()
        };
        let ctx = RouteContext::new(&plat, &topo, &opts);
        let mut past = Past::new(ctx);

        for g in past.make_real(&gate(&plat, "h", &[0])).unwrap() {
            past.add_and_schedule(g);
        }
        past.add_swap(0, 1).unwrap();
        past.schedule();
        past.flush_all();

        assert_eq!(past.num_moves_added(), 0);
        assert_eq!(past.num_swaps_added(), 1);
    }

    #[test]
    fn test_make_real_allocates_and_marks_live() {
        let plat = platform();
        let topo = Topology::linear(3);
        let opts = RouterOptions {
            initialize_one_to_one: false,
            ..RouterOptions::default()
        };
        let ctx = RouteContext::new(&plat, &topo, &opts);
        let mut past = Past::new(ctx);

        let seq = past.make_real(&gate(&plat, "cnot", &[2, 0])).unwrap();
        assert_eq!(seq.len(), 1);
        // First-touch allocation: v2 -> r0, v0 -> r1.
        assert_eq!(seq[0].qubits, vec![0, 1]);
        assert_eq!(past.mapping().state(0), QubitState::Live);
        assert_eq!(past.mapping().state(1), QubitState::Live);
    }

    #[test]
    fn test_bypass_flushes_window_first() {
        let mut plat = platform();
        plat.define(InstructionType::classical("add"));
        let topo = Topology::linear(3);
        let opts = RouterOptions::default();
        let ctx = RouteContext::new(&plat, &topo, &opts);
        let mut past = Past::new(ctx);

        past.add_and_schedule(gate(&plat, "h", &[0]));
        past.bypass(gate(&plat, "add", &[]));
        let out = past.drain_output();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].name(), "h");
        assert_eq!(out[1].name(), "add");
    }
}
