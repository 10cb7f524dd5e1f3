//! Availability oracle over not-yet-mapped gates.
//!
//! A [`Future`] presents the gates of a block whose predecessors have all
//! been completed. In lookahead modes it is backed by the block's
//! data-dependency graph; with lookahead disabled it degenerates to block
//! order. Gates are identified by their index in the block, so clones for
//! speculative exploration stay cheap (the dependency graph itself is
//! shared, immutable).

use std::sync::Arc;

use alsvid_ir::{Block, Instruction};

use crate::context::RouteContext;
use crate::ddg::DepGraph;
use crate::options::LookaheadMode;

/// Identifier of a gate within the block being routed.
pub type GateId = usize;

/// Dependency-aware view of the gates still to route.
#[derive(Debug, Clone)]
pub struct Future {
    /// The block's instructions, shared across speculative clones.
    instructions: Arc<Vec<Instruction>>,
    /// The dependency graph, present unless lookahead is disabled.
    ddg: Option<Arc<DepGraph>>,
    /// Currently available gate ids (all predecessors completed).
    available: Vec<GateId>,
    /// Unfinished instruction-predecessor count per gate.
    pending_preds: Vec<usize>,
    /// Linear mode: position of the next gate.
    next: usize,
}

impl Future {
    /// Build the availability view for a block.
    pub fn new(ctx: RouteContext<'_>, block: &Block) -> Self {
        let instructions = Arc::new(block.instructions.clone());
        if ctx.options.lookahead_mode == LookaheadMode::Disabled {
            return Self {
                instructions,
                ddg: None,
                available: vec![],
                pending_preds: vec![],
                next: 0,
            };
        }
        let ddg = DepGraph::build(ctx, block);
        let pending_preds: Vec<usize> = (0..block.len())
            .map(|idx| ddg.num_op_predecessors(idx))
            .collect();
        let available = (0..block.len())
            .filter(|&idx| pending_preds[idx] == 0)
            .collect();
        Self {
            instructions,
            ddg: Some(Arc::new(ddg)),
            available,
            pending_preds,
            next: 0,
        }
    }

    /// The instruction behind a gate id.
    pub fn instruction(&self, id: GateId) -> &Instruction {
        &self.instructions[id]
    }

    /// Criticality of a gate: longest dependency path to the block sink,
    /// in cycles. Zero when lookahead is disabled.
    pub fn criticality(&self, id: GateId) -> u64 {
        self.ddg.as_ref().map_or(0, |ddg| ddg.remaining(id))
    }

    /// Non-quantum statements in the available set.
    pub fn ready_non_quantum(&self) -> Vec<GateId> {
        match &self.ddg {
            None => self
                .next_linear()
                .filter(|&id| self.instructions[id].is_classical())
                .into_iter()
                .collect(),
            Some(_) => self
                .available
                .iter()
                .copied()
                .filter(|&id| self.instructions[id].is_classical())
                .collect(),
        }
    }

    /// The available set, ordered by descending criticality. Empty when
    /// the block is exhausted.
    pub fn ready_gates(&self) -> Vec<GateId> {
        match &self.ddg {
            None => self.next_linear().into_iter().collect(),
            Some(ddg) => {
                let mut ids = self.available.clone();
                ids.sort_by_key(|&id| std::cmp::Reverse(ddg.remaining(id)));
                ids
            }
        }
    }

    /// The most critical gate among `ids`.
    ///
    /// # Panics
    ///
    /// Panics if `ids` is empty.
    pub fn most_critical(&self, ids: &[GateId]) -> GateId {
        assert!(!ids.is_empty());
        match &self.ddg {
            None => ids[0],
            Some(ddg) => ids
                .iter()
                .copied()
                .max_by_key(|&id| ddg.remaining(id))
                .unwrap(),
        }
    }

    /// Mark an available gate completed, promoting successors whose
    /// predecessors are now all done.
    ///
    /// # Panics
    ///
    /// Panics if the gate is not currently available.
    pub fn complete(&mut self, id: GateId) {
        match &self.ddg {
            None => {
                assert_eq!(self.next, id, "completed gate is not the next in block order");
                self.next += 1;
            }
            Some(ddg) => {
                let pos = self
                    .available
                    .iter()
                    .position(|&a| a == id)
                    .expect("completed gate is not in the available set");
                self.available.swap_remove(pos);
                let ddg = Arc::clone(ddg);
                for succ in ddg.successors_of(id) {
                    self.pending_preds[succ] -= 1;
                    if self.pending_preds[succ] == 0 {
                        self.available.push(succ);
                    }
                }
            }
        }
    }

    fn next_linear(&self) -> Option<GateId> {
        (self.next < self.instructions.len()).then_some(self.next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::RouterOptions;
    use crate::topology::Topology;
    use alsvid_ir::{InstructionType, Platform};
    use std::sync::Arc as StdArc;

    fn platform() -> Platform {
        let mut plat = Platform::new("test", 4, 1, 20);
        plat.define(InstructionType::gate("h", 1, 20));
        plat.define(InstructionType::gate("cnot", 2, 40));
        plat.define(InstructionType::classical("add"));
        plat
    }

    fn gate(plat: &Platform, name: &str, qubits: &[u32]) -> Instruction {
        Instruction::new(
            StdArc::clone(plat.find(name).unwrap()),
            qubits.iter().copied(),
        )
    }

    fn block(plat: &Platform) -> Block {
        let mut block = Block::new("b");
        block.push(gate(plat, "h", &[0]));
        block.push(gate(plat, "h", &[1]));
        block.push(gate(plat, "cnot", &[0, 1]));
        block
    }

    #[test]
    fn test_ddg_mode_promotes_successors() {
        let plat = platform();
        let topo = Topology::linear(4);
        let opts = RouterOptions::default();
        let ctx = RouteContext::new(&plat, &topo, &opts);
        let mut future = Future::new(ctx, &block(&plat));

        let ready = future.ready_gates();
        assert_eq!(ready.len(), 2); // both h gates
        assert!(!ready.contains(&2));

        future.complete(0);
        assert!(!future.ready_gates().contains(&2));
        future.complete(1);
        assert_eq!(future.ready_gates(), vec![2]);
        future.complete(2);
        assert!(future.ready_gates().is_empty());
    }

    #[test]
    fn test_criticality_orders_ready_set() {
        let plat = platform();
        let topo = Topology::linear(4);
        let opts = RouterOptions::default();
        let ctx = RouteContext::new(&plat, &topo, &opts);

        // h q2 is a dead end; h q0 feeds the cnot, so it is more critical.
        let mut b = Block::new("b");
        b.push(gate(&plat, "h", &[2]));
        b.push(gate(&plat, "h", &[0]));
        b.push(gate(&plat, "cnot", &[0, 1]));
        let future = Future::new(ctx, &b);

        let ready = future.ready_gates();
        assert_eq!(ready[0], 1);
        assert_eq!(future.most_critical(&ready), 1);
    }

    #[test]
    fn test_linear_mode_block_order() {
        let plat = platform();
        let topo = Topology::linear(4);
        let opts = RouterOptions {
            lookahead_mode: LookaheadMode::Disabled,
            ..RouterOptions::default()
        };
        let ctx = RouteContext::new(&plat, &topo, &opts);
        let mut future = Future::new(ctx, &block(&plat));

        assert_eq!(future.ready_gates(), vec![0]);
        future.complete(0);
        assert_eq!(future.ready_gates(), vec![1]);
        future.complete(1);
        future.complete(2);
        assert!(future.ready_gates().is_empty());
    }

    #[test]
    fn test_non_quantum_filter() {
        let plat = platform();
        let topo = Topology::linear(4);
        let opts = RouterOptions::default();
        let ctx = RouteContext::new(&plat, &topo, &opts);

        let mut b = Block::new("b");
        b.push(gate(&plat, "add", &[]));
        b.push(gate(&plat, "h", &[0]));
        let future = Future::new(ctx, &b);

        assert_eq!(future.ready_non_quantum(), vec![0]);
    }

    #[test]
    fn test_clone_is_independent() {
        let plat = platform();
        let topo = Topology::linear(4);
        let opts = RouterOptions::default();
        let ctx = RouteContext::new(&plat, &topo, &opts);
        let mut future = Future::new(ctx, &block(&plat));

        let snapshot = future.clone();
        future.complete(0);
        future.complete(1);
        assert_eq!(future.ready_gates(), vec![2]);
        assert_eq!(snapshot.ready_gates().len(), 2);
    }
}
