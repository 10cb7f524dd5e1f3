//! Data-dependency graph over a block.
//!
//! Built once per block, read-only during routing. Nodes are arena
//! indices over the block's instruction vector plus a synthetic source
//! and sink; edges capture qubit and classical-bit dependences with
//! configurable commutation. Criticality ("remaining": the longest path
//! to the sink, in cycles) is precomputed for availability ordering and
//! the CRITICAL tie-break.

use alsvid_ir::{Block, InstrKind, Instruction};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use rustc_hash::FxHashMap;

use crate::context::RouteContext;

/// A node in the dependency graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DdgNode {
    /// Synthetic start-of-block node.
    Source,
    /// Synthetic end-of-block node.
    Sink,
    /// An instruction, by index into the block.
    Op(usize),
}

/// How an instruction uses a wire, for commutation purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UseClass {
    /// Full dependence: orders against everything.
    Write,
    /// Z-axis use: commutes with other Z-axis uses of the same qubit.
    ZCommute,
    /// X-axis use: commutes with other X-axis uses of the same qubit.
    XCommute,
}

/// Tracks the commutation state of one wire while building.
#[derive(Debug, Clone)]
struct WireState {
    class: UseClass,
    /// Ops in the current same-class group.
    group: Vec<NodeIndex>,
    /// The group the current one must order after.
    prev_group: Vec<NodeIndex>,
}

impl WireState {
    fn new(source: NodeIndex) -> Self {
        Self {
            class: UseClass::Write,
            group: vec![source],
            prev_group: vec![],
        }
    }
}

/// Immutable dependency graph with precomputed criticality.
#[derive(Debug)]
pub struct DepGraph {
    graph: DiGraph<DdgNode, ()>,
    source: NodeIndex,
    sink: NodeIndex,
    /// Node for each instruction index.
    op_nodes: Vec<NodeIndex>,
    /// Longest path to the sink, in cycles, per node.
    remaining: Vec<u64>,
}

impl DepGraph {
    /// Build the graph for a block under the context's commutation options.
    pub fn build(ctx: RouteContext<'_>, block: &Block) -> Self {
        let mut graph = DiGraph::new();
        let source = graph.add_node(DdgNode::Source);
        let sink = graph.add_node(DdgNode::Sink);

        let mut qubit_state: FxHashMap<u32, WireState> = FxHashMap::default();
        let mut bit_state: FxHashMap<u32, WireState> = FxHashMap::default();

        let mut op_nodes = Vec::with_capacity(block.len());
        for (idx, inst) in block.iter().enumerate() {
            let node = graph.add_node(DdgNode::Op(idx));
            op_nodes.push(node);

            for (q, class) in Self::qubit_uses(ctx, inst, block) {
                let state = qubit_state
                    .entry(q)
                    .or_insert_with(|| WireState::new(source));
                Self::chain(&mut graph, state, node, class);
            }
            for b in Self::bit_uses(inst) {
                let state = bit_state
                    .entry(b)
                    .or_insert_with(|| WireState::new(source));
                Self::chain(&mut graph, state, node, UseClass::Write);
            }
            // An instruction touching nothing still orders after the start.
            if graph.edges_directed(node, Direction::Incoming).next().is_none() {
                graph.update_edge(source, node, ());
            }
        }

        // Close every dangling op (and the source) onto the sink.
        for &node in op_nodes.iter().chain(std::iter::once(&source)) {
            if graph.edges_directed(node, Direction::Outgoing).next().is_none() {
                graph.update_edge(node, sink, ());
            }
        }

        let remaining = Self::compute_remaining(ctx, &graph, sink, block);

        Self {
            graph,
            source,
            sink,
            op_nodes,
            remaining,
        }
    }

    /// Chain `node` into a wire's commutation state, adding dependence
    /// edges.
    fn chain(
        graph: &mut DiGraph<DdgNode, ()>,
        state: &mut WireState,
        node: NodeIndex,
        class: UseClass,
    ) {
        if class == UseClass::Write || class != state.class {
            // New group: order after everything in the current group.
            for &prev in &state.group {
                graph.update_edge(prev, node, ());
            }
            state.prev_group = std::mem::take(&mut state.group);
            state.group.push(node);
            state.class = class;
        } else {
            // Same commuting class: independent of the group, but still
            // ordered after the group before it.
            for &prev in &state.prev_group {
                graph.update_edge(prev, node, ());
            }
            state.group.push(node);
        }
    }

    /// Classify each qubit use of an instruction.
    fn qubit_uses(
        ctx: RouteContext<'_>,
        inst: &Instruction,
        block: &Block,
    ) -> Vec<(u32, UseClass)> {
        // A barrier with no operands fences every qubit the block uses.
        if inst.is_barrier() && inst.qubits.is_empty() {
            let mut all: Vec<u32> = block
                .iter()
                .flat_map(|g| g.qubits.iter().copied())
                .collect();
            all.sort_unstable();
            all.dedup();
            return all.into_iter().map(|q| (q, UseClass::Write)).collect();
        }

        let opts = ctx.options;
        inst.qubits
            .iter()
            .enumerate()
            .map(|(pos, &q)| {
                let class = match (inst.kind(), inst.name()) {
                    (InstrKind::Gate, "cz") if opts.commute_multi_qubit => UseClass::ZCommute,
                    (InstrKind::Gate, "cnot" | "cx") if opts.commute_multi_qubit => {
                        if pos == 0 {
                            UseClass::ZCommute
                        } else {
                            UseClass::XCommute
                        }
                    }
                    (InstrKind::Gate, "z" | "rz" | "s" | "sdg" | "t" | "tdg")
                        if opts.commute_single_qubit =>
                    {
                        UseClass::ZCommute
                    }
                    (InstrKind::Gate, "x" | "rx") if opts.commute_single_qubit => {
                        UseClass::XCommute
                    }
                    _ => UseClass::Write,
                };
                (q, class)
            })
            .collect()
    }

    fn bit_uses(inst: &Instruction) -> Vec<u32> {
        let mut bits = inst.bits.clone();
        if let Some(cond) = &inst.condition {
            bits.extend(cond.iter().copied());
        }
        bits
    }

    /// Longest path to the sink in cycles, per node, by reverse
    /// topological dynamic programming.
    fn compute_remaining(
        ctx: RouteContext<'_>,
        graph: &DiGraph<DdgNode, ()>,
        sink: NodeIndex,
        block: &Block,
    ) -> Vec<u64> {
        let order = petgraph::algo::toposort(graph, None)
            .expect("dependency graph is acyclic by construction");
        let mut remaining = vec![0u64; graph.node_count()];
        for &node in order.iter().rev() {
            if node == sink {
                continue;
            }
            let succ_max = graph
                .edges_directed(node, Direction::Outgoing)
                .map(|e| remaining[e.target().index()])
                .max()
                .unwrap_or(0);
            let duration = match graph[node] {
                DdgNode::Op(idx) => ctx.cycles(block.instructions[idx].duration_ns()),
                DdgNode::Source | DdgNode::Sink => 0,
            };
            remaining[node.index()] = succ_max + duration;
        }
        remaining
    }

    /// Node handle for an instruction index.
    pub fn node_of(&self, idx: usize) -> NodeIndex {
        self.op_nodes[idx]
    }

    /// Number of instructions covered.
    pub fn num_ops(&self) -> usize {
        self.op_nodes.len()
    }

    /// Instruction indices that depend directly on `idx`.
    pub fn successors_of(&self, idx: usize) -> impl Iterator<Item = usize> + '_ {
        self.graph
            .edges_directed(self.op_nodes[idx], Direction::Outgoing)
            .filter_map(|e| match self.graph[e.target()] {
                DdgNode::Op(i) => Some(i),
                _ => None,
            })
    }

    /// Number of instruction predecessors of `idx` (the source does not
    /// count).
    pub fn num_op_predecessors(&self, idx: usize) -> usize {
        self.graph
            .edges_directed(self.op_nodes[idx], Direction::Incoming)
            .filter(|e| matches!(self.graph[e.source()], DdgNode::Op(_)))
            .count()
    }

    /// Criticality of an instruction: longest path to the block sink, in
    /// cycles.
    pub fn remaining(&self, idx: usize) -> u64 {
        self.remaining[self.op_nodes[idx].index()]
    }

    /// The synthetic source node.
    pub fn source(&self) -> NodeIndex {
        self.source
    }

    /// The synthetic sink node.
    pub fn sink(&self) -> NodeIndex {
        self.sink
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::RouterOptions;
    use crate::topology::Topology;
    use alsvid_ir::{InstructionType, Platform};
    use std::sync::Arc;

    fn platform() -> Platform {
        let mut plat = Platform::new("test", 4, 2, 20);
        plat.define(InstructionType::gate("h", 1, 20));
        plat.define(InstructionType::gate("x", 1, 20));
        plat.define(InstructionType::gate("rz", 1, 20));
        plat.define(InstructionType::gate("cnot", 2, 40));
        plat.define(InstructionType::gate("cz", 2, 40));
        plat.define(InstructionType::measure("measure", 60));
        plat
    }

    fn gate(plat: &Platform, name: &str, qubits: &[u32]) -> Instruction {
        Instruction::new(Arc::clone(plat.find(name).unwrap()), qubits.iter().copied())
    }

    #[test]
    fn test_sequential_dependence() {
        let plat = platform();
        let topo = Topology::linear(4);
        let opts = RouterOptions::default();
        let ctx = RouteContext::new(&plat, &topo, &opts);

        let mut block = Block::new("b");
        block.push(gate(&plat, "h", &[0]));
        block.push(gate(&plat, "cnot", &[0, 1]));
        block.push(gate(&plat, "h", &[1]));
        let ddg = DepGraph::build(ctx, &block);

        assert_eq!(ddg.num_op_predecessors(0), 0);
        assert_eq!(ddg.num_op_predecessors(1), 1);
        assert_eq!(ddg.num_op_predecessors(2), 1);
        let succ: Vec<_> = ddg.successors_of(0).collect();
        assert_eq!(succ, vec![1]);
    }

    #[test]
    fn test_remaining_is_longest_path() {
        let plat = platform();
        let topo = Topology::linear(4);
        let opts = RouterOptions::default();
        let ctx = RouteContext::new(&plat, &topo, &opts);

        let mut block = Block::new("b");
        block.push(gate(&plat, "h", &[0])); // 1 cycle
        block.push(gate(&plat, "cnot", &[0, 1])); // 2 cycles
        block.push(gate(&plat, "h", &[1])); // 1 cycle
        let ddg = DepGraph::build(ctx, &block);

        assert_eq!(ddg.remaining(2), 1);
        assert_eq!(ddg.remaining(1), 3);
        assert_eq!(ddg.remaining(0), 4);
    }

    #[test]
    fn test_cz_commutation() {
        let plat = platform();
        let topo = Topology::linear(4);
        let opts = RouterOptions {
            commute_multi_qubit: true,
            ..RouterOptions::default()
        };
        let ctx = RouteContext::new(&plat, &topo, &opts);

        // Two CZs sharing qubit 1 commute; the x on qubit 1 does not.
        let mut block = Block::new("b");
        block.push(gate(&plat, "cz", &[0, 1]));
        block.push(gate(&plat, "cz", &[1, 2]));
        block.push(gate(&plat, "x", &[1]));
        let ddg = DepGraph::build(ctx, &block);

        assert_eq!(ddg.num_op_predecessors(0), 0);
        assert_eq!(ddg.num_op_predecessors(1), 0);
        // x orders after both CZs.
        assert_eq!(ddg.num_op_predecessors(2), 2);
    }

    #[test]
    fn test_cz_ordering_without_commutation() {
        let plat = platform();
        let topo = Topology::linear(4);
        let opts = RouterOptions::default();
        let ctx = RouteContext::new(&plat, &topo, &opts);

        let mut block = Block::new("b");
        block.push(gate(&plat, "cz", &[0, 1]));
        block.push(gate(&plat, "cz", &[1, 2]));
        let ddg = DepGraph::build(ctx, &block);

        assert_eq!(ddg.num_op_predecessors(1), 1);
    }

    #[test]
    fn test_single_qubit_commutation() {
        let plat = platform();
        let topo = Topology::linear(4);
        let opts = RouterOptions {
            commute_single_qubit: true,
            ..RouterOptions::default()
        };
        let ctx = RouteContext::new(&plat, &topo, &opts);

        let mut block = Block::new("b");
        block.push(gate(&plat, "rz", &[0]));
        block.push(gate(&plat, "rz", &[0]));
        block.push(gate(&plat, "x", &[0]));
        let ddg = DepGraph::build(ctx, &block);

        // The two rz commute with each other; x waits for both.
        assert_eq!(ddg.num_op_predecessors(0), 0);
        assert_eq!(ddg.num_op_predecessors(1), 0);
        assert_eq!(ddg.num_op_predecessors(2), 2);
    }

    #[test]
    fn test_measure_bit_dependence() {
        let plat = platform();
        let topo = Topology::linear(4);
        let opts = RouterOptions::default();
        let ctx = RouteContext::new(&plat, &topo, &opts);

        // Both measures write bit 0; they order even on distinct qubits.
        let mut block = Block::new("b");
        block.push(gate(&plat, "measure", &[0]).with_bits([0]));
        block.push(gate(&plat, "measure", &[2]).with_bits([0]));
        let ddg = DepGraph::build(ctx, &block);

        assert_eq!(ddg.num_op_predecessors(1), 1);
    }

    #[test]
    fn test_global_barrier_fences_everything() {
        let mut plat = platform();
        plat.define(InstructionType::barrier("barrier"));
        let topo = Topology::linear(4);
        let opts = RouterOptions::default();
        let ctx = RouteContext::new(&plat, &topo, &opts);

        let mut block = Block::new("b");
        block.push(gate(&plat, "h", &[0]));
        block.push(gate(&plat, "h", &[2]));
        block.push(gate(&plat, "barrier", &[]));
        block.push(gate(&plat, "h", &[0]));
        let ddg = DepGraph::build(ctx, &block);

        assert_eq!(ddg.num_op_predecessors(2), 2);
        assert_eq!(ddg.num_op_predecessors(3), 1);
    }
}
