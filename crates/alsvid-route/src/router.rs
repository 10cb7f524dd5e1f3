//! Top-level routing loop.
//!
//! The router pulls ready gates from a [`Future`], generates [`Alter`]
//! candidates for the two-qubit gates that need routing, selects one
//! according to the configured heuristic (with optional speculative
//! recursion over cloned pasts), and commits it to the main [`Past`].
//! Blocks are routed independently; the routed gate stream is finally
//! lowered to primitives.

use std::time::{SystemTime, UNIX_EPOCH};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, instrument};

use alsvid_ir::{Block, InstrKind, Instruction, Platform, Program};

use crate::alter::Alter;
use crate::context::RouteContext;
use crate::error::{RouteError, RouteResult};
use crate::future::{Future, GateId};
use crate::mapping::{QubitMapping, QubitState};
use crate::options::{LookaheadMode, PathSelectionMode, RouterOptions};
use crate::past::Past;
use crate::placer::{self, PlaceOutcome};
use crate::primitives;
use crate::topology::{Topology, INFINITE};

/// Which neighbors to explore while generating shortest paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PathDir {
    /// Every neighbor that stays within budget.
    All,
    /// Only the first neighbor in angular order.
    Left,
    /// Only the last neighbor in angular order.
    Right,
    /// First and last; splits into `Left`/`Right` once a choice is made.
    LeftRight,
}

/// Counters accumulated over a routing run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoutingStats {
    /// Swaps emitted (inter-core ones included).
    pub swaps_added: u64,
    /// Moves emitted.
    pub moves_added: u64,
}

/// The routing engine. One instance routes one program; the RNG used by
/// the RANDOM tie-break belongs to the instance.
pub struct Router<'p> {
    ctx: RouteContext<'p>,
    rng: StdRng,
    stats: RoutingStats,
}

impl<'p> Router<'p> {
    /// Create a router, validating the option record.
    pub fn new(
        platform: &'p Platform,
        topology: &'p Topology,
        options: &'p RouterOptions,
    ) -> RouteResult<Self> {
        options.validate()?;
        let seed = options.rng_seed.unwrap_or_else(|| {
            // Unique to the microsecond, like it or not; pin rng_seed for
            // reproducible runs.
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_micros() as u64)
                .unwrap_or(0)
        });
        Ok(Self {
            ctx: RouteContext::new(platform, topology, options),
            rng: StdRng::seed_from_u64(seed),
            stats: RoutingStats::default(),
        })
    }

    /// Counters accumulated so far.
    pub fn stats(&self) -> RoutingStats {
        self.stats
    }

    /// Route a whole program, block by block.
    #[instrument(skip(self, program), fields(program = %program.name))]
    pub fn route(&mut self, program: &Program) -> RouteResult<Program> {
        info!(
            "routing {} blocks on {} qubits",
            program.blocks.len(),
            self.ctx.num_qubits()
        );
        let mut out = Program::new(program.name.clone());
        for block in &program.blocks {
            out.push(self.route_block(block)?);
        }
        info!(
            "routing done: {} swaps, {} moves added",
            self.stats.swaps_added, self.stats.moves_added
        );
        Ok(out)
    }

    /// Route one block: place, route, lower to primitives.
    pub fn route_block(&mut self, block: &Block) -> RouteResult<Block> {
        debug!("routing block '{}' ({} statements)", block.name, block.len());
        for inst in block {
            for &q in &inst.qubits {
                if q >= self.ctx.num_qubits() {
                    return Err(RouteError::QubitOutOfRange {
                        index: q,
                        num_qubits: self.ctx.num_qubits(),
                    });
                }
            }
        }

        let opts = self.ctx.options;
        let initial_state = if opts.assume_initialized {
            QubitState::Initialized
        } else {
            QubitState::None
        };
        let mut v2r = QubitMapping::new(
            self.ctx.num_qubits(),
            opts.initialize_one_to_one,
            initial_state,
        );

        if opts.enable_mip_placer {
            match placer::place(self.ctx, block, &v2r)? {
                PlaceOutcome::NewMap(perm) => {
                    let mut placed =
                        QubitMapping::new(self.ctx.num_qubits(), false, initial_state);
                    for (v, &r) in perm.iter().enumerate() {
                        placed.assign(v as u32, r);
                    }
                    debug!("placement found mapping {placed}");
                    v2r = placed;
                }
                PlaceOutcome::TimedOut => {
                    if opts.fail_on_timeout {
                        return Err(RouteError::PlacementTimeout(opts.mip_timeout));
                    }
                    debug!("placement timed out; continuing with current mapping");
                }
                outcome => debug!("placement outcome {outcome:?}; mapping unchanged"),
            }
        }

        let mut future = Future::new(self.ctx, block);
        let mut past = Past::new(self.ctx);
        past.import_mapping(v2r);

        self.map_gates(&mut future, &mut past)?;
        past.flush_all();
        let routed = past.drain_output();

        self.stats.swaps_added += past.num_swaps_added();
        self.stats.moves_added += past.num_moves_added();
        debug!(
            "block '{}' routed; final mapping: {}",
            block.name,
            past.mapping()
        );

        let lowered = primitives::lower(self.ctx, routed)?;
        Ok(Block {
            name: block.name.clone(),
            instructions: lowered,
        })
    }

    /// The outer loop: drain mappable gates, then route one alternative
    /// for the remaining two-qubit gates, until nothing is left.
    ///
    /// Terminates because every committed alternative either completes a
    /// gate or strictly reduces the distance between some gate's operands.
    fn map_gates(&mut self, future: &mut Future, past: &mut Past<'p>) -> RouteResult<()> {
        let also_nn = matches!(
            self.ctx.options.lookahead_mode,
            LookaheadMode::NoRoutingFirst | LookaheadMode::All
        );
        while let Some(lg) = self.drain_mappable(future, past, also_nn)? {
            let la = self.gen_alters(&lg, future, past)?;
            let base_max = past.max_free_cycle();
            let chosen = self.select_alter(la, future, past, base_max, 0)?;
            self.commit_alter(&chosen, future, past)?;
        }
        Ok(())
    }

    /// Map everything that needs no routing decision. Returns the
    /// remaining two-qubit gates, or `None` when the block is exhausted.
    ///
    /// Priority per iteration: non-quantum statements bypass the window
    /// first; then single-qubit/barrier gates; then (when `also_nn_2q`)
    /// any two-qubit gate whose operands are already adjacent within a
    /// core. What remains needs swaps.
    fn drain_mappable(
        &mut self,
        future: &mut Future,
        past: &mut Past<'p>,
        also_nn_2q: bool,
    ) -> RouteResult<Option<Vec<GateId>>> {
        loop {
            let nonq = future.ready_non_quantum();
            if !nonq.is_empty() {
                for id in nonq {
                    let inst = future.instruction(id).clone();
                    past.bypass(inst);
                    future.complete(id);
                }
                continue;
            }

            let qlg = future.ready_gates();
            if qlg.is_empty() {
                return Ok(None);
            }

            for &id in &qlg {
                let g = future.instruction(id);
                if g.kind() == InstrKind::Gate && g.qubits.len() > 2 {
                    return Err(RouteError::TooManyOperands(g.name().to_string()));
                }
            }

            // Trivially routable: barriers and gates on fewer than two
            // qubits.
            if let Some(&id) = qlg.iter().find(|&&id| {
                let g = future.instruction(id);
                g.is_barrier() || g.qubits.len() <= 1
            }) {
                let inst = future.instruction(id).clone();
                self.map_routed_gate(&inst, past)?;
                future.complete(id);
                continue;
            }

            if also_nn_2q {
                let mut found = None;
                for &id in &qlg {
                    let inst = future.instruction(id).clone();
                    let src = past.map_qubit(inst.qubits[0]);
                    let tgt = past.map_qubit(inst.qubits[1]);
                    if self.is_gate_adjacent(src, tgt) {
                        found = Some((id, inst));
                        break;
                    }
                }
                if let Some((id, inst)) = found {
                    debug!("mapping nearest-neighbor {} without routing", inst);
                    self.map_routed_gate(&inst, past)?;
                    future.complete(id);
                    continue;
                }
            }

            return Ok(Some(qlg));
        }
    }

    /// Adjacent within a core, so a two-qubit gate may execute there.
    fn is_gate_adjacent(&self, a: u32, b: u32) -> bool {
        self.ctx.topology.distance(a, b) == 1 && !self.ctx.topology.is_inter_core(a, b)
    }

    /// Rewrite one routable gate to real operands and schedule it.
    fn map_routed_gate(&mut self, inst: &Instruction, past: &mut Past<'p>) -> RouteResult<()> {
        for g in past.make_real(inst)? {
            past.add_and_schedule(g);
        }
        Ok(())
    }

    /// Generate alternatives for the gates needing routing: all of them
    /// under full lookahead, otherwise only the most critical one.
    ///
    /// # Panics
    ///
    /// Panics if no gate admits any alternative; the topology cannot
    /// execute the block then.
    fn gen_alters(
        &mut self,
        lg: &[GateId],
        future: &Future,
        past: &mut Past<'p>,
    ) -> RouteResult<Vec<Alter>> {
        let mut la = vec![];
        if self.ctx.options.lookahead_mode == LookaheadMode::All {
            for &id in lg {
                self.gen_alters_gate(id, future, past, &mut la)?;
            }
        } else {
            self.gen_alters_gate(lg[0], future, past, &mut la)?;
        }
        assert!(
            !la.is_empty(),
            "no routing alternative exists for any selected two-qubit gate"
        );
        Ok(la)
    }

    /// Generate the alternatives for one gate: all shortest paths between
    /// its current real operands (pruned per the path-selection mode and
    /// `max_alters`), each split at every feasible gate position.
    fn gen_alters_gate(
        &mut self,
        id: GateId,
        future: &Future,
        past: &mut Past<'p>,
        la: &mut Vec<Alter>,
    ) -> RouteResult<()> {
        let inst = future.instruction(id).clone();
        let src = past.map_qubit(inst.qubits[0]);
        let tgt = past.map_qubit(inst.qubits[1]);
        let budget = self.ctx.topology.distance(src, tgt);
        if budget == INFINITE {
            return Err(RouteError::Disconnected(src, tgt));
        }
        debug!(
            "alternatives for {} in real (q{src},q{tgt}) at distance {budget}",
            inst
        );

        let dir = match self.ctx.options.path_selection_mode {
            PathSelectionMode::All => PathDir::All,
            PathSelectionMode::Borders => PathDir::LeftRight,
        };
        let mut paths = self.gen_shortest_paths(src, tgt, budget, dir);
        let max_alters = self.ctx.options.max_alters;
        if max_alters > 0 && paths.len() > max_alters {
            paths.truncate(max_alters);
        }
        for path in paths {
            la.extend(Alter::create_from_path(self.ctx, id, path));
        }
        Ok(())
    }

    /// All paths from `src` to `tgt` spending exactly `budget` hops,
    /// restricted to the requested directions. Neighbors are explored in
    /// angular order, which is what gives `Left`/`Right` their meaning.
    fn gen_shortest_paths(&self, src: u32, tgt: u32, budget: u32, dir: PathDir) -> Vec<Vec<u32>> {
        if src == tgt {
            return vec![vec![src]];
        }
        let topo = self.ctx.topology;
        let mut nbs: Vec<u32> = topo
            .neighbors(src)
            .iter()
            .copied()
            .filter(|&n| topo.distance(n, tgt) < budget)
            .collect();
        match dir {
            PathDir::All => {}
            PathDir::Left => nbs.truncate(1),
            PathDir::Right => {
                if nbs.len() > 1 {
                    nbs = vec![*nbs.last().unwrap()];
                }
            }
            PathDir::LeftRight => {
                if nbs.len() > 2 {
                    nbs = vec![nbs[0], *nbs.last().unwrap()];
                }
            }
        }

        let split_choice = dir == PathDir::LeftRight && nbs.len() > 1;
        let mut result = vec![];
        for (i, &n) in nbs.iter().enumerate() {
            let sub_dir = if split_choice {
                if i == 0 {
                    PathDir::Left
                } else {
                    PathDir::Right
                }
            } else {
                dir
            };
            for sub in self.gen_shortest_paths(n, tgt, budget - 1, sub_dir) {
                let mut path = Vec::with_capacity(sub.len() + 1);
                path.push(src);
                path.extend(sub);
                result.push(path);
            }
        }
        result
    }

    /// Select one alternative.
    ///
    /// Base heuristics tie-break immediately. Min-extend heuristics score
    /// every alternative against `base_max`, keep the best-scoring subset
    /// (widened by the recursion width options), and, below the depth
    /// limit, speculatively commit each survivor to cloned state to let
    /// the lookahead decide, propagating the minimum score up.
    fn select_alter(
        &mut self,
        mut la: Vec<Alter>,
        future: &Future,
        past: &Past<'p>,
        base_max: u64,
        depth: u32,
    ) -> RouteResult<Alter> {
        assert!(!la.is_empty());
        let opts = self.ctx.options;

        if !opts.heuristic.is_min_extend() {
            return Ok(self.choose_alter(la, future));
        }

        for a in &mut la {
            a.extend(past, base_max)?;
        }
        la.sort_by_key(|a| a.score);
        let min_score = la[0].score;
        let min_count = la.iter().take_while(|a| a.score == min_score).count();

        // Retention: keep the best-scoring subset, widened (or narrowed)
        // by the width factor decayed per recursion level.
        let factor =
            opts.recursion_width_factor * opts.recursion_width_exponent.powi(depth as i32);
        let keep_real = (factor * min_count as f64).ceil().max(1.0);
        let keep = if keep_real >= la.len() as f64 {
            la.len()
        } else {
            (keep_real as usize).max(1)
        };
        la.truncate(keep.max(1));

        if depth >= opts.recursion_depth_limit {
            let best = la[0].score;
            la.retain(|a| a.score == best);
            return Ok(self.choose_alter(la, future));
        }

        // Recurse: commit each survivor speculatively and score it by the
        // best continuation it allows.
        let also_nn = opts.recurse_nn_two_qubit
            && matches!(
                opts.lookahead_mode,
                LookaheadMode::NoRoutingFirst | LookaheadMode::All
            );
        for a in &mut la {
            let mut future_copy = future.clone();
            let mut past_copy = past.clone();
            Self::commit_alter_inner(self.ctx, a, &mut future_copy, &mut past_copy)?;
            match self.drain_mappable(&mut future_copy, &mut past_copy, also_nn)? {
                Some(lg) => {
                    let sub = self.gen_alters(&lg, &future_copy, &mut past_copy)?;
                    let best =
                        self.select_alter(sub, &future_copy, &past_copy, base_max, depth + 1)?;
                    a.score = best.score;
                }
                None => {
                    a.score = past_copy.max_free_cycle().saturating_sub(base_max);
                }
            }
        }
        la.sort_by_key(|a| a.score);
        let best = la[0].score;
        la.retain(|a| a.score == best);
        Ok(self.choose_alter(la, future))
    }

    /// Tie-break between equally good alternatives.
    fn choose_alter(&mut self, mut la: Vec<Alter>, future: &Future) -> Alter {
        use crate::options::TieBreakMethod;
        debug_assert!(!la.is_empty());
        if la.len() == 1 {
            return la.pop().unwrap();
        }
        match self.ctx.options.tie_break_method {
            TieBreakMethod::First => la.swap_remove(0),
            TieBreakMethod::Last => la.pop().unwrap(),
            TieBreakMethod::Random => {
                let choice = self.rng.gen_range(0..la.len());
                la.swap_remove(choice)
            }
            TieBreakMethod::Critical => {
                let ids: Vec<GateId> = la.iter().map(|a| a.target).collect();
                let best = future.most_critical(&ids);
                let pos = la.iter().position(|a| a.target == best).unwrap_or(0);
                la.swap_remove(pos)
            }
        }
    }

    /// Commit the chosen alternative to the main state: emit its swaps,
    /// and map its target gate if the updated mapping made it adjacent
    /// (otherwise a later iteration routes it further).
    fn commit_alter(
        &mut self,
        alter: &Alter,
        future: &mut Future,
        past: &mut Past<'p>,
    ) -> RouteResult<()> {
        Self::commit_alter_inner(self.ctx, alter, future, past)
    }

    fn commit_alter_inner(
        ctx: RouteContext<'p>,
        alter: &Alter,
        future: &mut Future,
        past: &mut Past<'p>,
    ) -> RouteResult<()> {
        alter.add_swaps(past, ctx.options.swap_selection_mode)?;
        let inst = future.instruction(alter.target).clone();
        let src = past.map_qubit(inst.qubits[0]);
        let tgt = past.map_qubit(inst.qubits[1]);
        if ctx.topology.distance(src, tgt) == 1 && !ctx.topology.is_inter_core(src, tgt) {
            for g in past.make_real(&inst)? {
                past.add_and_schedule(g);
            }
            future.complete(alter.target);
        }
        Ok(())
    }
}

/// Route a program: the single entry point of the crate.
///
/// Returns an equivalent program whose gates use real qubit indices, with
/// swaps/moves inserted so that every two-qubit gate executes on adjacent
/// qubits, and primitive decomposition applied to the final stream.
pub fn route(
    program: &Program,
    platform: &Platform,
    topology: &Topology,
    options: &RouterOptions,
) -> RouteResult<Program> {
    let mut router = Router::new(platform, topology, options)?;
    router.route(program)
}
