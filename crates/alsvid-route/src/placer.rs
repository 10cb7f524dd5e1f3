//! Mixed-integer-programming initial placement.
//!
//! Optional pre-pass that picks an initial virtual-to-real mapping by
//! solving the linearized quadratic-assignment problem: place each
//! *facility* (a virtual qubit used by two-qubit gates) at a *location*
//! (a real qubit) minimizing Σ refcount·distance. The solver runs on a
//! worker thread so a wall-clock timeout can cut it off; on timeout the
//! heuristic router proceeds with the mapping unchanged.

use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use good_lp::{constraint, default_solver, variable, variables, Expression, Solution, SolverModel, Variable};
use rustc_hash::FxHashMap;
use tracing::{debug, info};

use alsvid_ir::Block;

use crate::context::RouteContext;
use crate::error::RouteResult;
use crate::mapping::QubitMapping;
use crate::topology::INFINITE;

/// Outcome of a placement attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaceOutcome {
    /// The block has no two-qubit gates; any mapping works.
    Any,
    /// All two-qubit gates are already nearest-neighbor under the current
    /// mapping.
    Current,
    /// The solver found an assignment; the contained vector is a full
    /// permutation of the real qubits, indexed by virtual qubit.
    NewMap(Vec<u32>),
    /// The model is infeasible (or the solver failed); non-fatal.
    Failed,
    /// The solver hit its wall-clock limit.
    TimedOut,
}

/// Compute an initial placement for a block.
///
/// `current` is the mapping the router would otherwise start from; it is
/// used to decide whether the block is already nearest-neighbor.
pub fn place(
    ctx: RouteContext<'_>,
    block: &Block,
    current: &QubitMapping,
) -> RouteResult<PlaceOutcome> {
    let mut pair_counts: FxHashMap<(u32, u32), u64> = FxHashMap::default();
    for inst in block {
        if inst.is_two_qubit() {
            *pair_counts.entry((inst.qubits[0], inst.qubits[1])).or_default() += 1;
        }
    }
    if pair_counts.is_empty() {
        return Ok(PlaceOutcome::Any);
    }

    // Nearest-neighbor already? Interpret virtuals through the current
    // mapping, identity for the not-yet-mapped.
    let real_of = |v: u32| current.real(v).unwrap_or(v);
    if pair_counts
        .keys()
        .all(|&(a, b)| ctx.topology.distance(real_of(a), real_of(b)) == 1)
    {
        return Ok(PlaceOutcome::Current);
    }

    apply_horizon(ctx.options.mip_horizon, &mut pair_counts);

    // Facilities: virtual qubits appearing in the (surviving) two-qubit
    // pairs, in index order.
    let num_qubits = ctx.num_qubits() as usize;
    let mut is_facility = vec![false; num_qubits];
    for &(a, b) in pair_counts.keys() {
        is_facility[a as usize] = true;
        is_facility[b as usize] = true;
    }
    let fac_to_virt: Vec<u32> = (0..num_qubits as u32)
        .filter(|&v| is_facility[v as usize])
        .collect();
    let mut virt_to_fac = vec![usize::MAX; num_qubits];
    for (fac, &v) in fac_to_virt.iter().enumerate() {
        virt_to_fac[v as usize] = fac;
    }
    let nfac = fac_to_virt.len();
    debug!("placement: {nfac} facilities over {num_qubits} locations");

    let mut refcount = vec![vec![0u64; nfac]; nfac];
    for (&(a, b), &count) in &pair_counts {
        refcount[virt_to_fac[a as usize]][virt_to_fac[b as usize]] = count;
    }

    let mut dist = vec![vec![0u64; num_qubits]; num_qubits];
    for k in 0..num_qubits {
        for l in 0..num_qubits {
            let d = ctx.topology.distance(k as u32, l as u32);
            assert!(
                d != INFINITE,
                "placement requires a connected topology (qubits {k} and {l} are not)"
            );
            dist[k][l] = u64::from(d);
        }
    }

    // Run the solver on a worker thread so the wall-clock limit can cut
    // it off.
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let _ = tx.send(solve_assignment(nfac, num_qubits, &refcount, &dist));
    });
    let timeout = ctx.options.mip_timeout;
    let solved = if timeout > 0 {
        match rx.recv_timeout(Duration::from_secs(timeout)) {
            Ok(result) => result,
            Err(mpsc::RecvTimeoutError::Timeout) => {
                info!("placement solver exceeded {timeout}s");
                return Ok(PlaceOutcome::TimedOut);
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => return Ok(PlaceOutcome::Failed),
        }
    } else {
        match rx.recv() {
            Ok(result) => result,
            Err(_) => return Ok(PlaceOutcome::Failed),
        }
    };
    let Some(assignment) = solved else {
        return Ok(PlaceOutcome::Failed);
    };

    // Fill the full permutation: solved facilities first, then the rest
    // greedily, preferring the identity where still possible.
    let mut virt_to_real: Vec<Option<u32>> = vec![None; num_qubits];
    let mut real_used = vec![false; num_qubits];
    for (fac, &loc) in assignment.iter().enumerate() {
        virt_to_real[fac_to_virt[fac] as usize] = Some(loc as u32);
        real_used[loc] = true;
    }
    for v in 0..num_qubits {
        if virt_to_real[v].is_none() && !real_used[v] {
            virt_to_real[v] = Some(v as u32);
            real_used[v] = true;
        }
    }
    let mut free = (0..num_qubits).filter(|&r| !real_used[r]);
    for slot in &mut virt_to_real {
        if slot.is_none() {
            *slot = Some(free.next().expect("a free real qubit remains") as u32);
        }
    }

    let perm: Vec<u32> = virt_to_real.into_iter().map(Option::unwrap).collect();
    debug_assert!(is_permutation(&perm));
    Ok(PlaceOutcome::NewMap(perm))
}

/// Keep only the `horizon` most frequent pairs. 0 disables truncation.
fn apply_horizon(horizon: usize, pair_counts: &mut FxHashMap<(u32, u32), u64>) {
    if horizon == 0 || horizon >= pair_counts.len() {
        return;
    }
    let mut entries: Vec<((u32, u32), u64)> = pair_counts.drain().collect();
    // Most frequent first; ties broken by pair index for determinism.
    entries.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    entries.truncate(horizon);
    pair_counts.extend(entries);
}

/// Build and solve the linearized quadratic-assignment model.
///
/// Variables: binary `x[i][k]` (facility `i` at location `k`) and
/// continuous `w[i][k] >= 0` as linearization slack. Constraints: each
/// facility placed exactly once, each location hosting at most one
/// facility, and for every `(i,k)`
///
/// ```text
/// costmax[i][k]·x[i][k] + Σ_{j,l} refcount[i][j]·dist[k][l]·x[j][l]
///     − w[i][k] <= costmax[i][k]
/// ```
///
/// with objective `minimize 0.1·Σ w[i][k]`. Returns the location chosen
/// for each facility, or `None` when infeasible.
fn solve_assignment(
    nfac: usize,
    nloc: usize,
    refcount: &[Vec<u64>],
    dist: &[Vec<u64>],
) -> Option<Vec<usize>> {
    let mut vars = variables!();
    let x: Vec<Vec<Variable>> = (0..nfac)
        .map(|_| (0..nloc).map(|_| vars.add(variable().binary())).collect())
        .collect();
    let w: Vec<Vec<Variable>> = (0..nfac)
        .map(|_| (0..nloc).map(|_| vars.add(variable().min(0))).collect())
        .collect();

    let mut costmax = vec![vec![0u64; nloc]; nfac];
    for i in 0..nfac {
        for k in 0..nloc {
            for j in 0..nfac {
                for l in 0..nloc {
                    costmax[i][k] += refcount[i][j] * dist[k][l];
                }
            }
        }
    }

    let objective: Expression = w.iter().flatten().map(|&v| 0.1 * v).sum();
    let mut model = vars.minimise(objective).using(default_solver);

    for row in &x {
        let placed: Expression = row.iter().map(|&v| Expression::from(v)).sum();
        model = model.with(constraint!(placed == 1.0));
    }
    for k in 0..nloc {
        let hosted: Expression = (0..nfac).map(|i| Expression::from(x[i][k])).sum();
        model = model.with(constraint!(hosted <= 1.0));
    }
    for i in 0..nfac {
        for k in 0..nloc {
            let mut lhs: Expression = (costmax[i][k] as f64) * x[i][k];
            for j in 0..nfac {
                for l in 0..nloc {
                    let coefficient = (refcount[i][j] * dist[k][l]) as f64;
                    if coefficient != 0.0 {
                        lhs += coefficient * x[j][l];
                    }
                }
            }
            let lhs = lhs - w[i][k];
            model = model.with(constraint!(lhs <= costmax[i][k] as f64));
        }
    }

    let solution = model.solve().ok()?;
    let mut assignment = Vec::with_capacity(nfac);
    for row in &x {
        let loc = (0..nloc).find(|&k| solution.value(row[k]) > 0.5)?;
        assignment.push(loc);
    }
    Some(assignment)
}

fn is_permutation(perm: &[u32]) -> bool {
    let mut seen = vec![false; perm.len()];
    perm.iter().all(|&r| {
        let Some(slot) = seen.get_mut(r as usize) else {
            return false;
        };
        !std::mem::replace(slot, true)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::QubitState;
    use crate::options::RouterOptions;
    use crate::topology::Topology;
    use alsvid_ir::{Instruction, InstructionType, Platform};
    use std::sync::Arc;

    fn platform(n: u32) -> Platform {
        let mut plat = Platform::new("test", n, 0, 20);
        plat.define(InstructionType::gate("h", 1, 20));
        plat.define(InstructionType::gate("cnot", 2, 40));
        plat
    }

    fn gate(plat: &Platform, name: &str, qubits: &[u32]) -> Instruction {
        Instruction::new(Arc::clone(plat.find(name).unwrap()), qubits.iter().copied())
    }

    fn identity(n: u32) -> QubitMapping {
        QubitMapping::new(n, true, QubitState::None)
    }

    #[test]
    fn test_no_two_qubit_gates_is_any() {
        let plat = platform(3);
        let topo = Topology::linear(3);
        let opts = RouterOptions::default();
        let ctx = RouteContext::new(&plat, &topo, &opts);

        let mut block = Block::new("b");
        block.push(gate(&plat, "h", &[0]));
        let outcome = place(ctx, &block, &identity(3)).unwrap();
        assert_eq!(outcome, PlaceOutcome::Any);
    }

    #[test]
    fn test_nearest_neighbor_is_current() {
        let plat = platform(3);
        let topo = Topology::linear(3);
        let opts = RouterOptions::default();
        let ctx = RouteContext::new(&plat, &topo, &opts);

        let mut block = Block::new("b");
        block.push(gate(&plat, "cnot", &[0, 1]));
        block.push(gate(&plat, "cnot", &[1, 2]));
        let outcome = place(ctx, &block, &identity(3)).unwrap();
        assert_eq!(outcome, PlaceOutcome::Current);
    }

    #[test]
    fn test_distant_pair_gets_new_map() {
        let plat = platform(3);
        let topo = Topology::linear(3);
        let opts = RouterOptions::default();
        let ctx = RouteContext::new(&plat, &topo, &opts);

        let mut block = Block::new("b");
        block.push(gate(&plat, "cnot", &[0, 2]));
        block.push(gate(&plat, "cnot", &[0, 2]));
        let outcome = place(ctx, &block, &identity(3)).unwrap();
        let PlaceOutcome::NewMap(perm) = outcome else {
            panic!("expected a new mapping, got {outcome:?}");
        };
        assert!(is_permutation(&perm));
        // The placed facilities are adjacent.
        assert_eq!(topo.distance(perm[0], perm[2]), 1);
    }

    #[test]
    fn test_horizon_keeps_most_frequent() {
        let mut counts: FxHashMap<(u32, u32), u64> = FxHashMap::default();
        counts.insert((0, 1), 5);
        counts.insert((1, 2), 3);
        counts.insert((2, 3), 9);
        apply_horizon(2, &mut counts);
        assert_eq!(counts.len(), 2);
        assert!(counts.contains_key(&(2, 3)));
        assert!(counts.contains_key(&(0, 1)));
    }

    #[test]
    fn test_is_permutation() {
        assert!(is_permutation(&[2, 0, 1]));
        assert!(!is_permutation(&[0, 0, 1]));
        assert!(!is_permutation(&[0, 3, 1]));
    }
}
