//! One candidate routing action.
//!
//! An [`Alter`] makes a single non-adjacent two-qubit gate executable: it
//! records a shortest path between the gate's real operands and a split
//! point where the gate itself will run; the swaps implied by the two path
//! halves walk the operands together. Scoring an alternative clones a
//! [`Past`] and measures the cycle extension committing it would cause.

use tracing::trace;

use crate::context::RouteContext;
use crate::error::RouteResult;
use crate::future::GateId;
use crate::options::SwapSelectionMode;
use crate::past::Past;

/// A routing alternative for one two-qubit gate.
#[derive(Debug, Clone)]
pub struct Alter {
    /// The non-adjacent gate this alternative makes executable.
    pub target: GateId,
    /// Full path of real qubits from source operand to target operand.
    pub total: Vec<u32>,
    /// Path from the source operand up to and including the split point.
    pub from_source: Vec<u32>,
    /// Path from the target operand back to the split point (reversed).
    pub from_target: Vec<u32>,
    /// Cycle extension committing this alternative would cause; valid only
    /// after [`extend`](Self::extend).
    pub score: u64,
    scored: bool,
}

impl Alter {
    /// Generate all valid splits of a path for a gate.
    ///
    /// Each intra-core edge of the path yields one alternative with the
    /// two-qubit gate placed on that edge; inter-core edges cannot host a
    /// gate, so they produce none. An all-inter-core path yields an empty
    /// list.
    pub fn create_from_path(ctx: RouteContext<'_>, target: GateId, path: Vec<u32>) -> Vec<Self> {
        debug_assert!(path.len() >= 2, "a routing path visits at least both operands");
        let mut result = vec![];
        for right in (1..path.len()).rev() {
            let left = right - 1;
            if ctx.topology.is_inter_core(path[left], path[right]) {
                continue;
            }
            let from_source = path[..=left].to_vec();
            let mut from_target = path[right..].to_vec();
            from_target.reverse();
            result.push(Self {
                target,
                total: path.clone(),
                from_source,
                from_target,
                score: 0,
                scored: false,
            });
        }
        result
    }

    /// Whether [`extend`](Self::extend) has scored this alternative.
    pub fn is_scored(&self) -> bool {
        self.scored
    }

    /// Emit this alternative's swaps into `past` and schedule them.
    ///
    /// `mode` selects how much of the path is committed: only the first
    /// hop on each side (`One`), everything (`All`), or the single hop
    /// whose swap can start earliest (`Earliest`).
    pub fn add_swaps(&self, past: &mut Past<'_>, mode: SwapSelectionMode) -> RouteResult<()> {
        match mode {
            SwapSelectionMode::One | SwapSelectionMode::All => {
                let limit = if mode == SwapSelectionMode::One {
                    1
                } else {
                    usize::MAX
                };
                let mut added = 0;
                for pair in self.from_source.windows(2) {
                    if added >= limit {
                        break;
                    }
                    past.add_swap(pair[0], pair[1])?;
                    added += 1;
                }
                for pair in self.from_target.windows(2) {
                    if added >= limit {
                        break;
                    }
                    past.add_swap(pair[0], pair[1])?;
                    added += 1;
                }
            }
            SwapSelectionMode::Earliest => {
                if self.from_source.len() >= 2 && self.from_target.len() >= 2 {
                    if past.is_first_swap_earliest(
                        self.from_source[0],
                        self.from_source[1],
                        self.from_target[0],
                        self.from_target[1],
                    ) {
                        past.add_swap(self.from_source[0], self.from_source[1])?;
                    } else {
                        past.add_swap(self.from_target[0], self.from_target[1])?;
                    }
                } else if self.from_source.len() >= 2 {
                    past.add_swap(self.from_source[0], self.from_source[1])?;
                } else if self.from_target.len() >= 2 {
                    past.add_swap(self.from_target[0], self.from_target[1])?;
                }
            }
        }
        past.schedule();
        Ok(())
    }

    /// Score this alternative: clone `past`, commit all its swaps there,
    /// and record the cycle extension relative to `base_max` (the main
    /// past's frontier at the start of this routing step).
    pub fn extend(&mut self, past: &Past<'_>, base_max: u64) -> RouteResult<()> {
        let mut probe = past.clone();
        self.add_swaps(&mut probe, SwapSelectionMode::All)?;
        self.score = probe.max_free_cycle().saturating_sub(base_max);
        self.scored = true;
        trace!(
            "alternative over {:?} scores extension {}",
            self.total,
            self.score
        );
        Ok(())
    }
}
