//! Router configuration.
//!
//! One immutable [`RouterOptions`] record is passed by reference through
//! the whole call tree; nothing here is global or mutable during routing.

use serde::{Deserialize, Serialize};

use crate::error::{RouteError, RouteResult};

/// Which routing alternatives count as best.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Heuristic {
    /// All alternatives are equivalent; the tie-break picks one. Scheduling
    /// ignores platform resource constraints.
    #[default]
    Base,
    /// As [`Heuristic::Base`], but start-cycle queries respect platform
    /// resource constraints.
    BaseRc,
    /// Favor the alternative with minimal cycle extension, speculating
    /// recursively between equally good candidates.
    MinExtend,
    /// As [`Heuristic::MinExtend`], with resource-constrained scheduling.
    MinExtendRc,
    /// Reserved: fidelity-driven selection. Not supported; rejected by
    /// [`RouterOptions::validate`].
    MaxFidelity,
}

impl Heuristic {
    /// Whether start-cycle queries must consult the platform resource state.
    pub fn is_resource_constrained(self) -> bool {
        matches!(self, Heuristic::BaseRc | Heuristic::MinExtendRc)
    }

    /// Whether alternatives are scored by cycle extension.
    pub fn is_min_extend(self) -> bool {
        matches!(self, Heuristic::MinExtend | Heuristic::MinExtendRc)
    }
}

/// How to break ties between equally scoring alternatives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TieBreakMethod {
    /// Take the first alternative.
    First,
    /// Take the last alternative.
    Last,
    /// Draw one uniformly at random.
    #[default]
    Random,
    /// Take the alternative whose target gate is most critical.
    Critical,
}

/// Strategy for selecting the next gate(s) to map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LookaheadMode {
    /// No lookahead: gates are consumed in block order.
    Disabled,
    /// Map non-quantum and single-qubit gates first, then route the most
    /// critical two-qubit gate.
    OneQubitFirst,
    /// Additionally map nearest-neighbor two-qubit gates eagerly; only
    /// non-adjacent two-qubit gates trigger routing.
    #[default]
    NoRoutingFirst,
    /// As `NoRoutingFirst`, but alternatives are generated for every
    /// non-adjacent two-qubit gate in the available set, not just the most
    /// critical one.
    All,
}

/// Which shortest paths are considered when routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PathSelectionMode {
    /// All shortest paths.
    #[default]
    All,
    /// Only paths hugging the borders of the source/target rectangle.
    /// Requires planar coordinates in the topology.
    Borders,
}

/// How many of an alternative's swaps are committed per routing step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SwapSelectionMode {
    /// Only the first swap on each side of the split.
    One,
    /// Every swap implied by the path.
    #[default]
    All,
    /// One swap: whichever side's first hop can start earliest.
    Earliest,
}

/// Main options record for the router.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouterOptions {
    /// Treat all qubits as |0> at block entry.
    pub assume_initialized: bool,

    /// Assume a prep gate leaves its qubit in |0> (state INITIALIZED
    /// rather than LIVE), enabling the swap-to-move optimization after it.
    pub assume_prep_only_initializes: bool,

    /// Start each block with the identity virtual-to-real mapping instead
    /// of an undefined one.
    pub initialize_one_to_one: bool,

    /// Alternative-selection heuristic.
    pub heuristic: Heuristic,

    /// Cap on the number of alternatives considered per two-qubit gate.
    /// 0 means no limit.
    pub max_alters: usize,

    /// Tie-break between equally scoring alternatives.
    pub tie_break_method: TieBreakMethod,

    /// Next-gate selection strategy.
    pub lookahead_mode: LookaheadMode,

    /// Shortest-path pruning strategy.
    pub path_selection_mode: PathSelectionMode,

    /// How many swaps of the chosen alternative to commit per step.
    pub swap_selection_mode: SwapSelectionMode,

    /// Whether speculative recursion may also map nearest-neighbor
    /// two-qubit gates greedily.
    pub recurse_nn_two_qubit: bool,

    /// Maximum depth of speculative recursion. 0 disables recursion.
    pub recursion_depth_limit: u32,

    /// Fraction of best-scoring alternatives kept when recursing, as a
    /// factor of their count, rounded up.
    pub recursion_width_factor: f64,

    /// Per-level adjustment of `recursion_width_factor`: at depth `d` the
    /// factor is `recursion_width_factor * recursion_width_exponent^d`.
    pub recursion_width_exponent: f64,

    /// Replace a swap by a move when one operand holds no live state.
    pub use_move_gates: bool,

    /// Maximum cycle extension tolerated for inserting the initialization
    /// a move needs.
    pub max_move_penalty: u64,

    /// Reverse swap operands when the free-cycle map prefers it. Relies on
    /// the swap decomposition using its second operand one cycle earlier
    /// than its first.
    pub reverse_swap_if_better: bool,

    /// Let the dependency graph commute control operands of CZ/CNOT-like
    /// gates.
    pub commute_multi_qubit: bool,

    /// Let the dependency graph commute single-qubit Z and X rotations.
    pub commute_single_qubit: bool,

    /// Run the mixed-integer-programming placer before heuristic routing.
    pub enable_mip_placer: bool,

    /// Wall-clock limit for the placement solver, in seconds. 0 means no
    /// limit.
    pub mip_timeout: u64,

    /// Keep only the `mip_horizon` most frequent two-qubit pairs in the
    /// placement model. 0 means no truncation.
    pub mip_horizon: usize,

    /// Treat a placement-solver timeout as a fatal error instead of
    /// falling through to heuristic routing.
    pub fail_on_timeout: bool,

    /// Fixed seed for the tie-break RNG. `None` seeds from the clock, so
    /// runs differ unless a seed is pinned.
    pub rng_seed: Option<u64>,
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self {
            assume_initialized: false,
            assume_prep_only_initializes: false,
            initialize_one_to_one: true,
            heuristic: Heuristic::default(),
            max_alters: 0,
            tie_break_method: TieBreakMethod::default(),
            lookahead_mode: LookaheadMode::default(),
            path_selection_mode: PathSelectionMode::default(),
            swap_selection_mode: SwapSelectionMode::default(),
            recurse_nn_two_qubit: false,
            recursion_depth_limit: 0,
            recursion_width_factor: 1.0,
            recursion_width_exponent: 1.0,
            use_move_gates: true,
            max_move_penalty: 0,
            reverse_swap_if_better: true,
            commute_multi_qubit: false,
            commute_single_qubit: false,
            enable_mip_placer: false,
            mip_timeout: 0,
            mip_horizon: 0,
            fail_on_timeout: false,
            rng_seed: None,
        }
    }
}

impl RouterOptions {
    /// Check the option record for combinations the router cannot honor.
    pub fn validate(&self) -> RouteResult<()> {
        if self.heuristic == Heuristic::MaxFidelity {
            return Err(RouteError::UnsupportedHeuristic("maxfidelity".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let opt = RouterOptions::default();
        assert_eq!(opt.heuristic, Heuristic::Base);
        assert_eq!(opt.recursion_depth_limit, 0);
        assert!(opt.use_move_gates);
        assert!(opt.validate().is_ok());
    }

    #[test]
    fn test_max_fidelity_rejected() {
        let opt = RouterOptions {
            heuristic: Heuristic::MaxFidelity,
            ..RouterOptions::default()
        };
        assert!(matches!(
            opt.validate(),
            Err(RouteError::UnsupportedHeuristic(_))
        ));
    }

    #[test]
    fn test_rc_predicates() {
        assert!(Heuristic::BaseRc.is_resource_constrained());
        assert!(Heuristic::MinExtendRc.is_resource_constrained());
        assert!(!Heuristic::MinExtend.is_resource_constrained());
        assert!(Heuristic::MinExtendRc.is_min_extend());
        assert!(!Heuristic::Base.is_min_extend());
    }
}
