//! Shared routing context.

use alsvid_ir::Platform;

use crate::options::RouterOptions;
use crate::topology::Topology;

/// Immutable context threaded through the routing engine: the platform
/// description, the qubit topology, and the option record. `Copy`, so
/// every speculative clone shares the same borrowed context.
#[derive(Debug, Clone, Copy)]
pub struct RouteContext<'p> {
    /// Platform description (gate table, durations, resources).
    pub platform: &'p Platform,
    /// Qubit-connectivity topology.
    pub topology: &'p Topology,
    /// Router options.
    pub options: &'p RouterOptions,
}

impl<'p> RouteContext<'p> {
    /// Bundle a context.
    pub fn new(platform: &'p Platform, topology: &'p Topology, options: &'p RouterOptions) -> Self {
        Self {
            platform,
            topology,
            options,
        }
    }

    /// Number of real qubits.
    #[inline]
    pub fn num_qubits(&self) -> u32 {
        self.platform.num_qubits
    }

    /// Number of classical bits tracked as scheduling resources.
    #[inline]
    pub fn num_bits(&self) -> u32 {
        self.platform.num_bits
    }

    /// Convert a duration in nanoseconds to cycles, rounding up.
    #[inline]
    pub fn cycles(&self, duration_ns: u64) -> u64 {
        duration_ns.div_ceil(self.platform.cycle_time_ns)
    }
}
