//! Alsvid qubit mapping and routing core.
//!
//! Given a program whose two-qubit gates reference *virtual* qubits with
//! no connectivity constraints, this crate produces an equivalent program
//! whose gates use *real* qubit indices such that every two-qubit gate
//! executes on physically adjacent qubits of the target device, inserting
//! `swap` (and optionally cheaper `move`) operations where needed.
//!
//! # Architecture
//!
//! ```text
//! Program ──► per block:
//!   MIP placer (optional)  : initial virtual-to-real permutation
//!        │
//!        ▼
//!   Router loop            : Future (ready gates, dependency graph)
//!        │                   Alter  (candidate paths + splits)
//!        │                   Past   (mapping, free cycles, schedule)
//!        ▼
//!   Primitive lowering     : `_prim` re-resolution + rescheduling
//! ```
//!
//! # Example
//!
//! ```
//! use alsvid_ir::{Block, Instruction, InstructionType, Platform, Program};
//! use alsvid_route::{route, RouterOptions, Topology};
//! use std::sync::Arc;
//!
//! let mut platform = Platform::new("chain3", 3, 0, 20);
//! platform.define(InstructionType::gate("h", 1, 20));
//! platform.define(InstructionType::gate("cnot", 2, 40));
//! platform.define(InstructionType::gate("swap", 2, 60));
//! platform.define(InstructionType::gate("move", 2, 40));
//! platform.define(InstructionType::prep("prepz", 20));
//! let topology = Topology::linear(3);
//!
//! let mut block = Block::new("main");
//! block.push(Instruction::new(Arc::clone(platform.find("h").unwrap()), [0]));
//! block.push(Instruction::new(Arc::clone(platform.find("cnot").unwrap()), [0, 2]));
//! let mut program = Program::new("bell_far");
//! program.push(block);
//!
//! let options = RouterOptions { rng_seed: Some(1), ..RouterOptions::default() };
//! let routed = route(&program, &platform, &topology, &options).unwrap();
//! for gate in &routed.blocks[0] {
//!     if gate.is_two_qubit() {
//!         assert_eq!(topology.distance(gate.qubits[0], gate.qubits[1]), 1);
//!     }
//! }
//! ```

pub mod alter;
pub mod context;
pub mod ddg;
pub mod error;
pub mod free_cycle;
pub mod future;
pub mod mapping;
pub mod options;
pub mod past;
pub mod placer;
pub mod primitives;
pub mod router;
pub mod topology;

pub use alter::Alter;
pub use context::RouteContext;
pub use ddg::DepGraph;
pub use error::{RouteError, RouteResult};
pub use free_cycle::{FreeCycle, ResourceState};
pub use future::{Future, GateId};
pub use mapping::{QubitMapping, QubitState};
pub use options::{
    Heuristic, LookaheadMode, PathSelectionMode, RouterOptions, SwapSelectionMode, TieBreakMethod,
};
pub use past::Past;
pub use placer::{place, PlaceOutcome};
pub use primitives::lower;
pub use router::{route, Router, RoutingStats};
pub use topology::{Topology, INFINITE};
