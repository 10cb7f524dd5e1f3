//! Alsvid instruction representation.
//!
//! This crate holds the minimal quantum IR the routing core consumes:
//!
//! - [`InstructionType`] / [`Instruction`]: immutable descriptors plus
//!   lightweight instances with plain-index operands,
//! - [`Block`] / [`Program`]: straight-line instruction containers,
//! - [`Platform`]: the target description: gate table with specialized
//!   (`_real` / `_prim`) variants, decomposition templates, cycle time,
//!   and shared scheduling resources.
//!
//! It is deliberately small: parsing, output writing, and compilation
//! orchestration live elsewhere.

pub mod block;
pub mod error;
pub mod instruction;
pub mod platform;

pub use block::{Block, Program};
pub use error::{IrError, IrResult};
pub use instruction::{
    InstrKind, Instruction, InstructionType, RoutingKind, RoutingTag, TemplateInstruction,
};
pub use platform::{Platform, ResourceSpec};
