//! Primitive lowering of the routed gate stream.
//!
//! After routing, each gate is re-resolved by appending `_prim` to its
//! name: when the platform defines such a variant the gate is replaced
//! (and possibly decomposed) by it, otherwise it is kept verbatim. The
//! result is rescheduled through a fresh [`Past`] so cycle numbers stay
//! consistent.

use alsvid_ir::Instruction;

use crate::context::RouteContext;
use crate::error::RouteResult;
use crate::past::Past;

/// Lower a routed instruction stream to platform primitives.
pub fn lower(
    ctx: RouteContext<'_>,
    instructions: Vec<Instruction>,
) -> RouteResult<Vec<Instruction>> {
    let mut past = Past::new(ctx);
    for inst in instructions {
        let seq = match ctx.platform.try_make(
            &format!("{}_prim", inst.name()),
            &inst.qubits,
            &inst.bits,
            inst.condition.as_deref(),
        )? {
            Some(mut seq) => {
                if let Some(tag) = inst.routing {
                    for g in &mut seq {
                        g.routing = Some(tag);
                    }
                }
                seq
            }
            None => vec![inst],
        };
        for g in seq {
            if g.is_classical() {
                past.bypass(g);
            } else {
                past.add_and_schedule(g);
            }
        }
    }
    past.flush_all();
    Ok(past.drain_output())
}
