//! Peephole optimizer over the IR.
//!
//! Passes run until one makes no rewrite. A pass scans left to right and at
//! each position tries the rules below in order; a matching rule consumes its
//! window and scanning resumes right after it.
//!
//! 1. `mov r, r` is dropped.
//! 2. `mov x, y; mov z, x` becomes `mov z, y` when `x` is dead afterwards.
//! 3. `push r; pop s` becomes `mov s, r`.
//! 4. `push r; X; pop s` becomes `mov s, r; X`.
//! 5. `push r; X; Y; pop s` becomes `mov s, r; X; Y`.
//!
//! In rules 4 and 5 the intervening instructions must not touch the stack and
//! must neither read nor write `s`. Both guards are stricter than checking
//! only for a write to the destination: rule 2 without the liveness scan
//! breaks `b * b` on a stored local, and rules 4 and 5 without the read check
//! hand the intervening instruction the pushed value instead of the old `s`.
//! Every rule shortens the sequence, so the loop terminates.

use serde::Serialize;
use tracing::trace;

use super::ir::Inst;
use super::x86_64::Reg;

/// Statistics for one optimizer pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PassStats {
    pub rewrites: usize,
    pub removed: usize,
}

/// Result of [`optimize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Optimized {
    pub ir: Vec<Inst>,
    /// One entry per pass, the last one always with zero rewrites.
    pub passes: Vec<PassStats>,
}

/// Rewrite `ir` to a fixed point.
pub fn optimize(ir: Vec<Inst>) -> Optimized {
    let mut ir = ir;
    let mut passes = Vec::new();

    loop {
        let before = ir.len();
        let (next, rewrites) = pass(&ir);
        let stats = PassStats {
            rewrites,
            removed: before - next.len(),
        };
        trace!(pass = passes.len(), rewrites, removed = stats.removed, len = next.len(), "peephole pass");
        passes.push(stats);
        ir = next;
        if rewrites == 0 {
            break;
        }
    }

    Optimized { ir, passes }
}

fn pass(ir: &[Inst]) -> (Vec<Inst>, usize) {
    let mut out = Vec::with_capacity(ir.len());
    let mut rewrites = 0;
    let mut i = 0;

    while i < ir.len() {
        match rewrite(&ir[i..], &mut out) {
            Some(consumed) => {
                rewrites += 1;
                i += consumed;
            }
            None => {
                out.push(ir[i]);
                i += 1;
            }
        }
    }

    (out, rewrites)
}

/// Try every rule at the head of `ir`. On a match, push the replacement to
/// `out` and return how many instructions were consumed.
fn rewrite(ir: &[Inst], out: &mut Vec<Inst>) -> Option<usize> {
    use Inst::*;

    match *ir {
        [Mov { dst, src }, ..] if dst == src => Some(1),

        [Mov { dst: x, src: y }, Mov { dst: z, src }, ref rest @ ..]
            if src == x && (z == x || is_dead(x, rest)) =>
        {
            out.push(Mov { dst: z, src: y });
            Some(2)
        }

        [Push(r), Pop(s), ..] => {
            out.push(Mov { dst: s, src: r });
            Some(2)
        }

        [Push(r), x, Pop(s), ..] if can_cross(&x, s) => {
            out.extend([Mov { dst: s, src: r }, x]);
            Some(3)
        }

        [Push(r), x, y, Pop(s), ..] if can_cross(&x, s) && can_cross(&y, s) => {
            out.extend([Mov { dst: s, src: r }, x, y]);
            Some(4)
        }

        _ => None,
    }
}

/// Whether a `mov s, r` can be hoisted above `inst`.
fn can_cross(inst: &Inst, s: Reg) -> bool {
    !inst.is_stack_op() && *inst != Inst::Ret && inst.dst() != Some(s) && !inst.reads(s)
}

/// Whether the value in `reg` is never read by `rest` before being
/// overwritten.
fn is_dead(reg: Reg, rest: &[Inst]) -> bool {
    for inst in rest {
        if inst.reads(reg) {
            return false;
        }
        if inst.dst() == Some(reg) {
            return true;
        }
    }
    true
}
