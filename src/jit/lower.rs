//! Lowering from bytecode to IR.
//!
//! Each source instruction expands to a fixed template of [`Inst`]s. Local
//! slot `i` lives in argument register `i`; rax and rbx are the scratch
//! registers. rbx is callee-saved, so the lowered function opens with
//! `push rbx` and every `ret` follows a `pop rbx`. The optimizer may fold
//! that pair into a self-move when nothing in between writes rbx, so
//! optimized code preserves rbx without necessarily saving it.

use std::collections::VecDeque;

use super::ir::Inst;
use super::x86_64::{ARG_REGS, Reg};
use crate::bytecode::{Decoder, Instruction, Opcode, Program};
use crate::error::{JitError, Result};

/// Scratch register A; also holds the return value.
pub const SCRATCH_A: Reg = Reg::Rax;
/// Scratch register B (callee-saved, preserved by the prologue/epilogue).
pub const SCRATCH_B: Reg = Reg::Rbx;

/// Register holding local slot `index`.
pub fn local_register(index: usize, offset: usize) -> Result<Reg> {
    ARG_REGS
        .get(index)
        .copied()
        .ok_or(JitError::UnsupportedLocal { index, offset })
}

/// Lazy IR stream for one program.
///
/// Yields `Err` at most once and is exhausted afterwards. It cannot be
/// restarted; call [`lower`] again for a fresh stream.
pub struct Lowering<'a> {
    program: &'a Program,
    decoder: Decoder<'a>,
    pending: VecDeque<Inst>,
    done: bool,
}

/// Lower `program` to IR.
pub fn lower(program: &Program) -> Lowering<'_> {
    let mut pending = VecDeque::new();
    pending.push_back(Inst::Push(SCRATCH_B));
    Lowering {
        program,
        decoder: program.decoder(),
        pending,
        done: false,
    }
}

impl Lowering<'_> {
    fn expand(&mut self, inst: Instruction) -> Result<()> {
        use Inst::*;
        let (a, b) = (SCRATCH_A, SCRATCH_B);

        let out = &mut self.pending;

        match inst.opcode {
            Opcode::LoadFast => out.push_back(Push(local_register(inst.index(), inst.offset)?)),
            Opcode::StoreFast => {
                let dst = local_register(inst.index(), inst.offset)?;
                out.extend([Pop(a), Mov { dst, src: a }]);
            }
            Opcode::LoadConst => {
                let value = self.program.immediate(inst.index(), inst.offset)?;
                out.extend([Immediate { dst: a, value }, Push(a)]);
            }
            Opcode::BinaryMultiply => out.extend([Pop(a), Pop(b), Imul { dst: a, src: b }, Push(a)]),
            Opcode::BinaryAdd | Opcode::InplaceAdd => {
                out.extend([Pop(a), Pop(b), Add { dst: a, src: b }, Push(a)])
            }
            // Right operand is on top: pop it into rbx first.
            Opcode::BinarySubtract | Opcode::InplaceSubtract => {
                out.extend([Pop(b), Pop(a), Sub { dst: a, src: b }, Push(a)])
            }
            Opcode::UnaryNegative => out.extend([Pop(a), Neg(a), Push(a)]),
            Opcode::ReturnValue => out.extend([Pop(a), Pop(b), Ret]),
            Opcode::Other(_) => {
                return Err(JitError::UnsupportedOperation {
                    name: inst.opcode.name(),
                    offset: inst.offset,
                });
            }
        }

        Ok(())
    }
}

impl Iterator for Lowering<'_> {
    type Item = Result<Inst>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(inst) = self.pending.pop_front() {
                return Some(Ok(inst));
            }
            if self.done {
                return None;
            }

            let step = match self.decoder.next() {
                Some(Ok(inst)) => self.expand(inst),
                Some(Err(e)) => Err(e),
                None => {
                    self.done = true;
                    continue;
                }
            };
            if let Err(e) = step {
                self.done = true;
                self.pending.clear();
                return Some(Err(e));
            }
        }
    }
}
