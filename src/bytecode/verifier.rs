//! Bytecode verifier.
//!
//! Compiled code realizes the operand stack on the native call stack, so an
//! unbalanced program would corrupt the caller's frame instead of failing
//! cleanly. The verifier rejects such programs before anything is emitted:
//! - Stack effect validation: no underflow, depth bounded by `max_stack`
//! - Every `RETURN_VALUE` leaves the operand stack empty
//! - The program is non-empty and ends with `RETURN_VALUE`
//! - Opcodes and constant indices are valid
//! - Locals are assigned before they are read

use thiserror::Error;

use super::{Opcode, Program};
use crate::error::{JitError, Result};

/// Stack discipline violations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyError {
    #[error("stack underflow at offset {offset}: requires {required} values, but only {actual} on stack")]
    StackUnderflow {
        offset: usize,
        required: usize,
        actual: usize,
    },

    #[error("stack overflow at offset {offset}: height {height} exceeds max_stack {max}")]
    StackOverflow {
        offset: usize,
        height: usize,
        max: usize,
    },

    #[error("return at offset {offset} leaves {remaining} value(s) on the stack")]
    UnbalancedReturn { offset: usize, remaining: usize },

    #[error("local {index} read at offset {offset} before it is assigned")]
    UninitializedLocal { offset: usize, index: usize },

    #[error("empty program")]
    EmptyProgram,

    #[error("program does not end with RETURN_VALUE")]
    MissingReturn,
}

/// Number of values an opcode pops and pushes.
fn stack_effect(opcode: Opcode) -> (usize, usize) {
    match opcode {
        Opcode::LoadFast | Opcode::LoadConst => (0, 1),
        Opcode::StoreFast => (1, 0),
        Opcode::BinaryMultiply
        | Opcode::BinaryAdd
        | Opcode::BinarySubtract
        | Opcode::InplaceAdd
        | Opcode::InplaceSubtract => (2, 1),
        Opcode::UnaryNegative => (1, 1),
        Opcode::ReturnValue => (1, 0),
        Opcode::Other(_) => (0, 0),
    }
}

/// Bytecode verifier
#[derive(Debug, Clone, Copy)]
pub struct Verifier {
    /// Maximum operand stack depth
    pub max_stack: usize,
}

impl Default for Verifier {
    fn default() -> Self {
        Self { max_stack: 256 }
    }
}

impl Verifier {
    pub fn new(max_stack: usize) -> Self {
        Self { max_stack }
    }

    /// Verify a program, returning its maximum operand stack depth.
    pub fn verify(&self, program: &Program) -> Result<usize> {
        let mut depth = 0usize;
        let mut max_depth = 0usize;
        let mut last = None;
        // Parameters arrive assigned.
        let mut assigned = vec![true; program.arity];

        for inst in program.decoder() {
            let inst = inst?;

            if !inst.opcode.is_supported() {
                return Err(JitError::UnsupportedOperation {
                    name: inst.opcode.name(),
                    offset: inst.offset,
                });
            }

            if inst.opcode == Opcode::LoadConst && inst.index() >= program.constants.len() {
                return Err(JitError::ConstantOutOfRange {
                    index: inst.index(),
                    offset: inst.offset,
                    len: program.constants.len(),
                });
            }

            match inst.opcode {
                Opcode::LoadFast if !assigned.get(inst.index()).copied().unwrap_or(false) => {
                    return Err(VerifyError::UninitializedLocal {
                        offset: inst.offset,
                        index: inst.index(),
                    }
                    .into());
                }
                Opcode::StoreFast => {
                    if assigned.len() <= inst.index() {
                        assigned.resize(inst.index() + 1, false);
                    }
                    assigned[inst.index()] = true;
                }
                _ => {}
            }

            let (pops, pushes) = stack_effect(inst.opcode);
            if depth < pops {
                return Err(VerifyError::StackUnderflow {
                    offset: inst.offset,
                    required: pops,
                    actual: depth,
                }
                .into());
            }
            depth = depth - pops + pushes;

            if depth > self.max_stack {
                return Err(VerifyError::StackOverflow {
                    offset: inst.offset,
                    height: depth,
                    max: self.max_stack,
                }
                .into());
            }
            max_depth = max_depth.max(depth);

            if inst.opcode == Opcode::ReturnValue && depth != 0 {
                return Err(VerifyError::UnbalancedReturn {
                    offset: inst.offset,
                    remaining: depth,
                }
                .into());
            }

            last = Some(inst.opcode);
        }

        match last {
            None => Err(VerifyError::EmptyProgram.into()),
            Some(Opcode::ReturnValue) => Ok(max_depth),
            Some(_) => Err(VerifyError::MissingReturn.into()),
        }
    }
}
