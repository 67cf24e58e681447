//! Reference interpreter.
//!
//! Runs the same instruction subset as the JIT with 64-bit wrapping
//! arithmetic, which is exactly what the emitted `add`/`sub`/`imul`/`neg`
//! instructions compute. It is the fallback execution path for programs the
//! JIT cannot compile and the oracle the JIT is tested against.

use super::{Opcode, Program, Verifier, VerifyError};
use crate::error::{JitError, Result};

/// Stack interpreter for [`Program`]s.
#[derive(Debug, Clone, Copy)]
pub struct Interpreter {
    verifier: Verifier,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new(Verifier::default())
    }
}

impl Interpreter {
    pub fn new(verifier: Verifier) -> Self {
        Self { verifier }
    }

    /// Verify and run `program` with the given arguments.
    pub fn run(&self, program: &Program, args: &[i64]) -> Result<i64> {
        if args.len() != program.arity {
            return Err(JitError::ArgumentCount {
                expected: program.arity,
                actual: args.len(),
            });
        }

        let max_depth = self.verifier.verify(program)?;
        let mut stack: Vec<i64> = Vec::with_capacity(max_depth);
        let mut locals = args.to_vec();

        for inst in program.decoder() {
            let inst = inst?;
            match inst.opcode {
                Opcode::LoadFast => stack.push(locals[inst.index()]),
                Opcode::StoreFast => {
                    let value = pop(&mut stack);
                    if locals.len() <= inst.index() {
                        locals.resize(inst.index() + 1, 0);
                    }
                    locals[inst.index()] = value;
                }
                Opcode::LoadConst => stack.push(program.immediate(inst.index(), inst.offset)?),
                Opcode::BinaryMultiply => binary(&mut stack, i64::wrapping_mul),
                Opcode::BinaryAdd | Opcode::InplaceAdd => binary(&mut stack, i64::wrapping_add),
                Opcode::BinarySubtract | Opcode::InplaceSubtract => {
                    binary(&mut stack, i64::wrapping_sub)
                }
                Opcode::UnaryNegative => {
                    let value = pop(&mut stack);
                    stack.push(value.wrapping_neg());
                }
                Opcode::ReturnValue => return Ok(pop(&mut stack)),
                Opcode::Other(_) => {
                    return Err(JitError::UnsupportedOperation {
                        name: inst.opcode.name(),
                        offset: inst.offset,
                    });
                }
            }
        }

        // Unreachable for verified programs, which end in RETURN_VALUE.
        Err(VerifyError::MissingReturn.into())
    }
}

// Stack depth is checked by the verifier before execution starts.
fn pop(stack: &mut Vec<i64>) -> i64 {
    stack.pop().unwrap_or_default()
}

/// Pops `b` then `a` and pushes `op(a, b)`.
fn binary(stack: &mut Vec<i64>, op: fn(i64, i64) -> i64) {
    let b = pop(stack);
    let a = pop(stack);
    stack.push(op(a, b));
}
