//! Native-or-interpreted execution.

use super::compiler::CompiledFunction;
use crate::bytecode::{Interpreter, Program};
use crate::error::{JitError, Result};

/// A prepared program: compiled code, or the interpreter with the reason
/// native compilation was skipped.
#[derive(Debug)]
pub enum CompiledOrFallback {
    Native(CompiledFunction),
    Interpreted {
        program: Program,
        interpreter: Interpreter,
        /// `None` when the JIT was disabled
        reason: Option<JitError>,
    },
}

impl CompiledOrFallback {
    pub fn interpreted(program: Program, interpreter: Interpreter, reason: Option<JitError>) -> Self {
        CompiledOrFallback::Interpreted {
            program,
            interpreter,
            reason,
        }
    }

    pub fn is_native(&self) -> bool {
        matches!(self, CompiledOrFallback::Native(_))
    }

    pub fn native(&self) -> Option<&CompiledFunction> {
        match self {
            CompiledOrFallback::Native(function) => Some(function),
            CompiledOrFallback::Interpreted { .. } => None,
        }
    }

    /// Why the program is not running natively, if compilation was tried.
    pub fn fallback_reason(&self) -> Option<&JitError> {
        match self {
            CompiledOrFallback::Native(_) => None,
            CompiledOrFallback::Interpreted { reason, .. } => reason.as_ref(),
        }
    }

    pub fn call(&self, args: &[i64]) -> Result<i64> {
        match self {
            CompiledOrFallback::Native(function) => function.call(args),
            CompiledOrFallback::Interpreted {
                program,
                interpreter,
                ..
            } => interpreter.run(program, args),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::ProgramBuilder;

    #[test]
    fn test_interpreted_call() {
        let program = ProgramBuilder::new("neg", 1).load_fast(0).negate().ret().build();
        let prepared = CompiledOrFallback::interpreted(
            program,
            Interpreter::default(),
            Some(JitError::UnsupportedTarget),
        );

        assert!(!prepared.is_native());
        assert!(prepared.native().is_none());
        assert!(matches!(prepared.fallback_reason(), Some(JitError::UnsupportedTarget)));
        assert_eq!(prepared.call(&[9]).unwrap(), -9);
        assert!(prepared.call(&[]).is_err());
    }
}
