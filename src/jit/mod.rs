//! JIT compilation to x86-64.
//!
//! The pipeline, one module per stage:
//! - `lower`: bytecode to IR, one fixed template per source instruction
//! - `peephole`: fixed-point rewriting of redundant data movement
//! - `x86_64` / `codebuf`: instruction encoding into a fixed-size buffer
//! - `memory`: page-aligned regions that are writable or executable, never both
//! - `invoke`: typed native entry points over a sealed region
//!
//! [`JitCompiler`] drives the stages; [`CompiledOrFallback`] pairs it with
//! the interpreter.

mod codebuf;
mod compiler;
pub mod dump;
mod fallback;
pub mod invoke;
pub mod ir;
pub mod lower;
pub mod memory;
pub mod peephole;
pub mod x86_64;

pub use codebuf::CodeBuffer;
pub use compiler::{CompileReport, CompiledFunction, JitCompiler};
pub use fallback::CompiledOrFallback;
pub use invoke::{FunctionSignature, MAX_ARITY, NativeFunction};
pub use ir::Inst;
pub use lower::lower;
pub use memory::{ExecutableRegion, HostMemory, Protection, WritableRegion};
pub use peephole::{Optimized, PassStats, optimize};
pub use x86_64::{EmittedInst, Reg, X86_64Assembler};
