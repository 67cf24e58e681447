//! stackjit - a JIT compiler for a small stack bytecode
//!
//! Integer-only functions written in a subset of CPython bytecode are
//! lowered to a register IR, peephole-optimized, encoded as x86-64 machine
//! code and run from W^X memory. A reference interpreter runs the same
//! programs when native compilation is disabled or unavailable.
//!
//! ```no_run
//! use stackjit::{JitCompiler, JitConfig, ProgramBuilder};
//!
//! let program = ProgramBuilder::new("times101", 1)
//!     .load_fast(0)
//!     .load_const(101)
//!     .multiply()
//!     .ret()
//!     .build();
//! let compiler = JitCompiler::new(JitConfig::default())?;
//! let function = compiler.prepare(&program)?;
//! assert_eq!(function.call(&[2])?, 202);
//! # Ok::<(), stackjit::JitError>(())
//! ```

pub mod bytecode;
pub mod config;
pub mod error;
pub mod jit;
pub mod samples;

// Re-export commonly used types
pub use bytecode::{Encoding, Interpreter, Program, ProgramBuilder, ProgramFile};
pub use config::{JitConfig, JitMode};
pub use error::{JitError, Result};
pub use jit::{CompiledFunction, CompiledOrFallback, JitCompiler};
