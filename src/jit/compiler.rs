//! JIT compiler driver.
//!
//! Runs a [`Program`] through every stage: verify, lower, optimize, emit,
//! then copy the code into a fresh region and seal it. The region is only
//! mapped once the machine code is complete, so a compilation that fails at
//! any earlier stage never touches executable memory.

use serde::Serialize;
use tracing::{debug, info, warn};

use super::codebuf::CodeBuffer;
use super::fallback::CompiledOrFallback;
use super::invoke::{FunctionSignature, NativeFunction};
use super::ir::Inst;
use super::lower::lower;
use super::memory::{ExecutableRegion, HostMemory};
use super::peephole::{PassStats, optimize};
use super::x86_64::{EmittedInst, X86_64Assembler};
use crate::bytecode::{Interpreter, Program, Verifier};
use crate::config::{JitConfig, JitMode};
use crate::error::{JitError, Result};

/// What the pipeline produced for one program, for `--report` and tests.
#[derive(Debug, Clone, Serialize)]
pub struct CompileReport {
    pub name: String,
    pub arity: usize,
    /// Deepest operand stack the verifier saw
    pub max_stack: usize,
    /// IR straight out of lowering
    pub ir: Vec<Inst>,
    /// IR handed to the emitter (equal to `ir` when optimization is off)
    pub optimized: Vec<Inst>,
    pub passes: Vec<PassStats>,
    pub code_len: usize,
    /// Size of the mapped region
    pub region_size: usize,
}

/// Native code for one program, owning its executable region.
pub struct CompiledFunction {
    region: ExecutableRegion,
    signature: FunctionSignature,
    code: Vec<u8>,
    spans: Vec<EmittedInst>,
    report: CompileReport,
}

impl CompiledFunction {
    /// The emitted machine code (a copy of the start of the region).
    pub fn code(&self) -> &[u8] {
        &self.code
    }

    /// Address of the first instruction.
    pub fn address(&self) -> usize {
        self.region.address()
    }

    pub fn signature(&self) -> FunctionSignature {
        self.signature
    }

    /// Byte range of each emitted instruction.
    pub fn spans(&self) -> &[EmittedInst] {
        &self.spans
    }

    pub fn report(&self) -> &CompileReport {
        &self.report
    }

    pub fn region(&self) -> &ExecutableRegion {
        &self.region
    }

    /// A typed entry point borrowing this function's region.
    pub fn native(&self) -> Result<NativeFunction<'_>> {
        // SAFETY: the region holds code emitted by `JitCompiler` for a
        // verified program of exactly this signature; every path ends in a
        // `ret` after restoring rbx.
        unsafe { NativeFunction::bind(&self.region, self.signature) }
    }

    pub fn call(&self, args: &[i64]) -> Result<i64> {
        self.native()?.call(args)
    }

    /// Unmap the region, reporting munmap failure.
    pub fn release(self) -> Result<()> {
        self.region.release()
    }
}

impl std::fmt::Debug for CompiledFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledFunction")
            .field("name", &self.report.name)
            .field("address", &format_args!("{:#x}", self.address()))
            .field("code_len", &self.code.len())
            .finish()
    }
}

/// Compiles programs according to a [`JitConfig`].
pub struct JitCompiler {
    config: JitConfig,
    host: HostMemory,
    verifier: Verifier,
}

impl JitCompiler {
    /// Create a compiler for the current host.
    pub fn new(config: JitConfig) -> Result<Self> {
        Ok(Self::with_host(config, HostMemory::query()?))
    }

    pub fn with_host(config: JitConfig, host: HostMemory) -> Self {
        let verifier = Verifier::new(config.max_stack);
        Self {
            config,
            host,
            verifier,
        }
    }

    pub fn config(&self) -> &JitConfig {
        &self.config
    }

    /// An interpreter using the same verifier limits as the compiler.
    pub fn interpreter(&self) -> Interpreter {
        Interpreter::new(self.verifier)
    }

    /// Compile `program` to native code.
    pub fn compile(&self, program: &Program) -> Result<CompiledFunction> {
        if !cfg!(all(unix, target_arch = "x86_64")) {
            return Err(JitError::UnsupportedTarget);
        }

        let signature = FunctionSignature::new(program.arity);
        signature.validate()?;

        let max_stack = self.verifier.verify(program)?;

        let ir = lower(program).collect::<Result<Vec<_>>>()?;
        debug!(program = %program.name, insts = ir.len(), "lowered");

        let (optimized, passes) = if self.config.optimize {
            let result = optimize(ir.clone());
            debug!(
                program = %program.name,
                passes = result.passes.len(),
                insts = result.ir.len(),
                "optimized"
            );
            (result.ir, result.passes)
        } else {
            (ir.clone(), Vec::new())
        };

        let capacity = self.host.round_up(self.config.code_size);
        let mut buf = CodeBuffer::with_capacity(capacity);
        let mut asm = X86_64Assembler::new(&mut buf);
        asm.emit_all(&optimized)?;
        let spans = asm.finish();
        let code = buf.into_code();
        debug!(program = %program.name, bytes = code.len(), capacity, "emitted");

        let mut region = self.host.allocate(capacity)?;
        region.write(0, &code)?;
        let region = region.seal()?;

        let report = CompileReport {
            name: program.name.clone(),
            arity: program.arity,
            max_stack,
            ir,
            optimized,
            passes,
            code_len: code.len(),
            region_size: region.size(),
        };
        info!(program = %program.name, address = region.address(), bytes = code.len(), "compiled");

        Ok(CompiledFunction {
            region,
            signature,
            code,
            spans,
            report,
        })
    }

    /// Pick the execution strategy for `program` according to the JIT mode.
    ///
    /// In `auto` mode a compilation error the interpreter does not share is
    /// logged and the program runs interpreted; any other error is returned.
    pub fn prepare(&self, program: &Program) -> Result<CompiledOrFallback> {
        match self.config.jit_mode {
            JitMode::Off => {
                self.verifier.verify(program)?;
                Ok(CompiledOrFallback::interpreted(program.clone(), self.interpreter(), None))
            }
            JitMode::On => self.compile(program).map(CompiledOrFallback::Native),
            JitMode::Auto => match self.compile(program) {
                Ok(function) => Ok(CompiledOrFallback::Native(function)),
                Err(e) if e.is_fallback_safe() => {
                    warn!(program = %program.name, error = %e, "JIT compilation failed, falling back to interpreter");
                    Ok(CompiledOrFallback::interpreted(
                        program.clone(),
                        self.interpreter(),
                        Some(e),
                    ))
                }
                Err(e) => Err(e),
            },
        }
    }
}
