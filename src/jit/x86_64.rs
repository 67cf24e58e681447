//! x86-64 instruction encoding for JIT compilation.
//!
//! Encodes [`Inst`]s as machine code bytes. Only the eight legacy
//! general-purpose registers are used, so no REX.R/REX.B extension bits are
//! ever needed: every 64-bit operation carries a plain REX.W (0x48) prefix.
//! Uses System V AMD64 ABI conventions.

use super::codebuf::CodeBuffer;
use super::ir::Inst;
use crate::error::Result;

/// x86-64 general-purpose registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Reg {
    Rax = 0, // Return value, scratch A
    Rcx = 1, // 4th argument
    Rdx = 2, // 3rd argument
    Rbx = 3, // Callee-saved, scratch B
    Rsp = 4, // Stack pointer
    Rbp = 5, // Frame pointer (callee-saved)
    Rsi = 6, // 2nd argument
    Rdi = 7, // 1st argument
}

/// Integer argument registers in calling-convention order. Local slot `i`
/// lives in `ARG_REGS[i]` for the lifetime of the compiled function.
pub const ARG_REGS: [Reg; 4] = [Reg::Rdi, Reg::Rsi, Reg::Rdx, Reg::Rcx];

impl Reg {
    /// Get the 3-bit register code.
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            Reg::Rax => "rax",
            Reg::Rcx => "rcx",
            Reg::Rdx => "rdx",
            Reg::Rbx => "rbx",
            Reg::Rsp => "rsp",
            Reg::Rbp => "rbp",
            Reg::Rsi => "rsi",
            Reg::Rdi => "rdi",
        }
    }
}

impl std::fmt::Display for Reg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// REX prefix with W=1 (64-bit operand size).
const REX_W: u8 = 0x48;

/// Byte range occupied by one emitted IR instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmittedInst {
    pub offset: usize,
    pub len: usize,
    pub inst: Inst,
}

/// x86-64 assembler.
pub struct X86_64Assembler<'a> {
    buf: &'a mut CodeBuffer,
    spans: Vec<EmittedInst>,
}

impl<'a> X86_64Assembler<'a> {
    pub fn new(buf: &'a mut CodeBuffer) -> Self {
        Self {
            buf,
            spans: Vec::new(),
        }
    }

    // ==================== ModR/M helpers ====================

    /// Encode ModR/M byte.
    /// mod: 2 bits, reg: 3 bits, rm: 3 bits
    fn modrm(mode: u8, reg: u8, rm: u8) -> u8 {
        ((mode & 0x3) << 6) | ((reg & 0x7) << 3) | (rm & 0x7)
    }

    /// Register-direct ModR/M (mod = 11).
    fn modrm_rr(reg: u8, rm: u8) -> u8 {
        Self::modrm(0b11, reg, rm)
    }

    // ==================== Instructions ====================

    /// PUSH r64
    pub fn push(&mut self, reg: Reg) -> Result<()> {
        self.buf.emit_bytes(&[0x50 | reg.code()])
    }

    /// POP r64
    pub fn pop(&mut self, reg: Reg) -> Result<()> {
        self.buf.emit_bytes(&[0x58 | reg.code()])
    }

    /// MOV r64, r64 (register to register)
    pub fn mov_rr(&mut self, dst: Reg, src: Reg) -> Result<()> {
        // MOV r/m64, r64
        self.buf
            .emit_bytes(&[REX_W, 0x89, Self::modrm_rr(src.code(), dst.code())])
    }

    /// MOV r64, imm64 (move 64-bit immediate to register)
    pub fn mov_ri64(&mut self, dst: Reg, imm: i64) -> Result<()> {
        let mut bytes = [0u8; 10];
        bytes[0] = REX_W;
        bytes[1] = 0xB8 | dst.code();
        bytes[2..].copy_from_slice(&imm.to_le_bytes());
        self.buf.emit_bytes(&bytes)
    }

    /// ADD r64, r64
    pub fn add_rr(&mut self, dst: Reg, src: Reg) -> Result<()> {
        // ADD r/m64, r64
        self.buf
            .emit_bytes(&[REX_W, 0x01, Self::modrm_rr(src.code(), dst.code())])
    }

    /// SUB r64, r64
    pub fn sub_rr(&mut self, dst: Reg, src: Reg) -> Result<()> {
        // SUB r/m64, r64
        self.buf
            .emit_bytes(&[REX_W, 0x29, Self::modrm_rr(src.code(), dst.code())])
    }

    /// IMUL r64, r64 (signed multiply, result in first operand)
    pub fn imul_rr(&mut self, dst: Reg, src: Reg) -> Result<()> {
        // IMUL r64, r/m64
        self.buf
            .emit_bytes(&[REX_W, 0x0F, 0xAF, Self::modrm_rr(dst.code(), src.code())])
    }

    /// NEG r64 (two's complement negation)
    pub fn neg(&mut self, dst: Reg) -> Result<()> {
        // F7 /3
        self.buf
            .emit_bytes(&[REX_W, 0xF7, Self::modrm_rr(3, dst.code())])
    }

    /// RET
    pub fn ret(&mut self) -> Result<()> {
        self.buf.emit_bytes(&[0xC3])
    }

    /// Encode one IR instruction and record the bytes it occupies.
    pub fn emit(&mut self, inst: &Inst) -> Result<()> {
        let offset = self.buf.len();
        match *inst {
            Inst::Push(reg) => self.push(reg)?,
            Inst::Pop(reg) => self.pop(reg)?,
            Inst::Mov { dst, src } => self.mov_rr(dst, src)?,
            Inst::Add { dst, src } => self.add_rr(dst, src)?,
            Inst::Sub { dst, src } => self.sub_rr(dst, src)?,
            Inst::Imul { dst, src } => self.imul_rr(dst, src)?,
            Inst::Neg(reg) => self.neg(reg)?,
            Inst::Immediate { dst, value } => self.mov_ri64(dst, value)?,
            Inst::Ret => self.ret()?,
        }
        self.spans.push(EmittedInst {
            offset,
            len: self.buf.len() - offset,
            inst: *inst,
        });
        Ok(())
    }

    /// Encode a whole instruction sequence.
    pub fn emit_all<'i>(&mut self, insts: impl IntoIterator<Item = &'i Inst>) -> Result<()> {
        for inst in insts {
            self.emit(inst)?;
        }
        Ok(())
    }

    /// Consume the assembler, returning the per-instruction byte spans.
    pub fn finish(self) -> Vec<EmittedInst> {
        self.spans
    }
}
