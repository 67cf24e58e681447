//! Intermediate representation between bytecode and machine code.
//!
//! Each [`Inst`] maps to exactly one x86-64 instruction. The operand stack of
//! the source program is the native call stack, manipulated with `push`/`pop`.

use serde::{Serialize, Serializer};

use super::x86_64::Reg;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inst {
    Push(Reg),
    Pop(Reg),
    Mov { dst: Reg, src: Reg },
    Add { dst: Reg, src: Reg },
    Sub { dst: Reg, src: Reg },
    Imul { dst: Reg, src: Reg },
    Neg(Reg),
    Immediate { dst: Reg, value: i64 },
    Ret,
}

impl Inst {
    pub fn is_stack_op(&self) -> bool {
        matches!(self, Inst::Push(_) | Inst::Pop(_))
    }

    /// Register written by the instruction.
    pub fn dst(&self) -> Option<Reg> {
        match *self {
            Inst::Pop(reg) | Inst::Neg(reg) => Some(reg),
            Inst::Mov { dst, .. }
            | Inst::Add { dst, .. }
            | Inst::Sub { dst, .. }
            | Inst::Imul { dst, .. }
            | Inst::Immediate { dst, .. } => Some(dst),
            Inst::Push(_) | Inst::Ret => None,
        }
    }

    /// Whether the instruction reads `reg`.
    ///
    /// `ret` reads rax, the return value register.
    pub fn reads(&self, reg: Reg) -> bool {
        match *self {
            Inst::Push(src) | Inst::Mov { src, .. } => src == reg,
            Inst::Neg(dst) => dst == reg,
            Inst::Add { dst, src } | Inst::Sub { dst, src } | Inst::Imul { dst, src } => {
                dst == reg || src == reg
            }
            Inst::Ret => reg == Reg::Rax,
            Inst::Pop(_) | Inst::Immediate { .. } => false,
        }
    }

    pub fn mnemonic(&self) -> &'static str {
        match self {
            Inst::Push(_) => "push",
            Inst::Pop(_) => "pop",
            Inst::Mov { .. } => "mov",
            Inst::Add { .. } => "add",
            Inst::Sub { .. } => "sub",
            Inst::Imul { .. } => "imul",
            Inst::Neg(_) => "neg",
            Inst::Immediate { .. } => "mov",
            Inst::Ret => "ret",
        }
    }
}

impl std::fmt::Display for Inst {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let op = self.mnemonic();
        match self {
            Inst::Push(reg) | Inst::Pop(reg) | Inst::Neg(reg) => write!(f, "{:<6} {}", op, reg),
            Inst::Mov { dst, src }
            | Inst::Add { dst, src }
            | Inst::Sub { dst, src }
            | Inst::Imul { dst, src } => write!(f, "{:<6} {}, {}", op, dst, src),
            Inst::Immediate { dst, value } => write!(f, "{:<6} {}, {}", op, dst, value),
            Inst::Ret => f.write_str(op),
        }
    }
}

// Reports carry instructions in their listing form.
impl Serialize for Inst {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(Inst::Push(Reg::Rdi).to_string(), "push   rdi");
        assert_eq!(
            Inst::Imul { dst: Reg::Rax, src: Reg::Rbx }.to_string(),
            "imul   rax, rbx"
        );
        assert_eq!(
            Inst::Immediate { dst: Reg::Rax, value: -2 }.to_string(),
            "mov    rax, -2"
        );
        assert_eq!(Inst::Ret.to_string(), "ret");
    }

    #[test]
    fn test_reads_and_writes() {
        let sub = Inst::Sub { dst: Reg::Rax, src: Reg::Rbx };
        assert_eq!(sub.dst(), Some(Reg::Rax));
        assert!(sub.reads(Reg::Rax));
        assert!(sub.reads(Reg::Rbx));
        assert!(!sub.reads(Reg::Rsi));

        let mov = Inst::Mov { dst: Reg::Rsi, src: Reg::Rax };
        assert!(!mov.reads(Reg::Rsi));
        assert!(Inst::Ret.reads(Reg::Rax));
        assert_eq!(Inst::Push(Reg::Rdi).dst(), None);
    }
}
