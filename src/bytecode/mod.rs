//! Source bytecode: the stack-machine programs the JIT consumes.
//!
//! - `opcode`: the supported operation catalogue
//! - `decoder`: variable-width instruction decoding
//! - `verifier`: stack discipline checks run before compilation
//! - `interp`: reference interpreter (also the fallback execution path)
//! - `builder`: programmatic and textual construction of programs
//! - `file`: TOML program files

mod builder;
mod decoder;
mod file;
mod interp;
mod opcode;
mod verifier;

pub use builder::{ProgramBuilder, assemble};
pub use decoder::{Decoder, decode_all};
pub use file::ProgramFile;
pub use interp::Interpreter;
pub use opcode::{HAVE_ARGUMENT, Opcode};
pub use verifier::{VerifyError, Verifier};

use serde::{Deserialize, Serialize};

use crate::error::{JitError, Result};

/// Operand layout of a code stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    /// Two bytes per instruction: opcode plus a one-byte operand (or a
    /// padding byte for operand-less opcodes).
    #[default]
    Wordcode,
    /// One byte for operand-less opcodes, three bytes (opcode plus a
    /// little-endian `u16`) for the rest.
    Legacy,
}

impl Encoding {
    /// Total size in bytes of an instruction with this opcode.
    pub fn instruction_len(self, opcode: Opcode) -> usize {
        match (self, opcode.has_argument()) {
            (Encoding::Wordcode, _) => 2,
            (Encoding::Legacy, false) => 1,
            (Encoding::Legacy, true) => 3,
        }
    }

    /// Largest operand index the encoding can express.
    pub fn max_operand(self) -> u16 {
        match self {
            Encoding::Wordcode => u8::MAX as u16,
            Encoding::Legacy => u16::MAX,
        }
    }
}

/// A decoded source instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    /// Byte offset of the opcode in the stream
    pub offset: usize,
    pub opcode: Opcode,
    /// Operand index; `None` for operand-less opcodes
    pub arg: Option<u16>,
}

impl Instruction {
    /// Operand index as `usize` (0 for operand-less instructions).
    pub fn index(&self) -> usize {
        self.arg.unwrap_or(0) as usize
    }
}

impl std::fmt::Display for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.arg {
            Some(arg) => write!(f, "{:>4} {:<18} {}", self.offset, self.opcode, arg),
            None => write!(f, "{:>4} {}", self.offset, self.opcode),
        }
    }
}

/// A function to compile: code stream, constant pool and signature.
///
/// The pipeline only ever borrows a `Program`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    pub name: String,
    pub code: Vec<u8>,
    /// Integer constants referenced by `LOAD_CONST`
    pub constants: Vec<i128>,
    /// Number of integer arguments (locals `0..arity` are the parameters)
    pub arity: usize,
    pub encoding: Encoding,
}

impl Program {
    pub fn new(
        name: impl Into<String>,
        code: Vec<u8>,
        constants: Vec<i128>,
        arity: usize,
        encoding: Encoding,
    ) -> Self {
        Self {
            name: name.into(),
            code,
            constants,
            arity,
            encoding,
        }
    }

    /// The constant at `index` as a 64-bit immediate.
    ///
    /// Values in `i64::MIN..=u64::MAX` fit; unsigned values above
    /// `i64::MAX` keep their bit pattern.
    pub fn immediate(&self, index: usize, offset: usize) -> Result<i64> {
        let value = *self
            .constants
            .get(index)
            .ok_or(JitError::ConstantOutOfRange {
                index,
                offset,
                len: self.constants.len(),
            })?;
        if let Ok(value) = i64::try_from(value) {
            Ok(value)
        } else if let Ok(bits) = u64::try_from(value) {
            Ok(bits as i64)
        } else {
            Err(JitError::Overflow { value })
        }
    }

    /// Iterate over the decoded instructions.
    pub fn decoder(&self) -> Decoder<'_> {
        Decoder::new(&self.code, self.encoding)
    }
}
