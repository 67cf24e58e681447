//! Program construction.
//!
//! [`ProgramBuilder`] emits instructions one at a time; [`assemble`] reads the
//! textual form used by program files:
//!
//! ```text
//! LOAD_FAST 0      # comments run to the end of the line
//! LOAD_CONST 0
//! BINARY_MULTIPLY
//! RETURN_VALUE
//! ```
//!
//! A bare number in the mnemonic position emits that raw opcode byte.

use super::{Encoding, Opcode, Program};
use crate::error::{JitError, Result};

/// Incremental builder for a [`Program`].
pub struct ProgramBuilder {
    name: String,
    arity: usize,
    encoding: Encoding,
    code: Vec<u8>,
    constants: Vec<i128>,
}

impl ProgramBuilder {
    pub fn new(name: impl Into<String>, arity: usize) -> Self {
        Self {
            name: name.into(),
            arity,
            encoding: Encoding::Wordcode,
            code: Vec::new(),
            constants: Vec::new(),
        }
    }

    /// Select the operand encoding. Must be called before any instruction
    /// is emitted.
    pub fn encoding(mut self, encoding: Encoding) -> Self {
        debug_assert!(self.code.is_empty(), "encoding changed after emission");
        self.encoding = encoding;
        self
    }

    /// Emit a raw instruction.
    pub fn op(mut self, opcode: Opcode, arg: u16) -> Self {
        encode(&mut self.code, self.encoding, opcode, arg);
        self
    }

    pub fn load_fast(self, index: u16) -> Self {
        self.op(Opcode::LoadFast, index)
    }

    pub fn store_fast(self, index: u16) -> Self {
        self.op(Opcode::StoreFast, index)
    }

    /// Emit `LOAD_CONST` for `value`, reusing an existing pool entry.
    pub fn load_const(mut self, value: impl Into<i128>) -> Self {
        let value = value.into();
        let index = match self.constants.iter().position(|&c| c == value) {
            Some(index) => index,
            None => {
                self.constants.push(value);
                self.constants.len() - 1
            }
        };
        self.op(Opcode::LoadConst, index as u16)
    }

    pub fn multiply(self) -> Self {
        self.op(Opcode::BinaryMultiply, 0)
    }

    pub fn add(self) -> Self {
        self.op(Opcode::BinaryAdd, 0)
    }

    pub fn subtract(self) -> Self {
        self.op(Opcode::BinarySubtract, 0)
    }

    pub fn negate(self) -> Self {
        self.op(Opcode::UnaryNegative, 0)
    }

    pub fn ret(self) -> Self {
        self.op(Opcode::ReturnValue, 0)
    }

    pub fn build(self) -> Program {
        Program::new(self.name, self.code, self.constants, self.arity, self.encoding)
    }
}

fn encode(code: &mut Vec<u8>, encoding: Encoding, opcode: Opcode, arg: u16) {
    code.push(opcode.to_byte());
    match (encoding, opcode.has_argument()) {
        (Encoding::Wordcode, _) => code.push(arg as u8),
        (Encoding::Legacy, true) => code.extend_from_slice(&arg.to_le_bytes()),
        (Encoding::Legacy, false) => {}
    }
}

/// Assemble the textual form into a code stream.
pub fn assemble(source: &str, encoding: Encoding) -> Result<Vec<u8>> {
    let mut code = Vec::new();

    for (number, line) in source.lines().enumerate() {
        let line = line.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        let error = |message: String| JitError::Assembly {
            line: number + 1,
            message,
        };

        let mut parts = line.split_whitespace();
        let mnemonic = parts.next().unwrap_or_default();
        let opcode = match mnemonic.parse::<u8>() {
            Ok(byte) => Opcode::from_byte(byte),
            Err(_) => Opcode::from_name(mnemonic)
                .ok_or_else(|| error(format!("unknown mnemonic `{}`", mnemonic)))?,
        };

        let arg = match (parts.next(), opcode.has_argument()) {
            (Some(text), true) => {
                let arg: u16 = text
                    .parse()
                    .map_err(|_| error(format!("invalid operand `{}`", text)))?;
                if arg > encoding.max_operand() {
                    return Err(error(format!(
                        "operand {} does not fit the {:?} encoding",
                        arg, encoding
                    )));
                }
                arg
            }
            (None, true) => return Err(error(format!("{} needs an operand", opcode))),
            (Some(_), false) => return Err(error(format!("{} takes no operand", opcode))),
            (None, false) => 0,
        };

        if let Some(extra) = parts.next() {
            return Err(error(format!("unexpected `{}`", extra)));
        }

        encode(&mut code, encoding, opcode, arg);
    }

    Ok(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_wordcode() {
        let program = ProgramBuilder::new("mul", 1)
            .load_fast(0)
            .load_const(101)
            .multiply()
            .ret()
            .build();

        assert_eq!(program.code, vec![124, 0, 100, 0, 20, 0, 83, 0]);
        assert_eq!(program.constants, vec![101]);
        assert_eq!(program.arity, 1);
    }

    #[test]
    fn test_builder_legacy_and_constant_reuse() {
        let program = ProgramBuilder::new("twice", 0)
            .encoding(Encoding::Legacy)
            .load_const(7)
            .load_const(7)
            .add()
            .ret()
            .build();

        assert_eq!(program.code, vec![100, 0, 0, 100, 0, 0, 23, 83]);
        assert_eq!(program.constants, vec![7]);
    }

    #[test]
    fn test_assemble_matches_builder() {
        let source = "
            # n*101
            LOAD_FAST 0
            LOAD_CONST 0   # 101
            BINARY_MULTIPLY
            RETURN_VALUE
        ";
        let code = assemble(source, Encoding::Legacy).unwrap();
        let built = ProgramBuilder::new("mul", 1)
            .encoding(Encoding::Legacy)
            .load_fast(0)
            .load_const(101)
            .multiply()
            .ret()
            .build();
        assert_eq!(code, built.code);
    }

    #[test]
    fn test_assemble_raw_opcode() {
        assert_eq!(assemble("116 2\n83", Encoding::Wordcode).unwrap(), vec![116, 2, 83, 0]);
    }

    #[test]
    fn test_assemble_errors() {
        let err = assemble("LOAD_FAST", Encoding::Wordcode).unwrap_err();
        assert!(matches!(err, JitError::Assembly { line: 1, .. }));

        let err = assemble("RETURN_VALUE\nBINARY_ADD 1", Encoding::Wordcode).unwrap_err();
        assert!(matches!(err, JitError::Assembly { line: 2, .. }));

        let err = assemble("LOAD_CONST 300", Encoding::Wordcode).unwrap_err();
        assert!(matches!(err, JitError::Assembly { line: 1, .. }));
        assert!(assemble("LOAD_CONST 300", Encoding::Legacy).is_ok());

        let err = assemble("FROBNICATE", Encoding::Wordcode).unwrap_err();
        assert!(err.to_string().contains("FROBNICATE"));
    }
}
