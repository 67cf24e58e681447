//! Bytecode decoder.
//!
//! Splits a raw instruction stream into [`Instruction`]s. The operand width
//! depends on the [`Encoding`], which is fixed for the whole decode session.

use super::{Encoding, Instruction, Opcode};
use crate::error::{JitError, Result};

/// Iterator over the instructions of a code stream.
///
/// Yields `Err` at most once: after a truncated instruction the decoder is
/// exhausted.
pub struct Decoder<'a> {
    code: &'a [u8],
    pos: usize,
    encoding: Encoding,
    failed: bool,
}

impl<'a> Decoder<'a> {
    pub fn new(code: &'a [u8], encoding: Encoding) -> Self {
        Self {
            code,
            pos: 0,
            encoding,
            failed: false,
        }
    }

    /// Current byte offset into the stream.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Decode the instruction at the current position and advance past it.
    pub fn decode(&mut self) -> Result<Instruction> {
        let offset = self.pos;
        let byte = *self
            .code
            .get(offset)
            .ok_or(JitError::Decode { offset, needed: 1 })?;
        let opcode = Opcode::from_byte(byte);

        let len = self.encoding.instruction_len(opcode);
        let bytes = self
            .code
            .get(offset..offset + len)
            .ok_or_else(|| JitError::Decode {
                offset,
                needed: offset + len - self.code.len(),
            })?;

        let arg = match (self.encoding, opcode.has_argument()) {
            // Wordcode still spends a padding byte on operand-less opcodes.
            (_, false) => None,
            (Encoding::Wordcode, true) => Some(bytes[1] as u16),
            (Encoding::Legacy, true) => Some(u16::from_le_bytes([bytes[1], bytes[2]])),
        };

        self.pos += len;
        Ok(Instruction { offset, opcode, arg })
    }
}

impl Iterator for Decoder<'_> {
    type Item = Result<Instruction>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.pos >= self.code.len() {
            return None;
        }
        let result = self.decode();
        if result.is_err() {
            self.failed = true;
        }
        Some(result)
    }
}

/// Decode a whole stream, stopping at the first error.
pub fn decode_all(code: &[u8], encoding: Encoding) -> Result<Vec<Instruction>> {
    Decoder::new(code, encoding).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wordcode() {
        // LOAD_FAST 0; LOAD_CONST 1; BINARY_MULTIPLY; RETURN_VALUE
        let code = [124, 0, 100, 1, 20, 0, 83, 0];
        let insts = decode_all(&code, Encoding::Wordcode).unwrap();

        assert_eq!(insts.len(), 4);
        assert_eq!(insts[0], Instruction { offset: 0, opcode: Opcode::LoadFast, arg: Some(0) });
        assert_eq!(insts[1], Instruction { offset: 2, opcode: Opcode::LoadConst, arg: Some(1) });
        assert_eq!(insts[2], Instruction { offset: 4, opcode: Opcode::BinaryMultiply, arg: None });
        assert_eq!(insts[3], Instruction { offset: 6, opcode: Opcode::ReturnValue, arg: None });
    }

    #[test]
    fn test_instructions_short_of_the_end() {
        // Every instruction but the last ends before the stream does.
        let code = [124, 0, 124, 1, 23, 0, 124, 2, 20, 0, 11, 0, 83, 0];
        let mut decoder = Decoder::new(&code, Encoding::Wordcode);

        let first = decoder.decode().unwrap();
        assert_eq!(first.offset, 0);
        assert_eq!(decoder.position(), 2);
        assert_eq!(decoder.count(), 6);

        let legacy = [124, 0, 0, 124, 1, 0, 24, 83];
        let insts = decode_all(&legacy, Encoding::Legacy).unwrap();
        assert_eq!(insts.iter().map(|i| i.offset).collect::<Vec<_>>(), vec![0, 3, 6, 7]);
    }

    #[test]
    fn test_legacy_two_byte_operand() {
        // LOAD_CONST 0x0102; BINARY_ADD; RETURN_VALUE
        let code = [100, 0x02, 0x01, 23, 83];
        let insts = decode_all(&code, Encoding::Legacy).unwrap();

        assert_eq!(insts[0].arg, Some(0x0102));
        assert_eq!(insts[1], Instruction { offset: 3, opcode: Opcode::BinaryAdd, arg: None });
        assert_eq!(insts[2].offset, 4);
    }

    #[test]
    fn test_truncated_operand() {
        let err = decode_all(&[124, 0, 100], Encoding::Wordcode).unwrap_err();
        assert!(matches!(err, JitError::Decode { offset: 2, needed: 1 }));

        let err = decode_all(&[124, 1], Encoding::Legacy).unwrap_err();
        assert!(matches!(err, JitError::Decode { offset: 0, needed: 1 }));
    }

    #[test]
    fn test_truncated_padding() {
        let err = decode_all(&[83], Encoding::Wordcode).unwrap_err();
        assert!(matches!(err, JitError::Decode { offset: 0, needed: 1 }));
    }

    #[test]
    fn test_unknown_opcode_still_decodes() {
        // LOAD_GLOBAL 3 decodes fine; rejecting it is the lowering's job.
        let insts = decode_all(&[116, 3, 83, 0], Encoding::Wordcode).unwrap();
        assert_eq!(insts[0].opcode, Opcode::Other(116));
        assert_eq!(insts[0].arg, Some(3));
    }

    #[test]
    fn test_fused_after_error() {
        let mut decoder = Decoder::new(&[100], Encoding::Legacy);
        assert!(decoder.next().unwrap().is_err());
        assert!(decoder.next().is_none());
    }
}
