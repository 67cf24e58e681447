//! Source opcodes.
//!
//! Numbering follows CPython 3.x so that `co_code` bytes from a real code
//! object can be fed in unchanged.

use serde::Serialize;

/// Opcodes at or above this value carry an operand.
pub const HAVE_ARGUMENT: u8 = 90;

/// A source operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Opcode {
    UnaryNegative,
    BinaryMultiply,
    BinaryAdd,
    BinarySubtract,
    InplaceAdd,
    InplaceSubtract,
    ReturnValue,
    LoadConst,
    LoadFast,
    StoreFast,
    /// Any byte outside the supported catalogue.
    Other(u8),
}

impl Opcode {
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            11 => Opcode::UnaryNegative,
            20 => Opcode::BinaryMultiply,
            23 => Opcode::BinaryAdd,
            24 => Opcode::BinarySubtract,
            55 => Opcode::InplaceAdd,
            56 => Opcode::InplaceSubtract,
            83 => Opcode::ReturnValue,
            100 => Opcode::LoadConst,
            124 => Opcode::LoadFast,
            125 => Opcode::StoreFast,
            other => Opcode::Other(other),
        }
    }

    pub fn to_byte(self) -> u8 {
        match self {
            Opcode::UnaryNegative => 11,
            Opcode::BinaryMultiply => 20,
            Opcode::BinaryAdd => 23,
            Opcode::BinarySubtract => 24,
            Opcode::InplaceAdd => 55,
            Opcode::InplaceSubtract => 56,
            Opcode::ReturnValue => 83,
            Opcode::LoadConst => 100,
            Opcode::LoadFast => 124,
            Opcode::StoreFast => 125,
            Opcode::Other(byte) => byte,
        }
    }

    /// Whether the instruction carries an operand index.
    pub fn has_argument(self) -> bool {
        self.to_byte() >= HAVE_ARGUMENT
    }

    pub fn is_supported(self) -> bool {
        !matches!(self, Opcode::Other(_))
    }

    /// Mnemonic used in diagnostics and in the text assembler.
    ///
    /// Well-known CPython opcodes outside the catalogue keep their names so
    /// that an unsupported-operation error says what the program tried to do.
    pub fn name(self) -> String {
        let name = match self {
            Opcode::UnaryNegative => "UNARY_NEGATIVE",
            Opcode::BinaryMultiply => "BINARY_MULTIPLY",
            Opcode::BinaryAdd => "BINARY_ADD",
            Opcode::BinarySubtract => "BINARY_SUBTRACT",
            Opcode::InplaceAdd => "INPLACE_ADD",
            Opcode::InplaceSubtract => "INPLACE_SUBTRACT",
            Opcode::ReturnValue => "RETURN_VALUE",
            Opcode::LoadConst => "LOAD_CONST",
            Opcode::LoadFast => "LOAD_FAST",
            Opcode::StoreFast => "STORE_FAST",
            Opcode::Other(byte) => match byte {
                1 => "POP_TOP",
                2 => "ROT_TWO",
                4 => "DUP_TOP",
                9 => "NOP",
                10 => "UNARY_POSITIVE",
                12 => "UNARY_NOT",
                15 => "UNARY_INVERT",
                19 => "BINARY_POWER",
                22 => "BINARY_MODULO",
                25 => "BINARY_SUBSCR",
                26 => "BINARY_FLOOR_DIVIDE",
                27 => "BINARY_TRUE_DIVIDE",
                57 => "INPLACE_MULTIPLY",
                101 => "LOAD_NAME",
                106 => "LOAD_ATTR",
                107 => "COMPARE_OP",
                110 => "JUMP_FORWARD",
                113 => "JUMP_ABSOLUTE",
                114 => "POP_JUMP_IF_FALSE",
                115 => "POP_JUMP_IF_TRUE",
                116 => "LOAD_GLOBAL",
                131 => "CALL_FUNCTION",
                _ => return format!("<{}>", byte),
            },
        };
        name.to_string()
    }

    /// Reverse of [`Opcode::name`] for the supported catalogue.
    pub fn from_name(name: &str) -> Option<Self> {
        let op = match name {
            "UNARY_NEGATIVE" => Opcode::UnaryNegative,
            "BINARY_MULTIPLY" => Opcode::BinaryMultiply,
            "BINARY_ADD" => Opcode::BinaryAdd,
            "BINARY_SUBTRACT" => Opcode::BinarySubtract,
            "INPLACE_ADD" => Opcode::InplaceAdd,
            "INPLACE_SUBTRACT" => Opcode::InplaceSubtract,
            "RETURN_VALUE" => Opcode::ReturnValue,
            "LOAD_CONST" => Opcode::LoadConst,
            "LOAD_FAST" => Opcode::LoadFast,
            "STORE_FAST" => Opcode::StoreFast,
            _ => return None,
        };
        Some(op)
    }
}

impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(&self.name())
    }
}
