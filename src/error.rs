//! Error types shared by every stage of the pipeline.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::bytecode::VerifyError;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, JitError>;

/// Every way a compilation (or an interpreted run) can fail.
///
/// A compilation that returns any of these has not allocated or sealed an
/// executable region, so the caller is free to fall back to the interpreter.
#[derive(Debug, Error)]
pub enum JitError {
    #[error("truncated bytecode at offset {offset}: needed {needed} more byte(s)")]
    Decode { offset: usize, needed: usize },

    #[error("unsupported operation {name} at offset {offset}")]
    UnsupportedOperation { name: String, offset: usize },

    #[error("unsupported arity {arity}: at most {max} integer arguments are supported")]
    UnsupportedArity { arity: usize, max: usize },

    #[error("local slot {index} at offset {offset} has no register (only slots 0..4 are mapped)")]
    UnsupportedLocal { index: usize, offset: usize },

    #[error("constant index {index} at offset {offset} is out of range (pool has {len})")]
    ConstantOutOfRange { index: usize, offset: usize, len: usize },

    #[error("constant {value} does not fit in a 64-bit immediate")]
    Overflow { value: i128 },

    #[error("verification failed: {0}")]
    Verify(#[from] VerifyError),

    #[error("failed to allocate executable memory: {0}")]
    Allocation(#[source] io::Error),

    #[error("failed to change memory protection: {0}")]
    Protection(#[source] io::Error),

    #[error("failed to release executable memory: {0}")]
    Release(#[source] io::Error),

    #[error("code buffer full: {needed} byte(s) needed, {remaining} of {capacity} remaining")]
    CodeBufferFull {
        needed: usize,
        remaining: usize,
        capacity: usize,
    },

    #[error("region write out of bounds: offset {offset} + {len} exceeds {size}")]
    RegionBounds { offset: usize, len: usize, size: usize },

    #[error("expected {expected} argument(s), got {actual}")]
    ArgumentCount { expected: usize, actual: usize },

    #[error("native code generation is only supported on x86-64 unix hosts")]
    UnsupportedTarget,

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid program file {path}: {message}")]
    ProgramFile { path: PathBuf, message: String },

    #[error("invalid assembly at line {line}: {message}")]
    Assembly { line: usize, message: String },
}

impl JitError {
    /// Whether the interpreter can still run a program whose compilation
    /// failed with this error.
    ///
    /// Errors that come from the program itself (bad bytecode, unknown
    /// operations) fail the interpreter the same way, so falling back on them
    /// only delays the report.
    pub fn is_fallback_safe(&self) -> bool {
        matches!(
            self,
            JitError::UnsupportedArity { .. }
                | JitError::UnsupportedLocal { .. }
                | JitError::Allocation(_)
                | JitError::Protection(_)
                | JitError::CodeBufferFull { .. }
                | JitError::RegionBounds { .. }
                | JitError::UnsupportedTarget
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_operation() {
        let err = JitError::UnsupportedOperation {
            name: "LOAD_ATTR".to_string(),
            offset: 4,
        };
        assert_eq!(err.to_string(), "unsupported operation LOAD_ATTR at offset 4");
    }

    #[test]
    fn test_fallback_safety() {
        assert!(JitError::UnsupportedTarget.is_fallback_safe());
        assert!(JitError::UnsupportedArity { arity: 5, max: 4 }.is_fallback_safe());
        assert!(!JitError::Decode { offset: 0, needed: 1 }.is_fallback_safe());
        assert!(
            !JitError::UnsupportedOperation {
                name: "LOAD_GLOBAL".to_string(),
                offset: 0
            }
            .is_fallback_safe()
        );
    }
}
