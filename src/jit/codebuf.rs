//! Code buffer for building JIT code.
//!
//! This module provides a fixed-capacity buffer for building machine code
//! before copying it to executable memory. The capacity is chosen up front
//! (at least one page) and never grows: the buffer is copied into a region
//! of exactly that size.

use crate::error::{JitError, Result};

/// A fixed-capacity, append-only buffer for machine code.
pub struct CodeBuffer {
    /// The code bytes; `code.len()` is the write cursor
    code: Vec<u8>,
    capacity: usize,
}

impl CodeBuffer {
    /// Create an empty code buffer that holds at most `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            code: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Get the current size of the code.
    pub fn len(&self) -> usize {
        self.code.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes left before the buffer is full.
    pub fn remaining(&self) -> usize {
        self.capacity - self.code.len()
    }

    /// Append the bytes of one instruction.
    ///
    /// Either all of `bytes` are written or none are.
    pub fn emit_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        if bytes.len() > self.remaining() {
            return Err(JitError::CodeBufferFull {
                needed: bytes.len(),
                remaining: self.remaining(),
                capacity: self.capacity,
            });
        }
        self.code.extend_from_slice(bytes);
        Ok(())
    }

    /// Get the code bytes (for inspection).
    pub fn code(&self) -> &[u8] {
        &self.code
    }

    /// Consume the buffer and return the raw code bytes.
    pub fn into_code(self) -> Vec<u8> {
        self.code
    }
}
