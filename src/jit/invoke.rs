//! Native invocation of compiled code.
//!
//! Binds the start of an [`ExecutableRegion`] to a typed `extern "C"`
//! function pointer. All arguments and the result are `i64`, passed in
//! rdi, rsi, rdx, rcx and returned in rax.

use std::marker::PhantomData;

use super::memory::ExecutableRegion;
use crate::error::{JitError, Result};

/// Most integer arguments a compiled function can take.
pub const MAX_ARITY: usize = 4;

/// Shape of a compiled function: `arity` i64 arguments, one i64 result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FunctionSignature {
    pub arity: usize,
}

impl FunctionSignature {
    pub fn new(arity: usize) -> Self {
        Self { arity }
    }

    /// Fail with `UnsupportedArity` when the arguments do not all fit in
    /// argument registers.
    pub fn validate(&self) -> Result<()> {
        if self.arity > MAX_ARITY {
            return Err(JitError::UnsupportedArity {
                arity: self.arity,
                max: MAX_ARITY,
            });
        }
        Ok(())
    }
}

#[derive(Clone, Copy)]
enum Entry {
    Arity0(extern "C" fn() -> i64),
    Arity1(extern "C" fn(i64) -> i64),
    Arity2(extern "C" fn(i64, i64) -> i64),
    Arity3(extern "C" fn(i64, i64, i64) -> i64),
    Arity4(extern "C" fn(i64, i64, i64, i64) -> i64),
}

/// A callable view of a sealed region.
///
/// Borrows the region, so it cannot outlive it: invoking released memory is
/// ruled out by the borrow checker.
#[derive(Clone, Copy)]
pub struct NativeFunction<'r> {
    entry: Entry,
    address: usize,
    signature: FunctionSignature,
    _region: PhantomData<&'r ExecutableRegion>,
}

impl<'r> NativeFunction<'r> {
    /// Bind the start of `region` to a function of the given signature.
    ///
    /// # Safety
    /// The region must start with machine code that follows the native
    /// calling convention for `signature` and returns.
    pub unsafe fn bind(region: &'r ExecutableRegion, signature: FunctionSignature) -> Result<Self> {
        let ptr = region.as_ptr();
        // SAFETY: the caller vouches for the code; the region is executable
        // and outlives 'r.
        let entry = unsafe {
            match signature.arity {
                0 => Entry::Arity0(std::mem::transmute::<*const u8, extern "C" fn() -> i64>(ptr)),
                1 => Entry::Arity1(std::mem::transmute::<*const u8, extern "C" fn(i64) -> i64>(ptr)),
                2 => Entry::Arity2(
                    std::mem::transmute::<*const u8, extern "C" fn(i64, i64) -> i64>(ptr),
                ),
                3 => Entry::Arity3(
                    std::mem::transmute::<*const u8, extern "C" fn(i64, i64, i64) -> i64>(ptr),
                ),
                4 => Entry::Arity4(std::mem::transmute::<
                    *const u8,
                    extern "C" fn(i64, i64, i64, i64) -> i64,
                >(ptr)),
                arity => {
                    return Err(JitError::UnsupportedArity {
                        arity,
                        max: MAX_ARITY,
                    });
                }
            }
        };

        Ok(Self {
            entry,
            address: ptr as usize,
            signature,
            _region: PhantomData,
        })
    }

    pub fn address(&self) -> usize {
        self.address
    }

    pub fn signature(&self) -> FunctionSignature {
        self.signature
    }

    /// Call the function. `args.len()` must equal the signature's arity.
    pub fn call(&self, args: &[i64]) -> Result<i64> {
        let result = match (self.entry, args) {
            (Entry::Arity0(f), []) => f(),
            (Entry::Arity1(f), &[a]) => f(a),
            (Entry::Arity2(f), &[a, b]) => f(a, b),
            (Entry::Arity3(f), &[a, b, c]) => f(a, b, c),
            (Entry::Arity4(f), &[a, b, c, d]) => f(a, b, c, d),
            _ => {
                return Err(JitError::ArgumentCount {
                    expected: self.signature.arity,
                    actual: args.len(),
                });
            }
        };
        Ok(result)
    }
}

impl std::fmt::Debug for NativeFunction<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeFunction")
            .field("address", &format_args!("{:#x}", self.address))
            .field("arity", &self.signature.arity)
            .finish()
    }
}
