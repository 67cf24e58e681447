//! Executable memory management using mmap.
//!
//! A mapping starts out as a [`WritableRegion`] (read + write). Sealing it
//! consumes the writable handle and returns an [`ExecutableRegion`]
//! (read + execute), so no handle ever exists through which a region is both
//! writable and executable. Dropping either handle unmaps the memory.

use std::io;
use std::mem::ManuallyDrop;
use std::ptr::NonNull;

use tracing::{trace, warn};

use crate::error::{JitError, Result};

/// Page protection of a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protection {
    ReadWrite,
    ReadExecute,
}

/// Host memory facilities, queried once and passed to whoever allocates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostMemory {
    page_size: usize,
}

impl HostMemory {
    /// Query the page size of the current system.
    #[cfg(unix)]
    pub fn query() -> Result<Self> {
        let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
        if page_size <= 0 {
            return Err(JitError::Allocation(io::Error::last_os_error()));
        }
        Ok(Self {
            page_size: page_size as usize,
        })
    }

    #[cfg(not(unix))]
    pub fn query() -> Result<Self> {
        Err(JitError::UnsupportedTarget)
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Round `size` up to a whole number of pages (at least one).
    pub fn round_up(&self, size: usize) -> usize {
        let size = size.max(1);
        (size + self.page_size - 1) & !(self.page_size - 1)
    }

    /// Map a fresh read-write region of at least `size` bytes.
    #[cfg(unix)]
    pub fn allocate(&self, size: usize) -> Result<WritableRegion> {
        let size = self.round_up(size);

        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                size,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };

        if ptr == libc::MAP_FAILED {
            return Err(JitError::Allocation(io::Error::last_os_error()));
        }
        let ptr = NonNull::new(ptr as *mut u8)
            .ok_or_else(|| JitError::Allocation(io::Error::other("mmap returned null")))?;

        trace!(address = ptr.as_ptr() as usize, size, "region mapped");
        Ok(WritableRegion {
            mapping: Mapping { ptr, size },
        })
    }

    #[cfg(not(unix))]
    pub fn allocate(&self, _size: usize) -> Result<WritableRegion> {
        Err(JitError::UnsupportedTarget)
    }
}

/// An owned mapping; unmapped exactly once, on release or drop.
struct Mapping {
    ptr: NonNull<u8>,
    size: usize,
}

impl Mapping {
    #[cfg(unix)]
    fn protect(&self, prot: libc::c_int) -> io::Result<()> {
        let result =
            unsafe { libc::mprotect(self.ptr.as_ptr() as *mut libc::c_void, self.size, prot) };
        if result != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    #[cfg(unix)]
    fn unmap(&mut self) -> io::Result<()> {
        let result = unsafe { libc::munmap(self.ptr.as_ptr() as *mut libc::c_void, self.size) };
        if result != 0 {
            return Err(io::Error::last_os_error());
        }
        trace!(address = self.ptr.as_ptr() as usize, size = self.size, "region unmapped");
        Ok(())
    }

    #[cfg(not(unix))]
    fn unmap(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn release(self) -> Result<()> {
        let mut this = ManuallyDrop::new(self);
        this.unmap().map_err(JitError::Release)
    }
}

impl Drop for Mapping {
    fn drop(&mut self) {
        if let Err(e) = self.unmap() {
            warn!(address = self.ptr.as_ptr() as usize, error = %e, "munmap failed");
        }
    }
}

/// A mapped region that can be written but not executed.
pub struct WritableRegion {
    mapping: Mapping,
}

impl WritableRegion {
    /// Get a pointer to the memory.
    pub fn as_ptr(&self) -> *const u8 {
        self.mapping.ptr.as_ptr()
    }

    /// Get the size of the mapping (a whole number of pages).
    pub fn size(&self) -> usize {
        self.mapping.size
    }

    pub fn protection(&self) -> Protection {
        Protection::ReadWrite
    }

    /// Write bytes to the memory at the given offset.
    pub fn write(&mut self, offset: usize, data: &[u8]) -> Result<()> {
        let end = offset.checked_add(data.len());
        if end.is_none_or(|end| end > self.mapping.size) {
            return Err(JitError::RegionBounds {
                offset,
                len: data.len(),
                size: self.mapping.size,
            });
        }

        // SAFETY: the range was bounds-checked above and the mapping is
        // read-write for as long as this handle exists.
        unsafe {
            let dest = self.mapping.ptr.as_ptr().add(offset);
            std::ptr::copy_nonoverlapping(data.as_ptr(), dest, data.len());
        }
        Ok(())
    }

    /// Make the region executable and read-only.
    ///
    /// On failure the mapping is released and the error returned; a region
    /// that could not be sealed is never handed out.
    #[cfg(unix)]
    pub fn seal(self) -> Result<ExecutableRegion> {
        self.mapping
            .protect(libc::PROT_READ | libc::PROT_EXEC)
            .map_err(JitError::Protection)?;
        trace!(address = self.as_ptr() as usize, size = self.size(), "region sealed");
        Ok(ExecutableRegion {
            mapping: self.mapping,
        })
    }

    #[cfg(not(unix))]
    pub fn seal(self) -> Result<ExecutableRegion> {
        Err(JitError::UnsupportedTarget)
    }

    /// Return the region to the system.
    pub fn release(self) -> Result<()> {
        self.mapping.release()
    }
}

/// A sealed region: readable and executable, never writable again.
pub struct ExecutableRegion {
    mapping: Mapping,
}

impl ExecutableRegion {
    pub fn as_ptr(&self) -> *const u8 {
        self.mapping.ptr.as_ptr()
    }

    /// Base address, for disassemblers and listings.
    pub fn address(&self) -> usize {
        self.as_ptr() as usize
    }

    pub fn size(&self) -> usize {
        self.mapping.size
    }

    pub fn protection(&self) -> Protection {
        Protection::ReadExecute
    }

    /// Return the region to the system. Nothing may be executing in it.
    pub fn release(self) -> Result<()> {
        self.mapping.release()
    }
}

// Both handles own their mapping exclusively. A writable region is only
// mutated through `&mut self`; a sealed one is immutable.
unsafe impl Send for WritableRegion {}
unsafe impl Send for ExecutableRegion {}
unsafe impl Sync for ExecutableRegion {}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn host() -> HostMemory {
        HostMemory::query().unwrap()
    }

    #[test]
    fn test_page_size_is_power_of_two() {
        assert!(host().page_size().is_power_of_two());
    }

    #[test]
    fn test_round_up() {
        let host = host();
        let page = host.page_size();
        assert_eq!(host.round_up(0), page);
        assert_eq!(host.round_up(1), page);
        assert_eq!(host.round_up(page), page);
        assert_eq!(host.round_up(page + 1), 2 * page);
    }

    #[test]
    fn test_allocate_memory() {
        let region = host().allocate(100).unwrap();
        assert_eq!(region.size(), host().page_size());
        assert_eq!(region.protection(), Protection::ReadWrite);
        assert_eq!(region.as_ptr() as usize % host().page_size(), 0);
    }

    #[test]
    fn test_write_memory() {
        let mut region = host().allocate(4096).unwrap();
        region.write(0, &[0x90, 0x90, 0x90, 0xC3]).unwrap();
        let written = unsafe { std::slice::from_raw_parts(region.as_ptr(), 4) };
        assert_eq!(written, &[0x90, 0x90, 0x90, 0xC3]);
    }

    #[test]
    fn test_write_out_of_bounds() {
        let mut region = host().allocate(1).unwrap();
        let size = region.size();
        assert!(region.write(size - 1, &[0xC3]).is_ok());
        let err = region.write(size - 1, &[0x90, 0xC3]).unwrap_err();
        assert!(matches!(err, JitError::RegionBounds { len: 2, .. }));
        assert!(region.write(usize::MAX, &[0xC3]).is_err());
    }

    #[test]
    fn test_seal() {
        let mut region = host().allocate(4096).unwrap();
        region.write(0, &[0xC3]).unwrap();
        let address = region.as_ptr() as usize;

        let sealed = region.seal().unwrap();
        assert_eq!(sealed.protection(), Protection::ReadExecute);
        assert_eq!(sealed.address(), address);
        sealed.release().unwrap();
    }

    #[test]
    fn test_release_writable() {
        host().allocate(4096).unwrap().release().unwrap();
    }
}
