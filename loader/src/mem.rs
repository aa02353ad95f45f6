//! Destination memory for image loading.
//!
//! Every byte the pipeline writes (segment copies, BSS zero-fill, the
//! kernel command line, decompressor output) goes through the narrow
//! [`LoadTarget`] seam. On hardware that seam is [`PhysicalMemory`], raw
//! writes into the flat physical address space; under test it is a
//! [`SliceTarget`] window that turns a wild address into an error instead
//! of a wild store.

use crate::error::{FormatError, LoadError};

/// A destination address space for loading.
pub trait LoadTarget {
    /// Copies `bytes` to `addr`.
    ///
    /// # Errors
    ///
    /// Returns a [`LoadError`] if `addr` is outside the target.
    fn copy_to(&mut self, addr: u64, bytes: &[u8]) -> Result<(), LoadError>;

    /// Writes `len` zero bytes at `addr`. A zero-length fill is a no-op,
    /// not an error.
    ///
    /// # Errors
    ///
    /// Returns a [`LoadError`] if the range is outside the target.
    fn zero_fill(&mut self, addr: u64, len: u64) -> Result<(), LoadError>;
}

/// The machine's flat physical address space.
///
/// There is no memory protection at boot time: the loader, the image being
/// placed, and the jump target all share one address space, and the only
/// thing keeping them apart is the footprint arithmetic done before any
/// byte is copied.
pub struct PhysicalMemory {
    _not_send: core::marker::PhantomData<*mut u8>,
}

impl PhysicalMemory {
    /// Creates the raw address-space target.
    ///
    /// # Safety
    ///
    /// Only meaningful on the bare target. The caller asserts that every
    /// address subsequently handed to [`LoadTarget`] methods refers to RAM
    /// that nothing else is using, the loader's own image and stack
    /// included.
    #[must_use]
    pub unsafe fn new() -> Self {
        Self {
            _not_send: core::marker::PhantomData,
        }
    }
}

impl LoadTarget for PhysicalMemory {
    fn copy_to(&mut self, addr: u64, bytes: &[u8]) -> Result<(), LoadError> {
        // SAFETY: the constructor's contract puts the address range in
        // otherwise-unused RAM.
        unsafe {
            core::ptr::copy_nonoverlapping(bytes.as_ptr(), addr as usize as *mut u8, bytes.len());
        }
        Ok(())
    }

    fn zero_fill(&mut self, addr: u64, len: u64) -> Result<(), LoadError> {
        // SAFETY: as above.
        unsafe {
            core::ptr::write_bytes(addr as usize as *mut u8, 0, len as usize);
        }
        Ok(())
    }
}

/// A bounded window of memory starting at a base address.
///
/// Used as the staging target in tests and anywhere a load must be captured
/// into a buffer instead of placed at its physical home.
pub struct SliceTarget<'a> {
    base: u64,
    mem: &'a mut [u8],
}

impl<'a> SliceTarget<'a> {
    /// Wraps `mem` as the address range `[base, base + mem.len())`.
    pub fn new(base: u64, mem: &'a mut [u8]) -> Self {
        Self { base, mem }
    }

    fn window(&mut self, addr: u64, len: u64) -> Result<&mut [u8], LoadError> {
        // An address below the window or a range past its end both mean the
        // image's addresses don't fit this target.
        let start = addr
            .checked_sub(self.base)
            .ok_or(FormatError::AddressOutOfRange)? as usize;
        let end = start
            .checked_add(len as usize)
            .filter(|&e| e <= self.mem.len())
            .ok_or(FormatError::AddressOutOfRange)?;
        Ok(&mut self.mem[start..end])
    }
}

impl LoadTarget for SliceTarget<'_> {
    fn copy_to(&mut self, addr: u64, bytes: &[u8]) -> Result<(), LoadError> {
        self.window(addr, bytes.len() as u64)?
            .copy_from_slice(bytes);
        Ok(())
    }

    fn zero_fill(&mut self, addr: u64, len: u64) -> Result<(), LoadError> {
        self.window(addr, len)?.fill(0);
        Ok(())
    }
}
