//! Page provider: the only source of raw address space.
//!
//! Allocator strategies never talk to the operating system directly; they
//! request whole page-aligned regions through [`PageProvider`] and carve
//! blocks out of them. The provider also keeps the byte accounting the
//! harness folds into its utilization metric.
//!
//! Within a challenge the resource model is monotonic: strategies only map,
//! they never hand pages back. [`PageProvider::unmap`] exists for provider
//! completeness and tests.

use core::ptr::NonNull;
use std::io;

use tracing::debug;

use crate::core::PAGE_SIZE;
use crate::error::{MemoryError, MemoryResult};
use crate::trace::TraceHandle;

/// Byte accounting for a provider instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageStats {
    /// Total bytes mapped from the system.
    pub mapped_bytes: usize,
    /// Total bytes unmapped back to the system.
    pub unmapped_bytes: usize,
}

/// Supplies and reclaims whole OS pages.
///
/// `len` arguments must be non-zero multiples of [`PAGE_SIZE`]; returned
/// pointers are page-aligned and the region is readable and writable.
pub trait PageProvider {
    /// Maps a fresh zero-filled region of `len` bytes.
    fn map(&mut self, len: usize) -> MemoryResult<NonNull<u8>>;

    /// Unmaps the region `[ptr, ptr + len)`.
    ///
    /// # Safety
    /// The region must have been returned by [`map`](Self::map) on this
    /// provider, with exactly this `ptr` and `len`, and must not be accessed
    /// afterwards.
    unsafe fn unmap(&mut self, ptr: NonNull<u8>, len: usize) -> MemoryResult<()>;

    /// Current byte accounting.
    fn stats(&self) -> PageStats;
}

/// Page provider backed by anonymous private `mmap`.
#[derive(Debug, Default)]
pub struct MmapProvider {
    stats: PageStats,
    trace: Option<TraceHandle>,
}

impl MmapProvider {
    /// Creates a provider with no trace output.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a provider that records `m`/`u` events through `trace`.
    #[must_use]
    pub fn with_trace(trace: Option<TraceHandle>) -> Self {
        Self {
            stats: PageStats::default(),
            trace,
        }
    }
}

impl PageProvider for MmapProvider {
    fn map(&mut self, len: usize) -> MemoryResult<NonNull<u8>> {
        assert!(len > 0 && len % PAGE_SIZE == 0, "len must be page-sized");

        // SAFETY: FFI call to libc mmap with an anonymous private mapping.
        // No fd and no address hint are passed; the OS validates the
        // parameters and returns MAP_FAILED on error.
        let ptr = unsafe {
            libc::mmap(
                core::ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };
        if ptr == libc::MAP_FAILED {
            return Err(MemoryError::MapFailed {
                size: len,
                source: io::Error::last_os_error(),
            });
        }

        self.stats.mapped_bytes += len;
        debug!(len, addr = ptr as usize, "mapped page region");
        if let Some(trace) = &self.trace {
            trace.borrow_mut().mapped(ptr as usize, len);
        }

        NonNull::new(ptr.cast::<u8>()).ok_or(MemoryError::MapFailed {
            size: len,
            source: io::Error::other("mmap returned null"),
        })
    }

    unsafe fn unmap(&mut self, ptr: NonNull<u8>, len: usize) -> MemoryResult<()> {
        assert!(len > 0 && len % PAGE_SIZE == 0, "len must be page-sized");
        assert!(ptr.as_ptr() as usize % PAGE_SIZE == 0, "ptr must be page-aligned");

        // SAFETY: caller guarantees the region came from `map` on this
        // provider and is no longer accessed.
        let ret = unsafe { libc::munmap(ptr.as_ptr().cast::<libc::c_void>(), len) };
        if ret == -1 {
            return Err(MemoryError::UnmapFailed {
                size: len,
                source: io::Error::last_os_error(),
            });
        }

        self.stats.unmapped_bytes += len;
        debug!(len, addr = ptr.as_ptr() as usize, "unmapped page region");
        if let Some(trace) = &self.trace {
            trace.borrow_mut().unmapped(ptr.as_ptr() as usize, len);
        }
        Ok(())
    }

    fn stats(&self) -> PageStats {
        self.stats
    }
}
