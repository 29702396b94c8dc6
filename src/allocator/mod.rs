//! Allocator strategies implementing the initialize/allocate/release/finalize
//! contract.
//!
//! Each strategy is an explicit instance type owning its own free collection
//! and its own [`PageProvider`]; there is no process-wide allocator state, so
//! several independent heaps can coexist and tests stay deterministic.
//!
//! Strategies share the block layout and split rule from [`crate::block`]
//! and the growth policy from this module: when the free collection has no
//! sufficient block, map ONE fresh region sized to fit the request, then
//! retry the search exactly once. Freed blocks return to the collection
//! verbatim; adjacent free blocks are never merged and mapped space is never
//! returned. Both are documented baseline limitations a third strategy is
//! meant to improve on.

mod best_fit;
mod first_fit;

pub use best_fit::BestFitAllocator;
pub use first_fit::FirstFitAllocator;

use core::ptr::NonNull;

use crate::core::{AllocationStrategy, MAX_REQUEST, MIN_ALIGN, MIN_REQUEST, PAGE_SIZE, align_up};
use crate::error::{MemoryError, MemoryResult};
use crate::page::{MmapProvider, PageStats};
use crate::trace::TraceHandle;

/// The allocation contract every strategy implements and the harness drives.
///
/// Lifecycle: `initialize` → any interleaving of `allocate`/`release` →
/// `finalize`. A strategy instance is single-threaded and not reentrant; the
/// harness brackets exactly one challenge per instance.
pub trait Strategy {
    /// Which placement policy this instance implements.
    fn kind(&self) -> AllocationStrategy;

    /// Resets the free collection to empty. Called at the start of a
    /// challenge.
    fn initialize(&mut self);

    /// Allocates `size` payload bytes and returns a pointer to them.
    ///
    /// `size` must be a multiple of 8 in `[MIN_REQUEST, MAX_REQUEST]`;
    /// violations are reported as [`MemoryError::InvalidRequest`] or
    /// [`MemoryError::ExceedsMaxSize`], identically for every strategy. On
    /// success the pointer is non-null and the payload is disjoint from
    /// every other live payload.
    fn allocate(&mut self, size: usize) -> MemoryResult<NonNull<u8>>;

    /// Returns a block to the free collection, unmodified and uncoalesced.
    ///
    /// # Safety
    /// `ptr` must have been returned by [`allocate`](Self::allocate) on this
    /// instance after the last `initialize` and must not have been released
    /// already. The header preceding the payload must be intact.
    unsafe fn release(&mut self, ptr: NonNull<u8>);

    /// Ends the challenge. Mapped pages intentionally stay mapped (no
    /// shrink path), so this is a permitted no-op.
    fn finalize(&mut self);

    /// Byte accounting of the owned page provider.
    fn page_stats(&self) -> PageStats;
}

impl AllocationStrategy {
    /// Builds a heap for this strategy backed by a fresh [`MmapProvider`],
    /// optionally wired to a trace writer.
    #[must_use]
    pub fn instantiate(self, trace: Option<TraceHandle>) -> Box<dyn Strategy> {
        let provider = MmapProvider::with_trace(trace);
        match self {
            Self::FirstFit => Box::new(FirstFitAllocator::new(provider)),
            Self::BestFit => Box::new(BestFitAllocator::new(provider)),
        }
    }
}

/// Shared request validation, applied by every strategy before any search.
pub(crate) fn validate_request(size: usize) -> MemoryResult<()> {
    if size < MIN_REQUEST || size % MIN_ALIGN != 0 {
        return Err(MemoryError::InvalidRequest { size });
    }
    if size > MAX_REQUEST {
        return Err(MemoryError::ExceedsMaxSize {
            size,
            max: MAX_REQUEST,
        });
    }
    Ok(())
}

/// Length of the fresh region mapped when a request of `size` bytes finds no
/// sufficient free block: the request plus one header, rounded up to whole
/// pages. Sizing the region to the request keeps the single-retry bound
/// sufficient for any valid request.
pub(crate) fn growth_len(size: usize, header_size: usize) -> usize {
    align_up(size + header_size, PAGE_SIZE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_and_unaligned_requests() {
        assert!(matches!(
            validate_request(0),
            Err(MemoryError::InvalidRequest { size: 0 })
        ));
        assert!(matches!(
            validate_request(12),
            Err(MemoryError::InvalidRequest { size: 12 })
        ));
        assert!(validate_request(8).is_ok());
        assert!(validate_request(4000).is_ok());
    }

    #[test]
    fn rejects_oversized_requests() {
        assert!(matches!(
            validate_request(4008),
            Err(MemoryError::ExceedsMaxSize { size: 4008, .. })
        ));
    }

    #[test]
    fn growth_is_page_sized_and_fits_the_request() {
        assert_eq!(growth_len(8, 16), PAGE_SIZE);
        assert_eq!(growth_len(4000, 16), PAGE_SIZE);
        assert_eq!(growth_len(4000, 32), PAGE_SIZE);
        assert_eq!(growth_len(PAGE_SIZE, 32), 2 * PAGE_SIZE);
    }
}
