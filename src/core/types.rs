//! Common types and constants for memory management.

use core::fmt;

/// Minimum alignment for allocations. Request sizes and block payloads are
/// always multiples of this.
pub const MIN_ALIGN: usize = 8;

/// Page size requested from the page provider. Regions handed out by the
/// provider are always a multiple of this and page-aligned.
pub const PAGE_SIZE: usize = 4096;

/// Smallest request an allocator accepts.
pub const MIN_REQUEST: usize = 8;

/// Largest request an allocator accepts.
pub const MAX_REQUEST: usize = 4000;

/// Block placement strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AllocationStrategy {
    /// First fit - use the first sufficient free block found.
    FirstFit,
    /// Best fit - use the smallest sufficient free block.
    BestFit,
}

impl AllocationStrategy {
    /// Stable short name, used in report tables and trace file names.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::FirstFit => "first_fit",
            Self::BestFit => "best_fit",
        }
    }

    /// Both implemented strategies, in benchmark order.
    pub const ALL: [Self; 2] = [Self::FirstFit, Self::BestFit];
}

impl fmt::Display for AllocationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Rounds `value` up to the next multiple of `align`.
///
/// `align` must be a power of two.
#[inline]
#[must_use]
pub const fn align_up(value: usize, align: usize) -> usize {
    debug_assert!(align.is_power_of_two());
    (value + align - 1) & !(align - 1)
}
