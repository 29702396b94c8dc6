//! Error types for the allocator framework.
//!
//! Uses thiserror for clean, idiomatic Rust error definitions.
//!
//! Two families of failures exist and are deliberately kept in one enum so a
//! challenge run has a single terminal error channel:
//!
//! - invariant violations ([`MemoryError::Corruption`]) — defects, never
//!   recoverable; surfaced as a named error instead of aborting the process
//!   so tests can assert on them;
//! - resource failures ([`MemoryError::MapFailed`], [`MemoryError::UnmapFailed`],
//!   [`MemoryError::OutOfMemory`]) — the page provider could not deliver.
//!
//! Contract misuse on `allocate` (size zero, unaligned, oversized) is checked
//! defensively and reported; misuse of `release` (foreign pointer, double
//! free) remains an `unsafe` contract documented on the trait.

use std::io;

use thiserror::Error;

/// Errors produced by allocator strategies, the page provider and the
/// workload harness.
#[must_use = "errors should be handled"]
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum MemoryError {
    /// A live payload's boundary tag byte was overwritten. This means two
    /// allocations overlapped or payload writes escaped their block; it is a
    /// defect in the allocator under test, not a user error.
    #[error("tag corruption at {address:#x}: expected {expected:#04x}, found {found:#04x}")]
    Corruption {
        /// Address of the corrupted byte.
        address: usize,
        /// Tag byte the object was stamped with.
        expected: u8,
        /// Byte actually found at the boundary.
        found: u8,
    },

    /// The operating system refused to map a fresh region.
    #[error("mapping {size} bytes from the system failed")]
    MapFailed {
        /// Requested region length in bytes.
        size: usize,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },

    /// The operating system refused to unmap a region.
    #[error("unmapping {size} bytes to the system failed")]
    UnmapFailed {
        /// Region length in bytes.
        size: usize,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },

    /// Request size is zero or not a multiple of the minimum alignment.
    /// Applied identically by every strategy so the benchmark comparison
    /// stays meaningful.
    #[error("invalid request of {size} bytes: must be a non-zero multiple of 8")]
    InvalidRequest {
        /// Offending request size.
        size: usize,
    },

    /// Request size exceeds the supported maximum. Rejected before reaching
    /// the page provider so both strategies behave the same way.
    #[error("request of {size} bytes exceeds the supported maximum of {max}")]
    ExceedsMaxSize {
        /// Offending request size.
        size: usize,
        /// Supported maximum payload size.
        max: usize,
    },

    /// A trace output file could not be created.
    #[error("opening trace output failed")]
    TraceIo(#[from] io::Error),

    /// A freshly mapped region still could not satisfy the request. The
    /// growth policy sizes regions to fit any valid request, so reaching
    /// this is a defect rather than an expected outcome.
    #[error("allocator could not place {size} bytes even after growing")]
    OutOfMemory {
        /// Request size that could not be placed.
        size: usize,
    },
}

/// Result alias used throughout the crate.
pub type MemoryResult<T> = core::result::Result<T, MemoryError>;
