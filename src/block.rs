//! Shared block layout: header/payload arithmetic and the split rule.
//!
//! Every managed byte range, allocated or free, starts with a
//! strategy-specific header placed immediately before the payload:
//!
//! ```text
//! ... | header | payload | header | payload | ...
//!     ^        ^
//!     handle   pointer returned to the caller
//! ```
//!
//! All header/payload pointer casts in the crate go through [`BlockHandle`];
//! this is the single reviewed choke point for that arithmetic. The header's
//! `payload_size` never includes the header itself and is always a multiple
//! of [`MIN_ALIGN`](crate::core::MIN_ALIGN).

use core::mem::size_of;
use core::ptr::NonNull;

/// Per-strategy block metadata stored inline at the front of a block.
///
/// Implementors are `#[repr(C)]` structs whose first field is the payload
/// size; the remaining fields are free-collection linkage and must be reset
/// whenever a block (re-)enters circulation.
pub(crate) trait BlockHeader: Sized {
    /// A header for a free block of `payload_size` bytes with empty linkage.
    fn new_free(payload_size: usize) -> Self;

    /// Payload size in bytes, excluding the header.
    fn payload_size(&self) -> usize;

    /// Updates the payload size, keeping linkage untouched.
    fn set_payload_size(&mut self, payload_size: usize);
}

/// Typed handle to a block's header.
pub(crate) struct BlockHandle<H>(NonNull<H>);

impl<H> Copy for BlockHandle<H> {}
impl<H> Clone for BlockHandle<H> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<H: BlockHeader> BlockHandle<H> {
    /// Size of the inline header in bytes.
    pub(crate) const HEADER_SIZE: usize = size_of::<H>();

    /// Wraps an existing header pointer.
    pub(crate) fn from_header(header: NonNull<H>) -> Self {
        Self(header)
    }

    /// Recovers the handle for a live payload pointer.
    ///
    /// # Safety
    /// `payload` must have been produced by [`payload`](Self::payload) on a
    /// block whose header is still intact.
    pub(crate) unsafe fn from_payload(payload: NonNull<u8>) -> Self {
        // SAFETY: the header sits exactly one `H` before the payload.
        let header = unsafe { payload.cast::<H>().sub(1) };
        Self(header)
    }

    /// Formats a fresh region of `total_len` bytes as a single free block.
    ///
    /// # Safety
    /// `region` must be valid for writes of `total_len` bytes, aligned for
    /// `H`, and `total_len` must be strictly greater than the header size.
    pub(crate) unsafe fn carve(region: NonNull<u8>, total_len: usize) -> Self {
        debug_assert!(total_len > Self::HEADER_SIZE);
        let header = region.cast::<H>();
        // SAFETY: region is writable and aligned per the caller contract.
        unsafe {
            header.write(H::new_free(total_len - Self::HEADER_SIZE));
        }
        Self(header)
    }

    /// Raw header pointer.
    pub(crate) fn header(self) -> NonNull<H> {
        self.0
    }

    /// Pointer to the first payload byte.
    pub(crate) fn payload(self) -> NonNull<u8> {
        // SAFETY: header and payload belong to the same allocated region by
        // construction of the handle.
        unsafe { self.0.add(1).cast::<u8>() }
    }

    /// Payload size recorded in the header.
    ///
    /// # Safety
    /// The header must be intact (not overwritten by payload writes).
    pub(crate) unsafe fn payload_size(self) -> usize {
        // SAFETY: per the caller contract the header is readable.
        unsafe { self.0.as_ref().payload_size() }
    }

    /// Applies the split rule for a request of `request` bytes.
    ///
    /// With the block's size `S` and `remainder = S - request`: if the
    /// remainder can hold a header and at least one byte of payload, the
    /// block shrinks to `request` bytes and the surplus becomes a new free
    /// block immediately after the payload, returned for re-insertion into
    /// the free collection. Otherwise the whole block is handed out as-is;
    /// the bounded internal fragmentation is a deliberate trade against
    /// per-block bookkeeping.
    ///
    /// # Safety
    /// The block must be removed from its free collection, own at least
    /// `request` payload bytes, and `request` must respect the crate's
    /// alignment so the carved header lands aligned.
    pub(crate) unsafe fn split(self, request: usize) -> Option<Self> {
        // SAFETY: header is intact per the caller contract.
        let size = unsafe { self.payload_size() };
        debug_assert!(size >= request);
        let remainder = size - request;
        if remainder <= Self::HEADER_SIZE {
            return None;
        }

        // SAFETY: the block owns `size` payload bytes, so the surplus range
        // starting at payload + request is writable and header-aligned
        // (request is a multiple of the crate alignment).
        unsafe {
            (*self.0.as_ptr()).set_payload_size(request);
            let surplus = NonNull::new_unchecked(self.payload().as_ptr().add(request));
            Some(Self::carve(surplus, remainder))
        }
    }
}
