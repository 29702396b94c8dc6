//! First-fit allocator: singly linked free list, first sufficient block wins.
//!
//! The free list is ordered most-recently-freed first; there is no ordering
//! by size. Search is O(n), insert is O(1), and removal is O(1) given the
//! predecessor tracked during the scan.

use core::ptr::NonNull;

use crate::allocator::{Strategy, growth_len, validate_request};
use crate::block::{BlockHandle, BlockHeader};
use crate::core::AllocationStrategy;
use crate::error::{MemoryError, MemoryResult};
use crate::page::{MmapProvider, PageProvider, PageStats};

/// Inline metadata for first-fit blocks: payload size plus the free-list
/// link. The link is `None` while the block is allocated.
#[repr(C)]
struct FirstFitHeader {
    size: usize,
    next: Option<NonNull<FirstFitHeader>>,
}

impl BlockHeader for FirstFitHeader {
    fn new_free(payload_size: usize) -> Self {
        Self {
            size: payload_size,
            next: None,
        }
    }

    fn payload_size(&self) -> usize {
        self.size
    }

    fn set_payload_size(&mut self, payload_size: usize) {
        self.size = payload_size;
    }
}

type Block = BlockHandle<FirstFitHeader>;

/// Heap using the first-fit placement policy.
///
/// Owns its free list and its page provider; dropping the instance leaves
/// mapped pages to the OS (no shrink path by design).
pub struct FirstFitAllocator<P = MmapProvider> {
    free_head: Option<NonNull<FirstFitHeader>>,
    provider: P,
}

impl<P: PageProvider> FirstFitAllocator<P> {
    /// Creates an empty heap on top of `provider`.
    pub fn new(provider: P) -> Self {
        Self {
            free_head: None,
            provider,
        }
    }

    /// Payload sizes currently on the free list, head first. Diagnostic
    /// accessor for tests and debugging.
    pub fn free_block_sizes(&self) -> Vec<usize> {
        let mut sizes = Vec::new();
        let mut cur = self.free_head;
        while let Some(node) = cur {
            // SAFETY: free-list nodes are intact headers owned by this heap.
            let header = unsafe { node.as_ref() };
            sizes.push(header.size);
            cur = header.next;
        }
        sizes
    }

    /// Pushes a free block onto the head of the list.
    fn push_free(&mut self, block: Block) {
        let node = block.header();
        // SAFETY: the block is not on any list (its link is clear) and its
        // header is writable.
        unsafe {
            debug_assert!((*node.as_ptr()).next.is_none());
            (*node.as_ptr()).next = self.free_head;
        }
        self.free_head = Some(node);
    }

    /// Scans the list from the head and claims the first block that fits,
    /// splitting off any usable surplus.
    fn take_first_fit(&mut self, size: usize) -> Option<NonNull<u8>> {
        let mut prev: Option<NonNull<FirstFitHeader>> = None;
        let mut cur = self.free_head;
        while let Some(node) = cur {
            // SAFETY: free-list nodes are intact headers owned by this heap.
            let (node_size, next) = unsafe {
                let header = node.as_ref();
                (header.size, header.next)
            };
            if node_size < size {
                prev = Some(node);
                cur = next;
                continue;
            }

            // Unlink in O(1) via the tracked predecessor.
            match prev {
                // SAFETY: prev is a live list node preceding `node`.
                Some(p) => unsafe { (*p.as_ptr()).next = next },
                None => self.free_head = next,
            }
            // SAFETY: node is now off the list; clear its link before it
            // leaves circulation.
            unsafe {
                (*node.as_ptr()).next = None;
            }

            let block = Block::from_header(node);
            // SAFETY: the block is off the list and holds >= size payload
            // bytes; size is a validated multiple of the crate alignment.
            if let Some(rest) = unsafe { block.split(size) } {
                self.push_free(rest);
            }
            return Some(block.payload());
        }
        None
    }

    /// Maps one fresh region sized for `size` and links it in as a single
    /// free block.
    fn grow(&mut self, size: usize) -> MemoryResult<()> {
        let len = growth_len(size, Block::HEADER_SIZE);
        let region = self.provider.map(len)?;
        // SAFETY: the fresh region is writable, page-aligned and larger
        // than one header.
        let block = unsafe { Block::carve(region, len) };
        self.push_free(block);
        Ok(())
    }
}

impl<P: PageProvider> Strategy for FirstFitAllocator<P> {
    fn kind(&self) -> AllocationStrategy {
        AllocationStrategy::FirstFit
    }

    fn initialize(&mut self) {
        // Previously mapped pages stay with the OS; only the index resets.
        self.free_head = None;
    }

    fn allocate(&mut self, size: usize) -> MemoryResult<NonNull<u8>> {
        validate_request(size)?;
        if let Some(payload) = self.take_first_fit(size) {
            return Ok(payload);
        }
        // No sufficient block: grow once, then the same request must fit.
        self.grow(size)?;
        self.take_first_fit(size)
            .ok_or(MemoryError::OutOfMemory { size })
    }

    unsafe fn release(&mut self, ptr: NonNull<u8>) {
        // SAFETY: ptr came from allocate on this instance per the trait
        // contract, so the header precedes it intact.
        let block = unsafe { Block::from_payload(ptr) };
        self.push_free(block);
    }

    fn finalize(&mut self) {}

    fn page_stats(&self) -> PageStats {
        self.provider.stats()
    }
}
