//! Best-fit allocator: size-ordered AVL tree, minimum sufficient block wins.
//!
//! The free collection is a height-balanced binary search tree keyed by
//! `(payload size, header address)`. Keying on the address as a tie-breaker
//! gives every node a distinct key, so equal-sized blocks need no side
//! chains and removal can navigate by key alone. Search, insert and removal
//! are O(log n).
//!
//! Rebalancing is the standard AVL discipline: recompute
//! `height = 1 + max(height(left), height(right))` along the modified path
//! and rotate whenever one side grows taller than the other by more than
//! one. Removing a node with two children promotes its in-order successor
//! (the leftmost node of the right subtree) into its place; the successor
//! node itself is relinked, never copied, because tree nodes are the memory
//! blocks being managed.

use core::ptr::NonNull;

use crate::allocator::{Strategy, growth_len, validate_request};
use crate::block::{BlockHandle, BlockHeader};
use crate::core::AllocationStrategy;
use crate::error::{MemoryError, MemoryResult};
use crate::page::{MmapProvider, PageProvider, PageStats};

/// Inline metadata for best-fit blocks: payload size plus AVL linkage.
/// Links are `None` and height is 1 while the block is allocated.
#[repr(C)]
struct BestFitHeader {
    size: usize,
    left: Option<NonNull<BestFitHeader>>,
    right: Option<NonNull<BestFitHeader>>,
    height: u32,
}

impl BlockHeader for BestFitHeader {
    fn new_free(payload_size: usize) -> Self {
        Self {
            size: payload_size,
            left: None,
            right: None,
            height: 1,
        }
    }

    fn payload_size(&self) -> usize {
        self.size
    }

    fn set_payload_size(&mut self, payload_size: usize) {
        self.size = payload_size;
    }
}

type Block = BlockHandle<BestFitHeader>;
type Link = Option<NonNull<BestFitHeader>>;

/// Total order over free blocks: payload size first, header address as the
/// tie-breaker so duplicates have distinct keys.
fn key(node: NonNull<BestFitHeader>) -> (usize, usize) {
    // SAFETY: tree nodes are intact headers.
    let size = unsafe { node.as_ref().size };
    (size, node.as_ptr() as usize)
}

fn height(link: Link) -> u32 {
    // SAFETY: tree nodes are intact headers.
    link.map_or(0, |node| unsafe { node.as_ref().height })
}

/// Height difference `left - right`; positive means left-heavy.
unsafe fn balance_factor(node: NonNull<BestFitHeader>) -> i32 {
    // SAFETY: node is an intact tree node per the caller contract.
    let header = unsafe { node.as_ref() };
    height(header.left) as i32 - height(header.right) as i32
}

unsafe fn update_height(node: NonNull<BestFitHeader>) {
    // SAFETY: node is an intact tree node per the caller contract.
    unsafe {
        let header = &mut *node.as_ptr();
        header.height = 1 + height(header.left).max(height(header.right));
    }
}

/// Left rotation around `node`; its right child becomes the subtree root.
unsafe fn rotate_left(node: NonNull<BestFitHeader>) -> NonNull<BestFitHeader> {
    // SAFETY: caller guarantees node has a right child; both nodes are
    // intact and exclusively owned by this tree.
    unsafe {
        let pivot = (*node.as_ptr()).right.expect("rotate_left needs a right child");
        (*node.as_ptr()).right = (*pivot.as_ptr()).left;
        (*pivot.as_ptr()).left = Some(node);
        update_height(node);
        update_height(pivot);
        pivot
    }
}

/// Right rotation around `node`; its left child becomes the subtree root.
unsafe fn rotate_right(node: NonNull<BestFitHeader>) -> NonNull<BestFitHeader> {
    // SAFETY: caller guarantees node has a left child; both nodes are
    // intact and exclusively owned by this tree.
    unsafe {
        let pivot = (*node.as_ptr()).left.expect("rotate_right needs a left child");
        (*node.as_ptr()).left = (*pivot.as_ptr()).right;
        (*pivot.as_ptr()).right = Some(node);
        update_height(node);
        update_height(pivot);
        pivot
    }
}

/// Restores the AVL invariant at `node` after a structural change below it.
unsafe fn rebalance(node: NonNull<BestFitHeader>) -> NonNull<BestFitHeader> {
    // SAFETY: node and its children are intact tree nodes.
    unsafe {
        update_height(node);
        let bf = balance_factor(node);
        if bf > 1 {
            let left = (*node.as_ptr()).left.expect("left-heavy node has a left child");
            if balance_factor(left) < 0 {
                (*node.as_ptr()).left = Some(rotate_left(left));
            }
            return rotate_right(node);
        }
        if bf < -1 {
            let right = (*node.as_ptr()).right.expect("right-heavy node has a right child");
            if balance_factor(right) > 0 {
                (*node.as_ptr()).right = Some(rotate_right(right));
            }
            return rotate_left(node);
        }
        node
    }
}

/// Inserts `new` (a detached node with clear links) into the subtree and
/// returns its new root.
unsafe fn insert(link: Link, new: NonNull<BestFitHeader>) -> NonNull<BestFitHeader> {
    // SAFETY: all touched nodes are intact and exclusively owned.
    unsafe {
        let Some(node) = link else {
            return new;
        };
        if key(new) < key(node) {
            (*node.as_ptr()).left = Some(insert((*node.as_ptr()).left, new));
        } else {
            (*node.as_ptr()).right = Some(insert((*node.as_ptr()).right, new));
        }
        rebalance(node)
    }
}

/// Detaches the minimum node of the subtree rooted at `node`, returning the
/// rebalanced remainder and the detached minimum.
unsafe fn remove_min(node: NonNull<BestFitHeader>) -> (Link, NonNull<BestFitHeader>) {
    // SAFETY: all touched nodes are intact and exclusively owned.
    unsafe {
        match (*node.as_ptr()).left {
            None => ((*node.as_ptr()).right, node),
            Some(left) => {
                let (rest, min) = remove_min(left);
                (*node.as_ptr()).left = rest;
                (Some(rebalance(node)), min)
            }
        }
    }
}

/// Removes the node with exactly `target` from the subtree and returns its
/// new root. The node must be present.
unsafe fn remove(link: Link, target: (usize, usize)) -> Link {
    // SAFETY: all touched nodes are intact and exclusively owned.
    unsafe {
        let node = link?;
        let node_key = key(node);
        if target < node_key {
            (*node.as_ptr()).left = remove((*node.as_ptr()).left, target);
        } else if target > node_key {
            (*node.as_ptr()).right = remove((*node.as_ptr()).right, target);
        } else {
            return match ((*node.as_ptr()).left, (*node.as_ptr()).right) {
                (None, right) => right,
                (left, None) => left,
                (left, Some(right)) => {
                    // Promote the in-order successor in place of the node.
                    let (rest, succ) = remove_min(right);
                    (*succ.as_ptr()).left = left;
                    (*succ.as_ptr()).right = rest;
                    Some(rebalance(succ))
                }
            };
        }
        Some(rebalance(node))
    }
}

/// Heap using the best-fit placement policy.
///
/// Owns its free tree and its page provider; dropping the instance leaves
/// mapped pages to the OS (no shrink path by design).
pub struct BestFitAllocator<P = MmapProvider> {
    root: Link,
    provider: P,
}

impl<P: PageProvider> BestFitAllocator<P> {
    /// Creates an empty heap on top of `provider`.
    pub fn new(provider: P) -> Self {
        Self {
            root: None,
            provider,
        }
    }

    /// Payload sizes currently in the free tree, in ascending order.
    /// Diagnostic accessor for tests and debugging.
    pub fn free_block_sizes(&self) -> Vec<usize> {
        fn walk(link: Link, out: &mut Vec<usize>) {
            if let Some(node) = link {
                // SAFETY: tree nodes are intact headers owned by this heap.
                let header = unsafe { node.as_ref() };
                walk(header.left, out);
                out.push(header.size);
                walk(header.right, out);
            }
        }
        let mut sizes = Vec::new();
        walk(self.root, &mut sizes);
        sizes
    }

    /// Audits the whole tree: stored heights are consistent, every node is
    /// AVL-balanced and keys are in strict search order. Diagnostic for
    /// tests and debugging.
    pub fn is_balanced(&self) -> bool {
        // Returns the subtree height, or None on any violation.
        fn check(link: Link, lo: Option<(usize, usize)>, hi: Option<(usize, usize)>) -> Option<u32> {
            let Some(node) = link else {
                return Some(0);
            };
            let k = key(node);
            if lo.is_some_and(|lo| k <= lo) || hi.is_some_and(|hi| k >= hi) {
                return None;
            }
            // SAFETY: tree nodes are intact headers owned by this heap.
            let header = unsafe { node.as_ref() };
            let lh = check(header.left, lo, Some(k))?;
            let rh = check(header.right, Some(k), hi)?;
            let h = 1 + lh.max(rh);
            if header.height != h || lh.abs_diff(rh) > 1 {
                return None;
            }
            Some(h)
        }
        check(self.root, None, None).is_some()
    }

    /// Re-inserts a free block into the tree.
    fn insert_free(&mut self, block: Block) {
        let node = block.header();
        // SAFETY: the block is detached and its header writable; detached
        // nodes always carry clear links and height 1.
        unsafe {
            debug_assert!((*node.as_ptr()).left.is_none());
            debug_assert!((*node.as_ptr()).right.is_none());
            (*node.as_ptr()).height = 1;
            self.root = Some(insert(self.root, node));
        }
    }

    /// Finds the block with the minimum size still `>= size`: descend right
    /// past blocks that are too small, remember and descend left past
    /// sufficient ones.
    fn find_best(&self, size: usize) -> Option<NonNull<BestFitHeader>> {
        let mut best = None;
        let mut cur = self.root;
        while let Some(node) = cur {
            // SAFETY: tree nodes are intact headers owned by this heap.
            let header = unsafe { node.as_ref() };
            if header.size < size {
                cur = header.right;
            } else {
                best = Some(node);
                cur = header.left;
            }
        }
        best
    }

    /// Claims the best-fitting block if any, splitting off usable surplus.
    fn take_best_fit(&mut self, size: usize) -> Option<NonNull<u8>> {
        let best = self.find_best(size)?;
        // SAFETY: best is in the tree; removal rebalances the search path
        // and leaves the node detached.
        unsafe {
            self.root = remove(self.root, key(best));
            let header = &mut *best.as_ptr();
            header.left = None;
            header.right = None;
            header.height = 1;
        }

        let block = Block::from_header(best);
        // SAFETY: the block is detached and holds >= size payload bytes;
        // size is a validated multiple of the crate alignment.
        if let Some(rest) = unsafe { block.split(size) } {
            self.insert_free(rest);
        }
        Some(block.payload())
    }

    /// Maps one fresh region sized for `size` and inserts it as a single
    /// free block.
    fn grow(&mut self, size: usize) -> MemoryResult<()> {
        let len = growth_len(size, Block::HEADER_SIZE);
        let region = self.provider.map(len)?;
        // SAFETY: the fresh region is writable, page-aligned and larger
        // than one header.
        let block = unsafe { Block::carve(region, len) };
        self.insert_free(block);
        Ok(())
    }
}

impl<P: PageProvider> Strategy for BestFitAllocator<P> {
    fn kind(&self) -> AllocationStrategy {
        AllocationStrategy::BestFit
    }

    fn initialize(&mut self) {
        // Previously mapped pages stay with the OS; only the index resets.
        self.root = None;
    }

    fn allocate(&mut self, size: usize) -> MemoryResult<NonNull<u8>> {
        validate_request(size)?;
        if let Some(payload) = self.take_best_fit(size) {
            return Ok(payload);
        }
        // No sufficient block: grow once, then the same request must fit.
        self.grow(size)?;
        self.take_best_fit(size)
            .ok_or(MemoryError::OutOfMemory { size })
    }

    unsafe fn release(&mut self, ptr: NonNull<u8>) {
        // SAFETY: ptr came from allocate on this instance per the trait
        // contract, so the header precedes it intact.
        let block = unsafe { Block::from_payload(ptr) };
        self.insert_free(block);
    }

    fn finalize(&mut self) {}

    fn page_stats(&self) -> PageStats {
        self.provider.stats()
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::{Rng as _, SeedableRng as _};

    use super::*;

    fn heap() -> BestFitAllocator<MmapProvider> {
        let mut heap = BestFitAllocator::new(MmapProvider::new());
        heap.initialize();
        heap
    }

    #[test]
    fn picks_the_minimum_sufficient_block() {
        let mut heap = heap();
        let a = heap.allocate(40).unwrap();
        let b = heap.allocate(24).unwrap();
        unsafe {
            heap.release(b);
            heap.release(a);
        }
        // Free tree holds {24, 40, surplus}; a 24-byte request must take
        // the 24 block even though 40 was freed more recently.
        let c = heap.allocate(24).unwrap();
        assert_eq!(c, b);
        assert!(heap.is_balanced());
    }

    #[test]
    fn tree_stays_balanced_under_ascending_frees() {
        let mut heap = heap();
        let ptrs: Vec<_> = (1..=64).map(|i| heap.allocate(i * 8).unwrap()).collect();
        for ptr in ptrs {
            unsafe {
                heap.release(ptr);
            }
            assert!(heap.is_balanced());
        }
        // All 64 blocks are back, plus any residual page surplus.
        assert!(heap.free_block_sizes().len() >= 64);
    }

    #[test]
    fn tree_stays_balanced_under_random_churn() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut heap = heap();
        let mut live = Vec::new();
        for _ in 0..2000 {
            if live.is_empty() || rng.random::<f64>() < 0.6 {
                let size = rng.random_range(1..=500) * 8;
                let ptr = heap.allocate(size).unwrap();
                live.push(ptr);
            } else {
                let idx = rng.random_range(0..live.len());
                let ptr = live.swap_remove(idx);
                unsafe {
                    heap.release(ptr);
                }
            }
            assert!(heap.is_balanced());
        }
    }

    #[test]
    fn duplicate_sizes_are_distinct_nodes() {
        let mut heap = heap();
        let ptrs: Vec<_> = (0..8).map(|_| heap.allocate(64).unwrap()).collect();
        for &ptr in &ptrs {
            unsafe {
                heap.release(ptr);
            }
        }
        let sizes = heap.free_block_sizes();
        assert_eq!(sizes.iter().filter(|&&s| s == 64).count(), 8);
        assert!(heap.is_balanced());

        // Every duplicate must be individually reclaimable.
        for _ in 0..8 {
            heap.allocate(64).unwrap();
            assert!(heap.is_balanced());
        }
        assert_eq!(heap.free_block_sizes().iter().filter(|&&s| s == 64).count(), 0);
    }

    #[test]
    fn round_trip_reuse_needs_no_new_page() {
        let mut heap = heap();
        let a = heap.allocate(128).unwrap();
        let mapped = heap.page_stats().mapped_bytes;
        unsafe {
            heap.release(a);
        }
        let b = heap.allocate(64).unwrap();
        assert_eq!(heap.page_stats().mapped_bytes, mapped);
        assert_eq!(b, a);
    }

    #[test]
    fn in_order_walk_is_sorted() {
        let mut heap = heap();
        let ptrs: Vec<_> = [256usize, 8, 1024, 64, 512, 16, 128]
            .iter()
            .map(|&s| heap.allocate(s).unwrap())
            .collect();
        for ptr in ptrs {
            unsafe {
                heap.release(ptr);
            }
        }
        let sizes = heap.free_block_sizes();
        assert!(sizes.windows(2).all(|w| w[0] <= w[1]));
    }
}
