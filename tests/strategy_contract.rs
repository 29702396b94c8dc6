//! Cross-strategy contract tests: placement, growth accounting and request
//! validation behave the same way through the public API, while the two
//! placement policies diverge exactly where their search order differs.

use heapfit::core::PAGE_SIZE;
use heapfit::page::MmapProvider;
use heapfit::{AllocationStrategy, BestFitAllocator, FirstFitAllocator, MemoryError, Strategy};

fn live_allocation_ranges(strategy: &mut dyn Strategy) -> Vec<(usize, usize)> {
    let sizes = [8, 24, 64, 120, 256, 1000, 2048, 4000];
    let mut ranges = Vec::new();
    for round in 0..25 {
        for &size in &sizes {
            let ptr = strategy
                .allocate(size)
                .unwrap_or_else(|err| panic!("round {round}: {err}"));
            ranges.push((ptr.as_ptr() as usize, size));
        }
    }
    ranges
}

fn assert_disjoint(mut ranges: Vec<(usize, usize)>) {
    ranges.sort_unstable();
    for pair in ranges.windows(2) {
        let (start, size) = pair[0];
        let (next, _) = pair[1];
        assert!(
            start + size <= next,
            "payloads overlap: {start:#x}+{size} runs into {next:#x}"
        );
    }
}

#[test]
fn first_fit_live_payloads_never_overlap() {
    let mut heap = FirstFitAllocator::new(MmapProvider::new());
    heap.initialize();
    assert_disjoint(live_allocation_ranges(&mut heap));
}

#[test]
fn best_fit_live_payloads_never_overlap() {
    let mut heap = BestFitAllocator::new(MmapProvider::new());
    heap.initialize();
    assert_disjoint(live_allocation_ranges(&mut heap));
    assert!(heap.is_balanced());
}

#[test]
fn freed_block_is_reused_without_growing() {
    for strategy in AllocationStrategy::ALL {
        let mut heap = strategy.instantiate(None);
        heap.initialize();
        let first = heap.allocate(256).unwrap();
        let mapped_before = heap.page_stats().mapped_bytes;

        // SAFETY: `first` is live and released exactly once.
        unsafe {
            heap.release(first);
        }
        let again = heap.allocate(256).unwrap();

        assert_eq!(again, first, "{strategy}: exact-fit block not reused");
        assert_eq!(
            heap.page_stats().mapped_bytes,
            mapped_before,
            "{strategy}: reuse should not map new pages"
        );
    }
}

/// With free blocks of 40 then 24 payload bytes (in search order), a request
/// for 24 bytes is placed differently: first fit stops at the 40-byte block
/// because it was freed last, best fit walks past it to the tighter 24-byte
/// block.
#[test]
fn placement_policies_diverge_on_loose_fits() {
    fn run(strategy: AllocationStrategy) -> (usize, usize) {
        let mut heap = strategy.instantiate(None);
        heap.initialize();
        let tight = heap.allocate(24).unwrap();
        let loose = heap.allocate(40).unwrap();
        // SAFETY: both pointers are live and released exactly once.
        unsafe {
            heap.release(tight);
            heap.release(loose);
        }
        let placed = heap.allocate(24).unwrap();
        (placed.as_ptr() as usize, tight.as_ptr() as usize)
    }

    let (first_fit_placed, first_fit_tight) = run(AllocationStrategy::FirstFit);
    assert_ne!(first_fit_placed, first_fit_tight);

    let (best_fit_placed, best_fit_tight) = run(AllocationStrategy::BestFit);
    assert_eq!(best_fit_placed, best_fit_tight);
}

#[test]
fn growth_maps_whole_pages_and_never_unmaps() {
    for strategy in AllocationStrategy::ALL {
        let mut heap = strategy.instantiate(None);
        heap.initialize();
        for _ in 0..8 {
            heap.allocate(4000).unwrap();
        }
        let stats = heap.page_stats();
        assert!(stats.mapped_bytes >= 8 * PAGE_SIZE);
        assert_eq!(stats.mapped_bytes % PAGE_SIZE, 0);
        assert_eq!(stats.unmapped_bytes, 0);
        heap.finalize();
    }
}

#[test]
fn request_validation_is_strategy_independent() {
    for strategy in AllocationStrategy::ALL {
        let mut heap = strategy.instantiate(None);
        heap.initialize();
        assert!(matches!(
            heap.allocate(0),
            Err(MemoryError::InvalidRequest { size: 0 })
        ));
        assert!(matches!(
            heap.allocate(20),
            Err(MemoryError::InvalidRequest { size: 20 })
        ));
        assert!(matches!(
            heap.allocate(4096),
            Err(MemoryError::ExceedsMaxSize { size: 4096, .. })
        ));
        assert!(heap.allocate(8).is_ok());
        assert!(heap.allocate(4000).is_ok());
    }
}
