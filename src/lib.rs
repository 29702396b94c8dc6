//! Pluggable heap-allocator playground with a reproducible workload harness.
//!
//! The crate implements two placement strategies over a shared block layout:
//!
//! - [`FirstFitAllocator`]: a singly linked free list scanned front to back,
//!   most recently freed block first.
//! - [`BestFitAllocator`]: an AVL tree of free blocks keyed by size, picking
//!   the smallest sufficient block.
//!
//! Both draw memory from a [`page::PageProvider`] (anonymous `mmap` in
//! production) and store their bookkeeping inline, in a header immediately
//! before each payload, so the free collections cost no memory beyond the
//! blocks themselves.
//!
//! The [`harness`] module replays a synthetic workload of bursty, mostly
//! short-lived allocations against any [`Strategy`] and reports throughput
//! and memory utilization, which is how the strategies are compared.
//!
//! # Example
//!
//! ```no_run
//! use heapfit::harness::{ChallengeConfig, run_challenge};
//! use heapfit::{AllocationStrategy, MemoryResult};
//!
//! fn main() -> MemoryResult<()> {
//!     let mut heap = AllocationStrategy::BestFit.instantiate(None);
//!     let stats = run_challenge(heap.as_mut(), &ChallengeConfig::new(16, 128), None)?;
//!     println!("utilization: {:.1}%", stats.utilization_percent());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::undocumented_unsafe_blocks)]

#[cfg(not(target_pointer_width = "64"))]
compile_error!("heapfit assumes 64-bit pointers for its inline block headers");

pub mod allocator;
mod block;
pub mod core;
pub mod error;
pub mod harness;
pub mod page;
pub mod trace;

pub use allocator::{BestFitAllocator, FirstFitAllocator, Strategy};
pub use crate::core::AllocationStrategy;
pub use error::{MemoryError, MemoryResult};
