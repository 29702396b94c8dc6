//! Core types and constants shared by every allocator strategy.

pub mod types;

pub use types::{AllocationStrategy, MAX_REQUEST, MIN_ALIGN, MIN_REQUEST, PAGE_SIZE, align_up};
