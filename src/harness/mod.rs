//! Workload harness: drives a strategy through a full benchmark challenge.
//!
//! A challenge is a fixed number of cycles, each a fixed number of epochs
//! (time buckets). Every epoch allocates a burst of objects — a large burst
//! on the first epoch of a cycle to simulate a periodic peak, a steady burst
//! otherwise — and releases the objects whose lifetime expires in that
//! epoch. A small fixed fraction of objects is never released, modeling
//! long-lived or leaked allocations.
//!
//! The harness owns all bookkeeping; the strategy under test only sees the
//! `initialize`/`allocate`/`release`/`finalize` contract, bracketed exactly
//! once per challenge.

pub mod workload;

use std::time::{Duration, Instant};

use rand::{Rng as _, SeedableRng as _};
use rand::rngs::StdRng;
use tracing::debug;

use crate::allocator::Strategy;
use crate::error::MemoryResult;
use crate::trace::TraceHandle;
use workload::{TagCycle, WorkloadObject, object_lifetime, object_size};

/// Parameters of one benchmark challenge.
#[derive(Debug, Clone)]
pub struct ChallengeConfig {
    /// Smallest object size drawn, multiple of 8.
    pub min_size: usize,
    /// Largest object size drawn.
    pub max_size: usize,
    /// Number of cycles per challenge.
    pub cycles: usize,
    /// Number of epochs per cycle; also the maximum object lifetime.
    pub epochs_per_cycle: usize,
    /// Objects allocated in a steady epoch.
    pub objects_per_epoch: usize,
    /// Objects allocated in the peak (first) epoch of each cycle.
    pub objects_per_peak_epoch: usize,
    /// Probability that an object is never released.
    pub leak_probability: f64,
    /// RNG seed; challenges with equal configs replay identically.
    pub seed: u64,
}

impl ChallengeConfig {
    /// Full benchmark parameters for the given size range: 10 cycles of
    /// 100 epochs, 100 objects per steady epoch and 2000 per peak epoch,
    /// 4% of objects leaked.
    #[must_use]
    pub fn new(min_size: usize, max_size: usize) -> Self {
        Self {
            min_size,
            max_size,
            cycles: 10,
            epochs_per_cycle: 100,
            objects_per_epoch: 100,
            objects_per_peak_epoch: 2000,
            leak_probability: 0.04,
            seed: 12,
        }
    }

    /// Reduced parameters (10 epochs, 25/50 objects) for fast tests and
    /// trace runs, where full volume would swamp the output.
    #[must_use]
    pub fn smoke(min_size: usize, max_size: usize) -> Self {
        Self {
            epochs_per_cycle: 10,
            objects_per_epoch: 25,
            objects_per_peak_epoch: 50,
            ..Self::new(min_size, max_size)
        }
    }
}

impl Default for ChallengeConfig {
    fn default() -> Self {
        Self::new(16, 128)
    }
}

/// Byte and timing statistics accumulated over one challenge.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChallengeStats {
    /// Payload bytes handed out by the strategy.
    pub allocated_bytes: usize,
    /// Payload bytes released back to the strategy.
    pub freed_bytes: usize,
    /// Bytes the strategy mapped from the page provider.
    pub mapped_bytes: usize,
    /// Bytes the strategy unmapped (always 0 for the built-in strategies).
    pub unmapped_bytes: usize,
    /// Wall-clock duration of the challenge.
    pub elapsed: Duration,
}

impl ChallengeStats {
    /// Fraction of OS-mapped memory occupied by live allocations:
    /// `100 × (allocated − freed) / (mapped − unmapped)`.
    #[must_use]
    pub fn utilization_percent(&self) -> f64 {
        let live = self.allocated_bytes - self.freed_bytes;
        let mapped = self.mapped_bytes - self.unmapped_bytes;
        if mapped == 0 {
            return 0.0;
        }
        100.0 * live as f64 / mapped as f64
    }
}

/// Runs one challenge against `strategy`.
///
/// Brackets the strategy with `initialize`/`finalize`, drives every epoch,
/// verifies each object's boundary tags before releasing it, and returns
/// the accumulated statistics. Any error — tag corruption or a page
/// provider failure — terminates the challenge immediately; no partial
/// recovery is attempted.
pub fn run_challenge<S: Strategy + ?Sized>(
    strategy: &mut S,
    config: &ChallengeConfig,
    trace: Option<TraceHandle>,
) -> MemoryResult<ChallengeStats> {
    let epochs = config.epochs_per_cycle;
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut tags = TagCycle::default();
    let mut stats = ChallengeStats::default();

    // One bucket per epoch slot plus a final bucket for objects that are
    // never released.
    let mut buckets: Vec<Vec<WorkloadObject>> = (0..=epochs).map(|_| Vec::new()).collect();

    debug!(
        strategy = %strategy.kind(),
        min_size = config.min_size,
        max_size = config.max_size,
        "challenge start"
    );

    strategy.initialize();
    let begin = Instant::now();

    for _cycle in 0..config.cycles {
        for epoch in 0..epochs {
            let burst = if epoch == 0 {
                config.objects_per_peak_epoch
            } else {
                config.objects_per_epoch
            };

            for _ in 0..burst {
                let size = object_size(&mut rng, config.min_size, config.max_size);
                let lifetime = object_lifetime(&mut rng, 1, epochs);
                let ptr = strategy.allocate(size)?;
                stats.allocated_bytes += size;
                if let Some(trace) = &trace {
                    trace.borrow_mut().allocated(ptr.as_ptr() as usize, size);
                }

                // SAFETY: the strategy just handed out this payload and
                // guarantees it disjoint from every other live payload.
                let object = unsafe { WorkloadObject::stamp(ptr, size, tags.next()) };
                let bucket = if rng.random::<f64>() < config.leak_probability {
                    epochs // never released
                } else {
                    (epoch + lifetime) % epochs
                };
                buckets[bucket].push(object);
            }

            // Release everything scheduled for this epoch, including objects
            // allocated above whose lifetime wrapped to the current slot.
            for object in std::mem::take(&mut buckets[epoch]) {
                object.verify()?;
                stats.freed_bytes += object.size();
                if let Some(trace) = &trace {
                    trace
                        .borrow_mut()
                        .freed(object.ptr().as_ptr() as usize, object.size());
                }
                // SAFETY: the pointer came from this strategy's allocate and
                // is released exactly once; verify ran first.
                unsafe {
                    strategy.release(object.ptr());
                }
            }
        }
    }

    stats.elapsed = begin.elapsed();
    let pages = strategy.page_stats();
    stats.mapped_bytes = pages.mapped_bytes;
    stats.unmapped_bytes = pages.unmapped_bytes;
    strategy.finalize();

    debug!(
        strategy = %strategy.kind(),
        elapsed_ms = stats.elapsed.as_millis() as u64,
        utilization = stats.utilization_percent(),
        "challenge done"
    );
    Ok(stats)
}
