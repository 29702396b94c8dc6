//! Workload objects and the synthetic size/lifetime distributions.
//!
//! Sizes and lifetimes follow a clipped exponential: draw `τ = −λ·ln(U)`
//! with `λ = 1`, cap it at a fixed threshold, then rescale linearly into
//! the target range. Sizes are additionally floored to multiples of
//! [`MIN_ALIGN`]. Small values are common, large ones rare, which is what
//! real allocation mixes look like.

use core::ptr::NonNull;

use rand::Rng;

use crate::core::MIN_ALIGN;
use crate::error::{MemoryError, MemoryResult};

const LAMBDA: f64 = 1.0;
const THRESHOLD: f64 = 6.0;

fn clipped_exponential(rng: &mut impl Rng) -> f64 {
    let u: f64 = rng.random();
    // u may be exactly 0, making tau infinite; the cap absorbs that.
    let tau = -LAMBDA * u.ln();
    tau.min(THRESHOLD)
}

/// Draws an object size in `[min_size, max_size]`, always a multiple of
/// [`MIN_ALIGN`]. `min_size` must itself be a multiple of [`MIN_ALIGN`].
pub fn object_size(rng: &mut impl Rng, min_size: usize, max_size: usize) -> usize {
    debug_assert!(min_size <= max_size);
    debug_assert!(min_size % MIN_ALIGN == 0);
    let tau = clipped_exponential(rng);
    let size = ((max_size - min_size) as f64 * tau / THRESHOLD) as usize + min_size;
    let size = size / MIN_ALIGN * MIN_ALIGN;
    debug_assert!((min_size..=max_size).contains(&size));
    size
}

/// Draws an object lifetime in epochs, in `[min_epochs, max_epochs]`.
pub fn object_lifetime(rng: &mut impl Rng, min_epochs: usize, max_epochs: usize) -> usize {
    debug_assert!(min_epochs <= max_epochs);
    let tau = clipped_exponential(rng);
    let lifetime = ((max_epochs - min_epochs) as f64 * tau / THRESHOLD + min_epochs as f64) as usize;
    debug_assert!((min_epochs..=max_epochs).contains(&lifetime));
    lifetime
}

/// Rotating non-zero content tag. Zero is skipped because it is
/// indistinguishable from fresh zero-filled mapped memory.
#[derive(Debug, Default)]
pub(crate) struct TagCycle(u8);

impl TagCycle {
    pub(crate) fn next(&mut self) -> u8 {
        self.0 = self.0.wrapping_add(1);
        if self.0 == 0 {
            self.0 = 1;
        }
        self.0
    }
}

/// A live allocation tracked by the harness: payload pointer, size and the
/// tag byte its content was stamped with.
///
/// Holding a `WorkloadObject` asserts that the payload is live and owned by
/// the harness; it is constructed only through [`stamp`](Self::stamp).
#[derive(Debug)]
pub struct WorkloadObject {
    ptr: NonNull<u8>,
    size: usize,
    tag: u8,
}

impl WorkloadObject {
    /// Fills the payload with `tag` and starts tracking it.
    ///
    /// # Safety
    /// `ptr` must be valid for writes of `size` bytes and stay valid (and
    /// unaliased by other live objects) until the object is verified and
    /// released.
    pub unsafe fn stamp(ptr: NonNull<u8>, size: usize, tag: u8) -> Self {
        debug_assert!(size > 0);
        debug_assert!(tag != 0);
        // SAFETY: ptr is valid for `size` writes per the caller contract.
        unsafe {
            core::ptr::write_bytes(ptr.as_ptr(), tag, size);
        }
        Self { ptr, size, tag }
    }

    /// Checks the first and last payload byte against the stamp. A mismatch
    /// means the allocator let another allocation overlap this one; the
    /// object must not be released back into the free collection.
    pub fn verify(&self) -> MemoryResult<()> {
        // SAFETY: the struct invariant keeps ptr valid for `size` reads.
        let (first, last) = unsafe {
            (
                *self.ptr.as_ptr(),
                *self.ptr.as_ptr().add(self.size - 1),
            )
        };
        if first != self.tag {
            return Err(MemoryError::Corruption {
                address: self.ptr.as_ptr() as usize,
                expected: self.tag,
                found: first,
            });
        }
        if last != self.tag {
            return Err(MemoryError::Corruption {
                address: self.ptr.as_ptr() as usize + self.size - 1,
                expected: self.tag,
                found: last,
            });
        }
        Ok(())
    }

    /// Payload pointer.
    #[must_use]
    pub fn ptr(&self) -> NonNull<u8> {
        self.ptr
    }

    /// Payload size in bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Assigned tag byte.
    #[must_use]
    pub fn tag(&self) -> u8 {
        self.tag
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng as _;
    use rand::rngs::StdRng;

    use super::*;

    #[test]
    fn sizes_stay_in_range_and_aligned() {
        let mut rng = StdRng::seed_from_u64(42);
        for &(min, max) in &[(128, 128), (16, 16), (16, 128), (256, 4000), (8, 4000)] {
            for _ in 0..10_000 {
                let size = object_size(&mut rng, min, max);
                assert!((min..=max).contains(&size));
                assert_eq!(size % MIN_ALIGN, 0);
            }
        }
    }

    #[test]
    fn small_sizes_dominate_the_distribution() {
        let mut rng = StdRng::seed_from_u64(42);
        let draws: Vec<usize> = (0..10_000).map(|_| object_size(&mut rng, 8, 4000)).collect();
        let below_mid = draws.iter().filter(|&&s| s < 2000).count();
        // Exponential shape: far more than half of the draws land low.
        assert!(below_mid > 8000);
    }

    #[test]
    fn lifetimes_stay_in_range() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..10_000 {
            let lifetime = object_lifetime(&mut rng, 1, 100);
            assert!((1..=100).contains(&lifetime));
        }
    }

    #[test]
    fn tag_cycle_skips_zero() {
        let mut tags = TagCycle::default();
        let mut seen_wrap = false;
        let mut prev = 0u8;
        for _ in 0..600 {
            let tag = tags.next();
            assert_ne!(tag, 0);
            if tag < prev {
                seen_wrap = true;
            }
            prev = tag;
        }
        assert!(seen_wrap);
    }

    #[test]
    fn stamp_and_verify_round_trip() {
        let mut buf = [0u8; 64];
        let ptr = NonNull::new(buf.as_mut_ptr()).unwrap();
        let object = unsafe { WorkloadObject::stamp(ptr, 64, 0x5C) };
        assert!(object.verify().is_ok());
    }

    #[test]
    fn verify_detects_boundary_corruption() {
        let mut buf = [0u8; 64];
        let ptr = NonNull::new(buf.as_mut_ptr()).unwrap();
        let object = unsafe { WorkloadObject::stamp(ptr, 64, 0x5C) };
        unsafe {
            *ptr.as_ptr().add(63) = 0x00;
        }
        let err = object.verify().unwrap_err();
        assert!(matches!(err, MemoryError::Corruption { expected: 0x5C, found: 0x00, .. }));
    }
}
