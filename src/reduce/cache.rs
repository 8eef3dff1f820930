use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};

use crate::factor::FactorError;
use crate::reduce::core::{Reduction, reduce_with_cache};

/// Memoization table for reduction results over a fixed inclusive range.
///
/// One atomic slot per value, packing `(prime << 32) | steps`. Valid
/// entries always have `steps >= 1`, so a packed word is never zero and
/// zero marks a vacant slot. A slot is a single word: a load observes
/// either vacant or a complete pair, never a torn entry, which is all the
/// synchronization concurrent population needs. Writes are idempotent —
/// recomputing a key always packs the same word.
pub struct ReductionCache {
    lo: u32,
    slots: Box<[AtomicU64]>,
}

impl ReductionCache {
    /// Allocate vacant slots for every value in `[lo, hi]`.
    pub fn new(lo: u32, hi: u32) -> Self {
        assert!(lo >= 2, "reduction is defined for values >= 2");
        assert!(lo <= hi);
        let len = (hi - lo) as usize + 1;
        let mut slots = Vec::with_capacity(len);
        slots.resize_with(len, || AtomicU64::new(0));
        ReductionCache {
            lo,
            slots: slots.into_boxed_slice(),
        }
    }

    /// Inclusive bounds of the covered range.
    pub fn bounds(&self) -> (u32, u32) {
        (self.lo, self.lo + (self.slots.len() - 1) as u32)
    }

    /// Previously stored result for `n`, if `n` is in range and populated.
    #[inline]
    pub fn lookup(&self, n: u32) -> Option<Reduction> {
        let slot = self.slot(n)?;
        match slot.load(Ordering::Relaxed) {
            0 => None,
            packed => Some(Reduction {
                prime: (packed >> 32) as u32,
                steps: packed as u32,
            }),
        }
    }

    /// Publish a result for `n`. Out-of-range values are ignored.
    #[inline]
    pub fn insert(&self, n: u32, r: Reduction) {
        debug_assert!(r.steps >= 1);
        if let Some(slot) = self.slot(n) {
            slot.store((r.prime as u64) << 32 | r.steps as u64, Ordering::Relaxed);
        }
    }

    /// Populate every slot in ascending order by running the driver against
    /// this cache, so later values short-circuit through earlier entries.
    /// Safe to run while other threads are reading.
    pub fn precompute(&self) -> Result<(), FactorError> {
        let (lo, hi) = self.bounds();
        for n in lo..=hi {
            // 4 is its own prime-factor sum and never reduces; its slot
            // stays vacant.
            if n == 4 {
                continue;
            }
            let r = reduce_with_cache(n, self)?;
            self.insert(n, r);
        }
        Ok(())
    }

    #[inline]
    fn slot(&self, n: u32) -> Option<&AtomicU64> {
        let idx = n.checked_sub(self.lo)? as usize;
        self.slots.get(idx)
    }
}

/// Run the cache's population on a background thread. Fire-and-forget:
/// queries tolerate misses, so nothing needs to wait on the handle; joining
/// it merely bounds the thread's lifetime.
pub fn spawn_precompute(cache: Arc<ReductionCache>) -> JoinHandle<Result<(), FactorError>> {
    thread::spawn(move || cache.precompute())
}
