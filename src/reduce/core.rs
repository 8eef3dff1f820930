use crate::factor::{FactorError, Rng, prime_factors_with_rng};
use crate::prime::is_prime;
use crate::reduce::cache::ReductionCache;

/// Terminal prime and the number of sum-of-prime-factors applications that
/// reached it. An already-prime input costs one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reduction {
    pub prime: u32,
    pub steps: u32,
}

const DRIVER_SEED: u64 = 0xd1b5_4a32_d192_ed03;

/// Reduce `n` by repeatedly replacing it with the sum of its prime factors
/// until the value is prime. Inputs below 2 surface the factor layer's
/// invalid-input error; callers are expected to validate first.
///
/// `n` must not be 4: 4 is its own prime-factor sum (2 + 2), the unique
/// fixed point of the iteration, which is why the input protocol uses it
/// as the end-of-input sentinel. No chain passes through 4 from above —
/// {2, 2} is the only prime multiset summing to 4 — so excluding it as an
/// input excludes it entirely.
pub fn reduce(n: u32) -> Result<Reduction, FactorError> {
    debug_assert!(n != 4, "4 reduces to itself and never reaches a prime");
    reduce_inner(n, None)
}

/// Like [`reduce`], consulting `cache` before each factorization. A hit
/// short-circuits the remaining iteration: the cached entry already counts
/// the step that produced the current value, so only `steps - 1` is added.
pub fn reduce_with_cache(n: u32, cache: &ReductionCache) -> Result<Reduction, FactorError> {
    debug_assert!(n != 4, "4 reduces to itself and never reaches a prime");
    reduce_inner(n, Some(cache))
}

fn reduce_inner(n: u32, cache: Option<&ReductionCache>) -> Result<Reduction, FactorError> {
    let mut rng = Rng::new(DRIVER_SEED ^ n as u64);
    let mut current = n;
    let mut steps: u32 = 1;

    while !is_prime(current) {
        if let Some(hit) = cache.and_then(|c| c.lookup(current)) {
            return Ok(Reduction {
                prime: hit.prime,
                steps: steps + hit.steps - 1,
            });
        }
        let factors = prime_factors_with_rng(current, &mut rng)?;
        // For a composite with factors a, b >= 2, a + b <= a * b, so the
        // sum never exceeds the value being replaced; no overflow possible.
        current = factors.iter().sum();
        steps += 1;
    }

    Ok(Reduction {
        prime: current,
        steps,
    })
}
