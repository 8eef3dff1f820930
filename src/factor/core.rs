use crate::arith::{Barrett, gcd};
use crate::prime::is_prime;

use thiserror::Error;

/// Failures the factorization layer can surface. Everything above it
/// (the reduction driver, the cache) propagates these unchanged.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum FactorError {
    /// Contract violation by the caller: values below 2 have no prime
    /// factorization.
    #[error("cannot factor {0}: value is below 2")]
    InvalidInput(u32),

    /// Pollard's rho exhausted its restart budget without finding a
    /// nontrivial divisor of a composite. Should not happen for u32 inputs,
    /// but a hard error beats a silent infinite loop.
    #[error("no nontrivial divisor of {n} found within the restart budget")]
    RetriesExhausted { n: u32 },
}

/// Small seedable xorshift generator for the rho polynomial constant.
/// Injectable so tests (and callers wanting reproducible runs) control the
/// sequence; the default entry point seeds deterministically per input.
pub struct Rng {
    state: u64,
}

impl Rng {
    pub fn new(seed: u64) -> Self {
        Rng {
            state: if seed == 0 { 0x12345678_9abcdef0 } else { seed },
        }
    }

    fn next_u64(&mut self) -> u64 {
        // xorshift64* — state must stay nonzero, guaranteed by new().
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545f491_4f6cdd1d)
    }

    /// Uniform-ish value in `[lo, hi)`.
    fn next_range(&mut self, lo: u64, hi: u64) -> u64 {
        lo + self.next_u64() % (hi - lo)
    }
}

const DEFAULT_SEED: u64 = 0x9e3779b9_7f4a7c15;

// Restarts before giving up on a composite. Each restart draws a fresh
// polynomial constant; for u32 inputs a handful nearly always suffices.
const RHO_MAX_RESTARTS: u32 = 64;

/// Prime factors of `n` with multiplicity, sorted ascending.
/// The product of the returned factors reconstructs `n` exactly.
pub fn prime_factors(n: u32) -> Result<Vec<u32>, FactorError> {
    let mut rng = Rng::new(DEFAULT_SEED ^ n as u64);
    prime_factors_with_rng(n, &mut rng)
}

/// Like [`prime_factors`], with a caller-supplied generator for the rho
/// polynomial constants.
pub fn prime_factors_with_rng(n: u32, rng: &mut Rng) -> Result<Vec<u32>, FactorError> {
    if n < 2 {
        return Err(FactorError::InvalidInput(n));
    }
    let mut factors = Vec::new();
    collect_factors(n, rng, &mut factors)?;
    factors.sort_unstable();
    Ok(factors)
}

/// Recursive split: prime -> leaf, composite -> divisor and cofactor.
/// Depth is bounded by the factor count (< 32 for u32), so plain recursion
/// is safe.
fn collect_factors(n: u32, rng: &mut Rng, factors: &mut Vec<u32>) -> Result<(), FactorError> {
    if is_prime(n) {
        factors.push(n);
        return Ok(());
    }
    let d = pollard_rho(n, rng)?;
    collect_factors(d, rng, factors)?;
    collect_factors(n / d, rng, factors)
}

/// Pollard's rho with Floyd cycle detection: tortoise advances one step of
/// `f(x) = x^2 + c mod n`, hare two, candidate divisor `gcd(|x - y|, n)`.
/// When the sequence closes its cycle the gcd degenerates to `n`; restart
/// with a fresh constant. `n` must be composite and >= 4.
fn pollard_rho(n: u32, rng: &mut Rng) -> Result<u32, FactorError> {
    if n % 2 == 0 {
        return Ok(2);
    }

    let b = Barrett::new(n);
    for _ in 0..RHO_MAX_RESTARTS {
        let c = rng.next_range(1, 10) as u32;
        let mut x: u32 = 2;
        let mut y: u32 = 2;

        let d = loop {
            x = rho_step(&b, x, c);
            y = rho_step(&b, rho_step(&b, y, c), c);
            let g = gcd(x.abs_diff(y), n);
            if g != 1 {
                break g;
            }
        };

        if d != n {
            return Ok(d);
        }
    }
    Err(FactorError::RetriesExhausted { n })
}

/// `x^2 + c mod n`. The square is reduced first, so the sum stays below
/// `2n` and one conditional subtraction finishes the reduction.
#[inline]
fn rho_step(b: &Barrett, x: u32, c: u32) -> u32 {
    let n = b.modulus() as u64;
    let mut v = b.mul(x, x) as u64 + c as u64;
    if v >= n {
        v -= n;
    }
    v as u32
}
