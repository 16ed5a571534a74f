// SPDX-License-Identifier: MIT
//! Jitter for retry delays.
//!
//! Retry delays double on each attempt (computed by the caller); this module
//! adds a random spread of up to half the current delay so that concurrent
//! pipelines backing off from the same incident do not retry in lockstep.

use std::time::Duration;

/// Add jitter to `delay`: the result lies in `[delay, delay * 1.5)`.
///
/// `seed` should vary per call (attempt counter xor a clock component) so the
/// spread differs between retries.
pub fn jittered(delay: Duration, seed: u64) -> Duration {
    let fraction = pseudo_rand(seed) * 0.5;
    delay + delay.mul_f64(fraction)
}

/// Produce a float in [0, 1) using a simple LCG step.
/// This avoids adding a `rand` dependency for a small jitter spread.
fn pseudo_rand(seed: u64) -> f64 {
    // LCG parameters (Numerical Recipes)
    const A: u64 = 1_664_525;
    const C: u64 = 1_013_904_223;
    const M: u64 = 1u64 << 32;
    let state = A.wrapping_mul(seed).wrapping_add(C) % M;
    state as f64 / M as f64
}

/// A seed that differs between calls made in quick succession.
pub fn jitter_seed(attempt: u32) -> u64 {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos() as u64)
        .unwrap_or(0);
    (attempt as u64) ^ nanos
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jitter_bounded_by_half_delay() {
        let delay = Duration::from_secs(4);
        for seed in 0..1000 {
            let j = jittered(delay, seed);
            assert!(j >= delay);
            assert!(j < delay + delay / 2 + Duration::from_millis(1));
        }
    }

    #[test]
    fn zero_delay_stays_zero() {
        assert_eq!(jittered(Duration::ZERO, 7), Duration::ZERO);
    }

    #[test]
    fn pseudo_rand_in_unit_interval() {
        for seed in 0..10_000 {
            let v = pseudo_rand(seed);
            assert!((0.0..1.0).contains(&v), "seed {seed} gave {v}");
        }
    }
}
