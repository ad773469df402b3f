//! Jitter strategies to prevent thundering herd.

use rand::Rng;
use std::time::Duration;

/// Jitter strategy for randomizing a delay or deadline.
#[derive(Debug, Clone)]
pub enum Jitter {
    /// No jitter - use the exact duration.
    None,
    /// Full jitter: random between 0 and the duration.
    Full,
    /// Equal jitter: random between duration/2 and duration.
    Equal,
    /// Decorrelated jitter: AWS-style with state.
    Decorrelated { base: Duration, max: Duration },
    /// Symmetric jitter: random within `± fraction` of the duration, e.g.
    /// `Symmetric(0.1)` on a 24h duration yields something in
    /// `[21.6h, 26.4h]`. Used for one-shot deadlines rather than retry
    /// delays, where a one-sided jitter would bias the result early or late.
    Symmetric(f64),
}

impl Jitter {
    /// Create a full jitter strategy
    pub fn full() -> Self {
        Jitter::Full
    }

    /// Create an equal jitter strategy
    pub fn equal() -> Self {
        Jitter::Equal
    }

    /// Create a decorrelated jitter strategy
    pub fn decorrelated(base: Duration, max: Duration) -> Self {
        Jitter::Decorrelated { base, max }
    }

    /// Create a symmetric jitter strategy with the given fraction.
    pub fn symmetric(fraction: f64) -> Self {
        Jitter::Symmetric(fraction)
    }

    /// Apply jitter to a duration
    pub fn apply(&self, delay: Duration) -> Duration {
        self.apply_with_rng(delay, &mut rand::rng())
    }

    /// Apply jitter with a custom RNG (for testing)
    pub fn apply_with_rng<R: Rng>(&self, delay: Duration, rng: &mut R) -> Duration {
        match self {
            Jitter::None => delay,
            Jitter::Full => {
                let millis = delay.as_millis() as u64;
                if millis == 0 {
                    return Duration::from_millis(0);
                }
                let jittered = rng.random_range(0..=millis);
                Duration::from_millis(jittered)
            }
            Jitter::Equal => {
                let millis = delay.as_millis() as u64;
                if millis == 0 {
                    return Duration::from_millis(0);
                }
                let half = millis / 2;
                let jittered = rng.random_range(half..=millis);
                Duration::from_millis(jittered)
            }
            Jitter::Decorrelated { base, max } => {
                // Decorrelated jitter: sleep = min(cap, random(base, sleep * 3))
                // For simplicity, we use the delay as previous sleep
                let base_millis = base.as_millis() as u64;
                let delay_millis = delay.as_millis() as u64;
                let max_millis = max.as_millis() as u64;

                let upper = delay_millis.saturating_mul(3);
                let range_max = upper.min(max_millis);

                if base_millis >= range_max {
                    return Duration::from_millis(base_millis);
                }

                let jittered = rng.random_range(base_millis..=range_max);
                Duration::from_millis(jittered)
            }
            Jitter::Symmetric(fraction) => {
                let millis = delay.as_millis() as f64;
                let spread = millis * fraction.abs();
                if spread == 0.0 {
                    return delay;
                }
                let offset = rng.random_range(-spread..=spread);
                Duration::from_millis((millis + offset).max(0.0) as u64)
            }
        }
    }
}
