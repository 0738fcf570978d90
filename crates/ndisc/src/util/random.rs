//! Bounded random delays.

use std::time::Duration;

use rand::Rng;

/// A delay drawn uniformly from `[0, max]`.
pub fn random_delay<R: Rng + ?Sized>(rng: &mut R, max: Duration) -> Duration {
    if max.is_zero() {
        return Duration::ZERO;
    }
    rng.gen_range(Duration::ZERO..=max)
}
