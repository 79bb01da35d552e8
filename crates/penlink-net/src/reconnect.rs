use std::time::Duration;

use rand::Rng;

use penlink_shared::constants::{DEFAULT_RECONNECT_BASE_MS, DEFAULT_RECONNECT_JITTER_MS};

/// Delay before redialing after an unexpected close: `base` plus a uniform
/// jitter in `[0, jitter]`, so many clients dropped at once do not redial in
/// lockstep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub base: Duration,
    pub jitter: Duration,
}

impl ReconnectPolicy {
    pub fn new(base: Duration, jitter: Duration) -> Self {
        Self { base, jitter }
    }

    pub fn next_delay<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        let jitter_ms = self.jitter.as_millis() as u64;
        if jitter_ms == 0 {
            return self.base;
        }
        self.base + Duration::from_millis(rng.gen_range(0..=jitter_ms))
    }

    /// Inclusive `(min, max)` of [`Self::next_delay`].
    pub fn bounds(&self) -> (Duration, Duration) {
        (self.base, self.base + self.jitter)
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new(
            Duration::from_millis(DEFAULT_RECONNECT_BASE_MS),
            Duration::from_millis(DEFAULT_RECONNECT_JITTER_MS),
        )
    }
}
