//! Per-credential refresh throttling.
//!
//! Uses a keyed GCRA limiter with a single cell per cooldown period, so at most
//! one refresh attempt per refresh credential is let through per window.

use std::num::NonZeroU32;
use std::time::Duration;

use governor::{Quota, RateLimiter, clock::DefaultClock, state::keyed::DefaultKeyedStateStore};

/// Keyed limiter over refresh credential values.
pub type CredentialLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

pub struct RefreshThrottle {
    limiter: CredentialLimiter,
    cooldown: Duration,
}

impl RefreshThrottle {
    pub fn new(cooldown: Duration) -> Self {
        // A zero cooldown has no period to replenish; treat it as unthrottled.
        let quota = Quota::with_period(cooldown)
            .unwrap_or_else(|| Quota::per_second(NonZeroU32::MAX));

        Self {
            limiter: RateLimiter::keyed(quota),
            cooldown,
        }
    }

    /// Returns true if `credential` had an attempt within the cooldown window.
    ///
    /// When it returns false the current attempt is recorded in the same step,
    /// so two concurrent callers cannot both be let through.
    pub fn should_throttle(&self, credential: &str) -> bool {
        self.limiter.check_key(&credential.to_string()).is_err()
    }

    /// Forget credentials whose cooldown has fully elapsed.
    pub fn retain_recent(&self) {
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();
    }

    /// Number of credentials currently tracked.
    pub fn len(&self) -> usize {
        self.limiter.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }
}
