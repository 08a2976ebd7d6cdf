//! Backoff policies for delivery retries.
//!
//! Retries here are bounded and synchronous to a single notification call:
//! the sender walks a [`RetrySchedule`] between attempts to one
//! subscription. Emitted delays never decrease across attempts, jitter is
//! additive-only, and the attempt budget is enforced by the sender, never
//! by the schedule.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Strategy for calculating backoff delays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackoffStrategy {
    /// Same base delay before every retry.
    Fixed,
    /// Delay doubles each attempt up to the cap.
    Exponential,
}

/// Retry backoff configuration.
///
/// Defines the delay between attempts to a single subscription. The
/// attempt budget itself comes from the subscription's `retry_count` (or
/// the deployment default), not from the policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Base delay for the backoff calculation.
    pub base_delay: Duration,

    /// Upper bound on any computed delay.
    pub max_delay: Duration,

    /// Additive jitter fraction (0.0 to 1.0) applied on top of the
    /// computed delay.
    pub jitter_factor: f64,

    /// Strategy for growing the delay across attempts.
    pub backoff: BackoffStrategy,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            jitter_factor: 0.25,
            backoff: BackoffStrategy::Exponential,
        }
    }
}

impl RetryPolicy {
    /// Creates a fixed-delay policy without jitter.
    pub fn fixed(delay: Duration) -> Self {
        Self { base_delay: delay, max_delay: delay, jitter_factor: 0.0, backoff: BackoffStrategy::Fixed }
    }

    /// Starts a fresh delay schedule for one subscription's attempts.
    pub fn schedule(&self) -> RetrySchedule {
        RetrySchedule { policy: self.clone(), attempt: 0, last: Duration::ZERO }
    }
}

/// Stateful delay sequence for one subscription's retry loop.
///
/// Tracks the previously emitted delay so the sequence never decreases,
/// even with jitter or a `Retry-After` hint in play.
#[derive(Debug, Clone)]
pub struct RetrySchedule {
    policy: RetryPolicy,
    attempt: u32,
    last: Duration,
}

impl RetrySchedule {
    /// Returns the delay to wait before the next attempt.
    ///
    /// `retry_after` is an optional server-provided hint (e.g. a
    /// `Retry-After` header on a 503); it only ever lengthens the delay.
    pub fn next_delay(&mut self, retry_after: Option<Duration>) -> Duration {
        self.attempt += 1;

        let raw = match self.policy.backoff {
            BackoffStrategy::Fixed => self.policy.base_delay,
            BackoffStrategy::Exponential => {
                let exponent = self.attempt.saturating_sub(1).min(20);
                let multiplier = 2_u32.saturating_pow(exponent);
                self.policy.base_delay.saturating_mul(multiplier)
            },
        };

        let capped = raw.min(self.policy.max_delay);
        let mut delay = apply_jitter(capped, self.policy.jitter_factor).min(self.policy.max_delay);

        // Non-decreasing across attempts, hint only lengthens.
        delay = delay.max(self.last);
        if let Some(hint) = retry_after {
            delay = delay.max(hint);
        }

        self.last = delay;
        delay
    }

    /// Number of delays emitted so far.
    pub fn attempts(&self) -> u32 {
        self.attempt
    }
}

/// Adds upward-only jitter to spread retries across subscribers.
///
/// With `jitter_factor = 0.25`, a 10s delay becomes 10s to 12.5s randomly.
fn apply_jitter(duration: Duration, jitter_factor: f64) -> Duration {
    if jitter_factor <= 0.0 {
        return duration;
    }

    let clamped = jitter_factor.clamp(0.0, 1.0);
    let mut rng = rand::rng();
    let extra = rng.random_range(0.0..=duration.as_secs_f64() * clamped);

    duration + Duration::from_secs_f64(extra)
}
