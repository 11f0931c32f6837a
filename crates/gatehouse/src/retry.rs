//! The shared poll-burst/long-wait retry policy.
//!
//! Both lifecycle jobs wait on a condition owned by someone else: the
//! admission job on "the pending save cleared", the departure job on "the
//! worker released the player". Both use the same cascade — a burst of
//! short polls, then a longer wait, repeated for a bounded number of
//! attempts — parameterized here instead of hand-rolled twice.

use std::time::Duration;

/// Parameters for the poll-burst/long-wait cascade.
///
/// One attempt is `ticks_per_attempt` polls spaced `tick_interval` apart;
/// attempts are separated by `attempt_interval`. The total wait budget is
/// therefore bounded by
/// `attempts * ticks_per_attempt * tick_interval + (attempts - 1) * attempt_interval`.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Outer attempt budget. At least 1.
    pub attempts: u32,
    /// Short polls per attempt. At least 1.
    pub ticks_per_attempt: u32,
    /// Delay between short polls.
    pub tick_interval: Duration,
    /// Delay between attempts (the "long wait").
    pub attempt_interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            ticks_per_attempt: 10,
            tick_interval: Duration::from_millis(100),
            attempt_interval: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Clamps degenerate values so the cascade always makes progress.
    /// Zero attempts or zero ticks would mean "never poll at all", which
    /// no caller ever wants.
    pub fn validated(mut self) -> Self {
        if self.attempts == 0 {
            tracing::warn!("retry policy with 0 attempts — clamping to 1");
            self.attempts = 1;
        }
        if self.ticks_per_attempt == 0 {
            tracing::warn!("retry policy with 0 ticks per attempt — clamping to 1");
            self.ticks_per_attempt = 1;
        }
        self
    }

    /// Upper bound on how long the cascade can wait before giving up.
    pub fn max_wait(&self) -> Duration {
        let polls = self.tick_interval
            * self.ticks_per_attempt
            * self.attempts;
        let waits = self.attempt_interval * self.attempts.saturating_sub(1);
        polls + waits
    }

    /// A policy with short real-time intervals, for tests that exercise
    /// the cascade without slowing the suite down.
    pub fn fast() -> Self {
        Self {
            attempts: 3,
            ticks_per_attempt: 4,
            tick_interval: Duration::from_millis(10),
            attempt_interval: Duration::from_millis(40),
        }
    }
}
