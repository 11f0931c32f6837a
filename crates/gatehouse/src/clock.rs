//! The two clocks every inbound message is stamped with.
//!
//! Wall-clock time is what clients see and echo back (RTT math needs a
//! shared epoch). The game clock is monotonic milliseconds since the
//! coordinator started — immune to NTP steps, used for internal ordering.

use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch.
///
/// Falls back to 0 if the system clock reads before the epoch, which only
/// happens on badly misconfigured hosts; stamping 0 is preferable to
/// panicking in the message path.
pub fn wall_clock_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Monotonic milliseconds since this clock was created.
#[derive(Debug, Clone)]
pub struct GameClock {
    start: Instant,
}

impl GameClock {
    /// Starts the clock at zero.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Milliseconds elapsed since the clock started.
    pub fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

impl Default for GameClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_game_clock_is_monotonic() {
        let clock = GameClock::new();
        let a = clock.now_ms();
        let b = clock.now_ms();
        assert!(b >= a);
    }

    #[test]
    fn test_wall_clock_is_past_2020() {
        // Sanity: any host running the tests has a clock past 2020-01-01.
        assert!(wall_clock_ms() > 1_577_836_800_000);
    }
}
