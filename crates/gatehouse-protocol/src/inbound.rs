//! The inbound envelope: a decoded client message plus server receipt times.
//!
//! Receipt timestamps are attached the moment a frame enters the
//! coordinator, BEFORE any classification or routing happens. The
//! time-sync and ping handlers depend on this ordering: round-trip
//! latency is computed from client-sent vs. server-received vs.
//! server-sent, and a stamp taken after routing would fold queueing
//! delay into the wrong leg.

use serde::{Deserialize, Serialize};

use crate::{ClientMessage, SubChannel};

/// A client message as the router sees it: sub-channel tag, decoded
/// message, and the two server receipt clocks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inbound {
    /// Which logical service this frame was addressed to.
    pub channel: SubChannel,

    /// The decoded message.
    pub message: ClientMessage,

    /// Wall-clock receipt time, milliseconds since the Unix epoch.
    /// Echoed to clients for RTT math.
    pub received_wall_ms: u64,

    /// Monotonic game-clock receipt time, milliseconds since the
    /// coordinator started. Immune to wall-clock adjustments; used for
    /// internal ordering and diagnostics.
    pub received_game_ms: u64,
}

impl Inbound {
    /// Stamps a freshly decoded message with the given receipt clocks.
    pub fn stamp(
        channel: SubChannel,
        message: ClientMessage,
        received_wall_ms: u64,
        received_game_ms: u64,
    ) -> Self {
        Self {
            channel,
            message,
            received_wall_ms,
            received_game_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stamp_preserves_channel_and_message() {
        let inbound = Inbound::stamp(
            SubChannel::PlayerManager,
            ClientMessage::ReadyToJoin,
            1_000,
            50,
        );

        assert_eq!(inbound.channel, SubChannel::PlayerManager);
        assert_eq!(inbound.message, ClientMessage::ReadyToJoin);
        assert_eq!(inbound.received_wall_ms, 1_000);
        assert_eq!(inbound.received_game_ms, 50);
    }
}
