//! Core types the coordinator routes on.
//!
//! Everything here is what a transport decoder hands the coordinator once a
//! frame has been pulled off the wire: who sent it, which logical service it
//! belongs to, and what kind of message it is. The actual byte encoding is
//! the transport layer's problem, not ours.

use serde::{Deserialize, Serialize};

use std::fmt;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A stable, unique identifier for a player.
///
/// Newtype over `u64` so a `PlayerId` can never be confused with a
/// [`WorkerId`] or [`SessionId`] in a signature, even though all three are
/// plain integers underneath.
///
/// `#[serde(transparent)]` makes this serialize as the bare number, so
/// `PlayerId(42)` is just `42` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub u64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{}", self.0)
    }
}

/// A unique identifier for a worker instance.
///
/// A worker is an independently running simulation host that owns a subset
/// of the currently connected players. The coordinator only ever refers to
/// workers by id — it never reaches into worker internals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkerId(pub u64);

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "W-{}", self.0)
    }
}

/// The auth/session id minted by the session registry when credentials are
/// verified. Distinct from [`PlayerId`]: a player keeps their id across
/// logins, but every login gets a fresh session id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// SubChannel
// ---------------------------------------------------------------------------

/// A logical multiplexing tag carried alongside every message.
///
/// A single physical connection carries traffic for several logical
/// services; the sub-channel says which one a frame belongs to. The
/// coordinator owns the `PlayerManager` channel — it is the "reserved
/// sub-channel" that login acknowledgements, time-sync pushes, and
/// broadcasts go out on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum SubChannel {
    /// Player lifecycle, timing, and routed game traffic.
    /// The session's reserved channel.
    PlayerManager,

    /// The chat subsystem. Tagged here so frames can be attributed, but
    /// chat itself is handled outside the coordinator.
    Chat,

    /// Server-initiated announcements. Strictly server → client; a client
    /// frame tagged with this channel is a protocol violation.
    Announce,
}

impl SubChannel {
    /// Whether clients are allowed to send on this channel.
    ///
    /// The router rejects any inbound frame on a channel where this is
    /// `false` — that is fatal for the connection, not a transient error.
    pub fn is_client_inbound(&self) -> bool {
        matches!(self, Self::PlayerManager | Self::Chat)
    }
}

impl fmt::Display for SubChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PlayerManager => write!(f, "PlayerManager"),
            Self::Chat => write!(f, "Chat"),
            Self::Announce => write!(f, "Announce"),
        }
    }
}

// ---------------------------------------------------------------------------
// GamePayload
// ---------------------------------------------------------------------------

/// An opaque game message destined for the sender's worker instance.
///
/// The coordinator never interprets these — `kind` and `data` are only
/// meaningful to the simulation running inside the worker. They are carried
/// through verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GamePayload {
    /// Game-defined message kind discriminator.
    pub kind: u16,
    /// Game-defined body, already decoded from the wire by the transport.
    pub data: Vec<u8>,
}

// ---------------------------------------------------------------------------
// ClientMessage
// ---------------------------------------------------------------------------

/// A decoded message from a client.
///
/// The router classifies on this enum: the first four variants are answered
/// directly by the coordinator, everything in `Game` is forwarded to the
/// sender's current worker.
///
/// `#[serde(tag = "type")]` produces internally tagged JSON, e.g.
/// `{ "type": "Ping", "client_sent_ms": 123 }`, which is what the client
/// SDK emits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// "What time is it?" — answered with a [`ServerMessage::SyncTime`]
    /// push so the client can estimate clock offset.
    SyncTime { client_sent_ms: u64 },

    /// Keep-alive with timing. Answered with [`ServerMessage::Pong`]
    /// echoing client-sent, server-received, and server-sent timestamps
    /// so the client can compute round-trip latency.
    Ping { client_sent_ms: u64 },

    /// Client-side frame-rate report. Diagnostics only; logged and
    /// otherwise ignored.
    FrameRate { fps: u32 },

    /// Session bootstrap: "my loading screen is done, let me in."
    /// Completes login bookkeeping and triggers the LoggedIn
    /// acknowledgement followed by an initial time-sync push.
    ReadyToJoin,

    /// Anything the simulation understands. Opaque to the coordinator,
    /// routed to the sender's worker instance.
    Game(GamePayload),
}

// ---------------------------------------------------------------------------
// ServerMessage
// ---------------------------------------------------------------------------

/// A message from the coordinator to a client, delivered on the session's
/// reserved sub-channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// Time-sync push. Sent as the reply to [`ClientMessage::SyncTime`]
    /// and once right after login.
    SyncTime { server_sent_ms: u64 },

    /// Reply to [`ClientMessage::Ping`]. All three timestamps are carried
    /// unmodified (milliseconds) so the client does the RTT math:
    /// `rtt = now - client_sent_ms`.
    Pong {
        client_sent_ms: u64,
        server_received_ms: u64,
        server_sent_ms: u64,
    },

    /// Login acknowledgement, sent before the initial time-sync push.
    LoggedIn {
        player_id: PlayerId,
        session_id: SessionId,
    },

    /// The server is closing this session (duplicate login elsewhere,
    /// admission timeout, shutdown). Informational — the close follows
    /// whether or not this frame is delivered.
    Kicked { reason: String },

    /// A broadcast notice delivered to every live session.
    Notice { text: String },
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! JSON-shape tests. The client SDK depends on these exact shapes,
    //! so a serde attribute change that alters them must fail here.

    use super::*;

    // =====================================================================
    // Identity types
    // =====================================================================

    #[test]
    fn test_player_id_serializes_as_plain_number() {
        // `#[serde(transparent)]` means PlayerId(42) → `42`, not `{"0":42}`.
        let json = serde_json::to_string(&PlayerId(42)).unwrap();
        assert_eq!(json, "42");
    }

    #[test]
    fn test_player_id_display() {
        assert_eq!(PlayerId(7).to_string(), "P-7");
    }

    #[test]
    fn test_worker_id_display() {
        assert_eq!(WorkerId(3).to_string(), "W-3");
    }

    #[test]
    fn test_session_id_display() {
        assert_eq!(SessionId(9).to_string(), "S-9");
    }

    // =====================================================================
    // SubChannel
    // =====================================================================

    #[test]
    fn test_sub_channel_client_inbound_classification() {
        assert!(SubChannel::PlayerManager.is_client_inbound());
        assert!(SubChannel::Chat.is_client_inbound());
        assert!(!SubChannel::Announce.is_client_inbound());
    }

    #[test]
    fn test_sub_channel_serializes_as_pascal_case() {
        let json = serde_json::to_string(&SubChannel::PlayerManager).unwrap();
        assert_eq!(json, "\"PlayerManager\"");
    }

    // =====================================================================
    // ClientMessage
    // =====================================================================

    #[test]
    fn test_client_message_ping_json_format() {
        // Internally tagged: { "type": "Ping", "client_sent_ms": 5000 }.
        let msg = ClientMessage::Ping {
            client_sent_ms: 5000,
        };
        let json: serde_json::Value = serde_json::to_value(&msg).unwrap();

        assert_eq!(json["type"], "Ping");
        assert_eq!(json["client_sent_ms"], 5000);
    }

    #[test]
    fn test_client_message_ready_to_join_json_format() {
        let json: serde_json::Value =
            serde_json::to_value(&ClientMessage::ReadyToJoin).unwrap();
        assert_eq!(json["type"], "ReadyToJoin");
    }

    #[test]
    fn test_client_message_game_round_trip() {
        let msg = ClientMessage::Game(GamePayload {
            kind: 17,
            data: vec![1, 2, 3],
        });
        let bytes = serde_json::to_vec(&msg).unwrap();
        let decoded: ClientMessage = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(msg, decoded);
    }

    #[test]
    fn test_client_message_unknown_type_returns_error() {
        let unknown = r#"{"type": "Teleport", "x": 1}"#;
        let result: Result<ClientMessage, _> = serde_json::from_str(unknown);
        assert!(result.is_err());
    }

    // =====================================================================
    // ServerMessage
    // =====================================================================

    #[test]
    fn test_server_message_pong_json_format() {
        let msg = ServerMessage::Pong {
            client_sent_ms: 100,
            server_received_ms: 130,
            server_sent_ms: 131,
        };
        let json: serde_json::Value = serde_json::to_value(&msg).unwrap();

        assert_eq!(json["type"], "Pong");
        assert_eq!(json["client_sent_ms"], 100);
        assert_eq!(json["server_received_ms"], 130);
        assert_eq!(json["server_sent_ms"], 131);
    }

    #[test]
    fn test_server_message_logged_in_json_format() {
        let msg = ServerMessage::LoggedIn {
            player_id: PlayerId(42),
            session_id: SessionId(7),
        };
        let json: serde_json::Value = serde_json::to_value(&msg).unwrap();

        assert_eq!(json["type"], "LoggedIn");
        assert_eq!(json["player_id"], 42);
        assert_eq!(json["session_id"], 7);
    }

    #[test]
    fn test_server_message_kicked_round_trip() {
        let msg = ServerMessage::Kicked {
            reason: "duplicate login".into(),
        };
        let bytes = serde_json::to_vec(&msg).unwrap();
        let decoded: ServerMessage = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(msg, decoded);
    }
}
