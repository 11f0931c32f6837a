//! The coordinator's view of a live client connection.
//!
//! The transport layer owns the socket; what the coordinator holds is a
//! cheap-clone handle carrying the verified identity, a liveness flag, and
//! an outbound channel the transport drains onto the wire. Closing the
//! handle marks the connection dead — the admission job's per-tick
//! liveness checks and every send go through that flag.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use gatehouse_protocol::{PlayerId, ServerMessage, SessionId, SubChannel};
use tokio::sync::mpsc;

/// Counter for generating unique connection IDs.
static NEXT_CONN_ID: AtomicU64 = AtomicU64::new(1);

/// A verified identity, produced by the session registry when credentials
/// check out. A connection without one can never be admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    /// The stable player id.
    pub player_id: PlayerId,
    /// The session id minted for this particular login.
    pub session_id: SessionId,
}

/// One frame queued for delivery to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundFrame {
    /// The sub-channel the frame goes out on.
    pub channel: SubChannel,
    /// The message itself.
    pub message: ServerMessage,
}

struct ConnectionInner {
    conn_id: u64,
    identity: Option<Identity>,
    alive: AtomicBool,
    outbound: mpsc::UnboundedSender<OutboundFrame>,
}

/// Handle to a live client connection. Cheap to clone (Arc inner); all
/// clones observe the same liveness flag.
#[derive(Clone)]
pub struct ClientConnection {
    inner: Arc<ConnectionInner>,
}

impl ClientConnection {
    /// Creates a connection handle plus the receiving end of its outbound
    /// queue. The transport layer drains the receiver onto the wire;
    /// tests read it directly to observe what the coordinator sent.
    pub fn pair(
        identity: Option<Identity>,
    ) -> (Self, mpsc::UnboundedReceiver<OutboundFrame>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn = Self {
            inner: Arc::new(ConnectionInner {
                conn_id: NEXT_CONN_ID.fetch_add(1, Ordering::Relaxed),
                identity,
                alive: AtomicBool::new(true),
                outbound: tx,
            }),
        };
        (conn, rx)
    }

    /// The connection's unique id (distinct from any player identity —
    /// two logins by the same player are two connections).
    pub fn conn_id(&self) -> u64 {
        self.inner.conn_id
    }

    /// The verified identity, if authentication completed.
    pub fn identity(&self) -> Option<Identity> {
        self.inner.identity
    }

    /// Shorthand for the player id, if authenticated.
    pub fn player_id(&self) -> Option<PlayerId> {
        self.inner.identity.map(|i| i.player_id)
    }

    /// Whether the connection is still up. Flipped by [`close`](Self::close)
    /// and checked by the admission job on every poll tick.
    pub fn is_alive(&self) -> bool {
        self.inner.alive.load(Ordering::SeqCst)
    }

    /// Marks the connection dead. Idempotent. The transport notices the
    /// outbound queue closing and tears down the socket.
    pub fn close(&self) {
        if self.inner.alive.swap(false, Ordering::SeqCst) {
            tracing::debug!(conn_id = self.inner.conn_id, "connection closed");
        }
    }

    /// Queues a frame for the client. Best-effort: frames sent after the
    /// connection died (or after the transport dropped the receiver) are
    /// silently discarded.
    pub fn send(&self, channel: SubChannel, message: ServerMessage) {
        if !self.is_alive() {
            return;
        }
        let _ = self.inner.outbound.send(OutboundFrame { channel, message });
    }
}

impl std::fmt::Debug for ClientConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConnection")
            .field("conn_id", &self.inner.conn_id)
            .field("identity", &self.inner.identity)
            .field("alive", &self.is_alive())
            .finish()
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(player: u64, session: u64) -> Identity {
        Identity {
            player_id: PlayerId(player),
            session_id: SessionId(session),
        }
    }

    #[test]
    fn test_pair_assigns_unique_conn_ids() {
        let (a, _rx_a) = ClientConnection::pair(Some(identity(1, 1)));
        let (b, _rx_b) = ClientConnection::pair(Some(identity(1, 2)));
        assert_ne!(a.conn_id(), b.conn_id());
    }

    #[test]
    fn test_send_delivers_to_outbound_queue() {
        let (conn, mut rx) = ClientConnection::pair(Some(identity(1, 1)));

        conn.send(
            SubChannel::PlayerManager,
            ServerMessage::SyncTime { server_sent_ms: 5 },
        );

        let frame = rx.try_recv().unwrap();
        assert_eq!(frame.channel, SubChannel::PlayerManager);
        assert_eq!(
            frame.message,
            ServerMessage::SyncTime { server_sent_ms: 5 }
        );
    }

    #[test]
    fn test_send_after_close_is_discarded() {
        let (conn, mut rx) = ClientConnection::pair(Some(identity(1, 1)));
        conn.close();

        conn.send(
            SubChannel::PlayerManager,
            ServerMessage::SyncTime { server_sent_ms: 5 },
        );

        assert!(rx.try_recv().is_err());
        assert!(!conn.is_alive());
    }

    #[test]
    fn test_close_is_visible_to_all_clones() {
        let (conn, _rx) = ClientConnection::pair(None);
        let clone = conn.clone();

        clone.close();

        assert!(!conn.is_alive());
    }
}
