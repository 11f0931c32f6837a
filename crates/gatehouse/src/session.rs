//! The live session: one connected player as the coordinator tracks them.

use gatehouse_persist::PlayerRecord;
use gatehouse_protocol::{PlayerId, SessionId, WorkerId};

use crate::{ClientConnection, Identity};

/// A single connected player.
///
/// Created when an authenticated connection is admitted; exclusively owned
/// by the live registry until disconnect or eviction removes it. The
/// `worker` field is `None` from admission until the admission job
/// completes placement — a normal transient state during which inbound
/// game messages are dropped with a warning.
#[derive(Debug)]
pub struct PlayerSession {
    /// The stable player id (the live registry's key).
    pub player_id: PlayerId,

    /// The session id minted for this login. Used to tell this session
    /// apart from an evicted predecessor or a successor for the same
    /// player id.
    pub session_id: SessionId,

    /// Handle to the live connection.
    pub connection: ClientConnection,

    /// The worker instance currently hosting this player, once placement
    /// has completed.
    pub worker: Option<WorkerId>,

    /// Cached durable record. Loaded at admission; the admission job
    /// reloads it if the session had to wait out a pending save, because
    /// the cached copy predates what that save wrote.
    pub record: PlayerRecord,

    /// Whether the client has sent ready-to-join and received the
    /// LoggedIn acknowledgement.
    pub login_complete: bool,
}

impl PlayerSession {
    /// Builds a session from a verified connection and its loaded record.
    pub fn new(
        identity: Identity,
        connection: ClientConnection,
        record: PlayerRecord,
    ) -> Self {
        Self {
            player_id: identity.player_id,
            session_id: identity.session_id,
            connection,
            worker: None,
            record,
            login_complete: false,
        }
    }
}
