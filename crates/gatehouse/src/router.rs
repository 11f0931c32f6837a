//! The inbound router: coordinator-handled messages vs. worker traffic.
//!
//! Classification happens on the message type, not the channel — the
//! channel only gates direction (a client frame on a server-only channel
//! is a protocol violation and fatal for the connection). Timing
//! messages are answered directly, ready-to-join completes login, and
//! game payloads are forwarded to the sender's current worker.

use std::sync::Arc;

use gatehouse_persist::PersistGateway;
use gatehouse_protocol::{
    ClientMessage, GamePayload, Inbound, ServerMessage, SubChannel,
};

use crate::clock::wall_clock_ms;
use crate::coordinator::CoordinatorState;
use crate::{ClientConnection, GateError, Identity};

/// Routes one stamped inbound message.
///
/// The channel direction check runs first, before identity: a frame on a
/// server-only channel is malformed traffic whoever sent it, and the
/// connection is closed on the spot.
pub(crate) async fn route<P: PersistGateway>(
    state: &Arc<CoordinatorState<P>>,
    conn: &ClientConnection,
    inbound: Inbound,
) -> Result<(), GateError> {
    if !inbound.channel.is_client_inbound() {
        tracing::warn!(
            conn_id = conn.conn_id(),
            channel = %inbound.channel,
            "client frame on server-only channel, closing connection"
        );
        conn.close();
        return Err(GateError::ProtocolViolation(inbound.channel));
    }

    let identity = conn.identity().ok_or(GateError::NoSession)?;

    match inbound.message {
        ClientMessage::SyncTime { client_sent_ms } => {
            handle_sync_time(conn, client_sent_ms);
            Ok(())
        }
        ClientMessage::Ping { client_sent_ms } => {
            handle_ping(conn, client_sent_ms, inbound.received_wall_ms);
            Ok(())
        }
        ClientMessage::FrameRate { fps } => {
            tracing::debug!(
                player_id = %identity.player_id,
                fps,
                "client frame-rate report"
            );
            Ok(())
        }
        ClientMessage::ReadyToJoin => {
            handle_ready_to_join(state, conn, identity).await
        }
        ClientMessage::Game(payload) => {
            handle_game(state, identity, payload).await
        }
    }
}

/// Answers a time-sync request with the server's current wall clock. The
/// reply stamp is taken at send time, not receipt time — the client is
/// estimating our clock, not our queue depth.
fn handle_sync_time(conn: &ClientConnection, client_sent_ms: u64) {
    let server_sent_ms = wall_clock_ms();
    tracing::trace!(
        conn_id = conn.conn_id(),
        client_sent_ms,
        server_sent_ms,
        "time-sync request"
    );
    conn.send(
        SubChannel::PlayerManager,
        ServerMessage::SyncTime { server_sent_ms },
    );
}

/// Answers a ping. The received stamp comes from the inbound envelope —
/// taken when the frame arrived, before routing — so the client's RTT
/// split between uplink and downlink is honest.
fn handle_ping(
    conn: &ClientConnection,
    client_sent_ms: u64,
    server_received_ms: u64,
) {
    conn.send(
        SubChannel::PlayerManager,
        ServerMessage::Pong {
            client_sent_ms,
            server_received_ms,
            server_sent_ms: wall_clock_ms(),
        },
    );
}

/// Completes login bookkeeping and acknowledges: LoggedIn first, then the
/// initial time-sync push, in that order on the reserved channel.
async fn handle_ready_to_join<P: PersistGateway>(
    state: &Arc<CoordinatorState<P>>,
    conn: &ClientConnection,
    identity: Identity,
) -> Result<(), GateError> {
    let session_id = {
        let mut live = state.live.lock().await;
        live.mark_login_complete(identity.player_id)
    }
    .ok_or(GateError::NotFound(identity.player_id))?;

    conn.send(
        SubChannel::PlayerManager,
        ServerMessage::LoggedIn {
            player_id: identity.player_id,
            session_id,
        },
    );
    conn.send(
        SubChannel::PlayerManager,
        ServerMessage::SyncTime {
            server_sent_ms: wall_clock_ms(),
        },
    );

    tracing::info!(
        player_id = %identity.player_id,
        %session_id,
        "login complete"
    );
    Ok(())
}

/// Forwards an opaque game payload to the sender's current worker.
///
/// A player whose admission job has not finished placement has no worker
/// yet; their game traffic is dropped with a warning rather than queued —
/// the client retries off the LoggedIn handshake.
async fn handle_game<P: PersistGateway>(
    state: &Arc<CoordinatorState<P>>,
    identity: Identity,
    payload: GamePayload,
) -> Result<(), GateError> {
    let player_id = identity.player_id;

    let worker_id = {
        let live = state.live.lock().await;
        match live.get(player_id) {
            Some(session) => session.worker,
            None => return Err(GateError::NotFound(player_id)),
        }
    };
    let Some(worker_id) = worker_id else {
        tracing::warn!(
            %player_id,
            kind = payload.kind,
            "game message before placement, dropping"
        );
        return Err(GateError::RoutingUnavailable(player_id));
    };

    let handle = {
        let pool = state.pool.lock().await;
        pool.worker_by_id(worker_id)
    };
    let Some(handle) = handle else {
        tracing::warn!(%player_id, %worker_id, "assigned worker is gone");
        return Err(GateError::RoutingUnavailable(player_id));
    };

    handle
        .deliver(player_id, payload)
        .await
        .map_err(|_| GateError::RoutingUnavailable(player_id))
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use gatehouse_persist::MemoryGateway;
    use gatehouse_protocol::{PlayerId, SessionId};

    use super::*;
    use crate::{Coordinator, OutboundFrame};

    fn identity(player: u64, session: u64) -> Identity {
        Identity {
            player_id: PlayerId(player),
            session_id: SessionId(session),
        }
    }

    #[tokio::test]
    async fn test_route_server_only_channel_closes_connection() {
        let coordinator = Coordinator::new(MemoryGateway::new());
        let (conn, _rx) = ClientConnection::pair(Some(identity(1, 1)));

        let result = coordinator
            .on_message(
                &conn,
                SubChannel::Announce,
                ClientMessage::Ping { client_sent_ms: 1 },
            )
            .await;

        assert!(matches!(
            result,
            Err(GateError::ProtocolViolation(SubChannel::Announce))
        ));
        assert!(!conn.is_alive());
    }

    #[tokio::test]
    async fn test_route_unauthenticated_connection_is_no_session() {
        let coordinator = Coordinator::new(MemoryGateway::new());
        let (conn, _rx) = ClientConnection::pair(None);

        let result = coordinator
            .on_message(
                &conn,
                SubChannel::PlayerManager,
                ClientMessage::ReadyToJoin,
            )
            .await;

        assert!(matches!(result, Err(GateError::NoSession)));
    }

    #[tokio::test]
    async fn test_ping_echoes_client_and_receipt_timestamps() {
        let coordinator = Coordinator::new(MemoryGateway::new());
        let (conn, mut rx) = ClientConnection::pair(Some(identity(1, 1)));

        coordinator
            .on_message(
                &conn,
                SubChannel::PlayerManager,
                ClientMessage::Ping {
                    client_sent_ms: 777,
                },
            )
            .await
            .unwrap();

        let frame = rx.try_recv().unwrap();
        assert_eq!(frame.channel, SubChannel::PlayerManager);
        match frame.message {
            ServerMessage::Pong {
                client_sent_ms,
                server_received_ms,
                server_sent_ms,
            } => {
                assert_eq!(client_sent_ms, 777);
                assert!(server_received_ms <= server_sent_ms);
            }
            other => panic!("expected Pong, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_ready_to_join_unknown_player_is_not_found() {
        let coordinator = Coordinator::new(MemoryGateway::new());
        let (conn, _rx) = ClientConnection::pair(Some(identity(5, 1)));

        // Never admitted.
        let result = coordinator
            .on_message(
                &conn,
                SubChannel::PlayerManager,
                ClientMessage::ReadyToJoin,
            )
            .await;

        assert!(matches!(
            result,
            Err(GateError::NotFound(p)) if p == PlayerId(5)
        ));
    }

    fn logged_in_then_sync(frames: &[OutboundFrame]) -> bool {
        matches!(frames[0].message, ServerMessage::LoggedIn { .. })
            && matches!(frames[1].message, ServerMessage::SyncTime { .. })
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_ready_to_join_sends_logged_in_then_sync_time() {
        let coordinator = Coordinator::new(MemoryGateway::new());
        coordinator.create_worker().await;

        let (conn, mut rx) = ClientConnection::pair(Some(identity(1, 1)));
        coordinator.admit(conn.clone()).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        coordinator
            .on_message(
                &conn,
                SubChannel::PlayerManager,
                ClientMessage::ReadyToJoin,
            )
            .await
            .unwrap();

        let first = rx.try_recv().unwrap();
        let second = rx.try_recv().unwrap();
        assert!(
            logged_in_then_sync(&[first, second]),
            "LoggedIn must precede the initial SyncTime"
        );
    }
}
