//! The admission job: from "session registered" to "player resident in a
//! worker".
//!
//! Spawned once per admitted session. Its first duty is to NOT touch the
//! durable record while a persistence job from a previous session of the
//! same player is still in flight — it waits that entry out using the
//! poll-burst/long-wait cascade, reloads the record if it had to wait,
//! and only then asks the pool for a worker with room.
//!
//! The job holds no lock while sleeping. Every tick it re-resolves its
//! session from the live registry by (player id, session id); if the
//! session is gone or was replaced by a newer login, the job stops
//! without side effects.

use std::sync::Arc;

use gatehouse_persist::PersistGateway;
use gatehouse_protocol::{ServerMessage, SubChannel, WorkerId};
use gatehouse_worker::first_with_capacity;

use crate::coordinator::CoordinatorState;
use crate::{ClientConnection, GateError, Identity};

/// How one admission job ended. Logged by [`run_admission`].
pub(crate) enum AdmissionOutcome {
    /// The player is resident in the given worker.
    Assigned(WorkerId),
    /// The connection died before placement completed.
    ConnectionLost,
    /// A newer login for the same player replaced this session mid-job.
    SessionReplaced,
    /// The prior save never cleared within the cascade's budget.
    TimedOut,
    /// No worker had room (or the chosen one refused the player).
    NoWorker,
    /// The record reload after the wait failed.
    ReloadFailed,
}

/// Entry point for the spawned admission task.
pub(crate) async fn run_admission<P: PersistGateway>(
    state: Arc<CoordinatorState<P>>,
    identity: Identity,
) {
    let player_id = identity.player_id;
    match admission_loop(&state, identity).await {
        AdmissionOutcome::Assigned(worker_id) => {
            tracing::info!(%player_id, %worker_id, "player placed");
        }
        AdmissionOutcome::ConnectionLost => {
            tracing::info!(%player_id, "connection lost before placement");
        }
        AdmissionOutcome::SessionReplaced => {
            tracing::debug!(%player_id, "session replaced during admission");
        }
        AdmissionOutcome::TimedOut => {
            tracing::warn!(
                %player_id,
                error = %GateError::AdmissionTimeout(player_id),
                "admission gave up waiting for the previous save"
            );
        }
        AdmissionOutcome::NoWorker => {
            tracing::warn!(
                %player_id,
                error = %GateError::NoWorkerAvailable,
                "admission failed, player disconnected"
            );
        }
        AdmissionOutcome::ReloadFailed => {
            tracing::error!(%player_id, "admission aborted, record reload failed");
        }
    }
}

async fn admission_loop<P: PersistGateway>(
    state: &Arc<CoordinatorState<P>>,
    identity: Identity,
) -> AdmissionOutcome {
    let player_id = identity.player_id;

    let waited = match wait_for_pending_clear(state, identity).await {
        PendingWait::Clear { waited } => waited,
        PendingWait::ConnectionLost => {
            discard_session(state, identity).await;
            return AdmissionOutcome::ConnectionLost;
        }
        PendingWait::SessionReplaced => return AdmissionOutcome::SessionReplaced,
        PendingWait::TimedOut => {
            force_disconnect(
                state,
                identity,
                "login timed out waiting for your last save",
            )
            .await;
            return AdmissionOutcome::TimedOut;
        }
    };

    // If we waited out a save, the record cached at admit() predates what
    // that save wrote. Reload before the player becomes visible to a
    // worker.
    if waited {
        match state.load_record(player_id).await {
            Ok(record) => {
                let refreshed = {
                    let mut live = state.live.lock().await;
                    live.refresh_record(player_id, identity.session_id, record)
                };
                if !refreshed {
                    return AdmissionOutcome::SessionReplaced;
                }
                tracing::debug!(%player_id, "record reloaded after pending save");
            }
            Err(e) => {
                tracing::error!(%player_id, error = %e, "record reload failed");
                force_disconnect(state, identity, "profile unavailable").await;
                return AdmissionOutcome::ReloadFailed;
            }
        }
    }

    // Placement. First worker with room wins. The capacity scan runs on
    // a handle snapshot, after the pool lock is back out of reach.
    let handles = { state.pool.lock().await.handles() };
    let Some(handle) = first_with_capacity(handles).await else {
        force_disconnect(state, identity, "no game instance available").await;
        return AdmissionOutcome::NoWorker;
    };

    // Last liveness check before the player becomes resident.
    match current_connection(state, identity).await {
        Some(conn) if conn.is_alive() => {}
        Some(_) => {
            discard_session(state, identity).await;
            return AdmissionOutcome::ConnectionLost;
        }
        None => return AdmissionOutcome::SessionReplaced,
    }

    if let Err(e) = handle.add_player(player_id).await {
        tracing::warn!(
            %player_id,
            worker_id = %handle.worker_id(),
            error = %e,
            "worker refused player"
        );
        force_disconnect(state, identity, "no game instance available").await;
        return AdmissionOutcome::NoWorker;
    }

    let assigned = {
        let mut live = state.live.lock().await;
        live.assign_worker(player_id, identity.session_id, handle.worker_id())
    };
    if !assigned {
        // The session departed or was replaced between the residency grant
        // and the bookkeeping. Undo the residency; nothing else happened.
        let _ = handle.remove_player(player_id).await;
        return AdmissionOutcome::SessionReplaced;
    }

    AdmissionOutcome::Assigned(handle.worker_id())
}

enum PendingWait {
    /// No save in flight (any more). `waited` is true if at least one
    /// poll found an entry, meaning the cached record is stale.
    Clear { waited: bool },
    ConnectionLost,
    SessionReplaced,
    TimedOut,
}

/// The poll-burst/long-wait cascade over the pending-save registry.
///
/// The common case — no pending entry — resolves on the first poll with
/// no sleeping at all.
async fn wait_for_pending_clear<P: PersistGateway>(
    state: &Arc<CoordinatorState<P>>,
    identity: Identity,
) -> PendingWait {
    let policy = state.config.admission;
    let player_id = identity.player_id;
    let mut waited = false;

    for attempt in 0..policy.attempts {
        for tick in 0..policy.ticks_per_attempt {
            match current_connection(state, identity).await {
                Some(conn) if conn.is_alive() => {}
                Some(_) => return PendingWait::ConnectionLost,
                None => return PendingWait::SessionReplaced,
            }

            let clear = {
                let pending = state.pending.lock().await;
                !pending.contains(player_id)
            };
            if clear {
                return PendingWait::Clear { waited };
            }
            waited = true;

            if tick + 1 < policy.ticks_per_attempt {
                tokio::time::sleep(policy.tick_interval).await;
            }
        }

        if attempt + 1 < policy.attempts {
            tracing::debug!(
                %player_id,
                attempt = attempt + 1,
                "save still in flight, backing off"
            );
            tokio::time::sleep(policy.attempt_interval).await;
        }
    }

    PendingWait::TimedOut
}

/// Resolves this job's session. `None` means gone or replaced by a newer
/// login.
async fn current_connection<P: PersistGateway>(
    state: &Arc<CoordinatorState<P>>,
    identity: Identity,
) -> Option<ClientConnection> {
    let live = state.live.lock().await;
    match live.get(identity.player_id) {
        Some(s) if s.session_id == identity.session_id => {
            Some(s.connection.clone())
        }
        _ => None,
    }
}

/// Removes the session quietly. Used when the connection is already dead:
/// the player was never placed and the record was never modified, so
/// there is nothing to save.
async fn discard_session<P: PersistGateway>(
    state: &Arc<CoordinatorState<P>>,
    identity: Identity,
) {
    let mut live = state.live.lock().await;
    let _ = live.remove_matching(identity.player_id, identity.session_id);
}

/// Removes the session and tells the client why. Admission failures never
/// schedule persistence — the session never owned a current record.
async fn force_disconnect<P: PersistGateway>(
    state: &Arc<CoordinatorState<P>>,
    identity: Identity,
    reason: &str,
) {
    let removed = {
        let mut live = state.live.lock().await;
        live.remove_matching(identity.player_id, identity.session_id)
    };
    if let Ok(session) = removed {
        session.connection.send(
            SubChannel::PlayerManager,
            ServerMessage::Kicked {
                reason: reason.into(),
            },
        );
        session.connection.close();
    }
}
