//! The departure job: from "session removed" to "record durably saved".
//!
//! Spawned once per departed session, after its entry is registered in
//! the pending-save registry. The job owns the departed `PlayerSession`
//! outright — the live registry no longer references it — so nothing
//! else can mutate the record while the save runs.
//!
//! Before writing, the job waits for the hosting worker to actually
//! release the player: a worker may keep a removed player resident for a
//! release-flush window while it writes back in-progress simulation
//! state, and saving during that window would race it. The wait uses the
//! same poll-burst/long-wait cascade as admission.
//!
//! However the job ends — save written, save failed, wait timed out —
//! the pending entry is cleared. A stuck entry would lock the player out
//! of ever reconnecting, which is strictly worse than one lost save.
//!
//! The write itself runs on the blocking thread pool: the gateway
//! contract is synchronous, and a slow backend must stall only this job.

use std::sync::Arc;

use gatehouse_persist::{PersistError, PersistGateway};
use gatehouse_protocol::{PlayerId, WorkerId};
use gatehouse_worker::WorkerError;

use crate::GateError;
use crate::clock::wall_clock_ms;
use crate::coordinator::CoordinatorState;
use crate::session::PlayerSession;

/// How one departure job ended. Logged by [`run_departure`].
pub(crate) enum DepartureOutcome {
    /// The record was written.
    Saved,
    /// The gateway rejected the write.
    SaveFailed(PersistError),
    /// The worker never released the player within the cascade's budget;
    /// the save was skipped.
    TimedOut,
}

/// Entry point for the spawned departure task.
pub(crate) async fn run_departure<P: PersistGateway>(
    state: Arc<CoordinatorState<P>>,
    session: PlayerSession,
) {
    let player_id = session.player_id;
    let outcome = departure_loop(&state, session).await;

    // Clear the entry regardless of outcome.
    let entry = {
        let mut pending = state.pending.lock().await;
        pending.finish(player_id)
    };

    match outcome {
        DepartureOutcome::Saved => {
            tracing::info!(%player_id, "record saved");
        }
        DepartureOutcome::SaveFailed(e) => {
            tracing::error!(%player_id, error = %e, "record save failed");
        }
        DepartureOutcome::TimedOut => {
            tracing::warn!(
                %player_id,
                error = %GateError::DepartureTimeout(player_id),
                "worker never released player, save skipped"
            );
        }
    }

    if let Some(entry) = entry {
        tracing::debug!(
            %player_id,
            elapsed_ms = entry.since.elapsed().as_millis() as u64,
            "persistence job finished"
        );
    }
}

async fn departure_loop<P: PersistGateway>(
    state: &Arc<CoordinatorState<P>>,
    mut session: PlayerSession,
) -> DepartureOutcome {
    // A session whose admission never completed has no worker and nothing
    // to wait for.
    if let Some(worker_id) = session.worker {
        if !wait_for_worker_release(state, session.player_id, worker_id).await
        {
            return DepartureOutcome::TimedOut;
        }
    }

    session.record.last_save_wall_ms = wall_clock_ms();
    match state.save_record(session.record).await {
        Ok(()) => DepartureOutcome::Saved,
        Err(e) => DepartureOutcome::SaveFailed(e),
    }
}

/// Polls the worker until the player is no longer resident (draining
/// included). Returns `false` on cascade exhaustion. A worker that has
/// shut down counts as released — it can no longer touch the player.
async fn wait_for_worker_release<P: PersistGateway>(
    state: &Arc<CoordinatorState<P>>,
    player_id: PlayerId,
    worker_id: WorkerId,
) -> bool {
    let handle = {
        let pool = state.pool.lock().await;
        pool.worker_by_id(worker_id)
    };
    let Some(handle) = handle else {
        return true;
    };

    let policy = state.config.departure;
    for attempt in 0..policy.attempts {
        for tick in 0..policy.ticks_per_attempt {
            match handle.contains_player(player_id).await {
                Ok(false) => return true,
                Ok(true) => {}
                Err(WorkerError::Unavailable(_)) => return true,
                Err(e) => {
                    tracing::debug!(
                        %player_id, %worker_id, error = %e,
                        "residency poll failed"
                    );
                    return true;
                }
            }

            if tick + 1 < policy.ticks_per_attempt {
                tokio::time::sleep(policy.tick_interval).await;
            }
        }

        if attempt + 1 < policy.attempts {
            tracing::debug!(
                %player_id,
                %worker_id,
                attempt = attempt + 1,
                "player still resident, backing off"
            );
            tokio::time::sleep(policy.attempt_interval).await;
        }
    }

    false
}
