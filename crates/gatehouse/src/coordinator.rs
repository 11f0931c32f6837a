//! The session coordinator: registries, public surface, and job spawning.
//!
//! This ties the layers together the way the transport sees them:
//! `on_connection_established` → admit, `on_connection_closed` → depart,
//! `on_message`/`on_message_batch` → route, plus broadcast, status, and
//! the shutdown drain.
//!
//! # Lock discipline
//!
//! The live registry, the pending-save registry, and the worker pool sit
//! behind `tokio::sync::Mutex`. Every critical section is a plain map
//! operation or a handle snapshot — no lock is ever held across a
//! suspension point, and worker actor round trips always run after the
//! pool lock has been released. Where the live and pending registries
//! must change together (a departure removing the session and claiming
//! the save slot), both locks are taken, always live before pending. The
//! lifecycle jobs spawned here synchronize exclusively through those two
//! registries.
//!
//! The persistence gateway's contract is synchronous, so its calls are
//! hopped onto the blocking thread pool — a slow backend stalls only the
//! calling job, never the runtime's worker threads.

use std::sync::Arc;
use std::time::Duration;

use gatehouse_persist::{PersistError, PersistGateway, PlayerRecord};
use gatehouse_protocol::{
    ClientMessage, Inbound, PlayerId, ServerMessage, SubChannel, WorkerId,
};
use gatehouse_worker::{WorkerConfig, WorkerPool, collect_infos};
use tokio::sync::Mutex;

use crate::clock::{GameClock, wall_clock_ms};
use crate::pending::PendingSaves;
use crate::registry::LiveRegistry;
use crate::{
    ClientConnection, GateError, PlayerSession, RetryPolicy, admission,
    departure, router,
};

/// Tuning knobs for the coordinator.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Cascade the admission job uses while waiting out a prior save.
    pub admission: RetryPolicy,

    /// Cascade the departure job uses while waiting for worker release.
    pub departure: RetryPolicy,

    /// How often the shutdown drain re-checks the pending-save registry.
    pub shutdown_poll: Duration,

    /// Configuration applied to workers created through this coordinator.
    pub worker: WorkerConfig,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            admission: RetryPolicy::default(),
            departure: RetryPolicy::default(),
            shutdown_poll: Duration::from_millis(50),
            worker: WorkerConfig::default(),
        }
    }
}

/// Shared state behind every coordinator clone and every spawned job.
pub(crate) struct CoordinatorState<P: PersistGateway> {
    pub(crate) live: Mutex<LiveRegistry>,
    pub(crate) pending: Mutex<PendingSaves>,
    pub(crate) pool: Mutex<WorkerPool>,
    pub(crate) gateway: P,
    pub(crate) config: CoordinatorConfig,
    pub(crate) clock: GameClock,
}

impl<P: PersistGateway> CoordinatorState<P> {
    /// Loads a record on the blocking thread pool. The gateway may block
    /// on a real backend; it must never do so on a runtime worker thread.
    pub(crate) async fn load_record(
        self: &Arc<Self>,
        player_id: PlayerId,
    ) -> Result<PlayerRecord, PersistError> {
        let state = Arc::clone(self);
        tokio::task::spawn_blocking(move || state.gateway.load(player_id))
            .await
            .unwrap_or_else(|e| {
                Err(PersistError::Backend(format!("load task failed: {e}")))
            })
    }

    /// Writes a record on the blocking thread pool.
    pub(crate) async fn save_record(
        self: &Arc<Self>,
        record: PlayerRecord,
    ) -> Result<(), PersistError> {
        let state = Arc::clone(self);
        tokio::task::spawn_blocking(move || state.gateway.save(&record))
            .await
            .unwrap_or_else(|e| {
                Err(PersistError::Backend(format!("save task failed: {e}")))
            })
    }
}

/// The player-session lifecycle coordinator.
///
/// Cheap to clone — clones share the same registries and worker pool.
/// The transport layer typically holds one clone per accept task.
pub struct Coordinator<P: PersistGateway> {
    state: Arc<CoordinatorState<P>>,
}

impl<P: PersistGateway> Clone for Coordinator<P> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<P: PersistGateway> Coordinator<P> {
    /// Creates a coordinator with default configuration.
    pub fn new(gateway: P) -> Self {
        Self::with_config(gateway, CoordinatorConfig::default())
    }

    /// Creates a coordinator with the given configuration. Retry policies
    /// are validated so a degenerate config can't produce a job that
    /// never polls.
    pub fn with_config(gateway: P, mut config: CoordinatorConfig) -> Self {
        config.admission = config.admission.validated();
        config.departure = config.departure.validated();
        let pool = WorkerPool::new(config.worker.clone());

        Self {
            state: Arc::new(CoordinatorState {
                live: Mutex::new(LiveRegistry::new()),
                pending: Mutex::new(PendingSaves::new()),
                pool: Mutex::new(pool),
                gateway,
                config,
                clock: GameClock::new(),
            }),
        }
    }

    /// Spawns a new worker instance and returns its id.
    pub async fn create_worker(&self) -> WorkerId {
        self.state.pool.lock().await.create_worker()
    }

    // ---------------------------------------------------------------------
    // Connection lifecycle
    // ---------------------------------------------------------------------

    /// Admits an authenticated connection.
    ///
    /// Fails with [`GateError::NoSession`] if the connection carries no
    /// verified identity. Under a single critical section over the
    /// registries: any existing holder of the player id is evicted
    /// (duplicate login always wins for the newest connection) and its
    /// save slot is claimed, then the new session is inserted. The
    /// evicted session is put through the full departure flow — detached
    /// from its worker and persisted — before this session's admission
    /// job is spawned, so the job observes that save and waits it out.
    /// Worker placement is never done inline.
    pub async fn admit(&self, conn: ClientConnection) -> Result<(), GateError> {
        let identity = conn.identity().ok_or(GateError::NoSession)?;
        let player_id = identity.player_id;

        // Cached copy of the durable record. If a save is still in
        // flight for this id, the admission job reloads after it clears.
        let record = self.state.load_record(player_id).await?;

        let evicted = {
            let mut live = self.state.live.lock().await;
            let session = PlayerSession::new(identity, conn.clone(), record);
            match live.insert_evicting(session) {
                Some(prior) => {
                    // Claim the save slot in the same critical section as
                    // the eviction, so our own admission job (spawned
                    // below) can never poll before the entry exists.
                    let mut pending = self.state.pending.lock().await;
                    let registered =
                        pending.begin(player_id, prior.session_id);
                    Some((prior, registered))
                }
                None => None,
            }
        };

        if let Some((prior, registered)) = evicted {
            prior.connection.send(
                SubChannel::PlayerManager,
                ServerMessage::Kicked {
                    reason: "duplicate login".into(),
                },
            );
            prior.connection.close();
            tracing::info!(
                %player_id,
                evicted_session = %prior.session_id,
                "duplicate login, prior session evicted"
            );
            retire_session(&self.state, prior, registered).await;
        }

        tracing::info!(
            %player_id,
            session_id = %identity.session_id,
            "session admitted, placement pending"
        );

        tokio::spawn(admission::run_admission(
            Arc::clone(&self.state),
            identity,
        ));
        Ok(())
    }

    /// Transport-facing alias for [`admit`](Self::admit).
    pub async fn on_connection_established(
        &self,
        conn: ClientConnection,
    ) -> Result<(), GateError> {
        self.admit(conn).await
    }

    /// Departs a connection: removes the live session, detaches it from
    /// its worker, and schedules persistence.
    ///
    /// Fails with [`GateError::NotFound`] if this connection's session is
    /// not live (including the case where it was already evicted by a
    /// duplicate login — the newer session stays untouched). The live
    /// session is removed before the persistence job is spawned, so after
    /// this returns there is no window where registry and worker both
    /// still reference the departed session.
    pub async fn depart(&self, conn: &ClientConnection) -> Result<(), GateError> {
        let identity = conn.identity().ok_or(GateError::NoSession)?;
        let player_id = identity.player_id;

        // Remove the session and claim the save slot in one critical
        // section: a reconnect admitted the instant these locks drop must
        // already see the pending entry, or it would place with a stale
        // record.
        let (session, registered) = {
            let mut live = self.state.live.lock().await;
            let session =
                live.remove_matching(player_id, identity.session_id)?;
            let mut pending = self.state.pending.lock().await;
            let registered = pending.begin(player_id, session.session_id);
            (session, registered)
        };

        if registered {
            tracing::info!(
                %player_id,
                session_id = %session.session_id,
                "session departed, save scheduled"
            );
        }
        retire_session(&self.state, session, registered).await;
        Ok(())
    }

    /// Transport-facing alias for [`depart`](Self::depart).
    pub async fn on_connection_closed(
        &self,
        conn: &ClientConnection,
    ) -> Result<(), GateError> {
        self.depart(conn).await
    }

    // ---------------------------------------------------------------------
    // Message routing
    // ---------------------------------------------------------------------

    /// Routes one decoded inbound message.
    ///
    /// Receipt timestamps (wall clock and game clock) are stamped here,
    /// before classification, so the time-sync handlers see the true
    /// receipt time.
    pub async fn on_message(
        &self,
        conn: &ClientConnection,
        channel: SubChannel,
        message: ClientMessage,
    ) -> Result<(), GateError> {
        let inbound = Inbound::stamp(
            channel,
            message,
            wall_clock_ms(),
            self.state.clock.now_ms(),
        );
        router::route(&self.state, conn, inbound).await
    }

    /// Routes a batch of messages in arrival order.
    ///
    /// A protocol violation aborts the batch (the connection is already
    /// closed at that point); any other per-message failure is logged and
    /// the batch continues.
    pub async fn on_message_batch(
        &self,
        conn: &ClientConnection,
        messages: Vec<(SubChannel, ClientMessage)>,
    ) -> Result<(), GateError> {
        for (channel, message) in messages {
            match self.on_message(conn, channel, message).await {
                Ok(()) => {}
                Err(e @ GateError::ProtocolViolation(_)) => return Err(e),
                Err(e) => {
                    tracing::debug!(
                        conn_id = conn.conn_id(),
                        error = %e,
                        "message in batch not routed"
                    );
                }
            }
        }
        Ok(())
    }

    /// Delivers a message to every live session's reserved sub-channel.
    ///
    /// Iterates a stable snapshot taken under the registry lock, so a
    /// session mid-removal is either fully in or fully out.
    pub async fn broadcast(&self, message: ServerMessage) {
        let connections = {
            let live = self.state.live.lock().await;
            live.connections()
        };
        let count = connections.len();
        for conn in connections {
            conn.send(SubChannel::PlayerManager, message.clone());
        }
        tracing::debug!(recipients = count, "broadcast delivered");
    }

    // ---------------------------------------------------------------------
    // Status and shutdown
    // ---------------------------------------------------------------------

    /// One-line status: live players, workers, in-flight saves.
    pub async fn status_summary(&self) -> String {
        let live = self.state.live.lock().await.len();
        let workers = self.state.pool.lock().await.worker_count();
        let pending = self.state.pending.lock().await.len();
        format!("live={live} workers={workers} pending_saves={pending}")
    }

    /// Number of currently connected players.
    pub async fn live_count(&self) -> usize {
        self.state.live.lock().await.len()
    }

    /// Number of in-flight persistence jobs.
    pub async fn pending_save_count(&self) -> usize {
        self.state.pending.lock().await.len()
    }

    /// Load snapshots for every worker, for operational inspection.
    pub async fn worker_infos(&self) -> Vec<gatehouse_worker::WorkerInfo> {
        let handles = { self.state.pool.lock().await.handles() };
        collect_infos(handles).await
    }

    /// The worker currently hosting a player, if placement completed.
    pub async fn worker_of(&self, player_id: PlayerId) -> Option<WorkerId> {
        self.state.live.lock().await.worker_of(player_id)
    }

    /// Shuts the service down: requests every worker to stop, then drains
    /// the pending-save registry so no persistence job is interrupted by
    /// process exit.
    pub async fn shutdown(&self) {
        tracing::info!("coordinator shutting down");
        let handles = { self.state.pool.lock().await.drain_all() };
        for handle in handles {
            if let Err(e) = handle.shutdown().await {
                tracing::debug!(
                    worker_id = %handle.worker_id(),
                    error = %e,
                    "worker already gone"
                );
            }
        }
        tracing::info!("all workers shut down");

        loop {
            let remaining = self.state.pending.lock().await.len();
            if remaining == 0 {
                break;
            }
            tracing::info!(remaining, "waiting for in-flight saves");
            tokio::time::sleep(self.state.config.shutdown_poll).await;
        }

        tracing::info!("shutdown complete, no saves in flight");
    }
}

/// Finishes retiring a session that has already been removed from the
/// live registry: detaches it from its worker and, if `registered`, hands
/// it to a departure job. Shared by normal disconnects and duplicate-login
/// evictions — an evicted session owes the exact same cleanup.
async fn retire_session<P: PersistGateway>(
    state: &Arc<CoordinatorState<P>>,
    session: PlayerSession,
    registered: bool,
) {
    let player_id = session.player_id;

    // Best-effort detach. No worker assigned (admission still in flight)
    // is not an error; the worker refusing is logged only.
    if let Some(worker_id) = session.worker {
        let handle = { state.pool.lock().await.worker_by_id(worker_id) };
        if let Some(handle) = handle {
            if let Err(e) = handle.remove_player(player_id).await {
                tracing::debug!(
                    %player_id, %worker_id, error = %e,
                    "worker detach failed"
                );
            }
        }
    }

    if registered {
        tokio::spawn(departure::run_departure(Arc::clone(state), session));
    } else {
        // Only reachable when this session's admission never resolved:
        // the pending entry belongs to the previous session and this one
        // never touched the record.
        tracing::warn!(
            %player_id,
            "save already in flight, skipping duplicate persistence job"
        );
    }
}
