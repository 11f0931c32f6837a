//! Worker actor: an isolated Tokio task that hosts a set of players.
//!
//! The simulation a worker runs is outside the coordinator's scope; what
//! matters here is *residency*. A player is resident from the moment
//! `add_player` succeeds until a removal request has fully drained — and
//! the departure/persistence machinery keys off exactly that window.

use std::collections::HashSet;
use std::time::Duration;

use gatehouse_protocol::{GamePayload, PlayerId, WorkerId};
use tokio::sync::{mpsc, oneshot};

use crate::WorkerError;

/// Configuration for a worker instance.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum players this worker will host (resident + draining).
    pub capacity: usize,

    /// How long a removed player stays resident while the worker flushes
    /// their in-progress simulation state. Zero means removal releases
    /// immediately.
    pub release_flush: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            capacity: 64,
            release_flush: Duration::ZERO,
        }
    }
}

/// A snapshot of worker load, used for placement and status reporting.
#[derive(Debug, Clone)]
pub struct WorkerInfo {
    /// The worker's unique ID.
    pub worker_id: WorkerId,
    /// Players currently resident (not counting draining ones).
    pub player_count: usize,
    /// Players draining out after a removal request.
    pub draining_count: usize,
    /// Maximum players allowed.
    pub capacity: usize,
    /// Total game payloads delivered to this worker. Diagnostics only.
    pub delivered: u64,
}

impl WorkerInfo {
    /// Whether this worker can take another player.
    pub fn has_capacity(&self) -> bool {
        self.player_count + self.draining_count < self.capacity
    }
}

/// Commands sent to a worker actor through its channel.
pub(crate) enum WorkerCommand {
    /// Add a player to the worker.
    Add {
        player_id: PlayerId,
        reply: oneshot::Sender<Result<(), WorkerError>>,
    },

    /// Request removal of a player. The player may keep reporting as
    /// resident until the release-flush window elapses.
    Remove {
        player_id: PlayerId,
        reply: oneshot::Sender<Result<(), WorkerError>>,
    },

    /// Is this player still resident (including draining)?
    Contains {
        player_id: PlayerId,
        reply: oneshot::Sender<bool>,
    },

    /// Deliver a game payload from a resident player.
    Deliver {
        player_id: PlayerId,
        payload: GamePayload,
    },

    /// Request the current load snapshot.
    GetInfo {
        reply: oneshot::Sender<WorkerInfo>,
    },

    /// Internal: the release-flush window for a draining player elapsed.
    FinishRelease { player_id: PlayerId },

    /// Shut down the worker.
    Shutdown,
}

/// Handle to a running worker actor. Cheap to clone — it wraps an
/// `mpsc::Sender`. The [`WorkerPool`](crate::WorkerPool) holds one per
/// worker.
#[derive(Clone)]
pub struct WorkerHandle {
    worker_id: WorkerId,
    sender: mpsc::Sender<WorkerCommand>,
}

impl WorkerHandle {
    /// Returns the worker's unique ID.
    pub fn worker_id(&self) -> WorkerId {
        self.worker_id
    }

    /// Adds a player to this worker.
    pub async fn add_player(
        &self,
        player_id: PlayerId,
    ) -> Result<(), WorkerError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(WorkerCommand::Add {
                player_id,
                reply: reply_tx,
            })
            .await
            .map_err(|_| WorkerError::Unavailable(self.worker_id))?;
        reply_rx
            .await
            .map_err(|_| WorkerError::Unavailable(self.worker_id))?
    }

    /// Requests removal of a player. Returns once the worker has accepted
    /// the request — the player may still be draining afterwards.
    pub async fn remove_player(
        &self,
        player_id: PlayerId,
    ) -> Result<(), WorkerError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(WorkerCommand::Remove {
                player_id,
                reply: reply_tx,
            })
            .await
            .map_err(|_| WorkerError::Unavailable(self.worker_id))?;
        reply_rx
            .await
            .map_err(|_| WorkerError::Unavailable(self.worker_id))?
    }

    /// Whether the player is still resident in this worker, draining
    /// included.
    pub async fn contains_player(
        &self,
        player_id: PlayerId,
    ) -> Result<bool, WorkerError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(WorkerCommand::Contains {
                player_id,
                reply: reply_tx,
            })
            .await
            .map_err(|_| WorkerError::Unavailable(self.worker_id))?;
        reply_rx
            .await
            .map_err(|_| WorkerError::Unavailable(self.worker_id))
    }

    /// Forwards a game payload from a player (fire-and-forget).
    pub async fn deliver(
        &self,
        player_id: PlayerId,
        payload: GamePayload,
    ) -> Result<(), WorkerError> {
        self.sender
            .send(WorkerCommand::Deliver { player_id, payload })
            .await
            .map_err(|_| WorkerError::Unavailable(self.worker_id))
    }

    /// Requests the current load snapshot.
    pub async fn info(&self) -> Result<WorkerInfo, WorkerError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(WorkerCommand::GetInfo { reply: reply_tx })
            .await
            .map_err(|_| WorkerError::Unavailable(self.worker_id))?;
        reply_rx
            .await
            .map_err(|_| WorkerError::Unavailable(self.worker_id))
    }

    /// Tells the worker to shut down.
    pub async fn shutdown(&self) -> Result<(), WorkerError> {
        self.sender
            .send(WorkerCommand::Shutdown)
            .await
            .map_err(|_| WorkerError::Unavailable(self.worker_id))
    }
}

/// The internal worker actor state. Runs inside a Tokio task.
struct WorkerActor {
    worker_id: WorkerId,
    config: WorkerConfig,
    /// Players fully resident.
    players: HashSet<PlayerId>,
    /// Players removed but still flushing simulation state.
    draining: HashSet<PlayerId>,
    delivered: u64,
    receiver: mpsc::Receiver<WorkerCommand>,
    /// Clone of our own sender, used to schedule FinishRelease.
    self_sender: mpsc::Sender<WorkerCommand>,
}

impl WorkerActor {
    async fn run(mut self) {
        tracing::info!(worker_id = %self.worker_id, "worker started");

        while let Some(cmd) = self.receiver.recv().await {
            match cmd {
                WorkerCommand::Add { player_id, reply } => {
                    let _ = reply.send(self.handle_add(player_id));
                }
                WorkerCommand::Remove { player_id, reply } => {
                    let _ = reply.send(self.handle_remove(player_id));
                }
                WorkerCommand::Contains { player_id, reply } => {
                    let resident = self.players.contains(&player_id)
                        || self.draining.contains(&player_id);
                    let _ = reply.send(resident);
                }
                WorkerCommand::Deliver { player_id, payload } => {
                    self.handle_deliver(player_id, payload);
                }
                WorkerCommand::GetInfo { reply } => {
                    let _ = reply.send(self.info());
                }
                WorkerCommand::FinishRelease { player_id } => {
                    if self.draining.remove(&player_id) {
                        tracing::debug!(
                            worker_id = %self.worker_id,
                            %player_id,
                            "player release flushed"
                        );
                    }
                }
                WorkerCommand::Shutdown => {
                    tracing::info!(
                        worker_id = %self.worker_id,
                        players = self.players.len(),
                        "worker shutting down"
                    );
                    break;
                }
            }
        }

        tracing::info!(worker_id = %self.worker_id, "worker stopped");
    }

    fn handle_add(&mut self, player_id: PlayerId) -> Result<(), WorkerError> {
        if self.players.contains(&player_id)
            || self.draining.contains(&player_id)
        {
            return Err(WorkerError::AlreadyResident(
                player_id,
                self.worker_id,
            ));
        }
        if self.players.len() + self.draining.len() >= self.config.capacity {
            return Err(WorkerError::AtCapacity(self.worker_id));
        }

        self.players.insert(player_id);
        tracing::info!(
            worker_id = %self.worker_id,
            %player_id,
            players = self.players.len(),
            "player added"
        );
        Ok(())
    }

    fn handle_remove(
        &mut self,
        player_id: PlayerId,
    ) -> Result<(), WorkerError> {
        if !self.players.remove(&player_id) {
            return Err(WorkerError::NotResident(player_id, self.worker_id));
        }

        if self.config.release_flush.is_zero() {
            tracing::info!(
                worker_id = %self.worker_id,
                %player_id,
                "player removed"
            );
            return Ok(());
        }

        // Keep the player visible to contains_player until the flush
        // window elapses, then release through our own command channel.
        self.draining.insert(player_id);
        let flush = self.config.release_flush;
        let sender = self.self_sender.clone();
        tokio::spawn(async move {
            tokio::time::sleep(flush).await;
            let _ = sender
                .send(WorkerCommand::FinishRelease { player_id })
                .await;
        });

        tracing::info!(
            worker_id = %self.worker_id,
            %player_id,
            flush_ms = flush.as_millis() as u64,
            "player removal accepted, draining"
        );
        Ok(())
    }

    fn handle_deliver(&mut self, player_id: PlayerId, payload: GamePayload) {
        if !self.players.contains(&player_id) {
            tracing::warn!(
                worker_id = %self.worker_id,
                %player_id,
                kind = payload.kind,
                "payload from non-resident player, dropping"
            );
            return;
        }

        // The simulation consumes the payload here. This host only
        // accounts for it.
        self.delivered += 1;
        tracing::trace!(
            worker_id = %self.worker_id,
            %player_id,
            kind = payload.kind,
            bytes = payload.data.len(),
            "payload delivered"
        );
    }

    fn info(&self) -> WorkerInfo {
        WorkerInfo {
            worker_id: self.worker_id,
            player_count: self.players.len(),
            draining_count: self.draining.len(),
            capacity: self.config.capacity,
            delivered: self.delivered,
        }
    }
}

/// Spawns a new worker actor task and returns a handle to it.
pub(crate) fn spawn_worker(
    worker_id: WorkerId,
    config: WorkerConfig,
    channel_size: usize,
) -> WorkerHandle {
    let (tx, rx) = mpsc::channel(channel_size);

    let actor = WorkerActor {
        worker_id,
        config,
        players: HashSet::new(),
        draining: HashSet::new(),
        delivered: 0,
        receiver: rx,
        self_sender: tx.clone(),
    };

    tokio::spawn(actor.run());

    WorkerHandle {
        worker_id,
        sender: tx,
    }
}
