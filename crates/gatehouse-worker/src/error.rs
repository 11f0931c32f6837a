//! Error types for the worker layer.

use gatehouse_protocol::{PlayerId, WorkerId};

/// Errors that can occur when talking to a worker instance.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    /// The worker does not exist (never created, or already shut down
    /// and removed from the pool).
    #[error("worker {0} not found")]
    NotFound(WorkerId),

    /// The worker has no free player slots.
    #[error("worker {0} is at capacity")]
    AtCapacity(WorkerId),

    /// The player is already resident in this worker (including players
    /// still draining out after a removal request).
    #[error("player {0} already resident in worker {1}")]
    AlreadyResident(PlayerId, WorkerId),

    /// The player is not resident in this worker.
    #[error("player {0} not resident in worker {1}")]
    NotResident(PlayerId, WorkerId),

    /// The worker's command channel is closed — the actor task has
    /// stopped (shutdown or panic).
    #[error("worker {0} is unavailable")]
    Unavailable(WorkerId),
}
