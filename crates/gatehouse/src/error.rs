//! Unified error type for the coordinator.

use gatehouse_persist::PersistError;
use gatehouse_protocol::{PlayerId, ProtocolError, SubChannel};
use gatehouse_worker::WorkerError;

/// Everything that can go wrong at the coordinator's public surface.
///
/// Duplicate login is deliberately NOT here — it is handled (the prior
/// holder is evicted), not reported. Job timeouts are terminal for the
/// affected connection only, never for the service.
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    /// The operation requires a verified identity and the connection
    /// doesn't carry one.
    #[error("operation requires an authenticated session")]
    NoSession,

    /// Removal or lookup on a player id that is not connected.
    #[error("player {0} is not connected")]
    NotFound(PlayerId),

    /// The admission job exhausted its attempt budget without ever
    /// observing a clear pending-save state. The connection is forcibly
    /// closed — a player whose save status is unknown is never admitted.
    #[error("admission timed out for player {0}")]
    AdmissionTimeout(PlayerId),

    /// The departure job exhausted its attempt budget while the player
    /// was still resident in a worker. The pending-save entry is cleared
    /// anyway so the player can reconnect.
    #[error("departure timed out for player {0}")]
    DepartureTimeout(PlayerId),

    /// A game message arrived for a player with no current worker
    /// assignment. Transient — normal while an admission job is still
    /// running. The message is logged and dropped.
    #[error("no worker assignment for player {0}, message dropped")]
    RoutingUnavailable(PlayerId),

    /// A client frame arrived on a sub-channel that is not inbound.
    /// Fatal for that connection.
    #[error("protocol violation on sub-channel {0}")]
    ProtocolViolation(SubChannel),

    /// Admission resolved but no worker instance had capacity.
    #[error("no worker instance has capacity")]
    NoWorkerAvailable,

    /// A protocol-level error (carried through from the transport decoder).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A worker-level error (unavailable, at capacity).
    #[error(transparent)]
    Worker(#[from] WorkerError),

    /// A persistence-level error (backend failure).
    #[error(transparent)]
    Persist(#[from] PersistError),
}
