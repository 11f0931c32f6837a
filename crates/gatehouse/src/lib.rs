//! # Gatehouse
//!
//! The player-session lifecycle coordinator of a multiplayer server front
//! door. Gatehouse accepts authenticated client connections, places players
//! into worker game instances, routes inbound messages to itself or the
//! owning worker, and coordinates asynchronous persistence around
//! connect/disconnect so a player's durable record is never read stale or
//! written concurrently from two sessions.
//!
//! ## The shape of the problem
//!
//! Connect and disconnect each spawn an independent asynchronous job:
//!
//! ```text
//! admit() ──→ [AdmissionJob]  wait out any in-flight save ──→ assign worker
//! depart() ─→ [DepartureJob]  wait for worker release ──→ save record
//! ```
//!
//! The two jobs meet only through two registries: the live registry (one
//! session per connected player) and the pending-persistence registry (at
//! most one in-flight save per player id). An admission job for a
//! reconnecting player never touches the durable record until any pending
//! save for the same id has cleared — that is the central correctness
//! property, and the one the integration suite leans on hardest.
//!
//! ## What Gatehouse is not
//!
//! The wire format, the credential check, the persistence engine, and the
//! simulation inside a worker are all external collaborators, consumed
//! through narrow seams ([`CredentialVerifier`],
//! [`PersistGateway`](gatehouse_persist::PersistGateway), the worker
//! handles in `gatehouse-worker`).

mod admission;
mod auth;
mod clock;
mod connection;
mod coordinator;
mod departure;
mod error;
mod pending;
mod registry;
mod retry;
mod router;
mod session;

pub use auth::{CredentialVerifier, TokenVerifier};
pub use clock::{GameClock, wall_clock_ms};
pub use connection::{ClientConnection, Identity, OutboundFrame};
pub use coordinator::{Coordinator, CoordinatorConfig};
pub use error::GateError;
pub use retry::RetryPolicy;
pub use session::PlayerSession;

/// Installs a `tracing` subscriber reading `RUST_LOG` for filtering.
///
/// Convenience for binaries and examples; call once at startup.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}
