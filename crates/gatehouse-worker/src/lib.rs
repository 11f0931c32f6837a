//! Worker instances and the worker pool.
//!
//! A worker is an independently running simulation host that owns a subset
//! of the currently connected players. The coordinator never touches worker
//! internals — it issues "add player", "remove player", and "is player
//! present" requests across the worker boundary and forwards game payloads.
//!
//! Each worker runs as its own Tokio task behind an mpsc command channel
//! (actor model, no shared mutable state). Removal is a *request*: a worker
//! configured with a release-flush window keeps the player resident while it
//! flushes in-progress simulation state, and only then stops reporting them
//! present. Callers that need the player fully gone (the departure job) poll
//! [`WorkerHandle::contains_player`] until it turns false.

mod error;
mod pool;
mod worker;

pub use error::WorkerError;
pub use pool::{WorkerPool, collect_infos, first_with_capacity};
pub use worker::{WorkerConfig, WorkerHandle, WorkerInfo};
