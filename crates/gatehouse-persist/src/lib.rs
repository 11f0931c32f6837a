//! The persistence gateway: synchronous load/save of durable player records.
//!
//! The persistence engine itself (database, KV store, flat files) is an
//! external collaborator. This crate defines the seam the coordinator
//! talks through — the [`PersistGateway`] trait — plus the record type and
//! an in-memory implementation used by tests and local development.
//!
//! The contract is deliberately synchronous: one blocking `load` or `save`
//! call per operation, no streaming, no partial writes. All of the
//! interesting asynchrony (who may call save when, what happens on a
//! reconnect mid-save) lives in the coordinator's admission and departure
//! jobs, not here.

mod error;
mod gateway;
mod record;

pub use error::PersistError;
pub use gateway::{MemoryGateway, PersistGateway};
pub use record::PlayerRecord;
