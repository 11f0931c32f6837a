//! Error types for the persistence layer.

/// Errors surfaced by a persistence gateway.
///
/// A failed save is logged by the departure job and never blocks clearing
/// the pending-persistence entry — a player must not be locked out because
/// the backend hiccuped.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    /// The backend rejected or failed the operation.
    #[error("persistence backend error: {0}")]
    Backend(String),
}
