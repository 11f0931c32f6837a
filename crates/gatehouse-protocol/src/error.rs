//! Error types for the protocol layer.

use crate::SubChannel;

/// Errors attributable to a malformed or misaddressed client message.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The message could not be interpreted (missing fields, wrong shape).
    /// Reported by the transport decoder; carried through for context.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// A client sent a frame on a channel that is server → client only.
    /// Fatal for the connection — this never happens with a conforming
    /// client.
    #[error("sub-channel {0} does not accept client messages")]
    ChannelNotInbound(SubChannel),
}
