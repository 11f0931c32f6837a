//! Protocol types shared across Gatehouse.
//!
//! Gatehouse deliberately does NOT define a wire format — encoding and
//! decoding happen in the transport layer, which is an external
//! collaborator. What lives here is everything the coordinator needs to
//! reason about a message once it has been decoded:
//!
//! 1. **Identity** — who is speaking ([`PlayerId`], [`SessionId`]) and
//!    where they live ([`WorkerId`])
//! 2. **Sub-channels** — which logical service a frame belongs to
//!    ([`SubChannel`])
//! 3. **Message kinds** — what the client said ([`ClientMessage`]) and
//!    what the server answers ([`ServerMessage`])
//! 4. **Receipt stamping** — the [`Inbound`] envelope that carries server
//!    receipt timestamps attached before any routing decision

mod error;
mod inbound;
mod types;

pub use error::ProtocolError;
pub use inbound::Inbound;
pub use types::{
    ClientMessage, GamePayload, PlayerId, ServerMessage, SessionId,
    SubChannel, WorkerId,
};
