//! The credential-verification seam.
//!
//! Gatehouse does not verify credentials itself — the session registry
//! that does is an external collaborator (platform auth, tickets, JWTs).
//! The [`CredentialVerifier`] trait is the narrow interface the transport
//! layer calls before handing a connection to the coordinator: verified
//! connections carry an [`Identity`], unverified ones are rejected with
//! `NoSession` the moment they try to do anything session-scoped.

use gatehouse_protocol::{PlayerId, SessionId};
use rand::Rng;

use crate::Identity;

/// Verifies a client's credentials and mints a per-login identity.
///
/// Returns `None` when the credentials are rejected — mirroring the
/// session registry's "verify or nothing" contract. `Send + Sync +
/// 'static` because the verifier is shared across all accept tasks for
/// the life of the server.
pub trait CredentialVerifier: Send + Sync + 'static {
    /// Verifies credentials and returns the identity for this login,
    /// or `None` if the credentials are rejected.
    fn verify_credentials(
        &self,
        credentials: &str,
    ) -> impl std::future::Future<Output = Option<Identity>> + Send;
}

/// Development verifier: treats the credential string as the numeric
/// player id and mints a random session id.
///
/// Never use outside tests and local development — anyone can claim any
/// player id.
pub struct TokenVerifier;

impl CredentialVerifier for TokenVerifier {
    async fn verify_credentials(&self, credentials: &str) -> Option<Identity> {
        let player_id: u64 = credentials.parse().ok()?;
        let session_id: u64 = rand::rng().random();
        Some(Identity {
            player_id: PlayerId(player_id),
            session_id: SessionId(session_id),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_verify_credentials_numeric_token_yields_identity() {
        let identity = TokenVerifier
            .verify_credentials("42")
            .await
            .expect("numeric token should verify");

        assert_eq!(identity.player_id, PlayerId(42));
    }

    #[tokio::test]
    async fn test_verify_credentials_non_numeric_token_is_rejected() {
        assert!(TokenVerifier.verify_credentials("nope").await.is_none());
    }

    #[tokio::test]
    async fn test_verify_credentials_mints_fresh_session_ids() {
        let a = TokenVerifier.verify_credentials("1").await.unwrap();
        let b = TokenVerifier.verify_credentials("1").await.unwrap();
        // Same player, two logins, two session ids.
        assert_eq!(a.player_id, b.player_id);
        assert_ne!(a.session_id, b.session_id);
    }
}
