//! The live registry: every currently connected player, exactly once.
//!
//! # Concurrency note
//!
//! `LiveRegistry` is NOT thread-safe by itself — it is a plain `HashMap`
//! owned by the coordinator and accessed through a mutex held only for
//! the duration of a single lookup/insert/remove, never across an await.
//! Keeping the map dumb here keeps the lock discipline in one place.
//!
//! # Session-id matching
//!
//! Several operations take the expected session id as well as the player
//! id. Duplicate logins make the player id alone ambiguous: after an
//! eviction, a late disconnect notification from the OLD connection must
//! not remove the NEW session. Matching on the session id closes that
//! race.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use gatehouse_persist::PlayerRecord;
use gatehouse_protocol::{PlayerId, SessionId, WorkerId};

use crate::{ClientConnection, GateError, PlayerSession};

/// Registry of live sessions, keyed by player id. One entry per connected
/// player — inserting a duplicate evicts the prior holder first.
#[derive(Default)]
pub(crate) struct LiveRegistry {
    sessions: HashMap<PlayerId, PlayerSession>,
}

impl LiveRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Inserts a session, evicting any existing holder of the same player
    /// id first (evict-then-insert: the registry never momentarily shows
    /// two sessions for one id). Returns the evicted session so the
    /// caller can disconnect it.
    pub(crate) fn insert_evicting(
        &mut self,
        session: PlayerSession,
    ) -> Option<PlayerSession> {
        let evicted = self.sessions.remove(&session.player_id);
        self.sessions.insert(session.player_id, session);
        evicted
    }

    /// Removes and returns the session for `player_id`, but only if its
    /// session id matches. A mismatch means the caller is acting on a
    /// session that was already evicted — reported as `NotFound`.
    pub(crate) fn remove_matching(
        &mut self,
        player_id: PlayerId,
        session_id: SessionId,
    ) -> Result<PlayerSession, GateError> {
        match self.sessions.entry(player_id) {
            Entry::Occupied(entry) if entry.get().session_id == session_id => {
                Ok(entry.remove())
            }
            _ => Err(GateError::NotFound(player_id)),
        }
    }

    pub(crate) fn get(&self, player_id: PlayerId) -> Option<&PlayerSession> {
        self.sessions.get(&player_id)
    }

    /// Records the worker assignment made by the admission job. Returns
    /// `false` if the session is gone or was replaced while the job ran.
    pub(crate) fn assign_worker(
        &mut self,
        player_id: PlayerId,
        session_id: SessionId,
        worker_id: WorkerId,
    ) -> bool {
        match self.sessions.get_mut(&player_id) {
            Some(s) if s.session_id == session_id => {
                s.worker = Some(worker_id);
                true
            }
            _ => false,
        }
    }

    /// Replaces the cached durable record after the admission job
    /// reloaded it. Returns `false` if the session is gone or replaced.
    pub(crate) fn refresh_record(
        &mut self,
        player_id: PlayerId,
        session_id: SessionId,
        record: PlayerRecord,
    ) -> bool {
        match self.sessions.get_mut(&player_id) {
            Some(s) if s.session_id == session_id => {
                s.record = record;
                true
            }
            _ => false,
        }
    }

    /// The worker currently hosting this player, if placement completed.
    pub(crate) fn worker_of(&self, player_id: PlayerId) -> Option<WorkerId> {
        self.sessions.get(&player_id).and_then(|s| s.worker)
    }

    /// Completes login bookkeeping for ready-to-join. Returns the session
    /// id for the acknowledgement, or `None` if the player is not live.
    pub(crate) fn mark_login_complete(
        &mut self,
        player_id: PlayerId,
    ) -> Option<SessionId> {
        let session = self.sessions.get_mut(&player_id)?;
        session.login_complete = true;
        Some(session.session_id)
    }

    /// A stable snapshot of every live connection, for broadcast.
    pub(crate) fn connections(&self) -> Vec<ClientConnection> {
        self.sessions
            .values()
            .map(|s| s.connection.clone())
            .collect()
    }

    pub(crate) fn contains(&self, player_id: PlayerId) -> bool {
        self.sessions.contains_key(&player_id)
    }

    pub(crate) fn len(&self) -> usize {
        self.sessions.len()
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Identity;
    use gatehouse_persist::PlayerRecord;

    fn session(player: u64, session_id: u64) -> PlayerSession {
        let identity = Identity {
            player_id: PlayerId(player),
            session_id: SessionId(session_id),
        };
        let (conn, _rx) = ClientConnection::pair(Some(identity));
        PlayerSession::new(identity, conn, PlayerRecord::new(PlayerId(player)))
    }

    #[test]
    fn test_insert_evicting_new_player_returns_none() {
        let mut registry = LiveRegistry::new();

        assert!(registry.insert_evicting(session(1, 10)).is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_insert_evicting_duplicate_returns_prior_session() {
        let mut registry = LiveRegistry::new();
        registry.insert_evicting(session(1, 10));

        let evicted = registry
            .insert_evicting(session(1, 11))
            .expect("prior holder should be evicted");

        assert_eq!(evicted.session_id, SessionId(10));
        // Exactly one session remains, and it is the new one.
        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.get(PlayerId(1)).unwrap().session_id,
            SessionId(11)
        );
    }

    #[test]
    fn test_remove_matching_wrong_session_id_returns_not_found() {
        let mut registry = LiveRegistry::new();
        registry.insert_evicting(session(1, 10));

        // A stale disconnect from an evicted connection must not remove
        // the live session.
        let result = registry.remove_matching(PlayerId(1), SessionId(9));

        assert!(matches!(result, Err(GateError::NotFound(p)) if p == PlayerId(1)));
        assert!(registry.contains(PlayerId(1)));
    }

    #[test]
    fn test_remove_matching_removes_and_returns_session() {
        let mut registry = LiveRegistry::new();
        registry.insert_evicting(session(1, 10));

        let removed = registry
            .remove_matching(PlayerId(1), SessionId(10))
            .unwrap();

        assert_eq!(removed.player_id, PlayerId(1));
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_assign_worker_stale_session_returns_false() {
        let mut registry = LiveRegistry::new();
        registry.insert_evicting(session(1, 10));
        registry.insert_evicting(session(1, 11)); // evicts session 10

        // The admission job for the evicted session must not place the
        // new session.
        assert!(!registry.assign_worker(PlayerId(1), SessionId(10), WorkerId(7)));
        assert!(registry.worker_of(PlayerId(1)).is_none());

        assert!(registry.assign_worker(PlayerId(1), SessionId(11), WorkerId(7)));
        assert_eq!(registry.worker_of(PlayerId(1)), Some(WorkerId(7)));
    }

    #[test]
    fn test_refresh_record_replaces_cached_record() {
        let mut registry = LiveRegistry::new();
        registry.insert_evicting(session(1, 10));
        let mut fresh = PlayerRecord::new(PlayerId(1));
        fresh.level = 30;

        assert!(registry.refresh_record(PlayerId(1), SessionId(10), fresh));
        assert_eq!(registry.get(PlayerId(1)).unwrap().record.level, 30);
    }

    #[test]
    fn test_mark_login_complete_unknown_player_returns_none() {
        let mut registry = LiveRegistry::new();
        assert!(registry.mark_login_complete(PlayerId(9)).is_none());
    }

    #[test]
    fn test_connections_snapshots_all_live_sessions() {
        let mut registry = LiveRegistry::new();
        registry.insert_evicting(session(1, 10));
        registry.insert_evicting(session(2, 20));

        assert_eq!(registry.connections().len(), 2);
    }
}
