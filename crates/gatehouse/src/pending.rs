//! The pending-persistence registry: in-flight saves, at most one per player.
//!
//! Presence of an entry means "this player's durable record is not yet
//! safe to reload". Entries are added exactly when a departure job starts
//! (before the job task is spawned, so an admission job racing in can
//! never miss it) and removed exactly when that job terminates — success,
//! failure, or timeout alike. A stuck entry would permanently lock a
//! player out, so clearing is unconditional.
//!
//! Same concurrency contract as the live registry: a plain map, guarded
//! by the coordinator's mutex, locked only for single operations.

use std::collections::HashMap;
use std::time::Instant;

use gatehouse_protocol::{PlayerId, SessionId};

/// Marker for one in-flight save.
///
/// This is deliberately a marker, not the task's `JoinHandle`: the entry
/// must exist before the job is spawned, otherwise the job could finish
/// and try to clear an entry that was never inserted.
#[derive(Debug, Clone)]
pub(crate) struct PendingSave {
    /// The session whose departure started this save.
    pub(crate) session_id: SessionId,
    /// When the save job started, for diagnostics and timeout logging.
    pub(crate) since: Instant,
}

/// Registry of in-flight persistence jobs, keyed by player id.
#[derive(Default)]
pub(crate) struct PendingSaves {
    saves: HashMap<PlayerId, PendingSave>,
}

impl PendingSaves {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Registers a save for this player. Returns `false` (and changes
    /// nothing) if one is already in flight — the invariant is at most
    /// one persistence job per player id.
    pub(crate) fn begin(
        &mut self,
        player_id: PlayerId,
        session_id: SessionId,
    ) -> bool {
        if self.saves.contains_key(&player_id) {
            return false;
        }
        self.saves.insert(
            player_id,
            PendingSave {
                session_id,
                since: Instant::now(),
            },
        );
        true
    }

    /// Clears the entry for this player, returning it if present.
    pub(crate) fn finish(&mut self, player_id: PlayerId) -> Option<PendingSave> {
        self.saves.remove(&player_id)
    }

    /// Whether a save is in flight for this player.
    pub(crate) fn contains(&self, player_id: PlayerId) -> bool {
        self.saves.contains_key(&player_id)
    }

    pub(crate) fn len(&self) -> usize {
        self.saves.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.saves.is_empty()
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn pid(id: u64) -> PlayerId {
        PlayerId(id)
    }

    #[test]
    fn test_begin_first_save_succeeds() {
        let mut pending = PendingSaves::new();

        assert!(pending.begin(pid(1), SessionId(10)));
        assert!(pending.contains(pid(1)));
        assert_eq!(pending.len(), 1);
    }

    #[test]
    fn test_begin_second_save_same_player_is_rejected() {
        let mut pending = PendingSaves::new();
        pending.begin(pid(1), SessionId(10));

        assert!(!pending.begin(pid(1), SessionId(11)));

        // The original entry is untouched.
        assert_eq!(pending.finish(pid(1)).unwrap().session_id, SessionId(10));
    }

    #[test]
    fn test_finish_clears_entry() {
        let mut pending = PendingSaves::new();
        pending.begin(pid(1), SessionId(10));

        assert!(pending.finish(pid(1)).is_some());
        assert!(!pending.contains(pid(1)));
        assert!(pending.is_empty());
    }

    #[test]
    fn test_finish_absent_entry_returns_none() {
        let mut pending = PendingSaves::new();
        assert!(pending.finish(pid(9)).is_none());
    }

    #[test]
    fn test_begin_after_finish_succeeds() {
        // A player can depart again once the previous save completed.
        let mut pending = PendingSaves::new();
        pending.begin(pid(1), SessionId(10));
        pending.finish(pid(1));

        assert!(pending.begin(pid(1), SessionId(11)));
    }
}
