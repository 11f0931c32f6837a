//! The durable player record.

use gatehouse_protocol::PlayerId;
use serde::{Deserialize, Serialize};

/// A player's durable state, keyed by [`PlayerId`].
///
/// Loaded when a session is admitted, cached on the live session, and
/// written back by the departure job after the player's worker releases
/// them. The fields stand in for whatever the simulation persists;
/// what matters to the coordinator is only that the record is read and
/// written as a unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRecord {
    /// Which player this record belongs to.
    pub player_id: PlayerId,

    /// Progression level.
    pub level: u32,

    /// Accumulated experience.
    pub experience: u64,

    /// Wall-clock time of the last successful save, milliseconds since
    /// the Unix epoch. Zero for a record that has never been saved.
    pub last_save_wall_ms: u64,
}

impl PlayerRecord {
    /// A fresh record for a player seen for the first time.
    pub fn new(player_id: PlayerId) -> Self {
        Self {
            player_id,
            level: 1,
            experience: 0,
            last_save_wall_ms: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_record_starts_at_level_one_unsaved() {
        let record = PlayerRecord::new(PlayerId(5));
        assert_eq!(record.player_id, PlayerId(5));
        assert_eq!(record.level, 1);
        assert_eq!(record.experience, 0);
        assert_eq!(record.last_save_wall_ms, 0);
    }
}
