//! The gateway trait and the in-memory implementation.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use gatehouse_protocol::PlayerId;

use crate::{PersistError, PlayerRecord};

/// Synchronous load/save of a player's durable record.
///
/// Production implementations wrap the real persistence engine. The
/// coordinator calls these from its departure/admission jobs and relies on
/// two properties:
///
/// - `load` for a player never seen before succeeds with a fresh record
///   (first login is not an error).
/// - `save` either fully writes the record or fails; there are no partial
///   writes to reason about.
///
/// `Send + Sync + 'static` because the gateway is shared across every
/// admission and departure task for the life of the server.
pub trait PersistGateway: Send + Sync + 'static {
    /// Loads the durable record for a player, creating a fresh one on
    /// first sight.
    fn load(&self, player_id: PlayerId) -> Result<PlayerRecord, PersistError>;

    /// Writes the record back. Success means the write is durable.
    fn save(&self, record: &PlayerRecord) -> Result<(), PersistError>;
}

/// Sharing a gateway between the coordinator and an observer (a test
/// asserting on what got saved, a metrics exporter) just wraps it in an
/// `Arc`.
impl<G: PersistGateway> PersistGateway for std::sync::Arc<G> {
    fn load(&self, player_id: PlayerId) -> Result<PlayerRecord, PersistError> {
        (**self).load(player_id)
    }

    fn save(&self, record: &PlayerRecord) -> Result<(), PersistError> {
        (**self).save(record)
    }
}

/// In-memory gateway for tests and local development.
///
/// Two fault-injection knobs drive the coordinator's test suite:
///
/// - [`with_save_delay`](Self::with_save_delay) makes every `save` block
///   for a fixed duration, which is how the "reconnect while the previous
///   save is still in flight" ordering scenarios are exercised.
/// - [`set_fail_saves`](Self::set_fail_saves) makes `save` return a
///   backend error, verifying that a failed save still clears the
///   pending-persistence entry.
#[derive(Default)]
pub struct MemoryGateway {
    records: Mutex<HashMap<PlayerId, PlayerRecord>>,
    save_delay: Duration,
    fail_saves: AtomicBool,
    loads: AtomicU64,
    saves: AtomicU64,
}

impl MemoryGateway {
    /// An empty gateway with no artificial delay.
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty gateway whose `save` blocks for `delay` before completing.
    ///
    /// The delay is a real blocking sleep, standing in for a slow
    /// backend. The coordinator runs gateway calls on the blocking
    /// thread pool, so the sleep stalls only the call that made it.
    pub fn with_save_delay(delay: Duration) -> Self {
        Self {
            save_delay: delay,
            ..Self::default()
        }
    }

    /// Makes subsequent `save` calls fail (or succeed again).
    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Number of `load` calls served.
    pub fn load_count(&self) -> u64 {
        self.loads.load(Ordering::SeqCst)
    }

    /// Number of `save` calls attempted (including failed ones).
    pub fn save_count(&self) -> u64 {
        self.saves.load(Ordering::SeqCst)
    }

    /// Reads a stored record without counting as a gateway load.
    pub fn peek(&self, player_id: PlayerId) -> Option<PlayerRecord> {
        self.records
            .lock()
            .expect("record map poisoned")
            .get(&player_id)
            .cloned()
    }
}

impl PersistGateway for MemoryGateway {
    fn load(&self, player_id: PlayerId) -> Result<PlayerRecord, PersistError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        let records = self.records.lock().expect("record map poisoned");
        let record = records
            .get(&player_id)
            .cloned()
            .unwrap_or_else(|| PlayerRecord::new(player_id));
        tracing::debug!(%player_id, level = record.level, "record loaded");
        Ok(record)
    }

    fn save(&self, record: &PlayerRecord) -> Result<(), PersistError> {
        self.saves.fetch_add(1, Ordering::SeqCst);

        if !self.save_delay.is_zero() {
            std::thread::sleep(self.save_delay);
        }

        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(PersistError::Backend("injected save failure".into()));
        }

        self.records
            .lock()
            .expect("record map poisoned")
            .insert(record.player_id, record.clone());
        tracing::debug!(
            player_id = %record.player_id,
            level = record.level,
            "record saved"
        );
        Ok(())
    }
}

// =========================================================================
// Tests
// =========================================================================
