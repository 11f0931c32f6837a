//! Worker pool: creates, tracks, and hands out worker instances.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use gatehouse_protocol::WorkerId;

use crate::worker::spawn_worker;
use crate::{WorkerConfig, WorkerHandle, WorkerInfo};

/// Counter for generating unique worker IDs.
static NEXT_WORKER_ID: AtomicU64 = AtomicU64::new(1);

/// Default command channel size for worker actors.
const DEFAULT_CHANNEL_SIZE: usize = 64;

/// Manages all active worker instances.
///
/// This is the placement entry point for the coordinator: "give me a
/// worker with room for one more player." No matchmaking policy beyond
/// first-available lives here.
pub struct WorkerPool {
    /// Active workers, keyed by worker ID.
    workers: HashMap<WorkerId, WorkerHandle>,

    /// Configuration applied to every worker this pool creates.
    config: WorkerConfig,
}

impl WorkerPool {
    /// Creates an empty pool. Workers are created on demand via
    /// [`create_worker`](Self::create_worker).
    pub fn new(config: WorkerConfig) -> Self {
        Self {
            workers: HashMap::new(),
            config,
        }
    }

    /// Spawns a new worker instance and returns its ID.
    pub fn create_worker(&mut self) -> WorkerId {
        let worker_id = WorkerId(NEXT_WORKER_ID.fetch_add(1, Ordering::Relaxed));
        let handle = spawn_worker(
            worker_id,
            self.config.clone(),
            DEFAULT_CHANNEL_SIZE,
        );
        self.workers.insert(worker_id, handle);
        tracing::info!(%worker_id, "worker created");
        worker_id
    }

    /// Cheap-clone snapshot of every worker handle.
    ///
    /// Load queries go through the handles, not the pool: callers take
    /// the snapshot under the pool lock and run the actor round trips
    /// after releasing it.
    pub fn handles(&self) -> Vec<WorkerHandle> {
        self.workers.values().cloned().collect()
    }

    /// Returns a handle to a specific worker, if it exists.
    pub fn worker_by_id(&self, worker_id: WorkerId) -> Option<WorkerHandle> {
        self.workers.get(&worker_id).cloned()
    }

    /// Returns the number of active workers.
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Removes every worker from the pool, returning the handles.
    ///
    /// The caller requests shutdown through the returned handles after
    /// releasing the pool lock. Players still resident are simply gone
    /// once an actor exits; callers that need saves to complete first
    /// drain them separately.
    pub fn drain_all(&mut self) -> Vec<WorkerHandle> {
        self.workers.drain().map(|(_, handle)| handle).collect()
    }
}

/// Finds the first of `handles` with spare capacity.
///
/// Queries each worker for its load; workers that fail to respond
/// (shutting down) are skipped. Returns `None` when every worker is full
/// or the list is empty — the caller decides whether that is fatal.
pub async fn first_with_capacity(
    handles: Vec<WorkerHandle>,
) -> Option<WorkerHandle> {
    for handle in handles {
        if let Ok(info) = handle.info().await {
            if info.has_capacity() {
                return Some(handle);
            }
        }
    }
    None
}

/// Collects load snapshots from the given workers. Unresponsive workers
/// are skipped.
pub async fn collect_infos(handles: Vec<WorkerHandle>) -> Vec<WorkerInfo> {
    let mut infos = Vec::with_capacity(handles.len());
    for handle in handles {
        if let Ok(info) = handle.info().await {
            infos.push(info);
        }
    }
    infos
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(WorkerConfig::default())
    }
}
