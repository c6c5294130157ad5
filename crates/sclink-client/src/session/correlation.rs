use dashmap::DashMap;
use tokio::sync::oneshot;

use std::sync::atomic::{AtomicU64, Ordering};

use sclink_core::protocol::Response;
use sclink_core::ScError;

/// Receiving half of a pending request.
pub type PendingSlot = oneshot::Receiver<Result<Response, ScError>>;

struct PendingEntry {
    tx: oneshot::Sender<Result<Response, ScError>>,
    generation: u64,
}

/// Correlation table:
/// - `request id -> pending slot`
/// - monotonic id allocation (first id is 1)
///
/// Every entry is fulfilled at most once; resolving or failing removes it.
pub struct CorrelationTable {
    pending: DashMap<u64, PendingEntry>,
    next_id: AtomicU64,
}

impl Default for CorrelationTable {
    fn default() -> Self {
        Self::new()
    }
}

impl CorrelationTable {
    pub fn new() -> Self {
        Self {
            pending: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Next request id.
    pub fn allocate(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Restart numbering at 1. Only valid while nothing is outstanding.
    pub fn reset(&self) {
        self.next_id.store(1, Ordering::Relaxed);
    }

    /// Register a slot for `id`, sent on channel `generation`.
    /// A previous slot for the same id is dropped (its waiter sees a closed slot).
    pub fn register(&self, id: u64, generation: u64) -> PendingSlot {
        let (tx, rx) = oneshot::channel();
        self.pending.insert(id, PendingEntry { tx, generation });
        rx
    }

    /// Fulfil `id` with a response. Unknown ids are ignored.
    pub fn resolve(&self, id: u64, response: Response) -> bool {
        match self.pending.remove(&id) {
            Some((_, entry)) => entry.tx.send(Ok(response)).is_ok(),
            None => false,
        }
    }

    /// Fail `id`. Unknown ids are ignored.
    pub fn fail(&self, id: u64, err: ScError) -> bool {
        match self.pending.remove(&id) {
            Some((_, entry)) => entry.tx.send(Err(err)).is_ok(),
            None => false,
        }
    }

    /// Drop the slot without fulfilling it.
    pub fn forget(&self, id: u64) {
        self.pending.remove(&id);
    }

    /// Fail every slot registered on `generation` or earlier.
    pub fn fail_up_to(&self, generation: u64, err: &ScError) -> usize {
        let ids: Vec<u64> = self
            .pending
            .iter()
            .filter(|e| e.value().generation <= generation)
            .map(|e| *e.key())
            .collect();
        ids.into_iter()
            .filter(|id| self.fail(*id, err.clone()))
            .count()
    }

    /// Fail every slot.
    pub fn fail_all(&self, err: &ScError) -> usize {
        self.fail_up_to(u64::MAX, err)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
