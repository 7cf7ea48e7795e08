//! Mutual exclusion between genuine transactions and capture cycles.

use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

/// Serializes chain-mutating windows.
///
/// A capture cycle snapshots the chain, mines a throwaway transaction and
/// reverts; a genuine transaction mined inside that window would silently
/// vanish on revert. Holding the permit for the whole window rules that out.
/// Waiters are queued fairly, so requests resume in arrival order.
#[derive(Debug, Clone, Default)]
pub struct Gate {
    inner: Arc<Mutex<()>>,
}

/// Exclusive hold on the gate; released when dropped, on every exit path.
pub struct GatePermit {
    _guard: OwnedMutexGuard<()>,
}

impl Gate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits in FIFO order and holds the gate until the permit is dropped.
    pub async fn acquire(&self) -> GatePermit {
        GatePermit {
            _guard: self.inner.clone().lock_owned().await,
        }
    }

    /// Whether the gate is currently held. Advisory only; the answer can be
    /// stale by the time the caller acts on it.
    pub fn is_held(&self) -> bool {
        self.inner.try_lock().is_err()
    }
}
