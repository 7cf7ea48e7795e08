//! Scoped wrapper over the node's state-checkpoint primitives.

use covtrace_rpc::client::NodeClient;
use ethereum_types::U256;
use tracing::{debug, warn};

use crate::error::InterceptorError;

/// A chain-state checkpoint that must be rolled back explicitly.
///
/// Revert is node I/O, so there is no implicit rollback on drop; capture
/// paths call [`Snapshot::revert`] on every exit, error paths included.
#[must_use = "an unreverted snapshot leaks synthetic state into the chain"]
pub struct Snapshot {
    id: U256,
}

impl Snapshot {
    /// Checkpoints all chain state via `evm_snapshot`.
    pub async fn take(node: &dyn NodeClient) -> Result<Self, InterceptorError> {
        let id = node.take_snapshot().await?;
        debug!(snapshot = %id, "took chain snapshot");
        Ok(Self { id })
    }

    pub fn id(&self) -> U256 {
        self.id
    }

    /// Rolls the chain back to the checkpoint, undoing everything mined
    /// since [`Snapshot::take`]. A node-side refusal is logged, not masked:
    /// the ids are single-use and a refusal means the state was already
    /// rolled past this point.
    pub async fn revert(self, node: &dyn NodeClient) -> Result<(), InterceptorError> {
        let reverted = node.revert_snapshot(self.id).await?;
        if !reverted {
            warn!(snapshot = %self.id, "node refused to revert snapshot");
        }
        Ok(())
    }
}
