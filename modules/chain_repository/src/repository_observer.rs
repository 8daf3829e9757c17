//! Observer trait for repository events.

use arbor_common::{BlockHash, BlockHeader};

use crate::chain_index::Reorg;

/// Callback receiver for repository events.
///
/// Callbacks run on the thread that caused the event, after the change is committed
/// and visible to readers. Implementations must not call back into the repository
/// methods that write.
pub trait ChainObserver: Send + Sync {
    /// A block was stored for the first time.
    fn block_added(&self, _id: BlockHash, _header: &BlockHeader) {}

    /// The best block moved.
    ///
    /// `reorg` lists the blocks that left and joined the canonical chain.
    fn best_block_changed(&self, header: &BlockHeader, reorg: &Reorg);
}
