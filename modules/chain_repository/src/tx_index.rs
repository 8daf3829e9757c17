//! Receipts per block and the reverse transaction location index.

use std::collections::{hash_map::Entry, HashMap};
use std::sync::Arc;

use arbor_common::{BlockBody, BlockHash, Receipt, TxHash, TxLocation};

use crate::cache::BlockCaches;
use crate::repository_config::TxIndexMode;
use crate::repository_error::{Lookup, RepositoryError, Result};
use crate::stores::{decode, encode, Column, KeyValueStore, WriteBatch};

/// Receipts keyed by block id and transaction locations keyed by transaction id.
///
/// A transaction can be included by blocks on several forks, so each transaction id
/// maps to every location recorded for it, first seen first.
pub struct TxIndex {
    store: Arc<dyn KeyValueStore>,
    caches: Arc<BlockCaches>,
    mode: TxIndexMode,
}

impl TxIndex {
    pub fn new(store: Arc<dyn KeyValueStore>, caches: Arc<BlockCaches>, mode: TxIndexMode) -> Self {
        Self {
            store,
            caches,
            mode,
        }
    }

    pub fn mode(&self) -> TxIndexMode {
        self.mode
    }

    pub fn get_receipts(&self, id: &BlockHash) -> Result<Arc<Vec<Receipt>>> {
        if let Some(receipts) = self.caches.receipts.get(id) {
            return Ok(receipts);
        }
        let Some(bytes) = self.store.get(Column::Receipts, id.as_ref())? else {
            return Err(RepositoryError::NotFound(Lookup::Block(*id)));
        };
        let receipts = Arc::new(decode::<Vec<Receipt>>(Column::Receipts, &bytes)?);
        self.caches.receipts.insert(*id, receipts.clone());
        Ok(receipts)
    }

    pub(crate) fn stage_receipts(
        &self,
        batch: &mut WriteBatch,
        id: &BlockHash,
        receipts: &[Receipt],
    ) {
        batch.put(Column::Receipts, id, encode(receipts));
    }

    pub(crate) fn cache_receipts(&self, id: BlockHash, receipts: Vec<Receipt>) {
        self.caches.receipts.insert(id, Arc::new(receipts));
    }

    /// Every recorded location of a transaction, first seen first.
    pub fn find_locations(&self, tx_id: &TxHash) -> Result<Vec<TxLocation>> {
        let Some(bytes) = self.store.get(Column::TxLocations, tx_id.as_ref())? else {
            return Ok(Vec::new());
        };
        Ok(decode::<Vec<TxLocation>>(Column::TxLocations, &bytes)?)
    }

    /// Stage location records for every transaction of the given blocks.
    ///
    /// Read-modify-write: the caller must serialise calls that may touch the same
    /// transaction ids until the batch is committed.
    pub(crate) fn stage_locations<'a>(
        &self,
        batch: &mut WriteBatch,
        blocks: impl IntoIterator<Item = (BlockHash, &'a BlockBody)>,
    ) -> Result<()> {
        let mut pending: HashMap<TxHash, Vec<TxLocation>> = HashMap::new();
        let mut order = Vec::new();
        for (block_id, body) in blocks {
            for (index, tx) in body.transactions.iter().enumerate() {
                let tx_id = tx.id();
                let location = TxLocation {
                    block_id,
                    index: index as u32,
                };
                let locations = match pending.entry(tx_id) {
                    Entry::Occupied(entry) => entry.into_mut(),
                    Entry::Vacant(entry) => {
                        order.push(tx_id);
                        entry.insert(self.find_locations(&tx_id)?)
                    }
                };
                if !locations.contains(&location) {
                    locations.push(location);
                }
            }
        }
        for tx_id in order {
            if let Some(locations) = pending.remove(&tx_id) {
                batch.put(Column::TxLocations, tx_id, encode(&locations));
            }
        }
        Ok(())
    }

    /// Pick the location a lookup should report.
    ///
    /// The canonical location wins. Without one, all-forks mode falls back to the first
    /// seen location and canonical mode reports nothing.
    pub fn resolve_location(
        &self,
        tx_id: &TxHash,
        is_canonical: impl Fn(&BlockHash) -> Result<bool>,
    ) -> Result<TxLocation> {
        let locations = self.find_locations(tx_id)?;
        for location in &locations {
            if is_canonical(&location.block_id)? {
                return Ok(*location);
            }
        }
        match (self.mode, locations.first()) {
            (TxIndexMode::AllForks, Some(first)) => Ok(*first),
            _ => Err(RepositoryError::NotFound(Lookup::Transaction(*tx_id))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository_config::RepositoryConfig;
    use crate::stores::memory::MemoryStore;
    use arbor_common::Transaction;

    fn init_index(mode: TxIndexMode) -> (TxIndex, Arc<MemoryStore>) {
        let memory = Arc::new(MemoryStore::new());
        let caches = Arc::new(BlockCaches::new(&RepositoryConfig::default()));
        (TxIndex::new(memory.clone(), caches, mode), memory)
    }

    fn tx(nonce: u64) -> Transaction {
        Transaction {
            nonce,
            ..Default::default()
        }
    }

    fn body(txs: &[Transaction]) -> BlockBody {
        BlockBody {
            transactions: txs.to_vec(),
        }
    }

    fn index_blocks(index: &TxIndex, kv: &MemoryStore, blocks: &[(BlockHash, BlockBody)]) {
        let mut batch = WriteBatch::new();
        index.stage_locations(&mut batch, blocks.iter().map(|(id, body)| (*id, body))).unwrap();
        kv.commit(batch).unwrap();
    }

    #[test]
    fn should_record_position_in_block() {
        let (index, kv) = init_index(TxIndexMode::AllForks);
        let block = BlockHash::new([1; 32]);
        index_blocks(&index, &kv, &[(block, body(&[tx(1), tx(2)]))]);

        assert_eq!(
            index.find_locations(&tx(2).id()).unwrap(),
            vec![TxLocation {
                block_id: block,
                index: 1
            }]
        );
        assert!(index.find_locations(&tx(3).id()).unwrap().is_empty());
    }

    #[test]
    fn should_keep_locations_from_every_fork() {
        let (index, kv) = init_index(TxIndexMode::AllForks);
        let fork_a = BlockHash::new([1; 32]);
        let fork_b = BlockHash::new([2; 32]);
        index_blocks(&index, &kv, &[(fork_a, body(&[tx(1)]))]);
        index_blocks(&index, &kv, &[(fork_b, body(&[tx(0), tx(1)]))]);
        // Re-indexing is harmless
        index_blocks(&index, &kv, &[(fork_a, body(&[tx(1)]))]);

        let locations = index.find_locations(&tx(1).id()).unwrap();
        assert_eq!(locations.len(), 2);
        assert_eq!(locations[0].block_id, fork_a);
        assert_eq!(locations[1].block_id, fork_b);

        let on_b = index.resolve_location(&tx(1).id(), |id| Ok(*id == fork_b)).unwrap();
        assert_eq!(on_b.block_id, fork_b);
        assert_eq!(on_b.index, 1);
        let first_seen = index.resolve_location(&tx(1).id(), |_| Ok(false)).unwrap();
        assert_eq!(first_seen.block_id, fork_a);
    }

    #[test]
    fn should_report_only_canonical_locations_in_canonical_mode() {
        let (index, kv) = init_index(TxIndexMode::Canonical);
        let block = BlockHash::new([1; 32]);
        index_blocks(&index, &kv, &[(block, body(&[tx(1)]))]);

        assert!(index.resolve_location(&tx(1).id(), |_| Ok(false)).unwrap_err().is_not_found());
        assert_eq!(index.resolve_location(&tx(1).id(), |_| Ok(true)).unwrap().block_id, block);
    }

    #[test]
    fn should_cache_receipts_after_read() {
        let (index, kv) = init_index(TxIndexMode::AllForks);
        let block = BlockHash::new([4; 32]);
        let receipts = vec![Receipt {
            gas_used: 1,
            ..Default::default()
        }];
        let mut batch = WriteBatch::new();
        index.stage_receipts(&mut batch, &block, &receipts);
        kv.commit(batch).unwrap();

        assert_eq!(index.get_receipts(&block).unwrap().as_ref(), &receipts);
        assert_eq!(index.get_receipts(&block).unwrap().as_ref(), &receipts);
        assert_eq!(index.caches.receipts.stats().hits, 1);
        assert!(index.get_receipts(&BlockHash::default()).unwrap_err().is_not_found());
    }
}
