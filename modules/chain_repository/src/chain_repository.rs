//! Arbor chain repository
//! Stores blocks, receipts and transaction locations, tracks forks and the best block.

pub mod block_store;
pub mod cache;
pub mod chain_index;
pub mod repository_config;
pub mod repository_error;
pub mod repository_observer;
pub mod stores;
pub mod tx_index;

use std::sync::{Arc, Mutex, RwLock};

use anyhow::anyhow;
use arbor_common::{
    Block, BlockHash, BlockHeader, BlockNumber, Receipt, Transaction, TxHash, TxLocation,
};
use config::Config;
use tracing::{debug, info, warn};

use crate::block_store::BlockStore;
use crate::cache::{BlockCacheStats, BlockCaches};
use crate::chain_index::{ChainIndex, ForkHead};
use crate::stores::{decode, encode, Column, KeyValueStore, WriteBatch};
use crate::tx_index::TxIndex;

pub use crate::chain_index::Reorg;
pub use crate::repository_config::{RepositoryConfig, TxIndexMode};
pub use crate::repository_error::{Lookup, RepositoryError, Result};
pub use crate::repository_observer::ChainObserver;

const GENESIS_KEY: &[u8] = b"genesis";

/// Block repository rooted at one genesis block.
///
/// Block content is append-only. The best block pointer moves only through
/// [`Repository::set_best_block_id`].
pub struct Repository {
    store: Arc<dyn KeyValueStore>,
    caches: Arc<BlockCaches>,
    blocks: Arc<BlockStore>,
    txs: TxIndex,
    chain: ChainIndex,
    genesis: Block,
    chain_tag: u8,

    /// Serialises best block updates
    best_lock: Mutex<()>,
    observers: RwLock<Vec<Arc<dyn ChainObserver>>>,
}

impl Repository {
    /// Open a repository with default settings.
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        genesis: Block,
        genesis_receipts: Vec<Receipt>,
    ) -> Result<Self> {
        Self::with_config(store, RepositoryConfig::default(), genesis, genesis_receipts)
    }

    /// Open the store and settings named by `config`.
    pub fn open(
        config: Arc<Config>,
        genesis: Block,
        genesis_receipts: Vec<Receipt>,
    ) -> Result<Self> {
        let settings = RepositoryConfig::from_config(&config)?;
        let store = stores::open_store(config)?;
        Self::with_config(store, settings, genesis, genesis_receipts)
    }

    /// Open a repository over `store`.
    ///
    /// An empty store is initialised with the genesis block as best block. A store
    /// that already holds a genesis must hold this one; its best block, canonical
    /// chain and fork heads are restored.
    pub fn with_config(
        store: Arc<dyn KeyValueStore>,
        config: RepositoryConfig,
        genesis: Block,
        genesis_receipts: Vec<Receipt>,
    ) -> Result<Self> {
        let caches = Arc::new(BlockCaches::new(&config));
        let blocks = Arc::new(BlockStore::new(store.clone(), caches.clone()));
        let txs = TxIndex::new(store.clone(), caches.clone(), config.tx_index);
        let genesis_id = genesis.id();

        match store.get(Column::Meta, GENESIS_KEY)? {
            Some(bytes) => {
                let stored = decode::<BlockHash>(Column::Meta, &bytes)?;
                if stored != genesis_id {
                    return Err(RepositoryError::GenesisMismatch {
                        stored,
                        supplied: genesis_id,
                    });
                }
            }
            None => {
                // The root bypasses score checks but must sit at number 0
                if !genesis.header.is_genesis() {
                    return Err(RepositoryError::InvalidLink {
                        id: genesis_id,
                        parent: genesis.header.parent_id,
                    });
                }
                let mut batch = WriteBatch::new();
                blocks.stage_body(&mut batch, &genesis_id, &genesis.body);
                txs.stage_receipts(&mut batch, &genesis_id, &genesis_receipts);
                txs.stage_locations(&mut batch, [(genesis_id, &genesis.body)])?;
                blocks.stage_header(&mut batch, &genesis_id, &genesis.header);
                batch.put(Column::Meta, GENESIS_KEY, encode(&genesis_id));
                store.commit(batch)?;
                debug!("Stored genesis block {genesis_id}");
            }
        }

        let chain = ChainIndex::load(blocks.clone(), &*store, genesis_id)?;
        let chain_tag = genesis_id[31];
        let best = chain.view();
        info!(
            "Opened repository with genesis {genesis_id}, chain tag {chain_tag:#04x}, best {} ({})",
            best.best_header().number(),
            best.best_id()
        );

        Ok(Self {
            store,
            caches,
            blocks,
            txs,
            chain,
            genesis,
            chain_tag,
            best_lock: Mutex::new(()),
            observers: RwLock::new(Vec::new()),
        })
    }

    pub fn genesis_block(&self) -> &Block {
        &self.genesis
    }

    /// Network identifier: the last byte of the genesis id.
    pub fn chain_tag(&self) -> u8 {
        self.chain_tag
    }

    pub fn tx_index_mode(&self) -> TxIndexMode {
        self.txs.mode()
    }

    pub fn best_block_header(&self) -> Arc<BlockHeader> {
        self.chain.view().best_header().clone()
    }

    pub fn best_block_id(&self) -> BlockHash {
        self.chain.best_id()
    }

    pub fn best_block(&self) -> Result<Block> {
        self.blocks.get_block(&self.chain.best_id())
    }

    /// Store a block with its receipts. Does not move the best block.
    ///
    /// Adding a stored block again succeeds without writing.
    pub fn add_block(&self, block: &Block, receipts: &[Receipt]) -> Result<()> {
        let id = block.id();
        if self.blocks.has_block(&id)? {
            debug!("Block {id} already stored");
            return Ok(());
        }

        if let Err(e) = self.validate(&id, block, receipts) {
            warn!("Rejected block {id}: {e}");
            return Err(e);
        }

        let mut batch = WriteBatch::new();
        self.blocks.stage_body(&mut batch, &id, &block.body);
        self.txs.stage_receipts(&mut batch, &id, receipts);

        {
            let mut forks = self.chain.lock_forks();
            // Lost a race with an add of the same block
            if self.blocks.has_block(&id)? {
                debug!("Block {id} already stored");
                return Ok(());
            }
            if self.txs.mode() == TxIndexMode::AllForks {
                self.txs.stage_locations(&mut batch, [(id, &block.body)])?;
            }
            let next = forks.with_block(id, &block.header);
            next.stage(&mut batch);
            self.blocks.stage_header(&mut batch, &id, &block.header);
            self.store.commit(batch)?;
            *forks = next;
        }

        self.blocks.cache_block(id, block);
        self.txs.cache_receipts(id, receipts.to_vec());
        debug!(
            "Added block {} ({id}) with {} transactions",
            block.number(),
            block.transactions().len()
        );

        for observer in self.observers.read().unwrap().iter() {
            observer.block_added(id, &block.header);
        }
        Ok(())
    }

    fn validate(&self, id: &BlockHash, block: &Block, receipts: &[Receipt]) -> Result<()> {
        self.blocks.check_link(block)?;
        let transactions = block.transactions().len();
        if receipts.len() != transactions {
            return Err(RepositoryError::ReceiptMismatch {
                id: *id,
                transactions,
                receipts: receipts.len(),
            });
        }
        Ok(())
    }

    /// Make a stored block the head of the canonical chain.
    ///
    /// Fails with `NotFound` for an unknown id, leaving the best block unchanged.
    pub fn set_best_block_id(&self, id: &BlockHash) -> Result<()> {
        let _guard = self.best_lock.lock().unwrap();
        if self.chain.best_id() == *id {
            return Ok(());
        }

        let (view, reorg) = self.chain.prepare_best(id)?;
        let mut batch = WriteBatch::new();
        if self.txs.mode() == TxIndexMode::Canonical {
            let bodies = reorg
                .applied
                .iter()
                .map(|applied| Ok((*applied, self.blocks.get_body(applied)?)))
                .collect::<Result<Vec<_>>>()?;
            self.txs.stage_locations(
                &mut batch,
                bodies.iter().map(|(applied, body)| (*applied, body.as_ref())),
            )?;
        }
        self.chain.stage_best(&mut batch, id);
        self.store.commit(batch)?;

        let header = view.best_header().clone();
        self.chain.publish(view);
        info!(
            "Best block now {} ({id}), reverted {}, applied {}",
            header.number(),
            reorg.depth(),
            reorg.applied.len()
        );

        for observer in self.observers.read().unwrap().iter() {
            observer.best_block_changed(&header, &reorg);
        }
        Ok(())
    }

    pub fn has_block(&self, id: &BlockHash) -> Result<bool> {
        self.blocks.has_block(id)
    }

    pub fn get_block_header(&self, id: &BlockHash) -> Result<Arc<BlockHeader>> {
        self.blocks.get_header(id)
    }

    pub fn get_block(&self, id: &BlockHash) -> Result<Block> {
        self.blocks.get_block(id)
    }

    /// Transactions of a block, in block order.
    pub fn get_block_transactions(&self, id: &BlockHash) -> Result<Vec<Transaction>> {
        Ok(self.blocks.get_body(id)?.transactions.clone())
    }

    /// Receipts of a block, in transaction order.
    pub fn get_block_receipts(&self, id: &BlockHash) -> Result<Vec<Receipt>> {
        Ok(self.txs.get_receipts(id)?.as_ref().clone())
    }

    /// Id of the canonical block at `number`.
    pub fn get_block_id(&self, number: BlockNumber) -> Result<BlockHash> {
        self.chain.number_to_id(number)
    }

    /// Where a transaction was included, preferring the canonical chain.
    pub fn get_transaction_location(&self, tx_id: &TxHash) -> Result<TxLocation> {
        let view = self.chain.view();
        self.txs.resolve_location(tx_id, |block_id| Ok(view.contains(block_id)))
    }

    pub fn get_transaction(&self, tx_id: &TxHash) -> Result<(Transaction, TxLocation)> {
        let location = self.get_transaction_location(tx_id)?;
        let body = self.blocks.get_body(&location.block_id)?;
        let tx = body.transactions.get(location.index as usize).cloned().ok_or_else(|| {
            anyhow!("transaction {tx_id} indexed beyond the end of block {}", location.block_id)
        })?;
        Ok((tx, location))
    }

    pub fn get_transaction_receipt(&self, tx_id: &TxHash) -> Result<Receipt> {
        let location = self.get_transaction_location(tx_id)?;
        let receipts = self.txs.get_receipts(&location.block_id)?;
        let receipt = receipts.get(location.index as usize).cloned().ok_or_else(|| {
            anyhow!("receipt of {tx_id} indexed beyond the end of block {}", location.block_id)
        })?;
        Ok(receipt)
    }

    /// Lowest block that is an ancestor of both `a` and `b`.
    pub fn common_ancestor(&self, a: &BlockHash, b: &BlockHash) -> Result<BlockHash> {
        self.chain.common_ancestor(a, b)
    }

    /// True iff `id` lies on the path from `head` back to genesis.
    pub fn is_on_chain(&self, id: &BlockHash, head: &BlockHash) -> Result<bool> {
        self.chain.is_on_chain(id, head)
    }

    /// Id of the block at `number` on the branch ending at `head`.
    pub fn ancestor_id(&self, head: &BlockHash, number: BlockNumber) -> Result<BlockHash> {
        self.chain.ancestor_id(head, number)
    }

    /// Every stored block without a stored child, highest total score first and
    /// first seen first among equal scores.
    pub fn heads(&self) -> Vec<ForkHead> {
        self.chain.heads()
    }

    pub fn subscribe(&self, observer: Arc<dyn ChainObserver>) {
        self.observers.write().unwrap().push(observer);
    }

    pub fn cache_stats(&self) -> BlockCacheStats {
        self.caches.stats()
    }

    /// Make everything committed so far durable.
    pub fn flush(&self) -> Result<()> {
        Ok(self.store.flush()?)
    }
}

impl Drop for Repository {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            warn!("Failed to flush repository: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::memory::MemoryStore;
    use arbor_common::{genesis::GenesisBuilder, BlockBuilder};

    fn init_repository() -> Repository {
        let (genesis, receipts) = GenesisBuilder::devnet().build();
        Repository::new(Arc::new(MemoryStore::new()), genesis, receipts).unwrap()
    }

    #[test]
    fn should_start_at_genesis() {
        let repo = init_repository();
        assert_eq!(&repo.best_block().unwrap(), repo.genesis_block());
        assert_eq!(repo.chain_tag(), repo.genesis_block().id()[31]);
        assert_eq!(repo.get_block_id(0).unwrap(), repo.genesis_block().id());
        assert_eq!(repo.heads().len(), 1);
    }

    #[test]
    fn should_update_heads_but_not_best_on_add() {
        let repo = init_repository();
        let genesis_id = repo.genesis_block().id();
        let b1 = BlockBuilder::new().parent_id(genesis_id).total_score(1).build();
        repo.add_block(&b1, &[]).unwrap();

        assert_eq!(repo.best_block_id(), genesis_id);
        let heads: Vec<_> = repo.heads().iter().map(|h| h.id).collect();
        assert_eq!(heads, vec![b1.id()]);
    }

    #[test]
    fn should_serve_added_block_from_cache() {
        let repo = init_repository();
        let b1 =
            BlockBuilder::new().parent_id(repo.genesis_block().id()).total_score(1).build();
        repo.add_block(&b1, &[]).unwrap();

        let before = repo.cache_stats();
        assert_eq!(repo.get_block_header(&b1.id()).unwrap().as_ref(), &b1.header);
        assert_eq!(repo.cache_stats().headers.hits, before.headers.hits + 1);
    }

    #[test]
    fn should_ignore_set_best_to_current_best() {
        let repo = init_repository();
        let genesis_id = repo.genesis_block().id();
        repo.set_best_block_id(&genesis_id).unwrap();
        assert_eq!(repo.best_block_id(), genesis_id);
    }
}
