//! Canonical chain mapping and ancestry queries across forks.
//!
//! The canonical view (best header plus the id of every canonical block, indexed by
//! number) is an immutable snapshot swapped in whole when the best block moves.
//! Readers clone the `Arc` and never observe a half-updated mapping.
//!
//! Fork bookkeeping tracks the heads of all known branches: blocks that no stored
//! block names as its parent.

use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use arbor_common::{number_of, BlockHash, BlockHeader, BlockNumber};
use imbl::Vector;
use tracing::debug;

use crate::block_store::BlockStore;
use crate::repository_error::{Lookup, RepositoryError, Result};
use crate::stores::{decode, encode, Column, KeyValueStore, WriteBatch};

const BEST_BLOCK_KEY: &[u8] = b"best-block";
const FORK_HEADS_KEY: &[u8] = b"fork-heads";

/// The canonical chain as seen from one best block.
#[derive(Debug, Clone)]
pub struct CanonicalView {
    best: Arc<BlockHeader>,
    best_id: BlockHash,
    /// `ids[n]` is the canonical block at number `n`
    ids: Vector<BlockHash>,
}

impl CanonicalView {
    pub fn best_id(&self) -> BlockHash {
        self.best_id
    }

    pub fn best_header(&self) -> &Arc<BlockHeader> {
        &self.best
    }

    pub fn number_to_id(&self, number: BlockNumber) -> Option<BlockHash> {
        self.ids.get(number as usize).copied()
    }

    pub fn contains(&self, id: &BlockHash) -> bool {
        self.number_to_id(number_of(id)) == Some(*id)
    }
}

/// How the canonical chain changed when the best block moved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reorg {
    /// Last block shared by the old and the new chain
    pub ancestor: BlockHash,
    /// Blocks that left the canonical chain, highest first
    pub reverted: Vec<BlockHash>,
    /// Blocks that joined the canonical chain, lowest first
    pub applied: Vec<BlockHash>,
}

impl Reorg {
    /// Number of canonical blocks rolled back.
    pub fn depth(&self) -> usize {
        self.reverted.len()
    }
}

/// A branch head, in fork-choice order bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct ForkHead {
    #[n(0)]
    pub id: BlockHash,
    #[n(1)]
    pub total_score: u64,
    /// Arrival sequence; lower was seen first
    #[n(2)]
    pub seen: u64,
}

/// The set of branch heads.
#[derive(Debug, Clone, Default, minicbor::Encode, minicbor::Decode)]
pub struct ForkHeads {
    #[n(0)]
    heads: Vec<ForkHead>,
    #[n(1)]
    next_seen: u64,
}

impl ForkHeads {
    fn rooted_at(genesis: &BlockHeader, genesis_id: BlockHash) -> Self {
        Self {
            heads: vec![ForkHead {
                id: genesis_id,
                total_score: genesis.total_score,
                seen: 0,
            }],
            next_seen: 1,
        }
    }

    /// The heads after `header` is added: it replaces its parent if the parent was a head.
    pub fn with_block(&self, id: BlockHash, header: &BlockHeader) -> Self {
        let mut next = self.clone();
        next.heads.retain(|head| head.id != header.parent_id);
        next.heads.push(ForkHead {
            id,
            total_score: header.total_score,
            seen: next.next_seen,
        });
        next.next_seen += 1;
        next
    }

    /// Heads ordered for fork choice: higher total score first, then first seen.
    pub fn ordered(&self) -> Vec<ForkHead> {
        let mut heads = self.heads.clone();
        heads.sort_by(|a, b| b.total_score.cmp(&a.total_score).then(a.seen.cmp(&b.seen)));
        heads
    }

    pub(crate) fn stage(&self, batch: &mut WriteBatch) {
        batch.put(Column::Meta, FORK_HEADS_KEY, encode(self));
    }
}

pub struct ChainIndex {
    blocks: Arc<BlockStore>,
    view: RwLock<Arc<CanonicalView>>,
    forks: Mutex<ForkHeads>,
}

impl ChainIndex {
    /// Restore the index from the store, defaulting to a chain holding only genesis.
    pub fn load(
        blocks: Arc<BlockStore>,
        store: &dyn KeyValueStore,
        genesis_id: BlockHash,
    ) -> Result<Self> {
        let best_id = match store.get(Column::Meta, BEST_BLOCK_KEY)? {
            Some(bytes) => decode::<BlockHash>(Column::Meta, &bytes)?,
            None => genesis_id,
        };
        let forks = match store.get(Column::Meta, FORK_HEADS_KEY)? {
            Some(bytes) => decode::<ForkHeads>(Column::Meta, &bytes)?,
            None => ForkHeads::rooted_at(blocks.get_header(&genesis_id)?.as_ref(), genesis_id),
        };
        let view = Self::build_view(&blocks, best_id)?;

        Ok(Self {
            blocks,
            view: RwLock::new(Arc::new(view)),
            forks: Mutex::new(forks),
        })
    }

    /// Walk from `best_id` back to genesis.
    fn build_view(blocks: &BlockStore, best_id: BlockHash) -> Result<CanonicalView> {
        let best = blocks.get_header(&best_id)?;
        let mut ids = vec![best_id];
        let mut current = best.clone();
        while !current.is_genesis() {
            let parent_id = current.parent_id;
            ids.push(parent_id);
            current = blocks.get_header(&parent_id)?;
        }
        ids.reverse();
        Ok(CanonicalView {
            best,
            best_id,
            ids: ids.into_iter().collect(),
        })
    }

    /// Snapshot of the current canonical chain.
    pub fn view(&self) -> Arc<CanonicalView> {
        self.view.read().unwrap().clone()
    }

    pub fn best_id(&self) -> BlockHash {
        self.view().best_id()
    }

    /// Id of the canonical block at `number`.
    pub fn number_to_id(&self, number: BlockNumber) -> Result<BlockHash> {
        self.view().number_to_id(number).ok_or(RepositoryError::NotFound(Lookup::Number(number)))
    }

    pub fn is_canonical(&self, id: &BlockHash) -> bool {
        self.view().contains(id)
    }

    /// Id of the block at `number` on the branch ending at `head`.
    ///
    /// Walks parent links until the branch joins the canonical chain, then jumps.
    pub fn ancestor_id(&self, head: &BlockHash, number: BlockNumber) -> Result<BlockHash> {
        let view = self.view();
        self.ancestor_in(&view, head, number)
    }

    fn ancestor_in(
        &self,
        view: &CanonicalView,
        head: &BlockHash,
        number: BlockNumber,
    ) -> Result<BlockHash> {
        let mut current = self.blocks.get_header(head)?;
        let mut current_id = *head;
        if number > number_of(head) {
            return Err(RepositoryError::NotFound(Lookup::Number(number)));
        }
        loop {
            if number_of(&current_id) == number {
                return Ok(current_id);
            }
            if view.contains(&current_id) {
                return view
                    .number_to_id(number)
                    .ok_or(RepositoryError::NotFound(Lookup::Number(number)));
            }
            current_id = current.parent_id;
            current = self.blocks.get_header(&current_id)?;
        }
    }

    /// True iff `id` lies on the path from `head` back to genesis.
    pub fn is_on_chain(&self, id: &BlockHash, head: &BlockHash) -> Result<bool> {
        let number = number_of(id);
        if number > number_of(head) {
            // Still fail on an unknown head
            self.blocks.get_header(head)?;
            return Ok(false);
        }
        Ok(self.ancestor_id(head, number)? == *id)
    }

    /// Lowest block shared by the ancestries of `a` and `b`.
    pub fn common_ancestor(&self, a: &BlockHash, b: &BlockHash) -> Result<BlockHash> {
        let view = self.view();
        self.common_ancestor_in(&view, a, b)
    }

    fn common_ancestor_in(
        &self,
        view: &CanonicalView,
        a: &BlockHash,
        b: &BlockHash,
    ) -> Result<BlockHash> {
        // Bring both down to the same height first
        let height = number_of(a).min(number_of(b));
        let mut ha = self.ancestor_in(view, a, height)?;
        let mut hb = self.ancestor_in(view, b, height)?;

        // Walk both up until they meet
        while ha != hb {
            ha = self.blocks.get_header(&ha)?.parent_id;
            hb = self.blocks.get_header(&hb)?.parent_id;
        }
        Ok(ha)
    }

    /// Compute the view for a new best block without publishing it.
    pub(crate) fn prepare_best(&self, new_best: &BlockHash) -> Result<(CanonicalView, Reorg)> {
        let current = self.view();
        let best = self.blocks.get_header(new_best)?;
        let ancestor = self.common_ancestor_in(&current, &current.best_id, new_best)?;
        let ancestor_number = number_of(&ancestor) as usize;

        let mut reverted: Vec<_> = current.ids.iter().skip(ancestor_number + 1).copied().collect();
        reverted.reverse();

        let mut applied = Vec::new();
        let mut cursor = *new_best;
        let mut header = best.clone();
        while cursor != ancestor {
            applied.push(cursor);
            cursor = header.parent_id;
            header = self.blocks.get_header(&cursor)?;
        }
        applied.reverse();

        let mut ids = current.ids.take(ancestor_number + 1);
        ids.extend(applied.iter().copied());

        let view = CanonicalView {
            best,
            best_id: *new_best,
            ids,
        };
        Ok((
            view,
            Reorg {
                ancestor,
                reverted,
                applied,
            },
        ))
    }

    pub(crate) fn stage_best(&self, batch: &mut WriteBatch, best: &BlockHash) {
        batch.put(Column::Meta, BEST_BLOCK_KEY, encode(best));
    }

    /// Publish a prepared view; readers switch atomically.
    pub(crate) fn publish(&self, view: CanonicalView) {
        debug!("Canonical chain now ends at {}", view.best_id);
        *self.view.write().unwrap() = Arc::new(view);
    }

    /// Exclusive access to fork bookkeeping; adds hold it across their commit.
    pub(crate) fn lock_forks(&self) -> MutexGuard<'_, ForkHeads> {
        self.forks.lock().unwrap()
    }

    /// All branch heads, best candidate first.
    pub fn heads(&self) -> Vec<ForkHead> {
        self.lock_forks().ordered()
    }
}
