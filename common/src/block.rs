//! Block headers, bodies and the block builder

use crate::crypto::{blake2b_256, blake2b_256_parts};
use crate::hash::{Address, BlockHash};
use crate::tx::Transaction;
use serde_with::{hex::Hex, serde_as};

/// Block height. Genesis is 0.
pub type BlockNumber = u32;

/// Parent id carried by the genesis header; its number prefix wraps to 0 for the child.
pub const GENESIS_PARENT_ID: BlockHash = BlockHash::new([
    0xff, 0xff, 0xff, 0xff, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
    0, 0, 0, 0, 0,
]);

/// Block number encoded in the first four bytes of a block id.
pub fn number_of(id: &BlockHash) -> BlockNumber {
    BlockNumber::from_be_bytes([id[0], id[1], id[2], id[3]])
}

/// Block header.
///
/// The header is immutable once built; its identity is derived from its content and
/// signature, so any field change produces a different block.
#[serde_as]
#[derive(
    Debug,
    Clone,
    Default,
    PartialEq,
    Eq,
    minicbor::Encode,
    minicbor::Decode,
    serde::Serialize,
    serde::Deserialize,
)]
pub struct BlockHeader {
    #[n(0)]
    pub parent_id: BlockHash,
    #[n(1)]
    pub timestamp: u64,
    #[n(2)]
    pub gas_limit: u64,
    #[n(3)]
    pub beneficiary: Address,
    #[n(4)]
    pub total_score: u64,
    #[n(5)]
    pub txs_root: BlockHash,
    #[n(6)]
    #[cbor(with = "minicbor::bytes")]
    #[serde_as(as = "Hex")]
    pub signature: Vec<u8>,
}

impl BlockHeader {
    /// Height, one above the parent's.
    pub fn number(&self) -> BlockNumber {
        number_of(&self.parent_id).wrapping_add(1)
    }

    /// Hash over every field except the signature.
    pub fn signing_hash(&self) -> BlockHash {
        let unsigned = BlockHeader {
            signature: Vec::new(),
            ..self.clone()
        };
        blake2b_256(&minicbor::to_vec(&unsigned).expect("infallible"))
    }

    /// Block identity: hash of signing hash and signature, prefixed with the number.
    pub fn id(&self) -> BlockHash {
        let hash = blake2b_256_parts(&[self.signing_hash().as_ref(), &self.signature]);
        let mut id = hash.into_inner();
        id[..4].copy_from_slice(&self.number().to_be_bytes());
        BlockHash::new(id)
    }

    pub fn is_genesis(&self) -> bool {
        self.parent_id == GENESIS_PARENT_ID
    }

    /// Returns a copy bound to the given signature.
    pub fn with_signature(&self, signature: Vec<u8>) -> Self {
        BlockHeader {
            signature,
            ..self.clone()
        }
    }
}

/// Ordered transactions of a block; order is execution order.
#[derive(
    Debug,
    Clone,
    Default,
    PartialEq,
    Eq,
    minicbor::Encode,
    minicbor::Decode,
    serde::Serialize,
    serde::Deserialize,
)]
pub struct BlockBody {
    #[n(0)]
    pub transactions: Vec<Transaction>,
}

impl BlockBody {
    /// Commitment over the transaction ids, stored in the header.
    pub fn txs_root(&self) -> BlockHash {
        if self.transactions.is_empty() {
            return BlockHash::default();
        }
        let ids: Vec<_> = self.transactions.iter().map(Transaction::id).collect();
        let parts: Vec<&[u8]> = ids.iter().map(|id| id.as_ref()).collect();
        blake2b_256_parts(&parts)
    }
}

/// A header paired with its body.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub body: BlockBody,
}

impl Block {
    pub fn new(header: BlockHeader, body: BlockBody) -> Self {
        Self { header, body }
    }

    pub fn id(&self) -> BlockHash {
        self.header.id()
    }

    pub fn number(&self) -> BlockNumber {
        self.header.number()
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.body.transactions
    }

    /// Returns the same block bound to the given signature.
    pub fn with_signature(self, signature: Vec<u8>) -> Self {
        Self {
            header: self.header.with_signature(signature),
            body: self.body,
        }
    }
}

/// Assembles an unsigned block.
#[derive(Debug, Clone, Default)]
pub struct BlockBuilder {
    header: BlockHeader,
    body: BlockBody,
}

impl BlockBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parent_id(mut self, parent_id: BlockHash) -> Self {
        self.header.parent_id = parent_id;
        self
    }

    pub fn timestamp(mut self, timestamp: u64) -> Self {
        self.header.timestamp = timestamp;
        self
    }

    pub fn gas_limit(mut self, gas_limit: u64) -> Self {
        self.header.gas_limit = gas_limit;
        self
    }

    pub fn beneficiary(mut self, beneficiary: Address) -> Self {
        self.header.beneficiary = beneficiary;
        self
    }

    pub fn total_score(mut self, total_score: u64) -> Self {
        self.header.total_score = total_score;
        self
    }

    pub fn transaction(mut self, tx: Transaction) -> Self {
        self.body.transactions.push(tx);
        self
    }

    pub fn build(self) -> Block {
        let mut header = self.header;
        header.txs_root = self.body.txs_root();
        Block::new(header, self.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn child_of(parent: &BlockHash, score: u64) -> Block {
        BlockBuilder::new().parent_id(*parent).total_score(score).build()
    }

    #[test]
    fn genesis_parent_wraps_to_number_zero() {
        let genesis = child_of(&GENESIS_PARENT_ID, 0);
        assert!(genesis.header.is_genesis());
        assert_eq!(genesis.number(), 0);
        assert_eq!(number_of(&genesis.id()), 0);
    }

    #[test]
    fn id_carries_number_prefix() {
        let genesis = child_of(&GENESIS_PARENT_ID, 0);
        let b1 = child_of(&genesis.id(), 1);
        let b2 = child_of(&b1.id(), 2);
        assert_eq!(b1.number(), 1);
        assert_eq!(b2.number(), 2);
        assert_eq!(number_of(&b2.id()), 2);
        assert_eq!(&b2.id()[..4], &[0, 0, 0, 2]);
    }

    #[test]
    fn signature_changes_identity_but_not_signing_hash() {
        let block = child_of(&GENESIS_PARENT_ID, 0);
        let signed = block.clone().with_signature(vec![1, 2, 3]);
        assert_eq!(block.header.signing_hash(), signed.header.signing_hash());
        assert_ne!(block.id(), signed.id());
    }

    #[test]
    fn builder_commits_to_transactions() {
        let tx = Transaction {
            nonce: 7,
            ..Default::default()
        };
        let empty = child_of(&GENESIS_PARENT_ID, 0);
        let with_tx = BlockBuilder::new().parent_id(GENESIS_PARENT_ID).transaction(tx).build();
        assert!(empty.header.txs_root.is_zero());
        assert!(!with_tx.header.txs_root.is_zero());
        assert_ne!(empty.id(), with_tx.id());
    }

    #[test]
    fn header_decodes_what_it_encodes() {
        let header = child_of(&GENESIS_PARENT_ID, 5).with_signature(vec![9; 65]).header;
        let bytes = minicbor::to_vec(&header).unwrap();
        let decoded: BlockHeader = minicbor::decode(&bytes).unwrap();
        assert_eq!(decoded, header);
        assert_eq!(decoded.id(), header.id());
    }
}
