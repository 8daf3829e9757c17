//! Error types for repository operations.

use std::fmt;

use arbor_common::{BlockHash, BlockNumber, TxHash};

/// What a failed lookup was looking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    Block(BlockHash),
    Number(BlockNumber),
    Transaction(TxHash),
}

impl fmt::Display for Lookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lookup::Block(id) => write!(f, "block {id}"),
            Lookup::Number(number) => write!(f, "block number {number}"),
            Lookup::Transaction(id) => write!(f, "transaction {id}"),
        }
    }
}

/// Errors returned by [`Repository`](crate::Repository) operations.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// The identity, number or transaction is not stored.
    #[error("not found: {0}")]
    NotFound(Lookup),

    /// The added block's parent is not stored.
    #[error("invalid link: parent {parent} of block {id} not found")]
    InvalidLink { id: BlockHash, parent: BlockHash },

    /// The block id's number prefix does not follow its parent.
    #[error("invalid block number for {id}: expected {expected}, got {got}")]
    InvalidNumber {
        id: BlockHash,
        expected: BlockNumber,
        got: BlockNumber,
    },

    /// The added block's total score does not exceed its parent's.
    #[error("score violation for block {id}: parent score {parent_score}, got {score}")]
    ScoreViolation {
        id: BlockHash,
        parent_score: u64,
        score: u64,
    },

    /// Receipt count differs from transaction count.
    #[error("receipt mismatch for block {id}: {transactions} transactions, {receipts} receipts")]
    ReceiptMismatch {
        id: BlockHash,
        transactions: usize,
        receipts: usize,
    },

    /// The store was initialised with a different genesis block.
    #[error("genesis mismatch: stored {stored}, supplied {supplied}")]
    GenesisMismatch {
        stored: BlockHash,
        supplied: BlockHash,
    },

    /// The underlying store failed or returned undecodable data.
    #[error("storage failure: {0:#}")]
    StorageFailure(#[from] anyhow::Error),
}

impl RepositoryError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, RepositoryError::NotFound(_))
    }
}

pub type Result<T, E = RepositoryError> = std::result::Result<T, E>;
