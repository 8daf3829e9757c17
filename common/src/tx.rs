//! Transactions, receipts and transaction locations

use crate::crypto::blake2b_256;
use crate::hash::{Address, BlockHash, Hash, TxHash};
use serde_with::{hex::Hex, serde_as};

/// A transaction as carried in a block body.
///
/// The repository does not interpret the payload; only the identity matters for
/// indexing.
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
pub struct Transaction {
    #[n(0)]
    pub chain_tag: u8,
    #[n(1)]
    pub block_ref: u64,
    #[n(2)]
    pub expiration: u32,
    #[n(3)]
    pub gas: u64,
    #[n(4)]
    pub nonce: u64,
    #[n(5)]
    #[cbor(with = "minicbor::bytes")]
    #[serde_as(as = "Hex")]
    pub payload: Vec<u8>,
    #[n(6)]
    #[cbor(with = "minicbor::bytes")]
    #[serde_as(as = "Hex")]
    pub signature: Vec<u8>,
}

impl Transaction {
    /// Transaction identity: Blake2b-256 of the CBOR encoding.
    pub fn id(&self) -> TxHash {
        blake2b_256(&minicbor::to_vec(self).expect("infallible"))
    }
}

/// Event emitted during execution.
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
pub struct Log {
    #[n(0)]
    pub address: Address,
    #[n(1)]
    pub topics: Vec<Hash<32>>,
    #[n(2)]
    #[cbor(with = "minicbor::bytes")]
    #[serde_as(as = "Hex")]
    pub data: Vec<u8>,
}

/// Execution outcome of one transaction, supplied by the execution layer.
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
pub struct Receipt {
    #[n(0)]
    pub gas_used: u64,
    #[n(1)]
    pub paid: u64,
    #[n(2)]
    pub reverted: bool,
    #[n(3)]
    pub logs: Vec<Log>,
}

/// Position of a transaction within a stored block.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    minicbor::Encode,
    minicbor::Decode,
    serde::Serialize,
    serde::Deserialize,
)]
pub struct TxLocation {
    #[n(0)]
    pub block_id: BlockHash,
    #[n(1)]
    pub index: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_covers_every_field() {
        let tx = Transaction {
            chain_tag: 0x4a,
            nonce: 1,
            ..Default::default()
        };
        let other = Transaction { nonce: 2, ..tx.clone() };
        assert_ne!(tx.id(), other.id());
        assert_eq!(tx.id(), tx.clone().id());
    }

    #[test]
    fn payload_serializes_as_hex() {
        let tx = Transaction {
            payload: vec![0xca, 0xfe],
            ..Default::default()
        };
        let json = serde_json::to_value(&tx).unwrap();
        assert_eq!(json["payload"], "cafe");
    }

    #[test]
    fn receipt_decodes_what_it_encodes() {
        let receipt = Receipt {
            gas_used: 21000,
            paid: 7,
            reverted: false,
            logs: vec![Log {
                address: Address::new([9; 20]),
                topics: vec![Hash::new([1; 32])],
                data: vec![1, 2, 3],
            }],
        };
        let bytes = minicbor::to_vec(&receipt).unwrap();
        assert_eq!(minicbor::decode::<Receipt>(&bytes).unwrap(), receipt);
    }
}
