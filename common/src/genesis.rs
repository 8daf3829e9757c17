//! Genesis block construction for a network

use crate::block::{Block, BlockBuilder, GENESIS_PARENT_ID};
use crate::hash::Address;
use crate::tx::Receipt;

/// Launch time used by the development network.
pub const DEVNET_LAUNCH_TIME: u64 = 1_526_400_000;
const DEFAULT_GAS_LIMIT: u64 = 10_000_000;

/// Builds the root block of a chain and its (empty) receipts.
///
/// Different launch times or gas limits give different genesis ids and therefore
/// different chain tags.
#[derive(Debug, Clone)]
pub struct GenesisBuilder {
    timestamp: u64,
    gas_limit: u64,
    beneficiary: Address,
}

impl Default for GenesisBuilder {
    fn default() -> Self {
        Self {
            timestamp: 0,
            gas_limit: DEFAULT_GAS_LIMIT,
            beneficiary: Address::default(),
        }
    }
}

impl GenesisBuilder {
    /// Genesis of the local development network.
    pub fn devnet() -> Self {
        Self::default().timestamp(DEVNET_LAUNCH_TIME)
    }

    pub fn timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn gas_limit(mut self, gas_limit: u64) -> Self {
        self.gas_limit = gas_limit;
        self
    }

    pub fn beneficiary(mut self, beneficiary: Address) -> Self {
        self.beneficiary = beneficiary;
        self
    }

    pub fn build(&self) -> (Block, Vec<Receipt>) {
        let block = BlockBuilder::new()
            .parent_id(GENESIS_PARENT_ID)
            .timestamp(self.timestamp)
            .gas_limit(self.gas_limit)
            .beneficiary(self.beneficiary)
            .total_score(0)
            .build();
        (block, Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn devnet_is_deterministic() {
        let (a, _) = GenesisBuilder::devnet().build();
        let (b, receipts) = GenesisBuilder::devnet().build();
        assert_eq!(a.id(), b.id());
        assert_eq!(a.number(), 0);
        assert!(receipts.is_empty());
    }

    #[test]
    fn launch_time_distinguishes_networks() {
        let (devnet, _) = GenesisBuilder::devnet().build();
        let (other, _) = GenesisBuilder::devnet().timestamp(DEVNET_LAUNCH_TIME + 1).build();
        assert_ne!(devnet.id(), other.id());
    }
}
