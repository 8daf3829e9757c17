//! Typed repository configuration read from `config::Config`.

use std::str::FromStr;

use anyhow::{anyhow, Result};
use config::Config;

const DEFAULT_HEADER_CACHE_SIZE: i64 = 1024;
const DEFAULT_BODY_CACHE_SIZE: i64 = 256;
const DEFAULT_RECEIPT_CACHE_SIZE: i64 = 256;
const DEFAULT_TX_INDEX: &str = "all-forks";

/// Which blocks feed the transaction location index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TxIndexMode {
    /// Index every added block, on any fork.
    #[default]
    AllForks,
    /// Index blocks only once they join the canonical chain.
    Canonical,
}

impl FromStr for TxIndexMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "all-forks" => Ok(TxIndexMode::AllForks),
            "canonical" => Ok(TxIndexMode::Canonical),
            _ => Err(anyhow!("Unknown tx-index mode {s}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryConfig {
    pub header_cache_size: usize,
    pub body_cache_size: usize,
    pub receipt_cache_size: usize,
    pub tx_index: TxIndexMode,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            header_cache_size: DEFAULT_HEADER_CACHE_SIZE as usize,
            body_cache_size: DEFAULT_BODY_CACHE_SIZE as usize,
            receipt_cache_size: DEFAULT_RECEIPT_CACHE_SIZE as usize,
            tx_index: TxIndexMode::default(),
        }
    }
}

impl RepositoryConfig {
    pub fn from_config(config: &Config) -> Result<Self> {
        let cache_size = |key: &str, default: i64| -> Result<usize> {
            let size = config.get_int(key).unwrap_or(default);
            usize::try_from(size).map_err(|_| anyhow!("Invalid {key} {size}"))
        };
        let tx_index = config.get_string("tx-index").unwrap_or(DEFAULT_TX_INDEX.to_string());

        Ok(Self {
            header_cache_size: cache_size("header-cache-size", DEFAULT_HEADER_CACHE_SIZE)?,
            body_cache_size: cache_size("body-cache-size", DEFAULT_BODY_CACHE_SIZE)?,
            receipt_cache_size: cache_size("receipt-cache-size", DEFAULT_RECEIPT_CACHE_SIZE)?,
            tx_index: tx_index.parse()?,
        })
    }

    pub fn with_tx_index(mut self, tx_index: TxIndexMode) -> Self {
        self.tx_index = tx_index;
        self
    }
}
