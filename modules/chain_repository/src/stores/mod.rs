use std::sync::Arc;

use anyhow::{bail, Context, Result};
use config::Config;
use tracing::info;

pub mod fjall;
pub mod memory;

const DEFAULT_STORE: &str = "memory";

/// Logical key spaces of the repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Headers,
    Bodies,
    Receipts,
    TxLocations,
    Meta,
}

impl Column {
    pub const ALL: [Column; 5] = [
        Column::Headers,
        Column::Bodies,
        Column::Receipts,
        Column::TxLocations,
        Column::Meta,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Column::Headers => "headers",
            Column::Bodies => "bodies",
            Column::Receipts => "receipts",
            Column::TxLocations => "tx-locations",
            Column::Meta => "meta",
        }
    }
}

/// Ordered puts applied together by [`KeyValueStore::commit`].
#[derive(Debug, Default)]
pub struct WriteBatch {
    writes: Vec<(Column, Vec<u8>, Vec<u8>)>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, column: Column, key: impl AsRef<[u8]>, value: Vec<u8>) {
        self.writes.push((column, key.as_ref().to_vec(), value));
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub fn into_writes(self) -> Vec<(Column, Vec<u8>, Vec<u8>)> {
        self.writes
    }
}

/// Storage capability consumed by the repository.
///
/// A single `put` must be atomic: a concurrent `get` sees the old or the new value.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, column: Column, key: &[u8]) -> Result<Option<Vec<u8>>>;

    fn put(&self, column: Column, key: &[u8], value: &[u8]) -> Result<()>;

    /// Apply the batch in order. Backends that can do so apply it atomically.
    fn commit(&self, batch: WriteBatch) -> Result<()> {
        for (column, key, value) in batch.into_writes() {
            self.put(column, &key, &value)?;
        }
        Ok(())
    }

    fn contains(&self, column: Column, key: &[u8]) -> Result<bool> {
        Ok(self.get(column, key)?.is_some())
    }

    /// Make committed writes durable. Volatile backends have nothing to do.
    fn flush(&self) -> Result<()> {
        Ok(())
    }
}

/// Open the backend named by the `store` configuration key.
pub fn open_store(config: Arc<Config>) -> Result<Arc<dyn KeyValueStore>> {
    let store_type = config.get_string("store").unwrap_or(DEFAULT_STORE.to_string());
    let store: Arc<dyn KeyValueStore> = match store_type.as_str() {
        "memory" => Arc::new(memory::MemoryStore::new()),
        "fjall" => Arc::new(fjall::FjallStore::new(config)?),
        _ => bail!("Unknown store type {store_type}"),
    };
    info!("Opened {store_type} block store");
    Ok(store)
}

pub(crate) fn encode<T: minicbor::Encode<()> + ?Sized>(value: &T) -> Vec<u8> {
    minicbor::to_vec(value).expect("infallible")
}

pub(crate) fn decode<T>(column: Column, bytes: &[u8]) -> Result<T>
where
    T: for<'b> minicbor::Decode<'b, ()>,
{
    minicbor::decode(bytes).with_context(|| format!("could not decode {} record", column.name()))
}
