//! In-memory store using DashMap
// Used by tests and ephemeral nodes; nothing survives the process

use anyhow::Result;
use dashmap::DashMap;

use super::{Column, KeyValueStore, WriteBatch};

#[derive(Default)]
pub struct MemoryStore {
    entries: DashMap<(Column, Vec<u8>), Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records across all columns
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, column: Column, key: &[u8]) -> Result<Option<Vec<u8>>> {
        // Clone out so no shard lock is held by the caller
        Ok(self.entries.get(&(column, key.to_vec())).map(|value| value.clone()))
    }

    fn put(&self, column: Column, key: &[u8], value: &[u8]) -> Result<()> {
        self.entries.insert((column, key.to_vec()), value.to_vec());
        Ok(())
    }

    fn commit(&self, batch: WriteBatch) -> Result<()> {
        for (column, key, value) in batch.into_writes() {
            self.entries.insert((column, key), value);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_keep_columns_separate() {
        let store = MemoryStore::new();
        store.put(Column::Headers, b"id", b"header").unwrap();
        store.put(Column::Bodies, b"id", b"body").unwrap();
        assert_eq!(store.get(Column::Headers, b"id").unwrap(), Some(b"header".to_vec()));
        assert_eq!(store.get(Column::Bodies, b"id").unwrap(), Some(b"body".to_vec()));
        assert_eq!(store.get(Column::Receipts, b"id").unwrap(), None);
    }

    #[test]
    fn should_apply_batch_in_order() {
        let store = MemoryStore::new();
        let mut batch = WriteBatch::new();
        batch.put(Column::Meta, b"key", b"first".to_vec());
        batch.put(Column::Meta, b"key", b"second".to_vec());
        batch.put(Column::Headers, b"key", b"header".to_vec());
        assert_eq!(batch.len(), 3);
        store.commit(batch).unwrap();
        assert_eq!(store.get(Column::Meta, b"key").unwrap(), Some(b"second".to_vec()));
        assert!(store.contains(Column::Headers, b"key").unwrap());
        assert_eq!(store.len(), 2);
    }
}
