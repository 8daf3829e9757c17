use std::{fs, path::PathBuf, sync::Arc};

use anyhow::Result;
use config::Config;
use fjall::{Database, Keyspace, KeyspaceCreateOptions, PersistMode};
use tracing::info;

use super::{Column, KeyValueStore, WriteBatch};

pub struct FjallStore {
    database: Database,
    headers: Keyspace,
    bodies: Keyspace,
    receipts: Keyspace,
    tx_locations: Keyspace,
    meta: Keyspace,
}

const DEFAULT_DATABASE_PATH: &str = "fjall-chain";
const DEFAULT_CLEAR_ON_START: bool = false;
const DEFAULT_NETWORK_NAME: &str = "devnet";

impl FjallStore {
    pub fn new(config: Arc<Config>) -> Result<Self> {
        let path = config.get_string("database-path").unwrap_or_else(|_| {
            format!(
                "{DEFAULT_DATABASE_PATH}-{}",
                Self::network_scope_from_config(config.as_ref())
            )
        });
        let clear = config.get_bool("clear-on-start").unwrap_or(DEFAULT_CLEAR_ON_START);
        info!("Storing chain with Fjall on disk ({path})");
        let path = PathBuf::from(path);
        if clear && path.exists() {
            fs::remove_dir_all(&path)?;
        }
        let database = Database::builder(&path).open()?;

        Ok(Self {
            headers: database.keyspace(Column::Headers.name(), KeyspaceCreateOptions::default)?,
            bodies: database.keyspace(Column::Bodies.name(), KeyspaceCreateOptions::default)?,
            receipts: database.keyspace(Column::Receipts.name(), KeyspaceCreateOptions::default)?,
            tx_locations: database
                .keyspace(Column::TxLocations.name(), KeyspaceCreateOptions::default)?,
            meta: database.keyspace(Column::Meta.name(), KeyspaceCreateOptions::default)?,
            database,
        })
    }

    fn network_scope_from_config(config: &Config) -> String {
        config
            .get_string("startup.network-name")
            .or_else(|_| config.get_string("network-name"))
            .unwrap_or_else(|_| DEFAULT_NETWORK_NAME.to_string())
    }

    fn keyspace(&self, column: Column) -> &Keyspace {
        match column {
            Column::Headers => &self.headers,
            Column::Bodies => &self.bodies,
            Column::Receipts => &self.receipts,
            Column::TxLocations => &self.tx_locations,
            Column::Meta => &self.meta,
        }
    }

    /// Flush the journal to disk
    pub fn persist(&self) -> Result<()> {
        self.database.persist(PersistMode::SyncAll)?;
        Ok(())
    }
}

impl KeyValueStore for FjallStore {
    fn get(&self, column: Column, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.keyspace(column).get(key)?.map(|value| value.to_vec()))
    }

    fn put(&self, column: Column, key: &[u8], value: &[u8]) -> Result<()> {
        self.keyspace(column).insert(key, value)?;
        Ok(())
    }

    fn commit(&self, batch: WriteBatch) -> Result<()> {
        let mut fjall_batch = self.database.batch();
        for (column, key, value) in batch.into_writes() {
            fjall_batch.insert(self.keyspace(column), key, value);
        }
        fjall_batch.commit()?;
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        self.persist()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct TestState {
        #[expect(unused)]
        dir: TempDir,
        store: FjallStore,
    }

    fn open_at(dir: &TempDir, clear: bool) -> FjallStore {
        let dir_name = dir.path().to_str().expect("dir_name cannot be stored as string");
        let config = Config::builder()
            .set_default("database-path", dir_name)
            .unwrap()
            .set_default("clear-on-start", clear)
            .unwrap()
            .build()
            .unwrap();
        FjallStore::new(Arc::new(config)).unwrap()
    }

    fn init_state() -> TestState {
        let dir = tempfile::tempdir().unwrap();
        let store = open_at(&dir, false);
        TestState { dir, store }
    }

    #[test]
    fn should_get_what_was_put() {
        let state = init_state();
        state.store.put(Column::Headers, b"id", b"header").unwrap();
        assert_eq!(state.store.get(Column::Headers, b"id").unwrap(), Some(b"header".to_vec()));
        assert_eq!(state.store.get(Column::Bodies, b"id").unwrap(), None);
    }

    #[test]
    fn should_commit_batch_across_columns() {
        let state = init_state();
        let mut batch = WriteBatch::new();
        batch.put(Column::Bodies, b"id", b"body".to_vec());
        batch.put(Column::Receipts, b"id", b"receipts".to_vec());
        batch.put(Column::Headers, b"id", b"header".to_vec());
        state.store.commit(batch).unwrap();

        for column in [Column::Bodies, Column::Receipts, Column::Headers] {
            assert!(state.store.contains(column, b"id").unwrap());
        }
    }

    #[test]
    fn should_keep_data_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = open_at(&dir, false);
            store.put(Column::Meta, b"best", b"value").unwrap();
            store.persist().unwrap();
        }
        let store = open_at(&dir, false);
        assert_eq!(store.get(Column::Meta, b"best").unwrap(), Some(b"value".to_vec()));
    }

    #[test]
    fn should_clear_on_start_when_asked() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = open_at(&dir, false);
            store.put(Column::Meta, b"best", b"value").unwrap();
            store.persist().unwrap();
        }
        let store = open_at(&dir, true);
        assert_eq!(store.get(Column::Meta, b"best").unwrap(), None);
    }
}
