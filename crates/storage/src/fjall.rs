use std::path::Path;
use std::sync::Mutex;

use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};

use crate::{Column, KeyValueStore, StoreError};

/// Persistent id tables, one fjall partition per [`Column`].
pub struct FjallStore {
    keyspace: Keyspace,
    tx_hash: PartitionHandle,
    address: PartitionHandle,
    // serializes insert_new against itself; plain puts are not checked
    insert_lock: Mutex<()>,
}

impl FjallStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let keyspace = Config::new(path).open().map_err(map_err)?;
        let open = |column: Column| {
            keyspace
                .open_partition(column.as_str(), PartitionCreateOptions::default())
                .map_err(map_err)
        };
        let tx_hash = open(Column::TxHash)?;
        let address = open(Column::Address)?;
        sqlchain_log::log_info!("opened id tables at {}", path.display());
        Ok(Self {
            keyspace,
            tx_hash,
            address,
            insert_lock: Mutex::new(()),
        })
    }

    fn partition(&self, column: Column) -> &PartitionHandle {
        match column {
            Column::TxHash => &self.tx_hash,
            Column::Address => &self.address,
        }
    }

    /// Flushes the journal to disk.
    pub fn persist(&self) -> Result<(), StoreError> {
        self.keyspace.persist(PersistMode::SyncAll).map_err(map_err)
    }
}

impl KeyValueStore for FjallStore {
    fn get(&self, column: Column, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        let value = self.partition(column).get(key).map_err(map_err)?;
        Ok(value.map(|bytes| bytes.to_vec()))
    }

    fn put(&self, column: Column, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.partition(column).insert(key, value).map_err(map_err)?;
        Ok(())
    }

    fn insert_new(
        &self,
        column: Column,
        key: &[u8],
        value: &[u8],
    ) -> Result<Option<Vec<u8>>, StoreError> {
        let partition = self.partition(column);
        let _guard = self.insert_lock.lock().expect("insert lock");
        if let Some(existing) = partition.get(key).map_err(map_err)? {
            return Ok(Some(existing.to_vec()));
        }
        partition.insert(key, value).map_err(map_err)?;
        Ok(None)
    }
}

fn map_err(err: fjall::Error) -> StoreError {
    StoreError::Backend(err.to_string())
}
