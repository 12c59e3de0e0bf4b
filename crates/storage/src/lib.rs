//! Key/value storage seam for the id tables.
//!
//! The relational layer that owns the real tables sits behind
//! [`KeyValueStore`]; the allocators only need single-key lookups, inserts and
//! an atomic insert-if-absent.

use std::fmt;
use std::sync::Arc;

pub mod memory;

#[cfg(feature = "fjall")]
pub mod fjall;

#[derive(Debug)]
pub enum StoreError {
    Backend(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Backend(message) => write!(f, "{message}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Id tables. Keys are 8-byte big-endian ids.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum Column {
    /// Transaction id -> 32-byte transaction hash.
    TxHash,
    /// Address id -> 20-byte public-key or script hash.
    Address,
}

impl Column {
    pub const ALL: [Column; 2] = [Column::TxHash, Column::Address];

    pub fn as_str(self) -> &'static str {
        match self {
            Column::TxHash => "tx_hash",
            Column::Address => "address",
        }
    }
}

pub fn id_key(id: i64) -> [u8; 8] {
    id.to_be_bytes()
}

pub trait KeyValueStore: Send + Sync {
    fn get(&self, column: Column, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError>;
    fn put(&self, column: Column, key: &[u8], value: &[u8]) -> Result<(), StoreError>;

    /// Writes `value` only if `key` is vacant. Returns the value already
    /// stored when the slot was taken, `None` when this call claimed it.
    fn insert_new(
        &self,
        column: Column,
        key: &[u8],
        value: &[u8],
    ) -> Result<Option<Vec<u8>>, StoreError>;
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for Arc<T> {
    fn get(&self, column: Column, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        self.as_ref().get(column, key)
    }

    fn put(&self, column: Column, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.as_ref().put(column, key, value)
    }

    fn insert_new(
        &self,
        column: Column,
        key: &[u8],
        value: &[u8],
    ) -> Result<Option<Vec<u8>>, StoreError> {
        self.as_ref().insert_new(column, key, value)
    }
}
