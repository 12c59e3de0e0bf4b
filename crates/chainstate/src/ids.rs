//! Content hash to numeric id allocation.
//!
//! Ids are derived from the first five bytes of a hash, so unrelated content
//! can land on the same candidate. Collisions are resolved by probing forward
//! through the id tables until a vacant slot or the same content is found.
//! Once handed out, an id never moves.

use std::sync::Mutex;

use sqlchain_primitives::address::{address_kind, decode_address, encode_address};
use sqlchain_primitives::{sha256, AddressError, AddressKind, Hash256, Network};
use sqlchain_storage::{id_key, Column, KeyValueStore, StoreError};

pub const TX_PROBE_LIMIT: u32 = 32;
pub const ADDRESS_PROBE_LIMIT: u32 = 64;

const TX_PROBE_STEP: i64 = 1;
// keeps the kind bit intact
const ADDRESS_PROBE_STEP: i64 = 2;

#[derive(Debug)]
pub enum IdError {
    Exhausted { start: i64, attempts: u32 },
    Store(StoreError),
    Address(AddressError),
}

impl std::fmt::Display for IdError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IdError::Exhausted { start, attempts } => write!(
                f,
                "no free id after {attempts} probes starting at {start}"
            ),
            IdError::Store(err) => write!(f, "{err}"),
            IdError::Address(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for IdError {}

impl From<StoreError> for IdError {
    fn from(err: StoreError) -> Self {
        IdError::Store(err)
    }
}

impl From<AddressError> for IdError {
    fn from(err: AddressError) -> Self {
        IdError::Address(err)
    }
}

/// Outcome of a transaction probe.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TxSlot {
    pub id: i64,
    /// The hash was already stored under `id`.
    pub existed: bool,
}

fn prefix_id(bytes: &[u8]) -> i64 {
    let mut le = [0u8; 8];
    le[..5].copy_from_slice(&bytes[..5]);
    u64::from_le_bytes(le) as i64
}

/// Candidate id for a transaction hash. The low three bits are left clear so
/// rows sharing a prefix can be packed next to each other.
pub fn tx_hash_to_id(hash: &Hash256) -> i64 {
    prefix_id(hash) >> 3
}

/// Candidate id for an address hash; odd ids are P2SH.
pub fn addr_to_id(pkh: &[u8; 20], kind: AddressKind) -> i64 {
    let id = prefix_id(&sha256(pkh)) * 2;
    match kind {
        AddressKind::P2pkh => id,
        AddressKind::P2sh => id + 1,
    }
}

pub fn addr_to_id_str(address: &str) -> Result<i64, AddressError> {
    let (kind, _) = address_kind(address)?;
    Ok(addr_to_id(&decode_address(address)?, kind))
}

pub struct IdAllocator<S> {
    store: S,
    address_lock: Mutex<()>,
}

impl<S: KeyValueStore> IdAllocator<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            address_lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Probes for `hash`. With `allocate` set, a vacant slot is claimed and
    /// returned with `existed == false`; without it, the vacant candidate is
    /// returned untouched.
    pub fn find_or_allocate_tx(&self, hash: &Hash256, allocate: bool) -> Result<TxSlot, IdError> {
        let start = tx_hash_to_id(hash);
        let mut id = start;
        for _ in 0..TX_PROBE_LIMIT {
            let key = id_key(id);
            let stored = if allocate {
                self.store.insert_new(Column::TxHash, &key, hash)?
            } else {
                self.store.get(Column::TxHash, &key)?
            };
            match stored {
                None => return Ok(TxSlot { id, existed: false }),
                Some(existing) if existing.as_slice() == hash.as_slice() => {
                    return Ok(TxSlot { id, existed: true })
                }
                Some(_) => id += TX_PROBE_STEP,
            }
        }
        Err(exhausted("transaction", start, TX_PROBE_LIMIT))
    }

    /// Id of an already stored transaction, without allocating.
    pub fn find_tx(&self, hash: &Hash256) -> Result<Option<i64>, IdError> {
        let slot = self.find_or_allocate_tx(hash, false)?;
        Ok(slot.existed.then_some(slot.id))
    }

    pub fn tx_hash_for_id(&self, id: i64) -> Result<Option<Hash256>, IdError> {
        let Some(bytes) = self.store.get(Column::TxHash, &id_key(id))? else {
            return Ok(None);
        };
        Ok(bytes.as_slice().try_into().ok())
    }

    pub fn find_or_insert_address(&self, address: &str) -> Result<i64, IdError> {
        let (kind, _) = address_kind(address)?;
        let pkh = decode_address(address)?;
        self.find_or_insert_pkh(&pkh, kind)
    }

    /// Address probes are serialized so two workers never settle on the same
    /// slot for different content.
    pub fn find_or_insert_pkh(&self, pkh: &[u8; 20], kind: AddressKind) -> Result<i64, IdError> {
        let _guard = self.address_lock.lock().expect("address id lock");
        let start = addr_to_id(pkh, kind);
        let mut id = start;
        for _ in 0..ADDRESS_PROBE_LIMIT {
            match self.store.insert_new(Column::Address, &id_key(id), pkh)? {
                None => return Ok(id),
                Some(existing) if existing.as_slice() == pkh.as_slice() => return Ok(id),
                Some(_) => id += ADDRESS_PROBE_STEP,
            }
        }
        Err(exhausted("address", start, ADDRESS_PROBE_LIMIT))
    }

    /// Rebuilds the address string stored under `id`.
    pub fn address_for_id(&self, id: i64, network: Network) -> Result<Option<String>, IdError> {
        let Some(bytes) = self.store.get(Column::Address, &id_key(id))? else {
            return Ok(None);
        };
        let Ok(pkh) = <[u8; 20]>::try_from(bytes.as_slice()) else {
            return Ok(None);
        };
        let kind = if id & 1 == 1 {
            AddressKind::P2sh
        } else {
            AddressKind::P2pkh
        };
        Ok(Some(encode_address(&pkh, kind, network)))
    }
}

fn exhausted(what: &str, start: i64, attempts: u32) -> IdError {
    sqlchain_log::log_error!(
        "{what} id probe exhausted after {attempts} attempts from {start}; id table may be corrupt"
    );
    IdError::Exhausted { start, attempts }
}
