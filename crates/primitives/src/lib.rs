//! Hashing, binary codec, address codec and header records for sqlchain.

pub mod address;
pub mod encoding;
pub mod hash;
pub mod header;
pub mod hex;
pub mod network;

pub use address::{
    address_kind, address_to_script_pubkey, decode_address, encode_address, is_address,
    pubkey_to_address, AddressError, AddressKind,
};
pub use encoding::{decode_varint, encode_varint, DecodeError, Decoder, Encoder};
pub use hash::{hash160, sha256, sha256d};
pub use header::{bits_to_difficulty, block_subsidy, block_work, BlockHeader, HEADER_LEN};
pub use network::{Hash256, Network};
