//! The fixed 80-byte block header record and the chain math derived from it.

use primitive_types::U256;

use crate::encoding::Encoder;
use crate::hash::sha256d;
use crate::network::Hash256;

pub const HEADER_LEN: usize = 80;

pub const COIN: u64 = 100_000_000;
pub const SUBSIDY_HALVING_INTERVAL: u32 = 210_000;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockHeader {
    pub version: i32,
    pub prev_block: Hash256,
    pub merkle_root: Hash256,
    pub time: u32,
    pub bits: u32,
    pub nonce: u32,
}

impl BlockHeader {
    pub fn decode(raw: &[u8; HEADER_LEN]) -> Self {
        let word = |at: usize| [raw[at], raw[at + 1], raw[at + 2], raw[at + 3]];
        let mut prev_block = [0u8; 32];
        prev_block.copy_from_slice(&raw[4..36]);
        let mut merkle_root = [0u8; 32];
        merkle_root.copy_from_slice(&raw[36..68]);
        Self {
            version: i32::from_le_bytes(word(0)),
            prev_block,
            merkle_root,
            time: u32::from_le_bytes(word(68)),
            bits: u32::from_le_bytes(word(72)),
            nonce: u32::from_le_bytes(word(76)),
        }
    }

    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut encoder = Encoder::with_capacity(HEADER_LEN);
        encoder.write_i32_le(self.version);
        encoder.write_hash_le(&self.prev_block);
        encoder.write_hash_le(&self.merkle_root);
        encoder.write_u32_le(self.time);
        encoder.write_u32_le(self.bits);
        encoder.write_u32_le(self.nonce);
        let mut out = [0u8; HEADER_LEN];
        out.copy_from_slice(&encoder.into_inner());
        out
    }

    pub fn hash(&self) -> Hash256 {
        sha256d(&self.encode())
    }

    pub fn difficulty(&self) -> f64 {
        bits_to_difficulty(self.bits)
    }
}

/// Difficulty relative to the minimum target `0x1d00ffff`.
pub fn bits_to_difficulty(bits: u32) -> f64 {
    let mantissa = bits & 0x00ff_ffff;
    if mantissa == 0 {
        return 0.0;
    }
    let mut shift = (bits >> 24) & 0xff;
    let mut diff = f64::from(0x0000_ffff_u32) / f64::from(mantissa);
    while shift < 29 {
        diff *= 256.0;
        shift += 1;
    }
    while shift > 29 {
        diff /= 256.0;
        shift -= 1;
    }
    diff
}

fn compact_to_target(bits: u32) -> Option<U256> {
    let size = bits >> 24;
    let word = bits & 0x007f_ffff;
    if bits & 0x0080_0000 != 0 {
        return None;
    }
    if size <= 3 {
        return Some(U256::from(word >> (8 * (3 - size))));
    }
    let shift = 8 * (size - 3);
    if shift >= 256 || (U256::from(word).bits() as u32 + shift) > 256 {
        return None;
    }
    Some(U256::from(word) << shift)
}

/// Expected number of hashes to find a block at `bits`: 2^256 / (target + 1).
pub fn block_work(bits: u32) -> U256 {
    let Some(target) = compact_to_target(bits) else {
        return U256::zero();
    };
    if target.is_zero() {
        return U256::zero();
    }
    let one = U256::from(1u64);
    (!target / (target + one)) + one
}

/// Block reward in base units at `height`.
pub fn block_subsidy(height: u32) -> u64 {
    let halvings = height / SUBSIDY_HALVING_INTERVAL;
    if halvings >= 64 {
        return 0;
    }
    (50 * COIN) >> halvings
}
