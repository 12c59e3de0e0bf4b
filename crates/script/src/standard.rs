//! Standard output-script classification.

use sqlchain_primitives::address::{encode_address, pubkey_to_address, AddressKind};
use sqlchain_primitives::Network;

use crate::opcodes::{OP_CHECKSIG, OP_DUP, OP_EQUAL, OP_EQUALVERIFY, OP_HASH160, OP_RETURN};

/// `OP_RETURN PUSH36 aa21a9ed`, the coinbase witness commitment header.
pub const WITNESS_COMMITMENT_MARKER: [u8; 6] = [0x6a, 0x24, 0xaa, 0x21, 0xa9, 0xed];

const MAX_NULL_DATA_LEN: usize = 41;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ScriptType {
    P2Pkh,
    P2Sh,
    P2Pk,
    WitnessCommitment,
    NullData,
    Other,
}

impl ScriptType {
    pub fn as_str(self) -> &'static str {
        match self {
            ScriptType::P2Pkh => "p2pkh",
            ScriptType::P2Sh => "p2sh",
            ScriptType::P2Pk => "p2pk",
            ScriptType::WitnessCommitment => "witness",
            ScriptType::NullData => "null",
            ScriptType::Other => "other",
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ScriptClass {
    P2Pkh { address: String },
    P2Sh { address: String },
    /// Indexed under the P2PKH address of the public key.
    P2Pk { address: String },
    WitnessCommitment { hash: [u8; 32], extra: Vec<u8> },
    /// Everything after the `OP_RETURN`.
    NullData { data: Vec<u8> },
    Other { script: Vec<u8> },
}

impl ScriptClass {
    pub fn script_type(&self) -> ScriptType {
        match self {
            ScriptClass::P2Pkh { .. } => ScriptType::P2Pkh,
            ScriptClass::P2Sh { .. } => ScriptType::P2Sh,
            ScriptClass::P2Pk { .. } => ScriptType::P2Pk,
            ScriptClass::WitnessCommitment { .. } => ScriptType::WitnessCommitment,
            ScriptClass::NullData { .. } => ScriptType::NullData,
            ScriptClass::Other { .. } => ScriptType::Other,
        }
    }

    pub fn address(&self) -> Option<&str> {
        match self {
            ScriptClass::P2Pkh { address }
            | ScriptClass::P2Sh { address }
            | ScriptClass::P2Pk { address } => Some(address),
            _ => None,
        }
    }
}

/// Classifies an output script. Never fails: anything unrecognised is `Other`.
pub fn classify(script: &[u8], network: Network) -> ScriptClass {
    if let Some(hash) = p2pkh_hash(script) {
        return ScriptClass::P2Pkh {
            address: encode_address(hash, AddressKind::P2pkh, network),
        };
    }
    if let Some(hash) = p2sh_hash(script) {
        return ScriptClass::P2Sh {
            address: encode_address(hash, AddressKind::P2sh, network),
        };
    }
    if let Some(pubkey) = p2pk_pubkey(script) {
        return ScriptClass::P2Pk {
            address: pubkey_to_address(pubkey, network),
        };
    }
    if script.len() >= 38 && script.starts_with(&WITNESS_COMMITMENT_MARKER) {
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&script[6..38]);
        return ScriptClass::WitnessCommitment {
            hash,
            extra: script[38..].to_vec(),
        };
    }
    if script.first() == Some(&OP_RETURN) && script.len() <= MAX_NULL_DATA_LEN {
        return ScriptClass::NullData {
            data: script[1..].to_vec(),
        };
    }
    ScriptClass::Other {
        script: script.to_vec(),
    }
}

pub fn classify_script_pubkey(script: &[u8]) -> ScriptType {
    classify(script, Network::Mainnet).script_type()
}

fn p2pkh_hash(script: &[u8]) -> Option<&[u8; 20]> {
    let is_p2pkh = script.len() == 25
        && script[0] == OP_DUP
        && script[1] == OP_HASH160
        && script[2] == 0x14
        && script[23] == OP_EQUALVERIFY
        && script[24] == OP_CHECKSIG;
    if !is_p2pkh {
        return None;
    }
    script[3..23].try_into().ok()
}

fn p2sh_hash(script: &[u8]) -> Option<&[u8; 20]> {
    let is_p2sh =
        script.len() == 23 && script[0] == OP_HASH160 && script[1] == 0x14 && script[22] == OP_EQUAL;
    if !is_p2sh {
        return None;
    }
    script[2..22].try_into().ok()
}

fn p2pk_pubkey(script: &[u8]) -> Option<&[u8]> {
    match script.first().copied() {
        Some(0x41) if script.len() == 67 && script[66] == OP_CHECKSIG => Some(&script[1..66]),
        Some(0x21) if script.len() >= 35 && script[34] == OP_CHECKSIG => Some(&script[1..34]),
        _ => None,
    }
}
