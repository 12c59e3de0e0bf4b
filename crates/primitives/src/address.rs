//! Base58check address encoding and decoding.

use crate::hash::{hash160, sha256d};
use crate::network::Network;

const ALPHABET: &[u8; 58] = b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum AddressKind {
    P2pkh,
    P2sh,
}

impl AddressKind {
    pub fn version(self, network: Network) -> u8 {
        match self {
            AddressKind::P2pkh => network.p2pkh_version(),
            AddressKind::P2sh => network.p2sh_version(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    InvalidLength,
    InvalidCharacter,
    ChecksumMismatch,
    UnknownPrefix,
}

impl std::fmt::Display for AddressError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AddressError::InvalidLength => write!(f, "address has invalid length"),
            AddressError::InvalidCharacter => write!(f, "address has non-base58 character"),
            AddressError::ChecksumMismatch => write!(f, "address checksum mismatch"),
            AddressError::UnknownPrefix => write!(f, "address has unknown version byte"),
        }
    }
}

impl std::error::Error for AddressError {}

pub fn encode_address(pkh: &[u8; 20], kind: AddressKind, network: Network) -> String {
    let mut payload = [0u8; 21];
    payload[0] = kind.version(network);
    payload[1..].copy_from_slice(pkh);
    base58check_encode(&payload)
}

/// Returns the 20-byte hash carried by `address`. The version byte is
/// stripped without being interpreted; see [`address_kind`] for that.
pub fn decode_address(address: &str) -> Result<[u8; 20], AddressError> {
    let payload = base58check_decode(address)?;
    if payload.len() != 21 {
        return Err(AddressError::InvalidLength);
    }
    let mut pkh = [0u8; 20];
    pkh.copy_from_slice(&payload[1..]);
    Ok(pkh)
}

pub fn is_address(address: &str) -> bool {
    decode_address(address).is_ok()
}

pub fn address_kind(address: &str) -> Result<(AddressKind, Network), AddressError> {
    let payload = base58check_decode(address)?;
    if payload.len() != 21 {
        return Err(AddressError::InvalidLength);
    }
    let version = payload[0];
    let network = Network::from_version(version).ok_or(AddressError::UnknownPrefix)?;
    let kind = if version == network.p2sh_version() {
        AddressKind::P2sh
    } else {
        AddressKind::P2pkh
    };
    Ok((kind, network))
}

/// Pay-to-pubkey outputs are indexed under the P2PKH address of the key.
pub fn pubkey_to_address(pubkey: &[u8], network: Network) -> String {
    encode_address(&hash160(pubkey), AddressKind::P2pkh, network)
}

pub fn address_to_script_pubkey(address: &str) -> Result<Vec<u8>, AddressError> {
    const OP_DUP: u8 = 0x76;
    const OP_HASH160: u8 = 0xa9;
    const OP_EQUAL: u8 = 0x87;
    const OP_EQUALVERIFY: u8 = 0x88;
    const OP_CHECKSIG: u8 = 0xac;

    let (kind, _) = address_kind(address)?;
    let hash = decode_address(address)?;
    let mut script = Vec::with_capacity(25);
    match kind {
        AddressKind::P2pkh => {
            script.extend_from_slice(&[OP_DUP, OP_HASH160, 0x14]);
            script.extend_from_slice(&hash);
            script.extend_from_slice(&[OP_EQUALVERIFY, OP_CHECKSIG]);
        }
        AddressKind::P2sh => {
            script.extend_from_slice(&[OP_HASH160, 0x14]);
            script.extend_from_slice(&hash);
            script.push(OP_EQUAL);
        }
    }
    Ok(script)
}

fn base58check_encode(payload: &[u8]) -> String {
    let mut data = Vec::with_capacity(payload.len() + 4);
    data.extend_from_slice(payload);
    data.extend_from_slice(&sha256d(payload)[..4]);
    base58_encode(&data)
}

fn base58check_decode(input: &str) -> Result<Vec<u8>, AddressError> {
    let bytes = base58_decode(input)?;
    if bytes.len() < 5 {
        return Err(AddressError::InvalidLength);
    }
    let (payload, checksum) = bytes.split_at(bytes.len() - 4);
    if checksum != &sha256d(payload)[..4] {
        return Err(AddressError::ChecksumMismatch);
    }
    Ok(payload.to_vec())
}

fn base58_encode(data: &[u8]) -> String {
    let zeros = data.iter().take_while(|b| **b == 0).count();
    // little-endian base-58 digits
    let mut digits: Vec<u8> = Vec::with_capacity(data.len() * 138 / 100 + 1);
    for &byte in &data[zeros..] {
        let mut carry = u32::from(byte);
        for digit in digits.iter_mut() {
            carry += u32::from(*digit) << 8;
            *digit = (carry % 58) as u8;
            carry /= 58;
        }
        while carry > 0 {
            digits.push((carry % 58) as u8);
            carry /= 58;
        }
    }
    let mut out = String::with_capacity(zeros + digits.len());
    out.extend(std::iter::repeat('1').take(zeros));
    out.extend(digits.iter().rev().map(|digit| ALPHABET[*digit as usize] as char));
    out
}

fn base58_decode(input: &str) -> Result<Vec<u8>, AddressError> {
    if input.is_empty() {
        return Err(AddressError::InvalidLength);
    }
    let zeros = input.bytes().take_while(|b| *b == b'1').count();
    let mut bytes: Vec<u8> = Vec::with_capacity(input.len());
    for ch in input.bytes().skip(zeros) {
        let mut carry = u32::from(base58_value(ch).ok_or(AddressError::InvalidCharacter)?);
        for byte in bytes.iter_mut() {
            carry += u32::from(*byte) * 58;
            *byte = (carry & 0xff) as u8;
            carry >>= 8;
        }
        while carry > 0 {
            bytes.push((carry & 0xff) as u8);
            carry >>= 8;
        }
    }
    let mut out = vec![0u8; zeros];
    out.extend(bytes.iter().rev());
    Ok(out)
}

fn base58_value(byte: u8) -> Option<u8> {
    ALPHABET
        .iter()
        .position(|value| *value == byte)
        .map(|pos| pos as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base58_leading_zeros() {
        assert_eq!(base58_encode(&[]), "");
        assert_eq!(base58_encode(&[0, 0]), "11");
        assert_eq!(base58_encode(&[0, 0, 1]), "112");
        assert_eq!(base58_decode("112"), Ok(vec![0, 0, 1]));
        assert_eq!(base58_decode("11"), Ok(vec![0, 0]));
    }

    #[test]
    fn base58_known_vector() {
        assert_eq!(base58_encode(b"hello world"), "StV1DL6CwTryKyV");
        assert_eq!(base58_decode("StV1DL6CwTryKyV"), Ok(b"hello world".to_vec()));
    }

    #[test]
    fn rejects_ambiguous_characters() {
        for bad in ["0OIl", "1BvBMSEYstWetqTFn5Au4m4GFg7xJaNVN0"] {
            assert_eq!(base58_decode(bad), Err(AddressError::InvalidCharacter));
        }
    }

    #[test]
    fn address_kind_roundtrip() {
        let hash = [0x42u8; 20];
        for network in [Network::Mainnet, Network::Testnet] {
            for kind in [AddressKind::P2pkh, AddressKind::P2sh] {
                let address = encode_address(&hash, kind, network);
                assert_eq!(address_kind(&address), Ok((kind, network)));
            }
        }
    }
}
