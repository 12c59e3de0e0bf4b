//! Lowercase hex helpers.

const HEX: &[u8; 16] = b"0123456789abcdef";

pub fn encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push(HEX[(byte >> 4) as usize] as char);
        out.push(HEX[(byte & 0x0f) as usize] as char);
    }
    out
}

pub fn decode(input: &str) -> Option<Vec<u8>> {
    let input = input.trim();
    let input = input.strip_prefix("0x").unwrap_or(input);
    if input.len() % 2 != 0 {
        return None;
    }
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len() / 2);
    for pair in bytes.chunks_exact(2) {
        let hi = nibble(pair[0])?;
        let lo = nibble(pair[1])?;
        out.push((hi << 4) | lo);
    }
    Some(out)
}

/// Hashes are displayed byte-reversed, the way the node prints them.
pub fn hash_to_display(hash: &[u8; 32]) -> String {
    let mut reversed = *hash;
    reversed.reverse();
    encode(&reversed)
}

pub fn hash_from_display(input: &str) -> Option<[u8; 32]> {
    let bytes = decode(input)?;
    let mut out: [u8; 32] = bytes.try_into().ok()?;
    out.reverse();
    Some(out)
}

fn nibble(ch: u8) -> Option<u8> {
    match ch {
        b'0'..=b'9' => Some(ch - b'0'),
        b'a'..=b'f' => Some(ch - b'a' + 10),
        b'A'..=b'F' => Some(ch - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_roundtrip() {
        let bytes = [0x00, 0x01, 0xab, 0xff];
        assert_eq!(encode(&bytes), "0001abff");
        assert_eq!(decode("0001ABff"), Some(bytes.to_vec()));
        assert_eq!(decode("0x0001abff"), Some(bytes.to_vec()));
    }

    #[test]
    fn hex_rejects_garbage() {
        assert_eq!(decode("abc"), None);
        assert_eq!(decode("zz"), None);
    }

    #[test]
    fn display_hash_is_reversed() {
        let mut hash = [0u8; 32];
        hash[0] = 0x01;
        let shown = hash_to_display(&hash);
        assert!(shown.ends_with("01"));
        assert_eq!(hash_from_display(&shown), Some(hash));
    }
}
