//! Human-readable script disassembly.

use sqlchain_primitives::hex;

use crate::opcodes::{opcode_name, OP_0, OP_PUSHDATA1, OP_PUSHDATA2, OP_PUSHDATA4};

/// Marker emitted when a push runs past the end of the script.
pub const TRUNCATED_PUSH: &str = "[error]";

/// Renders `script` as opcode names and hex pushes. Each opcode is followed
/// by `op_sep`, each data push by `push_sep`; the trailing separator is
/// dropped. Total over all inputs.
pub fn disassemble(script: &[u8], op_sep: &str, push_sep: &str) -> String {
    let mut out = String::with_capacity(script.len() * 3);
    let mut last_sep_len = 0;
    let mut pos = 0usize;

    while pos < script.len() {
        let op = script[pos];
        pos += 1;

        let push_len = match op {
            OP_0 => None,
            0x01..=0x4b => Some(op as usize),
            OP_PUSHDATA1 | OP_PUSHDATA2 | OP_PUSHDATA4 => {
                let width = match op {
                    OP_PUSHDATA1 => 1,
                    OP_PUSHDATA2 => 2,
                    _ => 4,
                };
                let Some(prefix) = script.get(pos..pos + width) else {
                    out.push_str(TRUNCATED_PUSH);
                    return out;
                };
                pos += width;
                let mut le = [0u8; 4];
                le[..width].copy_from_slice(prefix);
                Some(u32::from_le_bytes(le) as usize)
            }
            _ => None,
        };

        match push_len {
            Some(len) => {
                let Some(data) = pos.checked_add(len).and_then(|end| script.get(pos..end)) else {
                    out.push_str(TRUNCATED_PUSH);
                    return out;
                };
                pos += len;
                out.push_str(&hex::encode(data));
                out.push_str(push_sep);
                last_sep_len = push_sep.len();
            }
            None => {
                out.push_str(&opcode_name(op).to_string());
                out.push_str(op_sep);
                last_sep_len = op_sep.len();
            }
        }
    }

    out.truncate(out.len() - last_sep_len);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_script() {
        assert_eq!(disassemble(&[], " ", " "), "");
    }

    #[test]
    fn p2pkh_layout() {
        let mut script = vec![0x76, 0xa9, 0x14];
        script.extend_from_slice(&[0xab; 20]);
        script.extend_from_slice(&[0x88, 0xac]);
        assert_eq!(
            disassemble(&script, " ", " "),
            format!("OP_DUP OP_HASH160 {} OP_EQUALVERIFY OP_CHECKSIG", "ab".repeat(20))
        );
    }

    #[test]
    fn separators_differ_by_token() {
        let script = [0x00, 0x02, 0xca, 0xfe, 0x51];
        assert_eq!(disassemble(&script, ",", "|"), "OP_0,cafe|OP_1");
    }

    #[test]
    fn pushdata_variants() {
        assert_eq!(disassemble(&[0x4c, 0x01, 0x7f], " ", " "), "7f");
        assert_eq!(disassemble(&[0x4d, 0x02, 0x00, 0x01, 0x02], " ", " "), "0102");
        assert_eq!(
            disassemble(&[0x4e, 0x01, 0x00, 0x00, 0x00, 0xee, 0x6a], " ", " "),
            "ee OP_RETURN"
        );
    }

    #[test]
    fn truncated_pushes_are_marked() {
        assert_eq!(disassemble(&[0x05, 0x01], " ", " "), TRUNCATED_PUSH);
        assert_eq!(disassemble(&[0x6a, 0x4c], " ", " "), "OP_RETURN [error]");
        assert_eq!(disassemble(&[0x4d, 0x01], " ", " "), TRUNCATED_PUSH);
        assert_eq!(
            disassemble(&[0x4e, 0xff, 0xff, 0xff, 0xff], " ", " "),
            TRUNCATED_PUSH
        );
    }

    #[test]
    fn reserved_and_unknown_opcodes() {
        assert_eq!(
            disassemble(&[0xb0, 0xb9, 0xba, 0x50], " ", " "),
            "OP_NOP1 OP_NOP10 OP_UNKNOWN_0xba OP_RESERVED"
        );
    }
}
