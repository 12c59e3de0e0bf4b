//! Opcode constants and a naming table that covers every byte value.

use std::fmt;

pub const OP_0: u8 = 0x00;
pub const OP_PUSHDATA1: u8 = 0x4c;
pub const OP_PUSHDATA2: u8 = 0x4d;
pub const OP_PUSHDATA4: u8 = 0x4e;
pub const OP_1NEGATE: u8 = 0x4f;
pub const OP_RESERVED: u8 = 0x50;
pub const OP_1: u8 = 0x51;
pub const OP_16: u8 = 0x60;
pub const OP_RETURN: u8 = 0x6a;
pub const OP_DUP: u8 = 0x76;
pub const OP_EQUAL: u8 = 0x87;
pub const OP_EQUALVERIFY: u8 = 0x88;
pub const OP_HASH160: u8 = 0xa9;
pub const OP_CHECKSIG: u8 = 0xac;
pub const OP_NOP1: u8 = 0xb0;
pub const OP_NOP10: u8 = 0xb9;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OpcodeName {
    Named(&'static str),
    /// Small-integer push, `OP_1` through `OP_16`.
    Number(u8),
    /// Reserved no-op, `OP_NOP1` through `OP_NOP10`.
    Nop(u8),
    Unknown(u8),
}

impl fmt::Display for OpcodeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpcodeName::Named(name) => f.write_str(name),
            OpcodeName::Number(n) => write!(f, "OP_{n}"),
            OpcodeName::Nop(n) => write!(f, "OP_NOP{n}"),
            OpcodeName::Unknown(op) => write!(f, "OP_UNKNOWN_0x{op:02x}"),
        }
    }
}

/// Name of a non-push opcode. Push-length bytes `0x01..=0x4e` are data
/// prefixes and come back as `Unknown`; the disassembler handles them first.
pub fn opcode_name(op: u8) -> OpcodeName {
    match op {
        OP_0 => OpcodeName::Named("OP_0"),
        OP_1..=OP_16 => OpcodeName::Number(op - OP_RESERVED),
        OP_NOP1..=OP_NOP10 => OpcodeName::Nop(op - OP_NOP1 + 1),
        _ => match NAMED.iter().find(|(code, _)| *code == op) {
            Some((_, name)) => OpcodeName::Named(name),
            None => OpcodeName::Unknown(op),
        },
    }
}

const NAMED: &[(u8, &str)] = &[
    (OP_1NEGATE, "OP_1NEGATE"),
    (OP_RESERVED, "OP_RESERVED"),
    (0x61, "OP_NOP"),
    (0x62, "OP_VER"),
    (0x63, "OP_IF"),
    (0x64, "OP_NOTIF"),
    (0x65, "OP_VERIF"),
    (0x66, "OP_VERNOTIF"),
    (0x67, "OP_ELSE"),
    (0x68, "OP_ENDIF"),
    (0x69, "OP_VERIFY"),
    (OP_RETURN, "OP_RETURN"),
    (0x6b, "OP_TOALTSTACK"),
    (0x6c, "OP_FROMALTSTACK"),
    (0x6d, "OP_2DROP"),
    (0x6e, "OP_2DUP"),
    (0x6f, "OP_3DUP"),
    (0x70, "OP_2OVER"),
    (0x71, "OP_2ROT"),
    (0x72, "OP_2SWAP"),
    (0x73, "OP_IFDUP"),
    (0x74, "OP_DEPTH"),
    (0x75, "OP_DROP"),
    (OP_DUP, "OP_DUP"),
    (0x77, "OP_NIP"),
    (0x78, "OP_OVER"),
    (0x79, "OP_PICK"),
    (0x7a, "OP_ROLL"),
    (0x7b, "OP_ROT"),
    (0x7c, "OP_SWAP"),
    (0x7d, "OP_TUCK"),
    (0x7e, "OP_CAT"),
    (0x7f, "OP_SUBSTR"),
    (0x80, "OP_LEFT"),
    (0x81, "OP_RIGHT"),
    (0x82, "OP_SIZE"),
    (0x83, "OP_INVERT"),
    (0x84, "OP_AND"),
    (0x85, "OP_OR"),
    (0x86, "OP_XOR"),
    (OP_EQUAL, "OP_EQUAL"),
    (OP_EQUALVERIFY, "OP_EQUALVERIFY"),
    (0x89, "OP_RESERVED1"),
    (0x8a, "OP_RESERVED2"),
    (0x8b, "OP_1ADD"),
    (0x8c, "OP_1SUB"),
    (0x8d, "OP_2MUL"),
    (0x8e, "OP_2DIV"),
    (0x8f, "OP_NEGATE"),
    (0x90, "OP_ABS"),
    (0x91, "OP_NOT"),
    (0x92, "OP_0NOTEQUAL"),
    (0x93, "OP_ADD"),
    (0x94, "OP_SUB"),
    (0x95, "OP_MUL"),
    (0x96, "OP_DIV"),
    (0x97, "OP_MOD"),
    (0x98, "OP_LSHIFT"),
    (0x99, "OP_RSHIFT"),
    (0x9a, "OP_BOOLAND"),
    (0x9b, "OP_BOOLOR"),
    (0x9c, "OP_NUMEQUAL"),
    (0x9d, "OP_NUMEQUALVERIFY"),
    (0x9e, "OP_NUMNOTEQUAL"),
    (0x9f, "OP_LESSTHAN"),
    (0xa0, "OP_GREATERTHAN"),
    (0xa1, "OP_LESSTHANOREQUAL"),
    (0xa2, "OP_GREATERTHANOREQUAL"),
    (0xa3, "OP_MIN"),
    (0xa4, "OP_MAX"),
    (0xa5, "OP_WITHIN"),
    (0xa6, "OP_RIPEMD160"),
    (0xa7, "OP_SHA1"),
    (0xa8, "OP_SHA256"),
    (OP_HASH160, "OP_HASH160"),
    (0xaa, "OP_HASH256"),
    (0xab, "OP_CODESEPARATOR"),
    (OP_CHECKSIG, "OP_CHECKSIG"),
    (0xad, "OP_CHECKSIGVERIFY"),
    (0xae, "OP_CHECKMULTISIG"),
    (0xaf, "OP_CHECKMULTISIGVERIFY"),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_cover_every_byte() {
        for op in 0..=u8::MAX {
            assert!(!opcode_name(op).to_string().is_empty());
        }
    }

    #[test]
    fn ranges_render() {
        assert_eq!(opcode_name(OP_1).to_string(), "OP_1");
        assert_eq!(opcode_name(OP_16).to_string(), "OP_16");
        assert_eq!(opcode_name(OP_NOP1).to_string(), "OP_NOP1");
        assert_eq!(opcode_name(OP_NOP10).to_string(), "OP_NOP10");
        assert_eq!(opcode_name(OP_RESERVED).to_string(), "OP_RESERVED");
        assert_eq!(opcode_name(OP_CHECKSIG).to_string(), "OP_CHECKSIG");
        assert_eq!(opcode_name(0xba).to_string(), "OP_UNKNOWN_0xba");
        assert_eq!(opcode_name(0xff), OpcodeName::Unknown(0xff));
    }
}
