//! Network selection and the base-58 version bytes that go with it.

pub type Hash256 = [u8; 32];

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub enum Network {
    #[default]
    Mainnet,
    Testnet,
}

impl Network {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "main" | "mainnet" | "bitcoin" => Some(Self::Mainnet),
            "test" | "testnet" | "testnet3" | "regtest" => Some(Self::Testnet),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mainnet => "main",
            Self::Testnet => "test",
        }
    }

    pub const fn p2pkh_version(self) -> u8 {
        match self {
            Self::Mainnet => 0x00,
            Self::Testnet => 0x6f,
        }
    }

    pub const fn p2sh_version(self) -> u8 {
        match self {
            Self::Mainnet => 0x05,
            Self::Testnet => 0xc4,
        }
    }

    /// Maps a version byte from either network back to its network.
    pub fn from_version(version: u8) -> Option<Self> {
        match version {
            0x00 | 0x05 => Some(Self::Mainnet),
            0x6f | 0xc4 => Some(Self::Testnet),
            _ => None,
        }
    }
}
