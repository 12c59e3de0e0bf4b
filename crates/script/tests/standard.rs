use sqlchain_primitives::address::{encode_address, pubkey_to_address, AddressKind};
use sqlchain_primitives::{hex, Network};
use sqlchain_script::standard::{classify, classify_script_pubkey, ScriptClass, ScriptType};

struct Lcg {
    state: u64,
}

impl Lcg {
    fn next_u8(&mut self) -> u8 {
        self.state = self.state.wrapping_mul(6364136223846793005).wrapping_add(1);
        (self.state >> 33) as u8
    }
}

#[test]
fn classify_p2pkh() {
    let hash = [0x11u8; 20];
    let mut script = vec![0x76, 0xa9, 0x14];
    script.extend_from_slice(&hash);
    script.extend_from_slice(&[0x88, 0xac]);
    let class = classify(&script, Network::Mainnet);
    assert_eq!(
        class,
        ScriptClass::P2Pkh {
            address: encode_address(&hash, AddressKind::P2pkh, Network::Mainnet)
        }
    );
    assert_eq!(class.script_type(), ScriptType::P2Pkh);
}

#[test]
fn classify_known_p2pkh_vector() {
    let script = hex::decode("76a91412ab8dc588ca9d5787dde7eb29569da63c3a238c88ac").expect("hex");
    let class = classify(&script, Network::Mainnet);
    assert_eq!(class.address(), Some("12higDjoCCNXSA95xZMWUdPvXNmkAduhWv"));
}

#[test]
fn classify_p2sh() {
    let script = hex::decode("a914e9c3dd0c07aac76179ebc76a6c78d4d67c6c160a87").expect("hex");
    let class = classify(&script, Network::Mainnet);
    assert_eq!(class.script_type(), ScriptType::P2Sh);
    assert_eq!(class.address(), Some("3P14159f73E4gFr7JterCCQh9QjiTjiZrG"));
}

#[test]
fn classify_p2pk_uncompressed() {
    let script = hex::decode(
        "41044bca633a91de10df85a63d0a24cb09783148fe0e16c92e937fc4491580c860757148effa0595a955f44078b48ba67fa198782e8bb68115da0daa8fde5301f7f9ac",
    )
    .expect("hex");
    let class = classify(&script, Network::Mainnet);
    assert_eq!(class.script_type(), ScriptType::P2Pk);
    assert_eq!(class.address(), Some("1LEWwJkDj8xriE87ALzQYcHjTmD8aqDj1f"));
}

#[test]
fn classify_p2pk_compressed() {
    let pubkey = [0x02u8; 33];
    let mut script = vec![0x21];
    script.extend_from_slice(&pubkey);
    script.push(0xac);
    let class = classify(&script, Network::Testnet);
    assert_eq!(
        class,
        ScriptClass::P2Pk {
            address: pubkey_to_address(&pubkey, Network::Testnet)
        }
    );
}

#[test]
fn classify_witness_commitment() {
    let mut script = vec![0x6a, 0x24, 0xaa, 0x21, 0xa9, 0xed];
    script.extend_from_slice(&[0x33; 32]);
    script.extend_from_slice(&[0x01, 0x02]);
    assert_eq!(
        classify(&script, Network::Mainnet),
        ScriptClass::WitnessCommitment {
            hash: [0x33; 32],
            extra: vec![0x01, 0x02],
        }
    );
}

#[test]
fn classify_null_data() {
    let script = vec![0x6a, 0x04, 0xde, 0xad, 0xbe, 0xef];
    assert_eq!(
        classify(&script, Network::Mainnet),
        ScriptClass::NullData {
            data: vec![0x04, 0xde, 0xad, 0xbe, 0xef]
        }
    );
    assert_eq!(
        classify(&[0x6a], Network::Mainnet),
        ScriptClass::NullData { data: Vec::new() }
    );
}

#[test]
fn oversized_op_return_is_other() {
    let mut script = vec![0x6a, 0x4c, 0x50];
    script.extend_from_slice(&[0u8; 80]);
    assert_eq!(classify_script_pubkey(&script), ScriptType::Other);
}

#[test]
fn classify_unknown() {
    let script = vec![0x73, 0x63, 0x72, 0x69, 0x70, 0x74];
    assert_eq!(
        classify(&script, Network::Mainnet),
        ScriptClass::Other {
            script: script.clone()
        }
    );
    assert_eq!(classify_script_pubkey(&[]), ScriptType::Other);
}

#[test]
fn p2pkh_with_wrong_trailer_is_other() {
    let mut script = vec![0x76, 0xa9, 0x14];
    script.extend_from_slice(&[0x11; 20]);
    script.extend_from_slice(&[0x88, 0x87]);
    assert_eq!(classify_script_pubkey(&script), ScriptType::Other);
}

#[test]
fn classification_is_total() {
    let mut rng = Lcg { state: 99 };
    for len in 0..100usize {
        for round in 0..20 {
            let mut script: Vec<u8> = (0..len).map(|_| rng.next_u8()).collect();
            // bias some inputs toward the standard prefixes
            if let Some(first) = script.first_mut() {
                *first = [0x76, 0xa9, 0x41, 0x21, 0x6a, 0x00][round % 6];
            }
            let _ = classify(&script, Network::Mainnet);
        }
    }
}
