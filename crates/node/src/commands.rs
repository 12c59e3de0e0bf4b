//! Operator commands behind `sqlchain-util`.

use std::io::Write;

use serde_json::json;
use sqlchain_chainstate::blobs::BlobStore;
use sqlchain_chainstate::headers::{HeaderStore, CHUNK_HEADERS};
use sqlchain_chainstate::ids::IdAllocator;
use sqlchain_primitives::address::{
    address_kind, address_to_script_pubkey, decode_address, encode_address,
};
use sqlchain_primitives::{hex, AddressKind, Hash256};
use sqlchain_rpc::{RpcClient, Shutdown};
use sqlchain_script::{classify, disassemble, ScriptClass};
use sqlchain_storage::fjall::FjallStore;

use crate::{usage, Config};

const ID_STORE_DIR: &str = "ids";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Classify { script: Vec<u8> },
    Disasm { script: Vec<u8> },
    AddrEncode { pkh: [u8; 20], kind: AddressKind },
    AddrDecode { address: String },
    AddrId { address: String },
    TxId { txid: Hash256, allocate: bool },
    Header { height: u32 },
    Chunk { index: u32 },
    BlobRead { offset: u64, len: usize },
    BlobAppend { bytes: Vec<u8> },
    SyncHeaders { from: u32, to: u32 },
}

fn arg<'a>(args: &'a [String], idx: usize, what: &str) -> Result<&'a str, String> {
    args.get(idx)
        .map(String::as_str)
        .ok_or_else(|| format!("missing {what}\n{}", usage()))
}

fn hex_arg(args: &[String], idx: usize, what: &str) -> Result<Vec<u8>, String> {
    let raw = arg(args, idx, what)?;
    hex::decode(raw).ok_or_else(|| format!("invalid hex for {what}: '{raw}'"))
}

fn num_arg<T: std::str::FromStr>(args: &[String], idx: usize, what: &str) -> Result<T, String> {
    let raw = arg(args, idx, what)?;
    raw.parse()
        .map_err(|_| format!("invalid {what}: '{raw}'"))
}

impl Command {
    pub fn parse(args: &[String]) -> Result<Self, String> {
        let name = arg(args, 0, "command")?;
        let command = match name {
            "classify" => Command::Classify {
                script: hex_arg(args, 1, "script")?,
            },
            "disasm" => Command::Disasm {
                script: hex_arg(args, 1, "script")?,
            },
            "addr-encode" => {
                let pkh = hex_arg(args, 1, "hash160")?
                    .try_into()
                    .map_err(|_| "hash160 must be 20 bytes".to_string())?;
                let kind = match args.get(2).map(String::as_str) {
                    None | Some("p2pkh") => AddressKind::P2pkh,
                    Some("p2sh") => AddressKind::P2sh,
                    Some(other) => return Err(format!("unknown address kind '{other}'")),
                };
                Command::AddrEncode { pkh, kind }
            }
            "addr-decode" => Command::AddrDecode {
                address: arg(args, 1, "address")?.to_string(),
            },
            "addr-id" => Command::AddrId {
                address: arg(args, 1, "address")?.to_string(),
            },
            "tx-id" => {
                let raw = arg(args, 1, "txid")?;
                let txid =
                    hex::hash_from_display(raw).ok_or_else(|| format!("invalid txid '{raw}'"))?;
                let allocate = match args.get(2).map(String::as_str) {
                    None => false,
                    Some("allocate") => true,
                    Some(other) => return Err(format!("unexpected argument '{other}'")),
                };
                Command::TxId { txid, allocate }
            }
            "header" => Command::Header {
                height: num_arg(args, 1, "height")?,
            },
            "chunk" => Command::Chunk {
                index: num_arg(args, 1, "chunk index")?,
            },
            "blob-read" => Command::BlobRead {
                offset: num_arg(args, 1, "offset")?,
                len: num_arg(args, 2, "length")?,
            },
            "blob-append" => Command::BlobAppend {
                bytes: hex_arg(args, 1, "payload")?,
            },
            "sync-headers" => {
                let from = num_arg(args, 1, "start height")?;
                let to = num_arg(args, 2, "end height")?;
                if from > to {
                    return Err(format!("start height {from} is above end height {to}"));
                }
                Command::SyncHeaders { from, to }
            }
            other => return Err(format!("unknown command '{other}'\n{}", usage())),
        };
        Ok(command)
    }
}

pub fn execute(config: &Config, command: &Command, out: &mut dyn Write) -> Result<(), String> {
    let text = match command {
        Command::Classify { script } => describe_class(&classify(script, config.network)),
        Command::Disasm { script } => disassemble(script, " ", " "),
        Command::AddrEncode { pkh, kind } => encode_address(pkh, *kind, config.network),
        Command::AddrDecode { address } => {
            let pkh = decode_address(address).map_err(|err| err.to_string())?;
            let (kind, network) = address_kind(address).map_err(|err| err.to_string())?;
            let script = address_to_script_pubkey(address).map_err(|err| err.to_string())?;
            json!({
                "hash160": hex::encode(&pkh),
                "kind": match kind {
                    AddressKind::P2pkh => "p2pkh",
                    AddressKind::P2sh => "p2sh",
                },
                "network": network.as_str(),
                "scriptPubKey": hex::encode(&script),
            })
            .to_string()
        }
        Command::AddrId { address } => {
            let allocator = open_ids(config)?;
            let id = allocator
                .find_or_insert_address(address)
                .map_err(|err| err.to_string())?;
            allocator.store().persist().map_err(|err| err.to_string())?;
            id.to_string()
        }
        Command::TxId { txid, allocate } => {
            let allocator = open_ids(config)?;
            let slot = allocator
                .find_or_allocate_tx(txid, *allocate)
                .map_err(|err| err.to_string())?;
            allocator.store().persist().map_err(|err| err.to_string())?;
            json!({
                "id": slot.id,
                "existed": slot.existed,
                "stored": slot.existed || *allocate,
            })
            .to_string()
        }
        Command::Header { height } => {
            let store = HeaderStore::open(&config.data_dir).map_err(|err| err.to_string())?;
            let header = store
                .get_header_fields(*height)
                .map_err(|err| err.to_string())?;
            json!({
                "height": height,
                "hash": hex::hash_to_display(&header.hash()),
                "version": header.version,
                "previousblockhash": hex::hash_to_display(&header.prev_block),
                "merkleroot": hex::hash_to_display(&header.merkle_root),
                "time": header.time,
                "bits": format!("{:08x}", header.bits),
                "nonce": header.nonce,
                "difficulty": header.difficulty(),
            })
            .to_string()
        }
        Command::Chunk { index } => {
            let store = HeaderStore::open(&config.data_dir).map_err(|err| err.to_string())?;
            hex::encode(&store.get_chunk(*index).map_err(|err| err.to_string())?)
        }
        Command::BlobRead { offset, len } => {
            let store = BlobStore::open(config.blobs.clone()).map_err(|err| err.to_string())?;
            hex::encode(&store.read(*offset, *len).map_err(|err| err.to_string())?)
        }
        Command::BlobAppend { bytes } => {
            let store = BlobStore::open(config.blobs.clone()).map_err(|err| err.to_string())?;
            store
                .append(bytes)
                .map_err(|err| err.to_string())?
                .to_string()
        }
        Command::SyncHeaders { from, to } => {
            let store = HeaderStore::open(&config.data_dir).map_err(|err| err.to_string())?;
            let client = RpcClient::new(&config.rpc, Shutdown::new());
            let written = sync_headers(&client, &store, *from, *to)?;
            format!("synced {written} headers")
        }
    };
    writeln!(out, "{text}").map_err(|err| err.to_string())
}

fn open_ids(config: &Config) -> Result<IdAllocator<FjallStore>, String> {
    let store =
        FjallStore::open(config.data_dir.join(ID_STORE_DIR)).map_err(|err| err.to_string())?;
    Ok(IdAllocator::new(store))
}

fn describe_class(class: &ScriptClass) -> String {
    let kind = class.script_type().as_str();
    match class {
        ScriptClass::P2Pkh { address }
        | ScriptClass::P2Sh { address }
        | ScriptClass::P2Pk { address } => format!("{kind} {address}"),
        ScriptClass::WitnessCommitment { hash, extra } => {
            format!("{kind} {} {}", hex::encode(hash), hex::encode(extra))
        }
        ScriptClass::NullData { data } => format!("{kind} {}", hex::encode(data)),
        ScriptClass::Other { script } => format!("{kind} {}", disassemble(script, " ", " ")),
    }
}

/// Copies headers `from..=to` from the node into `store`. Stops at the first
/// height the node does not know.
fn sync_headers(
    client: &RpcClient,
    store: &HeaderStore,
    from: u32,
    to: u32,
) -> Result<u32, String> {
    let mut written = 0u32;
    for height in from..=to {
        let Some(hash) = client.get_block_hash(height).map_err(|err| err.to_string())? else {
            sqlchain_log::log_warn!("node has no block at height {height}; stopping sync");
            break;
        };
        let raw = client
            .get_block_header_raw(&hash)
            .map_err(|err| err.to_string())?
            .ok_or_else(|| format!("node lost header {} during sync", hex::hash_to_display(&hash)))?;
        store
            .put_header(height, &raw)
            .map_err(|err| err.to_string())?;
        written += 1;
        if completes_chunk(height) {
            sqlchain_log::log_info!("synced headers through height {height}");
        }
    }
    Ok(written)
}

fn completes_chunk(height: u32) -> bool {
    height % CHUNK_HEADERS == CHUNK_HEADERS - 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{parse_args_from, CliAction};
    use sqlchain_primitives::BlockHeader;
    use sqlchain_rpc::{RpcConfig, Transport, TransportError, TransportResponse};
    use std::collections::HashMap;

    fn run(data_dir: &std::path::Path, args: &[&str]) -> Result<String, String> {
        let mut raw = vec!["--data-dir".to_string(), data_dir.to_string_lossy().to_string()];
        raw.extend(args.iter().map(|arg| arg.to_string()));
        let CliAction::Run(config, command) = parse_args_from(raw)? else {
            panic!("expected a command");
        };
        let mut out = Vec::new();
        execute(&config, &command, &mut out)?;
        Ok(String::from_utf8(out).expect("utf8").trim_end().to_string())
    }

    #[test]
    fn classify_and_disasm() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert_eq!(
            run(
                dir.path(),
                &["classify", "76a91412ab8dc588ca9d5787dde7eb29569da63c3a238c88ac"]
            )
            .unwrap(),
            "p2pkh 12higDjoCCNXSA95xZMWUdPvXNmkAduhWv"
        );
        assert_eq!(
            run(dir.path(), &["classify", "6a03010203"]).unwrap(),
            "null 03010203"
        );
        assert_eq!(
            run(dir.path(), &["disasm", "76a90288ac"]).unwrap(),
            "OP_DUP OP_HASH160 88ac"
        );
        assert!(run(dir.path(), &["disasm", "zz"]).is_err());
    }

    #[test]
    fn address_commands() {
        let dir = tempfile::tempdir().expect("tempdir");
        let address = run(
            dir.path(),
            &["addr-encode", "e9c3dd0c07aac76179ebc76a6c78d4d67c6c160a", "p2sh"],
        )
        .unwrap();
        assert_eq!(address, "3P14159f73E4gFr7JterCCQh9QjiTjiZrG");
        let decoded: serde_json::Value =
            serde_json::from_str(&run(dir.path(), &["addr-decode", &address]).unwrap())
                .expect("json");
        assert_eq!(decoded["hash160"], "e9c3dd0c07aac76179ebc76a6c78d4d67c6c160a");
        assert_eq!(decoded["kind"], "p2sh");
        assert_eq!(decoded["network"], "main");

        let first = run(dir.path(), &["addr-id", &address]).unwrap();
        let second = run(dir.path(), &["addr-id", &address]).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.parse::<i64>().expect("id") % 2, 1);
    }

    #[test]
    fn tx_id_allocates_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        let txid = "4a5e1e4baab89f3a32518a88c31bc87f618f76673e2cc77ab2127b7afdeda33b";
        let probe: serde_json::Value =
            serde_json::from_str(&run(dir.path(), &["tx-id", txid]).unwrap()).expect("json");
        assert_eq!(probe["existed"], false);
        assert_eq!(probe["stored"], false);
        let allocated: serde_json::Value =
            serde_json::from_str(&run(dir.path(), &["tx-id", txid, "allocate"]).unwrap())
                .expect("json");
        assert_eq!(allocated["id"], probe["id"]);
        assert_eq!(allocated["stored"], true);
        let again: serde_json::Value =
            serde_json::from_str(&run(dir.path(), &["tx-id", txid]).unwrap()).expect("json");
        assert_eq!(again["existed"], true);
    }

    #[test]
    fn blob_commands() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert_eq!(run(dir.path(), &["blob-append", "deadbeef"]).unwrap(), "0");
        assert_eq!(run(dir.path(), &["blob-append", "0102"]).unwrap(), "4");
        assert_eq!(run(dir.path(), &["blob-read", "2", "4"]).unwrap(), "beef0102");
        assert!(run(dir.path(), &["blob-read", "100", "4"])
            .unwrap_err()
            .contains("not available"));
    }

    #[test]
    fn header_and_chunk_commands() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = HeaderStore::open(dir.path()).expect("open");
        let header = BlockHeader {
            version: 1,
            prev_block: [0; 32],
            merkle_root: [0x11; 32],
            time: 1_231_006_505,
            bits: 0x1d00ffff,
            nonce: 7,
        };
        store.put_header(0, &header.encode()).expect("put");
        let shown: serde_json::Value =
            serde_json::from_str(&run(dir.path(), &["header", "0"]).unwrap()).expect("json");
        assert_eq!(shown["bits"], "1d00ffff");
        assert_eq!(shown["difficulty"], 1.0);
        assert_eq!(shown["hash"], hex::hash_to_display(&header.hash()));
        assert!(run(dir.path(), &["chunk", "0"])
            .unwrap_err()
            .contains("truncated"));
    }

    #[test]
    fn bad_command_lines() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(run(dir.path(), &[]).is_err());
        assert!(run(dir.path(), &["frobnicate"]).is_err());
        assert!(run(dir.path(), &["addr-encode", "00"]).is_err());
        assert!(run(dir.path(), &["sync-headers", "5", "1"]).is_err());
    }

    /// Answers getblockhash/getblockheader from a fixed header chain.
    struct FakeNode {
        headers: Vec<[u8; 80]>,
        by_hash: HashMap<String, usize>,
    }

    impl FakeNode {
        fn new(count: u32) -> Self {
            let mut headers = Vec::new();
            let mut by_hash = HashMap::new();
            let mut prev = [0u8; 32];
            for height in 0..count {
                let header = BlockHeader {
                    version: 2,
                    prev_block: prev,
                    merkle_root: [height as u8; 32],
                    time: 1_400_000_000 + height,
                    bits: 0x1d00ffff,
                    nonce: height,
                };
                prev = header.hash();
                by_hash.insert(hex::hash_to_display(&prev), headers.len());
                headers.push(header.encode());
            }
            Self { headers, by_hash }
        }
    }

    impl Transport for FakeNode {
        fn post(&self, body: &[u8]) -> Result<TransportResponse, TransportError> {
            let request: serde_json::Value = serde_json::from_slice(body).expect("request");
            let reply = match request["method"].as_str() {
                Some("getblockhash") => {
                    let height = request["params"][0].as_u64().expect("height") as usize;
                    match self.headers.get(height) {
                        Some(raw) => {
                            let hash = BlockHeader::decode(raw).hash();
                            json!({ "result": hex::hash_to_display(&hash), "error": null })
                        }
                        None => json!({ "result": null, "error": { "code": -5, "message": "out of range" } }),
                    }
                }
                Some("getblockheader") => {
                    let hash = request["params"][0].as_str().expect("hash");
                    let idx = self.by_hash[hash];
                    json!({ "result": hex::encode(&self.headers[idx]), "error": null })
                }
                other => panic!("unexpected method {other:?}"),
            };
            Ok(TransportResponse {
                status: 200,
                body: reply.to_string().into_bytes(),
            })
        }
    }

    #[test]
    fn sync_headers_copies_until_the_node_runs_out() {
        sqlchain_log::set_stderr_enabled(false);
        let dir = tempfile::tempdir().expect("tempdir");
        let node = FakeNode::new(5);
        let expected = node.headers.clone();
        let client = RpcClient::with_transport(
            Box::new(node),
            &RpcConfig::new("http://fake"),
            Shutdown::new(),
        );
        let store = HeaderStore::open(dir.path()).expect("open");
        assert_eq!(sync_headers(&client, &store, 1, 9).expect("sync"), 4);
        assert_eq!(store.tip_height().expect("tip"), Some(4));
        for height in 1..5 {
            assert_eq!(store.get_header(height).expect("get"), expected[height as usize]);
        }
    }

    #[test]
    fn chunk_boundaries_hold_at_the_top_of_the_range() {
        assert!(completes_chunk(CHUNK_HEADERS - 1));
        assert!(completes_chunk(2 * CHUNK_HEADERS - 1));
        assert!(!completes_chunk(0));
        assert!(!completes_chunk(CHUNK_HEADERS));
        // u32::MAX sits 255 headers into its window
        assert!(!completes_chunk(u32::MAX));
        assert!(completes_chunk(u32::MAX - 256));
    }
}
