use sqlchain_log as logging;

mod commands;

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use sqlchain_chainstate::blobs::{BlobStoreConfig, MissingBlobPolicy};
use sqlchain_primitives::Network;
use sqlchain_rpc::RpcConfig;

pub use commands::Command;

const DEFAULT_DATA_DIR: &str = "data";
const CONF_FILE_NAME: &str = "sqlchain.conf";

#[derive(Clone, Debug)]
pub struct Config {
    pub data_dir: PathBuf,
    pub conf_path: PathBuf,
    pub network: Network,
    pub log_level: logging::Level,
    pub log_format: logging::Format,
    pub log_timestamps: bool,
    pub blobs: BlobStoreConfig,
    pub rpc: RpcConfig,
}

#[derive(Debug)]
pub enum CliAction {
    Run(Box<Config>, Command),
    PrintHelp,
    PrintVersion,
}

pub fn run_entry() -> Result<(), String> {
    match parse_args_from(std::env::args().skip(1))? {
        CliAction::PrintHelp => {
            println!("{}", usage());
            Ok(())
        }
        CliAction::PrintVersion => {
            println!("sqlchain-util {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        CliAction::Run(config, command) => {
            logging::init(logging::LogConfig {
                level: config.log_level,
                format: config.log_format,
                timestamps: config.log_timestamps,
            });
            let stdout = std::io::stdout();
            commands::execute(&config, &command, &mut stdout.lock())
        }
    }
}

fn next_value(args: &mut impl Iterator<Item = String>, flag: &str) -> Result<String, String> {
    args.next()
        .ok_or_else(|| format!("missing value for {flag}\n{}", usage()))
}

pub fn parse_args_from<I>(raw_args: I) -> Result<CliAction, String>
where
    I: IntoIterator<Item = String>,
{
    let mut data_dir: Option<PathBuf> = None;
    let mut conf_path: Option<PathBuf> = None;
    let mut network: Option<Network> = None;
    let mut log_level: Option<logging::Level> = None;
    let mut log_format: Option<logging::Format> = None;
    let mut rpc_url: Option<String> = None;
    let mut positional: Vec<String> = Vec::new();

    let mut args = raw_args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--help" | "-h" | "help" if positional.is_empty() => return Ok(CliAction::PrintHelp),
            "--version" | "-V" | "version" if positional.is_empty() => {
                return Ok(CliAction::PrintVersion)
            }
            "--data-dir" => data_dir = Some(PathBuf::from(next_value(&mut args, &arg)?)),
            "--conf" => conf_path = Some(PathBuf::from(next_value(&mut args, &arg)?)),
            "--network" => {
                let value = next_value(&mut args, &arg)?;
                network = Some(Network::parse(&value).ok_or_else(|| {
                    format!("invalid network '{value}' (expected main|test)\n{}", usage())
                })?);
            }
            "--log-level" => {
                let value = next_value(&mut args, &arg)?;
                log_level = Some(logging::Level::parse(&value).ok_or_else(|| {
                    format!(
                        "invalid log level '{value}' (expected error|warn|info|debug|trace)\n{}",
                        usage()
                    )
                })?);
            }
            "--log-format" => {
                let value = next_value(&mut args, &arg)?;
                log_format = Some(logging::Format::parse(&value).ok_or_else(|| {
                    format!("invalid log format '{value}' (expected text|json)\n{}", usage())
                })?);
            }
            "--rpc-url" => rpc_url = Some(next_value(&mut args, &arg)?),
            flag if flag.starts_with("--") => {
                return Err(format!("unknown option '{flag}'\n{}", usage()));
            }
            _ => positional.push(arg),
        }
    }

    let command = Command::parse(&positional)?;

    let data_dir = data_dir.unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));
    let conf_path = conf_path.unwrap_or_else(|| data_dir.join(CONF_FILE_NAME));
    let conf = load_sqlchain_conf(&conf_path)?.unwrap_or_default();
    let lookup = |key: &str| conf.get(key).and_then(|values| values.last()).map(String::as_str);
    let bad = |key: &str, raw: &str| format!("invalid {key} value '{raw}' in {}", conf_path.display());

    let network = match (network, lookup("network")) {
        (Some(network), _) => network,
        (None, Some(raw)) => Network::parse(raw).ok_or_else(|| bad("network", raw))?,
        (None, None) => Network::Mainnet,
    };
    let log_level = match (log_level, lookup("loglevel")) {
        (Some(level), _) => level,
        (None, Some(raw)) => logging::Level::parse(raw).ok_or_else(|| bad("loglevel", raw))?,
        (None, None) => logging::Level::Info,
    };
    let log_format = match (log_format, lookup("logformat")) {
        (Some(format), _) => format,
        (None, Some(raw)) => logging::Format::parse(raw).ok_or_else(|| bad("logformat", raw))?,
        (None, None) => logging::Format::Text,
    };
    let log_timestamps = match lookup("logtimestamps") {
        Some(raw) => parse_conf_bool(raw).ok_or_else(|| bad("logtimestamps", raw))?,
        None => true,
    };

    let mut blobs = BlobStoreConfig::new(data_dir.clone());
    if let Some(raw) = lookup("blobsplit") {
        blobs.split = parse_conf_bool(raw).ok_or_else(|| bad("blobsplit", raw))?;
    }
    if let Some(raw) = lookup("blobsplitsize") {
        blobs.split_size = raw
            .parse::<u64>()
            .ok()
            .filter(|size| *size > 0)
            .ok_or_else(|| bad("blobsplitsize", raw))?;
    }
    if let Some(raw) = lookup("blobremote") {
        if !raw.is_empty() {
            blobs.remote = Some(raw.to_string());
        }
    }
    if let Some(raw) = lookup("blobcachepages") {
        blobs.cache_pages = raw.parse().map_err(|_| bad("blobcachepages", raw))?;
    }
    if let Some(raw) = lookup("blobmissing") {
        blobs.missing = MissingBlobPolicy::parse(raw).ok_or_else(|| bad("blobmissing", raw))?;
    }

    let default_rpc_url = match network {
        Network::Mainnet => "http://127.0.0.1:8332",
        Network::Testnet => "http://127.0.0.1:18332",
    };
    let mut rpc = RpcConfig::new(
        rpc_url
            .or_else(|| lookup("rpcurl").map(str::to_string))
            .unwrap_or_else(|| default_rpc_url.to_string()),
    );
    if let Some(raw) = lookup("rpcuser") {
        rpc.user = raw.to_string();
    }
    if let Some(raw) = lookup("rpcpassword") {
        rpc.password = raw.to_string();
    }
    if let Some(raw) = lookup("rpctimeout") {
        rpc.timeout = Duration::from_secs(raw.parse().map_err(|_| bad("rpctimeout", raw))?);
    }
    if let Some(raw) = lookup("rpcretrydelay") {
        rpc.retry_delay = Duration::from_secs(raw.parse().map_err(|_| bad("rpcretrydelay", raw))?);
    }
    if let Some(raw) = lookup("rpcmaxattempts") {
        let attempts: u32 = raw.parse().map_err(|_| bad("rpcmaxattempts", raw))?;
        rpc.max_attempts = (attempts > 0).then_some(attempts);
    }

    Ok(CliAction::Run(
        Box::new(Config {
            data_dir,
            conf_path,
            network,
            log_level,
            log_format,
            log_timestamps,
            blobs,
            rpc,
        }),
        command,
    ))
}

/// Reads `key=value` lines. Keys are lowercased, `#` and `;` start comments,
/// a bare key means `1`, and repeated keys keep every value in order.
fn load_sqlchain_conf(path: &Path) -> Result<Option<HashMap<String, Vec<String>>>, String> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(format!("{}: {err}", path.display())),
    };

    let mut out: HashMap<String, Vec<String>> = HashMap::new();
    for raw_line in contents.lines() {
        let mut line = raw_line.trim();
        if let Some(idx) = line.find(|ch: char| ch == '#' || ch == ';') {
            line = &line[..idx];
        }
        line = line.trim();
        if line.is_empty() {
            continue;
        }
        let (key, value) = match line.split_once('=') {
            Some((key, value)) => (key.trim(), value.trim()),
            None => (line, "1"),
        };
        if key.is_empty() {
            continue;
        }
        out.entry(key.to_ascii_lowercase())
            .or_default()
            .push(value.to_string());
    }
    Ok(Some(out))
}

fn parse_conf_bool(value: &str) -> Option<bool> {
    let value = value.trim();
    if value.is_empty() {
        return Some(true);
    }
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Some(true),
        "0" | "false" | "no" => Some(false),
        _ => None,
    }
}

fn usage() -> String {
    [
        "Usage:",
        "  sqlchain-util [options] <command> [args]",
        "",
        "Commands:",
        "  classify <script-hex>          Classify an output script",
        "  disasm <script-hex>            Disassemble a script",
        "  addr-encode <hash160-hex> [p2sh]  Encode a 20-byte hash as an address",
        "  addr-decode <address>          Decode an address to its hash, kind and network",
        "  addr-id <address>              Find or allocate the id of an address",
        "  tx-id <txid> [allocate]        Find (or allocate) the id of a transaction",
        "  header <height>                Print the stored header at a height",
        "  chunk <index>                  Print a 2016-header chunk as hex",
        "  blob-read <offset> <len>       Print blob bytes as hex",
        "  blob-append <hex>              Append bytes to the blob store, print the offset",
        "  sync-headers <from> <to>       Fetch headers over RPC into the header store",
        "  help                           Print this help and exit",
        "  version                        Print version and exit",
        "",
        "Options:",
        "  --help, -h  Print this help and exit",
        "  --version, -V  Print version and exit",
        "  --data-dir  Base data directory (default: ./data)",
        "  --conf  Config file path (default: <data-dir>/sqlchain.conf)",
        "  --network  main|test (default: main, or `network` from the config file)",
        "  --log-level  Log verbosity (error|warn|info|debug|trace) (default: info)",
        "  --log-format  Log output format (text|json) (default: text)",
        "  --rpc-url  Node JSON-RPC endpoint (default: http://127.0.0.1:8332)",
    ]
    .join("\n")
}
