use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use serde::Deserialize;
use serde_json::{json, Value};
use sqlchain_primitives::{hex, Hash256, HEADER_LEN};

use crate::shutdown::Shutdown;
use crate::transport::{HttpTransport, Transport};
use crate::RpcError;

/// Node error code for an unknown transaction, block or key.
pub const RPC_NOT_FOUND: i64 = -5;

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_RETRY_DELAY_SECS: u64 = 3;

#[derive(Clone, Debug)]
pub struct RpcConfig {
    pub url: String,
    pub user: String,
    pub password: String,
    pub timeout: Duration,
    pub retry_delay: Duration,
    /// `None` retries until shutdown.
    pub max_attempts: Option<u32>,
}

impl RpcConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            user: String::new(),
            password: String::new(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            retry_delay: Duration::from_secs(DEFAULT_RETRY_DELAY_SECS),
            max_attempts: None,
        }
    }
}

#[derive(Deserialize)]
struct Reply {
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<ReplyError>,
}

#[derive(Deserialize)]
struct ReplyError {
    code: i64,
    #[serde(default)]
    message: String,
}

enum Failure {
    Node { code: i64, message: String },
    Transport(String),
}

pub struct RpcClient {
    transport: Box<dyn Transport>,
    retry_delay: Duration,
    max_attempts: Option<u32>,
    shutdown: Shutdown,
    // held only while a request body is built
    request_lock: Mutex<()>,
    next_id: AtomicU64,
}

impl RpcClient {
    pub fn new(config: &RpcConfig, shutdown: Shutdown) -> Self {
        let transport = HttpTransport::new(
            config.url.clone(),
            &config.user,
            &config.password,
            config.timeout.as_secs().max(1),
        );
        Self::with_transport(Box::new(transport), config, shutdown)
    }

    pub fn with_transport(
        transport: Box<dyn Transport>,
        config: &RpcConfig,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            transport,
            retry_delay: config.retry_delay,
            max_attempts: config.max_attempts,
            shutdown,
            request_lock: Mutex::new(()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn shutdown(&self) -> &Shutdown {
        &self.shutdown
    }

    /// Issues `method` and returns its result. A not-found reply yields
    /// `Ok(None)`; other node errors are returned as-is. Transport failures
    /// are logged and retried until the call succeeds, the shutdown signal
    /// fires, or `max_attempts` is spent.
    pub fn call(&self, method: &str, params: &[Value]) -> Result<Option<Value>, RpcError> {
        let body = {
            let _guard = self.request_lock.lock().expect("rpc request lock");
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            json!({
                "jsonrpc": "1.0",
                "id": id,
                "method": method,
                "params": params,
            })
            .to_string()
        };

        let mut attempts = 0u32;
        loop {
            if self.shutdown.is_triggered() {
                return Err(self.cancelled(method));
            }
            attempts += 1;
            match self.attempt(body.as_bytes()) {
                Ok(value) => return Ok(Some(value)),
                Err(Failure::Node { code, .. }) if code == RPC_NOT_FOUND => return Ok(None),
                Err(Failure::Node { code, message }) => {
                    return Err(RpcError::Rpc { code, message })
                }
                Err(Failure::Transport(detail)) => {
                    if self.max_attempts.is_some_and(|max| attempts >= max) {
                        sqlchain_log::log_warn!(
                            "rpc {method} failed (attempt {attempts}): {detail}; giving up"
                        );
                        return Err(RpcError::RetriesExhausted { attempts });
                    }
                    sqlchain_log::log_warn!(
                        "rpc {method} failed (attempt {attempts}): {detail}; retrying in {}ms",
                        self.retry_delay.as_millis()
                    );
                    if !self.shutdown.sleep(self.retry_delay) {
                        return Err(self.cancelled(method));
                    }
                }
            }
        }
    }

    fn cancelled(&self, method: &str) -> RpcError {
        sqlchain_log::log_info!("rpc {method} cancelled by shutdown");
        RpcError::Cancelled
    }

    fn attempt(&self, body: &[u8]) -> Result<Value, Failure> {
        let response = self
            .transport
            .post(body)
            .map_err(|err| Failure::Transport(err.to_string()))?;
        // the node reports application errors with a JSON body on non-200 statuses
        let reply: Reply = serde_json::from_slice(&response.body).map_err(|err| {
            Failure::Transport(format!(
                "malformed reply (HTTP {}): {err}",
                response.status
            ))
        })?;
        match reply.error {
            Some(error) => Err(Failure::Node {
                code: error.code,
                message: error.message,
            }),
            None => Ok(reply.result),
        }
    }

    pub fn get_block_count(&self) -> Result<u64, RpcError> {
        let value = self.require("getblockcount", &[])?;
        value
            .as_u64()
            .ok_or_else(|| invalid("getblockcount", "not an unsigned integer"))
    }

    pub fn get_block_hash(&self, height: u32) -> Result<Option<Hash256>, RpcError> {
        let Some(value) = self.call("getblockhash", &[json!(height)])? else {
            return Ok(None);
        };
        value
            .as_str()
            .and_then(hex::hash_from_display)
            .map(Some)
            .ok_or_else(|| invalid("getblockhash", "not a block hash"))
    }

    pub fn get_block_header_raw(&self, hash: &Hash256) -> Result<Option<[u8; HEADER_LEN]>, RpcError> {
        let raw = self.call_hex(
            "getblockheader",
            &[json!(hex::hash_to_display(hash)), json!(false)],
        )?;
        let Some(raw) = raw else {
            return Ok(None);
        };
        raw.try_into()
            .map(Some)
            .map_err(|_| invalid("getblockheader", "header is not 80 bytes"))
    }

    pub fn get_raw_transaction(&self, txid: &Hash256) -> Result<Option<Vec<u8>>, RpcError> {
        self.call_hex(
            "getrawtransaction",
            &[json!(hex::hash_to_display(txid)), json!(0)],
        )
    }

    pub fn get_raw_block(&self, hash: &Hash256) -> Result<Option<Vec<u8>>, RpcError> {
        self.call_hex("getblock", &[json!(hex::hash_to_display(hash)), json!(0)])
    }

    fn require(&self, method: &str, params: &[Value]) -> Result<Value, RpcError> {
        self.call(method, params)?
            .ok_or_else(|| invalid(method, "not found"))
    }

    fn call_hex(&self, method: &str, params: &[Value]) -> Result<Option<Vec<u8>>, RpcError> {
        let Some(value) = self.call(method, params)? else {
            return Ok(None);
        };
        value
            .as_str()
            .and_then(hex::decode)
            .map(Some)
            .ok_or_else(|| invalid(method, "not a hex string"))
    }
}

fn invalid(method: &str, detail: &str) -> RpcError {
    RpcError::InvalidResult {
        method: method.to_string(),
        detail: detail.to_string(),
    }
}
