use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{json, Value};
use sqlchain_rpc::{
    RpcClient, RpcConfig, RpcError, Shutdown, Transport, TransportError, TransportResponse,
};

type Step = Result<(i32, String), String>;

/// Replays a fixed list of replies and records every request body.
#[derive(Clone, Default)]
struct Scripted {
    steps: Arc<Mutex<VecDeque<Step>>>,
    requests: Arc<Mutex<Vec<Value>>>,
}

impl Scripted {
    fn new(steps: Vec<Step>) -> Self {
        Self {
            steps: Arc::new(Mutex::new(steps.into())),
            requests: Arc::default(),
        }
    }

    fn requests(&self) -> Vec<Value> {
        self.requests.lock().expect("requests").clone()
    }
}

impl Transport for Scripted {
    fn post(&self, body: &[u8]) -> Result<TransportResponse, TransportError> {
        self.requests
            .lock()
            .expect("requests")
            .push(serde_json::from_slice(body).expect("request json"));
        let step = self
            .steps
            .lock()
            .expect("steps")
            .pop_front()
            .unwrap_or_else(|| Err("script exhausted".to_string()));
        match step {
            Ok((status, body)) => Ok(TransportResponse {
                status,
                body: body.into_bytes(),
            }),
            Err(message) => Err(TransportError(message)),
        }
    }
}

fn ok(result: Value) -> Step {
    Ok((200, json!({ "result": result, "error": null, "id": 1 }).to_string()))
}

fn node_error(code: i64, message: &str) -> Step {
    Ok((
        500,
        json!({ "result": null, "error": { "code": code, "message": message }, "id": 1 })
            .to_string(),
    ))
}

fn fast_config() -> RpcConfig {
    let mut config = RpcConfig::new("http://127.0.0.1:8332");
    config.retry_delay = Duration::from_millis(1);
    config
}

fn client(script: &Scripted, config: &RpcConfig) -> RpcClient {
    RpcClient::with_transport(Box::new(script.clone()), config, Shutdown::new())
}

#[test]
fn call_returns_result_and_sends_request() {
    let script = Scripted::new(vec![ok(json!(812_345))]);
    let client = client(&script, &fast_config());
    assert_eq!(client.get_block_count().expect("count"), 812_345);
    let requests = script.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0]["method"], "getblockcount");
    assert_eq!(requests[0]["params"], json!([]));
}

#[test]
fn not_found_is_none() {
    let script = Scripted::new(vec![node_error(
        -5,
        "No such mempool or blockchain transaction",
    )]);
    let client = client(&script, &fast_config());
    assert_eq!(client.get_raw_transaction(&[0x11; 32]).expect("call"), None);
}

#[test]
fn other_node_errors_are_returned() {
    let script = Scripted::new(vec![node_error(-8, "Block height out of range")]);
    let client = client(&script, &fast_config());
    assert_eq!(
        client.get_block_hash(99_999_999),
        Err(RpcError::Rpc {
            code: -8,
            message: "Block height out of range".to_string()
        })
    );
    assert_eq!(script.requests().len(), 1);
}

#[test]
fn transport_failures_are_retried_and_logged() {
    sqlchain_log::set_stderr_enabled(false);
    sqlchain_log::enable_capture(4096);
    let script = Scripted::new(vec![
        Err("connection refused".to_string()),
        Ok((200, "<html>warming up</html>".to_string())),
        ok(json!("00000000000000000001")),
    ]);
    let client = client(&script, &fast_config());
    let value = client
        .call("getbestblockhash", &[])
        .expect("call")
        .expect("some");
    assert_eq!(value, json!("00000000000000000001"));
    assert_eq!(script.requests().len(), 3);
    assert!(sqlchain_log::captured_contains(
        sqlchain_log::Level::Warn,
        "rpc getbestblockhash failed (attempt 1): connection refused"
    ));
    assert!(sqlchain_log::captured_contains(
        sqlchain_log::Level::Warn,
        "rpc getbestblockhash failed (attempt 2): malformed reply"
    ));
}

#[test]
fn max_attempts_bounds_the_retry_loop() {
    sqlchain_log::set_stderr_enabled(false);
    let script = Scripted::new(Vec::new());
    let mut config = fast_config();
    config.max_attempts = Some(3);
    let client = client(&script, &config);
    assert_eq!(
        client.call("getblockcount", &[]),
        Err(RpcError::RetriesExhausted { attempts: 3 })
    );
    assert_eq!(script.requests().len(), 3);
}

#[test]
fn shutdown_cancels_a_retrying_call() {
    sqlchain_log::set_stderr_enabled(false);
    let script = Scripted::new(Vec::new());
    let mut config = fast_config();
    config.retry_delay = Duration::from_secs(30);
    let shutdown = Shutdown::new();
    let client = RpcClient::with_transport(Box::new(script.clone()), &config, shutdown.clone());
    let trigger = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(50));
        shutdown.trigger();
    });
    assert_eq!(client.call("getblockcount", &[]), Err(RpcError::Cancelled));
    trigger.join().expect("trigger");
    assert_eq!(script.requests().len(), 1);
}

#[test]
fn triggered_shutdown_skips_the_call() {
    let script = Scripted::new(vec![ok(json!(1))]);
    let shutdown = Shutdown::new();
    shutdown.trigger();
    let client = RpcClient::with_transport(Box::new(script.clone()), &fast_config(), shutdown);
    assert_eq!(client.call("getblockcount", &[]), Err(RpcError::Cancelled));
    assert!(script.requests().is_empty());
}

#[test]
fn raw_header_and_block_are_hex_decoded() {
    let header = [0x42u8; 80];
    let hex: String = header.iter().map(|byte| format!("{byte:02x}")).collect();
    let script = Scripted::new(vec![
        ok(json!(hex)),
        ok(json!("deadbeef")),
        ok(json!("abcd")),
        ok(json!(42)),
    ]);
    let client = client(&script, &fast_config());
    let hash = [0x07; 32];
    assert_eq!(client.get_block_header_raw(&hash).expect("header"), Some(header));
    assert_eq!(
        client.get_raw_block(&hash).expect("block"),
        Some(vec![0xde, 0xad, 0xbe, 0xef])
    );
    assert!(matches!(
        client.get_block_header_raw(&hash),
        Err(RpcError::InvalidResult { .. })
    ));
    assert!(matches!(
        client.get_raw_block(&hash),
        Err(RpcError::InvalidResult { .. })
    ));
    let requests = script.requests();
    assert_eq!(requests[0]["method"], "getblockheader");
    assert_eq!(requests[0]["params"][1], json!(false));
    assert_eq!(requests[1]["params"][0], json!("07".repeat(32)));
}
