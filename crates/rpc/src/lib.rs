//! Blocking JSON-RPC client for the full node, with reconnect-and-retry on
//! transport failures and an explicit shutdown signal.

pub mod client;
pub mod shutdown;
pub mod transport;

pub use client::{RpcClient, RpcConfig, RPC_NOT_FOUND};
pub use shutdown::Shutdown;
pub use transport::{HttpTransport, Transport, TransportError, TransportResponse};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RpcError {
    /// The node answered with an application error.
    Rpc { code: i64, message: String },
    Cancelled,
    RetriesExhausted { attempts: u32 },
    InvalidResult { method: String, detail: String },
}

impl std::fmt::Display for RpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RpcError::Rpc { code, message } => write!(f, "rpc error {code}: {message}"),
            RpcError::Cancelled => write!(f, "rpc call cancelled by shutdown"),
            RpcError::RetriesExhausted { attempts } => {
                write!(f, "rpc call failed after {attempts} attempts")
            }
            RpcError::InvalidResult { method, detail } => {
                write!(f, "unexpected result from {method}: {detail}")
            }
        }
    }
}

impl std::error::Error for RpcError {}
