use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError(pub String);

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for TransportError {}

#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: i32,
    pub body: Vec<u8>,
}

/// Carries one request body to the node and returns the raw reply.
pub trait Transport: Send + Sync {
    fn post(&self, body: &[u8]) -> Result<TransportResponse, TransportError>;
}

/// HTTP transport over `minreq`. Every call opens a new connection, so a
/// node restart never leaves a half-open socket behind.
pub struct HttpTransport {
    url: String,
    authorization: Option<String>,
    timeout_secs: u64,
}

impl HttpTransport {
    pub fn new(url: impl Into<String>, user: &str, password: &str, timeout_secs: u64) -> Self {
        let authorization = if user.is_empty() && password.is_empty() {
            None
        } else {
            Some(format!(
                "Basic {}",
                STANDARD.encode(format!("{user}:{password}"))
            ))
        };
        Self {
            url: url.into(),
            authorization,
            timeout_secs,
        }
    }
}

impl Transport for HttpTransport {
    fn post(&self, body: &[u8]) -> Result<TransportResponse, TransportError> {
        let mut request = minreq::post(&self.url)
            .with_header("Content-Type", "application/json")
            .with_timeout(self.timeout_secs)
            .with_body(body.to_vec());
        if let Some(authorization) = &self.authorization {
            request = request.with_header("Authorization", authorization.as_str());
        }
        let response = request
            .send()
            .map_err(|err| TransportError(format!("{} ({err})", self.url)))?;
        Ok(TransportResponse {
            status: response.status_code,
            body: response.into_bytes(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_auth_header() {
        let transport = HttpTransport::new("http://127.0.0.1:8332", "alice", "secret", 30);
        assert_eq!(
            transport.authorization.as_deref(),
            Some("Basic YWxpY2U6c2VjcmV0")
        );
        let anonymous = HttpTransport::new("http://127.0.0.1:8332", "", "", 30);
        assert!(anonymous.authorization.is_none());
    }
}
