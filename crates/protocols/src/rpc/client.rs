//! Minimal JSON-RPC 2.0 client.

use lpbot_domain::enums::Chain;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Default per-request timeout. Bounds calls that would otherwise hang past a lock lease.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum JsonRpcError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("response carried neither result nor error")]
    MissingResult,
}

#[derive(Serialize)]
struct Request<'a, P> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: P,
}

#[derive(Deserialize)]
struct Response<R> {
    result: Option<R>,
    error: Option<ErrorObject>,
}

#[derive(Deserialize)]
struct ErrorObject {
    code: i64,
    message: String,
}

/// JSON-RPC client bound to a single endpoint URL.
pub struct JsonRpcClient {
    http: reqwest::Client,
    url: String,
    next_id: AtomicU64,
}

impl JsonRpcClient {
    /// Creates a client with [`DEFAULT_REQUEST_TIMEOUT`].
    pub fn new(url: impl Into<String>) -> Result<Self, JsonRpcError> {
        Self::with_timeout(url, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> Result<Self, JsonRpcError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            url: url.into(),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Sends `method` with `params` and decodes the `result` field.
    pub async fn call<P, R>(&self, method: &str, params: P) -> Result<R, JsonRpcError>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!(url = %self.url, method, id, "Sending JSON-RPC request");

        let response: Response<R> = self
            .http
            .post(&self.url)
            .json(&Request {
                jsonrpc: "2.0",
                id,
                method,
                params,
            })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if let Some(error) = response.error {
            return Err(JsonRpcError::Rpc {
                code: error.code,
                message: error.message,
            });
        }
        response.result.ok_or(JsonRpcError::MissingResult)
    }
}

/// Cheap read-only method used to check endpoint liveness on `chain`.
pub fn health_method(chain: Chain) -> &'static str {
    match chain {
        Chain::Solana => "getSlot",
        Chain::Sui => "sui_getLatestCheckpointSequenceNumber",
    }
}
