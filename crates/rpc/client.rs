//! Async JSON-RPC HTTP client for the development node.
//!
//! Supports configurable timeouts, exponential backoff retry, and
//! rate-limit awareness (HTTP 429 + Retry-After).

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use bytes::Bytes;
use ethereum_types::{Address, H256, U256};
use serde_json::{Value, json};

use crate::error::ClientError;
use crate::types::{BlockSelector, RpcBlock, TraceStep, TransactionPayload, TransactionTrace};

/// Configuration for RPC client behavior.
#[derive(Debug, Clone)]
pub struct RpcConfig {
    /// Per-request timeout (default: 30s).
    pub timeout: Duration,
    /// TCP connect timeout (default: 10s).
    pub connect_timeout: Duration,
    /// Maximum retry attempts for transient errors (default: 3).
    pub max_retries: u32,
    /// Base backoff duration, doubled on each retry (default: 1s).
    pub base_backoff: Duration,
    /// Receipt poll interval while waiting for a transaction to be mined
    /// (default: 100ms). There is no overall deadline; a transaction that
    /// never mines stalls the waiter.
    pub receipt_poll_interval: Duration,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            max_retries: 3,
            base_backoff: Duration::from_secs(1),
            receipt_poll_interval: Duration::from_millis(100),
        }
    }
}

/// The node operations trace capture is built on.
///
/// Implemented over HTTP by [`RpcClient`]; tests substitute an in-memory
/// node. Snapshot/revert are the `evm_snapshot`/`evm_revert` primitives of
/// development nodes; production nodes that lack them cannot host capture.
#[async_trait::async_trait]
pub trait NodeClient: Send + Sync {
    /// Submit a transaction payload (`eth_sendTransaction`).
    async fn send_transaction(&self, payload: &TransactionPayload) -> Result<H256, ClientError>;

    /// Block until the transaction has a receipt.
    async fn wait_mined(&self, hash: H256) -> Result<(), ClientError>;

    /// Fetch the instruction-level execution log of a mined transaction,
    /// with memory and storage capture disabled.
    async fn trace_transaction(&self, hash: H256) -> Result<Vec<TraceStep>, ClientError>;

    /// Deployed runtime bytecode at `address`, at the latest block.
    async fn get_code(&self, address: Address) -> Result<Bytes, ClientError>;

    /// Block lookup including full transaction objects.
    async fn get_block_by_number(&self, selector: BlockSelector) -> Result<RpcBlock, ClientError>;

    /// Checkpoint all chain state, returning an opaque snapshot id.
    async fn take_snapshot(&self) -> Result<U256, ClientError>;

    /// Roll chain state back to a snapshot. `false` means the node refused
    /// (unknown or already-consumed id).
    async fn revert_snapshot(&self, id: U256) -> Result<bool, ClientError>;
}

/// HTTP JSON-RPC implementation of [`NodeClient`].
pub struct RpcClient {
    http: reqwest::Client,
    url: String,
    config: RpcConfig,
    next_id: AtomicU64,
}

impl RpcClient {
    pub fn new(url: &str) -> Self {
        Self::with_config(url, RpcConfig::default())
    }

    pub fn with_config(url: &str, config: RpcConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            http,
            url: url.to_string(),
            config,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn config(&self) -> &RpcConfig {
        &self.config
    }

    /// Execute a JSON-RPC call with retry and backoff.
    async fn rpc_call(&self, method: &str, params: Value) -> Result<Value, ClientError> {
        let body = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": self.next_id.fetch_add(1, Ordering::Relaxed),
        });

        let max_attempts = self.config.max_retries + 1; // 1 initial + N retries
        let mut last_error: Option<ClientError> = None;

        for attempt in 0..max_attempts {
            if attempt > 0 {
                let backoff = last_error
                    .as_ref()
                    .and_then(ClientError::retry_after_secs)
                    .map(Duration::from_secs)
                    .unwrap_or_else(|| {
                        self.config.base_backoff * 2u32.saturating_pow(attempt - 1)
                    });
                tokio::time::sleep(backoff).await;
            }

            match self.rpc_call_once(method, &body).await {
                Ok(val) => return Ok(val),
                Err(err) => {
                    if !err.is_retryable() || attempt + 1 >= max_attempts {
                        if attempt > 0 {
                            return Err(ClientError::RetryExhausted {
                                method: method.into(),
                                attempts: attempt + 1,
                                last_error: Box::new(err),
                            });
                        }
                        return Err(err);
                    }
                    last_error = Some(err);
                }
            }
        }

        Err(last_error
            .map(|e| ClientError::RetryExhausted {
                method: method.into(),
                attempts: max_attempts,
                last_error: Box::new(e),
            })
            .unwrap_or_else(|| ClientError::parse(method, "result", "unknown error")))
    }

    /// Single attempt at an RPC call (no retry).
    async fn rpc_call_once(&self, method: &str, body: &Value) -> Result<Value, ClientError> {
        let response = self
            .http
            .post(&self.url)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ClientError::Timeout {
                        method: method.into(),
                        elapsed_ms: self.config.timeout.as_millis() as u64,
                    }
                } else {
                    ClientError::ConnectionFailed {
                        url: self.url.clone(),
                        cause: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            // Carry the Retry-After header through for 429 responses
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .map(|v| format!("retry-after:{v}"))
                .unwrap_or_default();

            let body_text = response.text().await.unwrap_or_default();
            let display_body = if retry_after.is_empty() {
                body_text
            } else {
                retry_after
            };

            return Err(ClientError::Http {
                method: method.into(),
                status: status.as_u16(),
                body: display_body,
            });
        }

        let json_response: Value = response
            .json()
            .await
            .map_err(|e| ClientError::parse(method, "response_body", e.to_string()))?;

        if let Some(error) = json_response.get("error") {
            let code = error.get("code").and_then(|c| c.as_i64()).unwrap_or(-1);
            let message = error
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("unknown")
                .to_string();
            return Err(ClientError::JsonRpc {
                method: method.into(),
                code,
                message,
            });
        }

        json_response
            .get("result")
            .cloned()
            .ok_or_else(|| ClientError::parse(method, "result", "missing result field"))
    }

    fn typed<T: serde::de::DeserializeOwned>(
        method: &str,
        result: Value,
    ) -> Result<T, ClientError> {
        serde_json::from_value(result).map_err(|e| ClientError::parse(method, "result", e.to_string()))
    }
}

#[async_trait::async_trait]
impl NodeClient for RpcClient {
    async fn send_transaction(&self, payload: &TransactionPayload) -> Result<H256, ClientError> {
        let result = self
            .rpc_call("eth_sendTransaction", json!([payload]))
            .await?;
        Self::typed("eth_sendTransaction", result)
    }

    async fn wait_mined(&self, hash: H256) -> Result<(), ClientError> {
        loop {
            let receipt = self
                .rpc_call("eth_getTransactionReceipt", json!([hash]))
                .await?;
            if !receipt.is_null() {
                return Ok(());
            }
            tokio::time::sleep(self.config.receipt_poll_interval).await;
        }
    }

    async fn trace_transaction(&self, hash: H256) -> Result<Vec<TraceStep>, ClientError> {
        // Memory and storage blow up trace size; coverage only needs the
        // stack and call-depth bookkeeping.
        let options = json!({
            "disableMemory": true,
            "disableStorage": true,
            "disableStack": false,
        });
        let result = self
            .rpc_call("debug_traceTransaction", json!([hash, options]))
            .await?;
        let trace: TransactionTrace = Self::typed("debug_traceTransaction", result)?;
        Ok(trace.struct_logs)
    }

    async fn get_code(&self, address: Address) -> Result<Bytes, ClientError> {
        let result = self
            .rpc_call("eth_getCode", json!([address, "latest"]))
            .await?;
        let hex_str = result
            .as_str()
            .ok_or_else(|| ClientError::parse("eth_getCode", "result", "expected string"))?;
        let raw = hex_str.strip_prefix("0x").unwrap_or(hex_str);
        hex::decode(raw)
            .map(Bytes::from)
            .map_err(|e| ClientError::parse("eth_getCode", "result", e.to_string()))
    }

    async fn get_block_by_number(&self, selector: BlockSelector) -> Result<RpcBlock, ClientError> {
        let result = self
            .rpc_call("eth_getBlockByNumber", json!([selector.to_param(), true]))
            .await?;
        if result.is_null() {
            return Err(ClientError::parse(
                "eth_getBlockByNumber",
                "result",
                "block not found",
            ));
        }
        Self::typed("eth_getBlockByNumber", result)
    }

    async fn take_snapshot(&self) -> Result<U256, ClientError> {
        let result = self.rpc_call("evm_snapshot", json!([])).await?;
        Self::typed("evm_snapshot", result)
    }

    async fn revert_snapshot(&self, id: U256) -> Result<bool, ClientError> {
        let result = self.rpc_call("evm_revert", json!([id])).await?;
        result
            .as_bool()
            .ok_or_else(|| ClientError::parse("evm_revert", "result", "expected bool"))
    }
}
