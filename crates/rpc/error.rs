//! Error taxonomy for the node client.

/// Structured errors for node RPC calls, with enough shape to decide whether
/// a retry is worthwhile.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Connection to {url} failed: {cause}")]
    ConnectionFailed { url: String, cause: String },

    #[error("{method} timed out after {elapsed_ms}ms")]
    Timeout { method: String, elapsed_ms: u64 },

    #[error("{method} HTTP {status}: {body}")]
    Http {
        method: String,
        status: u16,
        body: String,
    },

    #[error("{method} JSON-RPC error {code}: {message}")]
    JsonRpc {
        method: String,
        code: i64,
        message: String,
    },

    #[error("{method} response parse error in {field}: {cause}")]
    Parse {
        method: String,
        field: String,
        cause: String,
    },

    #[error("{method} failed after {attempts} attempt(s): {last_error}")]
    RetryExhausted {
        method: String,
        attempts: u32,
        last_error: Box<ClientError>,
    },
}

impl ClientError {
    /// Whether this error is likely transient and retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::ConnectionFailed { .. } => true,
            ClientError::Timeout { .. } => true,
            ClientError::Http { status, .. } => {
                // 429 = rate limited, 502/503/504 = server issues
                matches!(*status, 429 | 502 | 503 | 504)
            }
            ClientError::JsonRpc { .. } => false,
            ClientError::Parse { .. } => false,
            ClientError::RetryExhausted { .. } => false,
        }
    }

    /// For HTTP 429, extract the Retry-After hint (seconds) if one was seen.
    pub fn retry_after_secs(&self) -> Option<u64> {
        // The Retry-After header value is carried in the body field as a hint
        if let ClientError::Http {
            status: 429, body, ..
        } = self
        {
            body.strip_prefix("retry-after:")
                .and_then(|s| s.trim().parse().ok())
        } else {
            None
        }
    }

    /// Shorthand for a parse failure in a named response field.
    pub fn parse(method: &str, field: &str, cause: impl Into<String>) -> Self {
        ClientError::Parse {
            method: method.into(),
            field: field.into(),
            cause: cause.into(),
        }
    }
}
