//! Error types for the interception middleware.

use covtrace_rpc::error::ClientError;

#[derive(Debug, thiserror::Error)]
pub enum InterceptorError {
    #[error("node client error: {0}")]
    Client(#[from] ClientError),

    #[error("malformed {method} payload: {cause}")]
    Payload { method: String, cause: String },
}
