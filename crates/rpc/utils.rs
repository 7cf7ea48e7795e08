//! JSON-RPC envelope types shared with the host pipeline.
//!
//! - [`RpcRequest`]: parsed JSON-RPC 2.0 request
//! - [`RpcErr`]: pipeline error type with proper JSON-RPC error codes
//! - Response types for success and error cases

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ClientError;

/// Error type for JSON-RPC method failures in the host pipeline.
///
/// Each variant maps to a specific JSON-RPC error code when serialized:
/// - `-32601`: Method not found
/// - `-32602`: Invalid params
/// - `-32603`: Internal error
/// - `-32000`: Generic server error
/// - `3`: Execution reverted
#[derive(Debug, thiserror::Error)]
pub enum RpcErr {
    #[error("Method not found: {0}")]
    MethodNotFound(String),
    #[error("Invalid params: {0}")]
    BadParams(String),
    #[error("Missing parameter: {0}")]
    MissingParam(String),
    #[error("Internal Error: {0}")]
    Internal(String),
    #[error("execution reverted: data={data}")]
    Revert { data: String },
}

impl From<RpcErr> for RpcErrorMetadata {
    fn from(value: RpcErr) -> Self {
        match value {
            RpcErr::MethodNotFound(bad_method) => RpcErrorMetadata {
                code: -32601,
                data: None,
                message: format!("Method not found: {bad_method}"),
            },
            RpcErr::BadParams(context) => RpcErrorMetadata {
                code: -32602,
                data: None,
                message: format!("Invalid params: {context}"),
            },
            RpcErr::MissingParam(parameter_name) => RpcErrorMetadata {
                code: -32000,
                data: None,
                message: format!("Expected parameter: {parameter_name} is missing"),
            },
            RpcErr::Internal(context) => RpcErrorMetadata {
                code: -32603,
                data: None,
                message: format!("Internal Error: {context}"),
            },
            RpcErr::Revert { data } => RpcErrorMetadata {
                code: 3,
                data: Some(data.clone()),
                message: format!("execution reverted: {data}"),
            },
        }
    }
}

impl From<serde_json::Error> for RpcErr {
    fn from(error: serde_json::Error) -> Self {
        Self::BadParams(error.to_string())
    }
}

impl From<ClientError> for RpcErr {
    fn from(error: ClientError) -> Self {
        Self::Internal(error.to_string())
    }
}

/// JSON-RPC request identifier.
///
/// Per the JSON-RPC 2.0 spec, request IDs can be either numbers or strings.
/// The same ID must be returned in the response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RpcRequestId {
    /// Numeric request ID.
    Number(u64),
    /// String request ID.
    String(String),
}

/// A parsed JSON-RPC 2.0 request.
///
/// # Example
///
/// ```json
/// {
///     "jsonrpc": "2.0",
///     "id": 1,
///     "method": "eth_call",
///     "params": [{"to": "0x...", "data": "0x..."}, "latest"]
/// }
/// ```
#[derive(Serialize, Deserialize, Debug)]
pub struct RpcRequest {
    /// Request identifier, echoed back in the response.
    pub id: RpcRequestId,
    /// JSON-RPC version, must be "2.0".
    pub jsonrpc: String,
    /// Method name (e.g., "eth_sendTransaction").
    pub method: String,
    /// Optional array of method parameters.
    pub params: Option<Vec<Value>>,
}

impl RpcRequest {
    pub fn new(method: &str, params: Option<Vec<Value>>) -> Self {
        RpcRequest {
            id: RpcRequestId::Number(1),
            jsonrpc: "2.0".to_string(),
            method: method.to_string(),
            params,
        }
    }

    /// First positional parameter, if any.
    pub fn first_param(&self) -> Option<&Value> {
        self.params.as_ref().and_then(|params| params.first())
    }
}

impl Default for RpcRequest {
    fn default() -> Self {
        RpcRequest {
            id: RpcRequestId::Number(1),
            jsonrpc: "2.0".to_string(),
            method: "".to_string(),
            params: None,
        }
    }
}

/// Error metadata for JSON-RPC error responses.
#[derive(Serialize, Deserialize, Debug)]
pub struct RpcErrorMetadata {
    /// Numeric error code (negative for standard errors).
    pub code: i32,
    /// Optional additional error data (e.g., revert reason).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    /// Human-readable error message.
    pub message: String,
}

/// A successful JSON-RPC 2.0 response.
#[derive(Serialize, Deserialize, Debug)]
pub struct RpcSuccessResponse {
    pub id: RpcRequestId,
    pub jsonrpc: String,
    pub result: Value,
}

/// An error JSON-RPC 2.0 response.
#[derive(Serialize, Deserialize, Debug)]
pub struct RpcErrorResponse {
    pub id: RpcRequestId,
    pub jsonrpc: String,
    pub error: RpcErrorMetadata,
}

/// A JSON-RPC 2.0 response, either success or error.
#[derive(Deserialize, Debug)]
#[serde(untagged)]
pub enum RpcResponse {
    Success(RpcSuccessResponse),
    Error(RpcErrorResponse),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_roundtrip() {
        let raw = json!({
            "id": 7,
            "jsonrpc": "2.0",
            "method": "eth_call",
            "params": [{"to": "0x0000000000000000000000000000000000000042"}, "latest"]
        });
        let req: RpcRequest = serde_json::from_value(raw).expect("should parse");
        assert_eq!(req.method, "eth_call");
        assert!(req.first_param().is_some());
        assert!(matches!(req.id, RpcRequestId::Number(7)));
    }

    #[test]
    fn string_request_id() {
        let raw = json!({"id": "abc", "jsonrpc": "2.0", "method": "eth_blockNumber"});
        let req: RpcRequest = serde_json::from_value(raw).expect("should parse");
        assert!(matches!(req.id, RpcRequestId::String(_)));
        assert!(req.first_param().is_none());
    }

    #[test]
    fn error_code_mapping() {
        let meta: RpcErrorMetadata = RpcErr::MethodNotFound("eth_foo".into()).into();
        assert_eq!(meta.code, -32601);
        let meta: RpcErrorMetadata = RpcErr::BadParams("nope".into()).into();
        assert_eq!(meta.code, -32602);
        let meta: RpcErrorMetadata = RpcErr::Internal("boom".into()).into();
        assert_eq!(meta.code, -32603);
        let meta: RpcErrorMetadata = RpcErr::Revert { data: "0x".into() }.into();
        assert_eq!(meta.code, 3);
        assert_eq!(meta.data.as_deref(), Some("0x"));
    }

    #[test]
    fn response_untagged_parse() {
        let ok = json!({"id": 1, "jsonrpc": "2.0", "result": "0x1"});
        assert!(matches!(
            serde_json::from_value::<RpcResponse>(ok).expect("should parse"),
            RpcResponse::Success(_)
        ));
        let err = json!({
            "id": 1,
            "jsonrpc": "2.0",
            "error": {"code": -32000, "message": "nope"}
        });
        assert!(matches!(
            serde_json::from_value::<RpcResponse>(err).expect("should parse"),
            RpcResponse::Error(_)
        ));
    }
}
