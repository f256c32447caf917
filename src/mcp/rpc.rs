//! JSON-RPC message model and response builders
//!
//! Every frame on the wire carries one [`Message`]. Requests carry an id and a
//! method, notifications a method only, responses an id plus exactly one of
//! `result` or `error`.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

pub const JSONRPC_VERSION: &str = "2.0";

pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const RESOURCE_NOT_FOUND: i64 = -32000;
pub const INTERNAL_ERROR: i64 = -32001;

/// Request identifier, echoed back with the same JSON type and value it
/// arrived with. Any JSON number is accepted, not only `i64`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(Number),
    String(String),
}

impl From<i64> for RequestId {
    fn from(value: i64) -> Self {
        Self::Number(value.into())
    }
}

impl From<&str> for RequestId {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(value) => write!(f, "{value}"),
            Self::String(value) => write!(f, "{value:?}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.code)
    }
}

impl std::error::Error for RpcError {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default = "default_version")]
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RequestId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

fn default_version() -> String {
    JSONRPC_VERSION.to_string()
}

impl Message {
    fn empty(id: Option<RequestId>) -> Self {
        Self {
            jsonrpc: default_version(),
            id,
            method: None,
            params: None,
            result: None,
            error: None,
        }
    }

    pub fn request(id: RequestId, method: impl Into<String>, params: Value) -> Self {
        Self {
            method: Some(method.into()),
            params: Some(params),
            ..Self::empty(Some(id))
        }
    }

    pub fn notification(method: impl Into<String>, params: Value) -> Self {
        Self {
            method: Some(method.into()),
            params: Some(params),
            ..Self::empty(None)
        }
    }

    pub fn result(id: RequestId, result: Value) -> Self {
        Self {
            result: Some(result),
            ..Self::empty(Some(id))
        }
    }

    pub fn error(id: RequestId, error: RpcError) -> Self {
        Self {
            error: Some(error),
            ..Self::empty(Some(id))
        }
    }

    /// Splits a response into its outcome, or returns `None` when the message
    /// carries neither or both of `result` and `error`.
    pub fn into_outcome(self) -> Option<Result<Value, RpcError>> {
        match (self.result, self.error) {
            (Some(result), None) => Some(Ok(result)),
            (None, Some(error)) => Some(Err(error)),
            _ => None,
        }
    }
}

/// Recovers an identifier from a raw body that did not parse as a message.
pub fn recover_request_id(value: &Value) -> Option<RequestId> {
    value
        .get("id")
        .and_then(|id| serde_json::from_value(id.clone()).ok())
}
