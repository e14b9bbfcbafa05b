//! JSON-RPC 2.0 framing for the Agent Client Protocol.
//!
//! Every message is one line of newline-delimited JSON. Unlike a plain
//! request/response client, the subprocess on the other end is *also* a
//! JSON-RPC caller: it sends us `requestPermission`/`readTextFile`/
//! `writeTextFile` requests and `sessionUpdate` notifications on the same
//! stream we use to send it `initialize`/`newSession`/`prompt`. `id` is
//! `Value` rather than a fixed integer type because the two directions
//! mint ids independently and don't need to agree on a representation.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const JSONRPC_VERSION: &str = "2.0";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: Value,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    pub fn new(id: u64, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: Value::from(id),
            method: method.into(),
            params,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcNotification {
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    pub fn ok(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn err(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl std::fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "JSON-RPC error {}: {}", self.code, self.message)
    }
}

/// Access-denied error code used by `readTextFile`/`writeTextFile` when the
/// resolved target escapes the bound workspace.
pub const CODE_ACCESS_DENIED: i64 = -32001;
/// Generic internal error surfaced when a client callback panics or fails
/// in a way that isn't a protocol-level validation error.
pub const CODE_INTERNAL_ERROR: i64 = -32000;

/// One line off the wire, classified by shape: has `method` + `id` → a
/// request *from* the child; has `method` and no `id` → a notification;
/// has `id` and no `method` → a response to one of *our* outstanding
/// requests.
#[derive(Debug, Clone)]
pub enum IncomingMessage {
    Response(JsonRpcResponse),
    Request(JsonRpcRequest),
    Notification(JsonRpcNotification),
}

/// Parses one line of input. Malformed or unrecognized shapes return
/// `None` rather than erroring — the reader loop skips them, mirroring how
/// the memory log treats a malformed line as skip-with-counter rather than
/// fatal.
pub fn parse_incoming(line: &str) -> Option<IncomingMessage> {
    let value: Value = serde_json::from_str(line).ok()?;
    let has_method = value.get("method").is_some();
    let has_id = value.get("id").is_some();
    if has_method && has_id {
        serde_json::from_value(value).ok().map(IncomingMessage::Request)
    } else if has_method {
        serde_json::from_value(value).ok().map(IncomingMessage::Notification)
    } else if has_id {
        serde_json::from_value(value).ok().map(IncomingMessage::Response)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_request() {
        let line = r#"{"jsonrpc":"2.0","id":1,"method":"requestPermission","params":{}}"#;
        match parse_incoming(line) {
            Some(IncomingMessage::Request(req)) => assert_eq!(req.method, "requestPermission"),
            other => panic!("expected request, got {other:?}"),
        }
    }

    #[test]
    fn classifies_notification() {
        let line = r#"{"jsonrpc":"2.0","method":"sessionUpdate","params":{}}"#;
        match parse_incoming(line) {
            Some(IncomingMessage::Notification(n)) => assert_eq!(n.method, "sessionUpdate"),
            other => panic!("expected notification, got {other:?}"),
        }
    }

    #[test]
    fn classifies_response() {
        let line = r#"{"jsonrpc":"2.0","id":7,"result":{"ok":true}}"#;
        match parse_incoming(line) {
            Some(IncomingMessage::Response(resp)) => assert_eq!(resp.id, Value::from(7)),
            other => panic!("expected response, got {other:?}"),
        }
    }

    #[test]
    fn garbage_line_is_none() {
        assert!(parse_incoming("not json").is_none());
        assert!(parse_incoming(r#"{"jsonrpc":"2.0"}"#).is_none());
    }
}
