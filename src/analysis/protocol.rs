//! JSON-RPC framing for the MCP streamable-HTTP transport.

use crate::error::AnalysisError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const JSONRPC_VERSION: &str = "2.0";
pub const SESSION_HEADER: &str = "mcp-session-id";
pub const PROTOCOL_VERSION_HEADER: &str = "mcp-protocol-version";
pub const ACCEPT_HEADER_VALUE: &str = "application/json, text/event-stream";

/// Outgoing request or notification (notifications carry no id)
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    pub fn request(id: u64, method: &str, params: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id: Some(id),
            method: method.to_string(),
            params: Some(params),
        }
    }

    pub fn notification(method: &str) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id: None,
            method: method.to_string(),
            params: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

/// Incoming message. Server-initiated requests and notifications deserialize
/// here too and are skipped by id matching.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcMessage {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcMessage {
    fn answers(&self, id: u64) -> bool {
        self.method.is_none() && self.id.as_ref().and_then(Value::as_u64) == Some(id)
    }

    /// Unwrap the result, mapping a JSON-RPC error object to a remote error
    pub fn into_result(self) -> Result<Value, AnalysisError> {
        if let Some(error) = self.error {
            return Err(AnalysisError::remote_tool(error.message));
        }
        self.result
            .ok_or_else(|| AnalysisError::malformed("JSON-RPC reply has neither result nor error"))
    }
}

/// Content item of a `tools/call` result
#[derive(Debug, Clone, Deserialize)]
pub struct ToolContent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ToolCallResult {
    #[serde(default)]
    pub content: Vec<ToolContent>,
    #[serde(default, rename = "isError")]
    pub is_error: bool,
}

impl ToolCallResult {
    /// Text of the first text content item
    pub fn first_text(&self) -> Option<&str> {
        self.content
            .iter()
            .find(|item| item.kind == "text")
            .and_then(|item| item.text.as_deref())
    }
}

pub fn initialize_params(protocol_version: &str, client_name: &str) -> Value {
    json!({
        "protocolVersion": protocol_version,
        "capabilities": {},
        "clientInfo": {
            "name": client_name,
            "version": env!("CARGO_PKG_VERSION"),
        }
    })
}

pub fn tool_call_params(tool_name: &str, arguments: Value) -> Value {
    json!({
        "name": tool_name,
        "arguments": arguments,
    })
}

/// Find the reply to request `id` in an HTTP response body.
///
/// `event_stream` selects Server-Sent Events framing, where each event's
/// `data:` lines hold one JSON-RPC message (or a batch).
pub fn extract_reply(body: &str, event_stream: bool, id: u64) -> Result<JsonRpcMessage, AnalysisError> {
    let payloads = if event_stream {
        sse_data_payloads(body)
    } else {
        vec![body.to_string()]
    };

    for payload in payloads {
        if payload.trim().is_empty() {
            continue;
        }
        let value: Value = serde_json::from_str(&payload).map_err(|e| {
            AnalysisError::malformed(format!("invalid JSON-RPC message: {}", e))
        })?;

        let candidates = match value {
            Value::Array(batch) => batch,
            single => vec![single],
        };

        for candidate in candidates {
            let message: JsonRpcMessage = serde_json::from_value(candidate).map_err(|e| {
                AnalysisError::malformed(format!("invalid JSON-RPC message: {}", e))
            })?;
            if message.answers(id) {
                return Ok(message);
            }
        }
    }

    Err(AnalysisError::transport(format!(
        "response stream ended without a reply to request {}",
        id
    )))
}

/// Concatenated `data:` payloads of each event in an SSE body
pub fn sse_data_payloads(body: &str) -> Vec<String> {
    let mut events = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in body.lines() {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.is_empty() {
            if !current.is_empty() {
                events.push(current.join("\n"));
                current.clear();
            }
            continue;
        }
        if let Some(data) = line.strip_prefix("data:") {
            current.push(data.strip_prefix(' ').unwrap_or(data));
        }
        // event:, id:, retry: and comments carry nothing we need
    }

    if !current.is_empty() {
        events.push(current.join("\n"));
    }

    events
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization() {
        let request = JsonRpcRequest::request(3, "tools/call", json!({"name": "t"}));
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({"jsonrpc": "2.0", "id": 3, "method": "tools/call", "params": {"name": "t"}})
        );

        let notification = JsonRpcRequest::notification("notifications/initialized");
        let value = serde_json::to_value(&notification).unwrap();
        assert_eq!(
            value,
            json!({"jsonrpc": "2.0", "method": "notifications/initialized"})
        );
    }

    #[test]
    fn test_sse_payloads() {
        let body = "event: message\r\ndata: {\"a\":1}\r\n\r\n: keepalive\n\nevent: message\ndata: {\"b\":\ndata: 2}\n";
        assert_eq!(sse_data_payloads(body), vec!["{\"a\":1}", "{\"b\":\n2}"]);
    }

    #[test]
    fn test_extract_reply_skips_unrelated_messages() {
        let body = concat!(
            "event: message\n",
            "data: {\"jsonrpc\":\"2.0\",\"method\":\"notifications/progress\",\"params\":{}}\n\n",
            "event: message\n",
            "data: {\"jsonrpc\":\"2.0\",\"id\":1,\"result\":{\"old\":true}}\n\n",
            "event: message\n",
            "data: {\"jsonrpc\":\"2.0\",\"id\":2,\"result\":{\"content\":[]}}\n\n",
        );
        let reply = extract_reply(body, true, 2).unwrap();
        assert_eq!(reply.into_result().unwrap(), json!({"content": []}));
    }

    #[test]
    fn test_extract_reply_plain_json_and_batch() {
        let reply = extract_reply(r#"{"jsonrpc":"2.0","id":1,"result":{}}"#, false, 1).unwrap();
        assert!(reply.into_result().is_ok());

        let batch = r#"[{"jsonrpc":"2.0","id":4,"result":1},{"jsonrpc":"2.0","id":5,"result":2}]"#;
        let reply = extract_reply(batch, false, 5).unwrap();
        assert_eq!(reply.into_result().unwrap(), json!(2));
    }

    #[test]
    fn test_extract_reply_errors() {
        let err = extract_reply("not json", false, 1).unwrap_err();
        assert!(matches!(err, AnalysisError::MalformedReply { .. }));

        let err = extract_reply(r#"{"jsonrpc":"2.0","id":9,"result":{}}"#, false, 1).unwrap_err();
        assert!(matches!(err, AnalysisError::Transport { .. }));

        let reply = extract_reply(
            r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32602,"message":"Unknown tool"}}"#,
            false,
            1,
        )
        .unwrap();
        assert_eq!(
            reply.into_result().unwrap_err(),
            AnalysisError::remote_tool("Unknown tool")
        );
    }

    #[test]
    fn test_tool_call_result_first_text() {
        let result: ToolCallResult = serde_json::from_value(json!({
            "content": [
                {"type": "image", "data": "..."},
                {"type": "text", "text": "{'robot_id': 'R1'}"}
            ],
            "isError": false
        }))
        .unwrap();
        assert_eq!(result.first_text(), Some("{'robot_id': 'R1'}"));
        assert!(!result.is_error);

        let empty: ToolCallResult = serde_json::from_value(json!({})).unwrap();
        assert_eq!(empty.first_text(), None);
    }
}
