use super::protocol::{
    extract_reply, initialize_params, tool_call_params, JsonRpcMessage, JsonRpcRequest,
    ToolCallResult, ACCEPT_HEADER_VALUE, PROTOCOL_VERSION_HEADER, SESSION_HEADER,
};
use crate::config::AnalysisConfig;
use crate::error::AnalysisError;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde_json::Value;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

/// Longest slice of an HTTP error body copied into a diagnostic
const MAX_ERROR_BODY: usize = 512;

/// One MCP session, opened for a single tool call.
///
/// Once [`McpSession::open`] returns, the caller must finish with
/// [`McpSession::close`] on every path.
///
/// The configured timeout bounds the whole exchange from `initialize` to the
/// end of the tool call; `close` gets a fresh timeout of its own.
pub struct McpSession<'a> {
    http: &'a reqwest::Client,
    endpoint: &'a str,
    timeout: Option<Duration>,
    deadline: Option<Instant>,
    protocol_version: String,
    session_id: Option<String>,
    next_id: u64,
    initialized: bool,
    closed: bool,
}

impl<'a> McpSession<'a> {
    /// Run the `initialize` handshake
    pub async fn open(
        http: &'a reqwest::Client,
        config: &'a AnalysisConfig,
    ) -> Result<McpSession<'a>, AnalysisError> {
        let mut session = McpSession {
            http,
            endpoint: &config.endpoint,
            timeout: config.request_timeout(),
            deadline: config.request_timeout().map(|t| Instant::now() + t),
            protocol_version: config.protocol_version.clone(),
            session_id: None,
            next_id: 1,
            initialized: false,
            closed: false,
        };

        let params = initialize_params(&config.protocol_version, &config.client_name);
        let init = match session.request("initialize", params).await {
            Ok(reply) => reply.into_result(),
            Err(e) => Err(e),
        };

        let init = match init {
            Ok(result) => result,
            Err(e) => {
                session.close().await;
                return Err(e);
            }
        };

        if let Some(version) = init.get("protocolVersion").and_then(Value::as_str) {
            if version != session.protocol_version {
                debug!(
                    "Server negotiated MCP protocol {} (requested {})",
                    version, session.protocol_version
                );
                session.protocol_version = version.to_string();
            }
        }
        session.initialized = true;

        if let Err(e) = session
            .notify(JsonRpcRequest::notification("notifications/initialized"))
            .await
        {
            session.close().await;
            return Err(e);
        }

        debug!(
            "MCP session opened (id: {})",
            session.session_id.as_deref().unwrap_or("none")
        );
        Ok(session)
    }

    /// Invoke a remote tool and return its result envelope
    pub async fn call_tool(
        &mut self,
        tool_name: &str,
        arguments: Value,
    ) -> Result<ToolCallResult, AnalysisError> {
        let reply = self
            .request("tools/call", tool_call_params(tool_name, arguments))
            .await?;
        let result = reply.into_result()?;

        serde_json::from_value(result).map_err(|e| {
            AnalysisError::malformed(format!("unexpected tools/call result shape: {}", e))
        })
    }

    /// Terminate the session. Failures are logged only.
    pub async fn close(mut self) {
        self.closed = true;

        let Some(session_id) = self.session_id.take() else {
            trace!("MCP session closed (stateless server)");
            return;
        };

        let mut request = self
            .http
            .delete(self.endpoint)
            .header(SESSION_HEADER, &session_id);
        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }

        match request.send().await {
            Ok(response) if response.status().is_success() => {
                debug!("MCP session {} closed", session_id);
            }
            Ok(response) => {
                // 405 means the server does not support explicit termination
                debug!(
                    "MCP session {} close returned HTTP {}",
                    session_id,
                    response.status()
                );
            }
            Err(e) => {
                debug!("MCP session {} close failed: {}", session_id, e);
            }
        }
    }

    async fn request(&mut self, method: &str, params: Value) -> Result<JsonRpcMessage, AnalysisError> {
        let id = self.next_id;
        self.next_id += 1;

        trace!("Sending MCP request {} ({})", id, method);
        let response = self.post(&JsonRpcRequest::request(id, method, params)).await?;

        if self.session_id.is_none() {
            if let Some(value) = response
                .headers()
                .get(SESSION_HEADER)
                .and_then(|v| v.to_str().ok())
            {
                self.session_id = Some(value.to_string());
            }
        }

        let event_stream = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.starts_with("text/event-stream"))
            .unwrap_or(false);

        let body = response.text().await?;
        extract_reply(&body, event_stream, id)
    }

    async fn notify(&mut self, notification: JsonRpcRequest) -> Result<(), AnalysisError> {
        self.post(&notification).await.map(|_| ())
    }

    async fn post(&self, message: &JsonRpcRequest) -> Result<reqwest::Response, AnalysisError> {
        let mut request = self
            .http
            .post(self.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, ACCEPT_HEADER_VALUE)
            .json(message);

        if let Some(session_id) = &self.session_id {
            request = request.header(SESSION_HEADER, session_id);
        }
        if self.initialized {
            request = request.header(PROTOCOL_VERSION_HEADER, &self.protocol_version);
        }
        if let Some(remaining) = self.remaining()? {
            request = request.timeout(remaining);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body: String = body.chars().take(MAX_ERROR_BODY).collect();
            return Err(AnalysisError::transport(format!(
                "HTTP {} from analysis endpoint during {}: {}",
                status,
                message.method,
                body.trim()
            )));
        }

        Ok(response)
    }

    /// Time left before the exchange deadline
    fn remaining(&self) -> Result<Option<Duration>, AnalysisError> {
        let Some(deadline) = self.deadline else {
            return Ok(None);
        };

        let left = deadline.saturating_duration_since(Instant::now());
        if left.is_zero() {
            return Err(AnalysisError::transport(format!(
                "request timed out: analysis exchange exceeded {:?}",
                self.timeout.unwrap_or_default()
            )));
        }
        Ok(Some(left))
    }
}

impl Drop for McpSession<'_> {
    fn drop(&mut self) {
        if !self.closed {
            warn!(
                "MCP session {} dropped without being closed",
                self.session_id.as_deref().unwrap_or("none")
            );
        }
    }
}
