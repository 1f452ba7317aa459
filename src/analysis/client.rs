use super::protocol::ToolCallResult;
use super::session::McpSession;
use super::{AnalysisRequest, RawReply};
use crate::config::AnalysisConfig;
use crate::error::AnalysisError;
use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{debug, info};

/// Tool argument carrying the access token
pub const CREDENTIAL_ARGUMENT: &str = "hf_token_input";
/// Tool argument carrying the agent identifier
pub const AGENT_ID_ARGUMENT: &str = "robot_id_input";
/// Tool argument carrying the base64 image
pub const IMAGE_ARGUMENT: &str = "image_b64_input";

/// Performs exactly one remote analysis per `analyze` call. No retries.
#[async_trait]
pub trait AnalysisClient: Send + Sync {
    async fn analyze(&self, request: AnalysisRequest) -> Result<RawReply, AnalysisError>;

    /// Release transport resources; called once when the loop stops
    async fn close(&self) {}
}

/// MCP streamable-HTTP client. Every call runs in its own session.
pub struct McpAnalysisClient {
    http: reqwest::Client,
    config: AnalysisConfig,
}

impl McpAnalysisClient {
    pub fn new(config: &AnalysisConfig) -> Result<Self, AnalysisError> {
        // No idle connections survive between frames
        let http = reqwest::Client::builder()
            .user_agent(concat!("robowatch/", env!("CARGO_PKG_VERSION")))
            .pool_max_idle_per_host(0)
            .build()
            .map_err(|e| AnalysisError::transport(format!("Failed to build HTTP client: {}", e)))?;

        info!(
            "Analysis client targeting {} (tool {}, timeout {:?})",
            config.endpoint,
            config.tool_name,
            config.request_timeout()
        );

        Ok(Self {
            http,
            config: config.clone(),
        })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }
}

#[async_trait]
impl AnalysisClient for McpAnalysisClient {
    async fn analyze(&self, request: AnalysisRequest) -> Result<RawReply, AnalysisError> {
        let payload_bytes = request.payload.size_bytes();
        let mut arguments = Map::new();
        arguments.insert(
            CREDENTIAL_ARGUMENT.to_string(),
            Value::String(request.credential),
        );
        arguments.insert(AGENT_ID_ARGUMENT.to_string(), Value::String(request.agent_id));
        arguments.insert(
            IMAGE_ARGUMENT.to_string(),
            Value::String(request.payload.transport_text()),
        );

        let mut session = McpSession::open(&self.http, &self.config).await?;
        let outcome = session
            .call_tool(&self.config.tool_name, Value::Object(arguments))
            .await;
        session.close().await;

        let result = outcome?;
        debug!(
            "Tool {} answered for {} byte payload (is_error: {})",
            self.config.tool_name, payload_bytes, result.is_error
        );
        interpret_tool_result(result)
    }

    async fn close(&self) {
        debug!("Analysis client closed");
    }
}

/// Turn a `tools/call` envelope into a reply or a classified error
pub fn interpret_tool_result(result: ToolCallResult) -> Result<RawReply, AnalysisError> {
    if result.is_error {
        let message = result.first_text().unwrap_or("Unknown error");
        return Err(AnalysisError::remote_tool(message));
    }

    let text = result
        .first_text()
        .ok_or_else(|| AnalysisError::malformed("tool reply has no text content"))?;

    RawReply::from_text(text)
}
