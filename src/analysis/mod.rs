//! Remote scene analysis over MCP.

mod client;
pub mod literal;
pub mod protocol;
mod session;

pub use client::{AnalysisClient, McpAnalysisClient};
pub use session::McpSession;

use crate::encoder::EncodedPayload;
use crate::error::AnalysisError;
use serde_json::{Map, Value};
use std::fmt;

/// One analysis call. Built fresh for each frame and never stored.
#[derive(Clone)]
pub struct AnalysisRequest {
    pub agent_id: String,
    pub credential: String,
    pub payload: EncodedPayload,
}

impl AnalysisRequest {
    pub fn new<A: Into<String>, C: Into<String>>(
        agent_id: A,
        credential: C,
        payload: EncodedPayload,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            credential: credential.into(),
            payload,
        }
    }
}

impl fmt::Debug for AnalysisRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisRequest")
            .field("agent_id", &self.agent_id)
            .field("credential", &"<redacted>")
            .field("payload_bytes", &self.payload.size_bytes())
            .finish()
    }
}

/// Loosely-typed reply: whatever mapping the tool sent back
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawReply(Map<String, Value>);

impl RawReply {
    pub fn new(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// Parse the tool's textual reply
    pub fn from_text(text: &str) -> Result<Self, AnalysisError> {
        literal::parse_mapping(text).map(Self).map_err(|e| {
            AnalysisError::malformed(format!("reply is not a structured literal mapping: {}", e))
        })
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl From<Map<String, Value>> for RawReply {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}
