//! Wire types for model invocation requests and responses.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Connection parameters for the model backend.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub profile: String,
    pub region: String,
    pub model_id: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            profile: "advanced-bedrock".to_string(),
            region: "eu-west-1".to_string(),
            model_id: "eu.anthropic.claude-sonnet-4-5-20250929-v1:0".to_string(),
            max_tokens: 8000,
            temperature: 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct Message {
    pub role: &'static str,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct InvokeRequest {
    pub anthropic_version: &'static str,
    pub messages: Vec<Message>,
    pub max_tokens: u32,
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ContentBlock {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct InvokeRawResponse {
    #[serde(default)]
    pub content: Vec<ContentBlock>,
    #[serde(default)]
    pub stop_reason: String,
    #[serde(default)]
    pub usage: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub model: String,
}

/// Normalized model response: concatenated text content plus metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LlmResponse {
    pub content: String,
    pub stop_reason: String,
    pub usage: HashMap<String, serde_json::Value>,
    pub model: String,
}

impl From<InvokeRawResponse> for LlmResponse {
    fn from(raw: InvokeRawResponse) -> Self {
        let content = raw
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .map(|block| block.text)
            .collect();

        Self {
            content,
            stop_reason: raw.stop_reason,
            usage: raw.usage,
            model: raw.model,
        }
    }
}
