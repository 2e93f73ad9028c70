//! Model invocation: a thin async trait over the backend's HTTP API, plus
//! a JSON-schema-constrained variant built on top of plain prompting.

use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::types::{InvokeRawResponse, InvokeRequest, LlmConfig, LlmResponse, Message};

const ANTHROPIC_VERSION: &str = "bedrock-2023-05-31";

/// Opaque model invocation contract. Callers never see the transport
/// (HTTP, queue, in-process fake) behind it.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn invoke(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        max_tokens: Option<u32>,
        temperature: Option<f32>,
    ) -> Result<LlmResponse>;

    /// Ask the model to emit JSON matching `json_schema` and parse the
    /// result, tolerating a response wrapped in a markdown code fence.
    async fn invoke_with_json_schema(
        &self,
        prompt: &str,
        json_schema: &serde_json::Value,
        system_prompt: Option<&str>,
    ) -> Result<serde_json::Value> {
        let schema_pretty = serde_json::to_string_pretty(json_schema)
            .map_err(|e| Error::JsonParse(e.to_string()))?;
        let enhanced_prompt = format!(
            "{prompt}\n\nPlease respond with a valid JSON object matching this schema:\n\n```json\n{schema_pretty}\n```\n\nReturn ONLY the JSON object, no additional text."
        );

        let response = self.invoke(&enhanced_prompt, system_prompt, None, None).await?;
        parse_json_response(&response.content)
    }
}

fn parse_json_response(content: &str) -> Result<serde_json::Value> {
    let trimmed = content.trim();
    let extracted = if let Some(rest) = trimmed.strip_prefix("```json") {
        rest.split("```").next().unwrap_or(rest).trim()
    } else if let Some(rest) = trimmed.strip_prefix("```") {
        rest.split("```").next().unwrap_or(rest).trim()
    } else {
        trimmed
    };

    serde_json::from_str(extracted).map_err(|e| Error::JsonParse(e.to_string()))
}

/// Invokes the model backend's REST `invoke-model` endpoint over HTTP.
pub struct HttpLlmClient {
    http: reqwest::Client,
    endpoint: String,
    config: LlmConfig,
}

impl HttpLlmClient {
    #[must_use]
    pub fn new(endpoint: impl Into<String>, config: LlmConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &LlmConfig {
        &self.config
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn invoke(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        max_tokens: Option<u32>,
        temperature: Option<f32>,
    ) -> Result<LlmResponse> {
        let request = InvokeRequest {
            anthropic_version: ANTHROPIC_VERSION,
            messages: vec![Message {
                role: "user",
                content: prompt.to_string(),
            }],
            max_tokens: max_tokens.unwrap_or(self.config.max_tokens),
            temperature: temperature.unwrap_or(self.config.temperature),
            system: system_prompt.map(ToString::to_string),
        };

        let url = format!("{}/model/{}/invoke", self.endpoint, self.config.model_id);
        debug!(model_id = %self.config.model_id, prompt_len = prompt.len(), "invoking model");

        let http_response = self
            .http
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Invocation(e.to_string()))?;

        let status = http_response.status();
        if !status.is_success() {
            let body = http_response.text().await.unwrap_or_default();
            return Err(Error::Invocation(format!("status {status}: {body}")));
        }

        let raw: InvokeRawResponse = http_response
            .json()
            .await
            .map_err(|e| Error::Invocation(e.to_string()))?;

        info!(model = %raw.model, stop_reason = %raw.stop_reason, "model invocation succeeded");
        Ok(raw.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedFake {
        response: LlmResponse,
    }

    #[async_trait]
    impl LlmClient for FixedFake {
        async fn invoke(
            &self,
            _prompt: &str,
            _system_prompt: Option<&str>,
            _max_tokens: Option<u32>,
            _temperature: Option<f32>,
        ) -> Result<LlmResponse> {
            Ok(self.response.clone())
        }
    }

    #[tokio::test]
    async fn extracts_json_from_markdown_fence() {
        let fake = FixedFake {
            response: LlmResponse {
                content: "```json\n{\"ok\": true}\n```".to_string(),
                stop_reason: "end_turn".to_string(),
                usage: Default::default(),
                model: "test-model".to_string(),
            },
        };

        let parsed = fake
            .invoke_with_json_schema("describe", &serde_json::json!({}), None)
            .await
            .unwrap();
        assert_eq!(parsed["ok"], true);
    }

    #[tokio::test]
    async fn plain_json_without_fence_still_parses() {
        let fake = FixedFake {
            response: LlmResponse {
                content: "{\"ok\": false}".to_string(),
                stop_reason: "end_turn".to_string(),
                usage: Default::default(),
                model: "test-model".to_string(),
            },
        };

        let parsed = fake
            .invoke_with_json_schema("describe", &serde_json::json!({}), None)
            .await
            .unwrap();
        assert_eq!(parsed["ok"], false);
    }

    #[tokio::test]
    async fn malformed_json_is_reported_as_json_parse_error() {
        let fake = FixedFake {
            response: LlmResponse {
                content: "not json at all".to_string(),
                stop_reason: "end_turn".to_string(),
                usage: Default::default(),
                model: "test-model".to_string(),
            },
        };

        let err = fake
            .invoke_with_json_schema("describe", &serde_json::json!({}), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::JsonParse(_)));
    }
}
