//! Deterministic in-memory [`LlmClient`] for tests in downstream crates.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::client::LlmClient;
use crate::error::{Error, Result};
use crate::types::LlmResponse;

/// Returns a fixed queue of responses in order, or an error once exhausted.
/// Not a mock in the assertion-on-call sense — just a scripted stand-in so
/// callers above the transport layer can be tested without a network.
pub struct FakeLlmClient {
    scripted: Mutex<VecDeque<LlmResponse>>,
}

impl FakeLlmClient {
    #[must_use]
    pub fn new(responses: Vec<LlmResponse>) -> Self {
        Self {
            scripted: Mutex::new(responses.into()),
        }
    }

    #[must_use]
    pub fn with_json(json_strings: Vec<&str>) -> Self {
        let responses = json_strings
            .into_iter()
            .map(|content| LlmResponse {
                content: content.to_string(),
                stop_reason: "end_turn".to_string(),
                usage: std::collections::HashMap::new(),
                model: "fake-model".to_string(),
            })
            .collect();
        Self::new(responses)
    }
}

#[async_trait]
impl LlmClient for FakeLlmClient {
    async fn invoke(
        &self,
        _prompt: &str,
        _system_prompt: Option<&str>,
        _max_tokens: Option<u32>,
        _temperature: Option<f32>,
    ) -> Result<LlmResponse> {
        self.scripted
            .lock()
            .expect("fake client mutex poisoned")
            .pop_front()
            .ok_or_else(|| Error::Invocation("fake client exhausted its scripted responses".to_string()))
    }
}
