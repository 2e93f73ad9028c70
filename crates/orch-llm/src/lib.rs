//! LLM transport: an opaque `invoke`/`invoke_with_json_schema` contract
//! over the model backend's HTTP API.

#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]

pub mod client;
pub mod error;
pub mod fake;
pub mod types;

pub use client::{HttpLlmClient, LlmClient};
pub use error::{Error, Result};
pub use fake::FakeLlmClient;
pub use types::{LlmConfig, LlmResponse};
