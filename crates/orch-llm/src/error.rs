//! Error types for the LLM transport.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("model invocation failed: {0}")]
    Invocation(String),

    #[error("model response was not valid JSON matching the requested schema: {0}")]
    JsonParse(String),
}

pub type Result<T> = std::result::Result<T, Error>;
