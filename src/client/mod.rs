use thiserror::Error;

pub mod completion;
pub mod openai;

pub use completion::{ChatMessage, CompletionClient, Role, SamplingParams};
pub use openai::OpenAiClient;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP status {status}: {body}")]
    HttpStatus {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("serialization error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    #[error("completion response had no message content")]
    EmptyCompletion,

    #[error("configuration error: {0}")]
    Config(String),
}

pub type ClientResult<T> = Result<T, ClientError>;
