use crate::embedding::EmbeddingError;
use crate::llm::LlmError;
use crate::vector_store::VectorStoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Nl2SqlError {
    /// The semantic index or its embedding backend could not serve a request.
    #[error("retrieval unavailable: {0}")]
    RetrievalUnavailable(String),

    /// The chat-completion call failed at the transport level.
    #[error("generation unavailable: {0}")]
    GenerationUnavailable(String),

    #[error("table not found: {0}")]
    TableNotFound(String),

    #[error("invalid table definition: {0}")]
    InvalidTable(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl From<LlmError> for Nl2SqlError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::ConfigError(msg) => Nl2SqlError::Config(msg),
            other => Nl2SqlError::GenerationUnavailable(other.to_string()),
        }
    }
}

impl From<EmbeddingError> for Nl2SqlError {
    fn from(err: EmbeddingError) -> Self {
        match err {
            EmbeddingError::ConfigError(msg) => Nl2SqlError::Config(msg),
            other => Nl2SqlError::RetrievalUnavailable(other.to_string()),
        }
    }
}

impl From<VectorStoreError> for Nl2SqlError {
    fn from(err: VectorStoreError) -> Self {
        Nl2SqlError::RetrievalUnavailable(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Nl2SqlError>;
