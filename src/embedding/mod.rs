pub mod hashing;
pub mod remote;

use crate::config::EmbeddingConfig;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("embedding connection error: {0}")]
    ConnectionError(String),
    #[error("embedding response error: {0}")]
    ResponseError(String),
    #[error("embedding configuration error: {0}")]
    ConfigError(String),
}

/// Vector embedding (simple f32 vector)
pub type Embedding = Vec<f32>;

#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError>;

    fn dimension(&self) -> usize;

    fn name(&self) -> &str;
}

pub fn from_config(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>, EmbeddingError> {
    let embedder: Arc<dyn Embedder> = match config.backend.as_str() {
        "hashing" => Arc::new(hashing::HashingEmbedder::new(config.dimension)?),
        "remote" => Arc::new(remote::RemoteEmbedder::new(config)?),
        _ => {
            return Err(EmbeddingError::ConfigError(format!(
                "Unsupported embedding backend: {}",
                config.backend
            )))
        }
    };
    Ok(embedder)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    #[test]
    fn test_default_backend_is_hashing() {
        let embedder = from_config(&AppConfig::default().embedding).unwrap();
        assert_eq!(embedder.name(), "hashing");
        assert_eq!(embedder.dimension(), 256);
    }

    #[test]
    fn test_unknown_backend_rejected() {
        let mut config = AppConfig::default().embedding;
        config.backend = "word2vec".to_string();
        assert!(matches!(from_config(&config), Err(EmbeddingError::ConfigError(_))));
    }
}
